//! Gesture vocabulary and classification results

use std::fmt;

/// Gesture labels understood by the game layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GestureLabel {
    Circle,
    Loop,
    S,
    Spiral,
    W,
    /// Synthetic label for rejected classifications, never produced by the model
    Unknown,
}

impl GestureLabel {
    /// Model output order. Index `i` of the classifier output is `VOCABULARY[i]`.
    pub const VOCABULARY: [GestureLabel; 5] = [
        GestureLabel::Circle,
        GestureLabel::Loop,
        GestureLabel::S,
        GestureLabel::Spiral,
        GestureLabel::W,
    ];

    /// Label for a classifier output index
    pub fn from_index(index: usize) -> Option<Self> {
        Self::VOCABULARY.get(index).copied()
    }

    /// String passed to the dispatch handler
    pub fn as_str(&self) -> &'static str {
        match self {
            GestureLabel::Circle => "circle",
            GestureLabel::Loop => "loop",
            GestureLabel::S => "s",
            GestureLabel::Spiral => "spiral",
            GestureLabel::W => "w",
            GestureLabel::Unknown => "unknown",
        }
    }
}

impl fmt::Display for GestureLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Arg-max label and its probability from one forward pass
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClassificationResult {
    pub label: GestureLabel,
    pub confidence: f32,
}

impl ClassificationResult {
    /// Label to emit after the confidence gate.
    ///
    /// Anything strictly below `threshold` is downgraded to `Unknown`.
    pub fn gated(&self, threshold: f32) -> GestureLabel {
        if self.confidence < threshold {
            GestureLabel::Unknown
        } else {
            self.label
        }
    }
}
