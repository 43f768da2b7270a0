use crate::domain::{ClassificationResult, GestureLabel};

/// Lifecycle of the single gesture session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Idle,
    Recording,
    /// Stroke captured, classification pending
    Finalizing,
}

/// Outcome of the most recent session
#[derive(Debug, Clone, Default, PartialEq)]
pub enum ClassifyStatus {
    #[default]
    Idle,
    /// Points are being captured
    Recording,
    /// Waiting for the forward pass
    Running,
    /// Recording permission dropped mid-session
    Cancelled,
    /// Stroke too short to draw, classifier not invoked
    Skipped,
    /// No usable source raster
    NoTexture,
    Done {
        result: ClassificationResult,
        /// Label after the confidence gate, as dispatched
        emitted: GestureLabel,
    },
    Error(String),
}

impl ClassifyStatus {
    /// Whether the session ended without reaching the classifier
    pub fn skipped_inference(&self) -> bool {
        matches!(
            self,
            ClassifyStatus::Cancelled | ClassifyStatus::Skipped | ClassifyStatus::NoTexture
        )
    }

    /// Emitted label, if the session completed
    pub fn emitted(&self) -> Option<GestureLabel> {
        match self {
            ClassifyStatus::Done { emitted, .. } => Some(*emitted),
            _ => None,
        }
    }
}
