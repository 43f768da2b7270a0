//! Per-tick stroke recorder
//!
//! The recorder owns the point buffer for the open session. Points are only
//! appended while the host reports that recording is allowed; losing that
//! permission mid-session discards the buffer without finalizing.

use crate::domain::{Point3, Stroke};

/// Recorder lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RecorderPhase {
    #[default]
    Idle,
    Recording,
}

/// What a capture tick did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureOutcome {
    /// No session is recording
    Ignored,
    /// The position was appended
    Appended,
    /// Recording permission dropped, the session was discarded
    Aborted,
}

#[derive(Debug, Default)]
pub struct StrokeRecorder {
    phase: RecorderPhase,
    stroke: Stroke,
}

impl StrokeRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> RecorderPhase {
        self.phase
    }

    pub fn is_recording(&self) -> bool {
        self.phase == RecorderPhase::Recording
    }

    /// Number of points in the open session
    pub fn len(&self) -> usize {
        self.stroke.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stroke.is_empty()
    }

    /// Clear the buffer and start recording
    pub fn begin_session(&mut self) {
        if self.is_recording() {
            log::debug!(
                "Restarting stroke capture, dropping {} points",
                self.stroke.len()
            );
        }
        self.stroke.clear();
        self.phase = RecorderPhase::Recording;
    }

    /// Record one tick worth of input
    pub fn capture_tick(&mut self, position: Point3, recording_allowed: bool) -> CaptureOutcome {
        if !self.is_recording() {
            return CaptureOutcome::Ignored;
        }
        if !recording_allowed {
            self.abort();
            return CaptureOutcome::Aborted;
        }
        self.stroke.push(position);
        CaptureOutcome::Appended
    }

    /// Discard the open session without producing a stroke
    pub fn abort(&mut self) {
        if self.is_recording() {
            log::debug!("Stroke capture aborted after {} points", self.stroke.len());
        }
        self.stroke.clear();
        self.phase = RecorderPhase::Idle;
    }

    /// Close the session and hand the completed stroke to the caller
    ///
    /// Returns None if no session was recording.
    pub fn end_session(&mut self) -> Option<Stroke> {
        if !self.is_recording() {
            return None;
        }
        self.phase = RecorderPhase::Idle;
        Some(std::mem::take(&mut self.stroke))
    }
}
