//! Stroke capture module
//!
//! Collects tracked controller positions while a session is recording.

pub mod recorder;

pub use recorder::{CaptureOutcome, RecorderPhase, StrokeRecorder};
