//! Gesture session management module
//!
//! This module contains:
//! - Session state and per-session classification status
//! - The host interface the game layer implements
//! - The controller that drives capture, rasterization and classification

pub mod controller;
pub mod host;
pub mod state;

pub use controller::GestureController;
pub use host::{CooldownTimer, GestureHost};
pub use state::{ClassifyStatus, SessionState};
