//! Interface to the game layer
//!
//! The host decides what a gesture means and owns the cooldown between
//! gestures. The controller only reports labels and asks for the cooldown.

pub trait GestureHost {
    /// Receive the final label, `"unknown"` included
    fn dispatch_gesture(&mut self, label: &str);

    /// Start the post-gesture cooldown
    fn start_cooldown(&mut self);

    /// Whether a new session must wait
    fn cooldown_active(&self) -> bool;
}

/// Countdown a host can use for its cooldown
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CooldownTimer {
    duration: f32,
    remaining: f32,
}

impl CooldownTimer {
    pub fn new(duration_secs: f32) -> Self {
        Self {
            duration: duration_secs.max(0.0),
            remaining: 0.0,
        }
    }

    pub fn start(&mut self) {
        self.remaining = self.duration;
    }

    /// Advance by `dt` seconds
    pub fn tick(&mut self, dt: f32) {
        self.remaining = (self.remaining - dt).max(0.0);
    }

    pub fn is_active(&self) -> bool {
        self.remaining > 0.0
    }
}
