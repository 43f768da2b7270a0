//! Freehand 3D gesture capture and classification
//!
//! A stroke recorded from a tracked controller is flattened onto a fixed-size
//! canvas, turned into a tensor and classified by a frozen model. The
//! [`session::GestureController`] ties the stages together and reports the
//! resulting label to the game through [`session::GestureHost`].

pub mod capture;
pub mod classify;
pub mod config;
pub mod debug;
pub mod domain;
pub mod render;
pub mod session;

pub use config::GlyphConfig;
pub use domain::{ClassificationResult, GestureLabel, Point3, Stroke};
pub use session::{ClassifyStatus, GestureController, GestureHost};
