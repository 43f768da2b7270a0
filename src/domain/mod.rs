//! Pure domain types with minimal dependencies
//!
//! This module contains core types used throughout the pipeline.
//! Types here should not depend on the raster, model or session layers.

pub mod geometry;
pub mod label;
pub mod stroke;

pub use geometry::*;
pub use label::*;
pub use stroke::*;
