//! Stroke rendering module
//!
//! This module contains:
//! - The fixed-size raster canvas the classifier reads
//! - Projection, normalization and thick-line rasterization of strokes
//! - PNG encoding of canvases (debug dumps and offline rendering)

pub mod canvas;
pub mod encode;
pub mod rasterizer;

pub use canvas::RasterCanvas;
pub use rasterizer::{CanvasMapping, Rasterizer};
