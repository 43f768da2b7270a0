//! Raw canvas dumps for diagnosing misclassified gestures
//!
//! Files are written but never read back by the pipeline.

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use std::path::{Path, PathBuf};

use crate::render::RasterCanvas;
use crate::render::encode::save_rgba;

/// File name for a canvas captured at `when`
pub fn dump_file_name(when: DateTime<Local>) -> String {
    when.format("gesture_%Y%m%d_%H%M%S%3f_raw.png").to_string()
}

/// Write the canvas into `dir`, creating it if needed
pub fn dump_canvas(canvas: &RasterCanvas, dir: &Path) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create debug directory: {}", dir.display()))?;
    let path = dir.join(dump_file_name(Local::now()));
    save_rgba(canvas.image(), &path)?;
    log::debug!("Saved raw gesture canvas to {}", path.display());
    Ok(path)
}
