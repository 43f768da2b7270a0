//! PNG encoding for canvases

use anyhow::{Context, Result};
use image::RgbaImage;
use std::io;
use std::path::Path;

/// Encode an RGBA image as an 8-bit PNG
pub fn write_png<W: io::Write>(w: W, image: &RgbaImage) -> Result<(), png::EncodingError> {
    let mut encoder = png::Encoder::new(w, image.width(), image.height());
    encoder.set_color(png::ColorType::Rgba);
    encoder.set_depth(png::BitDepth::Eight);
    let mut writer = encoder.write_header()?;
    writer.write_image_data(image.as_raw())
}

/// Write an RGBA image to a PNG file
pub fn save_rgba(img: &RgbaImage, path: &Path) -> Result<()> {
    let file = std::fs::File::create(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    write_png(io::BufWriter::new(file), img)
        .with_context(|| format!("Failed to encode PNG: {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_png_reloads_with_same_pixels() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("canvas.png");
        let mut img = RgbaImage::from_pixel(4, 3, image::Rgba([0, 0, 0, 255]));
        img.put_pixel(1, 2, image::Rgba([255, 255, 255, 255]));

        save_rgba(&img, &path).unwrap();

        let loaded = image::open(&path).unwrap().to_rgba8();
        assert_eq!(loaded, img);
    }
}
