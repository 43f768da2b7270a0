//! Input tensor construction
//!
//! Canvases become `f32` arrays of shape (1, H, W, 3): batch first, then rows,
//! columns and channels. Channel values are divided by 255.

use image::{DynamicImage, RgbaImage};

use crate::config::ChannelMode;
use crate::render::RasterCanvas;

/// Normalized classifier input, channel-last with a leading batch of 1
#[derive(Clone, Debug, PartialEq)]
pub struct InputTensor {
    data: Vec<f32>,
    height: usize,
    width: usize,
}

impl InputTensor {
    pub const CHANNELS: usize = 3;

    /// (batch, height, width, channels)
    pub fn shape(&self) -> [usize; 4] {
        [1, self.height, self.width, Self::CHANNELS]
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    /// Value at (row, column, channel)
    pub fn get(&self, y: usize, x: usize, c: usize) -> f32 {
        self.data[(y * self.width + x) * Self::CHANNELS + c]
    }
}

/// Converts canvases into classifier input
#[derive(Clone, Copy, Debug)]
pub struct TensorBuilder {
    channel_mode: ChannelMode,
    size: u32,
}

impl TensorBuilder {
    /// `size` is the spatial input dimension of the classifier
    pub fn new(channel_mode: ChannelMode, size: u32) -> Self {
        Self { channel_mode, size }
    }

    /// Build the tensor for a canvas. Alpha is ignored.
    pub fn build(&self, canvas: &RasterCanvas) -> InputTensor {
        self.build_rgba(canvas.image())
    }

    fn build_rgba(&self, img: &RgbaImage) -> InputTensor {
        let (width, height) = (img.width() as usize, img.height() as usize);
        let mut data = Vec::with_capacity(width * height * InputTensor::CHANNELS);
        for pixel in img.pixels() {
            let [r, g, b, _] = pixel.0;
            let rgb = match self.channel_mode {
                ChannelMode::Rgb => [r, g, b],
                ChannelMode::GreenReplicated => [g, g, g],
            };
            data.extend(rgb.iter().map(|&v| v as f32 / 255.0));
        }
        InputTensor {
            data,
            height,
            width,
        }
    }

    /// Build the tensor for an externally supplied raster
    ///
    /// Returns None (and logs why) when there is no image, when its pixel
    /// representation is not 8-bit RGB/RGBA, or when its size does not match
    /// the classifier input.
    pub fn build_from_image(&self, source: Option<&DynamicImage>) -> Option<InputTensor> {
        let Some(source) = source else {
            log::warn!("No source texture to classify");
            return None;
        };
        let rgba = match source {
            DynamicImage::ImageRgba8(img) => img.clone(),
            DynamicImage::ImageRgb8(img) => DynamicImage::ImageRgb8(img.clone()).to_rgba8(),
            other => {
                log::warn!(
                    "Unsupported texture representation {:?}, skipping classification",
                    other.color()
                );
                return None;
            }
        };
        if rgba.width() != self.size || rgba.height() != self.size {
            log::warn!(
                "Texture is {}x{}, expected {}x{}, skipping classification",
                rgba.width(),
                rgba.height(),
                self.size,
                self.size
            );
            return None;
        }
        Some(self.build_rgba(&rgba))
    }
}
