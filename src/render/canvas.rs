//! Raster canvas backed by an RgbaImage
//!
//! Drawing goes through a tiny-skia staging pixmap. Nothing drawn there is
//! visible in the canvas until the pixmap is committed back.

use image::RgbaImage;
use tiny_skia::{IntSize, Pixmap};

use crate::config::CanvasColor;
use crate::domain::Rect;

/// Fixed-size square canvas the stroke is painted onto
#[derive(Clone, Debug, PartialEq)]
pub struct RasterCanvas {
    image: RgbaImage,
    background: [u8; 4],
}

impl RasterCanvas {
    /// Create a canvas of `size`x`size` cleared to `background`
    pub fn new(size: u32, background: CanvasColor) -> Self {
        let background = background.to_rgba_u8();
        Self {
            image: RgbaImage::from_pixel(size, size, image::Rgba(background)),
            background,
        }
    }

    /// Side length in pixels
    pub fn size(&self) -> u32 {
        self.image.width()
    }

    /// Full canvas as a pixel rectangle
    pub fn bounds(&self) -> Rect {
        Rect::new(0, 0, self.image.width() as i32, self.image.height() as i32)
    }

    /// Reset every pixel to the background color
    pub fn clear(&mut self) {
        let background = image::Rgba(self.background);
        for pixel in self.image.pixels_mut() {
            *pixel = background;
        }
    }

    /// Whether no pixel differs from the background
    pub fn is_blank(&self) -> bool {
        self.image.pixels().all(|p| p.0 == self.background)
    }

    /// RGBA value at a pixel
    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        self.image.get_pixel(x, y).0
    }

    /// Whether the pixel at (x, y) has been painted
    pub fn is_painted(&self, x: u32, y: u32) -> bool {
        self.pixel(x, y) != self.background
    }

    /// Smallest rectangle covering every painted pixel
    pub fn painted_bounds(&self) -> Option<Rect> {
        let mut bounds: Option<Rect> = None;
        for (x, y, pixel) in self.image.enumerate_pixels() {
            if pixel.0 == self.background {
                continue;
            }
            let (x, y) = (x as i32, y as i32);
            bounds = Some(match bounds {
                Some(b) => Rect {
                    left: b.left.min(x),
                    top: b.top.min(y),
                    right: b.right.max(x + 1),
                    bottom: b.bottom.max(y + 1),
                },
                None => Rect::new(x, y, x + 1, y + 1),
            });
        }
        bounds
    }

    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    /// Copy the canvas to a pixmap, apply the drawing function, and commit back
    pub fn with_pixmap(&mut self, f: impl FnOnce(&mut Pixmap)) {
        let (w, h) = (self.image.width(), self.image.height());
        let Some(size) = IntSize::from_wh(w, h) else {
            return;
        };
        let Some(mut pixmap) = Pixmap::from_vec(self.image.as_raw().clone(), size) else {
            log::warn!("Could not create staging pixmap for {}x{} canvas", w, h);
            return;
        };

        f(&mut pixmap);

        // Commit
        self.image.copy_from_slice(pixmap.data());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tiny_skia::{Paint, Transform};

    #[test]
    fn test_new_canvas_is_blank() {
        let canvas = RasterCanvas::new(16, CanvasColor::BLACK);
        assert_eq!(canvas.size(), 16);
        assert!(canvas.is_blank());
        assert_eq!(canvas.painted_bounds(), None);
        assert_eq!(canvas.pixel(3, 3), [0, 0, 0, 255]);
    }

    #[test]
    fn test_pixmap_edits_commit_to_canvas() {
        let mut canvas = RasterCanvas::new(16, CanvasColor::BLACK);
        canvas.with_pixmap(|pixmap| {
            let mut paint = Paint::default();
            paint.set_color_rgba8(255, 255, 255, 255);
            paint.anti_alias = false;
            let rect = tiny_skia::Rect::from_xywh(2.0, 3.0, 4.0, 2.0).unwrap();
            pixmap.fill_rect(rect, &paint, Transform::identity(), None);
        });
        assert_eq!(canvas.painted_bounds(), Some(Rect::new(2, 3, 6, 5)));
        assert!(canvas.is_painted(5, 4));
        assert!(!canvas.is_painted(6, 4));
    }

    #[test]
    fn test_clear_restores_background() {
        let mut canvas = RasterCanvas::new(8, CanvasColor::BLACK);
        canvas.with_pixmap(|pixmap| pixmap.fill(tiny_skia::Color::WHITE));
        assert!(!canvas.is_blank());
        canvas.clear();
        assert!(canvas.is_blank());
    }
}
