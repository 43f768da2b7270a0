//! Stroke rasterization
//!
//! A finished stroke is projected onto a plane, fitted into the canvas with
//! independent X and Y scale factors, and drawn as a chain of thick lines.
//! Each line is stepped pixel by pixel along its dominant axis and every
//! stepped pixel receives a filled square stamp of half-width `brush_radius`.
//!
//! The per-axis fit does not preserve aspect ratio. The exported classifier
//! was trained on images produced this way, so it must stay non-uniform.

use tiny_skia::{Paint, Transform};

use super::canvas::RasterCanvas;
use crate::config::{CanvasColor, GlyphConfig, ProjectionPlane};
use crate::domain::{Bounds, Point2, Rect, Stroke};

/// Maps projected world coordinates to canvas pixel centers
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CanvasMapping {
    pub min_x: f32,
    pub min_y: f32,
    pub scale_x: f32,
    pub scale_y: f32,
    radius: i32,
    size: i32,
    flip_vertical: bool,
}

impl CanvasMapping {
    /// Fit `bounds` into `[radius, size - radius]` on each axis.
    ///
    /// `epsilon` is added to both extents so a zero-width or zero-height box
    /// still yields finite scale factors.
    /// A radius too large for the canvas is clamped to the widest one that
    /// still leaves a pixel to draw on.
    pub fn fit(bounds: Bounds, size: u32, radius: u32, epsilon: f32, flip_vertical: bool) -> Self {
        let size = size.min(i32::MAX as u32);
        let radius = radius.min(size.saturating_sub(1) / 2);
        let usable = size.saturating_sub(radius * 2) as f32;
        Self {
            min_x: bounds.min_x,
            min_y: bounds.min_y,
            scale_x: usable / (bounds.width() + epsilon),
            scale_y: usable / (bounds.height() + epsilon),
            radius: radius as i32,
            size: size as i32,
            flip_vertical,
        }
    }

    /// Lowest pixel coordinate a stroke center may occupy
    pub fn min_center(&self) -> i32 {
        self.radius
    }

    /// Highest pixel coordinate a stroke center may occupy
    pub fn max_center(&self) -> i32 {
        (self.size - 1 - self.radius).max(self.radius)
    }

    /// Pixel center for a projected point
    pub fn map(&self, p: Point2) -> (i32, i32) {
        let (lo, hi) = (self.min_center(), self.max_center());
        // Truncation toward zero keeps the far edge one pixel inside the margin.
        let x = (self.radius + ((p.x - self.min_x) * self.scale_x) as i32).clamp(lo, hi);
        let mut y = (self.radius + ((p.y - self.min_y) * self.scale_y) as i32).clamp(lo, hi);
        if self.flip_vertical {
            y = self.size - 1 - y;
        }
        (x, y)
    }
}

/// Visit every pixel of the line from `from` to `to`, endpoints included
///
/// Steps one pixel at a time along the dominant axis and advances the minor
/// axis with an integer error term.
pub fn step_line(from: (i32, i32), to: (i32, i32), mut visit: impl FnMut(i32, i32)) {
    let (x0, y0) = from;
    let (x1, y1) = to;
    let dx = (x1 - x0).abs();
    let dy = (y1 - y0).abs();
    let sx = (x1 - x0).signum();
    let sy = (y1 - y0).signum();

    if dx >= dy {
        let mut err = 2 * dy - dx;
        let mut y = y0;
        for i in 0..=dx {
            visit(x0 + i * sx, y);
            if err > 0 {
                y += sy;
                err -= 2 * dx;
            }
            err += 2 * dy;
        }
    } else {
        let mut err = 2 * dx - dy;
        let mut x = x0;
        for i in 0..=dy {
            visit(x, y0 + i * sy);
            if err > 0 {
                x += sx;
                err -= 2 * dy;
            }
            err += 2 * dx;
        }
    }
}

/// Paints strokes onto fixed-size canvases
#[derive(Clone, Debug)]
pub struct Rasterizer {
    canvas_size: u32,
    brush_radius: u32,
    epsilon: f32,
    projection: ProjectionPlane,
    flip_vertical: bool,
    background: CanvasColor,
    brush: CanvasColor,
}

impl Rasterizer {
    pub fn new(config: &GlyphConfig) -> Self {
        Self {
            canvas_size: config.canvas_size,
            brush_radius: config.brush_radius,
            epsilon: config.scale_epsilon,
            projection: config.projection,
            flip_vertical: config.flip_vertical,
            background: config.background,
            brush: config.brush,
        }
    }

    pub fn canvas_size(&self) -> u32 {
        self.canvas_size
    }

    pub fn brush_radius(&self) -> u32 {
        self.brush_radius
    }

    /// A blank canvas with this rasterizer's size and background
    pub fn new_canvas(&self) -> RasterCanvas {
        RasterCanvas::new(self.canvas_size, self.background)
    }

    /// Mapping for a stroke, or None if it has too few points
    pub fn mapping(&self, stroke: &Stroke) -> Option<CanvasMapping> {
        if !stroke.is_drawable() {
            return None;
        }
        let projected = stroke.project(self.projection);
        let bounds = Bounds::from_points(&projected)?;
        Some(CanvasMapping::fit(
            bounds,
            self.canvas_size,
            self.brush_radius,
            self.epsilon,
            self.flip_vertical,
        ))
    }

    /// Pixel centers visited when drawing the stroke, in drawing order
    ///
    /// Joints between segments appear twice.
    pub fn trace(&self, stroke: &Stroke) -> Option<Vec<(i32, i32)>> {
        let mapping = self.mapping(stroke)?;
        let centers: Vec<(i32, i32)> = stroke
            .project(self.projection)
            .into_iter()
            .map(|p| mapping.map(p))
            .collect();

        let mut pixels = Vec::new();
        for pair in centers.windows(2) {
            step_line(pair[0], pair[1], |x, y| pixels.push((x, y)));
        }
        Some(pixels)
    }

    /// Paint the stroke onto `canvas`
    ///
    /// Strokes with fewer than two points leave the canvas untouched.
    /// Returns whether anything was drawn.
    pub fn rasterize(&self, stroke: &Stroke, canvas: &mut RasterCanvas) -> bool {
        let Some(pixels) = self.trace(stroke) else {
            log::debug!("Stroke has {} points, nothing to rasterize", stroke.len());
            return false;
        };

        let [r, g, b, a] = self.brush.to_rgba_u8();
        // A stamp never needs to be wider than the canvas
        let radius = self.brush_radius.min(self.canvas_size) as i32;
        let clip = canvas.bounds();

        canvas.with_pixmap(|pixmap| {
            let mut paint = Paint::default();
            paint.set_color_rgba8(r, g, b, a);
            paint.anti_alias = false;

            for &(x, y) in &pixels {
                let Some(stamp) = Rect::square(x, y, radius).intersect(clip) else {
                    continue;
                };
                if let Some(rect) = tiny_skia::Rect::from_xywh(
                    stamp.left as f32,
                    stamp.top as f32,
                    stamp.width() as f32,
                    stamp.height() as f32,
                ) {
                    pixmap.fill_rect(rect, &paint, Transform::identity(), None);
                }
            }
        });

        log::debug!(
            "Rasterized {} points into {} stepped pixels",
            stroke.len(),
            pixels.len()
        );
        true
    }

    /// Paint the stroke onto a fresh canvas
    pub fn rasterize_new(&self, stroke: &Stroke) -> RasterCanvas {
        let mut canvas = self.new_canvas();
        self.rasterize(stroke, &mut canvas);
        canvas
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Point3;

    fn rasterizer() -> Rasterizer {
        Rasterizer::new(&GlyphConfig::default())
    }

    fn stroke(points: &[(f32, f32, f32)]) -> Stroke {
        points.iter().map(|&(x, y, z)| Point3::new(x, y, z)).collect()
    }

    #[test]
    fn test_step_line_covers_endpoints_in_every_octant() {
        let targets = [
            (7, 2),
            (2, 7),
            (-2, 7),
            (-7, 2),
            (-7, -2),
            (-2, -7),
            (2, -7),
            (7, -2),
            (5, 0),
            (0, -5),
        ];
        for to in targets {
            let mut pixels = Vec::new();
            step_line((0, 0), to, |x, y| pixels.push((x, y)));
            assert_eq!(pixels.first(), Some(&(0, 0)));
            assert_eq!(pixels.last(), Some(&to), "line to {:?}", to);
            assert_eq!(pixels.len() as i32, to.0.abs().max(to.1.abs()) + 1);
            for w in pixels.windows(2) {
                assert!((w[0].0 - w[1].0).abs() <= 1 && (w[0].1 - w[1].1).abs() <= 1);
            }
        }
    }

    #[test]
    fn test_step_line_single_pixel() {
        let mut pixels = Vec::new();
        step_line((3, 4), (3, 4), |x, y| pixels.push((x, y)));
        assert_eq!(pixels, vec![(3, 4)]);
    }

    #[test]
    fn test_short_strokes_leave_canvas_blank() {
        let r = rasterizer();
        let mut canvas = r.new_canvas();
        assert!(!r.rasterize(&Stroke::new(), &mut canvas));
        assert!(!r.rasterize(&stroke(&[(1.0, 1.0, 1.0)]), &mut canvas));
        assert!(canvas.is_blank());
    }

    #[test]
    fn test_oversized_brush_radius_is_clamped() {
        let r = Rasterizer::new(&GlyphConfig {
            canvas_size: 16,
            brush_radius: 3_000_000_000,
            ..GlyphConfig::default()
        });
        let s = stroke(&[(0.0, 0.0, 0.0), (1.0, 1.0, 0.0)]);
        let mapping = r.mapping(&s).unwrap();
        assert_eq!(mapping.min_center(), 7);
        assert_eq!(mapping.max_center(), 8);
        let canvas = r.rasterize_new(&s);
        assert!(!canvas.is_blank());
    }

    #[test]
    fn test_identical_points_have_finite_scale() {
        let r = rasterizer();
        let s = stroke(&[(0.3, 0.3, 0.3); 5]);
        let mapping = r.mapping(&s).unwrap();
        assert!(mapping.scale_x.is_finite());
        assert!(mapping.scale_y.is_finite());

        let canvas = r.rasterize_new(&s);
        let bounds = canvas.painted_bounds().unwrap();
        assert_eq!(bounds.width(), 9);
        assert_eq!(bounds.height(), 9);
    }

    #[test]
    fn test_stroke_centers_stay_inside_margin() {
        let r = rasterizer();
        let radius = r.brush_radius() as i32;
        let max = r.canvas_size() as i32 - 1 - radius;
        let strokes = [
            stroke(&[(0.0, 0.0, 0.0), (1.0, 1.0, 0.0)]),
            stroke(&[(-5.0, 2.0, 1.0), (3.0, -1.0, 0.0), (0.0, 7.5, 2.0), (-5.0, 2.0, 9.0)]),
            stroke(&[(1e6, -1e6, 0.0), (-1e6, 1e6, 0.0), (0.0, 0.0, 0.0)]),
            stroke(&[(0.0, 0.0, 0.0), (0.0, 1e-7, 0.0)]),
        ];
        for s in &strokes {
            for (x, y) in r.trace(s).unwrap() {
                assert!((radius..=max).contains(&x), "x = {x}");
                assert!((radius..=max).contains(&y), "y = {y}");
            }
            let canvas = r.rasterize_new(s);
            let bounds = canvas.painted_bounds().unwrap();
            assert!(bounds.left >= 0 && bounds.top >= 0);
            assert!(bounds.right <= r.canvas_size() as i32);
            assert!(bounds.bottom <= r.canvas_size() as i32);
        }
    }

    #[test]
    fn test_horizontal_stroke_spans_usable_width() {
        let r = rasterizer();
        let radius = r.brush_radius() as i32;
        let size = r.canvas_size() as i32;
        let s: Stroke = (0..10)
            .map(|i| Point3::new(i as f32 * 0.01, 1.0, 0.0))
            .collect();

        let pixels = r.trace(&s).unwrap();
        let min_x = pixels.iter().map(|p| p.0).min().unwrap();
        let max_x = pixels.iter().map(|p| p.0).max().unwrap();
        let usable = size - 2 * radius;
        assert_eq!(min_x, radius);
        assert!(max_x - min_x >= usable - 2, "span {}", max_x - min_x);

        let canvas = r.rasterize_new(&s);
        let bounds = canvas.painted_bounds().unwrap();
        assert_eq!(bounds.height(), 2 * radius + 1);
        assert!(bounds.width() >= usable);
    }

    #[test]
    fn test_aspect_ratio_is_not_preserved() {
        let r = rasterizer();
        // Wide, flat zigzag fills the whole canvas in both directions.
        let s = stroke(&[(0.0, 0.0, 0.0), (10.0, 0.1, 0.0), (20.0, 0.0, 0.0)]);
        let canvas = r.rasterize_new(&s);
        let bounds = canvas.painted_bounds().unwrap();
        assert!(bounds.height() > r.canvas_size() as i32 / 2);
    }

    #[test]
    fn test_world_up_is_image_up() {
        let r = rasterizer();
        let s = stroke(&[(0.0, 0.0, 0.0), (0.0, 1.0, 0.0)]);
        let mapping = r.mapping(&s).unwrap();
        let (_, bottom) = mapping.map(Point2::new(0.0, 0.0));
        let (_, top) = mapping.map(Point2::new(0.0, 1.0));
        assert!(top < bottom);
    }

    #[test]
    fn test_depth_is_discarded() {
        let r = rasterizer();
        let flat = stroke(&[(0.0, 0.0, 0.0), (1.0, 1.0, 0.0), (2.0, 0.0, 0.0)]);
        let deep = stroke(&[(0.0, 0.0, 5.0), (1.0, 1.0, -3.0), (2.0, 0.0, 0.5)]);
        assert_eq!(r.rasterize_new(&flat), r.rasterize_new(&deep));
    }

    #[test]
    fn test_rasterization_is_deterministic() {
        let r = rasterizer();
        let s = stroke(&[(0.0, 0.0, 0.0), (0.4, 0.9, 0.0), (1.0, 0.2, 0.0), (0.1, 0.5, 0.0)]);
        assert_eq!(r.rasterize_new(&s), r.rasterize_new(&s));
    }
}
