//! Stroke types recorded from the tracked controller
//!
//! Positions are world-space coordinates as reported by the host, one per tick.

use serde::{Deserialize, Serialize};

use super::geometry::Point2;
use crate::config::ProjectionPlane;

/// A single tracked controller position
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f32; 3]", into = "[f32; 3]")]
pub struct Point3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Point3 {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    /// Drop one axis according to the projection plane
    pub fn project(self, plane: ProjectionPlane) -> Point2 {
        match plane {
            ProjectionPlane::Xy => Point2::new(self.x, self.y),
            ProjectionPlane::Xz => Point2::new(self.x, self.z),
            ProjectionPlane::Zy => Point2::new(self.z, self.y),
        }
    }
}

impl From<[f32; 3]> for Point3 {
    fn from([x, y, z]: [f32; 3]) -> Self {
        Self { x, y, z }
    }
}

impl From<Point3> for [f32; 3] {
    fn from(p: Point3) -> Self {
        [p.x, p.y, p.z]
    }
}

/// Ordered sequence of positions captured during one session
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Stroke {
    points: Vec<Point3>,
}

impl Stroke {
    /// Minimum number of points a stroke needs to be rasterized
    pub const MIN_POINTS: usize = 2;

    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, point: Point3) {
        self.points.push(point);
    }

    pub fn clear(&mut self) {
        self.points.clear();
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Whether the stroke has enough points to produce a line
    pub fn is_drawable(&self) -> bool {
        self.points.len() >= Self::MIN_POINTS
    }

    pub fn points(&self) -> &[Point3] {
        &self.points
    }

    /// Project every point onto the 2D plane, preserving order
    pub fn project(&self, plane: ProjectionPlane) -> Vec<Point2> {
        self.points.iter().map(|p| p.project(plane)).collect()
    }

    /// Load a stroke from a JSON array of `[x, y, z]` triples
    pub fn from_json(json: &str) -> anyhow::Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

impl FromIterator<Point3> for Stroke {
    fn from_iter<I: IntoIterator<Item = Point3>>(iter: I) -> Self {
        Self {
            points: iter.into_iter().collect(),
        }
    }
}
