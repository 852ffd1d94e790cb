//! Core record types for the copper layer
//!
//! Pads and traces are stored as logical records keyed by a stable string id.
//! Board-plane coordinates are `(x, y)` in `Point`, which map to world `(x, z)`;
//! the world `y` axis is the board normal and is always derived from the layer.

use serde::{Deserialize, Serialize};
use std::f32::consts::PI;

/// A 2D point in the board plane
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn distance(self, other: Point) -> f32 {
        let dx = other.x - self.x;
        let dy = other.y - self.y;
        (dx * dx + dy * dy).sqrt()
    }

    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

impl From<[f32; 2]> for Point {
    fn from(p: [f32; 2]) -> Self {
        Point { x: p[0], y: p[1] }
    }
}

impl From<Point> for [f32; 2] {
    fn from(p: Point) -> Self {
        [p.x, p.y]
    }
}

/// Copper layer a primitive sits on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Layer {
    Top,
    Bottom,
}

impl Layer {
    pub fn as_str(self) -> &'static str {
        match self {
            Layer::Top => "top",
            Layer::Bottom => "bottom",
        }
    }

    pub fn parse(s: &str) -> Option<Layer> {
        match s {
            "top" => Some(Layer::Top),
            "bottom" => Some(Layer::Bottom),
            _ => None,
        }
    }
}

/// Pad outline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PadKind {
    #[serde(alias = "rect")]
    Rectangle,
    Circle,
}

impl PadKind {
    pub fn as_str(self) -> &'static str {
        match self {
            PadKind::Rectangle => "rectangle",
            PadKind::Circle => "circle",
        }
    }

    pub fn parse(s: &str) -> Option<PadKind> {
        match s {
            "rectangle" | "rect" => Some(PadKind::Rectangle),
            "circle" => Some(PadKind::Circle),
            _ => None,
        }
    }
}

/// Surface-mount pad
///
/// `size` is `[width, height]` for rectangles and `[diameter, diameter]` for circles.
/// Depth is never stored; it comes from the layer placement at transform time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PadRecord {
    pub id: String,
    pub kind: PadKind,
    pub position: Point,
    pub size: [f32; 2],
    /// Radians about the board normal
    #[serde(default)]
    pub rotation: f32,
    pub layer: Layer,
}

impl PadRecord {
    pub fn new(id: impl Into<String>, kind: PadKind, position: Point, size: [f32; 2], layer: Layer) -> Self {
        Self {
            id: id.into(),
            kind,
            position,
            size,
            rotation: 0.0,
            layer,
        }
    }

    pub fn with_rotation(mut self, rotation: f32) -> Self {
        self.rotation = rotation;
        self
    }

    /// Copper area: `w*h` for rectangles, `pi*(d/2)^2` for circles
    pub fn area(&self) -> f32 {
        match self.kind {
            PadKind::Rectangle => self.size[0] * self.size[1],
            PadKind::Circle => {
                let r = self.size[0] / 2.0;
                PI * r * r
            }
        }
    }

    /// Axis-aligned footprint in the board plane, accounting for rotation
    pub fn footprint(&self) -> [f32; 4] {
        let (hw, hh) = (self.size[0] / 2.0, self.size[1] / 2.0);
        let (sin, cos) = self.rotation.sin_cos();
        let ex = (hw * cos).abs() + (hh * sin).abs();
        let ey = (hw * sin).abs() + (hh * cos).abs();
        [
            self.position.x - ex,
            self.position.y - ey,
            self.position.x + ex,
            self.position.y + ey,
        ]
    }
}

/// Copper trace: an open path with constant width
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceRecord {
    pub id: String,
    pub points: Vec<Point>,
    pub width: f32,
    pub layer: Layer,
}

impl TraceRecord {
    pub fn new(id: impl Into<String>, points: Vec<Point>, width: f32, layer: Layer) -> Self {
        Self {
            id: id.into(),
            points,
            width,
            layer,
        }
    }

    /// Checks the path invariants: at least two points, positive width and
    /// no two consecutive points coinciding.
    pub fn validate(&self) -> Result<(), String> {
        validate_path(&self.points, self.width)
    }

    /// Copper area of the stroked centreline (sum of segment rectangles)
    pub fn area(&self) -> f32 {
        self.points
            .windows(2)
            .map(|w| w[0].distance(w[1]) * self.width)
            .sum()
    }

    pub fn footprint(&self) -> [f32; 4] {
        let half = self.width / 2.0;
        let mut bounds = [f32::MAX, f32::MAX, f32::MIN, f32::MIN];
        for p in &self.points {
            bounds[0] = bounds[0].min(p.x - half);
            bounds[1] = bounds[1].min(p.y - half);
            bounds[2] = bounds[2].max(p.x + half);
            bounds[3] = bounds[3].max(p.y + half);
        }
        bounds
    }
}

/// Minimum distance between consecutive trace points
pub const MIN_SEGMENT_LENGTH: f32 = 1e-6;

pub fn validate_path(points: &[Point], width: f32) -> Result<(), String> {
    if points.len() < 2 {
        return Err(format!("trace needs at least 2 points, got {}", points.len()));
    }
    if !(width > 0.0) || !width.is_finite() {
        return Err(format!("trace width must be positive, got {}", width));
    }
    for (i, pair) in points.windows(2).enumerate() {
        if !pair[0].is_finite() || !pair[1].is_finite() {
            return Err(format!("trace point {} is not finite", i));
        }
        if pair[0].distance(pair[1]) < MIN_SEGMENT_LENGTH {
            return Err(format!("points {} and {} coincide (zero-length segment)", i, i + 1));
        }
    }
    Ok(())
}

/// One oriented rectangle of a trace; owned by its parent trace and
/// recomputed whenever the path or width changes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SegmentRecord {
    pub start: Point,
    pub end: Point,
    pub width: f32,
    /// `atan2(dy, dx)` of the segment direction
    pub angle: f32,
    pub length: f32,
}

impl SegmentRecord {
    pub fn midpoint(&self) -> Point {
        Point::new((self.start.x + self.end.x) / 2.0, (self.start.y + self.end.y) / 2.0)
    }
}

/// Substrate dimensions
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoardDims {
    pub width: f32,
    pub height: f32,
    pub thickness: f32,
}

impl Default for BoardDims {
    fn default() -> Self {
        Self {
            width: 100.0,
            height: 80.0,
            thickness: 1.6,
        }
    }
}

impl BoardDims {
    /// True if a board-plane point lies on the substrate (centred at the origin)
    pub fn contains(&self, p: Point) -> bool {
        p.x.abs() <= self.width / 2.0 && p.y.abs() <= self.height / 2.0
    }
}
