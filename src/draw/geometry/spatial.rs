//! Spatial indexing for box selection
//!
//! Footprints of live pads and traces go into an R-tree built on demand,
//! enabling fast rectangle queries in the board plane.

use rstar::{RTreeObject, AABB};
use serde::Serialize;

/// What kind of record a footprint belongs to
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FootprintKind {
    Pad,
    Trace,
}

/// Board-plane footprint of one record
#[derive(Clone, Debug)]
pub struct Footprint {
    pub id: String,
    pub kind: FootprintKind,
    pub bounds: AABB<[f32; 2]>,
}

impl Footprint {
    /// `bounds` is `[min_x, min_y, max_x, max_y]`
    pub fn new(id: impl Into<String>, kind: FootprintKind, bounds: [f32; 4]) -> Self {
        Self {
            id: id.into(),
            kind,
            bounds: AABB::from_corners([bounds[0], bounds[1]], [bounds[2], bounds[3]]),
        }
    }
}

impl RTreeObject for Footprint {
    type Envelope = AABB<[f32; 2]>;
    fn envelope(&self) -> Self::Envelope {
        self.bounds
    }
}

impl rstar::PointDistance for Footprint {
    fn distance_2(&self, point: &[f32; 2]) -> f32 {
        self.bounds.distance_2(point)
    }
}
