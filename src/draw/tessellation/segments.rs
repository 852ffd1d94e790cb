//! Trace segmentation
//!
//! A trace path is decomposed into one oriented rectangle per consecutive
//! point pair. Segments are always recomputed wholesale from the path.

use crate::draw::geometry::{Point, SegmentRecord};

/// Split a path into segments: `n` points give `n - 1` segments.
///
/// Fewer than two points yields an empty list; such a trace is simply not
/// drawable yet.
pub fn segment_path(points: &[Point], width: f32) -> Vec<SegmentRecord> {
    if points.len() < 2 {
        return Vec::new();
    }

    points
        .windows(2)
        .map(|pair| {
            let (start, end) = (pair[0], pair[1]);
            let dx = end.x - start.x;
            let dy = end.y - start.y;
            SegmentRecord {
                start,
                end,
                width,
                angle: dy.atan2(dx),
                length: (dx * dx + dy * dy).sqrt(),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::FRAC_PI_2;

    #[test]
    fn test_arity() {
        let pts: Vec<Point> = (0..5).map(|i| Point::new(i as f32, (i * i) as f32)).collect();
        for k in 0..pts.len() {
            let segs = segment_path(&pts[..k], 0.2);
            let expected = if k >= 2 { k - 1 } else { 0 };
            assert_eq!(segs.len(), expected, "k = {}", k);
        }
    }

    #[test]
    fn test_length_and_angle() {
        let segs = segment_path(&[Point::new(0.0, 0.0), Point::new(3.0, 4.0), Point::new(3.0, 10.0)], 0.25);
        assert!((segs[0].length - 5.0).abs() < 1e-6);
        assert!((segs[1].length - 6.0).abs() < 1e-6);
        assert!((segs[1].angle - FRAC_PI_2).abs() < 1e-6);
        for s in &segs {
            assert!((s.length - s.start.distance(s.end)).abs() < 1e-6);
            assert_eq!(s.width, 0.25);
        }
        assert_eq!(segs[0].midpoint(), Point::new(1.5, 2.0));
    }
}
