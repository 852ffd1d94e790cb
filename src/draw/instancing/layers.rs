//! Layer placement
//!
//! Copper depths are a pure function of board thickness and a fixed offset:
//! `top = t/2 + eps`, `bottom = -t/2 - eps`. Changing the thickness here
//! does NOT move anything already placed; owners of instances must rebuild
//! their transforms after calling `update_thickness`.

use crate::draw::geometry::Layer;
use crate::error::BoardError;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayerPlacement {
    thickness: f32,
    offset: f32,
    top: f32,
    bottom: f32,
}

impl LayerPlacement {
    pub fn new(thickness: f32, offset: f32) -> Self {
        let mut placement = Self {
            thickness,
            offset,
            top: 0.0,
            bottom: 0.0,
        };
        placement.recompute();
        placement
    }

    fn recompute(&mut self) {
        let half = self.thickness / 2.0;
        self.top = half + self.offset;
        self.bottom = -half - self.offset;
    }

    /// Recompute both depths for a new thickness
    pub fn update_thickness(&mut self, thickness: f32) -> Result<(), BoardError> {
        if !(thickness > 0.0) || !thickness.is_finite() {
            return Err(BoardError::InvalidThickness(thickness));
        }
        self.thickness = thickness;
        self.recompute();
        Ok(())
    }

    pub fn thickness(&self) -> f32 {
        self.thickness
    }

    pub fn offset(&self) -> f32 {
        self.offset
    }

    pub fn top_z(&self) -> f32 {
        self.top
    }

    pub fn bottom_z(&self) -> f32 {
        self.bottom
    }

    pub fn depth(&self, layer: Layer) -> f32 {
        match layer {
            Layer::Top => self.top,
            Layer::Bottom => self.bottom,
        }
    }

    /// True iff both copper planes sit at least `offset` away from the
    /// substrate surfaces. Allows for one rounding step of f32 at the
    /// substrate's scale.
    pub fn is_separated(&self) -> bool {
        let half = self.thickness / 2.0;
        let slack = f32::EPSILON * 4.0 * half.abs().max(1.0);
        (self.top - half).abs() >= self.offset - slack
            && (self.bottom + half).abs() >= self.offset - slack
            && self.top > half
            && self.bottom < -half
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_depths_for_standard_board() {
        let placement = LayerPlacement::new(1.6, 0.01);
        assert!((placement.top_z() - 0.81).abs() < 1e-6);
        assert!((placement.bottom_z() + 0.81).abs() < 1e-6);
        assert!(placement.is_separated());
    }

    #[test]
    fn test_separation_holds_across_thicknesses() {
        let mut placement = LayerPlacement::new(1.6, 0.01);
        for t in [0.2_f32, 0.4, 0.8, 1.0, 1.2, 1.6, 2.0, 3.2, 10.0, 123.4] {
            placement.update_thickness(t).unwrap();
            assert!(placement.top_z() > t / 2.0, "t = {}", t);
            assert!(placement.bottom_z() < -t / 2.0, "t = {}", t);
            assert!(placement.is_separated(), "t = {}", t);
        }
    }

    #[test]
    fn test_rejects_non_positive_thickness() {
        let mut placement = LayerPlacement::new(1.6, 0.01);
        assert_eq!(placement.update_thickness(0.0), Err(BoardError::InvalidThickness(0.0)));
        assert!(placement.update_thickness(f32::NAN).is_err());
        assert_eq!(placement.thickness(), 1.6);
    }
}
