//! Camera and pointer rays

use glam::{Vec2, Vec3};
use serde::Deserialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CameraMode {
    #[default]
    Perspective,
    Orthographic,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ray {
    pub origin: Vec3,
    /// Unit direction
    pub dir: Vec3,
}

impl Ray {
    pub fn new(origin: Vec3, dir: Vec3) -> Self {
        Self {
            origin,
            dir: dir.normalize_or_zero(),
        }
    }

    pub fn at(&self, t: f32) -> Vec3 {
        self.origin + self.dir * t
    }

    /// Intersection with the horizontal plane `y = depth`, in front of the origin
    pub fn intersect_horizontal(&self, depth: f32) -> Option<Vec3> {
        if self.dir.y.abs() <= 1.0e-6 {
            return None;
        }
        let t = (depth - self.origin.y) / self.dir.y;
        if t <= 0.0 {
            return None;
        }
        Some(self.at(t))
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Camera {
    pub eye: Vec3,
    pub forward: Vec3,
    pub right: Vec3,
    pub up: Vec3,
    pub aspect: f32,
    pub fovy: f32,
    pub mode: CameraMode,
    pub ortho_half_h: f32,
}

impl Camera {
    /// Camera at `eye` looking at `target`; `fovy` in radians
    pub fn look_at(eye: Vec3, target: Vec3, fovy: f32, aspect: f32, mode: CameraMode) -> Self {
        let forward = (target - eye).normalize_or_zero();
        let world_up = if forward.cross(Vec3::Y).length_squared() < 1.0e-8 {
            Vec3::NEG_Z
        } else {
            Vec3::Y
        };
        let right = forward.cross(world_up).normalize_or_zero();
        let up = right.cross(forward);
        let distance = (target - eye).length();
        let ortho_half_h = match mode {
            CameraMode::Perspective => (0.5 * fovy).tan() * distance,
            CameraMode::Orthographic => distance.max(0.1),
        };
        Self {
            eye,
            forward,
            right,
            up,
            aspect: if aspect > 0.0 { aspect } else { 1.0 },
            fovy,
            mode,
            ortho_half_h,
        }
    }

    /// Ray through a normalized device coordinate (`x`, `y` in `[-1, 1]`, y up)
    pub fn ray_from_ndc(&self, ndc: Vec2) -> Option<Ray> {
        if !ndc.is_finite() {
            return None;
        }
        match self.mode {
            CameraMode::Perspective => {
                let half_h = (0.5 * self.fovy).tan();
                let half_w = half_h * self.aspect;
                let dir = self.forward + self.right * (ndc.x * half_w) + self.up * (ndc.y * half_h);
                Some(Ray::new(self.eye, dir))
            }
            CameraMode::Orthographic => {
                let half_h = self.ortho_half_h;
                let half_w = half_h * self.aspect;
                let origin = self.eye + self.right * (ndc.x * half_w) + self.up * (ndc.y * half_h);
                Some(Ray::new(origin, self.forward))
            }
        }
    }
}

/// Convert a pixel position on a canvas into NDC
pub fn ndc_from_pixel(x: f32, y: f32, width: f32, height: f32) -> Option<Vec2> {
    if width <= 1.0 || height <= 1.0 {
        return None;
    }
    Some(Vec2::new((x / width) * 2.0 - 1.0, 1.0 - (y / height) * 2.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_center_ray_points_at_target() {
        let camera = Camera::look_at(Vec3::new(0.0, 10.0, 10.0), Vec3::ZERO, 0.8, 1.5, CameraMode::Perspective);
        let ray = camera.ray_from_ndc(Vec2::ZERO).unwrap();
        let hit = ray.intersect_horizontal(0.0).unwrap();
        assert!(hit.length() < 1e-4);
    }

    #[test]
    fn test_top_down_camera_is_well_defined() {
        let camera = Camera::look_at(Vec3::new(2.0, 50.0, 3.0), Vec3::new(2.0, 0.0, 3.0), 0.8, 1.0, CameraMode::Orthographic);
        let ray = camera.ray_from_ndc(Vec2::ZERO).unwrap();
        assert!((ray.dir - Vec3::NEG_Y).length() < 1e-6);
        let hit = ray.intersect_horizontal(0.81).unwrap();
        assert!((hit - Vec3::new(2.0, 0.81, 3.0)).length() < 1e-4);
    }

    #[test]
    fn test_ndc_from_pixel() {
        assert_eq!(ndc_from_pixel(50.0, 25.0, 100.0, 50.0), Some(Vec2::ZERO));
        assert_eq!(ndc_from_pixel(0.0, 0.0, 100.0, 50.0), Some(Vec2::new(-1.0, 1.0)));
        assert_eq!(ndc_from_pixel(0.0, 0.0, 0.0, 50.0), None);
    }
}
