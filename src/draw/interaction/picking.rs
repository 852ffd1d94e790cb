//! Pointer picking
//!
//! Anything the pointer may hit implements `Interactable`, whether it is a
//! whole instance batch or a single standalone mesh. The resolver only ever
//! tests the batches registered with it; decorative geometry is never hit.

use super::camera::{Camera, Ray};
use crate::draw::instancing::{BatchId, InstanceBatch, InstanceRecord};
use crate::draw::tessellation::MeshShape;
use glam::{Mat4, Vec2, Vec3};
use serde::Serialize;

/// One instance of one batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct InstanceRef {
    pub batch: BatchId,
    pub slot: usize,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PickHit {
    pub target: InstanceRef,
    pub distance: f32,
    pub point: Vec3,
}

/// Capability shared by batched and single-object drawables
pub trait Interactable {
    fn batch_id(&self) -> BatchId;
    /// Number of slots to scan (live or not)
    fn slot_count(&self) -> usize;
    fn is_live(&self, slot: usize) -> bool;
    fn transform_at(&self, slot: usize) -> Option<Mat4>;
    fn hit_shape(&self) -> Option<MeshShape>;
    fn highlight_at(&self, slot: usize) -> Option<u32>;
    /// Returns false if the slot is not live
    fn set_highlight(&mut self, slot: usize, bits: u32, on: bool) -> bool;

    /// Ray parameter and world point where `ray` crosses the instance, if it does
    fn intersect_slot(&self, ray: &Ray, slot: usize) -> Option<(f32, Vec3)> {
        let shape = self.hit_shape()?;
        let transform = self.transform_at(slot)?;
        if transform.determinant() == 0.0 {
            return None;
        }
        let inverse = transform.inverse();
        let local_origin = inverse.transform_point3(ray.origin);
        let local_dir = inverse.transform_vector3(ray.dir);
        if local_dir.y.abs() <= 1.0e-12 {
            return None;
        }
        let t = -local_origin.y / local_dir.y;
        if t < 0.0 {
            return None;
        }
        let local = local_origin + local_dir * t;
        if !shape.contains(local.x, local.z) {
            return None;
        }
        Some((t, ray.at(t)))
    }

    /// Nearest hit in this drawable; exact ties go to the lowest slot
    fn intersect(&self, ray: &Ray) -> Option<PickHit> {
        let mut best: Option<PickHit> = None;
        for slot in 0..self.slot_count() {
            if !self.is_live(slot) {
                continue;
            }
            if let Some((distance, point)) = self.intersect_slot(ray, slot) {
                if best.map_or(true, |b| distance < b.distance) {
                    best = Some(PickHit {
                        target: InstanceRef { batch: self.batch_id(), slot },
                        distance,
                        point,
                    });
                }
            }
        }
        best
    }
}

impl<R: InstanceRecord> Interactable for InstanceBatch<R> {
    fn batch_id(&self) -> BatchId {
        self.id()
    }

    fn slot_count(&self) -> usize {
        self.visible_count()
    }

    fn is_live(&self, slot: usize) -> bool {
        InstanceBatch::is_live(self, slot)
    }

    fn transform_at(&self, slot: usize) -> Option<Mat4> {
        InstanceBatch::transform_at(self, slot)
    }

    fn hit_shape(&self) -> Option<MeshShape> {
        self.mesh().map(|m| m.shape)
    }

    fn highlight_at(&self, slot: usize) -> Option<u32> {
        InstanceBatch::highlight_at(self, slot)
    }

    fn set_highlight(&mut self, slot: usize, bits: u32, on: bool) -> bool {
        self.write_highlight(slot, bits, on)
    }
}

/// A one-off drawable outside any batch, exposed as a batch of one slot
#[derive(Debug, Clone)]
pub struct StandaloneMesh {
    id: BatchId,
    shape: MeshShape,
    transform: Mat4,
    highlight: u32,
}

impl StandaloneMesh {
    pub fn new(id: BatchId, shape: MeshShape, transform: Mat4) -> Self {
        Self {
            id,
            shape,
            transform,
            highlight: 0,
        }
    }
}

impl Interactable for StandaloneMesh {
    fn batch_id(&self) -> BatchId {
        self.id
    }

    fn slot_count(&self) -> usize {
        1
    }

    fn is_live(&self, slot: usize) -> bool {
        slot == 0
    }

    fn transform_at(&self, slot: usize) -> Option<Mat4> {
        (slot == 0).then_some(self.transform)
    }

    fn hit_shape(&self) -> Option<MeshShape> {
        Some(self.shape)
    }

    fn highlight_at(&self, slot: usize) -> Option<u32> {
        (slot == 0).then_some(self.highlight)
    }

    fn set_highlight(&mut self, slot: usize, bits: u32, on: bool) -> bool {
        if slot != 0 {
            return false;
        }
        if on {
            self.highlight |= bits;
        } else {
            self.highlight &= !bits;
        }
        true
    }
}

/// Lookup of drawables by batch id
pub trait InteractableSet {
    fn interactable(&self, id: BatchId) -> Option<&dyn Interactable>;
    fn interactable_mut(&mut self, id: BatchId) -> Option<&mut dyn Interactable>;
}

impl InteractableSet for Vec<Box<dyn Interactable>> {
    fn interactable(&self, id: BatchId) -> Option<&dyn Interactable> {
        self.iter().find(|i| i.batch_id() == id).map(|b| b.as_ref())
    }

    fn interactable_mut(&mut self, id: BatchId) -> Option<&mut dyn Interactable> {
        match self.iter_mut().find(|i| i.batch_id() == id) {
            Some(b) => Some(b.as_mut()),
            None => None,
        }
    }
}

impl<R: InstanceRecord> InteractableSet for InstanceBatch<R> {
    fn interactable(&self, id: BatchId) -> Option<&dyn Interactable> {
        (self.id() == id).then_some(self as &dyn Interactable)
    }

    fn interactable_mut(&mut self, id: BatchId) -> Option<&mut dyn Interactable> {
        if self.id() == id {
            Some(self as &mut dyn Interactable)
        } else {
            None
        }
    }
}

/// Resolves pointer positions against the registered drawables.
///
/// Nearest distance wins. Exact ties go to the earliest registered batch,
/// then the lowest slot, so a static scene always resolves the same way.
#[derive(Debug, Default, Clone)]
pub struct PointerResolver {
    registered: Vec<BatchId>,
}

impl PointerResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, id: BatchId) {
        if !self.registered.contains(&id) {
            self.registered.push(id);
        }
    }

    pub fn unregister(&mut self, id: BatchId) -> bool {
        let before = self.registered.len();
        self.registered.retain(|r| *r != id);
        before != self.registered.len()
    }

    pub fn registered(&self) -> &[BatchId] {
        &self.registered
    }

    pub fn resolve_ray(&self, ray: &Ray, set: &dyn InteractableSet) -> Option<PickHit> {
        let mut best: Option<PickHit> = None;
        for id in &self.registered {
            let Some(drawable) = set.interactable(*id) else {
                continue;
            };
            if let Some(hit) = drawable.intersect(ray) {
                if best.map_or(true, |b| hit.distance < b.distance) {
                    best = Some(hit);
                }
            }
        }
        best
    }

    pub fn resolve(&self, ndc: Vec2, camera: &Camera, set: &dyn InteractableSet) -> Option<PickHit> {
        let ray = camera.ray_from_ndc(ndc)?;
        self.resolve_ray(&ray, set)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::draw::interaction::camera::CameraMode;
    use glam::Quat;

    fn flat(id: u32, shape: MeshShape, x: f32, y: f32, z: f32) -> Box<dyn Interactable> {
        let transform = Mat4::from_scale_rotation_translation(Vec3::ONE, Quat::IDENTITY, Vec3::new(x, y, z));
        Box::new(StandaloneMesh::new(BatchId(id), shape, transform))
    }

    fn down_ray(x: f32, z: f32) -> Ray {
        Ray::new(Vec3::new(x, 10.0, z), Vec3::NEG_Y)
    }

    #[test]
    fn test_nearest_wins() {
        let set: Vec<Box<dyn Interactable>> = vec![
            flat(0, MeshShape::Rectangle { width: 2.0, height: 2.0 }, 0.0, 0.0, 0.0),
            flat(1, MeshShape::Rectangle { width: 2.0, height: 2.0 }, 0.0, 1.0, 0.0),
        ];
        let mut resolver = PointerResolver::new();
        resolver.register(BatchId(0));
        resolver.register(BatchId(1));
        let hit = resolver.resolve_ray(&down_ray(0.5, 0.5), &set).unwrap();
        assert_eq!(hit.target.batch, BatchId(1));
        assert!((hit.distance - 9.0).abs() < 1e-5);
    }

    #[test]
    fn test_exact_tie_goes_to_first_registered() {
        let set: Vec<Box<dyn Interactable>> = vec![
            flat(5, MeshShape::Circle { diameter: 1.0 }, 0.0, 0.0, 0.0),
            flat(3, MeshShape::Rectangle { width: 1.0, height: 1.0 }, 0.0, 0.0, 0.0),
        ];
        let mut resolver = PointerResolver::new();
        resolver.register(BatchId(3));
        resolver.register(BatchId(5));
        for _ in 0..10 {
            let hit = resolver.resolve_ray(&down_ray(0.0, 0.0), &set).unwrap();
            assert_eq!(hit.target.batch, BatchId(3));
        }
    }

    #[test]
    fn test_unregistered_and_outside_are_ignored() {
        let set: Vec<Box<dyn Interactable>> = vec![flat(0, MeshShape::Circle { diameter: 1.0 }, 0.0, 0.0, 0.0)];
        let mut resolver = PointerResolver::new();
        assert!(resolver.resolve_ray(&down_ray(0.0, 0.0), &set).is_none());
        resolver.register(BatchId(0));
        assert!(resolver.resolve_ray(&down_ray(0.45, 0.45), &set).is_none());
        assert!(resolver.resolve_ray(&down_ray(0.1, 0.1), &set).is_some());
        assert!(resolver.unregister(BatchId(0)));
        assert!(!resolver.unregister(BatchId(0)));
    }

    #[test]
    fn test_resolve_from_camera() {
        let set: Vec<Box<dyn Interactable>> = vec![flat(0, MeshShape::Rectangle { width: 1.0, height: 1.0 }, 3.0, 0.81, -2.0)];
        let mut resolver = PointerResolver::new();
        resolver.register(BatchId(0));
        let camera = Camera::look_at(Vec3::new(3.0, 40.0, -2.0), Vec3::new(3.0, 0.0, -2.0), 0.7, 1.0, CameraMode::Perspective);
        let hit = resolver.resolve(Vec2::ZERO, &camera, &set).unwrap();
        assert!((hit.point - Vec3::new(3.0, 0.81, -2.0)).length() < 1e-3);
    }
}
