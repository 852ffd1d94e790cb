//! Instance batches
//!
//! One batch is one GPU draw: a shared mesh, a shared material and a buffer of
//! per-instance transforms plus highlight flags. The batch owns the logical
//! records and keeps the id <-> slot mapping as a strict bijection over live
//! records.
//!
//! Removal follows exactly one `RemovalPolicy` for the lifetime of a batch:
//! - `DeadSlot`: the slot is collapsed off-screen and never reused until `clear`.
//!   Slots stay stable, which is what pads need while being hovered or dragged.
//! - `Compact`: remaining records are repacked into slots `0..k` in insertion
//!   order. Every compaction bumps `layout_generation`.

use crate::draw::geometry::{
    InstanceUpload, Layer, MeshUpload, PadRecord, Point, FLOATS_PER_TRANSFORM,
};
use crate::draw::instancing::layers::LayerPlacement;
use crate::draw::instancing::materials::{MaterialId, MaterialService};
use crate::draw::tessellation::Mesh;
use crate::error::BatchError;
use glam::{Mat4, Quat, Vec3};
use indexmap::IndexMap;
use rayon::prelude::*;
use std::collections::HashMap;
use std::sync::Arc;

/// Registration-ordered batch identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
pub struct BatchId(pub u32);

/// Where a removed instance is parked: far below the board with zero scale
pub const DEAD_SLOT_DEPTH: f32 = -1.0e6;

pub fn dead_transform() -> Mat4 {
    Mat4::from_scale_rotation_translation(Vec3::ZERO, Quat::IDENTITY, Vec3::new(0.0, DEAD_SLOT_DEPTH, 0.0))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RemovalPolicy {
    DeadSlot,
    Compact,
}

/// Board-plane placement of one instance before the layer depth is applied
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SlotPlacement {
    pub center: Point,
    /// Counter-clockwise angle in the board plane
    pub yaw: f32,
    /// Scale of the unit mesh along local x and local z
    pub scale: [f32; 2],
}

/// Build the world transform for a placement at a given depth.
///
/// Board `(x, y)` maps to world `(x, z)`; a CCW board rotation is a negative
/// rotation about world +Y.
pub fn instance_matrix(placement: &SlotPlacement, depth: f32) -> Mat4 {
    Mat4::from_scale_rotation_translation(
        Vec3::new(placement.scale[0], 1.0, placement.scale[1]),
        Quat::from_rotation_y(-placement.yaw),
        Vec3::new(placement.center.x, depth, placement.center.y),
    )
}

/// A logical record that can be drawn as one instance
pub trait InstanceRecord: Clone + Send + Sync {
    fn key(&self) -> &str;
    fn layer(&self) -> Layer;
    fn placement(&self) -> SlotPlacement;
}

impl InstanceRecord for PadRecord {
    fn key(&self) -> &str {
        &self.id
    }

    fn layer(&self) -> Layer {
        self.layer
    }

    fn placement(&self) -> SlotPlacement {
        SlotPlacement {
            center: self.position,
            yaw: self.rotation,
            scale: self.size,
        }
    }
}

pub struct InstanceBatch<R: InstanceRecord> {
    id: BatchId,
    name: String,
    mesh: Option<Arc<Mesh>>,
    material: MaterialId,
    capacity: usize,
    policy: RemovalPolicy,
    records: IndexMap<String, R>,
    id_to_slot: HashMap<String, usize>,
    slot_to_id: Vec<Option<String>>,
    transforms: Vec<Mat4>,
    highlights: Vec<u32>,
    dirty: bool,
    layout_generation: u64,
    highlight_writes: u64,
    parallel_threshold: usize,
    disposed: bool,
}

impl<R: InstanceRecord> InstanceBatch<R> {
    pub fn new(
        id: BatchId,
        name: impl Into<String>,
        mesh: Arc<Mesh>,
        material: MaterialId,
        capacity: usize,
        policy: RemovalPolicy,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            mesh: Some(mesh),
            material,
            capacity,
            policy,
            records: IndexMap::new(),
            id_to_slot: HashMap::new(),
            slot_to_id: Vec::new(),
            transforms: Vec::new(),
            highlights: Vec::new(),
            dirty: false,
            layout_generation: 0,
            highlight_writes: 0,
            parallel_threshold: usize::MAX,
            disposed: false,
        }
    }

    /// Rebuilds with at least this many live records run on the rayon pool
    pub fn with_parallel_threshold(mut self, threshold: usize) -> Self {
        self.parallel_threshold = threshold;
        self
    }

    pub fn id(&self) -> BatchId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn policy(&self) -> RemovalPolicy {
        self.policy
    }

    pub fn material(&self) -> MaterialId {
        self.material
    }

    pub fn mesh(&self) -> Option<&Arc<Mesh>> {
        self.mesh.as_ref()
    }

    /// Number of live records
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Number of slots the renderer draws (dead slots included)
    pub fn visible_count(&self) -> usize {
        self.slot_to_id.len()
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    pub fn layout_generation(&self) -> u64 {
        self.layout_generation
    }

    /// Total highlight flag writes, for detecting redundant uniform churn
    pub fn highlight_writes(&self) -> u64 {
        self.highlight_writes
    }

    fn next_slot_available(&self) -> bool {
        match self.policy {
            RemovalPolicy::DeadSlot => self.slot_to_id.len() < self.capacity,
            RemovalPolicy::Compact => self.records.len() < self.capacity,
        }
    }

    /// Slots still free, taking dead slots into account
    pub fn remaining_capacity(&self) -> usize {
        match self.policy {
            RemovalPolicy::DeadSlot => self.capacity - self.slot_to_id.len(),
            RemovalPolicy::Compact => self.capacity - self.records.len(),
        }
    }

    /// Insert a record into the next free slot
    pub fn add(&mut self, record: R, layers: &LayerPlacement) -> Result<usize, BatchError> {
        if self.disposed {
            return Err(BatchError::Disposed(self.name.clone()));
        }
        let key = record.key().to_string();
        if self.records.contains_key(&key) {
            return Err(BatchError::DuplicateId(key));
        }
        if !self.next_slot_available() {
            log::warn!("batch '{}' rejected '{}': capacity {} reached", self.name, key, self.capacity);
            return Err(BatchError::CapacityExceeded {
                batch: self.name.clone(),
                capacity: self.capacity,
            });
        }

        let slot = self.slot_to_id.len();
        self.transforms.push(instance_matrix(&record.placement(), layers.depth(record.layer())));
        self.highlights.push(0);
        self.slot_to_id.push(Some(key.clone()));
        self.id_to_slot.insert(key.clone(), slot);
        self.records.insert(key, record);
        self.dirty = true;
        Ok(slot)
    }

    /// Patch a record in place and rewrite its transform. The slot never changes.
    /// Returns false for unknown ids, or if the patch tried to change the key.
    pub fn update<F>(&mut self, id: &str, layers: &LayerPlacement, patch: F) -> bool
    where
        F: FnOnce(&mut R),
    {
        let Some(&slot) = self.id_to_slot.get(id) else {
            log::debug!("batch '{}': update of unknown id '{}'", self.name, id);
            return false;
        };
        let Some(record) = self.records.get_mut(id) else {
            return false;
        };

        let before = record.clone();
        patch(record);
        if record.key() != id {
            log::error!("batch '{}': patch tried to rename '{}' to '{}'", self.name, id, record.key());
            *record = before;
            return false;
        }

        self.transforms[slot] = instance_matrix(&record.placement(), layers.depth(record.layer()));
        self.dirty = true;
        true
    }

    /// Remove a record. Returns false for unknown ids.
    pub fn remove(&mut self, id: &str, layers: &LayerPlacement) -> bool {
        let Some(slot) = self.id_to_slot.remove(id) else {
            log::debug!("batch '{}': remove of unknown id '{}'", self.name, id);
            return false;
        };
        self.records.shift_remove(id);

        match self.policy {
            RemovalPolicy::DeadSlot => {
                self.slot_to_id[slot] = None;
                self.transforms[slot] = dead_transform();
                self.highlights[slot] = 0;
            }
            RemovalPolicy::Compact => self.compact(layers),
        }
        self.dirty = true;
        true
    }

    /// Remove several records with at most one compaction. Returns how many were removed.
    pub fn remove_many<'a, I>(&mut self, ids: I, layers: &LayerPlacement) -> usize
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut removed = 0;
        for id in ids {
            let Some(slot) = self.id_to_slot.remove(id) else {
                continue;
            };
            self.records.shift_remove(id);
            self.slot_to_id[slot] = None;
            if self.policy == RemovalPolicy::DeadSlot {
                self.transforms[slot] = dead_transform();
                self.highlights[slot] = 0;
            }
            removed += 1;
        }
        if removed > 0 {
            if self.policy == RemovalPolicy::Compact {
                self.compact(layers);
            }
            self.dirty = true;
        }
        removed
    }

    /// Repack live records into slots `0..k` in insertion order, carrying
    /// highlight flags with their records.
    fn compact(&mut self, layers: &LayerPlacement) {
        let old_flags: HashMap<&str, u32> = self
            .id_to_slot
            .iter()
            .map(|(key, &slot)| (key.as_str(), self.highlights[slot]))
            .collect();

        let mut transforms = Vec::with_capacity(self.records.len());
        let mut highlights = Vec::with_capacity(self.records.len());
        let mut slot_to_id = Vec::with_capacity(self.records.len());
        let mut id_to_slot = HashMap::with_capacity(self.records.len());

        for (slot, (key, record)) in self.records.iter().enumerate() {
            transforms.push(instance_matrix(&record.placement(), layers.depth(record.layer())));
            highlights.push(old_flags.get(key.as_str()).copied().unwrap_or(0));
            slot_to_id.push(Some(key.clone()));
            id_to_slot.insert(key.clone(), slot);
        }

        self.transforms = transforms;
        self.highlights = highlights;
        self.slot_to_id = slot_to_id;
        self.id_to_slot = id_to_slot;
        self.layout_generation += 1;
    }

    /// Drop every record and reset the visible count. Mesh and material are kept.
    pub fn clear(&mut self) {
        self.records.clear();
        self.id_to_slot.clear();
        self.slot_to_id.clear();
        self.transforms.clear();
        self.highlights.clear();
        self.layout_generation += 1;
        self.dirty = true;
    }

    /// Recompute every live transform, e.g. after a board thickness change
    pub fn rebuild_transforms(&mut self, layers: &LayerPlacement) {
        let jobs: Vec<(usize, SlotPlacement, Layer)> = self
            .records
            .iter()
            .filter_map(|(key, record)| {
                self.id_to_slot
                    .get(key)
                    .map(|&slot| (slot, record.placement(), record.layer()))
            })
            .collect();

        let compute = |(slot, placement, layer): &(usize, SlotPlacement, Layer)| {
            (*slot, instance_matrix(placement, layers.depth(*layer)))
        };
        let matrices: Vec<(usize, Mat4)> = if jobs.len() >= self.parallel_threshold {
            jobs.par_iter().map(compute).collect()
        } else {
            jobs.iter().map(compute).collect()
        };

        for (slot, matrix) in matrices {
            self.transforms[slot] = matrix;
        }
        self.dirty = true;
    }

    pub fn by_id(&self, id: &str) -> Option<&R> {
        self.records.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.records.contains_key(id)
    }

    /// Live records in insertion order
    pub fn all(&self) -> impl Iterator<Item = &R> {
        self.records.values()
    }

    pub fn slot_of(&self, id: &str) -> Option<usize> {
        self.id_to_slot.get(id).copied()
    }

    pub fn id_at(&self, slot: usize) -> Option<&str> {
        self.slot_to_id.get(slot).and_then(|k| k.as_deref())
    }

    pub fn is_live(&self, slot: usize) -> bool {
        self.id_at(slot).is_some()
    }

    /// Live `(slot, key)` pairs in slot order
    pub fn live_slots(&self) -> impl Iterator<Item = (usize, &str)> {
        self.slot_to_id
            .iter()
            .enumerate()
            .filter_map(|(slot, key)| key.as_deref().map(|k| (slot, k)))
    }

    /// Transform of a live slot
    pub fn transform_at(&self, slot: usize) -> Option<Mat4> {
        if self.is_live(slot) {
            self.transforms.get(slot).copied()
        } else {
            None
        }
    }

    pub fn highlight_at(&self, slot: usize) -> Option<u32> {
        if self.is_live(slot) {
            self.highlights.get(slot).copied()
        } else {
            None
        }
    }

    /// Set or clear highlight bits on a live slot. Returns false for slots
    /// that are not live.
    pub fn write_highlight(&mut self, slot: usize, bits: u32, on: bool) -> bool {
        if !self.is_live(slot) {
            return false;
        }
        let flags = &mut self.highlights[slot];
        if on {
            *flags |= bits;
        } else {
            *flags &= !bits;
        }
        self.highlight_writes += 1;
        self.dirty = true;
        true
    }

    /// Current buffers, regardless of the dirty flag
    pub fn upload(&self) -> Option<InstanceUpload> {
        let mesh = self.mesh.as_ref()?;
        let mut transform_data = Vec::with_capacity(self.transforms.len() * FLOATS_PER_TRANSFORM);
        for m in &self.transforms {
            transform_data.extend_from_slice(&m.to_cols_array());
        }
        Some(InstanceUpload {
            batch_id: self.id.0,
            batch_name: self.name.clone(),
            material_id: self.material.0,
            mesh: MeshUpload {
                vertex_data: mesh.vertices.clone(),
                vertex_count: mesh.vertex_count(),
                index_data: mesh.indices.clone(),
                index_count: mesh.indices.len(),
            },
            instance_count: self.transforms.len(),
            transform_data,
            highlight_data: self.highlights.clone(),
        })
    }

    /// Buffers for re-upload if anything changed since the last call
    pub fn take_upload(&mut self) -> Option<InstanceUpload> {
        if !self.dirty {
            return None;
        }
        let upload = self.upload()?;
        self.dirty = false;
        Some(upload)
    }

    /// Release mesh and material. Only the first call does anything.
    pub fn dispose(&mut self, materials: &mut MaterialService) -> bool {
        if self.disposed {
            return false;
        }
        self.clear();
        self.mesh = None;
        materials.release(self.material);
        self.disposed = true;
        self.dirty = false;
        log::debug!("batch '{}' disposed", self.name);
        true
    }

    /// Verify the id <-> slot bijection over live records
    pub fn check_bijection(&self) -> Result<(), String> {
        if self.id_to_slot.len() != self.records.len() {
            return Err(format!(
                "{} slot mappings for {} records",
                self.id_to_slot.len(),
                self.records.len()
            ));
        }
        for key in self.records.keys() {
            let slot = self
                .id_to_slot
                .get(key)
                .ok_or_else(|| format!("record '{}' has no slot", key))?;
            if self.id_at(*slot) != Some(key.as_str()) {
                return Err(format!("slot {} does not map back to '{}'", slot, key));
            }
        }
        let live = self.slot_to_id.iter().filter(|k| k.is_some()).count();
        if live != self.records.len() {
            return Err(format!("{} live slots for {} records", live, self.records.len()));
        }
        if self.transforms.len() != self.slot_to_id.len() || self.highlights.len() != self.slot_to_id.len() {
            return Err("buffer lengths diverge from slot table".to_string());
        }
        if self.policy == RemovalPolicy::Compact && live != self.slot_to_id.len() {
            return Err("compacted batch has holes".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::draw::geometry::{PadKind, HIGHLIGHT_HOVERED};
    use crate::draw::tessellation::{build_mesh, MeshShape};

    fn batch(capacity: usize, policy: RemovalPolicy) -> InstanceBatch<PadRecord> {
        let mesh = Arc::new(build_mesh(MeshShape::Rectangle { width: 1.0, height: 1.0 }, 16));
        InstanceBatch::new(BatchId(0), "pads", mesh, MaterialId(0), capacity, policy)
    }

    fn pad(id: &str, x: f32) -> PadRecord {
        PadRecord::new(id, PadKind::Rectangle, Point::new(x, 0.0), [1.0, 0.5], Layer::Top)
    }

    #[test]
    fn test_dead_slot_removal_keeps_slots_stable() {
        let layers = LayerPlacement::new(1.6, 0.01);
        let mut b = batch(10, RemovalPolicy::DeadSlot);
        for i in 0..4 {
            assert_eq!(b.add(pad(&format!("P{}", i), i as f32), &layers), Ok(i));
        }
        assert!(b.remove("P1", &layers));
        assert_eq!(b.slot_of("P2"), Some(2));
        assert_eq!(b.visible_count(), 4);
        assert!(!b.is_live(1));
        assert_eq!(b.transform_at(1), None);
        assert_eq!(b.add(pad("P9", 9.0), &layers), Ok(4));
        assert_eq!(b.remaining_capacity(), 5);
        b.check_bijection().unwrap();
    }

    #[test]
    fn test_compaction_repacks_in_insertion_order() {
        let layers = LayerPlacement::new(1.6, 0.01);
        let mut b = batch(10, RemovalPolicy::Compact);
        for i in 0..4 {
            b.add(pad(&format!("P{}", i), i as f32), &layers).unwrap();
        }
        b.write_highlight(3, HIGHLIGHT_HOVERED, true);
        let generation = b.layout_generation();
        assert!(b.remove("P1", &layers));
        assert_eq!(b.layout_generation(), generation + 1);
        assert_eq!(b.visible_count(), 3);
        assert_eq!(b.id_at(2), Some("P3"));
        assert_eq!(b.highlight_at(2), Some(HIGHLIGHT_HOVERED));
        b.check_bijection().unwrap();
    }

    #[test]
    fn test_update_rejects_rename_and_unknown() {
        let layers = LayerPlacement::new(1.6, 0.01);
        let mut b = batch(4, RemovalPolicy::DeadSlot);
        b.add(pad("A", 0.0), &layers).unwrap();
        assert!(!b.update("missing", &layers, |r| r.position.x = 3.0));
        assert!(!b.update("A", &layers, |r| r.id = "B".to_string()));
        assert_eq!(b.by_id("A").map(|r| r.id.as_str()), Some("A"));
        assert!(b.update("A", &layers, |r| r.position = Point::new(2.0, 3.0)));
        let t = b.transform_at(0).unwrap();
        assert_eq!(t.w_axis.truncate(), Vec3::new(2.0, layers.top_z(), 3.0));
    }

    #[test]
    fn test_duplicate_and_capacity() {
        let layers = LayerPlacement::new(1.6, 0.01);
        let mut b = batch(2, RemovalPolicy::DeadSlot);
        b.add(pad("A", 0.0), &layers).unwrap();
        assert_eq!(b.add(pad("A", 1.0), &layers), Err(BatchError::DuplicateId("A".to_string())));
        b.add(pad("B", 1.0), &layers).unwrap();
        assert!(matches!(b.add(pad("C", 2.0), &layers), Err(BatchError::CapacityExceeded { capacity: 2, .. })));
        assert_eq!(b.len(), 2);
    }

    #[test]
    fn test_take_upload_clears_dirty() {
        let layers = LayerPlacement::new(1.6, 0.01);
        let mut b = batch(4, RemovalPolicy::DeadSlot);
        assert!(b.take_upload().is_none());
        b.add(pad("A", 0.0), &layers).unwrap();
        let upload = b.take_upload().unwrap();
        assert_eq!(upload.instance_count, 1);
        assert_eq!(upload.transform_data.len(), FLOATS_PER_TRANSFORM);
        assert!(b.take_upload().is_none());
    }

    #[test]
    fn test_dispose_twice_is_noop() {
        let layers = LayerPlacement::new(1.6, 0.01);
        let mut materials = MaterialService::new();
        let material = materials.create("pads", [1.0; 4]);
        let mesh = Arc::new(build_mesh(MeshShape::Circle { diameter: 1.0 }, 8));
        let mut b: InstanceBatch<PadRecord> =
            InstanceBatch::new(BatchId(1), "circles", mesh, material, 4, RemovalPolicy::DeadSlot);
        b.add(pad("A", 0.0), &layers).unwrap();
        assert!(b.dispose(&mut materials));
        assert!(!b.dispose(&mut materials));
        assert_eq!(materials.released_count(), 1);
        assert!(b.mesh().is_none());
        assert!(matches!(b.add(pad("B", 0.0), &layers), Err(BatchError::Disposed(_))));
    }

    #[test]
    fn test_parallel_rebuild_matches_serial() {
        let mut layers = LayerPlacement::new(1.6, 0.01);
        let mut serial = batch(64, RemovalPolicy::DeadSlot);
        let mut parallel = batch(64, RemovalPolicy::DeadSlot).with_parallel_threshold(1);
        for i in 0..40 {
            let p = pad(&format!("P{}", i), i as f32).with_rotation(i as f32 * 0.1);
            serial.add(p.clone(), &layers).unwrap();
            parallel.add(p, &layers).unwrap();
        }
        layers.update_thickness(3.0).unwrap();
        serial.rebuild_transforms(&layers);
        parallel.rebuild_transforms(&layers);
        for slot in 0..40 {
            assert_eq!(serial.transform_at(slot), parallel.transform_at(slot));
        }
        assert!((serial.transform_at(0).unwrap().w_axis.y - 1.51).abs() < 1e-6);
    }
}
