//! Board model
//!
//! Owns the three instance batches that draw the copper layer:
//! - rectangular pads (dead-slot removal)
//! - circular pads (dead-slot removal)
//! - trace segments (compacting removal)
//!
//! Pad and trace ids share one namespace. Every mutation returns a `Result`
//! so the host can report soft failures (capacity, unknown id) without
//! anything panicking.

use crate::config::ViewerConfig;
use crate::draw::geometry::{
    validate_path, BoardDims, Footprint, FootprintKind, InstanceUpload, Layer, PadKind, PadRecord,
    Point, SegmentRecord, TraceRecord,
};
use crate::draw::instancing::{
    BatchId, CacheStats, GeometryCache, InstanceBatch, InstanceRecord, LayerPlacement,
    MaterialService, RemovalPolicy, SlotPlacement, COPPER_COLOR,
};
use crate::draw::interaction::{InstanceRef, Interactable, InteractableSet, ManipulationTarget};
use crate::draw::tessellation::segment_path;
use crate::error::{BatchError, BoardError};
use indexmap::IndexMap;
use rstar::{RTree, AABB};
use serde::{Deserialize, Serialize};

pub const RECT_PAD_BATCH: BatchId = BatchId(0);
pub const CIRCLE_PAD_BATCH: BatchId = BatchId(1);
pub const TRACE_BATCH: BatchId = BatchId(2);

/// Record kind as seen by queries and persistence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentKind {
    Rectangle,
    Circle,
    Trace,
}

impl ComponentKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ComponentKind::Rectangle => "rectangle",
            ComponentKind::Circle => "circle",
            ComponentKind::Trace => "trace",
        }
    }

    pub fn parse(s: &str) -> Option<ComponentKind> {
        if s.eq_ignore_ascii_case("trace") || s.eq_ignore_ascii_case("path") {
            return Some(ComponentKind::Trace);
        }
        PadKind::parse(s).map(ComponentKind::from)
    }

    pub fn is_pad(self) -> bool {
        !matches!(self, ComponentKind::Trace)
    }
}

impl From<PadKind> for ComponentKind {
    fn from(kind: PadKind) -> Self {
        match kind {
            PadKind::Rectangle => ComponentKind::Rectangle,
            PadKind::Circle => ComponentKind::Circle,
        }
    }
}

/// Borrowed view of one record
#[derive(Debug, Clone, Copy)]
pub enum Component<'a> {
    Pad(&'a PadRecord),
    Trace(&'a TraceRecord),
}

impl<'a> Component<'a> {
    pub fn id(&self) -> &'a str {
        match self {
            Component::Pad(p) => &p.id,
            Component::Trace(t) => &t.id,
        }
    }

    pub fn kind(&self) -> ComponentKind {
        match self {
            Component::Pad(p) => p.kind.into(),
            Component::Trace(_) => ComponentKind::Trace,
        }
    }

    pub fn layer(&self) -> Layer {
        match self {
            Component::Pad(p) => p.layer,
            Component::Trace(t) => t.layer,
        }
    }

    pub fn area(&self) -> f32 {
        match self {
            Component::Pad(p) => p.area(),
            Component::Trace(t) => t.area(),
        }
    }

    pub fn footprint(&self) -> [f32; 4] {
        match self {
            Component::Pad(p) => p.footprint(),
            Component::Trace(t) => t.footprint(),
        }
    }
}

/// Optional filters for listing
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ComponentFilter {
    pub layer: Option<Layer>,
    pub kind: Option<ComponentKind>,
}

impl ComponentFilter {
    pub fn matches(&self, component: &Component<'_>) -> bool {
        self.layer.map_or(true, |l| component.layer() == l) && self.kind.map_or(true, |k| component.kind() == k)
    }
}

/// One drawn segment of a trace
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentInstance {
    key: String,
    pub trace_id: String,
    pub index: usize,
    pub segment: SegmentRecord,
    pub layer: Layer,
}

impl SegmentInstance {
    fn key_for(trace_id: &str, index: usize) -> String {
        format!("{}#{}", trace_id, index)
    }
}

impl InstanceRecord for SegmentInstance {
    fn key(&self) -> &str {
        &self.key
    }

    fn layer(&self) -> Layer {
        self.layer
    }

    fn placement(&self) -> SlotPlacement {
        SlotPlacement {
            center: self.segment.midpoint(),
            yaw: self.segment.angle,
            scale: [self.segment.length, self.segment.width],
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchStats {
    pub id: BatchId,
    pub name: String,
    pub policy: RemovalPolicy,
    pub live: usize,
    pub visible: usize,
    pub capacity: usize,
    pub layout_generation: u64,
}

impl BatchStats {
    fn of<R: InstanceRecord>(batch: &InstanceBatch<R>) -> Self {
        Self {
            id: batch.id(),
            name: batch.name().to_string(),
            policy: batch.policy(),
            live: batch.len(),
            visible: batch.visible_count(),
            capacity: batch.capacity(),
            layout_generation: batch.layout_generation(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BoardStats {
    pub pads: usize,
    pub traces: usize,
    pub batches: Vec<BatchStats>,
    pub cache: CacheStats,
    pub live_materials: usize,
    pub thickness: f32,
    pub top_z: f32,
    pub bottom_z: f32,
}

pub struct Board {
    config: ViewerConfig,
    layers: LayerPlacement,
    cache: GeometryCache,
    materials: MaterialService,
    rect_pads: InstanceBatch<PadRecord>,
    circle_pads: InstanceBatch<PadRecord>,
    segments: InstanceBatch<SegmentInstance>,
    traces: IndexMap<String, TraceRecord>,
    /// Every id on the board, in insertion order
    order: IndexMap<String, ComponentKind>,
    spatial: Option<RTree<Footprint>>,
    disposed: bool,
}

fn check_size(id: &str, kind: PadKind, size: [f32; 2]) -> Result<[f32; 2], BoardError> {
    let size = match kind {
        PadKind::Rectangle => size,
        PadKind::Circle => [size[0], size[0]],
    };
    if size.iter().all(|v| v.is_finite() && *v > 0.0) {
        Ok(size)
    } else {
        Err(BoardError::InvalidSize { id: id.to_string(), size })
    }
}

fn check_position(id: &str, position: Point) -> Result<Point, BoardError> {
    if position.is_finite() {
        Ok(position)
    } else {
        Err(BoardError::InvalidPosition { id: id.to_string(), x: position.x, y: position.y })
    }
}

fn check_rotation(id: &str, rotation: f32) -> Result<f32, BoardError> {
    if rotation.is_finite() {
        Ok(rotation)
    } else {
        Err(BoardError::InvalidRotation { id: id.to_string(), rotation })
    }
}

impl Board {
    pub fn new(config: &ViewerConfig) -> Self {
        let layers = LayerPlacement::new(config.board.thickness, config.layer_offset);
        let mut cache = GeometryCache::new(config.circle_segments);
        let mut materials = MaterialService::new();
        let threshold = config.parallel_rebuild_threshold;

        let rect_pads = InstanceBatch::new(
            RECT_PAD_BATCH,
            "rectangle_pads",
            cache.unit_rectangle(),
            materials.create("rectangle_pads", COPPER_COLOR),
            config.max_pads_per_kind,
            RemovalPolicy::DeadSlot,
        )
        .with_parallel_threshold(threshold);
        let circle_pads = InstanceBatch::new(
            CIRCLE_PAD_BATCH,
            "circle_pads",
            cache.unit_circle(),
            materials.create("circle_pads", COPPER_COLOR),
            config.max_pads_per_kind,
            RemovalPolicy::DeadSlot,
        )
        .with_parallel_threshold(threshold);
        let segments = InstanceBatch::new(
            TRACE_BATCH,
            "trace_segments",
            cache.unit_trace_quad(),
            materials.create("trace_segments", COPPER_COLOR),
            config.max_trace_segments,
            RemovalPolicy::Compact,
        )
        .with_parallel_threshold(threshold);

        Self {
            config: config.clone(),
            layers,
            cache,
            materials,
            rect_pads,
            circle_pads,
            segments,
            traces: IndexMap::new(),
            order: IndexMap::new(),
            spatial: None,
            disposed: false,
        }
    }

    pub fn config(&self) -> &ViewerConfig {
        &self.config
    }

    pub fn dims(&self) -> BoardDims {
        BoardDims {
            thickness: self.layers.thickness(),
            ..self.config.board
        }
    }

    pub fn layers(&self) -> &LayerPlacement {
        &self.layers
    }

    pub fn materials(&self) -> &MaterialService {
        &self.materials
    }

    pub fn pad_batch(&self, kind: PadKind) -> &InstanceBatch<PadRecord> {
        match kind {
            PadKind::Rectangle => &self.rect_pads,
            PadKind::Circle => &self.circle_pads,
        }
    }

    fn pad_batch_mut(&mut self, kind: PadKind) -> &mut InstanceBatch<PadRecord> {
        match kind {
            PadKind::Rectangle => &mut self.rect_pads,
            PadKind::Circle => &mut self.circle_pads,
        }
    }

    pub fn segment_batch(&self) -> &InstanceBatch<SegmentInstance> {
        &self.segments
    }

    /// Batches the pointer may hit, in registration order
    pub fn interactable_batches(&self) -> [BatchId; 3] {
        [RECT_PAD_BATCH, CIRCLE_PAD_BATCH, TRACE_BATCH]
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    fn ensure_new_id(&self, id: &str) -> Result<(), BoardError> {
        if self.order.contains_key(id) {
            return Err(BatchError::DuplicateId(id.to_string()).into());
        }
        Ok(())
    }

    fn touched(&mut self) {
        self.spatial = None;
    }

    // ---- pads ----

    /// Add a pad; returns its slot
    pub fn add_pad(&mut self, mut pad: PadRecord) -> Result<usize, BoardError> {
        self.ensure_new_id(&pad.id)?;
        pad.size = check_size(&pad.id, pad.kind, pad.size)?;
        pad.position = check_position(&pad.id, pad.position)?;
        pad.rotation = check_rotation(&pad.id, pad.rotation)?;
        let kind = pad.kind;
        let id = pad.id.clone();
        let layers = self.layers;
        let slot = self.pad_batch_mut(kind).add(pad, &layers)?;
        self.order.insert(id, kind.into());
        self.touched();
        Ok(slot)
    }

    pub fn pad(&self, id: &str) -> Option<&PadRecord> {
        match self.order.get(id)? {
            ComponentKind::Rectangle => self.rect_pads.by_id(id),
            ComponentKind::Circle => self.circle_pads.by_id(id),
            ComponentKind::Trace => None,
        }
    }

    fn pad_kind(&self, id: &str) -> Result<PadKind, BoardError> {
        match self.order.get(id) {
            Some(ComponentKind::Rectangle) => Ok(PadKind::Rectangle),
            Some(ComponentKind::Circle) => Ok(PadKind::Circle),
            _ => {
                log::debug!("no pad '{}' on the board", id);
                Err(BoardError::UnknownId(id.to_string()))
            }
        }
    }

    fn patch_pad<F>(&mut self, id: &str, patch: F) -> Result<(), BoardError>
    where
        F: FnOnce(&mut PadRecord),
    {
        let kind = self.pad_kind(id)?;
        let layers = self.layers;
        if !self.pad_batch_mut(kind).update(id, &layers, patch) {
            return Err(BoardError::UnknownId(id.to_string()));
        }
        self.touched();
        Ok(())
    }

    /// Move a pad, or translate a trace so its first point lands on `position`
    pub fn update_position(&mut self, id: &str, position: Point) -> Result<(), BoardError> {
        let position = check_position(id, position)?;
        match self.order.get(id).copied() {
            Some(ComponentKind::Trace) => {
                let Some(trace) = self.traces.get(id) else {
                    return Err(BoardError::UnknownId(id.to_string()));
                };
                let origin = trace.points[0];
                let (dx, dy) = (position.x - origin.x, position.y - origin.y);
                let moved = trace.points.iter().map(|p| Point::new(p.x + dx, p.y + dy)).collect();
                self.update_trace_path(id, moved)
            }
            _ => self.update_pad_position(id, position),
        }
    }

    pub fn update_pad_position(&mut self, id: &str, position: Point) -> Result<(), BoardError> {
        let position = check_position(id, position)?;
        self.patch_pad(id, |pad| pad.position = position)
    }

    pub fn update_pad_size(&mut self, id: &str, size: [f32; 2]) -> Result<(), BoardError> {
        let kind = self.pad_kind(id)?;
        let size = check_size(id, kind, size)?;
        self.patch_pad(id, |pad| pad.size = size)
    }

    pub fn update_pad_rotation(&mut self, id: &str, rotation: f32) -> Result<(), BoardError> {
        let rotation = check_rotation(id, rotation)?;
        self.patch_pad(id, |pad| pad.rotation = rotation)
    }

    // ---- traces ----

    fn segment_instances(trace: &TraceRecord) -> Vec<SegmentInstance> {
        segment_path(&trace.points, trace.width)
            .into_iter()
            .enumerate()
            .map(|(index, segment)| SegmentInstance {
                key: SegmentInstance::key_for(&trace.id, index),
                trace_id: trace.id.clone(),
                index,
                segment,
                layer: trace.layer,
            })
            .collect()
    }

    /// Room for `needed` segments once `freed` existing ones are gone
    fn ensure_segment_room(&self, needed: usize, freed: usize) -> Result<(), BoardError> {
        if needed > self.segments.remaining_capacity() + freed {
            log::warn!(
                "trace segments need {} slots, {} free (capacity {})",
                needed,
                self.segments.remaining_capacity() + freed,
                self.segments.capacity()
            );
            return Err(BatchError::CapacityExceeded {
                batch: self.segments.name().to_string(),
                capacity: self.segments.capacity(),
            }
            .into());
        }
        Ok(())
    }

    fn insert_segments(&mut self, trace: &TraceRecord) -> Result<(), BoardError> {
        let layers = self.layers;
        for instance in Self::segment_instances(trace) {
            self.segments.add(instance, &layers)?;
        }
        Ok(())
    }

    fn drop_segments(&mut self, trace: &TraceRecord) -> usize {
        let keys: Vec<String> = (0..trace.points.len().saturating_sub(1))
            .map(|i| SegmentInstance::key_for(&trace.id, i))
            .collect();
        let layers = self.layers;
        self.segments.remove_many(keys.iter().map(String::as_str), &layers)
    }

    pub fn add_trace(&mut self, trace: TraceRecord) -> Result<(), BoardError> {
        self.ensure_new_id(&trace.id)?;
        trace.validate().map_err(|reason| BoardError::InvalidTrace {
            id: trace.id.clone(),
            reason,
        })?;
        self.ensure_segment_room(trace.points.len() - 1, 0)?;
        self.insert_segments(&trace)?;
        self.order.insert(trace.id.clone(), ComponentKind::Trace);
        self.traces.insert(trace.id.clone(), trace);
        self.touched();
        Ok(())
    }

    pub fn trace(&self, id: &str) -> Option<&TraceRecord> {
        self.traces.get(id)
    }

    /// Replace a trace's path or width and re-segment it wholesale
    fn replace_trace(&mut self, id: &str, points: Vec<Point>, width: f32) -> Result<(), BoardError> {
        let Some(old) = self.traces.get(id).cloned() else {
            log::debug!("no trace '{}' on the board", id);
            return Err(BoardError::UnknownId(id.to_string()));
        };
        validate_path(&points, width).map_err(|reason| BoardError::InvalidTrace {
            id: id.to_string(),
            reason,
        })?;
        self.ensure_segment_room(points.len() - 1, old.points.len() - 1)?;

        let updated = TraceRecord { points, width, ..old.clone() };
        self.drop_segments(&old);
        self.insert_segments(&updated)?;
        self.traces.insert(id.to_string(), updated);
        self.touched();
        Ok(())
    }

    pub fn update_trace_path(&mut self, id: &str, points: Vec<Point>) -> Result<(), BoardError> {
        let width = self
            .traces
            .get(id)
            .map(|t| t.width)
            .ok_or_else(|| BoardError::UnknownId(id.to_string()))?;
        self.replace_trace(id, points, width)
    }

    pub fn update_trace_width(&mut self, id: &str, width: f32) -> Result<(), BoardError> {
        let points = self
            .traces
            .get(id)
            .map(|t| t.points.clone())
            .ok_or_else(|| BoardError::UnknownId(id.to_string()))?;
        self.replace_trace(id, points, width)
    }

    pub fn remove_trace(&mut self, id: &str) -> Result<(), BoardError> {
        let Some(trace) = self.traces.shift_remove(id) else {
            log::debug!("no trace '{}' to remove", id);
            return Err(BoardError::UnknownId(id.to_string()));
        };
        self.drop_segments(&trace);
        self.order.shift_remove(id);
        self.touched();
        Ok(())
    }

    /// Which trace a segment slot belongs to
    pub fn trace_at(&self, slot: usize) -> Option<&TraceRecord> {
        let key = self.segments.id_at(slot)?;
        let instance = self.segments.by_id(key)?;
        self.traces.get(&instance.trace_id)
    }

    // ---- shared surface ----

    /// Remove any record by id
    pub fn remove(&mut self, id: &str) -> Result<(), BoardError> {
        match self.order.get(id).copied() {
            Some(ComponentKind::Trace) => self.remove_trace(id),
            Some(kind) => {
                let pad_kind = if kind == ComponentKind::Circle { PadKind::Circle } else { PadKind::Rectangle };
                let layers = self.layers;
                if !self.pad_batch_mut(pad_kind).remove(id, &layers) {
                    return Err(BoardError::UnknownId(id.to_string()));
                }
                self.order.shift_remove(id);
                self.touched();
                Ok(())
            }
            None => {
                log::debug!("remove of unknown id '{}'", id);
                Err(BoardError::UnknownId(id.to_string()))
            }
        }
    }

    /// Drop every record. Meshes and materials stay alive for reuse.
    pub fn clear(&mut self) {
        self.rect_pads.clear();
        self.circle_pads.clear();
        self.segments.clear();
        self.traces.clear();
        self.order.clear();
        self.touched();
    }

    pub fn get(&self, id: &str) -> Option<Component<'_>> {
        match self.order.get(id)? {
            ComponentKind::Trace => self.traces.get(id).map(Component::Trace),
            _ => self.pad(id).map(Component::Pad),
        }
    }

    /// All records in insertion order
    pub fn all(&self) -> Vec<Component<'_>> {
        self.order.keys().filter_map(|id| self.get(id)).collect()
    }

    pub fn list(&self, filter: &ComponentFilter) -> Vec<Component<'_>> {
        self.order
            .keys()
            .filter_map(|id| self.get(id))
            .filter(|c| filter.matches(c))
            .collect()
    }

    pub fn area(&self, id: &str) -> Option<f32> {
        self.get(id).map(|c| c.area())
    }

    /// Rendered world depth of a record
    pub fn depth_of(&self, id: &str) -> Option<f32> {
        self.get(id).map(|c| self.layers.depth(c.layer()))
    }

    /// Change the substrate thickness and re-derive every live transform
    pub fn set_board_thickness(&mut self, thickness: f32) -> Result<(), BoardError> {
        self.layers.update_thickness(thickness)?;
        let layers = self.layers;
        self.rect_pads.rebuild_transforms(&layers);
        self.circle_pads.rebuild_transforms(&layers);
        self.segments.rebuild_transforms(&layers);
        if !self.layers.is_separated() {
            log::error!("copper layers not separated at thickness {}", thickness);
        }
        log::info!(
            "board thickness {} -> top {:.4}, bottom {:.4}",
            thickness,
            layers.top_z(),
            layers.bottom_z()
        );
        Ok(())
    }

    /// Ids whose footprint intersects the board-plane rectangle
    pub fn box_select(&mut self, min: Point, max: Point) -> Vec<String> {
        if self.spatial.is_none() {
            let entries: Vec<Footprint> = self
                .all()
                .iter()
                .map(|c| {
                    let kind = if c.kind().is_pad() { FootprintKind::Pad } else { FootprintKind::Trace };
                    Footprint::new(c.id(), kind, c.footprint())
                })
                .collect();
            self.spatial = Some(RTree::bulk_load(entries));
        }
        let Some(tree) = self.spatial.as_ref() else {
            return Vec::new();
        };
        let envelope = AABB::from_corners([min.x.min(max.x), min.y.min(max.y)], [min.x.max(max.x), min.y.max(max.y)]);
        let hits: std::collections::HashSet<&str> = tree
            .locate_in_envelope_intersecting(&envelope)
            .map(|f| f.id.as_str())
            .collect();
        // Insertion order, not tree order
        self.order.keys().filter(|id| hits.contains(id.as_str())).cloned().collect()
    }

    /// Buffers for the renderer. With `only_dirty`, clean batches are skipped
    /// and the returned batches are marked clean.
    pub fn uploads(&mut self, only_dirty: bool) -> Vec<InstanceUpload> {
        if only_dirty {
            [
                self.rect_pads.take_upload(),
                self.circle_pads.take_upload(),
                self.segments.take_upload(),
            ]
            .into_iter()
            .flatten()
            .collect()
        } else {
            [self.rect_pads.upload(), self.circle_pads.upload(), self.segments.upload()]
                .into_iter()
                .flatten()
                .collect()
        }
    }

    pub fn stats(&self) -> BoardStats {
        BoardStats {
            pads: self.rect_pads.len() + self.circle_pads.len(),
            traces: self.traces.len(),
            batches: vec![
                BatchStats::of(&self.rect_pads),
                BatchStats::of(&self.circle_pads),
                BatchStats::of(&self.segments),
            ],
            cache: self.cache.stats(),
            live_materials: self.materials.live_count(),
            thickness: self.layers.thickness(),
            top_z: self.layers.top_z(),
            bottom_z: self.layers.bottom_z(),
        }
    }

    /// Check the id <-> slot bijection of every batch and the trace bookkeeping
    pub fn check_invariants(&self) -> Result<(), String> {
        self.rect_pads.check_bijection()?;
        self.circle_pads.check_bijection()?;
        self.segments.check_bijection()?;
        let expected: usize = self.traces.values().map(|t| t.points.len() - 1).sum();
        if expected != self.segments.len() {
            return Err(format!("{} segments for traces needing {}", self.segments.len(), expected));
        }
        let records = self.rect_pads.len() + self.circle_pads.len() + self.traces.len();
        if records != self.order.len() {
            return Err(format!("{} records but {} ids", records, self.order.len()));
        }
        Ok(())
    }

    /// Release meshes and materials. Only the first call does anything.
    pub fn dispose(&mut self) -> bool {
        if self.disposed {
            return false;
        }
        self.rect_pads.dispose(&mut self.materials);
        self.circle_pads.dispose(&mut self.materials);
        self.segments.dispose(&mut self.materials);
        self.traces.clear();
        self.order.clear();
        self.spatial = None;
        let leftover = self.materials.dispose_all();
        if leftover > 0 {
            log::warn!("{} materials were still live at teardown", leftover);
        }
        self.cache.purge_unused();
        self.disposed = true;
        true
    }
}

impl InteractableSet for Board {
    fn interactable(&self, id: BatchId) -> Option<&dyn Interactable> {
        match id {
            RECT_PAD_BATCH => Some(&self.rect_pads),
            CIRCLE_PAD_BATCH => Some(&self.circle_pads),
            TRACE_BATCH => Some(&self.segments),
            _ => None,
        }
    }

    fn interactable_mut(&mut self, id: BatchId) -> Option<&mut dyn Interactable> {
        match id {
            RECT_PAD_BATCH => Some(&mut self.rect_pads),
            CIRCLE_PAD_BATCH => Some(&mut self.circle_pads),
            TRACE_BATCH => Some(&mut self.segments),
            _ => None,
        }
    }
}

impl ManipulationTarget for Board {
    fn commit_position(&mut self, target: InstanceRef, key: &str, position: Point) -> bool {
        let kind = match target.batch {
            RECT_PAD_BATCH => PadKind::Rectangle,
            CIRCLE_PAD_BATCH => PadKind::Circle,
            _ => return false,
        };
        if self.pad_batch(kind).slot_of(key) != Some(target.slot) {
            return false;
        }
        self.update_pad_position(key, position).is_ok()
    }
}
