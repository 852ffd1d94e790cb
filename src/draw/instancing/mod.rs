//! Instancing: shared meshes, materials, layer depths and instance batches
//!
//! # Submodules
//! - `cache` - Geometry cache keyed by primitive dimensions
//! - `materials` - Caller-owned material service
//! - `layers` - Copper layer depth placement
//! - `batch` - Instance batches with id <-> slot bookkeeping

mod batch;
mod cache;
mod layers;
mod materials;

pub use batch::{
    dead_transform,
    instance_matrix,
    BatchId,
    InstanceBatch,
    InstanceRecord,
    RemovalPolicy,
    SlotPlacement,
    DEAD_SLOT_DEPTH,
};

pub use cache::{CacheStats, GeometryCache};
pub use layers::LayerPlacement;
pub use materials::{Material, MaterialId, MaterialService, COPPER_COLOR, HOVER_COLOR, SELECTED_COLOR};
