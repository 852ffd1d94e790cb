//! Copper layer core: geometry, instancing, interaction, board model and persistence
//!
//! # Submodules
//! - `geometry` - Record types, uploads and spatial footprints
//! - `tessellation` - Primitive meshes and trace segmentation
//! - `instancing` - Instance batches, geometry cache, materials, layer placement
//! - `interaction` - Picking, hover/selection and the manipulation handle
//! - `board` - Pads and traces with the query / mutation surface
//! - `scene` - Board plus pointer interaction
//! - `persistence` - JSON export / import and MessagePack backup

pub mod board;
pub mod geometry;
pub mod instancing;
pub mod interaction;
pub mod persistence;
pub mod scene;
pub mod tessellation;
