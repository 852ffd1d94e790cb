//! Tessellation module for copper primitives
//!
//! Converts pad and trace primitives into triangle meshes for GPU rendering.
//!
//! # Submodules
//! - `primitives` - Unit meshes for rectangles, circles and trace quads (earcut)
//! - `segments` - Trace path decomposition into oriented segments

mod primitives;
mod segments;

pub use primitives::{
    build_mesh,
    tessellate_circle,
    tessellate_outline,
    tessellate_rectangle,
    Mesh,
    MeshShape,
};

pub use segments::segment_path;
