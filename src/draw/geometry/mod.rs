//! Geometry module for the copper layer
//!
//! # Submodules
//! - `types` - Logical records (pads, traces, segments) and board dimensions
//! - `spatial` - R-tree footprints for box selection
//! - `upload` - Instance buffer uploads for the GPU host
//! - `binary` - Binary upload frames for zero-copy transfer

mod types;
mod spatial;
mod upload;
mod binary;

pub use types::{
    validate_path,
    BoardDims,
    Layer,
    PadKind,
    PadRecord,
    Point,
    SegmentRecord,
    TraceRecord,
    MIN_SEGMENT_LENGTH,
};

pub use spatial::{Footprint, FootprintKind};

pub use upload::{
    serialize_f32_vec_base64,
    serialize_u32_vec_base64,
    InstanceUpload,
    MeshUpload,
    FLOATS_PER_TRANSFORM,
    HIGHLIGHT_HOVERED,
    HIGHLIGHT_SELECTED,
};

pub use binary::{encode_upload_frame, read_frame_headers, FrameBatchHeader, FRAME_MAGIC};
