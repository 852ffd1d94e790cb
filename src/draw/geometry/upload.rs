//! Instance buffer uploads for the GPU host
//!
//! A batch hands its transform and highlight buffers to the renderer only when
//! they changed since the last upload. Arrays travel as base64 strings so the
//! JSON stays compact for tens of thousands of instances.

use base64::{engine::general_purpose, Engine as _};
use serde::{Serialize, Serializer};

/// Floats per instance transform (column-major 4x4)
pub const FLOATS_PER_TRANSFORM: usize = 16;

/// Highlight flag bits, one `u32` per instance
pub const HIGHLIGHT_HOVERED: u32 = 1;
pub const HIGHLIGHT_SELECTED: u32 = 1 << 1;

fn f32_bytes(data: &[f32]) -> Vec<u8> {
    data.iter().flat_map(|f| f.to_le_bytes()).collect()
}

fn u32_bytes(data: &[u32]) -> Vec<u8> {
    data.iter().flat_map(|v| v.to_le_bytes()).collect()
}

/// Serialize Vec<f32> as base64-encoded string
pub fn serialize_f32_vec_base64<S>(data: &Vec<f32>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&general_purpose::STANDARD.encode(f32_bytes(data)))
}

/// Serialize Vec<u32> as base64-encoded string
pub fn serialize_u32_vec_base64<S>(data: &Vec<u32>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&general_purpose::STANDARD.encode(u32_bytes(data)))
}

/// Mesh shared by every instance of a batch, in board-plane units
#[derive(Serialize, Clone, Debug)]
pub struct MeshUpload {
    /// Base64-encoded Float32 vertex data (x, z, x, z, ...)
    #[serde(rename = "vertexData", serialize_with = "serialize_f32_vec_base64")]
    pub vertex_data: Vec<f32>,

    #[serde(rename = "vertexCount")]
    pub vertex_count: usize,

    /// Base64-encoded Uint32 indices
    #[serde(rename = "indexData", serialize_with = "serialize_u32_vec_base64")]
    pub index_data: Vec<u32>,

    #[serde(rename = "indexCount")]
    pub index_count: usize,
}

/// Everything the renderer needs to redraw one batch
#[derive(Serialize, Clone, Debug)]
pub struct InstanceUpload {
    #[serde(rename = "batchId")]
    pub batch_id: u32,

    #[serde(rename = "batchName")]
    pub batch_name: String,

    #[serde(rename = "materialId")]
    pub material_id: u32,

    pub mesh: MeshUpload,

    /// Number of slots to draw (dead slots included, they are collapsed off-screen)
    #[serde(rename = "instanceCount")]
    pub instance_count: usize,

    /// Base64-encoded Float32 transforms, 16 per instance
    #[serde(rename = "transformData", serialize_with = "serialize_f32_vec_base64")]
    pub transform_data: Vec<f32>,

    /// Base64-encoded Uint32 highlight flags, 1 per instance
    #[serde(rename = "highlightData", serialize_with = "serialize_u32_vec_base64")]
    pub highlight_data: Vec<u32>,
}
