//! Binary instance upload frames
//!
//! Zero-copy transfer of batch uploads to the webview host.
//!
//! Frame layout (all little-endian, every section 4-byte aligned so the host
//! can view it as Float32Array/Uint32Array without copying):
//! ```text
//! "PCBI"                 magic
//! batch_count: u32
//! per batch:
//!   batch_id: u32, material_id: u32
//!   name_len: u32, name bytes, zero padding to 4
//!   vertex_count: u32, index_count: u32, instance_count: u32
//!   vertex_data:    vertex_count * 2 f32
//!   index_data:     index_count u32
//!   transform_data: instance_count * 16 f32
//!   highlight_data: instance_count u32
//! ```

use super::upload::{InstanceUpload, FLOATS_PER_TRANSFORM};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{self, Cursor, Read};

pub const FRAME_MAGIC: &[u8; 4] = b"PCBI";

/// Encode a set of uploads into one frame
pub fn encode_upload_frame(uploads: &[InstanceUpload]) -> io::Result<Vec<u8>> {
    let mut buffer: Vec<u8> = Vec::new();
    buffer.extend_from_slice(FRAME_MAGIC);
    buffer.write_u32::<LittleEndian>(uploads.len() as u32)?;

    for upload in uploads {
        buffer.write_u32::<LittleEndian>(upload.batch_id)?;
        buffer.write_u32::<LittleEndian>(upload.material_id)?;

        let name = upload.batch_name.as_bytes();
        buffer.write_u32::<LittleEndian>(name.len() as u32)?;
        buffer.extend_from_slice(name);
        let padding = (4 - (name.len() % 4)) % 4;
        buffer.resize(buffer.len() + padding, 0);

        buffer.write_u32::<LittleEndian>(upload.mesh.vertex_count as u32)?;
        buffer.write_u32::<LittleEndian>(upload.mesh.index_count as u32)?;
        buffer.write_u32::<LittleEndian>(upload.instance_count as u32)?;

        for &f in &upload.mesh.vertex_data {
            buffer.write_f32::<LittleEndian>(f)?;
        }
        for &i in &upload.mesh.index_data {
            buffer.write_u32::<LittleEndian>(i)?;
        }
        for &f in &upload.transform_data {
            buffer.write_f32::<LittleEndian>(f)?;
        }
        for &h in &upload.highlight_data {
            buffer.write_u32::<LittleEndian>(h)?;
        }
    }

    Ok(buffer)
}

/// Header-level view of one batch in a frame
#[derive(Debug, Clone, PartialEq)]
pub struct FrameBatchHeader {
    pub batch_id: u32,
    pub material_id: u32,
    pub name: String,
    pub vertex_count: u32,
    pub index_count: u32,
    pub instance_count: u32,
}

/// Walk a frame and return its batch headers, skipping the payloads
pub fn read_frame_headers(bytes: &[u8]) -> io::Result<Vec<FrameBatchHeader>> {
    let mut cursor = Cursor::new(bytes);
    let mut magic = [0u8; 4];
    cursor.read_exact(&mut magic)?;
    if &magic != FRAME_MAGIC {
        return Err(io::Error::new(io::ErrorKind::InvalidData, "bad frame magic"));
    }

    let count = cursor.read_u32::<LittleEndian>()?;
    let mut headers = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let batch_id = cursor.read_u32::<LittleEndian>()?;
        let material_id = cursor.read_u32::<LittleEndian>()?;
        let name_len = cursor.read_u32::<LittleEndian>()? as usize;
        let mut name = vec![0u8; name_len];
        cursor.read_exact(&mut name)?;
        let padding = ((4 - (name_len % 4)) % 4) as u64;
        cursor.set_position(cursor.position() + padding);

        let vertex_count = cursor.read_u32::<LittleEndian>()?;
        let index_count = cursor.read_u32::<LittleEndian>()?;
        let instance_count = cursor.read_u32::<LittleEndian>()?;

        let payload_words = vertex_count as u64 * 2
            + index_count as u64
            + instance_count as u64 * (FLOATS_PER_TRANSFORM as u64 + 1);
        let end = cursor.position() + payload_words * 4;
        if end > bytes.len() as u64 {
            return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "truncated batch payload"));
        }
        cursor.set_position(end);

        headers.push(FrameBatchHeader {
            batch_id,
            material_id,
            name: String::from_utf8_lossy(&name).into_owned(),
            vertex_count,
            index_count,
            instance_count,
        });
    }
    Ok(headers)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::draw::geometry::upload::MeshUpload;

    fn upload(name: &str, instances: usize) -> InstanceUpload {
        InstanceUpload {
            batch_id: 7,
            batch_name: name.to_string(),
            material_id: 2,
            mesh: MeshUpload {
                vertex_data: vec![0.0; 8],
                vertex_count: 4,
                index_data: vec![0, 1, 2, 0, 2, 3],
                index_count: 6,
            },
            instance_count: instances,
            transform_data: vec![0.0; instances * FLOATS_PER_TRANSFORM],
            highlight_data: vec![0; instances],
        }
    }

    #[test]
    fn test_frame_is_aligned_and_readable() {
        let frame = encode_upload_frame(&[upload("trace", 3), upload("pads-circle", 1)]).unwrap();
        assert_eq!(frame.len() % 4, 0);

        let headers = read_frame_headers(&frame).unwrap();
        assert_eq!(headers.len(), 2);
        assert_eq!(headers[0].name, "trace");
        assert_eq!(headers[0].instance_count, 3);
        assert_eq!(headers[1].name, "pads-circle");
        assert_eq!(headers[1].index_count, 6);
    }

    #[test]
    fn test_truncated_frame_is_rejected() {
        let frame = encode_upload_frame(&[upload("pads", 2)]).unwrap();
        assert!(read_frame_headers(&frame[..frame.len() - 4]).is_err());
        assert!(read_frame_headers(b"NOPE\0\0\0\0").is_err());
    }
}
