//! Geometry cache
//!
//! Primitive meshes are built once per distinct dimension and shared by
//! reference, so no instance ever allocates its own geometry.

use crate::draw::tessellation::{build_mesh, Mesh, MeshShape};
use std::collections::HashMap;
use std::sync::Arc;

/// Hashable cache key; dimensions are compared bit-for-bit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum MeshKey {
    Rectangle { width: u32, height: u32 },
    Circle { diameter: u32, segments: u32 },
    TraceQuad { length: u32, width: u32 },
}

impl MeshKey {
    fn new(shape: MeshShape, circle_segments: u32) -> Self {
        match shape {
            MeshShape::Rectangle { width, height } => MeshKey::Rectangle {
                width: width.to_bits(),
                height: height.to_bits(),
            },
            MeshShape::Circle { diameter } => MeshKey::Circle {
                diameter: diameter.to_bits(),
                segments: circle_segments,
            },
            MeshShape::TraceQuad { length, width } => MeshKey::TraceQuad {
                length: length.to_bits(),
                width: width.to_bits(),
            },
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct CacheStats {
    pub meshes: usize,
    pub hits: u64,
    pub misses: u64,
}

pub struct GeometryCache {
    circle_segments: u32,
    meshes: HashMap<MeshKey, Arc<Mesh>>,
    hits: u64,
    misses: u64,
}

impl GeometryCache {
    pub fn new(circle_segments: u32) -> Self {
        Self {
            circle_segments,
            meshes: HashMap::new(),
            hits: 0,
            misses: 0,
        }
    }

    /// Return the cached mesh for `shape`, building it on first use
    pub fn get_or_build(&mut self, shape: MeshShape) -> Arc<Mesh> {
        let key = MeshKey::new(shape, self.circle_segments);
        if let Some(mesh) = self.meshes.get(&key) {
            self.hits += 1;
            return Arc::clone(mesh);
        }
        self.misses += 1;
        let mesh = Arc::new(build_mesh(shape, self.circle_segments));
        self.meshes.insert(key, Arc::clone(&mesh));
        mesh
    }

    pub fn unit_rectangle(&mut self) -> Arc<Mesh> {
        self.get_or_build(MeshShape::Rectangle { width: 1.0, height: 1.0 })
    }

    pub fn unit_circle(&mut self) -> Arc<Mesh> {
        self.get_or_build(MeshShape::Circle { diameter: 1.0 })
    }

    pub fn unit_trace_quad(&mut self) -> Arc<Mesh> {
        self.get_or_build(MeshShape::TraceQuad { length: 1.0, width: 1.0 })
    }

    /// Drop meshes nobody else references; returns how many were freed
    pub fn purge_unused(&mut self) -> usize {
        let before = self.meshes.len();
        self.meshes.retain(|_, mesh| Arc::strong_count(mesh) > 1);
        before - self.meshes.len()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            meshes: self.meshes.len(),
            hits: self.hits,
            misses: self.misses,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_dimensions_share_mesh() {
        let mut cache = GeometryCache::new(16);
        let a = cache.get_or_build(MeshShape::Rectangle { width: 2.0, height: 1.0 });
        let b = cache.get_or_build(MeshShape::Rectangle { width: 2.0, height: 1.0 });
        let c = cache.get_or_build(MeshShape::Rectangle { width: 1.0, height: 2.0 });
        assert!(Arc::ptr_eq(&a, &b));
        assert!(!Arc::ptr_eq(&a, &c));
        assert_eq!(cache.stats(), CacheStats { meshes: 2, hits: 1, misses: 2 });
    }

    #[test]
    fn test_purge_keeps_referenced_meshes() {
        let mut cache = GeometryCache::new(16);
        let kept = cache.unit_circle();
        drop(cache.unit_rectangle());
        assert_eq!(cache.purge_unused(), 1);
        assert_eq!(cache.stats().meshes, 1);
        assert!(Arc::ptr_eq(&kept, &cache.unit_circle()));
    }
}
