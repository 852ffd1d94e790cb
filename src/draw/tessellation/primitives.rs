//! Primitive meshes shared by instance batches
//!
//! Meshes live in the local board plane (x, z) centred on the origin. Batches
//! use unit-sized meshes and scale them per instance; standalone meshes may be
//! built at their real dimensions.

use std::f32::consts::PI;

/// Analytic outline of a mesh, used for exact hit testing
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MeshShape {
    Rectangle { width: f32, height: f32 },
    Circle { diameter: f32 },
    /// Trace segment body: length along local x, width along local z
    TraceQuad { length: f32, width: f32 },
}

impl MeshShape {
    /// True if the local point `(x, z)` lies inside the outline
    pub fn contains(&self, x: f32, z: f32) -> bool {
        match *self {
            MeshShape::Rectangle { width, height } => x.abs() <= width / 2.0 && z.abs() <= height / 2.0,
            MeshShape::TraceQuad { length, width } => x.abs() <= length / 2.0 && z.abs() <= width / 2.0,
            MeshShape::Circle { diameter } => {
                let r = diameter / 2.0;
                x * x + z * z <= r * r
            }
        }
    }
}

/// Triangle mesh (x, z pairs + indices)
#[derive(Debug, Clone, PartialEq)]
pub struct Mesh {
    pub shape: MeshShape,
    pub vertices: Vec<f32>,
    pub indices: Vec<u32>,
}

impl Mesh {
    pub fn vertex_count(&self) -> usize {
        self.vertices.len() / 2
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }
}

/// Triangulate a closed outline using earcut
pub fn tessellate_outline(outline: &[(f32, f32)]) -> (Vec<f32>, Vec<u32>) {
    let mut vertices = Vec::with_capacity(outline.len() * 2);
    for &(x, z) in outline {
        vertices.push(x);
        vertices.push(z);
    }

    let indices = earcutr::earcut(&vertices, &[], 2).unwrap_or_default();
    let indices_u32: Vec<u32> = indices.into_iter().map(|i| i as u32).collect();

    (vertices, indices_u32)
}

/// Tessellate a rectangle
pub fn tessellate_rectangle(width: f32, height: f32) -> (Vec<f32>, Vec<u32>) {
    let hw = width / 2.0;
    let hh = height / 2.0;
    tessellate_outline(&[(-hw, -hh), (hw, -hh), (hw, hh), (-hw, hh)])
}

/// Tessellate a circle into a triangle fan
pub fn tessellate_circle(diameter: f32, segments: u32) -> (Vec<f32>, Vec<u32>) {
    let segments = segments.max(3);
    let radius = diameter / 2.0;
    let mut vertices = vec![0.0, 0.0]; // Center
    let mut indices = Vec::with_capacity(segments as usize * 3);

    for i in 0..segments {
        let angle = (i as f32 / segments as f32) * 2.0 * PI;
        vertices.push(angle.cos() * radius);
        vertices.push(angle.sin() * radius);
    }

    for i in 0..segments {
        indices.push(0);
        indices.push(i + 1);
        indices.push((i + 1) % segments + 1);
    }

    (vertices, indices)
}

/// Build the mesh for a shape
pub fn build_mesh(shape: MeshShape, circle_segments: u32) -> Mesh {
    let (vertices, indices) = match shape {
        MeshShape::Rectangle { width, height } => tessellate_rectangle(width, height),
        MeshShape::TraceQuad { length, width } => tessellate_rectangle(length, width),
        MeshShape::Circle { diameter } => tessellate_circle(diameter, circle_segments),
    };
    Mesh { shape, vertices, indices }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rectangle_is_two_triangles() {
        let mesh = build_mesh(MeshShape::Rectangle { width: 1.0, height: 1.0 }, 32);
        assert_eq!(mesh.vertex_count(), 4);
        assert_eq!(mesh.triangle_count(), 2);
    }

    #[test]
    fn test_circle_fan_closes() {
        let mesh = build_mesh(MeshShape::Circle { diameter: 1.0 }, 16);
        assert_eq!(mesh.vertex_count(), 17);
        assert_eq!(mesh.triangle_count(), 16);
        assert_eq!(mesh.indices[mesh.indices.len() - 1], 1);
    }

    #[test]
    fn test_shape_containment() {
        let circle = MeshShape::Circle { diameter: 1.0 };
        assert!(circle.contains(0.3, 0.3));
        assert!(!circle.contains(0.45, 0.45));

        let quad = MeshShape::TraceQuad { length: 1.0, width: 1.0 };
        assert!(quad.contains(0.5, -0.5));
        assert!(!quad.contains(0.51, 0.0));
    }
}
