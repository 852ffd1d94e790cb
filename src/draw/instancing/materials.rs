//! Material service
//!
//! Materials are owned by an explicit service handed to whoever needs one.
//! Each material is released at most once; `dispose_all` tears down whatever
//! is still alive.

use indexmap::IndexMap;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct MaterialId(pub u32);

/// Shader parameters for one instance batch
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Material {
    pub id: MaterialId,
    pub name: String,
    pub base_color: [f32; 4],
    pub hover_color: [f32; 4],
    pub selected_color: [f32; 4],
}

pub const COPPER_COLOR: [f32; 4] = [0.85, 0.55, 0.25, 1.0];
pub const HOVER_COLOR: [f32; 4] = [1.0, 0.85, 0.35, 1.0];
pub const SELECTED_COLOR: [f32; 4] = [0.3, 0.75, 1.0, 1.0];

#[derive(Default)]
pub struct MaterialService {
    next_id: u32,
    materials: IndexMap<MaterialId, Material>,
    released: u64,
}

impl MaterialService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(&mut self, name: &str, base_color: [f32; 4]) -> MaterialId {
        let id = MaterialId(self.next_id);
        self.next_id += 1;
        self.materials.insert(
            id,
            Material {
                id,
                name: name.to_string(),
                base_color,
                hover_color: HOVER_COLOR,
                selected_color: SELECTED_COLOR,
            },
        );
        log::debug!("material {} '{}' created", id.0, name);
        id
    }

    pub fn get(&self, id: MaterialId) -> Option<&Material> {
        self.materials.get(&id)
    }

    /// Release one material. Returns false if it was already released.
    pub fn release(&mut self, id: MaterialId) -> bool {
        match self.materials.shift_remove(&id) {
            Some(material) => {
                self.released += 1;
                log::debug!("material {} '{}' released", id.0, material.name);
                true
            }
            None => false,
        }
    }

    /// Release everything still alive, returning how many were released
    pub fn dispose_all(&mut self) -> usize {
        let ids: Vec<MaterialId> = self.materials.keys().copied().collect();
        ids.into_iter().filter(|id| self.release(*id)).count()
    }

    pub fn live_count(&self) -> usize {
        self.materials.len()
    }

    pub fn released_count(&self) -> u64 {
        self.released
    }
}
