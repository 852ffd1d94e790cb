//! Viewer configuration
//!
//! Defaults, overridden by an optional JSON file, overridden by command-line
//! flags in the server binary.

use crate::draw::geometry::BoardDims;
use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    pub board: BoardDims,
    /// Depth offset between a copper layer and the substrate surface
    pub layer_offset: f32,
    /// Capacity of each pad batch (one batch per pad kind)
    pub max_pads_per_kind: usize,
    pub max_trace_segments: usize,
    pub circle_segments: u32,
    /// Live-instance count above which transform rebuilds run in parallel
    pub parallel_rebuild_threshold: usize,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            board: BoardDims::default(),
            layer_offset: 0.01,
            max_pads_per_kind: 1000,
            max_trace_segments: 4000,
            circle_segments: 32,
            parallel_rebuild_threshold: 2048,
        }
    }
}

impl ViewerConfig {
    pub fn from_json_str(json: &str) -> anyhow::Result<Self> {
        let config: ViewerConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(&path)
            .map_err(|e| anyhow::anyhow!("Failed to read config {}: {}", path.as_ref().display(), e))?;
        Self::from_json_str(&text)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive_f32 = [
            ("board.width", self.board.width),
            ("board.height", self.board.height),
            ("board.thickness", self.board.thickness),
            ("layer_offset", self.layer_offset),
        ];
        for (field, value) in positive_f32 {
            if !(value > 0.0) || !value.is_finite() {
                return Err(ConfigError::NotPositive { field, value: value as f64 });
            }
        }
        let positive_count = [
            ("max_pads_per_kind", self.max_pads_per_kind),
            ("max_trace_segments", self.max_trace_segments),
            ("circle_segments", self.circle_segments as usize),
        ];
        for (field, value) in positive_count {
            if value == 0 {
                return Err(ConfigError::NotPositive { field, value: 0.0 });
            }
        }
        Ok(())
    }
}
