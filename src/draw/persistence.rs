//! Export, import and backup
//!
//! Export writes one entry per record:
//! `{id, type, position: [x, y, z], size?, points?, width?, layer, rotation?}`.
//! `position` is the world-space position: board `x`, rendered depth, board `y`.
//! For traces it is the first path point.
//!
//! Import is validate-then-apply. Every component is checked, duplicates and
//! batch capacities included, and a complete replacement board is built off
//! to the side. Only when all of that succeeds is the scene's board swapped.
//! A failed import leaves the scene exactly as it was.

use crate::config::ViewerConfig;
use crate::draw::board::{Board, Component, ComponentKind};
use crate::draw::geometry::{validate_path, BoardDims, Layer, PadKind, PadRecord, Point, TraceRecord};
use crate::draw::scene::BoardScene;
use crate::error::{ImportError, ValidationIssue};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use std::path::Path;
use std::time::Instant;

pub const DOCUMENT_VERSION: &str = "1.0";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentDoc {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub position: [f32; 3],
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<[f32; 2]>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub points: Option<Vec<[f32; 2]>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<f32>,
    pub layer: Layer,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rotation: Option<f32>,
}

impl ComponentDoc {
    pub fn from_component(component: &Component<'_>, depth: f32) -> Self {
        match component {
            Component::Pad(pad) => ComponentDoc {
                id: pad.id.clone(),
                kind: ComponentKind::from(pad.kind).as_str().to_string(),
                position: [pad.position.x, depth, pad.position.y],
                size: Some(pad.size),
                points: None,
                width: None,
                layer: pad.layer,
                rotation: Some(pad.rotation),
            },
            Component::Trace(trace) => {
                let first = trace.points[0];
                ComponentDoc {
                    id: trace.id.clone(),
                    kind: ComponentKind::Trace.as_str().to_string(),
                    position: [first.x, depth, first.y],
                    size: None,
                    points: Some(trace.points.iter().map(|&p| p.into()).collect()),
                    width: Some(trace.width),
                    layer: trace.layer,
                    rotation: None,
                }
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoardDocument {
    pub version: String,
    pub board: BoardDims,
    pub components: Vec<ComponentDoc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    pub pads: usize,
    pub traces: usize,
}

/// A component that passed validation
#[derive(Debug, Clone)]
enum Staged {
    Pad(PadRecord),
    Trace(TraceRecord),
}

impl Staged {
    fn id(&self) -> &str {
        match self {
            Staged::Pad(p) => &p.id,
            Staged::Trace(t) => &t.id,
        }
    }
}

pub fn export_document(board: &Board) -> BoardDocument {
    let components = board
        .all()
        .iter()
        .map(|c| ComponentDoc::from_component(c, board.layers().depth(c.layer())))
        .collect();
    BoardDocument {
        version: DOCUMENT_VERSION.to_string(),
        board: board.dims(),
        components,
    }
}

pub fn export_json(board: &Board) -> serde_json::Result<String> {
    let start = Instant::now();
    let json = serde_json::to_string_pretty(&export_document(board))?;
    log::info!("exported {} components in {:.2?}", board.len(), start.elapsed());
    Ok(json)
}

// ---- validation ----

fn number(value: &Value) -> Option<f32> {
    value.as_f64().map(|v| v as f32).filter(|v| v.is_finite())
}

fn numbers<const N: usize>(value: Option<&Value>) -> Option<[f32; N]> {
    let items = value?.as_array()?;
    if items.len() != N {
        return None;
    }
    let mut out = [0.0; N];
    for (slot, item) in out.iter_mut().zip(items) {
        *slot = number(item)?;
    }
    Some(out)
}

fn validate_component(index: usize, value: &Value) -> Result<Staged, ValidationIssue> {
    let issue = |id: Option<&str>, reason: &str| ValidationIssue {
        index,
        id: id.map(str::to_string),
        reason: reason.to_string(),
    };

    let Some(obj) = value.as_object() else {
        return Err(issue(None, "component is not an object"));
    };
    let id = match obj.get("id").and_then(Value::as_str) {
        Some(id) if !id.is_empty() => id,
        _ => return Err(issue(None, "missing or empty id")),
    };
    let Some(type_name) = obj.get("type").and_then(Value::as_str) else {
        return Err(issue(Some(id), "missing type"));
    };
    let Some(kind) = ComponentKind::parse(type_name) else {
        return Err(issue(Some(id), &format!("unknown type '{}'", type_name)));
    };
    let Some(position) = numbers::<3>(obj.get("position")) else {
        return Err(issue(Some(id), "position must have exactly 3 numeric components"));
    };
    let Some(layer) = obj.get("layer").and_then(Value::as_str).and_then(Layer::parse) else {
        return Err(issue(Some(id), "layer must be 'top' or 'bottom'"));
    };

    match kind {
        ComponentKind::Rectangle | ComponentKind::Circle => {
            let Some(size) = numbers::<2>(obj.get("size")) else {
                return Err(issue(Some(id), "size must have exactly 2 numeric components"));
            };
            if size.iter().any(|v| *v <= 0.0) {
                return Err(issue(Some(id), "size must be positive"));
            }
            let rotation = match obj.get("rotation") {
                None | Some(Value::Null) => 0.0,
                Some(v) => match number(v) {
                    Some(r) => r,
                    None => return Err(issue(Some(id), "rotation must be numeric")),
                },
            };
            let pad_kind = if kind == ComponentKind::Circle { PadKind::Circle } else { PadKind::Rectangle };
            let pad = PadRecord::new(id, pad_kind, Point::new(position[0], position[2]), size, layer).with_rotation(rotation);
            Ok(Staged::Pad(pad))
        }
        ComponentKind::Trace => {
            let Some(raw_points) = obj.get("points").and_then(Value::as_array) else {
                return Err(issue(Some(id), "points missing"));
            };
            if raw_points.len() < 2 {
                return Err(issue(Some(id), "points needs at least 2 entries"));
            }
            let mut points = Vec::with_capacity(raw_points.len());
            for raw in raw_points {
                match numbers::<2>(Some(raw)) {
                    Some(p) => points.push(Point::from(p)),
                    None => return Err(issue(Some(id), "each point must be [x, y]")),
                }
            }
            let Some(width) = obj.get("width").and_then(number) else {
                return Err(issue(Some(id), "width missing"));
            };
            validate_path(&points, width).map_err(|reason| issue(Some(id), &reason))?;
            Ok(Staged::Trace(TraceRecord::new(id, points, width, layer)))
        }
    }
}

fn validate_board(value: Option<&Value>, fallback: BoardDims) -> Result<BoardDims, ValidationIssue> {
    let Some(value) = value else {
        return Ok(fallback);
    };
    let dims: BoardDims = serde_json::from_value(value.clone()).map_err(|e| ValidationIssue {
        index: 0,
        id: Some("board".to_string()),
        reason: e.to_string(),
    })?;
    if [dims.width, dims.height, dims.thickness].iter().all(|v| v.is_finite() && *v > 0.0) {
        Ok(dims)
    } else {
        Err(ValidationIssue {
            index: 0,
            id: Some("board".to_string()),
            reason: "board dimensions must be positive".to_string(),
        })
    }
}

/// Check a whole document and build the replacement board. Nothing is applied here.
pub fn build_board(document: &Value, config: &ViewerConfig) -> Result<Board, ImportError> {
    let Some(components) = document.get("components").and_then(Value::as_array) else {
        return Err(ImportError::Invalid(vec![ValidationIssue {
            index: 0,
            id: None,
            reason: "document has no components array".to_string(),
        }]));
    };

    let mut issues = Vec::new();
    let dims = match validate_board(document.get("board"), config.board) {
        Ok(dims) => dims,
        Err(issue) => {
            issues.push(issue);
            config.board
        }
    };

    let mut staged = Vec::with_capacity(components.len());
    let mut seen = HashSet::new();
    for (index, value) in components.iter().enumerate() {
        match validate_component(index, value) {
            Ok(component) => {
                if !seen.insert(component.id().to_string()) {
                    issues.push(ValidationIssue {
                        index,
                        id: Some(component.id().to_string()),
                        reason: "duplicate id".to_string(),
                    });
                } else {
                    staged.push((index, component));
                }
            }
            Err(issue) => issues.push(issue),
        }
    }
    if !issues.is_empty() {
        log::warn!("import rejected: {} malformed component(s)", issues.len());
        return Err(ImportError::Invalid(issues));
    }

    let rect = staged.iter().filter(|(_, c)| matches!(c, Staged::Pad(p) if p.kind == PadKind::Rectangle)).count();
    let circle = staged.iter().filter(|(_, c)| matches!(c, Staged::Pad(p) if p.kind == PadKind::Circle)).count();
    let segments: usize = staged
        .iter()
        .map(|(_, c)| match c {
            Staged::Trace(t) => t.points.len() - 1,
            Staged::Pad(_) => 0,
        })
        .sum();
    for (batch, needed, capacity) in [
        ("rectangle_pads", rect, config.max_pads_per_kind),
        ("circle_pads", circle, config.max_pads_per_kind),
        ("trace_segments", segments, config.max_trace_segments),
    ] {
        if needed > capacity {
            log::warn!("import rejected: '{}' needs {} of {}", batch, needed, capacity);
            return Err(ImportError::Capacity {
                batch: batch.to_string(),
                needed,
                capacity,
            });
        }
    }

    let board_config = ViewerConfig {
        board: dims,
        ..config.clone()
    };
    let mut board = Board::new(&board_config);
    for (index, component) in staged {
        let id = component.id().to_string();
        let result = match component {
            Staged::Pad(pad) => board.add_pad(pad).map(|_| ()),
            Staged::Trace(trace) => board.add_trace(trace),
        };
        if let Err(e) = result {
            board.dispose();
            return Err(ImportError::Invalid(vec![ValidationIssue {
                index,
                id: Some(id),
                reason: e.to_string(),
            }]));
        }
    }
    Ok(board)
}

fn apply(scene: &mut BoardScene, document: &Value) -> Result<ImportSummary, ImportError> {
    let config = scene.board().config().clone();
    let board = build_board(document, &config)?;
    let summary = ImportSummary {
        pads: board.stats().pads,
        traces: board.stats().traces,
    };
    scene.replace_board(board);
    Ok(summary)
}

pub fn import_json(scene: &mut BoardScene, json: &str) -> Result<ImportSummary, ImportError> {
    let start = Instant::now();
    let document: Value = serde_json::from_str(json)?;
    let summary = apply(scene, &document)?;
    log::info!(
        "imported {} pads and {} traces in {:.2?}",
        summary.pads,
        summary.traces,
        start.elapsed()
    );
    Ok(summary)
}

// ---- backup ----

/// Write a MessagePack snapshot of the export document
pub fn save_backup<P: AsRef<Path>>(board: &Board, path: P) -> Result<usize, ImportError> {
    let start = Instant::now();
    let bytes = rmp_serde::to_vec_named(&export_document(board))
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
    std::fs::write(&path, &bytes)?;
    log::info!(
        "backup of {} components ({} bytes) written to {} in {:.2?}",
        board.len(),
        bytes.len(),
        path.as_ref().display(),
        start.elapsed()
    );
    Ok(bytes.len())
}

/// Restore a snapshot written by `save_backup`, validating it like an import
pub fn load_backup<P: AsRef<Path>>(scene: &mut BoardScene, path: P) -> Result<ImportSummary, ImportError> {
    let start = Instant::now();
    let bytes = std::fs::read(&path)?;
    let document: BoardDocument = rmp_serde::from_slice(&bytes)?;
    let value = serde_json::to_value(&document)?;
    let summary = apply(scene, &value)?;
    log::info!(
        "backup {} restored ({} pads, {} traces) in {:.2?}",
        path.as_ref().display(),
        summary.pads,
        summary.traces,
        start.elapsed()
    );
    Ok(summary)
}
