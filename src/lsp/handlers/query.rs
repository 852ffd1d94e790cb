//! Query handlers: GetRecord, ListRecords, GetArea, GetStats, GetMemory

use crate::draw::board::{Component, ComponentFilter, ComponentKind};
use crate::draw::geometry::Layer;
use crate::draw::persistence::ComponentDoc;
use crate::lsp::protocol::{error_codes, Response};
use crate::lsp::state::ServerState;
use crate::lsp::util::{get_process_memory_bytes, parse_params, success_from};
use serde::Deserialize;
use serde_json::json;

fn describe(state: &ServerState, component: &Component<'_>) -> serde_json::Value {
    let board = state.scene.board();
    let doc = ComponentDoc::from_component(component, board.layers().depth(component.layer()));
    let mut value = serde_json::to_value(doc).unwrap_or(serde_json::Value::Null);
    if let Some(obj) = value.as_object_mut() {
        obj.insert("area".to_string(), json!(component.area()));
    }
    value
}

/// Handle GetRecord request - one record by id, or null
pub fn handle_get_record(
    state: &ServerState,
    id: Option<serde_json::Value>,
    params: Option<serde_json::Value>,
) -> Response {
    #[derive(Deserialize)]
    struct Params {
        id: String,
    }

    let p: Params = match parse_params(id.clone(), params, "{id}") {
        Ok(p) => p,
        Err(e) => return e,
    };

    match state.scene.board().get(&p.id) {
        Some(component) => Response::success(id, describe(state, &component)),
        None => Response::success(id, serde_json::Value::Null),
    }
}

/// Handle ListRecords request - all records in insertion order, optionally filtered
pub fn handle_list_records(
    state: &ServerState,
    id: Option<serde_json::Value>,
    params: Option<serde_json::Value>,
) -> Response {
    #[derive(Deserialize, Default)]
    struct Params {
        #[serde(default)]
        layer: Option<Layer>,
        #[serde(default)]
        kind: Option<String>,
    }

    let p: Params = match params {
        None => Params::default(),
        Some(value) => match parse_params(id.clone(), Some(value), "{layer?, kind?}") {
            Ok(p) => p,
            Err(e) => return e,
        },
    };

    let kind = match p.kind.as_deref() {
        None => None,
        Some(name) => match ComponentKind::parse(name) {
            Some(kind) => Some(kind),
            None => {
                return Response::error(id, error_codes::INVALID_PARAMS, format!("Unknown kind: {}", name));
            }
        },
    };

    let filter = ComponentFilter { layer: p.layer, kind };
    let records: Vec<serde_json::Value> = state
        .scene
        .board()
        .list(&filter)
        .iter()
        .map(|c| describe(state, c))
        .collect();
    Response::success(id, json!(records))
}

/// Handle GetArea request
pub fn handle_get_area(
    state: &ServerState,
    id: Option<serde_json::Value>,
    params: Option<serde_json::Value>,
) -> Response {
    #[derive(Deserialize)]
    struct Params {
        id: String,
    }

    let p: Params = match parse_params(id.clone(), params, "{id}") {
        Ok(p) => p,
        Err(e) => return e,
    };

    match state.scene.board().area(&p.id) {
        Some(area) => Response::success(id, json!({ "id": p.id, "area": area })),
        None => Response::success(id, json!({ "ok": false, "reason": "unknown_id" })),
    }
}

/// Handle GetStats request - batch counts, cache and layer depths
pub fn handle_get_stats(state: &ServerState, id: Option<serde_json::Value>) -> Response {
    let stats = state.scene.board().stats();
    success_from(id, &stats)
}

/// Handle GetMemory request - returns current process memory usage
pub fn handle_get_memory(id: Option<serde_json::Value>) -> Response {
    let memory_bytes = get_process_memory_bytes();
    let memory_mb = memory_bytes.map(|b| b as f64 / 1024.0 / 1024.0);
    Response::success(id, json!({
        "memory_bytes": memory_bytes,
        "memory_mb": memory_mb
    }))
}
