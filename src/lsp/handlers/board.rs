//! Mutation handlers: AddPad, AddTrace, UpdatePadPosition, UpdatePadSize, UpdatePadRotation,
//! UpdateTracePath, UpdateTraceWidth, Remove, Clear, SetBoardThickness

use crate::draw::geometry::{Layer, PadKind, PadRecord, Point, TraceRecord};
use crate::lsp::protocol::Response;
use crate::lsp::state::ServerState;
use crate::lsp::util::{mutation_result, parse_params};
use serde::Deserialize;
use serde_json::json;

fn points_from(raw: Vec<[f32; 2]>) -> Vec<Point> {
    raw.into_iter().map(Point::from).collect()
}

/// Handle AddPad request
pub fn handle_add_pad(
    state: &mut ServerState,
    id: Option<serde_json::Value>,
    params: Option<serde_json::Value>,
) -> Response {
    #[derive(Deserialize)]
    struct Params {
        id: String,
        kind: PadKind,
        position: [f32; 2],
        size: [f32; 2],
        #[serde(default)]
        rotation: f32,
        layer: Layer,
    }

    let p: Params = match parse_params(id.clone(), params, "{id, kind, position: [x, y], size: [w, h], rotation?, layer}") {
        Ok(p) => p,
        Err(e) => return e,
    };

    let pad = PadRecord::new(p.id, p.kind, Point::from(p.position), p.size, p.layer).with_rotation(p.rotation);
    let result = state.scene.add_pad(pad).map(|slot| json!({ "slot": slot }));
    mutation_result(id, result)
}

/// Handle AddTrace request
pub fn handle_add_trace(
    state: &mut ServerState,
    id: Option<serde_json::Value>,
    params: Option<serde_json::Value>,
) -> Response {
    #[derive(Deserialize)]
    struct Params {
        id: String,
        points: Vec<[f32; 2]>,
        width: f32,
        layer: Layer,
    }

    let p: Params = match parse_params(id.clone(), params, "{id, points: [[x, y], ...], width, layer}") {
        Ok(p) => p,
        Err(e) => return e,
    };

    let segments = p.points.len().saturating_sub(1);
    let trace = TraceRecord::new(p.id, points_from(p.points), p.width, p.layer);
    let result = state.scene.add_trace(trace).map(|_| json!({ "segments": segments }));
    mutation_result(id, result)
}

/// Handle UpdatePadPosition request. Also accepts a trace id, translating the whole path.
pub fn handle_update_pad_position(
    state: &mut ServerState,
    id: Option<serde_json::Value>,
    params: Option<serde_json::Value>,
) -> Response {
    #[derive(Deserialize)]
    struct Params {
        id: String,
        position: [f32; 2],
    }

    let p: Params = match parse_params(id.clone(), params, "{id, position: [x, y]}") {
        Ok(p) => p,
        Err(e) => return e,
    };

    let result = state.scene.update_position(&p.id, Point::from(p.position)).map(|_| json!({}));
    mutation_result(id, result)
}

/// Handle UpdatePadRotation request - radians about the board normal
pub fn handle_update_pad_rotation(
    state: &mut ServerState,
    id: Option<serde_json::Value>,
    params: Option<serde_json::Value>,
) -> Response {
    #[derive(Deserialize)]
    struct Params {
        id: String,
        rotation: f32,
    }

    let p: Params = match parse_params(id.clone(), params, "{id, rotation}") {
        Ok(p) => p,
        Err(e) => return e,
    };

    let result = state.scene.update_pad_rotation(&p.id, p.rotation).map(|_| json!({}));
    mutation_result(id, result)
}

/// Handle UpdatePadSize request
pub fn handle_update_pad_size(
    state: &mut ServerState,
    id: Option<serde_json::Value>,
    params: Option<serde_json::Value>,
) -> Response {
    #[derive(Deserialize)]
    struct Params {
        id: String,
        size: [f32; 2],
    }

    let p: Params = match parse_params(id.clone(), params, "{id, size: [w, h]}") {
        Ok(p) => p,
        Err(e) => return e,
    };

    let result = state.scene.update_pad_size(&p.id, p.size).map(|_| json!({}));
    mutation_result(id, result)
}

/// Handle UpdateTracePath request
pub fn handle_update_trace_path(
    state: &mut ServerState,
    id: Option<serde_json::Value>,
    params: Option<serde_json::Value>,
) -> Response {
    #[derive(Deserialize)]
    struct Params {
        id: String,
        points: Vec<[f32; 2]>,
    }

    let p: Params = match parse_params(id.clone(), params, "{id, points: [[x, y], ...]}") {
        Ok(p) => p,
        Err(e) => return e,
    };

    let result = state.scene.update_trace_path(&p.id, points_from(p.points)).map(|_| json!({}));
    mutation_result(id, result)
}

/// Handle UpdateTraceWidth request
pub fn handle_update_trace_width(
    state: &mut ServerState,
    id: Option<serde_json::Value>,
    params: Option<serde_json::Value>,
) -> Response {
    #[derive(Deserialize)]
    struct Params {
        id: String,
        width: f32,
    }

    let p: Params = match parse_params(id.clone(), params, "{id, width}") {
        Ok(p) => p,
        Err(e) => return e,
    };

    let result = state.scene.update_trace_width(&p.id, p.width).map(|_| json!({}));
    mutation_result(id, result)
}

/// Handle Remove request - removes a pad or trace by id
pub fn handle_remove(
    state: &mut ServerState,
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

    let result = state.scene.remove(&p.id).map(|_| json!({}));
    mutation_result(id, result)
}

/// Handle Clear request - drops every record, keeping meshes and materials
pub fn handle_clear(state: &mut ServerState, id: Option<serde_json::Value>) -> Response {
    let removed = state.scene.board().len();
    state.scene.clear();
    log::info!("cleared {} components", removed);
    mutation_result(id, Ok(json!({ "removed": removed })))
}

/// Handle SetBoardThickness request - re-derives every copper depth
pub fn handle_set_board_thickness(
    state: &mut ServerState,
    id: Option<serde_json::Value>,
    params: Option<serde_json::Value>,
) -> Response {
    #[derive(Deserialize)]
    struct Params {
        thickness: f32,
    }

    let p: Params = match parse_params(id.clone(), params, "{thickness}") {
        Ok(p) => p,
        Err(e) => return e,
    };

    let result = state.scene.set_board_thickness(p.thickness).map(|_| {
        let layers = state.scene.board().layers();
        json!({
            "top_z": layers.top_z(),
            "bottom_z": layers.bottom_z(),
            "separated": layers.is_separated(),
        })
    });
    mutation_result(id, result)
}
