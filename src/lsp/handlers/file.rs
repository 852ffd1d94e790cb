//! File operations: Export, Import, SaveBackup, LoadBackup, Close, Configure

use crate::config::ViewerConfig;
use crate::draw::persistence::{
    export_document, export_json, import_json, load_backup, save_backup, ImportSummary,
};
use crate::error::ImportError;
use crate::lsp::protocol::{error_codes, Response};
use crate::lsp::state::ServerState;
use crate::lsp::util::{get_process_memory_bytes, parse_params, success_from};
use serde::Deserialize;
use serde_json::json;
use std::time::Instant;

fn import_failure(id: Option<serde_json::Value>, err: ImportError) -> Response {
    log::warn!("import rejected: {}", err);
    match err {
        ImportError::Invalid(issues) => Response::error_with_data(
            id,
            error_codes::IMPORT_INVALID,
            format!("{} malformed component(s)", issues.len()),
            json!({ "issues": issues }),
        ),
        ImportError::Capacity { batch, needed, capacity } => Response::error_with_data(
            id,
            error_codes::CAPACITY_REACHED,
            format!("batch '{}' needs {} instances, capacity is {}", batch, needed, capacity),
            json!({ "batch": batch, "needed": needed, "capacity": capacity }),
        ),
        ImportError::Io(e) => Response::error(id, error_codes::IO_FAILED, e.to_string()),
        ImportError::Json(e) => Response::error(id, error_codes::PARSE_ERROR, e.to_string()),
        ImportError::Backup(e) => Response::error(id, error_codes::IMPORT_INVALID, e.to_string()),
    }
}

fn imported(id: Option<serde_json::Value>, summary: ImportSummary) -> Response {
    success_from(id, &summary)
}

/// Handle Export request - returns the document, or writes it when `path` is given
pub fn handle_export(
    state: &ServerState,
    id: Option<serde_json::Value>,
    params: Option<serde_json::Value>,
) -> Response {
    #[derive(Deserialize, Default)]
    struct Params {
        #[serde(default)]
        path: Option<String>,
    }

    let p: Params = match params {
        None => Params::default(),
        Some(value) => match parse_params(id.clone(), Some(value), "{path?}") {
            Ok(p) => p,
            Err(e) => return e,
        },
    };

    let board = state.scene.board();
    match p.path {
        None => success_from(id, &export_document(board)),
        Some(path) => {
            let text = match export_json(board) {
                Ok(text) => text,
                Err(e) => {
                    return Response::error(id, error_codes::INTERNAL_ERROR, format!("Serialization failed: {}", e));
                }
            };
            match std::fs::write(&path, text.as_bytes()) {
                Ok(()) => {
                    log::info!("exported {} components to {}", board.len(), path);
                    Response::success(id, json!({ "path": path, "components": board.len() }))
                }
                Err(e) => Response::error(id, error_codes::IO_FAILED, format!("Failed to write {}: {}", path, e)),
            }
        }
    }
}

/// Handle Import request - `json` text or a `path` to read it from
pub fn handle_import(
    state: &mut ServerState,
    id: Option<serde_json::Value>,
    params: Option<serde_json::Value>,
) -> Response {
    #[derive(Deserialize)]
    struct Params {
        #[serde(default)]
        json: Option<String>,
        #[serde(default)]
        path: Option<String>,
    }

    let p: Params = match parse_params(id.clone(), params, "{json} or {path}") {
        Ok(p) => p,
        Err(e) => return e,
    };

    let text = match (p.json, p.path) {
        (Some(text), _) => text,
        (None, Some(path)) => match std::fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) => {
                return Response::error(id, error_codes::IO_FAILED, format!("Failed to read {}: {}", path, e));
            }
        },
        (None, None) => {
            return Response::error(id, error_codes::INVALID_PARAMS, "Invalid params: expected {json} or {path}".to_string());
        }
    };

    match import_json(&mut state.scene, &text) {
        Ok(summary) => imported(id, summary),
        Err(e) => import_failure(id, e),
    }
}

#[derive(Deserialize)]
struct PathParams {
    path: String,
}

/// Handle SaveBackup request - MessagePack snapshot of the board
pub fn handle_save_backup(
    state: &ServerState,
    id: Option<serde_json::Value>,
    params: Option<serde_json::Value>,
) -> Response {
    let p: PathParams = match parse_params(id.clone(), params, "{path}") {
        Ok(p) => p,
        Err(e) => return e,
    };

    match save_backup(state.scene.board(), &p.path) {
        Ok(bytes) => Response::success(id, json!({ "path": p.path, "bytes": bytes })),
        Err(e) => import_failure(id, e),
    }
}

/// Handle LoadBackup request
pub fn handle_load_backup(
    state: &mut ServerState,
    id: Option<serde_json::Value>,
    params: Option<serde_json::Value>,
) -> Response {
    let p: PathParams = match parse_params(id.clone(), params, "{path}") {
        Ok(p) => p,
        Err(e) => return e,
    };

    match load_backup(&mut state.scene, &p.path) {
        Ok(summary) => imported(id, summary),
        Err(e) => import_failure(id, e),
    }
}

/// Handle Close request - releases every batch and starts an empty scene
pub fn handle_close(state: &mut ServerState, id: Option<serde_json::Value>) -> Response {
    let start = Instant::now();
    let memory_before = get_process_memory_bytes();
    let released = state.close();
    let memory_after = get_process_memory_bytes();
    log::info!("scene closed in {:.2?}", start.elapsed());

    Response::success(id, json!({
        "released": released,
        "memory_before_bytes": memory_before,
        "memory_after_bytes": memory_after,
    }))
}

/// Handle Configure request - validates a config object and rebuilds the scene with it
pub fn handle_configure(
    state: &mut ServerState,
    id: Option<serde_json::Value>,
    params: Option<serde_json::Value>,
) -> Response {
    let config: ViewerConfig = match parse_params(id.clone(), params, "ViewerConfig") {
        Ok(c) => c,
        Err(e) => return e,
    };

    if let Err(e) = config.validate() {
        return Response::error(id, error_codes::INVALID_PARAMS, e.to_string());
    }

    state.reconfigure(config);
    success_from(id, &state.config)
}

/// Handle GetConfig request
pub fn handle_get_config(state: &ServerState, id: Option<serde_json::Value>) -> Response {
    success_from(id, &state.config)
}
