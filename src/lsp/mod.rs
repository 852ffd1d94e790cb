//! Line-delimited JSON-RPC surface over the copper view
//!
//! One request per stdin line, one response per stdout line. Binary uploads
//! answer with a `BINARY:<id>:<base64>` line instead of JSON.
//!
//! # Module Structure
//! - `protocol` - JSON-RPC request/response types
//! - `state` - Server state management
//! - `util` - Params parsing, soft-failure responses, memory
//! - `handlers` - Request handlers organized by functionality

pub mod handlers;
pub mod protocol;
pub mod state;
pub mod util;

// Re-export key types for convenience
pub use protocol::{error_codes, ErrorResponse, Request, Response, TypedResponse};
pub use state::ServerState;

use handlers::*;

/// Route one request to its handler and render the response line
pub fn dispatch(state: &mut ServerState, request: Request) -> String {
    let Request { id, method, params } = request;
    let response = match method.as_str() {
        // mutations
        "AddPad" => handle_add_pad(state, id, params),
        "AddTrace" => handle_add_trace(state, id, params),
        "UpdatePadPosition" => handle_update_pad_position(state, id, params),
        "UpdatePadSize" => handle_update_pad_size(state, id, params),
        "UpdatePadRotation" => handle_update_pad_rotation(state, id, params),
        "UpdateTracePath" => handle_update_trace_path(state, id, params),
        "UpdateTraceWidth" => handle_update_trace_width(state, id, params),
        "Remove" => handle_remove(state, id, params),
        "Clear" => handle_clear(state, id),
        "SetBoardThickness" => handle_set_board_thickness(state, id, params),
        // queries
        "GetRecord" => handle_get_record(state, id, params),
        "ListRecords" => handle_list_records(state, id, params),
        "GetArea" => handle_get_area(state, id, params),
        "GetStats" => handle_get_stats(state, id),
        "GetMemory" => handle_get_memory(id),
        "BoxSelect" => handle_box_select(state, id, params),
        // pointer
        "PointerMove" => handle_pointer_move(state, id, params),
        "PointerDown" => handle_pointer_down(state, id, params),
        "PointerDrag" => handle_pointer_drag(state, id, params),
        "PointerUp" => handle_pointer_up(state, id),
        "GetSelection" => handle_get_selection(state, id),
        // rendering
        "GetUploads" => return handle_get_uploads(state, id, params),
        // files
        "Export" => handle_export(state, id, params),
        "Import" => handle_import(state, id, params),
        "SaveBackup" => handle_save_backup(state, id, params),
        "LoadBackup" => handle_load_backup(state, id, params),
        "Close" => handle_close(state, id),
        "Configure" => handle_configure(state, id, params),
        "GetConfig" => handle_get_config(state, id),
        _ => {
            log::warn!("unknown method: {}", method);
            Response::error(id, error_codes::METHOD_NOT_FOUND, format!("Method not found: {}", method))
        }
    };
    response.to_line()
}
