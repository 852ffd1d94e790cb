//! Upload handlers: GetUploads (JSON and binary)

use crate::draw::geometry::encode_upload_frame;
use crate::lsp::protocol::{error_codes, ErrorResponse, TypedResponse};
use crate::lsp::state::ServerState;
use crate::lsp::util::parse_params;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde::Deserialize;
use std::time::Instant;

#[derive(Deserialize, Default, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
enum UploadFormat {
    #[default]
    Json,
    Binary,
}

fn error_line(id: Option<serde_json::Value>, code: i32, message: String) -> String {
    let response = TypedResponse::<()> {
        id,
        result: None,
        error: Some(ErrorResponse { code, message, data: None }),
    };
    serde_json::to_string(&response).unwrap_or_default()
}

/// Handle GetUploads request - instance buffers of dirty batches (or all with `all: true`).
///
/// The binary format answers with a `BINARY:<id>:<base64 frame>` line instead of JSON.
pub fn handle_get_uploads(
    state: &mut ServerState,
    id: Option<serde_json::Value>,
    params: Option<serde_json::Value>,
) -> String {
    #[derive(Deserialize, Default)]
    struct Params {
        #[serde(default)]
        format: UploadFormat,
        #[serde(default)]
        all: bool,
    }

    let p: Params = match params {
        None => Params::default(),
        Some(value) => match parse_params(id.clone(), Some(value), "{format?: \"json\" | \"binary\", all?}") {
            Ok(p) => p,
            Err(e) => return e.to_line(),
        },
    };

    let start = Instant::now();
    let uploads = state.scene.board_mut().uploads(!p.all);

    match p.format {
        UploadFormat::Json => {
            let response = TypedResponse {
                id,
                result: Some(&uploads),
                error: None,
            };
            match serde_json::to_string(&response) {
                Ok(line) => {
                    log::debug!("{} uploads serialized in {:.2?}", uploads.len(), start.elapsed());
                    line
                }
                Err(e) => error_line(None, error_codes::INTERNAL_ERROR, format!("Serialization failed: {}", e)),
            }
        }
        UploadFormat::Binary => {
            let frame = match encode_upload_frame(&uploads) {
                Ok(frame) => frame,
                Err(e) => return error_line(id, error_codes::INTERNAL_ERROR, format!("Encoding failed: {}", e)),
            };
            log::debug!(
                "{} uploads encoded in {:.2?}, size: {} bytes",
                uploads.len(),
                start.elapsed(),
                frame.len()
            );
            let id_str = match &id {
                Some(serde_json::Value::Number(n)) => n.to_string(),
                Some(serde_json::Value::String(s)) => s.clone(),
                _ => "null".to_string(),
            };
            format!("BINARY:{}:{}", id_str, BASE64.encode(&frame))
        }
    }
}
