//! JSON-RPC protocol types for the copper view server

use serde::{Deserialize, Serialize};

/// JSON-RPC Request format
#[derive(Debug, Deserialize)]
pub struct Request {
    pub id: Option<serde_json::Value>,
    pub method: String,
    pub params: Option<serde_json::Value>,
}

/// JSON-RPC Response format
#[derive(Debug, Serialize)]
pub struct Response {
    pub id: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorResponse>,
}

/// JSON-RPC Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

/// Generic typed response for handlers that return structured data
#[derive(Debug, Serialize)]
pub struct TypedResponse<T: Serialize> {
    pub id: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorResponse>,
}

impl Response {
    /// Create a success response with a JSON value
    pub fn success(id: Option<serde_json::Value>, result: serde_json::Value) -> Self {
        Response {
            id,
            result: Some(result),
            error: None,
        }
    }

    /// Create an error response
    pub fn error(id: Option<serde_json::Value>, code: i32, message: String) -> Self {
        Response {
            id,
            result: None,
            error: Some(ErrorResponse { code, message, data: None }),
        }
    }

    /// Create an error response carrying structured detail
    pub fn error_with_data(id: Option<serde_json::Value>, code: i32, message: String, data: serde_json::Value) -> Self {
        Response {
            id,
            result: None,
            error: Some(ErrorResponse {
                code,
                message,
                data: Some(data),
            }),
        }
    }

    /// Serialize to one output line
    pub fn to_line(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|e| {
            log::error!("failed to serialize response: {}", e);
            format!(
                r#"{{"id":null,"error":{{"code":{},"message":"response serialization failed"}}}}"#,
                error_codes::INTERNAL_ERROR
            )
        })
    }
}

/// Standard JSON-RPC error codes
pub mod error_codes {
    pub const PARSE_ERROR: i32 = -32700;
    pub const INVALID_REQUEST: i32 = -32600;
    pub const METHOD_NOT_FOUND: i32 = -32601;
    pub const INVALID_PARAMS: i32 = -32602;
    pub const INTERNAL_ERROR: i32 = -32603;

    // Custom error codes
    pub const CAPACITY_REACHED: i32 = 2;
    pub const UNKNOWN_ID: i32 = 3;
    pub const IMPORT_INVALID: i32 = 4;
    pub const INVARIANT_VIOLATION: i32 = 5;
    pub const IO_FAILED: i32 = 6;
}
