//! Utility functions for the server: params, soft failures, memory

use crate::error::BoardError;
use crate::lsp::protocol::{error_codes, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;

#[cfg(windows)]
use std::mem::MaybeUninit;

/// Get current process memory usage on Windows (returns bytes)
#[cfg(windows)]
pub fn get_process_memory_bytes() -> Option<u64> {
    use winapi::um::processthreadsapi::GetCurrentProcess;
    use winapi::um::psapi::{GetProcessMemoryInfo, PROCESS_MEMORY_COUNTERS};

    unsafe {
        let mut pmc: MaybeUninit<PROCESS_MEMORY_COUNTERS> = MaybeUninit::uninit();
        let cb = std::mem::size_of::<PROCESS_MEMORY_COUNTERS>() as u32;

        if GetProcessMemoryInfo(GetCurrentProcess(), pmc.as_mut_ptr(), cb) != 0 {
            let pmc = pmc.assume_init();
            Some(pmc.WorkingSetSize as u64)
        } else {
            None
        }
    }
}

/// Resident set size from /proc on Linux
#[cfg(all(not(windows), target_os = "linux"))]
pub fn get_process_memory_bytes() -> Option<u64> {
    let status = std::fs::read_to_string("/proc/self/status").ok()?;
    let line = status.lines().find(|l| l.starts_with("VmRSS:"))?;
    let kb: u64 = line.split_whitespace().nth(1)?.parse().ok()?;
    Some(kb * 1024)
}

/// Fallback for other platforms
#[cfg(all(not(windows), not(target_os = "linux")))]
pub fn get_process_memory_bytes() -> Option<u64> {
    None
}

/// Deserialize request params, or build the INVALID_PARAMS response
pub fn parse_params<T: DeserializeOwned>(
    id: Option<serde_json::Value>,
    params: Option<serde_json::Value>,
    expected: &str,
) -> Result<T, Response> {
    let value = params.unwrap_or(serde_json::Value::Null);
    serde_json::from_value(value).map_err(|e| {
        Response::error(
            id,
            error_codes::INVALID_PARAMS,
            format!("Invalid params: expected {} ({})", expected, e),
        )
    })
}

/// Success response from any serializable value
pub fn success_from<T: Serialize>(id: Option<serde_json::Value>, value: &T) -> Response {
    match serde_json::to_value(value) {
        Ok(v) => Response::success(id, v),
        Err(e) => Response::error(id, error_codes::INTERNAL_ERROR, format!("Serialization failed: {}", e)),
    }
}

/// Report a mutation outcome. Recoverable board errors become `{ok: false, reason}`.
pub fn mutation_result(id: Option<serde_json::Value>, result: Result<serde_json::Value, BoardError>) -> Response {
    match result {
        Ok(mut extra) => {
            if let Some(obj) = extra.as_object_mut() {
                obj.insert("ok".to_string(), serde_json::Value::Bool(true));
                Response::success(id, extra)
            } else {
                Response::success(id, serde_json::json!({ "ok": true }))
            }
        }
        Err(e) => Response::success(
            id,
            serde_json::json!({
                "ok": false,
                "reason": e.reason(),
                "message": e.to_string(),
            }),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Deserialize)]
    struct Params {
        id: String,
    }

    #[test]
    fn test_parse_params_error_names_shape() {
        let err = parse_params::<Params>(None, None, "{id}").err().unwrap();
        let e = err.error.unwrap();
        assert_eq!(e.code, error_codes::INVALID_PARAMS);
        assert!(e.message.contains("{id}"));
        let ok: Params = parse_params(None, Some(serde_json::json!({"id": "P1"})), "{id}").unwrap_or_else(|_| panic!());
        assert_eq!(ok.id, "P1");
    }

    #[test]
    fn test_soft_failure_shape() {
        let response = mutation_result(None, Err(BoardError::UnknownId("X".to_string())));
        let result = response.result.unwrap();
        assert_eq!(result["ok"], false);
        assert_eq!(result["reason"], "unknown_id");
        assert!(response.error.is_none());
    }
}
