// Request dispatch through the JSON-RPC surface
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use pcb_copper_view::draw::geometry::read_frame_headers;
use pcb_copper_view::lsp::{dispatch, error_codes, Request, ServerState};
use serde_json::{json, Value};

fn call(state: &mut ServerState, id: u64, method: &str, params: Value) -> Value {
    let request = Request {
        id: Some(json!(id)),
        method: method.to_string(),
        params: if params.is_null() { None } else { Some(params) },
    };
    let line = dispatch(state, request);
    serde_json::from_str(&line).expect("response is JSON")
}

fn camera() -> Value {
    json!({"eye": [0, 50, 0], "target": [0, 0, 0], "mode": "orthographic", "ortho_half_height": 1.0})
}

#[test]
fn test_mutation_and_query_flow() {
    let mut state = ServerState::default();
    let r = call(&mut state, 1, "AddPad", json!({
        "id": "P1", "kind": "rectangle", "position": [10, 10], "size": [2, 1], "layer": "top"
    }));
    assert_eq!(r["result"]["ok"], json!(true));

    let r = call(&mut state, 2, "AddTrace", json!({
        "id": "T1", "points": [[0, 0], [1, 0], [1, 1]], "width": 0.2, "layer": "bottom"
    }));
    assert_eq!(r["result"]["segments"], json!(2));

    let r = call(&mut state, 3, "GetRecord", json!({"id": "P1"}));
    assert_eq!(r["result"]["type"], json!("rectangle"));
    assert!((r["result"]["position"][1].as_f64().unwrap() - 0.81).abs() < 1e-5);

    let r = call(&mut state, 4, "ListRecords", json!({"kind": "trace"}));
    let list = r["result"].as_array().expect("array");
    assert_eq!(list.len(), 1);
    assert_eq!(list[0]["id"], json!("T1"));

    let r = call(&mut state, 5, "UpdateTraceWidth", json!({"id": "T1", "width": -1}));
    assert_eq!(r["result"]["ok"], json!(false));
    assert_eq!(r["result"]["reason"], json!("invalid_trace"));

    let r = call(&mut state, 6, "BoxSelect", json!({"min_x": 9, "min_y": 9, "max_x": 11, "max_y": 11}));
    assert_eq!(r["result"], json!(["P1"]));

    let r = call(&mut state, 7, "GetStats", Value::Null);
    assert_eq!(r["result"]["pads"], json!(1));
    assert_eq!(r["result"]["traces"], json!(1));
}

#[test]
fn test_pointer_flow() {
    let mut state = ServerState::default();
    call(&mut state, 1, "AddPad", json!({
        "id": "A", "kind": "circle", "position": [0, 0], "size": [0.5, 0.5], "layer": "top"
    }));

    let r = call(&mut state, 2, "PointerMove", json!({"x": 0.0, "y": 0.0, "camera": camera()}));
    assert_eq!(r["result"]["hit"]["id"], json!("A"));
    assert_eq!(r["result"]["cursor"], json!("pointer"));

    call(&mut state, 3, "PointerDown", json!({"x": 0.0, "y": 0.0, "camera": camera()}));
    let r = call(&mut state, 4, "PointerDrag", json!({"x": 0.25, "y": 0.0, "camera": camera()}));
    assert_eq!(r["result"]["outcome"], json!("moved"));
    let r = call(&mut state, 5, "PointerUp", Value::Null);
    assert!((r["result"]["position"][0].as_f64().unwrap() - 0.25).abs() < 1e-4);

    let r = call(&mut state, 6, "GetSelection", Value::Null);
    assert_eq!(r["result"]["selected"], json!("A"));
    assert_eq!(r["result"]["handle"]["id"], json!("A"));
}

#[test]
fn test_import_errors_carry_issues() {
    let mut state = ServerState::default();
    let doc = json!({"components": [
        {"id": "T", "type": "trace", "position": [0, 0, 0], "points": [[0, 0], [1, 1]], "layer": "top"}
    ]});
    let r = call(&mut state, 1, "Import", json!({"json": doc.to_string()}));
    assert_eq!(r["error"]["code"], json!(error_codes::IMPORT_INVALID));
    assert_eq!(r["error"]["data"]["issues"][0]["id"], json!("T"));

    let r = call(&mut state, 2, "Import", json!({}));
    assert_eq!(r["error"]["code"], json!(error_codes::INVALID_PARAMS));
}

#[test]
fn test_export_then_import() {
    let mut state = ServerState::default();
    call(&mut state, 1, "AddPad", json!({
        "id": "P", "kind": "rect", "position": [1, 2], "size": [1, 1], "layer": "bottom"
    }));
    let exported = call(&mut state, 2, "Export", Value::Null);
    let text = exported["result"].to_string();

    let mut fresh = ServerState::default();
    let r = call(&mut fresh, 3, "Import", json!({"json": text}));
    assert_eq!(r["result"]["pads"], json!(1));
    let r = call(&mut fresh, 4, "GetArea", json!({"id": "P"}));
    assert!((r["result"]["area"].as_f64().unwrap() - 1.0).abs() < 1e-6);
}

#[test]
fn test_binary_uploads_frame() {
    let mut state = ServerState::default();
    call(&mut state, 1, "AddPad", json!({
        "id": "P", "kind": "rectangle", "position": [0, 0], "size": [1, 1], "layer": "top"
    }));
    let line = dispatch(&mut state, Request {
        id: Some(json!(9)),
        method: "GetUploads".to_string(),
        params: Some(json!({"format": "binary"})),
    });
    let payload = line.strip_prefix("BINARY:9:").expect("binary line");
    let frame = BASE64.decode(payload).expect("valid base64");
    let headers = read_frame_headers(&frame).expect("valid frame");
    assert_eq!(headers.len(), 1);
    assert_eq!(headers[0].instance_count, 1);

    // Nothing changed since: no dirty batches
    let r = call(&mut state, 2, "GetUploads", Value::Null);
    assert_eq!(r["result"], json!([]));
}

#[test]
fn test_configure_rebuilds_scene() {
    let mut state = ServerState::default();
    call(&mut state, 1, "AddPad", json!({
        "id": "P", "kind": "rectangle", "position": [0, 0], "size": [1, 1], "layer": "top"
    }));
    let r = call(&mut state, 2, "Configure", json!({"max_pads_per_kind": 1}));
    assert_eq!(r["result"]["max_pads_per_kind"], json!(1));
    let r = call(&mut state, 3, "ListRecords", Value::Null);
    assert_eq!(r["result"], json!([]));

    let r = call(&mut state, 4, "Configure", json!({"layer_offset": 0}));
    assert_eq!(r["error"]["code"], json!(error_codes::INVALID_PARAMS));
}

#[test]
fn test_non_finite_pad_placement_is_soft_failure() {
    let mut state = ServerState::default();
    // 1e39 overflows f32 to infinity
    let r = call(&mut state, 1, "AddPad", json!({
        "id": "P", "kind": "rectangle", "position": [1e39, 0], "size": [1, 1], "layer": "top"
    }));
    assert_eq!(r["result"]["ok"], json!(false));
    assert_eq!(r["result"]["reason"], json!("invalid_position"));

    call(&mut state, 2, "AddPad", json!({
        "id": "P", "kind": "rectangle", "position": [1, 1], "size": [1, 1], "layer": "top"
    }));
    let r = call(&mut state, 3, "UpdatePadPosition", json!({"id": "P", "position": [0, -1e39]}));
    assert_eq!(r["result"]["ok"], json!(false));
    let r = call(&mut state, 4, "UpdatePadRotation", json!({"id": "P", "rotation": 1e39}));
    assert_eq!(r["result"]["reason"], json!("invalid_rotation"));
    let r = call(&mut state, 5, "UpdatePadRotation", json!({"id": "P", "rotation": 0.5}));
    assert_eq!(r["result"]["ok"], json!(true));

    // Whatever the surface accepted still exports and re-imports
    let exported = call(&mut state, 6, "Export", Value::Null);
    let mut fresh = ServerState::default();
    let r = call(&mut fresh, 7, "Import", json!({"json": exported["result"].to_string()}));
    assert_eq!(r["result"]["pads"], json!(1));
    let r = call(&mut fresh, 8, "GetRecord", json!({"id": "P"}));
    assert!((r["result"]["rotation"].as_f64().unwrap() - 0.5).abs() < 1e-6);
}
