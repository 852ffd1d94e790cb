//! Pointer handlers: PointerMove, PointerDown, PointerDrag, PointerUp, GetSelection

use crate::draw::interaction::{Camera, CameraMode, HandleAxis};
use crate::error::InteractionError;
use crate::lsp::protocol::{error_codes, Response};
use crate::lsp::state::ServerState;
use crate::lsp::util::{parse_params, success_from};
use glam::{Vec2, Vec3};
use serde::Deserialize;
use serde_json::json;

fn default_fovy() -> f32 {
    45.0
}

fn default_aspect() -> f32 {
    1.0
}

/// Camera as sent by the host with every pointer event
#[derive(Debug, Deserialize)]
pub struct CameraParams {
    pub eye: [f32; 3],
    pub target: [f32; 3],
    #[serde(default = "default_fovy")]
    pub fovy_degrees: f32,
    #[serde(default = "default_aspect")]
    pub aspect: f32,
    #[serde(default)]
    pub mode: CameraMode,
    /// Half height of the orthographic view volume
    #[serde(default)]
    pub ortho_half_height: Option<f32>,
}

impl CameraParams {
    pub fn camera(&self) -> Camera {
        let mut camera = Camera::look_at(
            Vec3::from(self.eye),
            Vec3::from(self.target),
            self.fovy_degrees.to_radians(),
            self.aspect,
            self.mode,
        );
        if let Some(half) = self.ortho_half_height.filter(|h| *h > 0.0) {
            camera.ortho_half_h = half;
        }
        camera
    }
}

#[derive(Deserialize)]
struct PointerParams {
    x: f32,
    y: f32,
    camera: CameraParams,
    #[serde(default)]
    axis: HandleAxis,
}

const POINTER_SHAPE: &str = "{x, y, camera: {eye, target, fovy_degrees?, aspect?, mode?}, axis?}";

fn invariant_violation(id: Option<serde_json::Value>, e: InteractionError) -> Response {
    Response::error(id, error_codes::INVARIANT_VIOLATION, e.to_string())
}

/// Handle PointerMove request - updates hover
pub fn handle_pointer_move(
    state: &mut ServerState,
    id: Option<serde_json::Value>,
    params: Option<serde_json::Value>,
) -> Response {
    let p: PointerParams = match parse_params(id.clone(), params, POINTER_SHAPE) {
        Ok(p) => p,
        Err(e) => return e,
    };

    match state.scene.pointer_move(Vec2::new(p.x, p.y), &p.camera.camera()) {
        Ok(report) => success_from(id, &report),
        Err(e) => invariant_violation(id, e),
    }
}

/// Handle PointerDown request - selects and grabs
pub fn handle_pointer_down(
    state: &mut ServerState,
    id: Option<serde_json::Value>,
    params: Option<serde_json::Value>,
) -> Response {
    let p: PointerParams = match parse_params(id.clone(), params, POINTER_SHAPE) {
        Ok(p) => p,
        Err(e) => return e,
    };

    match state.scene.pointer_down(Vec2::new(p.x, p.y), &p.camera.camera(), p.axis) {
        Ok(report) => success_from(id, &report),
        Err(e) => invariant_violation(id, e),
    }
}

/// Handle PointerDrag request - moves the grabbed pad
pub fn handle_pointer_drag(
    state: &mut ServerState,
    id: Option<serde_json::Value>,
    params: Option<serde_json::Value>,
) -> Response {
    let p: PointerParams = match parse_params(id.clone(), params, POINTER_SHAPE) {
        Ok(p) => p,
        Err(e) => return e,
    };

    let outcome = state.scene.pointer_drag(Vec2::new(p.x, p.y), &p.camera.camera());
    success_from(id, &outcome)
}

/// Handle PointerUp request - ends the drag at the last accepted position
pub fn handle_pointer_up(state: &mut ServerState, id: Option<serde_json::Value>) -> Response {
    let position = state.scene.pointer_up();
    Response::success(id, json!({
        "dragging": false,
        "position": position.map(|p| [p.x, p.y]),
    }))
}

/// Handle GetSelection request
pub fn handle_get_selection(state: &ServerState, id: Option<serde_json::Value>) -> Response {
    success_from(id, &state.scene.selection())
}
