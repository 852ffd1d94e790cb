//! Selection handlers: BoxSelect

use crate::draw::geometry::Point;
use crate::lsp::protocol::Response;
use crate::lsp::state::ServerState;
use crate::lsp::util::parse_params;
use serde::Deserialize;

/// Handle BoxSelect request - ids of records intersecting a board-plane rectangle
pub fn handle_box_select(
    state: &mut ServerState,
    id: Option<serde_json::Value>,
    params: Option<serde_json::Value>,
) -> Response {
    #[derive(Deserialize)]
    struct Params { min_x: f32, min_y: f32, max_x: f32, max_y: f32 }

    let p: Params = match parse_params(id.clone(), params, "{min_x, min_y, max_x, max_y}") {
        Ok(p) => p,
        Err(e) => return e,
    };

    let ids = state
        .scene
        .board_mut()
        .box_select(Point::new(p.min_x, p.min_y), Point::new(p.max_x, p.max_y));
    Response::success(id, serde_json::json!(ids))
}
