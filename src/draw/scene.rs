//! Board scene: the board plus pointer interaction
//!
//! Pointer move -> resolver -> hover state.
//! Pointer down -> resolver -> selection state -> manipulation handle.
//! Pointer drag -> handle -> board record and instance transform.
//!
//! All board mutations go through the scene so hover, selection and the handle
//! never point at a slot that was removed or repacked.

use crate::config::ViewerConfig;
use crate::draw::board::{Board, CIRCLE_PAD_BATCH, RECT_PAD_BATCH, TRACE_BATCH};
use crate::draw::geometry::{PadKind, PadRecord, Point, TraceRecord};
use crate::draw::interaction::{
    Camera, CursorAffordance, DragOutcome, HandleAxis, InstanceRef, InteractionPhase, InteractionState,
    ManipulationController, PickHit, PointerResolver,
};
use crate::error::{BoardError, InteractionError};
use glam::Vec2;
use serde::Serialize;

/// A resolved instance with the record it draws
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HitInfo {
    #[serde(flatten)]
    pub target: InstanceRef,
    pub id: String,
    pub point: [f32; 3],
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PointerReport {
    pub hit: Option<HitInfo>,
    /// Whether any highlight flag was written
    pub changed: bool,
    pub cursor: CursorAffordance,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HandleInfo {
    pub id: String,
    pub position: Point,
    pub depth: f32,
    pub dragging: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SelectionInfo {
    pub phase: InteractionPhase,
    pub hovered: Option<String>,
    pub selected: Option<String>,
    pub handle: Option<HandleInfo>,
}

pub struct BoardScene {
    board: Board,
    resolver: PointerResolver,
    interaction: InteractionState,
    manipulation: ManipulationController,
    disposed: bool,
}

impl BoardScene {
    pub fn new(config: &ViewerConfig) -> Self {
        let board = Board::new(config);
        let mut resolver = PointerResolver::new();
        for id in board.interactable_batches() {
            resolver.register(id);
        }
        Self {
            board,
            resolver,
            interaction: InteractionState::new(),
            manipulation: ManipulationController::new(),
            disposed: false,
        }
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    /// Direct board access for uploads and queries that do not move slots
    pub fn board_mut(&mut self) -> &mut Board {
        &mut self.board
    }

    pub fn interaction(&self) -> &InteractionState {
        &self.interaction
    }

    pub fn manipulation(&self) -> &ManipulationController {
        &self.manipulation
    }

    pub fn resolver(&self) -> &PointerResolver {
        &self.resolver
    }

    /// Record id drawn at an instance
    pub fn id_at(&self, target: InstanceRef) -> Option<String> {
        let batch = match target.batch {
            TRACE_BATCH => return self.board.trace_at(target.slot).map(|t| t.id.clone()),
            RECT_PAD_BATCH => self.board.pad_batch(PadKind::Rectangle),
            CIRCLE_PAD_BATCH => self.board.pad_batch(PadKind::Circle),
            _ => return None,
        };
        batch.id_at(target.slot).map(str::to_string)
    }

    fn hit_info(&self, hit: &PickHit) -> Option<HitInfo> {
        Some(HitInfo {
            target: hit.target,
            id: self.id_at(hit.target)?,
            point: hit.point.to_array(),
        })
    }

    fn pick(&self, ndc: Vec2, camera: &Camera) -> Option<PickHit> {
        self.resolver.resolve(ndc, camera, &self.board)
    }

    // ---- pointer ----

    pub fn pointer_move(&mut self, ndc: Vec2, camera: &Camera) -> Result<PointerReport, InteractionError> {
        let hit = self.pick(ndc, camera);
        let changed = self.interaction.pointer_move(hit.map(|h| h.target), &mut self.board)?;
        Ok(PointerReport {
            hit: hit.as_ref().and_then(|h| self.hit_info(h)),
            changed,
            cursor: self.interaction.cursor(),
        })
    }

    /// Click: select what is under the pointer and grab it if it is a pad
    pub fn pointer_down(&mut self, ndc: Vec2, camera: &Camera, axis: HandleAxis) -> Result<PointerReport, InteractionError> {
        let hit = self.pick(ndc, camera);
        let target = hit.map(|h| h.target);
        let reselect = target.is_some() && target == self.interaction.selected();
        let changed = self.interaction.select(target, &mut self.board)?;

        match target {
            Some(t) if t.batch != TRACE_BATCH => {
                if !reselect || self.manipulation.handle().is_none() {
                    let key = self.id_at(t).ok_or(InteractionError::UnknownInstance {
                        batch: t.batch.0,
                        slot: t.slot,
                    })?;
                    let (position, depth) = match (self.board.pad(&key), self.board.depth_of(&key)) {
                        (Some(pad), Some(depth)) => (pad.position, depth),
                        _ => {
                            log::error!("selected slot {} has no pad record", t.slot);
                            return Err(InteractionError::UnknownInstance { batch: t.batch.0, slot: t.slot });
                        }
                    };
                    self.manipulation.attach(t, key, position, depth);
                }
                if let Some(ray) = camera.ray_from_ndc(ndc) {
                    self.manipulation.begin_drag(&ray, axis);
                }
            }
            _ => {
                self.manipulation.detach();
            }
        }

        Ok(PointerReport {
            hit: hit.as_ref().and_then(|h| self.hit_info(h)),
            changed,
            cursor: self.interaction.cursor(),
        })
    }

    pub fn pointer_drag(&mut self, ndc: Vec2, camera: &Camera) -> DragOutcome {
        let Some(ray) = camera.ray_from_ndc(ndc) else {
            return DragOutcome::Missed;
        };
        let bounds = self.board.dims();
        let outcome = self.manipulation.drag(&ray, &bounds, &mut self.board);
        if outcome == DragOutcome::Lost {
            if let Err(e) = self.interaction.clear_selection(&mut self.board) {
                log::error!("clearing lost selection failed: {}", e);
            }
        }
        outcome
    }

    /// End a drag. The pad stays at its last accepted position.
    pub fn pointer_up(&mut self) -> Option<Point> {
        let end = self.manipulation.end_drag();
        if let Some(id) = self.manipulation.handle().map(|h| h.key.clone()) {
            self.sync_handle(&id);
        }
        end
    }

    pub fn selection(&self) -> SelectionInfo {
        SelectionInfo {
            phase: self.interaction.phase(),
            hovered: self.interaction.hovered().and_then(|t| self.id_at(t)),
            selected: self.interaction.selected().and_then(|t| self.id_at(t)),
            handle: self.manipulation.handle().map(|h| HandleInfo {
                id: h.key.clone(),
                position: h.position,
                depth: h.depth,
                dragging: h.is_dragging(),
            }),
        }
    }

    // ---- mutations ----

    /// Drop hover/selection into the trace batch before its slots get repacked
    fn release_traces(&mut self) {
        if let Err(e) = self.interaction.release_batch(TRACE_BATCH, &mut self.board) {
            log::error!("releasing trace highlights failed: {}", e);
        }
    }

    fn release_pad(&mut self, id: &str) {
        if self.manipulation.handle().map_or(false, |h| h.key == id) {
            self.manipulation.detach();
        }
        let target = self
            .board
            .pad(id)
            .map(|pad| self.board.pad_batch(pad.kind))
            .and_then(|batch| batch.slot_of(id).map(|slot| InstanceRef { batch: batch.id(), slot }));
        if let Some(target) = target {
            if let Err(e) = self.interaction.release_instance(target, &mut self.board) {
                log::error!("releasing '{}' failed: {}", id, e);
            }
        }
    }

    fn sync_handle(&mut self, id: &str) {
        if let (Some(pad), Some(depth)) = (self.board.pad(id), self.board.depth_of(id)) {
            let position = pad.position;
            self.manipulation.sync_position(id, position, depth);
        }
    }

    pub fn add_pad(&mut self, pad: PadRecord) -> Result<usize, BoardError> {
        self.board.add_pad(pad)
    }

    pub fn add_trace(&mut self, trace: TraceRecord) -> Result<(), BoardError> {
        self.board.add_trace(trace)
    }

    pub fn update_position(&mut self, id: &str, position: Point) -> Result<(), BoardError> {
        if self.board.trace(id).is_some() {
            self.release_traces();
        }
        self.board.update_position(id, position)?;
        self.sync_handle(id);
        Ok(())
    }

    pub fn update_pad_size(&mut self, id: &str, size: [f32; 2]) -> Result<(), BoardError> {
        self.board.update_pad_size(id, size)
    }

    pub fn update_pad_rotation(&mut self, id: &str, rotation: f32) -> Result<(), BoardError> {
        self.board.update_pad_rotation(id, rotation)
    }

    pub fn update_trace_path(&mut self, id: &str, points: Vec<Point>) -> Result<(), BoardError> {
        self.release_traces();
        self.board.update_trace_path(id, points)
    }

    pub fn update_trace_width(&mut self, id: &str, width: f32) -> Result<(), BoardError> {
        self.release_traces();
        self.board.update_trace_width(id, width)
    }

    pub fn remove(&mut self, id: &str) -> Result<(), BoardError> {
        if self.board.trace(id).is_some() {
            self.release_traces();
        } else {
            self.release_pad(id);
        }
        self.board.remove(id)
    }

    pub fn clear(&mut self) {
        self.manipulation.detach();
        self.interaction.reset();
        self.board.clear();
    }

    pub fn set_board_thickness(&mut self, thickness: f32) -> Result<(), BoardError> {
        self.board.set_board_thickness(thickness)?;
        if let Some(id) = self.manipulation.handle().map(|h| h.key.clone()) {
            self.sync_handle(&id);
        }
        Ok(())
    }

    /// Swap in a fully built board (import / backup restore)
    pub fn replace_board(&mut self, board: Board) {
        self.manipulation.detach();
        self.interaction.reset();
        let mut old = std::mem::replace(&mut self.board, board);
        old.dispose();
    }

    /// Detach the handle and release every batch. Only the first call does anything.
    pub fn dispose(&mut self) -> bool {
        if self.disposed {
            return false;
        }
        self.manipulation.detach();
        self.interaction.reset();
        self.board.dispose();
        self.disposed = true;
        true
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::draw::geometry::{Layer, HIGHLIGHT_HOVERED, HIGHLIGHT_SELECTED};
    use crate::draw::interaction::CameraMode;
    use approx::assert_relative_eq;
    use glam::Vec3;

    /// Orthographic camera looking straight down, one world unit per NDC unit
    fn top_down() -> Camera {
        let mut camera = Camera::look_at(Vec3::new(0.0, 50.0, 0.0), Vec3::ZERO, 60.0, 1.0, CameraMode::Orthographic);
        camera.ortho_half_h = 1.0;
        camera
    }

    /// Screen right is world +x, screen up is world -z (board -y)
    fn ndc_over(x: f32, y: f32) -> Vec2 {
        Vec2::new(x, -y)
    }

    fn scene_with_pads() -> BoardScene {
        let mut scene = BoardScene::new(&ViewerConfig::default());
        scene
            .add_pad(PadRecord::new("A", PadKind::Rectangle, Point::new(0.0, 0.0), [0.5, 0.5], Layer::Top))
            .unwrap();
        scene
            .add_pad(PadRecord::new("B", PadKind::Circle, Point::new(0.6, 0.0), [0.4, 0.4], Layer::Top))
            .unwrap();
        scene
    }

    #[test]
    fn test_hover_follows_pointer() {
        let camera = top_down();
        let mut scene = scene_with_pads();
        let report = scene.pointer_move(ndc_over(0.0, 0.0), &camera).unwrap();
        assert_eq!(report.hit.as_ref().map(|h| h.id.as_str()), Some("A"));
        assert!(report.changed);

        let report = scene.pointer_move(ndc_over(0.6, 0.0), &camera).unwrap();
        assert_eq!(report.hit.map(|h| h.id), Some("B".to_string()));
        let rect = scene.board().pad_batch(PadKind::Rectangle);
        assert_eq!(rect.highlight_at(0), Some(0));
        let circle = scene.board().pad_batch(PadKind::Circle);
        assert_eq!(circle.highlight_at(0), Some(HIGHLIGHT_HOVERED));

        let report = scene.pointer_move(ndc_over(0.9, 0.9), &camera).unwrap();
        assert!(report.hit.is_none());
        assert_eq!(report.cursor, CursorAffordance::Default);
    }

    #[test]
    fn test_thickness_change_mid_drag_moves_handle() {
        let camera = top_down();
        let mut scene = scene_with_pads();
        scene.pointer_down(ndc_over(0.0, 0.0), &camera, HandleAxis::Plane).unwrap();
        scene.set_board_thickness(4.0).unwrap();
        let pad_depth = scene.board().depth_of("A").unwrap();
        assert_relative_eq!(pad_depth, 2.01, epsilon = 1e-5);
        assert_relative_eq!(scene.selection().handle.unwrap().depth, pad_depth, epsilon = 1e-6);

        scene.pointer_drag(ndc_over(0.1, 0.1), &camera);
        scene.pointer_up().unwrap();
        let handle = scene.selection().handle.unwrap();
        assert_relative_eq!(handle.depth, pad_depth, epsilon = 1e-6);
        assert_eq!(handle.position, scene.board().pad("A").unwrap().position);
    }

    #[test]
    fn test_click_drag_release() {
        let camera = top_down();
        let mut scene = scene_with_pads();
        scene.pointer_down(ndc_over(0.0, 0.0), &camera, HandleAxis::Plane).unwrap();
        assert_eq!(scene.selection().selected.as_deref(), Some("A"));
        assert_eq!(scene.manipulation().active_listeners(), 3);

        let outcome = scene.pointer_drag(ndc_over(0.2, -0.3), &camera);
        assert!(matches!(outcome, DragOutcome::Moved { .. }));
        let end = scene.pointer_up().unwrap();
        assert_relative_eq!(end.x, 0.2, epsilon = 1e-4);
        assert_relative_eq!(end.y, -0.3, epsilon = 1e-4);

        let pad = scene.board().pad("A").unwrap();
        assert_relative_eq!(pad.position.x, 0.2, epsilon = 1e-4);
        let rect = scene.board().pad_batch(PadKind::Rectangle);
        assert_eq!(rect.highlight_at(0).map(|f| f & HIGHLIGHT_SELECTED), Some(HIGHLIGHT_SELECTED));

        scene.pointer_down(ndc_over(-0.9, 0.9), &camera, HandleAxis::Plane).unwrap();
        assert!(scene.selection().selected.is_none());
        assert_eq!(scene.manipulation().active_listeners(), 0);
    }

    #[test]
    fn test_removing_selected_pad_clears_state() {
        let camera = top_down();
        let mut scene = scene_with_pads();
        scene.pointer_move(ndc_over(0.0, 0.0), &camera).unwrap();
        scene.pointer_down(ndc_over(0.0, 0.0), &camera, HandleAxis::Plane).unwrap();
        scene.pointer_up();
        scene.remove("A").unwrap();
        assert_eq!(scene.selection().phase, InteractionPhase::Idle);
        assert!(scene.manipulation().handle().is_none());
        // The dead slot is never picked again
        let report = scene.pointer_move(ndc_over(0.0, 0.0), &camera).unwrap();
        assert!(report.hit.is_none());
    }

    #[test]
    fn test_trace_edit_releases_trace_selection() {
        let camera = top_down();
        let mut scene = BoardScene::new(&ViewerConfig::default());
        scene
            .add_trace(TraceRecord::new("T", vec![Point::new(-0.5, 0.0), Point::new(0.5, 0.0)], 0.2, Layer::Top))
            .unwrap();
        scene.pointer_down(ndc_over(0.0, 0.0), &camera, HandleAxis::Plane).unwrap();
        assert_eq!(scene.selection().selected.as_deref(), Some("T"));
        assert!(scene.manipulation().handle().is_none());

        scene.update_trace_width("T", 0.3).unwrap();
        assert!(scene.selection().selected.is_none());
        scene.board().check_invariants().unwrap();
    }

    #[test]
    fn test_dispose_is_idempotent() {
        let camera = top_down();
        let mut scene = scene_with_pads();
        scene.pointer_down(ndc_over(0.0, 0.0), &camera, HandleAxis::Plane).unwrap();
        assert!(scene.dispose());
        assert!(!scene.dispose());
        assert_eq!(scene.manipulation().active_listeners(), 0);
        assert_eq!(scene.board().materials().live_count(), 0);
    }
}
