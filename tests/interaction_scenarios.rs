// Pointer scenarios against a whole scene
use glam::{Vec2, Vec3};
use pcb_copper_view::draw::geometry::{Layer, PadKind, PadRecord, Point, TraceRecord, HIGHLIGHT_HOVERED};
use pcb_copper_view::draw::interaction::{Camera, CameraMode, DragOutcome, HandleAxis, InteractionPhase};
use pcb_copper_view::{BoardScene, ViewerConfig};

fn top_down() -> Camera {
    let mut camera = Camera::look_at(Vec3::new(0.0, 50.0, 0.0), Vec3::ZERO, 1.0, 1.0, CameraMode::Orthographic);
    camera.ortho_half_h = 1.0;
    camera
}

/// NDC over a board point; board +y runs towards screen bottom from above
fn over(x: f32, y: f32) -> Vec2 {
    Vec2::new(x, -y)
}

fn hovered_count(scene: &BoardScene) -> usize {
    let board = scene.board();
    let pads = [PadKind::Rectangle, PadKind::Circle].into_iter().map(|k| board.pad_batch(k));
    let pad_hits: usize = pads
        .map(|b| (0..b.capacity()).filter(|s| b.highlight_at(*s).map_or(false, |f| f & HIGHLIGHT_HOVERED != 0)).count())
        .sum();
    let segments = board.segment_batch();
    let segment_hits = (0..segments.capacity())
        .filter(|s| segments.highlight_at(*s).map_or(false, |f| f & HIGHLIGHT_HOVERED != 0))
        .count();
    pad_hits + segment_hits
}

fn populated() -> BoardScene {
    let mut scene = BoardScene::new(&ViewerConfig::default());
    scene.add_pad(PadRecord::new("R", PadKind::Rectangle, Point::new(-0.5, 0.0), [0.3, 0.3], Layer::Top)).expect("R");
    scene.add_pad(PadRecord::new("C", PadKind::Circle, Point::new(0.5, 0.0), [0.3, 0.3], Layer::Top)).expect("C");
    scene
        .add_trace(TraceRecord::new("T", vec![Point::new(-0.8, 0.5), Point::new(0.8, 0.5)], 0.1, Layer::Top))
        .expect("T");
    scene
}

#[test]
fn test_at_most_one_hovered_instance() {
    let camera = top_down();
    let mut scene = populated();
    for (x, y) in [(-0.5, 0.0), (0.5, 0.0), (0.0, 0.5), (0.9, -0.9), (-0.5, 0.0), (0.3, 0.5)] {
        scene.pointer_move(over(x, y), &camera).expect("bookkeeping in sync");
        assert!(hovered_count(&scene) <= 1);
    }
    let info = scene.selection();
    assert_eq!(info.hovered.as_deref(), Some("T"));
}

#[test]
fn test_phase_transitions() {
    let camera = top_down();
    let mut scene = populated();
    assert_eq!(scene.selection().phase, InteractionPhase::Idle);

    scene.pointer_move(over(-0.5, 0.0), &camera).expect("move");
    assert!(matches!(scene.selection().phase, InteractionPhase::Hovering { .. }));

    scene.pointer_down(over(-0.5, 0.0), &camera, HandleAxis::Plane).expect("down");
    scene.pointer_up();
    assert!(matches!(scene.selection().phase, InteractionPhase::HoveringAndSelected { .. }));

    scene.pointer_move(over(0.9, -0.9), &camera).expect("move off");
    assert!(matches!(scene.selection().phase, InteractionPhase::Selected { .. }));

    scene.pointer_down(over(0.9, -0.9), &camera, HandleAxis::Plane).expect("click empty");
    assert_eq!(scene.selection().phase, InteractionPhase::Idle);
}

#[test]
fn test_axis_constrained_drag() {
    let camera = top_down();
    let mut scene = populated();
    scene.pointer_down(over(0.5, 0.0), &camera, HandleAxis::X).expect("grab C");
    let outcome = scene.pointer_drag(over(0.3, 0.4), &camera);
    assert!(matches!(outcome, DragOutcome::Moved { .. }));
    let end = scene.pointer_up().expect("dragged");
    assert!((end.x - 0.3).abs() < 1e-4);
    assert!(end.y.abs() < 1e-4);
    let handle = scene.selection().handle.expect("handle attached");
    assert_eq!(handle.id, "C");
    assert!(!handle.dragging);
}

#[test]
fn test_trace_selection_has_no_handle() {
    let camera = top_down();
    let mut scene = populated();
    scene.pointer_down(over(0.0, 0.5), &camera, HandleAxis::Plane).expect("select trace");
    let info = scene.selection();
    assert_eq!(info.selected.as_deref(), Some("T"));
    assert!(info.handle.is_none());
    assert_eq!(scene.pointer_drag(over(0.2, 0.5), &camera), DragOutcome::Inactive);
}

#[test]
fn test_clear_resets_interaction() {
    let camera = top_down();
    let mut scene = populated();
    scene.pointer_move(over(0.5, 0.0), &camera).expect("hover");
    scene.pointer_down(over(0.5, 0.0), &camera, HandleAxis::Plane).expect("select");
    scene.clear();
    assert_eq!(scene.selection().phase, InteractionPhase::Idle);
    assert!(scene.manipulation().handle().is_none());
    assert!(scene.board().is_empty());
}
