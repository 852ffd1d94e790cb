//! Translation handle for the selected pad
//!
//! At most one handle exists. It moves in the board plane only; world depth is
//! locked to the layer the pad sits on. Every accepted delta is committed
//! through `ManipulationTarget`, which updates both the instance transform and
//! the logical record.
//!
//! A drag that wanders off the board is ignored until it comes back, and
//! releasing the pointer keeps the last accepted position. There is no rollback
//! to where the drag started.

use super::camera::Ray;
use super::picking::InstanceRef;
use crate::draw::geometry::{BoardDims, Point};
use glam::{Vec2, Vec3};
use serde::Serialize;

/// Receives committed positions from the handle
pub trait ManipulationTarget {
    /// Move the record `key` (drawn at `target`) to `position`.
    /// Returns false if the record no longer exists at that slot.
    fn commit_position(&mut self, target: InstanceRef, key: &str, position: Point) -> bool;
}

/// Which handle part is being dragged
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HandleAxis {
    /// Board x only
    X,
    /// Board y only (world z)
    Y,
    #[default]
    Plane,
}

impl HandleAxis {
    fn constrain(self, delta: Vec2) -> Vec2 {
        match self {
            HandleAxis::X => Vec2::new(delta.x, 0.0),
            HandleAxis::Y => Vec2::new(0.0, delta.y),
            HandleAxis::Plane => delta,
        }
    }
}

/// Input events a handle subscribes to while attached
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleEvent {
    DragStart,
    Drag,
    DragEnd,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// Bookkeeping for input subscriptions, so detaching can be checked to release all of them
#[derive(Debug, Default)]
struct ListenerRegistry {
    next: u64,
    active: Vec<(ListenerId, HandleEvent)>,
}

impl ListenerRegistry {
    fn subscribe(&mut self, event: HandleEvent) -> ListenerId {
        let id = ListenerId(self.next);
        self.next += 1;
        self.active.push((id, event));
        id
    }

    fn unsubscribe(&mut self, id: ListenerId) -> bool {
        let before = self.active.len();
        self.active.retain(|(l, _)| *l != id);
        self.active.len() != before
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct DragState {
    axis: HandleAxis,
    /// Where the pointer first met the drag plane
    grab: Vec2,
    /// Handle position when the drag started
    start: Point,
    last_valid: Point,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TransformHandle {
    pub handle_id: u64,
    pub target: InstanceRef,
    pub key: String,
    /// Current committed position in the board plane
    pub position: Point,
    /// Locked world depth of the drag plane
    pub depth: f32,
    listeners: Vec<ListenerId>,
    drag: Option<DragState>,
}

impl TransformHandle {
    pub fn is_dragging(&self) -> bool {
        self.drag.is_some()
    }
}

/// What happened to one drag delta
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum DragOutcome {
    Moved { position: Point },
    /// Proposed position left the board; the pad stays where it was
    OutOfBounds,
    /// The pointer ray never reaches the drag plane
    Missed,
    /// No handle, or no drag in progress
    Inactive,
    /// The target record disappeared; the handle was detached
    Lost,
}

#[derive(Debug, Default)]
pub struct ManipulationController {
    handle: Option<TransformHandle>,
    listeners: ListenerRegistry,
    next_handle: u64,
}

impl ManipulationController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn handle(&self) -> Option<&TransformHandle> {
        self.handle.as_ref()
    }

    pub fn is_dragging(&self) -> bool {
        self.handle.as_ref().map_or(false, |h| h.is_dragging())
    }

    /// Live input subscriptions across all handles ever attached
    pub fn active_listeners(&self) -> usize {
        self.listeners.active.len()
    }

    /// Attach a handle to `target`, detaching any previous handle first
    pub fn attach(&mut self, target: InstanceRef, key: impl Into<String>, position: Point, depth: f32) -> u64 {
        self.detach();
        let listeners = [HandleEvent::DragStart, HandleEvent::Drag, HandleEvent::DragEnd]
            .into_iter()
            .map(|event| self.listeners.subscribe(event))
            .collect();
        let handle_id = self.next_handle;
        self.next_handle += 1;
        let key = key.into();
        log::debug!("handle {} attached to '{}' at slot {}", handle_id, key, target.slot);
        self.handle = Some(TransformHandle {
            handle_id,
            target,
            key,
            position,
            depth,
            listeners,
            drag: None,
        });
        handle_id
    }

    /// Release the handle and all of its listeners. Returns false if none was attached.
    pub fn detach(&mut self) -> bool {
        let Some(handle) = self.handle.take() else {
            return false;
        };
        for id in &handle.listeners {
            if !self.listeners.unsubscribe(*id) {
                log::error!("handle {} listener {:?} was already released", handle.handle_id, id);
            }
        }
        log::debug!("handle {} detached from '{}'", handle.handle_id, handle.key);
        true
    }

    /// Start dragging where `ray` meets the handle's plane
    pub fn begin_drag(&mut self, ray: &Ray, axis: HandleAxis) -> bool {
        let Some(handle) = self.handle.as_mut() else {
            return false;
        };
        let Some(hit) = ray.intersect_horizontal(handle.depth) else {
            return false;
        };
        handle.drag = Some(DragState {
            axis,
            grab: Vec2::new(hit.x, hit.z),
            start: handle.position,
            last_valid: handle.position,
        });
        true
    }

    /// Follow the pointer ray during a drag
    pub fn drag(&mut self, ray: &Ray, bounds: &BoardDims, target: &mut dyn ManipulationTarget) -> DragOutcome {
        let Some(handle) = self.handle.as_ref() else {
            return DragOutcome::Inactive;
        };
        let Some(drag) = handle.drag else {
            return DragOutcome::Inactive;
        };
        let Some(hit) = ray.intersect_horizontal(handle.depth) else {
            return DragOutcome::Missed;
        };
        let delta = drag.axis.constrain(Vec2::new(hit.x, hit.z) - drag.grab);
        let proposed = Point::new(drag.start.x + delta.x, drag.start.y + delta.y);
        self.commit(proposed, bounds, target)
    }

    /// Apply a handle delta in world space. The vertical component is discarded.
    pub fn translate_by(&mut self, delta: Vec3, bounds: &BoardDims, target: &mut dyn ManipulationTarget) -> DragOutcome {
        let Some(handle) = self.handle.as_ref() else {
            return DragOutcome::Inactive;
        };
        let axis = handle.drag.map_or(HandleAxis::Plane, |d| d.axis);
        let planar = axis.constrain(Vec2::new(delta.x, delta.z));
        let proposed = Point::new(handle.position.x + planar.x, handle.position.y + planar.y);
        self.commit(proposed, bounds, target)
    }

    fn commit(&mut self, proposed: Point, bounds: &BoardDims, target: &mut dyn ManipulationTarget) -> DragOutcome {
        let Some(handle) = self.handle.as_mut() else {
            return DragOutcome::Inactive;
        };
        if !bounds.contains(proposed) {
            log::trace!("drag of '{}' to ({}, {}) is off the board", handle.key, proposed.x, proposed.y);
            return DragOutcome::OutOfBounds;
        }
        if !target.commit_position(handle.target, &handle.key, proposed) {
            log::error!("drag target '{}' vanished at slot {}", handle.key, handle.target.slot);
            self.detach();
            return DragOutcome::Lost;
        }
        handle.position = proposed;
        if let Some(drag) = handle.drag.as_mut() {
            drag.last_valid = proposed;
        }
        DragOutcome::Moved { position: proposed }
    }

    /// Finish the drag. The handle stays attached at the last accepted position.
    pub fn end_drag(&mut self) -> Option<Point> {
        let handle = self.handle.as_mut()?;
        let drag = handle.drag.take()?;
        handle.position = drag.last_valid;
        Some(drag.last_valid)
    }

    /// Keep the handle in sync after its target moved by other means.
    /// Mid-drag only the depth follows; the drag owns the position.
    pub fn sync_position(&mut self, key: &str, position: Point, depth: f32) {
        if let Some(handle) = self.handle.as_mut() {
            if handle.key != key {
                return;
            }
            handle.depth = depth;
            if !handle.is_dragging() {
                handle.position = position;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::draw::instancing::BatchId;
    use approx::assert_relative_eq;

    #[derive(Default)]
    struct Recorder {
        commits: Vec<(String, Point)>,
        refuse: bool,
    }

    impl ManipulationTarget for Recorder {
        fn commit_position(&mut self, _target: InstanceRef, key: &str, position: Point) -> bool {
            if self.refuse {
                return false;
            }
            self.commits.push((key.to_string(), position));
            true
        }
    }

    fn target() -> InstanceRef {
        InstanceRef { batch: BatchId(0), slot: 3 }
    }

    fn down_at(x: f32, z: f32) -> Ray {
        Ray::new(Vec3::new(x, 10.0, z), Vec3::NEG_Y)
    }

    #[test]
    fn test_single_handle_and_listener_release() {
        let mut ctl = ManipulationController::new();
        ctl.attach(target(), "P1", Point::new(0.0, 0.0), 0.81);
        assert_eq!(ctl.active_listeners(), 3);
        ctl.attach(InstanceRef { batch: BatchId(1), slot: 0 }, "P2", Point::new(1.0, 1.0), 0.81);
        assert_eq!(ctl.active_listeners(), 3);
        assert_eq!(ctl.handle().map(|h| h.key.as_str()), Some("P2"));
        assert!(ctl.detach());
        assert_eq!(ctl.active_listeners(), 0);
        assert!(!ctl.detach());
    }

    #[test]
    fn test_sync_mid_drag_moves_depth_only() {
        let mut ctl = ManipulationController::new();
        ctl.attach(target(), "P1", Point::new(1.0, 2.0), 0.81);
        ctl.begin_drag(&down_at(1.0, 2.0), HandleAxis::Plane);
        ctl.sync_position("P1", Point::new(9.0, 9.0), 2.01);
        let handle = ctl.handle().unwrap();
        assert_relative_eq!(handle.depth, 2.01);
        assert_eq!(handle.position, Point::new(1.0, 2.0));

        ctl.sync_position("other", Point::new(0.0, 0.0), 5.0);
        assert_relative_eq!(ctl.handle().unwrap().depth, 2.01);
    }

    #[test]
    fn test_drag_commits_planar_position() {
        let bounds = BoardDims::default();
        let mut rec = Recorder::default();
        let mut ctl = ManipulationController::new();
        ctl.attach(target(), "P1", Point::new(1.0, 2.0), 0.81);
        assert!(ctl.begin_drag(&down_at(1.5, 2.5), HandleAxis::Plane));

        let outcome = ctl.drag(&down_at(4.5, -1.5), &bounds, &mut rec);
        match outcome {
            DragOutcome::Moved { position } => {
                assert_relative_eq!(position.x, 4.0, epsilon = 1e-5);
                assert_relative_eq!(position.y, -2.0, epsilon = 1e-5);
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(rec.commits.len(), 1);
        assert_relative_eq!(ctl.handle().unwrap().depth, 0.81);
    }

    #[test]
    fn test_axis_constraint() {
        let bounds = BoardDims::default();
        let mut rec = Recorder::default();
        let mut ctl = ManipulationController::new();
        ctl.attach(target(), "P1", Point::new(0.0, 0.0), 0.81);
        ctl.begin_drag(&down_at(0.0, 0.0), HandleAxis::X);
        ctl.drag(&down_at(3.0, 5.0), &bounds, &mut rec);
        let (_, p) = rec.commits[0].clone();
        assert_relative_eq!(p.x, 3.0, epsilon = 1e-5);
        assert_relative_eq!(p.y, 0.0);
    }

    #[test]
    fn test_out_of_bounds_keeps_last_valid() {
        let bounds = BoardDims::default();
        let mut rec = Recorder::default();
        let mut ctl = ManipulationController::new();
        ctl.attach(target(), "P1", Point::new(0.0, 0.0), 0.81);
        ctl.begin_drag(&down_at(0.0, 0.0), HandleAxis::Plane);
        ctl.drag(&down_at(10.0, 0.0), &bounds, &mut rec);
        assert_eq!(ctl.drag(&down_at(500.0, 0.0), &bounds, &mut rec), DragOutcome::OutOfBounds);

        let end = ctl.end_drag().unwrap();
        assert_relative_eq!(end.x, 10.0, epsilon = 1e-5);
        assert_eq!(rec.commits.len(), 1);
        assert!(ctl.handle().is_some());
        assert!(!ctl.is_dragging());
    }

    #[test]
    fn test_translate_ignores_vertical_delta() {
        let bounds = BoardDims::default();
        let mut rec = Recorder::default();
        let mut ctl = ManipulationController::new();
        ctl.attach(target(), "P1", Point::new(1.0, 1.0), -0.81);
        let outcome = ctl.translate_by(Vec3::new(1.0, 5.0, -2.0), &bounds, &mut rec);
        assert_eq!(outcome, DragOutcome::Moved { position: Point::new(2.0, -1.0) });
        assert_relative_eq!(ctl.handle().unwrap().depth, -0.81);
    }

    #[test]
    fn test_lost_target_detaches() {
        let bounds = BoardDims::default();
        let mut rec = Recorder { refuse: true, ..Default::default() };
        let mut ctl = ManipulationController::new();
        ctl.attach(target(), "P1", Point::new(0.0, 0.0), 0.81);
        let outcome = ctl.translate_by(Vec3::X, &bounds, &mut rec);
        assert_eq!(outcome, DragOutcome::Lost);
        assert!(ctl.handle().is_none());
        assert_eq!(ctl.active_listeners(), 0);
    }

    #[test]
    fn test_drag_without_handle_is_inactive() {
        let mut rec = Recorder::default();
        let mut ctl = ManipulationController::new();
        assert!(!ctl.begin_drag(&down_at(0.0, 0.0), HandleAxis::Plane));
        assert_eq!(ctl.drag(&down_at(1.0, 1.0), &BoardDims::default(), &mut rec), DragOutcome::Inactive);
        assert_eq!(ctl.end_drag(), None);
    }
}
