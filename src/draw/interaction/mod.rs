//! Pointer interaction: picking, hover/selection and the manipulation handle

mod camera;
mod highlight;
mod manipulation;
mod picking;

pub use camera::{ndc_from_pixel, Camera, CameraMode, Ray};
pub use highlight::{CursorAffordance, InteractionPhase, InteractionState};
pub use manipulation::{
    DragOutcome, HandleAxis, HandleEvent, ListenerId, ManipulationController, ManipulationTarget,
    TransformHandle,
};
pub use picking::{
    InstanceRef, Interactable, InteractableSet, PickHit, PointerResolver, StandaloneMesh,
};
