//! Hover / selection state machine
//!
//! Hover and selection are two independent axes, each either empty or one
//! instance. Every transition clears the old highlight before setting the new
//! one, and re-hovering the same instance writes nothing.
//!
//! Referring to an instance that is not live is a bookkeeping bug: the call
//! fails with `InteractionError` and logs at error level rather than being
//! ignored.

use super::picking::{InstanceRef, InteractableSet};
use crate::draw::geometry::{HIGHLIGHT_HOVERED, HIGHLIGHT_SELECTED};
use crate::draw::instancing::BatchId;
use crate::error::InteractionError;
use serde::Serialize;

/// Cursor hint for the host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CursorAffordance {
    #[default]
    Default,
    Pointer,
}

/// Combined view of both axes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum InteractionPhase {
    Idle,
    Hovering { hovered: InstanceRef },
    Selected { selected: InstanceRef },
    HoveringAndSelected { hovered: InstanceRef, selected: InstanceRef },
}

#[derive(Debug, Default, Clone)]
pub struct InteractionState {
    hovered: Option<InstanceRef>,
    selected: Option<InstanceRef>,
    cursor: CursorAffordance,
}

fn ensure_live(set: &dyn InteractableSet, target: InstanceRef) -> Result<(), InteractionError> {
    let drawable = set
        .interactable(target.batch)
        .ok_or(InteractionError::UnknownBatch(target.batch.0))?;
    if !drawable.is_live(target.slot) {
        return Err(InteractionError::UnknownInstance {
            batch: target.batch.0,
            slot: target.slot,
        });
    }
    Ok(())
}

fn write(set: &mut dyn InteractableSet, target: InstanceRef, bits: u32, on: bool) -> Result<(), InteractionError> {
    let drawable = set
        .interactable_mut(target.batch)
        .ok_or(InteractionError::UnknownBatch(target.batch.0))?;
    if drawable.set_highlight(target.slot, bits, on) {
        Ok(())
    } else {
        Err(InteractionError::UnknownInstance {
            batch: target.batch.0,
            slot: target.slot,
        })
    }
}

fn report(result: Result<(), InteractionError>) -> Result<(), InteractionError> {
    if let Err(e) = &result {
        log::error!("interaction state out of sync: {}", e);
    }
    result
}

impl InteractionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn hovered(&self) -> Option<InstanceRef> {
        self.hovered
    }

    pub fn selected(&self) -> Option<InstanceRef> {
        self.selected
    }

    pub fn cursor(&self) -> CursorAffordance {
        self.cursor
    }

    pub fn phase(&self) -> InteractionPhase {
        match (self.hovered, self.selected) {
            (None, None) => InteractionPhase::Idle,
            (Some(hovered), None) => InteractionPhase::Hovering { hovered },
            (None, Some(selected)) => InteractionPhase::Selected { selected },
            (Some(hovered), Some(selected)) => InteractionPhase::HoveringAndSelected { hovered, selected },
        }
    }

    /// Pointer moved. `hit` is what the resolver found under the pointer.
    /// Returns whether any highlight changed.
    pub fn pointer_move(
        &mut self,
        hit: Option<InstanceRef>,
        set: &mut dyn InteractableSet,
    ) -> Result<bool, InteractionError> {
        match hit {
            Some(target) if self.hovered == Some(target) => Ok(false),
            Some(target) => {
                report(ensure_live(set, target))?;
                self.clear_hover(set)?;
                report(write(set, target, HIGHLIGHT_HOVERED, true))?;
                self.hovered = Some(target);
                self.cursor = CursorAffordance::Pointer;
                Ok(true)
            }
            None => {
                self.cursor = CursorAffordance::Default;
                self.clear_hover(set)
            }
        }
    }

    /// Click. Replaces the selection with `hit`, or clears it when nothing was hit.
    pub fn select(
        &mut self,
        hit: Option<InstanceRef>,
        set: &mut dyn InteractableSet,
    ) -> Result<bool, InteractionError> {
        match hit {
            Some(target) if self.selected == Some(target) => Ok(false),
            Some(target) => {
                report(ensure_live(set, target))?;
                self.clear_selection(set)?;
                report(write(set, target, HIGHLIGHT_SELECTED, true))?;
                self.selected = Some(target);
                Ok(true)
            }
            None => self.clear_selection(set),
        }
    }

    /// Drop the hover highlight. The tracked hover is reset even if the write fails.
    pub fn clear_hover(&mut self, set: &mut dyn InteractableSet) -> Result<bool, InteractionError> {
        match self.hovered.take() {
            Some(previous) => report(write(set, previous, HIGHLIGHT_HOVERED, false)).map(|_| true),
            None => Ok(false),
        }
    }

    /// Drop the selection highlight. The tracked selection is reset even if the write fails.
    pub fn clear_selection(&mut self, set: &mut dyn InteractableSet) -> Result<bool, InteractionError> {
        match self.selected.take() {
            Some(previous) => report(write(set, previous, HIGHLIGHT_SELECTED, false)).map(|_| true),
            None => Ok(false),
        }
    }

    /// Clear hover and selection that point into `batch`, before its layout changes
    pub fn release_batch(&mut self, batch: BatchId, set: &mut dyn InteractableSet) -> Result<(), InteractionError> {
        if self.hovered.map_or(false, |h| h.batch == batch) {
            self.clear_hover(set)?;
        }
        if self.selected.map_or(false, |s| s.batch == batch) {
            self.clear_selection(set)?;
        }
        Ok(())
    }

    /// Clear hover and selection if either points at `target`
    pub fn release_instance(&mut self, target: InstanceRef, set: &mut dyn InteractableSet) -> Result<(), InteractionError> {
        if self.hovered == Some(target) {
            self.clear_hover(set)?;
        }
        if self.selected == Some(target) {
            self.clear_selection(set)?;
        }
        Ok(())
    }

    /// Forget everything without touching any batch (the batches were cleared)
    pub fn reset(&mut self) {
        self.hovered = None;
        self.selected = None;
        self.cursor = CursorAffordance::Default;
    }
}
