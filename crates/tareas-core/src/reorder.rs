use thiserror::Error;
use tracing::{debug, trace};

use crate::filter::Category;
use crate::task::DisplayTask;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DragState {
    #[default]
    Idle,
    Dragging {
        source: usize,
    },
    TargetSelected {
        source: usize,
        target: usize,
    },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ReorderError {
    #[error("reordering is disabled in the {0} view")]
    Disabled(Category),
    #[error("position {index} out of range (0..{len})")]
    OutOfRange { index: usize, len: usize },
    #[error("no drag in progress")]
    NotDragging,
}

/// Drag-and-drop state for the displayed list.
#[derive(Debug, Default)]
pub struct ReorderEngine {
    state: DragState,
}

impl ReorderEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> DragState {
        self.state
    }

    /// Starting a new drag replaces any drag already in progress.
    pub fn start(
        &mut self,
        source: usize,
        category: Category,
        display_len: usize,
    ) -> Result<(), ReorderError> {
        if !category.allows_reorder() {
            return Err(ReorderError::Disabled(category));
        }
        check_index(source, display_len)?;
        trace!(source, "drag start");
        self.state = DragState::Dragging { source };
        Ok(())
    }

    pub fn enter(&mut self, target: usize, display_len: usize) -> Result<(), ReorderError> {
        let source = match self.state {
            DragState::Idle => return Err(ReorderError::NotDragging),
            DragState::Dragging { source } | DragState::TargetSelected { source, .. } => source,
        };
        check_index(target, display_len)?;
        trace!(source, target, "drag enter");
        self.state = DragState::TargetSelected { source, target };
        Ok(())
    }

    pub fn cancel(&mut self) {
        trace!(state = ?self.state, "drag cancelled");
        self.state = DragState::Idle;
    }

    /// Finishes the drag. With a target selected the dragged item is moved
    /// in `display` and the move is replayed on `store`; returns whether
    /// anything moved. The engine is idle afterwards in every case.
    pub fn drop_on(
        &mut self,
        display: &mut Vec<DisplayTask>,
        store: &mut Vec<DisplayTask>,
    ) -> Result<bool, ReorderError> {
        let state = std::mem::take(&mut self.state);
        let (source, target) = match state {
            DragState::Idle => return Err(ReorderError::NotDragging),
            DragState::Dragging { .. } => return Ok(false),
            DragState::TargetSelected { source, target } => (source, target),
        };

        check_index(source, display.len())?;
        check_index(target, display.len())?;
        if source == target {
            return Ok(false);
        }

        let moved_id = display[source].id();
        splice_move(display, source, target);
        replay_on_store(store, display, moved_id);
        debug!(moved_id, source, target, "reordered task");
        Ok(true)
    }
}

fn check_index(index: usize, len: usize) -> Result<(), ReorderError> {
    if index < len {
        Ok(())
    } else {
        Err(ReorderError::OutOfRange { index, len })
    }
}

/// Remove at `source`, reinsert at `target`.
pub fn splice_move<T>(items: &mut Vec<T>, source: usize, target: usize) {
    let item = items.remove(source);
    items.insert(target.min(items.len()), item);
}

/// Mirrors a display move on the full store, which may hold records the
/// display filters out. The moved record is anchored after whatever now
/// precedes it in the display, or at the head of the store.
pub fn replay_on_store(store: &mut Vec<DisplayTask>, display: &[DisplayTask], moved_id: u64) {
    let Some(from) = store.iter().position(|record| record.id() == moved_id) else {
        return;
    };
    let record = store.remove(from);

    let anchor = display
        .iter()
        .position(|record| record.id() == moved_id)
        .and_then(|pos| pos.checked_sub(1))
        .map(|pos| display[pos].id());

    let insert_at = anchor
        .and_then(|anchor_id| store.iter().position(|record| record.id() == anchor_id))
        .map_or(0, |idx| idx + 1);

    store.insert(insert_at, record);
}
