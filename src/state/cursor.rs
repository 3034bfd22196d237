use crate::plan::Activity;
use crate::state::app::AppState;

/// Select a task card directly by its flat index. Stored as given, even
/// when out of range.
pub fn select(state: &AppState, flat_index: i64) {
    state.set_current_index(flat_index);
    tracing::debug!(flat_index, "Cursor selected");
}

/// Finish/continue action from a reading, quiz, or revision view.
pub fn advance(state: &AppState) -> i64 {
    let next = state.advance_cursor();
    tracing::debug!(next, "Cursor advanced");
    next
}

/// Activity under the cursor, or None when the cursor is out of range
/// (fresh empty plan, or advanced past the last activity).
pub fn current_activity(state: &AppState) -> Option<Activity> {
    state.current_activity()
}
