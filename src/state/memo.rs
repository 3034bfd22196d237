use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use crate::projector::Task;
use crate::state::app::AppState;

/// Memo key for one projected task. The cache revision changes on every
/// committed merge, so stale projections miss naturally.
fn task_key(activity_id: &str, revision: u64) -> u64 {
    let mut hasher = DefaultHasher::new();
    activity_id.hash(&mut hasher);
    revision.hash(&mut hasher);
    hasher.finish()
}

/// Check the memo and return a previously projected task if still valid
pub fn get_cached_task(state: &AppState, activity_id: &str, revision: u64) -> Option<Task> {
    let key = task_key(activity_id, revision);
    let memo = state.task_memo.read();
    if let Some(task) = memo.peek(&key) {
        tracing::debug!(activity_id, revision, "Task memo hit");
        return Some(task.clone());
    }
    None
}

/// Store a projected task in the memo
pub fn store_task(state: &AppState, activity_id: &str, revision: u64, task: &Task) {
    let key = task_key(activity_id, revision);
    let mut memo = state.task_memo.write();
    memo.put(key, task.clone());
}
