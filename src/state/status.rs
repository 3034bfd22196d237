use serde::{Deserialize, Serialize};

use crate::state::app::AppState;

/// Top-level lifecycle of the current plan fetch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "status")]
pub enum PlanStatus {
    /// No plan requested yet
    Idle,
    /// Plan fetch in flight
    Loading,
    /// Plan flattened and ready to render
    Ready,
    /// Plan fetch failed; the error string is shown verbatim to the user
    Failed { error: String },
}

pub fn get_status(state: &AppState) -> PlanStatus {
    state.get_status()
}

pub fn set_status(state: &AppState, status: PlanStatus) {
    state.set_status(status);
}

/// Log the current status (for debugging)
pub fn log_status(state: &AppState) {
    match state.get_status() {
        PlanStatus::Idle => tracing::debug!("[Plan] Status = Idle"),
        PlanStatus::Loading => tracing::debug!("[Plan] Status = Loading"),
        PlanStatus::Ready => tracing::debug!("[Plan] Status = Ready"),
        PlanStatus::Failed { error } => {
            tracing::debug!(error = %error, "[Plan] Status = Failed")
        }
    }
}
