use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;

use crate::aggregator::AggregatorBlob;
use crate::backend::PlanBackend;
use crate::error::PlanError;
use crate::plan::catalog::{build_catalog, Catalog};
use crate::plan::flatten::flatten_plan;
use crate::projector::{project, Task};
use crate::state::app::AppState;
use crate::state::status::{log_status, PlanStatus};
use crate::state::{cursor, memo};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanSummary {
    pub plan_id: String,
    pub level: String,
    pub total_days: usize,
    pub total_activities: usize,
}

/// Fetch a plan, flatten it, rebuild the catalog, and reset the cursor.
/// The previous plan (if any) is replaced wholesale.
pub async fn load_plan(
    state: &AppState,
    backend: &Arc<dyn PlanBackend>,
    plan_id: &str,
) -> Result<PlanSummary, PlanError> {
    if plan_id.trim().is_empty() {
        return Err(PlanError::new("Missing required identifier: planId", "validate"));
    }

    state.set_status(PlanStatus::Loading);
    log_status(state);

    match backend.plan_document(plan_id).await {
        Ok(doc) => {
            let flat = flatten_plan(doc);
            let catalog = build_catalog(&flat.activities, &HashMap::new());
            let summary = PlanSummary {
                plan_id: flat.doc.id.clone(),
                level: flat.doc.level.clone(),
                total_days: flat.doc.sessions.len(),
                total_activities: flat.activities.len(),
            };
            state.install_plan(flat, catalog);
            log_status(state);
            tracing::info!(
                plan_id = %summary.plan_id,
                total_activities = summary.total_activities,
                "Plan loaded"
            );
            Ok(summary)
        }
        Err(e) => {
            state.set_status(PlanStatus::Failed {
                error: e.to_string(),
            });
            log_status(state);
            Err(e)
        }
    }
}

/// Load time and status aggregates for every activity of one day.
/// Idempotent: an already-loaded day issues zero network calls.
pub async fn ensure_day_loaded(
    state: &AppState,
    backend: &Arc<dyn PlanBackend>,
    user_id: &str,
    plan_id: &str,
    day_index: usize,
) -> Result<(), PlanError> {
    require_ids(user_id, plan_id)?;

    let activities = state.flattened.read().clone();
    state
        .aggregator
        .load_day(user_id, plan_id, day_index, &activities, backend)
        .await?;

    // Newly fetched blobs may carry concepts no consumer has seen yet
    let mut seen = std::collections::HashSet::new();
    for activity in activities.iter().filter(|a| a.day_index == day_index) {
        if activity.sub_chapter_id.is_empty() || !seen.insert(activity.sub_chapter_id.clone()) {
            continue;
        }
        if let Some(blob) = state.aggregator.blob_for(&activity.sub_chapter_id) {
            forward_concepts(state, &activity.sub_chapter_id, &blob);
        }
    }
    Ok(())
}

/// Per-subchapter status, served from cache when a blob with concepts is
/// already present (unless forced). Concepts are always forwarded to the
/// catalog, cached or not.
pub async fn subchapter_status(
    state: &AppState,
    backend: &Arc<dyn PlanBackend>,
    user_id: &str,
    plan_id: &str,
    sub_chapter_id: &str,
    force: bool,
) -> Result<AggregatorBlob, PlanError> {
    require_ids(user_id, plan_id)?;
    if sub_chapter_id.trim().is_empty() {
        return Err(PlanError::new(
            "Missing required identifier: subchapterId",
            "validate",
        ));
    }

    let blob = state
        .aggregator
        .fetch_for_subchapter(user_id, plan_id, sub_chapter_id, force, backend)
        .await?;
    forward_concepts(state, sub_chapter_id, &blob);
    Ok(blob)
}

/// Convenience wrapper: always re-fetch.
pub async fn refresh_subchapter(
    state: &AppState,
    backend: &Arc<dyn PlanBackend>,
    user_id: &str,
    plan_id: &str,
    sub_chapter_id: &str,
) -> Result<AggregatorBlob, PlanError> {
    subchapter_status(state, backend, user_id, plan_id, sub_chapter_id, true).await
}

/// Record elapsed seconds against an activity on the backend, then fold the
/// authoritative total into the local time map (monotonic).
pub async fn record_time(
    state: &AppState,
    backend: &Arc<dyn PlanBackend>,
    activity_id: &str,
    kind: &str,
    delta_secs: u64,
) -> Result<u64, PlanError> {
    let total = backend
        .record_activity_time(activity_id, kind, delta_secs)
        .await?;
    state.aggregator.merge_time(activity_id, total);
    Ok(total)
}

/// Project the task at a flat index from the latest committed cache state.
/// None for any out-of-range index.
pub fn task_for_index(state: &AppState, index: i64) -> Option<Task> {
    let activity = state.activity_at(index)?;
    let revision = state.aggregator.revision();
    if let Some(task) = memo::get_cached_task(state, &activity.activity_id, revision) {
        return Some(task);
    }

    let blob = state.aggregator.blob_for(&activity.sub_chapter_id);
    let time_secs = state.aggregator.time_for(&activity.activity_id);
    let session_date = {
        let plan = state.plan.read();
        plan.as_ref().and_then(|doc| {
            doc.sessions
                .get(activity.day_index)
                .and_then(|s| doc.session_date(&s.session_label))
        })
    };

    let task = project(&activity, blob.as_ref(), time_secs, session_date);
    memo::store_task(state, &activity.activity_id, revision, &task);
    Some(task)
}

/// All task cards for one day, in flat-index order.
pub fn day_tasks(state: &AppState, day_index: usize) -> Vec<Task> {
    let indices: Vec<i64> = state
        .flattened
        .read()
        .iter()
        .filter(|a| a.day_index == day_index)
        .map(|a| a.flat_index as i64)
        .collect();
    indices
        .into_iter()
        .filter_map(|i| task_for_index(state, i))
        .collect()
}

pub fn select_task(state: &AppState, flat_index: i64) {
    cursor::select(state, flat_index);
}

pub fn advance_cursor(state: &AppState) -> i64 {
    cursor::advance(state)
}

pub fn current_task(state: &AppState) -> Option<Task> {
    task_for_index(state, state.current_index())
}

pub fn plan_catalog(state: &AppState) -> Catalog {
    state.catalog.read().clone()
}

pub fn plan_status(state: &AppState) -> PlanStatus {
    state.get_status()
}

fn require_ids(user_id: &str, plan_id: &str) -> Result<(), PlanError> {
    if user_id.trim().is_empty() {
        return Err(PlanError::new("Missing required identifier: userId", "validate"));
    }
    if plan_id.trim().is_empty() {
        return Err(PlanError::new("Missing required identifier: planId", "validate"));
    }
    Ok(())
}

fn forward_concepts(state: &AppState, sub_chapter_id: &str, blob: &AggregatorBlob) {
    let names = blob.concept_names();
    if !names.is_empty() {
        state.catalog.write().merge_concepts(sub_chapter_id, &names);
    }
}
