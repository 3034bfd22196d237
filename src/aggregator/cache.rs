use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::task::JoinSet;

use crate::aggregator::{AggregatorBlob, AggregatorPatch};
use crate::backend::PlanBackend;
use crate::config::get_backend_config;
use crate::error::PlanError;
use crate::metrics::Metrics;
use crate::plan::Activity;

/// Shared cache of per-activity elapsed time and per-subchapter status,
/// filled lazily per visible day or per subchapter. All writers go through
/// the merge methods here; reads always see the last committed batch.
#[derive(Clone)]
pub struct AggregatorCache {
    time_map: Arc<RwLock<HashMap<String, u64>>>,
    subchapters: Arc<RwLock<HashMap<String, AggregatorBlob>>>,
    loaded_days: Arc<RwLock<HashSet<usize>>>,
    errors: Arc<RwLock<HashMap<String, String>>>,
    revision: Arc<AtomicU64>,
    metrics: Metrics,
}

enum FetchJob {
    Time { activity_id: String, kind: String },
    Status { sub_chapter_id: String },
}

enum FetchOutcome {
    Time(String, u64),
    TimeFailed(String, String),
    Status(String, AggregatorPatch),
    StatusFailed(String, String),
}

impl AggregatorCache {
    pub fn new(metrics: Metrics) -> Self {
        AggregatorCache {
            time_map: Arc::new(RwLock::new(HashMap::new())),
            subchapters: Arc::new(RwLock::new(HashMap::new())),
            loaded_days: Arc::new(RwLock::new(HashSet::new())),
            errors: Arc::new(RwLock::new(HashMap::new())),
            revision: Arc::new(AtomicU64::new(0)),
            metrics,
        }
    }

    /// Monotonically increasing counter, bumped once per committed merge.
    /// Consumers key memoized projections off it.
    pub fn revision(&self) -> u64 {
        self.revision.load(Ordering::Relaxed)
    }

    pub fn is_day_loaded(&self, day_index: usize) -> bool {
        self.loaded_days.read().contains(&day_index)
    }

    /// Elapsed seconds for an activity; unknown ids read as 0.
    pub fn time_for(&self, activity_id: &str) -> u64 {
        self.time_map.read().get(activity_id).copied().unwrap_or(0)
    }

    pub fn blob_for(&self, sub_chapter_id: &str) -> Option<AggregatorBlob> {
        self.subchapters.read().get(sub_chapter_id).cloned()
    }

    /// Last recorded fetch error per subchapter; cleared by the next
    /// successful fetch for that id.
    pub fn error_for(&self, sub_chapter_id: &str) -> Option<String> {
        self.errors.read().get(sub_chapter_id).cloned()
    }

    pub fn errors(&self) -> HashMap<String, String> {
        self.errors.read().clone()
    }

    /// Elapsed time never decreases: keep the larger of old and new.
    pub fn merge_time(&self, activity_id: &str, seconds: u64) {
        let mut time_map = self.time_map.write();
        let entry = time_map.entry(activity_id.to_string()).or_insert(0);
        if seconds > *entry {
            *entry = seconds;
        }
        drop(time_map);
        self.bump_revision();
    }

    pub fn add_time(&self, activity_id: &str, delta_secs: u64) {
        let mut time_map = self.time_map.write();
        *time_map.entry(activity_id.to_string()).or_insert(0) += delta_secs;
        drop(time_map);
        self.bump_revision();
    }

    /// Forget which days were loaded (a new plan changes day composition).
    /// The id-keyed time and status maps stay: merges are idempotent and
    /// keyed by id, not by the current view.
    pub fn reset_days(&self) {
        self.loaded_days.write().clear();
    }

    /// Fetch time and status for every activity of one day, concurrently,
    /// and commit the results as a single state transition. Idempotent: an
    /// already-loaded day issues zero network calls.
    pub async fn load_day(
        &self,
        user_id: &str,
        plan_id: &str,
        day_index: usize,
        activities: &[Activity],
        source: &Arc<dyn PlanBackend>,
    ) -> Result<(), PlanError> {
        if self.is_day_loaded(day_index) {
            self.metrics.record_cache_hit();
            return Ok(());
        }
        self.metrics.record_cache_miss();

        let mut jobs: Vec<FetchJob> = Vec::new();
        let mut seen_subs: HashSet<String> = HashSet::new();
        for activity in activities.iter().filter(|a| a.day_index == day_index) {
            if !activity.activity_id.is_empty() {
                jobs.push(FetchJob::Time {
                    activity_id: activity.activity_id.clone(),
                    kind: activity.kind.clone(),
                });
            }
            if !activity.sub_chapter_id.is_empty() && seen_subs.insert(activity.sub_chapter_id.clone())
            {
                jobs.push(FetchJob::Status {
                    sub_chapter_id: activity.sub_chapter_id.clone(),
                });
            }
        }

        let outcomes = self.run_jobs(user_id, plan_id, jobs, source).await;

        // One commit per resolved batch: no reader sees a torn merge.
        {
            let mut time_map = self.time_map.write();
            let mut subchapters = self.subchapters.write();
            let mut errors = self.errors.write();
            for outcome in outcomes {
                match outcome {
                    FetchOutcome::Time(id, seconds) => {
                        let entry = time_map.entry(id).or_insert(0);
                        if seconds > *entry {
                            *entry = seconds;
                        }
                    }
                    FetchOutcome::TimeFailed(id, _) => {
                        time_map.entry(id).or_insert(0);
                    }
                    FetchOutcome::Status(id, patch) => {
                        subchapters.entry(id.clone()).or_default().apply(patch);
                        errors.remove(&id);
                    }
                    FetchOutcome::StatusFailed(id, message) => {
                        subchapters.entry(id.clone()).or_default();
                        errors.insert(id, message);
                    }
                }
            }
            self.loaded_days.write().insert(day_index);
        }
        self.bump_revision();
        self.metrics.record_batch_commit();

        tracing::info!(day_index, "Day aggregates loaded");
        Ok(())
    }

    /// Return the cached blob when it already carries concepts (unless
    /// forced); otherwise fetch and shallow-merge. A fetch failure defaults
    /// to the cached (possibly empty) blob and records the error for the id.
    pub async fn fetch_for_subchapter(
        &self,
        user_id: &str,
        plan_id: &str,
        sub_chapter_id: &str,
        force: bool,
        source: &Arc<dyn PlanBackend>,
    ) -> Result<AggregatorBlob, PlanError> {
        if !force {
            let cached = self.blob_for(sub_chapter_id);
            if let Some(blob) = cached {
                if blob.has_concepts() {
                    self.metrics.record_cache_hit();
                    return Ok(blob);
                }
            }
        }
        self.metrics.record_cache_miss();
        self.metrics.record_fetch();

        match source
            .subchapter_status(user_id, plan_id, sub_chapter_id)
            .await
        {
            Ok(patch) => {
                let blob = {
                    let mut subchapters = self.subchapters.write();
                    let blob = subchapters.entry(sub_chapter_id.to_string()).or_default();
                    blob.apply(patch);
                    blob.clone()
                };
                self.errors.write().remove(sub_chapter_id);
                self.bump_revision();
                Ok(blob)
            }
            Err(e) => {
                tracing::warn!(
                    sub_chapter_id,
                    error = %e,
                    "Subchapter status fetch failed, serving cached/empty blob"
                );
                self.metrics.record_fetch_failure();
                self.errors
                    .write()
                    .insert(sub_chapter_id.to_string(), e.to_string());
                let blob = {
                    let mut subchapters = self.subchapters.write();
                    subchapters
                        .entry(sub_chapter_id.to_string())
                        .or_default()
                        .clone()
                };
                self.bump_revision();
                Ok(blob)
            }
        }
    }

    /// Always re-fetch, bypassing the cached-concepts short-circuit.
    pub async fn refresh_subchapter(
        &self,
        user_id: &str,
        plan_id: &str,
        sub_chapter_id: &str,
        source: &Arc<dyn PlanBackend>,
    ) -> Result<AggregatorBlob, PlanError> {
        self.fetch_for_subchapter(user_id, plan_id, sub_chapter_id, true, source)
            .await
    }

    /// Fan-out/fan-in with a bounded number of in-flight requests. Each
    /// failure is caught locally so one bad id never aborts the batch.
    async fn run_jobs(
        &self,
        user_id: &str,
        plan_id: &str,
        jobs: Vec<FetchJob>,
        source: &Arc<dyn PlanBackend>,
    ) -> Vec<FetchOutcome> {
        let limit = get_backend_config().fan_out_limit.max(1);
        let mut outcomes = Vec::with_capacity(jobs.len());

        for wave in jobs.chunks(limit) {
            let mut set: JoinSet<FetchOutcome> = JoinSet::new();
            for job in wave {
                self.metrics.record_fetch();
                let source = Arc::clone(source);
                let user_id = user_id.to_string();
                let plan_id = plan_id.to_string();
                match job {
                    FetchJob::Time { activity_id, kind } => {
                        let activity_id = activity_id.clone();
                        let kind = kind.clone();
                        set.spawn(async move {
                            match source.activity_time(&activity_id, &kind).await {
                                Ok(seconds) => FetchOutcome::Time(activity_id, seconds),
                                Err(e) => FetchOutcome::TimeFailed(activity_id, e.to_string()),
                            }
                        });
                    }
                    FetchJob::Status { sub_chapter_id } => {
                        let sub_chapter_id = sub_chapter_id.clone();
                        set.spawn(async move {
                            match source
                                .subchapter_status(&user_id, &plan_id, &sub_chapter_id)
                                .await
                            {
                                Ok(patch) => FetchOutcome::Status(sub_chapter_id, patch),
                                Err(e) => FetchOutcome::StatusFailed(sub_chapter_id, e.to_string()),
                            }
                        });
                    }
                }
            }

            while let Some(joined) = set.join_next().await {
                match joined {
                    Ok(outcome) => {
                        if let FetchOutcome::TimeFailed(id, message)
                        | FetchOutcome::StatusFailed(id, message) = &outcome
                        {
                            tracing::warn!(
                                id = %id,
                                error = %message,
                                "Per-id fetch failed, defaulting to empty"
                            );
                            self.metrics.record_fetch_failure();
                        }
                        outcomes.push(outcome);
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "Fetch task panicked or was cancelled");
                        self.metrics.record_fetch_failure();
                    }
                }
            }
        }

        outcomes
    }

    fn bump_revision(&self) {
        self.revision.fetch_add(1, Ordering::Relaxed);
    }
}
