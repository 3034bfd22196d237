use std::num::NonZeroUsize;
use std::sync::Arc;

use lru::LruCache;
use parking_lot::RwLock;

use crate::aggregator::AggregatorCache;
use crate::metrics::Metrics;
use crate::plan::catalog::Catalog;
use crate::plan::flatten::FlattenedPlan;
use crate::plan::{Activity, PlanDocument};
use crate::projector::Task;
use crate::state::status::PlanStatus;

/// Application-wide state container.
/// All mutable state is centralized here and passed explicitly to functions.
/// This eliminates global mutable state and lock-ordering hazards.
#[derive(Clone)]
pub struct AppState {
    /// Current plan document (replaced wholesale on each fetch)
    pub plan: Arc<RwLock<Option<PlanDocument>>>,
    /// Flat addressable activity sequence for the current plan
    pub flattened: Arc<RwLock<Vec<Activity>>>,
    /// Browsing catalog derived from the current plan
    pub catalog: Arc<RwLock<Catalog>>,
    /// Lazily filled time/status cache shared by all views
    pub aggregator: AggregatorCache,
    /// Navigation cursor into the flattened sequence (-1 = nothing selected)
    pub cursor: Arc<RwLock<i64>>,
    /// Top-level plan fetch status
    pub status: Arc<RwLock<PlanStatus>>,
    /// Memoized task projections (LRU with bounded size)
    pub task_memo: Arc<RwLock<LruCache<u64, Task>>>,
    pub metrics: Metrics,
}

impl AppState {
    pub fn new() -> Self {
        let metrics = Metrics::new();
        AppState {
            plan: Arc::new(RwLock::new(None)),
            flattened: Arc::new(RwLock::new(Vec::new())),
            catalog: Arc::new(RwLock::new(Catalog::default())),
            aggregator: AggregatorCache::new(metrics.clone()),
            cursor: Arc::new(RwLock::new(-1)),
            status: Arc::new(RwLock::new(PlanStatus::Idle)),
            task_memo: Arc::new(RwLock::new(LruCache::new(
                NonZeroUsize::new(256).expect("256 > 0"),
            ))),
            metrics,
        }
    }

    /// Install a freshly fetched plan: replaces the document, flat sequence
    /// and catalog, resets the cursor, and forgets which days were loaded
    /// (day composition may have changed).
    pub fn install_plan(&self, flat: FlattenedPlan, catalog: Catalog) {
        let fresh_cursor = if flat.activities.is_empty() { -1 } else { 0 };
        *self.flattened.write() = flat.activities;
        *self.plan.write() = Some(flat.doc);
        *self.catalog.write() = catalog;
        *self.cursor.write() = fresh_cursor;
        self.aggregator.reset_days();
        self.task_memo.write().clear();
        self.set_status(PlanStatus::Ready);
    }

    pub fn get_status(&self) -> PlanStatus {
        self.status.read().clone()
    }

    pub fn set_status(&self, status: PlanStatus) {
        *self.status.write() = status;
    }

    pub fn current_index(&self) -> i64 {
        *self.cursor.read()
    }

    /// Store the index as given, unclamped. Consumers reading past the end
    /// must treat out-of-range as "nothing selected".
    pub fn set_current_index(&self, index: i64) {
        *self.cursor.write() = index;
        self.metrics.record_cursor_move();
    }

    /// Unconditional +1; no bounds check at the point of increment.
    pub fn advance_cursor(&self) -> i64 {
        let mut cursor = self.cursor.write();
        *cursor += 1;
        self.metrics.record_cursor_move();
        *cursor
    }

    /// Activity at a flat index; None for any out-of-range value.
    pub fn activity_at(&self, index: i64) -> Option<Activity> {
        let index = usize::try_from(index).ok()?;
        self.flattened.read().get(index).cloned()
    }

    pub fn current_activity(&self) -> Option<Activity> {
        self.activity_at(self.current_index())
    }

    pub fn activity_count(&self) -> usize {
        self.flattened.read().len()
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}
