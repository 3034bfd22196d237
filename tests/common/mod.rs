#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;

use plandeck::aggregator::AggregatorPatch;
use plandeck::backend::PlanBackend;
use plandeck::error::PlanError;
use plandeck::plan::PlanDocument;

/// In-memory backend with per-endpoint call counters, so tests can assert
/// exactly how many network calls an operation issued.
#[derive(Default)]
pub struct FakeBackend {
    pub plan: RwLock<Option<PlanDocument>>,
    pub times: RwLock<HashMap<String, u64>>,
    pub statuses: RwLock<HashMap<String, AggregatorPatch>>,
    pub failing_subchapters: RwLock<HashSet<String>>,
    pub plan_calls: AtomicUsize,
    pub time_calls: AtomicUsize,
    pub status_calls: AtomicUsize,
    pub increment_calls: AtomicUsize,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_plan(self, doc: PlanDocument) -> Self {
        *self.plan.write() = Some(doc);
        self
    }

    pub fn with_time(self, activity_id: &str, seconds: u64) -> Self {
        self.times.write().insert(activity_id.to_string(), seconds);
        self
    }

    pub fn with_status(self, sub_chapter_id: &str, patch: AggregatorPatch) -> Self {
        self.statuses
            .write()
            .insert(sub_chapter_id.to_string(), patch);
        self
    }

    pub fn failing(self, sub_chapter_id: &str) -> Self {
        self.failing_subchapters
            .write()
            .insert(sub_chapter_id.to_string());
        self
    }

    pub fn into_backend(self) -> Arc<dyn PlanBackend> {
        Arc::new(self)
    }

    pub fn status_call_count(&self) -> usize {
        self.status_calls.load(Ordering::SeqCst)
    }

    pub fn time_call_count(&self) -> usize {
        self.time_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PlanBackend for FakeBackend {
    async fn plan_document(&self, plan_id: &str) -> Result<PlanDocument, PlanError> {
        self.plan_calls.fetch_add(1, Ordering::SeqCst);
        self.plan
            .read()
            .clone()
            .ok_or_else(|| PlanError::new(format!("No plan for {}", plan_id), "fetch"))
    }

    async fn activity_time(&self, activity_id: &str, _kind: &str) -> Result<u64, PlanError> {
        self.time_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .times
            .read()
            .get(activity_id)
            .copied()
            .unwrap_or_default())
    }

    async fn subchapter_status(
        &self,
        _user_id: &str,
        _plan_id: &str,
        sub_chapter_id: &str,
    ) -> Result<AggregatorPatch, PlanError> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        if self.failing_subchapters.read().contains(sub_chapter_id) {
            return Err(PlanError::new(
                format!("Simulated failure for {}", sub_chapter_id),
                "fetch",
            ));
        }
        Ok(self
            .statuses
            .read()
            .get(sub_chapter_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn record_activity_time(
        &self,
        activity_id: &str,
        _kind: &str,
        delta_secs: u64,
    ) -> Result<u64, PlanError> {
        self.increment_calls.fetch_add(1, Ordering::SeqCst);
        let mut times = self.times.write();
        let total = times.entry(activity_id.to_string()).or_insert(0);
        *total += delta_secs;
        Ok(*total)
    }
}

/// Two-day plan: day 1 has a reading plus a remember-stage quiz on the same
/// subchapter, day 2 has an apply-stage quiz on a second subchapter.
pub fn sample_plan() -> PlanDocument {
    serde_json::from_value(serde_json::json!({
        "id": "plan-1",
        "level": "mastery",
        "bookId": "book-1",
        "createdAt": "2024-03-10T00:00:00Z",
        "sessions": [
            {
                "sessionLabel": "1",
                "activities": [
                    {
                        "activityId": "a1",
                        "type": "READ",
                        "subChapterId": "s1",
                        "subChapterName": "Newton's Laws",
                        "chapterName": "Mechanics",
                        "bookName": "Physics 101",
                        "subject": "Physics",
                        "grouping": "Core",
                        "timeNeeded": 10
                    },
                    {
                        "activityId": "a2",
                        "type": "quiz",
                        "quizStage": "Remember",
                        "subChapterId": "s1",
                        "subChapterName": "Newton's Laws",
                        "chapterName": "Mechanics",
                        "bookName": "Physics 101",
                        "subject": "Physics",
                        "grouping": "Core",
                        "timeNeeded": 5
                    }
                ]
            },
            {
                "sessionLabel": 2,
                "activities": [
                    {
                        "activityId": "a3",
                        "type": "quiz",
                        "quizStage": "apply",
                        "subChapterId": "s2",
                        "subChapterName": "Energy",
                        "chapterName": "Mechanics",
                        "bookName": "Physics 101",
                        "subject": "Physics",
                        "grouping": "Core",
                        "timeNeeded": 8
                    }
                ]
            }
        ]
    }))
    .expect("sample plan deserializes")
}

/// Remember-stage status for s1: three concepts, one passed, one quiz
/// attempt on the given day.
pub fn remember_status(attempt_day: &str) -> AggregatorPatch {
    serde_json::from_value(serde_json::json!({
        "quizStagesData": {
            "remember": {
                "quizAttempts": [
                    { "attemptNumber": 1, "timestamp": attempt_day, "score": 33.0 }
                ],
                "revisionAttempts": [],
                "allAttemptsConceptStats": [
                    {
                        "attemptLabel": "Q1",
                        "conceptStats": [
                            { "conceptName": "Inertia", "passed": true },
                            { "conceptName": "Momentum", "passed": false },
                            { "conceptName": "Friction", "passed": false }
                        ]
                    }
                ],
                "concepts": ["Inertia", "Momentum", "Friction"]
            }
        },
        "taskInfo": [
            { "stageLabel": "remember", "locked": false, "status": "active" }
        ]
    }))
    .expect("status patch deserializes")
}
