mod common;

use std::sync::Arc;

use chrono::NaiveDate;

use plandeck::aggregator::{AggregatorBlob, AggregatorPatch};
use plandeck::api;
use plandeck::backend::PlanBackend;
use plandeck::plan::Activity;
use plandeck::projector::{project, TaskStatus};
use plandeck::state::app::AppState;

use common::{remember_status, sample_plan, FakeBackend};

fn quiz_activity() -> Activity {
    Activity {
        activity_id: "a2".to_string(),
        kind: "quiz".to_string(),
        quiz_stage: "remember".to_string(),
        sub_chapter_id: "s1".to_string(),
        ..Default::default()
    }
}

fn blob_with_attempts(days: &[&str]) -> AggregatorBlob {
    let attempts: Vec<serde_json::Value> = days
        .iter()
        .enumerate()
        .map(|(i, day)| {
            serde_json::json!({ "attemptNumber": i + 1, "timestamp": day })
        })
        .collect();
    let patch: AggregatorPatch = serde_json::from_value(serde_json::json!({
        "quizStagesData": {
            "remember": {
                "quizAttempts": attempts,
                "concepts": ["Inertia"]
            }
        }
    }))
    .unwrap();
    let mut blob = AggregatorBlob::default();
    blob.apply(patch);
    blob
}

#[test]
fn attempts_bucket_before_today_after() {
    let blob = blob_with_attempts(&["2024-03-09", "2024-03-10", "2024-03-11"]);
    let session_date = NaiveDate::from_ymd_opt(2024, 3, 10);

    let task = project(&quiz_activity(), Some(&blob), 0, session_date);

    assert_eq!(task.attempts_before.len(), 1);
    assert_eq!(task.attempts_today.len(), 1);
    assert_eq!(task.attempts_after.len(), 1);
    assert_eq!(task.attempts_before[0].date.as_deref(), Some("2024-03-09"));
    assert_eq!(task.attempts_today[0].date.as_deref(), Some("2024-03-10"));
    assert_eq!(task.attempts_after[0].date.as_deref(), Some("2024-03-11"));
    assert_eq!(task.attempts_so_far, vec!["Q1", "Q2", "Q3"]);
}

#[test]
fn quiz_and_revision_attempts_merge_in_timestamp_order() {
    let patch: AggregatorPatch = serde_json::from_value(serde_json::json!({
        "quizStagesData": {
            "remember": {
                "quizAttempts": [
                    { "attemptNumber": 1, "timestamp": "2024-03-09T10:00:00Z" }
                ],
                "revisionAttempts": [
                    { "attemptNumber": 1, "timestamp": "2024-03-09T12:00:00Z" }
                ],
                "concepts": ["Inertia"]
            }
        }
    }))
    .unwrap();
    let mut blob = AggregatorBlob::default();
    blob.apply(patch);

    let task = project(
        &quiz_activity(),
        Some(&blob),
        0,
        NaiveDate::from_ymd_opt(2024, 3, 10),
    );
    assert_eq!(task.attempts_so_far, vec!["Q1", "R1"]);
}

#[tokio::test]
async fn day_scenario_one_passed_of_three_is_partial_with_today_attempt() {
    let fake = Arc::new(
        FakeBackend::new()
            .with_plan(sample_plan())
            .with_time("a1", 120)
            .with_status("s1", remember_status("2024-03-10")),
    );
    let backend: Arc<dyn PlanBackend> = fake.clone();
    let state = AppState::new();

    api::load_plan(&state, &backend, "plan-1").await.unwrap();
    api::ensure_day_loaded(&state, &backend, "u1", "plan-1", 0)
        .await
        .unwrap();

    let tasks = api::day_tasks(&state, 0);
    assert_eq!(tasks.len(), 2);

    let read_task = &tasks[0];
    assert_eq!(read_task.kind, "read");
    assert_eq!(read_task.stage_key, "reading");
    assert_eq!(read_task.time_spent_secs, 120);
    assert_eq!(read_task.status, TaskStatus::Partial);

    let quiz_task = &tasks[1];
    assert_eq!(quiz_task.pct, 33, "1 of 3 concepts mastered");
    assert_eq!(quiz_task.mastered, 1);
    assert_eq!(quiz_task.total, 3);
    // Session 1 falls on 2024-03-10 and the attempt is that day
    assert_eq!(quiz_task.status, TaskStatus::Partial);
}

#[tokio::test]
async fn day_scenario_without_today_attempt_is_notstarted() {
    let fake = Arc::new(
        FakeBackend::new()
            .with_plan(sample_plan())
            .with_status("s1", remember_status("2024-03-08")),
    );
    let backend: Arc<dyn PlanBackend> = fake.clone();
    let state = AppState::new();

    api::load_plan(&state, &backend, "plan-1").await.unwrap();
    api::ensure_day_loaded(&state, &backend, "u1", "plan-1", 0)
        .await
        .unwrap();

    let quiz_task = api::task_for_index(&state, 1).unwrap();
    assert_eq!(quiz_task.pct, 33);
    assert_eq!(quiz_task.status, TaskStatus::NotStarted);
    assert_eq!(quiz_task.attempts_before.len(), 1);
    assert!(quiz_task.attempts_today.is_empty());
}

#[tokio::test]
async fn unloaded_day_projects_as_loading() {
    let fake = Arc::new(FakeBackend::new().with_plan(sample_plan()));
    let backend: Arc<dyn PlanBackend> = fake.clone();
    let state = AppState::new();

    api::load_plan(&state, &backend, "plan-1").await.unwrap();

    // Day 2 was never loaded: its quiz has no blob yet
    let task = api::task_for_index(&state, 2).unwrap();
    assert_eq!(task.status, TaskStatus::Loading);
}

#[test]
fn full_mastery_completes_unless_deferred() {
    let patch: AggregatorPatch = serde_json::from_value(serde_json::json!({
        "quizStagesData": {
            "remember": {
                "allAttemptsConceptStats": [
                    {
                        "conceptStats": [
                            { "conceptName": "Inertia", "passed": true }
                        ]
                    }
                ],
                "concepts": ["Inertia"]
            }
        }
    }))
    .unwrap();
    let mut blob = AggregatorBlob::default();
    blob.apply(patch);

    let task = project(&quiz_activity(), Some(&blob), 0, None);
    assert_eq!(task.pct, 100);
    assert_eq!(task.status, TaskStatus::Completed);

    let mut deferred = quiz_activity();
    deferred.deferred = true;
    let task = project(&deferred, Some(&blob), 0, None);
    assert_eq!(task.status, TaskStatus::NotStarted);
}
