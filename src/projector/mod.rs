use std::collections::HashMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::aggregator::{AggregatorBlob, Attempt, AttemptConceptStats, StageData};
use crate::plan::Activity;

pub const READING_STAGE: &str = "reading";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    /// Aggregator blob for this subchapter has not arrived yet
    Loading,
    NotStarted,
    Partial,
    Completed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PassFail {
    Pass,
    Fail,
}

/// One attempt as shown in history lists: "Q1"/"R1" label plus its day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttemptRef {
    pub label: String,
    pub date: Option<String>,
}

/// Render-ready projection of one activity. Ephemeral: recomputed from the
/// latest committed cache state, never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub activity_id: String,
    pub sub_chapter_id: String,
    pub kind: String,
    pub stage_key: String,
    pub status: TaskStatus,
    pub pct: u8,
    pub mastered: usize,
    pub total: usize,
    pub locked: bool,
    pub time_spent_secs: u64,
    pub attempts_so_far: Vec<String>,
    pub attempts_before: Vec<AttemptRef>,
    pub attempts_today: Vec<AttemptRef>,
    pub attempts_after: Vec<AttemptRef>,
}

/// Stage addressed by an activity: quizzes use their Bloom stage verbatim,
/// everything else rolls up under reading.
pub fn stage_key(activity: &Activity) -> String {
    if activity.kind == "quiz" {
        activity.quiz_stage.clone()
    } else {
        READING_STAGE.to_string()
    }
}

/// Fold every historical attempt's concept outcomes into one pass/fail map.
/// PASS is sticky: once a concept passes, a later FAIL never downgrades it.
/// A concept covered by some attempt but never passed is FAIL.
pub fn fold_concept_attempts(stats: &[AttemptConceptStats]) -> HashMap<String, PassFail> {
    let mut outcome: HashMap<String, PassFail> = HashMap::new();
    for attempt in stats {
        for stat in &attempt.concept_stats {
            let entry = outcome
                .entry(stat.concept_name.clone())
                .or_insert(PassFail::Fail);
            if stat.passed {
                *entry = PassFail::Pass;
            }
        }
    }
    outcome
}

/// Combine one activity, its aggregator slice, and its time entry into a
/// render-ready task. Pure projection over committed state.
pub fn project(
    activity: &Activity,
    blob: Option<&AggregatorBlob>,
    time_spent_secs: u64,
    session_date: Option<NaiveDate>,
) -> Task {
    let stage = stage_key(activity);

    let blob = match blob {
        Some(blob) => blob,
        // Blob not arrived yet: distinguishable from "arrived but empty"
        None => return empty_task(activity, &stage, TaskStatus::Loading, time_spent_secs),
    };

    let locked = blob
        .task_info
        .iter()
        .find(|info| info.stage_label.eq_ignore_ascii_case(&stage))
        .map(|info| info.locked)
        .unwrap_or(false);

    let mut task = if activity.kind == "quiz" {
        project_quiz(activity, blob, &stage, session_date)
    } else {
        project_reading(activity, blob, &stage, time_spent_secs)
    };
    task.locked = locked;
    task.time_spent_secs = time_spent_secs;
    task
}

fn project_quiz(
    activity: &Activity,
    blob: &AggregatorBlob,
    stage: &str,
    session_date: Option<NaiveDate>,
) -> Task {
    let empty = StageData::default();
    let stage_data = blob.quiz_stages_data.get(stage).unwrap_or(&empty);

    let folded = fold_concept_attempts(&stage_data.all_attempts_concept_stats);
    let mastered = folded.values().filter(|v| **v == PassFail::Pass).count();
    let total = if stage_data.concepts.is_empty() {
        folded.len()
    } else {
        stage_data.concepts.len()
    };
    let pct = if total == 0 {
        0
    } else {
        (mastered as f64 / total as f64 * 100.0).round() as u8
    };

    let merged = merge_attempts(&stage_data.quiz_attempts, &stage_data.revision_attempts);
    let attempts_so_far: Vec<String> = merged.iter().map(|a| a.label.clone()).collect();
    let (attempts_before, attempts_today, attempts_after) = bucket_attempts(merged, session_date);

    let status = if pct == 100 && !activity.deferred {
        TaskStatus::Completed
    } else if pct < 100 && !attempts_today.is_empty() {
        TaskStatus::Partial
    } else {
        TaskStatus::NotStarted
    };

    Task {
        activity_id: activity.activity_id.clone(),
        sub_chapter_id: activity.sub_chapter_id.clone(),
        kind: activity.kind.clone(),
        stage_key: stage.to_string(),
        status,
        pct,
        mastered,
        total,
        locked: false,
        time_spent_secs: 0,
        attempts_so_far,
        attempts_before,
        attempts_today,
        attempts_after,
    }
}

fn project_reading(
    activity: &Activity,
    blob: &AggregatorBlob,
    stage: &str,
    time_spent_secs: u64,
) -> Task {
    let summary = blob.reading_summary.as_ref();
    let completed = activity.completed || summary.map(|s| s.completed).unwrap_or(false);
    let pct = if completed {
        100
    } else {
        summary
            .and_then(|s| s.percent)
            .map(|p| p.clamp(0.0, 100.0).round() as u8)
            .unwrap_or(0)
    };

    let status = if pct == 100 && !activity.deferred {
        TaskStatus::Completed
    } else if pct > 0 || time_spent_secs > 0 {
        TaskStatus::Partial
    } else {
        TaskStatus::NotStarted
    };

    Task {
        activity_id: activity.activity_id.clone(),
        sub_chapter_id: activity.sub_chapter_id.clone(),
        kind: activity.kind.clone(),
        stage_key: stage.to_string(),
        status,
        pct,
        mastered: 0,
        total: 0,
        locked: false,
        time_spent_secs,
        attempts_so_far: Vec::new(),
        attempts_before: Vec::new(),
        attempts_today: Vec::new(),
        attempts_after: Vec::new(),
    }
}

fn empty_task(activity: &Activity, stage: &str, status: TaskStatus, time_spent_secs: u64) -> Task {
    Task {
        activity_id: activity.activity_id.clone(),
        sub_chapter_id: activity.sub_chapter_id.clone(),
        kind: activity.kind.clone(),
        stage_key: stage.to_string(),
        status,
        pct: 0,
        mastered: 0,
        total: 0,
        locked: false,
        time_spent_secs,
        attempts_so_far: Vec::new(),
        attempts_before: Vec::new(),
        attempts_today: Vec::new(),
        attempts_after: Vec::new(),
    }
}

struct LabeledAttempt {
    label: String,
    date: Option<String>,
    sort_ts: i64,
}

/// Quiz and revision attempts merged into one sequence ordered by
/// timestamp; attempts without a timestamp sort first.
fn merge_attempts(quiz: &[Attempt], revision: &[Attempt]) -> Vec<LabeledAttempt> {
    let mut merged: Vec<LabeledAttempt> = Vec::with_capacity(quiz.len() + revision.len());
    for (position, attempt) in quiz.iter().enumerate() {
        merged.push(labeled("Q", position, attempt));
    }
    for (position, attempt) in revision.iter().enumerate() {
        merged.push(labeled("R", position, attempt));
    }
    merged.sort_by_key(|a| a.sort_ts);
    merged
}

fn labeled(prefix: &str, position: usize, attempt: &Attempt) -> LabeledAttempt {
    let number = if attempt.attempt_number > 0 {
        attempt.attempt_number as usize
    } else {
        position + 1
    };
    LabeledAttempt {
        label: format!("{}{}", prefix, number),
        date: attempt.timestamp.map(|ts| ts.date_naive().to_string()),
        sort_ts: attempt.timestamp.map(|ts| ts.timestamp()).unwrap_or(0),
    }
}

/// Partition attempts into before/today/after relative to the session day.
/// Both sides are ISO `YYYY-MM-DD`, so string equality and lexicographic
/// order are the day comparison.
fn bucket_attempts(
    merged: Vec<LabeledAttempt>,
    session_date: Option<NaiveDate>,
) -> (Vec<AttemptRef>, Vec<AttemptRef>, Vec<AttemptRef>) {
    let session_day = session_date.map(|d| d.to_string());
    let mut before = Vec::new();
    let mut today = Vec::new();
    let mut after = Vec::new();

    for attempt in merged {
        let attempt_ref = AttemptRef {
            label: attempt.label,
            date: attempt.date.clone(),
        };
        match (&attempt.date, &session_day) {
            (Some(day), Some(session)) if day == session => today.push(attempt_ref),
            (Some(day), Some(session)) if day.as_str() > session.as_str() => {
                after.push(attempt_ref)
            }
            // Undated attempts (and everything when the session day is
            // unknown) count as history
            _ => before.push(attempt_ref),
        }
    }

    (before, today, after)
}
