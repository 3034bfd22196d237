use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};

pub mod catalog;
pub mod flatten;
pub mod timestamp;

/// Raw plan document as served by the backend. Treated as immutable per
/// fetch and replaced wholesale on re-fetch.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PlanDocument {
    pub id: String,
    pub sessions: Vec<Session>,
    /// mastery | revision | glance | onboarding
    pub level: String,
    pub book_id: String,
    #[serde(deserialize_with = "timestamp::deserialize_flexible")]
    pub created_at: Option<DateTime<Utc>>,
}

impl PlanDocument {
    pub fn total_activity_count(&self) -> usize {
        self.sessions.iter().map(|s| s.activities.len()).sum()
    }

    /// Calendar date of a session: plan creation date plus (label - 1) days.
    /// Labels that do not parse as a day number count as day 1.
    pub fn session_date(&self, session_label: &str) -> Option<NaiveDate> {
        let created = self.created_at?;
        let day: i64 = session_label.trim().parse().unwrap_or(1);
        Some(created.date_naive() + Duration::days(day.saturating_sub(1)))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Session {
    /// 1-based day number; arrives as a string or a bare number
    #[serde(deserialize_with = "deserialize_label")]
    pub session_label: String,
    pub activities: Vec<Activity>,
}

/// One schedulable unit in a plan: a reading, a quiz stage, or a guide.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Activity {
    pub activity_id: String,
    /// read | quiz | guide (normalized to lowercase by the flattener)
    #[serde(rename = "type")]
    pub kind: String,
    /// Bloom stage for quizzes; copied verbatim, novel values pass through
    pub quiz_stage: String,
    pub sub_chapter_id: String,
    pub sub_chapter_name: String,
    pub chapter_name: String,
    pub book_name: String,
    pub subject: String,
    pub grouping: String,
    /// Estimated minutes for this activity
    pub time_needed: u32,
    pub completed: bool,
    pub deferred: bool,
    pub aggregator_status: Option<String>,
    /// Position across all sessions in document order, assigned by the flattener
    pub flat_index: usize,
    /// Session position, assigned by the flattener
    pub day_index: usize,
}

/// Session labels arrive as "3" or 3 depending on the writer; keep them as
/// strings internally.
fn deserialize_label<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::String(s) => s,
        serde_json::Value::Number(n) => n.to_string(),
        _ => String::new(),
    })
}
