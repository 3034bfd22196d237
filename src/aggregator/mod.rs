use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::plan::timestamp;

pub mod cache;

pub use cache::AggregatorCache;

/// Backend-computed rollup of a learner's attempts and time for one
/// subchapter. Mutated only by shallow-merging whole fetch results; the UI
/// never writes into it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AggregatorBlob {
    pub quiz_stages_data: HashMap<String, StageData>,
    pub task_info: Vec<StageTaskInfo>,
    pub reading_summary: Option<ReadingSummary>,
}

impl AggregatorBlob {
    /// Concept names across all stages, first-occurrence order, deduplicated.
    pub fn concept_names(&self) -> Vec<String> {
        let mut names = Vec::new();
        let mut stages: Vec<&String> = self.quiz_stages_data.keys().collect();
        stages.sort();
        for stage in stages {
            for name in &self.quiz_stages_data[stage].concepts {
                if !names.contains(name) {
                    names.push(name.clone());
                }
            }
        }
        names
    }

    pub fn has_concepts(&self) -> bool {
        self.quiz_stages_data.values().any(|s| !s.concepts.is_empty())
    }

    /// Shallow merge of a fetch result: present fields overwrite, absent
    /// fields keep their previously cached values. Idempotent, so racing
    /// fetches for the same id are safe (same source of truth).
    pub fn apply(&mut self, patch: AggregatorPatch) {
        if let Some(stages) = patch.quiz_stages_data {
            for (stage, data) in stages {
                self.quiz_stages_data.insert(stage, data);
            }
        }
        if let Some(task_info) = patch.task_info {
            self.task_info = task_info;
        }
        if let Some(reading_summary) = patch.reading_summary {
            self.reading_summary = Some(reading_summary);
        }
    }
}

/// Wire shape of one subchapter-status response. Fields the backend omitted
/// stay None and do not erase cached data on merge.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AggregatorPatch {
    pub quiz_stages_data: Option<HashMap<String, StageData>>,
    pub task_info: Option<Vec<StageTaskInfo>>,
    pub reading_summary: Option<ReadingSummary>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StageData {
    pub quiz_attempts: Vec<Attempt>,
    pub revision_attempts: Vec<Attempt>,
    pub all_attempts_concept_stats: Vec<AttemptConceptStats>,
    #[serde(deserialize_with = "deserialize_concept_list")]
    pub concepts: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Attempt {
    pub attempt_number: u32,
    #[serde(deserialize_with = "timestamp::deserialize_flexible")]
    pub timestamp: Option<DateTime<Utc>>,
    pub score: Option<f64>,
}

/// Concept pass/fail outcomes recorded for one historical attempt.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AttemptConceptStats {
    pub attempt_label: String,
    pub concept_stats: Vec<ConceptStat>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConceptStat {
    pub concept_name: String,
    pub passed: bool,
}

/// Lock and status per Bloom stage, as computed by the backend.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StageTaskInfo {
    pub stage_label: String,
    pub locked: bool,
    pub status: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ReadingSummary {
    pub completed: bool,
    #[serde(alias = "pct")]
    pub percent: Option<f64>,
}

/// Concept lists arrive as plain strings or as `{conceptName}` /
/// `{name}` objects depending on the writer.
fn deserialize_concept_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let values = Vec::<serde_json::Value>::deserialize(deserializer)?;
    let mut names = Vec::with_capacity(values.len());
    for value in values {
        match value {
            serde_json::Value::String(s) => names.push(s),
            serde_json::Value::Object(map) => {
                if let Some(name) = map
                    .get("conceptName")
                    .or_else(|| map.get("name"))
                    .and_then(serde_json::Value::as_str)
                {
                    names.push(name.to_string());
                }
            }
            _ => {}
        }
    }
    Ok(names)
}
