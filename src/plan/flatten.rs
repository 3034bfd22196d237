use crate::plan::{Activity, PlanDocument};

/// Result of one flattening pass: the plan with indices written back, plus
/// the flat addressable activity sequence.
#[derive(Debug, Clone, Default)]
pub struct FlattenedPlan {
    pub doc: PlanDocument,
    pub activities: Vec<Activity>,
}

/// Walk the nested plan once, assigning each activity a stable sequential
/// index and normalizing its kind and quiz stage. Pure: a missing or empty
/// `sessions` list yields an empty flat sequence, not an error.
pub fn flatten_plan(mut doc: PlanDocument) -> FlattenedPlan {
    let mut activities = Vec::with_capacity(doc.total_activity_count());
    let mut flat_index = 0usize;

    for (day_index, session) in doc.sessions.iter_mut().enumerate() {
        for activity in session.activities.iter_mut() {
            activity.kind = normalize_kind(&activity.kind);
            if activity.kind == "quiz" {
                // Lowercased verbatim: novel stage values pass through
                activity.quiz_stage = activity.quiz_stage.trim().to_lowercase();
            }
            activity.flat_index = flat_index;
            activity.day_index = day_index;
            flat_index += 1;
            activities.push(activity.clone());
        }
    }

    tracing::debug!(
        plan_id = %doc.id,
        total = activities.len(),
        days = doc.sessions.len(),
        "Plan flattened"
    );

    FlattenedPlan { doc, activities }
}

fn normalize_kind(raw: &str) -> String {
    let kind = raw.trim().to_lowercase();
    if kind.is_empty() {
        "read".to_string()
    } else {
        kind
    }
}
