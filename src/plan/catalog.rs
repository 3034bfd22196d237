use std::collections::{BTreeMap, HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::plan::Activity;

/// book -> subject -> grouping -> chapter -> subchapter ids (first-occurrence order)
pub type Hierarchy = BTreeMap<String, BTreeMap<String, BTreeMap<String, BTreeMap<String, Vec<String>>>>>;

/// One row per distinct subchapter, denormalized for filter UIs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubChapterRow {
    pub sub_chapter_id: String,
    pub book: String,
    pub subject: String,
    pub grouping: String,
    pub chapter: String,
    pub sub_chapter: String,
}

impl SubChapterRow {
    fn sort_key(&self) -> String {
        format!(
            "{}|{}|{}|{}|{}",
            self.book, self.subject, self.grouping, self.chapter, self.sub_chapter
        )
    }
}

/// A discrete learning objective tied to a subchapter, individually tracked
/// for mastery. The (concept_name, sub_chapter_id) pair is unique.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Concept {
    pub concept_name: String,
    pub sub_chapter_id: String,
    pub book: String,
    pub subject: String,
    pub grouping: String,
    pub chapter: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Catalog {
    pub hierarchy: Hierarchy,
    pub sub_chapters: Vec<SubChapterRow>,
    pub concepts: Vec<Concept>,
}

impl Catalog {
    pub fn row_for(&self, sub_chapter_id: &str) -> Option<&SubChapterRow> {
        self.sub_chapters
            .iter()
            .find(|r| r.sub_chapter_id == sub_chapter_id)
    }

    /// Append concepts discovered by a later aggregator fetch. Duplicate
    /// (concept_name, sub_chapter_id) pairs are dropped; ordering stays
    /// sorted by concept name so repeated builds stay byte-identical.
    pub fn merge_concepts(&mut self, sub_chapter_id: &str, names: &[String]) {
        let row = match self.row_for(sub_chapter_id) {
            Some(row) => row.clone(),
            None => SubChapterRow {
                sub_chapter_id: sub_chapter_id.to_string(),
                ..Default::default()
            },
        };

        let mut seen: HashSet<(String, String)> = self
            .concepts
            .iter()
            .map(|c| (c.concept_name.clone(), c.sub_chapter_id.clone()))
            .collect();

        let mut added = 0usize;
        for name in names {
            if name.is_empty() {
                continue;
            }
            if !seen.insert((name.clone(), sub_chapter_id.to_string())) {
                continue;
            }
            self.concepts.push(Concept {
                concept_name: name.clone(),
                sub_chapter_id: sub_chapter_id.to_string(),
                book: row.book.clone(),
                subject: row.subject.clone(),
                grouping: row.grouping.clone(),
                chapter: row.chapter.clone(),
            });
            added += 1;
        }

        if added > 0 {
            sort_concepts(&mut self.concepts);
            tracing::debug!(sub_chapter_id, added, "Concepts merged into catalog");
        }
    }
}

/// Derive the browsing catalog from the flattened activity sequence, plus
/// any concepts already known (sub_chapter_id -> concept names).
/// Deterministic: the same input always yields the same output, order
/// included.
pub fn build_catalog(
    activities: &[Activity],
    extra_concepts: &HashMap<String, Vec<String>>,
) -> Catalog {
    let mut catalog = Catalog::default();
    let mut seen_sub_chapters: HashSet<String> = HashSet::new();

    for activity in activities {
        if activity.sub_chapter_id.is_empty() {
            continue;
        }

        let sub_chapter_ids = catalog
            .hierarchy
            .entry(activity.book_name.clone())
            .or_default()
            .entry(activity.subject.clone())
            .or_default()
            .entry(activity.grouping.clone())
            .or_default()
            .entry(activity.chapter_name.clone())
            .or_default();
        if !sub_chapter_ids.contains(&activity.sub_chapter_id) {
            sub_chapter_ids.push(activity.sub_chapter_id.clone());
        }

        // Deduplicated by first occurrence
        if seen_sub_chapters.insert(activity.sub_chapter_id.clone()) {
            let sub_chapter = if activity.sub_chapter_name.is_empty() {
                activity.sub_chapter_id.clone()
            } else {
                activity.sub_chapter_name.clone()
            };
            catalog.sub_chapters.push(SubChapterRow {
                sub_chapter_id: activity.sub_chapter_id.clone(),
                book: activity.book_name.clone(),
                subject: activity.subject.clone(),
                grouping: activity.grouping.clone(),
                chapter: activity.chapter_name.clone(),
                sub_chapter,
            });
        }
    }

    catalog.sub_chapters.sort_by_key(|r| r.sort_key());

    let mut sub_chapter_ids: Vec<&String> = extra_concepts.keys().collect();
    sub_chapter_ids.sort();
    for sub_chapter_id in sub_chapter_ids {
        let names = &extra_concepts[sub_chapter_id];
        catalog.merge_concepts(sub_chapter_id, names);
    }
    sort_concepts(&mut catalog.concepts);

    catalog
}

fn sort_concepts(concepts: &mut [Concept]) {
    concepts.sort_by(|a, b| {
        a.concept_name
            .cmp(&b.concept_name)
            .then_with(|| a.sub_chapter_id.cmp(&b.sub_chapter_id))
    });
}
