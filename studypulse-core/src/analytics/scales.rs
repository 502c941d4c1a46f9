//! Composite psychometric scores (WHO-5, PSS-4, Brief COPE).
//!
//! Composites are never stored by the backend; they are recomputed from the
//! item fields on every call. The questionnaire schema has been revised over
//! the course of the study, so each item lists every key name it has been
//! stored under and the first non-null one wins.

use std::collections::BTreeMap;

use serde::Serialize;

use super::stats::{self, Descriptive};
use crate::types::FlatRecord;

/// One questionnaire item.
struct Item {
    keys: &'static [&'static str],
    reversed: bool,
}

const fn item(keys: &'static [&'static str]) -> Item {
    Item {
        keys,
        reversed: false,
    }
}

const fn reversed(keys: &'static [&'static str]) -> Item {
    Item {
        keys,
        reversed: true,
    }
}

/// WHO-5 wellbeing index, items scored 0-5.
const WHO5_ITEMS: &[Item] = &[
    item(&["who5_cheerful", "who5_1"]),
    item(&["who5_calm", "who5_2"]),
    item(&["who5_active", "who5_3"]),
    item(&["who5_rested", "who5_4"]),
    item(&["who5_interested", "who5_5"]),
];

/// PSS-4 perceived stress, items scored 0-4; items 2 and 3 are positively worded.
const PSS4_ITEMS: &[Item] = &[
    item(&["pss_unable_to_control", "pss_1"]),
    reversed(&["pss_confident", "pss_2"]),
    reversed(&["pss_going_your_way", "pss_3"]),
    item(&["pss_difficulties_piling", "pss_4"]),
];
const PSS4_ITEM_MAX: f64 = 4.0;

/// Brief COPE items collected by the study, scored 1-4.
const COPE_ITEMS: &[Item] = &[
    item(&["cope_concentrating", "cope_concentrating_efforts"]),
    item(&["cope_taking_action"]),
    item(&["cope_planning", "cope_making_plan"]),
    item(&["cope_emotional_support"]),
    item(&["cope_positive_reframing"]),
    item(&["cope_acceptance"]),
];

/// Item values in order, or `None` if any item is missing.
fn all_items(record: &FlatRecord, items: &[Item], item_max: f64) -> Option<Vec<f64>> {
    items
        .iter()
        .map(|item| {
            record
                .first_f64(item.keys)
                .map(|v| if item.reversed { item_max - v } else { v })
        })
        .collect()
}

/// WHO-5 as a percentage (raw sum x 4, 0-100). Requires all five items.
pub fn who5_percentage(record: &FlatRecord) -> Option<f64> {
    all_items(record, WHO5_ITEMS, 5.0).map(|values| values.iter().sum::<f64>() * 4.0)
}

/// PSS-4 total (0-16) after reversing the positively worded items.
pub fn pss4_score(record: &FlatRecord) -> Option<f64> {
    all_items(record, PSS4_ITEMS, PSS4_ITEM_MAX).map(|values| values.iter().sum())
}

/// Mean of the Brief COPE items that were answered.
pub fn cope_score(record: &FlatRecord) -> Option<f64> {
    let answered: Vec<f64> = COPE_ITEMS
        .iter()
        .filter_map(|item| record.first_f64(item.keys))
        .collect();
    if answered.is_empty() {
        None
    } else {
        Some(stats::mean(&answered))
    }
}

/// The composites, keyed by their report name.
fn composites() -> [(&'static str, fn(&FlatRecord) -> Option<f64>); 3] {
    [
        ("who5", who5_percentage),
        ("pss4", pss4_score),
        ("briefCope", cope_score),
    ]
}

/// Descriptive statistics for every composite over a response stream.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompositeSummary {
    pub who5: Descriptive,
    pub pss4: Descriptive,
    pub brief_cope: Descriptive,
}

pub fn summarize_composites(records: &[FlatRecord]) -> CompositeSummary {
    let describe = |score: fn(&FlatRecord) -> Option<f64>| {
        let values: Vec<f64> = records.iter().filter_map(score).collect();
        Descriptive::from_values(&values)
    };
    CompositeSummary {
        who5: describe(who5_percentage),
        pss4: describe(pss4_score),
        brief_cope: describe(cope_score),
    }
}

/// Paired change for one composite.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreChange {
    pub pairs: usize,
    pub pre_mean: f64,
    pub post_mean: f64,
    pub mean_change: f64,
}

/// Latest response per participant.
fn latest_by_participant(records: &[FlatRecord]) -> BTreeMap<String, &FlatRecord> {
    let mut latest: BTreeMap<String, &FlatRecord> = BTreeMap::new();
    for record in records {
        let Some(key) = record.participant_key() else {
            continue;
        };
        match latest.get(&key) {
            Some(existing) if existing.created_at() > record.created_at() => {}
            _ => {
                latest.insert(key, record);
            }
        }
    }
    latest
}

/// Pretest vs posttest composites for participants who completed both.
///
/// Keyed by composite name (`who5`, `pss4`, `briefCope`).
pub fn pre_post_comparison(
    pretest: &[FlatRecord],
    posttest: &[FlatRecord],
) -> BTreeMap<String, ScoreChange> {
    let pre = latest_by_participant(pretest);
    let post = latest_by_participant(posttest);

    composites()
        .into_iter()
        .map(|(name, score)| {
            let mut pre_values = Vec::new();
            let mut post_values = Vec::new();
            for (participant, pre_record) in &pre {
                let Some(post_record) = post.get(participant) else {
                    continue;
                };
                if let (Some(before), Some(after)) = (score(pre_record), score(post_record)) {
                    pre_values.push(before);
                    post_values.push(after);
                }
            }
            let pre_mean = stats::mean(&pre_values);
            let post_mean = stats::mean(&post_values);
            let change = ScoreChange {
                pairs: pre_values.len(),
                pre_mean,
                post_mean,
                mean_change: post_mean - pre_mean,
            };
            (name.to_string(), change)
        })
        .collect()
}
