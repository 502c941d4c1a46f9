//! Frequency tables and numeric summaries over flat survey records.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;

use super::stats::Descriptive;
use crate::types::{value_to_key, FlatRecord};

/// Fields that identify or timestamp a record rather than describe a participant.
const NON_DESCRIPTIVE_FIELDS: &[&str] = &[
    "id",
    "created_at",
    "updated_at",
    "participant_id",
    "participant_number",
    "sample_code",
];

/// `field -> value -> count`
pub type FrequencyTable = BTreeMap<String, BTreeMap<String, usize>>;

/// Count every descriptive field value across demographic records.
///
/// Values are compared as strings so booleans, numbers and text collapse
/// consistently. Null answers are skipped.
pub fn demographic_distribution(records: &[FlatRecord]) -> FrequencyTable {
    let mut table = FrequencyTable::new();
    for record in records {
        for (field, value) in record.fields() {
            if NON_DESCRIPTIVE_FIELDS.contains(&field.as_str()) {
                continue;
            }
            let Some(key) = value_to_key(value) else {
                continue;
            };
            *table
                .entry(field.clone())
                .or_default()
                .entry(key)
                .or_insert(0) += 1;
        }
    }
    table
}

/// Counts of `true` and `false` answers for one boolean field.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BooleanTally {
    #[serde(rename = "true")]
    pub true_count: usize,
    #[serde(rename = "false")]
    pub false_count: usize,
}

impl BooleanTally {
    pub fn total(&self) -> usize {
        self.true_count + self.false_count
    }

    /// Share of `true` answers, 0-100.
    pub fn true_pct(&self) -> f64 {
        super::stats::ratio(self.true_count as f64, self.total() as f64) * 100.0
    }
}

/// Boolean and numeric breakdown of a questionnaire stream.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseAnalysis {
    pub total_responses: usize,
    pub boolean_fields: BTreeMap<String, BooleanTally>,
    pub numeric_fields: BTreeMap<String, Descriptive>,
}

/// Tally boolean fields and summarise numeric fields.
///
/// Numeric fields whose name contains `id` (and the participant key) are
/// identifiers, not measurements, and are left out.
pub fn analyze_responses(records: &[FlatRecord]) -> ResponseAnalysis {
    let mut boolean_fields: BTreeMap<String, BooleanTally> = BTreeMap::new();
    let mut numeric_values: BTreeMap<String, Vec<f64>> = BTreeMap::new();

    for record in records {
        for (field, value) in record.fields() {
            match value {
                Value::Bool(answer) => {
                    let tally = boolean_fields.entry(field.clone()).or_default();
                    if *answer {
                        tally.true_count += 1;
                    } else {
                        tally.false_count += 1;
                    }
                }
                Value::Number(n) => {
                    if field.contains("id") || field == "participant_number" {
                        continue;
                    }
                    if let Some(v) = n.as_f64().filter(|v| v.is_finite()) {
                        numeric_values.entry(field.clone()).or_default().push(v);
                    }
                }
                _ => {}
            }
        }
    }

    ResponseAnalysis {
        total_responses: records.len(),
        boolean_fields,
        numeric_fields: numeric_values
            .into_iter()
            .map(|(field, values)| (field, Descriptive::from_values(&values)))
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn records(values: Vec<Value>) -> Vec<FlatRecord> {
        values.into_iter().map(FlatRecord::from_value).collect()
    }

    #[test]
    fn test_demographic_distribution_excludes_identifiers() {
        let data = records(vec![
            json!({"id": 1, "created_at": "2024-01-01", "participant_id": "A", "sample_code": "S1", "gender": "female", "age_group": "25-34"}),
            json!({"id": 2, "created_at": "2024-01-02", "participant_id": "B", "gender": "male", "age_group": "25-34"}),
            json!({"id": 3, "extra_field": null, "gender": "female"}),
        ]);
        let table = demographic_distribution(&data);

        for excluded in ["id", "created_at", "participant_id", "sample_code"] {
            assert!(!table.contains_key(excluded), "{excluded} should be excluded");
        }
        assert!(!table.contains_key("extra_field"));
        assert_eq!(table["gender"]["female"], 2);
        assert_eq!(table["gender"]["male"], 1);
        assert_eq!(table["age_group"]["25-34"], 2);
    }

    #[test]
    fn test_mixed_types_collapse_to_strings() {
        let data = records(vec![
            json!({"is_registered_nurse": true, "years": 5}),
            json!({"is_registered_nurse": "true", "years": "5"}),
        ]);
        let table = demographic_distribution(&data);
        assert_eq!(table["is_registered_nurse"]["true"], 2);
        assert_eq!(table["years"]["5"], 2);
    }

    #[test]
    fn test_analyze_responses_booleans_and_numbers() {
        let data = records(vec![
            json!({"participant_number": 11, "provides_consent": true, "who5_calm": 4, "device_id": 99}),
            json!({"participant_number": 12, "provides_consent": false, "who5_calm": 2}),
            json!({"participant_number": 13, "provides_consent": true, "who5_calm": 3, "notes": "ok"}),
        ]);
        let analysis = analyze_responses(&data);

        assert_eq!(analysis.total_responses, 3);
        let consent = analysis.boolean_fields["provides_consent"];
        assert_eq!(consent.true_count, 2);
        assert_eq!(consent.false_count, 1);
        assert!((consent.true_pct() - 200.0 / 3.0).abs() < 1e-9);

        let calm = analysis.numeric_fields["who5_calm"];
        assert_eq!(calm.count, 3);
        assert_eq!(calm.mean, 3.0);
        assert_eq!(calm.median, 3.0);
        assert_eq!(calm.min, 2.0);
        assert_eq!(calm.max, 4.0);

        assert!(!analysis.numeric_fields.contains_key("device_id"));
        assert!(!analysis.numeric_fields.contains_key("participant_number"));
        assert!(!analysis.numeric_fields.contains_key("notes"));
    }

    #[test]
    fn test_boolean_tally_serializes_true_false_keys() {
        let tally = BooleanTally {
            true_count: 4,
            false_count: 1,
        };
        assert_eq!(
            serde_json::to_value(tally).unwrap(),
            json!({"true": 4, "false": 1})
        );
    }

    #[test]
    fn test_empty_inputs() {
        assert!(demographic_distribution(&[]).is_empty());
        let analysis = analyze_responses(&[]);
        assert_eq!(analysis.total_responses, 0);
        assert!(analysis.boolean_fields.is_empty());
    }
}
