//! Dashboard filter context
//!
//! The dashboard's filter controls are captured in an immutable
//! [`FilterContext`] and applied with the pure [`apply_filters`] function.
//! The analytics engine only ever sees the filtered [`Dataset`].

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};
use crate::types::{value_to_key, Dataset, DateRange, FlatRecord, SessionRecord};

/// Which record stream a custom filter applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordStream {
    Sessions,
    Pretest,
    Posttest,
    Demographics,
}

impl RecordStream {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordStream::Sessions => "sessions",
            RecordStream::Pretest => "pretest",
            RecordStream::Posttest => "posttest",
            RecordStream::Demographics => "demographics",
        }
    }
}

impl std::str::FromStr for RecordStream {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "sessions" | "session" => Ok(RecordStream::Sessions),
            "pretest" => Ok(RecordStream::Pretest),
            "posttest" => Ok(RecordStream::Posttest),
            "demographics" | "demographic" => Ok(RecordStream::Demographics),
            _ => Err(format!("unknown record stream: {}", s)),
        }
    }
}

/// Comparison used by a [`FieldFilter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterOp {
    Equals,
    NotEquals,
    /// Case-insensitive substring match
    Contains,
    /// Numeric comparison
    GreaterThan,
    /// Numeric comparison
    LessThan,
}

impl FilterOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            FilterOp::Equals => "=",
            FilterOp::NotEquals => "!=",
            FilterOp::Contains => "~",
            FilterOp::GreaterThan => ">",
            FilterOp::LessThan => "<",
        }
    }
}

/// A custom predicate on one field of one record stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldFilter {
    pub stream: RecordStream,
    pub field: String,
    pub op: FilterOp,
    pub value: String,
}

impl FieldFilter {
    /// Evaluate against a field value. A missing field never matches.
    pub fn matches(&self, field: Option<&Value>) -> bool {
        let Some(actual) = field.and_then(value_to_key) else {
            return false;
        };
        match self.op {
            FilterOp::Equals => actual == self.value,
            FilterOp::NotEquals => actual != self.value,
            FilterOp::Contains => actual
                .to_lowercase()
                .contains(&self.value.to_lowercase()),
            FilterOp::GreaterThan | FilterOp::LessThan => {
                match (actual.parse::<f64>(), self.value.parse::<f64>()) {
                    (Ok(a), Ok(b)) if self.op == FilterOp::GreaterThan => a > b,
                    (Ok(a), Ok(b)) => a < b,
                    _ => false,
                }
            }
        }
    }
}

impl std::fmt::Display for FieldFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}.{}{}{}",
            self.stream.as_str(),
            self.field,
            self.op.symbol(),
            self.value
        )
    }
}

impl std::str::FromStr for FieldFilter {
    type Err = Error;

    /// Parse `stream.field<op>value`, e.g. `sessions.device_type=ios`.
    ///
    /// The operator is the first one to appear in the expression, so the
    /// value may itself contain operator characters.
    fn from_str(s: &str) -> Result<Self> {
        // `!=` is listed before `=` so it wins at the same position
        let ops = [
            ("!=", FilterOp::NotEquals),
            ("=", FilterOp::Equals),
            ("~", FilterOp::Contains),
            (">", FilterOp::GreaterThan),
            ("<", FilterOp::LessThan),
        ];
        let (at, symbol, op) = s
            .char_indices()
            .find_map(|(i, _)| {
                ops.iter()
                    .find(|(symbol, _)| s[i..].starts_with(symbol))
                    .map(|(symbol, op)| (i, *symbol, *op))
            })
            .ok_or_else(|| Error::Filter(format!("missing operator in '{}'", s)))?;

        let lhs = &s[..at];
        let value = &s[at + symbol.len()..];
        if matches!(op, FilterOp::GreaterThan | FilterOp::LessThan) && value.starts_with('=') {
            return Err(Error::Filter(format!(
                "unsupported operator '{}=' in '{}'",
                symbol, s
            )));
        }

        let (stream, field) = lhs
            .trim()
            .split_once('.')
            .ok_or_else(|| Error::Filter(format!("expected stream.field in '{}'", s)))?;
        let stream = stream.parse::<RecordStream>().map_err(Error::Filter)?;
        let field = field.trim();
        if field.is_empty() {
            return Err(Error::Filter(format!("empty field name in '{}'", s)));
        }

        Ok(Self {
            stream,
            field: field.to_string(),
            op,
            value: value.trim().to_string(),
        })
    }
}

/// Restrict to participants whose demographic field has a given value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DemographicPredicate {
    pub field: String,
    pub value: String,
}

impl DemographicPredicate {
    pub fn matches(&self, record: &FlatRecord) -> bool {
        record
            .get(&self.field)
            .and_then(value_to_key)
            .is_some_and(|v| v == self.value)
    }
}

/// Immutable snapshot of the dashboard's filter controls.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FilterContext {
    pub date_range: DateRange,
    pub participant: Option<String>,
    pub demographic: Option<DemographicPredicate>,
    #[serde(default)]
    pub custom: Vec<FieldFilter>,
}

impl FilterContext {
    pub fn new(date_range: DateRange) -> Self {
        Self {
            date_range,
            ..Default::default()
        }
    }

    /// Same filters with an unbounded date range.
    ///
    /// Hosts use this when the analytics engine should window sessions itself
    /// so the previous period stays visible for comparison.
    pub fn without_date_range(&self) -> Self {
        Self {
            date_range: DateRange::All,
            ..self.clone()
        }
    }

    fn filters_for(&self, stream: RecordStream) -> impl Iterator<Item = &FieldFilter> {
        self.custom.iter().filter(move |f| f.stream == stream)
    }

    fn in_range(&self, ts: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
        if !self.date_range.is_bounded() {
            return true;
        }
        ts.is_some_and(|ts| self.date_range.contains(ts, now))
    }
}

/// Apply a filter context to a dataset, producing a new dataset.
///
/// Inputs are never mutated. With a bounded date range, records outside
/// `[now - W, now]` or without a timestamp are dropped.
pub fn apply_filters(data: &Dataset, context: &FilterContext, now: DateTime<Utc>) -> Dataset {
    let participant_matches = |key: Option<&str>| match &context.participant {
        Some(wanted) => key == Some(wanted.as_str()),
        None => true,
    };

    // Participant selection ignores the date range: a demographic survey
    // submitted before the window still describes the participant
    let selected: Vec<&FlatRecord> = data
        .demographics
        .iter()
        .filter(|r| participant_matches(r.participant_key().as_deref()))
        .filter(|r| {
            context
                .demographic
                .as_ref()
                .map_or(true, |predicate| predicate.matches(r))
        })
        .filter(|r| {
            context
                .filters_for(RecordStream::Demographics)
                .all(|f| f.matches(r.get(&f.field)))
        })
        .collect();

    // The demographic predicate scopes every other stream to its participants
    let cohort: Option<HashSet<String>> = context.demographic.as_ref().map(|_| {
        selected
            .iter()
            .filter_map(|r| r.participant_key())
            .collect()
    });
    let in_cohort = |key: Option<&str>| match &cohort {
        Some(members) => key.is_some_and(|k| members.contains(k)),
        None => true,
    };

    let demographics: Vec<FlatRecord> = selected
        .into_iter()
        .filter(|r| context.in_range(r.created_at(), now))
        .cloned()
        .collect();

    let sessions: Vec<SessionRecord> = data
        .sessions
        .iter()
        .filter(|s| participant_matches(Some(&s.participant_number)))
        .filter(|s| in_cohort(Some(&s.participant_number)))
        .filter(|s| context.in_range(s.created_at, now))
        .filter(|s| {
            context
                .filters_for(RecordStream::Sessions)
                .all(|f| f.matches(s.field(&f.field).as_ref()))
        })
        .cloned()
        .collect();

    let responses = |records: &[FlatRecord], stream: RecordStream| -> Vec<FlatRecord> {
        records
            .iter()
            .filter(|r| {
                let key = r.participant_key();
                participant_matches(key.as_deref()) && in_cohort(key.as_deref())
            })
            .filter(|r| context.in_range(r.created_at(), now))
            .filter(|r| context.filters_for(stream).all(|f| f.matches(r.get(&f.field))))
            .cloned()
            .collect()
    };

    let filtered = Dataset {
        sessions,
        pretest: responses(&data.pretest, RecordStream::Pretest),
        posttest: responses(&data.posttest, RecordStream::Posttest),
        demographics,
    };

    tracing::debug!(
        range = %context.date_range,
        sessions_in = data.sessions.len(),
        sessions_out = filtered.sessions.len(),
        custom_filters = context.custom.len(),
        "Applied filter context"
    );

    filtered
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use serde_json::json;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 30, 12, 0, 0).unwrap()
    }

    fn session(participant: &str, days_ago: i64, device: &str) -> SessionRecord {
        SessionRecord {
            participant_number: participant.to_string(),
            duration_minutes: Some(10.0),
            created_at: Some(now() - Duration::days(days_ago)),
            device_type: Some(device.to_string()),
            session_type: None,
        }
    }

    fn record(value: serde_json::Value) -> FlatRecord {
        FlatRecord::from_value(value)
    }

    fn dataset() -> Dataset {
        Dataset {
            sessions: vec![
                session("A", 1, "ios"),
                session("A", 40, "ios"),
                session("B", 2, "android"),
                session("C", 3, "web"),
            ],
            pretest: vec![
                record(json!({"participant_number": "A", "who5_calm": 4, "created_at": "2024-06-01T00:00:00Z"})),
                record(json!({"participant_number": "B", "who5_calm": 2, "created_at": "2024-06-02T00:00:00Z"})),
            ],
            posttest: vec![],
            demographics: vec![
                record(json!({"participant_id": "A", "gender": "female", "created_at": "2024-05-01T00:00:00Z"})),
                record(json!({"participant_id": "B", "gender": "male", "created_at": "2024-05-01T00:00:00Z"})),
                record(json!({"participant_id": "C", "gender": "female", "created_at": "2024-05-01T00:00:00Z"})),
            ],
        }
    }

    #[test]
    fn test_default_context_keeps_everything() {
        let data = dataset();
        let filtered = apply_filters(&data, &FilterContext::default(), now());
        assert_eq!(filtered, data);
    }

    #[test]
    fn test_date_range_drops_old_records() {
        let filtered = apply_filters(&dataset(), &FilterContext::new(DateRange::Last30Days), now());
        assert_eq!(filtered.sessions.len(), 3);
        assert_eq!(filtered.pretest.len(), 2);
        // Demographics were submitted 60 days ago
        assert!(filtered.demographics.is_empty());
    }

    #[test]
    fn test_without_date_range_preserves_other_filters() {
        let context = FilterContext {
            date_range: DateRange::Last7Days,
            participant: Some("A".to_string()),
            ..Default::default()
        };
        let relaxed = context.without_date_range();
        assert_eq!(relaxed.date_range, DateRange::All);
        assert_eq!(relaxed.participant.as_deref(), Some("A"));
    }

    #[test]
    fn test_participant_filter_applies_to_all_streams() {
        let context = FilterContext {
            participant: Some("A".to_string()),
            ..Default::default()
        };
        let filtered = apply_filters(&dataset(), &context, now());
        assert_eq!(filtered.sessions.len(), 2);
        assert_eq!(filtered.pretest.len(), 1);
        assert_eq!(filtered.demographics.len(), 1);
    }

    #[test]
    fn test_demographic_predicate_scopes_sessions() {
        let context = FilterContext {
            demographic: Some(DemographicPredicate {
                field: "gender".to_string(),
                value: "female".to_string(),
            }),
            ..Default::default()
        };
        let filtered = apply_filters(&dataset(), &context, now());
        let participants: HashSet<_> = filtered
            .sessions
            .iter()
            .map(|s| s.participant_number.as_str())
            .collect();
        assert_eq!(participants, HashSet::from(["A", "C"]));
        assert_eq!(filtered.pretest.len(), 1);
        assert_eq!(filtered.demographics.len(), 2);
    }

    #[test]
    fn test_demographic_predicate_ignores_survey_date() {
        // Demographics were submitted before the window but still select A and C
        let context = FilterContext {
            date_range: DateRange::Last7Days,
            demographic: Some(DemographicPredicate {
                field: "gender".to_string(),
                value: "female".to_string(),
            }),
            ..Default::default()
        };
        let filtered = apply_filters(&dataset(), &context, now());
        let participants: Vec<_> = filtered
            .sessions
            .iter()
            .map(|s| s.participant_number.as_str())
            .collect();
        assert_eq!(participants, vec!["A", "C"]);
        // The returned demographic rows are still windowed
        assert!(filtered.demographics.is_empty());
    }

    #[test]
    fn test_custom_filter_on_sessions() {
        let context = FilterContext {
            custom: vec!["sessions.device_type=ios".parse().unwrap()],
            ..Default::default()
        };
        let filtered = apply_filters(&dataset(), &context, now());
        assert_eq!(filtered.sessions.len(), 2);
        // Other streams are untouched by a sessions filter
        assert_eq!(filtered.demographics.len(), 3);
    }

    #[test]
    fn test_parse_field_filter() {
        let filter: FieldFilter = "pretest.who5_calm>3".parse().unwrap();
        assert_eq!(filter.stream, RecordStream::Pretest);
        assert_eq!(filter.field, "who5_calm");
        assert_eq!(filter.op, FilterOp::GreaterThan);
        assert_eq!(filter.value, "3");

        let filter: FieldFilter = "demographics.role != nurse".parse().unwrap();
        assert_eq!(filter.op, FilterOp::NotEquals);
        assert_eq!(filter.field, "role");
        assert_eq!(filter.value, "nurse");

        assert!("device_type=ios".parse::<FieldFilter>().is_err());
        assert!("sessions.device_type".parse::<FieldFilter>().is_err());
        assert!("visits.device_type=ios".parse::<FieldFilter>().is_err());
    }

    #[test]
    fn test_parse_uses_first_operator() {
        let filter: FieldFilter = "demographics.note~a=b".parse().unwrap();
        assert_eq!(filter.field, "note");
        assert_eq!(filter.op, FilterOp::Contains);
        assert_eq!(filter.value, "a=b");

        let filter: FieldFilter = "sessions.session_type=a!=b".parse().unwrap();
        assert_eq!(filter.op, FilterOp::Equals);
        assert_eq!(filter.value, "a!=b");
    }

    #[test]
    fn test_parse_rejects_unsupported_operators() {
        for expr in ["pretest.score>=3", "pretest.score<=3"] {
            let err = expr.parse::<FieldFilter>().unwrap_err();
            assert!(matches!(err, Error::Filter(_)), "{expr}: {err}");
        }
    }

    #[test]
    fn test_field_filter_display() {
        let filter: FieldFilter = "demographics.role != nurse".parse().unwrap();
        assert_eq!(filter.to_string(), "demographics.role!=nurse");
        let filter: FieldFilter = "session.duration_minutes>20".parse().unwrap();
        assert_eq!(filter.to_string(), "sessions.duration_minutes>20");
    }

    #[test]
    fn test_filter_ops() {
        let contains: FieldFilter = "demographics.unit~ICU".parse().unwrap();
        assert!(contains.matches(Some(&json!("Adult icu ward"))));
        assert!(!contains.matches(None));

        let less: FieldFilter = "pretest.score<3".parse().unwrap();
        assert!(less.matches(Some(&json!(2))));
        assert!(!less.matches(Some(&json!("n/a"))));
    }
}
