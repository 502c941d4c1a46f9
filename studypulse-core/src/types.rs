//! Core domain types for studypulse
//!
//! Records arrive from the study backend as flat JSON objects. Sessions have
//! a stable shape and get a typed struct; questionnaire and demographic
//! records are open-ended surveys whose schema evolves, so they stay as flat
//! field maps with typed accessors.
//!
//! ## Terminology
//!
//! | Term | Definition |
//! |------|------------|
//! | **Participant** | A study subject, keyed by `participant_number` (or `participant_id` in demographics) |
//! | **Session** | One logged app-usage interval for a participant |
//! | **Response** | A pretest or posttest questionnaire submission |
//! | **Demographic record** | A participant's demographic survey |
//! | **Date range** | The active dashboard window (`today`, `7d`, `30d`, `90d`, `all`) |

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

// ============================================
// Timestamps and field coercion
// ============================================

/// Parse an ISO timestamp as sent by the backend.
///
/// Accepts RFC 3339, naive `YYYY-MM-DDTHH:MM:SS[.fff]` (read as UTC) and bare
/// dates (midnight UTC). Anything else yields `None`.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Render a JSON value the way frequency tables count it.
///
/// Returns `None` for null so that missing answers do not form a bucket.
pub fn value_to_key(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        other => Some(other.to_string()),
    }
}

/// Read a participant identifier that may be sent as a string or a number.
fn identifier(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Minutes from a raw field; negative or non-finite values are unusable.
fn duration_minutes(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .filter(|m| m.is_finite() && *m >= 0.0)
}

fn deserialize_identifier<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(identifier(&value).unwrap_or_default())
}

fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(value.as_str().and_then(parse_timestamp))
}

fn deserialize_duration<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(duration_minutes(&value))
}

fn deserialize_key<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(value_to_key(&value))
}

// ============================================
// Session records
// ============================================

/// One logged app-usage interval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    /// Participant key; numbers are normalised to strings
    #[serde(deserialize_with = "deserialize_identifier", default)]
    pub participant_number: String,
    /// Minutes of use; `None` when absent, negative or not a number
    #[serde(deserialize_with = "deserialize_duration", default)]
    pub duration_minutes: Option<f64>,
    /// When the session was logged
    #[serde(deserialize_with = "deserialize_timestamp", default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(deserialize_with = "deserialize_key", default)]
    pub device_type: Option<String>,
    #[serde(deserialize_with = "deserialize_key", default)]
    pub session_type: Option<String>,
}

impl SessionRecord {
    /// Build a session from a raw backend row.
    ///
    /// Never fails: unusable fields become `None`.
    pub fn from_value(value: &Value) -> Self {
        let field = |name: &str| value.get(name);
        Self {
            participant_number: field("participant_number")
                .and_then(identifier)
                .unwrap_or_default(),
            duration_minutes: field("duration_minutes").and_then(duration_minutes),
            created_at: field("created_at")
                .and_then(Value::as_str)
                .and_then(parse_timestamp),
            device_type: field("device_type").and_then(value_to_key),
            session_type: field("session_type").and_then(value_to_key),
        }
    }

    /// Look up a field by name for generic filtering.
    pub fn field(&self, name: &str) -> Option<Value> {
        match name {
            "participant_number" => Some(Value::String(self.participant_number.clone())),
            "duration_minutes" => self
                .duration_minutes
                .and_then(serde_json::Number::from_f64)
                .map(Value::Number),
            "created_at" => self.created_at.map(|ts| Value::String(ts.to_rfc3339())),
            "device_type" => self.device_type.clone().map(Value::String),
            "session_type" => self.session_type.clone().map(Value::String),
            _ => None,
        }
    }

    /// Duration usable in numeric aggregates.
    pub fn duration(&self) -> Option<f64> {
        self.duration_minutes
    }
}

// ============================================
// Flat survey records
// ============================================

/// A questionnaire or demographic submission: a flat map of named fields.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FlatRecord {
    fields: Map<String, Value>,
}

impl FlatRecord {
    pub fn new(fields: Map<String, Value>) -> Self {
        Self { fields }
    }

    /// Wrap a raw backend row; non-object rows become empty records.
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Object(fields) => Self { fields },
            _ => Self::default(),
        }
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name).filter(|v| !v.is_null())
    }

    /// Numeric value of a field; numeric strings are accepted.
    pub fn get_f64(&self, name: &str) -> Option<f64> {
        match self.get(name)? {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        }
        .filter(|v| v.is_finite())
    }

    /// First non-null numeric value among alternate key names.
    pub fn first_f64(&self, names: &[&str]) -> Option<f64> {
        names.iter().find_map(|name| self.get_f64(name))
    }

    /// Participant key, whichever identifier field the survey carries.
    pub fn participant_key(&self) -> Option<String> {
        ["participant_number", "participant_id", "sample_code"]
            .iter()
            .find_map(|name| self.get(name).and_then(identifier))
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.get("created_at")
            .and_then(Value::as_str)
            .and_then(parse_timestamp)
    }
}

impl From<Map<String, Value>> for FlatRecord {
    fn from(fields: Map<String, Value>) -> Self {
        Self::new(fields)
    }
}

/// Everything the dashboard has fetched, before or after filtering.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    pub sessions: Vec<SessionRecord>,
    pub pretest: Vec<FlatRecord>,
    pub posttest: Vec<FlatRecord>,
    pub demographics: Vec<FlatRecord>,
}

impl Dataset {
    /// Build typed records from raw backend rows.
    pub fn from_values(
        sessions: Vec<Value>,
        pretest: Vec<Value>,
        posttest: Vec<Value>,
        demographics: Vec<Value>,
    ) -> Self {
        Self {
            sessions: sessions.iter().map(SessionRecord::from_value).collect(),
            pretest: pretest.into_iter().map(FlatRecord::from_value).collect(),
            posttest: posttest.into_iter().map(FlatRecord::from_value).collect(),
            demographics: demographics.into_iter().map(FlatRecord::from_value).collect(),
        }
    }
}

// ============================================
// Date ranges
// ============================================

/// Active dashboard window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum DateRange {
    #[serde(rename = "today")]
    Today,
    #[serde(rename = "7d")]
    Last7Days,
    #[serde(rename = "30d")]
    Last30Days,
    #[serde(rename = "90d")]
    Last90Days,
    #[serde(rename = "all")]
    #[default]
    All,
}

impl DateRange {
    /// Window length in days; `None` for the unbounded range.
    pub fn days(&self) -> Option<i64> {
        match self {
            DateRange::Today => Some(1),
            DateRange::Last7Days => Some(7),
            DateRange::Last30Days => Some(30),
            DateRange::Last90Days => Some(90),
            DateRange::All => None,
        }
    }

    /// Window length used for granularity decisions (`all` counts as a year).
    pub fn effective_days(&self) -> i64 {
        self.days().unwrap_or(365)
    }

    pub fn is_bounded(&self) -> bool {
        self.days().is_some()
    }

    /// Inclusive start of the current window.
    pub fn start(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.days().map(|days| now - Duration::days(days))
    }

    /// Whether a timestamp falls inside `[now - W, now]`.
    pub fn contains(&self, ts: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        match self.start(now) {
            Some(start) => ts >= start && ts <= now,
            None => true,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DateRange::Today => "today",
            DateRange::Last7Days => "7d",
            DateRange::Last30Days => "30d",
            DateRange::Last90Days => "90d",
            DateRange::All => "all",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            DateRange::Today => "Today",
            DateRange::Last7Days => "Last 7 days",
            DateRange::Last30Days => "Last 30 days",
            DateRange::Last90Days => "Last 90 days",
            DateRange::All => "All time",
        }
    }
}

impl std::fmt::Display for DateRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for DateRange {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "today" | "1d" => Ok(DateRange::Today),
            "7d" => Ok(DateRange::Last7Days),
            "30d" => Ok(DateRange::Last30Days),
            "90d" => Ok(DateRange::Last90Days),
            "all" => Ok(DateRange::All),
            _ => Err(format!("unknown date range: {}", s)),
        }
    }
}
