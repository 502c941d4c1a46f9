//! Usage patterns: when participants use the app and how engaged each one is.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Datelike, NaiveDate, Timelike, Utc};
use serde::Serialize;

use super::stats;
use crate::types::SessionRecord;

/// Time-of-use and per-participant engagement patterns.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UsagePatterns {
    /// Session count by hour of day (UTC, 0-23)
    pub hourly_distribution: [usize; 24],
    /// Session count by day of week (0=Sunday, 6=Saturday)
    pub daily_distribution: [usize; 7],
    /// Busiest hour (0-23)
    pub peak_hour: u8,
    /// Busiest day (0=Sunday)
    pub busiest_day: u8,
    pub device_types: BTreeMap<String, usize>,
    pub session_types: BTreeMap<String, usize>,
    pub participant_engagement: Vec<ParticipantEngagement>,
    pub engagement_tiers: EngagementTiers,
}

impl Default for UsagePatterns {
    fn default() -> Self {
        Self {
            hourly_distribution: [0; 24],
            daily_distribution: [0; 7],
            peak_hour: 0,
            busiest_day: 0,
            device_types: BTreeMap::new(),
            session_types: BTreeMap::new(),
            participant_engagement: Vec::new(),
            engagement_tiers: EngagementTiers::default(),
        }
    }
}

impl UsagePatterns {
    /// Get day name from index.
    pub fn day_name(day: u8) -> &'static str {
        match day {
            0 => "Sunday",
            1 => "Monday",
            2 => "Tuesday",
            3 => "Wednesday",
            4 => "Thursday",
            5 => "Friday",
            6 => "Saturday",
            _ => "Unknown",
        }
    }

    /// Get hour display (e.g., "10am-11am").
    pub fn hour_display(hour: u8) -> String {
        let format_hour = |h: u8| -> String {
            match h {
                0 => "12am".to_string(),
                1..=11 => format!("{}am", h),
                12 => "12pm".to_string(),
                _ => format!("{}pm", h - 12),
            }
        };
        let hour = hour % 24;
        format!("{}-{}", format_hour(hour), format_hour((hour + 1) % 24))
    }
}

/// Engagement summary for one participant.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantEngagement {
    pub participant: String,
    pub session_count: usize,
    pub total_duration: f64,
    /// Mean over sessions with a usable duration
    pub avg_duration: f64,
    pub first_seen: Option<DateTime<Utc>>,
    pub last_seen: Option<DateTime<Utc>>,
    /// Distinct calendar days with a session
    pub active_days: usize,
}

/// Participants bucketed by how many sessions they logged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EngagementTiers {
    /// Exactly one session
    pub single: usize,
    /// Two to five sessions
    pub regular: usize,
    /// More than five sessions
    pub frequent: usize,
}

#[derive(Default)]
struct EngagementAccumulator {
    session_count: usize,
    durations: Vec<f64>,
    first_seen: Option<DateTime<Utc>>,
    last_seen: Option<DateTime<Utc>>,
    days: BTreeSet<NaiveDate>,
}

/// Index of the largest count; ties go to the earliest index.
fn busiest(counts: &[usize]) -> u8 {
    counts
        .iter()
        .enumerate()
        .fold((0usize, 0usize), |best, (idx, &count)| {
            if count > best.1 {
                (idx, count)
            } else {
                best
            }
        })
        .0 as u8
}

pub fn usage_patterns(sessions: &[SessionRecord]) -> UsagePatterns {
    let mut hourly_distribution = [0usize; 24];
    let mut daily_distribution = [0usize; 7];
    let mut device_types: BTreeMap<String, usize> = BTreeMap::new();
    let mut session_types: BTreeMap<String, usize> = BTreeMap::new();
    let mut participants: BTreeMap<&str, EngagementAccumulator> = BTreeMap::new();

    for session in sessions {
        let device = session.device_type.as_deref().unwrap_or("unknown");
        *device_types.entry(device.to_string()).or_insert(0) += 1;
        let kind = session.session_type.as_deref().unwrap_or("unknown");
        *session_types.entry(kind.to_string()).or_insert(0) += 1;

        let acc = participants
            .entry(session.participant_number.as_str())
            .or_default();
        acc.session_count += 1;
        if let Some(duration) = session.duration() {
            acc.durations.push(duration);
        }

        if let Some(ts) = session.created_at {
            hourly_distribution[ts.hour() as usize] += 1;
            daily_distribution[ts.weekday().num_days_from_sunday() as usize] += 1;

            acc.first_seen = Some(acc.first_seen.map_or(ts, |current| current.min(ts)));
            acc.last_seen = Some(acc.last_seen.map_or(ts, |current| current.max(ts)));
            acc.days.insert(ts.date_naive());
        }
    }

    let mut engagement_tiers = EngagementTiers::default();
    let mut participant_engagement: Vec<ParticipantEngagement> = participants
        .into_iter()
        .map(|(participant, acc)| {
            match acc.session_count {
                1 => engagement_tiers.single += 1,
                2..=5 => engagement_tiers.regular += 1,
                _ => engagement_tiers.frequent += 1,
            }
            ParticipantEngagement {
                participant: participant.to_string(),
                session_count: acc.session_count,
                total_duration: acc.durations.iter().sum(),
                avg_duration: stats::mean(&acc.durations),
                first_seen: acc.first_seen,
                last_seen: acc.last_seen,
                active_days: acc.days.len(),
            }
        })
        .collect();

    // BTreeMap order gives the participant tie-break; the sort is stable
    participant_engagement.sort_by(|a, b| b.session_count.cmp(&a.session_count));

    UsagePatterns {
        peak_hour: busiest(&hourly_distribution),
        busiest_day: busiest(&daily_distribution),
        hourly_distribution,
        daily_distribution,
        device_types,
        session_types,
        participant_engagement,
        engagement_tiers,
    }
}
