//! Weekly acquisition cohorts and their retention curves.

use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::Serialize;

use super::stats;
use super::temporal::week_start;
use crate::types::SessionRecord;

/// Retention curve for participants first seen in the same week.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CohortRetention {
    /// Sunday starting the acquisition week (`YYYY-MM-DD`)
    pub cohort: String,
    pub size: usize,
    /// Percentages for week 0, 1, ..; week 0 is always 100
    pub retention: Vec<f64>,
}

/// Build weekly cohorts and compute week-by-week retention.
///
/// Returns the most recent `max_cohorts` cohorts in chronological order, or
/// nothing when fewer than `min_sessions` sessions are available.
pub fn cohort_retention(
    sessions: &[SessionRecord],
    min_sessions: usize,
    max_cohorts: usize,
    weeks: u32,
) -> Vec<CohortRetention> {
    if sessions.len() < min_sessions {
        tracing::debug!(
            sessions = sessions.len(),
            min_sessions,
            "Skipping cohort retention"
        );
        return Vec::new();
    }

    let mut activity: HashMap<&str, Vec<DateTime<Utc>>> = HashMap::new();
    for session in sessions {
        if let Some(ts) = session.created_at {
            activity
                .entry(session.participant_number.as_str())
                .or_default()
                .push(ts);
        }
    }

    let mut cohorts: BTreeMap<NaiveDate, HashSet<&str>> = BTreeMap::new();
    for (participant, timestamps) in &activity {
        if let Some(first) = timestamps.iter().min() {
            cohorts
                .entry(week_start(first.date_naive()))
                .or_default()
                .insert(*participant);
        }
    }

    let skip = cohorts.len().saturating_sub(max_cohorts);
    cohorts
        .into_iter()
        .skip(skip)
        .map(|(start, members)| {
            let cohort_start = start
                .and_hms_opt(0, 0, 0)
                .map(|naive| naive.and_utc())
                .unwrap_or_default();

            let mut retention = vec![100.0];
            for week in 1..=weeks as i64 {
                let window_start = cohort_start + Duration::days(7 * week);
                let window_end = window_start + Duration::days(7);
                let retained = members
                    .iter()
                    .filter(|participant| {
                        activity.get(**participant).is_some_and(|timestamps| {
                            timestamps
                                .iter()
                                .any(|ts| *ts >= window_start && *ts < window_end)
                        })
                    })
                    .count();
                retention.push(stats::ratio(retained as f64, members.len() as f64) * 100.0);
            }

            CohortRetention {
                cohort: start.format("%Y-%m-%d").to_string(),
                size: members.len(),
                retention,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn session(participant: &str, ts: DateTime<Utc>) -> SessionRecord {
        SessionRecord {
            participant_number: participant.to_string(),
            duration_minutes: Some(10.0),
            created_at: Some(ts),
            device_type: None,
            session_type: None,
        }
    }

    fn day(d: u32) -> DateTime<Utc> {
        // June 2024: the 2nd, 9th, 16th, 23rd and 30th are Sundays
        Utc.with_ymd_and_hms(2024, 6, d, 10, 0, 0).unwrap()
    }

    #[test]
    fn test_cohort_without_later_activity() {
        let sessions = vec![session("A", day(3)), session("B", day(4)), session("A", day(5))];
        let cohorts = cohort_retention(&sessions, 1, 8, 4);
        assert_eq!(cohorts.len(), 1);
        assert_eq!(cohorts[0].cohort, "2024-06-02");
        assert_eq!(cohorts[0].size, 2);
        assert_eq!(cohorts[0].retention, vec![100.0, 0.0, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_retention_by_week() {
        let sessions = vec![
            // Cohort of June 2: A and B
            session("A", day(3)),
            session("B", day(5)),
            session("A", day(10)), // week 1
            session("B", day(11)), // week 1
            session("A", day(17)), // week 2
            session("B", day(30)), // week 4
            // Cohort of June 9: C
            session("C", day(12)),
            session("C", day(19)), // week 1
        ];
        let cohorts = cohort_retention(&sessions, 1, 8, 4);
        assert_eq!(cohorts.len(), 2);

        assert_eq!(cohorts[0].cohort, "2024-06-02");
        assert_eq!(cohorts[0].retention, vec![100.0, 100.0, 50.0, 0.0, 50.0]);

        assert_eq!(cohorts[1].cohort, "2024-06-09");
        assert_eq!(cohorts[1].size, 1);
        assert_eq!(cohorts[1].retention[1], 100.0);
    }

    #[test]
    fn test_keeps_most_recent_cohorts() {
        let sessions = vec![
            session("A", day(3)),
            session("B", day(10)),
            session("C", day(17)),
        ];
        let cohorts = cohort_retention(&sessions, 1, 2, 4);
        let keys: Vec<&str> = cohorts.iter().map(|c| c.cohort.as_str()).collect();
        assert_eq!(keys, vec!["2024-06-09", "2024-06-16"]);
    }

    #[test]
    fn test_sparse_data_is_skipped() {
        let sessions = vec![session("A", day(3)), session("A", day(10))];
        assert!(cohort_retention(&sessions, 10, 8, 4).is_empty());
    }
}
