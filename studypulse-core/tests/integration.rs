//! Integration tests for the studypulse loading, filtering and analytics pipeline
//!
//! These tests read the exports in `tests/fixtures/` through `JsonFileSource`
//! and run the full computation against a fixed clock.

use chrono::{DateTime, TimeZone, Utc};
use studypulse_core::analytics::{
    compute_analytics, AnalyticsInput, AnalyticsOptions, AnalyticsSnapshot, Impact,
    TrendDirection,
};
use studypulse_core::{
    apply_filters, DataSource, Dataset, DateRange, DemographicPredicate, FieldFilter,
    FilterContext, JsonFileSource,
};
use std::path::PathBuf;

/// Get the path to a fixture file
fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(name)
}

fn load(name: &str) -> Vec<serde_json::Value> {
    JsonFileSource::new(name, fixture_path(&format!("{name}.json")))
        .fetch_all()
        .expect("fixture should load")
}

fn fixture_dataset() -> Dataset {
    studypulse_core::logging::init_test();
    Dataset::from_values(
        load("sessions"),
        load("pretest"),
        load("posttest"),
        load("demographics"),
    )
}

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 30, 12, 0, 0).unwrap()
}

fn snapshot(data: &Dataset, range: DateRange) -> AnalyticsSnapshot {
    let input = AnalyticsInput {
        sessions: &data.sessions,
        pretest: &data.pretest,
        posttest: &data.posttest,
        demographics: &data.demographics,
    };
    compute_analytics(&input, &AnalyticsOptions::default(), range, now())
}

// ============================================
// Loading
// ============================================

#[test]
fn test_fixture_records_are_typed() {
    let data = fixture_dataset();
    assert_eq!(data.sessions.len(), 17);
    assert_eq!(data.pretest.len(), 3);
    assert_eq!(data.posttest.len(), 2);
    assert_eq!(data.demographics.len(), 4);

    // String duration is accepted, null duration and null timestamp are not
    let p004: Vec<_> = data
        .sessions
        .iter()
        .filter(|s| s.participant_number == "P004")
        .collect();
    assert_eq!(p004[0].duration(), Some(15.0));
    assert_eq!(p004[1].duration(), None);
    let p005 = data
        .sessions
        .iter()
        .find(|s| s.participant_number == "P005")
        .unwrap();
    assert!(p005.created_at.is_none());
}

// ============================================
// Full range
// ============================================

#[test]
fn test_all_time_session_statistics() {
    let snapshot = snapshot(&fixture_dataset(), DateRange::All);
    let stats = &snapshot.session_analytics;

    assert_eq!(stats.count, 17);
    assert_eq!(stats.participants, 5);
    assert_eq!(stats.duration.count, 16);
    assert_eq!(stats.total_duration, 365.0);
    assert_eq!(stats.duration.min, 5.0);
    assert_eq!(stats.duration.max, 50.0);
    assert!(snapshot.period_comparison.is_none());

    // Unbounded range buckets monthly
    let periods: Vec<&str> = snapshot
        .time_series_data
        .iter()
        .map(|b| b.period.as_str())
        .collect();
    assert_eq!(periods, vec!["2024-05", "2024-06"]);
    assert_eq!(snapshot.time_series_data[0].count, 6);
    assert_eq!(snapshot.time_series_data[1].count, 10);
}

#[test]
fn test_all_time_cohort_retention() {
    let snapshot = snapshot(&fixture_dataset(), DateRange::All);
    let cohorts = &snapshot.cohort_retention;

    let keys: Vec<&str> = cohorts.iter().map(|c| c.cohort.as_str()).collect();
    assert_eq!(keys, vec!["2024-05-05", "2024-05-12", "2024-06-09"]);

    assert_eq!(cohorts[0].size, 2);
    assert_eq!(cohorts[0].retention, vec![100.0, 100.0, 50.0, 0.0, 50.0]);
    assert_eq!(cohorts[1].retention, vec![100.0, 0.0, 0.0, 0.0, 0.0]);
    assert_eq!(cohorts[2].retention, vec![100.0, 0.0, 100.0, 0.0, 0.0]);
}

#[test]
fn test_demographic_distribution_excludes_identifiers() {
    let snapshot = snapshot(&fixture_dataset(), DateRange::All);
    let table = &snapshot.demographic_distribution;

    assert!(!table.contains_key("id"));
    assert!(!table.contains_key("created_at"));
    assert!(!table.contains_key("participant_number"));
    assert_eq!(table["gender"]["female"], 2);
    assert_eq!(table["gender"]["nonbinary"], 1);
    assert_eq!(table["student"]["true"], 3);
    // Null age group is skipped
    assert_eq!(table["age_group"].values().sum::<usize>(), 3);
}

#[test]
fn test_questionnaire_analysis() {
    let snapshot = snapshot(&fixture_dataset(), DateRange::All);

    let pretest = &snapshot.pretest_analysis;
    assert_eq!(pretest.total_responses, 3);
    assert_eq!(pretest.boolean_fields["has_therapist"].true_count, 1);
    assert_eq!(pretest.boolean_fields["has_therapist"].false_count, 2);
    assert!(!pretest.numeric_fields.contains_key("id"));
    assert!(pretest.numeric_fields.contains_key("who5_cheerful"));

    // P003 skipped an item so only two WHO-5 scores exist
    assert_eq!(snapshot.composite_scores.who5.count, 2);
    assert_eq!(snapshot.composite_scores.who5.mean, 46.0);

    let who5 = snapshot.pre_post_comparison["who5"];
    assert_eq!(who5.pairs, 2);
    assert_eq!(who5.pre_mean, 46.0);
    assert_eq!(who5.post_mean, 62.0);
    assert_eq!(who5.mean_change, 16.0);

    let pss4 = snapshot.pre_post_comparison["pss4"];
    assert_eq!(pss4.pre_mean, 11.0);
    assert_eq!(pss4.post_mean, 6.0);
}

#[test]
fn test_usage_patterns() {
    let snapshot = snapshot(&fixture_dataset(), DateRange::All);
    let patterns = &snapshot.usage_patterns;

    assert_eq!(patterns.device_types["ios"], 6);
    assert_eq!(patterns.device_types["android"], 6);
    assert_eq!(patterns.device_types["unknown"], 1);
    assert_eq!(patterns.hourly_distribution.iter().sum::<usize>(), 16);
    assert_eq!(patterns.peak_hour, 9);
    assert_eq!(patterns.participant_engagement[0].participant, "P001");
    assert_eq!(patterns.engagement_tiers.frequent, 1);
}

// ============================================
// Bounded range
// ============================================

#[test]
fn test_last_week_against_previous_week() {
    let data = fixture_dataset();
    let context = FilterContext::new(DateRange::Last7Days).without_date_range();
    let filtered = apply_filters(&data, &context, now());
    let snapshot = snapshot(&filtered, DateRange::Last7Days);

    assert_eq!(snapshot.session_analytics.count, 6);
    assert_eq!(snapshot.session_analytics.participants, 4);
    assert!((snapshot.session_analytics.duration.mean - 28.6).abs() < 1e-9);

    let comparison = snapshot.period_comparison.as_ref().unwrap();
    assert_eq!(comparison.previous.count, 2);
    assert_eq!(comparison.count_change_pct, 200.0);
    assert_eq!(comparison.participant_change_pct, 100.0);
    assert_eq!(snapshot.summary.session_change_pct, 200.0);
    assert_eq!(snapshot.session_trend.direction, TrendDirection::Stable);

    let titles: Vec<&str> = snapshot.insights.iter().map(|i| i.title.as_str()).collect();
    assert_eq!(
        titles,
        vec![
            "Session volume up",
            "Longer sessions",
            "Frequency vs duration: positive"
        ]
    );
    assert_eq!(snapshot.summary.insight_count, 3);
}

#[test]
fn test_filtering_before_analytics_hides_previous_period() {
    let data = fixture_dataset();
    let filtered = apply_filters(&data, &FilterContext::new(DateRange::Last7Days), now());
    let snapshot = snapshot(&filtered, DateRange::Last7Days);

    assert_eq!(snapshot.session_analytics.count, 6);
    let comparison = snapshot.period_comparison.as_ref().unwrap();
    assert_eq!(comparison.previous.count, 0);
    assert_eq!(comparison.count_change_pct, 0.0);
}

#[test]
fn test_insights_are_ordered_by_impact() {
    for range in [
        DateRange::Today,
        DateRange::Last7Days,
        DateRange::Last30Days,
        DateRange::Last90Days,
        DateRange::All,
    ] {
        let snapshot = snapshot(&fixture_dataset(), range);
        let ranks: Vec<u8> = snapshot.insights.iter().map(|i| i.impact.rank()).collect();
        let mut sorted = ranks.clone();
        sorted.sort();
        assert_eq!(ranks, sorted, "insights out of order for {range}");
        if let Some(first_medium) = snapshot.insights.iter().position(|i| i.impact == Impact::Medium) {
            assert!(snapshot.insights[first_medium..]
                .iter()
                .all(|i| i.impact != Impact::High));
        }
    }
}

// ============================================
// Filters
// ============================================

#[test]
fn test_demographic_predicate_scopes_every_stream() {
    let data = fixture_dataset();
    let context = FilterContext {
        demographic: Some(DemographicPredicate {
            field: "gender".to_string(),
            value: "female".to_string(),
        }),
        ..FilterContext::new(DateRange::All)
    };
    let filtered = apply_filters(&data, &context, now());

    assert_eq!(filtered.sessions.len(), 10);
    assert!(filtered
        .sessions
        .iter()
        .all(|s| s.participant_number == "P001" || s.participant_number == "P003"));
    assert_eq!(filtered.pretest.len(), 2);
    assert_eq!(filtered.posttest.len(), 1);
    assert_eq!(filtered.demographics.len(), 2);
}

#[test]
fn test_custom_filters_and_participant() {
    let data = fixture_dataset();

    let mut context = FilterContext::new(DateRange::All);
    context
        .custom
        .push("sessions.device_type=ios".parse::<FieldFilter>().unwrap());
    assert_eq!(apply_filters(&data, &context, now()).sessions.len(), 6);

    let mut context = FilterContext::new(DateRange::All);
    context
        .custom
        .push("sessions.duration_minutes>20".parse::<FieldFilter>().unwrap());
    // 30, 25, 40, 35, 45, 50 and 22
    assert_eq!(apply_filters(&data, &context, now()).sessions.len(), 7);

    let context = FilterContext {
        participant: Some("P002".to_string()),
        ..FilterContext::new(DateRange::All)
    };
    let filtered = apply_filters(&data, &context, now());
    assert_eq!(filtered.sessions.len(), 4);
    assert_eq!(filtered.pretest.len(), 1);
    assert_eq!(filtered.demographics.len(), 1);
}

#[test]
fn test_filters_never_mutate_input() {
    let data = fixture_dataset();
    let before = data.clone();
    let _ = apply_filters(&data, &FilterContext::new(DateRange::Today), now());
    assert_eq!(data, before);
}

// ============================================
// Determinism
// ============================================

#[test]
fn test_snapshot_is_deterministic() {
    let data = fixture_dataset();
    for range in [DateRange::Last30Days, DateRange::All] {
        let first = serde_json::to_string(&snapshot(&data, range)).unwrap();
        let second = serde_json::to_string(&snapshot(&data, range)).unwrap();
        assert_eq!(first, second);
    }
}
