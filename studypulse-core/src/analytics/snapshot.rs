//! One-shot computation of every dashboard statistic.
//!
//! [`compute_analytics`] is a pure function of its inputs and `now`: calling
//! it twice with the same arguments yields identical snapshots.

use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::cohort::{cohort_retention, CohortRetention};
use super::correlation::{session_duration_correlation, SessionDurationCorrelation};
use super::distribution::{analyze_responses, demographic_distribution, FrequencyTable, ResponseAnalysis};
use super::insights::{generate_insights, Insight, InsightInputs};
use super::patterns::{usage_patterns, UsagePatterns};
use super::scales::{pre_post_comparison, summarize_composites, CompositeSummary, ScoreChange};
use super::stats::{self, Descriptive};
use super::temporal::{
    bucket_sessions, compare_periods, Granularity, PeriodComparison, PeriodStats, TimeBucket,
    TrendDirection, TrendSummary,
};
use crate::types::{DateRange, FlatRecord, SessionRecord};

/// Borrowed record streams to analyse.
#[derive(Debug, Clone, Copy, Default)]
pub struct AnalyticsInput<'a> {
    pub sessions: &'a [SessionRecord],
    pub pretest: &'a [FlatRecord],
    pub posttest: &'a [FlatRecord],
    pub demographics: &'a [FlatRecord],
}

/// Thresholds for the analyses that need a minimum amount of data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnalyticsOptions {
    pub min_sessions_for_correlation: usize,
    pub min_sessions_for_cohorts: usize,
    pub max_cohorts: usize,
    pub retention_weeks: u32,
}

impl Default for AnalyticsOptions {
    fn default() -> Self {
        Self {
            min_sessions_for_correlation: 5,
            min_sessions_for_cohorts: 10,
            max_cohorts: 8,
            retention_weeks: 4,
        }
    }
}

/// Headline session statistics for the active window.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionAnalytics {
    pub count: usize,
    pub participants: usize,
    pub total_duration: f64,
    /// Over sessions with a usable duration
    pub duration: Descriptive,
    pub p25: f64,
    pub p75: f64,
    pub p90: f64,
    pub previous_period: Option<PeriodStats>,
}

/// Completeness ratios (0-1) of the loaded data.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DataQuality {
    pub sessions_with_duration: f64,
    pub sessions_with_timestamp: f64,
    /// Participants with a pretest / participants with sessions
    pub pretest_coverage: f64,
    /// Participants with demographics / participants with sessions
    pub demographic_coverage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    pub total_sessions: usize,
    pub total_participants: usize,
    pub pretest_responses: usize,
    pub posttest_responses: usize,
    pub demographic_records: usize,
    pub trend: TrendDirection,
    pub data_quality: DataQuality,
    pub session_change_pct: f64,
    pub duration_change_pct: f64,
    pub insight_count: usize,
}

/// Everything the dashboard renders.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsSnapshot {
    pub date_range: DateRange,
    pub generated_at: DateTime<Utc>,
    pub session_analytics: SessionAnalytics,
    pub time_series_data: Vec<TimeBucket>,
    pub session_trend: TrendSummary,
    pub period_comparison: Option<PeriodComparison>,
    pub demographic_distribution: FrequencyTable,
    pub pretest_analysis: ResponseAnalysis,
    pub posttest_analysis: ResponseAnalysis,
    pub composite_scores: CompositeSummary,
    pub pre_post_comparison: BTreeMap<String, ScoreChange>,
    pub correlations: Option<SessionDurationCorrelation>,
    pub cohort_retention: Vec<CohortRetention>,
    pub usage_patterns: UsagePatterns,
    pub insights: Vec<Insight>,
    pub summary: Summary,
}

fn session_analytics(
    sessions: &[SessionRecord],
    comparison: Option<&PeriodComparison>,
) -> SessionAnalytics {
    let durations: Vec<f64> = sessions.iter().filter_map(SessionRecord::duration).collect();
    let participants: HashSet<&str> = sessions
        .iter()
        .map(|s| s.participant_number.as_str())
        .collect();

    SessionAnalytics {
        count: sessions.len(),
        participants: participants.len(),
        total_duration: durations.iter().sum(),
        duration: Descriptive::from_values(&durations),
        p25: stats::percentile(&durations, 25.0),
        p75: stats::percentile(&durations, 75.0),
        p90: stats::percentile(&durations, 90.0),
        previous_period: comparison.map(|c| c.previous.clone()),
    }
}

fn data_quality(input: &AnalyticsInput<'_>, sessions: &[SessionRecord]) -> DataQuality {
    let total = sessions.len() as f64;
    let with_duration = sessions.iter().filter(|s| s.duration().is_some()).count();
    let with_timestamp = sessions.iter().filter(|s| s.created_at.is_some()).count();

    let active: HashSet<&str> = sessions
        .iter()
        .map(|s| s.participant_number.as_str())
        .collect();
    let coverage = |records: &[FlatRecord]| {
        let keys: HashSet<String> = records.iter().filter_map(FlatRecord::participant_key).collect();
        let covered = active.iter().filter(|p| keys.contains(**p)).count();
        stats::ratio(covered as f64, active.len() as f64)
    };

    DataQuality {
        sessions_with_duration: stats::ratio(with_duration as f64, total),
        sessions_with_timestamp: stats::ratio(with_timestamp as f64, total),
        pretest_coverage: coverage(input.pretest),
        demographic_coverage: coverage(input.demographics),
    }
}

/// Compute the full analytics snapshot.
///
/// For a bounded `range` the session stream is windowed to `[now - W, now]`
/// before any current-period statistic; the unwindowed stream feeds the
/// previous-period comparison. Questionnaire streams are used as given.
pub fn compute_analytics(
    input: &AnalyticsInput<'_>,
    options: &AnalyticsOptions,
    range: DateRange,
    now: DateTime<Utc>,
) -> AnalyticsSnapshot {
    let windowed: Vec<SessionRecord> = if range.is_bounded() {
        input
            .sessions
            .iter()
            .filter(|s| s.created_at.is_some_and(|ts| range.contains(ts, now)))
            .cloned()
            .collect()
    } else {
        input.sessions.to_vec()
    };

    tracing::debug!(
        range = range.as_str(),
        sessions = input.sessions.len(),
        windowed = windowed.len(),
        "Computing analytics"
    );

    let period_comparison = compare_periods(input.sessions, range, now);
    let session_stats = session_analytics(&windowed, period_comparison.as_ref());

    let time_series_data = bucket_sessions(&windowed, Granularity::for_range(range));
    let session_trend = TrendSummary::from_buckets(&time_series_data);

    let correlations =
        session_duration_correlation(&windowed, options.min_sessions_for_correlation);
    let cohorts = cohort_retention(
        &windowed,
        options.min_sessions_for_cohorts,
        options.max_cohorts,
        options.retention_weeks,
    );

    let insights = generate_insights(&InsightInputs {
        range,
        sessions: &session_stats,
        trend: &session_trend,
        comparison: period_comparison.as_ref(),
        correlation: correlations.as_ref(),
    });

    let summary = Summary {
        total_sessions: session_stats.count,
        total_participants: session_stats.participants,
        pretest_responses: input.pretest.len(),
        posttest_responses: input.posttest.len(),
        demographic_records: input.demographics.len(),
        trend: session_trend.direction,
        data_quality: data_quality(input, &windowed),
        session_change_pct: period_comparison
            .as_ref()
            .map_or(0.0, |c| c.count_change_pct),
        duration_change_pct: period_comparison
            .as_ref()
            .map_or(0.0, |c| c.duration_change_pct),
        insight_count: insights.len(),
    };

    AnalyticsSnapshot {
        date_range: range,
        generated_at: now,
        session_analytics: session_stats,
        time_series_data,
        session_trend,
        period_comparison,
        demographic_distribution: demographic_distribution(input.demographics),
        pretest_analysis: analyze_responses(input.pretest),
        posttest_analysis: analyze_responses(input.posttest),
        composite_scores: summarize_composites(input.pretest),
        pre_post_comparison: pre_post_comparison(input.pretest, input.posttest),
        correlations,
        cohort_retention: cohorts,
        usage_patterns: usage_patterns(&windowed),
        insights,
        summary,
    }
}
