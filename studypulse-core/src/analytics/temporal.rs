//! Time-bucketed session counts, trend detection and period comparison.

use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use serde::Serialize;

use super::stats;
use crate::types::{DateRange, SessionRecord};

/// Slope above which a series counts as rising (and below its negation, falling).
const TREND_THRESHOLD: f64 = 0.1;

/// Bucket size for the time series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    Daily,
    Weekly,
    Monthly,
}

impl Granularity {
    /// Pick a bucket size for a window: daily up to a month, weekly up to a
    /// quarter, monthly beyond.
    pub fn for_window(days: i64) -> Self {
        if days <= 30 {
            Granularity::Daily
        } else if days <= 90 {
            Granularity::Weekly
        } else {
            Granularity::Monthly
        }
    }

    pub fn for_range(range: DateRange) -> Self {
        Self::for_window(range.effective_days())
    }

    /// The date that identifies the bucket containing `date`.
    pub fn bucket_start(&self, date: NaiveDate) -> NaiveDate {
        match self {
            Granularity::Daily => date,
            Granularity::Weekly => week_start(date),
            Granularity::Monthly => date.with_day(1).unwrap_or(date),
        }
    }

    /// Zero-padded bucket label.
    pub fn label(&self, bucket: NaiveDate) -> String {
        match self {
            Granularity::Daily | Granularity::Weekly => bucket.format("%Y-%m-%d").to_string(),
            Granularity::Monthly => bucket.format("%Y-%m").to_string(),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Granularity::Daily => "daily",
            Granularity::Weekly => "weekly",
            Granularity::Monthly => "monthly",
        }
    }
}

/// Sunday that starts the week containing `date`.
pub fn week_start(date: NaiveDate) -> NaiveDate {
    date - Duration::days(date.weekday().num_days_from_sunday() as i64)
}

/// One populated time bucket.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeBucket {
    pub period: String,
    pub count: usize,
    pub grouping: Granularity,
    /// Sum of usable durations in the bucket (minutes)
    pub total_duration: f64,
    /// Mean of usable durations in the bucket (minutes)
    pub avg_duration: f64,
}

/// Group sessions into chronologically ordered buckets.
///
/// Sessions without a timestamp are skipped; empty buckets are not emitted.
pub fn bucket_sessions(sessions: &[SessionRecord], granularity: Granularity) -> Vec<TimeBucket> {
    let mut buckets: BTreeMap<NaiveDate, (usize, Vec<f64>)> = BTreeMap::new();

    for session in sessions {
        let Some(ts) = session.created_at else {
            continue;
        };
        let entry = buckets
            .entry(granularity.bucket_start(ts.date_naive()))
            .or_default();
        entry.0 += 1;
        if let Some(duration) = session.duration() {
            entry.1.push(duration);
        }
    }

    buckets
        .into_iter()
        .map(|(start, (count, durations))| TimeBucket {
            period: granularity.label(start),
            count,
            grouping: granularity,
            total_duration: durations.iter().sum(),
            avg_duration: stats::mean(&durations),
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendDirection {
    Increasing,
    Decreasing,
    Stable,
}

impl TrendDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            TrendDirection::Increasing => "increasing",
            TrendDirection::Decreasing => "decreasing",
            TrendDirection::Stable => "stable",
        }
    }
}

/// Least-squares trend over a bucketed series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendSummary {
    pub slope: f64,
    pub direction: TrendDirection,
    pub points: usize,
}

impl TrendSummary {
    pub fn from_buckets(buckets: &[TimeBucket]) -> Self {
        let counts: Vec<f64> = buckets.iter().map(|b| b.count as f64).collect();
        Self::from_series(&counts)
    }

    /// Slope of index vs value. Fewer than two points is a flat trend.
    pub fn from_series(values: &[f64]) -> Self {
        let n = values.len();
        let slope = if n < 2 {
            0.0
        } else {
            let xs: Vec<f64> = (0..n).map(|i| i as f64).collect();
            let mean_x = stats::mean(&xs);
            let mean_y = stats::mean(values);
            let numerator: f64 = xs
                .iter()
                .zip(values)
                .map(|(x, y)| (x - mean_x) * (y - mean_y))
                .sum();
            let denominator: f64 = xs.iter().map(|x| (x - mean_x).powi(2)).sum();
            stats::ratio(numerator, denominator)
        };

        let direction = if slope > TREND_THRESHOLD {
            TrendDirection::Increasing
        } else if slope < -TREND_THRESHOLD {
            TrendDirection::Decreasing
        } else {
            TrendDirection::Stable
        };

        Self {
            slope,
            direction,
            points: n,
        }
    }
}

/// Aggregates for one comparison window.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PeriodStats {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub count: usize,
    pub mean_duration: f64,
    pub participants: usize,
}

impl PeriodStats {
    fn collect<'a>(
        sessions: impl Iterator<Item = &'a SessionRecord>,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Self {
        let mut count = 0;
        let mut durations = Vec::new();
        let mut participants = HashSet::new();
        for session in sessions {
            count += 1;
            participants.insert(session.participant_number.as_str());
            if let Some(duration) = session.duration() {
                durations.push(duration);
            }
        }
        Self {
            start,
            end,
            count,
            mean_duration: stats::mean(&durations),
            participants: participants.len(),
        }
    }
}

/// Current window vs the immediately preceding window of equal length.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PeriodComparison {
    pub window_days: i64,
    pub current: PeriodStats,
    pub previous: PeriodStats,
    pub count_change_pct: f64,
    pub duration_change_pct: f64,
    pub participant_change_pct: f64,
}

/// Compare `[now - W, now]` against `[now - 2W, now - W)`.
///
/// Returns `None` for the unbounded range. Percentage changes are 0 when the
/// previous window is empty.
pub fn compare_periods(
    sessions: &[SessionRecord],
    range: DateRange,
    now: DateTime<Utc>,
) -> Option<PeriodComparison> {
    let days = range.days()?;
    let window = Duration::days(days);
    let current_start = now - window;
    let previous_start = current_start - window;

    let current = PeriodStats::collect(
        sessions
            .iter()
            .filter(|s| s.created_at.is_some_and(|ts| ts >= current_start && ts <= now)),
        current_start,
        now,
    );
    let previous = PeriodStats::collect(
        sessions
            .iter()
            .filter(|s| s.created_at.is_some_and(|ts| ts >= previous_start && ts < current_start)),
        previous_start,
        current_start,
    );

    Some(PeriodComparison {
        window_days: days,
        count_change_pct: stats::pct_change(current.count as f64, previous.count as f64),
        duration_change_pct: stats::pct_change(current.mean_duration, previous.mean_duration),
        participant_change_pct: stats::pct_change(
            current.participants as f64,
            previous.participants as f64,
        ),
        current,
        previous,
    })
}
