//! Rule-based insight generation.
//!
//! Each rule inspects the computed statistics independently and may emit one
//! finding. The final list is ordered by impact, keeping generation order
//! within the same impact.

use serde::Serialize;

use super::correlation::{CorrelationDirection, CorrelationStrength, SessionDurationCorrelation};
use super::snapshot::SessionAnalytics;
use super::stats;
use super::temporal::{PeriodComparison, TrendDirection, TrendSummary};
use crate::types::DateRange;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum InsightType {
    Positive,
    Warning,
    Info,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Impact {
    High,
    Medium,
    Low,
}

impl Impact {
    /// Sort rank; high impact first.
    pub fn rank(&self) -> u8 {
        match self {
            Impact::High => 0,
            Impact::Medium => 1,
            Impact::Low => 2,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Impact::High => "high",
            Impact::Medium => "medium",
            Impact::Low => "low",
        }
    }
}

/// A human-readable finding.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Insight {
    #[serde(rename = "type")]
    pub kind: InsightType,
    pub category: String,
    pub title: String,
    pub description: String,
    pub metric: f64,
    pub impact: Impact,
}

impl Insight {
    fn new(
        kind: InsightType,
        category: &str,
        title: &str,
        description: String,
        metric: f64,
        impact: Impact,
    ) -> Self {
        Self {
            kind,
            category: category.to_string(),
            title: title.to_string(),
            description,
            metric: if metric.is_finite() { metric } else { 0.0 },
            impact,
        }
    }
}

/// Everything the rules look at.
#[derive(Debug, Clone, Copy)]
pub struct InsightInputs<'a> {
    pub range: DateRange,
    pub sessions: &'a SessionAnalytics,
    pub trend: &'a TrendSummary,
    pub comparison: Option<&'a PeriodComparison>,
    pub correlation: Option<&'a SessionDurationCorrelation>,
}

const HIGH_ENGAGEMENT_MINUTES: f64 = 30.0;
const SHORT_SESSION_MINUTES: f64 = 10.0;
const VARIABILITY_RATIO: f64 = 0.8;
const STRONG_RETENTION_SESSIONS: f64 = 5.0;
const SESSION_CHANGE_PCT: f64 = 20.0;
const DURATION_CHANGE_PCT: f64 = 15.0;
const WEEKLY_VOLUME: f64 = 10.0;
const MONTHLY_VOLUME: f64 = 30.0;
const PARTICIPANT_GROWTH_PCT: f64 = 10.0;

/// Generate findings, ordered by impact.
pub fn generate_insights(inputs: &InsightInputs<'_>) -> Vec<Insight> {
    let mut insights = Vec::new();
    let stats = inputs.sessions;
    let mean = stats.duration.mean;

    if mean > HIGH_ENGAGEMENT_MINUTES {
        insights.push(Insight::new(
            InsightType::Positive,
            "engagement",
            "High engagement",
            format!("Sessions average {:.1} minutes, above the 30 minute mark.", mean),
            mean,
            Impact::High,
        ));
    }

    if mean > 0.0 && mean < SHORT_SESSION_MINUTES {
        insights.push(Insight::new(
            InsightType::Warning,
            "engagement",
            "Short sessions",
            format!("Sessions average only {:.1} minutes.", mean),
            mean,
            Impact::Medium,
        ));
    }

    match inputs.trend.direction {
        TrendDirection::Increasing => insights.push(Insight::new(
            InsightType::Positive,
            "trend",
            "Growing activity",
            format!(
                "Session volume is rising by {:.1} sessions per period.",
                inputs.trend.slope
            ),
            inputs.trend.slope,
            Impact::High,
        )),
        TrendDirection::Decreasing => insights.push(Insight::new(
            InsightType::Warning,
            "trend",
            "Declining activity",
            format!(
                "Session volume is falling by {:.1} sessions per period.",
                inputs.trend.slope.abs()
            ),
            inputs.trend.slope,
            Impact::High,
        )),
        TrendDirection::Stable => {}
    }

    if mean > 0.0 && stats.duration.std_dev > VARIABILITY_RATIO * mean {
        insights.push(Insight::new(
            InsightType::Info,
            "variability",
            "High variability",
            format!(
                "Session lengths vary widely (standard deviation {:.1} vs mean {:.1} minutes).",
                stats.duration.std_dev, mean
            ),
            stats.duration.std_dev,
            Impact::Medium,
        ));
    }

    let per_participant = stats::ratio(stats.count as f64, stats.participants as f64);
    if per_participant > STRONG_RETENTION_SESSIONS {
        insights.push(Insight::new(
            InsightType::Positive,
            "retention",
            "Strong retention",
            format!(
                "Participants log {:.1} sessions each on average.",
                per_participant
            ),
            per_participant,
            Impact::High,
        ));
    }

    if let Some(comparison) = inputs
        .comparison
        .filter(|c| inputs.range.is_bounded() && c.previous.count > 0)
    {
        let change = comparison.count_change_pct;
        if change.abs() > SESSION_CHANGE_PCT {
            let (kind, title, verb) = if change > 0.0 {
                (InsightType::Positive, "Session volume up", "increased")
            } else {
                (InsightType::Warning, "Session volume down", "decreased")
            };
            insights.push(Insight::new(
                kind,
                "comparison",
                title,
                format!(
                    "Sessions {} {:.0}% compared with the previous {} days.",
                    verb,
                    change.abs(),
                    comparison.window_days
                ),
                change,
                Impact::High,
            ));
        }

        let change = comparison.duration_change_pct;
        if change.abs() > DURATION_CHANGE_PCT {
            let (kind, title, verb) = if change > 0.0 {
                (InsightType::Positive, "Longer sessions", "increased")
            } else {
                (InsightType::Warning, "Shorter sessions", "decreased")
            };
            insights.push(Insight::new(
                kind,
                "comparison",
                title,
                format!(
                    "Average session length {} {:.0}% compared with the previous {} days.",
                    verb,
                    change.abs(),
                    comparison.window_days
                ),
                change,
                Impact::Medium,
            ));
        }
    }

    match inputs.range {
        DateRange::Last30Days => {
            let weekly = stats.count as f64 / (30.0 / 7.0);
            if weekly > WEEKLY_VOLUME {
                insights.push(Insight::new(
                    InsightType::Positive,
                    "volume",
                    "Healthy weekly volume",
                    format!("About {:.1} sessions are logged per week.", weekly),
                    weekly,
                    Impact::High,
                ));
            }
        }
        DateRange::Last90Days => {
            if let Some(growth) = inputs
                .comparison
                .map(|c| c.participant_change_pct)
                .filter(|growth| *growth > PARTICIPANT_GROWTH_PCT)
            {
                insights.push(Insight::new(
                    InsightType::Positive,
                    "growth",
                    "Participant growth",
                    format!(
                        "Active participants grew {:.0}% over the previous quarter.",
                        growth
                    ),
                    growth,
                    Impact::High,
                ));
            }

            let monthly = stats.count as f64 / 3.0;
            if monthly > MONTHLY_VOLUME {
                insights.push(Insight::new(
                    InsightType::Positive,
                    "volume",
                    "Healthy monthly volume",
                    format!("About {:.1} sessions are logged per month.", monthly),
                    monthly,
                    Impact::Medium,
                ));
            }
        }
        _ => {}
    }

    if let Some(correlation) = inputs
        .correlation
        .filter(|c| c.strength == CorrelationStrength::Strong)
    {
        let description = match correlation.direction {
            CorrelationDirection::Negative => {
                "Participants who log more sessions tend to keep them shorter."
            }
            _ => "Participants who log more sessions also tend to stay longer.",
        };
        let title = match correlation.direction {
            CorrelationDirection::Negative => "Frequency vs duration: negative",
            _ => "Frequency vs duration: positive",
        };
        insights.push(Insight::new(
            InsightType::Info,
            "correlation",
            title,
            format!("{} (r = {:.2})", description, correlation.coefficient),
            correlation.coefficient,
            Impact::Medium,
        ));
    }

    // Stable: ties keep generation order
    insights.sort_by_key(|insight| insight.impact.rank());
    insights
}
