//! Analytics over study records.
//!
//! Every analysis is a pure function of the records it receives. The
//! [`compute_analytics`] entry point runs them all and bundles the results
//! into an [`AnalyticsSnapshot`] ready to serialise.

pub mod cohort;
pub mod correlation;
pub mod distribution;
pub mod insights;
pub mod patterns;
pub mod scales;
pub mod snapshot;
pub mod stats;
pub mod temporal;

pub use cohort::{cohort_retention, CohortRetention};
pub use correlation::{
    participant_features, session_duration_correlation, CorrelationDirection,
    CorrelationStrength, ParticipantFeatures, SessionDurationCorrelation,
};
pub use distribution::{
    analyze_responses, demographic_distribution, BooleanTally, FrequencyTable, ResponseAnalysis,
};
pub use insights::{generate_insights, Impact, Insight, InsightInputs, InsightType};
pub use patterns::{usage_patterns, EngagementTiers, ParticipantEngagement, UsagePatterns};
pub use scales::{
    cope_score, pre_post_comparison, pss4_score, summarize_composites, who5_percentage,
    CompositeSummary, ScoreChange,
};
pub use snapshot::{
    compute_analytics, AnalyticsInput, AnalyticsOptions, AnalyticsSnapshot, DataQuality,
    SessionAnalytics, Summary,
};
pub use stats::Descriptive;
pub use temporal::{
    bucket_sessions, compare_periods, week_start, Granularity, PeriodComparison, PeriodStats,
    TimeBucket, TrendDirection, TrendSummary,
};
