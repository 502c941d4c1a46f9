//! Does logging more sessions go with longer (or shorter) sessions?

use std::collections::BTreeMap;

use serde::Serialize;

use super::stats;
use crate::types::SessionRecord;

/// Per-participant usage features, built by folding the session stream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantFeatures {
    /// Sessions with a usable duration
    pub session_count: usize,
    pub total_duration: f64,
    pub avg_duration: f64,
}

/// Fold sessions into one feature vector per participant.
///
/// Only sessions with a usable duration contribute.
pub fn participant_features(sessions: &[SessionRecord]) -> BTreeMap<String, ParticipantFeatures> {
    let mut features: BTreeMap<String, ParticipantFeatures> = BTreeMap::new();
    for session in sessions {
        let Some(duration) = session.duration() else {
            continue;
        };
        let entry = features
            .entry(session.participant_number.clone())
            .or_default();
        entry.session_count += 1;
        entry.total_duration += duration;
    }
    for entry in features.values_mut() {
        entry.avg_duration = stats::ratio(entry.total_duration, entry.session_count as f64);
    }
    features
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CorrelationStrength {
    Strong,
    Moderate,
    Weak,
}

impl CorrelationStrength {
    pub fn classify(coefficient: f64) -> Self {
        let magnitude = coefficient.abs();
        if magnitude > 0.7 {
            CorrelationStrength::Strong
        } else if magnitude > 0.3 {
            CorrelationStrength::Moderate
        } else {
            CorrelationStrength::Weak
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CorrelationStrength::Strong => "strong",
            CorrelationStrength::Moderate => "moderate",
            CorrelationStrength::Weak => "weak",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CorrelationDirection {
    Positive,
    Negative,
    None,
}

/// Session count vs average duration across participants.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionDurationCorrelation {
    pub coefficient: f64,
    pub strength: CorrelationStrength,
    pub direction: CorrelationDirection,
    /// Participants contributing a feature vector
    pub participants: usize,
    /// Session records considered
    pub sample_size: usize,
}

/// Correlate per-participant session count with average duration.
///
/// Returns `None` below `min_sessions` records; correlations on a handful of
/// sessions are noise.
pub fn session_duration_correlation(
    sessions: &[SessionRecord],
    min_sessions: usize,
) -> Option<SessionDurationCorrelation> {
    if sessions.len() < min_sessions {
        tracing::debug!(
            sessions = sessions.len(),
            min_sessions,
            "Skipping correlation analysis"
        );
        return None;
    }

    let features = participant_features(sessions);
    let counts: Vec<f64> = features.values().map(|f| f.session_count as f64).collect();
    let averages: Vec<f64> = features.values().map(|f| f.avg_duration).collect();
    let coefficient = stats::correlation(&counts, &averages);

    let direction = if coefficient > 0.0 {
        CorrelationDirection::Positive
    } else if coefficient < 0.0 {
        CorrelationDirection::Negative
    } else {
        CorrelationDirection::None
    };

    Some(SessionDurationCorrelation {
        coefficient,
        strength: CorrelationStrength::classify(coefficient),
        direction,
        participants: features.len(),
        sample_size: sessions.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(participant: &str, duration: Option<f64>) -> SessionRecord {
        SessionRecord {
            participant_number: participant.to_string(),
            duration_minutes: duration,
            created_at: None,
            device_type: None,
            session_type: None,
        }
    }

    #[test]
    fn test_features_ignore_missing_durations() {
        let sessions = vec![
            session("A", Some(10.0)),
            session("A", Some(20.0)),
            session("A", None),
            session("B", Some(5.0)),
            session("C", None),
        ];
        let features = participant_features(&sessions);
        assert_eq!(features.len(), 2);
        assert_eq!(features["A"].session_count, 2);
        assert_eq!(features["A"].avg_duration, 15.0);
        assert_eq!(features["B"].total_duration, 5.0);
        assert!(!features.contains_key("C"));
    }

    #[test]
    fn test_strength_thresholds() {
        assert_eq!(CorrelationStrength::classify(0.71), CorrelationStrength::Strong);
        assert_eq!(CorrelationStrength::classify(-0.9), CorrelationStrength::Strong);
        assert_eq!(CorrelationStrength::classify(0.7), CorrelationStrength::Moderate);
        assert_eq!(CorrelationStrength::classify(-0.31), CorrelationStrength::Moderate);
        assert_eq!(CorrelationStrength::classify(0.3), CorrelationStrength::Weak);
    }

    #[test]
    fn test_frequent_users_with_longer_sessions_correlate_positively() {
        let mut sessions = Vec::new();
        // A: 1 session of 5; B: 2 sessions averaging 10; C: 3 sessions averaging 15
        sessions.push(session("A", Some(5.0)));
        sessions.extend([session("B", Some(8.0)), session("B", Some(12.0))]);
        sessions.extend([
            session("C", Some(15.0)),
            session("C", Some(15.0)),
            session("C", Some(15.0)),
        ]);

        let result = session_duration_correlation(&sessions, 5).unwrap();
        assert!((result.coefficient - 1.0).abs() < 1e-9);
        assert_eq!(result.strength, CorrelationStrength::Strong);
        assert_eq!(result.direction, CorrelationDirection::Positive);
        assert_eq!(result.participants, 3);
        assert_eq!(result.sample_size, 6);
    }

    #[test]
    fn test_skipped_below_minimum() {
        let sessions = vec![session("A", Some(5.0)), session("B", Some(7.0))];
        assert!(session_duration_correlation(&sessions, 5).is_none());
    }

    #[test]
    fn test_uniform_participants_yield_zero() {
        let sessions: Vec<_> = ["A", "B", "C", "D", "E"]
            .iter()
            .map(|p| session(p, Some(10.0)))
            .collect();
        let result = session_duration_correlation(&sessions, 5).unwrap();
        assert_eq!(result.coefficient, 0.0);
        assert_eq!(result.direction, CorrelationDirection::None);
        assert_eq!(result.strength, CorrelationStrength::Weak);
    }
}
