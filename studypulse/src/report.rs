//! Terminal and JSON rendering of an analytics snapshot.

use anyhow::{Context, Result};
use studypulse_core::analytics::{AnalyticsSnapshot, InsightType, UsagePatterns};

/// Signed whole-percent change, e.g. `+12%`.
fn format_delta(delta: f64) -> String {
    if delta >= 0.0 {
        format!("+{:.0}%", delta)
    } else {
        format!("{:.0}%", delta)
    }
}

pub fn print_json(snapshot: &AnalyticsSnapshot) -> Result<()> {
    let json = serde_json::to_string_pretty(snapshot).context("failed to serialize snapshot")?;
    println!("{}", json);
    Ok(())
}

pub fn print_terminal(snapshot: &AnalyticsSnapshot) {
    let title = format!("Study Dashboard: {}", snapshot.date_range.display_name());

    // Header
    println!();
    println!("╭{}╮", "─".repeat(60));
    println!("│{:^60}│", title);
    println!("╰{}╯", "─".repeat(60));
    println!();

    let stats = &snapshot.session_analytics;
    if stats.count == 0 {
        println!("  No sessions found for this period.");
        println!();
        return;
    }

    println!("SESSIONS");
    println!(
        "   Sessions: {:<12} Participants: {}",
        stats.count, stats.participants
    );
    println!(
        "   Mean:     {:<12} Median: {:.1} min",
        format!("{:.1} min", stats.duration.mean),
        stats.duration.median
    );
    println!(
        "   Range:    {:<12} p90: {:.1} min",
        format!("{:.0}-{:.0} min", stats.duration.min, stats.duration.max),
        stats.p90
    );
    println!(
        "   Trend:    {}",
        snapshot.summary.trend.as_str()
    );
    println!();

    if let Some(comparison) = &snapshot.period_comparison {
        println!("VS PREVIOUS {} DAYS", comparison.window_days);
        println!(
            "   Sessions: {}  │  Duration: {}  │  Participants: {}",
            format_delta(comparison.count_change_pct),
            format_delta(comparison.duration_change_pct),
            format_delta(comparison.participant_change_pct),
        );
        println!();
    }

    if !snapshot.time_series_data.is_empty() {
        println!(
            "ACTIVITY ({})",
            snapshot.time_series_data[0].grouping.as_str()
        );
        let peak = snapshot
            .time_series_data
            .iter()
            .map(|b| b.count)
            .max()
            .unwrap_or(0);
        for bucket in &snapshot.time_series_data {
            let width = if peak == 0 { 0 } else { bucket.count * 30 / peak };
            println!(
                "   {:<10} {:>4}  {}",
                bucket.period,
                bucket.count,
                "█".repeat(width.max(1))
            );
        }
        println!();
    }

    let patterns = &snapshot.usage_patterns;
    println!("TIME PATTERNS");
    println!(
        "   Peak hour:    {}",
        UsagePatterns::hour_display(patterns.peak_hour)
    );
    println!(
        "   Busiest day:  {}",
        UsagePatterns::day_name(patterns.busiest_day)
    );
    println!(
        "   Engagement:   {} single, {} regular, {} frequent",
        patterns.engagement_tiers.single,
        patterns.engagement_tiers.regular,
        patterns.engagement_tiers.frequent
    );
    println!();

    if let Some(correlation) = &snapshot.correlations {
        println!("FREQUENCY VS DURATION");
        println!(
            "   r = {:.2} ({}, {} participants)",
            correlation.coefficient,
            correlation.strength.as_str(),
            correlation.participants
        );
        println!();
    }

    if !snapshot.cohort_retention.is_empty() {
        println!("WEEKLY RETENTION");
        for cohort in &snapshot.cohort_retention {
            let weeks: Vec<String> = cohort
                .retention
                .iter()
                .map(|pct| format!("{:>4.0}%", pct))
                .collect();
            println!(
                "   {} ({:>3})  {}",
                cohort.cohort,
                cohort.size,
                weeks.join(" ")
            );
        }
        println!();
    }

    let changes: Vec<_> = snapshot
        .pre_post_comparison
        .iter()
        .filter(|(_, change)| change.pairs > 0)
        .collect();
    if !changes.is_empty() {
        println!("PRE/POST");
        for (name, change) in changes {
            println!(
                "   {:<10} {:>6.1} → {:>6.1}  ({:+.1}, n={})",
                name, change.pre_mean, change.post_mean, change.mean_change, change.pairs
            );
        }
        println!();
    }

    if !snapshot.insights.is_empty() {
        println!("INSIGHTS");
        for insight in &snapshot.insights {
            let marker = match insight.kind {
                InsightType::Positive => "+",
                InsightType::Warning => "!",
                InsightType::Info => "i",
            };
            println!(
                "   [{}] {} ({})",
                marker,
                insight.title,
                insight.impact.as_str()
            );
            println!("       {}", insight.description);
        }
        println!();
    }

    let quality = &snapshot.summary.data_quality;
    println!("DATA QUALITY");
    println!(
        "   With duration: {:.0}%  │  With timestamp: {:.0}%",
        quality.sessions_with_duration * 100.0,
        quality.sessions_with_timestamp * 100.0
    );
    println!(
        "   Pretest coverage: {:.0}%  │  Demographic coverage: {:.0}%",
        quality.pretest_coverage * 100.0,
        quality.demographic_coverage * 100.0
    );
    println!();
}
