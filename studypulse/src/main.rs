//! studypulse - research study dashboard analytics
//!
//! Reads session, questionnaire and demographic exports, applies the
//! requested filters and prints the analytics snapshot. With `--watch` the
//! snapshot is recomputed whenever an export changes.
//!
//! Uses XDG Base Directory specification for file locations:
//! - Config: $XDG_CONFIG_HOME/studypulse/config.toml (~/.config/studypulse/config.toml)
//! - Logs: $XDG_STATE_HOME/studypulse/studypulse.log (~/.local/state/studypulse/studypulse.log)

mod cache;
mod report;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use serde_json::Value;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::time::Duration;
use studypulse_core::analytics::{compute_analytics, AnalyticsInput, AnalyticsOptions};
use studypulse_core::{
    apply_filters, Config, DataSource, Dataset, DateRange, DemographicPredicate, FieldFilter,
    FilterContext, JsonFileSource,
};

#[derive(Parser, Debug)]
#[command(name = "studypulse")]
#[command(about = "Analytics for research study session and questionnaire exports")]
#[command(version)]
struct Args {
    /// Session export (JSON array or JSON Lines)
    #[arg(long)]
    sessions: Option<PathBuf>,

    /// Pretest questionnaire export
    #[arg(long)]
    pretest: Option<PathBuf>,

    /// Posttest questionnaire export
    #[arg(long)]
    posttest: Option<PathBuf>,

    /// Demographics export
    #[arg(long)]
    demographics: Option<PathBuf>,

    /// Date range: today, 7d, 30d, 90d or all
    #[arg(long, default_value = "all")]
    range: DateRange,

    /// Only include one participant
    #[arg(long)]
    participant: Option<String>,

    /// Only include participants whose demographic FIELD equals VALUE
    #[arg(long = "where", value_name = "FIELD=VALUE")]
    demographic: Option<String>,

    /// Custom filter, e.g. `sessions.device_type=ios` (repeatable)
    #[arg(long = "filter", value_name = "EXPR")]
    filters: Vec<String>,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,

    /// Watch mode - recompute whenever an export changes
    #[arg(short, long)]
    watch: bool,

    /// Debounce interval in milliseconds (only with --watch)
    #[arg(long)]
    debounce: Option<u64>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

/// The four record exports; streams without a path are empty.
struct Sources {
    sessions: Option<JsonFileSource>,
    pretest: Option<JsonFileSource>,
    posttest: Option<JsonFileSource>,
    demographics: Option<JsonFileSource>,
}

/// Raw rows as read from the exports.
struct RawStreams {
    sessions: Vec<Value>,
    pretest: Vec<Value>,
    posttest: Vec<Value>,
    demographics: Vec<Value>,
}

impl Sources {
    fn resolve(args: &Args, config: &Config, debounce: Duration) -> Self {
        let source = |name: &str, arg: &Option<PathBuf>, configured: &Option<PathBuf>| {
            arg.as_ref()
                .or(configured.as_ref())
                .map(|path| JsonFileSource::new(name, path).with_debounce(debounce))
        };
        Self {
            sessions: source("sessions", &args.sessions, &config.sources.sessions),
            pretest: source("pretest", &args.pretest, &config.sources.pretest),
            posttest: source("posttest", &args.posttest, &config.sources.posttest),
            demographics: source(
                "demographics",
                &args.demographics,
                &config.sources.demographics,
            ),
        }
    }

    fn configured(&self) -> impl Iterator<Item = &JsonFileSource> {
        [
            &self.sessions,
            &self.pretest,
            &self.posttest,
            &self.demographics,
        ]
        .into_iter()
        .flatten()
    }

    fn fetch(&self) -> Result<RawStreams> {
        let fetch = |source: &Option<JsonFileSource>| -> Result<Vec<Value>> {
            match source {
                Some(source) => source
                    .fetch_all()
                    .with_context(|| format!("failed to read {} export", source.name())),
                None => Ok(Vec::new()),
            }
        };
        Ok(RawStreams {
            sessions: fetch(&self.sessions)?,
            pretest: fetch(&self.pretest)?,
            posttest: fetch(&self.posttest)?,
            demographics: fetch(&self.demographics)?,
        })
    }
}

impl RawStreams {
    fn cache_key(&self, range: DateRange) -> String {
        cache::snapshot_key(
            &[
                self.sessions.as_slice(),
                self.pretest.as_slice(),
                self.posttest.as_slice(),
                self.demographics.as_slice(),
            ],
            range.as_str(),
        )
    }

    fn into_dataset(self) -> Dataset {
        Dataset::from_values(self.sessions, self.pretest, self.posttest, self.demographics)
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Load configuration
    let config = Config::load().context("failed to load configuration")?;

    // Initialize logging
    let _log_guard = studypulse_core::logging::init(&config.logging)
        .context("failed to initialize logging")?;

    tracing::info!(range = %args.range, watch = args.watch, "studypulse starting");

    let context = build_filter_context(&args)?;
    let debounce = Duration::from_millis(args.debounce.unwrap_or(config.watch.debounce_ms));
    let sources = Sources::resolve(&args, &config, debounce);
    let options = config.analytics.options();

    if args.watch {
        run_watch_mode(&args, &sources, &context, &options)
    } else {
        let raw = sources.fetch()?;
        render(raw.into_dataset(), &args, &context, &options)
    }
}

/// Turn the filter flags into a filter context.
fn build_filter_context(args: &Args) -> Result<FilterContext> {
    let mut context = FilterContext::new(args.range);
    context.participant = args.participant.clone();

    if let Some(expr) = &args.demographic {
        let (field, value) = expr
            .split_once('=')
            .with_context(|| format!("invalid --where '{}', expected FIELD=VALUE", expr))?;
        context.demographic = Some(DemographicPredicate {
            field: field.trim().to_string(),
            value: value.trim().to_string(),
        });
    }

    for expr in &args.filters {
        let filter = expr
            .parse::<FieldFilter>()
            .with_context(|| format!("invalid --filter '{}'", expr))?;
        tracing::debug!(filter = %filter, "Custom filter");
        context.custom.push(filter);
    }

    Ok(context)
}

/// Filter, compute and print one snapshot.
fn render(
    data: Dataset,
    args: &Args,
    context: &FilterContext,
    options: &AnalyticsOptions,
) -> Result<()> {
    let now = chrono::Utc::now();

    // The engine windows sessions itself so the previous period stays visible
    let filtered = apply_filters(&data, &context.without_date_range(), now);
    let input = AnalyticsInput {
        sessions: &filtered.sessions,
        pretest: &filtered.pretest,
        posttest: &filtered.posttest,
        demographics: &filtered.demographics,
    };
    let snapshot = compute_analytics(&input, options, context.date_range, now);

    tracing::info!(
        sessions = snapshot.session_analytics.count,
        insights = snapshot.insights.len(),
        "Computed analytics snapshot"
    );

    match args.format {
        OutputFormat::Json => report::print_json(&snapshot)?,
        OutputFormat::Text => report::print_terminal(&snapshot),
    }
    Ok(())
}

/// Run continuous watch mode
fn run_watch_mode(
    args: &Args,
    sources: &Sources,
    context: &FilterContext,
    options: &AnalyticsOptions,
) -> Result<()> {
    // Set up signal handler for graceful shutdown
    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();

    ctrlc::set_handler(move || {
        eprintln!("\nShutting down...");
        r.store(false, Ordering::SeqCst);
    })
    .context("failed to set Ctrl+C handler")?;

    let (tx, rx) = mpsc::channel::<()>();
    let mut subscriptions = Vec::new();
    for source in sources.configured() {
        let tx = tx.clone();
        let subscription = source
            .subscribe(Box::new(move || {
                let _ = tx.send(());
            }))
            .with_context(|| format!("failed to watch {} export", source.name()))?;
        subscriptions.push(subscription);
    }
    drop(tx);

    eprintln!(
        "Watch mode active ({} export(s)). Press Ctrl+C to stop.",
        subscriptions.len()
    );
    eprintln!("Logs: {}", studypulse_core::logging::log_file_path().display());

    let mut last_key: Option<String> = None;
    let mut iteration = 0u64;
    refresh(args, sources, context, options, &mut last_key, &mut iteration);

    while running.load(Ordering::SeqCst) {
        match rx.recv_timeout(Duration::from_millis(250)) {
            Ok(()) => {
                // Collapse a burst of notifications into one refresh
                while rx.try_recv().is_ok() {}
                refresh(args, sources, context, options, &mut last_key, &mut iteration);
            }
            Err(mpsc::RecvTimeoutError::Timeout) => {}
            Err(mpsc::RecvTimeoutError::Disconnected) => break,
        }
    }

    for subscription in subscriptions {
        subscription.unsubscribe();
    }

    eprintln!("Watch mode stopped.");
    tracing::info!("studypulse watch mode stopped");

    Ok(())
}

/// Reload the exports and re-render if anything changed.
///
/// Errors are reported and the loop keeps running; an export may be caught
/// mid-write and parse on the next notification.
fn refresh(
    args: &Args,
    sources: &Sources,
    context: &FilterContext,
    options: &AnalyticsOptions,
    last_key: &mut Option<String>,
    iteration: &mut u64,
) {
    let raw = match sources.fetch() {
        Ok(raw) => raw,
        Err(e) => {
            tracing::warn!(error = %format!("{:#}", e), "Failed to reload exports");
            eprintln!("Error: {:#}", e);
            return;
        }
    };

    let key = raw.cache_key(context.date_range);
    if last_key.as_deref() == Some(key.as_str()) {
        tracing::debug!("Exports unchanged, skipping recompute");
        return;
    }

    *iteration += 1;
    tracing::info!(iteration = *iteration, key = %&key[..12], "watch refresh");
    if let Err(e) = render(raw.into_dataset(), args, context, options) {
        eprintln!("Error: {:#}", e);
        return;
    }
    *last_key = Some(key);
}
