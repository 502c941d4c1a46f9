//! # studypulse-core
//!
//! Core library for studypulse - analytics for a mental-health research
//! study dashboard.
//!
//! This library provides:
//! - Typed session, questionnaire and demographic records
//! - Filtering of record streams by date range, participant and field
//! - The analytics engine producing a serialisable snapshot
//! - Record sources with change notifications
//! - Configuration management
//! - Logging infrastructure
//!
//! ## Architecture
//!
//! Data flows through three stages:
//! - **Sources:** raw JSON rows read from exports ([`DataSource`])
//! - **Filtering:** typed records narrowed by a [`FilterContext`]
//! - **Analytics:** pure computation of an [`AnalyticsSnapshot`]
//!
//! ## Example
//!
//! ```rust,no_run
//! use studypulse_core::analytics::{compute_analytics, AnalyticsInput, AnalyticsOptions};
//! use studypulse_core::{DataSource, Dataset, DateRange, JsonFileSource};
//!
//! let sessions = JsonFileSource::new("sessions", "sessions.json")
//!     .fetch_all()
//!     .expect("failed to read sessions");
//! let data = Dataset::from_values(sessions, Vec::new(), Vec::new(), Vec::new());
//!
//! let input = AnalyticsInput {
//!     sessions: &data.sessions,
//!     ..Default::default()
//! };
//! let snapshot = compute_analytics(
//!     &input,
//!     &AnalyticsOptions::default(),
//!     DateRange::Last30Days,
//!     chrono::Utc::now(),
//! );
//! println!("{} sessions", snapshot.session_analytics.count);
//! ```

// Re-export commonly used items at the crate root
pub use analytics::{compute_analytics, AnalyticsInput, AnalyticsOptions, AnalyticsSnapshot};
pub use config::Config;
pub use error::{Error, Result};
pub use filter::{apply_filters, DemographicPredicate, FieldFilter, FilterContext, FilterOp, RecordStream};
pub use source::{ChangeCallback, DataSource, JsonFileSource, Subscription};
pub use types::*;

// Public modules
pub mod analytics;
pub mod config;
pub mod error;
pub mod filter;
pub mod logging;
pub mod source;
pub mod types;
