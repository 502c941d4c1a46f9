//! Record sources
//!
//! A [`DataSource`] hands out the current rows of one record stream and can
//! notify the host when those rows change. [`JsonFileSource`] reads exports
//! written to disk as a JSON array or as JSON Lines.

use std::path::{Path, PathBuf};
use std::time::Duration;

use notify_debouncer_mini::notify::{RecommendedWatcher, RecursiveMode};
use notify_debouncer_mini::{new_debouncer, DebounceEventResult, Debouncer};
use serde_json::Value;

use crate::error::{Error, Result};

/// Invoked (on the watcher's thread) whenever the source's rows change.
pub type ChangeCallback = Box<dyn Fn() + Send + 'static>;

/// A live record stream.
pub trait DataSource {
    /// Stream name used in logs and error messages.
    fn name(&self) -> &str;

    /// Every row currently available. A source that has not been populated
    /// yet returns an empty list.
    fn fetch_all(&self) -> Result<Vec<Value>>;

    /// Call `on_change` whenever the rows change, until the returned
    /// subscription is dropped.
    fn subscribe(&self, on_change: ChangeCallback) -> Result<Subscription>;
}

/// Active change notifications for one source.
pub struct Subscription {
    _debouncer: Debouncer<RecommendedWatcher>,
}

impl Subscription {
    /// Stop notifications.
    pub fn unsubscribe(self) {}
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").finish_non_exhaustive()
    }
}

/// A record export on disk, either a JSON array or one JSON object per line.
#[derive(Debug, Clone)]
pub struct JsonFileSource {
    name: String,
    path: PathBuf,
    debounce: Duration,
}

impl JsonFileSource {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            debounce: Duration::from_millis(500),
        }
    }

    /// Set how long to wait for writes to settle before notifying.
    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn parse_error(&self, message: impl Into<String>) -> Error {
        Error::Parse {
            source_name: self.name.clone(),
            message: message.into(),
        }
    }

    fn parse(&self, content: &str) -> Result<Vec<Value>> {
        let trimmed = content.trim_start();
        if trimmed.is_empty() {
            return Ok(Vec::new());
        }

        if trimmed.starts_with('[') {
            return serde_json::from_str::<Vec<Value>>(trimmed)
                .map_err(|e| self.parse_error(e.to_string()));
        }

        content
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .map(|(idx, line)| {
                serde_json::from_str::<Value>(line)
                    .map_err(|e| self.parse_error(format!("line {}: {}", idx + 1, e)))
            })
            .collect()
    }
}

impl DataSource for JsonFileSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn fetch_all(&self) -> Result<Vec<Value>> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(
                    source = %self.name,
                    path = %self.path.display(),
                    "Record export not found, treating as empty"
                );
                return Ok(Vec::new());
            }
            Err(e) => return Err(e.into()),
        };

        let rows = self.parse(&content)?;
        tracing::debug!(source = %self.name, rows = rows.len(), "Loaded records");
        Ok(rows)
    }

    fn subscribe(&self, on_change: ChangeCallback) -> Result<Subscription> {
        let file_name = self.path.file_name().map(|n| n.to_os_string());
        let source = self.name.clone();

        let mut debouncer = new_debouncer(self.debounce, move |res: DebounceEventResult| {
            match res {
                Ok(events) => {
                    let touched = events
                        .iter()
                        .any(|event| event.path.file_name() == file_name.as_deref());
                    if touched {
                        tracing::debug!(source = %source, "Record export changed");
                        on_change();
                    }
                }
                Err(e) => tracing::warn!(source = %source, error = %e, "Watch error"),
            }
        })?;

        // Watch the directory so the file may be created or replaced atomically
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        debouncer.watcher().watch(&dir, RecursiveMode::NonRecursive)?;

        tracing::info!(source = %self.name, dir = %dir.display(), "Watching record export");
        Ok(Subscription {
            _debouncer: debouncer,
        })
    }
}
