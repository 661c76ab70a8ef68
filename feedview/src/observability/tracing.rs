//! Tracing setup and batch span helpers.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Instant;
use tracing_subscriber::EnvFilter;

use crate::config::LogSettings;
use crate::errors::ConfigError;

/// Installs a global fmt subscriber configured from `settings`.
///
/// `RUST_LOG` takes precedence over the configured filter. Returns `Ok(false)`
/// when a global subscriber is already installed.
pub fn init_tracing(settings: &LogSettings) -> Result<bool, ConfigError> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&settings.filter).map_err(|e| {
            ConfigError::InvalidSettings(format!("log filter '{}': {e}", settings.filter))
        })?,
    };

    let installed = if settings.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .try_init()
            .is_ok()
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .try_init()
            .is_ok()
    };
    Ok(installed)
}

/// Span attributes for one aggregator run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchSpanAttributes {
    /// Batch id.
    pub batch_id: Option<String>,
    /// Batch label, e.g. `views` or `feeds`.
    pub label: Option<String>,
    /// Number of branches.
    pub total: Option<usize>,
    /// Number of branches that succeeded.
    pub completed: Option<usize>,
    /// Number of branches that failed.
    pub failed: Option<usize>,
    /// Duration in milliseconds.
    pub duration_ms: Option<f64>,
}

impl BatchSpanAttributes {
    /// Creates empty attributes.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the batch id.
    #[must_use]
    pub fn with_batch_id(mut self, id: impl Into<String>) -> Self {
        self.batch_id = Some(id.into());
        self
    }

    /// Sets the label.
    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Sets the branch counts.
    #[must_use]
    pub fn with_counts(mut self, total: usize, completed: usize, failed: usize) -> Self {
        self.total = Some(total);
        self.completed = Some(completed);
        self.failed = Some(failed);
        self
    }

    /// Sets the duration.
    #[must_use]
    pub fn with_duration_ms(mut self, duration_ms: f64) -> Self {
        self.duration_ms = Some(duration_ms);
        self
    }

    /// Converts to flat OpenTelemetry-style attributes.
    #[must_use]
    pub fn to_otel_attributes(&self) -> HashMap<String, String> {
        let mut attrs = HashMap::new();

        if let Some(ref v) = self.batch_id {
            attrs.insert("feedview.batch_id".to_string(), v.clone());
        }
        if let Some(ref v) = self.label {
            attrs.insert("feedview.label".to_string(), v.clone());
        }
        if let Some(v) = self.total {
            attrs.insert("feedview.branches.total".to_string(), v.to_string());
        }
        if let Some(v) = self.completed {
            attrs.insert("feedview.branches.completed".to_string(), v.to_string());
        }
        if let Some(v) = self.failed {
            attrs.insert("feedview.branches.failed".to_string(), v.to_string());
        }
        if let Some(v) = self.duration_ms {
            attrs.insert("feedview.duration_ms".to_string(), v.to_string());
        }

        attrs
    }
}

/// Simple span timing helper.
#[derive(Debug)]
pub struct SpanTimer {
    start: Instant,
    name: String,
}

impl SpanTimer {
    /// Starts a new timer.
    #[must_use]
    pub fn start(name: impl Into<String>) -> Self {
        Self {
            start: Instant::now(),
            name: name.into(),
        }
    }

    /// Returns the elapsed time in milliseconds.
    #[must_use]
    pub fn elapsed_ms(&self) -> f64 {
        self.start.elapsed().as_secs_f64() * 1000.0
    }

    /// Returns the span name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Finishes the span and returns the duration.
    #[must_use]
    pub fn finish(self) -> f64 {
        self.elapsed_ms()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_attributes() {
        let attrs = BatchSpanAttributes::new()
            .with_batch_id("b-1")
            .with_label("views")
            .with_counts(3, 2, 1)
            .to_otel_attributes();

        assert_eq!(attrs.get("feedview.batch_id"), Some(&"b-1".to_string()));
        assert_eq!(attrs.get("feedview.label"), Some(&"views".to_string()));
        assert_eq!(attrs.get("feedview.branches.failed"), Some(&"1".to_string()));
        assert!(!attrs.contains_key("feedview.duration_ms"));
    }

    #[test]
    fn test_span_timer() {
        let timer = SpanTimer::start("feeds");
        std::thread::sleep(std::time::Duration::from_millis(5));
        assert_eq!(timer.name(), "feeds");
        assert!(timer.finish() >= 5.0);
    }

    #[test]
    fn test_init_tracing_rejects_bad_filter() {
        if std::env::var("RUST_LOG").is_ok() {
            return;
        }
        let settings = LogSettings {
            filter: "feedview=verbose".to_string(),
            json: false,
        };
        assert!(init_tracing(&settings).is_err());
    }

    #[test]
    fn test_init_tracing_is_idempotent() {
        let settings = LogSettings::default();
        let _ = init_tracing(&settings);
        assert!(!init_tracing(&settings).unwrap());
    }
}
