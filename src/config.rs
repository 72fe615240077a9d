//! Process configuration
//!
//! Process-level settings are read once at startup. The reconciliation
//! interval is not stored here: the reconciler is handed an
//! [`EnvInterval`] that re-reads it on every pass.

use crate::error::{Error, Result};
use crate::reconcilers::requeue::{EnvInterval, RECONCILIATION_TIME_ENV};

/// Default metrics port
pub const DEFAULT_METRICS_PORT: u16 = 8080;

/// Environment variable overriding the metrics port
pub const METRICS_PORT_ENV: &str = "METRICS_PORT";

/// Environment variable bounding concurrent reconciliations (0 = unbounded)
pub const CONCURRENCY_ENV: &str = "RECONCILE_CONCURRENCY";

/// Operator settings
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OperatorConfig {
    /// Port for `/metrics` and health endpoints
    pub metrics_port: u16,

    /// Maximum concurrent reconciliations across keys
    pub concurrency: u16,

    /// Variable the reconciliation interval is read from
    pub interval_var: String,
}

impl Default for OperatorConfig {
    fn default() -> Self {
        Self {
            metrics_port: DEFAULT_METRICS_PORT,
            concurrency: 0,
            interval_var: RECONCILIATION_TIME_ENV.to_string(),
        }
    }
}

impl OperatorConfig {
    /// Load from the process environment
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Load from an arbitrary variable lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::default();
        Ok(Self {
            metrics_port: parse_var(&lookup, METRICS_PORT_ENV)?.unwrap_or(defaults.metrics_port),
            concurrency: parse_var(&lookup, CONCURRENCY_ENV)?.unwrap_or(defaults.concurrency),
            interval_var: defaults.interval_var,
        })
    }

    /// Interval source for the reconciler
    pub fn interval_source(&self) -> EnvInterval {
        EnvInterval::new(self.interval_var.clone())
    }
}

fn parse_var<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &str,
) -> Result<Option<T>>
where
    T::Err: std::fmt::Display,
{
    match lookup(var) {
        None => Ok(None),
        Some(raw) if raw.trim().is_empty() => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| Error::config(format!("Invalid {} '{}': {}", var, raw, e))),
    }
}
