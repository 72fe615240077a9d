//! Requeue scheduling policy
//!
//! Maps the configured reconciliation interval to the directive a pass
//! returns to the controller. Bad configuration never fails a pass; it
//! degrades to the controller's default backoff.

use std::time::Duration;

/// Environment variable holding the reconciliation interval in whole seconds
pub const RECONCILIATION_TIME_ENV: &str = "RECONCILIATION_TIME";

/// Scheduling decision returned by a reconciliation pass
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RequeueDirective {
    /// Do not re-deliver the key until the object changes
    Stop,
    /// Re-deliver the key after exactly this delay
    RequeueAfter(Duration),
    /// Re-deliver the key using the controller's own backoff
    DefaultBackoff,
}

/// Resolve the directive for a raw interval value.
///
/// `None`, empty or non-numeric values yield `DefaultBackoff`. A zero
/// interval means no periodic pass is scheduled.
pub fn directive_for(raw: Option<&str>) -> RequeueDirective {
    match raw.map(str::parse::<u64>) {
        Some(Ok(0)) => RequeueDirective::Stop,
        Some(Ok(secs)) => RequeueDirective::RequeueAfter(Duration::from_secs(secs)),
        Some(Err(_)) | None => RequeueDirective::DefaultBackoff,
    }
}

/// Source of the reconciliation interval, consulted on every pass
pub trait IntervalSource: Send + Sync {
    /// Raw, unparsed interval value if one is configured
    fn raw_interval(&self) -> Option<String>;

    /// Directive derived from the current value
    fn directive(&self) -> RequeueDirective {
        directive_for(self.raw_interval().as_deref())
    }
}

/// Reads the interval from a process environment variable on each call,
/// so a changed value takes effect on the next pass.
#[derive(Clone, Debug)]
pub struct EnvInterval {
    var: String,
}

impl EnvInterval {
    pub fn new(var: impl Into<String>) -> Self {
        Self { var: var.into() }
    }

    pub fn var(&self) -> &str {
        &self.var
    }
}

impl Default for EnvInterval {
    fn default() -> Self {
        Self::new(RECONCILIATION_TIME_ENV)
    }
}

impl IntervalSource for EnvInterval {
    fn raw_interval(&self) -> Option<String> {
        std::env::var(&self.var).ok()
    }
}

/// Fixed interval value
#[derive(Clone, Debug, Default)]
pub struct FixedInterval(pub Option<String>);

impl FixedInterval {
    pub fn seconds(secs: u64) -> Self {
        Self(Some(secs.to_string()))
    }

    pub fn unset() -> Self {
        Self(None)
    }
}

impl IntervalSource for FixedInterval {
    fn raw_interval(&self) -> Option<String> {
        self.0.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_interval_uses_default_backoff() {
        assert_eq!(directive_for(None), RequeueDirective::DefaultBackoff);
    }

    #[test]
    fn malformed_interval_uses_default_backoff() {
        for raw in ["", "abc", "-5", " 5", "5s", "1.5", "99999999999999999999999"] {
            assert_eq!(
                directive_for(Some(raw)),
                RequeueDirective::DefaultBackoff,
                "value {raw:?}"
            );
        }
    }

    #[test]
    fn numeric_interval_requeues_after_seconds() {
        assert_eq!(
            directive_for(Some("30")),
            RequeueDirective::RequeueAfter(Duration::from_secs(30))
        );
    }

    #[test]
    fn zero_interval_stops() {
        assert_eq!(directive_for(Some("0")), RequeueDirective::Stop);
    }

    #[test]
    fn fixed_interval_source() {
        assert_eq!(
            FixedInterval::seconds(10).directive(),
            RequeueDirective::RequeueAfter(Duration::from_secs(10))
        );
        assert_eq!(FixedInterval::unset().directive(), RequeueDirective::DefaultBackoff);
    }

    #[test]
    fn env_interval_reads_on_every_call() {
        let source = EnvInterval::new("CALC_OPERATOR_TEST_INTERVAL_REREAD");
        std::env::remove_var(source.var());
        assert_eq!(source.directive(), RequeueDirective::DefaultBackoff);

        std::env::set_var(source.var(), "15");
        assert_eq!(
            source.directive(),
            RequeueDirective::RequeueAfter(Duration::from_secs(15))
        );

        std::env::set_var(source.var(), "garbage");
        assert_eq!(source.directive(), RequeueDirective::DefaultBackoff);
        std::env::remove_var(source.var());
    }
}
