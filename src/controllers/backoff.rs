//! Per-key exponential requeue backoff
//!
//! kube-runtime has no built-in rate-limited requeue, so the controller keeps
//! its own attempt counters. A key backs off while its passes keep asking for
//! the default backoff or keep failing, and starts over once a pass settles
//! on an explicit schedule.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use kube_runtime::controller::Action;

use crate::adapters::ObjectKey;
use crate::reconcilers::RequeueDirective;

/// Default first delay
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(5);

/// Default delay cap
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(1000);

/// Exponential per-key backoff
#[derive(Debug)]
pub struct RequeueBackoff {
    base: Duration,
    max: Duration,
    attempts: Mutex<HashMap<ObjectKey, u32>>,
}

impl Default for RequeueBackoff {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_DELAY, DEFAULT_MAX_DELAY)
    }
}

impl RequeueBackoff {
    pub fn new(base: Duration, max: Duration) -> Self {
        Self {
            base,
            max,
            attempts: Mutex::new(HashMap::new()),
        }
    }

    fn attempts(&self) -> MutexGuard<'_, HashMap<ObjectKey, u32>> {
        self.attempts.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Next delay for `key`, doubling on every call
    pub fn next(&self, key: &ObjectKey) -> Duration {
        let mut attempts = self.attempts();
        let attempt = attempts.entry(key.clone()).or_insert(0);
        let factor = 1u32.checked_shl(*attempt).unwrap_or(u32::MAX);
        *attempt = attempt.saturating_add(1);
        self.base.saturating_mul(factor).min(self.max)
    }

    /// Reset the backoff for `key`
    pub fn forget(&self, key: &ObjectKey) {
        self.attempts().remove(key);
    }

    /// Translate a pass's directive into a controller action
    pub fn action_for(&self, key: &ObjectKey, directive: RequeueDirective) -> Action {
        match directive {
            RequeueDirective::Stop => {
                self.forget(key);
                Action::await_change()
            }
            RequeueDirective::RequeueAfter(delay) => {
                self.forget(key);
                Action::requeue(delay)
            }
            RequeueDirective::DefaultBackoff => Action::requeue(self.next(key)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(name: &str) -> ObjectKey {
        ObjectKey::new("default", name)
    }

    #[test]
    fn delay_doubles_per_attempt() {
        let backoff = RequeueBackoff::default();
        let k = key("a");
        assert_eq!(backoff.next(&k), Duration::from_millis(5));
        assert_eq!(backoff.next(&k), Duration::from_millis(10));
        assert_eq!(backoff.next(&k), Duration::from_millis(20));
    }

    #[test]
    fn delay_is_capped() {
        let backoff = RequeueBackoff::new(Duration::from_secs(1), Duration::from_secs(8));
        let k = key("a");
        let delays: Vec<_> = (0..40).map(|_| backoff.next(&k)).collect();
        assert_eq!(delays[3], Duration::from_secs(8));
        assert_eq!(*delays.last().unwrap(), Duration::from_secs(8));
    }

    #[test]
    fn keys_back_off_independently() {
        let backoff = RequeueBackoff::default();
        backoff.next(&key("a"));
        backoff.next(&key("a"));
        assert_eq!(backoff.next(&key("b")), Duration::from_millis(5));
    }

    #[test]
    fn explicit_schedule_resets_backoff() {
        let backoff = RequeueBackoff::default();
        let k = key("a");
        backoff.next(&k);
        backoff.next(&k);

        let action = backoff.action_for(&k, RequeueDirective::RequeueAfter(Duration::from_secs(30)));
        assert_eq!(action, Action::requeue(Duration::from_secs(30)));
        assert_eq!(backoff.next(&k), Duration::from_millis(5));
    }

    #[test]
    fn stop_awaits_change() {
        let backoff = RequeueBackoff::default();
        assert_eq!(
            backoff.action_for(&key("a"), RequeueDirective::Stop),
            Action::await_change()
        );
    }

    #[test]
    fn default_backoff_grows() {
        let backoff = RequeueBackoff::default();
        let k = key("a");
        assert_eq!(
            backoff.action_for(&k, RequeueDirective::DefaultBackoff),
            Action::requeue(Duration::from_millis(5))
        );
        assert_eq!(
            backoff.action_for(&k, RequeueDirective::DefaultBackoff),
            Action::requeue(Duration::from_millis(10))
        );
    }
}
