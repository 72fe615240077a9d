//! Calculator reconciler
//!
//! Converges a Calculator's derived Secret and status:
//! - Missing Calculator: delete the Secret with the same key
//! - Present Calculator: create or patch the Secret only when it drifted
//! - Persist status only when it changed
//! - Pick the requeue directive from the configured interval
//!
//! Nothing here retries. Errors go back to the controller, which owns
//! backoff. Per-key serialisation is also the controller's job.

use std::future::Future;

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

use crate::adapters::secret::{desired_secret, merge_into, needs_update};
use crate::adapters::{ClusterApi, ObjectKey};
use crate::crd::{Calculator, CalculatorSpec, CalculatorStatus, Condition};
use crate::error::{Error, Result};
use crate::metrics;
use crate::reconcilers::requeue::{IntervalSource, RequeueDirective};

/// Condition type reported on Calculator status
pub const READY_CONDITION: &str = "Ready";

/// What a pass did to the derived Secret
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SecretChange {
    Created,
    Updated,
    Unchanged,
}

impl SecretChange {
    fn as_str(self) -> &'static str {
        match self {
            SecretChange::Created => "create",
            SecretChange::Updated => "update",
            SecretChange::Unchanged => "unchanged",
        }
    }
}

/// The derived value for a spec, `None` on overflow
pub fn compute_result(spec: &CalculatorSpec) -> Option<i64> {
    spec.x.checked_add(spec.y)
}

/// Status a Calculator should report after computing `result`.
///
/// The Ready condition keeps its transition time while it stays True.
pub fn desired_status(calc: &Calculator, result: i64, now: DateTime<Utc>) -> CalculatorStatus {
    let previous = calc
        .status
        .as_ref()
        .and_then(|s| s.condition(READY_CONDITION))
        .filter(|c| c.status == "True");

    let ready = Condition {
        type_: READY_CONDITION.to_string(),
        status: "True".to_string(),
        last_transition_time: previous.map_or(now, |c| c.last_transition_time),
        reason: Some("Reconciled".to_string()),
        message: Some(format!("Result {} stored in Secret", result)),
    };

    CalculatorStatus {
        result,
        processed: true,
        observed_generation: calc.metadata.generation,
        conditions: vec![ready],
    }
}

/// Run an API call, aborting it if `cancel` fires first
async fn guarded<T>(cancel: &CancellationToken, call: impl Future<Output = Result<T>>) -> Result<T> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(Error::Cancelled),
        res = call => res,
    }
}

/// Reconciles Calculators against a cluster
pub struct Reconciler<C, I> {
    cluster: C,
    interval: I,
}

impl<C, I> Reconciler<C, I>
where
    C: ClusterApi,
    I: IntervalSource,
{
    pub fn new(cluster: C, interval: I) -> Self {
        Self { cluster, interval }
    }

    pub fn cluster(&self) -> &C {
        &self.cluster
    }

    /// Converge the objects for `key` and decide when to look at it again
    #[instrument(skip(self, cancel), fields(key = %key))]
    pub async fn reconcile(
        &self,
        key: &ObjectKey,
        cancel: &CancellationToken,
    ) -> Result<RequeueDirective> {
        let calc = match guarded(cancel, self.cluster.get_calculator(key)).await? {
            Some(calc) if calc.metadata.deletion_timestamp.is_none() => calc,
            _ => {
                info!("Calculator not found, removing derived Secret");
                self.cleanup(key, cancel).await?;
                return Ok(RequeueDirective::Stop);
            }
        };

        let result = compute_result(&calc.spec).ok_or_else(|| Error::Overflow(key.to_string()))?;

        let change = self.converge_secret(&calc, key, result, cancel).await?;
        let status_written = self.persist_status(&calc, key, result, cancel).await?;

        let directive = self.interval.directive();
        info!(
            result = result,
            secret = change.as_str(),
            status_written = status_written,
            directive = ?directive,
            "Reconciled Calculator"
        );
        Ok(directive)
    }

    /// Delete the derived Secret for `key`; an absent Secret counts as done.
    ///
    /// Returns whether a Secret was deleted.
    #[instrument(skip(self, cancel), fields(key = %key))]
    pub async fn cleanup(&self, key: &ObjectKey, cancel: &CancellationToken) -> Result<bool> {
        let deleted = guarded(cancel, self.cluster.delete_secret(key)).await?;
        if deleted {
            info!("Removed derived Secret");
            metrics::DERIVED_WRITES.with_label_values(&["delete"]).inc();
        } else {
            debug!("Derived Secret already absent");
        }
        Ok(deleted)
    }

    async fn converge_secret(
        &self,
        calc: &Calculator,
        key: &ObjectKey,
        result: i64,
        cancel: &CancellationToken,
    ) -> Result<SecretChange> {
        let desired = desired_secret(calc, key, result);

        let change = match guarded(cancel, self.cluster.get_secret(key)).await? {
            None => {
                guarded(cancel, self.cluster.create_secret(&desired)).await?;
                SecretChange::Created
            }
            Some(existing) if needs_update(&existing, &desired) => {
                let merged = merge_into(&existing, &desired);
                guarded(cancel, self.cluster.replace_secret(key, &merged)).await?;
                SecretChange::Updated
            }
            Some(_) => SecretChange::Unchanged,
        };

        if change != SecretChange::Unchanged {
            metrics::DERIVED_WRITES
                .with_label_values(&[change.as_str()])
                .inc();
        }
        Ok(change)
    }

    async fn persist_status(
        &self,
        calc: &Calculator,
        key: &ObjectKey,
        result: i64,
        cancel: &CancellationToken,
    ) -> Result<bool> {
        let desired = desired_status(calc, result, Utc::now());
        if calc.status.as_ref() == Some(&desired) {
            return Ok(false);
        }
        guarded(cancel, self.cluster.patch_calculator_status(key, &desired)).await?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn calculator(x: i64, y: i64) -> Calculator {
        let mut calc = Calculator::new("test", CalculatorSpec { x, y });
        calc.metadata.namespace = Some("default".to_string());
        calc.metadata.generation = Some(2);
        calc
    }

    #[test]
    fn result_is_sum_of_operands() {
        assert_eq!(compute_result(&CalculatorSpec { x: 5, y: 7 }), Some(12));
        assert_eq!(compute_result(&CalculatorSpec { x: -5, y: 2 }), Some(-3));
    }

    #[test]
    fn overflow_has_no_result() {
        assert_eq!(compute_result(&CalculatorSpec { x: i64::MAX, y: 1 }), None);
    }

    #[test]
    fn desired_status_marks_processed() {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let status = desired_status(&calculator(5, 7), 12, now);

        assert_eq!(status.result, 12);
        assert!(status.processed);
        assert_eq!(status.observed_generation, Some(2));
        let ready = status.condition(READY_CONDITION).unwrap();
        assert_eq!(ready.status, "True");
        assert_eq!(ready.last_transition_time, now);
    }

    #[test]
    fn ready_transition_time_is_kept() {
        let first = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let later = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();

        let mut calc = calculator(5, 7);
        calc.status = Some(desired_status(&calc, 12, first));

        let status = desired_status(&calc, 12, later);
        assert_eq!(status.condition(READY_CONDITION).unwrap().last_transition_time, first);
        assert_eq!(calc.status.as_ref(), Some(&status));
    }

    #[tokio::test]
    async fn guarded_call_aborts_when_cancelled() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let res: Result<()> = guarded(&cancel, std::future::pending()).await;
        assert!(matches!(res, Err(Error::Cancelled)));
    }
}
