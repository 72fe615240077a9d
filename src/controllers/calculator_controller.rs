//! Calculator controller
//!
//! Watches Calculators and the Secrets they own, and hands each key to the
//! reconciler. kube-runtime guarantees at most one in-flight pass per key.

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use k8s_openapi::api::core::v1::Secret;
use kube::{
    api::ListParams,
    runtime::{
        controller::{Action, Config as ControllerConfig, Controller},
        finalizer::{finalizer, Event as FinalizerEvent},
        watcher::Config as WatcherConfig,
    },
    Api, Client, ResourceExt,
};
use tracing::{error, info, instrument, warn};

use crate::adapters::ObjectKey;
use crate::controllers::Context;
use crate::crd::Calculator;
use crate::error::{Error, Result};
use crate::metrics;

/// Finalizer name for Calculator resources
pub const FINALIZER_NAME: &str = "apps.example.com/calculator-finalizer";

const KIND: &str = "Calculator";

/// Run the Calculator controller
pub async fn run(client: Client, context: Arc<Context>) {
    let api: Api<Calculator> = Api::all(client.clone());

    // Verify CRD is installed
    if let Err(e) = api.list(&ListParams::default().limit(1)).await {
        error!("Calculator CRD not installed: {}", e);
        return;
    }

    info!("Starting Calculator controller");

    let secrets: Api<Secret> = Api::all(client);
    let config = ControllerConfig::default().concurrency(context.concurrency);

    Controller::new(api, WatcherConfig::default())
        .owns(secrets, WatcherConfig::default())
        .with_config(config)
        .shutdown_on_signal()
        .run(reconcile, error_policy, context)
        .for_each(|result| async move {
            match result {
                Ok((obj, _action)) => {
                    info!(
                        name = %obj.name,
                        namespace = obj.namespace.as_deref().unwrap_or("default"),
                        "Reconciled Calculator"
                    );
                }
                Err(e) => {
                    warn!(error = %e, "Reconciliation error");
                    metrics::RECONCILIATION_ERRORS.with_label_values(&[KIND]).inc();
                }
            }
        })
        .await;
}

/// Main reconciliation function
#[instrument(skip(ctx), fields(name = %obj.name_any(), namespace = obj.namespace()))]
async fn reconcile(obj: Arc<Calculator>, ctx: Arc<Context>) -> Result<Action> {
    let _timer = metrics::RECONCILE_DURATION
        .with_label_values(&[KIND])
        .start_timer();
    metrics::RECONCILIATIONS.with_label_values(&[KIND]).inc();

    let namespace = obj.namespace().unwrap_or_else(|| "default".to_string());
    let api: Api<Calculator> = Api::namespaced(ctx.client.clone(), &namespace);

    finalizer(&api, FINALIZER_NAME, obj, |event| async {
        match event {
            FinalizerEvent::Apply(calc) => apply(calc, ctx.clone()).await,
            FinalizerEvent::Cleanup(calc) => cleanup(calc, ctx.clone()).await,
        }
    })
    .await
    .map_err(|e| Error::Finalizer(Box::new(e)))
}

/// Converge the derived Secret and status
async fn apply(calc: Arc<Calculator>, ctx: Arc<Context>) -> Result<Action> {
    let key = ObjectKey::of(calc.as_ref())?;
    let directive = ctx.reconciler.reconcile(&key, &ctx.shutdown).await?;
    Ok(ctx.backoff.action_for(&key, directive))
}

/// Remove the derived Secret before the Calculator goes away
async fn cleanup(calc: Arc<Calculator>, ctx: Arc<Context>) -> Result<Action> {
    let key = ObjectKey::of(calc.as_ref())?;
    info!(key = %key, "Cleaning up Calculator");

    ctx.reconciler.cleanup(&key, &ctx.shutdown).await?;
    ctx.backoff.forget(&key);
    metrics::CLEANUPS.with_label_values(&[KIND]).inc();

    Ok(Action::await_change())
}

/// Error policy for the controller
fn error_policy(obj: Arc<Calculator>, error: &Error, ctx: Arc<Context>) -> Action {
    let delay = match ObjectKey::of(obj.as_ref()) {
        Ok(key) => ctx.backoff.next(&key),
        Err(_) => Duration::from_secs(30),
    };
    error!(
        name = %obj.name_any(),
        error = %error,
        retry_in = ?delay,
        "Reconciliation failed, scheduling retry"
    );

    Action::requeue(delay)
}
