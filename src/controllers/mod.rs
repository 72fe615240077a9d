//! Kubernetes controller for the Calculator CRD
//!
//! This module contains the controller that watches for Calculator changes
//! and triggers reconciliation.

mod backoff;
mod calculator_controller;

pub use backoff::{RequeueBackoff, DEFAULT_BASE_DELAY, DEFAULT_MAX_DELAY};
pub use calculator_controller::{run as run_calculator_controller, FINALIZER_NAME};

use kube::Client;
use tokio_util::sync::CancellationToken;

use crate::adapters::KubeCluster;
use crate::config::OperatorConfig;
use crate::reconcilers::{EnvInterval, Reconciler};

/// Shared context for the controller
pub struct Context {
    /// Kubernetes client
    pub client: Client,

    /// Convergence logic
    pub reconciler: Reconciler<KubeCluster, EnvInterval>,

    /// Requeue backoff per key
    pub backoff: RequeueBackoff,

    /// Cancelled on shutdown; aborts in-flight API calls
    pub shutdown: CancellationToken,

    /// Maximum concurrent reconciliations (0 = unbounded)
    pub concurrency: u16,
}

impl Context {
    /// Create a new context
    pub fn new(client: Client, config: &OperatorConfig, shutdown: CancellationToken) -> Self {
        Self {
            reconciler: Reconciler::new(KubeCluster::new(client.clone()), config.interval_source()),
            client,
            backoff: RequeueBackoff::default(),
            shutdown,
            concurrency: config.concurrency,
        }
    }
}
