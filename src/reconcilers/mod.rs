//! Reconcilers for the Calculator CRD
//!
//! This module contains the business logic for converging Calculators:
//! - Computing the derived result
//! - Creating, patching and deleting the derived Secret
//! - Updating resource status
//! - Choosing when to reconcile again

pub mod calculator;
pub mod requeue;

pub use calculator::Reconciler;
pub use requeue::{EnvInterval, FixedInterval, IntervalSource, RequeueDirective};
