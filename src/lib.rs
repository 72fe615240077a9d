//! Calculator Kubernetes Operator
//!
//! This operator reconciles `Calculator` custom resources into Secrets
//! holding their computed result, and removes those Secrets again when the
//! Calculator is deleted.

pub mod adapters;
pub mod config;
pub mod controllers;
pub mod crd;
pub mod error;
pub mod metrics;
pub mod reconcilers;

pub use error::{Error, Result};
