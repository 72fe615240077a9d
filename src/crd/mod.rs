//! Custom Resource Definitions for the Calculator Operator

mod calculator;

pub use calculator::*;

use kube::CustomResourceExt;

use crate::error::Result;

/// Generate all CRD YAML manifests
pub fn generate_crds() -> Result<Vec<String>> {
    Ok(vec![serde_yaml::to_string(&Calculator::crd())?])
}
