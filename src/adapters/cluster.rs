//! Cluster API seam used by the reconciler
//!
//! The reconciler only talks to the cluster through [`ClusterApi`], so the
//! same convergence logic runs against the real API server and against the
//! in-memory cluster used in tests.

use std::fmt;

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Secret;
use kube::{Resource, ResourceExt};

use crate::crd::{Calculator, CalculatorStatus};
use crate::error::{Error, Result};

/// Namespaced object identity shared by a Calculator and its Secret
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ObjectKey {
    pub namespace: String,
    pub name: String,
}

impl ObjectKey {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    /// Key of a namespaced object; errors if the object has no namespace
    pub fn of<K: Resource>(obj: &K) -> Result<Self> {
        let namespace = obj
            .namespace()
            .ok_or_else(|| Error::invalid_object(format!("{} has no namespace", obj.name_any())))?;
        Ok(Self::new(namespace, obj.name_any()))
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// Read/write access to the two object kinds the operator touches
///
/// "Not found" is never an error: reads return `None` and deletes return
/// `false`.
#[async_trait]
pub trait ClusterApi: Send + Sync {
    /// Get a Calculator by key
    async fn get_calculator(&self, key: &ObjectKey) -> Result<Option<Calculator>>;

    /// Replace the status subresource of a Calculator
    async fn patch_calculator_status(&self, key: &ObjectKey, status: &CalculatorStatus)
        -> Result<()>;

    /// Get a Secret by key
    async fn get_secret(&self, key: &ObjectKey) -> Result<Option<Secret>>;

    /// Create a Secret; fails with [`Error::AlreadyExists`] if the key is taken
    async fn create_secret(&self, secret: &Secret) -> Result<Secret>;

    /// Replace an existing Secret
    async fn replace_secret(&self, key: &ObjectKey, secret: &Secret) -> Result<Secret>;

    /// Delete a Secret, returning whether anything was deleted
    async fn delete_secret(&self, key: &ObjectKey) -> Result<bool>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crd::CalculatorSpec;

    #[test]
    fn key_of_namespaced_object() {
        let mut calc = Calculator::new("test", CalculatorSpec { x: 1, y: 2 });
        calc.metadata.namespace = Some("default".to_string());

        let key = ObjectKey::of(&calc).unwrap();
        assert_eq!(key, ObjectKey::new("default", "test"));
        assert_eq!(key.to_string(), "default/test");
    }

    #[test]
    fn key_requires_namespace() {
        let calc = Calculator::new("test", CalculatorSpec { x: 1, y: 2 });
        assert!(matches!(ObjectKey::of(&calc), Err(Error::InvalidObject(_))));
    }
}
