//! In-memory [`ClusterApi`]
//!
//! Behaves like a single-replica API server for the two object kinds: it
//! assigns resource versions, rejects stale replaces and conflicting
//! creates, and can be told to fail specific calls. Every write is recorded
//! so callers can assert on what a pass actually changed.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Secret;
use kube::core::ErrorResponse;
use kube::ResourceExt;

use crate::adapters::{ClusterApi, ObjectKey};
use crate::crd::{Calculator, CalculatorStatus};
use crate::error::{Error, Result};

/// API calls that can be observed or made to fail
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Op {
    GetCalculator,
    PatchStatus,
    GetSecret,
    CreateSecret,
    ReplaceSecret,
    DeleteSecret,
}

impl Op {
    pub fn is_write(self) -> bool {
        matches!(
            self,
            Op::PatchStatus | Op::CreateSecret | Op::ReplaceSecret | Op::DeleteSecret
        )
    }
}

#[derive(Default)]
struct State {
    calculators: BTreeMap<ObjectKey, Calculator>,
    secrets: BTreeMap<ObjectKey, Secret>,
    failures: HashMap<Op, u32>,
    calls: Vec<Op>,
    next_version: u64,
}

impl State {
    fn bump_version(&mut self) -> String {
        self.next_version += 1;
        self.next_version.to_string()
    }

    fn record(&mut self, op: Op) -> Result<()> {
        self.calls.push(op);
        match self.failures.get_mut(&op) {
            Some(remaining) if *remaining > 0 => {
                *remaining -= 1;
                Err(api_error(500, "InternalError", format!("injected failure for {op:?}")))
            }
            _ => Ok(()),
        }
    }
}

fn api_error(code: u16, reason: &str, message: String) -> Error {
    Error::Kube(kube::Error::Api(ErrorResponse {
        status: "Failure".to_string(),
        message,
        reason: reason.to_string(),
        code,
    }))
}

/// The API server rejects objects with more than one controller reference
fn check_single_controller(key: &ObjectKey, secret: &Secret) -> Result<()> {
    let controllers = secret
        .metadata
        .owner_references
        .iter()
        .flatten()
        .filter(|o| o.controller == Some(true))
        .count();
    if controllers > 1 {
        return Err(api_error(
            422,
            "Invalid",
            format!("secrets {key}: Only one reference can have Controller set to true"),
        ));
    }
    Ok(())
}

/// In-memory cluster
#[derive(Default)]
pub struct InMemoryCluster {
    state: Mutex<State>,
}

impl InMemoryCluster {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Store a Calculator as-is, assigning a resource version
    pub fn insert_calculator(&self, mut calc: Calculator) -> Result<ObjectKey> {
        let key = ObjectKey::of(&calc)?;
        let mut state = self.state();
        calc.metadata.resource_version = Some(state.bump_version());
        state.calculators.insert(key.clone(), calc);
        Ok(key)
    }

    /// Remove a Calculator, as a user deleting it would
    pub fn remove_calculator(&self, key: &ObjectKey) -> Option<Calculator> {
        self.state().calculators.remove(key)
    }

    /// Store a Secret as-is, assigning a resource version
    pub fn insert_secret(&self, mut secret: Secret) -> Result<ObjectKey> {
        let key = ObjectKey::of(&secret)?;
        let mut state = self.state();
        secret.metadata.resource_version = Some(state.bump_version());
        state.secrets.insert(key.clone(), secret);
        Ok(key)
    }

    /// Remove a Secret behind the operator's back
    pub fn remove_secret(&self, key: &ObjectKey) -> Option<Secret> {
        self.state().secrets.remove(key)
    }

    pub fn calculator(&self, key: &ObjectKey) -> Option<Calculator> {
        self.state().calculators.get(key).cloned()
    }

    pub fn secret(&self, key: &ObjectKey) -> Option<Secret> {
        self.state().secrets.get(key).cloned()
    }

    /// Fail the next `times` calls of `op` with a 500 response
    pub fn fail_next(&self, op: Op, times: u32) {
        self.state().failures.insert(op, times);
    }

    /// All calls made so far, in order
    pub fn calls(&self) -> Vec<Op> {
        self.state().calls.clone()
    }

    /// Write calls made so far, in order
    pub fn writes(&self) -> Vec<Op> {
        self.state().calls.iter().copied().filter(|op| op.is_write()).collect()
    }

    pub fn clear_calls(&self) {
        self.state().calls.clear();
    }
}

#[async_trait]
impl ClusterApi for InMemoryCluster {
    async fn get_calculator(&self, key: &ObjectKey) -> Result<Option<Calculator>> {
        let mut state = self.state();
        state.record(Op::GetCalculator)?;
        Ok(state.calculators.get(key).cloned())
    }

    async fn patch_calculator_status(
        &self,
        key: &ObjectKey,
        status: &CalculatorStatus,
    ) -> Result<()> {
        let mut state = self.state();
        state.record(Op::PatchStatus)?;
        let version = state.bump_version();
        let calc = state
            .calculators
            .get_mut(key)
            .ok_or_else(|| api_error(404, "NotFound", format!("calculators {key} not found")))?;
        calc.status = Some(status.clone());
        calc.metadata.resource_version = Some(version);
        Ok(())
    }

    async fn get_secret(&self, key: &ObjectKey) -> Result<Option<Secret>> {
        let mut state = self.state();
        state.record(Op::GetSecret)?;
        Ok(state.secrets.get(key).cloned())
    }

    async fn create_secret(&self, secret: &Secret) -> Result<Secret> {
        let key = ObjectKey::of(secret)?;
        let mut state = self.state();
        state.record(Op::CreateSecret)?;
        if state.secrets.contains_key(&key) {
            return Err(Error::AlreadyExists(key.to_string()));
        }
        check_single_controller(&key, secret)?;
        let mut stored = secret.clone();
        stored.metadata.resource_version = Some(state.bump_version());
        state.secrets.insert(key, stored.clone());
        Ok(stored)
    }

    async fn replace_secret(&self, key: &ObjectKey, secret: &Secret) -> Result<Secret> {
        let mut state = self.state();
        state.record(Op::ReplaceSecret)?;
        let current = state
            .secrets
            .get(key)
            .ok_or_else(|| api_error(404, "NotFound", format!("secrets {key} not found")))?;
        if let Some(expected) = secret.resource_version() {
            if current.resource_version().as_deref() != Some(expected.as_str()) {
                return Err(api_error(
                    409,
                    "Conflict",
                    format!("secrets {key}: the object has been modified"),
                ));
            }
        }
        check_single_controller(key, secret)?;
        let mut stored = secret.clone();
        stored.metadata.resource_version = Some(state.bump_version());
        state.secrets.insert(key.clone(), stored.clone());
        Ok(stored)
    }

    async fn delete_secret(&self, key: &ObjectKey) -> Result<bool> {
        let mut state = self.state();
        state.record(Op::DeleteSecret)?;
        Ok(state.secrets.remove(key).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, OwnerReference};

    fn controller_ref(uid: &str) -> OwnerReference {
        OwnerReference {
            api_version: "apps.example.com/v1".to_string(),
            kind: "Calculator".to_string(),
            name: "test".to_string(),
            uid: uid.to_string(),
            controller: Some(true),
            ..Default::default()
        }
    }

    fn secret_owned_by(uids: &[&str]) -> Secret {
        Secret {
            metadata: ObjectMeta {
                namespace: Some("default".to_string()),
                name: Some("test".to_string()),
                owner_references: Some(uids.iter().map(|uid| controller_ref(uid)).collect()),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn create_rejects_two_controllers() {
        let cluster = InMemoryCluster::new();
        let err = cluster
            .create_secret(&secret_owned_by(&["uid-a", "uid-b"]))
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Kube(kube::Error::Api(ref e)) if e.code == 422));
        assert!(cluster.secret(&ObjectKey::new("default", "test")).is_none());
    }

    #[tokio::test]
    async fn replace_rejects_two_controllers() {
        let cluster = InMemoryCluster::new();
        let key = cluster.insert_secret(secret_owned_by(&["uid-a"])).unwrap();
        let mut update = cluster.secret(&key).unwrap();
        update
            .metadata
            .owner_references
            .as_mut()
            .unwrap()
            .push(controller_ref("uid-b"));

        let err = cluster.replace_secret(&key, &update).await.unwrap_err();
        assert!(matches!(err, Error::Kube(kube::Error::Api(ref e)) if e.code == 422));
    }
}
