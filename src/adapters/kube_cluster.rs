//! [`ClusterApi`] backed by the Kubernetes API server

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Secret;
use kube::{
    api::{DeleteParams, Patch, PatchParams, PostParams},
    Api, Client, ResourceExt,
};
use serde_json::json;

use crate::adapters::{ClusterApi, ObjectKey};
use crate::crd::{Calculator, CalculatorStatus};
use crate::error::{Error, Result};

/// Kubernetes-backed cluster access
#[derive(Clone)]
pub struct KubeCluster {
    client: Client,
}

impl KubeCluster {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn calculators(&self, namespace: &str) -> Api<Calculator> {
        Api::namespaced(self.client.clone(), namespace)
    }

    fn secrets(&self, namespace: &str) -> Api<Secret> {
        Api::namespaced(self.client.clone(), namespace)
    }
}

fn is_status(err: &kube::Error, code: u16) -> bool {
    matches!(err, kube::Error::Api(api_err) if api_err.code == code)
}

/// A 409 on create means the Secret is already there
fn create_error(err: kube::Error, namespace: &str, name: &str) -> Error {
    if is_status(&err, 409) {
        Error::AlreadyExists(format!("{namespace}/{name}"))
    } else {
        Error::Kube(err)
    }
}

/// Whether a delete removed something. A 404 is not an error.
fn deleted<T>(res: std::result::Result<T, kube::Error>) -> Result<bool> {
    match res {
        Ok(_) => Ok(true),
        Err(e) if is_status(&e, 404) => Ok(false),
        Err(e) => Err(Error::Kube(e)),
    }
}

fn status_patch(status: &CalculatorStatus) -> Result<Patch<serde_json::Value>> {
    Ok(Patch::Merge(json!({ "status": serde_json::to_value(status)? })))
}

#[async_trait]
impl ClusterApi for KubeCluster {
    async fn get_calculator(&self, key: &ObjectKey) -> Result<Option<Calculator>> {
        Ok(self.calculators(&key.namespace).get_opt(&key.name).await?)
    }

    async fn patch_calculator_status(
        &self,
        key: &ObjectKey,
        status: &CalculatorStatus,
    ) -> Result<()> {
        let patch = status_patch(status)?;
        self.calculators(&key.namespace)
            .patch_status(&key.name, &PatchParams::default(), &patch)
            .await?;
        Ok(())
    }

    async fn get_secret(&self, key: &ObjectKey) -> Result<Option<Secret>> {
        Ok(self.secrets(&key.namespace).get_opt(&key.name).await?)
    }

    async fn create_secret(&self, secret: &Secret) -> Result<Secret> {
        let namespace = secret
            .namespace()
            .ok_or_else(|| Error::invalid_object(format!("Secret {} has no namespace", secret.name_any())))?;
        self.secrets(&namespace)
            .create(&PostParams::default(), secret)
            .await
            .map_err(|e| create_error(e, &namespace, &secret.name_any()))
    }

    async fn replace_secret(&self, key: &ObjectKey, secret: &Secret) -> Result<Secret> {
        Ok(self
            .secrets(&key.namespace)
            .replace(&key.name, &PostParams::default(), secret)
            .await?)
    }

    async fn delete_secret(&self, key: &ObjectKey) -> Result<bool> {
        deleted(
            self.secrets(&key.namespace)
                .delete(&key.name, &DeleteParams::default())
                .await,
        )
    }
}
