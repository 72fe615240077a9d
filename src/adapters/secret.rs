//! Derived Secret construction and drift detection

use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, OwnerReference};
use k8s_openapi::ByteString;
use kube::Resource;

use crate::adapters::ObjectKey;
use crate::crd::Calculator;

/// Provenance annotation key on derived Secrets
pub const MANAGED_BY_ANNOTATION: &str = "manage-by";

/// Provenance annotation value on derived Secrets
pub const MANAGED_BY_VALUE: &str = "calc-operator";

/// Data key holding the computed result
pub const RESULT_KEY: &str = "result";

/// Secret type of derived Secrets
pub const SECRET_TYPE_OPAQUE: &str = "Opaque";

/// Build the Secret a Calculator should converge to.
///
/// The Secret shares the Calculator's key. A controller owner reference is
/// attached when the Calculator carries a UID.
pub fn desired_secret(calc: &Calculator, key: &ObjectKey, result: i64) -> Secret {
    let annotations = BTreeMap::from([(
        MANAGED_BY_ANNOTATION.to_string(),
        MANAGED_BY_VALUE.to_string(),
    )]);
    let data = BTreeMap::from([(
        RESULT_KEY.to_string(),
        ByteString(result.to_string().into_bytes()),
    )]);

    Secret {
        metadata: ObjectMeta {
            namespace: Some(key.namespace.clone()),
            name: Some(key.name.clone()),
            annotations: Some(annotations),
            owner_references: calc.controller_owner_ref(&()).map(|owner| vec![owner]),
            ..Default::default()
        },
        data: Some(data),
        type_: Some(SECRET_TYPE_OPAQUE.to_string()),
        ..Default::default()
    }
}

/// Decoded `result` field of a Secret.
///
/// `stringData` is consulted as well since the API server only folds it
/// into `data` on write.
pub fn result_value(secret: &Secret) -> Option<String> {
    if let Some(value) = secret.string_data.as_ref().and_then(|d| d.get(RESULT_KEY)) {
        return Some(value.clone());
    }
    secret
        .data
        .as_ref()
        .and_then(|d| d.get(RESULT_KEY))
        .and_then(|bytes| String::from_utf8(bytes.0.clone()).ok())
}

/// Whether the Secret carries the provenance annotation
pub fn is_managed(secret: &Secret) -> bool {
    secret
        .metadata
        .annotations
        .as_ref()
        .and_then(|a| a.get(MANAGED_BY_ANNOTATION))
        .is_some_and(|v| v == MANAGED_BY_VALUE)
}

/// Whether `existing` differs from `desired` in any field the operator manages.
///
/// Unmanaged annotations, labels and data keys are left alone.
pub fn needs_update(existing: &Secret, desired: &Secret) -> bool {
    if !is_managed(existing) {
        return true;
    }
    if result_value(existing) != result_value(desired) {
        return true;
    }
    if existing.type_.as_deref().unwrap_or(SECRET_TYPE_OPAQUE)
        != desired.type_.as_deref().unwrap_or(SECRET_TYPE_OPAQUE)
    {
        return true;
    }
    !owner_refs_present(existing, desired)
}

fn owner_refs_present(existing: &Secret, desired: &Secret) -> bool {
    let have = existing.metadata.owner_references.as_deref().unwrap_or_default();
    desired
        .metadata
        .owner_references
        .as_deref()
        .unwrap_or_default()
        .iter()
        .all(|want| have.iter().any(|got| same_owner(got, want)))
}

fn same_owner(a: &OwnerReference, b: &OwnerReference) -> bool {
    a.uid == b.uid && a.kind == b.kind && a.controller == b.controller
}

/// Merge the managed fields of `desired` into `existing`.
///
/// Keeps `resourceVersion` so the replace is rejected if the Secret changed
/// underneath us.
pub fn merge_into(existing: &Secret, desired: &Secret) -> Secret {
    let mut merged = existing.clone();

    let annotations = merged.metadata.annotations.get_or_insert_with(BTreeMap::new);
    for (k, v) in desired.metadata.annotations.iter().flatten() {
        annotations.insert(k.clone(), v.clone());
    }

    // At most one owner reference may set `controller`.
    let owners = merged.metadata.owner_references.get_or_insert_with(Vec::new);
    let wanted_controllers: Vec<&str> = desired
        .metadata
        .owner_references
        .iter()
        .flatten()
        .filter(|o| o.controller == Some(true))
        .map(|o| o.uid.as_str())
        .collect();
    if !wanted_controllers.is_empty() {
        owners.retain(|got| {
            got.controller != Some(true) || wanted_controllers.contains(&got.uid.as_str())
        });
    }
    for want in desired.metadata.owner_references.iter().flatten() {
        if !owners.iter().any(|got| same_owner(got, want)) {
            owners.push(want.clone());
        }
    }
    if owners.is_empty() {
        merged.metadata.owner_references = None;
    }

    if let Some(string_data) = merged.string_data.as_mut() {
        string_data.remove(RESULT_KEY);
        if string_data.is_empty() {
            merged.string_data = None;
        }
    }
    let data = merged.data.get_or_insert_with(BTreeMap::new);
    for (k, v) in desired.data.iter().flatten() {
        data.insert(k.clone(), v.clone());
    }

    merged.type_ = desired.type_.clone();
    merged
}
