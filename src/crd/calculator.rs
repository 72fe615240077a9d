//! Calculator Custom Resource Definition

use chrono::{DateTime, Utc};
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Calculator resource specification
///
/// The operands are owned by whoever creates the resource; the operator only
/// ever reads them.
#[derive(CustomResource, Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "apps.example.com",
    version = "v1",
    kind = "Calculator",
    plural = "calculators",
    singular = "calculator",
    shortname = "calc",
    namespaced,
    status = "CalculatorStatus",
    printcolumn = r#"{"name": "X", "type": "integer", "jsonPath": ".spec.x"}"#,
    printcolumn = r#"{"name": "Y", "type": "integer", "jsonPath": ".spec.y"}"#,
    printcolumn = r#"{"name": "Result", "type": "integer", "jsonPath": ".status.result"}"#,
    printcolumn = r#"{"name": "Processed", "type": "boolean", "jsonPath": ".status.processed"}"#,
    printcolumn = r#"{"name": "Age", "type": "date", "jsonPath": ".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct CalculatorSpec {
    /// First operand
    pub x: i64,

    /// Second operand
    pub y: i64,
}

/// Calculator status, written only by the operator
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CalculatorStatus {
    /// Result of the last successful reconciliation
    #[serde(default)]
    pub result: i64,

    /// Whether `result` reflects a completed reconciliation
    #[serde(default)]
    pub processed: bool,

    /// Generation of the spec the result was computed from
    #[serde(skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,

    /// Status conditions
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,
}

impl CalculatorStatus {
    /// Look up a condition by type
    pub fn condition(&self, type_: &str) -> Option<&Condition> {
        self.conditions.iter().find(|c| c.type_ == type_)
    }
}

/// Status condition
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    /// Condition type
    #[serde(rename = "type")]
    pub type_: String,

    /// Status (True, False, Unknown)
    pub status: String,

    /// Last transition time
    pub last_transition_time: DateTime<Utc>,

    /// Reason for the condition
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,

    /// Human-readable message
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn spec_deserializes_from_manifest_fields() {
        let spec: CalculatorSpec = serde_json::from_value(json!({"x": 5, "y": -7})).unwrap();
        assert_eq!(spec, CalculatorSpec { x: 5, y: -7 });
    }

    #[test]
    fn status_uses_camel_case_and_omits_empty_fields() {
        let status = CalculatorStatus {
            result: 12,
            processed: true,
            observed_generation: Some(3),
            conditions: vec![],
        };
        let value = serde_json::to_value(&status).unwrap();
        assert_eq!(
            value,
            json!({"result": 12, "processed": true, "observedGeneration": 3})
        );
    }

    #[test]
    fn condition_type_serializes_as_type() {
        let condition = Condition {
            type_: "Ready".to_string(),
            status: "True".to_string(),
            last_transition_time: Utc::now(),
            reason: None,
            message: None,
        };
        let value = serde_json::to_value(&condition).unwrap();
        assert_eq!(value["type"], "Ready");
        assert!(value.get("lastTransitionTime").is_some());
    }
}
