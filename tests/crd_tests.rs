//! Tests for the generated Calculator CRD

use calc_operator::crd::{generate_crds, Calculator};
use kube::CustomResourceExt;

#[test]
fn crd_identity() {
    let crd = Calculator::crd();
    assert_eq!(crd.metadata.name.as_deref(), Some("calculators.apps.example.com"));
    assert_eq!(crd.spec.group, "apps.example.com");
    assert_eq!(crd.spec.scope, "Namespaced");
    assert_eq!(crd.spec.names.kind, "Calculator");
    assert_eq!(crd.spec.versions.len(), 1);
    assert_eq!(crd.spec.versions[0].name, "v1");
}

#[test]
fn crd_has_status_subresource() {
    let crd = Calculator::crd();
    let subresources = crd.spec.versions[0].subresources.as_ref().unwrap();
    assert!(subresources.status.is_some());
}

#[test]
fn generated_yaml_describes_operands() {
    let manifests = generate_crds().unwrap();
    assert_eq!(manifests.len(), 1);
    let yaml = &manifests[0];
    assert!(yaml.contains("kind: CustomResourceDefinition"));
    assert!(yaml.contains("calculators.apps.example.com"));
    assert!(yaml.contains("processed"));
}
