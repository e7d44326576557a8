//! The `Resource` entity (§3 DATA MODEL) — an opaque structured document
//! with GVK, name, optional namespace/generateName, owner references,
//! labels, annotations and a nested content tree.
//!
//! Modeled on the teacher's `DynamicObject`-based resources in
//! `sherpack-kube::resources`, but kept serde_json-native here so the core
//! crate stays free of a `kube` dependency (mirrors `sherpack-core` staying
//! free of `kube` while `sherpack-kube` builds typed clients on top of it).

use crate::error::{CoreError, Result};
use crate::gvk::Gvk;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;

/// The label the renderer sets on every composed resource, identifying its
/// owning XR.
pub const LABEL_COMPOSITE: &str = "crossplane.io/composite";

/// The annotation the renderer sets on every composed resource, identifying
/// which pipeline step / template entry produced it.
pub const ANNOTATION_COMPOSITION_RESOURCE_NAME: &str = "crossplane.io/composition-resource-name";

/// A Kubernetes owner reference, used to build `OwnershipRelation` trees.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnerReference {
    pub api_version: String,
    pub kind: String,
    pub name: String,
    #[serde(default)]
    pub uid: String,
    #[serde(default)]
    pub controller: Option<bool>,
    #[serde(default)]
    pub block_owner_deletion: Option<bool>,
}

/// The identity a `Resource` is matched and deduplicated by.
///
/// Equality is by (GVK, namespace, name), or (GVK, namespace,
/// generateName-prefix) when name is absent — the second form never
/// compares equal to anything since the server hasn't assigned a name yet;
/// it exists purely to carry the prefix through to display.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ResourceIdentity {
    Named {
        gvk: Gvk,
        namespace: Option<String>,
        name: String,
    },
    Generated {
        gvk: Gvk,
        namespace: Option<String>,
        generate_name: String,
    },
}

impl ResourceIdentity {
    pub fn gvk(&self) -> &Gvk {
        match self {
            ResourceIdentity::Named { gvk, .. } => gvk,
            ResourceIdentity::Generated { gvk, .. } => gvk,
        }
    }

    pub fn namespace(&self) -> Option<&str> {
        match self {
            ResourceIdentity::Named { namespace, .. } => namespace.as_deref(),
            ResourceIdentity::Generated { namespace, .. } => namespace.as_deref(),
        }
    }

    /// A human-readable display name, using the `<generateName>(generated)`
    /// placeholder from §4.5 rule 2 when no server name has been assigned.
    pub fn display_name(&self) -> String {
        match self {
            ResourceIdentity::Named { name, .. } => name.clone(),
            ResourceIdentity::Generated { generate_name, .. } => {
                format!("{generate_name}(generated)")
            }
        }
    }
}

/// An opaque Kubernetes resource document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Resource {
    value: JsonValue,
}

impl Resource {
    pub fn from_value(value: JsonValue) -> Result<Self> {
        if value.get("apiVersion").and_then(JsonValue::as_str).is_none() {
            return Err(CoreError::MissingField {
                field: "apiVersion".to_string(),
            });
        }
        if value.get("kind").and_then(JsonValue::as_str).is_none() {
            return Err(CoreError::MissingField {
                field: "kind".to_string(),
            });
        }
        Ok(Self { value })
    }

    pub fn from_yaml(doc: &str) -> Result<Self> {
        let value: JsonValue = serde_yaml::from_str(doc)?;
        Self::from_value(value)
    }

    /// Parse every non-empty document out of a `---`-separated manifest.
    pub fn parse_manifest(manifest: &str) -> Result<Vec<Self>> {
        let mut resources = Vec::new();
        for doc in manifest.split("\n---") {
            let doc = doc.trim();
            if doc.is_empty() || doc.lines().all(|l| l.trim().is_empty() || l.trim().starts_with('#')) {
                continue;
            }
            resources.push(Self::from_yaml(doc)?);
        }
        Ok(resources)
    }

    pub fn api_version(&self) -> &str {
        self.value
            .get("apiVersion")
            .and_then(JsonValue::as_str)
            .unwrap_or("v1")
    }

    pub fn kind(&self) -> &str {
        self.value
            .get("kind")
            .and_then(JsonValue::as_str)
            .unwrap_or("Unknown")
    }

    pub fn gvk(&self) -> Gvk {
        Gvk::from_api_version_kind(self.api_version(), self.kind())
    }

    pub fn name(&self) -> Option<&str> {
        self.value
            .get("metadata")
            .and_then(|m| m.get("name"))
            .and_then(JsonValue::as_str)
    }

    pub fn generate_name(&self) -> Option<&str> {
        self.value
            .get("metadata")
            .and_then(|m| m.get("generateName"))
            .and_then(JsonValue::as_str)
    }

    pub fn namespace(&self) -> Option<&str> {
        self.value
            .get("metadata")
            .and_then(|m| m.get("namespace"))
            .and_then(JsonValue::as_str)
    }

    pub fn set_namespace(&mut self, namespace: &str) {
        if let Some(metadata) = self.value.get_mut("metadata").and_then(|m| m.as_object_mut()) {
            metadata.insert("namespace".to_string(), JsonValue::String(namespace.to_string()));
        }
    }

    pub fn labels(&self) -> BTreeMap<String, String> {
        string_map(self.value.get("metadata").and_then(|m| m.get("labels")))
    }

    pub fn annotations(&self) -> BTreeMap<String, String> {
        string_map(self.value.get("metadata").and_then(|m| m.get("annotations")))
    }

    pub fn label(&self, key: &str) -> Option<String> {
        self.labels().get(key).cloned()
    }

    pub fn annotation(&self, key: &str) -> Option<String> {
        self.annotations().get(key).cloned()
    }

    pub fn set_label(&mut self, key: &str, value: &str) {
        set_map_entry(&mut self.value, "labels", key, value);
    }

    pub fn set_annotation(&mut self, key: &str, value: &str) {
        set_map_entry(&mut self.value, "annotations", key, value);
    }

    pub fn owner_references(&self) -> Vec<OwnerReference> {
        self.value
            .get("metadata")
            .and_then(|m| m.get("ownerReferences"))
            .and_then(JsonValue::as_array)
            .map(|refs| {
                refs.iter()
                    .filter_map(|r| serde_json::from_value(r.clone()).ok())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// The identity this resource is matched and sorted by.
    pub fn identity(&self) -> ResourceIdentity {
        let gvk = self.gvk();
        let namespace = self.namespace().map(str::to_string);
        match self.name() {
            Some(name) => ResourceIdentity::Named {
                gvk,
                namespace,
                name: name.to_string(),
            },
            None => ResourceIdentity::Generated {
                gvk,
                namespace,
                generate_name: self.generate_name().unwrap_or_default().to_string(),
            },
        }
    }

    pub fn is_composite(&self, owner_name: &str) -> bool {
        self.label(LABEL_COMPOSITE).as_deref() == Some(owner_name)
    }

    pub fn composition_resource_name(&self) -> Option<String> {
        self.annotation(ANNOTATION_COMPOSITION_RESOURCE_NAME)
    }

    pub fn as_value(&self) -> &JsonValue {
        &self.value
    }

    pub fn as_value_mut(&mut self) -> &mut JsonValue {
        &mut self.value
    }

    pub fn into_value(self) -> JsonValue {
        self.value
    }

    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(&self.value)?)
    }
}

fn string_map(value: Option<&JsonValue>) -> BTreeMap<String, String> {
    value
        .and_then(JsonValue::as_object)
        .map(|obj| {
            obj.iter()
                .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
                .collect()
        })
        .unwrap_or_default()
}

fn set_map_entry(value: &mut JsonValue, map_field: &str, key: &str, entry: &str) {
    let metadata = value
        .as_object_mut()
        .expect("resource value is always an object")
        .entry("metadata")
        .or_insert_with(|| JsonValue::Object(Default::default()));
    let map = metadata
        .as_object_mut()
        .expect("metadata is always an object")
        .entry(map_field)
        .or_insert_with(|| JsonValue::Object(Default::default()));
    map.as_object_mut()
        .expect("labels/annotations are always objects")
        .insert(key.to_string(), JsonValue::String(entry.to_string()));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn configmap(name: &str) -> Resource {
        Resource::from_yaml(&format!(
            "apiVersion: v1\nkind: ConfigMap\nmetadata:\n  name: {name}\n  namespace: default\n"
        ))
        .unwrap()
    }

    #[test]
    fn rejects_missing_kind() {
        let err = Resource::from_yaml("apiVersion: v1\nmetadata:\n  name: x\n").unwrap_err();
        assert!(matches!(err, CoreError::MissingField { .. }));
    }

    #[test]
    fn identity_named() {
        let r = configmap("my-config");
        let id = r.identity();
        assert_eq!(id.display_name(), "my-config");
        assert_eq!(id.namespace(), Some("default"));
    }

    #[test]
    fn identity_generated_uses_placeholder() {
        let r = Resource::from_yaml(
            "apiVersion: v1\nkind: ConfigMap\nmetadata:\n  generateName: my-config-\n  namespace: default\n",
        )
        .unwrap();
        assert_eq!(r.identity().display_name(), "my-config-(generated)");
    }

    #[test]
    fn set_label_and_annotation_roundtrip() {
        let mut r = configmap("cm");
        r.set_label(LABEL_COMPOSITE, "owner-xr");
        r.set_annotation(ANNOTATION_COMPOSITION_RESOURCE_NAME, "cfg");
        assert!(r.is_composite("owner-xr"));
        assert_eq!(
            r.composition_resource_name().as_deref(),
            Some("cfg")
        );
    }

    #[test]
    fn parse_manifest_splits_documents() {
        let manifest = "apiVersion: v1\nkind: ConfigMap\nmetadata:\n  name: a\n---\napiVersion: v1\nkind: ConfigMap\nmetadata:\n  name: b\n";
        let resources = Resource::parse_manifest(manifest).unwrap();
        assert_eq!(resources.len(), 2);
    }

    #[test]
    fn set_namespace_propagates() {
        let mut r = Resource::from_yaml("apiVersion: v1\nkind: ConfigMap\nmetadata:\n  name: cm\n").unwrap();
        assert_eq!(r.namespace(), None);
        r.set_namespace("team-a");
        assert_eq!(r.namespace(), Some("team-a"));
    }
}
