//! CompositeResourceDefinition (XRD) — declares an XR's (and optionally a
//! Claim's) schema, default composition, and spec defaults (§3, §4.1
//! Definition capability).

use crate::gvk::Gvk;
use crate::resource::Resource;
use serde_json::Value as JsonValue;

/// A CompositeResourceDefinition.
#[derive(Debug, Clone)]
pub struct Xrd {
    resource: Resource,
}

impl Xrd {
    pub fn new(resource: Resource) -> Self {
        Self { resource }
    }

    pub fn resource(&self) -> &Resource {
        &self.resource
    }

    pub fn name(&self) -> Option<&str> {
        self.resource.name()
    }

    fn spec(&self) -> Option<&JsonValue> {
        self.resource.as_value().get("spec")
    }

    pub fn group(&self) -> Option<&str> {
        self.spec()?.get("group")?.as_str()
    }

    /// The kind the XRD defines, e.g. `XDatabase`.
    pub fn composite_kind(&self) -> Option<&str> {
        self.spec()?.get("names")?.get("kind")?.as_str()
    }

    /// The Claim kind this XRD offers, if any (v1 XRDs only).
    pub fn claim_kind(&self) -> Option<&str> {
        self.spec()?.get("claimNames")?.get("kind")?.as_str()
    }

    /// The GVKs of the served versions of the XR this XRD defines.
    pub fn composite_gvks(&self) -> Vec<Gvk> {
        let (Some(group), Some(kind)) = (self.group(), self.composite_kind()) else {
            return Vec::new();
        };
        self.spec()
            .and_then(|s| s.get("versions"))
            .and_then(JsonValue::as_array)
            .map(|versions| {
                versions
                    .iter()
                    .filter(|v| v.get("served").and_then(JsonValue::as_bool).unwrap_or(true))
                    .filter_map(|v| v.get("name").and_then(JsonValue::as_str))
                    .map(|version| Gvk::new(group, version, kind))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// The default Composition name declared by this XRD, if any.
    ///
    /// Modern XRDs carry this at `spec.defaultCompositionRef.name`.
    pub fn default_composition_name(&self) -> Option<&str> {
        self.spec()?.get("defaultCompositionRef")?.get("name")?.as_str()
    }

    /// The OpenAPI v3 validation schema for a given served version, used to
    /// validate candidate XRs before rendering.
    pub fn schema_for_version<'a>(&'a self, version: &str) -> Option<&'a JsonValue> {
        crate::schema::schema_for_version(self.resource.as_value(), version)
    }

    /// Walk the OpenAPI schema's `default` keywords under `spec` and fill in
    /// any field the XR leaves absent. Declared defaults never override a
    /// value the XR already sets (§4.1: "Defaults apply only where the XR
    /// leaves a declared field absent").
    pub fn apply_defaults(&self, xr_spec: &mut JsonValue, version: &str) {
        let Some(schema) = self
            .schema_for_version(version)
            .and_then(|s| s.get("properties"))
            .and_then(|p| p.get("spec"))
        else {
            return;
        };
        apply_schema_defaults(schema, xr_spec);
    }
}

fn apply_schema_defaults(schema: &JsonValue, target: &mut JsonValue) {
    let Some(properties) = schema.get("properties").and_then(JsonValue::as_object) else {
        return;
    };
    if !target.is_object() {
        *target = JsonValue::Object(Default::default());
    }
    let target_obj = target.as_object_mut().expect("ensured above");
    for (field, field_schema) in properties {
        match target_obj.get_mut(field) {
            None => {
                if let Some(default) = field_schema.get("default") {
                    target_obj.insert(field.clone(), default.clone());
                } else if field_schema.get("properties").is_some() {
                    let mut nested = JsonValue::Object(Default::default());
                    apply_schema_defaults(field_schema, &mut nested);
                    if nested.as_object().is_some_and(|o| !o.is_empty()) {
                        target_obj.insert(field.clone(), nested);
                    }
                }
            }
            Some(existing) if field_schema.get("properties").is_some() => {
                apply_schema_defaults(field_schema, existing);
            }
            Some(_) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn xrd() -> Xrd {
        let doc = r#"
apiVersion: apiextensions.crossplane.io/v1
kind: CompositeResourceDefinition
metadata:
  name: xdatabases.example.org
spec:
  group: example.org
  names:
    kind: XDatabase
  claimNames:
    kind: Database
  defaultCompositionRef:
    name: xdatabases.example.org
  versions:
    - name: v1alpha1
      served: true
      schema:
        openAPIV3Schema:
          properties:
            spec:
              properties:
                size:
                  type: string
                  default: small
                storage:
                  properties:
                    engine:
                      type: string
                      default: postgres
"#;
        Xrd::new(Resource::from_yaml(doc).unwrap())
    }

    #[test]
    fn reads_names_and_default_composition() {
        let xrd = xrd();
        assert_eq!(xrd.composite_kind(), Some("XDatabase"));
        assert_eq!(xrd.claim_kind(), Some("Database"));
        assert_eq!(xrd.default_composition_name(), Some("xdatabases.example.org"));
    }

    #[test]
    fn composite_gvks_lists_served_versions() {
        let gvks = xrd().composite_gvks();
        assert_eq!(gvks.len(), 1);
        assert_eq!(gvks[0].to_string(), "example.org/v1alpha1/XDatabase");
    }

    #[test]
    fn apply_defaults_fills_absent_fields_only() {
        let xrd = xrd();
        let mut spec = json!({ "size": "large" });
        xrd.apply_defaults(&mut spec, "v1alpha1");
        assert_eq!(spec["size"], json!("large"));
        assert_eq!(spec["storage"]["engine"], json!("postgres"));
    }

    #[test]
    fn apply_defaults_on_empty_spec() {
        let xrd = xrd();
        let mut spec = json!({});
        xrd.apply_defaults(&mut spec, "v1alpha1");
        assert_eq!(spec["size"], json!("small"));
        assert_eq!(spec["storage"]["engine"], json!("postgres"));
    }
}
