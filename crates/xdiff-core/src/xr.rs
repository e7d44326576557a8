//! Composite Resources, Claims and the composition-selection fields carried
//! on an XR (§3 DATA MODEL, §4.2 Composition Resolver).

use crate::resource::Resource;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// `spec.compositionUpdatePolicy` on an XR. Absent is treated as `Automatic`
/// (§4.2 rule 2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CompositionUpdatePolicy {
    #[default]
    Automatic,
    Manual,
}

/// `compositionRef` on an XR: a direct reference to a Composition by name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompositionRef {
    pub name: String,
}

/// `compositionSelector` on an XR: a label-selector fallback used when no
/// direct ref is set.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CompositionSelector {
    #[serde(rename = "matchLabels", default)]
    pub match_labels: std::collections::BTreeMap<String, String>,
}

/// `compositionRevisionRef` on an XR: a pinned reference to a
/// `CompositionRevision` by name, consulted under `Manual` update policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompositionRevisionRef {
    pub name: String,
}

/// The subset of an XR's `spec` the resolver needs, read from whichever
/// location the XRD generation uses.
///
/// v1-style (modern) XRDs place these fields directly under `spec.`; legacy
/// XRDs nest them under `spec.crossplane.`. Both locations are probed, with
/// `spec.` taking precedence, mirroring how the field actually moved between
/// Crossplane XRD API versions.
#[derive(Debug, Clone, Default)]
pub struct CompositionSelection {
    pub composition_ref: Option<CompositionRef>,
    pub composition_selector: Option<CompositionSelector>,
    pub composition_revision_ref: Option<CompositionRevisionRef>,
    pub composition_update_policy: CompositionUpdatePolicy,
}

/// A Composite Resource: a `Resource` whose kind an XRD defines.
#[derive(Debug, Clone)]
pub struct Xr {
    resource: Resource,
}

impl Xr {
    pub fn new(resource: Resource) -> Self {
        Self { resource }
    }

    pub fn resource(&self) -> &Resource {
        &self.resource
    }

    pub fn into_resource(self) -> Resource {
        self.resource
    }

    pub fn name(&self) -> Option<&str> {
        self.resource.name()
    }

    /// Read the composition-selection fields, probing `spec.` first and
    /// falling back to `spec.crossplane.` for legacy XRDs.
    pub fn composition_selection(&self) -> CompositionSelection {
        let spec = self.resource.as_value().get("spec");
        let modern = spec;
        let legacy = spec.and_then(|s| s.get("crossplane"));

        let composition_ref = field_from(modern, legacy, "compositionRef")
            .and_then(|v| serde_json::from_value(v.clone()).ok());
        let composition_selector = field_from(modern, legacy, "compositionSelector")
            .and_then(|v| serde_json::from_value(v.clone()).ok());
        let composition_revision_ref = field_from(modern, legacy, "compositionRevisionRef")
            .and_then(|v| serde_json::from_value(v.clone()).ok());
        let composition_update_policy = field_from(modern, legacy, "compositionUpdatePolicy")
            .and_then(JsonValue::as_str)
            .map(|s| match s {
                "Manual" => CompositionUpdatePolicy::Manual,
                _ => CompositionUpdatePolicy::Automatic,
            })
            .unwrap_or_default();

        CompositionSelection {
            composition_ref,
            composition_selector,
            composition_revision_ref,
            composition_update_policy,
        }
    }
}

fn field_from<'a>(
    modern: Option<&'a JsonValue>,
    legacy: Option<&'a JsonValue>,
    field: &str,
) -> Option<&'a JsonValue> {
    modern
        .and_then(|m| m.get(field))
        .filter(|v| !v.is_null())
        .or_else(|| legacy.and_then(|l| l.get(field)).filter(|v| !v.is_null()))
}

/// A Claim: a namespaced `Resource` that designates a backing XR via
/// `spec.resourceRef`.
#[derive(Debug, Clone)]
pub struct Claim {
    resource: Resource,
}

impl Claim {
    pub fn new(resource: Resource) -> Self {
        Self { resource }
    }

    pub fn resource(&self) -> &Resource {
        &self.resource
    }

    /// The `(namespace, name)` of the backing XR, if the claim has already
    /// been bound.
    pub fn resource_ref_name(&self) -> Option<&str> {
        self.resource
            .as_value()
            .get("spec")
            .and_then(|s| s.get("resourceRef"))
            .and_then(|r| r.get("name"))
            .and_then(JsonValue::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn xr_with_spec(spec_yaml: &str) -> Xr {
        let doc = format!(
            "apiVersion: example.org/v1alpha1\nkind: XDatabase\nmetadata:\n  name: test\nspec:\n{spec_yaml}"
        );
        Xr::new(Resource::from_yaml(&doc).unwrap())
    }

    #[test]
    fn modern_composition_ref() {
        let xr = xr_with_spec("  compositionRef:\n    name: my-composition\n");
        let sel = xr.composition_selection();
        assert_eq!(sel.composition_ref.unwrap().name, "my-composition");
        assert_eq!(sel.composition_update_policy, CompositionUpdatePolicy::Automatic);
    }

    #[test]
    fn legacy_composition_ref_under_crossplane_namespace() {
        let xr = xr_with_spec("  crossplane:\n    compositionRef:\n      name: legacy-comp\n");
        let sel = xr.composition_selection();
        assert_eq!(sel.composition_ref.unwrap().name, "legacy-comp");
    }

    #[test]
    fn modern_field_takes_precedence_over_legacy() {
        let xr = xr_with_spec(
            "  compositionRef:\n    name: modern\n  crossplane:\n    compositionRef:\n      name: legacy\n",
        );
        let sel = xr.composition_selection();
        assert_eq!(sel.composition_ref.unwrap().name, "modern");
    }

    #[test]
    fn manual_update_policy_with_pinned_revision() {
        let xr = xr_with_spec(
            "  compositionUpdatePolicy: Manual\n  compositionRevisionRef:\n    name: rev-abc123\n",
        );
        let sel = xr.composition_selection();
        assert_eq!(sel.composition_update_policy, CompositionUpdatePolicy::Manual);
        assert_eq!(sel.composition_revision_ref.unwrap().name, "rev-abc123");
    }

    #[test]
    fn selector_reads_match_labels() {
        let xr = xr_with_spec(
            "  compositionSelector:\n    matchLabels:\n      tier: gold\n",
        );
        let sel = xr.composition_selection();
        let selector = sel.composition_selector.unwrap();
        assert_eq!(selector.match_labels.get("tier"), Some(&"gold".to_string()));
    }

    #[test]
    fn claim_resource_ref_name() {
        let doc = "apiVersion: example.org/v1alpha1\nkind: Database\nmetadata:\n  name: claim\nspec:\n  resourceRef:\n    name: bound-xr\n";
        let claim = Claim::new(Resource::from_yaml(doc).unwrap());
        assert_eq!(claim.resource_ref_name(), Some("bound-xr"));
    }
}
