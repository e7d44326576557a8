//! The Diff Calculator (§4.6): merges a desired resource onto its live
//! counterpart via server-side-apply dry-run, strips ignored paths,
//! canonicalizes, and produces a classified unified diff.

use serde_json::Value as JsonValue;
use similar::{ChangeTag, TextDiff};

use xdiff_client::ResourceCapability;
use xdiff_core::{ChangeType, Resource, ResourceDiff};

use crate::error::Result;
use crate::ignore_path;

pub const DEFAULT_FIELD_MANAGER: &str = "crossplane-diff";

/// Fields stripped from both sides before comparison regardless of
/// configuration (§4.6 step 2).
const SERVER_MANAGED_FIELDS: &[&str] = &[
    "metadata.resourceVersion",
    "metadata.generation",
    "metadata.uid",
    "metadata.creationTimestamp",
    "metadata.managedFields",
];

const DEFAULT_IGNORED_ANNOTATION: &str = "metadata.annotations[kubectl.kubernetes.io/last-applied-configuration]";

/// Configuration for one calculator run, built once per pipeline (`--compact`,
/// `--ignore-paths` from §6.2).
#[derive(Debug, Clone)]
pub struct DiffOptions {
    pub field_manager: String,
    pub ignore_paths: Vec<String>,
    pub compact: bool,
    /// Keep `status` in the comparison when the desired resource explicitly
    /// sets it (§4.6 step 2: "status (unless status is part of desired)").
    pub keep_status_if_desired: bool,
}

impl Default for DiffOptions {
    fn default() -> Self {
        Self {
            field_manager: DEFAULT_FIELD_MANAGER.to_string(),
            ignore_paths: vec![DEFAULT_IGNORED_ANNOTATION.to_string()],
            compact: false,
            keep_status_if_desired: true,
        }
    }
}

impl DiffOptions {
    pub fn with_ignore_paths(mut self, paths: impl IntoIterator<Item = String>) -> Self {
        self.ignore_paths.extend(paths);
        self
    }

    fn context_lines(&self) -> usize {
        if self.compact { 1 } else { 3 }
    }
}

/// Drives one resource's dry-run diff against a cluster-client capability.
pub struct DiffCalculator<'a, C: ResourceCapability> {
    client: &'a C,
    options: DiffOptions,
}

impl<'a, C: ResourceCapability> DiffCalculator<'a, C> {
    pub fn new(client: &'a C, options: DiffOptions) -> Self {
        Self { client, options }
    }

    /// Compute the diff for a matched, added, or removed resource.
    ///
    /// `desired` absent + `live` present → `Removed`; `desired` present +
    /// `live` absent → `Added`; both present → dry-run merge and classify.
    pub async fn diff(&self, desired: Option<&Resource>, live: Option<&Resource>) -> Result<ResourceDiff> {
        match (desired, live) {
            (Some(desired), None) => Ok(self.added(desired)),
            (None, Some(live)) => Ok(self.removed(live)),
            (Some(desired), Some(live)) => self.diff_pair(desired, live).await,
            (None, None) => unreachable!("diff requires at least one side to be present"),
        }
    }

    fn added(&self, desired: &Resource) -> ResourceDiff {
        let normalized = self.normalize(desired.as_value().clone(), desired);
        let rendered = to_canonical_yaml(&normalized);
        let diff = TextDiff::from_lines("", &rendered);
        ResourceDiff {
            kind: desired.kind().to_string(),
            namespace: desired.namespace().map(str::to_string),
            name: display_name(desired),
            change_type: ChangeType::Added,
            unified_diff_text: render_unified_diff(&diff, self.options.context_lines()),
        }
    }

    fn removed(&self, live: &Resource) -> ResourceDiff {
        let normalized = self.normalize(live.as_value().clone(), live);
        let rendered = to_canonical_yaml(&normalized);
        let diff = TextDiff::from_lines(&rendered, "");
        ResourceDiff {
            kind: live.kind().to_string(),
            namespace: live.namespace().map(str::to_string),
            name: display_name(live),
            change_type: ChangeType::Removed,
            unified_diff_text: render_unified_diff(&diff, self.options.context_lines()),
        }
    }

    async fn diff_pair(&self, desired: &Resource, live: &Resource) -> Result<ResourceDiff> {
        let applied = self.client.dry_run_apply(desired, &self.options.field_manager).await?;

        let mut live_value = live.as_value().clone();
        align_api_version(&mut live_value, applied.as_value());
        let live_normalized = self.normalize(live_value, desired);
        let desired_normalized = self.normalize(applied.as_value().clone(), desired);

        let live_text = to_canonical_yaml(&live_normalized);
        let desired_text = to_canonical_yaml(&desired_normalized);

        let change_type = if live_text == desired_text {
            ChangeType::Unchanged
        } else {
            ChangeType::Modified
        };

        let diff = TextDiff::from_lines(&live_text, &desired_text);
        Ok(ResourceDiff {
            kind: desired.kind().to_string(),
            namespace: desired.namespace().map(str::to_string),
            name: display_name(desired),
            change_type,
            unified_diff_text: render_unified_diff(&diff, self.options.context_lines()),
        })
    }

    /// Strip server-managed fields, the default and user-supplied ignore
    /// paths, and `status` unless the desired resource sets it (§4.6 step 2).
    fn normalize(&self, mut value: JsonValue, desired: &Resource) -> JsonValue {
        for path in SERVER_MANAGED_FIELDS {
            ignore_path::remove(&mut value, path);
        }
        for path in &self.options.ignore_paths {
            ignore_path::remove(&mut value, path);
        }
        let keep_status = self.options.keep_status_if_desired && desired.as_value().get("status").is_some();
        if !keep_status {
            if let Some(obj) = value.as_object_mut() {
                obj.remove("status");
            }
        }
        canonicalize(&mut value);
        value
    }
}

/// Align `live`'s `apiVersion` to `desired`'s before comparison (§4.5 rule 1,
/// §9: "do not compare apiVersion strings directly"). The matcher already
/// matched this pair across a composition-revision–induced version change by
/// content, not apiVersion, so the live side's served version is rewritten to
/// the desired one; a real apiVersion field change is indistinguishable from
/// a conversion-resolved reference at this point, and per §9 the latter wins.
fn align_api_version(live: &mut JsonValue, desired: &JsonValue) {
    let Some(desired_api_version) = desired.get("apiVersion").cloned() else {
        return;
    };
    if let Some(obj) = live.as_object_mut() {
        if obj.get("apiVersion") != Some(&desired_api_version) {
            obj.insert("apiVersion".to_string(), desired_api_version);
        }
    }
}

fn display_name(resource: &Resource) -> String {
    resource
        .name()
        .map(str::to_string)
        .unwrap_or_else(|| format!("{}(generated)", resource.generate_name().unwrap_or_default()))
}

/// Sort object keys recursively so two structurally equal documents always
/// serialize identically (§4.6 step 3).
fn canonicalize(value: &mut JsonValue) {
    match value {
        JsonValue::Object(map) => {
            for v in map.values_mut() {
                canonicalize(v);
            }
            let sorted: serde_json::Map<String, JsonValue> = {
                let mut entries: Vec<_> = map.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
                entries.sort_by(|a, b| a.0.cmp(&b.0));
                entries.into_iter().collect()
            };
            *map = sorted;
        }
        JsonValue::Array(items) => {
            for item in items.iter_mut() {
                canonicalize(item);
            }
        }
        _ => {}
    }
}

fn to_canonical_yaml(value: &JsonValue) -> String {
    serde_yaml::to_string(value).unwrap_or_default()
}

fn render_unified_diff(diff: &TextDiff<str>, context: usize) -> String {
    let mut out = String::new();
    for group in diff.grouped_ops(context) {
        for op in group {
            for change in diff.iter_changes(&op) {
                let sigil = match change.tag() {
                    ChangeTag::Delete => '-',
                    ChangeTag::Insert => '+',
                    ChangeTag::Equal => ' ',
                };
                out.push(sigil);
                out.push_str(change.value().trim_end_matches('\n'));
                out.push('\n');
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use xdiff_client::FakeClusterClients;

    fn resource(name: &str, field: &str) -> Resource {
        Resource::from_yaml(&format!(
            "apiVersion: v1\nkind: ConfigMap\nmetadata:\n  name: {name}\n  namespace: default\ndata:\n  field: {field}\n"
        ))
        .unwrap()
    }

    #[tokio::test]
    async fn unchanged_pair_produces_no_diff_lines() {
        let live = resource("cm", "value");
        let client = FakeClusterClients::new().with_resource(live.clone());
        let calculator = DiffCalculator::new(&client, DiffOptions::default());
        let result = calculator.diff(Some(&live), Some(&live)).await.unwrap();
        assert_eq!(result.change_type, ChangeType::Unchanged);
    }

    #[tokio::test]
    async fn modified_pair_is_classified_modified() {
        let live = resource("cm", "old-value");
        let desired = resource("cm", "new-value");
        let client = FakeClusterClients::new().with_resource(live.clone());
        let calculator = DiffCalculator::new(&client, DiffOptions::default());
        let result = calculator.diff(Some(&desired), Some(&live)).await.unwrap();
        assert_eq!(result.change_type, ChangeType::Modified);
        assert!(result.unified_diff_text.contains("-field: old-value") || result.unified_diff_text.contains("old-value"));
    }

    #[tokio::test]
    async fn added_when_live_absent() {
        let desired = resource("cm", "value");
        let client = FakeClusterClients::new();
        let calculator = DiffCalculator::new(&client, DiffOptions::default());
        let result = calculator.diff(Some(&desired), None).await.unwrap();
        assert_eq!(result.change_type, ChangeType::Added);
    }

    #[tokio::test]
    async fn removed_when_desired_absent() {
        let live = resource("cm", "value");
        let client = FakeClusterClients::new();
        let calculator = DiffCalculator::new(&client, DiffOptions::default());
        let result = calculator.diff(None, Some(&live)).await.unwrap();
        assert_eq!(result.change_type, ChangeType::Removed);
    }

    #[tokio::test]
    async fn ignore_path_soundness_suppresses_annotation_only_changes() {
        let mut live = resource("cm", "value");
        live.set_annotation("argocd.argoproj.io/tracking-id", "abc");
        let mut desired = resource("cm", "value");
        desired.set_annotation("argocd.argoproj.io/tracking-id", "xyz");
        let client = FakeClusterClients::new().with_resource(live.clone());
        let options = DiffOptions::default()
            .with_ignore_paths(["metadata.annotations[argocd.argoproj.io/tracking-id]".to_string()]);
        let calculator = DiffCalculator::new(&client, options);
        let result = calculator.diff(Some(&desired), Some(&live)).await.unwrap();
        assert_eq!(result.change_type, ChangeType::Unchanged);
    }

    #[tokio::test]
    async fn api_version_change_alone_is_suppressed() {
        let live = Resource::from_yaml(
            "apiVersion: example.org/v1alpha1\nkind: XDatabase\nmetadata:\n  name: my-db\ndata:\n  field: value\n",
        )
        .unwrap();
        let desired = Resource::from_yaml(
            "apiVersion: example.org/v1beta1\nkind: XDatabase\nmetadata:\n  name: my-db\ndata:\n  field: value\n",
        )
        .unwrap();
        let client = FakeClusterClients::new();
        let calculator = DiffCalculator::new(&client, DiffOptions::default());
        let result = calculator.diff(Some(&desired), Some(&live)).await.unwrap();
        assert_eq!(result.change_type, ChangeType::Unchanged);
        assert!(!result.unified_diff_text.contains("-apiVersion"));
        assert!(!result.unified_diff_text.contains("+apiVersion"));
    }

    #[tokio::test]
    async fn api_version_change_does_not_mask_a_real_field_change() {
        let live = Resource::from_yaml(
            "apiVersion: example.org/v1alpha1\nkind: XDatabase\nmetadata:\n  name: my-db\ndata:\n  field: old-value\n",
        )
        .unwrap();
        let desired = Resource::from_yaml(
            "apiVersion: example.org/v1beta1\nkind: XDatabase\nmetadata:\n  name: my-db\ndata:\n  field: new-value\n",
        )
        .unwrap();
        let client = FakeClusterClients::new();
        let calculator = DiffCalculator::new(&client, DiffOptions::default());
        let result = calculator.diff(Some(&desired), Some(&live)).await.unwrap();
        assert_eq!(result.change_type, ChangeType::Modified);
        assert!(!result.unified_diff_text.contains("-apiVersion"));
        assert!(!result.unified_diff_text.contains("+apiVersion"));
        assert!(result.unified_diff_text.contains("new-value"));
    }
}
