//! End-to-end pipeline scenarios against `FakeClusterClients`: a modified
//! field, an ambiguous composition selector, a manual revision pin, and an
//! ignored path, each checked against its §7 exit code.

use std::sync::Arc;

use async_trait::async_trait;

use xdiff_client::FakeClusterClients;
use xdiff_core::{ChangeType, Composition, CompositionRevision, RenderRequest, RenderResult, Resource, Xr};
use xdiff_diff::DiffOptions;
use xdiff_pipeline::{PipelineError, Processor, ProcessorConfig};
use xdiff_render::{GlobalRenderLock, RenderDriver, Renderer};

fn xr(spec: &str) -> Xr {
    Xr::new(
        Resource::from_yaml(&format!(
            "apiVersion: example.org/v1alpha1\nkind: XDatabase\nmetadata:\n  name: my-db\nspec:\n{spec}"
        ))
        .unwrap(),
    )
}

fn composition(name: &str, labels_yaml: &str) -> Composition {
    Composition::new(
        Resource::from_yaml(&format!(
            "apiVersion: apiextensions.crossplane.io/v1\nkind: Composition\nmetadata:\n  name: {name}\n{labels_yaml}spec:\n  compositeTypeRef:\n    kind: XDatabase\n  pipeline:\n    - step: compose\n      functionRef:\n        name: function-patch-and-transform\n"
        ))
        .unwrap(),
    )
}

fn revision(composition_name: &str, revision_name: &str, number: i64) -> CompositionRevision {
    CompositionRevision::new(
        Resource::from_yaml(&format!(
            "apiVersion: apiextensions.crossplane.io/v1\nkind: CompositionRevision\nmetadata:\n  name: {revision_name}\n  labels:\n    crossplane.io/composition-name: {composition_name}\nspec:\n  revision: {number}\n  compositeTypeRef:\n    kind: XDatabase\n  pipeline:\n    - step: compose\n      functionRef:\n        name: function-patch-and-transform\n"
        ))
        .unwrap(),
    )
}

/// Renders a single ConfigMap child whose `data.tier` tracks the XR's own
/// `spec.tier` field, so changing the XR's input produces a modified child.
struct TieredConfigMap;

#[async_trait]
impl Renderer for TieredConfigMap {
    async fn render(&self, request: RenderRequest) -> Result<RenderResult, String> {
        let tier = request
            .composite_resource
            .resource()
            .as_value()
            .pointer("/spec/tier")
            .and_then(|v| v.as_str())
            .unwrap_or("bronze");
        let mut composed = indexmap::IndexMap::new();
        composed.insert(
            "tier-config".to_string(),
            Resource::from_yaml(&format!(
                "apiVersion: v1\nkind: ConfigMap\nmetadata:\n  name: my-db-config\n  namespace: default\ndata:\n  tier: {tier}\n"
            ))
            .unwrap(),
        );
        Ok(RenderResult {
            composite_resource: request.composite_resource.resource().clone(),
            composed_resources: composed,
            results: Vec::new(),
            required_resources: Vec::new(),
        })
    }
}

fn processor(clients: FakeClusterClients, config: ProcessorConfig) -> Processor<FakeClusterClients> {
    let clients = Arc::new(clients);
    let driver = Arc::new(RenderDriver::new(Arc::new(TieredConfigMap), GlobalRenderLock::new(), clients.clone()));
    Processor::new(clients, driver, config)
}

#[tokio::test]
async fn modified_xr_field_surfaces_as_modified_diff_with_exit_code_3() {
    let live_xr = Resource::from_yaml(
        "apiVersion: example.org/v1alpha1\nkind: XDatabase\nmetadata:\n  name: my-db\nspec:\n  compositionRef:\n    name: my-comp\n  tier: bronze\n",
    )
    .unwrap();
    let live_config = Resource::from_yaml(
        "apiVersion: v1\nkind: ConfigMap\nmetadata:\n  name: my-db-config\n  namespace: default\ndata:\n  tier: bronze\n",
    )
    .unwrap();
    let clients = FakeClusterClients::new()
        .with_composition(composition("my-comp", ""))
        .with_revision(revision("my-comp", "rev-1", 1))
        .with_resource(live_xr.clone())
        .with_resource(live_config.clone())
        .with_owner_tree(
            live_xr.clone(),
            xdiff_core::OwnershipRelation {
                root: live_xr,
                children: vec![xdiff_core::OwnershipRelation::leaf(live_config)],
            },
        );

    let input = xr("  compositionRef:\n    name: my-comp\n  tier: gold\n");
    let report = processor(clients, ProcessorConfig::default()).process(vec![input]).await;

    assert_eq!(report.tool_errors.len(), 0);
    let config_diff = report
        .diffs
        .iter()
        .find(|d| d.name == "my-db-config")
        .expect("tier-config diff present");
    assert_eq!(config_diff.change_type, ChangeType::Modified);
    assert!(config_diff.unified_diff_text.contains("gold"));
    assert_eq!(report.exit_code(), 3);
}

#[tokio::test]
async fn ambiguous_composition_selector_is_a_tool_error_with_exit_code_1() {
    let clients = FakeClusterClients::new()
        .with_composition(composition("c1", "  labels:\n    tier: gold\n"))
        .with_composition(composition("c2", "  labels:\n    tier: gold\n"));

    let input = xr("  compositionSelector:\n    matchLabels:\n      tier: gold\n");
    let report = processor(clients, ProcessorConfig::default()).process(vec![input]).await;

    assert!(report.diffs.is_empty());
    assert!(report
        .tool_errors
        .iter()
        .any(|e| matches!(e, PipelineError::AmbiguousComposition { candidate_count: 2, .. })));
    assert_eq!(report.exit_code(), 1);
}

#[tokio::test]
async fn manual_pinned_revision_is_rendered_instead_of_a_newer_one() {
    let clients = FakeClusterClients::new()
        .with_composition(composition("my-comp", ""))
        .with_revision(revision("my-comp", "rev-1", 1))
        .with_revision(revision("my-comp", "rev-2", 2));

    let input = xr(
        "  compositionRef:\n    name: my-comp\n  compositionUpdatePolicy: Manual\n  compositionRevisionRef:\n    name: rev-1\n  tier: gold\n",
    );
    let report = processor(clients, ProcessorConfig::default()).process(vec![input]).await;

    assert_eq!(report.tool_errors.len(), 0);
    assert!(report.diffs.iter().any(|d| d.name == "my-db-config" && d.change_type == ChangeType::Added));
    assert_eq!(report.exit_code(), 3);
}

#[tokio::test]
async fn ignored_path_suppresses_the_diff_it_covers() {
    let live_xr = Resource::from_yaml(
        "apiVersion: example.org/v1alpha1\nkind: XDatabase\nmetadata:\n  name: my-db\nspec:\n  compositionRef:\n    name: my-comp\n  tier: gold\n",
    )
    .unwrap();
    let live_config = Resource::from_yaml(
        "apiVersion: v1\nkind: ConfigMap\nmetadata:\n  name: my-db-config\n  namespace: default\ndata:\n  tier: silver\n",
    )
    .unwrap();
    let clients = FakeClusterClients::new()
        .with_composition(composition("my-comp", ""))
        .with_revision(revision("my-comp", "rev-1", 1))
        .with_resource(live_xr.clone())
        .with_resource(live_config.clone())
        .with_owner_tree(
            live_xr.clone(),
            xdiff_core::OwnershipRelation {
                root: live_xr,
                children: vec![xdiff_core::OwnershipRelation::leaf(live_config)],
            },
        );

    let input = xr("  compositionRef:\n    name: my-comp\n  tier: gold\n");
    let config = ProcessorConfig {
        diff_options: DiffOptions::default().with_ignore_paths(vec!["data.tier".to_string()]),
        ..ProcessorConfig::default()
    };
    let report = processor(clients, config).process(vec![input]).await;

    assert_eq!(report.tool_errors.len(), 0);
    assert!(!report.diffs.iter().any(|d| d.name == "my-db-config"));
    assert_eq!(report.exit_code(), 0);
}
