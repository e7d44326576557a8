//! The Diff Processor (§4.7) and the concurrency model it runs under (§5):
//! resolves each input's composition, drives the Requirements Provider's
//! fixed-point loop, renders, matches and diffs composed children, recurses
//! into nested XRs, detects removals, then aggregates every input's result
//! into one sorted, deduplicated report.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, StreamExt};

use xdiff_client::{DefinitionCapability, ResourceCapability, ResourceTreeCapability, SchemaCapability};
use xdiff_core::{
    schema_for_version, Composition, Gvk, OwnershipRelation, RenderContext, RenderRequest, ResourceDiff,
    ResourceIdentity, SchemaValidator, ValidationIssue, Xr,
};
use xdiff_diff::{DiffCalculator, DiffOptions};
use xdiff_render::RenderDriver;

use crate::clients::Clients;
use crate::error::{PipelineError, Result};
use crate::requirements::RequirementsProvider;
use crate::resolver::{self, ResolvedComposition};

/// The cap on the requirements fixed-point loop (§4.3: "a small iteration
/// cap (default 5)").
const DEFAULT_REQUIREMENTS_ITERATION_CAP: usize = 5;

/// The nested-recursion depth cap's default, matching the CLI's
/// `--max-nested-depth=10` default (§6.2).
const DEFAULT_MAX_NESTED_DEPTH: usize = 10;

/// The processor's deadline default (§5: "default 1 minute, configurable").
const DEFAULT_DEADLINE: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
pub struct ProcessorConfig {
    pub parallelism: usize,
    pub max_nested_depth: usize,
    pub requirements_iteration_cap: usize,
    pub diff_options: DiffOptions,
    pub deadline: Duration,
    /// `secretRef.name` -> namespace overrides for function credentials
    /// (the CLI's `--function-credentials` local-testing mode).
    pub credential_namespace_overrides: std::collections::HashMap<String, String>,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            parallelism: 4,
            max_nested_depth: DEFAULT_MAX_NESTED_DEPTH,
            requirements_iteration_cap: DEFAULT_REQUIREMENTS_ITERATION_CAP,
            diff_options: DiffOptions::default(),
            deadline: DEFAULT_DEADLINE,
            credential_namespace_overrides: std::collections::HashMap::new(),
        }
    }
}

/// A schema validation failure against one document (§4.6, §7): carried as
/// data on the report rather than as a `PipelineError`, since it is not a
/// tool error.
#[derive(Debug, Clone)]
pub struct SchemaValidationError {
    pub gvk: Gvk,
    pub namespace: Option<String>,
    pub name: String,
    pub issues: Vec<ValidationIssue>,
}

#[derive(Debug, Default)]
struct PipelineOutcome {
    diffs: Vec<ResourceDiff>,
    schema_issues: Vec<SchemaValidationError>,
    error: Option<PipelineError>,
}

/// The aggregated result of one processor run, ready for §6.4 rendering.
#[derive(Debug, Default)]
pub struct ProcessorReport {
    pub diffs: Vec<ResourceDiff>,
    pub schema_errors: Vec<SchemaValidationError>,
    pub tool_errors: Vec<PipelineError>,
}

impl ProcessorReport {
    /// The exit code of §7: `max(3 if diffs, 2 if schema errors, 1 if tool
    /// errors, 0)`.
    pub fn exit_code(&self) -> i32 {
        let mut code = 0;
        if !self.diffs.is_empty() {
            code = code.max(3);
        }
        if !self.schema_errors.is_empty() {
            code = code.max(2);
        }
        if !self.tool_errors.is_empty() {
            code = code.max(1);
        }
        code
    }
}

pub struct Processor<C: Clients> {
    clients: Arc<C>,
    render_driver: Arc<RenderDriver<C>>,
    requirements: Arc<RequirementsProvider<C>>,
    config: ProcessorConfig,
}

impl<C: Clients + 'static> Processor<C> {
    pub fn new(clients: Arc<C>, render_driver: Arc<RenderDriver<C>>, config: ProcessorConfig) -> Self {
        let requirements = Arc::new(
            RequirementsProvider::new(clients.clone())
                .with_credential_namespace_overrides(config.credential_namespace_overrides.clone()),
        );
        Self {
            clients,
            render_driver,
            requirements,
            config,
        }
    }

    /// Run every input's pipeline concurrently, bounded by
    /// `min(parallelism, inputs.len())` (§4.7, §5), under a single shared
    /// deadline. On deadline, partial results are discarded (§5).
    pub async fn process(&self, inputs: Vec<Xr>) -> ProcessorReport {
        let concurrency = self.config.parallelism.min(inputs.len().max(1)).max(1);

        let run = stream::iter(inputs)
            .map(|xr| self.run_one(xr))
            .buffer_unordered(concurrency)
            .collect::<Vec<_>>();

        let outcomes = match tokio::time::timeout(self.config.deadline, run).await {
            Ok(outcomes) => outcomes,
            Err(_) => {
                return ProcessorReport {
                    diffs: Vec::new(),
                    schema_errors: Vec::new(),
                    tool_errors: vec![PipelineError::DeadlineExceeded],
                };
            }
        };

        self.aggregate(outcomes)
    }

    /// Merge every input's outcome: dedup diffs by `(kind, namespace,
    /// name)`, flagging disagreement as `InternalInconsistency`, then sort
    /// deterministically (§4.7, §8 Ordering property).
    fn aggregate(&self, outcomes: Vec<PipelineOutcome>) -> ProcessorReport {
        let mut by_key: indexmap::IndexMap<(String, Option<String>, String), ResourceDiff> = indexmap::IndexMap::new();
        let mut schema_errors = Vec::new();
        let mut tool_errors = Vec::new();

        for outcome in outcomes {
            schema_errors.extend(outcome.schema_issues);
            if let Some(err) = outcome.error {
                tool_errors.push(err);
            }
            for diff in outcome.diffs {
                let key = (diff.kind.clone(), diff.namespace.clone(), diff.name.clone());
                match by_key.get(&key) {
                    None => {
                        by_key.insert(key, diff);
                    }
                    Some(existing)
                        if existing.change_type == diff.change_type
                            && existing.unified_diff_text == diff.unified_diff_text => {}
                    Some(_) => {
                        tool_errors.push(PipelineError::InternalInconsistency {
                            gvk: Gvk::new("", "", diff.kind.clone()),
                            namespace: diff.namespace.clone(),
                            name: diff.name.clone(),
                        });
                    }
                }
            }
        }

        let mut diffs: Vec<ResourceDiff> = by_key.into_values().collect();
        diffs.sort();

        ProcessorReport {
            diffs,
            schema_errors,
            tool_errors,
        }
    }

    async fn run_one(&self, xr: Xr) -> PipelineOutcome {
        let mut diffs = Vec::new();
        let mut schema_issues = Vec::new();
        let mut visited = HashSet::new();

        let live_self = match self.fetch_self(&xr).await {
            Ok(live) => live,
            Err(err) => return PipelineOutcome { error: Some(err), ..Default::default() },
        };

        let result = self
            .render_recursive(xr, live_self, 0, &mut visited, &mut diffs, &mut schema_issues)
            .await;

        PipelineOutcome {
            diffs,
            schema_issues,
            error: result.err(),
        }
    }

    async fn fetch_self(&self, xr: &Xr) -> Result<Option<xdiff_core::Resource>> {
        match xr.name() {
            Some(name) => Ok(self.clients.get(&xr.resource().gvk(), xr.resource().namespace(), name).await?),
            None => Ok(None),
        }
    }

    /// Resolve, gather-and-render to a fixed point, diff this XR against its
    /// live counterpart, then match/diff/recurse into its composed children
    /// and detect removals among its live owned children (§4.2–§4.7).
    async fn render_recursive(
        &self,
        xr: Xr,
        live_self: Option<xdiff_core::Resource>,
        depth: usize,
        visited: &mut HashSet<ResourceIdentity>,
        diffs: &mut Vec<ResourceDiff>,
        schema_issues: &mut Vec<SchemaValidationError>,
    ) -> Result<()> {
        if depth > self.config.max_nested_depth {
            return Err(PipelineError::DepthExceeded {
                max_depth: self.config.max_nested_depth,
                gvk: xr.resource().gvk(),
                namespace: xr.resource().namespace().map(str::to_string),
                name: xr.name().unwrap_or_default().to_string(),
            });
        }

        if !visited.insert(xr.resource().identity()) {
            return Ok(());
        }

        if let Some(issue) = self.validate_xr_schema(&xr).await? {
            schema_issues.push(issue);
            return Ok(());
        }

        let resolved = resolver::resolve(&xr, self.clients.as_ref()).await?;

        let live_tree = self.clients.get_owned_children(xr.resource()).await?;
        let observed_resources: Vec<xdiff_core::Resource> =
            live_tree.flatten().into_iter().skip(1).cloned().collect();

        let render_result = self.render_to_fixed_point(&xr, &resolved, observed_resources).await?;

        let calculator = DiffCalculator::new(self.clients.as_ref(), self.config.diff_options.clone());
        diffs.push(calculator.diff(Some(&render_result.composite_resource), live_self.as_ref()).await?);

        let owner_name = xr.name().unwrap_or_default().to_string();
        let mut matched_live = HashSet::new();
        if let Some(live) = &live_self {
            matched_live.insert(live.identity());
        }

        self.process_composed_children(
            &owner_name,
            render_result.composed_resources,
            &live_tree,
            depth,
            visited,
            diffs,
            schema_issues,
            &mut matched_live,
        )
        .await?;

        for child_tree in &live_tree.children {
            if !matched_live.contains(&child_tree.root.identity()) {
                for removed in child_tree.flatten() {
                    diffs.push(calculator.diff(None, Some(removed)).await?);
                }
            }
        }

        Ok(())
    }

    /// `loop { result = render(state); newReqs = extract(result); if
    /// newReqs ⊆ state.reqs break; state.reqs ∪= newReqs }` (§9), capped at
    /// `requirements_iteration_cap` (§4.3).
    async fn render_to_fixed_point(
        &self,
        xr: &Xr,
        resolved: &ResolvedComposition,
        observed_resources: Vec<xdiff_core::Resource>,
    ) -> Result<xdiff_core::RenderResult> {
        let functions = self.requirements.functions(&resolved.composition).await?;
        let mut required = Vec::new();
        let mut iteration = 0usize;

        loop {
            iteration += 1;
            if iteration > self.config.requirements_iteration_cap {
                return Err(PipelineError::UnstableRequirements { iterations: iteration - 1 });
            }

            let gathered = self.requirements.gather(&resolved.composition, &required).await?;
            let request = RenderRequest {
                composite_resource: xr.clone(),
                composition: resolved.composition.clone(),
                functions: functions.clone(),
                observed_resources: observed_resources.clone(),
                extra_resources: gathered.extra_resources,
                environment_configs: gathered.environment_configs,
                function_credentials: gathered.function_credentials,
                context: RenderContext::default(),
            };

            let result = self.render_driver.render(request).await?;

            let is_stable = result.required_resources.iter().all(|r| required.contains(r));
            if is_stable {
                return Ok(result);
            }
            for requirement in result.required_resources {
                if !required.contains(&requirement) {
                    required.push(requirement);
                }
            }
        }
    }

    /// Match each desired composed resource against this XR's live children,
    /// recursing for nested composites and diffing everything else (§4.5,
    /// §4.7).
    async fn process_composed_children(
        &self,
        owner_name: &str,
        composed: indexmap::IndexMap<String, xdiff_core::Resource>,
        live_tree: &OwnershipRelation,
        depth: usize,
        visited: &mut HashSet<ResourceIdentity>,
        diffs: &mut Vec<ResourceDiff>,
        schema_issues: &mut Vec<SchemaValidationError>,
        matched_live: &mut HashSet<ResourceIdentity>,
    ) -> Result<()> {
        let live_candidates: Vec<xdiff_core::Resource> = live_tree.flatten().into_iter().cloned().collect();
        let calculator = DiffCalculator::new(self.clients.as_ref(), self.config.diff_options.clone());

        for (_template_key, child) in composed {
            if let Some(issue) = self.validate_composed_schema(&child).await? {
                schema_issues.push(issue);
                continue;
            }

            let outcome = xdiff_diff::match_resource(&child, owner_name, &live_candidates)?;
            let live = match &outcome {
                xdiff_diff::MatchOutcome::Matched(live) => {
                    matched_live.insert(live.identity());
                    Some(live.clone())
                }
                xdiff_diff::MatchOutcome::Added { .. } => None,
            };

            let is_nested_xr = self.clients.get_xrd_for_xr(&child.gvk()).await?.is_some();
            if is_nested_xr {
                Box::pin(self.render_recursive(xdiff_core::Xr::new(child), live, depth + 1, visited, diffs, schema_issues))
                    .await?;
            } else {
                diffs.push(calculator.diff(Some(&child), live.as_ref()).await?);
            }
        }
        Ok(())
    }

    async fn validate_xr_schema(&self, xr: &Xr) -> Result<Option<SchemaValidationError>> {
        let gvk = xr.resource().gvk();
        let Some(xrd) = self.clients.get_xrd_for_xr(&gvk).await? else {
            return Ok(None);
        };
        let Some(schema) = xrd.schema_for_version(&gvk.version) else {
            return Ok(None);
        };
        let validator = SchemaValidator::compile(schema)?;
        let result = validator.validate(xr.resource().as_value());
        if result.is_valid() {
            return Ok(None);
        }
        Ok(Some(SchemaValidationError {
            gvk,
            namespace: xr.resource().namespace().map(str::to_string),
            name: xr.name().unwrap_or_default().to_string(),
            issues: result.issues,
        }))
    }

    async fn validate_composed_schema(&self, resource: &xdiff_core::Resource) -> Result<Option<SchemaValidationError>> {
        let gvk = resource.gvk();
        if !self.clients.requires_crd(&gvk) {
            return Ok(None);
        }
        let Some(crd) = self.clients.get_crd(&gvk).await? else {
            return Ok(None);
        };
        let Some(schema) = schema_for_version(crd.as_value(), &gvk.version) else {
            return Ok(None);
        };
        let validator = SchemaValidator::compile(schema)?;
        let result = validator.validate(resource.as_value());
        if result.is_valid() {
            return Ok(None);
        }
        Ok(Some(SchemaValidationError {
            gvk,
            namespace: resource.namespace().map(str::to_string),
            name: resource.name().map(str::to_string).unwrap_or_default(),
            issues: result.issues,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use xdiff_client::FakeClusterClients;
    use xdiff_core::{ChangeType, Resource};
    use xdiff_render::{GlobalRenderLock, Renderer};

    struct PatchAndTransform;

    #[async_trait]
    impl Renderer for PatchAndTransform {
        async fn render(&self, request: RenderRequest) -> std::result::Result<xdiff_core::RenderResult, String> {
            let mut composed = indexmap::IndexMap::new();
            composed.insert(
                "bucket".to_string(),
                Resource::from_yaml("apiVersion: v1\nkind: ConfigMap\nmetadata:\n  name: my-db-bucket\n").unwrap(),
            );
            Ok(xdiff_core::RenderResult {
                composite_resource: request.composite_resource.resource().clone(),
                composed_resources: composed,
                results: Vec::new(),
                required_resources: Vec::new(),
            })
        }
    }

    fn xr() -> Xr {
        Xr::new(
            Resource::from_yaml(
                "apiVersion: example.org/v1alpha1\nkind: XDatabase\nmetadata:\n  name: my-db\nspec:\n  compositionRef:\n    name: my-comp\n",
            )
            .unwrap(),
        )
    }

    fn composition() -> Composition {
        Composition::new(
            Resource::from_yaml(
                "apiVersion: apiextensions.crossplane.io/v1\nkind: Composition\nmetadata:\n  name: my-comp\nspec:\n  compositeTypeRef:\n    kind: XDatabase\n  pipeline:\n    - step: compose\n      functionRef:\n        name: function-patch-and-transform\n",
            )
            .unwrap(),
        )
    }

    fn processor(clients: FakeClusterClients) -> Processor<FakeClusterClients> {
        let clients = Arc::new(clients);
        let driver = Arc::new(RenderDriver::new(Arc::new(PatchAndTransform), GlobalRenderLock::new(), clients.clone()));
        Processor::new(clients, driver, ProcessorConfig::default())
    }

    #[tokio::test]
    async fn new_xr_produces_added_diffs_for_self_and_children() {
        let clients = FakeClusterClients::new()
            .with_composition(composition())
            .with_revision(CompositionRevisionFixture::revision("my-comp", "rev-1", 1));
        let report = processor(clients).process(vec![xr()]).await;
        assert_eq!(report.tool_errors.len(), 0);
        assert_eq!(report.schema_errors.len(), 0);
        assert!(report.diffs.iter().any(|d| d.name == "my-db" && d.change_type == ChangeType::Added));
        assert!(report.diffs.iter().any(|d| d.name == "my-db-bucket" && d.change_type == ChangeType::Added));
        assert_eq!(report.exit_code(), 3);
    }

    #[tokio::test]
    async fn live_child_not_reproduced_is_removed() {
        let mut stale = Resource::from_yaml(
            "apiVersion: v1\nkind: ConfigMap\nmetadata:\n  name: stale-child\n  namespace: default\n",
        )
        .unwrap();
        stale.set_label(xdiff_core::resource::LABEL_COMPOSITE, "my-db");
        stale.set_annotation(xdiff_core::resource::ANNOTATION_COMPOSITION_RESOURCE_NAME, "stale");

        let live_self = Resource::from_yaml("apiVersion: example.org/v1alpha1\nkind: XDatabase\nmetadata:\n  name: my-db\n").unwrap();
        let tree = OwnershipRelation {
            root: live_self.clone(),
            children: vec![OwnershipRelation::leaf(stale)],
        };

        let clients = FakeClusterClients::new()
            .with_composition(composition())
            .with_revision(CompositionRevisionFixture::revision("my-comp", "rev-1", 1))
            .with_resource(live_self)
            .with_owner_tree(
                Resource::from_yaml("apiVersion: example.org/v1alpha1\nkind: XDatabase\nmetadata:\n  name: my-db\n").unwrap(),
                tree,
            );

        let report = processor(clients).process(vec![xr()]).await;
        assert!(report.diffs.iter().any(|d| d.name == "stale-child" && d.change_type == ChangeType::Removed));
    }

    #[tokio::test]
    async fn disagreeing_duplicate_keys_raise_internal_inconsistency() {
        let clients = processor_inconsistency_clients();
        let first = Xr::new(
            Resource::from_yaml(
                "apiVersion: example.org/v1alpha1\nkind: XDatabase\nmetadata:\n  name: db-a\nspec:\n  compositionRef:\n    name: my-comp\n",
            )
            .unwrap(),
        );
        let second = first.clone();
        let counter = Arc::new(AtomicUsize::new(0));

        struct InconsistentRenderer {
            counter: Arc<AtomicUsize>,
        }

        #[async_trait]
        impl Renderer for InconsistentRenderer {
            async fn render(&self, request: RenderRequest) -> std::result::Result<xdiff_core::RenderResult, String> {
                let call = self.counter.fetch_add(1, Ordering::SeqCst);
                let mut composed = indexmap::IndexMap::new();
                let value = if call == 0 { "first" } else { "second" };
                composed.insert(
                    "shared".to_string(),
                    Resource::from_yaml(&format!(
                        "apiVersion: v1\nkind: ConfigMap\nmetadata:\n  name: shared-config\ndata:\n  value: {value}\n"
                    ))
                    .unwrap(),
                );
                Ok(xdiff_core::RenderResult {
                    composite_resource: request.composite_resource.resource().clone(),
                    composed_resources: composed,
                    results: Vec::new(),
                    required_resources: Vec::new(),
                })
            }
        }

        let clients = Arc::new(clients);
        let driver = Arc::new(RenderDriver::new(
            Arc::new(InconsistentRenderer { counter: counter.clone() }),
            GlobalRenderLock::new(),
            clients.clone(),
        ));
        let config = ProcessorConfig { parallelism: 1, ..ProcessorConfig::default() };
        let processor = Processor::new(clients, driver, config);
        let report = processor.process(vec![first, second]).await;
        assert!(report.tool_errors.iter().any(|e| matches!(e, PipelineError::InternalInconsistency { .. })));
    }

    fn processor_inconsistency_clients() -> FakeClusterClients {
        FakeClusterClients::new()
            .with_composition(Composition::new(
                Resource::from_yaml(
                    "apiVersion: apiextensions.crossplane.io/v1\nkind: Composition\nmetadata:\n  name: my-comp\nspec:\n  compositeTypeRef:\n    kind: XDatabase\n",
                )
                .unwrap(),
            ))
            .with_revision(CompositionRevisionFixture::revision("my-comp", "rev-1", 1))
    }

    struct CompositionRevisionFixture;
    impl CompositionRevisionFixture {
        fn revision(composition_name: &str, revision_name: &str, number: i64) -> xdiff_core::CompositionRevision {
            xdiff_core::CompositionRevision::new(
                Resource::from_yaml(&format!(
                    "apiVersion: apiextensions.crossplane.io/v1\nkind: CompositionRevision\nmetadata:\n  name: {revision_name}\n  labels:\n    crossplane.io/composition-name: {composition_name}\nspec:\n  revision: {number}\n  compositeTypeRef:\n    kind: XDatabase\n"
                ))
                .unwrap(),
            )
        }
    }
}
