//! `xdiff comp`: diff an updated Composition by re-rendering every live XR
//! that currently uses it (§1, §6.2), optionally also diffing XRs pinned to
//! a prior revision under `Manual` update policy.
//!
//! The update is previewed without ever touching the cluster: `comp` wraps
//! the live `ClusterClients` bundle in `CompositionOverride`, which
//! substitutes a synthetic "latest revision" materialized from the
//! candidate file for every lookup against the target Composition's name.

use std::sync::Arc;

use async_trait::async_trait;

use xdiff_client::{
    ClusterClients, CompositionCapability, Crd, DefinitionCapability, EnvironmentCapability, FunctionCapability,
    RequestBudget, ResourceCapability, ResourceTreeCapability, RevisionCapability, SchemaCapability, TypeCapability,
};
use xdiff_core::{
    Composition, CompositionRevision, CompositionUpdatePolicy, EnvironmentConfig, Function, Gvk, OwnershipRelation,
    Resource, Xr, Xrd,
};
use xdiff_pipeline::{resolve, Processor};
use xdiff_render::{GlobalRenderLock, RenderDriver};

use crate::cli::{CommonArgs, CompArgs};
use crate::error::{CliError, Result};
use crate::{bootstrap, commands, credentials, input};

pub async fn run(args: CompArgs, common: &CommonArgs) -> Result<i32> {
    let kube_client = bootstrap::client(common.context.as_deref()).await?;
    let clients = Arc::new(ClusterClients::new(
        kube_client,
        RequestBudget { qps: common.qps, burst: common.burst },
    ));

    let mut loaded = input::load_file(&args.composition)?;
    if loaded.len() != 1 {
        return Err(CliError::InvalidInput {
            message: format!(
                "{} must contain exactly one Composition document, found {}",
                args.composition.display(),
                loaded.len()
            ),
            help: None,
        });
    }
    let updated_composition = Composition::new(loaded.remove(0));
    let composition_name = updated_composition
        .name()
        .ok_or_else(|| CliError::InvalidInput {
            message: format!("{} has no metadata.name", args.composition.display()),
            help: None,
        })?
        .to_string();

    if clients.get_composition(&composition_name).await?.is_none() {
        return Err(CliError::CompositionNotFound(composition_name));
    }

    let revision = synthetic_revision(&updated_composition, &composition_name)?;
    let overridden = Arc::new(CompositionOverride {
        inner: clients.clone(),
        composition_name: composition_name.clone(),
        composition: updated_composition,
        revision,
    });

    let mut selected = Vec::new();
    for xr in affected_xrs(clients.as_ref(), args.namespace.as_deref()).await? {
        if !currently_uses(&xr, clients.as_ref(), &composition_name).await {
            continue;
        }
        let policy = xr.composition_selection().composition_update_policy;
        if policy == CompositionUpdatePolicy::Manual && !args.include_manual {
            continue;
        }
        selected.push(xr);
    }

    let credential_overrides = credentials::load(common.function_credentials.as_deref())?;
    let config = commands::processor_config(common, credential_overrides)?;
    let driver = Arc::new(RenderDriver::new(commands::renderer(common), GlobalRenderLock::new(), overridden.clone()));
    let processor = Processor::new(overridden, driver, config);

    let report = processor.process(selected).await;
    commands::print_report(&report, common)
}

/// Every live XR instance of any served XRD composite kind, scoped to
/// `namespace` when given. An empty label selector lists all instances
/// (§4.1 Resource capability).
async fn affected_xrs(clients: &ClusterClients, namespace: Option<&str>) -> Result<Vec<Xr>> {
    let mut xrs = Vec::new();
    for xrd in clients.list_xrds().await? {
        for gvk in xrd.composite_gvks() {
            for resource in clients.get_by_label_selector(&gvk, namespace, "").await? {
                xrs.push(Xr::new(resource));
            }
        }
    }
    Ok(xrs)
}

/// Whether `xr`'s currently-selected Composition is `composition_name`,
/// per the §4.2 selection rules run against the live, unmodified cluster
/// state — independent of which revision ends up effective. An XR whose
/// selection cannot be resolved at all (missing composition, ambiguous
/// selector, ...) simply isn't a candidate here; that failure belongs to
/// `xdiff xr`, not to this affected-set scan.
async fn currently_uses(xr: &Xr, clients: &ClusterClients, composition_name: &str) -> bool {
    match resolve(xr, clients).await {
        Ok(resolved) => resolved.composition.name() == Some(composition_name),
        Err(_) => false,
    }
}

fn synthetic_revision(composition: &Composition, composition_name: &str) -> Result<CompositionRevision> {
    let mut value = composition.resource().as_value().clone();
    value["kind"] = serde_json::Value::String("CompositionRevision".to_string());
    value["metadata"]["name"] = serde_json::Value::String(format!("{composition_name}-xdiff-preview"));
    value["metadata"]["labels"]["crossplane.io/composition-name"] =
        serde_json::Value::String(composition_name.to_string());
    value["spec"]["revision"] = serde_json::Value::from(i64::MAX);
    Ok(CompositionRevision::new(Resource::from_value(value)?))
}

/// Wraps the live `ClusterClients` bundle, substituting the candidate
/// Composition file (materialized as a synthetic highest-numbered revision)
/// for every lookup against `composition_name`.
struct CompositionOverride {
    inner: Arc<ClusterClients>,
    composition_name: String,
    composition: Composition,
    revision: CompositionRevision,
}

#[async_trait]
impl ResourceCapability for CompositionOverride {
    async fn get(&self, gvk: &Gvk, namespace: Option<&str>, name: &str) -> xdiff_client::Result<Option<Resource>> {
        self.inner.get(gvk, namespace, name).await
    }

    async fn get_by_label_selector(&self, gvk: &Gvk, namespace: Option<&str>, selector: &str) -> xdiff_client::Result<Vec<Resource>> {
        self.inner.get_by_label_selector(gvk, namespace, selector).await
    }

    async fn get_all_by_labels(&self, queries: &[(Gvk, Option<String>, String)]) -> xdiff_client::Result<Vec<Resource>> {
        self.inner.get_all_by_labels(queries).await
    }

    async fn dry_run_apply(&self, resource: &Resource, field_manager: &str) -> xdiff_client::Result<Resource> {
        self.inner.dry_run_apply(resource, field_manager).await
    }
}

#[async_trait]
impl SchemaCapability for CompositionOverride {
    async fn get_crd(&self, gvk: &Gvk) -> xdiff_client::Result<Option<Crd>> {
        self.inner.get_crd(gvk).await
    }

    async fn is_namespaced(&self, gvk: &Gvk) -> xdiff_client::Result<bool> {
        self.inner.is_namespaced(gvk).await
    }

    fn requires_crd(&self, gvk: &Gvk) -> bool {
        self.inner.requires_crd(gvk)
    }
}

impl TypeCapability for CompositionOverride {}

#[async_trait]
impl DefinitionCapability for CompositionOverride {
    async fn list_xrds(&self) -> xdiff_client::Result<Vec<Xrd>> {
        self.inner.list_xrds().await
    }

    async fn get_xrd_for_xr(&self, gvk: &Gvk) -> xdiff_client::Result<Option<Xrd>> {
        self.inner.get_xrd_for_xr(gvk).await
    }
}

#[async_trait]
impl CompositionCapability for CompositionOverride {
    async fn get_composition(&self, name: &str) -> xdiff_client::Result<Option<Composition>> {
        if name == self.composition_name {
            return Ok(Some(self.composition.clone()));
        }
        self.inner.get_composition(name).await
    }

    async fn list_compositions(&self) -> xdiff_client::Result<Vec<Composition>> {
        self.inner.list_compositions().await
    }
}

#[async_trait]
impl RevisionCapability for CompositionOverride {
    async fn list_revisions(&self, composition_name: &str) -> xdiff_client::Result<Vec<CompositionRevision>> {
        if composition_name == self.composition_name {
            return Ok(vec![self.revision.clone()]);
        }
        self.inner.list_revisions(composition_name).await
    }

    async fn get_revision(&self, composition_name: &str, revision_name: &str) -> xdiff_client::Result<Option<CompositionRevision>> {
        if composition_name == self.composition_name {
            return Ok(Some(self.revision.clone()));
        }
        self.inner.get_revision(composition_name, revision_name).await
    }
}

#[async_trait]
impl EnvironmentCapability for CompositionOverride {
    async fn get_environment_config(&self, name: &str) -> xdiff_client::Result<Option<EnvironmentConfig>> {
        self.inner.get_environment_config(name).await
    }
}

#[async_trait]
impl FunctionCapability for CompositionOverride {
    async fn get_functions_from_pipeline(&self, composition: &Composition) -> xdiff_client::Result<Vec<Function>> {
        self.inner.get_functions_from_pipeline(composition).await
    }
}

#[async_trait]
impl ResourceTreeCapability for CompositionOverride {
    async fn get_owned_children(&self, root: &Resource) -> xdiff_client::Result<OwnershipRelation> {
        self.inner.get_owned_children(root).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn composition_doc() -> Composition {
        Composition::new(
            Resource::from_yaml(
                "apiVersion: apiextensions.crossplane.io/v1\nkind: Composition\nmetadata:\n  name: xdatabases.example.org\nspec:\n  compositeTypeRef:\n    kind: XDatabase\n  pipeline:\n    - step: compose\n      functionRef:\n        name: function-patch-and-transform\n",
            )
            .unwrap(),
        )
    }

    #[test]
    fn synthetic_revision_carries_the_pipeline_and_outranks_every_real_revision() {
        let revision = synthetic_revision(&composition_doc(), "xdatabases.example.org").unwrap();
        assert_eq!(revision.composition_name(), Some("xdatabases.example.org"));
        assert_eq!(revision.revision_number(), i64::MAX);
        assert_eq!(revision.pipeline()[0].function_ref, "function-patch-and-transform");
    }

    #[test]
    fn synthetic_revision_materializes_back_into_an_equivalent_composition() {
        let revision = synthetic_revision(&composition_doc(), "xdatabases.example.org").unwrap();
        let composition = revision.as_composition();
        assert_eq!(composition.composite_type_kind(), Some("XDatabase"));
        assert_eq!(composition.pipeline().len(), 1);
    }
}
