//! The Cluster Clients capability bundle (§4.1): a product of narrow,
//! independently fakeable interfaces, one per capability, in the spirit of
//! the teacher's `StorageDriver` trait.

use crate::error::Result;
use async_trait::async_trait;
use xdiff_core::{
    Claim, Composition, CompositionRevision, EnvironmentConfig, Function, Gvk, OwnershipRelation, Resource, Xr, Xrd,
};

/// CRD document, opaque to callers beyond its embedded OpenAPI schema.
pub type Crd = Resource;

/// Converts between typed and unstructured representations for the small
/// fixed set of Crossplane types the core manipulates directly (§4.1 Type
/// capability). Synchronous and side-effect free — it never touches the
/// cluster — but kept in the capability bundle since every other capability
/// needs it at its boundary.
pub trait TypeCapability: Send + Sync {
    fn as_xr(&self, resource: Resource) -> Xr {
        Xr::new(resource)
    }

    fn as_claim(&self, resource: Resource) -> Claim {
        Claim::new(resource)
    }

    fn as_xrd(&self, resource: Resource) -> Xrd {
        Xrd::new(resource)
    }

    fn as_composition(&self, resource: Resource) -> Composition {
        Composition::new(resource)
    }

    fn as_composition_revision(&self, resource: Resource) -> CompositionRevision {
        CompositionRevision::new(resource)
    }

    fn as_environment_config(&self, resource: Resource) -> EnvironmentConfig {
        EnvironmentConfig::new(resource)
    }
}

/// `Get`/`GetByLabelSelector`/`GetAllByLabels`/`DryRunApply` over arbitrary
/// resource kinds (§4.1 Resource capability).
#[async_trait]
pub trait ResourceCapability: Send + Sync {
    async fn get(&self, gvk: &Gvk, namespace: Option<&str>, name: &str) -> Result<Option<Resource>>;

    async fn get_by_label_selector(
        &self,
        gvk: &Gvk,
        namespace: Option<&str>,
        selector: &str,
    ) -> Result<Vec<Resource>>;

    /// Parallel fan-out across several `(gvk, selector)` pairs; a partial
    /// failure on any request is fatal for the whole call (§4.1).
    async fn get_all_by_labels(&self, queries: &[(Gvk, Option<String>, String)]) -> Result<Vec<Resource>>;

    /// Server-side apply dry-run under `fieldManager`, `force=true`,
    /// `dryRun=All`; returns what the server would store (§4.1, §4.6).
    async fn dry_run_apply(&self, resource: &Resource, field_manager: &str) -> Result<Resource>;
}

/// CRD schema lookups and scope queries (§4.1 Schema capability).
#[async_trait]
pub trait SchemaCapability: Send + Sync {
    async fn get_crd(&self, gvk: &Gvk) -> Result<Option<Crd>>;
    async fn is_namespaced(&self, gvk: &Gvk) -> Result<bool>;
    /// Built-in kinds (core API, apps/v1, ...) don't carry a CRD.
    fn requires_crd(&self, gvk: &Gvk) -> bool;
}

/// `ListXRDs`/`GetXRDForXR`/`ApplyDefaults` (§4.1 Definition capability).
#[async_trait]
pub trait DefinitionCapability: Send + Sync {
    async fn list_xrds(&self) -> Result<Vec<Xrd>>;
    async fn get_xrd_for_xr(&self, gvk: &Gvk) -> Result<Option<Xrd>>;
}

/// Composition lookup and the selection rules of §4.2.
#[async_trait]
pub trait CompositionCapability: Send + Sync {
    async fn get_composition(&self, name: &str) -> Result<Option<Composition>>;
    async fn list_compositions(&self) -> Result<Vec<Composition>>;
}

/// `ListRevisions`/`GetRevision`/`LatestRevision` (§4.1 Revision capability).
#[async_trait]
pub trait RevisionCapability: Send + Sync {
    async fn list_revisions(&self, composition_name: &str) -> Result<Vec<CompositionRevision>>;
    async fn get_revision(&self, composition_name: &str, revision_name: &str) -> Result<Option<CompositionRevision>>;

    /// The revision with the highest `spec.revision` number (§3: "the
    /// current revision ... is the highest revision number").
    async fn latest_revision(&self, composition_name: &str) -> Result<Option<CompositionRevision>> {
        let mut revisions = self.list_revisions(composition_name).await?;
        revisions.sort_by_key(CompositionRevision::revision_number);
        Ok(revisions.into_iter().next_back())
    }
}

/// EnvironmentConfig lookup; an empty set is legal (§4.1).
#[async_trait]
pub trait EnvironmentCapability: Send + Sync {
    async fn get_environment_config(&self, name: &str) -> Result<Option<EnvironmentConfig>>;
}

/// Fetches the Function pipeline from a materialized Composition (§4.1).
/// Kept as its own capability, not a free function, so a long-lived
/// processor run can cache the result per composition name (§4.3).
#[async_trait]
pub trait FunctionCapability: Send + Sync {
    async fn get_functions_from_pipeline(&self, composition: &Composition) -> Result<Vec<Function>>;
}

/// Walks owner references to enumerate a live resource's owned children
/// (§4.1, bounded by server discovery — unknown GVKs are skipped, §9).
#[async_trait]
pub trait ResourceTreeCapability: Send + Sync {
    async fn get_owned_children(&self, root: &Resource) -> Result<OwnershipRelation>;
}
