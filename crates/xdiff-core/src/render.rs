//! The external render contract's input/output shapes (§6.1) and the
//! owner-reference tree used for removal detection (§3, §4.6).

use crate::composition::{Composition, EnvironmentConfig, Function};
use crate::resource::{OwnerReference, Resource};
use crate::xr::Xr;
use std::collections::BTreeMap;

/// Opaque per-function credential bytes, fetched by the Requirements
/// Provider from cluster Secrets and passed through to the renderer
/// untouched (§4.3).
#[derive(Debug, Clone)]
pub struct FunctionCredentials {
    pub name: String,
    pub data: BTreeMap<String, Vec<u8>>,
}

/// Ambient context passed to the renderer alongside the request proper;
/// opaque to the core.
#[derive(Debug, Clone, Default)]
pub struct RenderContext {
    pub fields: BTreeMap<String, String>,
}

/// The input to one call of the external renderer (§6.1).
#[derive(Debug, Clone)]
pub struct RenderRequest {
    pub composite_resource: Xr,
    pub composition: Composition,
    pub functions: Vec<Function>,
    pub observed_resources: Vec<Resource>,
    pub extra_resources: Vec<Resource>,
    pub environment_configs: Vec<EnvironmentConfig>,
    pub function_credentials: Vec<FunctionCredentials>,
    pub context: RenderContext,
}

/// A requirement for an extra resource the renderer surfaced as needed for
/// a subsequent render pass, driving the Requirements Provider's
/// fixed-point loop (§4.3).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct RequiredResourceRef {
    pub step: String,
    pub api_version: String,
    pub kind: String,
    pub match_name: Option<String>,
    pub match_labels: BTreeMap<String, String>,
}

/// A single named Function result, as returned verbatim by the renderer.
#[derive(Debug, Clone)]
pub struct FunctionResult {
    pub step: String,
    pub severity: String,
    pub message: String,
}

/// The output of one call of the external renderer (§6.1).
///
/// `composed_resources` is keyed by the pipeline's template key (the same
/// key Crossplane's function protocol uses), since the driver needs it to
/// stamp `annotations[crossplane.io/composition-resource-name]` on each
/// composed resource (§3 invariant, §4.4).
#[derive(Debug, Clone)]
pub struct RenderResult {
    pub composite_resource: Resource,
    pub composed_resources: indexmap::IndexMap<String, Resource>,
    pub results: Vec<FunctionResult>,
    pub required_resources: Vec<RequiredResourceRef>,
}

/// A tree rooted at an XR whose edges are Kubernetes owner references; used
/// to enumerate live children for removal detection (§3, §4.6).
#[derive(Debug, Clone)]
pub struct OwnershipRelation {
    pub root: Resource,
    pub children: Vec<OwnershipRelation>,
}

impl OwnershipRelation {
    pub fn leaf(root: Resource) -> Self {
        Self {
            root,
            children: Vec::new(),
        }
    }

    /// Flatten the tree into a pre-order sequence of every resource it
    /// contains, root first.
    pub fn flatten(&self) -> Vec<&Resource> {
        let mut out = vec![&self.root];
        for child in &self.children {
            out.extend(child.flatten());
        }
        out
    }

    /// True if `candidate` lists `owner`'s `(apiVersion, kind, name)` among
    /// its owner references.
    pub fn is_owned_by(candidate: &Resource, owner: &Resource) -> bool {
        let owner_name = match owner.name() {
            Some(n) => n,
            None => return false,
        };
        candidate.owner_references().iter().any(|r: &OwnerReference| {
            r.kind == owner.kind() && r.api_version == owner.api_version() && r.name == owner_name
        })
    }
}
