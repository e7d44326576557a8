//! The Resource Matcher (§4.5): locates the live counterpart of a desired
//! resource given nondeterministic naming and composition-revision-induced
//! API-version rewrites.

use std::collections::HashMap;
use std::sync::Mutex;

use xdiff_core::resource::{ANNOTATION_COMPOSITION_RESOURCE_NAME, LABEL_COMPOSITE};
use xdiff_core::{Gvk, Resource};

use crate::error::{DiffError, Result};

/// The outcome of matching one desired resource against the live set.
pub enum MatchOutcome {
    /// A unique live counterpart was found.
    Matched(Resource),
    /// No live counterpart exists; the resource is new. For a
    /// generated-name resource this carries the `<generateName>(generated)`
    /// placeholder used in output (§4.5 rule 2).
    Added { display_name: String },
}

/// Rule 1: the desired resource carries `metadata.name`. Candidates are
/// filtered to the same `(gvk, namespace)`; apiVersion is deliberately not
/// compared (§9: "do not compare apiVersion strings directly") so that a
/// composition-revision-induced API-version change still finds its live
/// counterpart through Kubernetes' own conversion.
pub fn match_by_name<'a>(
    desired: &Resource,
    namespace: Option<&str>,
    name: &str,
    live_candidates: &'a [Resource],
) -> Option<&'a Resource> {
    let gvk = desired.gvk();
    live_candidates
        .iter()
        .find(|live| live.gvk().kind == gvk.kind && live.gvk().group == gvk.group && live.namespace() == namespace && live.name() == Some(name))
}

/// Rule 2: the desired resource uses `generateName`. Candidates are
/// live resources carrying `labels[crossplane.io/composite] = owner_name`
/// and a matching `annotations[crossplane.io/composition-resource-name]`.
pub fn match_by_generate_name(
    owner_name: &str,
    template_key: &str,
    live_candidates: &[Resource],
) -> Result<Option<Resource>> {
    let matches: Vec<&Resource> = live_candidates
        .iter()
        .filter(|live| {
            live.label(LABEL_COMPOSITE).as_deref() == Some(owner_name)
                && live.annotation(ANNOTATION_COMPOSITION_RESOURCE_NAME).as_deref() == Some(template_key)
        })
        .collect();

    match matches.len() {
        0 => Ok(None),
        1 => Ok(Some(matches[0].clone())),
        n => Err(DiffError::AmbiguousMatch {
            gvk: live_candidates.first().map(Resource::gvk).unwrap_or_else(|| Gvk::new("", "", "")),
            namespace: live_candidates.first().and_then(Resource::namespace).map(str::to_string),
            candidate_count: n,
        }),
    }
}

/// Match a desired resource against the live set, applying both rules of
/// §4.5 in order.
pub fn match_resource(
    desired: &Resource,
    owner_name: &str,
    live_candidates: &[Resource],
) -> Result<MatchOutcome> {
    if let Some(name) = desired.name() {
        return Ok(match match_by_name(desired, desired.namespace(), name, live_candidates) {
            Some(live) => MatchOutcome::Matched(live.clone()),
            None => MatchOutcome::Added {
                display_name: name.to_string(),
            },
        });
    }

    let template_key = desired
        .annotation(ANNOTATION_COMPOSITION_RESOURCE_NAME)
        .unwrap_or_default();
    let generate_name = desired.generate_name().unwrap_or_default();

    match match_by_generate_name(owner_name, &template_key, live_candidates)? {
        Some(live) => Ok(MatchOutcome::Matched(live)),
        None => Ok(MatchOutcome::Added {
            display_name: format!("{generate_name}(generated)"),
        }),
    }
}

/// Stable synthetic identities for generated-name children across multiple
/// renders in one process (§4.5: "the matcher must use stable synthetic
/// identities for generated-name children so that intermediate re-renders
/// do not produce spurious delete+add pairs"). Keyed by `(owner, gvk,
/// namespace, template key)`, since that tuple is the one thing that stays
/// constant across re-renders of the same parent during fixed-point
/// iteration, even though the server-assigned name is not yet known.
#[derive(Default)]
pub struct StableIdentityRegistry {
    assigned: Mutex<HashMap<(String, Gvk, Option<String>, String), u64>>,
    next_id: Mutex<u64>,
}

impl StableIdentityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn synthetic_id(&self, owner_name: &str, gvk: &Gvk, namespace: Option<&str>, template_key: &str) -> u64 {
        let key = (owner_name.to_string(), gvk.clone(), namespace.map(str::to_string), template_key.to_string());
        let mut assigned = self.assigned.lock().unwrap();
        if let Some(id) = assigned.get(&key) {
            return *id;
        }
        let mut next_id = self.next_id.lock().unwrap();
        let id = *next_id;
        *next_id += 1;
        assigned.insert(key, id);
        id
    }
}
