//! The Composition Resolver (§4.2): given an XR, select the Composition and
//! the `CompositionRevision` to render it against, honoring the selection
//! rules and the `Automatic`/`Manual` update policy.

use xdiff_core::{Composition, CompositionRevision, CompositionUpdatePolicy, Xr};

use crate::clients::Clients;
use crate::error::{PipelineError, Result};

/// The outcome of one resolution: the materialized `Composition` (the
/// revision's embedded spec, per §4.2 step 3) paired with the revision it
/// came from, plus the XR's own literal `compositionRevisionRef` value.
///
/// The literal ref is kept separately from the effective revision so the
/// Diff Calculator can still surface a change to it even when `Automatic`
/// overrode it with the latest revision (§4.2 Edge, §9 Open Question:
/// resolved — always diff the XR's literal spec fields).
pub struct ResolvedComposition {
    pub composition: Composition,
    pub revision: CompositionRevision,
    pub literal_revision_ref: Option<String>,
}

/// Resolve `(Composition, CompositionRevision)` for one XR (§4.2).
pub async fn resolve(xr: &Xr, clients: &(impl Clients + ?Sized)) -> Result<ResolvedComposition> {
    let xr_name = xr.name().unwrap_or("(unnamed)").to_string();
    let selection = xr.composition_selection();

    let composition = select_composition(xr, &selection, clients, &xr_name).await?;
    let composition_name = composition
        .name()
        .ok_or_else(|| PipelineError::NoComposition { xr_name: xr_name.clone() })?
        .to_string();

    let literal_revision_ref = selection.composition_revision_ref.as_ref().map(|r| r.name.clone());

    let revision = select_revision(&selection, clients, &composition_name).await?;

    Ok(ResolvedComposition {
        composition: revision.as_composition(),
        revision,
        literal_revision_ref,
    })
}

async fn select_composition(
    xr: &Xr,
    selection: &xdiff_core::CompositionSelection,
    clients: &(impl Clients + ?Sized),
    xr_name: &str,
) -> Result<Composition> {
    if let Some(composition_ref) = &selection.composition_ref {
        return clients
            .get_composition(&composition_ref.name)
            .await?
            .ok_or_else(|| PipelineError::NoComposition { xr_name: xr_name.to_string() });
    }

    if let Some(selector) = &selection.composition_selector {
        if !selector.match_labels.is_empty() {
            let xr_kind = xr.resource().kind();
            let candidates: Vec<Composition> = clients
                .list_compositions()
                .await?
                .into_iter()
                .filter(|c| c.composite_type_kind() == Some(xr_kind))
                .filter(|c| {
                    let labels = c.resource().labels();
                    selector
                        .match_labels
                        .iter()
                        .all(|(k, v)| labels.get(k).map(String::as_str) == Some(v.as_str()))
                })
                .collect();
            return match candidates.len() {
                0 => Err(PipelineError::NoMatchingComposition { xr_name: xr_name.to_string() }),
                1 => Ok(candidates.into_iter().next().expect("checked len == 1")),
                n => Err(PipelineError::AmbiguousComposition {
                    xr_name: xr_name.to_string(),
                    candidate_count: n,
                }),
            };
        }
    }

    if let Some(xrd) = clients.get_xrd_for_xr(&xr.resource().gvk()).await? {
        if let Some(default_name) = xrd.default_composition_name() {
            return clients
                .get_composition(default_name)
                .await?
                .ok_or_else(|| PipelineError::NoComposition { xr_name: xr_name.to_string() });
        }
    }

    Err(PipelineError::NoComposition { xr_name: xr_name.to_string() })
}

async fn select_revision(
    selection: &xdiff_core::CompositionSelection,
    clients: &(impl Clients + ?Sized),
    composition_name: &str,
) -> Result<CompositionRevision> {
    match selection.composition_update_policy {
        // Automatic always uses the latest revision, even over a pinned ref
        // (§4.2 step 2, §9 Open Question).
        CompositionUpdatePolicy::Automatic => latest_revision(clients, composition_name).await,
        CompositionUpdatePolicy::Manual => match &selection.composition_revision_ref {
            Some(revision_ref) => clients
                .get_revision(composition_name, &revision_ref.name)
                .await?
                .ok_or_else(|| PipelineError::RevisionNotFound {
                    composition: composition_name.to_string(),
                    revision: revision_ref.name.clone(),
                }),
            // Net-new XRs under Manual have no pinned revision yet (§4.2 step 2).
            None => latest_revision(clients, composition_name).await,
        },
    }
}

async fn latest_revision(clients: &(impl Clients + ?Sized), composition_name: &str) -> Result<CompositionRevision> {
    clients
        .latest_revision(composition_name)
        .await?
        .ok_or_else(|| PipelineError::RevisionNotFound {
            composition: composition_name.to_string(),
            revision: "(latest)".to_string(),
        })
}
