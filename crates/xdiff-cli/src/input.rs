//! YAML input loading (§1 external collaborator) and Claim→XR resolution
//! (§3: "Resolving a Claim yields the backing XR").

use std::path::Path;

use walkdir::WalkDir;

use xdiff_client::{DefinitionCapability, ResourceCapability};
use xdiff_core::{Resource, Xr};
use xdiff_pipeline::Clients;

use crate::error::{CliError, Result};

/// Read every `.yaml`/`.yml` file under each given path (files are read
/// directly; directories are walked recursively), splitting `---`-separated
/// manifests into individual documents.
pub fn load_paths(paths: &[std::path::PathBuf]) -> Result<Vec<Resource>> {
    let mut resources = Vec::new();
    for path in paths {
        for file in yaml_files(path) {
            resources.extend(load_file(&file)?);
        }
    }
    Ok(resources)
}

pub fn load_file(path: &Path) -> Result<Vec<Resource>> {
    let contents = std::fs::read_to_string(path).map_err(|source| CliError::Io {
        path: path.display().to_string(),
        source,
    })?;
    Ok(Resource::parse_manifest(&contents)?)
}

fn yaml_files(path: &std::path::Path) -> Vec<std::path::PathBuf> {
    if path.is_file() {
        return vec![path.to_path_buf()];
    }
    WalkDir::new(path)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|p| matches!(p.extension().and_then(|e| e.to_str()), Some("yaml") | Some("yml")))
        .collect()
}

/// Classify a loaded document as an XR, resolving it to the backing XR if
/// it is actually a Claim.
pub async fn resolve_to_xr(resource: Resource, clients: &(impl Clients + ?Sized)) -> Result<Xr> {
    let gvk = resource.gvk();
    let xrds = clients.list_xrds().await?;

    if xrds.iter().any(|xrd| xrd.composite_gvks().contains(&gvk)) {
        return Ok(Xr::new(resource));
    }

    for xrd in &xrds {
        let matches_claim = xrd.claim_kind() == Some(gvk.kind.as_str()) && xrd.group() == Some(gvk.group.as_str());
        if !matches_claim {
            continue;
        }
        let claim = xdiff_core::Claim::new(resource.clone());
        let xr_name = claim.resource_ref_name().ok_or_else(|| CliError::InvalidInput {
            message: format!(
                "claim {}/{} has no spec.resourceRef.name (not yet bound to an XR)",
                gvk, resource.name().unwrap_or("(unnamed)")
            ),
            help: Some("apply the claim once so Crossplane binds it, then diff again".to_string()),
        })?;
        let Some(composite_gvk) = xrd.composite_gvks().into_iter().find(|g| g.version == gvk.version) else {
            continue;
        };
        let fetched = clients
            .get(&composite_gvk, None, xr_name)
            .await?
            .ok_or_else(|| CliError::InvalidInput {
                message: format!("claim {} references XR {xr_name} which does not exist", gvk),
                help: None,
            })?;
        return Ok(Xr::new(fetched));
    }

    Err(CliError::InvalidInput {
        message: format!("{gvk} is neither a known Composite Resource nor Claim kind"),
        help: Some("check that the matching CompositeResourceDefinition is installed".to_string()),
    })
}
