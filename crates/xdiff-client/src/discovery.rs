//! GVK resolution against the API server, lazily populated at most once
//! per process (§4.1, §5 "lazy client init").

use kube::core::GroupVersionKind;
use kube::discovery::{ApiCapabilities, ApiResource, Discovery, Scope};
use tokio::sync::OnceCell;
use xdiff_core::Gvk;

use crate::error::{ClientError, Result};

fn to_gvk(gvk: &Gvk) -> GroupVersionKind {
    GroupVersionKind {
        group: gvk.group.clone(),
        version: gvk.version.clone(),
        kind: gvk.kind.clone(),
    }
}

/// Wraps `kube::discovery::Discovery`, building it at most once no matter
/// how many capabilities race to resolve a GVK concurrently; subsequent
/// callers observe the already-built table without blocking on a fresh
/// discovery run.
pub struct DiscoveryCache {
    client: kube::Client,
    discovery: OnceCell<Discovery>,
}

impl DiscoveryCache {
    pub fn new(client: kube::Client) -> Self {
        Self {
            client,
            discovery: OnceCell::new(),
        }
    }

    async fn discovery(&self) -> Result<&Discovery> {
        self.discovery
            .get_or_try_init(|| async {
                Discovery::new(self.client.clone())
                    .run()
                    .await
                    .map_err(ClientError::Api)
            })
            .await
    }

    pub async fn resolve(&self, gvk: &Gvk) -> Result<Option<(ApiResource, ApiCapabilities)>> {
        let discovery = self.discovery().await?;
        Ok(discovery.resolve_gvk(&to_gvk(gvk)))
    }

    pub async fn is_namespaced(&self, gvk: &Gvk) -> Result<bool> {
        match self.resolve(gvk).await? {
            Some((_, caps)) => Ok(caps.scope == Scope::Namespaced),
            None => Ok(true),
        }
    }

    /// GVKs known to the server, used to bound the owner-ref walk (§9: "only
    /// GVKs the server advertises are traversed").
    pub async fn known_gvks(&self) -> Result<Vec<Gvk>> {
        let discovery = self.discovery().await?;
        Ok(discovery
            .groups()
            .flat_map(|g| g.recommended_resources())
            .map(|(api_resource, _)| Gvk::new(api_resource.group, api_resource.version, api_resource.kind))
            .collect())
    }
}
