//! In-memory fakes for the capability bundle, for use in pipeline tests
//! without a live cluster. Mirrors the teacher's `MockStorageDriver`.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;

use xdiff_core::{
    Composition, CompositionRevision, EnvironmentConfig, Function, Gvk, OwnershipRelation, Resource, Xrd,
};

use crate::capability::{
    Crd, CompositionCapability, DefinitionCapability, EnvironmentCapability, FunctionCapability,
    ResourceCapability, ResourceTreeCapability, RevisionCapability, SchemaCapability, TypeCapability,
};
use crate::error::Result;

type ResourceKey = (Gvk, Option<String>, String);

/// A builder-constructed fake implementing every capability trait in
/// `ClusterClients`'s place. Every method reads from plain in-memory maps
/// seeded up front; there is no discovery, no network I/O, no lazy init to
/// race.
#[derive(Clone, Default)]
pub struct FakeClusterClients {
    resources: Arc<RwLock<HashMap<ResourceKey, Resource>>>,
    crds: Arc<RwLock<HashMap<Gvk, Crd>>>,
    namespaced: Arc<RwLock<HashMap<Gvk, bool>>>,
    xrds: Arc<RwLock<Vec<Xrd>>>,
    compositions: Arc<RwLock<HashMap<String, Composition>>>,
    revisions: Arc<RwLock<HashMap<String, Vec<CompositionRevision>>>>,
    environment_configs: Arc<RwLock<HashMap<String, EnvironmentConfig>>>,
    owner_trees: Arc<RwLock<HashMap<ResourceKey, OwnershipRelation>>>,
}

impl FakeClusterClients {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(resource: &Resource) -> ResourceKey {
        (
            resource.gvk(),
            resource.namespace().map(str::to_string),
            resource.name().unwrap_or_default().to_string(),
        )
    }

    pub fn with_resource(self, resource: Resource) -> Self {
        let key = Self::key(&resource);
        self.resources.write().unwrap().insert(key, resource);
        self
    }

    pub fn with_resources(self, resources: impl IntoIterator<Item = Resource>) -> Self {
        for resource in resources {
            self.resources.write().unwrap().insert(Self::key(&resource), resource);
        }
        self
    }

    pub fn with_crd(self, gvk: Gvk, crd: Crd) -> Self {
        self.crds.write().unwrap().insert(gvk, crd);
        self
    }

    pub fn with_namespaced(self, gvk: Gvk, namespaced: bool) -> Self {
        self.namespaced.write().unwrap().insert(gvk, namespaced);
        self
    }

    pub fn with_xrd(self, xrd: Xrd) -> Self {
        self.xrds.write().unwrap().push(xrd);
        self
    }

    pub fn with_composition(self, composition: Composition) -> Self {
        if let Some(name) = composition.name() {
            self.compositions.write().unwrap().insert(name.to_string(), composition);
        }
        self
    }

    pub fn with_revision(self, revision: CompositionRevision) -> Self {
        if let Some(composition_name) = revision.composition_name() {
            self.revisions
                .write()
                .unwrap()
                .entry(composition_name.to_string())
                .or_default()
                .push(revision);
        }
        self
    }

    pub fn with_environment_config(self, config: EnvironmentConfig) -> Self {
        if let Some(name) = config.name() {
            self.environment_configs.write().unwrap().insert(name.to_string(), config);
        }
        self
    }

    pub fn with_owner_tree(self, root: Resource, tree: OwnershipRelation) -> Self {
        let key = Self::key(&root);
        self.owner_trees.write().unwrap().insert(key, tree);
        self
    }

    pub fn apply_calls(&self) -> usize {
        self.resources.read().unwrap().len()
    }
}

#[async_trait]
impl ResourceCapability for FakeClusterClients {
    async fn get(&self, gvk: &Gvk, namespace: Option<&str>, name: &str) -> Result<Option<Resource>> {
        let key = (gvk.clone(), namespace.map(str::to_string), name.to_string());
        Ok(self.resources.read().unwrap().get(&key).cloned())
    }

    async fn get_by_label_selector(&self, gvk: &Gvk, namespace: Option<&str>, selector: &str) -> Result<Vec<Resource>> {
        let wanted = parse_selector(selector);
        Ok(self
            .resources
            .read()
            .unwrap()
            .values()
            .filter(|r| &r.gvk() == gvk && r.namespace() == namespace)
            .filter(|r| wanted.iter().all(|(k, v)| r.label(k).as_deref() == Some(v.as_str())))
            .cloned()
            .collect())
    }

    async fn get_all_by_labels(&self, queries: &[(Gvk, Option<String>, String)]) -> Result<Vec<Resource>> {
        let mut out = Vec::new();
        for (gvk, namespace, selector) in queries {
            out.extend(self.get_by_label_selector(gvk, namespace.as_deref(), selector).await?);
        }
        Ok(out)
    }

    async fn dry_run_apply(&self, resource: &Resource, _field_manager: &str) -> Result<Resource> {
        let key = Self::key(resource);
        let mut merged = self
            .resources
            .read()
            .unwrap()
            .get(&key)
            .cloned()
            .unwrap_or_else(|| resource.clone());
        merge_json(merged.as_value_mut(), resource.as_value());
        Ok(merged)
    }
}

fn parse_selector(selector: &str) -> Vec<(String, String)> {
    selector
        .split(',')
        .filter(|s| !s.is_empty())
        .filter_map(|pair| pair.split_once('='))
        .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
        .collect()
}

fn merge_json(base: &mut serde_json::Value, overlay: &serde_json::Value) {
    match (base, overlay) {
        (serde_json::Value::Object(base_map), serde_json::Value::Object(overlay_map)) => {
            for (k, v) in overlay_map {
                merge_json(base_map.entry(k.clone()).or_insert(serde_json::Value::Null), v);
            }
        }
        (base, overlay) => *base = overlay.clone(),
    }
}

#[async_trait]
impl SchemaCapability for FakeClusterClients {
    async fn get_crd(&self, gvk: &Gvk) -> Result<Option<Crd>> {
        Ok(self.crds.read().unwrap().get(gvk).cloned())
    }

    async fn is_namespaced(&self, gvk: &Gvk) -> Result<bool> {
        Ok(self.namespaced.read().unwrap().get(gvk).copied().unwrap_or(true))
    }

    fn requires_crd(&self, gvk: &Gvk) -> bool {
        !gvk.group.is_empty() && gvk.group != "apps"
    }
}

impl TypeCapability for FakeClusterClients {}

#[async_trait]
impl DefinitionCapability for FakeClusterClients {
    async fn list_xrds(&self) -> Result<Vec<Xrd>> {
        Ok(self.xrds.read().unwrap().clone())
    }

    async fn get_xrd_for_xr(&self, gvk: &Gvk) -> Result<Option<Xrd>> {
        Ok(self
            .xrds
            .read()
            .unwrap()
            .iter()
            .find(|xrd| xrd.composite_gvks().contains(gvk))
            .cloned())
    }
}

#[async_trait]
impl CompositionCapability for FakeClusterClients {
    async fn get_composition(&self, name: &str) -> Result<Option<Composition>> {
        Ok(self.compositions.read().unwrap().get(name).cloned())
    }

    async fn list_compositions(&self) -> Result<Vec<Composition>> {
        Ok(self.compositions.read().unwrap().values().cloned().collect())
    }
}

#[async_trait]
impl RevisionCapability for FakeClusterClients {
    async fn list_revisions(&self, composition_name: &str) -> Result<Vec<CompositionRevision>> {
        Ok(self
            .revisions
            .read()
            .unwrap()
            .get(composition_name)
            .cloned()
            .unwrap_or_default())
    }

    async fn get_revision(&self, composition_name: &str, revision_name: &str) -> Result<Option<CompositionRevision>> {
        Ok(self
            .list_revisions(composition_name)
            .await?
            .into_iter()
            .find(|r| r.name() == Some(revision_name)))
    }
}

#[async_trait]
impl EnvironmentCapability for FakeClusterClients {
    async fn get_environment_config(&self, name: &str) -> Result<Option<EnvironmentConfig>> {
        Ok(self.environment_configs.read().unwrap().get(name).cloned())
    }
}

#[async_trait]
impl FunctionCapability for FakeClusterClients {
    async fn get_functions_from_pipeline(&self, composition: &Composition) -> Result<Vec<Function>> {
        Ok(composition.pipeline())
    }
}

#[async_trait]
impl ResourceTreeCapability for FakeClusterClients {
    async fn get_owned_children(&self, root: &Resource) -> Result<OwnershipRelation> {
        let key = Self::key(root);
        Ok(self
            .owner_trees
            .read()
            .unwrap()
            .get(&key)
            .cloned()
            .unwrap_or_else(|| OwnershipRelation::leaf(root.clone())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use xdiff_core::Resource;

    fn configmap(name: &str) -> Resource {
        Resource::from_yaml(&format!(
            "apiVersion: v1\nkind: ConfigMap\nmetadata:\n  name: {name}\n  namespace: default\n  labels:\n    tier: gold\n"
        ))
        .unwrap()
    }

    #[tokio::test]
    async fn get_returns_seeded_resource() {
        let fake = FakeClusterClients::new().with_resource(configmap("cm"));
        let gvk = Gvk::new("", "v1", "ConfigMap");
        let found = fake.get(&gvk, Some("default"), "cm").await.unwrap();
        assert!(found.is_some());
    }

    #[tokio::test]
    async fn label_selector_filters() {
        let fake = FakeClusterClients::new().with_resource(configmap("cm"));
        let gvk = Gvk::new("", "v1", "ConfigMap");
        let matches = fake
            .get_by_label_selector(&gvk, Some("default"), "tier=gold")
            .await
            .unwrap();
        assert_eq!(matches.len(), 1);
        let no_matches = fake
            .get_by_label_selector(&gvk, Some("default"), "tier=silver")
            .await
            .unwrap();
        assert!(no_matches.is_empty());
    }

    #[tokio::test]
    async fn dry_run_apply_merges_over_existing() {
        let fake = FakeClusterClients::new().with_resource(configmap("cm"));
        let mut patch = configmap("cm");
        patch.set_label("new-label", "value");
        let merged = fake.dry_run_apply(&patch, "crossplane-diff").await.unwrap();
        assert_eq!(merged.label("tier").as_deref(), Some("gold"));
        assert_eq!(merged.label("new-label").as_deref(), Some("value"));
    }
}
