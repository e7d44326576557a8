//! The Requirements Provider (§4.3): discovers and fetches the extra
//! inputs a Composition's function pipeline needs beyond the XR itself —
//! extra resources, EnvironmentConfigs, and per-function credentials.
//!
//! Exposes a single `gather` call; the fixed-point loop that re-renders
//! until the required set stabilizes lives in [`crate::processor`], since
//! driving that loop needs the Render Driver this crate doesn't own.

use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

use base64::Engine;

use xdiff_core::{Composition, EnvironmentConfig, Function, FunctionCredentials, Gvk, RequiredResourceRef, Resource};

use crate::clients::Clients;
use crate::error::Result;

const SECRET_DATA_KEY: &str = "data";

fn secret_gvk() -> Gvk {
    Gvk::new("", "v1", "Secret")
}

/// The inputs one `gather` call resolves, ready to drop onto a
/// [`xdiff_core::RenderRequest`].
#[derive(Debug, Clone, Default)]
pub struct GatheredInputs {
    pub extra_resources: Vec<Resource>,
    pub environment_configs: Vec<EnvironmentConfig>,
    pub function_credentials: Vec<FunctionCredentials>,
}

/// Fetches a Composition's extra inputs, caching its Function pipeline
/// lookups by composition name for the life of the provider (§4.3
/// Caching: "no TTL and is invalidated only by process exit").
pub struct RequirementsProvider<C: Clients> {
    clients: std::sync::Arc<C>,
    function_cache: RwLock<HashMap<String, Vec<Function>>>,
    credential_namespace_overrides: HashMap<String, String>,
}

impl<C: Clients> RequirementsProvider<C> {
    pub fn new(clients: std::sync::Arc<C>) -> Self {
        Self {
            clients,
            function_cache: RwLock::new(HashMap::new()),
            credential_namespace_overrides: HashMap::new(),
        }
    }

    /// Override which namespace a named credential Secret is fetched from,
    /// keyed by `secretRef.name` (the `--function-credentials` file of the
    /// CLI's local-testing mode). Lets a run substitute a locally-available
    /// Secret for one the Composition's pipeline points at in a namespace
    /// this cluster doesn't have.
    pub fn with_credential_namespace_overrides(mut self, overrides: HashMap<String, String>) -> Self {
        self.credential_namespace_overrides = overrides;
        self
    }

    /// The Function pipeline for a Composition, served from the cache on
    /// repeat lookups. Exposed so the processor can build one render
    /// request's `functions` field from the same cached lookup `gather`
    /// uses internally for credentials.
    pub async fn functions(&self, composition: &Composition) -> Result<Vec<Function>> {
        let Some(name) = composition.name() else {
            return Ok(composition.pipeline());
        };
        if let Some(cached) = self.function_cache.read().unwrap().get(name) {
            return Ok(cached.clone());
        }
        let functions = self.clients.get_functions_from_pipeline(composition).await?;
        self.function_cache
            .write()
            .unwrap()
            .insert(name.to_string(), functions.clone());
        Ok(functions)
    }

    /// Gather a Composition's environment configs and function credentials
    /// (available before any render happens), plus the extra resources the
    /// caller's prior render pass surfaced as required.
    pub async fn gather(&self, composition: &Composition, required: &[RequiredResourceRef]) -> Result<GatheredInputs> {
        let environment_configs = self.environment_configs(composition).await?;
        let function_credentials = self.function_credentials(composition).await?;
        let extra_resources = self.extra_resources(required).await?;
        Ok(GatheredInputs {
            extra_resources,
            environment_configs,
            function_credentials,
        })
    }

    async fn environment_configs(&self, composition: &Composition) -> Result<Vec<EnvironmentConfig>> {
        let mut configs = Vec::new();
        for name in composition.environment_refs() {
            if let Some(config) = self.clients.get_environment_config(&name).await? {
                configs.push(config);
            }
        }
        Ok(configs)
    }

    async fn function_credentials(&self, composition: &Composition) -> Result<Vec<FunctionCredentials>> {
        let mut credentials = Vec::new();
        for function in self.functions(composition).await? {
            for source in &function.credentials {
                let namespace = self
                    .credential_namespace_overrides
                    .get(&source.secret_name)
                    .unwrap_or(&source.secret_namespace);
                let secret = self.clients.get(&secret_gvk(), Some(namespace), &source.secret_name).await?;
                let Some(secret) = secret else { continue };
                credentials.push(FunctionCredentials {
                    name: source.name.clone(),
                    data: decode_secret_data(&secret),
                });
            }
        }
        Ok(credentials)
    }

    /// Resolve one required-resource reference per §4.3/§4.1: match by name
    /// when given, else by label selector; both forms may be cross-namespace.
    async fn extra_resources(&self, required: &[RequiredResourceRef]) -> Result<Vec<Resource>> {
        let mut resources = Vec::new();
        for requirement in required {
            let gvk = Gvk::from_api_version_kind(&requirement.api_version, &requirement.kind);
            match &requirement.match_name {
                Some(name) => {
                    if let Some(resource) = self.clients.get(&gvk, None, name).await? {
                        resources.push(resource);
                    }
                }
                None => {
                    let selector = format_match_labels(&requirement.match_labels);
                    let matches = self.clients.get_by_label_selector(&gvk, None, &selector).await?;
                    resources.extend(matches);
                }
            }
        }
        Ok(resources)
    }
}

fn format_match_labels(labels: &BTreeMap<String, String>) -> String {
    labels.iter().map(|(k, v)| format!("{k}={v}")).collect::<Vec<_>>().join(",")
}

fn decode_secret_data(secret: &Resource) -> BTreeMap<String, Vec<u8>> {
    let mut data = BTreeMap::new();
    if let Some(entries) = secret.as_value().get(SECRET_DATA_KEY).and_then(|v| v.as_object()) {
        for (key, value) in entries {
            if let Some(encoded) = value.as_str() {
                if let Ok(decoded) = base64::engine::general_purpose::STANDARD.decode(encoded) {
                    data.insert(key.clone(), decoded);
                }
            }
        }
    }
    data
}
