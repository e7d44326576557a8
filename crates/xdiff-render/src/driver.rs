//! The Render Driver (§4.4): wraps an injected render function, serializes
//! every call through the global render lock, and performs the
//! pre/post-processing the renderer itself does not (XRD defaults,
//! auto-namespace propagation, composite labels/annotations).

use async_trait::async_trait;
use std::sync::Arc;

use xdiff_client::DefinitionCapability;
use xdiff_core::render::RenderRequest;
use xdiff_core::{RenderResult, Resource};
use xdiff_core::resource::{ANNOTATION_COMPOSITION_RESOURCE_NAME, LABEL_COMPOSITE};

use crate::error::{RenderError, Result};
use crate::lock::GlobalRenderLock;

/// The render contract injected from outside the core (§6.1). Real
/// implementations may shell out to function runtimes; the driver treats
/// this as a black box.
#[async_trait]
pub trait Renderer: Send + Sync {
    async fn render(&self, request: RenderRequest) -> std::result::Result<RenderResult, String>;
}

/// Drives one render call: applies XRD defaults, acquires the global lock,
/// invokes the injected `Renderer`, then normalizes its output.
pub struct RenderDriver<D: DefinitionCapability> {
    renderer: Arc<dyn Renderer>,
    lock: GlobalRenderLock,
    definitions: Arc<D>,
}

impl<D: DefinitionCapability> RenderDriver<D> {
    pub fn new(renderer: Arc<dyn Renderer>, lock: GlobalRenderLock, definitions: Arc<D>) -> Self {
        Self {
            renderer,
            lock,
            definitions,
        }
    }

    /// Apply XRD-declared defaults to the XR's spec before it's sent to the
    /// renderer (§4.4, §4.1 `ApplyDefaults`: "Defaults apply only where the
    /// XR leaves a declared field absent").
    pub async fn apply_xrd_defaults(&self, mut request: RenderRequest) -> Result<RenderRequest> {
        let gvk = request.composite_resource.resource().gvk();
        if let Some(xrd) = self.definitions.get_xrd_for_xr(&gvk).await? {
            let resource = request.composite_resource.resource().clone();
            let mut value = resource.into_value();
            let version = gvk.version.clone();
            if let Some(spec) = value.get_mut("spec") {
                xrd.apply_defaults(spec, &version);
            } else {
                let mut spec = serde_json::Value::Object(Default::default());
                xrd.apply_defaults(&mut spec, &version);
                value["spec"] = spec;
            }
            let defaulted = Resource::from_value(value)?;
            request.composite_resource = xdiff_core::Xr::new(defaulted);
        }
        Ok(request)
    }

    /// Render under the global lock, then normalize composed resources
    /// (§4.4): propagate the XR's namespace to any namespaced composed
    /// resource lacking one, and stamp the standard composite
    /// labels/annotations the matcher relies on (§3 invariant).
    pub async fn render(&self, request: RenderRequest) -> Result<RenderResult> {
        let request = self.apply_xrd_defaults(request).await?;
        let owner_name = request
            .composite_resource
            .name()
            .map(str::to_string)
            .unwrap_or_default();
        let owner_namespace = request.composite_resource.resource().namespace().map(str::to_string);

        let _guard = self.lock.acquire().await;
        let mut result = self
            .renderer
            .render(request)
            .await
            .map_err(RenderError::RenderFailure)?;
        drop(_guard);

        for (template_key, resource) in result.composed_resources.iter_mut() {
            if let Some(ns) = &owner_namespace {
                if resource.namespace().is_none() {
                    resource.set_namespace(ns);
                }
            }
            resource.set_label(LABEL_COMPOSITE, &owner_name);
            resource.set_annotation(ANNOTATION_COMPOSITION_RESOURCE_NAME, template_key);
        }

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use xdiff_client::FakeClusterClients;
    use xdiff_core::{Composition, RenderContext, Xr, Xrd};

    struct EchoRenderer;

    #[async_trait]
    impl Renderer for EchoRenderer {
        async fn render(&self, request: RenderRequest) -> std::result::Result<RenderResult, String> {
            let mut composed = indexmap::IndexMap::new();
            composed.insert(
                "config".to_string(),
                Resource::from_yaml("apiVersion: v1\nkind: ConfigMap\nmetadata:\n  name: cfg\n").unwrap(),
            );
            Ok(RenderResult {
                composite_resource: request.composite_resource.resource().clone(),
                composed_resources: composed,
                results: Vec::new(),
                required_resources: Vec::new(),
            })
        }
    }

    fn xr_request() -> RenderRequest {
        let xr = Xr::new(
            Resource::from_yaml(
                "apiVersion: example.org/v1alpha1\nkind: XDatabase\nmetadata:\n  name: test-resource\n  namespace: team-a\nspec: {}\n",
            )
            .unwrap(),
        );
        let composition = Composition::new(
            Resource::from_yaml(
                "apiVersion: apiextensions.crossplane.io/v1\nkind: Composition\nmetadata:\n  name: c\nspec:\n  compositeTypeRef:\n    kind: XDatabase\n",
            )
            .unwrap(),
        );
        RenderRequest {
            composite_resource: xr,
            composition,
            functions: Vec::new(),
            observed_resources: Vec::new(),
            extra_resources: Vec::new(),
            environment_configs: Vec::new(),
            function_credentials: Vec::new(),
            context: RenderContext::default(),
        }
    }

    #[tokio::test]
    async fn stamps_composite_labels_and_propagates_namespace() {
        let definitions = Arc::new(FakeClusterClients::new());
        let driver = RenderDriver::new(Arc::new(EchoRenderer), GlobalRenderLock::new(), definitions);
        let result = driver.render(xr_request()).await.unwrap();
        let composed = &result.composed_resources["config"];
        assert_eq!(composed.namespace(), Some("team-a"));
        assert_eq!(composed.label(LABEL_COMPOSITE).as_deref(), Some("test-resource"));
        assert_eq!(
            composed.annotation(ANNOTATION_COMPOSITION_RESOURCE_NAME).as_deref(),
            Some("config")
        );
    }

    #[tokio::test]
    async fn applies_xrd_defaults_before_render() {
        let xrd_doc = r#"
apiVersion: apiextensions.crossplane.io/v1
kind: CompositeResourceDefinition
metadata:
  name: xdatabases.example.org
spec:
  group: example.org
  names:
    kind: XDatabase
  versions:
    - name: v1alpha1
      served: true
      schema:
        openAPIV3Schema:
          properties:
            spec:
              properties:
                size:
                  type: string
                  default: small
"#;
        let xrd = Xrd::new(Resource::from_yaml(xrd_doc).unwrap());
        let definitions = Arc::new(FakeClusterClients::new().with_xrd(xrd));
        let driver = RenderDriver::new(Arc::new(EchoRenderer), GlobalRenderLock::new(), definitions);
        let request = driver.apply_xrd_defaults(xr_request()).await.unwrap();
        let spec = request.composite_resource.resource().as_value().get("spec").unwrap();
        assert_eq!(spec.get("size").unwrap(), "small");
    }
}
