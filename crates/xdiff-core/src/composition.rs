//! Composition, CompositionRevision, Function and EnvironmentConfig (§3).

use crate::resource::Resource;
use serde_json::Value as JsonValue;

/// A named reference to a runnable composition function. The core never
/// interprets a function's body — only the renderer does (§6.1) — so this
/// carries just enough to drive the pipeline and fetch credentials.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Function {
    pub step: String,
    pub function_ref: String,
    pub credentials: Vec<FunctionCredentialSource>,
}

/// One `credentials` entry under a pipeline step, naming a Secret the
/// Requirements Provider fetches and passes through to the renderer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionCredentialSource {
    pub name: String,
    pub secret_namespace: String,
    pub secret_name: String,
}

/// A named Composition template pinning a Function pipeline.
#[derive(Debug, Clone)]
pub struct Composition {
    resource: Resource,
}

impl Composition {
    pub fn new(resource: Resource) -> Self {
        Self { resource }
    }

    pub fn resource(&self) -> &Resource {
        &self.resource
    }

    pub fn name(&self) -> Option<&str> {
        self.resource.name()
    }

    pub fn composite_type_kind(&self) -> Option<&str> {
        self.resource
            .as_value()
            .get("spec")?
            .get("compositeTypeRef")?
            .get("kind")?
            .as_str()
    }

    /// The function pipeline, in execution order.
    pub fn pipeline(&self) -> Vec<Function> {
        parse_pipeline(self.resource.as_value().get("spec"))
    }

    /// Environment references this Composition's pipeline may consult.
    pub fn environment_refs(&self) -> Vec<String> {
        self.resource
            .as_value()
            .get("spec")
            .and_then(|s| s.get("environment"))
            .and_then(|e| e.get("environmentConfigs"))
            .and_then(JsonValue::as_array)
            .map(|refs| {
                refs.iter()
                    .filter_map(|r| r.get("name").and_then(JsonValue::as_str))
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }
}

fn parse_pipeline(spec: Option<&JsonValue>) -> Vec<Function> {
    spec.and_then(|s| s.get("pipeline"))
        .and_then(JsonValue::as_array)
        .map(|steps| steps.iter().filter_map(parse_function_step).collect())
        .unwrap_or_default()
}

fn parse_function_step(step: &JsonValue) -> Option<Function> {
    let name = step.get("step")?.as_str()?.to_string();
    let function_ref = step.get("functionRef")?.get("name")?.as_str()?.to_string();
    let credentials = step
        .get("credentials")
        .and_then(JsonValue::as_array)
        .map(|creds| {
            creds
                .iter()
                .filter_map(|c| {
                    let name = c.get("name")?.as_str()?.to_string();
                    let secret_ref = c.get("secretRef")?;
                    let secret_namespace = secret_ref.get("namespace")?.as_str()?.to_string();
                    let secret_name = secret_ref.get("name")?.as_str()?.to_string();
                    Some(FunctionCredentialSource {
                        name,
                        secret_namespace,
                        secret_name,
                    })
                })
                .collect()
        })
        .unwrap_or_default();
    Some(Function {
        step: name,
        function_ref,
        credentials,
    })
}

/// An immutable snapshot of a Composition, identified by
/// `(composition-name, revision-hash)`. The "current" revision of a
/// Composition is the one with the highest `spec.revision` number.
#[derive(Debug, Clone)]
pub struct CompositionRevision {
    resource: Resource,
}

impl CompositionRevision {
    pub fn new(resource: Resource) -> Self {
        Self { resource }
    }

    pub fn resource(&self) -> &Resource {
        &self.resource
    }

    pub fn name(&self) -> Option<&str> {
        self.resource.name()
    }

    pub fn composition_name(&self) -> Option<&str> {
        self.resource
            .as_value()
            .get("metadata")?
            .get("labels")?
            .get("crossplane.io/composition-name")?
            .as_str()
    }

    /// The monotonically increasing revision number; the revision with the
    /// highest number is the "current" one (§3).
    pub fn revision_number(&self) -> i64 {
        self.resource
            .as_value()
            .get("spec")
            .and_then(|s| s.get("revision"))
            .and_then(JsonValue::as_i64)
            .unwrap_or(0)
    }

    /// Materialize this revision's embedded spec into a `Composition` shape
    /// compatible with the renderer (§4.2 step 3).
    pub fn as_composition(&self) -> Composition {
        let mut value = self.resource.as_value().clone();
        if let Some(spec) = value.get_mut("spec") {
            if let Some(obj) = spec.as_object_mut() {
                obj.remove("revision");
            }
        }
        Composition::new(Resource::from_value(value).expect("revision carries a valid Resource shape"))
    }

    pub fn pipeline(&self) -> Vec<Function> {
        parse_pipeline(self.resource.as_value().get("spec"))
    }
}

/// A named document the renderer may reference from a Composition's
/// `environment` block.
#[derive(Debug, Clone)]
pub struct EnvironmentConfig {
    resource: Resource,
}

impl EnvironmentConfig {
    pub fn new(resource: Resource) -> Self {
        Self { resource }
    }

    pub fn resource(&self) -> &Resource {
        &self.resource
    }

    pub fn name(&self) -> Option<&str> {
        self.resource.name()
    }
}
