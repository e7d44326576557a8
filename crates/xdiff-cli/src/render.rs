//! `ProcessRenderer`: the concrete realization of the §6.1 render contract
//! used by this binary. The core treats rendering as an injected black box;
//! here it is a subprocess that reads one JSON `RenderRequest` on stdin and
//! writes one JSON `RenderResult` on stdout, letting the actual Crossplane
//! function-pipeline execution live entirely outside this crate (§1
//! Non-goal: "does not implement the function protocol itself").

use std::collections::BTreeMap;
use std::ffi::OsString;
use std::process::Stdio;

use async_trait::async_trait;
use base64::Engine;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use xdiff_core::render::{FunctionResult, RequiredResourceRef};
use xdiff_core::{Composition, FunctionCredentialSource, RenderRequest, RenderResult, Resource};
use xdiff_render::Renderer;

#[derive(Serialize)]
struct WireFunction<'a> {
    step: &'a str,
    function_ref: &'a str,
    credentials: &'a [FunctionCredentialSource],
}

#[derive(Serialize)]
struct WireCredentials<'a> {
    name: &'a str,
    data: BTreeMap<&'a str, String>,
}

#[derive(Serialize)]
struct WireRequest<'a> {
    composite_resource: &'a JsonValue,
    composition: &'a JsonValue,
    functions: Vec<WireFunction<'a>>,
    observed_resources: Vec<&'a JsonValue>,
    extra_resources: Vec<&'a JsonValue>,
    environment_configs: Vec<&'a JsonValue>,
    function_credentials: Vec<WireCredentials<'a>>,
    context: &'a BTreeMap<String, String>,
}

#[derive(Deserialize)]
struct WireResult {
    composite_resource: JsonValue,
    composed_resources: indexmap::IndexMap<String, JsonValue>,
    #[serde(default)]
    results: Vec<WireFunctionResult>,
    #[serde(default)]
    required_resources: Vec<WireRequiredResourceRef>,
}

#[derive(Deserialize)]
struct WireFunctionResult {
    step: String,
    severity: String,
    message: String,
}

#[derive(Deserialize)]
struct WireRequiredResourceRef {
    step: String,
    api_version: String,
    kind: String,
    #[serde(default)]
    match_name: Option<String>,
    #[serde(default)]
    match_labels: BTreeMap<String, String>,
}

fn to_wire(request: &RenderRequest) -> WireRequest<'_> {
    WireRequest {
        composite_resource: request.composite_resource.resource().as_value(),
        composition: request.composition.resource().as_value(),
        functions: request
            .functions
            .iter()
            .map(|f| WireFunction {
                step: &f.step,
                function_ref: &f.function_ref,
                credentials: &f.credentials,
            })
            .collect(),
        observed_resources: request.observed_resources.iter().map(Resource::as_value).collect(),
        extra_resources: request.extra_resources.iter().map(Resource::as_value).collect(),
        environment_configs: request
            .environment_configs
            .iter()
            .map(|e| e.resource().as_value())
            .collect(),
        function_credentials: request
            .function_credentials
            .iter()
            .map(|c| WireCredentials {
                name: &c.name,
                data: c
                    .data
                    .iter()
                    .map(|(k, v)| (k.as_str(), base64::engine::general_purpose::STANDARD.encode(v)))
                    .collect(),
            })
            .collect(),
        context: &request.context.fields,
    }
}

fn from_wire(composition: &Composition, wire: WireResult) -> Result<RenderResult, String> {
    let composite_resource = Resource::from_value(wire.composite_resource).map_err(|e| e.to_string())?;
    let mut composed_resources = indexmap::IndexMap::new();
    for (key, value) in wire.composed_resources {
        composed_resources.insert(key, Resource::from_value(value).map_err(|e| e.to_string())?);
    }
    let _ = composition;
    Ok(RenderResult {
        composite_resource,
        composed_resources,
        results: wire
            .results
            .into_iter()
            .map(|r| FunctionResult {
                step: r.step,
                severity: r.severity,
                message: r.message,
            })
            .collect(),
        required_resources: wire
            .required_resources
            .into_iter()
            .map(|r| RequiredResourceRef {
                step: r.step,
                api_version: r.api_version,
                kind: r.kind,
                match_name: r.match_name,
                match_labels: r.match_labels,
            })
            .collect(),
    })
}

/// Invokes an external render command once per call, feeding it the request
/// as JSON on stdin and parsing a `RenderResult` from its stdout. Stderr is
/// passed through for the renderer's own diagnostics.
pub struct ProcessRenderer {
    program: OsString,
    args: Vec<OsString>,
}

impl ProcessRenderer {
    pub fn new(program: impl Into<OsString>, args: impl IntoIterator<Item = impl Into<OsString>>) -> Self {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }
}

#[async_trait]
impl Renderer for ProcessRenderer {
    async fn render(&self, request: RenderRequest) -> Result<RenderResult, String> {
        let wire = to_wire(&request);
        let payload = serde_json::to_vec(&wire).map_err(|e| format!("could not encode render request: {e}"))?;

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|e| format!("could not start render command {:?}: {e}", self.program))?;

        let mut stdin = child.stdin.take().expect("piped stdin");
        stdin
            .write_all(&payload)
            .await
            .map_err(|e| format!("could not write render request: {e}"))?;
        drop(stdin);

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| format!("render command failed to run: {e}"))?;

        if !output.status.success() {
            return Err(format!(
                "render command exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr)
            ));
        }

        let wire_result: WireResult =
            serde_json::from_slice(&output.stdout).map_err(|e| format!("could not decode render result: {e}"))?;
        from_wire(&request.composition, wire_result)
    }
}
