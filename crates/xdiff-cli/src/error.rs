//! The CLI's unified error type (§7): wraps every pipeline-crate error in
//! a `miette::Diagnostic` that knows its own exit code, mirroring the
//! teacher's `sherpack_cli::error::CliError` / `exit_codes` split.

use miette::Diagnostic;
use thiserror::Error;

use crate::exit_codes;

#[derive(Error, Debug, Diagnostic)]
pub enum CliError {
    /// `InvalidInput` (§7): input YAML cannot be parsed or lacks a required
    /// field (missing `apiVersion`/`kind`, not an XR/Claim document, ...).
    #[error("invalid input: {message}")]
    #[diagnostic(code(xdiff::invalid_input))]
    InvalidInput {
        message: String,
        #[help]
        help: Option<String>,
    },

    /// Reading a YAML input path (file, directory walk, or the
    /// `--ignore-paths-file`/`--function-credentials` side files) failed.
    #[error("could not read {path}: {source}")]
    #[diagnostic(code(xdiff::io))]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Kubeconfig/REST-config bootstrap failed (§1 external collaborator,
    /// but the failure still needs a typed home here since it is this
    /// crate's job to surface it with the right exit code).
    #[error("could not read kubeconfig: {0}")]
    #[diagnostic(code(xdiff::kubeconfig))]
    KubeConfig(#[from] kube::config::KubeconfigError),

    #[error("could not build a Kubernetes client: {0}")]
    #[diagnostic(code(xdiff::kube_client))]
    Kube(#[from] kube::Error),

    #[error(transparent)]
    #[diagnostic(code(xdiff::pipeline))]
    Pipeline(#[from] xdiff_pipeline::PipelineError),

    #[error(transparent)]
    #[diagnostic(code(xdiff::client))]
    Client(#[from] xdiff_client::ClientError),

    #[error(transparent)]
    #[diagnostic(code(xdiff::core))]
    Core(#[from] xdiff_core::CoreError),

    /// `comp`'s target Composition does not exist.
    #[error("composition {0} not found")]
    #[diagnostic(code(xdiff::composition_not_found))]
    CompositionNotFound(String),
}

impl CliError {
    /// §7: every `CliError` variant is a tool error, contributing exit
    /// code `1`. `SchemaValidationError`/diff-presence do not construct a
    /// `CliError` at all — they're carried as report data (§4.7, §7) and
    /// folded into the final exit code by `ProcessorReport::exit_code`.
    pub fn exit_code(&self) -> i32 {
        exit_codes::TOOL_ERROR
    }
}

pub type Result<T> = std::result::Result<T, CliError>;
