//! The §7 error taxonomy for the parts of the pipeline this crate owns:
//! composition/revision resolution, requirements gathering and the
//! processor's orchestration. `SchemaValidationError` is deliberately not a
//! variant here — per §7 it "is not a tool error"; the processor carries it
//! as data on a per-input outcome instead (see [`crate::processor`]).

use thiserror::Error;
use xdiff_core::Gvk;

pub type Result<T> = std::result::Result<T, PipelineError>;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum PipelineError {
    #[error("input could not be parsed: {0}")]
    InvalidInput(String),

    #[error("no composition found for XR {xr_name} (no compositionRef, compositionSelector or XRD default)")]
    NoComposition { xr_name: String },

    #[error("ambiguous composition selection: multiple compositions match XR {xr_name}")]
    AmbiguousComposition { xr_name: String, candidate_count: usize },

    #[error("no composition matches XR {xr_name}'s compositionSelector")]
    NoMatchingComposition { xr_name: String },

    #[error("composition revision {revision} for composition {composition} not found")]
    RevisionNotFound { composition: String, revision: String },

    #[error("requirements did not converge after {iterations} iterations")]
    UnstableRequirements { iterations: usize },

    #[error("nested composite recursion exceeded max depth {max_depth} at {gvk} {namespace:?}/{name}")]
    DepthExceeded {
        max_depth: usize,
        gvk: Gvk,
        namespace: Option<String>,
        name: String,
    },

    #[error(
        "internal inconsistency: two pipelines produced disagreeing diffs for {gvk} {namespace:?}/{name}"
    )]
    InternalInconsistency {
        gvk: Gvk,
        namespace: Option<String>,
        name: String,
    },

    #[error("cancelled")]
    Cancelled,

    #[error("deadline exceeded")]
    DeadlineExceeded,

    #[error(transparent)]
    Client(#[from] xdiff_client::ClientError),

    #[error(transparent)]
    Render(#[from] xdiff_render::RenderError),

    #[error(transparent)]
    Diff(#[from] xdiff_diff::DiffError),

    #[error(transparent)]
    Core(#[from] xdiff_core::CoreError),
}

impl PipelineError {
    /// The tool-error exit code contribution of this error (§7): every
    /// variant here is a tool error, contributing exit code `1`.
    /// `SchemaValidationError`'s exit code `2` is handled separately since
    /// it is carried as data, not as a `PipelineError`.
    pub fn exit_code(&self) -> i32 {
        1
    }
}
