//! Error types for `xdiff-client`.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ClientError>;

/// Errors a cluster-client capability can raise. `NotFound` is deliberately
/// absent here — per §4.1 it is a typed result (`Option`), not an error.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ClientError {
    #[error("Kubernetes API error: {0}")]
    Api(#[from] kube::Error),

    #[error("resource {gvk} {namespace}/{name} has no registered discovery entry")]
    UnknownGvk {
        gvk: String,
        namespace: String,
        name: String,
    },

    #[error("composition {0} not found")]
    CompositionNotFound(String),

    #[error("composition revision {revision} for composition {composition} not found")]
    RevisionNotFound { composition: String, revision: String },

    #[error("no XRD found for XR kind {0}")]
    NoXrdForKind(String),

    #[error("{0} of {1} requested resources failed to fetch")]
    PartialFetchFailure(usize, usize),

    #[error("invalid resource document: {0}")]
    InvalidResource(#[from] xdiff_core::CoreError),
}
