//! Error types for `xdiff-diff`.

use thiserror::Error;
use xdiff_core::Gvk;

pub type Result<T> = std::result::Result<T, DiffError>;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum DiffError {
    /// The matcher found more than one live candidate for a desired
    /// generated-name resource (§4.5 rule 2).
    #[error("ambiguous match: {candidate_count} live candidates for generated resource {gvk} in namespace {namespace:?}")]
    AmbiguousMatch {
        gvk: Gvk,
        namespace: Option<String>,
        candidate_count: usize,
    },

    #[error(transparent)]
    Client(#[from] xdiff_client::ClientError),

    #[error(transparent)]
    Core(#[from] xdiff_core::CoreError),
}
