//! Error types for `xdiff-render`.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, RenderError>;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum RenderError {
    /// The renderer itself returned an error; its text is quoted verbatim
    /// per §7 (`RenderFailure`).
    #[error("render function failed: {0}")]
    RenderFailure(String),

    #[error(transparent)]
    Client(#[from] xdiff_client::ClientError),

    #[error(transparent)]
    Core(#[from] xdiff_core::CoreError),
}
