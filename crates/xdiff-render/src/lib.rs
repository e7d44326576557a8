//! The Render Driver and the global render lock it serializes every call
//! to the external renderer through (§4.4, §5, §9).

pub mod driver;
pub mod error;
pub mod lock;

pub use driver::{RenderDriver, Renderer};
pub use error::{RenderError, Result};
pub use lock::GlobalRenderLock;
