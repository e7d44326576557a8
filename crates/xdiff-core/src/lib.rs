//! Data model for the Crossplane dry-run diff pipeline: resources, XRs,
//! XRDs, Compositions and the diff/render value types the rest of the
//! pipeline crates operate on. Contains no cluster I/O and no `kube`
//! dependency — that lives in `xdiff-client`.

pub mod composition;
pub mod diff;
pub mod error;
pub mod gvk;
pub mod render;
pub mod resource;
pub mod schema;
pub mod xr;
pub mod xrd;

pub use composition::{Composition, CompositionRevision, EnvironmentConfig, Function, FunctionCredentialSource};
pub use diff::{ChangeType, ResourceDiff, SummaryCounts};
pub use error::{CoreError, Result};
pub use gvk::Gvk;
pub use render::{
    FunctionCredentials, FunctionResult, OwnershipRelation, RenderContext, RenderRequest, RenderResult,
    RequiredResourceRef,
};
pub use resource::{OwnerReference, Resource, ResourceIdentity};
pub use schema::{schema_for_version, SchemaValidator, ValidationIssue, ValidationResult};
pub use xr::{Claim, CompositionRef, CompositionRevisionRef, CompositionSelection, CompositionSelector, CompositionUpdatePolicy, Xr};
pub use xrd::Xrd;
