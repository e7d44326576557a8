//! Typed Kubernetes client capabilities for the Crossplane dry-run diff
//! pipeline (§4.1 Cluster Clients): a capability bundle over `kube`,
//! expressed as narrow traits so tests can substitute in-memory fakes.

pub mod capability;
pub mod cluster;
pub mod discovery;
pub mod error;
pub mod fakes;

pub use capability::{
    Crd, CompositionCapability, DefinitionCapability, EnvironmentCapability, FunctionCapability,
    ResourceCapability, ResourceTreeCapability, RevisionCapability, SchemaCapability, TypeCapability,
};
pub use cluster::{ClusterClients, RequestBudget};
pub use discovery::DiscoveryCache;
pub use error::{ClientError, Result};
pub use fakes::FakeClusterClients;
