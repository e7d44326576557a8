//! A single bound over the whole Cluster Clients capability bundle (§4.1,
//! §9 "Client capability set"), so the resolver, requirements provider and
//! processor can each take one generic parameter instead of threading nine
//! trait bounds through every function signature.

use xdiff_client::{
    CompositionCapability, DefinitionCapability, EnvironmentCapability, FunctionCapability, ResourceCapability,
    ResourceTreeCapability, RevisionCapability, SchemaCapability, TypeCapability,
};

/// Anything that implements every capability in the bundle. Blanket-
/// implemented for `ClusterClients` and `FakeClusterClients` alike.
pub trait Clients:
    ResourceCapability
    + SchemaCapability
    + TypeCapability
    + CompositionCapability
    + DefinitionCapability
    + RevisionCapability
    + EnvironmentCapability
    + FunctionCapability
    + ResourceTreeCapability
    + Send
    + Sync
{
}

impl<T> Clients for T where
    T: ResourceCapability
        + SchemaCapability
        + TypeCapability
        + CompositionCapability
        + DefinitionCapability
        + RevisionCapability
        + EnvironmentCapability
        + FunctionCapability
        + ResourceTreeCapability
        + Send
        + Sync
{
}
