#[allow(clippy::module_inception)]
pub mod container;
pub mod autowiring;
pub mod binding;
pub mod descriptor;
pub mod graph;
pub mod registry;
mod resolver;
pub mod scope;
pub mod visualization;

pub use autowiring::{Constructor, Group, Param, ParamList, TryConstructor};
pub use binding::{DecorateOptions, GetOptions, ProvideOptions, Provider, ProviderBuilder, RemoveOptions};
pub use container::Container;
pub use descriptor::{ConstructorId, ParamSpec, ParamTag, TypeKey};
pub use graph::Graph;
pub use registry::{instance, Instance, Node, NodeId, Resolved};
pub use scope::{Scope, ScopeId};
pub use visualization::{ConstructorSnapshot, EdgeSnapshot, GraphSnapshot, KeySnapshot};
