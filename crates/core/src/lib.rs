pub mod config;
pub mod container;
pub mod error;

// Re-export key types for convenience
pub use config::ContainerConfig;
pub use container::{
    Container, ConstructorId, DecorateOptions, GetOptions, Group, ParamTag, ProvideOptions, Provider,
    RemoveOptions, Resolved, Scope, ScopeId, TypeKey,
};
pub use error::{BoxError, DiError, DiResult};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Get crate version
pub fn version() -> &'static str {
    VERSION
}
