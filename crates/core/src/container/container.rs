use std::sync::Arc;

use crate::config::ContainerConfig;
use crate::container::autowiring::{Constructor, ParamList, TryConstructor};
use crate::container::binding::{DecorateOptions, GetOptions, ProvideOptions, Provider, RemoveOptions};
use crate::container::descriptor::{ConstructorId, ParamTag, TypeKey};
use crate::container::registry::Resolved;
use crate::container::scope::Scope;
use crate::container::visualization::GraphSnapshot;
use crate::error::{BoxError, DiResult};

/// Dependency injection container.
///
/// A thin handle over the root [`Scope`]. Clones share the same root.
#[derive(Debug, Clone)]
pub struct Container {
    root: Scope,
}

impl Container {
    /// Create a container with the default configuration
    pub fn new() -> Self {
        Self {
            root: Scope::root(ContainerConfig::default()),
        }
    }

    pub fn with_config(config: ContainerConfig) -> DiResult<Self> {
        config.validate()?;
        tracing::debug!("Creating container with root scope '{}'", config.root_scope_name);
        Ok(Self {
            root: Scope::root(config),
        })
    }

    pub fn root(&self) -> &Scope {
        &self.root
    }

    /// Derive a child scope of the root
    pub fn scope(&self, name: impl Into<String>) -> DiResult<Scope> {
        self.root.child(name)
    }

    pub fn register(&self, provider: Provider) -> DiResult<ConstructorId> {
        self.root.register(provider)
    }

    pub fn provide<F, Args>(&self, constructor: F) -> DiResult<ConstructorId>
    where
        F: Constructor<Args>,
        Args: ParamList,
    {
        self.root.provide(constructor)
    }

    pub fn provide_with<F, Args>(&self, options: ProvideOptions, constructor: F) -> DiResult<ConstructorId>
    where
        F: Constructor<Args>,
        Args: ParamList,
    {
        self.root.provide_with(options, constructor)
    }

    pub fn try_provide<F, Args>(&self, constructor: F) -> DiResult<ConstructorId>
    where
        F: TryConstructor<Args>,
        Args: ParamList,
    {
        self.root.try_provide(constructor)
    }

    pub fn try_provide_with<F, Args>(&self, options: ProvideOptions, constructor: F) -> DiResult<ConstructorId>
    where
        F: TryConstructor<Args>,
        Args: ParamList,
    {
        self.root.try_provide_with(options, constructor)
    }

    pub fn supply<T: Send + Sync + 'static>(&self, value: T) -> DiResult<ConstructorId> {
        self.root.supply(value)
    }

    pub fn supply_named<T: Send + Sync + 'static>(
        &self,
        name: impl Into<String>,
        value: T,
    ) -> DiResult<ConstructorId> {
        self.root.supply_named(name, value)
    }

    pub fn get<T: Send + Sync + 'static>(&self) -> DiResult<Arc<T>> {
        self.root.get()
    }

    pub fn get_named<T: Send + Sync + 'static>(&self, name: impl Into<String>) -> DiResult<Arc<T>> {
        self.root.get_named(name)
    }

    pub fn get_group<T: Send + Sync + 'static>(&self, group: impl Into<String>) -> DiResult<Vec<Arc<T>>> {
        self.root.get_group(group)
    }

    pub fn get_key(&self, key: &TypeKey) -> DiResult<Resolved> {
        self.root.get_key(key)
    }

    pub fn get_key_with(&self, key: &TypeKey, options: &GetOptions) -> DiResult<Resolved> {
        self.root.get_key_with(key, options)
    }

    pub fn invoke<F, Args>(&self, f: F) -> DiResult<F::Output>
    where
        F: Constructor<Args>,
        Args: ParamList,
    {
        self.root.invoke(f)
    }

    /// Invoke with positional parameter qualifiers
    pub fn invoke_with<F, Args>(&self, tags: &[ParamTag], f: F) -> DiResult<F::Output>
    where
        F: Constructor<Args>,
        Args: ParamList,
    {
        self.root.invoke_with(tags, f)
    }

    pub fn try_invoke<F, Args>(&self, f: F) -> DiResult<F::Output>
    where
        F: TryConstructor<Args>,
        Args: ParamList,
    {
        self.root.try_invoke(f)
    }

    pub fn remove<F: 'static>(&self, constructor: &F) -> DiResult<()> {
        self.root.remove(constructor)
    }

    pub fn remove_with<F: 'static>(&self, constructor: &F, options: &RemoveOptions) -> DiResult<()> {
        self.root.remove_with(constructor, options)
    }

    pub fn remove_id(&self, id: &ConstructorId) -> DiResult<()> {
        self.root.remove_id(id)
    }

    pub fn decorate<T, F>(&self, f: F) -> DiResult<()>
    where
        T: Send + Sync + 'static,
        F: Fn(Arc<T>) -> T + Send + Sync + 'static,
    {
        self.root.decorate(f)
    }

    pub fn decorate_with<T, F>(&self, options: DecorateOptions, f: F) -> DiResult<()>
    where
        T: Send + Sync + 'static,
        F: Fn(Arc<T>) -> T + Send + Sync + 'static,
    {
        self.root.decorate_with(options, f)
    }

    pub fn try_decorate<T, F, E>(&self, f: F) -> DiResult<()>
    where
        T: Send + Sync + 'static,
        F: Fn(Arc<T>) -> Result<T, E> + Send + Sync + 'static,
        E: Into<BoxError>,
    {
        self.root.try_decorate(f)
    }

    pub fn try_decorate_with<T, F, E>(&self, options: DecorateOptions, f: F) -> DiResult<()>
    where
        T: Send + Sync + 'static,
        F: Fn(Arc<T>) -> Result<T, E> + Send + Sync + 'static,
        E: Into<BoxError>,
    {
        self.root.try_decorate_with(options, f)
    }

    pub fn decorate_group<T, F>(&self, group: impl Into<String>, f: F) -> DiResult<()>
    where
        T: Send + Sync + 'static,
        F: Fn(Vec<Arc<T>>) -> Vec<T> + Send + Sync + 'static,
    {
        self.root.decorate_group(group, f)
    }

    pub fn verify(&self) -> DiResult<()> {
        self.root.verify()
    }

    pub fn snapshot(&self) -> DiResult<GraphSnapshot> {
        self.root.snapshot()
    }

    pub fn visualize(&self) -> DiResult<String> {
        self.root.visualize()
    }
}

impl Default for Container {
    fn default() -> Self {
        Self::new()
    }
}
