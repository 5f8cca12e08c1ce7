use std::collections::HashSet;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use serde::Serialize;
use uuid::Uuid;

use crate::config::ContainerConfig;
use crate::container::autowiring::{Constructor, ParamList, TryConstructor};
use crate::container::binding::{DecorateOptions, GetOptions, ProvideOptions, Provider, RemoveOptions};
use crate::container::descriptor::{ConstructorId, ParamTag, TypeKey};
use crate::container::registry::{instance, DecorateFn, Decorator, Node, NodeParts, Registry, Resolved};
use crate::container::resolver::Resolver;
use crate::container::visualization::GraphSnapshot;
use crate::error::{BoxError, DiError, DiResult};

/// Unique identifier of a scope
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct ScopeId(Uuid);

impl ScopeId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for ScopeId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ScopeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

struct ScopeInner {
    id: ScopeId,
    name: String,
    config: Arc<ContainerConfig>,
    parent: Option<Weak<ScopeInner>>,
    children: Mutex<Vec<Weak<ScopeInner>>>,
    state: Mutex<Registry>,
}

impl ScopeInner {
    fn new(name: String, config: Arc<ContainerConfig>, parent: Option<Weak<ScopeInner>>) -> Self {
        Self {
            id: ScopeId::new(),
            name,
            config,
            parent,
            children: Mutex::new(Vec::new()),
            state: Mutex::new(Registry::default()),
        }
    }

    /// Lock the registry, recovering it if a constructor panicked while it was held.
    ///
    /// Caches are only written after a constructor returns, so a poisoned
    /// registry is still consistent.
    fn lock(&self) -> MutexGuard<'_, Registry> {
        self.state.lock().unwrap_or_else(|poisoned| {
            tracing::warn!("Recovering registry of scope '{}' after a panic", self.name);
            self.state.clear_poison();
            poisoned.into_inner()
        })
    }

    fn live_children(&self) -> DiResult<Vec<Arc<ScopeInner>>> {
        let mut children = self
            .children
            .lock()
            .map_err(|_| DiError::lock_error(format!("children of scope '{}'", self.name)))?;
        children.retain(|child| child.strong_count() > 0);
        Ok(children.iter().filter_map(Weak::upgrade).collect())
    }
}

/// A resolution unit: registered providers, cached values and decorators.
///
/// `Scope` is a cheap handle; clones share the same state. A child scope only
/// holds a weak reference to its parent, so the parent must be kept alive by
/// its owner for as long as the child resolves through it.
///
/// Values are cached in the scope that requested them and a child never writes
/// into its ancestors. A child that asks for an ancestor's provider before the
/// ancestor has built it gets its own instance; resolve shared singletons in
/// the ancestor first if every descendant should see the same value.
#[derive(Clone)]
pub struct Scope {
    inner: Arc<ScopeInner>,
}

impl fmt::Debug for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scope")
            .field("id", &self.inner.id)
            .field("name", &self.inner.name)
            .finish()
    }
}

impl Scope {
    pub(crate) fn root(config: ContainerConfig) -> Self {
        let name = config.root_scope_name.clone();
        Self {
            inner: Arc::new(ScopeInner::new(name, Arc::new(config), None)),
        }
    }

    /// Derive a child scope whose lookups fall back to this one
    pub fn child(&self, name: impl Into<String>) -> DiResult<Scope> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(DiError::invalid_argument("scope name must not be empty"));
        }

        let child = Arc::new(ScopeInner::new(
            name,
            self.inner.config.clone(),
            Some(Arc::downgrade(&self.inner)),
        ));
        self.inner
            .children
            .lock()
            .map_err(|_| DiError::lock_error(format!("children of scope '{}'", self.inner.name)))?
            .push(Arc::downgrade(&child));

        tracing::debug!("Created scope '{}' under '{}'", child.name, self.inner.name);
        Ok(Scope { inner: child })
    }

    pub fn id(&self) -> ScopeId {
        self.inner.id
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn config(&self) -> &ContainerConfig {
        &self.inner.config
    }

    /// The parent scope, if it is still alive
    pub fn parent(&self) -> Option<Scope> {
        self.inner
            .parent
            .as_ref()
            .and_then(Weak::upgrade)
            .map(|inner| Scope { inner })
    }

    /// This scope followed by its live ancestors
    fn chain(&self) -> Vec<Arc<ScopeInner>> {
        let mut current = self.inner.clone();
        let mut chain = vec![current.clone()];

        while let Some(parent) = current.parent.as_ref() {
            let Some(parent) = parent.upgrade() else {
                tracing::warn!("Parent of scope '{}' has been dropped", current.name);
                break;
            };
            chain.push(parent.clone());
            current = parent;
        }

        chain
    }

    /// Lock the whole chain, descendant first, and run `f` against it
    fn with_resolver<R>(&self, f: impl FnOnce(&mut Resolver<'_>) -> DiResult<R>) -> DiResult<R> {
        let chain = self.chain();
        let mut guards: Vec<_> = chain.iter().map(|scope| scope.lock()).collect();

        let (local, ancestors) = guards
            .split_first_mut()
            .ok_or_else(|| DiError::lock_error(format!("scope '{}'", self.inner.name)))?;
        let ancestors: Vec<&Registry> = ancestors.iter().map(|guard| &**guard).collect();

        let mut resolver = Resolver::new(&mut **local, ancestors);
        f(&mut resolver)
    }

    /// Apply `f` to every live descendant's registry
    fn for_each_descendant(&self, mut f: impl FnMut(&mut Registry)) -> DiResult<()> {
        let mut pending = self.inner.live_children()?;
        while let Some(scope) = pending.pop() {
            {
                let mut state = scope.lock();
                f(&mut *state);
            }
            pending.extend(scope.live_children()?);
        }
        Ok(())
    }

    /// Register an erased provider
    pub fn register(&self, provider: Provider) -> DiResult<ConstructorId> {
        let Provider {
            id,
            name,
            params,
            results,
            invoke,
        } = provider;

        let invoke = invoke.ok_or_else(|| {
            DiError::invalid_argument(format!("provider {} has no callable", name))
        })?;
        if results.is_empty() {
            return Err(DiError::invalid_argument(format!(
                "provider {} declares no results",
                name
            )));
        }

        let mut seen = HashSet::new();
        for key in &results {
            key.validate()?;
            if !seen.insert(key) {
                return Err(DiError::invalid_argument(format!(
                    "provider {} declares {} more than once",
                    name, key
                )));
            }
        }
        for param in &params {
            param.key.validate()?;
        }

        let parts = NodeParts {
            constructor: id,
            name: name.clone(),
            params,
            results,
            invoke,
        };

        let scope = self.inner.id;
        let owner = self.inner.name.as_str();
        let node = if self.inner.config.verify_on_provide {
            self.with_resolver(|resolver| {
                let node = resolver.local_mut().insert(scope, owner, parts);
                if let Err(error) = resolver.verify_graph() {
                    resolver.local_mut().discard(node.index);
                    return Err(error);
                }
                Ok(node)
            })?
        } else {
            self.inner.lock().insert(scope, owner, parts)
        };

        tracing::debug!(
            "Registered provider {} in scope '{}' at slot {}",
            name,
            self.inner.name,
            node.index
        );
        Ok(id)
    }

    /// Register an infallible constructor
    pub fn provide<F, Args>(&self, constructor: F) -> DiResult<ConstructorId>
    where
        F: Constructor<Args>,
        Args: ParamList,
    {
        self.provide_with(ProvideOptions::default(), constructor)
    }

    pub fn provide_with<F, Args>(&self, options: ProvideOptions, constructor: F) -> DiResult<ConstructorId>
    where
        F: Constructor<Args>,
        Args: ParamList,
    {
        self.register(Provider::from_constructor(constructor, &options)?)
    }

    /// Register a constructor returning `Result`; an `Err` aborts the build
    pub fn try_provide<F, Args>(&self, constructor: F) -> DiResult<ConstructorId>
    where
        F: TryConstructor<Args>,
        Args: ParamList,
    {
        self.try_provide_with(ProvideOptions::default(), constructor)
    }

    pub fn try_provide_with<F, Args>(&self, options: ProvideOptions, constructor: F) -> DiResult<ConstructorId>
    where
        F: TryConstructor<Args>,
        Args: ParamList,
    {
        self.register(Provider::from_try_constructor(constructor, &options)?)
    }

    /// Register an already built value
    pub fn supply<T: Send + Sync + 'static>(&self, value: T) -> DiResult<ConstructorId> {
        self.register(Provider::from_value(value, None))
    }

    pub fn supply_named<T: Send + Sync + 'static>(
        &self,
        name: impl Into<String>,
        value: T,
    ) -> DiResult<ConstructorId> {
        self.register(Provider::from_value(value, Some(name.into())))
    }

    pub fn get<T: Send + Sync + 'static>(&self) -> DiResult<Arc<T>> {
        let key = TypeKey::of::<T>();
        self.get_key(&key)?.downcast::<T>(&key)
    }

    pub fn get_named<T: Send + Sync + 'static>(&self, name: impl Into<String>) -> DiResult<Arc<T>> {
        let key = TypeKey::named::<T>(name);
        self.get_key(&key)?.downcast::<T>(&key)
    }

    /// Every value contributed to a group, root scope first
    pub fn get_group<T: Send + Sync + 'static>(&self, group: impl Into<String>) -> DiResult<Vec<Arc<T>>> {
        let key = TypeKey::grouped::<T>(group);
        self.get_key(&key)?.downcast_all::<T>(&key)
    }

    pub fn get_key(&self, key: &TypeKey) -> DiResult<Resolved> {
        self.get_key_with(key, &GetOptions::default())
    }

    pub fn get_key_with(&self, key: &TypeKey, _options: &GetOptions) -> DiResult<Resolved> {
        key.validate()?;
        self.with_resolver(|resolver| resolver.get(key))
    }

    /// Resolve `f`'s parameters and call it once; the result is not cached
    pub fn invoke<F, Args>(&self, f: F) -> DiResult<F::Output>
    where
        F: Constructor<Args>,
        Args: ParamList,
    {
        self.invoke_with(&[], f)
    }

    pub fn invoke_with<F, Args>(&self, tags: &[ParamTag], f: F) -> DiResult<F::Output>
    where
        F: Constructor<Args>,
        Args: ParamList,
    {
        let args = self.resolve_args::<Args>(tags)?;
        Ok(f.call(args))
    }

    pub fn try_invoke<F, Args>(&self, f: F) -> DiResult<F::Output>
    where
        F: TryConstructor<Args>,
        Args: ParamList,
    {
        let args = self.resolve_args::<Args>(&[])?;
        f.try_call(args).map_err(|error| DiError::Constructor {
            constructor: std::any::type_name::<F>().to_string(),
            source: error.into(),
        })
    }

    fn resolve_args<Args: ParamList>(&self, tags: &[ParamTag]) -> DiResult<Args> {
        let specs = Args::specs(tags)?;
        let values = self.with_resolver(|resolver| resolver.resolve_params(&specs))?;
        Args::extract(&specs, &values)
    }

    /// Unregister the nodes created from a typed constructor
    pub fn remove<F: 'static>(&self, constructor: &F) -> DiResult<()> {
        self.remove_with(constructor, &RemoveOptions::default())
    }

    pub fn remove_with<F: 'static>(&self, _constructor: &F, _options: &RemoveOptions) -> DiResult<()> {
        self.remove_id(&ConstructorId::of::<F>())
    }

    /// Unregister every node carrying `id`; unknown ids are ignored
    pub fn remove_id(&self, id: &ConstructorId) -> DiResult<()> {
        let removed: Vec<Arc<Node>> = self.inner.lock().remove(id);
        if removed.is_empty() {
            tracing::trace!("No provider {:?} in scope '{}' to remove", id, self.inner.name);
            return Ok(());
        }

        for node in &removed {
            tracing::debug!("Removed provider {} from scope '{}'", node.name, self.inner.name);
        }

        self.for_each_descendant(|state| {
            for node in &removed {
                state.purge(node);
            }
        })
    }

    /// Wrap the value produced for `T`
    pub fn decorate<T, F>(&self, f: F) -> DiResult<()>
    where
        T: Send + Sync + 'static,
        F: Fn(Arc<T>) -> T + Send + Sync + 'static,
    {
        self.decorate_with(DecorateOptions::default(), f)
    }

    pub fn decorate_with<T, F>(&self, options: DecorateOptions, f: F) -> DiResult<()>
    where
        T: Send + Sync + 'static,
        F: Fn(Arc<T>) -> T + Send + Sync + 'static,
    {
        let key = options.key::<T>();
        let target = key.clone();
        let func: DecorateFn = Arc::new(move |value: Resolved| -> DiResult<Resolved> {
            let value = value.downcast::<T>(&target)?;
            Ok(Resolved::One(instance(f(value))))
        });
        self.install_decorator(key, std::any::type_name::<F>(), func)
    }

    pub fn try_decorate<T, F, E>(&self, f: F) -> DiResult<()>
    where
        T: Send + Sync + 'static,
        F: Fn(Arc<T>) -> Result<T, E> + Send + Sync + 'static,
        E: Into<BoxError>,
    {
        self.try_decorate_with(DecorateOptions::default(), f)
    }

    /// Fallible decorator; an `Err` fails the `get` and nothing is cached
    pub fn try_decorate_with<T, F, E>(&self, options: DecorateOptions, f: F) -> DiResult<()>
    where
        T: Send + Sync + 'static,
        F: Fn(Arc<T>) -> Result<T, E> + Send + Sync + 'static,
        E: Into<BoxError>,
    {
        let key = options.key::<T>();
        let target = key.clone();
        let name = std::any::type_name::<F>();
        let func: DecorateFn = Arc::new(move |value: Resolved| -> DiResult<Resolved> {
            let value = value.downcast::<T>(&target)?;
            let decorated = f(value).map_err(|error| DiError::Constructor {
                constructor: name.to_string(),
                source: error.into(),
            })?;
            Ok(Resolved::One(instance(decorated)))
        });
        self.install_decorator(key, name, func)
    }

    /// Replace the assembled values of a group
    pub fn decorate_group<T, F>(&self, group: impl Into<String>, f: F) -> DiResult<()>
    where
        T: Send + Sync + 'static,
        F: Fn(Vec<Arc<T>>) -> Vec<T> + Send + Sync + 'static,
    {
        let key = TypeKey::grouped::<T>(group);
        let target = key.clone();
        let func: DecorateFn = Arc::new(move |value: Resolved| -> DiResult<Resolved> {
            let values = value.downcast_all::<T>(&target)?;
            Ok(Resolved::Many(f(values).into_iter().map(instance).collect()))
        });
        self.install_decorator(key, std::any::type_name::<F>(), func)
    }

    fn install_decorator(&self, key: TypeKey, name: &str, func: DecorateFn) -> DiResult<()> {
        key.validate()?;
        {
            let mut state = self.inner.lock();
            if state.decorators.contains_key(&key) {
                return Err(DiError::invalid_argument(format!(
                    "{} already has a decorator in scope '{}'",
                    key, self.inner.name
                )));
            }
            state.decorated_values.remove(&key);
            state.decorators.insert(
                key.clone(),
                Decorator {
                    name: name.to_string(),
                    func,
                },
            );
        }

        tracing::debug!("Installed decorator {} for {} in scope '{}'", name, key, self.inner.name);
        self.for_each_descendant(|state| state.forget(&key))
    }

    /// Whether `key` has a provider or a cached value anywhere in the chain
    pub fn contains(&self, key: &TypeKey) -> DiResult<bool> {
        self.with_resolver(|resolver| Ok(resolver.has_provider(key)))
    }

    /// Number of live providers registered directly in this scope
    pub fn provider_count(&self) -> DiResult<usize> {
        Ok(self.inner.lock().node_count())
    }

    pub fn is_verified_acyclic(&self) -> DiResult<bool> {
        self.with_resolver(|resolver| Ok(resolver.is_verified()))
    }

    /// Run full-graph cycle detection now instead of on the next `get`
    pub fn verify(&self) -> DiResult<()> {
        self.with_resolver(|resolver| resolver.verify_graph())
    }

    /// Capture the provider graph visible from this scope
    pub fn snapshot(&self) -> DiResult<GraphSnapshot> {
        let name = self.inner.name.clone();
        self.with_resolver(|resolver| Ok(GraphSnapshot::capture(name, resolver)))
    }

    /// Graphviz DOT rendering of the visible provider graph
    pub fn visualize(&self) -> DiResult<String> {
        Ok(self.snapshot()?.to_dot())
    }
}
