use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::container::descriptor::{ConstructorId, ParamSpec, TypeKey};
use crate::container::scope::ScopeId;
use crate::error::{DiError, DiResult};

/// Type-erased value produced by a constructor
pub type Instance = Arc<dyn Any + Send + Sync>;

/// Wrap a value as an [`Instance`]
pub fn instance<T: Send + Sync + 'static>(value: T) -> Instance {
    Arc::new(value)
}

/// A resolved key: one value for plain keys, an ordered list for grouped keys
#[derive(Clone)]
pub enum Resolved {
    One(Instance),
    Many(Vec<Instance>),
}

impl fmt::Debug for Resolved {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resolved::One(_) => f.write_str("One(<instance>)"),
            Resolved::Many(values) => write!(f, "Many(<{} instances>)", values.len()),
        }
    }
}

impl Resolved {
    pub fn as_one(&self) -> Option<&Instance> {
        match self {
            Resolved::One(value) => Some(value),
            Resolved::Many(_) => None,
        }
    }

    pub fn as_many(&self) -> Option<&[Instance]> {
        match self {
            Resolved::One(_) => None,
            Resolved::Many(values) => Some(values),
        }
    }

    /// Downcast a single value
    pub fn downcast<T: Send + Sync + 'static>(&self, key: &TypeKey) -> DiResult<Arc<T>> {
        let value = self.as_one().ok_or_else(|| DiError::TypeMismatch {
            key: key.clone(),
            expected: "a single value",
        })?;
        value.clone().downcast::<T>().map_err(|_| DiError::TypeMismatch {
            key: key.clone(),
            expected: std::any::type_name::<T>(),
        })
    }

    /// Downcast every value of a group, keeping order
    pub fn downcast_all<T: Send + Sync + 'static>(&self, key: &TypeKey) -> DiResult<Vec<Arc<T>>> {
        let values = self.as_many().ok_or_else(|| DiError::TypeMismatch {
            key: key.clone(),
            expected: "a group of values",
        })?;
        values
            .iter()
            .map(|value| {
                value.clone().downcast::<T>().map_err(|_| DiError::TypeMismatch {
                    key: key.clone(),
                    expected: std::any::type_name::<T>(),
                })
            })
            .collect()
    }
}

/// Uniform invocation signature every constructor is erased to
pub(crate) type Invoke =
    Arc<dyn Fn(&[Option<Resolved>]) -> DiResult<Vec<Instance>> + Send + Sync>;

pub(crate) type DecorateFn = Arc<dyn Fn(Resolved) -> DiResult<Resolved> + Send + Sync>;

/// Erase a closure to [`Invoke`]
pub(crate) fn invoker<F>(f: F) -> Invoke
where
    F: Fn(&[Option<Resolved>]) -> DiResult<Vec<Instance>> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Stable identity of a node: owning scope plus arena slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId {
    pub scope: ScopeId,
    pub index: usize,
}

/// A registered constructor with the keys it consumes and produces
pub struct Node {
    pub(crate) id: NodeId,
    pub(crate) constructor: ConstructorId,
    pub(crate) name: String,
    pub(crate) owner: String,
    pub(crate) params: Vec<ParamSpec>,
    pub(crate) results: Vec<TypeKey>,
    pub(crate) invoke: Invoke,
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("params", &self.params)
            .field("results", &self.results)
            .finish()
    }
}

impl Node {
    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn params(&self) -> &[ParamSpec] {
        &self.params
    }

    pub fn results(&self) -> &[TypeKey] {
        &self.results
    }
}

#[derive(Clone)]
pub(crate) struct Decorator {
    pub(crate) name: String,
    pub(crate) func: DecorateFn,
}

/// Cached single value and the node it came from
#[derive(Clone)]
pub(crate) struct Cached {
    pub(crate) node: NodeId,
    pub(crate) instance: Instance,
}

/// Assembled group together with the providers it was assembled from
#[derive(Clone)]
pub(crate) struct GroupCache {
    pub(crate) members: Vec<NodeId>,
    pub(crate) values: Vec<Instance>,
}

/// Per-scope node arena and caches
#[derive(Default)]
pub(crate) struct Registry {
    pub(crate) nodes: Vec<Option<Arc<Node>>>,
    pub(crate) providers: HashMap<TypeKey, Vec<usize>>,
    pub(crate) values: HashMap<TypeKey, Cached>,
    pub(crate) groups: HashMap<TypeKey, GroupCache>,
    pub(crate) outputs: HashMap<NodeId, Vec<Instance>>,
    pub(crate) decorators: HashMap<TypeKey, Decorator>,
    pub(crate) decorated_values: HashMap<TypeKey, Resolved>,
    pub(crate) revision: u64,
    pub(crate) verified: Option<Vec<u64>>,
}

/// Everything needed to add a node to a registry
pub(crate) struct NodeParts {
    pub(crate) constructor: ConstructorId,
    pub(crate) name: String,
    pub(crate) params: Vec<ParamSpec>,
    pub(crate) results: Vec<TypeKey>,
    pub(crate) invoke: Invoke,
}

impl Registry {
    /// Append a node and link it under each of its result keys
    pub(crate) fn insert(&mut self, scope: ScopeId, owner: &str, parts: NodeParts) -> NodeId {
        let id = NodeId {
            scope,
            index: self.nodes.len(),
        };

        for key in &parts.results {
            self.providers.entry(key.clone()).or_default().push(id.index);
            if key.is_grouped() {
                self.decorated_values.remove(key);
            }
        }

        self.nodes.push(Some(Arc::new(Node {
            id,
            constructor: parts.constructor,
            name: parts.name,
            owner: owner.to_string(),
            params: parts.params,
            results: parts.results,
            invoke: parts.invoke,
        })));
        self.touch();
        id
    }

    /// Unlink a node without touching any cached value
    pub(crate) fn discard(&mut self, index: usize) {
        let Some(node) = self.nodes.get_mut(index).and_then(Option::take) else {
            return;
        };
        self.unlink(&node);
        self.touch();
    }

    /// Remove every node registered under a constructor identity, with all
    /// cached state for the keys it produced
    pub(crate) fn remove(&mut self, constructor: &ConstructorId) -> Vec<Arc<Node>> {
        let indices: Vec<usize> = self
            .live_nodes()
            .filter(|node| &node.constructor == constructor)
            .map(|node| node.id.index)
            .collect();

        let mut removed = Vec::with_capacity(indices.len());
        for index in indices {
            let Some(node) = self.nodes.get_mut(index).and_then(Option::take) else {
                continue;
            };
            self.unlink(&node);
            for key in &node.results {
                self.values.remove(key);
                self.decorators.remove(key);
                self.decorated_values.remove(key);
                self.groups.remove(key);
            }
            self.outputs.remove(&node.id);
            removed.push(node);
        }

        if !removed.is_empty() {
            self.touch();
        }
        removed
    }

    /// Forget everything this scope cached from a node removed elsewhere in the chain
    pub(crate) fn purge(&mut self, node: &Node) {
        self.outputs.remove(&node.id);
        self.values.retain(|_, cached| cached.node != node.id);
        self.groups.retain(|_, group| !group.members.contains(&node.id));
        for key in &node.results {
            self.decorated_values.remove(key);
        }
        self.verified = None;
    }

    /// Drop the cached value of a key so the next read walks the chain again
    pub(crate) fn forget(&mut self, key: &TypeKey) {
        self.values.remove(key);
        self.decorated_values.remove(key);
    }

    /// Most recently registered live provider for a key
    pub(crate) fn last_provider(&self, key: &TypeKey) -> Option<&Arc<Node>> {
        self.providers
            .get(key)?
            .iter()
            .rev()
            .find_map(|&index| self.nodes.get(index).and_then(Option::as_ref))
    }

    /// Live providers for a key, in registration order
    pub(crate) fn providers_of<'a>(&'a self, key: &TypeKey) -> impl Iterator<Item = &'a Arc<Node>> + 'a {
        self.providers
            .get(key)
            .into_iter()
            .flatten()
            .filter_map(move |&index| self.nodes.get(index).and_then(Option::as_ref))
    }

    pub(crate) fn live_nodes(&self) -> impl Iterator<Item = &Arc<Node>> {
        self.nodes.iter().filter_map(Option::as_ref)
    }

    pub(crate) fn node_count(&self) -> usize {
        self.live_nodes().count()
    }

    fn unlink(&mut self, node: &Node) {
        for key in &node.results {
            if let Some(indices) = self.providers.get_mut(key) {
                indices.retain(|&index| index != node.id.index);
                if indices.is_empty() {
                    self.providers.remove(key);
                }
            }
        }
    }

    fn touch(&mut self) {
        self.revision += 1;
        self.verified = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parts(constructor: ConstructorId, results: Vec<TypeKey>) -> NodeParts {
        NodeParts {
            constructor,
            name: "test".to_string(),
            params: Vec::new(),
            results,
            invoke: invoker(|_| Ok(vec![instance(1u8)])),
        }
    }

    #[test]
    fn test_last_registration_is_authoritative() {
        let scope = ScopeId::new();
        let mut registry = Registry::default();

        let first = registry.insert(scope, "root", parts(ConstructorId::unique(), vec![TypeKey::of::<u8>()]));
        let second = registry.insert(scope, "root", parts(ConstructorId::unique(), vec![TypeKey::of::<u8>()]));

        assert_eq!(registry.last_provider(&TypeKey::of::<u8>()).unwrap().id, second);
        assert_eq!(registry.providers_of(&TypeKey::of::<u8>()).count(), 2);
        assert_ne!(first, second);
    }

    #[test]
    fn test_remove_clears_caches_for_result_keys() {
        let scope = ScopeId::new();
        let mut registry = Registry::default();
        let constructor = ConstructorId::unique();
        let key = TypeKey::of::<u8>();

        let id = registry.insert(scope, "root", parts(constructor, vec![key.clone()]));
        registry.values.insert(
            key.clone(),
            Cached {
                node: id,
                instance: instance(7u8),
            },
        );
        registry.outputs.insert(id, vec![instance(7u8)]);
        let revision = registry.revision;

        let removed = registry.remove(&constructor);

        assert_eq!(removed.len(), 1);
        assert!(registry.values.is_empty());
        assert!(registry.outputs.is_empty());
        assert!(registry.last_provider(&key).is_none());
        assert!(registry.revision > revision);
        assert_eq!(registry.node_count(), 0);
    }

    #[test]
    fn test_remove_unknown_constructor_is_noop() {
        let mut registry = Registry::default();
        let revision = registry.revision;

        assert!(registry.remove(&ConstructorId::unique()).is_empty());
        assert_eq!(registry.revision, revision);
    }

    #[test]
    fn test_removed_newest_falls_back_to_previous() {
        let scope = ScopeId::new();
        let mut registry = Registry::default();
        let key = TypeKey::of::<u8>();
        let newest = ConstructorId::unique();

        let older = registry.insert(scope, "root", parts(ConstructorId::unique(), vec![key.clone()]));
        registry.insert(scope, "root", parts(newest, vec![key.clone()]));
        registry.remove(&newest);

        assert_eq!(registry.last_provider(&key).unwrap().id, older);
    }

    #[test]
    fn test_resolved_downcasts() {
        let key = TypeKey::of::<u8>();
        let one = Resolved::One(instance(3u8));
        assert_eq!(*one.downcast::<u8>(&key).unwrap(), 3);
        assert!(one.downcast::<u16>(&key).is_err());

        let many = Resolved::Many(vec![instance(1u8), instance(2u8)]);
        let values: Vec<u8> = many
            .downcast_all::<u8>(&key)
            .unwrap()
            .into_iter()
            .map(|value| *value)
            .collect();
        assert_eq!(values, vec![1, 2]);
        assert!(many.downcast::<u8>(&key).is_err());
    }
}
