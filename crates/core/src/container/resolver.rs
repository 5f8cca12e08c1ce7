use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::container::descriptor::{ParamSpec, TypeKey};
use crate::container::graph::Graph;
use crate::container::registry::{Cached, Decorator, GroupCache, Instance, Node, NodeId, Registry, Resolved};
use crate::error::{CycleEntry, DiError, DiResult, MissingLink};

/// What a walk up the scope chain found for a single-valued key
enum Lookup {
    Cached,
    Provider(Arc<Node>),
    Missing,
}

/// Resolution over a locked scope chain.
///
/// `local` is the requesting scope and the only one written to; `ancestors`
/// are ordered nearest first.
pub(crate) struct Resolver<'a> {
    local: &'a mut Registry,
    ancestors: Vec<&'a Registry>,
}

impl<'a> Resolver<'a> {
    pub(crate) fn new(local: &'a mut Registry, ancestors: Vec<&'a Registry>) -> Self {
        Self { local, ancestors }
    }

    /// Resolve one key: shallow check, acyclicity check, then build
    pub(crate) fn get(&mut self, key: &TypeKey) -> DiResult<Resolved> {
        let request = [ParamSpec::required(key.clone())];
        let mut values = self.resolve_params(&request)?;
        values
            .pop()
            .flatten()
            .ok_or_else(|| DiError::missing(key.clone()))
    }

    /// Resolve a parameter list as one request
    pub(crate) fn resolve_params(&mut self, params: &[ParamSpec]) -> DiResult<Vec<Option<Resolved>>> {
        let needed = self.check(params)?;
        self.verify_acyclic(&needed)?;
        params.iter().map(|param| self.resolve(param)).collect()
    }

    pub(crate) fn local_mut(&mut self) -> &mut Registry {
        &mut *self.local
    }

    /// Whether any scope in the chain can produce or already holds the key
    pub(crate) fn has_provider(&self, key: &TypeKey) -> bool {
        if key.is_grouped() {
            return !self.group_providers(key).is_empty();
        }
        !matches!(self.lookup(key), Lookup::Missing)
    }

    fn levels(&self) -> impl Iterator<Item = &Registry> + '_ {
        std::iter::once(&*self.local).chain(self.ancestors.iter().copied())
    }

    pub(crate) fn revisions(&self) -> Vec<u64> {
        self.levels().map(|registry| registry.revision).collect()
    }

    pub(crate) fn is_verified(&self) -> bool {
        self.local.verified.as_ref() == Some(&self.revisions())
    }

    /// Every live node visible from the requesting scope, root first
    pub(crate) fn live_nodes(&self) -> Vec<Arc<Node>> {
        let levels: Vec<&Registry> = self.levels().collect();
        levels
            .iter()
            .rev()
            .flat_map(|registry| registry.live_nodes().cloned())
            .collect()
    }

    /// Nearest provider for a single-valued key, ignoring cached values
    pub(crate) fn selected_provider(&self, key: &TypeKey) -> Option<Arc<Node>> {
        self.levels()
            .find_map(|registry| registry.last_provider(key).cloned())
    }

    /// All providers of a grouped key across the chain, root first
    pub(crate) fn group_providers(&self, key: &TypeKey) -> Vec<Arc<Node>> {
        let levels: Vec<&Registry> = self.levels().collect();
        levels
            .iter()
            .rev()
            .flat_map(|registry| registry.providers_of(key).cloned())
            .collect()
    }

    /// Nodes whose values would satisfy a parameter
    pub(crate) fn producers(&self, param: &ParamSpec) -> Vec<Arc<Node>> {
        if param.key.is_grouped() {
            self.group_providers(&param.key)
        } else {
            self.selected_provider(&param.key).into_iter().collect()
        }
    }

    /// Whether a node has already been invoked somewhere in the chain
    pub(crate) fn is_built(&self, node: &NodeId) -> bool {
        self.levels().any(|registry| registry.outputs.contains_key(node))
    }

    fn lookup(&self, key: &TypeKey) -> Lookup {
        for registry in self.levels() {
            if registry.decorated_values.contains_key(key) || registry.values.contains_key(key) {
                return Lookup::Cached;
            }
            if let Some(node) = registry.last_provider(key) {
                return Lookup::Provider(node.clone());
            }
        }
        Lookup::Missing
    }

    /// Verify a provider chain exists for every parameter without building anything.
    ///
    /// Returns the nodes the request would invoke.
    fn check(&self, params: &[ParamSpec]) -> DiResult<HashSet<NodeId>> {
        let mut needed = HashSet::new();
        let mut visited = HashSet::new();
        let mut chain = Vec::new();

        for param in params {
            self.check_param(param, &mut chain, &mut visited, &mut needed)?;
        }

        Ok(needed)
    }

    fn check_param(
        &self,
        param: &ParamSpec,
        chain: &mut Vec<MissingLink>,
        visited: &mut HashSet<TypeKey>,
        needed: &mut HashSet<NodeId>,
    ) -> DiResult<()> {
        let nodes: Vec<Arc<Node>> = if param.key.is_grouped() {
            if !visited.insert(param.key.clone()) {
                return Ok(());
            }
            self.group_providers(&param.key)
                .into_iter()
                .filter(|node| !self.is_built(&node.id))
                .collect()
        } else {
            match self.lookup(&param.key) {
                Lookup::Cached => return Ok(()),
                Lookup::Missing if param.optional => return Ok(()),
                Lookup::Missing => {
                    return Err(DiError::MissingDependencies {
                        key: param.key.clone(),
                        chain: chain.clone(),
                    })
                }
                Lookup::Provider(node) => {
                    if !visited.insert(param.key.clone()) {
                        return Ok(());
                    }
                    vec![node]
                }
            }
        };

        for node in nodes {
            needed.insert(node.id);
            for dependency in &node.params {
                chain.push(MissingLink {
                    constructor: node.name.clone(),
                    param: dependency.key.clone(),
                });
                let checked = self.check_param(dependency, chain, visited, needed);
                chain.pop();
                checked?;
            }
        }

        Ok(())
    }

    /// Build the producer-to-consumer graph of every node visible from this scope
    pub(crate) fn graph(&self) -> (Graph, Vec<Arc<Node>>) {
        let nodes = self.live_nodes();
        let positions: HashMap<NodeId, usize> = nodes
            .iter()
            .enumerate()
            .map(|(position, node)| (node.id, position))
            .collect();

        let mut graph = Graph::new(nodes.len());
        for (consumer, node) in nodes.iter().enumerate() {
            for param in &node.params {
                for producer in self.producers(param) {
                    if let Some(&from) = positions.get(&producer.id) {
                        graph.add_edge(from, consumer);
                    }
                }
            }
        }

        (graph, nodes)
    }

    /// Run full-graph cycle detection and cache the verdict
    pub(crate) fn verify_graph(&mut self) -> DiResult<()> {
        if self.is_verified() {
            return Ok(());
        }

        let (graph, nodes) = self.graph();
        if let Some(cycle) = graph.find_cycle() {
            return Err(cycle_error(&cycle, &nodes));
        }

        self.local.verified = Some(self.revisions());
        Ok(())
    }

    /// Refuse a request whose nodes form a cycle.
    ///
    /// A cycle elsewhere in the graph leaves the scope unverified but does not
    /// block keys outside the cyclic component.
    fn verify_acyclic(&mut self, needed: &HashSet<NodeId>) -> DiResult<()> {
        if self.is_verified() {
            return Ok(());
        }

        let (graph, nodes) = self.graph();
        if graph.find_cycle().is_none() {
            self.local.verified = Some(self.revisions());
            return Ok(());
        }

        let include = |vertex: usize| nodes.get(vertex).is_some_and(|node| needed.contains(&node.id));
        match graph.find_cycle_in(&include) {
            Some(cycle) => Err(cycle_error(&cycle, &nodes)),
            None => {
                tracing::debug!("graph has a cycle outside the requested keys; serving request");
                Ok(())
            }
        }
    }

    fn resolve(&mut self, param: &ParamSpec) -> DiResult<Option<Resolved>> {
        if param.key.is_grouped() {
            self.resolve_group(&param.key).map(Some)
        } else {
            self.resolve_single(&param.key, param.optional)
        }
    }

    fn resolve_single(&mut self, key: &TypeKey, optional: bool) -> DiResult<Option<Resolved>> {
        let mut decorator: Option<Decorator> = None;
        let mut found: Option<Resolved> = None;
        let mut provider: Option<Arc<Node>> = None;

        for registry in self.levels() {
            if let Some(decorated) = registry.decorated_values.get(key) {
                found = Some(decorated.clone());
                break;
            }
            if decorator.is_none() {
                decorator = registry.decorators.get(key).cloned();
            }
            if let Some(cached) = registry.values.get(key) {
                found = Some(Resolved::One(cached.instance.clone()));
                break;
            }
            if let Some(node) = registry.last_provider(key) {
                provider = Some(node.clone());
                break;
            }
        }

        let value = match (found, provider) {
            (Some(value), _) => {
                tracing::trace!("cache hit for {}", key);
                value
            }
            (None, Some(node)) => {
                let outputs = self.call(&node)?;
                let instance = node
                    .results
                    .iter()
                    .position(|result| result == key)
                    .and_then(|position| outputs.get(position).cloned())
                    .ok_or_else(|| DiError::missing(key.clone()))?;
                self.local.values.insert(
                    key.clone(),
                    Cached {
                        node: node.id,
                        instance: instance.clone(),
                    },
                );
                Resolved::One(instance)
            }
            (None, None) if optional => return Ok(None),
            (None, None) => return Err(DiError::missing(key.clone())),
        };

        match decorator {
            Some(decorator) => self.decorate(key, &decorator, value).map(Some),
            None => Ok(Some(value)),
        }
    }

    fn resolve_group(&mut self, key: &TypeKey) -> DiResult<Resolved> {
        let providers = self.group_providers(key);
        let members: Vec<NodeId> = providers.iter().map(|node| node.id).collect();

        let unchanged = self
            .local
            .groups
            .get(key)
            .is_some_and(|cached| cached.members == members);
        if unchanged {
            if let Some(decorated) = self.local.decorated_values.get(key) {
                return Ok(decorated.clone());
            }
        } else if self.local.decorated_values.remove(key).is_some() {
            tracing::trace!("group {} changed; dropping its decorated value", key);
        }

        let values = match self.local.groups.get(key) {
            Some(cached) if cached.members == members => cached.values.clone(),
            _ => {
                let mut values = Vec::new();
                for node in &providers {
                    let outputs = self.call(node)?;
                    for (result, output) in node.results.iter().zip(outputs) {
                        if result == key {
                            values.push(output);
                        }
                    }
                }
                self.local.groups.insert(
                    key.clone(),
                    GroupCache {
                        members,
                        values: values.clone(),
                    },
                );
                values
            }
        };

        let decorator = self
            .levels()
            .find_map(|registry| registry.decorators.get(key).cloned());
        match decorator {
            Some(decorator) => self.decorate(key, &decorator, Resolved::Many(values)),
            None => Ok(Resolved::Many(values)),
        }
    }

    fn decorate(&mut self, key: &TypeKey, decorator: &Decorator, value: Resolved) -> DiResult<Resolved> {
        tracing::trace!("applying decorator {} to {}", decorator.name, key);
        let decorated = (decorator.func)(value)?;
        self.local.decorated_values.insert(key.clone(), decorated.clone());
        Ok(decorated)
    }

    /// Invoke a node once per scope, dependencies first
    fn call(&mut self, node: &Arc<Node>) -> DiResult<Vec<Instance>> {
        if let Some(outputs) = self
            .levels()
            .find_map(|registry| registry.outputs.get(&node.id).cloned())
        {
            return Ok(outputs);
        }

        let mut args = Vec::with_capacity(node.params.len());
        for param in &node.params {
            args.push(self.resolve(param)?);
        }

        tracing::trace!("invoking constructor {}", node.name);
        let outputs = (node.invoke)(args.as_slice()).inspect_err(|error| {
            tracing::warn!("constructor {} failed: {}", node.name, error);
        })?;

        if outputs.len() != node.results.len() {
            return Err(DiError::invalid_argument(format!(
                "constructor {} returned {} values but declares {} results",
                node.name,
                outputs.len(),
                node.results.len()
            )));
        }

        self.local.outputs.insert(node.id, outputs.clone());
        Ok(outputs)
    }
}

fn cycle_error(cycle: &[usize], nodes: &[Arc<Node>]) -> DiError {
    let path = cycle
        .iter()
        .filter_map(|&vertex| nodes.get(vertex))
        .map(|node| CycleEntry {
            constructor: node.name.clone(),
            produces: node.results.clone(),
        })
        .collect();
    DiError::CycleDetected { path }
}
