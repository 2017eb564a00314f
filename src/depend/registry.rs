//! Per-type registry of dependency-tracked nodes.
//!
//! Declarations are collected on a [`RegistryBuilder`] in base-to-derived
//! order and resolved by [`RegistryBuilder::bind`] into a [`Registry`] of
//! id-based nodes with forward (dependency) and reverse (dependent) edges.
use std::collections::HashMap;

use crate::error::SamplingError;

use super::cache::Cache;

/// Identifies a bound node within its registry.
pub type NodeId = usize;

/// A single function serving as both getter and setter of a node.
///
/// Called with `None`, it derives the value from the owner and the other
/// nodes of the cache. Called with `Some(value)`, it validates and
/// normalizes the explicit value to store. It must be free of side effects
/// beyond returning the value; in particular it must not write to other
/// nodes, or the invalidation cascade no longer reflects the real data flow.
pub type ComputeFn<O, V> = fn(&O, &mut Cache<O, V>, Option<V>) -> Result<V, SamplingError>;

struct NodeSpec<O, V> {
    name: &'static str,
    dependency_names: Vec<&'static str>,
    compute: ComputeFn<O, V>,
}

/// A bound node: compute function plus resolved dependency edges.
pub struct Node<O, V> {
    name: &'static str,
    dependencies: Vec<NodeId>,
    dependents: Vec<NodeId>,
    compute: ComputeFn<O, V>,
}

impl<O, V> Node<O, V> {
    /// The name the node was declared under.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// The nodes this node reads when recomputing.
    pub fn dependencies(&self) -> &[NodeId] {
        &self.dependencies
    }

    /// The nodes invalidated when this node changes.
    pub fn dependents(&self) -> &[NodeId] {
        &self.dependents
    }

    pub(super) fn compute(&self) -> ComputeFn<O, V> {
        self.compute
    }
}

/// Collects node declarations for one owner type.
pub struct RegistryBuilder<O, V> {
    specs: Vec<NodeSpec<O, V>>,
    index: HashMap<&'static str, NodeId>,
}

impl<O, V> RegistryBuilder<O, V> {
    pub fn new() -> Self {
        RegistryBuilder {
            specs: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Declare a node with its dependency names and compute function.
    ///
    /// Redeclaring a name overrides the previous compute function and
    /// dependency list while keeping the node's id, so edges bound to the
    /// name keep cascading through the override. This is how a refinement of
    /// a base node participates in the graph declared by the base.
    pub fn declare(
        &mut self,
        name: &'static str,
        dependency_names: &[&'static str],
        compute: ComputeFn<O, V>,
    ) -> &mut Self {
        let spec = NodeSpec {
            name,
            dependency_names: dependency_names.to_vec(),
            compute,
        };
        match self.index.get(name) {
            Some(&id) => self.specs[id] = spec,
            None => {
                self.index.insert(name, self.specs.len());
                self.specs.push(spec);
            }
        }
        self
    }

    /// Resolve every declared dependency name to a node id and build the
    /// reverse edges. Fails with [`SamplingError::Binding`] if a dependency
    /// name has no declaration; this is a configuration error, fatal at
    /// startup.
    pub fn bind(self) -> Result<Registry<O, V>, SamplingError> {
        let mut nodes: Vec<Node<O, V>> = Vec::with_capacity(self.specs.len());
        for spec in &self.specs {
            let mut dependencies = Vec::with_capacity(spec.dependency_names.len());
            for dependency_name in &spec.dependency_names {
                let id = self.index.get(dependency_name).copied().ok_or_else(|| {
                    SamplingError::Binding(format!(
                        "node {} depends on undeclared node {}",
                        spec.name, dependency_name
                    ))
                })?;
                if !dependencies.contains(&id) {
                    dependencies.push(id);
                }
            }
            nodes.push(Node {
                name: spec.name,
                dependencies,
                dependents: Vec::new(),
                compute: spec.compute,
            });
        }

        for id in 0..nodes.len() {
            let dependencies = nodes[id].dependencies.clone();
            for dependency in dependencies {
                nodes[dependency].dependents.push(id);
            }
        }

        log::debug!("Bound dependency registry with {} nodes", nodes.len());
        Ok(Registry {
            nodes,
            index: self.index,
        })
    }
}

impl<O, V> Default for RegistryBuilder<O, V> {
    fn default() -> Self {
        RegistryBuilder::new()
    }
}

/// The bound, immutable dependency graph of one owner type.
///
/// Built at most once per type and shared by all of its instances.
pub struct Registry<O, V> {
    nodes: Vec<Node<O, V>>,
    index: HashMap<&'static str, NodeId>,
}

impl<O, V> Registry<O, V> {
    /// The id bound to a node name.
    pub fn id(&self, name: &str) -> Result<NodeId, SamplingError> {
        self.index
            .get(name)
            .copied()
            .ok_or_else(|| SamplingError::UnknownNode(name.to_string()))
    }

    /// The node bound to an id.
    pub fn node(&self, id: NodeId) -> &Node<O, V> {
        &self.nodes[id]
    }

    /// The number of bound nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn constant(_: &(), _: &mut Cache<(), f64>, input: Option<f64>) -> Result<f64, SamplingError> {
        Ok(input.unwrap_or(1.0))
    }

    fn other_constant(
        _: &(),
        _: &mut Cache<(), f64>,
        input: Option<f64>,
    ) -> Result<f64, SamplingError> {
        Ok(input.unwrap_or(10.0))
    }

    fn derived(owner: &(), cache: &mut Cache<(), f64>, _: Option<f64>) -> Result<f64, SamplingError> {
        Ok(2.0 * *cache.get(owner, "base")?)
    }

    #[test]
    fn test_bind_resolves_edges() {
        let mut builder = RegistryBuilder::new();
        builder.declare("base", &[], constant);
        builder.declare("derived", &["base"], derived);
        let registry = builder.bind().unwrap();

        let base = registry.id("base").unwrap();
        let dependent = registry.id("derived").unwrap();
        assert_eq!(registry.node(dependent).dependencies(), &[base]);
        assert_eq!(registry.node(base).dependents(), &[dependent]);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_bind_missing_dependency() {
        let mut builder = RegistryBuilder::new();
        builder.declare("derived", &["base"], derived);
        assert_eq!(
            builder.bind().err(),
            Some(SamplingError::Binding(
                "node derived depends on undeclared node base".to_string()
            ))
        );
    }

    #[test]
    fn test_redeclare_overrides_in_place() {
        let mut builder = RegistryBuilder::new();
        builder.declare("base", &[], constant);
        builder.declare("derived", &["base"], derived);
        builder.declare("base", &[], other_constant);
        let registry = builder.bind().unwrap();

        // the override keeps the original id, so the dependent edge survives
        let base = registry.id("base").unwrap();
        let dependent = registry.id("derived").unwrap();
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.node(base).dependents(), &[dependent]);

        let mut cache = Cache::new(std::sync::Arc::new(registry));
        assert_eq!(*cache.get(&(), "derived").unwrap(), 20.0);
    }

    #[test]
    fn test_duplicate_dependency_names_collapse() {
        let mut builder = RegistryBuilder::new();
        builder.declare("base", &[], constant);
        builder.declare("derived", &["base", "base"], derived);
        let registry = builder.bind().unwrap();

        let base = registry.id("base").unwrap();
        assert_eq!(registry.node(base).dependents().len(), 1);
    }

    #[test]
    fn test_unknown_node() {
        let builder: RegistryBuilder<(), f64> = RegistryBuilder::new();
        let registry = builder.bind().unwrap();
        assert_eq!(
            registry.id("nope").err(),
            Some(SamplingError::UnknownNode("nope".to_string()))
        );
    }
}
