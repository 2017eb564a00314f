//! Per-instance cached slots of a bound dependency registry.
use std::sync::Arc;

use crate::error::SamplingError;

use super::registry::{NodeId, Registry};

enum Slot<V> {
    /// Stale or never computed.
    Absent,
    /// Recomputation in flight; reading the node again is a cycle.
    Computing,
    Present(V),
}

/// One cached value slot per registry node, independent across instances of
/// the same owner type.
///
/// The cache itself performs no locking; an instance and its whole dependency
/// subtree form a single unit of mutual exclusion for the caller.
pub struct Cache<O, V> {
    registry: Arc<Registry<O, V>>,
    slots: Vec<Slot<V>>,
}

impl<O, V> Cache<O, V> {
    pub fn new(registry: Arc<Registry<O, V>>) -> Self {
        let slots = (0..registry.len()).map(|_| Slot::Absent).collect();
        Cache { registry, slots }
    }

    /// The registry this cache is bound to.
    pub fn registry(&self) -> &Arc<Registry<O, V>> {
        &self.registry
    }

    /// Return the cached value, computing and storing it first if the slot
    /// is stale. Compute functions may re-entrantly `get` their
    /// dependencies; reading a node that is itself being computed is
    /// reported as a [`SamplingError::DependencyCycle`] instead of recursing
    /// forever. A failed computation leaves the slot stale.
    pub fn get(&mut self, owner: &O, name: &str) -> Result<&V, SamplingError> {
        let id = self.registry.id(name)?;
        self.get_by_id(owner, id)
    }

    pub fn get_by_id(&mut self, owner: &O, id: NodeId) -> Result<&V, SamplingError> {
        if matches!(self.slots[id], Slot::Computing) {
            return Err(SamplingError::DependencyCycle(format!(
                "node {} is read while it is being computed",
                self.registry.node(id).name()
            )));
        }

        if matches!(self.slots[id], Slot::Absent) {
            log::debug!("Node {} is stale, recomputing", self.registry.node(id).name());
            let compute = self.registry.node(id).compute();
            self.slots[id] = Slot::Computing;
            match compute(owner, self, None) {
                Ok(value) => self.slots[id] = Slot::Present(value),
                Err(e) => {
                    self.slots[id] = Slot::Absent;
                    return Err(e);
                }
            }
        }

        match &self.slots[id] {
            Slot::Present(value) => Ok(value),
            _ => unreachable!(),
        }
    }

    /// Normalize an explicit value through the node's compute function and
    /// store it, invalidating the node and all of its transitive dependents.
    ///
    /// Normalization runs first: a rejected write returns the error and
    /// leaves every cached value untouched. The node itself is cleared even
    /// if it was already stale, so dependents that are stale for another
    /// reason still see the cascade.
    pub fn set(&mut self, owner: &O, name: &str, value: V) -> Result<(), SamplingError> {
        let id = self.registry.id(name)?;
        self.set_by_id(owner, id, value)
    }

    pub fn set_by_id(&mut self, owner: &O, id: NodeId, value: V) -> Result<(), SamplingError> {
        let compute = self.registry.node(id).compute();
        let normalized = compute(owner, self, Some(value))?;
        log::debug!("Setting node {}", self.registry.node(id).name());
        self.invalidate_by_id(id, true);
        self.slots[id] = Slot::Present(normalized);
        Ok(())
    }

    /// Clear a node and cascade to its dependents. A no-op if the node is
    /// already stale; this bounds diamond-shaped cascades without tracking
    /// visited nodes.
    pub fn invalidate(&mut self, name: &str) -> Result<(), SamplingError> {
        let id = self.registry.id(name)?;
        self.invalidate_by_id(id, false);
        Ok(())
    }

    fn invalidate_by_id(&mut self, id: NodeId, force: bool) {
        if !force && !matches!(self.slots[id], Slot::Present(_)) {
            return;
        }
        self.slots[id] = Slot::Absent;
        let dependents = self.registry.node(id).dependents().to_vec();
        for dependent in dependents {
            self.invalidate_by_id(dependent, false);
        }
    }

    /// The cached value, without triggering any recomputation.
    pub fn peek(&self, name: &str) -> Result<Option<&V>, SamplingError> {
        let id = self.registry.id(name)?;
        Ok(self.peek_by_id(id))
    }

    pub fn peek_by_id(&self, id: NodeId) -> Option<&V> {
        match &self.slots[id] {
            Slot::Present(value) => Some(value),
            _ => None,
        }
    }

    /// Whether the node currently holds a cached value.
    pub fn is_present(&self, name: &str) -> Result<bool, SamplingError> {
        Ok(self.peek(name)?.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::depend::registry::RegistryBuilder;
    use std::cell::Cell;

    /// Test owner counting the compute invocations of each node.
    #[derive(Default)]
    struct Probe {
        base_calls: Cell<usize>,
        double_calls: Cell<usize>,
        triple_calls: Cell<usize>,
        sum_calls: Cell<usize>,
    }

    fn base(owner: &Probe, _: &mut Cache<Probe, f64>, input: Option<f64>) -> Result<f64, SamplingError> {
        owner.base_calls.set(owner.base_calls.get() + 1);
        if let Some(value) = input {
            if value < 0.0 {
                return Err(SamplingError::InvalidParameter(
                    "base must be non-negative".to_string(),
                ));
            }
            return Ok(value);
        }
        Ok(1.0)
    }

    fn double(
        owner: &Probe,
        cache: &mut Cache<Probe, f64>,
        _: Option<f64>,
    ) -> Result<f64, SamplingError> {
        owner.double_calls.set(owner.double_calls.get() + 1);
        Ok(2.0 * *cache.get(owner, "base")?)
    }

    fn triple(
        owner: &Probe,
        cache: &mut Cache<Probe, f64>,
        _: Option<f64>,
    ) -> Result<f64, SamplingError> {
        owner.triple_calls.set(owner.triple_calls.get() + 1);
        Ok(3.0 * *cache.get(owner, "base")?)
    }

    fn sum(owner: &Probe, cache: &mut Cache<Probe, f64>, _: Option<f64>) -> Result<f64, SamplingError> {
        owner.sum_calls.set(owner.sum_calls.get() + 1);
        let double = *cache.get(owner, "double")?;
        let triple = *cache.get(owner, "triple")?;
        Ok(double + triple)
    }

    fn lonely(_: &Probe, _: &mut Cache<Probe, f64>, input: Option<f64>) -> Result<f64, SamplingError> {
        Ok(input.unwrap_or(-1.0))
    }

    /// A diamond: base -> {double, triple} -> sum, plus an unrelated node.
    fn diamond() -> (Probe, Cache<Probe, f64>) {
        let mut builder = RegistryBuilder::new();
        builder.declare("base", &[], base);
        builder.declare("double", &["base"], double);
        builder.declare("triple", &["base"], triple);
        builder.declare("sum", &["double", "triple"], sum);
        builder.declare("lonely", &[], lonely);
        let registry = Arc::new(builder.bind().unwrap());
        (Probe::default(), Cache::new(registry))
    }

    #[test]
    fn test_get_computes_once() {
        let (probe, mut cache) = diamond();
        assert_eq!(*cache.get(&probe, "sum").unwrap(), 5.0);
        assert_eq!(probe.base_calls.get(), 1);
        assert_eq!(probe.double_calls.get(), 1);
        assert_eq!(probe.triple_calls.get(), 1);
        assert_eq!(probe.sum_calls.get(), 1);

        // a second read returns the cached value without recomputation
        assert_eq!(*cache.get(&probe, "sum").unwrap(), 5.0);
        assert_eq!(probe.base_calls.get(), 1);
        assert_eq!(probe.sum_calls.get(), 1);
    }

    #[test]
    fn test_set_cascades_through_diamond() {
        let (probe, mut cache) = diamond();
        assert_eq!(*cache.get(&probe, "sum").unwrap(), 5.0);

        cache.set(&probe, "base", 2.0).unwrap();
        assert!(!cache.is_present("double").unwrap());
        assert!(!cache.is_present("triple").unwrap());
        assert!(!cache.is_present("sum").unwrap());

        assert_eq!(*cache.get(&probe, "sum").unwrap(), 10.0);
        // each node recomputed exactly once after the write
        assert_eq!(probe.double_calls.get(), 2);
        assert_eq!(probe.triple_calls.get(), 2);
        assert_eq!(probe.sum_calls.get(), 2);
        // the setter invocation is the only extra call to base
        assert_eq!(probe.base_calls.get(), 2);
    }

    #[test]
    fn test_unrelated_node_retained() {
        let (probe, mut cache) = diamond();
        cache.set(&probe, "lonely", 7.0).unwrap();
        assert_eq!(*cache.get(&probe, "sum").unwrap(), 5.0);

        cache.set(&probe, "base", 4.0).unwrap();
        assert_eq!(cache.peek("lonely").unwrap(), Some(&7.0));
    }

    #[test]
    fn test_rejected_write_leaves_cache_untouched() {
        let (probe, mut cache) = diamond();
        cache.set(&probe, "base", 2.0).unwrap();
        assert_eq!(*cache.get(&probe, "sum").unwrap(), 10.0);

        assert_eq!(
            cache.set(&probe, "base", -1.0).err(),
            Some(SamplingError::InvalidParameter(
                "base must be non-negative".to_string()
            ))
        );
        assert_eq!(cache.peek("base").unwrap(), Some(&2.0));
        assert_eq!(cache.peek("sum").unwrap(), Some(&10.0));
    }

    #[test]
    fn test_set_after_invalidate_cascades() {
        let (probe, mut cache) = diamond();
        assert_eq!(*cache.get(&probe, "sum").unwrap(), 5.0);

        // base is stale, but its dependents are not
        cache.invalidate("base").unwrap();
        assert!(!cache.is_present("base").unwrap());
        assert!(!cache.is_present("sum").unwrap());

        // re-read, then invalidate only base again via a fresh write
        assert_eq!(*cache.get(&probe, "sum").unwrap(), 5.0);
        cache.set(&probe, "base", 3.0).unwrap();
        assert!(!cache.is_present("sum").unwrap());
        assert_eq!(*cache.get(&probe, "sum").unwrap(), 15.0);
    }

    #[test]
    fn test_invalidate_absent_is_noop() {
        let (probe, mut cache) = diamond();
        assert_eq!(*cache.get(&probe, "double").unwrap(), 2.0);
        cache.invalidate("sum").unwrap();
        assert!(cache.is_present("double").unwrap());

        // invalidating twice cascades only once
        cache.invalidate("base").unwrap();
        cache.invalidate("base").unwrap();
        assert!(!cache.is_present("double").unwrap());
    }

    fn cyclic_left(
        owner: &Probe,
        cache: &mut Cache<Probe, f64>,
        _: Option<f64>,
    ) -> Result<f64, SamplingError> {
        Ok(*cache.get(owner, "right")? + 1.0)
    }

    fn cyclic_right(
        owner: &Probe,
        cache: &mut Cache<Probe, f64>,
        _: Option<f64>,
    ) -> Result<f64, SamplingError> {
        Ok(*cache.get(owner, "left")? + 1.0)
    }

    #[test]
    fn test_unguarded_cycle_is_detected() {
        let mut builder = RegistryBuilder::new();
        builder.declare("left", &["right"], cyclic_left);
        builder.declare("right", &["left"], cyclic_right);
        let registry = Arc::new(builder.bind().unwrap());
        let mut cache = Cache::new(registry);
        let probe = Probe::default();

        assert!(matches!(
            cache.get(&probe, "left"),
            Err(SamplingError::DependencyCycle(_))
        ));
        // the failed computation leaves both slots stale
        assert!(!cache.is_present("left").unwrap());
        assert!(!cache.is_present("right").unwrap());
    }

    fn celsius(
        _: &Probe,
        cache: &mut Cache<Probe, f64>,
        input: Option<f64>,
    ) -> Result<f64, SamplingError> {
        match input {
            Some(value) => Ok(value),
            None => match cache.peek("fahrenheit")? {
                Some(&fahrenheit) => Ok((fahrenheit - 32.0) / 1.8),
                None => Err(SamplingError::NoSourceValue("celsius".to_string())),
            },
        }
    }

    fn fahrenheit(
        _: &Probe,
        cache: &mut Cache<Probe, f64>,
        input: Option<f64>,
    ) -> Result<f64, SamplingError> {
        match input {
            Some(value) => Ok(value),
            None => match cache.peek("celsius")? {
                Some(&celsius) => Ok(celsius * 1.8 + 32.0),
                None => Err(SamplingError::NoSourceValue("fahrenheit".to_string())),
            },
        }
    }

    fn dual() -> (Probe, Cache<Probe, f64>) {
        let mut builder = RegistryBuilder::new();
        builder.declare("celsius", &["fahrenheit"], celsius);
        builder.declare("fahrenheit", &["celsius"], fahrenheit);
        let registry = Arc::new(builder.bind().unwrap());
        (Probe::default(), Cache::new(registry))
    }

    #[test]
    fn test_dual_representation_round_trip() {
        let (probe, mut cache) = dual();
        cache.set(&probe, "celsius", 100.0).unwrap();
        assert_eq!(*cache.get(&probe, "fahrenheit").unwrap(), 212.0);

        // writing one side invalidates the other; only the written side is
        // ever the source of truth
        cache.set(&probe, "fahrenheit", 32.0).unwrap();
        assert!(!cache.is_present("celsius").unwrap());
        assert!((*cache.get(&probe, "celsius").unwrap()).abs() < 1e-12);
    }

    #[test]
    fn test_dual_representation_without_source() {
        let (probe, mut cache) = dual();
        assert_eq!(
            cache.get(&probe, "celsius").err(),
            Some(SamplingError::NoSourceValue("celsius".to_string()))
        );
    }
}
