//! Dependency-tracked lazy value cache.
//!
//! A *node* is a named attribute whose value is computed on demand, cached
//! until invalidated, and recomputed when any of its declared dependencies
//! changes. Nodes are declared once per owner type on a [`registry::RegistryBuilder`]
//! and bound into an immutable [`registry::Registry`]; every instance of the
//! owner type then holds its own [`cache::Cache`] with one slot per node.
//!
//! A write to a node invalidates all of its transitive dependents; the next
//! read of any node in that subtree recomputes it exactly once. Two nodes may
//! depend on each other to form a dual representation of the same quantity
//! (each side derivable from the other); such compute functions must read the
//! other side with [`cache::Cache::peek`] so that only the materialized side
//! is ever consulted.
//!
//! # Examples
//!
//! ```
//! use std::sync::Arc;
//! use spike_sampling::depend::cache::Cache;
//! use spike_sampling::depend::registry::RegistryBuilder;
//! use spike_sampling::error::SamplingError;
//!
//! fn count(_: &(), _: &mut Cache<(), f64>, input: Option<f64>) -> Result<f64, SamplingError> {
//!     input.ok_or_else(|| SamplingError::NoSourceValue("count".to_string()))
//! }
//!
//! fn twice(owner: &(), cache: &mut Cache<(), f64>, _: Option<f64>) -> Result<f64, SamplingError> {
//!     Ok(2.0 * *cache.get(owner, "count")?)
//! }
//!
//! let mut builder = RegistryBuilder::new();
//! builder.declare("count", &[], count);
//! builder.declare("twice", &["count"], twice);
//! let registry = Arc::new(builder.bind().unwrap());
//!
//! let mut cache = Cache::new(registry);
//! cache.set(&(), "count", 21.0).unwrap();
//! assert_eq!(*cache.get(&(), "twice").unwrap(), 42.0);
//!
//! // a write to a node invalidates its dependents before the next read
//! cache.set(&(), "count", 3.0).unwrap();
//! assert_eq!(*cache.get(&(), "twice").unwrap(), 6.0);
//! ```
pub mod cache;
pub mod registry;
