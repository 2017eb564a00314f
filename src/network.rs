//! A network of LIF samplers with dependency-tracked state.
//!
//! All network state lives in one [`Cache`] bound to a process-wide
//! [`Registry`]: weights and biases in their two unit systems, the recorded
//! spike data and the distributions derived from them. Writing any node
//! invalidates exactly its transitive dependents, so a distribution is only
//! ever recomputed after something it actually depends on changed.
//!
//! Weights and biases form dual representation pairs: either side can be
//! written, and the other side is derived through the samplers' calibrations
//! on first read. Reading either side of a pair that was never written fails
//! with [`SamplingError::NoSourceValue`].
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;
use std::sync::{Arc, OnceLock};

use nalgebra::{DMatrix, DVector};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::calibration::CalibrationStore;
use crate::depend::cache::Cache;
use crate::depend::registry::{Registry, RegistryBuilder};
use crate::distribution;
use crate::error::SamplingError;
use crate::sampler::LifSampler;
use crate::simulator::{NetworkRunConfig, NetworkRunRequest, Simulator};
use crate::spike_train::{Spike, SpikeData};

pub const WEIGHTS_THEO: &str = "weights_theo";
pub const WEIGHTS_BIO: &str = "weights_bio";
pub const BIASES_THEO: &str = "biases_theo";
pub const BIASES_BIO: &str = "biases_bio";
pub const SPIKE_DATA: &str = "spike_data";
pub const ORDERED_SPIKES: &str = "ordered_spikes";
pub const SELECTED_INDICES: &str = "selected_indices";
pub const DIST_MARGINAL_THEO: &str = "dist_marginal_theo";
pub const DIST_JOINT_THEO: &str = "dist_joint_theo";
pub const DIST_MARGINAL_SIM: &str = "dist_marginal_sim";
pub const DIST_JOINT_SIM: &str = "dist_joint_sim";

/// Minimum number of samplers to parallelize weight conversion.
pub const MIN_SAMPLERS_PAR: usize = 8;

/// The value held by one network cache node.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Matrix(DMatrix<f64>),
    Vector(DVector<f64>),
    Indices(Vec<usize>),
    Spikes(SpikeData),
    Ordered(Vec<Spike>),
}

impl Value {
    fn kind(&self) -> &'static str {
        match self {
            Value::Matrix(_) => "matrix",
            Value::Vector(_) => "vector",
            Value::Indices(_) => "indices",
            Value::Spikes(_) => "spike data",
            Value::Ordered(_) => "ordered spikes",
        }
    }

    pub fn as_matrix(&self) -> Result<&DMatrix<f64>, SamplingError> {
        match self {
            Value::Matrix(matrix) => Ok(matrix),
            other => Err(SamplingError::InvalidOperation(format!(
                "expected a matrix value, got {}",
                other.kind()
            ))),
        }
    }

    pub fn as_vector(&self) -> Result<&DVector<f64>, SamplingError> {
        match self {
            Value::Vector(vector) => Ok(vector),
            other => Err(SamplingError::InvalidOperation(format!(
                "expected a vector value, got {}",
                other.kind()
            ))),
        }
    }

    pub fn as_indices(&self) -> Result<&[usize], SamplingError> {
        match self {
            Value::Indices(indices) => Ok(indices),
            other => Err(SamplingError::InvalidOperation(format!(
                "expected an index value, got {}",
                other.kind()
            ))),
        }
    }

    pub fn as_spikes(&self) -> Result<&SpikeData, SamplingError> {
        match self {
            Value::Spikes(spikes) => Ok(spikes),
            other => Err(SamplingError::InvalidOperation(format!(
                "expected spike data, got {}",
                other.kind()
            ))),
        }
    }

    pub fn as_ordered(&self) -> Result<&[Spike], SamplingError> {
        match self {
            Value::Ordered(spikes) => Ok(spikes),
            other => Err(SamplingError::InvalidOperation(format!(
                "expected ordered spikes, got {}",
                other.kind()
            ))),
        }
    }

    fn into_matrix(self) -> Result<DMatrix<f64>, SamplingError> {
        match self {
            Value::Matrix(matrix) => Ok(matrix),
            other => Err(SamplingError::InvalidOperation(format!(
                "expected a matrix value, got {}",
                other.kind()
            ))),
        }
    }

    fn into_vector(self) -> Result<DVector<f64>, SamplingError> {
        match self {
            Value::Vector(vector) => Ok(vector),
            other => Err(SamplingError::InvalidOperation(format!(
                "expected a vector value, got {}",
                other.kind()
            ))),
        }
    }

    fn into_indices(self) -> Result<Vec<usize>, SamplingError> {
        match self {
            Value::Indices(indices) => Ok(indices),
            other => Err(SamplingError::InvalidOperation(format!(
                "expected an index value, got {}",
                other.kind()
            ))),
        }
    }

    fn into_spikes(self) -> Result<SpikeData, SamplingError> {
        match self {
            Value::Spikes(spikes) => Ok(spikes),
            other => Err(SamplingError::InvalidOperation(format!(
                "expected spike data, got {}",
                other.kind()
            ))),
        }
    }
}

/// The plain part of the network the compute functions read from.
pub struct NetworkState {
    samplers: Vec<LifSampler>,
}

fn check_weight_matrix(
    state: &NetworkState,
    weights: DMatrix<f64>,
) -> Result<DMatrix<f64>, SamplingError> {
    let n = state.samplers.len();
    if weights.nrows() != n || weights.ncols() != n {
        return Err(SamplingError::ShapeMismatch(format!(
            "weight matrix is {}x{}, expected {}x{}",
            weights.nrows(),
            weights.ncols(),
            n,
            n
        )));
    }
    let mut weights = weights;
    if weights.diagonal().iter().any(|&w| w != 0.0) {
        log::warn!("The weight matrix has self-connections, zeroing its diagonal");
        weights.fill_diagonal(0.0);
    }
    Ok(weights)
}

fn check_bias_vector(
    state: &NetworkState,
    biases: DVector<f64>,
) -> Result<DVector<f64>, SamplingError> {
    let n = state.samplers.len();
    if biases.len() != n {
        return Err(SamplingError::ShapeMismatch(format!(
            "bias vector has {} entries, expected {}",
            biases.len(),
            n
        )));
    }
    Ok(biases)
}

/// Convert the weight matrix column by column; column `j` holds the weights
/// incoming to sampler `j`, whose calibration decides the conversion.
fn convert_weight_columns(
    state: &NetworkState,
    weights: &DMatrix<f64>,
    convert: fn(&LifSampler, &DVector<f64>) -> Result<DVector<f64>, SamplingError>,
) -> Result<DMatrix<f64>, SamplingError> {
    let n = state.samplers.len();
    let columns: Vec<DVector<f64>> = if n >= MIN_SAMPLERS_PAR {
        (0..n)
            .into_par_iter()
            .map(|j| convert(&state.samplers[j], &weights.column(j).into_owned()))
            .collect::<Result<_, _>>()?
    } else {
        (0..n)
            .map(|j| convert(&state.samplers[j], &weights.column(j).into_owned()))
            .collect::<Result<_, _>>()?
    };
    Ok(DMatrix::from_columns(&columns))
}

fn derived_only(name: &str, input: &Option<Value>) -> Result<(), SamplingError> {
    if input.is_some() {
        return Err(SamplingError::InvalidOperation(format!(
            "node {} is derived and cannot be set",
            name
        )));
    }
    Ok(())
}

fn compute_weights_theo(
    state: &NetworkState,
    cache: &mut Cache<NetworkState, Value>,
    input: Option<Value>,
) -> Result<Value, SamplingError> {
    match input {
        Some(value) => check_weight_matrix(state, value.into_matrix()?).map(Value::Matrix),
        None => {
            let bio = match cache.peek(WEIGHTS_BIO)? {
                Some(value) => value.as_matrix()?.clone(),
                None => return Err(SamplingError::NoSourceValue(WEIGHTS_THEO.to_string())),
            };
            convert_weight_columns(state, &bio, LifSampler::convert_weights_bio_to_theo)
                .map(Value::Matrix)
        }
    }
}

fn compute_weights_bio(
    state: &NetworkState,
    cache: &mut Cache<NetworkState, Value>,
    input: Option<Value>,
) -> Result<Value, SamplingError> {
    match input {
        Some(value) => check_weight_matrix(state, value.into_matrix()?).map(Value::Matrix),
        None => {
            let theo = match cache.peek(WEIGHTS_THEO)? {
                Some(value) => value.as_matrix()?.clone(),
                None => return Err(SamplingError::NoSourceValue(WEIGHTS_BIO.to_string())),
            };
            convert_weight_columns(state, &theo, LifSampler::convert_weights_theo_to_bio)
                .map(Value::Matrix)
        }
    }
}

fn compute_biases_theo(
    state: &NetworkState,
    cache: &mut Cache<NetworkState, Value>,
    input: Option<Value>,
) -> Result<Value, SamplingError> {
    match input {
        Some(value) => check_bias_vector(state, value.into_vector()?).map(Value::Vector),
        None => {
            let bio = match cache.peek(BIASES_BIO)? {
                Some(value) => value.as_vector()?.clone(),
                None => return Err(SamplingError::NoSourceValue(BIASES_THEO.to_string())),
            };
            let mut theo = DVector::zeros(bio.len());
            for (i, sampler) in state.samplers.iter().enumerate() {
                theo[i] = sampler.bias_bio_to_theo(bio[i])?;
            }
            Ok(Value::Vector(theo))
        }
    }
}

fn compute_biases_bio(
    state: &NetworkState,
    cache: &mut Cache<NetworkState, Value>,
    input: Option<Value>,
) -> Result<Value, SamplingError> {
    match input {
        Some(value) => check_bias_vector(state, value.into_vector()?).map(Value::Vector),
        None => {
            let theo = match cache.peek(BIASES_THEO)? {
                Some(value) => value.as_vector()?.clone(),
                None => return Err(SamplingError::NoSourceValue(BIASES_BIO.to_string())),
            };
            let mut bio = DVector::zeros(theo.len());
            for (i, sampler) in state.samplers.iter().enumerate() {
                bio[i] = sampler.bias_theo_to_bio(theo[i])?;
            }
            Ok(Value::Vector(bio))
        }
    }
}

fn compute_spike_data(
    state: &NetworkState,
    _: &mut Cache<NetworkState, Value>,
    input: Option<Value>,
) -> Result<Value, SamplingError> {
    match input {
        Some(value) => {
            let spikes = value.into_spikes()?;
            if spikes.num_channels() != state.samplers.len() {
                return Err(SamplingError::ShapeMismatch(format!(
                    "spike data has {} channels, expected {}",
                    spikes.num_channels(),
                    state.samplers.len()
                )));
            }
            Ok(Value::Spikes(spikes))
        }
        None => Err(SamplingError::NoSourceValue(SPIKE_DATA.to_string())),
    }
}

fn compute_ordered_spikes(
    state: &NetworkState,
    cache: &mut Cache<NetworkState, Value>,
    input: Option<Value>,
) -> Result<Value, SamplingError> {
    derived_only(ORDERED_SPIKES, &input)?;
    let ordered = cache.get(state, SPIKE_DATA)?.as_spikes()?.ordered_spikes();
    Ok(Value::Ordered(ordered))
}

fn compute_selected_indices(
    state: &NetworkState,
    _: &mut Cache<NetworkState, Value>,
    input: Option<Value>,
) -> Result<Value, SamplingError> {
    match input {
        Some(value) => {
            let mut indices = value.into_indices()?;
            let n = state.samplers.len();
            if let Some(&out) = indices.iter().find(|&&k| k >= n) {
                return Err(SamplingError::ShapeMismatch(format!(
                    "selected sampler {} does not exist, the network has {} samplers",
                    out, n
                )));
            }
            indices.sort_unstable();
            indices.dedup();
            Ok(Value::Indices(indices))
        }
        None => Err(SamplingError::NoSourceValue(SELECTED_INDICES.to_string())),
    }
}

/// The weights and biases restricted to the selected samplers.
fn restrict(
    weights: &DMatrix<f64>,
    biases: &DVector<f64>,
    selected: &[usize],
) -> (DMatrix<f64>, DVector<f64>) {
    let k = selected.len();
    let restricted_weights = DMatrix::from_fn(k, k, |a, b| weights[(selected[a], selected[b])]);
    let restricted_biases = DVector::from_fn(k, |a, _| biases[selected[a]]);
    (restricted_weights, restricted_biases)
}

fn compute_dist_marginal_theo(
    state: &NetworkState,
    cache: &mut Cache<NetworkState, Value>,
    input: Option<Value>,
) -> Result<Value, SamplingError> {
    derived_only(DIST_MARGINAL_THEO, &input)?;
    let selected = cache.get(state, SELECTED_INDICES)?.as_indices()?.to_vec();
    let weights = cache.get(state, WEIGHTS_THEO)?.as_matrix()?.clone();
    let biases = cache.get(state, BIASES_THEO)?.as_vector()?.clone();
    let (weights, biases) = restrict(&weights, &biases, &selected);
    distribution::marginal_theo(&weights, &biases).map(Value::Vector)
}

fn compute_dist_joint_theo(
    state: &NetworkState,
    cache: &mut Cache<NetworkState, Value>,
    input: Option<Value>,
) -> Result<Value, SamplingError> {
    derived_only(DIST_JOINT_THEO, &input)?;
    let selected = cache.get(state, SELECTED_INDICES)?.as_indices()?.to_vec();
    let weights = cache.get(state, WEIGHTS_THEO)?.as_matrix()?.clone();
    let biases = cache.get(state, BIASES_THEO)?.as_vector()?.clone();
    let (weights, biases) = restrict(&weights, &biases, &selected);
    distribution::joint_theo(&weights, &biases).map(Value::Vector)
}

fn compute_dist_marginal_sim(
    state: &NetworkState,
    cache: &mut Cache<NetworkState, Value>,
    input: Option<Value>,
) -> Result<Value, SamplingError> {
    derived_only(DIST_MARGINAL_SIM, &input)?;
    let selected = cache.get(state, SELECTED_INDICES)?.as_indices()?.to_vec();
    let tau_refrac: Vec<f64> = selected
        .iter()
        .map(|&k| state.samplers[k].tau_refrac())
        .collect();
    let spikes = cache.get(state, SPIKE_DATA)?.as_spikes()?;
    distribution::marginal_sim(spikes, &selected, &tau_refrac).map(Value::Vector)
}

fn compute_dist_joint_sim(
    state: &NetworkState,
    cache: &mut Cache<NetworkState, Value>,
    input: Option<Value>,
) -> Result<Value, SamplingError> {
    derived_only(DIST_JOINT_SIM, &input)?;
    let selected = cache.get(state, SELECTED_INDICES)?.as_indices()?.to_vec();
    let tau_refrac: Vec<f64> = selected
        .iter()
        .map(|&k| state.samplers[k].tau_refrac())
        .collect();
    let duration = cache.get(state, SPIKE_DATA)?.as_spikes()?.duration();
    let ordered = cache.get(state, ORDERED_SPIKES)?.as_ordered()?;
    distribution::joint_sim(ordered, &selected, &tau_refrac, duration).map(Value::Vector)
}

/// The dependency registry shared by all sampling networks. Built once per
/// process; binding can only fail on a misdeclared graph, which is fatal.
fn registry() -> Arc<Registry<NetworkState, Value>> {
    static REGISTRY: OnceLock<Arc<Registry<NetworkState, Value>>> = OnceLock::new();
    REGISTRY
        .get_or_init(|| {
            let mut builder = RegistryBuilder::new();
            builder.declare(WEIGHTS_THEO, &[WEIGHTS_BIO], compute_weights_theo);
            builder.declare(WEIGHTS_BIO, &[WEIGHTS_THEO], compute_weights_bio);
            builder.declare(BIASES_THEO, &[BIASES_BIO], compute_biases_theo);
            builder.declare(BIASES_BIO, &[BIASES_THEO], compute_biases_bio);
            builder.declare(SPIKE_DATA, &[], compute_spike_data);
            builder.declare(ORDERED_SPIKES, &[SPIKE_DATA], compute_ordered_spikes);
            builder.declare(SELECTED_INDICES, &[], compute_selected_indices);
            builder.declare(
                DIST_MARGINAL_THEO,
                &[SELECTED_INDICES, BIASES_THEO, WEIGHTS_THEO],
                compute_dist_marginal_theo,
            );
            builder.declare(
                DIST_JOINT_THEO,
                &[SELECTED_INDICES, BIASES_THEO, WEIGHTS_THEO],
                compute_dist_joint_theo,
            );
            builder.declare(
                DIST_MARGINAL_SIM,
                &[SPIKE_DATA, SELECTED_INDICES],
                compute_dist_marginal_sim,
            );
            builder.declare(
                DIST_JOINT_SIM,
                &[SPIKE_DATA, SELECTED_INDICES],
                compute_dist_joint_sim,
            );
            Arc::new(builder.bind().expect("the network dependency graph binds"))
        })
        .clone()
}

#[derive(Serialize, Deserialize)]
struct NetworkSnapshot {
    samplers: Vec<LifSampler>,
    weights_theo: DMatrix<f64>,
    biases_theo: DVector<f64>,
    selected_indices: Vec<usize>,
    spike_data: Option<SpikeData>,
}

/// A spike-based sampling network over a fixed set of LIF samplers.
pub struct SamplingNetwork {
    state: NetworkState,
    cache: Cache<NetworkState, Value>,
}

impl SamplingNetwork {
    /// Create a network with zero weights and biases and every sampler
    /// selected.
    pub fn new(samplers: Vec<LifSampler>) -> Result<Self, SamplingError> {
        if samplers.is_empty() {
            return Err(SamplingError::InvalidParameter(
                "a sampling network needs at least one sampler".to_string(),
            ));
        }
        let n = samplers.len();
        let state = NetworkState { samplers };
        let mut cache = Cache::new(registry());
        cache.set(&state, WEIGHTS_THEO, Value::Matrix(DMatrix::zeros(n, n)))?;
        cache.set(&state, BIASES_THEO, Value::Vector(DVector::zeros(n)))?;
        cache.set(
            &state,
            SELECTED_INDICES,
            Value::Indices((0..n).collect()),
        )?;
        Ok(SamplingNetwork { state, cache })
    }

    pub fn num_samplers(&self) -> usize {
        self.state.samplers.len()
    }

    pub fn samplers(&self) -> &[LifSampler] {
        &self.state.samplers
    }

    /// Load one calibration record per sampler from the store. Samplers
    /// whose record failed to load or validate keep their previous
    /// calibration; their indices are returned.
    pub fn load_calibrations(
        &mut self,
        store: &CalibrationStore,
        record_ids: &[u64],
    ) -> Result<Vec<usize>, SamplingError> {
        if record_ids.len() != self.state.samplers.len() {
            return Err(SamplingError::ShapeMismatch(format!(
                "{} calibration records for {} samplers",
                record_ids.len(),
                self.state.samplers.len()
            )));
        }
        let mut failed = Vec::new();
        for (i, (sampler, &record_id)) in self
            .state
            .samplers
            .iter_mut()
            .zip(record_ids)
            .enumerate()
        {
            if let Err(e) = sampler.load_calibration(store, record_id) {
                log::warn!("Sampler {} failed to load calibration record {}: {}", i, record_id, e);
                failed.push(i);
            }
        }
        Ok(failed)
    }

    pub fn weights_theo(&mut self) -> Result<DMatrix<f64>, SamplingError> {
        self.cache
            .get(&self.state, WEIGHTS_THEO)?
            .as_matrix()
            .map(Clone::clone)
    }

    pub fn weights_bio(&mut self) -> Result<DMatrix<f64>, SamplingError> {
        self.cache
            .get(&self.state, WEIGHTS_BIO)?
            .as_matrix()
            .map(Clone::clone)
    }

    pub fn biases_theo(&mut self) -> Result<DVector<f64>, SamplingError> {
        self.cache
            .get(&self.state, BIASES_THEO)?
            .as_vector()
            .map(Clone::clone)
    }

    pub fn biases_bio(&mut self) -> Result<DVector<f64>, SamplingError> {
        self.cache
            .get(&self.state, BIASES_BIO)?
            .as_vector()
            .map(Clone::clone)
    }

    pub fn spike_data(&mut self) -> Result<SpikeData, SamplingError> {
        self.cache
            .get(&self.state, SPIKE_DATA)?
            .as_spikes()
            .map(Clone::clone)
    }

    pub fn ordered_spikes(&mut self) -> Result<Vec<Spike>, SamplingError> {
        self.cache
            .get(&self.state, ORDERED_SPIKES)?
            .as_ordered()
            .map(<[Spike]>::to_vec)
    }

    pub fn selected_indices(&mut self) -> Result<Vec<usize>, SamplingError> {
        self.cache
            .get(&self.state, SELECTED_INDICES)?
            .as_indices()
            .map(<[usize]>::to_vec)
    }

    pub fn dist_marginal_theo(&mut self) -> Result<DVector<f64>, SamplingError> {
        self.cache
            .get(&self.state, DIST_MARGINAL_THEO)?
            .as_vector()
            .map(Clone::clone)
    }

    pub fn dist_joint_theo(&mut self) -> Result<DVector<f64>, SamplingError> {
        self.cache
            .get(&self.state, DIST_JOINT_THEO)?
            .as_vector()
            .map(Clone::clone)
    }

    pub fn dist_marginal_sim(&mut self) -> Result<DVector<f64>, SamplingError> {
        self.cache
            .get(&self.state, DIST_MARGINAL_SIM)?
            .as_vector()
            .map(Clone::clone)
    }

    pub fn dist_joint_sim(&mut self) -> Result<DVector<f64>, SamplingError> {
        self.cache
            .get(&self.state, DIST_JOINT_SIM)?
            .as_vector()
            .map(Clone::clone)
    }

    pub fn set_weights_theo(&mut self, weights: DMatrix<f64>) -> Result<(), SamplingError> {
        self.cache.set(&self.state, WEIGHTS_THEO, Value::Matrix(weights))
    }

    pub fn set_weights_bio(&mut self, weights: DMatrix<f64>) -> Result<(), SamplingError> {
        self.cache.set(&self.state, WEIGHTS_BIO, Value::Matrix(weights))
    }

    pub fn set_biases_theo(&mut self, biases: DVector<f64>) -> Result<(), SamplingError> {
        self.cache.set(&self.state, BIASES_THEO, Value::Vector(biases))
    }

    pub fn set_biases_bio(&mut self, biases: DVector<f64>) -> Result<(), SamplingError> {
        self.cache.set(&self.state, BIASES_BIO, Value::Vector(biases))
    }

    pub fn set_spike_data(&mut self, spike_data: SpikeData) -> Result<(), SamplingError> {
        self.cache.set(&self.state, SPIKE_DATA, Value::Spikes(spike_data))
    }

    /// Restrict the distribution nodes to the given samplers. Indices are
    /// deduplicated and stored in ascending order.
    pub fn set_selected_indices(&mut self, indices: Vec<usize>) -> Result<(), SamplingError> {
        self.cache
            .set(&self.state, SELECTED_INDICES, Value::Indices(indices))
    }

    /// Drop one node's cached value and cascade to its dependents.
    pub fn wipe(&mut self, name: &str) -> Result<(), SamplingError> {
        self.cache.invalidate(name)
    }

    /// Whether the named node currently holds a cached value.
    pub fn is_cached(&self, name: &str) -> Result<bool, SamplingError> {
        self.cache.is_present(name)
    }

    /// Run the network on the external simulator and store the recorded
    /// spike data, invalidating every distribution derived from it.
    pub fn gather_spikes<S: Simulator>(
        &mut self,
        simulator: &S,
        config: NetworkRunConfig,
    ) -> Result<(), SamplingError> {
        let request = NetworkRunRequest {
            weights_bio: self.weights_bio()?,
            biases_bio: self.biases_bio()?,
            parameters: self
                .state
                .samplers
                .iter()
                .map(|sampler| sampler.parameters().clone())
                .collect(),
            config,
        };
        log::info!(
            "Gathering spike data for {} samplers in subprocess..",
            self.num_samplers()
        );
        let spike_data = simulator.run_network(&request)?;
        self.set_spike_data(spike_data)
    }

    /// Write the network to a JSON file: samplers with their calibrations,
    /// the theoretical weights and biases, the selection and the recorded
    /// spike data, if any.
    pub fn save_to<P: AsRef<Path>>(&mut self, path: P) -> Result<(), SamplingError> {
        let snapshot = NetworkSnapshot {
            samplers: self.state.samplers.clone(),
            weights_theo: self.weights_theo()?,
            biases_theo: self.biases_theo()?,
            selected_indices: self.selected_indices()?,
            spike_data: match self.cache.peek(SPIKE_DATA)? {
                Some(value) => Some(value.as_spikes()?.clone()),
                None => None,
            },
        };
        let file = File::create(path.as_ref())
            .map_err(|e| SamplingError::IOError(format!("{}: {}", path.as_ref().display(), e)))?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, &snapshot)
            .map_err(|e| SamplingError::IOError(e.to_string()))?;
        writer
            .flush()
            .map_err(|e| SamplingError::IOError(e.to_string()))?;
        log::info!("Saved sampling network to {}", path.as_ref().display());
        Ok(())
    }

    /// Rebuild a network from a file written by [`SamplingNetwork::save_to`].
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<SamplingNetwork, SamplingError> {
        let file = File::open(path.as_ref())
            .map_err(|e| SamplingError::IOError(format!("{}: {}", path.as_ref().display(), e)))?;
        let reader = BufReader::new(file);
        let snapshot: NetworkSnapshot =
            serde_json::from_reader(reader).map_err(|e| SamplingError::IOError(e.to_string()))?;

        let mut network = SamplingNetwork::new(snapshot.samplers)?;
        network.set_weights_theo(snapshot.weights_theo)?;
        network.set_biases_theo(snapshot.biases_theo)?;
        network.set_selected_indices(snapshot.selected_indices)?;
        if let Some(spike_data) = snapshot.spike_data {
            network.set_spike_data(spike_data)?;
        }
        log::info!("Loaded sampling network from {}", path.as_ref().display());
        Ok(network)
    }
}
