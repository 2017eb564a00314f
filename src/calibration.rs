//! Calibration records and their persistence.
//!
//! A calibration captures how one LIF sampler responds to its resting
//! potential: the measured activation curve and the sigmoid fit through it.
//! The fit is what ties the two unit systems together: theoretical weights
//! and biases (the Boltzmann machine side) convert to biological ones
//! (potentials and synaptic weights) through its midpoint and slope.
//!
//! Records live in a [`CalibrationStore`], a plain directory of JSON files
//! looked up by integer id. The store is passed explicitly to everything
//! that needs persistence; there is no ambient "current database".
use std::fs;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::SamplingError;

/// Membrane and synapse parameters of a LIF sampler neuron.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NeuronParameters {
    /// Membrane capacitance (nF).
    pub cm: f64,
    /// Membrane time constant (ms).
    pub tau_m: f64,
    /// Excitatory synaptic time constant (ms).
    pub tau_syn_e: f64,
    /// Inhibitory synaptic time constant (ms).
    pub tau_syn_i: f64,
    /// Refractory period (ms). Also the width of one sampling state.
    pub tau_refrac: f64,
    /// Resting potential (mV).
    pub v_rest: f64,
    /// Reset potential (mV).
    pub v_reset: f64,
    /// Firing threshold (mV).
    pub v_thresh: f64,
}

impl NeuronParameters {
    /// Check the parameters for validity: all time constants and the
    /// capacitance must be positive and finite.
    pub fn validate(&self) -> Result<(), SamplingError> {
        for (name, value) in [
            ("cm", self.cm),
            ("tau_m", self.tau_m),
            ("tau_syn_e", self.tau_syn_e),
            ("tau_syn_i", self.tau_syn_i),
            ("tau_refrac", self.tau_refrac),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(SamplingError::InvalidParameter(format!(
                    "{} must be positive and finite, got {}",
                    name, value
                )));
            }
        }
        for (name, value) in [
            ("v_rest", self.v_rest),
            ("v_reset", self.v_reset),
            ("v_thresh", self.v_thresh),
        ] {
            if !value.is_finite() {
                return Err(SamplingError::InvalidParameter(format!(
                    "{} must be finite, got {}",
                    name, value
                )));
            }
        }
        Ok(())
    }
}

impl Default for NeuronParameters {
    /// High-conductance parameters of a typical sampling neuron.
    fn default() -> Self {
        NeuronParameters {
            cm: 0.2,
            tau_m: 1.0,
            tau_syn_e: 10.0,
            tau_syn_i: 10.0,
            tau_refrac: 10.0,
            v_rest: -50.0,
            v_reset: -50.001,
            v_thresh: -50.0,
        }
    }
}

/// The sigmoid activation curve fitted to a calibration run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationFit {
    /// Resting potential at which the sampler is on half of the time (mV).
    pub v_p05: f64,
    /// Slope factor of the activation curve (mV per unit of theoretical bias).
    pub alpha: f64,
}

impl CalibrationFit {
    /// Create a fit; the slope factor must be positive.
    pub fn new(v_p05: f64, alpha: f64) -> Result<Self, SamplingError> {
        if !v_p05.is_finite() {
            return Err(SamplingError::InvalidParameter(format!(
                "v_p05 must be finite, got {}",
                v_p05
            )));
        }
        if !alpha.is_finite() || alpha <= 0.0 {
            return Err(SamplingError::InvalidParameter(format!(
                "alpha must be positive and finite, got {}",
                alpha
            )));
        }
        Ok(CalibrationFit { v_p05, alpha })
    }

    /// Predicted on-probability at the given resting potential.
    pub fn p_on(&self, v_rest: f64) -> f64 {
        1.0 / (1.0 + (-(v_rest - self.v_p05) / self.alpha).exp())
    }
}

/// One calibration run of one sampler: the raw measurements, the fitted
/// activation curve and the neuron parameters it was obtained with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationRecord {
    /// Simulation duration per stimulus level (ms).
    pub duration: f64,
    /// Number of samples taken per stimulus level.
    pub num_samples: usize,
    /// Resting potentials the sampler was probed at (mV).
    pub stimulus_levels: Vec<f64>,
    /// Measured on-probabilities, one per stimulus level.
    pub response_probabilities: Vec<f64>,
    /// The activation curve fitted to the measurements.
    pub fit: CalibrationFit,
    /// The neuron parameters the sampler was calibrated with.
    pub parameters: NeuronParameters,
}

impl CalibrationRecord {
    /// A record carrying only a fit, e.g., an analytically derived
    /// calibration with no measured curve behind it.
    pub fn from_fit(fit: CalibrationFit, parameters: NeuronParameters) -> Self {
        CalibrationRecord {
            duration: 1e5,
            num_samples: 0,
            stimulus_levels: Vec::new(),
            response_probabilities: Vec::new(),
            fit,
            parameters,
        }
    }

    pub fn save_to<P: AsRef<Path>>(&self, path: P) -> Result<(), SamplingError> {
        let file = File::create(path.as_ref())
            .map_err(|e| SamplingError::IOError(format!("{}: {}", path.as_ref().display(), e)))?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, self)
            .map_err(|e| SamplingError::IOError(e.to_string()))?;
        writer
            .flush()
            .map_err(|e| SamplingError::IOError(e.to_string()))?;
        Ok(())
    }

    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<CalibrationRecord, SamplingError> {
        let file = File::open(path.as_ref())
            .map_err(|e| SamplingError::IOError(format!("{}: {}", path.as_ref().display(), e)))?;
        let reader = BufReader::new(file);
        serde_json::from_reader(reader).map_err(|e| SamplingError::IOError(e.to_string()))
    }
}

/// Filesystem-backed store of calibration records, looked up by integer id.
#[derive(Debug, Clone, PartialEq)]
pub struct CalibrationStore {
    root: PathBuf,
}

impl CalibrationStore {
    /// Open a store rooted at the given directory, creating it if needed.
    pub fn open<P: AsRef<Path>>(root: P) -> Result<Self, SamplingError> {
        fs::create_dir_all(root.as_ref())
            .map_err(|e| SamplingError::IOError(format!("{}: {}", root.as_ref().display(), e)))?;
        Ok(CalibrationStore {
            root: root.as_ref().to_path_buf(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn record_path(&self, id: u64) -> PathBuf {
        self.root.join(format!("calibration_{:05}.json", id))
    }

    /// Load the record with the given id.
    pub fn load(&self, id: u64) -> Result<CalibrationRecord, SamplingError> {
        log::debug!("Loading calibration record {} from {}", id, self.root.display());
        CalibrationRecord::load_from(self.record_path(id))
    }

    /// Store a record under the next free id and return that id.
    pub fn save(&self, record: &CalibrationRecord) -> Result<u64, SamplingError> {
        let id = (0..u64::MAX)
            .find(|&id| !self.record_path(id).exists())
            .ok_or_else(|| {
                SamplingError::IOError(format!("no free record id in {}", self.root.display()))
            })?;
        record.save_to(self.record_path(id))?;
        log::info!("Saved calibration record {} to {}", id, self.root.display());
        Ok(id)
    }
}
