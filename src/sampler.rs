//! LIF sampler and its unit conversion contract.
//!
//! Every sampler exposes the same bidirectional mapping between theoretical
//! units (Boltzmann weights and biases) and biological units (synaptic
//! weights and resting potentials), parameterized by the sampler's own
//! calibration. The mapping is linear and strictly monotonic per element, so
//! converting back and forth reproduces the input exactly.
use nalgebra::DVector;
use serde::{Deserialize, Serialize};

use crate::calibration::{CalibrationFit, CalibrationRecord, CalibrationStore, NeuronParameters};
use crate::error::SamplingError;

/// A single LIF neuron used as a binary sampling unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LifSampler {
    id: usize,
    parameters: NeuronParameters,
    calibration: Option<CalibrationRecord>,
}

impl LifSampler {
    /// Create an uncalibrated sampler.
    pub fn new(id: usize, parameters: NeuronParameters) -> Self {
        LifSampler {
            id,
            parameters,
            calibration: None,
        }
    }

    /// Create a sampler with a calibration already attached.
    pub fn with_calibration(
        id: usize,
        parameters: NeuronParameters,
        calibration: CalibrationRecord,
    ) -> Self {
        LifSampler {
            id,
            parameters,
            calibration: Some(calibration),
        }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn parameters(&self) -> &NeuronParameters {
        &self.parameters
    }

    pub fn calibration(&self) -> Option<&CalibrationRecord> {
        self.calibration.as_ref()
    }

    pub fn is_calibrated(&self) -> bool {
        self.calibration.is_some()
    }

    /// The refractory period, i.e., the width of one sampling state (ms).
    pub fn tau_refrac(&self) -> f64 {
        self.parameters.tau_refrac
    }

    /// Load the calibration record with the given id from the store.
    pub fn load_calibration(
        &mut self,
        store: &CalibrationStore,
        record_id: u64,
    ) -> Result<(), SamplingError> {
        let record = store.load(record_id)?;
        record.parameters.validate()?;
        log::debug!("Sampler {} loaded calibration record {}", self.id, record_id);
        self.calibration = Some(record);
        Ok(())
    }

    fn fit(&self) -> Result<&CalibrationFit, SamplingError> {
        self.calibration
            .as_ref()
            .map(|record| &record.fit)
            .ok_or(SamplingError::NotCalibrated(self.id))
    }

    /// The synaptic time constant receiving a weight of the given sign.
    fn tau_syn(&self, weight: f64) -> f64 {
        if weight >= 0.0 {
            self.parameters.tau_syn_e
        } else {
            self.parameters.tau_syn_i
        }
    }

    /// Resting potential realizing the given theoretical bias.
    pub fn bias_theo_to_bio(&self, bias: f64) -> Result<f64, SamplingError> {
        let fit = self.fit()?;
        Ok(fit.v_p05 + fit.alpha * bias)
    }

    /// Theoretical bias realized by the given resting potential.
    pub fn bias_bio_to_theo(&self, v_rest: f64) -> Result<f64, SamplingError> {
        let fit = self.fit()?;
        Ok((v_rest - fit.v_p05) / fit.alpha)
    }

    /// Synaptic weight realizing the given theoretical weight on this
    /// sampler. The sign decides which synaptic time constant applies, and
    /// is preserved by the conversion.
    pub fn weight_theo_to_bio(&self, weight: f64) -> Result<f64, SamplingError> {
        let fit = self.fit()?;
        Ok(weight * fit.alpha * self.parameters.cm / self.tau_syn(weight))
    }

    /// Theoretical weight realized by the given synaptic weight.
    pub fn weight_bio_to_theo(&self, weight: f64) -> Result<f64, SamplingError> {
        let fit = self.fit()?;
        Ok(weight * self.tau_syn(weight) / (fit.alpha * self.parameters.cm))
    }

    /// Convert one incoming weight column to biological units, element by
    /// element. Columns of different samplers are independent.
    pub fn convert_weights_theo_to_bio(
        &self,
        column: &DVector<f64>,
    ) -> Result<DVector<f64>, SamplingError> {
        let mut converted = DVector::zeros(column.len());
        for (i, weight) in column.iter().enumerate() {
            converted[i] = self.weight_theo_to_bio(*weight)?;
        }
        Ok(converted)
    }

    /// Convert one incoming weight column to theoretical units.
    pub fn convert_weights_bio_to_theo(
        &self,
        column: &DVector<f64>,
    ) -> Result<DVector<f64>, SamplingError> {
        let mut converted = DVector::zeros(column.len());
        for (i, weight) in column.iter().enumerate() {
            converted[i] = self.weight_bio_to_theo(*weight)?;
        }
        Ok(converted)
    }
}
