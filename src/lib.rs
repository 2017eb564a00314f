//! # Spike Sampling
//!
//! A library for sampling from Boltzmann distributions with networks of LIF
//! (leaky integrate-and-fire) neurons.
//!
//! Each neuron acts as a binary sampling unit: it is considered on for one
//! refractory period after every spike. A per-neuron calibration maps the
//! theoretical Boltzmann parameters (weights and biases) onto biological
//! ones (synaptic weights and resting potentials) and back. All network
//! state is dependency tracked, so derived quantities such as the sampled
//! joint distribution are recomputed lazily and only when something they
//! depend on changed.
//!
//! ## Example
//!
//! ```
//! use nalgebra::{DMatrix, DVector};
//! use spike_sampling::calibration::{CalibrationFit, CalibrationRecord, NeuronParameters};
//! use spike_sampling::network::SamplingNetwork;
//! use spike_sampling::sampler::LifSampler;
//!
//! # fn main() -> Result<(), spike_sampling::error::SamplingError> {
//! let parameters = NeuronParameters::default();
//! let fit = CalibrationFit::new(-52.0, 0.5)?;
//! let samplers: Vec<LifSampler> = (0..3)
//!     .map(|id| {
//!         LifSampler::with_calibration(
//!             id,
//!             parameters.clone(),
//!             CalibrationRecord::from_fit(fit.clone(), parameters.clone()),
//!         )
//!     })
//!     .collect();
//!
//! let mut network = SamplingNetwork::new(samplers)?;
//! network.set_weights_theo(DMatrix::from_element(3, 3, 0.5))?;
//! network.set_biases_theo(DVector::from_element(3, -0.5))?;
//!
//! // the biological weights are derived through the calibrations
//! let weights_bio = network.weights_bio()?;
//! assert_eq!(weights_bio.nrows(), 3);
//!
//! // the target distribution over all 2^3 states
//! let joint = network.dist_joint_theo()?;
//! assert!((joint.sum() - 1.0).abs() < 1e-12);
//! # Ok(())
//! # }
//! ```

pub mod calibration;
pub mod depend;
pub mod distribution;
pub mod error;
pub mod network;
pub mod sampler;
pub mod simulator;
pub mod spike_train;
