//! External simulator invocation.
//!
//! All neuron dynamics are delegated to an external simulator running in its
//! own process, so that no simulator state ever carries over between runs.
//! This module only prepares requests and consumes results; a failed run
//! surfaces as [`SamplingError::Upstream`] and the requesting cache node
//! stays stale.
use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Stdio};

use nalgebra::{DMatrix, DVector};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::calibration::NeuronParameters;
use crate::error::SamplingError;
use crate::spike_train::SpikeData;

/// Configuration of a full network sampling run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkRunConfig {
    /// Sampling duration (ms).
    pub duration: f64,
    /// Simulation time step (ms).
    pub dt: f64,
    /// Time discarded before sampling starts (ms).
    pub burn_in_time: f64,
    /// Seed for the simulator's random number generators.
    pub seed: Option<u64>,
    /// Initial membrane voltages, one per sampler.
    pub initial_voltages: Option<Vec<f64>>,
}

impl Default for NetworkRunConfig {
    fn default() -> Self {
        NetworkRunConfig {
            duration: 1e5,
            dt: 0.1,
            burn_in_time: 100.0,
            seed: None,
            initial_voltages: None,
        }
    }
}

/// Configuration of a single-sampler calibration run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationRunConfig {
    /// Simulation duration per stimulus level (ms).
    pub duration: f64,
    /// Simulation time step (ms).
    pub dt: f64,
    /// Time discarded before sampling starts (ms).
    pub burn_in_time: f64,
    /// Resting potentials to probe the sampler at (mV).
    pub stimulus_levels: Vec<f64>,
    /// Seed for the simulator's random number generators.
    pub seed: Option<u64>,
}

impl Default for CalibrationRunConfig {
    fn default() -> Self {
        CalibrationRunConfig {
            duration: 1e5,
            dt: 0.01,
            burn_in_time: 500.0,
            stimulus_levels: Vec::new(),
            seed: None,
        }
    }
}

/// A network run request handed to the simulator, in biological units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkRunRequest {
    pub weights_bio: DMatrix<f64>,
    pub biases_bio: DVector<f64>,
    pub parameters: Vec<NeuronParameters>,
    pub config: NetworkRunConfig,
}

/// A calibration request for one sampler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationRunRequest {
    pub parameters: NeuronParameters,
    pub config: CalibrationRunConfig,
}

/// Measured activation samples returned by a calibration run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationSamples {
    pub stimulus_levels: Vec<f64>,
    pub response_probabilities: Vec<f64>,
}

/// A blocking, external neuron simulator.
pub trait Simulator {
    /// Probe one sampler's activation over the configured stimulus levels.
    fn run_calibration(
        &self,
        request: &CalibrationRunRequest,
    ) -> Result<CalibrationSamples, SamplingError>;

    /// Sample the whole network, returning the recorded spike trains.
    fn run_network(&self, request: &NetworkRunRequest) -> Result<SpikeData, SamplingError>;
}

/// Spike data as it comes off the wire, revalidated before use.
#[derive(Debug, Deserialize)]
struct SpikeDataWire {
    spike_trains: Vec<Vec<f64>>,
    duration: f64,
}

/// Runs a simulator as a child process, speaking JSON over stdin/stdout.
///
/// The request is written to the child's stdin as a single
/// `{"mode": ..., "request": ...}` object; the response is read from its
/// stdout after it exits.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandSimulator {
    program: PathBuf,
    args: Vec<String>,
}

impl CommandSimulator {
    pub fn new<P: Into<PathBuf>>(program: P) -> Self {
        CommandSimulator {
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// Append an argument to the simulator command line.
    pub fn arg<S: Into<String>>(mut self, arg: S) -> Self {
        self.args.push(arg.into());
        self
    }

    fn exchange<Req: Serialize, Resp: DeserializeOwned>(
        &self,
        mode: &str,
        request: &Req,
    ) -> Result<Resp, SamplingError> {
        let payload = serde_json::to_vec(&serde_json::json!({
            "mode": mode,
            "request": request,
        }))
        .map_err(|e| SamplingError::Upstream(format!("could not encode request: {}", e)))?;

        log::info!(
            "Running {} simulation in subprocess: {}",
            mode,
            self.program.display()
        );
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .spawn()
            .map_err(|e| {
                SamplingError::Upstream(format!(
                    "failed to spawn simulator {}: {}",
                    self.program.display(),
                    e
                ))
            })?;

        {
            let mut stdin = child
                .stdin
                .take()
                .ok_or_else(|| SamplingError::Upstream("simulator has no stdin".to_string()))?;
            stdin
                .write_all(&payload)
                .map_err(|e| SamplingError::Upstream(format!("could not send request: {}", e)))?;
        }

        let output = child
            .wait_with_output()
            .map_err(|e| SamplingError::Upstream(format!("simulator did not finish: {}", e)))?;
        if !output.status.success() {
            return Err(SamplingError::Upstream(format!(
                "simulator exited with {}",
                output.status
            )));
        }
        serde_json::from_slice(&output.stdout)
            .map_err(|e| SamplingError::Upstream(format!("malformed simulator response: {}", e)))
    }
}

impl Simulator for CommandSimulator {
    fn run_calibration(
        &self,
        request: &CalibrationRunRequest,
    ) -> Result<CalibrationSamples, SamplingError> {
        self.exchange("calibration", request)
    }

    fn run_network(&self, request: &NetworkRunRequest) -> Result<SpikeData, SamplingError> {
        let wire: SpikeDataWire = self.exchange("network", request)?;
        SpikeData::build(wire.spike_trains, wire.duration)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> CalibrationRunRequest {
        CalibrationRunRequest {
            parameters: NeuronParameters::default(),
            config: CalibrationRunConfig::default(),
        }
    }

    #[test]
    fn test_missing_program() {
        let simulator = CommandSimulator::new("/nonexistent/simulator");
        assert!(matches!(
            simulator.run_calibration(&request()),
            Err(SamplingError::Upstream(_))
        ));
    }

    #[test]
    fn test_failing_program() {
        let simulator = CommandSimulator::new("false");
        assert!(matches!(
            simulator.run_calibration(&request()),
            Err(SamplingError::Upstream(_))
        ));
    }

    #[test]
    fn test_echoing_program() {
        let simulator = CommandSimulator::new("sh").arg("-c").arg(
            "cat > /dev/null; \
             echo '{\"stimulus_levels\": [-52.0], \"response_probabilities\": [0.5]}'",
        );
        let samples = simulator.run_calibration(&request()).unwrap();
        assert_eq!(samples.stimulus_levels, vec![-52.0]);
        assert_eq!(samples.response_probabilities, vec![0.5]);
    }

    #[test]
    fn test_network_response_is_validated() {
        let simulator = CommandSimulator::new("sh").arg("-c").arg(
            "cat > /dev/null; \
             echo '{\"spike_trains\": [[-1.0]], \"duration\": 10.0}'",
        );
        let request = NetworkRunRequest {
            weights_bio: DMatrix::zeros(1, 1),
            biases_bio: DVector::zeros(1),
            parameters: vec![NeuronParameters::default()],
            config: NetworkRunConfig::default(),
        };
        assert!(matches!(
            simulator.run_network(&request),
            Err(SamplingError::InvalidParameter(_))
        ));
    }
}
