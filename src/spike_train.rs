//! Spike data recorded from a sampling network run.
use std::cmp::Ordering;

use rand::Rng;
use rand_distr::{Distribution, Exp};
use serde::{Deserialize, Serialize};

use crate::error::SamplingError;

/// A single spike of one network channel.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Spike {
    pub channel: usize,
    pub time: f64,
}

/// The spike trains of every sampler over one network run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpikeData {
    spike_trains: Vec<Vec<f64>>,
    duration: f64,
}

impl SpikeData {
    /// Create spike data with the specified per-channel firing times and
    /// run duration. Firing times are sorted per channel; non-finite,
    /// negative or out-of-duration times are rejected.
    pub fn build(mut spike_trains: Vec<Vec<f64>>, duration: f64) -> Result<Self, SamplingError> {
        if !duration.is_finite() || duration <= 0.0 {
            return Err(SamplingError::InvalidParameter(format!(
                "duration must be positive and finite, got {}",
                duration
            )));
        }
        for (channel, train) in spike_trains.iter_mut().enumerate() {
            if train
                .iter()
                .any(|&t| !t.is_finite() || t < 0.0 || t >= duration)
            {
                return Err(SamplingError::InvalidParameter(format!(
                    "channel {} has firing times outside of [0, {})",
                    channel, duration
                )));
            }
            train.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
        }
        Ok(SpikeData {
            spike_trains,
            duration,
        })
    }

    pub fn num_channels(&self) -> usize {
        self.spike_trains.len()
    }

    pub fn duration(&self) -> f64 {
        self.duration
    }

    pub fn spike_trains(&self) -> &[Vec<f64>] {
        &self.spike_trains
    }

    /// The firing times of one channel, or `None` for an unknown channel.
    pub fn channel(&self, channel: usize) -> Option<&[f64]> {
        self.spike_trains.get(channel).map(Vec::as_slice)
    }

    /// All spikes of all channels merged and ordered by time.
    pub fn ordered_spikes(&self) -> Vec<Spike> {
        let mut spikes: Vec<Spike> = self
            .spike_trains
            .iter()
            .enumerate()
            .flat_map(|(channel, times)| times.iter().map(move |&time| Spike { channel, time }))
            .collect();
        spikes.sort_by(|a, b| a.time.partial_cmp(&b.time).unwrap_or(Ordering::Equal));
        spikes
    }

    /// Random Poisson spike data with the given per-channel firing rate
    /// (spikes per ms), for tests and demos.
    pub fn rand<R: Rng>(
        num_channels: usize,
        duration: f64,
        firing_rate: f64,
        rng: &mut R,
    ) -> Result<Self, SamplingError> {
        let interval_dist = Exp::new(firing_rate).map_err(|e| {
            SamplingError::InvalidParameter(format!("invalid firing rate {}: {}", firing_rate, e))
        })?;

        let mut spike_trains = Vec::with_capacity(num_channels);
        for _ in 0..num_channels {
            let mut times = Vec::new();
            let mut t = interval_dist.sample(rng);
            while t < duration {
                times.push(t);
                t += interval_dist.sample(rng);
            }
            spike_trains.push(times);
        }
        SpikeData::build(spike_trains, duration)
    }
}
