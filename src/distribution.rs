//! Joint and marginal distribution solvers for sampling networks.
//!
//! Pure functions with no side effects: the theoretical side enumerates the
//! Boltzmann distribution over all binary states, the empirical side
//! measures state occupancy from recorded spikes. Both index the joint state
//! space the same way: unit `k` of the selection contributes bit `n-1-k`,
//! i.e., the first selected unit is the most significant bit.
use itertools::Itertools;
use nalgebra::{DMatrix, DVector};

use crate::error::SamplingError;
use crate::spike_train::Spike;
use crate::spike_train::SpikeData;

/// Largest number of units enumerated exactly (2^MAX_JOINT_UNITS states).
pub const MAX_JOINT_UNITS: usize = 24;

fn check_joint_size(num_units: usize) -> Result<(), SamplingError> {
    if num_units == 0 {
        return Err(SamplingError::InvalidParameter(
            "cannot compute a distribution over zero units".to_string(),
        ));
    }
    if num_units > MAX_JOINT_UNITS {
        return Err(SamplingError::InvalidParameter(format!(
            "cannot enumerate the joint states of {} units (at most {})",
            num_units, MAX_JOINT_UNITS
        )));
    }
    Ok(())
}

/// The Boltzmann joint distribution `p(s) ∝ exp(½ sᵀWs + bᵀs)` over all
/// binary states of the given weights and biases.
pub fn joint_theo(
    weights: &DMatrix<f64>,
    biases: &DVector<f64>,
) -> Result<DVector<f64>, SamplingError> {
    let n = biases.len();
    if weights.nrows() != n || weights.ncols() != n {
        return Err(SamplingError::ShapeMismatch(format!(
            "weight matrix is {}x{}, expected {}x{}",
            weights.nrows(),
            weights.ncols(),
            n,
            n
        )));
    }
    check_joint_size(n)?;

    let mut log_probs = Vec::with_capacity(1 << n);
    for state in (0..n).map(|_| [0.0f64, 1.0]).multi_cartesian_product() {
        let mut log_p = 0.0;
        for i in 0..n {
            log_p += biases[i] * state[i];
            for j in 0..n {
                log_p += 0.5 * weights[(i, j)] * state[i] * state[j];
            }
        }
        log_probs.push(log_p);
    }

    // normalize in log space to avoid overflow for large energies
    let max = log_probs.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let mut probs = DVector::from_iterator(
        log_probs.len(),
        log_probs.iter().map(|log_p| (log_p - max).exp()),
    );
    let total: f64 = probs.iter().sum();
    probs /= total;
    Ok(probs)
}

/// The on-probability of every unit, summed from the joint distribution.
pub fn marginal_theo(
    weights: &DMatrix<f64>,
    biases: &DVector<f64>,
) -> Result<DVector<f64>, SamplingError> {
    let joint = joint_theo(weights, biases)?;
    let n = biases.len();
    let mut marginals = DVector::zeros(n);
    for (state, p) in joint.iter().enumerate() {
        for i in 0..n {
            if (state >> (n - 1 - i)) & 1 == 1 {
                marginals[i] += p;
            }
        }
    }
    Ok(marginals)
}

/// Merge the on-intervals of one channel: a spike switches the unit on for
/// `tau`, overlapping activations extend each other.
fn on_intervals(firing_times: &[f64], tau: f64, duration: f64) -> Vec<(f64, f64)> {
    let mut intervals: Vec<(f64, f64)> = Vec::new();
    for &t in firing_times {
        let end = (t + tau).min(duration);
        match intervals.last_mut() {
            Some(last) if t <= last.1 => last.1 = last.1.max(end),
            _ => intervals.push((t, end)),
        }
    }
    intervals
}

fn total_on_time(intervals: &[(f64, f64)]) -> f64 {
    intervals.iter().map(|(start, end)| end - start).sum()
}

/// The fraction of time each selected unit spends in the on state, one unit
/// being on for its refractory period after each spike.
pub fn marginal_sim(
    spike_data: &SpikeData,
    selected: &[usize],
    tau_refrac: &[f64],
) -> Result<DVector<f64>, SamplingError> {
    if tau_refrac.len() != selected.len() {
        return Err(SamplingError::ShapeMismatch(format!(
            "{} refractory periods for {} selected units",
            tau_refrac.len(),
            selected.len()
        )));
    }
    let duration = spike_data.duration();
    let mut marginals = DVector::zeros(selected.len());
    for (k, &channel) in selected.iter().enumerate() {
        let firing_times = spike_data.channel(channel).ok_or_else(|| {
            SamplingError::ShapeMismatch(format!("channel {} not in spike data", channel))
        })?;
        let intervals = on_intervals(firing_times, tau_refrac[k], duration);
        marginals[k] = total_on_time(&intervals) / duration;
    }
    Ok(marginals)
}

/// The empirical joint distribution over the selected units, measured as
/// the fraction of the run spent in every joint state.
pub fn joint_sim(
    ordered_spikes: &[Spike],
    selected: &[usize],
    tau_refrac: &[f64],
    duration: f64,
) -> Result<DVector<f64>, SamplingError> {
    let n = selected.len();
    check_joint_size(n)?;
    if tau_refrac.len() != n {
        return Err(SamplingError::ShapeMismatch(format!(
            "{} refractory periods for {} selected units",
            tau_refrac.len(),
            n
        )));
    }
    if !duration.is_finite() || duration <= 0.0 {
        return Err(SamplingError::InvalidParameter(format!(
            "duration must be positive and finite, got {}",
            duration
        )));
    }

    // merged on-intervals per selected unit
    let mut intervals: Vec<Vec<(f64, f64)>> = vec![Vec::new(); n];
    for spike in ordered_spikes {
        if let Some(k) = selected.iter().position(|&channel| channel == spike.channel) {
            let end = (spike.time + tau_refrac[k]).min(duration);
            match intervals[k].last_mut() {
                Some(last) if spike.time <= last.1 => last.1 = last.1.max(end),
                _ => intervals[k].push((spike.time, end)),
            }
        }
    }

    // sweep all interval boundaries; between two consecutive boundaries the
    // joint state is constant
    let mut boundaries = vec![0.0, duration];
    for unit_intervals in &intervals {
        for &(start, end) in unit_intervals {
            boundaries.push(start);
            boundaries.push(end);
        }
    }
    boundaries.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    let mut joint = DVector::zeros(1 << n);
    for window in boundaries.windows(2) {
        let (start, end) = (window[0], window[1]);
        if end <= start {
            continue;
        }
        let mid = 0.5 * (start + end);
        let mut state = 0usize;
        for (k, unit_intervals) in intervals.iter().enumerate() {
            if unit_intervals.iter().any(|&(s, e)| s <= mid && mid < e) {
                state |= 1 << (n - 1 - k);
            }
        }
        joint[state] += end - start;
    }
    joint /= duration;
    Ok(joint)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sigmoid(x: f64) -> f64 {
        1.0 / (1.0 + (-x).exp())
    }

    #[test]
    fn test_joint_theo_uniform() {
        let weights = DMatrix::zeros(3, 3);
        let biases = DVector::zeros(3);
        let joint = joint_theo(&weights, &biases).unwrap();
        assert_eq!(joint.len(), 8);
        assert!(joint.iter().all(|p| (p - 0.125).abs() < 1e-12));
    }

    #[test]
    fn test_joint_theo_single_unit() {
        let weights = DMatrix::zeros(1, 1);
        for bias in [-2.0, 0.0, 1.5] {
            let biases = DVector::from_vec(vec![bias]);
            let joint = joint_theo(&weights, &biases).unwrap();
            // index 1 is the on state
            assert!((joint[1] - sigmoid(bias)).abs() < 1e-12);
            assert!((joint.sum() - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn test_joint_theo_pairwise() {
        let w = 1.25;
        let weights = DMatrix::from_row_slice(2, 2, &[0.0, w, w, 0.0]);
        let biases = DVector::from_vec(vec![0.5, -0.5]);
        let joint = joint_theo(&weights, &biases).unwrap();

        // states are indexed (s0 s1) = 00, 01, 10, 11
        let energies = [0.0, -0.5, 0.5, 0.5 - 0.5 + w];
        let z: f64 = energies.iter().map(|e| e.exp()).sum();
        for (state, &energy) in energies.iter().enumerate() {
            assert!((joint[state] - energy.exp() / z).abs() < 1e-12);
        }
    }

    #[test]
    fn test_marginal_matches_joint() {
        let weights = DMatrix::from_row_slice(2, 2, &[0.0, 0.75, 0.75, 0.0]);
        let biases = DVector::from_vec(vec![0.25, -1.0]);
        let joint = joint_theo(&weights, &biases).unwrap();
        let marginals = marginal_theo(&weights, &biases).unwrap();

        assert!((marginals[0] - (joint[2] + joint[3])).abs() < 1e-12);
        assert!((marginals[1] - (joint[1] + joint[3])).abs() < 1e-12);
    }

    #[test]
    fn test_joint_size_guard() {
        let weights = DMatrix::zeros(0, 0);
        let biases = DVector::zeros(0);
        assert!(matches!(
            joint_theo(&weights, &biases),
            Err(SamplingError::InvalidParameter(_))
        ));

        let weights = DMatrix::zeros(2, 3);
        let biases = DVector::zeros(3);
        assert!(matches!(
            joint_theo(&weights, &biases),
            Err(SamplingError::ShapeMismatch(_))
        ));
    }

    #[test]
    fn test_on_intervals_merge() {
        let intervals = on_intervals(&[0.0, 1.0, 5.0], 2.0, 6.5);
        assert_eq!(intervals, vec![(0.0, 3.0), (5.0, 6.5)]);
        assert!((total_on_time(&intervals) - 4.5).abs() < 1e-12);
    }

    #[test]
    fn test_marginal_sim() {
        let spike_data = SpikeData::build(vec![vec![0.0, 5.0], vec![2.0]], 10.0).unwrap();
        let marginals = marginal_sim(&spike_data, &[0, 1], &[2.0, 2.0]).unwrap();
        assert!((marginals[0] - 0.4).abs() < 1e-12);
        assert!((marginals[1] - 0.2).abs() < 1e-12);
    }

    #[test]
    fn test_joint_sim_occupancy() {
        // channel 0 on over [0, 2), channel 1 on over [1, 3)
        let spike_data = SpikeData::build(vec![vec![0.0], vec![1.0]], 10.0).unwrap();
        let ordered = spike_data.ordered_spikes();
        let joint = joint_sim(&ordered, &[0, 1], &[2.0, 2.0], 10.0).unwrap();

        assert!((joint[0] - 0.7).abs() < 1e-12); // both off over [3, 10)
        assert!((joint[1] - 0.1).abs() < 1e-12); // only 1 on over [2, 3)
        assert!((joint[2] - 0.1).abs() < 1e-12); // only 0 on over [0, 1)
        assert!((joint[3] - 0.1).abs() < 1e-12); // both on over [1, 2)
        assert!((joint.sum() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_joint_sim_ignores_unselected_channels() {
        let spike_data =
            SpikeData::build(vec![vec![0.0], vec![1.0], vec![0.5, 2.5]], 10.0).unwrap();
        let ordered = spike_data.ordered_spikes();
        let restricted = joint_sim(&ordered, &[0, 1], &[2.0, 2.0], 10.0).unwrap();
        let full = joint_sim(&ordered, &[0, 1, 2], &[2.0, 2.0, 2.0], 10.0).unwrap();

        // marginalizing channel 2 out of the full joint recovers the restricted one
        for state in 0..4 {
            assert!((restricted[state] - (full[2 * state] + full[2 * state + 1])).abs() < 1e-12);
        }
    }
}
