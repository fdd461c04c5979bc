//! Trial and session averaging.
//!
//! `mean`             — elementwise mean over a selected set of trial rows
//! `baseline_correct` — `signal -= mean(signal[..baseline_samples])`
//! `condition_means`  — the pair of (optionally corrected) low/high means
//! `session_average`  — elementwise mean of equally long per-session means
//!
//! Averaging over zero rows is an error, never a zero or NaN signal.
use ndarray::{s, Array1, Array2, ArrayView1};

use crate::error::{LfpError, Result};

/// Mean signal over the rows of `trials` listed in `indices`.
pub fn mean(trials: &Array2<f64>, indices: &[usize]) -> Result<Array1<f64>> {
    if indices.is_empty() {
        return Err(LfpError::InvalidInput("no trials selected for averaging".into()));
    }
    let n_trials = trials.nrows();
    if let Some(&bad) = indices.iter().find(|&&i| i >= n_trials) {
        return Err(LfpError::InvalidInput(format!(
            "trial index {bad} out of range for {n_trials} trials"
        )));
    }

    let mut acc = Array1::<f64>::zeros(trials.ncols());
    for &i in indices {
        acc += &trials.row(i);
    }
    acc /= indices.len() as f64;
    Ok(acc)
}

/// Subtract the mean of the first `baseline_samples` samples from `signal`.
pub fn baseline_correct(signal: ArrayView1<f64>, baseline_samples: usize) -> Result<Array1<f64>> {
    let n = signal.len();
    if baseline_samples == 0 || baseline_samples > n {
        return Err(LfpError::InvalidInput(format!(
            "baseline window of {baseline_samples} samples does not fit a {n}-sample signal"
        )));
    }
    let offset = signal.slice(s![..baseline_samples]).sum() / baseline_samples as f64;
    Ok(signal.mapv(|v| v - offset))
}

/// Mean signals of two trial subsets, each optionally baseline-corrected.
pub fn condition_means(
    trials: &Array2<f64>,
    low_indices: &[usize],
    high_indices: &[usize],
    correct: bool,
    baseline_samples: usize,
) -> Result<(Array1<f64>, Array1<f64>)> {
    let mut low = mean(trials, low_indices)?;
    let mut high = mean(trials, high_indices)?;
    if correct {
        low = baseline_correct(low.view(), baseline_samples)?;
        high = baseline_correct(high.view(), baseline_samples)?;
    }
    Ok((low, high))
}

/// Elementwise mean across per-session mean signals.
pub fn session_average(means: &[Array1<f64>]) -> Result<Array1<f64>> {
    let first = means
        .first()
        .ok_or_else(|| LfpError::InvalidInput("no session means to average".into()))?;
    let len = first.len();
    if let Some((i, m)) = means.iter().enumerate().find(|(_, m)| m.len() != len) {
        return Err(LfpError::InvalidInput(format!(
            "session mean {i} has {} samples, expected {len}",
            m.len()
        )));
    }

    let mut acc = Array1::<f64>::zeros(len);
    for m in means {
        acc += m;
    }
    acc /= means.len() as f64;
    Ok(acc)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn mean_of_selected_rows() {
        let trials = array![[1.0, 2.0], [3.0, 4.0], [100.0, 100.0], [5.0, 6.0]];
        let m = mean(&trials, &[0, 1, 3]).unwrap();
        assert_eq!(m, array![3.0, 4.0]);
    }

    #[test]
    fn mean_of_nothing_is_an_error() {
        let trials = array![[1.0, 2.0]];
        assert!(matches!(mean(&trials, &[]), Err(LfpError::InvalidInput(_))));
    }

    #[test]
    fn out_of_range_index_is_an_error() {
        let trials = array![[1.0, 2.0]];
        assert!(mean(&trials, &[1]).is_err());
    }

    #[test]
    fn baseline_window_averages_to_zero() {
        let x = Array1::from_iter((0..50).map(|i| 3.0 + (i as f64 * 0.7).cos()));
        let y = baseline_correct(x.view(), 20).unwrap();
        let m = y.slice(s![..20]).mean().unwrap();
        approx::assert_abs_diff_eq!(m, 0.0, epsilon = 1e-12);
        // Shape is preserved, only the offset changes.
        approx::assert_abs_diff_eq!(y[30] - y[10], x[30] - x[10], epsilon = 1e-12);
    }

    #[test]
    fn baseline_longer_than_signal_is_an_error() {
        let x = Array1::<f64>::zeros(10);
        assert!(baseline_correct(x.view(), 11).is_err());
        assert!(baseline_correct(x.view(), 0).is_err());
    }

    #[test]
    fn condition_means_pair() {
        let trials = array![[1.0, 1.0, 4.0], [3.0, 3.0, 6.0], [10.0, 10.0, 10.0]];
        let (low, high) = condition_means(&trials, &[0, 1], &[2], false, 1).unwrap();
        assert_eq!(low, array![2.0, 2.0, 5.0]);
        assert_eq!(high, array![10.0, 10.0, 10.0]);
        let (low, high) = condition_means(&trials, &[0, 1], &[2], true, 2).unwrap();
        assert_eq!(low, array![0.0, 0.0, 3.0]);
        assert_eq!(high, array![0.0, 0.0, 0.0]);
    }

    #[test]
    fn session_average_requires_equal_lengths() {
        let a = array![1.0, 2.0, 3.0];
        let b = array![3.0, 4.0, 5.0];
        assert_eq!(session_average(&[a.clone(), b]).unwrap(), array![2.0, 3.0, 4.0]);
        assert!(session_average(&[a, array![1.0]]).is_err());
        assert!(session_average(&[]).is_err());
    }
}
