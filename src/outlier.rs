//! Noisy-trial rejection.
//!
//! Two independent criteria, both computed once over every trial of a
//! session (no iterative re-estimation after exclusion):
//!
//!   RMS:  rms[i]  = sqrt(mean(trial[i, ..baseline]²))
//!         limit   = mean(rms) + k_rms · std(rms)            (ddof = 0)
//!   PTP:  ptp[i]  = max(trial[i]) - min(trial[i])          (whole trial)
//!         limit   = median(ptp) + k_ptp · median(|ptp - median(ptp)|)
//!
//! A trial is valid iff it lies strictly below both limits.
use ndarray::{s, Array2};

use crate::error::{LfpError, Result};

/// Per-trial scores, limits and criterion masks for one session.
#[derive(Debug, Clone)]
pub struct TrialScreen {
    pub rms: Vec<f64>,
    pub ptp: Vec<f64>,
    pub rms_limit: f64,
    pub ptp_limit: f64,
    pub rms_valid: Vec<bool>,
    pub ptp_valid: Vec<bool>,
}

impl TrialScreen {
    /// Combined validity: both criteria pass.
    pub fn valid(&self) -> Vec<bool> {
        self.rms_valid
            .iter()
            .zip(&self.ptp_valid)
            .map(|(&r, &p)| r && p)
            .collect()
    }

    pub fn n_valid(&self) -> usize {
        self.valid().iter().filter(|&&v| v).count()
    }
}

/// Boolean validity mask, one entry per trial (row of `trials`).
pub fn detect_outliers(
    trials: &Array2<f64>,
    fs: f64,
    baseline_duration_sec: f64,
    rms_threshold: f64,
    ptp_threshold: f64,
) -> Result<Vec<bool>> {
    let screen = screen_trials(trials, fs, baseline_duration_sec, rms_threshold, ptp_threshold)?;
    Ok(screen.valid())
}

/// Score every trial against both criteria.
pub fn screen_trials(
    trials: &Array2<f64>,
    fs: f64,
    baseline_duration_sec: f64,
    rms_threshold: f64,
    ptp_threshold: f64,
) -> Result<TrialScreen> {
    let (n_trials, n_samples) = trials.dim();
    let baseline_end = (baseline_duration_sec * fs).round();
    if !(baseline_end >= 1.0) {
        return Err(LfpError::InvalidConfig(format!(
            "baseline window of {baseline_duration_sec} s at {fs} Hz holds no samples"
        )));
    }
    let baseline_end = baseline_end as usize;

    if n_trials == 0 {
        return Ok(TrialScreen {
            rms: vec![],
            ptp: vec![],
            rms_limit: f64::NAN,
            ptp_limit: f64::NAN,
            rms_valid: vec![],
            ptp_valid: vec![],
        });
    }
    if baseline_end >= n_samples {
        return Err(LfpError::InvalidConfig(format!(
            "baseline window ({baseline_end} samples) is not shorter than the trial ({n_samples} samples)"
        )));
    }

    let baseline = trials.slice(s![.., ..baseline_end]);
    let rms: Vec<f64> = baseline
        .rows()
        .into_iter()
        .map(|row| (row.iter().map(|v| v * v).sum::<f64>() / baseline_end as f64).sqrt())
        .collect();

    let ptp: Vec<f64> = trials
        .rows()
        .into_iter()
        .map(|row| {
            let (lo, hi) = row
                .iter()
                .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
            hi - lo
        })
        .collect();

    let (rms_mean, rms_std) = mean_std(&rms);
    let rms_limit = rms_mean + rms_threshold * rms_std;

    let ptp_median = median(&ptp);
    let abs_dev: Vec<f64> = ptp.iter().map(|v| (v - ptp_median).abs()).collect();
    let ptp_mad = median(&abs_dev);
    let ptp_limit = ptp_median + ptp_threshold * ptp_mad;

    let rms_valid: Vec<bool> = rms.iter().map(|&v| v < rms_limit).collect();
    let ptp_valid: Vec<bool> = ptp.iter().map(|&v| v < ptp_limit).collect();

    let screen = TrialScreen { rms, ptp, rms_limit, ptp_limit, rms_valid, ptp_valid };
    log::debug!(
        "outlier screen: {} trials, rms limit {:.4e} ({} rejected), ptp limit {:.4e} ({} rejected), {} valid",
        n_trials,
        screen.rms_limit,
        screen.rms_valid.iter().filter(|&&v| !v).count(),
        screen.ptp_limit,
        screen.ptp_valid.iter().filter(|&&v| !v).count(),
        screen.n_valid(),
    );
    Ok(screen)
}

// ── Helpers ──────────────────────────────────────────────────────────────────

/// Population mean and standard deviation (ddof = 0).
fn mean_std(x: &[f64]) -> (f64, f64) {
    let n = x.len() as f64;
    let mean = x.iter().sum::<f64>() / n;
    let var = x.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / n;
    (mean, var.sqrt())
}

/// Median; even lengths average the two middle values.
fn median(x: &[f64]) -> f64 {
    let mut sorted = x.to_vec();
    sorted.sort_by(f64::total_cmp);
    let n = sorted.len();
    if n % 2 == 1 {
        sorted[n / 2]
    } else {
        (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn median_odd_and_even() {
        assert_eq!(median(&[3.0, 1.0, 2.0]), 2.0);
        assert_eq!(median(&[4.0, 1.0, 3.0, 2.0]), 2.5);
    }

    #[test]
    fn mean_std_population() {
        let (m, s) = mean_std(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]);
        approx::assert_abs_diff_eq!(m, 5.0, epsilon = 1e-12);
        approx::assert_abs_diff_eq!(s, 2.0, epsilon = 1e-12);
    }

    #[test]
    fn baseline_as_long_as_trial_is_config_error() {
        let trials = Array2::from_shape_fn((3, 100), |(i, t)| (i + t) as f64);
        let err = detect_outliers(&trials, 1000.0, 0.1, 3.0, 5.0).unwrap_err();
        assert!(matches!(err, LfpError::InvalidConfig(_)));
    }

    #[test]
    fn zero_trials_give_empty_mask() {
        let trials = Array2::<f64>::zeros((0, 500));
        let mask = detect_outliers(&trials, 1000.0, 0.1, 3.0, 5.0).unwrap();
        assert!(mask.is_empty());
    }

    #[test]
    fn identical_trials_fail_strict_limits() {
        // std = MAD = 0 → limit equals the score itself and `<` rejects it.
        let trials = Array2::from_shape_fn((4, 200), |(_, t)| (t as f64 * 0.1).sin());
        let mask = detect_outliers(&trials, 1000.0, 0.05, 3.0, 5.0).unwrap();
        assert_eq!(mask, vec![false; 4]);
    }

    #[test]
    fn ptp_uses_whole_trial() {
        // Trial 3 is quiet during baseline but carries a large late spike.
        let mut trials = Array2::from_shape_fn((8, 400), |(i, t)| {
            (1.0 + 0.05 * i as f64) * (2.0 * std::f64::consts::PI * t as f64 / 100.0).sin()
        });
        trials[[3, 350]] = 50.0;
        let screen = screen_trials(&trials, 1000.0, 0.1, 3.0, 5.0).unwrap();
        assert!(screen.rms_valid[3]);
        assert!(!screen.ptp_valid[3]);
        assert!(!screen.valid()[3]);
        assert_eq!(screen.n_valid(), 7);
    }
}
