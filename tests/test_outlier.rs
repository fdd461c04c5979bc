mod common;
use common::sine_trials;
use lfp::aggregate::mean;
use lfp::outlier::{detect_outliers, screen_trials};

fn graded_amps(n: usize) -> Vec<f64> {
    (0..n).map(|i| 1.0 + 0.02 * i as f64).collect()
}

#[test]
fn detection_is_deterministic() {
    let trials = sine_trials(&graded_amps(12), 800, 1000.0);
    let a = detect_outliers(&trials, 1000.0, 0.1, 3.0, 5.0).unwrap();
    let b = detect_outliers(&trials, 1000.0, 0.1, 3.0, 5.0).unwrap();
    assert_eq!(a, b);
    assert_eq!(a.len(), 12);
}

#[test]
fn huge_thresholds_accept_everything() {
    let mut trials = sine_trials(&graded_amps(12), 800, 1000.0);
    trials.row_mut(4).mapv_inplace(|v| v * 30.0);
    let mask = detect_outliers(&trials, 1000.0, 0.1, 1e9, 1e9).unwrap();
    assert!(mask.iter().all(|&v| v));
}

#[test]
fn shrinking_thresholds_never_add_trials() {
    let trials = sine_trials(&graded_amps(20), 800, 1000.0);
    let mut previous = usize::MAX;
    for k in [1e6, 100.0, 10.0, 3.0, 1.0, 0.5, 0.1, 1e-6] {
        let n_valid = detect_outliers(&trials, 1000.0, 0.1, k, k)
            .unwrap()
            .iter()
            .filter(|&&v| v)
            .count();
        assert!(n_valid <= previous, "k = {k}: {n_valid} valid > {previous}");
        previous = n_valid;
    }
    // Limits collapse onto the mean / median; strict `<` keeps at most the
    // lower half.
    assert!(previous <= 10, "{previous} trials survive near-zero thresholds");
}

#[test]
fn loud_baseline_trial_is_rejected_alone() {
    let fs = 1000.0;
    let mut trials = sine_trials(&graded_amps(20), 1000, fs);
    trials.row_mut(7).mapv_inplace(|v| v * 100.0);

    let screen = screen_trials(&trials, fs, 0.1, 3.0, 5.0).unwrap();
    for i in 0..20 {
        assert_eq!(screen.rms_valid[i], i != 7, "RMS verdict for trial {i}");
    }
    let mask = screen.valid();
    let rejected: Vec<usize> = (0..20).filter(|&i| !mask[i]).collect();
    assert_eq!(rejected, vec![7]);

    let kept: Vec<usize> = (0..20).filter(|&i| mask[i]).collect();
    let all: Vec<usize> = (0..20).collect();
    let clean = mean(&trials, &kept).unwrap();
    let contaminated = mean(&trials, &all).unwrap();
    let diff = clean
        .iter()
        .zip(contaminated.iter())
        .map(|(a, b)| (a - b).abs())
        .fold(0.0_f64, f64::max);
    assert!(diff > 1.0, "rejecting the loud trial changed the mean by only {diff}");
}

#[test]
fn limits_reported() {
    let trials = sine_trials(&[1.0, 1.1, 1.2, 1.3], 1000, 1000.0);
    let screen = screen_trials(&trials, 1000.0, 0.1, 3.0, 5.0).unwrap();
    // ptp = 2·amp → median 2.3, MAD 0.2 → limit 3.3
    approx::assert_abs_diff_eq!(screen.ptp_limit, 3.3, epsilon = 1e-6);
    assert!(screen.rms_limit > screen.rms.iter().cloned().fold(0.0, f64::max));
    assert_eq!(screen.valid(), vec![true; 4]);
}

#[test]
fn baseline_rounds_to_nearest_sample() {
    // 0.0996 s · 1000 Hz = 99.6 → 100 samples; a 100-sample trial is too short.
    let trials = sine_trials(&[1.0, 1.1, 1.2], 100, 1000.0);
    assert!(detect_outliers(&trials, 1000.0, 0.0996, 3.0, 5.0).is_err());
    assert!(detect_outliers(&trials, 1000.0, 0.0994, 3.0, 5.0).is_ok());
}
