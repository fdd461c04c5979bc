use lfp::aggregate::{baseline_correct, condition_means, mean, session_average};
use lfp::LfpError;
use ndarray::{s, Array1, Array2};

fn ramp_trials(n_trials: usize, n_samples: usize) -> Array2<f64> {
    Array2::from_shape_fn((n_trials, n_samples), |(i, t)| {
        (i as f64 + 1.0) * (t as f64 * 0.05).sin() + i as f64 * 0.5
    })
}

#[test]
fn mean_matches_rowwise_arithmetic() {
    let trials = ramp_trials(9, 300);
    for idx in [vec![0], vec![2, 5], vec![8, 1, 4, 7], (0..9).collect::<Vec<_>>()] {
        let m = mean(&trials, &idx).unwrap();
        assert_eq!(m.len(), 300);
        for t in 0..300 {
            let expected = idx.iter().map(|&i| trials[[i, t]]).sum::<f64>() / idx.len() as f64;
            approx::assert_abs_diff_eq!(m[t], expected, epsilon = 1e-12);
        }
    }
}

#[test]
fn empty_selection_fails() {
    let trials = ramp_trials(3, 50);
    assert!(matches!(mean(&trials, &[]), Err(LfpError::InvalidInput(_))));
}

#[test]
fn repeated_index_counts_twice() {
    let trials = ramp_trials(3, 10);
    let m = mean(&trials, &[0, 0, 2]).unwrap();
    for t in 0..10 {
        let expected = (2.0 * trials[[0, t]] + trials[[2, t]]) / 3.0;
        approx::assert_abs_diff_eq!(m[t], expected, epsilon = 1e-12);
    }
}

#[test]
fn baseline_correction_zeroes_any_window() {
    let trials = ramp_trials(4, 400);
    for i in 0..4 {
        for window in [1, 7, 100, 399, 400] {
            let y = baseline_correct(trials.row(i), window).unwrap();
            let m = y.slice(s![..window]).mean().unwrap();
            approx::assert_abs_diff_eq!(m, 0.0, epsilon = 1e-10);
        }
    }
}

#[test]
fn condition_means_with_correction() {
    let trials = ramp_trials(6, 200);
    let (low, high) = condition_means(&trials, &[0, 2, 4], &[1, 3, 5], true, 50).unwrap();
    approx::assert_abs_diff_eq!(low.slice(s![..50]).mean().unwrap(), 0.0, epsilon = 1e-10);
    approx::assert_abs_diff_eq!(high.slice(s![..50]).mean().unwrap(), 0.0, epsilon = 1e-10);

    let (raw_low, _) = condition_means(&trials, &[0, 2, 4], &[1, 3, 5], false, 50).unwrap();
    let offset = raw_low[0] - low[0];
    for t in 0..200 {
        approx::assert_abs_diff_eq!(raw_low[t] - low[t], offset, epsilon = 1e-10);
    }
}

#[test]
fn condition_means_rejects_empty_side() {
    let trials = ramp_trials(4, 100);
    assert!(condition_means(&trials, &[0, 1], &[], false, 10).is_err());
    assert!(condition_means(&trials, &[], &[2], false, 10).is_err());
}

#[test]
fn session_average_is_elementwise() {
    let a = Array1::from_iter((0..100).map(|t| t as f64));
    let b = Array1::from_iter((0..100).map(|t| 2.0 * t as f64));
    let c = Array1::from_iter((0..100).map(|_| 3.0));
    let avg = session_average(&[a, b, c]).unwrap();
    for t in 0..100 {
        approx::assert_abs_diff_eq!(avg[t], (3.0 * t as f64 + 3.0) / 3.0, epsilon = 1e-12);
    }
}

#[test]
fn session_average_rejects_mismatch() {
    let err = session_average(&[Array1::zeros(10), Array1::zeros(11)]).unwrap_err();
    assert!(err.to_string().contains("11"), "{err}");
}
