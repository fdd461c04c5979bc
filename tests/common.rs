/// Shared helpers for synthetic trial data.
use lfp::AnalysisConfig;
use ndarray::Array2;
use std::f64::consts::PI;

#[allow(unused)]
/// `amp · sin(2π·freq·t/fs)` for `n` samples.
pub fn sine(n: usize, fs: f64, freq: f64, amp: f64) -> Vec<f64> {
    (0..n).map(|i| amp * (2.0 * PI * freq * i as f64 / fs).sin()).collect()
}

#[allow(unused)]
/// Unit-height Gaussian pulse centred on sample `center`.
pub fn gaussian_pulse(n: usize, center: usize, sigma: f64) -> Vec<f64> {
    (0..n)
        .map(|i| {
            let d = i as f64 - center as f64;
            (-0.5 * d * d / (sigma * sigma)).exp()
        })
        .collect()
}

#[allow(unused)]
/// One 10 Hz sine trial per amplitude, `n` samples at `fs`.
pub fn sine_trials(amps: &[f64], n: usize, fs: f64) -> Array2<f64> {
    Array2::from_shape_fn((amps.len(), n), |(i, t)| {
        amps[i] * (2.0 * PI * 10.0 * t as f64 / fs).sin()
    })
}

#[allow(unused)]
/// 1 kHz analysis settings used throughout the integration tests.
pub fn test_config() -> AnalysisConfig {
    AnalysisConfig {
        fs: 1000.0,
        lowpass_cutoff: 100.0,
        filter_order: 4,
        max_analysis_freq: 200.0,
        freq_bin_width: 5.0,
        window_length: 128,
        window_overlap: 64,
        nfft: 256,
        stim_onset_sample: 200,
        stim_offset_sample: 500,
        baseline_duration_sec: 0.1,
        rms_threshold: 3.0,
        ptp_threshold: 5.0,
        ..AnalysisConfig::default()
    }
}

#[allow(unused)]
pub fn argmax(x: &[f64]) -> usize {
    x.iter()
        .enumerate()
        .fold((0, f64::NEG_INFINITY), |(bi, bv), (i, &v)| if v > bv { (i, v) } else { (bi, bv) })
        .0
}

#[allow(unused)]
pub fn rms(x: &[f64]) -> f64 {
    (x.iter().map(|v| v * v).sum::<f64>() / x.len() as f64).sqrt()
}

#[allow(unused)]
/// Maximum absolute difference between two equally long slices.
pub fn max_abs_diff(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y).abs()).fold(0.0_f64, f64::max)
}
