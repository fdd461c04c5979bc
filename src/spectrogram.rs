//! Short-time power spectral density.
//!
//! Matches `scipy.signal.spectrogram(x, fs, window="hann", nperseg,
//! noverlap, nfft, scaling="density", mode="psd")`:
//!
//!   • periodic Hann window w, hop = nperseg - noverlap
//!   • segments  k = 0 .. floor((L - nperseg) / hop)
//!   • optional per-segment mean removal (detrend = "constant")
//!   • zero-pad to nfft, one-sided |FFT|² · 1 / (fs · Σw²)
//!   • every bin except DC (and Nyquist for even nfft) doubled
//!
//! The result is then cut to frequencies ≤ `max_freq`.
use std::f64::consts::PI;

use ndarray::{Array1, Array2};
use rustfft::{num_complex::Complex, FftPlanner};

use crate::config::{AnalysisConfig, Detrend};
use crate::error::{LfpError, Result};

/// Time-frequency power of one signal.
#[derive(Debug, Clone)]
pub struct Spectrogram {
    /// Bin frequencies in Hz, ascending, all ≤ the requested maximum.
    pub frequencies: Array1<f64>,
    /// Segment centres in seconds.
    pub times: Array1<f64>,
    /// PSD in signal² / Hz, shape `[frequencies, times]`.
    pub power: Array2<f64>,
}

impl Spectrogram {
    /// Spectrogram with the window, band and detrend settings of `cfg`.
    pub fn from_config(signal: &[f64], cfg: &AnalysisConfig) -> Result<Self> {
        spectrogram(
            signal,
            cfg.fs,
            cfg.max_analysis_freq,
            cfg.window_length,
            cfg.window_overlap,
            cfg.nfft,
            cfg.detrend,
        )
    }

    pub fn n_freqs(&self) -> usize {
        self.frequencies.len()
    }

    pub fn n_times(&self) -> usize {
        self.times.len()
    }
}

/// Compute the band-limited PSD spectrogram of `signal`.
pub fn spectrogram(
    signal: &[f64],
    fs: f64,
    max_freq: f64,
    window_length: usize,
    window_overlap: usize,
    nfft: usize,
    detrend: Detrend,
) -> Result<Spectrogram> {
    if !(fs > 0.0) {
        return Err(LfpError::InvalidInput(format!("sampling frequency must be positive, got {fs}")));
    }
    if window_length == 0 || window_overlap >= window_length {
        return Err(LfpError::InvalidInput(format!(
            "window overlap ({window_overlap}) must be smaller than a non-empty window ({window_length})"
        )));
    }
    if nfft < window_length {
        return Err(LfpError::InvalidInput(format!(
            "nfft ({nfft}) is shorter than the window ({window_length})"
        )));
    }
    let n = signal.len();
    if n < window_length {
        return Err(LfpError::InvalidInput(format!(
            "signal of {n} samples is shorter than one spectrogram window ({window_length})"
        )));
    }

    let hop = window_length - window_overlap;
    let n_segments = (n - window_length) / hop + 1;

    let win = hann_periodic(window_length);
    let scale = 1.0 / (fs * win.iter().map(|w| w * w).sum::<f64>());

    let n_onesided = nfft / 2 + 1;
    let resolution = fs / nfft as f64;
    let n_keep = (0..n_onesided)
        .take_while(|&k| k as f64 * resolution <= max_freq)
        .count();

    let mut planner: FftPlanner<f64> = FftPlanner::new();
    let fft = planner.plan_fft_forward(nfft);
    let mut buf = vec![Complex::<f64>::default(); nfft];

    let mut power = Array2::<f64>::zeros((n_keep, n_segments));
    for seg in 0..n_segments {
        let start = seg * hop;
        let chunk = &signal[start..start + window_length];
        let offset = match detrend {
            Detrend::Constant => chunk.iter().sum::<f64>() / window_length as f64,
            Detrend::None => 0.0,
        };

        for (i, b) in buf.iter_mut().enumerate() {
            *b = if i < window_length {
                Complex { re: (chunk[i] - offset) * win[i], im: 0.0 }
            } else {
                Complex::default()
            };
        }
        fft.process(&mut buf);

        for k in 0..n_keep {
            let mut p = buf[k].norm_sqr() * scale;
            let is_nyquist = nfft % 2 == 0 && k == nfft / 2;
            if k != 0 && !is_nyquist {
                p *= 2.0;
            }
            power[[k, seg]] = p;
        }
    }

    let frequencies = Array1::from_iter((0..n_keep).map(|k| k as f64 * resolution));
    let half = window_length as f64 / 2.0;
    let times = Array1::from_iter((0..n_segments).map(|s| (half + (s * hop) as f64) / fs));

    Ok(Spectrogram { frequencies, times, power })
}

/// Periodic Hann window (`scipy.signal.get_window("hann", n)`).
pub fn hann_periodic(n: usize) -> Vec<f64> {
    (0..n)
        .map(|i| 0.5 - 0.5 * (2.0 * PI * i as f64 / n as f64).cos())
        .collect()
}
