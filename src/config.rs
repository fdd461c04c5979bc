//! Analysis configuration.
//!
//! [`AnalysisConfig`] holds every tunable parameter of the pipeline.  The
//! defaults are the settings used for the mouse auditory-cortex recordings
//! (10 kHz sampling, 1 kHz low-pass, 0–200 Hz spectral band).

use serde::{Deserialize, Serialize};

use crate::error::{LfpError, Result};

/// Per-segment detrending applied before the spectrogram FFT.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Detrend {
    /// Use each segment as-is.
    None,
    /// Subtract each segment's mean before windowing.
    Constant,
}

/// Configuration for a full analysis run.
///
/// All fields are `pub` so you can construct one with struct-update syntax:
///
/// ```
/// use lfp::AnalysisConfig;
///
/// let cfg = AnalysisConfig {
///     fs: 1000.0,
///     lowpass_cutoff: 100.0,
///     filter_order: 4,
///     ..AnalysisConfig::default()
/// };
/// assert_eq!(cfg.nyquist(), 500.0);
/// ```
///
/// The struct deserializes with `#[serde(default)]`, so a JSON file only
/// needs the fields it overrides.  A configuration is checked once by
/// [`AnalysisConfig::validate`] when a [`crate::Pipeline`] is built and is
/// not mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Sampling frequency in Hz.
    ///
    /// Default: `10000.0`.
    pub fs: f64,

    /// Cutoff of the zero-phase Butterworth low-pass, in Hz.  Must lie
    /// strictly between 0 and the Nyquist frequency.
    ///
    /// Default: `1000.0`.
    pub lowpass_cutoff: f64,

    /// Butterworth order of a single pass.  Forward-backward filtering
    /// doubles the effective order.
    ///
    /// Default: `10`.
    pub filter_order: usize,

    /// Highest frequency (inclusive) kept in the spectrogram, in Hz.
    ///
    /// Default: `200.0`.
    pub max_analysis_freq: f64,

    /// Width of the reporting frequency bins in Hz.  Only used by
    /// [`AnalysisConfig::freq_bins`]; the spectrogram resolution is
    /// `fs / nfft`.
    ///
    /// Default: `5.0`.
    pub freq_bin_width: f64,

    /// Spectrogram segment length in samples.
    ///
    /// Default: `256`.
    pub window_length: usize,

    /// Samples shared by consecutive segments.  Must be smaller than
    /// `window_length`.
    ///
    /// Default: `255` (hop of one sample).
    pub window_overlap: usize,

    /// FFT length; segments are zero-padded up to it.
    ///
    /// Default: `2048`.
    pub nfft: usize,

    /// Sample index of stimulus onset within each trial.
    ///
    /// Default: `1000`.
    pub stim_onset_sample: usize,

    /// Sample index of stimulus offset within each trial.
    ///
    /// Default: `1500`.
    pub stim_offset_sample: usize,

    /// Length of the pre-stimulus baseline in seconds, used for the RMS
    /// outlier criterion and for baseline correction.
    ///
    /// Default: `0.1` s.
    pub baseline_duration_sec: f64,

    /// RMS criterion: a trial is rejected when its baseline RMS reaches
    /// `mean + rms_threshold · std` over the session.
    ///
    /// Default: `3.0`.
    pub rms_threshold: f64,

    /// Peak-to-peak criterion: a trial is rejected when its peak-to-peak
    /// amplitude reaches `median + ptp_threshold · MAD` over the session.
    ///
    /// Default: `5.0`.
    pub ptp_threshold: f64,

    /// Re-centre every emitted condition mean so its baseline window
    /// averages to zero.
    ///
    /// Default: `false`.
    pub baseline_correct: bool,

    /// Detrending of spectrogram segments.
    ///
    /// Default: [`Detrend::Constant`].
    pub detrend: Detrend,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            fs: 10_000.0,
            lowpass_cutoff: 1_000.0,
            filter_order: 10,
            max_analysis_freq: 200.0,
            freq_bin_width: 5.0,
            window_length: 256,
            window_overlap: 255,
            nfft: 2048,
            stim_onset_sample: 1000,
            stim_offset_sample: 1500,
            baseline_duration_sec: 0.1,
            rms_threshold: 3.0,
            ptp_threshold: 5.0,
            baseline_correct: false,
            detrend: Detrend::Constant,
        }
    }
}

impl AnalysisConfig {
    /// Load a configuration from a JSON file.  Missing fields keep their
    /// defaults.  The result is validated before it is returned.
    pub fn from_json_file(path: &std::path::Path) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        let cfg: AnalysisConfig = serde_json::from_slice(&bytes)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Check every parameter precondition.
    pub fn validate(&self) -> Result<()> {
        let fail = |msg: String| Err(LfpError::InvalidConfig(msg));

        if !(self.fs > 0.0) || !self.fs.is_finite() {
            return fail(format!("sampling frequency must be positive, got {}", self.fs));
        }
        if !(self.lowpass_cutoff > 0.0) || self.lowpass_cutoff >= self.nyquist() {
            return fail(format!(
                "low-pass cutoff must lie in (0, {}) Hz, got {}",
                self.nyquist(),
                self.lowpass_cutoff
            ));
        }
        if self.filter_order == 0 {
            return fail("filter order must be at least 1".into());
        }
        if !(self.max_analysis_freq > 0.0) {
            return fail(format!(
                "maximum analysis frequency must be positive, got {}",
                self.max_analysis_freq
            ));
        }
        if !(self.freq_bin_width > 0.0) {
            return fail(format!(
                "frequency bin width must be positive, got {}",
                self.freq_bin_width
            ));
        }
        if self.window_length == 0 {
            return fail("spectrogram window length must be at least 1".into());
        }
        if self.window_overlap >= self.window_length {
            return fail(format!(
                "window overlap ({}) must be smaller than window length ({})",
                self.window_overlap, self.window_length
            ));
        }
        if self.window_length > self.nfft {
            return fail(format!(
                "window length ({}) must not exceed nfft ({})",
                self.window_length, self.nfft
            ));
        }
        if self.stim_onset_sample > self.stim_offset_sample {
            return fail(format!(
                "stimulus onset ({}) is after offset ({})",
                self.stim_onset_sample, self.stim_offset_sample
            ));
        }
        if !(self.baseline_duration_sec > 0.0) {
            return fail(format!(
                "baseline duration must be positive, got {}",
                self.baseline_duration_sec
            ));
        }
        if self.baseline_samples() == 0 {
            return fail(format!(
                "baseline of {} s is shorter than one sample at {} Hz",
                self.baseline_duration_sec, self.fs
            ));
        }
        if !(self.rms_threshold > 0.0) {
            return fail(format!("RMS threshold must be positive, got {}", self.rms_threshold));
        }
        if !(self.ptp_threshold > 0.0) {
            return fail(format!("PTP threshold must be positive, got {}", self.ptp_threshold));
        }
        Ok(())
    }

    /// Nyquist frequency, `fs / 2`.
    pub fn nyquist(&self) -> f64 {
        self.fs / 2.0
    }

    /// Number of baseline samples, `round(baseline_duration_sec · fs)`.
    ///
    /// ```
    /// use lfp::AnalysisConfig;
    /// assert_eq!(AnalysisConfig::default().baseline_samples(), 1000);
    /// ```
    pub fn baseline_samples(&self) -> usize {
        (self.baseline_duration_sec * self.fs).round() as usize
    }

    /// Stimulus onset in milliseconds from trial start.
    pub fn stim_onset_ms(&self) -> f64 {
        self.stim_onset_sample as f64 / self.fs * 1000.0
    }

    /// Stimulus offset in milliseconds from trial start.
    pub fn stim_offset_ms(&self) -> f64 {
        self.stim_offset_sample as f64 / self.fs * 1000.0
    }

    /// Frequency-bin edges `0, w, 2w, …` strictly below
    /// `max_analysis_freq + w`, the way `numpy.arange` lays them out.
    pub fn freq_bins(&self) -> Vec<f64> {
        let w = self.freq_bin_width;
        if !(w > 0.0) {
            return vec![];
        }
        let stop = self.max_analysis_freq + w;
        let n = (stop / w).ceil().max(0.0) as usize;
        (0..n).map(|k| k as f64 * w).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        AnalysisConfig::default().validate().unwrap();
    }

    #[test]
    fn derived_quantities() {
        let cfg = AnalysisConfig::default();
        assert_eq!(cfg.nyquist(), 5000.0);
        approx::assert_abs_diff_eq!(cfg.stim_onset_ms(), 100.0, epsilon = 1e-12);
        approx::assert_abs_diff_eq!(cfg.stim_offset_ms(), 150.0, epsilon = 1e-12);
        let bins = cfg.freq_bins();
        assert_eq!(bins.len(), 41);
        assert_eq!(bins[0], 0.0);
        assert_eq!(*bins.last().unwrap(), 200.0);
    }

    #[test]
    fn cutoff_at_nyquist_rejected() {
        let cfg = AnalysisConfig { lowpass_cutoff: 5000.0, ..AnalysisConfig::default() };
        assert!(matches!(cfg.validate(), Err(LfpError::InvalidConfig(_))));
    }

    #[test]
    fn overlap_not_below_window_rejected() {
        let cfg = AnalysisConfig { window_overlap: 256, ..AnalysisConfig::default() };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn window_longer_than_nfft_rejected() {
        let cfg = AnalysisConfig { window_length: 4096, window_overlap: 10, ..AnalysisConfig::default() };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn zero_order_and_bad_rate_rejected() {
        let cfg = AnalysisConfig { filter_order: 0, ..AnalysisConfig::default() };
        assert!(cfg.validate().is_err());
        let cfg = AnalysisConfig { fs: 0.0, ..AnalysisConfig::default() };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let cfg: AnalysisConfig =
            serde_json::from_str(r#"{ "fs": 1000.0, "lowpass_cutoff": 100.0, "detrend": "none" }"#)
                .unwrap();
        assert_eq!(cfg.fs, 1000.0);
        assert_eq!(cfg.detrend, Detrend::None);
        assert_eq!(cfg.filter_order, 10);
        assert_eq!(cfg.nfft, 2048);
    }
}
