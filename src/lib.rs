//! # lfp — tone-conditioned LFP analysis
//!
//! `lfp` turns trial-based local field potential recordings into
//! de-noised, condition-averaged signals and their spectrograms.  The
//! numerics follow the SciPy reference analysis (`butter` + `filtfilt`,
//! `spectrogram(scaling="density")`) so results can be compared directly.
//!
//! ## Pipeline overview
//!
//! ```text
//! Session  (trials × samples, tone per trial)
//!   │
//!   ├─ outlier::screen_trials()    baseline RMS (mean + k·std) and
//!   │                              peak-to-peak (median + k·MAD) rejection
//!   ├─ filter::filter_trials()     zero-phase Butterworth low-pass, every trial
//!   ├─ pipeline::group_by_condition()  tone → valid trial indices
//!   ├─ aggregate::mean()           per-tone mean (optionally baseline-corrected)
//!   └─ spectrogram::spectrogram()  Hann PSD, cut to max_analysis_freq
//!        │
//!        └─→ SessionResult { conditions: tone → ConditionResult, contrast }
//! ```
//!
//! ## Quick start
//!
//! ```no_run
//! use lfp::{run_pipeline, AnalysisConfig, InMemorySource, Session};
//! use ndarray::{Array1, Array2};
//!
//! let trials: Array2<f64> = Array2::zeros((40, 3000));
//! let tones = Array1::from_iter((0..40).map(|i| if i % 2 == 0 { 4000.0 } else { 16000.0 }));
//! let source = InMemorySource::new(vec![Session::new("session_1", trials, tones).unwrap()]);
//!
//! let results = run_pipeline(&source, AnalysisConfig::default()).unwrap();
//! for (tone, cond) in &results[0].conditions {
//!     println!("tone {tone}: {} trials, {} freq bins", cond.n_trials, cond.spectrogram.n_freqs());
//! }
//! ```

pub mod aggregate;
pub mod config;
pub mod error;
pub mod filter;
pub mod io;
pub mod outlier;
pub mod pipeline;
pub mod spectrogram;

// ── Crate-root re-exports ─────────────────────────────────────────────────

pub use aggregate::{baseline_correct, condition_means, mean, session_average};
pub use config::{AnalysisConfig, Detrend};
pub use error::{LfpError, Result, Stage};
pub use filter::{filter_trials, LowpassFilter};
pub use io::{read_session, result_prefix, write_results, write_session, SessionFiles, StWriter};
pub use outlier::{detect_outliers, screen_trials, TrialScreen};
pub use pipeline::{
    group_by_condition, low_tone_consistency, run_pipeline, ConditionResult, InMemorySource,
    Pipeline, Session, SessionResult, SessionSource, Tone, ToneContrast,
};
pub use spectrogram::{spectrogram, Spectrogram};
