//! Butterworth low-pass design and zero-phase application.
//!
//! - [`design`]: digital Butterworth coefficients, matching
//!   `scipy.signal.butter(N, Wn, btype="low")`.
//! - [`apply`]: forward-backward filtering with odd edge extension and
//!   steady-state initial conditions, matching `scipy.signal.filtfilt`.

pub mod apply;
pub mod design;

pub use apply::{filter_trials, filtfilt, lfilter, lfilter_zi, odd_extend, LowpassFilter};
pub use design::butter_lowpass;
