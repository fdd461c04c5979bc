//! Zero-phase forward-backward IIR filtering.
//!
//! Matches `scipy.signal.filtfilt(b, a, x)` with its defaults
//! (`padtype="odd"`, `padlen = 3 · max(len(a), len(b))`):
//!
//!   1. odd-extend `x` by `padlen` samples on each side
//!   2. forward pass with initial state `lfilter_zi · ext[0]`
//!   3. reverse, backward pass with initial state `lfilter_zi · y[-1]`
//!   4. reverse back and strip the padding
//!
//! The backward pass cancels the phase response of the forward pass, so
//! stimulus-locked features keep their latency.
use nalgebra::{DMatrix, DVector};
use ndarray::{Array2, ArrayView1};
use rayon::prelude::*;

use crate::error::{LfpError, Result};
use crate::filter::design::butter_lowpass;

/// Pre-designed Butterworth low-pass, applied zero-phase.
///
/// Coefficients and steady-state initial conditions are computed once in
/// [`LowpassFilter::new`]; [`LowpassFilter::apply`] only reads them, so one
/// instance can be shared across threads and sessions.
#[derive(Debug, Clone)]
pub struct LowpassFilter {
    b: Vec<f64>,
    a: Vec<f64>,
    zi: Vec<f64>,
    fs: f64,
    cutoff: f64,
    order: usize,
}

impl LowpassFilter {
    /// Design an order-`order` Butterworth low-pass at `cutoff` Hz for a
    /// signal sampled at `fs` Hz.
    pub fn new(fs: f64, cutoff: f64, order: usize) -> Result<Self> {
        if !(fs > 0.0) || !fs.is_finite() {
            return Err(LfpError::InvalidConfig(format!(
                "sampling frequency must be positive, got {fs}"
            )));
        }
        let nyquist = fs / 2.0;
        if !(cutoff > 0.0) || cutoff >= nyquist {
            return Err(LfpError::InvalidConfig(format!(
                "cutoff {cutoff} Hz must lie in (0, {nyquist}) Hz"
            )));
        }
        let (b, a) = butter_lowpass(order, cutoff / nyquist)?;
        let zi = lfilter_zi(&b, &a)?;
        log::debug!("designed order-{order} Butterworth low-pass at {cutoff} Hz (fs = {fs} Hz)");
        Ok(Self { b, a, zi, fs, cutoff, order })
    }

    pub fn b(&self) -> &[f64] {
        &self.b
    }

    pub fn a(&self) -> &[f64] {
        &self.a
    }

    pub fn fs(&self) -> f64 {
        self.fs
    }

    pub fn cutoff(&self) -> f64 {
        self.cutoff
    }

    pub fn order(&self) -> usize {
        self.order
    }

    /// Edge padding used by [`LowpassFilter::apply`]; inputs must be longer.
    pub fn padlen(&self) -> usize {
        3 * self.a.len().max(self.b.len())
    }

    /// Zero-phase filter a single 1-D signal.  Output length equals input
    /// length.
    pub fn apply(&self, signal: &[f64]) -> Result<Vec<f64>> {
        filtfilt_with_zi(&self.b, &self.a, &self.zi, signal)
    }
}

/// Zero-phase filter every row of `trials` ([trials, samples]) independently.
///
/// Rows are processed in parallel; the output has the same shape.
pub fn filter_trials(trials: &Array2<f64>, filter: &LowpassFilter) -> Result<Array2<f64>> {
    let (n_trials, n_samples) = trials.dim();
    let rows: Vec<Vec<f64>> = (0..n_trials)
        .into_par_iter()
        .map(|i| filter.apply(&row_vec(trials.row(i))))
        .collect::<Result<_>>()?;

    let mut out = Array2::<f64>::zeros((n_trials, n_samples));
    for (i, row) in rows.iter().enumerate() {
        out.row_mut(i).assign(&ArrayView1::from(row));
    }
    Ok(out)
}

/// Zero-phase filter `x` with arbitrary transfer-function coefficients.
pub fn filtfilt(b: &[f64], a: &[f64], x: &[f64]) -> Result<Vec<f64>> {
    let (b, a) = normalize(b, a)?;
    let zi = lfilter_zi(&b, &a)?;
    filtfilt_with_zi(&b, &a, &zi, x)
}

/// Causal IIR filter (transposed direct form II) with initial state `zi`.
///
/// `a[0]` must be 1 and `b`, `a` must have equal length; `zi` has one entry
/// fewer.  Use [`filtfilt`] for unnormalised coefficients.
pub fn lfilter(b: &[f64], a: &[f64], x: &[f64], zi: &[f64]) -> Result<Vec<f64>> {
    if a.is_empty() || b.len() != a.len() || zi.len() + 1 != a.len() {
        return Err(LfpError::InvalidInput(format!(
            "lfilter needs len(b) = len(a) = len(zi) + 1 >= 1, got {}, {}, {}",
            b.len(),
            a.len(),
            zi.len()
        )));
    }
    if a[0] != 1.0 {
        return Err(LfpError::InvalidInput(format!("lfilter needs a[0] = 1, got {}", a[0])));
    }

    let m = zi.len();
    let mut z = zi.to_vec();
    let mut y = Vec::with_capacity(x.len());
    for &xn in x {
        let yn = b[0] * xn + z.first().copied().unwrap_or(0.0);
        for i in 0..m.saturating_sub(1) {
            z[i] = b[i + 1] * xn + z[i + 1] - a[i + 1] * yn;
        }
        if m > 0 {
            z[m - 1] = b[m] * xn - a[m] * yn;
        }
        y.push(yn);
    }
    Ok(y)
}

/// Steady-state initial conditions for a unit step (`scipy.signal.lfilter_zi`).
///
/// Solves `(I - Aᵀ) zi = b[1:] - a[1:]·b[0]`, where `A` is the companion
/// matrix of `a`.
pub fn lfilter_zi(b: &[f64], a: &[f64]) -> Result<Vec<f64>> {
    let (b, a) = normalize(b, a)?;
    let m = a.len() - 1;
    if m == 0 {
        return Ok(vec![]);
    }

    // Companion(a): first row -a[1:], ones on the sub-diagonal.
    let companion = |r: usize, c: usize| -> f64 {
        if r == 0 {
            -a[c + 1]
        } else if c + 1 == r {
            1.0
        } else {
            0.0
        }
    };
    let i_minus_at = DMatrix::from_fn(m, m, |i, j| {
        let eye = if i == j { 1.0 } else { 0.0 };
        eye - companion(j, i)
    });
    let rhs = DVector::from_fn(m, |i, _| b[i + 1] - a[i + 1] * b[0]);

    let zi = i_minus_at
        .lu()
        .solve(&rhs)
        .ok_or_else(|| LfpError::Singular("lfilter_zi: I - Aᵀ is not invertible".into()))?;
    Ok(zi.iter().copied().collect())
}

/// Odd extension: `2·x[0] - x[padlen..0]` on the left, `2·x[-1] - x[-2..]`
/// on the right.  Requires `padlen < x.len()`.
pub fn odd_extend(x: &[f64], padlen: usize) -> Result<Vec<f64>> {
    let n = x.len();
    if padlen >= n {
        return Err(LfpError::InvalidInput(format!(
            "signal of {n} samples is too short for an edge padding of {padlen} samples"
        )));
    }

    let mut out = Vec::with_capacity(n + 2 * padlen);
    let first = x[0];
    for i in (1..=padlen).rev() {
        out.push(2.0 * first - x[i]);
    }
    out.extend_from_slice(x);
    let last = x[n - 1];
    for i in 1..=padlen {
        out.push(2.0 * last - x[n - 1 - i]);
    }
    Ok(out)
}

// ── Helpers ──────────────────────────────────────────────────────────────────

fn filtfilt_with_zi(b: &[f64], a: &[f64], zi: &[f64], x: &[f64]) -> Result<Vec<f64>> {
    let padlen = 3 * a.len().max(b.len());
    if x.len() <= padlen {
        return Err(LfpError::InvalidInput(format!(
            "zero-phase filtering needs more than {padlen} samples, got {}",
            x.len()
        )));
    }
    let ext = odd_extend(x, padlen)?;

    let x0 = ext[0];
    let zi_fwd: Vec<f64> = zi.iter().map(|z| z * x0).collect();
    let mut y = lfilter(b, a, &ext, &zi_fwd)?;

    y.reverse();
    let y0 = y[0];
    let zi_bwd: Vec<f64> = zi.iter().map(|z| z * y0).collect();
    let mut y = lfilter(b, a, &y, &zi_bwd)?;
    y.reverse();

    Ok(y[padlen..padlen + x.len()].to_vec())
}

/// Pad `b`/`a` to equal length and divide through by `a[0]`.
fn normalize(b: &[f64], a: &[f64]) -> Result<(Vec<f64>, Vec<f64>)> {
    if a.is_empty() || b.is_empty() || a[0] == 0.0 {
        return Err(LfpError::InvalidInput(
            "filter needs non-empty coefficients with a[0] != 0".into(),
        ));
    }
    let n = a.len().max(b.len());
    let a0 = a[0];
    let mut bn: Vec<f64> = b.iter().map(|v| v / a0).collect();
    let mut an: Vec<f64> = a.iter().map(|v| v / a0).collect();
    bn.resize(n, 0.0);
    an.resize(n, 0.0);
    Ok((bn, an))
}

fn row_vec(row: ArrayView1<f64>) -> Vec<f64> {
    row.iter().copied().collect()
}
