//! IIR Butterworth design matching `scipy.signal.butter(N, Wn, btype="low")`.
//!
//! The design runs in zeros/poles/gain form and only expands to transfer
//! function coefficients at the very end:
//!   • analog prototype poles  p_k = -exp(iπ·m/(2N)),  m = -N+1, -N+3, …, N-1
//!   • pre-warp                ω   = 4·tan(π·Wn/2)     (bilinear fs = 2)
//!   • low-pass scaling        p  ← ω·p,  k = ω^N
//!   • bilinear transform      z_p = (4 + p)/(4 - p),  N zeros at z = -1,
//!                             k  ← k / Re(∏(4 - p))
//!   • expand                  b = k·poly(zeros),  a = poly(poles)
use std::f64::consts::PI;

use rustfft::num_complex::Complex64;

use crate::error::{LfpError, Result};

/// Design a digital Butterworth low-pass of order `order`.
///
/// `wn` is the cutoff normalised to Nyquist (`cutoff_hz / (fs / 2)`) and must
/// lie strictly inside `(0, 1)`.  Returns `(b, a)` with `a[0] == 1`.
pub fn butter_lowpass(order: usize, wn: f64) -> Result<(Vec<f64>, Vec<f64>)> {
    if order == 0 {
        return Err(LfpError::InvalidConfig("Butterworth order must be at least 1".into()));
    }
    if !(wn > 0.0 && wn < 1.0) {
        return Err(LfpError::InvalidConfig(format!(
            "normalised cutoff must lie in (0, 1), got {wn}"
        )));
    }

    let n = order as f64;
    let fs = 2.0;
    let warped = 2.0 * fs * (PI * wn / fs).tan();

    let poles: Vec<Complex64> = (0..order)
        .map(|k| {
            let m = -(n - 1.0) + 2.0 * k as f64;
            -Complex64::from_polar(1.0, PI * m / (2.0 * n)) * warped
        })
        .collect();
    let gain = warped.powi(order as i32);

    let fs2 = Complex64::new(2.0 * fs, 0.0);
    let poles_z: Vec<Complex64> = poles.iter().map(|&p| (fs2 + p) / (fs2 - p)).collect();
    let zeros_z = vec![Complex64::new(-1.0, 0.0); order];
    let denom: Complex64 = poles.iter().map(|&p| fs2 - p).product();
    let gain_z = gain * (Complex64::new(1.0, 0.0) / denom).re;

    let b: Vec<f64> = poly(&zeros_z).iter().map(|c| gain_z * c.re).collect();
    let a: Vec<f64> = poly(&poles_z).iter().map(|c| c.re).collect();
    Ok((b, a))
}

/// Monic polynomial coefficients (highest power first) with the given roots.
fn poly(roots: &[Complex64]) -> Vec<Complex64> {
    let mut c = vec![Complex64::new(1.0, 0.0)];
    for &r in roots {
        let mut next = vec![Complex64::new(0.0, 0.0); c.len() + 1];
        for (i, &ci) in c.iter().enumerate() {
            next[i] += ci;
            next[i + 1] -= r * ci;
        }
        c = next;
    }
    c
}
