//! Mathematical utility functions.

/// p * ln(p) with the 0 * ln(0) = 0 convention.
pub fn x_ln_x(p: f64) -> f64 {
    if p > 0.0 {
        p * p.ln()
    } else {
        0.0
    }
}

/// Overwrite the last proportion with one minus the sum of the others.
///
/// The first K-1 entries are the free parameters; the last one is derived
/// so that the vector sums to one regardless of accumulated round-off.
/// The derived value is clamped at zero.
pub fn derive_last_proportion(proportions: &mut [f64]) {
    if let Some((last, free)) = proportions.split_last_mut() {
        let sum: f64 = free.iter().sum();
        *last = (1.0 - sum).max(0.0);
    }
}

/// Uniform proportions 1/K with the last entry derived.
pub fn uniform_proportions(k: usize) -> Vec<f64> {
    let mut p = vec![1.0 / k as f64; k];
    derive_last_proportion(&mut p);
    p
}

/// NaN maps to 0, everything else passes through.
pub fn nan_to_zero(x: f64) -> f64 {
    if x.is_nan() {
        0.0
    } else {
        x
    }
}
