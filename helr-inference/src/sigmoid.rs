//! Degree-5 least-squares sigmoid approximation.
//!
//! Coefficients from Kim et al., "Secure logistic regression based on
//! homomorphic encryption" (BMC Medical Genomics, 2018), rescaled for inputs
//! in roughly `[-8, 8]`. Monotone on that range.

use helr_ckks::{eval_poly_clear, poly_depth};

/// `[x^0, x^1, ..., x^5]`.
pub const SIGMOID_COEFFS: [f64; 6] = [
    0.5,
    1.53048 / 8.0,
    0.0,
    -2.3533056 / (8.0 * 8.0 * 8.0),
    0.0,
    1.3511295 / (8.0 * 8.0 * 8.0 * 8.0),
];

/// Polynomial sigmoid in the clear.
pub fn sigmoid_poly(x: f64) -> f64 {
    eval_poly_clear(x, &SIGMOID_COEFFS)
}

/// Levels the encrypted evaluation of [`SIGMOID_COEFFS`] consumes.
pub fn sigmoid_depth() -> usize {
    poly_depth(&SIGMOID_COEFFS)
}

/// Exact logistic function.
pub fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}
