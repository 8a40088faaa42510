//! Random sampling: uniform residues, ternary secrets, discrete Gaussian noise.

use rand::Rng;

use super::rns::{RnsBasis, RnsPoly};

/// Standard deviation of the error distribution.
pub const SIGMA: f64 = 3.2;

/// Uniform residues modulo each of the first `num_primes` primes. Uniform in
/// one domain is uniform in the other, so this is used directly for NTT-form
/// key material.
pub fn sample_uniform<R: Rng>(rng: &mut R, basis: &RnsBasis, num_primes: usize) -> RnsPoly {
    let residues = basis.primes[..num_primes]
        .iter()
        .map(|&q| (0..basis.ring_dim).map(|_| rng.gen_range(0..q)).collect())
        .collect();
    RnsPoly { residues }
}

/// Coefficients in {-1, 0, 1} with P(0) = 1/2.
pub fn sample_ternary<R: Rng>(rng: &mut R, n: usize) -> Vec<i64> {
    (0..n)
        .map(|_| match rng.gen_range(0..4u8) {
            0 => -1,
            1 => 1,
            _ => 0,
        })
        .collect()
}

/// Rounded Gaussian with σ = SIGMA via Box-Muller, rejecting beyond 6σ.
pub fn sample_gaussian<R: Rng>(rng: &mut R, n: usize) -> Vec<i64> {
    let tail = (SIGMA * 6.0).ceil() as i64;
    let mut out = Vec::with_capacity(n);
    while out.len() < n {
        let u1: f64 = rng.gen_range(1e-15_f64..1.0);
        let u2: f64 = rng.gen_range(0.0..std::f64::consts::TAU);
        let r = (-2.0 * u1.ln()).sqrt() * SIGMA;
        for z in [r * u2.cos(), r * u2.sin()] {
            let s = z.round() as i64;
            if s.abs() <= tail && out.len() < n {
                out.push(s);
            }
        }
    }
    out
}
