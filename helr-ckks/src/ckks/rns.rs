//! Residue Number System polynomials over a runtime modulus chain.
//!
//! A polynomial in Z_Q[X]/(X^N+1), Q = q_0 * ... * q_{k-1}, is stored as `k`
//! residue vectors. A polynomial with `k` residues is "at" the first `k`
//! primes of the basis; rescaling drops the last one.

use crate::error::{HeError, Result};

use super::ntt::{mod_inv, mul_mod, NttContext};

/// Ring dimension, modulus chain and per-prime NTT tables.
#[derive(Clone, Debug)]
pub struct RnsBasis {
    pub ring_dim: usize,
    pub primes: Vec<i64>,
    ntt: Vec<NttContext>,
}

impl RnsBasis {
    pub fn new(ring_dim: usize, primes: Vec<i64>) -> Result<Self> {
        let ntt = primes
            .iter()
            .map(|&q| {
                NttContext::new(q, ring_dim).ok_or_else(|| {
                    HeError::InvalidParams(format!("{} has no 2N-th root for N={}", q, ring_dim))
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            ring_dim,
            primes,
            ntt,
        })
    }

    pub fn num_primes(&self) -> usize {
        self.primes.len()
    }

    pub fn ntt(&self, i: usize) -> &NttContext {
        &self.ntt[i]
    }
}

/// A polynomial in RNS form. Whether the residues hold coefficients or NTT
/// evaluations is tracked by the caller.
#[derive(Clone, Debug, PartialEq)]
pub struct RnsPoly {
    /// `residues[i][j]`: coefficient (or evaluation) `j` modulo prime `i`,
    /// in [0, q_i).
    pub residues: Vec<Vec<i64>>,
}

impl RnsPoly {
    pub fn zero(ring_dim: usize, num_primes: usize) -> Self {
        Self {
            residues: vec![vec![0i64; ring_dim]; num_primes],
        }
    }

    /// Reduce signed integer coefficients modulo the first `num_primes` primes.
    pub fn from_signed(coeffs: &[i64], basis: &RnsBasis, num_primes: usize) -> Self {
        let residues = basis.primes[..num_primes]
            .iter()
            .map(|&q| {
                let mut res = vec![0i64; basis.ring_dim];
                for (r, &c) in res.iter_mut().zip(coeffs) {
                    *r = c.rem_euclid(q);
                }
                res
            })
            .collect();
        Self { residues }
    }

    pub fn num_primes(&self) -> usize {
        self.residues.len()
    }

    pub fn add(&self, other: &RnsPoly, basis: &RnsBasis) -> RnsPoly {
        self.zip_with(other, basis, |a, b, q| {
            let s = a + b;
            if s >= q {
                s - q
            } else {
                s
            }
        })
    }

    pub fn sub(&self, other: &RnsPoly, basis: &RnsBasis) -> RnsPoly {
        self.zip_with(other, basis, |a, b, q| if a >= b { a - b } else { a - b + q })
    }

    /// Pointwise product. Both operands must be in the NTT domain.
    pub fn hadamard(&self, other: &RnsPoly, basis: &RnsBasis) -> RnsPoly {
        self.zip_with(other, basis, mul_mod)
    }

    /// Multiply by a signed integer constant.
    pub fn scalar_mul(&self, scalar: i64, basis: &RnsBasis) -> RnsPoly {
        let residues = self
            .residues
            .iter()
            .zip(&basis.primes)
            .map(|(res, &q)| {
                let s = scalar.rem_euclid(q);
                res.iter().map(|&a| mul_mod(a, s, q)).collect()
            })
            .collect();
        RnsPoly { residues }
    }

    /// Add a signed constant to coefficient 0 (coefficient domain only).
    pub fn add_constant(&self, constant: i64, basis: &RnsBasis) -> RnsPoly {
        let mut out = self.clone();
        for (res, &q) in out.residues.iter_mut().zip(&basis.primes) {
            res[0] = (res[0] + constant.rem_euclid(q)) % q;
        }
        out
    }

    pub fn to_ntt(&self, basis: &RnsBasis) -> RnsPoly {
        let residues = self
            .residues
            .iter()
            .enumerate()
            .map(|(i, res)| basis.ntt(i).forward(res))
            .collect();
        RnsPoly { residues }
    }

    pub fn from_ntt(&self, basis: &RnsBasis) -> RnsPoly {
        let residues = self
            .residues
            .iter()
            .enumerate()
            .map(|(i, res)| basis.ntt(i).inverse(res))
            .collect();
        RnsPoly { residues }
    }

    /// Keep only the first `num_primes` residues. The represented value is
    /// unchanged modulo the smaller product.
    pub fn truncate(&self, num_primes: usize) -> RnsPoly {
        RnsPoly {
            residues: self.residues[..num_primes.min(self.num_primes())].to_vec(),
        }
    }

    /// Galois automorphism σ_g: X → X^g (coefficient domain, `g` odd).
    pub fn automorphism(&self, g: usize, basis: &RnsBasis) -> RnsPoly {
        let n = basis.ring_dim;
        let two_n = 2 * n;
        let residues = self
            .residues
            .iter()
            .zip(&basis.primes)
            .map(|(res, &q)| {
                let mut out = vec![0i64; n];
                for (j, &c) in res.iter().enumerate() {
                    let idx = (g * j) % two_n;
                    if idx < n {
                        out[idx] = c;
                    } else {
                        out[idx - n] = if c == 0 { 0 } else { q - c };
                    }
                }
                out
            })
            .collect();
        RnsPoly { residues }
    }

    /// Divide by the last prime and drop it (coefficient domain).
    ///
    /// Computes `(x - r) / q_last` per remaining channel, with `r` the
    /// centered residue modulo `q_last`, so the result is a rounding of
    /// `x / q_last`.
    pub fn rescale(&self, basis: &RnsBasis) -> RnsPoly {
        let last = self.num_primes() - 1;
        let q_last = basis.primes[last];
        let half = q_last / 2;
        let centered: Vec<i64> = self.residues[last]
            .iter()
            .map(|&v| if v > half { v - q_last } else { v })
            .collect();
        let residues = (0..last)
            .map(|i| {
                let q = basis.primes[i];
                let inv = mod_inv(q_last % q, q);
                self.residues[i]
                    .iter()
                    .zip(&centered)
                    .map(|(&x, &r)| {
                        let diff = (x - r.rem_euclid(q)).rem_euclid(q);
                        mul_mod(diff, inv, q)
                    })
                    .collect()
            })
            .collect();
        RnsPoly { residues }
    }

    /// Channel `i` as centered integers in (-q_i/2, q_i/2].
    pub fn centered_channel(&self, i: usize, basis: &RnsBasis) -> Vec<i64> {
        let q = basis.primes[i];
        let half = q / 2;
        self.residues[i]
            .iter()
            .map(|&v| if v > half { v - q } else { v })
            .collect()
    }

    fn zip_with(
        &self,
        other: &RnsPoly,
        basis: &RnsBasis,
        f: impl Fn(i64, i64, i64) -> i64,
    ) -> RnsPoly {
        debug_assert_eq!(self.num_primes(), other.num_primes());
        let residues = self
            .residues
            .iter()
            .zip(&other.residues)
            .zip(&basis.primes)
            .map(|((a, b), &q)| a.iter().zip(b).map(|(&x, &y)| f(x, y, q)).collect())
            .collect();
        RnsPoly { residues }
    }
}

#[cfg(test)]
mod tests {
    use super::super::ntt::find_ntt_primes;
    use super::*;

    fn basis(n: usize) -> RnsBasis {
        let mut primes = find_ntt_primes(50, 1, n, &[]);
        let rest = find_ntt_primes(40, 2, n, &primes);
        primes.extend(rest);
        RnsBasis::new(n, primes).unwrap()
    }

    #[test]
    fn signed_roundtrip_through_channel() {
        let b = basis(16);
        let coeffs: Vec<i64> = (0..16).map(|i| i as i64 - 8).collect();
        let p = RnsPoly::from_signed(&coeffs, &b, 3);
        for ch in 0..3 {
            assert_eq!(p.centered_channel(ch, &b), coeffs);
        }
    }

    #[test]
    fn add_then_sub_is_identity() {
        let b = basis(8);
        let x = RnsPoly::from_signed(&[5, -3, 0, 1, 2, 3, 4, -7], &b, 3);
        let y = RnsPoly::from_signed(&[-5, 3, 1, 1, 0, 0, 0, 7], &b, 3);
        let sum = x.add(&y, &b);
        assert_eq!(sum.centered_channel(1, &b), vec![0, 0, 1, 2, 2, 3, 4, 0]);
        let diff = x.sub(&x, &b);
        assert_eq!(diff, RnsPoly::zero(8, 3));
        assert_eq!(x.add(&y, &b).sub(&y, &b), x);
    }

    #[test]
    fn hadamard_in_ntt_domain_is_ring_product() {
        let b = basis(8);
        // (1 + X) * X^7 = X^7 + X^8 = X^7 - 1
        let mut a = vec![0i64; 8];
        a[0] = 1;
        a[1] = 1;
        let mut m = vec![0i64; 8];
        m[7] = 1;
        let pa = RnsPoly::from_signed(&a, &b, 3).to_ntt(&b);
        let pm = RnsPoly::from_signed(&m, &b, 3).to_ntt(&b);
        let prod = pa.hadamard(&pm, &b).from_ntt(&b);
        let mut expected = vec![0i64; 8];
        expected[0] = -1;
        expected[7] = 1;
        for ch in 0..3 {
            assert_eq!(prod.centered_channel(ch, &b), expected);
        }
    }

    #[test]
    fn automorphism_maps_monomials() {
        let b = basis(8);
        // X^3 under X -> X^5 becomes X^15 = X^16 * X^-1 ... = -X^7
        let mut a = vec![0i64; 8];
        a[3] = 1;
        let p = RnsPoly::from_signed(&a, &b, 2).automorphism(5, &b);
        let mut expected = vec![0i64; 8];
        expected[7] = -1;
        assert_eq!(p.centered_channel(0, &b), expected);
    }

    #[test]
    fn rescale_divides_by_last_prime() {
        let b = basis(8);
        let q_last = b.primes[2];
        let coeffs: Vec<i64> = vec![3 * q_last, -2 * q_last, q_last / 2 + 10, 0, 7, -7, 1, q_last];
        let p = RnsPoly::from_signed(&coeffs, &b, 3).rescale(&b);
        assert_eq!(p.num_primes(), 2);
        let out = p.centered_channel(0, &b);
        assert_eq!(out[0], 3);
        assert_eq!(out[1], -2);
        assert_eq!(out[2], 1);
        assert_eq!(&out[3..7], &[0, 0, 0, 0]);
        assert_eq!(out[7], 1);
    }

    #[test]
    fn truncate_keeps_leading_primes() {
        let b = basis(8);
        let p = RnsPoly::from_signed(&[1, 2, 3, 4, 5, 6, 7, 8], &b, 3);
        let t = p.truncate(1);
        assert_eq!(t.num_primes(), 1);
        assert_eq!(t.residues[0], p.residues[0]);
    }
}
