//! CKKS slot packing via the canonical embedding.
//!
//! Z[X]/(X^N+1) ≅ C^{N/2}: polynomial add/multiply become element-wise
//! add/multiply across N/2 complex slots. Slot `i` is the evaluation at
//! ψ^{5^i}, so the automorphism X → X^5 rotates slots left by one.
//!
//! Contexts with fewer than N/2 logical slots pack sparsely: the logical
//! vector is repeated N/(2n) times, which keeps rotations cyclic over the
//! logical slot count.

use std::f64::consts::PI;

use crate::error::{HeError, Result};

/// Generator of the rotation subgroup of (Z/2N)*.
pub const GALOIS_GEN: usize = 5;

#[derive(Clone, Copy, Debug)]
struct Complex {
    re: f64,
    im: f64,
}

impl Complex {
    fn new(re: f64, im: f64) -> Self {
        Self { re, im }
    }

    fn from_real(re: f64) -> Self {
        Self { re, im: 0.0 }
    }

    fn add(self, other: Self) -> Self {
        Self::new(self.re + other.re, self.im + other.im)
    }

    fn sub(self, other: Self) -> Self {
        Self::new(self.re - other.re, self.im - other.im)
    }

    fn mul(self, other: Self) -> Self {
        Self::new(
            self.re * other.re - self.im * other.im,
            self.re * other.im + self.im * other.re,
        )
    }

    fn conj(self) -> Self {
        Self::new(self.re, -self.im)
    }

    fn scale(self, s: f64) -> Self {
        Self::new(self.re * s, self.im * s)
    }
}

/// Radix-2 FFT computing Z_k = Σ_j X_j · e^{2πijk/n}.
fn fft(a: &mut [Complex]) {
    let n = a.len();
    if n <= 1 {
        return;
    }
    let mut j = 0usize;
    for i in 1..n {
        let mut bit = n >> 1;
        while j & bit != 0 {
            j ^= bit;
            bit >>= 1;
        }
        j ^= bit;
        if i < j {
            a.swap(i, j);
        }
    }
    let mut len = 2;
    while len <= n {
        let half = len / 2;
        let angle = 2.0 * PI / len as f64;
        let w_base = Complex::new(angle.cos(), angle.sin());
        let mut start = 0;
        while start < n {
            let mut w = Complex::new(1.0, 0.0);
            for k in 0..half {
                let u = a[start + k];
                let t = a[start + k + half].mul(w);
                a[start + k] = u.add(t);
                a[start + k + half] = u.sub(t);
                w = w.mul(w_base);
            }
            start += len;
        }
        len <<= 1;
    }
}

fn ifft(a: &mut [Complex]) {
    let inv_n = 1.0 / a.len() as f64;
    for x in a.iter_mut() {
        *x = x.conj();
    }
    fft(a);
    for x in a.iter_mut() {
        *x = x.conj().scale(inv_n);
    }
}

/// Encoder for a fixed ring dimension and logical slot count.
#[derive(Clone, Debug)]
pub struct SlotEncoder {
    ring_dim: usize,
    slots: usize,
    /// FFT position of each of the N/2 full slots.
    slot_to_fft: Vec<usize>,
    /// ψ^j for j in 0..N, ψ = e^{iπ/N}.
    twist: Vec<Complex>,
}

impl SlotEncoder {
    pub fn new(ring_dim: usize, slots: usize) -> Self {
        let half = ring_dim / 2;
        let two_n = 2 * ring_dim;
        let mut slot_to_fft = Vec::with_capacity(half);
        let mut root = 1usize;
        for _ in 0..half {
            slot_to_fft.push((root - 1) / 2);
            root = root * GALOIS_GEN % two_n;
        }
        let twist = (0..ring_dim)
            .map(|j| {
                let angle = j as f64 * PI / ring_dim as f64;
                Complex::new(angle.cos(), angle.sin())
            })
            .collect();
        Self {
            ring_dim,
            slots,
            slot_to_fft,
            twist,
        }
    }

    /// Encode up to `slots` real values at scale `delta` into integer
    /// coefficients.
    pub fn encode(&self, values: &[f64], delta: f64) -> Result<Vec<i64>> {
        if values.len() > self.slots {
            return Err(HeError::SlotOverflow {
                len: values.len(),
                slots: self.slots,
            });
        }
        let n = self.ring_dim;
        let mut z = vec![Complex::from_real(0.0); n];
        for (i, &pos) in self.slot_to_fft.iter().enumerate() {
            let v = values.get(i % self.slots).copied().unwrap_or(0.0);
            z[pos] = Complex::from_real(v);
            z[n - 1 - pos] = Complex::from_real(v);
        }
        ifft(&mut z);
        // p_j = b_j · ψ^{-j}
        let limit = (1u64 << 62) as f64;
        z.iter()
            .zip(&self.twist)
            .map(|(c, t)| {
                let coeff = c.mul(t.conj()).re * delta;
                if !coeff.is_finite() || coeff.abs() >= limit {
                    return Err(HeError::EncodingOverflow {
                        scale_bits: delta.log2().round() as u32,
                    });
                }
                Ok(coeff.round() as i64)
            })
            .collect()
    }

    /// Decode centered integer coefficients at `scale` into `slots` values.
    pub fn decode(&self, coeffs: &[i64], scale: f64) -> Vec<f64> {
        let mut b: Vec<Complex> = coeffs
            .iter()
            .zip(&self.twist)
            .map(|(&c, &t)| Complex::from_real(c as f64 / scale).mul(t))
            .collect();
        b.resize(self.ring_dim, Complex::from_real(0.0));
        fft(&mut b);
        self.slot_to_fft[..self.slots]
            .iter()
            .map(|&pos| b[pos].re)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn max_err(a: &[f64], b: &[f64]) -> f64 {
        a.iter()
            .zip(b)
            .map(|(x, y)| (x - y).abs())
            .fold(0.0, f64::max)
    }

    #[test]
    fn fft_ifft_roundtrip() {
        let mut data: Vec<Complex> = (0..64)
            .map(|i| Complex::new(i as f64, -(i as f64) * 0.5))
            .collect();
        let original = data.clone();
        fft(&mut data);
        ifft(&mut data);
        for (a, b) in data.iter().zip(&original) {
            assert!((a.re - b.re).abs() < 1e-10 && (a.im - b.im).abs() < 1e-10);
        }
    }

    #[test]
    fn encode_decode_full_slots() {
        let enc = SlotEncoder::new(64, 32);
        let values: Vec<f64> = (0..32).map(|i| (i as f64 * 0.3).sin() * 5.0).collect();
        let delta = (1u64 << 30) as f64;
        let coeffs = enc.encode(&values, delta).unwrap();
        assert_eq!(coeffs.len(), 64);
        let decoded = enc.decode(&coeffs, delta);
        assert!(max_err(&values, &decoded) < 1e-6);
    }

    #[test]
    fn sparse_packing_repeats_vector() {
        let enc = SlotEncoder::new(64, 8);
        let values = [1.0, -2.0, 3.5, 0.0, 255.0, 0.25, -0.125, 7.0];
        let delta = (1u64 << 30) as f64;
        let coeffs = enc.encode(&values, delta).unwrap();
        let decoded = enc.decode(&coeffs, delta);
        assert_eq!(decoded.len(), 8);
        assert!(max_err(&values, &decoded) < 1e-6);

        // the full N/2-slot view is the logical vector repeated
        let full = SlotEncoder::new(64, 32).decode(&coeffs, delta);
        for (i, v) in full.iter().enumerate() {
            assert!((v - values[i % 8]).abs() < 1e-6, "slot {}: {}", i, v);
        }
    }

    #[test]
    fn automorphism_by_generator_rotates_left() {
        use super::super::ntt::find_ntt_primes;
        use super::super::rns::{RnsBasis, RnsPoly};

        let n = 32;
        let enc = SlotEncoder::new(n, 16);
        let values: Vec<f64> = (0..16).map(|i| i as f64).collect();
        let delta = (1u64 << 20) as f64;
        let coeffs = enc.encode(&values, delta).unwrap();

        let basis = RnsBasis::new(n, find_ntt_primes(40, 1, n, &[])).unwrap();
        let rotated = RnsPoly::from_signed(&coeffs, &basis, 1)
            .automorphism(GALOIS_GEN, &basis)
            .centered_channel(0, &basis);
        let decoded = enc.decode(&rotated, delta);
        for i in 0..16 {
            let expected = values[(i + 1) % 16];
            assert!((decoded[i] - expected).abs() < 1e-4, "slot {}", i);
        }
    }

    #[test]
    fn rejects_too_many_values() {
        let enc = SlotEncoder::new(16, 4);
        assert_eq!(
            enc.encode(&[0.0; 5], 1.0).unwrap_err(),
            HeError::SlotOverflow { len: 5, slots: 4 }
        );
    }

    #[test]
    fn rejects_unrepresentable_scale() {
        let enc = SlotEncoder::new(16, 4);
        let err = enc.encode(&[1.0e6], (1u64 << 60) as f64).unwrap_err();
        assert!(matches!(err, HeError::EncodingOverflow { .. }));
    }
}
