//! Encryption, decryption and ciphertext arithmetic.

use crate::error::{HeError, Result};

use super::keys::{CkksEvalKeys, CkksPublicKey, CkksSecretKey, SwitchingKey};
use super::rns::RnsPoly;
use super::sampling::{sample_gaussian, sample_ternary};
use super::{CkksBackend, CkksCiphertext, CkksPlaintext, SCALE_TOLERANCE};

impl CkksBackend {
    pub(super) fn encode_at(&self, values: &[f64], scale: f64) -> Result<CkksPlaintext> {
        let coeffs = self.encoder.encode(values, scale)?;
        Ok(CkksPlaintext {
            values: values.to_vec(),
            coeffs,
            scale,
        })
    }

    /// `(b*v + e0 + m, a*v + e1)` over the full chain.
    pub(super) fn encrypt_poly(&self, pt: &CkksPlaintext, pk: &CkksPublicKey) -> CkksCiphertext {
        let basis = &self.basis;
        let n = basis.ring_dim;
        let k = basis.num_primes();
        let (v, e0, e1) = {
            let mut rng = self.rng();
            (
                sample_ternary(&mut *rng, n),
                sample_gaussian(&mut *rng, n),
                sample_gaussian(&mut *rng, n),
            )
        };
        let v = RnsPoly::from_signed(&v, basis, k).to_ntt(basis);
        let m = RnsPoly::from_signed(&pt.coeffs, basis, k);
        let c0 = pk
            .b
            .hadamard(&v, basis)
            .from_ntt(basis)
            .add(&RnsPoly::from_signed(&e0, basis, k), basis)
            .add(&m, basis);
        let c1 = pk
            .a
            .hadamard(&v, basis)
            .from_ntt(basis)
            .add(&RnsPoly::from_signed(&e1, basis, k), basis);
        CkksCiphertext {
            c0,
            c1,
            scale: pt.scale,
            key_id: pk.key_id,
        }
    }

    /// `c0 + c1*s` modulo `q_0`, centered.
    pub(super) fn decrypt_channel(&self, ct: &CkksCiphertext, sk: &CkksSecretKey) -> Vec<i64> {
        let basis = &self.basis;
        let c1s = ct
            .c1
            .truncate(1)
            .to_ntt(basis)
            .hadamard(&sk.s_ntt.truncate(1), basis)
            .from_ntt(basis);
        ct.c0
            .truncate(1)
            .add(&c1s, basis)
            .centered_channel(0, basis)
    }

    /// Bring both operands down to the smaller prime count.
    fn align(&self, a: &CkksCiphertext, b: &CkksCiphertext) -> (CkksCiphertext, CkksCiphertext) {
        let k = a.num_primes().min(b.num_primes());
        (truncate(a, k), truncate(b, k))
    }

    fn check_scales(&self, left: f64, right: f64) -> Result<()> {
        if (left - right).abs() > SCALE_TOLERANCE * left.abs().max(right.abs()) {
            return Err(HeError::ScaleMismatch { left, right });
        }
        Ok(())
    }

    /// Next level after one more multiplication, or `DepthExceeded`.
    fn check_depth(&self, num_primes: usize) -> Result<()> {
        let level = self.level_of(num_primes);
        if num_primes < 2 {
            return Err(HeError::DepthExceeded {
                required: level + 1,
                available: self.params.mult_depth,
            });
        }
        Ok(())
    }

    pub(super) fn add_ct(&self, a: &CkksCiphertext, b: &CkksCiphertext) -> Result<CkksCiphertext> {
        self.check_scales(a.scale, b.scale)?;
        let (a, b) = self.align(a, b);
        Ok(CkksCiphertext {
            c0: a.c0.add(&b.c0, &self.basis),
            c1: a.c1.add(&b.c1, &self.basis),
            scale: a.scale,
            key_id: a.key_id,
        })
    }

    /// Re-encodes the plaintext's values at the ciphertext's scale, so the
    /// plaintext's own encoding scale does not matter.
    pub(super) fn add_pt(&self, a: &CkksCiphertext, pt: &CkksPlaintext) -> Result<CkksCiphertext> {
        let coeffs = if pt.scale == a.scale {
            pt.coeffs.clone()
        } else {
            self.encoder.encode(&pt.values, a.scale)?
        };
        let m = RnsPoly::from_signed(&coeffs, &self.basis, a.num_primes());
        Ok(CkksCiphertext {
            c0: a.c0.add(&m, &self.basis),
            c1: a.c1.clone(),
            scale: a.scale,
            key_id: a.key_id,
        })
    }

    /// Tensor, relinearise, rescale.
    pub(super) fn mul_relin_rescale(
        &self,
        a: &CkksCiphertext,
        b: &CkksCiphertext,
        keys: &CkksEvalKeys,
    ) -> Result<CkksCiphertext> {
        let (a, b) = self.align(a, b);
        let k = a.num_primes();
        self.check_depth(k)?;
        let basis = &self.basis;
        let a0 = a.c0.to_ntt(basis);
        let a1 = a.c1.to_ntt(basis);
        let b0 = b.c0.to_ntt(basis);
        let b1 = b.c1.to_ntt(basis);
        let d0 = a0.hadamard(&b0, basis).from_ntt(basis);
        let d1 = a0
            .hadamard(&b1, basis)
            .add(&a1.hadamard(&b0, basis), basis)
            .from_ntt(basis);
        let d2 = a1.hadamard(&b1, basis).from_ntt(basis);
        let (k0, k1) = keys.relin.switch(&d2, basis);
        let q_last = basis.primes[k - 1] as f64;
        Ok(CkksCiphertext {
            c0: d0.add(&k0, basis).rescale(basis),
            c1: d1.add(&k1, basis).rescale(basis),
            scale: a.scale * b.scale / q_last,
            key_id: a.key_id,
        })
    }

    /// Multiply by `round(c * q_last)` and rescale by `q_last`; the scale is
    /// unchanged.
    pub(super) fn mul_const(&self, a: &CkksCiphertext, scalar: f64) -> Result<CkksCiphertext> {
        let k = a.num_primes();
        self.check_depth(k)?;
        let basis = &self.basis;
        let factor = scalar * basis.primes[k - 1] as f64;
        if !factor.is_finite() || factor.abs() >= (1u64 << 62) as f64 {
            return Err(HeError::EncodingOverflow {
                scale_bits: self.params.scale_bits,
            });
        }
        let f = factor.round() as i64;
        Ok(CkksCiphertext {
            c0: a.c0.scalar_mul(f, basis).rescale(basis),
            c1: a.c1.scalar_mul(f, basis).rescale(basis),
            scale: a.scale,
            key_id: a.key_id,
        })
    }

    /// Apply σ_g to both components and switch `σ_g(s)` back to `s`.
    pub(super) fn rotate_with(
        &self,
        a: &CkksCiphertext,
        g: usize,
        key: &SwitchingKey,
    ) -> CkksCiphertext {
        let basis = &self.basis;
        let c0 = a.c0.automorphism(g, basis);
        let c1 = a.c1.automorphism(g, basis);
        let (k0, k1) = key.switch(&c1, basis);
        CkksCiphertext {
            c0: c0.add(&k0, basis),
            c1: k1,
            scale: a.scale,
            key_id: a.key_id,
        }
    }

    /// Add a real constant to every slot.
    pub(super) fn add_scalar(&self, a: &CkksCiphertext, constant: f64) -> Result<CkksCiphertext> {
        let value = constant * a.scale;
        if !value.is_finite() || value.abs() >= (1u64 << 62) as f64 {
            return Err(HeError::EncodingOverflow {
                scale_bits: self.params.scale_bits,
            });
        }
        Ok(CkksCiphertext {
            c0: a.c0.add_constant(value.round() as i64, &self.basis),
            c1: a.c1.clone(),
            scale: a.scale,
            key_id: a.key_id,
        })
    }
}

fn truncate(ct: &CkksCiphertext, num_primes: usize) -> CkksCiphertext {
    CkksCiphertext {
        c0: ct.c0.truncate(num_primes),
        c1: ct.c1.truncate(num_primes),
        scale: ct.scale,
        key_id: ct.key_id,
    }
}
