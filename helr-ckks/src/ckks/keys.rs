//! RLWE key material and gadget key switching.
//!
//! A switching key from `s'` to `s` holds, for every prime `q_i` of the chain
//! and every base-`2^DECOMP_BITS` digit `k`, an encryption of
//! `2^(k * DECOMP_BITS) * s'` that is nonzero only in channel `i`. Summed over
//! the CRT idempotents this reconstructs `c * s'` from the digits of the
//! residues of `c`, so no multi-precision arithmetic is needed.

use std::collections::BTreeMap;

use rand::Rng;
use sha2::{Digest, Sha256};

use super::ntt::{mod_pow, mul_mod};
use super::rns::{RnsBasis, RnsPoly};
use super::sampling::{sample_gaussian, sample_ternary, sample_uniform};

/// Bits per gadget digit.
pub const DECOMP_BITS: u32 = 12;

/// Ternary secret, kept in both domains.
#[derive(Clone, Debug)]
pub struct CkksSecretKey {
    pub(crate) coeffs: Vec<i64>,
    pub(crate) s_ntt: RnsPoly,
    pub(crate) key_id: [u8; 32],
}

/// Public key `(b, a) = (-a*s + e, a)`, NTT domain over the full chain.
#[derive(Clone, Debug)]
pub struct CkksPublicKey {
    pub(crate) b: RnsPoly,
    pub(crate) a: RnsPoly,
    pub(crate) key_id: [u8; 32],
}

impl CkksPublicKey {
    pub fn key_id(&self) -> [u8; 32] {
        self.key_id
    }
}

/// Gadget switching key: `parts[i][k] = (b, a)` in the NTT domain.
#[derive(Clone, Debug)]
pub struct SwitchingKey {
    parts: Vec<Vec<(RnsPoly, RnsPoly)>>,
}

/// Relinearisation key plus one rotation key per normalised offset.
#[derive(Clone, Debug)]
pub struct CkksEvalKeys {
    pub(crate) relin: SwitchingKey,
    pub(crate) rotations: BTreeMap<usize, SwitchingKey>,
}

impl CkksEvalKeys {
    /// Normalised offsets with a rotation key.
    pub fn rotation_offsets(&self) -> Vec<usize> {
        self.rotations.keys().copied().collect()
    }
}

/// SHA-256 identifier over the public key, used to match ciphertexts to keys.
pub fn compute_key_id(b: &RnsPoly, a: &RnsPoly) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(b"helr_ckks_key_id_v1");
    for poly in [b, a] {
        for res in &poly.residues {
            for c in res {
                hasher.update(c.to_le_bytes());
            }
        }
    }
    hasher.finalize().into()
}

/// Number of gadget digits covering the largest prime of the basis.
pub fn digit_count(basis: &RnsBasis) -> usize {
    let max_bits = basis
        .primes
        .iter()
        .map(|&q| 64 - q.leading_zeros())
        .max()
        .unwrap_or(0);
    max_bits.div_ceil(DECOMP_BITS) as usize
}

pub fn generate_secret<R: Rng>(rng: &mut R, basis: &RnsBasis) -> CkksSecretKey {
    let coeffs = sample_ternary(rng, basis.ring_dim);
    let s_ntt = RnsPoly::from_signed(&coeffs, basis, basis.num_primes()).to_ntt(basis);
    CkksSecretKey {
        coeffs,
        s_ntt,
        key_id: [0u8; 32],
    }
}

/// RLWE sample `(-a*s + e, a)` in the NTT domain over the full chain.
fn rlwe_sample<R: Rng>(rng: &mut R, basis: &RnsBasis, s_ntt: &RnsPoly) -> (RnsPoly, RnsPoly) {
    let k = basis.num_primes();
    let a = sample_uniform(rng, basis, k);
    let e = RnsPoly::from_signed(&sample_gaussian(rng, basis.ring_dim), basis, k).to_ntt(basis);
    let b = e.sub(&a.hadamard(s_ntt, basis), basis);
    (b, a)
}

/// Generate the public key and stamp `sk` with its identifier.
pub fn generate_public<R: Rng>(rng: &mut R, basis: &RnsBasis, sk: &mut CkksSecretKey) -> CkksPublicKey {
    let (b, a) = rlwe_sample(rng, basis, &sk.s_ntt);
    let key_id = compute_key_id(&b, &a);
    sk.key_id = key_id;
    CkksPublicKey { b, a, key_id }
}

impl SwitchingKey {
    /// Key switching from `target` (NTT domain, full chain) to `sk`.
    pub fn generate<R: Rng>(
        rng: &mut R,
        basis: &RnsBasis,
        sk: &CkksSecretKey,
        target: &RnsPoly,
    ) -> Self {
        let digits = digit_count(basis);
        let mut parts = Vec::with_capacity(basis.num_primes());
        for (i, &q) in basis.primes.iter().enumerate() {
            let mut channel = Vec::with_capacity(digits);
            for k in 0..digits {
                let (mut b, a) = rlwe_sample(rng, basis, &sk.s_ntt);
                let gadget = mod_pow(2, k as u64 * DECOMP_BITS as u64, q);
                for (v, &t) in b.residues[i].iter_mut().zip(&target.residues[i]) {
                    *v = (*v + mul_mod(gadget, t, q)) % q;
                }
                channel.push((b, a));
            }
            parts.push(channel);
        }
        Self { parts }
    }

    /// Relinearisation key: switches from `s^2` to `s`.
    pub fn relinearisation<R: Rng>(rng: &mut R, basis: &RnsBasis, sk: &CkksSecretKey) -> Self {
        let s2 = sk.s_ntt.hadamard(&sk.s_ntt, basis);
        Self::generate(rng, basis, sk, &s2)
    }

    /// Rotation key for Galois element `g`: switches from `σ_g(s)` to `s`.
    pub fn rotation<R: Rng>(rng: &mut R, basis: &RnsBasis, sk: &CkksSecretKey, g: usize) -> Self {
        let rotated = RnsPoly::from_signed(&sk.coeffs, basis, basis.num_primes())
            .automorphism(g, basis)
            .to_ntt(basis);
        Self::generate(rng, basis, sk, &rotated)
    }

    /// Apply the key to a coefficient-domain polynomial `c` at any level.
    /// Returns `(k0, k1)` in the coefficient domain with
    /// `k0 + k1*s ≈ c * s'`.
    pub fn switch(&self, c: &RnsPoly, basis: &RnsBasis) -> (RnsPoly, RnsPoly) {
        let n = basis.ring_dim;
        let k = c.num_primes();
        let mask = (1i64 << DECOMP_BITS) - 1;
        let mut acc0 = RnsPoly::zero(n, k);
        let mut acc1 = RnsPoly::zero(n, k);
        for (i, channel) in c.residues.iter().enumerate() {
            for (d, (kb, ka)) in self.parts[i].iter().enumerate() {
                let shift = d as u32 * DECOMP_BITS;
                let digit: Vec<i64> = channel.iter().map(|&v| (v >> shift) & mask).collect();
                if digit.iter().all(|&v| v == 0) {
                    continue;
                }
                let digit_ntt = RnsPoly::from_signed(&digit, basis, k).to_ntt(basis);
                mul_accumulate(&mut acc0, &digit_ntt, kb, basis);
                mul_accumulate(&mut acc1, &digit_ntt, ka, basis);
            }
        }
        (acc0.from_ntt(basis), acc1.from_ntt(basis))
    }
}

/// `acc += x ⊙ key` over the channels of `acc`; `key` may carry more primes.
fn mul_accumulate(acc: &mut RnsPoly, x: &RnsPoly, key: &RnsPoly, basis: &RnsBasis) {
    for (i, (acc_i, x_i)) in acc.residues.iter_mut().zip(&x.residues).enumerate() {
        let q = basis.primes[i];
        for ((a, &xv), &kv) in acc_i.iter_mut().zip(x_i).zip(&key.residues[i]) {
            *a = (*a + mul_mod(xv, kv, q)) % q;
        }
    }
}
