//! Leveled RNS-CKKS backend.
//!
//! The modulus chain is `[q_0, q_1, ..., q_L]` with `L = mult_depth`: a base
//! prime of `first_mod_bits` that is never dropped and `L` scaling primes of
//! `scale_bits` each. A ciphertext at level `l` carries the first `L + 1 - l`
//! primes. Every multiplication rescales by the last prime it carries.
//!
//! Decryption reads channel 0 only, so decrypted slot values must stay below
//! `q_0 / (2 * scale)` in magnitude (512 with the default 60/50-bit chain).

mod eval;
mod keys;
mod ntt;
mod poly_eval;
mod rns;
mod sampling;
mod simd;

use std::sync::{Mutex, MutexGuard};

use log::{debug, info};
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::backend::{Decrypted, HeBackend, KeyPair};
use crate::error::{HeError, Result};
use crate::params::HeParams;

pub use keys::{CkksEvalKeys, CkksPublicKey, CkksSecretKey};

use keys::SwitchingKey;
use ntt::{find_ntt_primes, mod_pow};
use rns::{RnsBasis, RnsPoly};
use simd::{SlotEncoder, GALOIS_GEN};

/// Largest relative scale difference `add` accepts.
pub const SCALE_TOLERANCE: f64 = 1e-3;

/// Encoded plaintext. Keeps its source values so it can be re-encoded at a
/// ciphertext's scale and level.
#[derive(Clone, Debug)]
pub struct CkksPlaintext {
    pub(crate) values: Vec<f64>,
    pub(crate) coeffs: Vec<i64>,
    pub(crate) scale: f64,
}

/// Ciphertext `(c0, c1)` in the coefficient domain, decrypting to
/// `c0 + c1 * s`.
#[derive(Clone, Debug)]
pub struct CkksCiphertext {
    pub(crate) c0: RnsPoly,
    pub(crate) c1: RnsPoly,
    pub(crate) scale: f64,
    pub(crate) key_id: [u8; 32],
}

impl CkksCiphertext {
    pub fn scale(&self) -> f64 {
        self.scale
    }

    pub fn num_primes(&self) -> usize {
        self.c0.num_primes()
    }
}

/// RNS-CKKS crypto context.
pub struct CkksBackend {
    params: HeParams,
    slots: usize,
    delta: f64,
    basis: RnsBasis,
    encoder: SlotEncoder,
    rng: Mutex<StdRng>,
}

impl std::fmt::Debug for CkksBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CkksBackend")
            .field("ring_dim", &self.basis.ring_dim)
            .field("slots", &self.slots)
            .field("primes", &self.basis.primes)
            .finish()
    }
}

impl CkksBackend {
    pub fn ring_dim(&self) -> usize {
        self.basis.ring_dim
    }

    pub fn primes(&self) -> &[i64] {
        &self.basis.primes
    }

    fn rng(&self) -> MutexGuard<'_, StdRng> {
        self.rng.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Galois element `5^r mod 2N` for a left rotation by `r` slots.
    fn galois_element(&self, r: usize) -> usize {
        mod_pow(GALOIS_GEN as i64, r as u64, 2 * self.basis.ring_dim as i64) as usize
    }

    fn normalize(&self, offset: i32) -> usize {
        offset.rem_euclid(self.slots as i32) as usize
    }

    fn level_of(&self, num_primes: usize) -> usize {
        self.basis.num_primes() - num_primes
    }
}

impl HeBackend for CkksBackend {
    type Plaintext = CkksPlaintext;
    type Ciphertext = CkksCiphertext;
    type PublicKey = CkksPublicKey;
    type SecretKey = CkksSecretKey;
    type EvalKeys = CkksEvalKeys;

    fn configure(params: &HeParams, slot_count: usize) -> Result<Self> {
        params.validate(slot_count)?;
        let ring_dim = params.ring_dim_for(slot_count);
        let mut primes = find_ntt_primes(params.first_mod_bits, 1, ring_dim, &[]);
        let scaling = find_ntt_primes(params.scale_bits, params.mult_depth, ring_dim, &primes);
        if primes.len() != 1 || scaling.len() != params.mult_depth {
            return Err(HeError::InvalidParams(format!(
                "not enough {}-bit primes congruent to 1 mod {}",
                params.scale_bits,
                2 * ring_dim
            )));
        }
        primes.extend(scaling);
        let basis = RnsBasis::new(ring_dim, primes)?;
        let rng = match params.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        info!("CKKS scheme is using ring dimension {}", ring_dim);
        debug!("modulus chain: {:?}", basis.primes);
        Ok(Self {
            params: params.clone(),
            slots: slot_count,
            delta: 2f64.powi(params.scale_bits as i32),
            encoder: SlotEncoder::new(ring_dim, slot_count),
            basis,
            rng: Mutex::new(rng),
        })
    }

    fn slot_count(&self) -> usize {
        self.slots
    }

    fn mult_depth(&self) -> usize {
        self.params.mult_depth
    }

    fn describe(&self) -> String {
        format!(
            "RNS-CKKS, ring dimension {}, {} slots, {} primes, scale 2^{}",
            self.basis.ring_dim,
            self.slots,
            self.basis.num_primes(),
            self.params.scale_bits
        )
    }

    fn keygen(&self, rotations: &[i32]) -> Result<KeyPair<Self>> {
        let mut rng = self.rng();
        let mut secret = keys::generate_secret(&mut *rng, &self.basis);
        let public = keys::generate_public(&mut *rng, &self.basis, &mut secret);
        info!("generating multiplication keys");
        let relin = SwitchingKey::relinearisation(&mut *rng, &self.basis, &secret);
        let mut rotation_keys = std::collections::BTreeMap::new();
        for &offset in rotations {
            let r = self.normalize(offset);
            if r == 0 || rotation_keys.contains_key(&r) {
                continue;
            }
            let g = self.galois_element(r);
            debug!("rotation key for offset {} (galois element {})", r, g);
            rotation_keys.insert(r, SwitchingKey::rotation(&mut *rng, &self.basis, &secret, g));
        }
        debug!("key id {}", hex::encode(&public.key_id()[..8]));
        Ok(KeyPair {
            public,
            secret,
            eval: CkksEvalKeys {
                relin,
                rotations: rotation_keys,
            },
        })
    }

    fn encode(&self, values: &[f64]) -> Result<CkksPlaintext> {
        self.encode_at(values, self.delta)
    }

    fn encrypt(&self, pt: &CkksPlaintext, pk: &CkksPublicKey) -> Result<CkksCiphertext> {
        Ok(self.encrypt_poly(pt, pk))
    }

    fn decrypt(&self, ct: &CkksCiphertext, sk: &CkksSecretKey) -> Result<Decrypted> {
        if !ct.scale.is_finite() || ct.scale <= 0.0 {
            return Ok(Decrypted {
                values: vec![0.0; self.slots],
                valid: false,
            });
        }
        let coeffs = self.decrypt_channel(ct, sk);
        let values = self.encoder.decode(&coeffs, ct.scale);
        let valid = ct.key_id == sk.key_id && values.iter().all(|v| v.is_finite());
        Ok(Decrypted { values, valid })
    }

    fn add(&self, a: &CkksCiphertext, b: &CkksCiphertext) -> Result<CkksCiphertext> {
        self.add_ct(a, b)
    }

    fn add_plain(&self, a: &CkksCiphertext, pt: &CkksPlaintext) -> Result<CkksCiphertext> {
        self.add_pt(a, pt)
    }

    fn mul(
        &self,
        a: &CkksCiphertext,
        b: &CkksCiphertext,
        keys: &CkksEvalKeys,
    ) -> Result<CkksCiphertext> {
        self.mul_relin_rescale(a, b, keys)
    }

    fn mul_scalar(&self, a: &CkksCiphertext, scalar: f64) -> Result<CkksCiphertext> {
        self.mul_const(a, scalar)
    }

    fn rotate(
        &self,
        a: &CkksCiphertext,
        offset: i32,
        keys: &CkksEvalKeys,
    ) -> Result<CkksCiphertext> {
        let r = self.normalize(offset);
        if r == 0 {
            return Ok(a.clone());
        }
        let key = keys
            .rotations
            .get(&r)
            .ok_or(HeError::MissingRotationKey(offset))?;
        Ok(self.rotate_with(a, self.galois_element(r), key))
    }

    fn sum_run(
        &self,
        a: &CkksCiphertext,
        run: usize,
        keys: &CkksEvalKeys,
    ) -> Result<CkksCiphertext> {
        if run == 0 || !run.is_power_of_two() || run > self.slots {
            return Err(HeError::RunLength {
                run,
                slots: self.slots,
            });
        }
        let mut acc = a.clone();
        let mut step = 1usize;
        while step < run {
            let rotated = self.rotate(&acc, step as i32, keys)?;
            acc = self.add_ct(&acc, &rotated)?;
            step <<= 1;
        }
        Ok(acc)
    }

    fn eval_poly(
        &self,
        a: &CkksCiphertext,
        coeffs: &[f64],
        keys: &CkksEvalKeys,
    ) -> Result<CkksCiphertext> {
        self.eval_polynomial(a, coeffs, keys)
    }

    fn level(&self, ct: &CkksCiphertext) -> usize {
        self.level_of(ct.num_primes())
    }
}
