//! Cleartext stand-in backend.
//!
//! Encode and encrypt are the identity, arithmetic runs directly on `f64`
//! slot vectors. Levels, rotation keys and key ownership are still tracked
//! exactly as the CKKS backend tracks them, so an engine that passes against
//! `PlainBackend` has the same depth and key requirements under real
//! encryption.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::backend::{eval_poly_clear, poly_depth, Decrypted, HeBackend, KeyPair};
use crate::error::{HeError, Result};
use crate::params::HeParams;

/// Passthrough backend for tests and dry runs.
#[derive(Clone, Debug)]
pub struct PlainBackend {
    slots: usize,
    depth: usize,
    next_key: std::cell::Cell<u8>,
}

/// A "ciphertext" holding its slots in the clear.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PlainCiphertext {
    pub slots: Vec<f64>,
    pub level: usize,
    pub key_id: u8,
}

/// Identity-encoded plaintext.
#[derive(Clone, Debug, PartialEq)]
pub struct PlainPlaintext {
    pub slots: Vec<f64>,
}

/// Tag identifying which key pair a ciphertext belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PlainKey(pub u8);

/// Offsets for which rotation "keys" exist.
#[derive(Clone, Debug, Default)]
pub struct PlainEvalKeys {
    rotations: BTreeSet<usize>,
}

impl PlainBackend {
    fn normalize(&self, offset: i32) -> usize {
        offset.rem_euclid(self.slots as i32) as usize
    }

    fn next_level(&self, level: usize) -> Result<usize> {
        if level >= self.depth {
            return Err(HeError::DepthExceeded {
                required: level + 1,
                available: self.depth,
            });
        }
        Ok(level + 1)
    }

    fn rotate_slots(&self, slots: &[f64], by: usize) -> Vec<f64> {
        let mut out = slots.to_vec();
        out.rotate_left(by);
        out
    }
}

impl HeBackend for PlainBackend {
    type Plaintext = PlainPlaintext;
    type Ciphertext = PlainCiphertext;
    type PublicKey = PlainKey;
    type SecretKey = PlainKey;
    type EvalKeys = PlainEvalKeys;

    fn configure(params: &HeParams, slot_count: usize) -> Result<Self> {
        params.validate(slot_count)?;
        Ok(Self {
            slots: slot_count,
            depth: params.mult_depth,
            next_key: std::cell::Cell::new(0),
        })
    }

    fn slot_count(&self) -> usize {
        self.slots
    }

    fn mult_depth(&self) -> usize {
        self.depth
    }

    fn describe(&self) -> String {
        format!(
            "cleartext backend, {} slots, depth {}",
            self.slots, self.depth
        )
    }

    fn keygen(&self, rotations: &[i32]) -> Result<KeyPair<Self>> {
        let id = self.next_key.get();
        self.next_key.set(id.wrapping_add(1));
        Ok(KeyPair {
            public: PlainKey(id),
            secret: PlainKey(id),
            eval: PlainEvalKeys {
                rotations: rotations.iter().map(|&r| self.normalize(r)).collect(),
            },
        })
    }

    fn encode(&self, values: &[f64]) -> Result<PlainPlaintext> {
        if values.len() > self.slots {
            return Err(HeError::SlotOverflow {
                len: values.len(),
                slots: self.slots,
            });
        }
        let mut slots = vec![0.0; self.slots];
        slots[..values.len()].copy_from_slice(values);
        Ok(PlainPlaintext { slots })
    }

    fn encrypt(&self, pt: &PlainPlaintext, pk: &PlainKey) -> Result<PlainCiphertext> {
        Ok(PlainCiphertext {
            slots: pt.slots.clone(),
            level: 0,
            key_id: pk.0,
        })
    }

    fn decrypt(&self, ct: &PlainCiphertext, sk: &PlainKey) -> Result<Decrypted> {
        let valid = ct.key_id == sk.0 && ct.slots.iter().all(|v| v.is_finite());
        Ok(Decrypted {
            values: ct.slots.clone(),
            valid,
        })
    }

    fn add(&self, a: &PlainCiphertext, b: &PlainCiphertext) -> Result<PlainCiphertext> {
        Ok(PlainCiphertext {
            slots: a.slots.iter().zip(&b.slots).map(|(x, y)| x + y).collect(),
            level: a.level.max(b.level),
            key_id: a.key_id,
        })
    }

    fn add_plain(&self, a: &PlainCiphertext, pt: &PlainPlaintext) -> Result<PlainCiphertext> {
        Ok(PlainCiphertext {
            slots: a.slots.iter().zip(&pt.slots).map(|(x, y)| x + y).collect(),
            level: a.level,
            key_id: a.key_id,
        })
    }

    fn mul(
        &self,
        a: &PlainCiphertext,
        b: &PlainCiphertext,
        _keys: &PlainEvalKeys,
    ) -> Result<PlainCiphertext> {
        let level = self.next_level(a.level.max(b.level))?;
        Ok(PlainCiphertext {
            slots: a.slots.iter().zip(&b.slots).map(|(x, y)| x * y).collect(),
            level,
            key_id: a.key_id,
        })
    }

    fn mul_scalar(&self, a: &PlainCiphertext, scalar: f64) -> Result<PlainCiphertext> {
        let level = self.next_level(a.level)?;
        Ok(PlainCiphertext {
            slots: a.slots.iter().map(|x| x * scalar).collect(),
            level,
            key_id: a.key_id,
        })
    }

    fn rotate(
        &self,
        a: &PlainCiphertext,
        offset: i32,
        keys: &PlainEvalKeys,
    ) -> Result<PlainCiphertext> {
        let by = self.normalize(offset);
        if by == 0 {
            return Ok(a.clone());
        }
        if !keys.rotations.contains(&by) {
            return Err(HeError::MissingRotationKey(offset));
        }
        Ok(PlainCiphertext {
            slots: self.rotate_slots(&a.slots, by),
            level: a.level,
            key_id: a.key_id,
        })
    }

    fn sum_run(
        &self,
        a: &PlainCiphertext,
        run: usize,
        keys: &PlainEvalKeys,
    ) -> Result<PlainCiphertext> {
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
            acc = self.add(&acc, &rotated)?;
            step <<= 1;
        }
        Ok(acc)
    }

    fn eval_poly(
        &self,
        a: &PlainCiphertext,
        coeffs: &[f64],
        _keys: &PlainEvalKeys,
    ) -> Result<PlainCiphertext> {
        if coeffs.len() < 2 {
            return Err(HeError::InvalidParams(
                "polynomial must have degree >= 1".into(),
            ));
        }
        let required = a.level + poly_depth(coeffs);
        if required > self.depth {
            return Err(HeError::DepthExceeded {
                required,
                available: self.depth,
            });
        }
        Ok(PlainCiphertext {
            slots: a.slots.iter().map(|&x| eval_poly_clear(x, coeffs)).collect(),
            level: required,
            key_id: a.key_id,
        })
    }

    fn level(&self, ct: &PlainCiphertext) -> usize {
        ct.level
    }
}
