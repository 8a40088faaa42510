//! Depth-optimal polynomial evaluation on ciphertexts.
//!
//! Powers `x^m` come from a binary tree (`x^m = x^hi * x^lo`, `hi` the largest
//! power of two below `m`) at depth `ceil_log2(m)`. Term `k` is evaluated as
//! `(c_k * x) * x^(k-1)`, so the coefficient multiply shares a level with the
//! power tree instead of adding one on top. Terms are summed after level
//! alignment and the constant goes straight into coefficient 0.

use std::collections::BTreeMap;

use log::debug;

use crate::backend::{ceil_log2, poly_depth};
use crate::error::{HeError, Result};

use super::keys::CkksEvalKeys;
use super::rns::RnsPoly;
use super::{CkksBackend, CkksCiphertext};

impl CkksBackend {
    pub(super) fn eval_polynomial(
        &self,
        x: &CkksCiphertext,
        coeffs: &[f64],
        keys: &CkksEvalKeys,
    ) -> Result<CkksCiphertext> {
        if coeffs.len() < 2 {
            return Err(HeError::InvalidParams(
                "polynomial must have degree >= 1".into(),
            ));
        }
        let level = self.level_of(x.num_primes());
        let required = level + poly_depth(coeffs);
        if required > self.params.mult_depth {
            return Err(HeError::DepthExceeded {
                required,
                available: self.params.mult_depth,
            });
        }
        debug!(
            "evaluating degree-{} polynomial from level {} to {}",
            coeffs.len() - 1,
            level,
            required
        );

        let mut powers = BTreeMap::new();
        powers.insert(1usize, x.clone());
        let mut acc: Option<CkksCiphertext> = None;
        for (k, &c) in coeffs.iter().enumerate().skip(1) {
            if c == 0.0 {
                continue;
            }
            let cx = self.mul_const(x, c)?;
            let term = if k == 1 {
                cx
            } else {
                let p = self.power(&mut powers, k - 1, keys)?;
                self.mul_relin_rescale(&cx, &p, keys)?
            };
            acc = Some(match acc {
                Some(sum) => self.add_ct(&sum, &term)?,
                None => term,
            });
        }
        let acc = match acc {
            Some(sum) => sum,
            // constant polynomial: a fresh encryption of zero at x's level
            None => CkksCiphertext {
                c0: RnsPoly::zero(self.basis.ring_dim, x.num_primes()),
                c1: RnsPoly::zero(self.basis.ring_dim, x.num_primes()),
                scale: x.scale,
                key_id: x.key_id,
            },
        };
        self.add_scalar(&acc, coeffs[0])
    }

    fn power(
        &self,
        cache: &mut BTreeMap<usize, CkksCiphertext>,
        m: usize,
        keys: &CkksEvalKeys,
    ) -> Result<CkksCiphertext> {
        if let Some(p) = cache.get(&m) {
            return Ok(p.clone());
        }
        let hi = 1usize << (ceil_log2(m) - 1);
        let lo = m - hi;
        let a = self.power(cache, hi, keys)?;
        let b = self.power(cache, lo, keys)?;
        let p = self.mul_relin_rescale(&a, &b, keys)?;
        cache.insert(m, p.clone());
        Ok(p)
    }
}
