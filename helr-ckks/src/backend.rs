//! The homomorphic-encryption capability interface.
//!
//! The inference engine is generic over `HeBackend`, so the cleartext
//! `PlainBackend` and the lattice-based `CkksBackend` are interchangeable
//! without touching engine code.
//!
//! A backend value *is* the crypto context. It is created once by
//! `configure`, is never mutated afterwards, and every operation borrows it.

use std::fmt;

use crate::error::Result;
use crate::params::HeParams;

/// Key material produced by `HeBackend::keygen`.
pub struct KeyPair<B: HeBackend + ?Sized> {
    pub public: B::PublicKey,
    pub secret: B::SecretKey,
    /// Relinearisation and rotation keys.
    pub eval: B::EvalKeys,
}

/// Result of a decryption: recovered slot values plus a validity indicator.
///
/// Callers must check `valid` before trusting `values`.
#[derive(Clone, Debug, PartialEq)]
pub struct Decrypted {
    pub values: Vec<f64>,
    pub valid: bool,
}

/// Capability interface consumed by the inference engine.
///
/// Every operation that multiplies consumes one level of the configured
/// multiplicative-depth budget; backends return `HeError::DepthExceeded`
/// instead of evaluating past it.
pub trait HeBackend {
    type Plaintext: Clone + fmt::Debug;
    type Ciphertext: Clone + fmt::Debug;
    type PublicKey;
    type SecretKey;
    type EvalKeys;

    /// Create the context. `slot_count` must be a power of two and is fixed
    /// for the lifetime of the returned value.
    fn configure(params: &HeParams, slot_count: usize) -> Result<Self>
    where
        Self: Sized;

    /// Number of usable slots per plaintext.
    fn slot_count(&self) -> usize;

    /// Configured multiplicative-depth budget.
    fn mult_depth(&self) -> usize;

    /// Human-readable summary of the context, for logging.
    fn describe(&self) -> String;

    /// Generate a key pair plus relinearisation keys and rotation keys for
    /// each offset in `rotations`.
    fn keygen(&self, rotations: &[i32]) -> Result<KeyPair<Self>>;

    /// Encode up to `slot_count` values; missing slots are zero.
    fn encode(&self, values: &[f64]) -> Result<Self::Plaintext>;

    fn encrypt(&self, pt: &Self::Plaintext, pk: &Self::PublicKey) -> Result<Self::Ciphertext>;

    /// Decrypt and decode all `slot_count` slots.
    fn decrypt(&self, ct: &Self::Ciphertext, sk: &Self::SecretKey) -> Result<Decrypted>;

    fn add(&self, a: &Self::Ciphertext, b: &Self::Ciphertext) -> Result<Self::Ciphertext>;

    fn add_plain(&self, a: &Self::Ciphertext, pt: &Self::Plaintext) -> Result<Self::Ciphertext>;

    /// Slot-wise ciphertext product. Consumes one level.
    fn mul(
        &self,
        a: &Self::Ciphertext,
        b: &Self::Ciphertext,
        keys: &Self::EvalKeys,
    ) -> Result<Self::Ciphertext>;

    /// Multiply every slot by a real constant. Consumes one level.
    fn mul_scalar(&self, a: &Self::Ciphertext, scalar: f64) -> Result<Self::Ciphertext>;

    /// Cyclic left rotation: slot `i` of the result holds slot `i + offset`.
    fn rotate(
        &self,
        a: &Self::Ciphertext,
        offset: i32,
        keys: &Self::EvalKeys,
    ) -> Result<Self::Ciphertext>;

    /// Bounded run summation: for every block of `run` consecutive slots,
    /// the block's first slot receives the sum of the block. `run` must be a
    /// power of two dividing the slot count; other slots hold partial sums.
    fn sum_run(
        &self,
        a: &Self::Ciphertext,
        run: usize,
        keys: &Self::EvalKeys,
    ) -> Result<Self::Ciphertext>;

    /// Evaluate `coeffs[0] + coeffs[1] x + ... + coeffs[d] x^d` slot-wise.
    /// Consumes `poly_depth(coeffs)` levels.
    fn eval_poly(
        &self,
        a: &Self::Ciphertext,
        coeffs: &[f64],
        keys: &Self::EvalKeys,
    ) -> Result<Self::Ciphertext>;

    /// Levels already consumed by `ct`.
    fn level(&self, ct: &Self::Ciphertext) -> usize;

    /// Whether `sum_run` is available. Engines fall back to whole-vector
    /// rotate-and-add when it is not.
    fn supports_run_sum(&self) -> bool {
        true
    }
}

/// Smallest `k` with `2^k >= n` (0 for `n <= 1`).
pub fn ceil_log2(n: usize) -> usize {
    if n <= 1 {
        0
    } else {
        (usize::BITS - (n - 1).leading_zeros()) as usize
    }
}

/// Levels the polynomial evaluator consumes for `coeffs`.
///
/// Term `c_k x^k` is built as `(c_k x) * x^(k-1)`, where `x^(k-1)` comes from
/// a binary power tree of depth `ceil_log2(k-1)`. The constant term is free.
pub fn poly_depth(coeffs: &[f64]) -> usize {
    coeffs
        .iter()
        .enumerate()
        .skip(1)
        .filter(|(_, c)| **c != 0.0)
        .map(|(k, _)| if k == 1 { 1 } else { ceil_log2(k - 1).max(1) + 1 })
        .max()
        .unwrap_or(0)
}

/// Rotation offsets `1, 2, 4, ..., run/2` needed to sum runs of `run` slots.
pub fn power_of_two_rotations(run: usize) -> Vec<i32> {
    let mut rotations = Vec::new();
    let mut step = 1usize;
    while step < run {
        rotations.push(step as i32);
        step <<= 1;
    }
    rotations
}

/// Evaluate a polynomial in the clear with Horner's rule.
pub fn eval_poly_clear(x: f64, coeffs: &[f64]) -> f64 {
    coeffs.iter().rev().fold(0.0, |acc, &c| acc * x + c)
}
