//! Context parameters shared by every backend.
//!
//! The slot count is not part of `HeParams`: it is derived from the slot
//! layout of the workload and handed to `HeBackend::configure` separately,
//! after which it is fixed for the lifetime of the context.

use serde::{Deserialize, Serialize};

use crate::error::{HeError, Result};

/// Largest supported scaling precision. Encoded coefficients are `i64`.
pub const MAX_SCALE_BITS: u32 = 58;

/// Smallest supported scaling precision.
pub const MIN_SCALE_BITS: u32 = 20;

/// Largest prime size the RNS arithmetic can hold (sums stay below 2^63).
pub const MAX_MOD_BITS: u32 = 61;

/// Smallest ring dimension chosen when no override is given.
pub const MIN_RING_DIM: usize = 4096;

/// Leveled-scheme configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeParams {
    /// Number of sequential multiplications the context supports.
    pub mult_depth: usize,
    /// Bit-width of the fixed-point scaling factor (Δ = 2^scale_bits).
    pub scale_bits: u32,
    /// Bit-width of the base prime that survives every rescale.
    pub first_mod_bits: u32,
    /// Ring dimension override. Defaults to `max(MIN_RING_DIM, 2 * slots)`.
    pub ring_dim: Option<usize>,
    /// Seed for key generation and encryption randomness. `None` draws from
    /// the operating system.
    pub seed: Option<u64>,
}

impl Default for HeParams {
    fn default() -> Self {
        Self {
            mult_depth: 4,
            scale_bits: 50,
            first_mod_bits: 60,
            ring_dim: None,
            seed: None,
        }
    }
}

impl HeParams {
    /// Ring dimension for a context with `slot_count` slots.
    pub fn ring_dim_for(&self, slot_count: usize) -> usize {
        self.ring_dim
            .unwrap_or_else(|| MIN_RING_DIM.max(2 * slot_count))
    }

    /// Check the parameters against a requested slot count.
    pub fn validate(&self, slot_count: usize) -> Result<()> {
        if slot_count == 0 || !slot_count.is_power_of_two() {
            return Err(HeError::InvalidParams(format!(
                "slot count {} is not a power of two",
                slot_count
            )));
        }
        if self.mult_depth == 0 {
            return Err(HeError::InvalidParams(
                "multiplicative depth must be at least 1".into(),
            ));
        }
        if !(MIN_SCALE_BITS..=MAX_SCALE_BITS).contains(&self.scale_bits) {
            return Err(HeError::InvalidParams(format!(
                "scale bits {} outside {}..={}",
                self.scale_bits, MIN_SCALE_BITS, MAX_SCALE_BITS
            )));
        }
        if self.first_mod_bits <= self.scale_bits || self.first_mod_bits > MAX_MOD_BITS {
            return Err(HeError::InvalidParams(format!(
                "first modulus bits {} must be in {}..={}",
                self.first_mod_bits,
                self.scale_bits + 1,
                MAX_MOD_BITS
            )));
        }
        if let Some(n) = self.ring_dim {
            if !n.is_power_of_two() || n < 2 * slot_count {
                return Err(HeError::InvalidParams(format!(
                    "ring dimension {} must be a power of two >= {}",
                    n,
                    2 * slot_count
                )));
            }
        }
        Ok(())
    }
}
