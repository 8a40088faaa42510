//! Slot layout and packed-vector assembly. No HE dependency.
//!
//! A packed vector of `total_slots` values is split into `batch_size`
//! blocks of `slots_per_image`; block `j` holds sample `j` followed by zero
//! padding, and its first slot is where the block's reduced sum lands.

use crate::error::{InferenceError, Result};

/// Smallest power of two `>= n` (1 for `n == 0`).
pub fn ceil_pow2(n: usize) -> usize {
    n.max(1).next_power_of_two()
}

/// How samples map onto the slot vector.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SlotLayout {
    pub feature_count: usize,
    pub batch_size: usize,
    pub slots_per_image: usize,
    pub total_slots: usize,
}

impl SlotLayout {
    /// `slots_per_image = ceil_pow2(batch * features) / batch`.
    pub fn new(batch_size: usize, feature_count: usize) -> Result<Self> {
        if batch_size == 0 || feature_count == 0 {
            return Err(InferenceError::InvalidConfig(format!(
                "batch size ({}) and feature count ({}) must be positive",
                batch_size, feature_count
            )));
        }
        let total_slots = ceil_pow2(batch_size * feature_count);
        let slots_per_image = total_slots / batch_size;
        if slots_per_image * batch_size != total_slots {
            // only reachable when batch_size is not a power of two
            return Err(InferenceError::InvalidConfig(format!(
                "batch size {} does not divide {} slots evenly",
                batch_size, total_slots
            )));
        }
        Ok(Self {
            feature_count,
            batch_size,
            slots_per_image,
            total_slots,
        })
    }

    /// Fraction of slots holding real features.
    pub fn utilisation(&self) -> f64 {
        (self.feature_count * self.batch_size) as f64 / self.total_slots as f64
    }

    /// Slot index of block `j`'s reduced value.
    pub fn block_head(&self, j: usize) -> usize {
        j * self.slots_per_image
    }
}

/// Pack up to `batch_size` samples laid out back to back in `samples`.
/// A short final batch leaves its missing blocks zero.
pub fn pack_image_batch(samples: &[f64], layout: &SlotLayout) -> Result<Vec<f64>> {
    let width = layout.feature_count;
    if samples.len() % width != 0 || samples.len() / width > layout.batch_size {
        return Err(InferenceError::SizeMismatch {
            expected: layout.batch_size * width,
            actual: samples.len(),
        });
    }
    let mut packed = vec![0.0; layout.total_slots];
    for (j, sample) in samples.chunks_exact(width).enumerate() {
        let head = layout.block_head(j);
        packed[head..head + width].copy_from_slice(sample);
    }
    Ok(packed)
}

/// Copy `weights` into every block so they line up with a packed batch.
pub fn pack_replicated_weights(weights: &[f64], layout: &SlotLayout) -> Result<Vec<f64>> {
    if weights.len() != layout.feature_count {
        return Err(InferenceError::SizeMismatch {
            expected: layout.feature_count,
            actual: weights.len(),
        });
    }
    let mut packed = vec![0.0; layout.total_slots];
    for block in packed.chunks_exact_mut(layout.slots_per_image) {
        block[..weights.len()].copy_from_slice(weights);
    }
    Ok(packed)
}

/// Bias broadcast to every slot, so every block head receives it.
pub fn pack_bias(bias: f64, layout: &SlotLayout) -> Vec<f64> {
    vec![bias; layout.total_slots]
}

/// Split a `features + 1` weight file into feature weights and bias.
pub fn split_bias(weights: &[f64]) -> Result<(&[f64], f64)> {
    match weights.split_last() {
        Some((&bias, features)) if !features.is_empty() => Ok((features, bias)),
        _ => Err(InferenceError::SizeMismatch {
            expected: 2,
            actual: weights.len(),
        }),
    }
}

/// The value at each block head, for the first `count` blocks.
pub fn read_block_heads(values: &[f64], layout: &SlotLayout, count: usize) -> Result<Vec<f64>> {
    (0..count)
        .map(|j| {
            let head = layout.block_head(j);
            values
                .get(head)
                .copied()
                .ok_or(InferenceError::IndexOutOfBounds {
                    index: head,
                    length: values.len(),
                })
        })
        .collect()
}
