//! Encrypted logistic-regression inference.
//!
//! Setup is a chain of owned states, each consuming the previous one:
//!
//! ```text
//! ContextConfigured --generate_keys--> KeysGenerated --encode_weights-->
//! WeightsEncoded --encrypt_weights--> InferenceEngine
//! ```
//!
//! so no operation can run before the keys and weights it needs exist.
//! `InferenceEngine` is then read-only: every prediction borrows it.
//!
//! One prediction packs and encrypts a batch, multiplies it slot-wise with the
//! replicated weights, reduces each block to its head slot, adds the
//! broadcast bias, applies the polynomial sigmoid and decrypts once.

use helr_ckks::{power_of_two_rotations, HeBackend, HeParams, KeyPair};
use log::{debug, info};

use crate::accuracy::BatchPredictor;
use crate::config::ReductionStrategy;
use crate::error::{InferenceError, Result};
use crate::packing::{
    pack_bias, pack_image_batch, pack_replicated_weights, read_block_heads, split_bias, SlotLayout,
};
use crate::sigmoid::{sigmoid_depth, SIGMOID_COEFFS};

/// Levels one prediction consumes: the slot-wise product plus the sigmoid.
pub fn required_depth() -> usize {
    1 + sigmoid_depth()
}

/// A configured crypto context with no keys yet.
pub struct ContextConfigured<B: HeBackend> {
    backend: B,
    layout: SlotLayout,
    reduction: ReductionStrategy,
}

impl<B: HeBackend> ContextConfigured<B> {
    /// Check the depth budget and reduction strategy, then create the
    /// context with `layout.total_slots` slots.
    pub fn configure(
        params: &HeParams,
        layout: SlotLayout,
        reduction: ReductionStrategy,
    ) -> Result<Self> {
        let required = required_depth();
        if params.mult_depth < required {
            return Err(InferenceError::DepthExceeded {
                required,
                available: params.mult_depth,
            });
        }
        info!("used slots per image: {}", layout.feature_count);
        info!("number of slots per image: {}", layout.slots_per_image);
        info!("fraction of slots used: {:.4}", layout.utilisation());

        let backend = B::configure(params, layout.total_slots)?;
        let reduction = reduction.resolve(backend.supports_run_sum(), layout.batch_size)?;
        info!("{}", backend.describe());
        debug!("context configured, reduction {}", reduction);
        Ok(Self {
            backend,
            layout,
            reduction,
        })
    }

    pub fn layout(&self) -> &SlotLayout {
        &self.layout
    }

    /// Key pair, relinearisation keys and the rotation keys the resolved
    /// reduction needs.
    pub fn generate_keys(self) -> Result<KeysGenerated<B>> {
        let span = match self.reduction {
            ReductionStrategy::RotateAll => self.layout.total_slots,
            _ => self.layout.slots_per_image,
        };
        let rotations = power_of_two_rotations(span);
        info!("generating keys ({} rotation keys)", rotations.len());
        let keys = self.backend.keygen(&rotations)?;
        debug!("keys generated");
        Ok(KeysGenerated {
            backend: self.backend,
            layout: self.layout,
            reduction: self.reduction,
            keys,
        })
    }
}

/// Keys exist; weights not yet encoded.
pub struct KeysGenerated<B: HeBackend> {
    backend: B,
    layout: SlotLayout,
    reduction: ReductionStrategy,
    keys: KeyPair<B>,
}

impl<B: HeBackend> KeysGenerated<B> {
    /// Encode `feature_count` weights replicated per block, plus the bias
    /// broadcast to every slot.
    pub fn encode_weights(self, weights: &[f64], bias: f64) -> Result<WeightsEncoded<B>> {
        info!("encoding weights");
        let weights = self
            .backend
            .encode(&pack_replicated_weights(weights, &self.layout)?)?;
        let bias = self.backend.encode(&pack_bias(bias, &self.layout))?;
        debug!("weights encoded");
        Ok(WeightsEncoded {
            backend: self.backend,
            layout: self.layout,
            reduction: self.reduction,
            keys: self.keys,
            weights,
            bias,
        })
    }
}

/// Weights encoded, not yet encrypted.
pub struct WeightsEncoded<B: HeBackend> {
    backend: B,
    layout: SlotLayout,
    reduction: ReductionStrategy,
    keys: KeyPair<B>,
    weights: B::Plaintext,
    bias: B::Plaintext,
}

impl<B: HeBackend> WeightsEncoded<B> {
    pub fn encrypt_weights(self) -> Result<InferenceEngine<B>> {
        info!("encrypting weights");
        let weights = self.backend.encrypt(&self.weights, &self.keys.public)?;
        let bias = self.backend.encrypt(&self.bias, &self.keys.public)?;
        debug!("weights encrypted");
        Ok(InferenceEngine {
            backend: self.backend,
            layout: self.layout,
            reduction: self.reduction,
            keys: self.keys,
            weights,
            bias,
        })
    }
}

/// Decrypted result of a single-sample prediction.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SinglePrediction {
    /// `w · x + b` before the sigmoid.
    pub pre_sigmoid: f64,
    pub prediction: f64,
}

/// Ready for predictions.
pub struct InferenceEngine<B: HeBackend> {
    backend: B,
    layout: SlotLayout,
    reduction: ReductionStrategy,
    keys: KeyPair<B>,
    weights: B::Ciphertext,
    bias: B::Ciphertext,
}

impl<B: HeBackend> InferenceEngine<B> {
    /// Run every setup state. `weights_and_bias` holds `feature_count`
    /// weights followed by the bias.
    pub fn setup(
        params: &HeParams,
        layout: SlotLayout,
        reduction: ReductionStrategy,
        weights_and_bias: &[f64],
    ) -> Result<Self> {
        let (weights, bias) = split_bias(weights_and_bias)?;
        ContextConfigured::<B>::configure(params, layout, reduction)?
            .generate_keys()?
            .encode_weights(weights, bias)?
            .encrypt_weights()
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn layout(&self) -> &SlotLayout {
        &self.layout
    }

    pub fn reduction(&self) -> ReductionStrategy {
        self.reduction
    }

    /// Sum each block into its head slot.
    fn reduce(&self, product: &B::Ciphertext) -> Result<B::Ciphertext> {
        match self.reduction {
            ReductionStrategy::RotateAll => {
                let mut acc = product.clone();
                let mut step = 1usize;
                while step < self.layout.total_slots {
                    let rotated = self.backend.rotate(&acc, step as i32, &self.keys.eval)?;
                    acc = self.backend.add(&acc, &rotated)?;
                    step <<= 1;
                }
                Ok(acc)
            }
            _ => Ok(self
                .backend
                .sum_run(product, self.layout.slots_per_image, &self.keys.eval)?),
        }
    }

    /// Encrypt `samples` and return the encrypted `w · x + b` and sigmoid
    /// outputs.
    fn evaluate(&self, samples: &[f64]) -> Result<(B::Ciphertext, B::Ciphertext)> {
        let be = &self.backend;
        let pt = be.encode(&pack_image_batch(samples, &self.layout)?)?;
        debug!("sample encoded");
        let ct = be.encrypt(&pt, &self.keys.public)?;
        debug!("sample encrypted");
        let product = be.mul(&ct, &self.weights, &self.keys.eval)?;
        let dot = self.reduce(&product)?;
        debug!("dot product computed at level {}", be.level(&dot));
        let logit = be.add(&dot, &self.bias)?;
        debug!("bias applied");
        let prediction = be.eval_poly(&logit, &SIGMOID_COEFFS, &self.keys.eval)?;
        debug!("sigmoid applied at level {}", be.level(&prediction));
        Ok((logit, prediction))
    }

    fn decrypt_heads(
        &self,
        ct: &B::Ciphertext,
        count: usize,
        what: &'static str,
    ) -> Result<Vec<f64>> {
        let decrypted = self.backend.decrypt(ct, &self.keys.secret)?;
        if !decrypted.valid {
            return Err(InferenceError::DecryptionInvalid(what));
        }
        debug!("{} decrypted", what);
        read_block_heads(&decrypted.values, &self.layout, count)
    }

    /// Predict up to `batch_size` samples stored back to back. Returns one
    /// probability per sample.
    pub fn predict_batch(&self, samples: &[f64]) -> Result<Vec<f64>> {
        let count = samples.len() / self.layout.feature_count;
        let (_, prediction) = self.evaluate(samples)?;
        let predictions = self.decrypt_heads(&prediction, count, "prediction")?;
        for p in &predictions {
            debug!("prediction {}", p);
        }
        Ok(predictions)
    }

    /// Predict one sample, also decrypting the pre-sigmoid value.
    pub fn predict_single(&self, features: &[f64]) -> Result<SinglePrediction> {
        if features.len() != self.layout.feature_count {
            return Err(InferenceError::SizeMismatch {
                expected: self.layout.feature_count,
                actual: features.len(),
            });
        }
        let (logit, prediction) = self.evaluate(features)?;
        let pre_sigmoid = self.decrypt_heads(&logit, 1, "pre-sigmoid")?[0];
        let prediction = self.decrypt_heads(&prediction, 1, "prediction")?[0];
        Ok(SinglePrediction {
            pre_sigmoid,
            prediction,
        })
    }
}

impl<B: HeBackend> BatchPredictor for InferenceEngine<B> {
    fn batch_size(&self) -> usize {
        self.layout.batch_size
    }

    fn feature_count(&self) -> usize {
        self.layout.feature_count
    }

    fn predict_batch(&self, samples: &[f64]) -> Result<Vec<f64>> {
        InferenceEngine::predict_batch(self, samples)
    }
}
