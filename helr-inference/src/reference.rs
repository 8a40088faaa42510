//! Cleartext logistic regression, for checking encrypted results.

use crate::accuracy::{evaluate, AccuracyReport, BatchPredictor};
use crate::config::LabelRule;
use crate::engine::SinglePrediction;
use crate::error::{InferenceError, Result};
use crate::ndarray::NdArray;
use crate::packing::split_bias;
use crate::sigmoid::{sigmoid, sigmoid_poly};

#[derive(Clone, Debug, PartialEq)]
pub struct ClearClassifier {
    weights: Vec<f64>,
    bias: f64,
    batch_size: usize,
}

impl ClearClassifier {
    /// `weights_and_bias` holds the feature weights followed by the bias.
    pub fn from_weights(weights_and_bias: &[f64], batch_size: usize) -> Result<Self> {
        let (weights, bias) = split_bias(weights_and_bias)?;
        Ok(Self {
            weights: weights.to_vec(),
            bias,
            batch_size: batch_size.max(1),
        })
    }

    /// `w · x + b`.
    pub fn logit(&self, features: &[f64]) -> Result<f64> {
        if features.len() != self.weights.len() {
            return Err(InferenceError::SizeMismatch {
                expected: self.weights.len(),
                actual: features.len(),
            });
        }
        let dot: f64 = features.iter().zip(&self.weights).map(|(x, w)| x * w).sum();
        Ok(dot + self.bias)
    }

    /// Exact logistic probability.
    pub fn predict(&self, features: &[f64]) -> Result<SinglePrediction> {
        let logit = self.logit(features)?;
        Ok(SinglePrediction {
            pre_sigmoid: logit,
            prediction: sigmoid(logit),
        })
    }

    /// Probability through the same polynomial the encrypted path uses.
    pub fn predict_poly(&self, features: &[f64]) -> Result<f64> {
        Ok(sigmoid_poly(self.logit(features)?))
    }
}

impl BatchPredictor for ClearClassifier {
    fn batch_size(&self) -> usize {
        self.batch_size
    }

    fn feature_count(&self) -> usize {
        self.weights.len()
    }

    fn predict_batch(&self, samples: &[f64]) -> Result<Vec<f64>> {
        samples
            .chunks(self.weights.len())
            .map(|x| Ok(self.predict(x)?.prediction))
            .collect()
    }
}

/// Exact prediction for row `index` of `images`.
pub fn predict_clear(
    weights_and_bias: &[f64],
    images: &NdArray<f64>,
    index: usize,
) -> Result<SinglePrediction> {
    ClearClassifier::from_weights(weights_and_bias, 1)?.predict(images.row(index)?)
}

/// Exact-sigmoid accuracy over the whole dataset.
pub fn evaluate_clear(
    weights_and_bias: &[f64],
    images: &NdArray<f64>,
    labels: &NdArray<u8>,
    rule: &LabelRule,
) -> Result<AccuracyReport> {
    let classifier = ClearClassifier::from_weights(weights_and_bias, images.rows().max(1))?;
    evaluate(&classifier, images, labels, rule)
}
