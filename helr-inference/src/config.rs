use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use helr_ckks::HeParams;
use serde::{Deserialize, Serialize};

use crate::error::{InferenceError, Result};

/// How a dataset label maps to the classifier's binary ground truth.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum LabelRule {
    /// `positive` is class 1, every other label class 0.
    OneVsRest { positive: u8 },
    /// A prediction >= 0.5 is correct only for `positive`, below 0.5 only
    /// for `negative`. Any other label is always scored wrong.
    Pair { positive: u8, negative: u8 },
}

impl Default for LabelRule {
    fn default() -> Self {
        LabelRule::OneVsRest { positive: 3 }
    }
}

impl LabelRule {
    /// Whether thresholding `prediction` at 0.5 agrees with `label`.
    pub fn is_correct(&self, prediction: f64, label: u8) -> bool {
        let predicted_positive = prediction >= 0.5;
        match *self {
            LabelRule::OneVsRest { positive } => predicted_positive == (label == positive),
            LabelRule::Pair { positive, negative } => {
                if predicted_positive {
                    label == positive
                } else {
                    label == negative
                }
            }
        }
    }
}

impl fmt::Display for LabelRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LabelRule::OneVsRest { positive } => write!(f, "{} vs rest", positive),
            LabelRule::Pair { positive, negative } => write!(f, "{} vs {}", positive, negative),
        }
    }
}

/// Block reduction used for the dot product.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReductionStrategy {
    /// Bounded run summation when the backend has it, otherwise rotate-all.
    #[default]
    Auto,
    /// `sum_run` over each block of `slots_per_image`.
    BlockSum,
    /// Rotate-and-add over the whole vector. Single-block layouts only.
    RotateAll,
}

impl ReductionStrategy {
    /// Resolve `Auto` and check the strategy against the batch layout.
    pub fn resolve(self, supports_run_sum: bool, batch_size: usize) -> Result<Self> {
        let resolved = match self {
            ReductionStrategy::Auto if supports_run_sum => ReductionStrategy::BlockSum,
            ReductionStrategy::Auto => ReductionStrategy::RotateAll,
            ReductionStrategy::BlockSum if !supports_run_sum => {
                return Err(InferenceError::InvalidConfig(
                    "backend has no bounded run summation".into(),
                ))
            }
            other => other,
        };
        if resolved == ReductionStrategy::RotateAll && batch_size > 1 {
            return Err(InferenceError::InvalidConfig(format!(
                "rotate-all reduction sums across blocks; batch size must be 1, got {}",
                batch_size
            )));
        }
        Ok(resolved)
    }
}

impl fmt::Display for ReductionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ReductionStrategy::Auto => "auto",
            ReductionStrategy::BlockSum => "block-sum",
            ReductionStrategy::RotateAll => "rotate-all",
        })
    }
}

impl FromStr for ReductionStrategy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "auto" => Ok(ReductionStrategy::Auto),
            "block-sum" => Ok(ReductionStrategy::BlockSum),
            "rotate-all" => Ok(ReductionStrategy::RotateAll),
            other => Err(format!(
                "unknown reduction '{}' (expected auto, block-sum or rotate-all)",
                other
            )),
        }
    }
}

/// Everything a run needs besides the command-line mode.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InferenceConfig {
    /// Raw `f64` weights, features then bias.
    pub weights_path: PathBuf,
    /// IDX image file.
    pub images_path: PathBuf,
    /// IDX label file.
    pub labels_path: PathBuf,
    pub he: HeParams,
    pub label_rule: LabelRule,
    pub reduction: ReductionStrategy,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            weights_path: PathBuf::from("lr_weights.bin"),
            images_path: PathBuf::from(".data/mnist_trimmed/t10k-images-idx3-ubyte"),
            labels_path: PathBuf::from(".data/mnist_trimmed/t10k-labels-idx1-ubyte"),
            he: HeParams::default(),
            label_rule: LabelRule::default(),
            reduction: ReductionStrategy::default(),
        }
    }
}

impl InferenceConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }
}
