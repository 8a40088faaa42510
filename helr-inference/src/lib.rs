//! # helr-inference
//!
//! Logistic-regression inference over encrypted images.
//!
//! - [`ndarray`]: typed arrays plus the raw and IDX file formats
//! - [`packing`]: slot layout and packed-vector assembly
//! - [`engine`]: the typestate inference engine, generic over
//!   [`helr_ckks::HeBackend`]
//! - [`accuracy`]: batched scoring against labels
//! - [`reference`]: the same classifier in the clear

pub mod accuracy;
pub mod config;
pub mod engine;
pub mod error;
pub mod ndarray;
pub mod packing;
pub mod reference;
pub mod sigmoid;

pub use accuracy::{evaluate, score, AccuracyReport, BatchPredictor};
pub use config::{InferenceConfig, LabelRule, ReductionStrategy};
pub use engine::{
    required_depth, ContextConfigured, InferenceEngine, KeysGenerated, SinglePrediction,
    WeightsEncoded,
};
pub use error::{InferenceError, Result};
pub use ndarray::NdArray;
pub use packing::{ceil_pow2, SlotLayout};
pub use reference::{evaluate_clear, predict_clear, ClearClassifier};
pub use sigmoid::{sigmoid_poly, SIGMOID_COEFFS};
