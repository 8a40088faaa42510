use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use helr_ckks::{CkksBackend, HeBackend, PlainBackend};
use helr_inference::{
    evaluate, evaluate_clear, predict_clear, InferenceConfig, InferenceEngine, InferenceError,
    LabelRule, NdArray, ReductionStrategy, SlotLayout,
};
use log::info;

#[derive(Parser, Debug)]
#[command(author, version, about = "Logistic-regression inference over CKKS-encrypted images", long_about = None)]
pub struct Args {
    /// JSON configuration file; flags below override it
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Raw f64 weights, features then bias
    #[arg(long)]
    pub weights: Option<PathBuf>,

    /// IDX image file
    #[arg(long)]
    pub images: Option<PathBuf>,

    /// IDX label file
    #[arg(long)]
    pub labels: Option<PathBuf>,

    /// Homomorphic backend
    #[arg(long, value_enum, default_value_t = BackendKind::Ckks)]
    pub backend: BackendKind,

    /// Multiplicative depth of the context
    #[arg(long)]
    pub mult_depth: Option<usize>,

    /// Bits of fixed-point scaling precision
    #[arg(long)]
    pub scale_bits: Option<u32>,

    /// Label counted as the positive class
    #[arg(long)]
    pub positive_label: Option<u8>,

    /// Label counted as the negative class; other labels always score wrong
    #[arg(long)]
    pub negative_label: Option<u8>,

    /// Dot-product reduction: auto, block-sum or rotate-all
    #[arg(long)]
    pub reduction: Option<ReductionStrategy>,

    #[command(subcommand)]
    pub mode: Mode,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Mode {
    /// Encrypt and classify one image, printing the pre-sigmoid value too
    Single {
        /// Image index; omit for one-image-per-ciphertext dataset accuracy
        index: Option<usize>,
    },
    /// Encrypted accuracy over the whole dataset
    Batch {
        /// Images packed per ciphertext (a power of two)
        #[arg(value_parser = clap::builder::RangedU64ValueParser::<usize>::new().range(1..))]
        batch_size: usize,
    },
    /// Cleartext reference: one image, or accuracy over the dataset
    Clear {
        /// Image index; omit for dataset accuracy
        index: Option<usize>,
    },
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Ckks,
    Plain,
}

impl Args {
    /// Configuration file contents with command-line overrides applied.
    pub fn resolve_config(&self) -> anyhow::Result<InferenceConfig> {
        let mut cfg = match &self.config {
            Some(path) => InferenceConfig::load(path)
                .with_context(|| format!("loading config {}", path.display()))?,
            None => InferenceConfig::default(),
        };
        if let Some(p) = &self.weights {
            cfg.weights_path = p.clone();
        }
        if let Some(p) = &self.images {
            cfg.images_path = p.clone();
        }
        if let Some(p) = &self.labels {
            cfg.labels_path = p.clone();
        }
        if let Some(d) = self.mult_depth {
            cfg.he.mult_depth = d;
        }
        if let Some(b) = self.scale_bits {
            cfg.he.scale_bits = b;
        }
        if let Some(r) = self.reduction {
            cfg.reduction = r;
        }
        cfg.label_rule = match (self.positive_label, self.negative_label, cfg.label_rule) {
            (None, None, rule) => rule,
            (Some(positive), None, _) => LabelRule::OneVsRest { positive },
            (positive, Some(negative), rule) => LabelRule::Pair {
                positive: positive.unwrap_or(match rule {
                    LabelRule::OneVsRest { positive } | LabelRule::Pair { positive, .. } => {
                        positive
                    }
                }),
                negative,
            },
        };
        Ok(cfg)
    }
}

fn load_images(path: &Path) -> anyhow::Result<NdArray<f64>> {
    let images = NdArray::<u8>::load_idx(path)
        .with_context(|| format!("loading images from {}", path.display()))?;
    Ok(images.cast())
}

fn load_labels(path: &Path) -> anyhow::Result<NdArray<u8>> {
    NdArray::<u8>::load_idx(path).with_context(|| format!("loading labels from {}", path.display()))
}

fn load_weights(path: &Path, feature_count: usize) -> anyhow::Result<Vec<f64>> {
    let weights = NdArray::<f64>::load_raw(path, &[feature_count + 1])
        .with_context(|| format!("loading weights from {}", path.display()))?;
    Ok(weights.into_vec())
}

fn check_index(index: usize, images: &NdArray<f64>) -> anyhow::Result<()> {
    if index >= images.rows() {
        return Err(InferenceError::IndexOutOfBounds {
            index,
            length: images.rows(),
        }
        .into());
    }
    Ok(())
}

fn run_single<B: HeBackend>(
    cfg: &InferenceConfig,
    images: &NdArray<f64>,
    weights: &[f64],
    index: usize,
) -> anyhow::Result<()> {
    let layout = SlotLayout::new(1, images.feature_count())?;
    let engine = InferenceEngine::<B>::setup(&cfg.he, layout, cfg.reduction, weights)?;
    info!("predicting image {}", index);
    let p = engine.predict_single(images.row(index)?)?;
    println!("before sigmoid {}", p.pre_sigmoid);
    println!("prediction {}", p.prediction);
    Ok(())
}

fn run_batch<B: HeBackend>(
    cfg: &InferenceConfig,
    images: &NdArray<f64>,
    labels: &NdArray<u8>,
    weights: &[f64],
    batch_size: usize,
) -> anyhow::Result<()> {
    let layout = SlotLayout::new(batch_size, images.feature_count())?;
    let engine = InferenceEngine::<B>::setup(&cfg.he, layout, cfg.reduction, weights)?;
    info!("scoring with label rule {}", cfg.label_rule);
    let report = evaluate(&engine, images, labels, &cfg.label_rule)?;
    println!("accuracy: {}", report.accuracy());
    Ok(())
}

fn encrypted_accuracy(
    backend: BackendKind,
    cfg: &InferenceConfig,
    images: &NdArray<f64>,
    weights: &[f64],
    batch_size: usize,
) -> anyhow::Result<()> {
    let labels = load_labels(&cfg.labels_path)?;
    match backend {
        BackendKind::Ckks => run_batch::<CkksBackend>(cfg, images, &labels, weights, batch_size),
        BackendKind::Plain => run_batch::<PlainBackend>(cfg, images, &labels, weights, batch_size),
    }
}

/// Execute one command. Every error is fatal to the caller.
pub fn run(args: Args) -> anyhow::Result<()> {
    let cfg = args.resolve_config()?;
    let images = load_images(&cfg.images_path)?;
    let weights = load_weights(&cfg.weights_path, images.feature_count())?;

    match args.mode {
        Mode::Single { index: Some(index) } => {
            check_index(index, &images)?;
            match args.backend {
                BackendKind::Ckks => run_single::<CkksBackend>(&cfg, &images, &weights, index),
                BackendKind::Plain => run_single::<PlainBackend>(&cfg, &images, &weights, index),
            }
        }
        Mode::Single { index: None } => encrypted_accuracy(args.backend, &cfg, &images, &weights, 1),
        Mode::Batch { batch_size } => {
            encrypted_accuracy(args.backend, &cfg, &images, &weights, batch_size)
        }
        Mode::Clear { index: Some(index) } => {
            check_index(index, &images)?;
            let p = predict_clear(&weights, &images, index)?;
            println!("dot: {}, prediction: {}", p.pre_sigmoid, p.prediction);
            Ok(())
        }
        Mode::Clear { index: None } => {
            let labels = load_labels(&cfg.labels_path)?;
            let report = evaluate_clear(&weights, &images, &labels, &cfg.label_rule)?;
            println!("accuracy: {}", report.accuracy());
            Ok(())
        }
    }
}
