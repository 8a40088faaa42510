//! Whole-dataset accuracy in fixed-size batches.

use log::{debug, info};

use crate::config::LabelRule;
use crate::error::{InferenceError, Result};
use crate::ndarray::NdArray;

/// Anything that turns a batch of flattened samples into probabilities.
pub trait BatchPredictor {
    /// Samples per call. The final call of a dataset may pass fewer.
    fn batch_size(&self) -> usize;

    fn feature_count(&self) -> usize;

    /// One probability per sample in `samples` (laid out back to back).
    fn predict_batch(&self, samples: &[f64]) -> Result<Vec<f64>>;
}

#[derive(Clone, Debug, PartialEq)]
pub struct AccuracyReport {
    pub correct: usize,
    pub total: usize,
    pub predictions: Vec<f64>,
}

impl AccuracyReport {
    pub fn accuracy(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.correct as f64 / self.total as f64
        }
    }
}

/// Number of predictions the rule scores as correct.
pub fn score(predictions: &[f64], labels: &[u8], rule: &LabelRule) -> Result<usize> {
    if predictions.len() != labels.len() {
        return Err(InferenceError::SizeMismatch {
            expected: labels.len(),
            actual: predictions.len(),
        });
    }
    Ok(predictions
        .iter()
        .zip(labels)
        .filter(|(&p, &l)| rule.is_correct(p, l))
        .count())
}

/// Predict every row of `images` in batches and score against `labels`.
pub fn evaluate<P: BatchPredictor + ?Sized>(
    predictor: &P,
    images: &NdArray<f64>,
    labels: &NdArray<u8>,
    rule: &LabelRule,
) -> Result<AccuracyReport> {
    if images.feature_count() != predictor.feature_count() {
        return Err(InferenceError::SizeMismatch {
            expected: predictor.feature_count(),
            actual: images.feature_count(),
        });
    }
    let total = images.rows();
    if labels.len() != total {
        return Err(InferenceError::SizeMismatch {
            expected: total,
            actual: labels.len(),
        });
    }
    let batch = predictor.batch_size().max(1);
    let mut correct = 0;
    let mut predictions = Vec::with_capacity(total);
    for start in (0..total).step_by(batch) {
        let count = batch.min(total - start);
        info!("predicting images {} to {}", start, start + count);
        let batch_predictions = predictor.predict_batch(images.rows_range(start, count)?)?;
        if batch_predictions.len() != count {
            return Err(InferenceError::SizeMismatch {
                expected: count,
                actual: batch_predictions.len(),
            });
        }
        let hits = score(&batch_predictions, labels.rows_range(start, count)?, rule)?;
        debug!("batch at {} scored {}/{}", start, hits, count);
        correct += hits;
        predictions.extend(batch_predictions);
    }
    let report = AccuracyReport {
        correct,
        total,
        predictions,
    };
    info!("accuracy: {}", report.accuracy());
    Ok(report)
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use super::*;

    /// Replays canned predictions and records every batch it was asked for.
    struct Canned {
        batch: usize,
        outputs: Vec<f64>,
        calls: RefCell<Vec<usize>>,
    }

    impl BatchPredictor for Canned {
        fn batch_size(&self) -> usize {
            self.batch
        }

        fn feature_count(&self) -> usize {
            2
        }

        fn predict_batch(&self, samples: &[f64]) -> Result<Vec<f64>> {
            let mut calls = self.calls.borrow_mut();
            let done: usize = calls.iter().sum();
            let n = samples.len() / 2;
            calls.push(n);
            Ok(self.outputs[done..done + n].to_vec())
        }
    }

    fn dataset() -> (NdArray<f64>, NdArray<u8>) {
        let images = NdArray::zeros(&[4, 2]);
        let labels = NdArray::from_vec(&[4], vec![3, 8, 5, 5]).unwrap();
        (images, labels)
    }

    #[test]
    fn score_under_each_label_rule() {
        let preds = [0.9, 0.1, 0.6, 0.4];
        let labels = [3, 8, 5, 5];
        assert_eq!(score(&preds, &labels, &LabelRule::OneVsRest { positive: 3 }).unwrap(), 3);
        let pair = LabelRule::Pair {
            positive: 3,
            negative: 8,
        };
        assert_eq!(score(&preds, &labels, &pair).unwrap(), 2);
        assert!(score(&preds[..3], &labels, &pair).is_err());
    }

    #[test]
    fn evaluates_in_batches_with_short_tail() {
        let (images, labels) = dataset();
        let p = Canned {
            batch: 3,
            outputs: vec![0.9, 0.1, 0.6, 0.4],
            calls: RefCell::new(Vec::new()),
        };
        let report = evaluate(&p, &images, &labels, &LabelRule::default()).unwrap();
        assert_eq!(*p.calls.borrow(), vec![3, 1]);
        assert_eq!(report.correct, 3);
        assert_eq!(report.total, 4);
        assert_eq!(report.predictions, vec![0.9, 0.1, 0.6, 0.4]);
        assert!((report.accuracy() - 0.75).abs() < 1e-12);
    }

    #[test]
    fn rejects_mismatched_inputs() {
        let (images, _) = dataset();
        let p = Canned {
            batch: 2,
            outputs: vec![0.0; 4],
            calls: RefCell::new(Vec::new()),
        };
        let short_labels = NdArray::from_vec(&[3], vec![1, 2, 3]).unwrap();
        assert!(evaluate(&p, &images, &short_labels, &LabelRule::default()).is_err());

        let wide = NdArray::zeros(&[4, 3]);
        let labels = NdArray::from_vec(&[4], vec![0; 4]).unwrap();
        assert!(matches!(
            evaluate(&p, &wide, &labels, &LabelRule::default()),
            Err(InferenceError::SizeMismatch { expected: 2, actual: 3 })
        ));
    }

    #[test]
    fn empty_dataset_has_zero_accuracy() {
        let report = AccuracyReport {
            correct: 0,
            total: 0,
            predictions: Vec::new(),
        };
        assert_eq!(report.accuracy(), 0.0);
    }
}
