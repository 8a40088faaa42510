//! Loading, packing, encrypted prediction and scoring, end to end.

use helr_ckks::{CkksBackend, HeParams, PlainBackend};
use helr_inference::{
    evaluate, evaluate_clear, sigmoid_poly, ClearClassifier, InferenceEngine, LabelRule, NdArray,
    ReductionStrategy, SlotLayout,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn random_model(rng: &mut StdRng, features: usize) -> Vec<f64> {
    (0..=features).map(|_| rng.gen_range(-0.4..0.4)).collect()
}

fn random_images(rng: &mut StdRng, rows: usize, features: usize) -> Vec<f64> {
    (0..rows * features).map(|_| rng.gen_range(0.0..3.0)).collect()
}

#[test]
fn plain_backend_matches_clear_polynomial() {
    let mut rng = StdRng::seed_from_u64(11);
    let features = 10;
    let model = random_model(&mut rng, features);
    let images = random_images(&mut rng, 4, features);

    let layout = SlotLayout::new(4, features).unwrap();
    let engine = InferenceEngine::<PlainBackend>::setup(
        &HeParams::default(),
        layout,
        ReductionStrategy::Auto,
        &model,
    )
    .unwrap();
    let got = engine.predict_batch(&images).unwrap();

    let clear = ClearClassifier::from_weights(&model, 4).unwrap();
    for (i, sample) in images.chunks(features).enumerate() {
        let want = clear.predict_poly(sample).unwrap();
        assert!((got[i] - want).abs() < 1e-6, "sample {}: {} vs {}", i, got[i], want);
    }
}

#[test]
fn ckks_batch_matches_clear_polynomial() {
    let mut rng = StdRng::seed_from_u64(5);
    let features = 6;
    let model = random_model(&mut rng, features);
    let images = random_images(&mut rng, 4, features);

    let params = HeParams {
        mult_depth: 4,
        scale_bits: 40,
        first_mod_bits: 60,
        ring_dim: Some(64),
        seed: Some(5),
    };
    let layout = SlotLayout::new(4, features).unwrap();
    assert_eq!(layout.total_slots, 32);
    let engine =
        InferenceEngine::<CkksBackend>::setup(&params, layout, ReductionStrategy::Auto, &model)
            .unwrap();
    let got = engine.predict_batch(&images).unwrap();

    let clear = ClearClassifier::from_weights(&model, 4).unwrap();
    for (i, sample) in images.chunks(features).enumerate() {
        let want = clear.predict_poly(sample).unwrap();
        assert!((got[i] - want).abs() < 1e-3, "sample {}: {} vs {}", i, got[i], want);
    }
}

#[test]
fn ckks_single_exposes_pre_sigmoid() {
    let params = HeParams {
        mult_depth: 4,
        scale_bits: 40,
        first_mod_bits: 60,
        ring_dim: Some(64),
        seed: Some(9),
    };
    let model = [0.5, -0.25, 0.125, 0.0, 0.1];
    let x = [2.0, 1.0, 4.0, 7.0];
    let layout = SlotLayout::new(1, 4).unwrap();
    let engine =
        InferenceEngine::<CkksBackend>::setup(&params, layout, ReductionStrategy::RotateAll, &model)
            .unwrap();
    let p = engine.predict_single(&x).unwrap();
    let logit = 1.0 - 0.25 + 0.5 + 0.1;
    assert!((p.pre_sigmoid - logit).abs() < 1e-4, "pre-sigmoid {}", p.pre_sigmoid);
    assert!((p.prediction - sigmoid_poly(logit)).abs() < 1e-3);
}

#[test]
fn all_zero_model_predicts_one_half_under_ckks() {
    let params = HeParams {
        mult_depth: 4,
        scale_bits: 40,
        first_mod_bits: 60,
        ring_dim: Some(64),
        seed: Some(1),
    };
    let layout = SlotLayout::new(2, 8).unwrap();
    let engine =
        InferenceEngine::<CkksBackend>::setup(&params, layout, ReductionStrategy::Auto, &[0.0; 9])
            .unwrap();
    for p in engine.predict_batch(&[0.0; 16]).unwrap() {
        assert!((p - 0.5).abs() < 1e-4, "{}", p);
    }
}

#[test]
fn dataset_files_through_encrypted_and_clear_paths() {
    let dir = tempfile::tempdir().unwrap();
    let mut rng = StdRng::seed_from_u64(3);
    let rows = 6;
    let features = 4;

    let pixels: Vec<u8> = (0..rows * features).map(|_| rng.gen_range(0..4)).collect();
    let labels: Vec<u8> = (0..rows).map(|i| if i % 2 == 0 { 3 } else { 8 }).collect();
    NdArray::from_vec(&[rows, 2, 2], pixels)
        .unwrap()
        .save_idx(dir.path().join("images"))
        .unwrap();
    NdArray::from_vec(&[rows], labels)
        .unwrap()
        .save_idx(dir.path().join("labels"))
        .unwrap();
    NdArray::from_vec(&[features + 1], random_model(&mut rng, features))
        .unwrap()
        .save_raw(dir.path().join("weights"))
        .unwrap();

    let images: NdArray<f64> = NdArray::<u8>::load_idx(dir.path().join("images"))
        .unwrap()
        .cast();
    let labels = NdArray::<u8>::load_idx(dir.path().join("labels")).unwrap();
    let model = NdArray::<f64>::load_raw(dir.path().join("weights"), &[features + 1]).unwrap();
    assert_eq!(images.shape(), &[rows, 2, 2]);
    assert_eq!(images.feature_count(), features);

    let rule = LabelRule::Pair {
        positive: 3,
        negative: 8,
    };
    let layout = SlotLayout::new(4, features).unwrap();
    let engine = InferenceEngine::<PlainBackend>::setup(
        &HeParams::default(),
        layout,
        ReductionStrategy::Auto,
        model.as_slice(),
    )
    .unwrap();
    let encrypted = evaluate(&engine, &images, &labels, &rule).unwrap();
    assert_eq!(encrypted.total, rows);
    assert_eq!(encrypted.predictions.len(), rows);

    let clear = ClearClassifier::from_weights(model.as_slice(), 1).unwrap();
    let mut expected = 0;
    for i in 0..rows {
        let p = clear.predict_poly(images.row(i).unwrap()).unwrap();
        assert!((encrypted.predictions[i] - p).abs() < 1e-9);
        if rule.is_correct(p, *labels.get(&[i]).unwrap()) {
            expected += 1;
        }
    }
    assert_eq!(encrypted.correct, expected);

    let exact = evaluate_clear(model.as_slice(), &images, &labels, &rule).unwrap();
    assert_eq!(exact.total, rows);
}
