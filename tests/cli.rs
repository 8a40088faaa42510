//! Command-line parsing and whole-program runs against small fixtures.

use std::path::{Path, PathBuf};

use clap::Parser;
use helr::{run, Args, BackendKind, Mode};
use helr_inference::{InferenceError, LabelRule, NdArray, ReductionStrategy};

/// Four 2x2 images, labels 3/8 alternating, weights favouring the first pixel.
fn fixture(dir: &Path) -> (PathBuf, PathBuf, PathBuf) {
    let images = dir.join("images");
    let labels = dir.join("labels");
    let weights = dir.join("weights");
    NdArray::from_vec(&[4, 2, 2], vec![2u8, 0, 0, 0, 0, 1, 0, 0, 3, 0, 1, 0, 0, 0, 0, 2])
        .unwrap()
        .save_idx(&images)
        .unwrap();
    NdArray::from_vec(&[4], vec![3u8, 8, 3, 8])
        .unwrap()
        .save_idx(&labels)
        .unwrap();
    NdArray::from_vec(&[5], vec![1.0f64, -0.5, 0.0, -0.5, -0.5])
        .unwrap()
        .save_raw(&weights)
        .unwrap();
    (images, labels, weights)
}

fn args_for(dir: &Path, rest: &[&str]) -> Args {
    let (images, labels, weights) = fixture(dir);
    let mut argv = vec![
        "helr".to_string(),
        "--backend".into(),
        "plain".into(),
        "--images".into(),
        images.display().to_string(),
        "--labels".into(),
        labels.display().to_string(),
        "--weights".into(),
        weights.display().to_string(),
    ];
    argv.extend(rest.iter().map(|s| s.to_string()));
    Args::try_parse_from(argv).unwrap()
}

#[test]
fn parses_modes() {
    let args = Args::try_parse_from(["helr", "single"]).unwrap();
    assert_eq!(args.mode, Mode::Single { index: None });
    assert_eq!(args.backend, BackendKind::Ckks);

    let args = Args::try_parse_from(["helr", "single", "7"]).unwrap();
    assert_eq!(args.mode, Mode::Single { index: Some(7) });

    let args = Args::try_parse_from(["helr", "batch", "16"]).unwrap();
    assert_eq!(args.mode, Mode::Batch { batch_size: 16 });

    let args = Args::try_parse_from(["helr", "clear"]).unwrap();
    assert_eq!(args.mode, Mode::Clear { index: None });
}

#[test]
fn malformed_invocations_are_usage_errors() {
    assert!(Args::try_parse_from(["helr"]).is_err());
    assert!(Args::try_parse_from(["helr", "predict"]).is_err());
    assert!(Args::try_parse_from(["helr", "batch"]).is_err());
    assert!(Args::try_parse_from(["helr", "batch", "many"]).is_err());
    assert!(Args::try_parse_from(["helr", "--reduction", "sideways", "single"]).is_err());
    assert!(Args::try_parse_from(["helr", "--backend", "tfhe", "single"]).is_err());
}

#[test]
fn zero_batch_is_a_usage_error() {
    let err = Args::try_parse_from(["helr", "batch", "0"]).unwrap_err();
    assert_eq!(err.exit_code(), 2);
    assert!(Args::try_parse_from(["helr", "batch", "1"]).is_ok());
}

#[test]
fn flags_override_config_file() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("helr.json");
    std::fs::write(
        &config,
        r#"{"weights_path": "from-file.bin", "he": {"mult_depth": 6}, "reduction": "block-sum"}"#,
    )
    .unwrap();
    let args = Args::try_parse_from([
        "helr",
        "--config",
        config.to_str().unwrap(),
        "--scale-bits",
        "40",
        "--negative-label",
        "8",
        "--reduction",
        "rotate-all",
        "single",
    ])
    .unwrap();
    let cfg = args.resolve_config().unwrap();
    assert_eq!(cfg.weights_path, PathBuf::from("from-file.bin"));
    assert_eq!(cfg.he.mult_depth, 6);
    assert_eq!(cfg.he.scale_bits, 40);
    assert_eq!(cfg.reduction, ReductionStrategy::RotateAll);
    assert_eq!(
        cfg.label_rule,
        LabelRule::Pair {
            positive: 3,
            negative: 8
        }
    );
}

#[test]
fn positive_label_alone_is_one_vs_rest() {
    let args = Args::try_parse_from(["helr", "--positive-label", "5", "clear"]).unwrap();
    assert_eq!(
        args.resolve_config().unwrap().label_rule,
        LabelRule::OneVsRest { positive: 5 }
    );
}

#[test]
fn single_batch_and_clear_modes_run() {
    let dir = tempfile::tempdir().unwrap();
    run(args_for(dir.path(), &["single", "2"])).unwrap();
    run(args_for(dir.path(), &["single"])).unwrap();
    run(args_for(dir.path(), &["batch", "2"])).unwrap();
    run(args_for(dir.path(), &["clear"])).unwrap();
    run(args_for(dir.path(), &["clear", "1"])).unwrap();
}

#[test]
fn out_of_range_index_fails() {
    let dir = tempfile::tempdir().unwrap();
    let err = run(args_for(dir.path(), &["single", "4"])).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<InferenceError>(),
        Some(InferenceError::IndexOutOfBounds { index: 4, length: 4 })
    ));
}

#[test]
fn single_without_index_scores_the_dataset() {
    let dir = tempfile::tempdir().unwrap();
    let mut args = args_for(dir.path(), &["single"]);
    args.labels = Some(dir.path().join("no-labels"));
    assert!(run(args).is_err());

    let mut args = args_for(dir.path(), &["single", "0"]);
    args.labels = Some(dir.path().join("no-labels"));
    run(args).unwrap();
}

#[test]
fn missing_dataset_is_fatal() {
    let args = Args::try_parse_from(["helr", "--images", "/nonexistent/images", "clear"]).unwrap();
    assert!(run(args).is_err());
}

#[test]
fn batched_rotate_all_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let err = run(args_for(dir.path(), &["--reduction", "rotate-all", "batch", "2"])).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<InferenceError>(),
        Some(InferenceError::InvalidConfig(_))
    ));
}
