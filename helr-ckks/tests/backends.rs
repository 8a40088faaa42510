//! The same dot-product-then-polynomial chain run against both backends.

use helr_ckks::{
    eval_poly_clear, power_of_two_rotations, HeBackend, HeError, HeParams, PlainBackend,
};

fn params(depth: usize) -> HeParams {
    HeParams {
        mult_depth: depth,
        scale_bits: 40,
        first_mod_bits: 60,
        ring_dim: Some(64),
        seed: Some(7),
    }
}

/// Blocks of `run` slots: multiply, sum each block, add 0.25, apply `coeffs`.
fn blockwise_chain<B: HeBackend>(
    be: &B,
    x: &[f64],
    w: &[f64],
    run: usize,
    coeffs: &[f64],
) -> Vec<f64> {
    let keys = be.keygen(&power_of_two_rotations(run)).unwrap();
    let cx = be.encrypt(&be.encode(x).unwrap(), &keys.public).unwrap();
    let cw = be.encrypt(&be.encode(w).unwrap(), &keys.public).unwrap();
    let prod = be.mul(&cx, &cw, &keys.eval).unwrap();
    let summed = be.sum_run(&prod, run, &keys.eval).unwrap();
    let biased = be
        .add_plain(&summed, &be.encode(&vec![0.25; be.slot_count()]).unwrap())
        .unwrap();
    let out = be.eval_poly(&biased, coeffs, &keys.eval).unwrap();
    assert_eq!(be.level(&out), 1 + helr_ckks::poly_depth(coeffs));
    let dec = be.decrypt(&out, &keys.secret).unwrap();
    assert!(dec.valid);
    dec.values
}

fn expected(x: &[f64], w: &[f64], run: usize, coeffs: &[f64]) -> Vec<f64> {
    x.chunks(run)
        .zip(w.chunks(run))
        .map(|(xs, ws)| {
            let dot: f64 = xs.iter().zip(ws).map(|(a, b)| a * b).sum();
            eval_poly_clear(dot + 0.25, coeffs)
        })
        .collect()
}

#[test]
fn plain_and_ckks_agree_on_blockwise_chain() {
    let coeffs = [0.5, 0.2, 0.0, -0.005];
    let x: Vec<f64> = (0..32).map(|i| (i % 7) as f64 * 0.5).collect();
    let w: Vec<f64> = (0..32).map(|i| ((i % 5) as f64 - 2.0) * 0.1).collect();
    let want = expected(&x, &w, 8, &coeffs);

    let plain = PlainBackend::configure(&params(3), 32).unwrap();
    let got_plain = blockwise_chain(&plain, &x, &w, 8, &coeffs);

    let ckks = helr_ckks::CkksBackend::configure(&params(3), 32).unwrap();
    let got_ckks = blockwise_chain(&ckks, &x, &w, 8, &coeffs);

    for (block, want) in want.iter().enumerate() {
        let p = got_plain[block * 8];
        let c = got_ckks[block * 8];
        assert!((p - want).abs() < 1e-9, "plain block {}: {} vs {}", block, p, want);
        assert!((c - want).abs() < 1e-3, "ckks block {}: {} vs {}", block, c, want);
    }
}

#[test]
fn both_backends_refuse_the_same_over_budget_chain() {
    let coeffs = [0.5, 0.2, 0.0, -0.005, 0.0, 0.0003];
    let plain = PlainBackend::configure(&params(3), 16).unwrap();
    let ckks = helr_ckks::CkksBackend::configure(&params(3), 16).unwrap();

    fn run<B: HeBackend>(be: &B, coeffs: &[f64]) -> HeError {
        let keys = be.keygen(&[]).unwrap();
        let ct = be.encrypt(&be.encode(&[1.0]).unwrap(), &keys.public).unwrap();
        let sq = be.mul(&ct, &ct, &keys.eval).unwrap();
        be.eval_poly(&sq, coeffs, &keys.eval).unwrap_err()
    }

    let expected = HeError::DepthExceeded {
        required: 4,
        available: 3,
    };
    assert_eq!(run(&plain, &coeffs), expected);
    assert_eq!(run(&ckks, &coeffs), expected);
}

#[test]
fn invalid_slot_count_is_rejected_by_both() {
    assert!(matches!(
        PlainBackend::configure(&HeParams::default(), 784),
        Err(HeError::InvalidParams(_))
    ));
    assert!(matches!(
        helr_ckks::CkksBackend::configure(&HeParams::default(), 784),
        Err(HeError::InvalidParams(_))
    ));
}
