use bagsum::embedding_lookup;
use bagsum::workload::WorkloadSpec;
use bagsum::Lookup;

#[test]
fn single_code_dequantizes_to_scale_times_value_plus_bias() {
    let codes = [0u8, 1, 127, 255];
    let sb = [0.02f32, -1.5];
    let indices = [0i64];
    let lengths = [1];
    let lk = Lookup::new(4, &codes, &indices, &lengths).with_scale_bias(&sb);
    let mut out = vec![0f64; 4];
    embedding_lookup(&lk, &mut out).unwrap();
    for (o, &v) in out.iter().zip(&codes) {
        let expected = 0.02f32 as f64 * v as f64 + (-1.5f64);
        assert!((o - expected).abs() <= 1e-12, "code {v}: {o} vs {expected}");
    }
}

#[test]
fn quantized_path_matches_dequantized_float_path() {
    for (weighted, normalize) in [(false, false), (true, false), (false, true), (true, true)] {
        let spec = WorkloadSpec {
            data_size: 500,
            block_size: 48,
            output_size: 200,
            mean_bag_len: 12.0,
            weighted,
            normalize_by_lengths: normalize,
            ..WorkloadSpec::default()
        };
        let w = spec.generate().unwrap();
        let q = w.quantize();

        // Decode the codes up front and push them through the float path.
        let bs = spec.block_size;
        let decoded: Vec<f32> = q
            .codes
            .chunks(bs)
            .enumerate()
            .flat_map(|(r, row)| {
                let (scale, bias) = (q.scale_bias[2 * r], q.scale_bias[2 * r + 1]);
                row.iter().map(move |&c| scale * c as f32 + bias)
            })
            .collect();

        let quant = w.lookup(&q.codes).with_scale_bias(&q.scale_bias);
        let float = w.lookup(&decoded);
        let n = spec.output_size * bs;
        let (mut from_codes, mut from_floats) = (vec![0f32; n], vec![0f32; n]);
        embedding_lookup(&quant, &mut from_codes).unwrap();
        embedding_lookup(&float, &mut from_floats).unwrap();
        for (i, (a, b)) in from_codes.iter().zip(&from_floats).enumerate() {
            assert!((a - b).abs() <= 1e-4 * (1.0 + b.abs()), "weighted={weighted} normalize={normalize} [{i}]: {a} vs {b}");
        }
    }
}

#[test]
fn f64_accumulation_stays_within_f64_rounding() {
    // 0.1 is not representable; summing it many times drifts visibly in f32
    // and only at the last few bits in f64.
    let n: usize = 100_000;
    let codes = [1u8, 3];
    let sb = [0.1f32, 0.0];
    let indices = vec![0i64; n];
    let lengths = [n as i32];
    let lk = Lookup::new(2, &codes, &indices, &lengths).with_scale_bias(&sb);

    let step = 0.1f32 as f64;
    let exact = [step * n as f64, 3.0 * step * n as f64];

    let mut wide = vec![0f64; 2];
    embedding_lookup(&lk, &mut wide).unwrap();
    for (got, want) in wide.iter().zip(exact) {
        let bound = n as f64 * f64::EPSILON * want;
        assert!((got - want).abs() <= bound, "f64: {got} vs {want} (bound {bound})");
    }

    let mut narrow = vec![0f32; 2];
    embedding_lookup(&lk, &mut narrow).unwrap();
    let drift = (narrow[0] as f64 - exact[0]).abs();
    let wide_err = (wide[0] - exact[0]).abs();
    assert!(drift > wide_err, "f32 drift {drift} should exceed f64 error {wide_err}");
}

#[test]
fn weighted_quantized_folds_weight_into_scale_and_bias() {
    let codes = [4u8, 8, 2, 6];
    let sb = [0.5f32, 1.0, 0.25, -2.0];
    let indices = [0i32, 1];
    let lengths = [2];
    let weights = [2.0f32, 4.0];
    let lk = Lookup::new(2, &codes, &indices, &lengths).with_scale_bias(&sb).with_weights(&weights);
    let mut out = vec![0f32; 2];
    embedding_lookup(&lk, &mut out).unwrap();
    // 2 * (0.5*4 + 1) + 4 * (0.25*2 - 2) = 6 - 6 = 0; 2 * (0.5*8 + 1) + 4 * (0.25*6 - 2) = 10 - 2 = 8
    assert_eq!(out, vec![0.0, 8.0]);
}
