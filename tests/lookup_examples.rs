use bagsum::{embedding_lookup, embedding_lookup_reference, Lookup};
use half::f16;
use pretty_assertions::assert_eq;

const TABLE: [f32; 6] = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
const LENGTHS: [i32; 2] = [1, 2];

#[test]
fn unweighted_sum() {
    let indices = [0i64, 1, 2];
    let lk = Lookup::new(2, &TABLE, &indices, &LENGTHS);
    let mut out = vec![f32::NAN; 4];
    embedding_lookup(&lk, &mut out).unwrap();
    assert_eq!(out, vec![1.0, 2.0, 8.0, 10.0]);
}

#[test]
fn mean_pooling_divides_by_bag_length() {
    let indices = [0i32, 1, 2];
    let lk = Lookup::new(2, &TABLE, &indices, &LENGTHS).normalize_by_lengths(true);
    let mut out = vec![0f32; 4];
    embedding_lookup(&lk, &mut out).unwrap();
    assert_eq!(out, vec![1.0, 2.0, 4.0, 5.0]);
}

#[test]
fn weighted_sum() {
    let indices = [0i64, 1, 2];
    let weights = [1.0f32, 0.5, 2.0];
    let lk = Lookup::new(2, &TABLE, &indices, &LENGTHS).with_weights(&weights);
    let mut out = vec![0f32; 4];
    embedding_lookup(&lk, &mut out).unwrap();
    assert_eq!(out, vec![1.0, 2.0, 11.5, 14.0]);
}

#[test]
fn weighted_mean_in_f64() {
    let indices = [0i32, 1, 2];
    let weights = [1.0f32, 0.5, 2.0];
    let lk = Lookup::new(2, &TABLE, &indices, &LENGTHS).with_weights(&weights).normalize_by_lengths(true);
    let mut out = vec![0f64; 4];
    embedding_lookup(&lk, &mut out).unwrap();
    assert_eq!(out, vec![1.0, 2.0, 5.75, 7.0]);
}

#[test]
fn half_precision_table() {
    let table: Vec<f16> = TABLE.iter().map(|&v| f16::from_f32(v)).collect();
    let indices = [2i64, 0, 1];
    let lk = Lookup::new(2, &table, &indices, &LENGTHS);
    let mut out = vec![0f32; 4];
    embedding_lookup(&lk, &mut out).unwrap();
    assert_eq!(out, vec![5.0, 6.0, 4.0, 6.0]);
}

#[test]
fn repeated_index_counts_twice() {
    let indices = [1i64, 1, 1];
    let lengths = [3];
    let lk = Lookup::new(2, &TABLE, &indices, &lengths).normalize_by_lengths(true);
    let mut out = vec![0f32; 2];
    embedding_lookup(&lk, &mut out).unwrap();
    assert_eq!(out, vec![3.0, 4.0]);
}

#[test]
fn reference_agrees_on_examples() {
    let indices = [0i64, 1, 2];
    let weights = [1.0f32, 0.5, 2.0];
    for normalize in [false, true] {
        for weighted in [false, true] {
            let mut lk = Lookup::new(2, &TABLE, &indices, &LENGTHS).normalize_by_lengths(normalize);
            if weighted { lk = lk.with_weights(&weights); }
            let mut fast = vec![0f32; 4];
            let mut slow = vec![0f32; 4];
            embedding_lookup(&lk, &mut fast).unwrap();
            embedding_lookup_reference(&lk, &mut slow).unwrap();
            assert_eq!(fast, slow, "normalize={normalize} weighted={weighted}");
        }
    }
}
