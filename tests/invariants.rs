//! # Structural Invariant Suite
//!
//! Randomized workloads checked against `std::collections::BTreeMap` as
//! the model, with `PackedMap::validate` (the full structural walk) run at
//! every checkpoint. Seeds are fixed so failures reproduce.

use std::collections::BTreeMap;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use packmap::PackedMap;

fn check_against_model(map: &PackedMap<i64, i64>, model: &BTreeMap<i64, i64>) {
    map.validate().unwrap();
    assert_eq!(map.len(), model.len());
    let got: Vec<(i64, i64)> = map.iter().map(|(k, v)| (*k, *v)).collect();
    let want: Vec<(i64, i64)> = model.iter().map(|(k, v)| (*k, *v)).collect();
    assert_eq!(got, want);
}

#[test]
fn random_inserts_match_model() {
    let mut rng = StdRng::seed_from_u64(0xB7EE);
    let mut map: PackedMap<i64, i64> = PackedMap::new();
    let mut model = BTreeMap::new();

    for i in 0..4000 {
        let k = rng.gen_range(-2000..2000);
        map.set(k, i);
        model.insert(k, i);
        if i % 500 == 499 {
            check_against_model(&map, &model);
        }
    }
    check_against_model(&map, &model);
}

#[test]
fn interleaved_ops_match_model() {
    let mut rng = StdRng::seed_from_u64(0xCAFE);
    let mut map: PackedMap<i64, i64> = PackedMap::new();
    let mut model = BTreeMap::new();

    for round in 0..10_000 {
        let k = rng.gen_range(0..800);
        match rng.gen_range(0..10) {
            0..=4 => {
                let inserted = model.insert(k, round).is_none();
                match map.add(k, round) {
                    Ok(()) => assert!(inserted, "map accepted a duplicate"),
                    Err(_) => {
                        assert!(!inserted, "map rejected a fresh key");
                        model.insert(k, round);
                        map.set(k, round);
                    }
                }
            }
            5..=7 => {
                assert_eq!(map.remove(&k), model.remove(&k).is_some());
            }
            8 => {
                assert_eq!(map.try_get(&k), model.get(&k));
            }
            _ => {
                assert_eq!(map.contains(&k), model.contains_key(&k));
            }
        }
        if round % 1000 == 999 {
            check_against_model(&map, &model);
        }
    }
    check_against_model(&map, &model);
}

#[test]
fn add_remove_roundtrip_restores_state() {
    let mut rng = StdRng::seed_from_u64(0xD00D);
    let mut map: PackedMap<i64, i64> = PackedMap::new();
    for _ in 0..1000 {
        map.set(rng.gen_range(0..10_000), 0);
    }

    let before: Vec<(i64, i64)> = map.iter().map(|(k, v)| (*k, *v)).collect();
    let bytes = map.bytes_used();
    let nodes = map.node_count();

    // A key guaranteed absent, added and removed again.
    map.add(20_000, 1).unwrap();
    assert!(map.remove(&20_000));

    let after: Vec<(i64, i64)> = map.iter().map(|(k, v)| (*k, *v)).collect();
    assert_eq!(before, after);
    assert_eq!(map.bytes_used(), bytes);
    assert_eq!(map.node_count(), nodes);
    map.validate().unwrap();
}

#[test]
fn membership_is_exact_for_present_and_absent_keys() {
    let mut rng = StdRng::seed_from_u64(0xFEED);
    let mut map: PackedMap<i64, i64> = PackedMap::new();
    let mut model = BTreeMap::new();
    for _ in 0..2000 {
        let k = rng.gen_range(0..4000);
        map.set(k, k);
        model.insert(k, k);
    }
    for k in 0..4000 {
        assert_eq!(map.contains(&k), model.contains_key(&k), "key {}", k);
    }
}

#[test]
fn ranges_match_model_subsequences() {
    let mut rng = StdRng::seed_from_u64(0xAB1E);
    let mut map: PackedMap<i64, i64> = PackedMap::new();
    let mut model = BTreeMap::new();
    for _ in 0..3000 {
        let k = rng.gen_range(0..5000);
        map.set(k, k * 3);
        model.insert(k, k * 3);
    }

    for _ in 0..200 {
        let a = rng.gen_range(-100..5100);
        let b = rng.gen_range(-100..5100);
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };

        // The end bound is inclusive (range follows
        // [lower_bound, upper_bound), see the range docs).
        let got: Vec<i64> = map.range(&lo, &hi).unwrap().map(|(k, _)| *k).collect();
        let want: Vec<i64> = model.range(lo..=hi).map(|(k, _)| *k).collect();
        assert_eq!(got, want, "range({}, {})", lo, hi);

        let from_got: Vec<i64> = map.from(&lo).map(|(k, _)| *k).collect();
        let from_want: Vec<i64> = model.range(lo..).map(|(k, _)| *k).collect();
        assert_eq!(from_got, from_want, "from({})", lo);
    }
}

#[test]
fn forward_and_backward_iteration_agree() {
    let mut rng = StdRng::seed_from_u64(0x1D1D);
    let mut map: PackedMap<i64, i64> = PackedMap::new();
    for _ in 0..2500 {
        map.set(rng.gen_range(0..100_000), 0);
    }

    let forward: Vec<i64> = map.iter().map(|(k, _)| *k).collect();
    let mut backward: Vec<i64> = map.iter().rev().map(|(k, _)| *k).collect();
    backward.reverse();
    assert_eq!(forward, backward);
}

#[test]
fn pop_front_and_pop_back_drain_cleanly() {
    let mut map: PackedMap<i64, i64> = PackedMap::new();
    for k in 0..3000 {
        map.add(k, k).unwrap();
    }

    // Pop the front half in key order.
    for k in 0..1500 {
        let first = *map.iter().next().unwrap().0;
        assert_eq!(first, k);
        assert!(map.remove(&first));
        if k % 250 == 0 {
            map.validate().unwrap();
        }
    }
    // Pop the rest from the back.
    for k in (1500..3000).rev() {
        let last = *map.iter().next_back().unwrap().0;
        assert_eq!(last, k);
        assert!(map.remove(&last));
        if k % 250 == 0 {
            map.validate().unwrap();
        }
    }
    assert!(map.is_empty());
    map.validate().unwrap();
}

#[test]
fn deep_trees_with_tiny_nodes_stay_consistent() {
    // A 64-byte budget forces minimum-capacity nodes and maximum depth,
    // which is where split/merge edge cases live.
    let mut rng = StdRng::seed_from_u64(0x5EED);
    let mut map: PackedMap<i64, i64> = PackedMap::with_target_node_bytes(64).unwrap();
    let mut model = BTreeMap::new();

    for round in 0..6000 {
        let k = rng.gen_range(0..600);
        if rng.gen_bool(0.6) {
            map.set(k, round);
            model.insert(k, round);
        } else {
            assert_eq!(map.remove(&k), model.remove(&k).is_some());
        }
        if round % 500 == 499 {
            check_against_model_small(&map, &model);
        }
    }
    check_against_model_small(&map, &model);

    fn check_against_model_small(map: &PackedMap<i64, i64>, model: &BTreeMap<i64, i64>) {
        map.validate().unwrap();
        let got: Vec<(i64, i64)> = map.iter().map(|(k, v)| (*k, *v)).collect();
        let want: Vec<(i64, i64)> = model.iter().map(|(k, v)| (*k, *v)).collect();
        assert_eq!(got, want);
    }
}

#[test]
fn occupancy_never_exceeds_capacity() {
    let mut rng = StdRng::seed_from_u64(0x0CC0);
    let mut map: PackedMap<i64, i64> = PackedMap::new();
    for _ in 0..5000 {
        map.set(rng.gen_range(0..20_000), 0);
    }
    // fullness is len / (node_count * capacity); a value above 1.0 would
    // mean some node claims more entries than its slots.
    assert!(map.fullness() <= 1.0);
    assert!(map.fullness() > 0.3);
    map.validate().unwrap();
}
