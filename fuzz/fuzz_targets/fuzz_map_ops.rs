//! Fuzz testing for the map engine.
//!
//! Drives arbitrary operation sequences against the map with
//! `std::collections::BTreeMap` as the model, validating the full tree
//! structure after every mutation burst. Any divergence, panic, or
//! invariant violation is a finding.

#![no_main]

use std::collections::BTreeMap;

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;

use packmap::PackedMap;

#[derive(Debug, Arbitrary)]
struct MapInput {
    /// Node byte budget selector, mapped into a sane range.
    budget: u8,
    operations: Vec<MapOperation>,
}

#[derive(Debug, Arbitrary)]
enum MapOperation {
    Add { key: i16, value: i32 },
    Set { key: i16, value: i32 },
    Remove { key: i16 },
    Get { key: i16 },
    RangeCount { start: i16, end: i16 },
    Clear,
}

fuzz_target!(|input: MapInput| {
    if input.operations.len() > 2000 {
        return;
    }

    // 64..=1087 bytes; small budgets force deep trees quickly.
    let budget = 64 + (input.budget as usize) * 4;
    let mut map: PackedMap<i16, i32> = match PackedMap::with_target_node_bytes(budget) {
        Ok(map) => map,
        Err(_) => return,
    };
    let mut model: BTreeMap<i16, i32> = BTreeMap::new();

    for (i, op) in input.operations.iter().enumerate() {
        match *op {
            MapOperation::Add { key, value } => {
                let fresh = model.get(&key).is_none();
                match map.add(key, value) {
                    Ok(()) => {
                        assert!(fresh, "add accepted a duplicate key");
                        model.insert(key, value);
                    }
                    Err(_) => assert!(!fresh, "add rejected a fresh key"),
                }
            }
            MapOperation::Set { key, value } => {
                map.set(key, value);
                model.insert(key, value);
            }
            MapOperation::Remove { key } => {
                assert_eq!(map.remove(&key), model.remove(&key).is_some());
            }
            MapOperation::Get { key } => {
                assert_eq!(map.try_get(&key), model.get(&key));
            }
            MapOperation::RangeCount { start, end } => {
                if start <= end {
                    let got = map.range(&start, &end).unwrap().count();
                    let want = model.range(start..=end).count();
                    assert_eq!(got, want);
                } else {
                    assert!(map.range(&start, &end).is_err());
                }
            }
            MapOperation::Clear => {
                map.clear();
                model.clear();
            }
        }

        if i % 64 == 63 {
            map.validate().unwrap();
        }
    }

    map.validate().unwrap();
    assert_eq!(map.len(), model.len());
    assert!(map.iter().map(|(k, v)| (*k, *v)).eq(model.iter().map(|(k, v)| (*k, *v))));
});
