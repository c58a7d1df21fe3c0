#![cfg(test)]

// Property tests for OrderedTable kept inside the crate so they can reach
// the private module.

use crate::ordered_table::{OrderedTable, Slot};
use proptest::prelude::*;
use std::collections::hash_map::RandomState;
use std::hash::{BuildHasher, Hasher};

// Pool-indexed operations: indices shrink to earlier keys, the pool shrinks,
// and op lists shrink in length.
#[derive(Clone, Debug)]
enum Op {
    Upsert(usize, i32),
    Remove(usize),
    Find(usize),
    Clear,
    Iterate,
}

fn arb_scenario() -> impl Strategy<Value = (Vec<String>, Vec<Op>)> {
    proptest::collection::hash_set("[a-z]{0,4}", 1..=8).prop_flat_map(|pool| {
        let pool: Vec<String> = pool.into_iter().collect();
        let idx = 0..pool.len();
        let op = prop_oneof![
            4 => (idx.clone(), any::<i32>()).prop_map(|(i, v)| Op::Upsert(i, v)),
            2 => idx.clone().prop_map(Op::Remove),
            2 => idx.prop_map(Op::Find),
            1 => Just(Op::Clear),
            1 => Just(Op::Iterate),
        ];
        proptest::collection::vec(op, 1..80).prop_map(move |ops| (pool.clone(), ops))
    })
}

// Model: a Vec of (key, value, slot) in insertion order.
fn run<S: BuildHasher>(
    mut sut: OrderedTable<String, i32, S>,
    pool: Vec<String>,
    ops: Vec<Op>,
) -> Result<(), TestCaseError> {
    let mut model: Vec<(String, i32, Slot)> = Vec::new();
    let mut stale: Vec<Slot> = Vec::new();

    for op in ops {
        match op {
            Op::Upsert(i, v) => {
                let k = pool[i].clone();
                let pos = model.iter().position(|(mk, _, _)| *mk == k);
                let expected_prev = pos.map(|p| model[p].1);
                let mut seen_prev = None;
                let (slot, prev) = sut.insert_with(k.clone(), |_, current| {
                    seen_prev = current.copied();
                    v
                });
                prop_assert_eq!(prev, expected_prev);
                prop_assert_eq!(seen_prev, expected_prev);
                match pos {
                    Some(p) => {
                        prop_assert_eq!(model[p].2, slot, "replace must keep the slot");
                        model[p].1 = v;
                    }
                    None => model.push((k, v, slot)),
                }
            }
            Op::Remove(i) => {
                let k = &pool[i];
                match model.iter().position(|(mk, _, _)| mk == k) {
                    Some(p) => {
                        let (mk, mv, slot) = model.remove(p);
                        prop_assert_eq!(sut.remove(slot), Some((mk, mv)));
                        stale.push(slot);
                    }
                    None => prop_assert!(sut.find(k.as_str()).is_none()),
                }
            }
            Op::Find(i) => {
                let k = &pool[i];
                let expected = model.iter().find(|(mk, _, _)| mk == k).map(|e| e.2);
                prop_assert_eq!(sut.find(k.as_str()), expected);
            }
            Op::Clear => {
                stale.extend(model.drain(..).map(|e| e.2));
                sut.clear();
            }
            Op::Iterate => {
                let got: Vec<(String, i32)> =
                    sut.iter().map(|(_, k, v)| (k.clone(), *v)).collect();
                let want: Vec<(String, i32)> =
                    model.iter().map(|(k, v, _)| (k.clone(), *v)).collect();
                prop_assert_eq!(got, want);
            }
        }

        prop_assert_eq!(sut.len(), model.len());
        prop_assert_eq!(sut.is_empty(), model.is_empty());
        prop_assert_eq!(sut.iter().len(), model.len());
        for slot in &stale {
            prop_assert!(sut.get(*slot).is_none(), "stale slot resolved");
        }
    }

    // Final order check, independent of whether Iterate was drawn.
    let order: Vec<&String> = sut.iter().map(|(_, k, _)| k).collect();
    let want: Vec<&String> = model.iter().map(|(k, _, _)| k).collect();
    prop_assert_eq!(order, want);
    Ok(())
}

// Property: state-machine equivalence with an insertion-ordered Vec model.
// - Upsert replaces in place (same slot, same position) or appends.
// - Remove returns the owned pair and unlinks from both index and order.
// - Stale slots never resolve; len/is_empty/iter agree with the model.
proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]
    #[test]
    fn prop_state_machine((pool, ops) in arb_scenario()) {
        let sut = OrderedTable::with_capacity_and_hasher(0, RandomState::new());
        run(sut, pool, ops)?;
    }
}

// Collision variant using a constant hasher to stress equality resolution.
#[derive(Clone, Default)]
struct ConstBuildHasher;
struct ConstHasher;
impl BuildHasher for ConstBuildHasher {
    type Hasher = ConstHasher;
    fn build_hasher(&self) -> Self::Hasher {
        ConstHasher
    }
}
impl Hasher for ConstHasher {
    fn write(&mut self, _bytes: &[u8]) {}
    fn finish(&self) -> u64 {
        0
    }
}

proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]
    #[test]
    fn prop_state_machine_with_collisions((pool, ops) in arb_scenario()) {
        let sut = OrderedTable::with_capacity_and_hasher(0, ConstBuildHasher);
        run(sut, pool, ops)?;
    }
}
