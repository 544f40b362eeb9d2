//! Property tests over random acyclic acceptors.
//!
//! Weights are small integers so every path weight is exact in `f32` and
//! the language comparisons below only need a loose tolerance for
//! quantization during minimization.

use std::collections::BTreeMap;

use proptest::prelude::*;
use wfst::prelude::*;

type W = TropicalWeight;

const TOLERANCE: f32 = 1e-2;

/// Acyclic acceptor over `min_label..=max_label` with start state 0.
/// Transitions always go from a lower to a higher state id.
fn arb_acceptor(min_label: Label, max_label: Label) -> impl Strategy<Value = VectorFst<W>> {
    (2usize..7)
        .prop_flat_map(move |n| {
            (
                Just(n),
                prop::collection::vec((0..n, 0..n, min_label..=max_label, 0u8..5), 0..14),
                prop::collection::vec(prop::option::of(0u8..3), n),
            )
        })
        .prop_map(|(n, trs, finals)| {
            let mut fst = VectorFst::new();
            fst.add_states(n);
            fst.set_start(0).unwrap();
            for (a, b, label, w) in trs {
                if a == b {
                    continue;
                }
                let (src, dst) = (a.min(b) as StateId, a.max(b) as StateId);
                fst.add_tr(src, Tr::new(label, label, f32::from(w), dst))
                    .unwrap();
            }
            for (s, f) in finals.into_iter().enumerate() {
                if let Some(w) = f {
                    fst.set_final(s as StateId, f32::from(w)).unwrap();
                }
            }
            fst
        })
}

/// Best weight of every accepted string.
fn best_weights(fst: &VectorFst<W>) -> BTreeMap<Vec<Label>, f32> {
    let mut best: BTreeMap<Vec<Label>, f32> = BTreeMap::new();
    for path in fst.paths_iter() {
        let w = path.weight.value();
        best.entry(path.ilabels)
            .and_modify(|b| *b = b.min(w))
            .or_insert(w);
    }
    best
}

fn same_language(a: &BTreeMap<Vec<Label>, f32>, b: &BTreeMap<Vec<Label>, f32>) -> bool {
    a.len() == b.len()
        && a
            .iter()
            .zip(b)
            .all(|((ka, wa), (kb, wb))| ka == kb && (wa - wb).abs() <= TOLERANCE)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn connect_is_idempotent(fst in arb_acceptor(0, 3)) {
        let mut once = fst.clone();
        connect(&mut once).unwrap();
        let mut twice = once.clone();
        connect(&mut twice).unwrap();
        prop_assert_eq!(&once, &twice);
        prop_assert!(same_language(&best_weights(&fst), &best_weights(&once)));
    }

    #[test]
    fn binary_round_trip(fst in arb_acceptor(0, 3)) {
        let bytes = fst.store().unwrap();
        prop_assert_eq!(VectorFst::<W>::load(&bytes).unwrap(), fst.clone());
        let frozen = ConstFst::from(fst.clone());
        let bytes = frozen.store().unwrap();
        prop_assert_eq!(ConstFst::<W>::load(&bytes).unwrap(), frozen);
    }

    #[test]
    fn text_round_trip(fst in arb_acceptor(0, 3)) {
        let parsed = VectorFst::<W>::from_text(&fst.text()).unwrap();
        prop_assert_eq!(parsed, fst);
    }

    #[test]
    fn rm_epsilon_keeps_language(fst in arb_acceptor(0, 3)) {
        let mut out = fst.clone();
        rm_epsilon(&mut out).unwrap();
        prop_assert!(out.properties().unwrap().contains(FstProperties::NO_EPSILONS));
        prop_assert!(same_language(&best_weights(&fst), &best_weights(&out)));
    }

    #[test]
    fn determinize_is_deterministic_and_keeps_language(fst in arb_acceptor(1, 3)) {
        let det = determinize(&fst).unwrap();
        prop_assert!(det.properties().unwrap().contains(FstProperties::I_DETERMINISTIC));
        prop_assert!(same_language(&best_weights(&fst), &best_weights(&det)));
    }

    #[test]
    fn minimize_never_grows(fst in arb_acceptor(1, 3)) {
        let det = determinize(&fst).unwrap();
        let mut min = det.clone();
        minimize(&mut min).unwrap();
        prop_assert!(min.num_states() <= det.num_states());
        prop_assert!(same_language(&best_weights(&det), &best_weights(&min)));
    }

    #[test]
    fn shortest_path_finds_the_best_string(fst in arb_acceptor(0, 3)) {
        let best = best_weights(&fst);
        let out = shortest_path(&fst).unwrap();
        let paths: Vec<_> = out.paths_iter().collect();
        match best.values().copied().reduce(f32::min) {
            None => prop_assert!(paths.is_empty()),
            Some(min) => {
                prop_assert_eq!(paths.len(), 1);
                prop_assert!((paths[0].weight.value() - min).abs() <= TOLERANCE);
                let total = shortest_distance_total(&fst).unwrap();
                prop_assert!((total.value() - min).abs() <= TOLERANCE);
            }
        }
    }

    #[test]
    fn reverse_reverses_strings(fst in arb_acceptor(0, 3)) {
        let rev = reverse(&fst).unwrap();
        let expected: BTreeMap<Vec<Label>, f32> = best_weights(&fst)
            .into_iter()
            .map(|(mut k, w)| {
                k.reverse();
                (k, w)
            })
            .collect();
        prop_assert!(same_language(&expected, &best_weights(&rev)));
    }

    #[test]
    fn union_merges_languages(a in arb_acceptor(0, 3), b in arb_acceptor(0, 3)) {
        let mut expected = best_weights(&a);
        for (k, w) in best_weights(&b) {
            expected.entry(k).and_modify(|x| *x = x.min(w)).or_insert(w);
        }
        let mut u = a.clone();
        union(&mut u, &b).unwrap();
        prop_assert!(same_language(&expected, &best_weights(&u)));
    }

    #[test]
    fn compose_with_itself_doubles_weights(fst in arb_acceptor(1, 3)) {
        let mut sorted = fst.clone();
        tr_sort(&mut sorted, true);
        let product = compose(&fst, &sorted).unwrap();
        let expected: BTreeMap<Vec<Label>, f32> = best_weights(&fst)
            .into_iter()
            .map(|(k, w)| (k, 2.0 * w))
            .collect();
        prop_assert!(same_language(&expected, &best_weights(&product)));
    }
}
