// Criterion benchmarks for the wfst engine.
//
// Inputs are synthetic: seeded random acyclic transducers and a letter
// lexicon built from a fixed word list, so runs are comparable across
// machines without external data.
//
// Run:
//   cargo bench -p wfst

use criterion::{Criterion, criterion_group, criterion_main};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use wfst::prelude::*;

type W = TropicalWeight;

// ---------------------------------------------------------------------------
// Inputs
// ---------------------------------------------------------------------------

/// Random acyclic transducer: each state gets `fanout` transitions to
/// later states. Labels are drawn from `1..=alphabet`, one state in ten is
/// final.
fn random_dag(num_states: usize, fanout: usize, alphabet: Label, seed: u64) -> VectorFst<W> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut fst = VectorFst::new();
    fst.add_states(num_states);
    let _ = fst.set_start(0);
    for s in 0..num_states - 1 {
        for _ in 0..fanout {
            let next = rng.gen_range(s + 1..num_states) as StateId;
            let ilabel = rng.gen_range(1..=alphabet);
            let olabel = rng.gen_range(1..=alphabet);
            let weight = rng.gen_range(0..8) as f32 * 0.25;
            let _ = fst.add_tr(s as StateId, Tr::new(ilabel, olabel, weight, next));
        }
        if s % 10 == 0 {
            let _ = fst.set_final(s as StateId, 0.0);
        }
    }
    let _ = fst.set_final((num_states - 1) as StateId, 0.0);
    fst
}

/// Trie-shaped acceptor over the letters of `WORDS`.
fn word_acceptor() -> VectorFst<W> {
    let mut lexicon = VectorFst::new();
    for word in WORDS {
        let labels: Vec<Label> = word.bytes().map(Label::from).collect();
        let _ = union(&mut lexicon, &acceptor(&labels, W::one()));
    }
    lexicon
}

const WORDS: &[&str] = &[
    "transducer", "transduce", "transition", "translate", "transform",
    "determinize", "determine", "minimize", "minimum", "compose",
    "composition", "composite", "epsilon", "weight", "weighted",
    "semiring", "tropical", "logarithm", "shortest", "distance",
    "path", "paths", "state", "states", "final", "finality",
    "acceptor", "accept", "symbol", "symbols", "label", "labels",
];

// ---------------------------------------------------------------------------
// Benchmarks
// ---------------------------------------------------------------------------

fn bench_compose(c: &mut Criterion) {
    let a = random_dag(200, 3, 8, 1);
    let mut b = random_dag(200, 3, 8, 2);
    tr_sort(&mut b, true);
    c.bench_function("compose_200x200", |bench| {
        bench.iter(|| std::hint::black_box(compose(&a, &b)))
    });
}

fn bench_determinize_minimize(c: &mut Criterion) {
    let mut lexicon = word_acceptor();
    let _ = rm_epsilon(&mut lexicon);
    c.bench_function("determinize_lexicon", |b| {
        b.iter(|| std::hint::black_box(determinize(&lexicon)))
    });

    let det = determinize(&lexicon).unwrap_or_default();
    c.bench_function("minimize_lexicon", |b| {
        b.iter(|| {
            let mut fst = det.clone();
            std::hint::black_box(minimize(&mut fst))
        })
    });
}

fn bench_shortest_path(c: &mut Criterion) {
    let fst = random_dag(2000, 4, 16, 3);
    c.bench_function("shortest_path_2000", |b| {
        b.iter(|| std::hint::black_box(shortest_path(&fst)))
    });
    let config = ShortestPathConfig {
        nshortest: 10,
        ..ShortestPathConfig::default()
    };
    c.bench_function("shortest_path_10_best_2000", |b| {
        b.iter(|| std::hint::black_box(shortest_path_with_config(&fst, config)))
    });
}

fn bench_rm_epsilon(c: &mut Criterion) {
    let lexicon = word_acceptor();
    c.bench_function("rm_epsilon_lexicon", |b| {
        b.iter(|| {
            let mut fst = lexicon.clone();
            std::hint::black_box(rm_epsilon(&mut fst))
        })
    });
}

fn bench_binary_io(c: &mut Criterion) {
    let fst = random_dag(5000, 4, 64, 4);
    let data = fst.store().unwrap_or_default();
    c.bench_function("store_5000", |b| b.iter(|| std::hint::black_box(fst.store())));
    c.bench_function("load_5000", |b| {
        b.iter(|| std::hint::black_box(VectorFst::<W>::load(&data)))
    });
}

criterion_group!(
    benches,
    bench_compose,
    bench_determinize_minimize,
    bench_shortest_path,
    bench_rm_epsilon,
    bench_binary_io,
);
criterion_main!(benches);
