// Random path generation.

use std::collections::BTreeMap;

use log::debug;
use rand::distributions::WeightedIndex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use super::connect::connect;
use super::shortest_path::add_linear_paths;
use crate::fst::{Fst, VectorFst};
use crate::semiring::Semiring;
use crate::tr::Tr;
use crate::{Result, StateId};

/// How the next move is drawn at each state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum RandGenSelector {
    /// Every transition, and finality, is equally likely.
    #[default]
    Uniform,
    /// Probability proportional to `exp(-w)` of the transition or final
    /// weight.
    LogProb,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandGenConfig {
    /// Number of paths to sample.
    pub npath: usize,
    /// Seed for the generator; `0` draws one from the OS.
    pub seed: u64,
    /// Samples longer than this are dropped.
    pub max_length: usize,
    pub selector: RandGenSelector,
    /// Merge identical samples into a tree weighted by sample frequency
    /// instead of returning one path per sample.
    pub weighted: bool,
    /// In weighted output, normalize path weights to probabilities
    /// (`-ln(count / npath)`) rather than counts (`-ln(count)`).
    pub remove_total_weight: bool,
}

impl Default for RandGenConfig {
    fn default() -> Self {
        Self {
            npath: 1,
            seed: 0,
            max_length: usize::MAX,
            selector: RandGenSelector::Uniform,
            weighted: false,
            remove_total_weight: false,
        }
    }
}

impl RandGenConfig {
    pub fn new(npath: usize, seed: u64) -> Self {
        Self {
            npath,
            seed,
            ..Default::default()
        }
    }
}

/// A node of the sample tree: `nsamples` draws standing at `state` after
/// `length` transitions.
struct Sample {
    state: StateId,
    nsamples: usize,
    length: usize,
}

struct Sampler {
    rng: StdRng,
    selector: RandGenSelector,
}

impl Sampler {
    /// Draw `n` moves from `state`. Index `trs.len()` stands for stopping
    /// at the final weight. `None` when the state has nowhere to go.
    fn sample<W: Semiring>(
        &mut self,
        trs: &[Tr<W>],
        final_weight: Option<W>,
        n: usize,
    ) -> Option<BTreeMap<usize, usize>> {
        let candidates = trs.len() + usize::from(final_weight.is_some());
        if candidates == 0 {
            return None;
        }
        let mut counts = BTreeMap::new();
        match self.selector {
            RandGenSelector::Uniform => {
                for _ in 0..n {
                    *counts.entry(self.rng.gen_range(0..candidates)).or_insert(0) += 1;
                }
            }
            RandGenSelector::LogProb => {
                let probs = trs
                    .iter()
                    .map(|tr| tr.weight)
                    .chain(final_weight)
                    .map(|w| f64::from(-w.value()).exp());
                // All weights zero: nothing can be drawn.
                let dist = WeightedIndex::new(probs).ok()?;
                for _ in 0..n {
                    *counts.entry(self.rng.sample(&dist)).or_insert(0) += 1;
                }
            }
        }
        Some(counts)
    }
}

/// Sample random accepting paths of `fst`.
///
/// Paths that reach a dead end or exceed `max_length` are dropped, so the
/// result may hold fewer than `npath` paths. Without `weighted` every
/// accepted sample becomes its own linear path of weight `one`; with it,
/// identical prefixes are shared and weighted by `-ln` of their sample
/// frequency.
pub fn randgen<W: Semiring, F: Fst<W>>(fst: &F, config: &RandGenConfig) -> Result<VectorFst<W>> {
    let rng = if config.seed == 0 {
        StdRng::from_entropy()
    } else {
        StdRng::seed_from_u64(config.seed)
    };
    let mut sampler = Sampler {
        rng,
        selector: config.selector,
    };

    // Tree of samples; `final_counts[t]` is how many draws stopped at `t`.
    let mut tree = VectorFst::<W>::new();
    let mut final_counts: Vec<usize> = Vec::new();
    let mut nodes: Vec<Sample> = Vec::new();
    if let Some(start) = fst.start().filter(|_| config.npath > 0) {
        tree.add_state();
        tree.set_start_unchecked(0);
        final_counts.push(0);
        nodes.push(Sample {
            state: start,
            nsamples: config.npath,
            length: 0,
        });
    }

    let mut id = 0;
    while id < nodes.len() {
        let Sample {
            state,
            nsamples,
            length,
        } = nodes[id];
        let trs = fst.get_trs(state)?;
        let final_weight = fst.final_weight(state)?;
        let counts = if length == config.max_length {
            None
        } else {
            sampler.sample(trs, final_weight, nsamples)
        };
        for (pos, count) in counts.into_iter().flatten() {
            let Some(tr) = trs.get(pos) else {
                final_counts[id] = count;
                continue;
            };
            let child = tree.add_state();
            let prob = count as f32 / nsamples as f32;
            tree.push_tr_unchecked(
                id as StateId,
                Tr::new(tr.ilabel, tr.olabel, W::new(-prob.ln()), child),
            );
            final_counts.push(0);
            nodes.push(Sample {
                state: tr.nextstate,
                nsamples: count,
                length: length + 1,
            });
        }
        id += 1;
    }

    let accepted: usize = final_counts.iter().sum();
    debug!(
        "randgen: {accepted} of {} samples accepted, {} tree states",
        config.npath,
        tree.num_states()
    );

    let mut out = if config.weighted {
        let scale = if config.remove_total_weight {
            1.0
        } else {
            config.npath as f32
        };
        for (t, &count) in final_counts.iter().enumerate() {
            if count > 0 {
                let prob = count as f32 / nodes[t].nsamples as f32;
                tree.set_final_unchecked(t as StateId, W::new(-(prob * scale).ln()));
            }
        }
        connect(&mut tree)?;
        tree
    } else {
        let mut paths = Vec::with_capacity(accepted);
        collect_paths(&tree, &final_counts, &mut paths)?;
        let mut out = VectorFst::new();
        add_linear_paths(&mut out, paths);
        out
    };
    out.copy_symbols_from(fst);
    Ok(out)
}

/// Expand the sample tree into one unweighted path per accepted draw.
fn collect_paths<W: Semiring>(
    tree: &VectorFst<W>,
    final_counts: &[usize],
    paths: &mut Vec<(Vec<Tr<W>>, W)>,
) -> Result<()> {
    let Some(start) = tree.start() else {
        return Ok(());
    };
    let mut stack: Vec<(StateId, Vec<Tr<W>>)> = vec![(start, Vec::new())];
    while let Some((t, prefix)) = stack.pop() {
        for _ in 0..final_counts[t as usize] {
            paths.push((prefix.clone(), W::one()));
        }
        for tr in tree.get_trs(t)? {
            let mut next = prefix.clone();
            next.push(Tr::new(tr.ilabel, tr.olabel, W::one(), tr.nextstate));
            stack.push((tr.nextstate, next));
        }
    }
    Ok(())
}
