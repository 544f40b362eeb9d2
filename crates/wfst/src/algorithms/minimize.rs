// Minimization of deterministic transducers.

use std::collections::VecDeque;

use hashbrown::HashMap;
use log::debug;
use serde::{Deserialize, Serialize};

use super::connect::connect;
use super::push::{PushConfig, push};
use super::tr_sum::tr_sum;
use crate::fst::{Fst, VectorFst};
use crate::properties::FstProperties;
use crate::semiring::Semiring;
use crate::tr::Tr;
use crate::{KDELTA, Label, Result, StateId, WfstError};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MinimizeConfig {
    /// Weights are compared after quantization to this step.
    pub delta: f32,
    /// Accept input that is not input-deterministic. The result is then
    /// smaller but not necessarily minimal.
    pub allow_nondet: bool,
}

impl Default for MinimizeConfig {
    fn default() -> Self {
        Self {
            delta: KDELTA,
            allow_nondet: false,
        }
    }
}

impl MinimizeConfig {
    pub fn new(delta: f32, allow_nondet: bool) -> Self {
        Self {
            delta,
            allow_nondet,
        }
    }
}

/// Transition letter: labels plus the bits of the quantized weight.
type Letter = (Label, Label, u32);

/// Number states by first occurrence of their key.
fn number_by_key<K: std::hash::Hash + Eq>(keys: impl Iterator<Item = K>) -> (Vec<usize>, usize) {
    let mut ids: HashMap<K, usize> = HashMap::new();
    let classes = keys
        .map(|k| {
            let next = ids.len();
            *ids.entry(k).or_insert(next)
        })
        .collect();
    (classes, ids.len())
}

/// Coarsest partition where equivalent states have the same final weight
/// and, letter by letter, transitions into the same classes.
///
/// Classes are split against a worklist of splitter classes. When the
/// input is deterministic only the smaller half of a split is queued.
fn partition<W: Semiring>(fst: &VectorFst<W>, deterministic: bool) -> Result<(Vec<usize>, usize)> {
    let n = fst.num_states();
    let finals = fst
        .states_iter()
        .map(|s| fst.final_weight(s).map(|f| f.map(|w| w.value().to_bits())))
        .collect::<Result<Vec<_>>>()?;
    let (mut class, nclasses) = number_by_key(finals.into_iter());
    let mut members: Vec<Vec<StateId>> = vec![Vec::new(); nclasses];
    for s in fst.states_iter() {
        members[class[s as usize]].push(s);
    }

    let mut preds: Vec<Vec<(Letter, StateId)>> = vec![Vec::new(); n];
    for s in fst.states_iter() {
        for tr in fst.get_trs(s)? {
            let letter = (tr.ilabel, tr.olabel, tr.weight.value().to_bits());
            preds[tr.nextstate as usize].push((letter, s));
        }
    }

    let mut queued = vec![true; nclasses];
    let mut worklist: VecDeque<usize> = (0..nclasses).collect();
    let mut marked = vec![false; n];
    let mut splits = 0usize;

    while let Some(splitter) = worklist.pop_front() {
        queued[splitter] = false;
        let mut by_letter: HashMap<Letter, Vec<StateId>> = HashMap::new();
        for &t in &members[splitter] {
            for &(letter, s) in &preds[t as usize] {
                by_letter.entry(letter).or_default().push(s);
            }
        }

        for sources in by_letter.into_values() {
            let mut touched = Vec::with_capacity(sources.len());
            let mut hit: HashMap<usize, Vec<StateId>> = HashMap::new();
            for s in sources {
                if !std::mem::replace(&mut marked[s as usize], true) {
                    touched.push(s);
                    hit.entry(class[s as usize]).or_default().push(s);
                }
            }
            for (c, moved) in hit {
                if moved.len() < members[c].len() {
                    members[c].retain(|s| !marked[*s as usize]);
                    let fresh = members.len();
                    for &s in &moved {
                        class[s as usize] = fresh;
                    }
                    members.push(moved);
                    splits += 1;

                    queued.push(false);
                    let halves = if queued[c] || !deterministic {
                        [Some(fresh), (!queued[c]).then_some(c)]
                    } else if members[fresh].len() <= members[c].len() {
                        [Some(fresh), None]
                    } else {
                        [Some(c), None]
                    };
                    for half in halves.into_iter().flatten() {
                        queued[half] = true;
                        worklist.push_back(half);
                    }
                }
            }
            for s in touched {
                marked[s as usize] = false;
            }
        }
    }
    debug!("minimize: {} classes after {splits} splits", members.len());
    Ok(number_by_key(class.into_iter()))
}

/// Minimize with the default configuration. In place.
pub fn minimize<W: Semiring>(fst: &mut VectorFst<W>) -> Result<()> {
    minimize_with_config(fst, MinimizeConfig::default())
}

/// Merge equivalent states of an input-deterministic transducer. In place.
///
/// Weighted input has its weights pushed toward the initial state first,
/// so states that differ only by where weight sits still merge. Label
/// pairs are compared as a whole; outputs are not pushed.
pub fn minimize_with_config<W: Semiring>(fst: &mut VectorFst<W>, config: MinimizeConfig) -> Result<()> {
    let props = fst.properties()?;
    let deterministic = props.contains(FstProperties::I_DETERMINISTIC);
    if !deterministic {
        if !config.allow_nondet {
            return Err(WfstError::NonDeterministic(
                "minimize needs an input-deterministic transducer".into(),
            ));
        }
        if !W::IDEMPOTENT {
            return Err(WfstError::UnsupportedSemiring {
                semiring: W::ARC_TYPE,
                reason: "minimizing a non-deterministic transducer needs an idempotent semiring",
            });
        }
        tr_sum(fst);
    }

    connect(fst)?;
    let Some(start) = fst.start() else {
        return Ok(());
    };
    if props.contains(FstProperties::WEIGHTED) {
        let config = PushConfig {
            delta: config.delta,
            ..PushConfig::default()
        };
        push(fst, config)?;
    }
    let delta = config.delta;
    fst.map_all_trs(|tr| tr.weight = tr.weight.quantize(delta));
    fst.map_final_weights(|_, f| {
        if let Some(w) = f {
            *w = w.quantize(delta);
        }
    });

    let (class, nclasses) = partition(fst, deterministic)?;
    if nclasses == fst.num_states() {
        return Ok(());
    }

    let mut out = VectorFst::new();
    out.add_states(nclasses);
    let mut built = vec![false; nclasses];
    for s in fst.states_iter() {
        let c = class[s as usize];
        if std::mem::replace(&mut built[c], true) {
            continue;
        }
        let trs: Vec<Tr<W>> = fst
            .get_trs(s)?
            .iter()
            .map(|tr| Tr {
                nextstate: class[tr.nextstate as usize] as StateId,
                ..*tr
            })
            .collect();
        out.set_trs_unchecked(c as StateId, trs);
        if let Some(f) = fst.final_weight(s)? {
            out.set_final_unchecked(c as StateId, f);
        }
    }
    out.set_start_unchecked(class[start as usize] as StateId);
    out.copy_symbols_from(fst);
    if !deterministic {
        tr_sum(&mut out);
    }
    debug!(
        "minimize: {} -> {} states",
        fst.num_states(),
        out.num_states()
    );
    *fst = out;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::semiring::{LogWeight, TropicalWeight};

    type W = TropicalWeight;

    #[test]
    fn merges_equivalent_suffixes() {
        let mut fst = VectorFst::<W>::new();
        fst.add_states(5);
        fst.set_start(0).unwrap();
        fst.add_tr(0, Tr::new(1, 1, 0.0, 1)).unwrap();
        fst.add_tr(0, Tr::new(2, 2, 0.0, 2)).unwrap();
        fst.add_tr(1, Tr::new(3, 3, 0.0, 3)).unwrap();
        fst.add_tr(2, Tr::new(3, 3, 0.0, 4)).unwrap();
        fst.set_final(3, 0.0).unwrap();
        fst.set_final(4, 0.0).unwrap();

        minimize(&mut fst).unwrap();
        assert_eq!(fst.num_states(), 3);
        assert_eq!(fst.num_trs_total(), 3);
        let trs0 = fst.get_trs(0).unwrap();
        assert_eq!(trs0[0].nextstate, trs0[1].nextstate);
    }

    #[test]
    fn pushes_weights_before_merging() {
        let mut fst = VectorFst::<W>::new();
        fst.add_states(4);
        fst.set_start(0).unwrap();
        fst.add_tr(0, Tr::new(1, 1, 1.0, 1)).unwrap();
        fst.add_tr(0, Tr::new(2, 2, 2.0, 2)).unwrap();
        fst.add_tr(1, Tr::new(3, 3, 1.0, 3)).unwrap();
        fst.add_tr(2, Tr::new(3, 3, 2.0, 3)).unwrap();
        fst.set_final(3, 0.0).unwrap();

        minimize(&mut fst).unwrap();
        assert_eq!(fst.num_states(), 3);
        assert_eq!(
            fst.get_trs(0).unwrap(),
            &[Tr::new(1, 1, 2.0, 1), Tr::new(2, 2, 4.0, 1)]
        );
        assert_eq!(fst.get_trs(1).unwrap(), &[Tr::new(3, 3, 0.0, 2)]);
        assert_eq!(fst.final_weight(2).unwrap(), Some(W::one()));
    }

    #[test]
    fn full_tree_collapses_to_a_chain() {
        // every string of length 6 over {1, 2}
        let depth = 6;
        let internal = (1usize << depth) - 1;
        let mut fst = VectorFst::<W>::new();
        fst.add_states(2 * internal + 1);
        fst.set_start(0).unwrap();
        for s in 0..internal {
            fst.add_tr(s as StateId, Tr::new(1, 1, 0.0, (2 * s + 1) as StateId)).unwrap();
            fst.add_tr(s as StateId, Tr::new(2, 2, 0.0, (2 * s + 2) as StateId)).unwrap();
        }
        for s in internal..fst.num_states() {
            fst.set_final(s as StateId, 0.0).unwrap();
        }

        minimize(&mut fst).unwrap();
        assert_eq!(fst.num_states(), depth + 1);
        assert_eq!(fst.num_trs_total(), 2 * depth);
        assert_eq!(fst.start(), Some(0));
        for s in 0..depth as StateId {
            assert_eq!(
                fst.get_trs(s).unwrap(),
                &[Tr::new(1, 1, 0.0, s + 1), Tr::new(2, 2, 0.0, s + 1)]
            );
        }
        assert_eq!(fst.final_weight(depth as StateId).unwrap(), Some(W::one()));
    }

    #[test]
    fn long_chain_stays_distinct() {
        let len = 300;
        let mut fst = VectorFst::<W>::new();
        fst.add_states(len + 1);
        fst.set_start(0).unwrap();
        for s in 0..len as StateId {
            fst.add_tr(s, Tr::new(1, 1, 0.0, s + 1)).unwrap();
        }
        fst.set_final(len as StateId, 0.0).unwrap();
        minimize(&mut fst).unwrap();
        assert_eq!(fst.num_states(), len + 1);
        assert_eq!(fst.num_trs_total(), len);
        assert_eq!(fst.final_weight(len as StateId).unwrap(), Some(W::one()));
    }

    #[test]
    fn different_outputs_stay_apart() {
        let mut fst = VectorFst::<W>::new();
        fst.add_states(4);
        fst.set_start(0).unwrap();
        fst.add_tr(0, Tr::new(1, 1, 0.0, 1)).unwrap();
        fst.add_tr(0, Tr::new(2, 2, 0.0, 2)).unwrap();
        fst.add_tr(1, Tr::new(3, 4, 0.0, 3)).unwrap();
        fst.add_tr(2, Tr::new(3, 5, 0.0, 3)).unwrap();
        fst.set_final(3, 0.0).unwrap();
        minimize(&mut fst).unwrap();
        assert_eq!(fst.num_states(), 4);
    }

    #[test]
    fn non_deterministic_input() {
        let mut fst = VectorFst::<W>::new();
        fst.add_states(3);
        fst.set_start(0).unwrap();
        fst.add_tr(0, Tr::new(1, 1, 0.0, 1)).unwrap();
        fst.add_tr(0, Tr::new(1, 1, 0.0, 2)).unwrap();
        fst.set_final(1, 0.0).unwrap();
        fst.set_final(2, 0.0).unwrap();

        let mut strict = fst.clone();
        assert!(matches!(
            minimize(&mut strict),
            Err(WfstError::NonDeterministic(_))
        ));

        minimize_with_config(&mut fst, MinimizeConfig::new(KDELTA, true)).unwrap();
        assert_eq!(fst.num_states(), 2);
        assert_eq!(fst.get_trs(0).unwrap(), &[Tr::new(1, 1, 0.0, 1)]);

        let mut log = VectorFst::<LogWeight>::new();
        log.add_states(2);
        log.set_start(0).unwrap();
        log.add_tr(0, Tr::new(1, 1, 0.0, 1)).unwrap();
        log.add_tr(0, Tr::new(1, 1, 0.0, 1)).unwrap();
        log.set_final(1, 0.0).unwrap();
        assert!(matches!(
            minimize_with_config(&mut log, MinimizeConfig::new(KDELTA, true)),
            Err(WfstError::UnsupportedSemiring { .. })
        ));
    }
}
