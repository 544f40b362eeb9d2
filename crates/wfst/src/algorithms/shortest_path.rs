// N-best paths.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use log::debug;
use serde::{Deserialize, Serialize};

use super::determinize::determinize;
use super::encode::{EncodeType, decode, encode};
use super::rm_epsilon::rm_epsilon;
use super::shortest_distance::reverse_shortest_distance;
use crate::fst::{Fst, VectorFst};
use crate::semiring::Semiring;
use crate::tr::Tr;
use crate::{KDELTA, Result, StateId, WfstError};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ShortestPathConfig {
    /// Number of paths to keep.
    pub nshortest: usize,
    /// Keep at most one path per label sequence.
    pub unique: bool,
    pub delta: f32,
}

impl Default for ShortestPathConfig {
    fn default() -> Self {
        Self {
            nshortest: 1,
            unique: false,
            delta: KDELTA,
        }
    }
}

impl ShortestPathConfig {
    pub fn new(nshortest: usize, unique: bool, delta: f32) -> Self {
        Self {
            nshortest,
            unique,
            delta,
        }
    }
}

/// A path prefix explored by the search.
struct Node<W> {
    state: StateId,
    parent: Option<usize>,
    tr: Option<Tr<W>>,
    weight: W,
}

/// Heap entry; the heap pops the lowest priority first, then the earliest
/// pushed.
struct Candidate {
    priority: f32,
    seq: usize,
    node: usize,
    complete: bool,
}

impl PartialEq for Candidate {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Candidate {}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .priority
            .total_cmp(&self.priority)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

/// Build the union of linear paths sharing one start state. Each path is
/// its transitions (destinations are ignored) and its final weight.
pub(crate) fn add_linear_paths<W: Semiring>(out: &mut VectorFst<W>, paths: Vec<(Vec<Tr<W>>, W)>) {
    if paths.is_empty() {
        return;
    }
    let start = out.add_state();
    out.set_start_unchecked(start);
    for (trs, final_weight) in paths {
        let mut state = start;
        for tr in trs {
            let next = out.add_state();
            out.push_tr_unchecked(state, Tr { nextstate: next, ..tr });
            state = next;
        }
        out.set_final_unchecked(state, final_weight);
    }
}

fn n_best<W: Semiring, F: Fst<W>>(fst: &F, n: usize, delta: f32) -> Result<Vec<(Vec<Tr<W>>, W)>> {
    let Some(start) = fst.start() else {
        return Ok(Vec::new());
    };
    let distance = reverse_shortest_distance(fst, delta)?;
    if distance[start as usize].is_zero() {
        return Ok(Vec::new());
    }

    let mut nodes = vec![Node {
        state: start,
        parent: None,
        tr: None,
        weight: W::one(),
    }];
    let mut heap = BinaryHeap::new();
    let mut seq = 0usize;
    heap.push(Candidate {
        priority: distance[start as usize].value(),
        seq,
        node: 0,
        complete: false,
    });
    let mut visits = vec![0usize; fst.num_states()];
    let mut found: Vec<(usize, W)> = Vec::new();

    while let Some(candidate) = heap.pop() {
        let node_id = candidate.node;
        let (state, prefix) = (nodes[node_id].state, nodes[node_id].weight);
        if candidate.complete {
            let final_weight = fst.final_weight(state)?.unwrap_or_else(W::zero);
            found.push((node_id, final_weight));
            if found.len() == n {
                break;
            }
            continue;
        }
        if visits[state as usize] >= n {
            continue;
        }
        visits[state as usize] += 1;

        if let Some(f) = fst.final_weight(state)? {
            seq += 1;
            heap.push(Candidate {
                priority: prefix.times(f).value(),
                seq,
                node: node_id,
                complete: true,
            });
        }
        for tr in fst.get_trs(state)? {
            let rest = distance[tr.nextstate as usize];
            if rest.is_zero() {
                continue;
            }
            let weight = prefix.times(tr.weight);
            nodes.push(Node {
                state: tr.nextstate,
                parent: Some(node_id),
                tr: Some(*tr),
                weight,
            });
            seq += 1;
            heap.push(Candidate {
                priority: weight.times(rest).value(),
                seq,
                node: nodes.len() - 1,
                complete: false,
            });
        }
    }
    debug!("shortest_path: {} paths from {} search nodes", found.len(), nodes.len());

    Ok(found
        .into_iter()
        .map(|(leaf, final_weight)| {
            let mut trs = Vec::new();
            let mut cursor = Some(leaf);
            while let Some(id) = cursor {
                trs.extend(nodes[id].tr);
                cursor = nodes[id].parent;
            }
            trs.reverse();
            (trs, final_weight)
        })
        .collect())
}

/// The single best path, as a linear transducer starting at state 0.
pub fn shortest_path<W: Semiring, F: Fst<W>>(fst: &F) -> Result<VectorFst<W>> {
    shortest_path_with_config(fst, ShortestPathConfig::default())
}

/// The `nshortest` best accepting paths, best first, sharing a start
/// state. Ties keep the order in which the search reached them.
///
/// Fails with [`WfstError::UnsupportedSemiring`] unless `plus` always
/// picks one of its operands.
pub fn shortest_path_with_config<W, F>(fst: &F, config: ShortestPathConfig) -> Result<VectorFst<W>>
where
    W: Semiring,
    F: Fst<W>,
{
    if !W::PATH {
        return Err(WfstError::UnsupportedSemiring {
            semiring: W::ARC_TYPE,
            reason: "shortest path needs the path property",
        });
    }
    let mut out = VectorFst::new();
    out.copy_symbols_from(fst);
    if config.nshortest == 0 {
        return Ok(out);
    }
    if !config.unique {
        add_linear_paths(&mut out, n_best(fst, config.nshortest, config.delta)?);
        return Ok(out);
    }

    // One path per label sequence: determinize over label pairs first.
    let mut work = VectorFst::from_fst(fst)?;
    let table = encode(&mut work, EncodeType::Labels)?;
    rm_epsilon(&mut work)?;
    let det = determinize(&work)?;
    add_linear_paths(&mut out, n_best(&det, config.nshortest, config.delta)?);
    decode(&mut out, &table)?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::semiring::{LogWeight, TropicalWeight};

    type W = TropicalWeight;

    fn diamond() -> VectorFst<W> {
        let mut fst = VectorFst::new();
        fst.add_states(4);
        fst.set_start(0).unwrap();
        fst.add_tr(0, Tr::new(1, 1, 3.0, 1)).unwrap();
        fst.add_tr(0, Tr::new(2, 2, 5.0, 2)).unwrap();
        fst.add_tr(1, Tr::new(4, 4, 2.0, 2)).unwrap();
        fst.add_tr(1, Tr::new(3, 3, 4.0, 3)).unwrap();
        fst.add_tr(2, Tr::new(3, 3, 4.0, 3)).unwrap();
        fst.set_final(3, 2.0).unwrap();
        fst
    }

    #[test]
    fn single_best_path() {
        let best = shortest_path(&diamond()).unwrap();
        assert_eq!(best.num_states(), 3);
        assert_eq!(best.start(), Some(0));
        assert_eq!(best.get_trs(0).unwrap(), &[Tr::new(1, 1, 3.0, 1)]);
        assert_eq!(best.get_trs(1).unwrap(), &[Tr::new(3, 3, 4.0, 2)]);
        assert_eq!(best.final_weight(2).unwrap(), Some(W::new(2.0)));
    }

    #[test]
    fn unique_single_best_path_is_the_same_path() {
        let unique = ShortestPathConfig::new(1, true, KDELTA);
        let best = shortest_path_with_config(&diamond(), unique).unwrap();
        assert_eq!(best.num_states(), 3);
        assert_eq!(best.start(), Some(0));
        assert_eq!(best.get_trs(0).unwrap(), &[Tr::new(1, 1, 3.0, 1)]);
        assert_eq!(best.get_trs(1).unwrap(), &[Tr::new(3, 3, 4.0, 2)]);
        assert_eq!(best.get_trs(2).unwrap(), &[]);
        assert_eq!(best.final_weight(0).unwrap(), None);
        assert_eq!(best.final_weight(1).unwrap(), None);
        assert_eq!(best.final_weight(2).unwrap(), Some(W::new(2.0)));
    }

    #[test]
    fn two_best_paths_break_ties_by_discovery() {
        let config = ShortestPathConfig::new(2, false, KDELTA);
        let best = shortest_path_with_config(&diamond(), config).unwrap();
        assert_eq!(best.num_states(), 5);
        let paths: Vec<_> = best.paths_iter().collect();
        assert_eq!(paths.len(), 2);
        assert_eq!(paths[0].ilabels, vec![1, 3]);
        assert_eq!(paths[0].weight, W::new(9.0));
        assert_eq!(paths[1].ilabels, vec![2, 3]);
        assert_eq!(paths[1].weight, W::new(11.0));
    }

    #[test]
    fn unique_drops_duplicate_strings() {
        let mut fst = VectorFst::<W>::new();
        fst.add_states(2);
        fst.set_start(0).unwrap();
        fst.add_tr(0, Tr::new(1, 1, 1.0, 1)).unwrap();
        fst.add_tr(0, Tr::new(1, 1, 2.0, 1)).unwrap();
        fst.add_tr(0, Tr::new(2, 2, 4.0, 1)).unwrap();
        fst.set_final(1, 0.0).unwrap();

        let plain = shortest_path_with_config(&fst, ShortestPathConfig::new(2, false, KDELTA)).unwrap();
        let weights: Vec<f32> = plain.paths_iter().map(|p| p.weight.value()).collect();
        assert_eq!(weights.len(), 2);

        let unique = shortest_path_with_config(&fst, ShortestPathConfig::new(2, true, KDELTA)).unwrap();
        let mut paths: Vec<_> = unique.paths_iter().map(|p| (p.ilabels, p.weight.value())).collect();
        paths.sort_by(|a, b| a.1.total_cmp(&b.1));
        assert_eq!(paths, vec![(vec![1], 1.0), (vec![2], 4.0)]);
    }

    #[test]
    fn degenerate_requests() {
        let none = shortest_path_with_config(&diamond(), ShortestPathConfig::new(0, false, KDELTA)).unwrap();
        assert_eq!(none.num_states(), 0);
        let empty = shortest_path(&VectorFst::<W>::new()).unwrap();
        assert_eq!(empty.num_states(), 0);

        let log = VectorFst::<LogWeight>::new();
        assert!(matches!(
            shortest_path(&log),
            Err(WfstError::UnsupportedSemiring { .. })
        ));
    }
}
