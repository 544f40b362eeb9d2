// Single-source shortest distance over a semiring.
//
// Generic relaxation: each state keeps a distance `d` and a residual `r`
// (the weight added to `d` since the state was last expanded). Expanding a
// state pushes `r ⊗ w` along every transition; a destination is queued
// again only while its distance still moves by more than `delta`. This
// terminates for k-closed semirings such as tropical and log.

use std::collections::VecDeque;

use log::trace;
use serde::{Deserialize, Serialize};

use crate::fst::{Fst, VectorFst};
use crate::semiring::Semiring;
use crate::tr::Tr;
use crate::{EPS_LABEL, KDELTA, Result, StateId};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ShortestDistanceConfig {
    /// Convergence tolerance.
    pub delta: f32,
    /// Source state; `None` means the start state.
    pub source: Option<StateId>,
}

impl Default for ShortestDistanceConfig {
    fn default() -> Self {
        Self {
            delta: KDELTA,
            source: None,
        }
    }
}

impl ShortestDistanceConfig {
    pub fn new(delta: f32, source: Option<StateId>) -> Self {
        Self { delta, source }
    }
}

/// Relaxation from `source` following only transitions accepted by
/// `follow`. Returns the distances and the states in the order they were
/// first reached.
pub(crate) fn relax_from<W, F, P>(
    fst: &F,
    source: StateId,
    delta: f32,
    follow: P,
) -> Result<(Vec<W>, Vec<StateId>)>
where
    W: Semiring,
    F: Fst<W>,
    P: Fn(&Tr<W>) -> bool,
{
    let n = fst.num_states();
    let mut distance = vec![W::zero(); n];
    let mut residual = vec![W::zero(); n];
    let mut queued = vec![false; n];
    let mut order = vec![source];
    let mut queue = VecDeque::from([source]);

    // Validates `source`.
    fst.get_trs(source)?;
    distance[source as usize] = W::one();
    residual[source as usize] = W::one();
    queued[source as usize] = true;

    while let Some(s) = queue.pop_front() {
        queued[s as usize] = false;
        let r = std::mem::replace(&mut residual[s as usize], W::zero());
        for tr in fst.get_trs(s)?.iter().filter(|tr| follow(tr)) {
            let next = tr.nextstate as usize;
            let w = r.times(tr.weight);
            let old = distance[next];
            let sum = old.plus(w);
            if !old.approx_equal(&sum, delta) {
                if old.is_zero() {
                    order.push(tr.nextstate);
                }
                distance[next] = sum;
                residual[next].plus_assign(w);
                if !queued[next] {
                    queued[next] = true;
                    queue.push_back(tr.nextstate);
                }
            }
        }
    }
    trace!("shortest distance from {source}: {} states reached", order.len());
    Ok((distance, order))
}

/// Distance from the configured source to every state. Unreachable states
/// get `zero`; a transducer without start gives all `zero`.
pub fn shortest_distance_with_config<W, F>(fst: &F, config: ShortestDistanceConfig) -> Result<Vec<W>>
where
    W: Semiring,
    F: Fst<W>,
{
    let Some(source) = config.source.or(fst.start()) else {
        return Ok(vec![W::zero(); fst.num_states()]);
    };
    let (distance, _) = relax_from(fst, source, config.delta, |_| true)?;
    Ok(distance)
}

/// Forward distances from the start (`reverse = false`), or for each state
/// the total weight of its paths to a final state, final weight included
/// (`reverse = true`).
pub fn shortest_distance<W, F>(fst: &F, reverse_distance: bool) -> Result<Vec<W>>
where
    W: Semiring,
    F: Fst<W>,
{
    if reverse_distance {
        reverse_shortest_distance(fst, KDELTA)
    } else {
        shortest_distance_with_config(fst, ShortestDistanceConfig::default())
    }
}

/// For each state, the total weight of its paths to a final state.
pub(crate) fn reverse_shortest_distance<W, F>(fst: &F, delta: f32) -> Result<Vec<W>>
where
    W: Semiring,
    F: Fst<W>,
{
    // Distances on the reversed graph from a super-initial state 0 that
    // reaches every final state; state `s` there is `s + 1`.
    let n = fst.num_states();
    let mut reversed = VectorFst::<W>::new();
    reversed.add_states(n + 1);
    for s in fst.states_iter() {
        if let Some(w) = fst.final_weight(s)? {
            reversed.push_tr_unchecked(0, Tr::new(EPS_LABEL, EPS_LABEL, w.reverse(), s + 1));
        }
        for tr in fst.get_trs(s)? {
            reversed.push_tr_unchecked(
                tr.nextstate + 1,
                Tr::new(tr.ilabel, tr.olabel, tr.weight.reverse(), s + 1),
            );
        }
    }
    let (rdist, _) = relax_from(&reversed, 0, delta, |_| true)?;
    Ok(rdist[1..].iter().map(|w| w.reverse()).collect())
}

/// Total weight of all accepting paths.
pub fn shortest_distance_total<W, F>(fst: &F) -> Result<W>
where
    W: Semiring,
    F: Fst<W>,
{
    let Some(start) = fst.start() else {
        return Ok(W::zero());
    };
    let distance = shortest_distance(fst, true)?;
    Ok(distance[start as usize])
}
