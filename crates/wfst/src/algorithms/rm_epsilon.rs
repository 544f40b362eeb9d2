// Epsilon removal.

use std::collections::VecDeque;

use hashbrown::HashMap;
use hashbrown::hash_map::Entry;
use log::debug;

use super::connect::connect;
use crate::fst::{Fst, VectorFst};
use crate::properties::coaccessible_states;
use crate::semiring::Semiring;
use crate::tr::Tr;
use crate::{KDELTA, Label, Result, StateId};

/// Epsilon closure of `source`: every state reachable through
/// epsilon-to-epsilon transitions, with its distance, in discovery order.
/// `source` comes first with distance `one`.
fn epsilon_closure<W: Semiring>(
    fst: &VectorFst<W>,
    source: StateId,
    delta: f32,
) -> Result<Vec<(StateId, W)>> {
    // (distance, residual)
    let mut dist: HashMap<StateId, (W, W)> = HashMap::new();
    let mut order = vec![source];
    let mut queue = VecDeque::from([source]);
    dist.insert(source, (W::one(), W::one()));

    while let Some(s) = queue.pop_front() {
        let r = match dist.get_mut(&s) {
            Some(entry) => std::mem::replace(&mut entry.1, W::zero()),
            None => continue,
        };
        if r.is_zero() {
            continue;
        }
        for tr in fst.get_trs(s)?.iter().filter(|tr| tr.is_epsilon()) {
            let w = r.times(tr.weight);
            match dist.entry(tr.nextstate) {
                Entry::Vacant(v) => {
                    v.insert((w, w));
                    order.push(tr.nextstate);
                    queue.push_back(tr.nextstate);
                }
                Entry::Occupied(mut o) => {
                    let (d, res) = o.get_mut();
                    let sum = d.plus(w);
                    if !d.approx_equal(&sum, delta) {
                        *d = sum;
                        let was_idle = res.is_zero();
                        res.plus_assign(w);
                        if was_idle {
                            queue.push_back(tr.nextstate);
                        }
                    }
                }
            }
        }
    }
    Ok(order
        .into_iter()
        .map(|s| (s, dist.get(&s).map_or(W::zero(), |e| e.0)))
        .collect())
}

/// Remove every transition whose input and output are both epsilon,
/// preserving the weighted relation. In place; the result is connected.
///
/// Each state takes over the non-epsilon transitions of its epsilon
/// closure, weighted by the closure distance. Transitions sharing
/// `(ilabel, olabel, nextstate)` are merged with `plus`, keeping the order
/// in which they were first produced.
pub fn rm_epsilon<W: Semiring>(fst: &mut VectorFst<W>) -> Result<()> {
    let n = fst.num_states();
    let mut new_trs: Vec<Vec<Tr<W>>> = Vec::with_capacity(n);
    let mut new_finals: Vec<W> = Vec::with_capacity(n);
    let mut removed = 0usize;

    for s in fst.states_iter() {
        let closure = epsilon_closure(fst, s, KDELTA)?;
        let mut trs: Vec<Tr<W>> = Vec::new();
        let mut index: HashMap<(Label, Label, StateId), usize> = HashMap::new();
        let mut final_weight = W::zero();
        for (q, d) in closure {
            for tr in fst.get_trs(q)? {
                if tr.is_epsilon() {
                    if q == s {
                        removed += 1;
                    }
                    continue;
                }
                let w = d.times(tr.weight);
                match index.entry((tr.ilabel, tr.olabel, tr.nextstate)) {
                    Entry::Occupied(e) => trs[*e.get()].weight.plus_assign(w),
                    Entry::Vacant(v) => {
                        v.insert(trs.len());
                        trs.push(Tr { weight: w, ..*tr });
                    }
                }
            }
            if let Some(f) = fst.final_weight(q)? {
                final_weight.plus_assign(d.times(f));
            }
        }
        new_trs.push(trs);
        new_finals.push(final_weight);
    }

    for (s, (trs, f)) in new_trs.into_iter().zip(new_finals).enumerate() {
        let s = s as StateId;
        fst.set_trs_unchecked(s, trs);
        if f.is_zero() {
            fst.unset_final(s)?;
        } else {
            fst.set_final_unchecked(s, f);
        }
    }
    debug!("rm_epsilon: removed {removed} epsilon transitions");
    connect(fst)
}

/// Fold epsilon transitions into final states that lead nowhere else into
/// the final weight of their source, then connect.
pub(crate) fn rm_final_epsilon<W: Semiring>(fst: &mut VectorFst<W>) -> Result<()> {
    let coaccess = coaccessible_states(fst)?;
    let mut dead_end_finals = vec![false; fst.num_states()];
    for s in fst.states_iter() {
        if fst.is_final(s)? && !fst.get_trs(s)?.iter().any(|tr| coaccess[tr.nextstate as usize]) {
            dead_end_finals[s as usize] = true;
        }
    }

    for s in fst.states_iter() {
        let mut weight = fst.final_weight(s)?.unwrap_or_else(W::zero);
        let mut kept = Vec::new();
        let mut folded = false;
        for tr in fst.get_trs(s)? {
            if tr.is_epsilon() && dead_end_finals[tr.nextstate as usize] {
                let f = fst.final_weight(tr.nextstate)?.unwrap_or_else(W::zero);
                weight.plus_assign(tr.weight.times(f));
                folded = true;
            } else {
                kept.push(*tr);
            }
        }
        if folded {
            fst.set_trs_unchecked(s, kept);
            if !weight.is_zero() {
                fst.set_final_unchecked(s, weight);
            }
        }
    }
    connect(fst)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::semiring::{LogWeight, TropicalWeight};

    type W = TropicalWeight;

    fn with_epsilons() -> VectorFst<W> {
        let mut fst = VectorFst::new();
        fst.add_states(4);
        fst.set_start(0).unwrap();
        fst.add_tr(0, Tr::new(0, 0, 1.0, 1)).unwrap();
        fst.add_tr(0, Tr::new(1, 1, 2.0, 2)).unwrap();
        fst.add_tr(1, Tr::new(1, 1, 1.0, 2)).unwrap();
        fst.add_tr(1, Tr::new(0, 0, 2.0, 3)).unwrap();
        fst.set_final(3, 0.5).unwrap();
        fst.set_final(2, 0.0).unwrap();
        fst
    }

    #[test]
    fn removes_epsilons_and_merges() {
        let mut fst = with_epsilons();
        rm_epsilon(&mut fst).unwrap();
        assert_eq!(fst.num_states(), 2);
        assert_eq!(fst.start(), Some(0));
        assert_eq!(fst.get_trs(0).unwrap(), &[Tr::new(1, 1, 2.0, 1)]);
        assert_eq!(fst.final_weight(0).unwrap(), Some(W::new(3.5)));
        assert_eq!(fst.final_weight(1).unwrap(), Some(W::one()));
        assert_eq!(fst.num_input_epsilons(0).unwrap(), 0);
    }

    #[test]
    fn one_sided_epsilons_survive() {
        let mut fst = VectorFst::<W>::new();
        fst.add_states(2);
        fst.set_start(0).unwrap();
        fst.add_tr(0, Tr::new(0, 3, 1.0, 1)).unwrap();
        fst.set_final(1, 0.0).unwrap();
        let before = fst.clone();
        rm_epsilon(&mut fst).unwrap();
        assert_eq!(fst, before);
    }

    #[test]
    fn epsilon_branches_collapse_into_finals() {
        let mut fst = VectorFst::<W>::new();
        fst.add_states(4);
        fst.set_start(0).unwrap();
        fst.add_tr(0, Tr::new(0, 2, 4.0, 1)).unwrap();
        fst.add_tr(0, Tr::new(0, 0, 6.0, 2)).unwrap();
        fst.add_tr(1, Tr::new(1, 0, 3.0, 0)).unwrap();
        fst.add_tr(1, Tr::new(0, 0, 1.0, 2)).unwrap();
        fst.add_tr(2, Tr::new(0, 0, 2.0, 3)).unwrap();
        fst.add_tr(2, Tr::new(0, 0, 4.0, 3)).unwrap();
        fst.add_tr(2, Tr::new(0, 0, 9.0, 3)).unwrap();
        fst.set_final(3, 3.0).unwrap();

        rm_epsilon(&mut fst).unwrap();
        assert_eq!(fst.num_states(), 2);
        assert_eq!(fst.get_trs(0).unwrap(), &[Tr::new(0, 2, 4.0, 1)]);
        assert_eq!(fst.get_trs(1).unwrap(), &[Tr::new(1, 0, 3.0, 0)]);
        assert_eq!(fst.final_weight(0).unwrap(), Some(W::new(11.0)));
        assert_eq!(fst.final_weight(1).unwrap(), Some(W::new(6.0)));
    }

    #[test]
    fn epsilon_cycle_terminates() {
        let mut fst = VectorFst::<W>::new();
        fst.add_states(2);
        fst.set_start(0).unwrap();
        fst.add_tr(0, Tr::new(0, 0, 1.0, 1)).unwrap();
        fst.add_tr(1, Tr::new(0, 0, 1.0, 0)).unwrap();
        fst.add_tr(1, Tr::new(2, 2, 0.5, 1)).unwrap();
        fst.set_final(1, 0.0).unwrap();
        rm_epsilon(&mut fst).unwrap();
        assert_eq!(fst.num_trs_total(), 2);
        assert_eq!(fst.final_weight(0).unwrap(), Some(W::new(1.0)));
    }

    #[test]
    fn log_paths_are_summed() {
        let mut fst = VectorFst::<LogWeight>::new();
        fst.add_states(3);
        fst.set_start(0).unwrap();
        fst.add_tr(0, Tr::new(0, 0, 1.0, 1)).unwrap();
        fst.add_tr(0, Tr::new(0, 0, 1.0, 2)).unwrap();
        fst.add_tr(1, Tr::new(0, 0, 0.0, 2)).unwrap();
        fst.set_final(2, 0.0).unwrap();
        rm_epsilon(&mut fst).unwrap();
        assert_eq!(fst.num_states(), 1);
        let f = fst.final_weight(0).unwrap().unwrap();
        assert!((f.value() - (1.0 - 2f32.ln())).abs() < 1e-4);
    }

    #[test]
    fn final_epsilons_are_folded() {
        let mut fst = VectorFst::<W>::new();
        fst.add_states(3);
        fst.set_start(0).unwrap();
        fst.add_tr(0, Tr::new(1, 1, 1.0, 1)).unwrap();
        fst.add_tr(1, Tr::new(0, 0, 2.0, 2)).unwrap();
        fst.set_final(2, 0.5).unwrap();
        rm_final_epsilon(&mut fst).unwrap();
        assert_eq!(fst.num_states(), 2);
        assert_eq!(fst.final_weight(1).unwrap(), Some(W::new(2.5)));
    }
}
