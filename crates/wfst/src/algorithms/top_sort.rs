// Topological sort and state renumbering.

use crate::fst::{Fst, VectorFst};
use crate::semiring::Semiring;
use crate::{NO_STATE_ID, Result, StateId, WfstError};

/// Topological position of every state, or `None` if the transducer has a
/// cycle. States are visited depth first from the start state, then from
/// the remaining states in id order.
pub(crate) fn top_order<W: Semiring, F: Fst<W>>(fst: &F) -> Result<Option<Vec<StateId>>> {
    #[derive(Clone, Copy, PartialEq)]
    enum Color {
        White,
        Grey,
        Black,
    }
    let n = fst.num_states();
    let mut color = vec![Color::White; n];
    let mut finished: Vec<StateId> = Vec::with_capacity(n);
    let roots = fst
        .start()
        .into_iter()
        .chain(fst.states_iter().filter(|&s| Some(s) != fst.start()));

    for root in roots {
        if color[root as usize] != Color::White {
            continue;
        }
        color[root as usize] = Color::Grey;
        let mut stack: Vec<(StateId, usize)> = vec![(root, 0)];
        while let Some(frame) = stack.last_mut() {
            let (s, pos) = *frame;
            let trs = fst.get_trs(s)?;
            if pos < trs.len() {
                frame.1 += 1;
                let next = trs[pos].nextstate;
                match color[next as usize] {
                    Color::White => {
                        color[next as usize] = Color::Grey;
                        stack.push((next, 0));
                    }
                    Color::Grey => return Ok(None),
                    Color::Black => {}
                }
            } else {
                color[s as usize] = Color::Black;
                finished.push(s);
                stack.pop();
            }
        }
    }

    let mut order = vec![NO_STATE_ID; n];
    for (pos, &s) in finished.iter().rev().enumerate() {
        order[s as usize] = pos as StateId;
    }
    Ok(Some(order))
}

/// Renumber states so that every transition goes from a lower to a higher
/// id. Fails with [`WfstError::Cyclic`] on a cyclic transducer, which is
/// then left untouched.
pub fn top_sort<W: Semiring>(fst: &mut VectorFst<W>) -> Result<()> {
    let order = top_order(fst)?.ok_or(WfstError::Cyclic)?;
    state_sort(fst, &order)
}

/// Renumber states: state `s` becomes `order[s]`. `order` must be a
/// permutation of the state ids.
pub fn state_sort<W: Semiring>(fst: &mut VectorFst<W>, order: &[StateId]) -> Result<()> {
    let n = fst.num_states();
    if order.len() != n {
        return Err(WfstError::InvalidConfig(format!(
            "state order has {} entries for {n} states",
            order.len()
        )));
    }
    let mut seen = vec![false; n];
    for &o in order {
        if o as usize >= n || seen[o as usize] {
            return Err(WfstError::InvalidConfig(format!(
                "state order is not a permutation (entry {o})"
            )));
        }
        seen[o as usize] = true;
    }

    let mut finals = vec![None; n];
    let mut trs_by_state = vec![Vec::new(); n];
    for s in 0..n as StateId {
        let new_id = order[s as usize] as usize;
        finals[new_id] = fst.final_weight(s)?;
        let mut trs = fst.pop_trs(s)?;
        for tr in &mut trs {
            tr.nextstate = order[tr.nextstate as usize];
        }
        trs_by_state[new_id] = trs;
    }
    let start = fst.start().map(|s| order[s as usize]);

    fst.del_all_states();
    fst.add_states(n);
    for (s, (trs, final_weight)) in trs_by_state.into_iter().zip(finals).enumerate() {
        fst.set_trs_unchecked(s as StateId, trs);
        if let Some(w) = final_weight {
            fst.set_final_unchecked(s as StateId, w);
        }
    }
    if let Some(s) = start {
        fst.set_start_unchecked(s);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::properties::FstProperties;
    use crate::semiring::TropicalWeight;
    use crate::tr::Tr;

    type W = TropicalWeight;

    #[test]
    fn sorts_acyclic_fst() {
        let mut fst = VectorFst::<W>::new();
        fst.add_states(4);
        fst.set_start(2).unwrap();
        fst.add_tr(2, Tr::new(1, 1, 0.0, 0)).unwrap();
        fst.add_tr(0, Tr::new(2, 2, 0.0, 3)).unwrap();
        fst.add_tr(2, Tr::new(3, 3, 1.0, 3)).unwrap();
        fst.add_tr(3, Tr::new(4, 4, 0.0, 1)).unwrap();
        fst.set_final(1, 0.5).unwrap();

        top_sort(&mut fst).unwrap();
        assert_eq!(fst.start(), Some(0));
        let props = fst.properties().unwrap();
        assert!(props.contains(FstProperties::TOP_SORTED));
        assert_eq!(fst.final_weight(3).unwrap(), Some(W::new(0.5)));
        assert_eq!(fst.num_trs_total(), 4);
    }

    #[test]
    fn cyclic_fst_is_rejected_untouched() {
        let mut fst = VectorFst::<W>::new();
        fst.add_states(2);
        fst.set_start(1).unwrap();
        fst.add_tr(1, Tr::new(1, 1, 0.0, 0)).unwrap();
        fst.add_tr(0, Tr::new(1, 1, 0.0, 1)).unwrap();
        let before = fst.clone();
        let err = top_sort(&mut fst).unwrap_err();
        assert!(matches!(err, WfstError::Cyclic));
        assert_eq!(fst, before);
    }

    #[test]
    fn state_sort_validates_permutation() {
        let mut fst = VectorFst::<W>::new();
        fst.add_states(2);
        assert!(state_sort(&mut fst, &[0]).is_err());
        assert!(state_sort(&mut fst, &[1, 1]).is_err());
        fst.set_start(0).unwrap();
        fst.add_tr(0, Tr::new(5, 5, 0.0, 1)).unwrap();
        state_sort(&mut fst, &[1, 0]).unwrap();
        assert_eq!(fst.start(), Some(1));
        assert_eq!(fst.get_trs(1).unwrap()[0].nextstate, 0);
    }
}
