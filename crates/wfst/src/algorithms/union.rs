// Union of two languages.

use super::has_incoming;
use crate::fst::{Fst, VectorFst};
use crate::semiring::Semiring;
use crate::tr::Tr;
use crate::{EPS_LABEL, Result, StateId};

/// Append the states of `b` to `a`, shifted by `a.num_states()`. Returns
/// the offset.
pub(crate) fn append_states<W: Semiring, F: Fst<W>>(a: &mut VectorFst<W>, b: &F) -> Result<StateId> {
    let offset = a.num_states() as StateId;
    a.reserve_states(b.num_states());
    for s in b.states_iter() {
        let new_state = a.add_state();
        let trs = b
            .get_trs(s)?
            .iter()
            .map(|tr| Tr {
                nextstate: tr.nextstate + offset,
                ..*tr
            })
            .collect();
        a.set_trs_unchecked(new_state, trs);
        if let Some(w) = b.final_weight(s)? {
            a.set_final_unchecked(new_state, w);
        }
    }
    Ok(offset)
}

/// Make `a` accept the union of both languages. In place on `a`.
///
/// If nothing enters `a`'s start, an epsilon transition from it to `b`'s
/// start is added; otherwise a new start state branches to both.
pub fn union<W: Semiring, F: Fst<W>>(a: &mut VectorFst<W>, b: &F) -> Result<()> {
    let Some(start_b) = b.start() else {
        return Ok(());
    };
    let start_entered = match a.start() {
        Some(start_a) => has_incoming(a, start_a)?,
        None => false,
    };
    let offset = append_states(a, b)?;
    let start_b = start_b + offset;
    match a.start() {
        None => a.set_start_unchecked(start_b),
        Some(start_a) if !start_entered => {
            a.push_tr_unchecked(start_a, Tr::new(EPS_LABEL, EPS_LABEL, W::one(), start_b));
        }
        Some(start_a) => {
            let new_start = a.add_state();
            a.push_tr_unchecked(new_start, Tr::new(EPS_LABEL, EPS_LABEL, W::one(), start_a));
            a.push_tr_unchecked(new_start, Tr::new(EPS_LABEL, EPS_LABEL, W::one(), start_b));
            a.set_start_unchecked(new_start);
        }
    }
    Ok(())
}

/// Union of a sequence of transducers, folded left to right. An empty
/// sequence gives the empty transducer.
pub fn union_list<W: Semiring, F: Fst<W>>(fsts: &[F]) -> Result<VectorFst<W>> {
    let mut iter = fsts.iter();
    let mut out = match iter.next() {
        Some(first) => VectorFst::from_fst(first)?,
        None => return Ok(VectorFst::new()),
    };
    for fst in iter {
        union(&mut out, fst)?;
    }
    Ok(out)
}
