// Concatenation of two languages.

use super::union::append_states;
use crate::fst::{Fst, VectorFst};
use crate::semiring::Semiring;
use crate::tr::Tr;
use crate::{EPS_LABEL, Result};

/// Make `a` accept every string of `a` followed by a string of `b`. Each
/// final state of `a` gets an epsilon transition carrying its final weight
/// into `b`'s start, and stops being final. In place on `a`.
pub fn concat<W: Semiring, F: Fst<W>>(a: &mut VectorFst<W>, b: &F) -> Result<()> {
    if a.start().is_none() {
        return Ok(());
    }
    let finals = a.final_states()?;
    let offset = append_states(a, b)?;
    for s in finals {
        if let Some(w) = a.take_final_weight(s)? {
            if let Some(start_b) = b.start() {
                a.push_tr_unchecked(s, Tr::new(EPS_LABEL, EPS_LABEL, w, start_b + offset));
            }
        }
    }
    Ok(())
}

/// Concatenation of a sequence of transducers, folded left to right. An
/// empty sequence gives the transducer accepting only the empty string.
pub fn concat_list<W: Semiring, F: Fst<W>>(fsts: &[F]) -> Result<VectorFst<W>> {
    let mut iter = fsts.iter();
    let mut out = match iter.next() {
        Some(first) => VectorFst::from_fst(first)?,
        None => return Ok(crate::fst::acceptor(&[], W::one())),
    };
    for fst in iter {
        concat(&mut out, fst)?;
    }
    Ok(out)
}
