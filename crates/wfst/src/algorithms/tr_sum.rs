// Merging of parallel transitions.

use std::cmp::Ordering;

use crate::fst::{Fst, VectorFst};
use crate::semiring::Semiring;
use crate::tr::{Tr, cmp_labels_next};

/// Sort each state's transitions by `(ilabel, olabel, nextstate)` and
/// merge those sharing all three, combining their weights with `plus`.
pub fn tr_sum<W: Semiring>(fst: &mut VectorFst<W>) {
    for s in fst.states_iter() {
        fst.modify_trs(s, |trs| {
            trs.sort_by(cmp_labels_next);
            let mut merged: Vec<Tr<W>> = Vec::with_capacity(trs.len());
            for tr in trs.drain(..) {
                match merged.last_mut() {
                    Some(last) if cmp_labels_next(last, &tr) == Ordering::Equal => {
                        last.weight.plus_assign(tr.weight);
                    }
                    _ => merged.push(tr),
                }
            }
            *trs = merged;
        });
    }
}
