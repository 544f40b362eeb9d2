//! Transducer algorithms.
//!
//! Algorithms that rewrite a transducer in place take `&mut VectorFst`;
//! algorithms that build a new one take any [`Fst`](crate::fst::Fst) and
//! return a fresh [`VectorFst`].

pub mod closure;
pub mod compose;
pub mod concat;
pub mod connect;
pub mod determinize;
pub mod encode;
pub mod invert;
pub mod isomorphic;
pub mod minimize;
pub mod optimize;
pub mod project;
pub mod push;
pub mod randgen;
pub mod relabel;
pub mod replace;
pub mod reverse;
pub mod rm_epsilon;
pub mod shortest_distance;
pub mod shortest_path;
pub mod top_sort;
pub mod tr_sort;
pub mod tr_sum;
pub mod tr_unique;
pub mod union;
pub mod weight_convert;

pub use closure::{ClosureType, closure};
pub use concat::{concat, concat_list};
pub use connect::connect;
pub use invert::invert;
pub use isomorphic::isomorphic;
pub use optimize::{optimize, optimize_in_log};
pub use project::{ProjectType, project};
pub use relabel::{relabel_pairs, relabel_tables};
pub use reverse::reverse;
pub use rm_epsilon::rm_epsilon;
pub use top_sort::{state_sort, top_sort};
pub use tr_sort::{tr_sort, tr_sort_by};
pub use tr_sum::tr_sum;
pub use tr_unique::tr_unique;
pub use union::{union, union_list};
pub use weight_convert::weight_convert;

use crate::fst::{Fst, VectorFst};
use crate::semiring::Semiring;
use crate::tr::Tr;
use crate::{EPS_LABEL, Label, Result, StateId};

/// Whether any transition enters `state`.
pub(crate) fn has_incoming<W: Semiring, F: Fst<W>>(fst: &F, state: StateId) -> Result<bool> {
    for s in fst.states_iter() {
        if fst.get_trs(s)?.iter().any(|tr| tr.nextstate == state) {
            return Ok(true);
        }
    }
    Ok(false)
}

/// Connect `from` to `to` with transitions emitting `olabels` one at a
/// time. The first transition reads `ilabel` and carries `weight`; the
/// others read epsilon with weight `one`. An empty `olabels` gives a single
/// transition with an epsilon output.
pub(crate) fn add_output_chain<W: Semiring>(
    fst: &mut VectorFst<W>,
    from: StateId,
    ilabel: Label,
    olabels: &[Label],
    weight: W,
    to: StateId,
) {
    let Some((&last, init)) = olabels.split_last() else {
        fst.push_tr_unchecked(from, Tr::new(ilabel, EPS_LABEL, weight, to));
        return;
    };
    let mut state = from;
    let mut ilabel = ilabel;
    let mut weight = weight;
    for &olabel in init {
        let next = fst.add_state();
        fst.push_tr_unchecked(state, Tr::new(ilabel, olabel, weight, next));
        state = next;
        ilabel = EPS_LABEL;
        weight = W::one();
    }
    fst.push_tr_unchecked(state, Tr::new(ilabel, last, weight, to));
}
