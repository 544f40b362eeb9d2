// Transducer representations and the read-only traversal trait.
//
// Two representations form a closed set: `VectorFst` (mutable, one
// transition vector per state) and `ConstFst` (immutable, one contiguous
// transition buffer). Both implement `Fst`; only `VectorFst` can be
// mutated, so algorithms that work in place take `&mut VectorFst<W>`.

mod const_fst;
mod vector_fst;

use std::fmt::Debug;
use std::ops::Range;
use std::sync::Arc;

pub use const_fst::ConstFst;
pub use vector_fst::{TrsIterMut, VectorFst};

use crate::paths::{PathsIterator, StringPathsIterator};
use crate::properties::{self, FstProperties};
use crate::semiring::Semiring;
use crate::symbol_table::SymbolTable;
use crate::tr::Tr;
use crate::{Label, Result, StateId, WfstError};

/// Read access to a transducer.
pub trait Fst<W: Semiring>: Debug {
    /// The start state, or `None` for the empty language.
    fn start(&self) -> Option<StateId>;

    fn num_states(&self) -> usize;

    /// Final weight of `state`. `None` means the state is not accepting,
    /// which is distinct from a final weight of `one`.
    fn final_weight(&self, state: StateId) -> Result<Option<W>>;

    /// Outgoing transitions of `state` in stored order.
    fn get_trs(&self, state: StateId) -> Result<&[Tr<W>]>;

    /// Number of transitions of `state` with an epsilon input label.
    fn num_input_epsilons(&self, state: StateId) -> Result<usize>;

    /// Number of transitions of `state` with an epsilon output label.
    fn num_output_epsilons(&self, state: StateId) -> Result<usize>;

    fn input_symbols(&self) -> Option<&Arc<SymbolTable>>;

    fn output_symbols(&self) -> Option<&Arc<SymbolTable>>;

    #[inline]
    fn num_trs(&self, state: StateId) -> Result<usize> {
        Ok(self.get_trs(state)?.len())
    }

    #[inline]
    fn is_final(&self, state: StateId) -> Result<bool> {
        Ok(self.final_weight(state)?.is_some())
    }

    #[inline]
    fn is_start(&self, state: StateId) -> bool {
        self.start() == Some(state)
    }

    /// Forward iterator over every state id.
    #[inline]
    fn states_iter(&self) -> Range<StateId> {
        0..self.num_states() as StateId
    }

    /// Final states in increasing id order.
    fn final_states(&self) -> Result<Vec<StateId>> {
        let mut finals = Vec::new();
        for s in self.states_iter() {
            if self.is_final(s)? {
                finals.push(s);
            }
        }
        Ok(finals)
    }

    /// Total number of transitions.
    fn num_trs_total(&self) -> usize {
        self.states_iter()
            .map(|s| self.get_trs(s).map_or(0, <[Tr<W>]>::len))
            .sum()
    }

    /// No start state: the empty language.
    #[inline]
    fn is_empty(&self) -> bool {
        self.start().is_none()
    }

    /// Compute structural properties by inspecting the whole transducer.
    fn properties(&self) -> Result<FstProperties>
    where
        Self: Sized,
    {
        properties::compute_properties(self)
    }

    /// Iterate over the label sequences of every accepting path.
    fn paths_iter(&self) -> PathsIterator<'_, W, Self>
    where
        Self: Sized,
    {
        PathsIterator::new(self)
    }

    /// Iterate over accepting paths rendered through the symbol tables.
    fn string_paths_iter(&self) -> Result<StringPathsIterator<'_, W, Self>>
    where
        Self: Sized,
    {
        StringPathsIterator::new(self)
    }
}

/// Error for a state id outside `[0, num_states)`.
#[inline]
pub(crate) fn out_of_range(state: StateId, num_states: usize) -> WfstError {
    WfstError::StateOutOfRange { state, num_states }
}

/// Linear acceptor over `labels` whose final state carries `weight`.
pub fn acceptor<W: Semiring>(labels: &[Label], weight: W) -> VectorFst<W> {
    transducer(labels, labels, weight)
}

/// Linear transducer pairing `ilabels` with `olabels`. The shorter side is
/// padded with epsilons.
pub fn transducer<W: Semiring>(ilabels: &[Label], olabels: &[Label], weight: W) -> VectorFst<W> {
    let len = ilabels.len().max(olabels.len());
    let mut fst = VectorFst::new();
    let mut state = fst.add_state();
    fst.set_start_unchecked(state);
    for i in 0..len {
        let next = fst.add_state();
        let ilabel = ilabels.get(i).copied().unwrap_or(0);
        let olabel = olabels.get(i).copied().unwrap_or(0);
        fst.push_tr_unchecked(state, Tr::new(ilabel, olabel, W::one(), next));
        state = next;
    }
    fst.set_final_unchecked(state, weight);
    fst
}
