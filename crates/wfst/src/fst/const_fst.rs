// Immutable transducer with a single contiguous transition buffer.

use std::sync::Arc;

use super::{Fst, VectorFst, out_of_range};
use crate::semiring::Semiring;
use crate::symbol_table::SymbolTable;
use crate::tr::Tr;
use crate::{Result, StateId};

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct ConstState<W> {
    pub(crate) final_weight: Option<W>,
    /// Offset of the first transition in the shared buffer.
    pub(crate) pos: usize,
    pub(crate) ntrs: usize,
    pub(crate) niepsilons: usize,
    pub(crate) noepsilons: usize,
}

/// Compact read-only transducer.
///
/// Built from a [`VectorFst`]; all transitions live in one buffer indexed by
/// per-state offsets. Convert back with `VectorFst::from` to mutate.
#[derive(Debug, Clone, PartialEq)]
pub struct ConstFst<W> {
    pub(crate) states: Vec<ConstState<W>>,
    pub(crate) trs: Vec<Tr<W>>,
    pub(crate) start: Option<StateId>,
    pub(crate) isymt: Option<Arc<SymbolTable>>,
    pub(crate) osymt: Option<Arc<SymbolTable>>,
}

impl<W: Semiring> ConstFst<W> {
    #[inline]
    fn state(&self, state: StateId) -> Result<&ConstState<W>> {
        self.states
            .get(state as usize)
            .ok_or_else(|| out_of_range(state, self.states.len()))
    }
}

impl<W: Semiring> From<VectorFst<W>> for ConstFst<W> {
    fn from(fst: VectorFst<W>) -> Self {
        let total = fst.states.iter().map(|s| s.trs.len()).sum();
        let mut trs = Vec::with_capacity(total);
        let mut states = Vec::with_capacity(fst.states.len());
        for st in fst.states {
            states.push(ConstState {
                final_weight: st.final_weight,
                pos: trs.len(),
                ntrs: st.trs.len(),
                niepsilons: st.niepsilons,
                noepsilons: st.noepsilons,
            });
            trs.extend(st.trs);
        }
        Self {
            states,
            trs,
            start: fst.start,
            isymt: fst.isymt,
            osymt: fst.osymt,
        }
    }
}

impl<W: Semiring> From<ConstFst<W>> for VectorFst<W> {
    fn from(fst: ConstFst<W>) -> Self {
        let mut out = VectorFst::new();
        out.add_states(fst.states.len());
        for (s, st) in fst.states.iter().enumerate() {
            let trs = fst.trs[st.pos..st.pos + st.ntrs].to_vec();
            out.set_trs_unchecked(s as StateId, trs);
            out.states[s].final_weight = st.final_weight;
        }
        out.start = fst.start;
        out.isymt = fst.isymt;
        out.osymt = fst.osymt;
        out
    }
}

impl<W: Semiring> Fst<W> for ConstFst<W> {
    #[inline]
    fn start(&self) -> Option<StateId> {
        self.start
    }

    #[inline]
    fn num_states(&self) -> usize {
        self.states.len()
    }

    fn final_weight(&self, state: StateId) -> Result<Option<W>> {
        Ok(self.state(state)?.final_weight)
    }

    #[inline]
    fn get_trs(&self, state: StateId) -> Result<&[Tr<W>]> {
        let st = self.state(state)?;
        Ok(&self.trs[st.pos..st.pos + st.ntrs])
    }

    fn num_input_epsilons(&self, state: StateId) -> Result<usize> {
        Ok(self.state(state)?.niepsilons)
    }

    fn num_output_epsilons(&self, state: StateId) -> Result<usize> {
        Ok(self.state(state)?.noepsilons)
    }

    fn num_trs_total(&self) -> usize {
        self.trs.len()
    }

    fn input_symbols(&self) -> Option<&Arc<SymbolTable>> {
        self.isymt.as_ref()
    }

    fn output_symbols(&self) -> Option<&Arc<SymbolTable>> {
        self.osymt.as_ref()
    }
}
