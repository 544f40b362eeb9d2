// Mutable transducer backed by one transition vector per state.

use std::sync::Arc;

use super::{Fst, out_of_range};
use crate::semiring::Semiring;
use crate::symbol_table::SymbolTable;
use crate::tr::Tr;
use crate::{EPS_LABEL, NO_STATE_ID, Result, StateId, WfstError};

/// Per-state storage: final weight, transitions and epsilon counters.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct VectorState<W> {
    pub(crate) final_weight: Option<W>,
    pub(crate) trs: Vec<Tr<W>>,
    pub(crate) niepsilons: usize,
    pub(crate) noepsilons: usize,
}

impl<W> VectorState<W> {
    fn new() -> Self {
        Self {
            final_weight: None,
            trs: Vec::new(),
            niepsilons: 0,
            noepsilons: 0,
        }
    }

    #[inline]
    fn count(&mut self, tr: &Tr<W>) {
        if tr.ilabel == EPS_LABEL {
            self.niepsilons += 1;
        }
        if tr.olabel == EPS_LABEL {
            self.noepsilons += 1;
        }
    }

    #[inline]
    fn uncount(&mut self, tr: &Tr<W>) {
        if tr.ilabel == EPS_LABEL {
            self.niepsilons -= 1;
        }
        if tr.olabel == EPS_LABEL {
            self.noepsilons -= 1;
        }
    }

    fn recount(&mut self) {
        self.niepsilons = self.trs.iter().filter(|t| t.ilabel == EPS_LABEL).count();
        self.noepsilons = self.trs.iter().filter(|t| t.olabel == EPS_LABEL).count();
    }
}

/// Mutable transducer.
///
/// States are stored densely; deleting states renumbers the survivors and
/// rewrites every transition destination. Symbol tables are shared and
/// copied on write.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorFst<W> {
    pub(crate) states: Vec<VectorState<W>>,
    pub(crate) start: Option<StateId>,
    pub(crate) isymt: Option<Arc<SymbolTable>>,
    pub(crate) osymt: Option<Arc<SymbolTable>>,
}

impl<W: Semiring> Default for VectorFst<W> {
    fn default() -> Self {
        Self::new()
    }
}

impl<W: Semiring> VectorFst<W> {
    pub fn new() -> Self {
        Self {
            states: Vec::new(),
            start: None,
            isymt: None,
            osymt: None,
        }
    }

    #[inline]
    fn check(&self, state: StateId) -> Result<()> {
        if (state as usize) < self.states.len() {
            Ok(())
        } else {
            Err(out_of_range(state, self.states.len()))
        }
    }

    pub fn add_state(&mut self) -> StateId {
        self.states.push(VectorState::new());
        (self.states.len() - 1) as StateId
    }

    pub fn add_states(&mut self, n: usize) {
        self.states.extend((0..n).map(|_| VectorState::new()));
    }

    pub fn set_start(&mut self, state: StateId) -> Result<()> {
        self.check(state)?;
        self.start = Some(state);
        Ok(())
    }

    #[inline]
    pub(crate) fn set_start_unchecked(&mut self, state: StateId) {
        self.start = Some(state);
    }

    /// Remove the start state, making the language empty.
    pub fn clear_start(&mut self) {
        self.start = None;
    }

    pub fn set_final(&mut self, state: StateId, weight: impl Into<W>) -> Result<()> {
        self.check(state)?;
        self.states[state as usize].final_weight = Some(weight.into());
        Ok(())
    }

    #[inline]
    pub(crate) fn set_final_unchecked(&mut self, state: StateId, weight: W) {
        self.states[state as usize].final_weight = Some(weight);
    }

    /// Make `state` non-accepting.
    pub fn unset_final(&mut self, state: StateId) -> Result<()> {
        self.check(state)?;
        self.states[state as usize].final_weight = None;
        Ok(())
    }

    /// Alias of [`VectorFst::unset_final`].
    pub fn delete_final_weight(&mut self, state: StateId) -> Result<()> {
        self.unset_final(state)
    }

    /// Remove and return the final weight of `state`.
    pub fn take_final_weight(&mut self, state: StateId) -> Result<Option<W>> {
        self.check(state)?;
        Ok(self.states[state as usize].final_weight.take())
    }

    /// Append a transition. Both endpoints must exist.
    pub fn add_tr(&mut self, state: StateId, tr: Tr<W>) -> Result<()> {
        self.check(state)?;
        self.check(tr.nextstate)?;
        self.push_tr_unchecked(state, tr);
        Ok(())
    }

    #[inline]
    pub(crate) fn push_tr_unchecked(&mut self, state: StateId, tr: Tr<W>) {
        let st = &mut self.states[state as usize];
        st.count(&tr);
        st.trs.push(tr);
    }

    /// Replace all transitions of `state`.
    pub fn set_trs(&mut self, state: StateId, trs: Vec<Tr<W>>) -> Result<()> {
        self.check(state)?;
        if let Some(bad) = trs
            .iter()
            .find(|t| t.nextstate as usize >= self.states.len())
        {
            return Err(out_of_range(bad.nextstate, self.states.len()));
        }
        self.set_trs_unchecked(state, trs);
        Ok(())
    }

    pub(crate) fn set_trs_unchecked(&mut self, state: StateId, trs: Vec<Tr<W>>) {
        let st = &mut self.states[state as usize];
        st.trs = trs;
        st.recount();
    }

    /// Remove and return all transitions of `state`.
    pub fn pop_trs(&mut self, state: StateId) -> Result<Vec<Tr<W>>> {
        self.check(state)?;
        let st = &mut self.states[state as usize];
        st.niepsilons = 0;
        st.noepsilons = 0;
        Ok(std::mem::take(&mut st.trs))
    }

    pub fn delete_trs(&mut self, state: StateId) -> Result<()> {
        self.pop_trs(state).map(|_| ())
    }

    pub fn reserve_trs(&mut self, state: StateId, additional: usize) -> Result<()> {
        self.check(state)?;
        self.states[state as usize].trs.reserve(additional);
        Ok(())
    }

    pub fn reserve_states(&mut self, additional: usize) {
        self.states.reserve(additional);
    }

    /// Edit the transitions of `state` through a closure; epsilon counters
    /// are recomputed afterwards. Destinations are not validated.
    pub(crate) fn modify_trs<F>(&mut self, state: StateId, f: F)
    where
        F: FnOnce(&mut Vec<Tr<W>>),
    {
        let st = &mut self.states[state as usize];
        f(&mut st.trs);
        st.recount();
    }

    /// Apply `f` to every transition of every state.
    pub(crate) fn map_all_trs<F>(&mut self, mut f: F)
    where
        F: FnMut(&mut Tr<W>),
    {
        for st in &mut self.states {
            st.trs.iter_mut().for_each(&mut f);
            st.recount();
        }
    }

    /// Apply `f` to every final weight.
    pub(crate) fn map_final_weights<F>(&mut self, mut f: F)
    where
        F: FnMut(StateId, &mut Option<W>),
    {
        for (s, st) in self.states.iter_mut().enumerate() {
            f(s as StateId, &mut st.final_weight);
        }
    }

    /// Delete the given states, renumbering the rest densely. Transitions
    /// into deleted states are dropped. The start is cleared if deleted.
    pub fn del_states<I>(&mut self, states: I) -> Result<()>
    where
        I: IntoIterator<Item = StateId>,
    {
        let num_states = self.states.len();
        let mut dead = vec![false; num_states];
        for s in states {
            if s as usize >= num_states {
                return Err(out_of_range(s, num_states));
            }
            dead[s as usize] = true;
        }

        let mut new_id = vec![NO_STATE_ID; num_states];
        let mut next = 0;
        for (s, &d) in dead.iter().enumerate() {
            if !d {
                new_id[s] = next;
                next += 1;
            }
        }

        let old_states = std::mem::take(&mut self.states);
        self.states = old_states
            .into_iter()
            .enumerate()
            .filter(|(s, _)| !dead[*s])
            .map(|(_, mut st)| {
                st.trs.retain_mut(|tr| {
                    let n = new_id[tr.nextstate as usize];
                    tr.nextstate = n;
                    n != NO_STATE_ID
                });
                st.recount();
                st
            })
            .collect();

        self.start = self
            .start
            .map(|s| new_id[s as usize])
            .filter(|&s| s != NO_STATE_ID);
        Ok(())
    }

    /// Remove every state. Symbol tables are kept.
    pub fn del_all_states(&mut self) {
        self.states.clear();
        self.start = None;
    }

    /// In-place iterator over the transitions of `state`.
    pub fn tr_iter_mut(&mut self, state: StateId) -> Result<TrsIterMut<'_, W>> {
        self.check(state)?;
        let num_states = self.states.len();
        Ok(TrsIterMut {
            state: &mut self.states[state as usize],
            num_states,
            pos: 0,
        })
    }

    pub fn set_input_symbols(&mut self, symt: Arc<SymbolTable>) {
        self.isymt = Some(symt);
    }

    pub fn set_output_symbols(&mut self, symt: Arc<SymbolTable>) {
        self.osymt = Some(symt);
    }

    pub fn take_input_symbols(&mut self) -> Option<Arc<SymbolTable>> {
        self.isymt.take()
    }

    pub fn take_output_symbols(&mut self) -> Option<Arc<SymbolTable>> {
        self.osymt.take()
    }

    /// Mutable access to the input table. Shared tables are copied first.
    pub fn input_symbols_mut(&mut self) -> Option<&mut SymbolTable> {
        self.isymt.as_mut().map(Arc::make_mut)
    }

    /// Mutable access to the output table. Shared tables are copied first.
    pub fn output_symbols_mut(&mut self) -> Option<&mut SymbolTable> {
        self.osymt.as_mut().map(Arc::make_mut)
    }

    /// Copy the symbol tables of `other` onto `self`.
    pub(crate) fn copy_symbols_from<F: Fst<W>>(&mut self, other: &F) {
        self.isymt = other.input_symbols().cloned();
        self.osymt = other.output_symbols().cloned();
    }

    /// Copy any transducer into a `VectorFst`.
    pub fn from_fst<F: Fst<W>>(fst: &F) -> Result<Self> {
        let mut out = Self::new();
        out.add_states(fst.num_states());
        for s in fst.states_iter() {
            let st = &mut out.states[s as usize];
            st.final_weight = fst.final_weight(s)?;
            st.trs = fst.get_trs(s)?.to_vec();
            st.recount();
        }
        out.start = fst.start();
        out.copy_symbols_from(fst);
        Ok(out)
    }
}

impl<W: Semiring> Fst<W> for VectorFst<W> {
    #[inline]
    fn start(&self) -> Option<StateId> {
        self.start
    }

    #[inline]
    fn num_states(&self) -> usize {
        self.states.len()
    }

    #[inline]
    fn final_weight(&self, state: StateId) -> Result<Option<W>> {
        self.states
            .get(state as usize)
            .map(|st| st.final_weight)
            .ok_or_else(|| out_of_range(state, self.states.len()))
    }

    #[inline]
    fn get_trs(&self, state: StateId) -> Result<&[Tr<W>]> {
        self.states
            .get(state as usize)
            .map(|st| st.trs.as_slice())
            .ok_or_else(|| out_of_range(state, self.states.len()))
    }

    fn num_input_epsilons(&self, state: StateId) -> Result<usize> {
        self.states
            .get(state as usize)
            .map(|st| st.niepsilons)
            .ok_or_else(|| out_of_range(state, self.states.len()))
    }

    fn num_output_epsilons(&self, state: StateId) -> Result<usize> {
        self.states
            .get(state as usize)
            .map(|st| st.noepsilons)
            .ok_or_else(|| out_of_range(state, self.states.len()))
    }

    fn input_symbols(&self) -> Option<&Arc<SymbolTable>> {
        self.isymt.as_ref()
    }

    fn output_symbols(&self) -> Option<&Arc<SymbolTable>> {
        self.osymt.as_ref()
    }
}

/// Cursor over the transitions of one state that can overwrite them.
///
/// Follows the `done` / `value` / `next` / `reset` protocol. Overwriting a
/// transition keeps the state's epsilon counters consistent.
pub struct TrsIterMut<'a, W> {
    state: &'a mut VectorState<W>,
    num_states: usize,
    pos: usize,
}

impl<W: Semiring> TrsIterMut<'_, W> {
    #[inline]
    pub fn done(&self) -> bool {
        self.pos >= self.state.trs.len()
    }

    #[inline]
    pub fn next(&mut self) {
        self.pos += 1;
    }

    #[inline]
    pub fn reset(&mut self) {
        self.pos = 0;
    }

    #[inline]
    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn value(&self) -> Result<&Tr<W>> {
        self.state.trs.get(self.pos).ok_or(WfstError::IteratorDone)
    }

    /// Overwrite the current transition.
    pub fn set_value(&mut self, tr: Tr<W>) -> Result<()> {
        if tr.nextstate as usize >= self.num_states {
            return Err(out_of_range(tr.nextstate, self.num_states));
        }
        let old = *self
            .state
            .trs
            .get(self.pos)
            .ok_or(WfstError::IteratorDone)?;
        self.state.uncount(&old);
        self.state.count(&tr);
        self.state.trs[self.pos] = tr;
        Ok(())
    }
}
