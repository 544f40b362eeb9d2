// Recursive replacement of nonterminal transitions (RTN expansion).

use hashbrown::HashMap;
use log::debug;

use crate::fst::{Fst, VectorFst};
use crate::semiring::Semiring;
use crate::tr::Tr;
use crate::{EPS_LABEL, Label, Result, StateId, WfstError};

/// Interned call stacks. Stack 0 is the empty stack; every other stack is
/// a parent stack plus the `(fst, return state)` of one pending call.
#[derive(Debug)]
struct StackTable {
    frames: Vec<Option<(usize, usize, StateId)>>,
    ids: HashMap<(usize, usize, StateId), usize>,
}

impl StackTable {
    fn new() -> Self {
        Self {
            frames: vec![None],
            ids: HashMap::new(),
        }
    }

    fn push(&mut self, parent: usize, fst: usize, ret: StateId) -> usize {
        let key = (parent, fst, ret);
        if let Some(&id) = self.ids.get(&key) {
            return id;
        }
        self.frames.push(Some(key));
        let id = self.frames.len() - 1;
        self.ids.insert(key, id);
        id
    }

    fn top(&self, stack: usize) -> Option<(usize, usize, StateId)> {
        self.frames.get(stack).copied().flatten()
    }
}

/// Result states keyed by `(stack, fst, state)`, in discovery order.
#[derive(Debug, Default)]
struct StateTable {
    ids: HashMap<(usize, usize, StateId), StateId>,
    tuples: Vec<(usize, usize, StateId)>,
}

impl StateTable {
    fn find_id(&mut self, tuple: (usize, usize, StateId)) -> StateId {
        if let Some(&id) = self.ids.get(&tuple) {
            return id;
        }
        let id = self.tuples.len() as StateId;
        self.ids.insert(tuple, id);
        self.tuples.push(tuple);
        id
    }
}

/// Fail if some nonterminal can (transitively) call itself.
fn check_acyclic<W: Semiring, F: Fst<W>>(
    fsts: &[(Label, F)],
    index: &HashMap<Label, usize>,
) -> Result<()> {
    let mut calls: Vec<Vec<usize>> = Vec::with_capacity(fsts.len());
    for (_, fst) in fsts {
        let mut callees = Vec::new();
        for s in fst.states_iter() {
            callees.extend(fst.get_trs(s)?.iter().filter_map(|tr| index.get(&tr.olabel).copied()));
        }
        callees.sort_unstable();
        callees.dedup();
        calls.push(callees);
    }

    // 0 = unvisited, 1 = on the DFS path, 2 = done
    let mut color = vec![0u8; fsts.len()];
    for root in 0..fsts.len() {
        if color[root] != 0 {
            continue;
        }
        let mut stack = vec![(root, 0usize)];
        color[root] = 1;
        while let Some((node, next)) = stack.last_mut() {
            if let Some(&callee) = calls[*node].get(*next) {
                *next += 1;
                match color[callee] {
                    0 => {
                        color[callee] = 1;
                        stack.push((callee, 0));
                    }
                    1 => {
                        return Err(WfstError::InvalidConfig(format!(
                            "nonterminal {} is recursive",
                            fsts[callee].0
                        )));
                    }
                    _ => {}
                }
            } else {
                color[*node] = 2;
                stack.pop();
            }
        }
    }
    Ok(())
}

/// Expand the transducer labeled `root_label` by substituting, for every
/// transition whose output label names another transducer of `fst_list`,
/// that transducer.
///
/// A call transition keeps its input label (or reads epsilon when
/// `epsilon_on_replace` is set) and writes epsilon; leaving a replaced
/// transducer through one of its final states is an epsilon transition
/// weighted by that final weight. Only final states of the root are final
/// in the result. States are numbered in breadth-first discovery order.
///
/// Fails with [`WfstError::InvalidConfig`] when `root_label` is missing,
/// a label appears twice, or the nonterminals call each other
/// recursively.
pub fn replace<W, F>(
    root_label: Label,
    fst_list: &[(Label, F)],
    epsilon_on_replace: bool,
) -> Result<VectorFst<W>>
where
    W: Semiring,
    F: Fst<W>,
{
    let mut index: HashMap<Label, usize> = HashMap::with_capacity(fst_list.len());
    for (i, (label, _)) in fst_list.iter().enumerate() {
        if index.insert(*label, i).is_some() {
            return Err(WfstError::InvalidConfig(format!(
                "nonterminal {label} is defined twice"
            )));
        }
    }
    let root = *index.get(&root_label).ok_or_else(|| {
        WfstError::InvalidConfig(format!("root nonterminal {root_label} is not defined"))
    })?;
    check_acyclic(fst_list, &index)?;

    let root_fst = &fst_list[root].1;
    let mut out = VectorFst::new();
    out.copy_symbols_from(root_fst);
    let Some(root_start) = root_fst.start() else {
        return Ok(out);
    };

    let mut stacks = StackTable::new();
    let mut states = StateTable::default();
    let start = states.find_id((0, root, root_start));

    let mut id: StateId = 0;
    while (id as usize) < states.tuples.len() {
        let (stack, fst_idx, state) = states.tuples[id as usize];
        let fst = &fst_list[fst_idx].1;
        let mut trs = Vec::new();
        let mut final_weight = None;

        if let Some(f) = fst.final_weight(state)? {
            match stacks.top(stack) {
                None => final_weight = Some(f),
                Some(caller) => {
                    let next = states.find_id(caller);
                    trs.push(Tr::new(EPS_LABEL, EPS_LABEL, f, next));
                }
            }
        }
        for tr in fst.get_trs(state)? {
            match index.get(&tr.olabel) {
                Some(&callee) => {
                    let Some(callee_start) = fst_list[callee].1.start() else {
                        continue;
                    };
                    let child = stacks.push(stack, fst_idx, tr.nextstate);
                    let next = states.find_id((child, callee, callee_start));
                    let ilabel = if epsilon_on_replace { EPS_LABEL } else { tr.ilabel };
                    trs.push(Tr::new(ilabel, EPS_LABEL, tr.weight, next));
                }
                None => {
                    let next = states.find_id((stack, fst_idx, tr.nextstate));
                    trs.push(Tr { nextstate: next, ..*tr });
                }
            }
        }

        out.add_states(states.tuples.len() - out.num_states());
        out.set_trs_unchecked(id, trs);
        if let Some(f) = final_weight {
            out.set_final_unchecked(id, f);
        }
        id += 1;
    }
    out.set_start_unchecked(start);
    debug!(
        "replace: {} states, {} call stacks",
        out.num_states(),
        stacks.frames.len()
    );
    Ok(out)
}
