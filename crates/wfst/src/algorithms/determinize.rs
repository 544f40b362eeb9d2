// Weighted subset construction.

use std::collections::{BTreeMap, VecDeque};

use hashbrown::HashMap;
use log::debug;
use serde::{Deserialize, Serialize};

use super::add_output_chain;
use crate::fst::{Fst, VectorFst};
use crate::semiring::Semiring;
use crate::{EPS_LABEL, KDELTA, Label, Result, StateId, WfstError};

/// How residual outputs of a subset are reconciled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DeterminizeType {
    /// Every input string has one output string; anything else is an error.
    #[default]
    Functional,
    /// Keep distinct outputs apart; the result may emit several outputs per
    /// input.
    NonFunctional,
    /// Keep only the best output per input. Needs the path property.
    Disambiguate,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DeterminizeConfig {
    pub det_type: DeterminizeType,
    pub delta: f32,
}

impl Default for DeterminizeConfig {
    fn default() -> Self {
        Self {
            det_type: DeterminizeType::default(),
            delta: KDELTA,
        }
    }
}

impl DeterminizeConfig {
    pub fn new(det_type: DeterminizeType, delta: f32) -> Self {
        Self { det_type, delta }
    }
}

/// One member of a subset: an input state, the output it still owes and
/// its residual weight.
#[derive(Debug, Clone, PartialEq)]
struct Element<W> {
    state: StateId,
    string: Vec<Label>,
    weight: W,
}

type SubsetKey = Vec<(StateId, Vec<Label>, u32)>;

/// Sort a subset and merge elements that must collapse.
fn normalize<W: Semiring>(
    mut elements: Vec<Element<W>>,
    det_type: DeterminizeType,
) -> Result<Vec<Element<W>>> {
    elements.sort_by(|a, b| (a.state, &a.string).cmp(&(b.state, &b.string)));
    let mut merged: Vec<Element<W>> = Vec::with_capacity(elements.len());
    for e in elements {
        match merged.last_mut() {
            Some(last) if last.state == e.state => match det_type {
                DeterminizeType::Functional => {
                    if last.string != e.string {
                        return Err(WfstError::NonFunctional { state: e.state });
                    }
                    last.weight.plus_assign(e.weight);
                }
                DeterminizeType::NonFunctional => {
                    if last.string == e.string {
                        last.weight.plus_assign(e.weight);
                    } else {
                        merged.push(e);
                    }
                }
                DeterminizeType::Disambiguate => {
                    // strings arrive in lexicographic order, so ties keep `last`
                    if last.weight.plus(e.weight) != last.weight {
                        *last = e;
                    }
                }
            },
            _ => merged.push(e),
        }
    }
    Ok(merged)
}

fn longest_common_prefix<'a>(mut strings: impl Iterator<Item = &'a [Label]>) -> Vec<Label> {
    let Some(first) = strings.next() else {
        return Vec::new();
    };
    let mut len = first.len();
    for s in strings {
        len = len.min(first.iter().zip(s).take_while(|(a, b)| a == b).count());
    }
    first[..len].to_vec()
}

struct Builder<'a, W, F> {
    fst: &'a F,
    config: DeterminizeConfig,
    out: VectorFst<W>,
    ids: HashMap<SubsetKey, StateId>,
    queue: VecDeque<(StateId, Vec<Element<W>>)>,
}

impl<W: Semiring, F: Fst<W>> Builder<'_, W, F> {
    fn find_or_insert(&mut self, subset: Vec<Element<W>>) -> StateId {
        let delta = self.config.delta;
        let key: SubsetKey = subset
            .iter()
            .map(|e| (e.state, e.string.clone(), e.weight.hash_key(delta)))
            .collect();
        if let Some(&id) = self.ids.get(&key) {
            return id;
        }
        let id = self.out.add_state();
        self.ids.insert(key, id);
        self.queue.push_back((id, subset));
        id
    }

    fn add_final(&mut self, id: StateId, subset: &[Element<W>]) -> Result<()> {
        let mut finals: Vec<(Vec<Label>, W)> = Vec::new();
        for e in subset {
            if let Some(f) = self.fst.final_weight(e.state)? {
                finals.push((e.string.clone(), e.weight.times(f)));
            }
        }
        if finals.is_empty() {
            return Ok(());
        }

        let outputs: Vec<(Vec<Label>, W)> = match self.config.det_type {
            DeterminizeType::Functional => {
                let mut it = finals.into_iter();
                let mut acc = it.next();
                for (string, w) in it {
                    if let Some((s0, w0)) = acc.as_mut() {
                        if *s0 != string {
                            return Err(WfstError::NonFunctional { state: id });
                        }
                        w0.plus_assign(w);
                    }
                }
                acc.into_iter().collect()
            }
            DeterminizeType::NonFunctional => {
                let mut grouped: BTreeMap<Vec<Label>, W> = BTreeMap::new();
                for (string, w) in finals {
                    grouped
                        .entry(string)
                        .and_modify(|acc| acc.plus_assign(w))
                        .or_insert(w);
                }
                grouped.into_iter().collect()
            }
            DeterminizeType::Disambiguate => {
                finals.sort_by(|a, b| a.0.cmp(&b.0));
                let mut best: Option<(Vec<Label>, W)> = None;
                for (string, w) in finals {
                    let better = match &best {
                        Some((_, bw)) => bw.plus(w) != *bw,
                        None => true,
                    };
                    if better {
                        best = Some((string, w));
                    }
                }
                best.into_iter().collect()
            }
        };

        let mut final_state = None;
        for (string, w) in outputs {
            if string.is_empty() {
                self.out.set_final_unchecked(id, w);
                continue;
            }
            let target = *final_state.get_or_insert_with(|| {
                let s = self.out.add_state();
                self.out.set_final_unchecked(s, W::one());
                s
            });
            add_output_chain(&mut self.out, id, EPS_LABEL, &string, w, target);
        }
        Ok(())
    }

    fn expand(&mut self, id: StateId, subset: Vec<Element<W>>) -> Result<()> {
        self.add_final(id, &subset)?;

        let mut by_label: BTreeMap<Label, Vec<Element<W>>> = BTreeMap::new();
        for e in &subset {
            for tr in self.fst.get_trs(e.state)? {
                let weight = e.weight.times(tr.weight);
                if weight.is_zero() {
                    continue;
                }
                let mut string = e.string.clone();
                if tr.olabel != EPS_LABEL {
                    string.push(tr.olabel);
                }
                by_label.entry(tr.ilabel).or_default().push(Element {
                    state: tr.nextstate,
                    string,
                    weight,
                });
            }
        }

        for (label, items) in by_label {
            let total = items
                .iter()
                .fold(W::zero(), |acc, e| acc.plus(e.weight));
            let prefix = longest_common_prefix(items.iter().map(|e| e.string.as_slice()));
            let mut next = Vec::with_capacity(items.len());
            for e in items {
                next.push(Element {
                    state: e.state,
                    string: e.string[prefix.len()..].to_vec(),
                    weight: e.weight.divide(total)?,
                });
            }
            let next = normalize(next, self.config.det_type)?;
            let dest = self.find_or_insert(next);
            add_output_chain(&mut self.out, id, label, &prefix, total, dest);
        }
        Ok(())
    }
}

/// Functional determinization with the default tolerance.
pub fn determinize<W: Semiring, F: Fst<W>>(fst: &F) -> Result<VectorFst<W>> {
    determinize_with_config(fst, DeterminizeConfig::default())
}

/// Build an equivalent transducer with at most one transition per input
/// label leaving each state.
///
/// Epsilon input labels are treated like any other label; remove
/// epsilons first for a fully input-deterministic result. Outputs that
/// cannot be emitted yet are carried as residual strings and flushed on
/// chains of output-only transitions. Terminates on acyclic input and on
/// cyclic input with the twins property.
pub fn determinize_with_config<W, F>(fst: &F, config: DeterminizeConfig) -> Result<VectorFst<W>>
where
    W: Semiring,
    F: Fst<W>,
{
    if config.det_type == DeterminizeType::Disambiguate && !W::PATH {
        return Err(WfstError::UnsupportedSemiring {
            semiring: W::ARC_TYPE,
            reason: "disambiguation needs the path property",
        });
    }
    let mut out = VectorFst::new();
    out.copy_symbols_from(fst);
    let Some(start) = fst.start() else {
        return Ok(out);
    };

    let mut builder = Builder {
        fst,
        config,
        out,
        ids: HashMap::new(),
        queue: VecDeque::new(),
    };
    let initial = builder.find_or_insert(vec![Element {
        state: start,
        string: Vec::new(),
        weight: W::one(),
    }]);
    builder.out.set_start_unchecked(initial);
    while let Some((id, subset)) = builder.queue.pop_front() {
        builder.expand(id, subset)?;
    }
    debug!(
        "determinize: {} subsets, {} states",
        builder.ids.len(),
        builder.out.num_states()
    );
    Ok(builder.out)
}
