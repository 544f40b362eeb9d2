//! Composition of weighted transducers.
//!
//! The product is built eagerly, breadth first from the pair of start
//! states. At every product state one operand's transitions are iterated
//! and looked up in the other operand through a [`matcher`]; epsilon
//! pairings are then accepted or refused by the configured [`filter`].

mod filter;
mod matcher;

use std::collections::VecDeque;

use hashbrown::HashMap;
use log::{debug, trace};
use serde::{Deserialize, Serialize};

pub use self::filter::ComposeFilter;
pub use self::matcher::{MatcherConfig, MatcherRewriteMode, SigmaMatcherConfig};

use self::filter::EpsilonFilter;
use self::matcher::{MatchType, Matcher};
use super::connect::connect;
use crate::fst::{Fst, VectorFst};
use crate::semiring::Semiring;
use crate::tr::Tr;
use crate::{EPS_LABEL, NO_LABEL, Result, StateId, WfstError};

/// Options of [`compose_with_config`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComposeConfig {
    pub compose_filter: ComposeFilter,
    /// Trim the product afterward.
    pub connect: bool,
    /// Matcher on the output side of the first operand.
    pub matcher1_config: MatcherConfig,
    /// Matcher on the input side of the second operand.
    pub matcher2_config: MatcherConfig,
}

impl Default for ComposeConfig {
    fn default() -> Self {
        Self {
            compose_filter: ComposeFilter::default(),
            connect: true,
            matcher1_config: MatcherConfig::default(),
            matcher2_config: MatcherConfig::default(),
        }
    }
}

impl ComposeConfig {
    pub fn new(compose_filter: ComposeFilter, connect: bool) -> Self {
        Self {
            compose_filter,
            connect,
            ..Self::default()
        }
    }
}

/// Which operand does the lookups.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MatchSide {
    /// Iterate the second operand, look up in the first.
    First,
    /// Iterate the first operand, look up in the second.
    Second,
    /// Decide per state from the matcher priorities.
    Both,
}

type ComposeTuple = (StateId, StateId, u8);

/// Product states in discovery order.
#[derive(Debug, Default)]
struct StateTable {
    ids: HashMap<ComposeTuple, StateId>,
    tuples: Vec<ComposeTuple>,
    queue: VecDeque<StateId>,
}

impl StateTable {
    fn find_id(&mut self, tuple: ComposeTuple) -> StateId {
        if let Some(&id) = self.ids.get(&tuple) {
            return id;
        }
        let id = self.tuples.len() as StateId;
        self.ids.insert(tuple, id);
        self.tuples.push(tuple);
        self.queue.push_back(id);
        id
    }
}

fn select_side<W, F1, F2>(m1: &Matcher<'_, W, F1>, m2: &Matcher<'_, W, F2>) -> Result<MatchSide>
where
    W: Semiring,
    F1: Fst<W>,
    F2: Fst<W>,
{
    if m1.requires_match() && !m1.is_sorted() {
        return Err(WfstError::Unsorted(
            "sigma matching on the first operand needs output-sorted transitions".into(),
        ));
    }
    if m2.requires_match() && !m2.is_sorted() {
        return Err(WfstError::Unsorted(
            "sigma matching on the second operand needs input-sorted transitions".into(),
        ));
    }
    match (m1.is_sorted(), m2.is_sorted()) {
        (true, true) => Ok(MatchSide::Both),
        (true, false) => Ok(MatchSide::First),
        (false, true) => Ok(MatchSide::Second),
        (false, false) => Err(WfstError::Unsorted(
            "first operand must be output-sorted or second operand input-sorted".into(),
        )),
    }
}

/// Compose with the default configuration: sequence filter, no sigma,
/// connected result.
pub fn compose<W, F1, F2>(fst1: &F1, fst2: &F2) -> Result<VectorFst<W>>
where
    W: Semiring,
    F1: Fst<W>,
    F2: Fst<W>,
{
    compose_with_config(fst1, fst2, ComposeConfig::default())
}

/// Compose `fst1` with `fst2`: a path reading `x` and writing `z` for every
/// pair of paths `x:y` in `fst1` and `y:z` in `fst2`, weighted by the
/// product of their weights.
///
/// `fst1` must be sorted on output labels or `fst2` on input labels. The
/// result takes its input symbols from `fst1` and its output symbols from
/// `fst2`.
pub fn compose_with_config<W, F1, F2>(fst1: &F1, fst2: &F2, config: ComposeConfig) -> Result<VectorFst<W>>
where
    W: Semiring,
    F1: Fst<W>,
    F2: Fst<W>,
{
    let m1 = Matcher::new(fst1, MatchType::Output, &config.matcher1_config)?;
    let m2 = Matcher::new(fst2, MatchType::Input, &config.matcher2_config)?;
    let side = select_side(&m1, &m2)?;

    let mut out = VectorFst::new();
    out.isymt = fst1.input_symbols().cloned();
    out.osymt = fst2.output_symbols().cloned();
    let (Some(start1), Some(start2)) = (fst1.start(), fst2.start()) else {
        return Ok(out);
    };

    let mut filter = EpsilonFilter::new(config.compose_filter);
    let mut table = StateTable::default();
    let start = table.find_id((start1, start2, EpsilonFilter::start()));
    let mut matched: Vec<Tr<W>> = Vec::new();

    while let Some(id) = table.queue.pop_front() {
        let (s1, s2, fs) = table.tuples[id as usize];
        filter.set_state(fst1, fst2, s1, s2, fs)?;

        let lookup_in_second = match side {
            MatchSide::First => false,
            MatchSide::Second => true,
            MatchSide::Both => match (m1.priority(s1)?, m2.priority(s2)?) {
                (None, None) => {
                    return Err(WfstError::InvalidConfig(
                        "both operands require sigma matching at the same state".into(),
                    ));
                }
                (None, Some(_)) => false,
                (Some(_), None) => true,
                (Some(p1), Some(p2)) => p1 <= p2,
            },
        };

        let mut trs: Vec<Tr<W>> = Vec::new();
        if lookup_in_second {
            let self_loop = Tr::new(EPS_LABEL, NO_LABEL, W::one(), s1);
            for t1 in std::iter::once(&self_loop).chain(fst1.get_trs(s1)?) {
                matched.clear();
                m2.find(s2, t1.olabel, &mut matched)?;
                for t2 in &matched {
                    if let Some(nfs) = filter.filter_tr(t1, t2) {
                        let next = table.find_id((t1.nextstate, t2.nextstate, nfs));
                        trs.push(Tr::new(t1.ilabel, t2.olabel, t1.weight.times(t2.weight), next));
                    }
                }
            }
        } else {
            let self_loop = Tr::new(NO_LABEL, EPS_LABEL, W::one(), s2);
            for t2 in std::iter::once(&self_loop).chain(fst2.get_trs(s2)?) {
                matched.clear();
                m1.find(s1, t2.ilabel, &mut matched)?;
                for t1 in &matched {
                    if let Some(nfs) = filter.filter_tr(t1, t2) {
                        let next = table.find_id((t1.nextstate, t2.nextstate, nfs));
                        trs.push(Tr::new(t1.ilabel, t2.olabel, t1.weight.times(t2.weight), next));
                    }
                }
            }
        }
        trace!("compose: state {id} = ({s1}, {s2}, {fs}) has {} trs", trs.len());

        out.add_states(table.tuples.len() - out.num_states());
        out.set_trs_unchecked(id, trs);
        if let (Some(f1), Some(f2)) = (fst1.final_weight(s1)?, fst2.final_weight(s2)?) {
            let f = f1.times(f2);
            if !f.is_zero() {
                out.set_final_unchecked(id, f);
            }
        }
    }
    out.set_start_unchecked(start);
    debug!("compose: {} product states", out.num_states());

    if config.connect {
        connect(&mut out)?;
    }
    Ok(out)
}
