// Epsilon filters for composition.
//
// A pairing of transition `t1` (first transducer) with `t2` (second) is
// offered to the filter, which returns the filter state of the product
// destination or `None` to drop the pairing. `NO_LABEL` on the matched
// side marks the implicit epsilon self-loop.

use serde::{Deserialize, Serialize};

use crate::fst::Fst;
use crate::semiring::Semiring;
use crate::tr::Tr;
use crate::{EPS_LABEL, NO_LABEL, Result, StateId};

/// Policy for pairing epsilon moves of the two operands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ComposeFilter {
    /// Same as `Sequence`.
    #[default]
    Auto,
    /// Only real epsilon transitions pair with each other.
    Null,
    /// Every pairing is allowed; redundant epsilon paths are kept.
    Trivial,
    /// Output epsilons of the first operand go before input epsilons of
    /// the second.
    Sequence,
    /// Input epsilons of the second operand go first.
    AltSequence,
    /// Paired epsilon moves are preferred over single-sided ones.
    Match,
    /// Real epsilon transitions never pair with each other.
    NoMatch,
}

/// Epsilon shape of one operand state.
#[derive(Debug, Clone, Copy, Default)]
struct EpsilonInfo {
    /// Every transition is an epsilon on the matched side and the state is
    /// not final: the operand must move.
    alleps: bool,
    /// No epsilon on the matched side.
    noeps: bool,
}

impl EpsilonInfo {
    fn new(ntrs: usize, neps: usize, is_final: bool) -> Self {
        Self {
            alleps: ntrs == neps && !is_final,
            noeps: neps == 0,
        }
    }
}

/// A composition filter positioned at one product state.
#[derive(Debug, Clone)]
pub(crate) struct EpsilonFilter {
    kind: ComposeFilter,
    fs: u8,
    first: EpsilonInfo,
    second: EpsilonInfo,
}

impl EpsilonFilter {
    pub(crate) fn new(kind: ComposeFilter) -> Self {
        let kind = match kind {
            ComposeFilter::Auto => ComposeFilter::Sequence,
            k => k,
        };
        Self {
            kind,
            fs: 0,
            first: EpsilonInfo::default(),
            second: EpsilonInfo::default(),
        }
    }

    /// Filter state of the product start.
    pub(crate) const fn start() -> u8 {
        0
    }

    /// Move to product state `(s1, s2, fs)`.
    pub(crate) fn set_state<W, F1, F2>(
        &mut self,
        fst1: &F1,
        fst2: &F2,
        s1: StateId,
        s2: StateId,
        fs: u8,
    ) -> Result<()>
    where
        W: Semiring,
        F1: Fst<W>,
        F2: Fst<W>,
    {
        self.fs = fs;
        let needs_first = matches!(self.kind, ComposeFilter::Sequence | ComposeFilter::Match);
        let needs_second = matches!(self.kind, ComposeFilter::AltSequence | ComposeFilter::Match);
        if needs_first {
            self.first = EpsilonInfo::new(
                fst1.num_trs(s1)?,
                fst1.num_output_epsilons(s1)?,
                fst1.is_final(s1)?,
            );
        }
        if needs_second {
            self.second = EpsilonInfo::new(
                fst2.num_trs(s2)?,
                fst2.num_input_epsilons(s2)?,
                fst2.is_final(s2)?,
            );
        }
        Ok(())
    }

    /// Destination filter state for pairing `t1` with `t2`, or `None`.
    pub(crate) fn filter_tr<W>(&self, t1: &Tr<W>, t2: &Tr<W>) -> Option<u8> {
        let (loop1, loop2) = (t1.olabel == NO_LABEL, t2.ilabel == NO_LABEL);
        match self.kind {
            ComposeFilter::Auto | ComposeFilter::Sequence => {
                if loop1 {
                    self.advance(self.first, 1)
                } else if loop2 {
                    (self.fs == 0).then_some(0)
                } else if t1.olabel == EPS_LABEL {
                    None
                } else {
                    Some(0)
                }
            }
            ComposeFilter::AltSequence => {
                if loop2 {
                    self.advance(self.second, 1)
                } else if loop1 {
                    (self.fs != 1).then_some(0)
                } else if t1.olabel == EPS_LABEL {
                    None
                } else {
                    Some(0)
                }
            }
            ComposeFilter::Match => {
                if loop2 {
                    match self.fs {
                        0 => self.advance(self.second, 1),
                        1 => Some(1),
                        _ => None,
                    }
                } else if loop1 {
                    match self.fs {
                        0 => self.advance(self.first, 2),
                        2 => Some(2),
                        _ => None,
                    }
                } else if t1.olabel == EPS_LABEL {
                    (self.fs == 0).then_some(0)
                } else {
                    Some(0)
                }
            }
            ComposeFilter::Null => (!loop1 && !loop2).then_some(0),
            ComposeFilter::NoMatch => {
                (t1.olabel != EPS_LABEL || t2.ilabel != EPS_LABEL).then_some(0)
            }
            ComposeFilter::Trivial => Some(0),
        }
    }

    /// One operand stays put while the other takes an epsilon.
    fn advance(&self, info: EpsilonInfo, blocked: u8) -> Option<u8> {
        if info.alleps {
            None
        } else if info.noeps {
            Some(0)
        } else {
            Some(blocked)
        }
    }
}
