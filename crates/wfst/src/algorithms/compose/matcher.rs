// Label matchers over sorted transitions.

use std::marker::PhantomData;

use hashbrown::HashSet;
use serde::{Deserialize, Serialize};

use crate::fst::Fst;
use crate::properties::FstProperties;
use crate::semiring::Semiring;
use crate::tr::Tr;
use crate::{EPS_LABEL, Label, NO_LABEL, Result, StateId, WfstError};

/// Whether a sigma match rewrites the sigma label on the produced
/// transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MatcherRewriteMode {
    /// Rewrite both labels when the transducer is an acceptor, otherwise
    /// only the matched side.
    #[default]
    Auto,
    Always,
    Never,
}

/// Sigma (wildcard) label settings for one operand.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SigmaMatcherConfig {
    pub sigma_label: Label,
    pub rewrite_mode: MatcherRewriteMode,
    /// Labels sigma may stand for. `None` allows every label.
    pub sigma_allowed_matches: Option<Vec<Label>>,
}

impl SigmaMatcherConfig {
    pub fn new(sigma_label: Label, rewrite_mode: MatcherRewriteMode) -> Self {
        Self {
            sigma_label,
            rewrite_mode,
            sigma_allowed_matches: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MatcherConfig {
    pub sigma_matcher_config: Option<SigmaMatcherConfig>,
}

/// Side of the transitions a matcher looks up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum MatchType {
    Input,
    Output,
}

#[derive(Debug)]
struct Sigma {
    label: Label,
    rewrite_both: bool,
    allowed: Option<HashSet<Label>>,
}

/// Finds the transitions of a state carrying a given label on one side.
///
/// Looking up epsilon also yields the implicit self-loop (with `NO_LABEL`
/// on the matched side) before the real epsilon transitions; looking up
/// `NO_LABEL` yields the real epsilon transitions only.
#[derive(Debug)]
pub(crate) struct Matcher<'a, W, F> {
    fst: &'a F,
    match_type: MatchType,
    sorted: bool,
    sigma: Option<Sigma>,
    weight: PhantomData<W>,
}

fn is_sorted<W: Semiring, F: Fst<W>>(fst: &F, match_type: MatchType) -> Result<bool> {
    for s in fst.states_iter() {
        let trs = fst.get_trs(s)?;
        let ok = trs.windows(2).all(|w| match match_type {
            MatchType::Input => w[0].ilabel <= w[1].ilabel,
            MatchType::Output => w[0].olabel <= w[1].olabel,
        });
        if !ok {
            return Ok(false);
        }
    }
    Ok(true)
}

impl<'a, W: Semiring, F: Fst<W>> Matcher<'a, W, F> {
    pub(crate) fn new(fst: &'a F, match_type: MatchType, config: &MatcherConfig) -> Result<Self> {
        let sorted = is_sorted(fst, match_type)?;
        let sigma = match &config.sigma_matcher_config {
            None => None,
            Some(c) => {
                if c.sigma_label == EPS_LABEL {
                    return Err(WfstError::InvalidConfig(
                        "epsilon cannot be used as the sigma label".into(),
                    ));
                }
                let rewrite_both = match c.rewrite_mode {
                    MatcherRewriteMode::Auto => {
                        fst.properties()?.contains(FstProperties::ACCEPTOR)
                    }
                    MatcherRewriteMode::Always => true,
                    MatcherRewriteMode::Never => false,
                };
                Some(Sigma {
                    label: c.sigma_label,
                    rewrite_both,
                    allowed: c
                        .sigma_allowed_matches
                        .as_ref()
                        .map(|labels| labels.iter().copied().collect()),
                })
            }
        };
        Ok(Self {
            fst,
            match_type,
            sorted,
            sigma,
            weight: PhantomData,
        })
    }

    /// Transitions are sorted on the matched side.
    pub(crate) fn is_sorted(&self) -> bool {
        self.sorted
    }

    /// A sigma matcher must be the one doing the lookups at states with
    /// sigma transitions.
    pub(crate) fn requires_match(&self) -> bool {
        self.sigma.is_some()
    }

    #[inline]
    fn label(&self, tr: &Tr<W>) -> Label {
        match self.match_type {
            MatchType::Input => tr.ilabel,
            MatchType::Output => tr.olabel,
        }
    }

    fn self_loop(&self, state: StateId) -> Tr<W> {
        match self.match_type {
            MatchType::Input => Tr::new(NO_LABEL, EPS_LABEL, W::one(), state),
            MatchType::Output => Tr::new(EPS_LABEL, NO_LABEL, W::one(), state),
        }
    }

    /// Real transitions of `state` labeled `label` on the matched side.
    fn sorted_range<'t>(&self, trs: &'t [Tr<W>], label: Label) -> &'t [Tr<W>] {
        let lo = trs.partition_point(|tr| self.label(tr) < label);
        let len = trs[lo..]
            .iter()
            .take_while(|tr| self.label(tr) == label)
            .count();
        &trs[lo..lo + len]
    }

    fn find_exact(&self, state: StateId, label: Label, out: &mut Vec<Tr<W>>) -> Result<()> {
        let trs = self.fst.get_trs(state)?;
        match label {
            EPS_LABEL => {
                out.push(self.self_loop(state));
                out.extend_from_slice(self.sorted_range(trs, EPS_LABEL));
            }
            NO_LABEL => out.extend_from_slice(self.sorted_range(trs, EPS_LABEL)),
            l => out.extend_from_slice(self.sorted_range(trs, l)),
        }
        Ok(())
    }

    fn has_sigma(&self, state: StateId) -> Result<bool> {
        Ok(match &self.sigma {
            Some(sigma) => !self.sorted_range(self.fst.get_trs(state)?, sigma.label).is_empty(),
            None => false,
        })
    }

    /// Lookup priority at `state`: the number of transitions, or `None`
    /// when a sigma transition forces this side to do the lookups.
    pub(crate) fn priority(&self, state: StateId) -> Result<Option<usize>> {
        if self.has_sigma(state)? {
            return Ok(None);
        }
        Ok(Some(self.fst.num_trs(state)?))
    }

    /// Append the transitions of `state` matching `label` to `out`.
    pub(crate) fn find(&self, state: StateId, label: Label, out: &mut Vec<Tr<W>>) -> Result<()> {
        let Some(sigma) = &self.sigma else {
            return self.find_exact(state, label, out);
        };
        if label == sigma.label {
            return Err(WfstError::InvalidConfig(format!(
                "sigma label {label} cannot be looked up directly"
            )));
        }
        let before = out.len();
        self.find_exact(state, label, out)?;
        if out.len() > before || label == EPS_LABEL || label == NO_LABEL {
            return Ok(());
        }
        if sigma.allowed.as_ref().is_some_and(|a| !a.contains(&label)) {
            return Ok(());
        }
        for tr in self.sorted_range(self.fst.get_trs(state)?, sigma.label) {
            let mut tr = *tr;
            if sigma.rewrite_both {
                if tr.ilabel == sigma.label {
                    tr.ilabel = label;
                }
                if tr.olabel == sigma.label {
                    tr.olabel = label;
                }
            } else {
                match self.match_type {
                    MatchType::Input => tr.ilabel = label,
                    MatchType::Output => tr.olabel = label,
                }
            }
            out.push(tr);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fst::VectorFst;
    use crate::semiring::TropicalWeight;

    type W = TropicalWeight;

    fn sorted_state() -> VectorFst<W> {
        let mut fst = VectorFst::new();
        fst.add_states(2);
        fst.set_start(0).unwrap();
        fst.add_tr(0, Tr::new(0, 5, 1.0, 1)).unwrap();
        fst.add_tr(0, Tr::new(2, 6, 1.0, 1)).unwrap();
        fst.add_tr(0, Tr::new(2, 7, 2.0, 0)).unwrap();
        fst.add_tr(0, Tr::new(9, 9, 0.0, 1)).unwrap();
        fst.set_final(1, 0.0).unwrap();
        fst
    }

    #[test]
    fn sorted_lookup() {
        let fst = sorted_state();
        let m = Matcher::new(&fst, MatchType::Input, &MatcherConfig::default()).unwrap();
        assert!(m.is_sorted());
        let mut out: Vec<Tr<W>> = Vec::new();
        m.find(0, 2, &mut out).unwrap();
        assert_eq!(out.len(), 2);
        out.clear();
        m.find(0, EPS_LABEL, &mut out).unwrap();
        assert_eq!(out, vec![Tr::new(NO_LABEL, 0, 0.0, 0), Tr::new(0, 5, 1.0, 1)]);
        out.clear();
        m.find(0, NO_LABEL, &mut out).unwrap();
        assert_eq!(out, vec![Tr::new(0, 5, 1.0, 1)]);
        out.clear();
        m.find(0, 3, &mut out).unwrap();
        assert!(out.is_empty());
        assert_eq!(m.priority(0).unwrap(), Some(4));

        let by_output = Matcher::new(&fst, MatchType::Output, &MatcherConfig::default()).unwrap();
        assert!(by_output.is_sorted());
    }

    #[test]
    fn sigma_lookup() {
        let fst = sorted_state();
        let config = MatcherConfig {
            sigma_matcher_config: Some(SigmaMatcherConfig {
                sigma_label: 9,
                rewrite_mode: MatcherRewriteMode::Always,
                sigma_allowed_matches: Some(vec![4]),
            }),
        };
        let m = Matcher::new(&fst, MatchType::Input, &config).unwrap();
        assert!(m.requires_match());
        assert_eq!(m.priority(0).unwrap(), None);
        assert_eq!(m.priority(1).unwrap(), Some(0));

        let mut out: Vec<Tr<W>> = Vec::new();
        m.find(0, 4, &mut out).unwrap();
        assert_eq!(out, vec![Tr::new(4, 4, 0.0, 1)]);
        // exact matches hide sigma
        out.clear();
        m.find(0, 2, &mut out).unwrap();
        assert_eq!(out.len(), 2);
        // not in the allow-list
        out.clear();
        m.find(0, 3, &mut out).unwrap();
        assert!(out.is_empty());
        assert!(m.find(0, 9, &mut out).is_err());
    }

    #[test]
    fn epsilon_sigma_is_rejected() {
        let fst = sorted_state();
        let config = MatcherConfig {
            sigma_matcher_config: Some(SigmaMatcherConfig::new(0, MatcherRewriteMode::Auto)),
        };
        assert!(matches!(
            Matcher::new(&fst, MatchType::Input, &config),
            Err(WfstError::InvalidConfig(_))
        ));
    }
}
