// Weight and label pushing.

use log::debug;
use serde::{Deserialize, Serialize};

use super::shortest_distance::{
    ShortestDistanceConfig, reverse_shortest_distance, shortest_distance_with_config,
};
use super::{add_output_chain, has_incoming};
use crate::fst::{Fst, VectorFst};
use crate::semiring::Semiring;
use crate::tr::Tr;
use crate::{EPS_LABEL, KDELTA, Label, Result, StateId};

/// Direction of a reweighting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReweightType {
    ToInitial,
    ToFinal,
}

/// What to push and where.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PushConfig {
    /// Push toward the final states instead of the initial state.
    pub to_final: bool,
    pub push_weights: bool,
    pub push_labels: bool,
    /// Divide the total weight out of the result.
    pub remove_total_weight: bool,
    /// Drop the output prefix (or suffix) shared by every path.
    pub remove_common_affix: bool,
    pub delta: f32,
}

impl Default for PushConfig {
    fn default() -> Self {
        Self {
            to_final: false,
            push_weights: true,
            push_labels: false,
            remove_total_weight: false,
            remove_common_affix: false,
            delta: KDELTA,
        }
    }
}

impl PushConfig {
    pub fn reweight_type(&self) -> ReweightType {
        if self.to_final {
            ReweightType::ToFinal
        } else {
            ReweightType::ToInitial
        }
    }
}

/// Reweight with per-state potentials. States beyond the end of
/// `potentials` have potential `zero`.
///
/// - `ToInitial`: `w' = d(p)⁻¹ ⊗ w ⊗ d(q)` and `f' = d(p)⁻¹ ⊗ f`.
/// - `ToFinal`: `w' = d(p) ⊗ w ⊗ d(q)⁻¹` and `f' = f ⊗ d(p)`.
///
/// The start potential is then multiplied back in front of the start state
/// (divided out for `ToFinal`), directly if nothing enters the start and
/// through a new start state otherwise.
pub fn reweight<W: Semiring>(
    fst: &mut VectorFst<W>,
    potentials: &[W],
    reweight_type: ReweightType,
) -> Result<()> {
    let Some(start) = fst.start() else {
        return Ok(());
    };
    let pot = |s: StateId| potentials.get(s as usize).copied().unwrap_or_else(W::zero);

    for s in fst.states_iter() {
        let ps = pot(s);
        if !ps.is_zero() {
            let mut trs = fst.pop_trs(s)?;
            for tr in &mut trs {
                let pn = pot(tr.nextstate);
                if pn.is_zero() {
                    continue;
                }
                tr.weight = match reweight_type {
                    ReweightType::ToInitial => tr.weight.times(pn).divide(ps)?,
                    ReweightType::ToFinal => ps.times(tr.weight).divide(pn)?,
                };
            }
            fst.set_trs_unchecked(s, trs);
            if reweight_type == ReweightType::ToInitial {
                if let Some(f) = fst.final_weight(s)? {
                    fst.set_final_unchecked(s, f.divide(ps)?);
                }
            }
        }
        if reweight_type == ReweightType::ToFinal {
            if let Some(f) = fst.final_weight(s)? {
                let f = f.times(ps);
                if f.is_zero() {
                    fst.unset_final(s)?;
                } else {
                    fst.set_final_unchecked(s, f);
                }
            }
        }
    }

    let start_weight = pot(start);
    if start_weight.is_one() || start_weight.is_zero() {
        return Ok(());
    }
    let factor = match reweight_type {
        ReweightType::ToInitial => start_weight,
        ReweightType::ToFinal => W::one().divide(start_weight)?,
    };
    if has_incoming(fst, start)? {
        let new_start = fst.add_state();
        fst.push_tr_unchecked(new_start, Tr::new(EPS_LABEL, EPS_LABEL, factor, start));
        fst.set_start_unchecked(new_start);
    } else {
        fst.modify_trs(start, |trs| {
            for tr in trs {
                tr.weight = factor.times(tr.weight);
            }
        });
        if let Some(f) = fst.final_weight(start)? {
            fst.set_final_unchecked(start, factor.times(f));
        }
    }
    Ok(())
}

/// Push weights toward the initial or the final states.
pub fn push_weights<W: Semiring>(fst: &mut VectorFst<W>, reweight_type: ReweightType) -> Result<()> {
    push_weights_with_delta(fst, reweight_type, KDELTA, false)
}

fn push_weights_with_delta<W: Semiring>(
    fst: &mut VectorFst<W>,
    reweight_type: ReweightType,
    delta: f32,
    remove_total_weight: bool,
) -> Result<()> {
    let Some(start) = fst.start() else {
        return Ok(());
    };
    let (distance, total) = match reweight_type {
        ReweightType::ToInitial => {
            let distance = reverse_shortest_distance(fst, delta)?;
            let total = distance[start as usize];
            (distance, total)
        }
        ReweightType::ToFinal => {
            let config = ShortestDistanceConfig::new(delta, None);
            let distance = shortest_distance_with_config(fst, config)?;
            let mut total = W::zero();
            for s in fst.states_iter() {
                if let Some(f) = fst.final_weight(s)? {
                    total.plus_assign(distance[s as usize].times(f));
                }
            }
            (distance, total)
        }
    };
    reweight(fst, &distance, reweight_type)?;
    if remove_total_weight {
        remove_weight(fst, total, reweight_type == ReweightType::ToFinal)?;
    }
    Ok(())
}

/// Divide `weight` out of every final weight (`at_final`) or out of the
/// start state.
fn remove_weight<W: Semiring>(fst: &mut VectorFst<W>, weight: W, at_final: bool) -> Result<()> {
    if weight.is_one() || weight.is_zero() {
        return Ok(());
    }
    debug!("push: removing total weight {weight}");
    if at_final {
        for s in fst.states_iter() {
            if let Some(f) = fst.final_weight(s)? {
                fst.set_final_unchecked(s, f.divide(weight)?);
            }
        }
    } else if let Some(start) = fst.start() {
        let mut trs = fst.pop_trs(start)?;
        for tr in &mut trs {
            tr.weight = tr.weight.divide(weight)?;
        }
        fst.set_trs_unchecked(start, trs);
        if let Some(f) = fst.final_weight(start)? {
            fst.set_final_unchecked(start, f.divide(weight)?);
        }
    }
    Ok(())
}

/// Push weights and/or output labels as configured. In place.
pub fn push<W: Semiring>(fst: &mut VectorFst<W>, config: PushConfig) -> Result<()> {
    let reweight_type = config.reweight_type();
    if config.push_weights {
        push_weights_with_delta(fst, reweight_type, config.delta, config.remove_total_weight)?;
    }
    if config.push_labels {
        match reweight_type {
            ReweightType::ToInitial => push_labels_to_initial(fst, config.remove_common_affix)?,
            ReweightType::ToFinal => push_labels_to_final(fst, config.remove_common_affix)?,
        }
    }
    Ok(())
}

fn common_prefix_len(a: &[Label], b: &[Label]) -> usize {
    a.iter().zip(b).take_while(|(x, y)| x == y).count()
}

fn common_suffix_len(a: &[Label], b: &[Label]) -> usize {
    a.iter().rev().zip(b.iter().rev()).take_while(|(x, y)| x == y).count()
}

fn output_of<W>(tr: &Tr<W>) -> Option<Label> {
    (tr.olabel != EPS_LABEL).then_some(tr.olabel)
}

/// For every state, the longest common prefix of the outputs of its paths
/// to a final state. `None` for states that reach no final state.
fn prefix_potentials<W: Semiring>(fst: &VectorFst<W>) -> Result<Vec<Option<Vec<Label>>>> {
    let mut pot: Vec<Option<Vec<Label>>> = vec![None; fst.num_states()];
    loop {
        let mut changed = false;
        for s in fst.states_iter().rev() {
            let mut acc: Option<Vec<Label>> = fst.is_final(s)?.then(Vec::new);
            for tr in fst.get_trs(s)? {
                let Some(next) = &pot[tr.nextstate as usize] else {
                    continue;
                };
                let candidate: Vec<Label> = output_of(tr).into_iter().chain(next.iter().copied()).collect();
                acc = Some(match acc {
                    None => candidate,
                    Some(mut a) => {
                        a.truncate(common_prefix_len(&a, &candidate));
                        a
                    }
                });
            }
            if acc != pot[s as usize] {
                pot[s as usize] = acc;
                changed = true;
            }
        }
        if !changed {
            return Ok(pot);
        }
    }
}

/// For every state, the longest common suffix of the outputs of the paths
/// reaching it from the start. `None` for inaccessible states.
fn suffix_potentials<W: Semiring>(fst: &VectorFst<W>, start: StateId) -> Result<Vec<Option<Vec<Label>>>> {
    let n = fst.num_states();
    let mut pot: Vec<Option<Vec<Label>>> = vec![None; n];
    pot[start as usize] = Some(Vec::new());
    loop {
        let mut next_pot: Vec<Option<Vec<Label>>> = vec![None; n];
        next_pot[start as usize] = Some(Vec::new());
        for s in fst.states_iter() {
            let Some(prefix) = &pot[s as usize] else {
                continue;
            };
            for tr in fst.get_trs(s)? {
                let mut candidate = prefix.clone();
                candidate.extend(output_of(tr));
                let slot = &mut next_pot[tr.nextstate as usize];
                *slot = Some(match slot.take() {
                    None => candidate,
                    Some(mut a) => {
                        let keep = common_suffix_len(&a, &candidate);
                        a.drain(..a.len() - keep);
                        a
                    }
                });
            }
        }
        if next_pot == pot {
            return Ok(pot);
        }
        pot = next_pot;
    }
}

fn push_labels_to_initial<W: Semiring>(fst: &mut VectorFst<W>, remove_common_affix: bool) -> Result<()> {
    let Some(start) = fst.start() else {
        return Ok(());
    };
    let pot = prefix_potentials(fst)?;
    for s in fst.states_iter() {
        let Some(ps) = &pot[s as usize] else {
            continue;
        };
        let trs = fst.pop_trs(s)?;
        for tr in trs {
            match &pot[tr.nextstate as usize] {
                Some(pn) => {
                    let full: Vec<Label> = output_of(&tr).into_iter().chain(pn.iter().copied()).collect();
                    add_output_chain(fst, s, tr.ilabel, &full[ps.len()..], tr.weight, tr.nextstate);
                }
                None => fst.push_tr_unchecked(s, tr),
            }
        }
    }
    if let Some(prefix) = &pot[start as usize] {
        if !prefix.is_empty() && !remove_common_affix {
            let new_start = fst.add_state();
            add_output_chain(fst, new_start, EPS_LABEL, prefix, W::one(), start);
            fst.set_start_unchecked(new_start);
        }
    }
    Ok(())
}

fn push_labels_to_final<W: Semiring>(fst: &mut VectorFst<W>, remove_common_affix: bool) -> Result<()> {
    let Some(start) = fst.start() else {
        return Ok(());
    };
    let pot = suffix_potentials(fst, start)?;
    let finals: Vec<StateId> = fst
        .final_states()?
        .into_iter()
        .filter(|&s| pot[s as usize].is_some())
        .collect();
    let common = if remove_common_affix {
        finals
            .iter()
            .filter_map(|&s| pot[s as usize].as_deref())
            .reduce(|a, b| &a[a.len() - common_suffix_len(a, b)..])
            .map_or(0, <[Label]>::len)
    } else {
        0
    };

    for s in fst.states_iter() {
        let Some(ps) = &pot[s as usize] else {
            continue;
        };
        let trs = fst.pop_trs(s)?;
        for tr in trs {
            match &pot[tr.nextstate as usize] {
                Some(pn) => {
                    let full: Vec<Label> = ps.iter().copied().chain(output_of(&tr)).collect();
                    let keep = full.len() - pn.len();
                    add_output_chain(fst, s, tr.ilabel, &full[..keep], tr.weight, tr.nextstate);
                }
                None => fst.push_tr_unchecked(s, tr),
            }
        }
    }
    for s in finals {
        let Some(ps) = &pot[s as usize] else {
            continue;
        };
        let tail = &ps[..ps.len() - common];
        if tail.is_empty() {
            continue;
        }
        if let Some(f) = fst.take_final_weight(s)? {
            let new_final = fst.add_state();
            add_output_chain(fst, s, EPS_LABEL, tail, W::one(), new_final);
            fst.set_final_unchecked(new_final, f);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::semiring::{LogWeight, TropicalWeight};

    type W = TropicalWeight;

    fn weighted() -> VectorFst<W> {
        let mut fst = VectorFst::new();
        fst.add_states(4);
        fst.set_start(0).unwrap();
        fst.add_tr(0, Tr::new(1, 1, 1.0, 1)).unwrap();
        fst.add_tr(0, Tr::new(2, 2, 2.0, 2)).unwrap();
        fst.add_tr(1, Tr::new(3, 3, 3.0, 3)).unwrap();
        fst.add_tr(2, Tr::new(4, 4, 1.0, 3)).unwrap();
        fst.set_final(3, 1.0).unwrap();
        fst
    }

    fn path_weights(fst: &VectorFst<W>) -> Vec<f32> {
        let mut w: Vec<f32> = fst.paths_iter().map(|p| p.weight.value()).collect();
        w.sort_by(f32::total_cmp);
        w
    }

    #[test]
    fn push_to_initial() {
        let mut fst = weighted();
        push_weights(&mut fst, ReweightType::ToInitial).unwrap();
        // The start carries the total weight.
        assert_eq!(fst.get_trs(0).unwrap()[0].weight, W::new(5.0));
        assert_eq!(fst.get_trs(0).unwrap()[1].weight, W::new(4.0));
        assert_eq!(fst.get_trs(1).unwrap()[0].weight, W::new(0.0));
        assert_eq!(fst.final_weight(3).unwrap(), Some(W::one()));
        assert_eq!(path_weights(&fst), vec![4.0, 5.0]);
        assert_eq!(path_weights(&weighted()), vec![4.0, 5.0]);
    }

    #[test]
    fn push_to_initial_removing_total() {
        let mut fst = weighted();
        let config = PushConfig {
            remove_total_weight: true,
            ..PushConfig::default()
        };
        push(&mut fst, config).unwrap();
        assert_eq!(path_weights(&fst), vec![0.0, 1.0]);
    }

    #[test]
    fn push_to_final() {
        let mut fst = weighted();
        push_weights(&mut fst, ReweightType::ToFinal).unwrap();
        assert_eq!(fst.get_trs(0).unwrap()[0].weight, W::one());
        assert_eq!(fst.final_weight(3).unwrap(), Some(W::new(4.0)));
        assert_eq!(path_weights(&fst), vec![4.0, 5.0]);

        let config = PushConfig {
            to_final: true,
            remove_total_weight: true,
            ..PushConfig::default()
        };
        push(&mut fst, config).unwrap();
        assert_eq!(fst.final_weight(3).unwrap(), Some(W::one()));
        assert_eq!(path_weights(&fst), vec![0.0, 1.0]);
    }

    #[test]
    fn start_with_incoming_gets_new_start() {
        let mut fst = VectorFst::<W>::new();
        fst.add_states(2);
        fst.set_start(0).unwrap();
        fst.add_tr(0, Tr::new(1, 1, 2.0, 1)).unwrap();
        fst.add_tr(1, Tr::new(2, 2, 1.0, 0)).unwrap();
        fst.set_final(1, 3.0).unwrap();
        push_weights(&mut fst, ReweightType::ToInitial).unwrap();
        assert_eq!(fst.num_states(), 3);
        assert_eq!(fst.start(), Some(2));
        assert_eq!(fst.get_trs(2).unwrap(), &[Tr::new(0, 0, 5.0, 0)]);
    }

    #[test]
    fn reweight_with_short_potentials() {
        let mut fst = weighted();
        let before = fst.clone();
        reweight(&mut fst, &[], ReweightType::ToInitial).unwrap();
        assert_eq!(fst, before);
    }

    #[test]
    fn log_push_normalizes_outgoing_mass() {
        let mut fst = VectorFst::<LogWeight>::new();
        fst.add_states(2);
        fst.set_start(0).unwrap();
        fst.add_tr(0, Tr::new(1, 1, 1.0, 1)).unwrap();
        fst.add_tr(0, Tr::new(2, 2, 1.0, 1)).unwrap();
        fst.set_final(1, 0.0).unwrap();
        let config = PushConfig {
            remove_total_weight: true,
            ..PushConfig::default()
        };
        push(&mut fst, config).unwrap();
        let mass = fst
            .get_trs(0)
            .unwrap()
            .iter()
            .fold(LogWeight::zero(), |acc, tr| acc.plus(tr.weight));
        assert!(mass.value().abs() < 1e-4);
    }

    #[test]
    fn labels_to_initial() {
        // Both paths output "5 6 ..."; the shared prefix moves up front.
        let mut fst = VectorFst::<W>::new();
        fst.add_states(4);
        fst.set_start(0).unwrap();
        fst.add_tr(0, Tr::new(1, 0, 0.0, 1)).unwrap();
        fst.add_tr(0, Tr::new(2, 5, 0.0, 2)).unwrap();
        fst.add_tr(1, Tr::new(3, 5, 0.0, 3)).unwrap();
        fst.add_tr(2, Tr::new(4, 0, 0.0, 3)).unwrap();
        fst.set_final(3, 0.0).unwrap();
        let config = PushConfig {
            push_weights: false,
            push_labels: true,
            ..PushConfig::default()
        };
        push(&mut fst, config).unwrap();
        assert_eq!(fst.start(), Some(4));
        assert_eq!(fst.get_trs(4).unwrap(), &[Tr::new(0, 5, 0.0, 0)]);
        for s in 0..4 {
            assert!(fst.get_trs(s).unwrap().iter().all(|t| t.olabel == 0));
        }
        let mut outputs: Vec<Vec<Label>> = fst.paths_iter().map(|p| p.olabels).collect();
        outputs.dedup();
        assert_eq!(outputs, vec![vec![5]]);
    }

    #[test]
    fn labels_to_final_with_common_suffix_removed() {
        let mut fst = VectorFst::<W>::new();
        fst.add_states(3);
        fst.set_start(0).unwrap();
        fst.add_tr(0, Tr::new(1, 7, 0.0, 1)).unwrap();
        fst.add_tr(1, Tr::new(2, 0, 0.0, 2)).unwrap();
        fst.set_final(2, 0.0).unwrap();

        let mut kept = fst.clone();
        let config = PushConfig {
            to_final: true,
            push_weights: false,
            push_labels: true,
            ..PushConfig::default()
        };
        push(&mut kept, config).unwrap();
        let paths: Vec<_> = kept.paths_iter().collect();
        assert_eq!(paths.len(), 1);
        assert_eq!(paths[0].olabels, vec![7]);
        assert_eq!(kept.get_trs(0).unwrap()[0].olabel, 0);

        let config = PushConfig {
            remove_common_affix: true,
            ..config
        };
        push(&mut fst, config).unwrap();
        let paths: Vec<_> = fst.paths_iter().collect();
        assert_eq!(paths[0].olabels, Vec::<Label>::new());
    }
}
