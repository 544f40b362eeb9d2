// Generic optimization pipeline: epsilon removal, determinization and
// minimization chosen from the transducer's properties.

use log::debug;

use super::determinize::determinize;
use super::encode::{EncodeType, decode, encode};
use super::minimize::minimize;
use super::rm_epsilon::rm_epsilon;
use super::tr_sort::tr_sort;
use super::tr_sum::tr_sum;
use super::tr_unique::tr_unique;
use super::weight_convert::weight_convert;
use crate::fst::{Fst, VectorFst};
use crate::properties::FstProperties;
use crate::semiring::{LogWeight, Semiring};
use crate::Result;

/// Determinize then minimize, through an encoding when one is given.
fn determinize_and_minimize<W: Semiring>(
    fst: &mut VectorFst<W>,
    encode_type: Option<EncodeType>,
) -> Result<()> {
    let table = match encode_type {
        Some(t) => Some(encode(fst, t)?),
        None => None,
    };
    *fst = determinize(fst)?;
    minimize(fst)?;
    if let Some(table) = table {
        decode(fst, &table)?;
    }
    Ok(())
}

fn optimize_graph<W: Semiring>(fst: &mut VectorFst<W>, acceptor: bool) -> Result<()> {
    let labels = (!acceptor).then_some(EncodeType::Labels);
    let props = fst.properties()?;
    if !props.contains(FstProperties::I_DETERMINISTIC) {
        if !W::IDEMPOTENT {
            // Determinization may not terminate on cyclic input here.
            if props.contains(FstProperties::ACYCLIC) {
                determinize_and_minimize(fst, labels)?;
            }
        } else if props.contains(FstProperties::WEIGHTED_CYCLES) {
            let with_weights = if acceptor {
                EncodeType::Weights
            } else {
                EncodeType::LabelsAndWeights
            };
            determinize_and_minimize(fst, Some(with_weights))?;
            tr_sum(fst);
        } else {
            determinize_and_minimize(fst, labels)?;
        }
    } else {
        minimize(fst)?;
    }
    Ok(())
}

/// Reduce `fst` to an equivalent, usually smaller, transducer. In place.
///
/// Removes epsilons, merges parallel transitions, then determinizes and
/// minimizes when the semiring and structure allow it. The result has
/// input-sorted transitions without duplicates.
pub fn optimize<W: Semiring>(fst: &mut VectorFst<W>) -> Result<()> {
    let before = (fst.num_states(), fst.num_trs_total());
    let props = fst.properties()?;
    if !props.contains(FstProperties::NO_EPSILONS) {
        rm_epsilon(fst)?;
    }
    tr_sum(fst);
    optimize_graph(fst, props.contains(FstProperties::ACCEPTOR))?;
    tr_unique(fst);
    tr_sort(fst, true);
    debug!(
        "optimize: {} states / {} trs -> {} states / {} trs",
        before.0,
        before.1,
        fst.num_states(),
        fst.num_trs_total()
    );
    Ok(())
}

/// [`optimize`] carried out in the log semiring, so that path weights are
/// summed rather than minimized, then converted back.
pub fn optimize_in_log<W: Semiring>(fst: &mut VectorFst<W>) -> Result<()> {
    let mut log: VectorFst<LogWeight> = weight_convert(fst)?;
    optimize(&mut log)?;
    *fst = weight_convert(&log)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::semiring::TropicalWeight;
    use crate::tr::Tr;

    type W = TropicalWeight;

    fn ambiguous_acceptor() -> VectorFst<W> {
        let mut fst = VectorFst::new();
        fst.add_states(3);
        fst.set_start(0).unwrap();
        fst.add_tr(0, Tr::new(1, 1, 1.0, 1)).unwrap();
        fst.add_tr(0, Tr::new(1, 1, 1.0, 2)).unwrap();
        fst.set_final(1, 0.0).unwrap();
        fst.set_final(2, 0.0).unwrap();
        fst
    }

    #[test]
    fn tropical_collapses_parallel_paths() {
        let mut fst = ambiguous_acceptor();
        optimize(&mut fst).unwrap();
        assert_eq!(fst.num_states(), 2);
        assert_eq!(fst.get_trs(0).unwrap(), &[Tr::new(1, 1, 1.0, 1)]);
        assert_eq!(fst.final_weight(1).unwrap(), Some(W::one()));
    }

    #[test]
    fn log_sums_parallel_paths() {
        let mut fst = ambiguous_acceptor();
        optimize_in_log(&mut fst).unwrap();
        assert_eq!(fst.num_states(), 2);
        let trs = fst.get_trs(0).unwrap();
        assert_eq!(trs.len(), 1);
        let expected = 1.0 - std::f32::consts::LN_2;
        // minimize quantizes to multiples of 1/1024
        assert!((trs[0].weight.value() - expected).abs() < 2e-3);
        assert!(fst.final_weight(1).unwrap().unwrap().value().abs() < 1e-4);
    }

    #[test]
    fn removes_epsilons_and_sorts() {
        let mut fst = VectorFst::<W>::new();
        fst.add_states(3);
        fst.set_start(0).unwrap();
        fst.add_tr(0, Tr::new(0, 0, 0.5, 1)).unwrap();
        fst.add_tr(1, Tr::new(3, 3, 0.0, 2)).unwrap();
        fst.add_tr(0, Tr::new(2, 2, 0.0, 2)).unwrap();
        fst.set_final(2, 0.0).unwrap();
        optimize(&mut fst).unwrap();
        let props = fst.properties().unwrap();
        assert!(props.contains(FstProperties::NO_EPSILONS));
        assert!(props.contains(FstProperties::I_LABEL_SORTED));
        assert!(props.contains(FstProperties::I_DETERMINISTIC));
        let mut paths: Vec<_> = fst
            .paths_iter()
            .map(|p| (p.ilabels, p.weight.value()))
            .collect();
        paths.sort_by(|a, b| a.0.cmp(&b.0));
        assert_eq!(paths, vec![(vec![2], 0.0), (vec![3], 0.5)]);
    }

    #[test]
    fn transducer_output_is_sorted_without_duplicates() {
        let mut fst = VectorFst::<W>::new();
        fst.add_states(3);
        fst.set_start(0).unwrap();
        fst.add_tr(0, Tr::new(3, 4, 1.0, 1)).unwrap();
        fst.add_tr(0, Tr::new(1, 2, 0.5, 2)).unwrap();
        fst.add_tr(0, Tr::new(1, 2, 0.5, 2)).unwrap();
        fst.set_final(1, 0.0).unwrap();
        fst.set_final(2, 0.0).unwrap();
        optimize(&mut fst).unwrap();

        for s in fst.states_iter() {
            let trs = fst.get_trs(s).unwrap();
            assert!(trs.windows(2).all(|w| w[0].ilabel <= w[1].ilabel && w[0] != w[1]));
        }
        assert!(fst.properties().unwrap().contains(FstProperties::I_LABEL_SORTED));
        let mut paths: Vec<_> = fst
            .paths_iter()
            .map(|p| (p.ilabels, p.olabels, p.weight.value()))
            .collect();
        paths.sort_by(|a, b| a.0.cmp(&b.0));
        assert_eq!(paths, vec![(vec![1], vec![2], 0.5), (vec![3], vec![4], 1.0)]);
    }
}
