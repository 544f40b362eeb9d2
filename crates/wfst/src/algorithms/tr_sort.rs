// Per-state transition sorting.

use crate::fst::{Fst, VectorFst};
use crate::semiring::Semiring;
use crate::tr::{ILabelCompare, OLabelCompare, TrCompare};

/// Stable-sort each state's transitions by input label (`ilabel_cmp`) or
/// by output label. Ties keep their relative order.
pub fn tr_sort<W: Semiring>(fst: &mut VectorFst<W>, ilabel_cmp: bool) {
    if ilabel_cmp {
        tr_sort_by(fst, ILabelCompare);
    } else {
        tr_sort_by(fst, OLabelCompare);
    }
}

/// Stable-sort each state's transitions with a custom comparator.
pub fn tr_sort_by<W: Semiring, C: TrCompare>(fst: &mut VectorFst<W>, cmp: C) {
    for s in fst.states_iter() {
        fst.modify_trs(s, |trs| trs.sort_by(|a, b| cmp.compare(a, b)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::properties::FstProperties;
    use crate::semiring::TropicalWeight;
    use crate::tr::Tr;

    #[test]
    fn sort_is_stable() {
        let mut fst = VectorFst::<TropicalWeight>::new();
        fst.add_states(2);
        fst.set_start(0).unwrap();
        fst.add_tr(0, Tr::new(2, 1, 0.0, 1)).unwrap();
        fst.add_tr(0, Tr::new(1, 9, 0.0, 1)).unwrap();
        fst.add_tr(0, Tr::new(2, 0, 0.0, 0)).unwrap();
        fst.add_tr(0, Tr::new(1, 3, 0.0, 0)).unwrap();

        tr_sort(&mut fst, true);
        let olabels: Vec<_> = fst.get_trs(0).unwrap().iter().map(|t| t.olabel).collect();
        assert_eq!(olabels, vec![9, 3, 1, 0]);
        assert!(fst.properties().unwrap().contains(FstProperties::I_LABEL_SORTED));

        tr_sort(&mut fst, false);
        let ilabels: Vec<_> = fst.get_trs(0).unwrap().iter().map(|t| t.ilabel).collect();
        assert_eq!(ilabels, vec![2, 2, 1, 1]);
        assert!(fst.properties().unwrap().contains(FstProperties::O_LABEL_SORTED));
    }
}
