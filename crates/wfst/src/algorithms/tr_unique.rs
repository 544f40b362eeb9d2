// Removal of duplicate transitions.

use crate::fst::{Fst, VectorFst};
use crate::semiring::Semiring;
use crate::tr::cmp_full;

/// Sort each state's transitions by `(ilabel, olabel, nextstate, weight)`
/// and drop exact duplicates. Transitions that differ only in weight are
/// kept.
pub fn tr_unique<W: Semiring>(fst: &mut VectorFst<W>) {
    for s in fst.states_iter() {
        fst.modify_trs(s, |trs| {
            trs.sort_by(cmp_full);
            trs.dedup();
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::semiring::TropicalWeight;
    use crate::tr::Tr;

    #[test]
    fn drops_only_exact_duplicates() {
        let mut fst = VectorFst::<TropicalWeight>::new();
        fst.add_states(2);
        fst.set_start(0).unwrap();
        fst.set_final(1, 0.0).unwrap();
        fst.add_tr(0, Tr::new(2, 2, 1.0, 1)).unwrap();
        fst.add_tr(0, Tr::new(1, 2, 1.0, 1)).unwrap();
        fst.add_tr(0, Tr::new(1, 2, 2.0, 1)).unwrap();
        fst.add_tr(0, Tr::new(1, 2, 1.0, 1)).unwrap();

        tr_unique(&mut fst);
        let trs = fst.get_trs(0).unwrap();
        assert_eq!(
            trs,
            &[
                Tr::new(1, 2, 1.0, 1),
                Tr::new(1, 2, 2.0, 1),
                Tr::new(2, 2, 1.0, 1),
            ]
        );
    }

    #[test]
    fn distinct_destinations_survive() {
        let mut fst = VectorFst::<TropicalWeight>::new();
        fst.add_states(3);
        fst.add_tr(0, Tr::new(1, 1, 1.0, 2)).unwrap();
        fst.add_tr(0, Tr::new(1, 1, 1.0, 1)).unwrap();
        tr_unique(&mut fst);
        let next: Vec<_> = fst.get_trs(0).unwrap().iter().map(|t| t.nextstate).collect();
        assert_eq!(next, vec![1, 2]);
    }
}
