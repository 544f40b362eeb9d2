use crate::fst::VectorFst;
use crate::semiring::Semiring;

/// Swap input and output labels of every transition, and the two symbol
/// tables. In place.
pub fn invert<W: Semiring>(fst: &mut VectorFst<W>) {
    fst.map_all_trs(|tr| std::mem::swap(&mut tr.ilabel, &mut tr.olabel));
    std::mem::swap(&mut fst.isymt, &mut fst.osymt);
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::fst::Fst;
    use crate::semiring::TropicalWeight;
    use crate::symbol_table::SymbolTable;
    use crate::tr::Tr;

    #[test]
    fn swaps_labels_and_tables() {
        let mut fst = VectorFst::<TropicalWeight>::new();
        fst.add_states(2);
        fst.add_tr(0, Tr::new(0, 3, 1.0, 1)).unwrap();
        fst.set_input_symbols(Arc::new(SymbolTable::from_symbols(["a"])));
        invert(&mut fst);
        assert_eq!(fst.get_trs(0).unwrap()[0], Tr::new(3, 0, 1.0, 1));
        assert_eq!(fst.num_input_epsilons(0).unwrap(), 0);
        assert_eq!(fst.num_output_epsilons(0).unwrap(), 1);
        assert!(fst.input_symbols().is_none());
        assert_eq!(fst.output_symbols().unwrap().get_label("a"), Some(1));
    }
}
