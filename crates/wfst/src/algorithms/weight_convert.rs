use crate::fst::{Fst, VectorFst};
use crate::semiring::{Semiring, convert_weight};
use crate::tr::Tr;
use crate::Result;

/// Copy `fst` into another semiring through the float value of every
/// weight. Structure and symbol tables are unchanged.
pub fn weight_convert<W1, W2, F>(fst: &F) -> Result<VectorFst<W2>>
where
    W1: Semiring,
    W2: Semiring,
    F: Fst<W1>,
{
    let mut out = VectorFst::<W2>::new();
    out.add_states(fst.num_states());
    for s in fst.states_iter() {
        let trs = fst
            .get_trs(s)?
            .iter()
            .map(|tr| Tr::new(tr.ilabel, tr.olabel, convert_weight::<W1, W2>(tr.weight), tr.nextstate))
            .collect();
        out.set_trs_unchecked(s, trs);
        if let Some(w) = fst.final_weight(s)? {
            out.set_final_unchecked(s, convert_weight(w));
        }
    }
    if let Some(s) = fst.start() {
        out.set_start_unchecked(s);
    }
    out.isymt = fst.input_symbols().cloned();
    out.osymt = fst.output_symbols().cloned();
    Ok(out)
}
