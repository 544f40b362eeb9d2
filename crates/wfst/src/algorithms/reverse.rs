// Reversal of the accepted language.

use crate::fst::{Fst, VectorFst};
use crate::semiring::Semiring;
use crate::tr::Tr;
use crate::{EPS_LABEL, Result};

/// Build a transducer accepting the reverse of every string of `fst`.
///
/// State `s` of the input becomes `s + 1`; the new state 0 is a
/// super-initial state with an epsilon transition, weighted by the final
/// weight, to every former final state. The former start becomes final
/// with weight `one`.
pub fn reverse<W: Semiring, F: Fst<W>>(fst: &F) -> Result<VectorFst<W>> {
    let mut out = VectorFst::new();
    out.copy_symbols_from(fst);
    let Some(start) = fst.start() else {
        return Ok(out);
    };
    out.add_states(fst.num_states() + 1);
    out.set_start_unchecked(0);
    for s in fst.states_iter() {
        if let Some(w) = fst.final_weight(s)? {
            out.push_tr_unchecked(0, Tr::new(EPS_LABEL, EPS_LABEL, w.reverse(), s + 1));
        }
        for tr in fst.get_trs(s)? {
            out.push_tr_unchecked(
                tr.nextstate + 1,
                Tr::new(tr.ilabel, tr.olabel, tr.weight.reverse(), s + 1),
            );
        }
    }
    out.set_final_unchecked(start + 1, W::one());
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::semiring::TropicalWeight;

    #[test]
    fn reverses_linear_transducer() {
        let fst = crate::fst::transducer::<TropicalWeight>(&[1, 2], &[3, 4], TropicalWeight::new(1.5));
        let rev = reverse(&fst).unwrap();
        assert_eq!(rev.num_states(), fst.num_states() + 1);
        assert_eq!(rev.start(), Some(0));
        let paths: Vec<_> = rev.paths_iter().collect();
        assert_eq!(paths.len(), 1);
        assert_eq!(paths[0].ilabels, vec![2, 1]);
        assert_eq!(paths[0].olabels, vec![4, 3]);
        assert_eq!(paths[0].weight, TropicalWeight::new(1.5));
    }

    #[test]
    fn reversing_twice_restores_the_fst() {
        let fst = crate::fst::acceptor::<TropicalWeight>(&[1, 2], TropicalWeight::new(1.5));
        let mut twice = reverse(&reverse(&fst).unwrap()).unwrap();
        assert_eq!(twice.num_states(), fst.num_states() + 2);
        crate::algorithms::rm_epsilon(&mut twice).unwrap();
        assert!(crate::algorithms::isomorphic(&twice, &fst, crate::KDELTA).unwrap());
    }

    #[test]
    fn empty_input_gives_empty_output() {
        let fst = VectorFst::<TropicalWeight>::new();
        let rev = reverse(&fst).unwrap();
        assert_eq!(rev.num_states(), 0);
    }
}
