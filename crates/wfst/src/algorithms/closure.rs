use serde::{Deserialize, Serialize};

use crate::fst::{Fst, VectorFst};
use crate::semiring::Semiring;
use crate::tr::Tr;
use crate::{EPS_LABEL, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClosureType {
    /// Zero or more repetitions.
    Star,
    /// One or more repetitions.
    Plus,
}

/// Kleene closure. In place.
///
/// Every final state gets an epsilon transition back to the start carrying
/// its final weight. `Star` adds a new final start state in front.
pub fn closure<W: Semiring>(fst: &mut VectorFst<W>, closure_type: ClosureType) -> Result<()> {
    let start = fst.start();
    if let Some(start) = start {
        for s in fst.final_states()? {
            if let Some(w) = fst.final_weight(s)? {
                fst.push_tr_unchecked(s, Tr::new(EPS_LABEL, EPS_LABEL, w, start));
            }
        }
    }
    if closure_type == ClosureType::Star {
        let new_start = fst.add_state();
        if let Some(start) = start {
            fst.push_tr_unchecked(new_start, Tr::new(EPS_LABEL, EPS_LABEL, W::one(), start));
        }
        fst.set_start_unchecked(new_start);
        fst.set_final_unchecked(new_start, W::one());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fst::acceptor;
    use crate::semiring::TropicalWeight;

    type W = TropicalWeight;

    #[test]
    fn plus_loops_back() {
        let mut fst = acceptor::<W>(&[1], W::new(1.0));
        closure(&mut fst, ClosureType::Plus).unwrap();
        assert_eq!(fst.num_states(), 2);
        assert_eq!(fst.get_trs(1).unwrap(), &[Tr::new(0, 0, 1.0, 0)]);
        assert!(!fst.is_final(0).unwrap());
    }

    #[test]
    fn star_accepts_empty_string() {
        let mut fst = acceptor::<W>(&[1], W::one());
        closure(&mut fst, ClosureType::Star).unwrap();
        assert_eq!(fst.num_states(), 3);
        assert_eq!(fst.start(), Some(2));
        assert_eq!(fst.final_weight(2).unwrap(), Some(W::one()));

        let mut empty = VectorFst::<W>::new();
        closure(&mut empty, ClosureType::Star).unwrap();
        assert_eq!(empty.num_states(), 1);
        assert!(empty.is_final(0).unwrap());
    }
}
