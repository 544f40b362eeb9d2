// Transition struct and comparators.

use std::cmp::Ordering;

use crate::semiring::Semiring;
use crate::{EPS_LABEL, Label, StateId};

/// A labeled, weighted transition.
///
/// A transition is owned by the state it leaves. Algorithms copy
/// transitions by value; two states never share one.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tr<W> {
    /// Input label (`0` = epsilon).
    pub ilabel: Label,
    /// Output label (`0` = epsilon).
    pub olabel: Label,
    pub weight: W,
    /// Destination state.
    pub nextstate: StateId,
}

impl<W: Semiring> Tr<W> {
    pub fn new(ilabel: Label, olabel: Label, weight: impl Into<W>, nextstate: StateId) -> Self {
        Self {
            ilabel,
            olabel,
            weight: weight.into(),
            nextstate,
        }
    }

    /// Both labels are epsilon.
    #[inline]
    pub fn is_epsilon(&self) -> bool {
        self.ilabel == EPS_LABEL && self.olabel == EPS_LABEL
    }

    /// Replace every field at once.
    pub fn set_value(&mut self, other: &Tr<W>) {
        *self = *other;
    }
}

/// Compare transitions by input label.
#[derive(Debug, Clone, Copy, Default)]
pub struct ILabelCompare;

/// Compare transitions by output label.
#[derive(Debug, Clone, Copy, Default)]
pub struct OLabelCompare;

/// A transition ordering usable with [`crate::algorithms::tr_sort_by`].
pub trait TrCompare {
    fn compare<W: Semiring>(&self, a: &Tr<W>, b: &Tr<W>) -> Ordering;
}

impl TrCompare for ILabelCompare {
    #[inline]
    fn compare<W: Semiring>(&self, a: &Tr<W>, b: &Tr<W>) -> Ordering {
        a.ilabel.cmp(&b.ilabel)
    }
}

impl TrCompare for OLabelCompare {
    #[inline]
    fn compare<W: Semiring>(&self, a: &Tr<W>, b: &Tr<W>) -> Ordering {
        a.olabel.cmp(&b.olabel)
    }
}

/// Total order on `(ilabel, olabel, nextstate)`.
#[inline]
pub(crate) fn cmp_labels_next<W>(a: &Tr<W>, b: &Tr<W>) -> Ordering {
    (a.ilabel, a.olabel, a.nextstate).cmp(&(b.ilabel, b.olabel, b.nextstate))
}

/// Total order on `(ilabel, olabel, nextstate, weight)`.
pub(crate) fn cmp_full<W: Semiring>(a: &Tr<W>, b: &Tr<W>) -> Ordering {
    cmp_labels_next(a, b).then_with(|| a.weight.value().total_cmp(&b.weight.value()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::semiring::TropicalWeight;

    #[test]
    fn epsilon_detection() {
        let t: Tr<TropicalWeight> = Tr::new(0, 0, 1.0, 3);
        assert!(t.is_epsilon());
        let t: Tr<TropicalWeight> = Tr::new(0, 2, 1.0, 3);
        assert!(!t.is_epsilon());
    }

    #[test]
    fn comparators() {
        let a: Tr<TropicalWeight> = Tr::new(1, 5, 0.0, 0);
        let b: Tr<TropicalWeight> = Tr::new(2, 3, 0.0, 0);
        assert_eq!(ILabelCompare.compare(&a, &b), Ordering::Less);
        assert_eq!(OLabelCompare.compare(&a, &b), Ordering::Greater);
    }

    #[test]
    fn full_order_breaks_ties_on_weight() {
        let a: Tr<TropicalWeight> = Tr::new(1, 1, 2.0, 0);
        let b: Tr<TropicalWeight> = Tr::new(1, 1, 1.0, 0);
        assert_eq!(cmp_labels_next(&a, &b), Ordering::Equal);
        assert_eq!(cmp_full(&a, &b), Ordering::Greater);
    }
}
