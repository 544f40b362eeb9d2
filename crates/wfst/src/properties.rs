// Structural properties of a transducer, computed on demand.

use std::fmt;
use std::ops::{BitAnd, BitOr, BitOrAssign};

use crate::fst::Fst;
use crate::semiring::Semiring;
use crate::{EPS_LABEL, Result, StateId};

/// Property bit set. Bit positions follow the OpenFST property layout so
/// the value can be stored verbatim in binary headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct FstProperties(u64);

impl FstProperties {
    pub const EXPANDED: Self = Self(0x1);
    pub const MUTABLE: Self = Self(0x2);
    pub const ACCEPTOR: Self = Self(0x1_0000);
    pub const NOT_ACCEPTOR: Self = Self(0x2_0000);
    pub const I_DETERMINISTIC: Self = Self(0x4_0000);
    pub const NON_I_DETERMINISTIC: Self = Self(0x8_0000);
    pub const O_DETERMINISTIC: Self = Self(0x10_0000);
    pub const NON_O_DETERMINISTIC: Self = Self(0x20_0000);
    pub const EPSILONS: Self = Self(0x40_0000);
    pub const NO_EPSILONS: Self = Self(0x80_0000);
    pub const I_EPSILONS: Self = Self(0x100_0000);
    pub const NO_I_EPSILONS: Self = Self(0x200_0000);
    pub const O_EPSILONS: Self = Self(0x400_0000);
    pub const NO_O_EPSILONS: Self = Self(0x800_0000);
    pub const I_LABEL_SORTED: Self = Self(0x1000_0000);
    pub const NOT_I_LABEL_SORTED: Self = Self(0x2000_0000);
    pub const O_LABEL_SORTED: Self = Self(0x4000_0000);
    pub const NOT_O_LABEL_SORTED: Self = Self(0x8000_0000);
    pub const WEIGHTED: Self = Self(0x1_0000_0000);
    pub const UNWEIGHTED: Self = Self(0x2_0000_0000);
    pub const CYCLIC: Self = Self(0x4_0000_0000);
    pub const ACYCLIC: Self = Self(0x8_0000_0000);
    pub const INITIAL_CYCLIC: Self = Self(0x10_0000_0000);
    pub const INITIAL_ACYCLIC: Self = Self(0x20_0000_0000);
    pub const TOP_SORTED: Self = Self(0x40_0000_0000);
    pub const NOT_TOP_SORTED: Self = Self(0x80_0000_0000);
    pub const ACCESSIBLE: Self = Self(0x100_0000_0000);
    pub const NOT_ACCESSIBLE: Self = Self(0x200_0000_0000);
    pub const COACCESSIBLE: Self = Self(0x400_0000_0000);
    pub const NOT_COACCESSIBLE: Self = Self(0x800_0000_0000);
    pub const STRING: Self = Self(0x1000_0000_0000);
    pub const NOT_STRING: Self = Self(0x2000_0000_0000);
    pub const WEIGHTED_CYCLES: Self = Self(0x4000_0000_0000);
    pub const UNWEIGHTED_CYCLES: Self = Self(0x8000_0000_0000);

    const NAMES: [(Self, &'static str); 32] = [
        (Self::ACCEPTOR, "acceptor"),
        (Self::NOT_ACCEPTOR, "not acceptor"),
        (Self::I_DETERMINISTIC, "input deterministic"),
        (Self::NON_I_DETERMINISTIC, "non input deterministic"),
        (Self::O_DETERMINISTIC, "output deterministic"),
        (Self::NON_O_DETERMINISTIC, "non output deterministic"),
        (Self::EPSILONS, "epsilons"),
        (Self::NO_EPSILONS, "no epsilons"),
        (Self::I_EPSILONS, "input epsilons"),
        (Self::NO_I_EPSILONS, "no input epsilons"),
        (Self::O_EPSILONS, "output epsilons"),
        (Self::NO_O_EPSILONS, "no output epsilons"),
        (Self::I_LABEL_SORTED, "input label sorted"),
        (Self::NOT_I_LABEL_SORTED, "not input label sorted"),
        (Self::O_LABEL_SORTED, "output label sorted"),
        (Self::NOT_O_LABEL_SORTED, "not output label sorted"),
        (Self::WEIGHTED, "weighted"),
        (Self::UNWEIGHTED, "unweighted"),
        (Self::CYCLIC, "cyclic"),
        (Self::ACYCLIC, "acyclic"),
        (Self::INITIAL_CYCLIC, "initial cyclic"),
        (Self::INITIAL_ACYCLIC, "initial acyclic"),
        (Self::TOP_SORTED, "top sorted"),
        (Self::NOT_TOP_SORTED, "not top sorted"),
        (Self::ACCESSIBLE, "accessible"),
        (Self::NOT_ACCESSIBLE, "not accessible"),
        (Self::COACCESSIBLE, "coaccessible"),
        (Self::NOT_COACCESSIBLE, "not coaccessible"),
        (Self::STRING, "string"),
        (Self::NOT_STRING, "not string"),
        (Self::WEIGHTED_CYCLES, "weighted cycles"),
        (Self::UNWEIGHTED_CYCLES, "unweighted cycles"),
    ];

    #[inline]
    pub const fn empty() -> Self {
        Self(0)
    }

    #[inline]
    pub const fn bits(&self) -> u64 {
        self.0
    }

    #[inline]
    pub const fn from_bits(bits: u64) -> Self {
        Self(bits)
    }

    #[inline]
    pub const fn contains(&self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    #[inline]
    pub fn insert(&mut self, other: Self) {
        self.0 |= other.0;
    }

    /// Names of the set properties.
    pub fn names(&self) -> Vec<&'static str> {
        Self::NAMES
            .iter()
            .filter(|(p, _)| self.contains(*p))
            .map(|&(_, n)| n)
            .collect()
    }
}

impl BitOr for FstProperties {
    type Output = Self;
    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for FstProperties {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl BitAnd for FstProperties {
    type Output = Self;
    fn bitand(self, rhs: Self) -> Self {
        Self(self.0 & rhs.0)
    }
}

impl fmt::Display for FstProperties {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.names().join(", "))
    }
}

/// Strongly connected components by Tarjan's algorithm, iterative.
///
/// Returns the component id of every state and the number of components.
/// Components are numbered in reverse topological order: a component only
/// has transitions into components with a smaller or equal id.
pub(crate) fn strongly_connected_components<W, F>(fst: &F) -> Result<(Vec<usize>, usize)>
where
    W: Semiring,
    F: Fst<W>,
{
    const UNVISITED: usize = usize::MAX;
    let n = fst.num_states();
    let mut index = vec![UNVISITED; n];
    let mut lowlink = vec![0usize; n];
    let mut on_stack = vec![false; n];
    let mut comp = vec![UNVISITED; n];
    let mut stack: Vec<usize> = Vec::new();
    let mut next_index = 0;
    let mut ncomp = 0;

    for root in 0..n {
        if index[root] != UNVISITED {
            continue;
        }
        index[root] = next_index;
        lowlink[root] = next_index;
        next_index += 1;
        stack.push(root);
        on_stack[root] = true;
        let mut call: Vec<(usize, usize)> = vec![(root, 0)];

        while let Some(frame) = call.last_mut() {
            let (v, pos) = *frame;
            let trs = fst.get_trs(v as StateId)?;
            if pos < trs.len() {
                frame.1 += 1;
                let w = trs[pos].nextstate as usize;
                if index[w] == UNVISITED {
                    index[w] = next_index;
                    lowlink[w] = next_index;
                    next_index += 1;
                    stack.push(w);
                    on_stack[w] = true;
                    call.push((w, 0));
                } else if on_stack[w] {
                    lowlink[v] = lowlink[v].min(index[w]);
                }
            } else {
                call.pop();
                if let Some(&(u, _)) = call.last() {
                    lowlink[u] = lowlink[u].min(lowlink[v]);
                }
                if lowlink[v] == index[v] {
                    while let Some(w) = stack.pop() {
                        on_stack[w] = false;
                        comp[w] = ncomp;
                        if w == v {
                            break;
                        }
                    }
                    ncomp += 1;
                }
            }
        }
    }
    Ok((comp, ncomp))
}

/// States reachable from the start state.
pub(crate) fn accessible_states<W: Semiring, F: Fst<W>>(fst: &F) -> Result<Vec<bool>> {
    let mut seen = vec![false; fst.num_states()];
    let Some(start) = fst.start() else {
        return Ok(seen);
    };
    let mut stack = vec![start];
    seen[start as usize] = true;
    while let Some(s) = stack.pop() {
        for tr in fst.get_trs(s)? {
            let n = tr.nextstate as usize;
            if !seen[n] {
                seen[n] = true;
                stack.push(tr.nextstate);
            }
        }
    }
    Ok(seen)
}

/// States from which some final state is reachable.
pub(crate) fn coaccessible_states<W: Semiring, F: Fst<W>>(fst: &F) -> Result<Vec<bool>> {
    let n = fst.num_states();
    let mut reverse_adj: Vec<Vec<StateId>> = vec![Vec::new(); n];
    let mut stack = Vec::new();
    let mut seen = vec![false; n];
    for s in fst.states_iter() {
        for tr in fst.get_trs(s)? {
            reverse_adj[tr.nextstate as usize].push(s);
        }
        if fst.is_final(s)? {
            seen[s as usize] = true;
            stack.push(s);
        }
    }
    while let Some(s) = stack.pop() {
        for &p in &reverse_adj[s as usize] {
            if !seen[p as usize] {
                seen[p as usize] = true;
                stack.push(p);
            }
        }
    }
    Ok(seen)
}

/// Inspect the whole transducer and return its properties.
pub fn compute_properties<W: Semiring, F: Fst<W>>(fst: &F) -> Result<FstProperties> {
    let mut acceptor = true;
    let mut ideterministic = true;
    let mut odeterministic = true;
    let mut epsilons = false;
    let mut iepsilons = false;
    let mut oepsilons = false;
    let mut ilabel_sorted = true;
    let mut olabel_sorted = true;
    let mut weighted = false;
    let mut top_sorted = true;
    let mut string = fst.start().is_some();

    let mut ilabels = Vec::new();
    let mut olabels = Vec::new();
    for s in fst.states_iter() {
        let trs = fst.get_trs(s)?;
        ilabels.clear();
        olabels.clear();
        for (i, tr) in trs.iter().enumerate() {
            acceptor &= tr.ilabel == tr.olabel;
            if tr.ilabel == EPS_LABEL && tr.olabel == EPS_LABEL {
                epsilons = true;
            }
            iepsilons |= tr.ilabel == EPS_LABEL;
            oepsilons |= tr.olabel == EPS_LABEL;
            if i > 0 {
                ilabel_sorted &= trs[i - 1].ilabel <= tr.ilabel;
                olabel_sorted &= trs[i - 1].olabel <= tr.olabel;
            }
            weighted |= !tr.weight.is_one() && !tr.weight.is_zero();
            top_sorted &= tr.nextstate > s;
            ilabels.push(tr.ilabel);
            olabels.push(tr.olabel);
        }
        ilabels.sort_unstable();
        olabels.sort_unstable();
        ideterministic &= ilabels.windows(2).all(|w| w[0] != w[1]);
        odeterministic &= olabels.windows(2).all(|w| w[0] != w[1]);

        let final_weight = fst.final_weight(s)?;
        if let Some(fw) = final_weight {
            weighted |= !fw.is_one() && !fw.is_zero();
        }
        string &= trs.len() + usize::from(final_weight.is_some()) <= 1;
    }

    let (comp, ncomp) = strongly_connected_components(fst)?;
    let mut comp_size = vec![0usize; ncomp];
    for &c in &comp {
        comp_size[c] += 1;
    }
    let mut cyclic = false;
    let mut weighted_cycles = false;
    let mut cyclic_comp = vec![false; ncomp];
    for s in fst.states_iter() {
        for tr in fst.get_trs(s)? {
            let (cs, cn) = (comp[s as usize], comp[tr.nextstate as usize]);
            if cs == cn {
                cyclic = true;
                cyclic_comp[cs] = true;
                weighted_cycles |= !tr.weight.is_one();
            }
        }
    }
    for (c, &size) in comp_size.iter().enumerate() {
        if size > 1 {
            cyclic_comp[c] = true;
        }
    }
    let initial_cyclic = fst
        .start()
        .is_some_and(|s| cyclic_comp[comp[s as usize]]);

    let accessible = accessible_states(fst)?.iter().all(|&b| b);
    let coaccessible = coaccessible_states(fst)?.iter().all(|&b| b);
    string &= !cyclic;

    let pick = |cond: bool, yes: FstProperties, no: FstProperties| if cond { yes } else { no };
    let mut props = FstProperties::EXPANDED;
    props |= pick(acceptor, FstProperties::ACCEPTOR, FstProperties::NOT_ACCEPTOR);
    props |= pick(
        ideterministic,
        FstProperties::I_DETERMINISTIC,
        FstProperties::NON_I_DETERMINISTIC,
    );
    props |= pick(
        odeterministic,
        FstProperties::O_DETERMINISTIC,
        FstProperties::NON_O_DETERMINISTIC,
    );
    props |= pick(epsilons, FstProperties::EPSILONS, FstProperties::NO_EPSILONS);
    props |= pick(iepsilons, FstProperties::I_EPSILONS, FstProperties::NO_I_EPSILONS);
    props |= pick(oepsilons, FstProperties::O_EPSILONS, FstProperties::NO_O_EPSILONS);
    props |= pick(
        ilabel_sorted,
        FstProperties::I_LABEL_SORTED,
        FstProperties::NOT_I_LABEL_SORTED,
    );
    props |= pick(
        olabel_sorted,
        FstProperties::O_LABEL_SORTED,
        FstProperties::NOT_O_LABEL_SORTED,
    );
    props |= pick(weighted, FstProperties::WEIGHTED, FstProperties::UNWEIGHTED);
    props |= pick(cyclic, FstProperties::CYCLIC, FstProperties::ACYCLIC);
    props |= pick(
        initial_cyclic,
        FstProperties::INITIAL_CYCLIC,
        FstProperties::INITIAL_ACYCLIC,
    );
    props |= pick(top_sorted, FstProperties::TOP_SORTED, FstProperties::NOT_TOP_SORTED);
    props |= pick(accessible, FstProperties::ACCESSIBLE, FstProperties::NOT_ACCESSIBLE);
    props |= pick(
        coaccessible,
        FstProperties::COACCESSIBLE,
        FstProperties::NOT_COACCESSIBLE,
    );
    props |= pick(string, FstProperties::STRING, FstProperties::NOT_STRING);
    props |= pick(
        weighted_cycles,
        FstProperties::WEIGHTED_CYCLES,
        FstProperties::UNWEIGHTED_CYCLES,
    );
    Ok(props)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fst::{VectorFst, acceptor};
    use crate::semiring::TropicalWeight;
    use crate::tr::Tr;

    type W = TropicalWeight;

    #[test]
    fn linear_acceptor() {
        let fst = acceptor(&[1, 2, 3], W::one());
        let props = fst.properties().unwrap();
        assert!(props.contains(FstProperties::ACCEPTOR));
        assert!(props.contains(FstProperties::STRING));
        assert!(props.contains(FstProperties::ACYCLIC));
        assert!(props.contains(FstProperties::TOP_SORTED));
        assert!(props.contains(FstProperties::UNWEIGHTED));
        assert!(props.contains(FstProperties::I_DETERMINISTIC | FstProperties::NO_EPSILONS));
    }

    #[test]
    fn cycles_and_determinism() {
        let mut fst = VectorFst::<W>::new();
        fst.add_states(3);
        fst.set_start(0).unwrap();
        fst.add_tr(0, Tr::new(1, 2, 1.0, 1)).unwrap();
        fst.add_tr(0, Tr::new(1, 3, 0.0, 2)).unwrap();
        fst.add_tr(1, Tr::new(0, 0, 0.0, 0)).unwrap();
        fst.set_final(2, 0.0).unwrap();
        let props = fst.properties().unwrap();
        assert!(props.contains(FstProperties::NOT_ACCEPTOR));
        assert!(props.contains(FstProperties::NON_I_DETERMINISTIC));
        assert!(props.contains(FstProperties::O_DETERMINISTIC));
        assert!(props.contains(FstProperties::CYCLIC));
        assert!(props.contains(FstProperties::INITIAL_CYCLIC));
        assert!(props.contains(FstProperties::WEIGHTED_CYCLES));
        assert!(props.contains(FstProperties::EPSILONS));
        assert!(props.contains(FstProperties::NOT_TOP_SORTED));
        assert!(props.contains(FstProperties::COACCESSIBLE));
    }

    #[test]
    fn scc_numbering_is_reverse_topological() {
        let fst = acceptor(&[1, 2], W::one());
        let (comp, n) = strongly_connected_components(&fst).unwrap();
        assert_eq!(n, 3);
        assert!(comp[0] > comp[1] && comp[1] > comp[2]);
    }

    #[test]
    fn dead_states_are_not_coaccessible() {
        let mut fst = acceptor(&[1], W::one());
        let dead = fst.add_state();
        fst.add_tr(0, Tr::new(2, 2, 0.0, dead)).unwrap();
        let props = fst.properties().unwrap();
        assert!(props.contains(FstProperties::NOT_COACCESSIBLE));
        assert!(props.contains(FstProperties::ACCESSIBLE));
        assert!(props.names().contains(&"not coaccessible"));
    }
}
