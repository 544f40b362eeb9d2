// Enumeration of accepting paths.

use std::collections::VecDeque;
use std::sync::Arc;

use crate::fst::Fst;
use crate::semiring::Semiring;
use crate::symbol_table::SymbolTable;
use crate::{EPS_LABEL, Label, Result, StateId, WfstError};

/// Labels and weight of one accepting path. Epsilons are not recorded.
#[derive(Debug, Clone, PartialEq)]
pub struct FstPath<W> {
    pub ilabels: Vec<Label>,
    pub olabels: Vec<Label>,
    pub weight: W,
}

impl<W: Semiring> Default for FstPath<W> {
    fn default() -> Self {
        Self {
            ilabels: Vec::new(),
            olabels: Vec::new(),
            weight: W::one(),
        }
    }
}

impl<W: Semiring> FstPath<W> {
    pub fn new(ilabels: Vec<Label>, olabels: Vec<Label>, weight: W) -> Self {
        Self {
            ilabels,
            olabels,
            weight,
        }
    }

    /// Extend the path by one transition.
    pub fn add_to_path(&mut self, ilabel: Label, olabel: Label, weight: W) {
        if ilabel != EPS_LABEL {
            self.ilabels.push(ilabel);
        }
        if olabel != EPS_LABEL {
            self.olabels.push(olabel);
        }
        self.weight = self.weight.times(weight);
    }
}

/// Breadth-first iterator over the accepting paths of a transducer.
///
/// Terminates only when the set of accepting paths is finite.
pub struct PathsIterator<'a, W, F> {
    fst: &'a F,
    queue: VecDeque<(StateId, FstPath<W>)>,
}

impl<'a, W: Semiring, F: Fst<W>> PathsIterator<'a, W, F> {
    pub fn new(fst: &'a F) -> Self {
        let mut queue = VecDeque::new();
        if let Some(start) = fst.start() {
            queue.push_back((start, FstPath::default()));
        }
        Self { fst, queue }
    }
}

impl<W: Semiring, F: Fst<W>> Iterator for PathsIterator<'_, W, F> {
    type Item = FstPath<W>;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some((state, path)) = self.queue.pop_front() {
            let (Ok(trs), Ok(final_weight)) =
                (self.fst.get_trs(state), self.fst.final_weight(state))
            else {
                continue;
            };
            for tr in trs {
                let mut next = path.clone();
                next.add_to_path(tr.ilabel, tr.olabel, tr.weight);
                self.queue.push_back((tr.nextstate, next));
            }
            if let Some(w) = final_weight {
                let mut done = path;
                done.weight = done.weight.times(w);
                return Some(done);
            }
        }
        None
    }
}

/// An accepting path rendered through symbol tables.
#[derive(Debug, Clone)]
pub struct StringPath<W> {
    path: FstPath<W>,
    isymt: Arc<SymbolTable>,
    osymt: Arc<SymbolTable>,
}

impl<W: Semiring> StringPath<W> {
    pub fn weight(&self) -> W {
        self.path.weight
    }

    pub fn ilabels(&self) -> &[Label] {
        &self.path.ilabels
    }

    pub fn olabels(&self) -> &[Label] {
        &self.path.olabels
    }

    /// Input symbols separated by spaces.
    pub fn istring(&self) -> Result<String> {
        self.isymt.labels_to_string(&self.path.ilabels)
    }

    /// Output symbols separated by spaces.
    pub fn ostring(&self) -> Result<String> {
        self.osymt.labels_to_string(&self.path.olabels)
    }
}

/// Iterator over accepting paths as [`StringPath`]s.
pub struct StringPathsIterator<'a, W, F> {
    inner: PathsIterator<'a, W, F>,
    isymt: Arc<SymbolTable>,
    osymt: Arc<SymbolTable>,
}

impl<'a, W: Semiring, F: Fst<W>> StringPathsIterator<'a, W, F> {
    /// Fails if the transducer lacks an input or output symbol table.
    pub fn new(fst: &'a F) -> Result<Self> {
        let isymt = fst
            .input_symbols()
            .cloned()
            .ok_or_else(|| WfstError::InvalidSymbolTable("missing input symbol table".into()))?;
        let osymt = fst
            .output_symbols()
            .cloned()
            .ok_or_else(|| WfstError::InvalidSymbolTable("missing output symbol table".into()))?;
        Ok(Self {
            inner: PathsIterator::new(fst),
            isymt,
            osymt,
        })
    }
}

impl<W: Semiring, F: Fst<W>> Iterator for StringPathsIterator<'_, W, F> {
    type Item = StringPath<W>;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|path| StringPath {
            path,
            isymt: Arc::clone(&self.isymt),
            osymt: Arc::clone(&self.osymt),
        })
    }
}
