// Encoding label pairs and weights into single labels.

use hashbrown::HashMap;
use log::debug;
use serde::{Deserialize, Serialize};

use super::rm_epsilon::rm_final_epsilon;
use crate::fst::{Fst, VectorFst};
use crate::semiring::Semiring;
use crate::tr::Tr;
use crate::{EPS_LABEL, Label, Result, StateId, WfstError};

/// What [`encode`] folds into the input label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EncodeType {
    /// `(ilabel, olabel)` pairs; the result is an acceptor.
    Labels,
    /// `(ilabel, weight)` pairs; output labels are kept.
    Weights,
    LabelsAndWeights,
}

impl EncodeType {
    #[inline]
    pub fn encode_labels(self) -> bool {
        matches!(self, Self::Labels | Self::LabelsAndWeights)
    }

    #[inline]
    pub fn encode_weights(self) -> bool {
        matches!(self, Self::Weights | Self::LabelsAndWeights)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct EncodeTuple<W> {
    ilabel: Label,
    olabel: Label,
    weight: W,
}

/// Bijection between encoded labels and the tuples they stand for.
///
/// Code `n` stands for `tuples[n - 1]`; the all-epsilon tuple keeps code 0
/// so epsilon transitions stay epsilon.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodeTable<W> {
    encode_type: EncodeType,
    tuples: Vec<EncodeTuple<W>>,
    ids: HashMap<(Label, Label, u32), Label>,
}

impl<W: Semiring> EncodeTable<W> {
    pub fn new(encode_type: EncodeType) -> Self {
        Self {
            encode_type,
            tuples: Vec::new(),
            ids: HashMap::new(),
        }
    }

    pub fn encode_type(&self) -> EncodeType {
        self.encode_type
    }

    /// Number of non-epsilon codes handed out.
    pub fn len(&self) -> usize {
        self.tuples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tuples.is_empty()
    }

    fn encode_parts(&mut self, ilabel: Label, olabel: Label, weight: W) -> Label {
        let olabel = if self.encode_type.encode_labels() {
            olabel
        } else {
            EPS_LABEL
        };
        let weight = if self.encode_type.encode_weights() {
            weight
        } else {
            W::one()
        };
        if ilabel == EPS_LABEL && olabel == EPS_LABEL && weight.is_one() {
            return EPS_LABEL;
        }
        let key = (ilabel, olabel, weight.value().to_bits());
        if let Some(&code) = self.ids.get(&key) {
            return code;
        }
        self.tuples.push(EncodeTuple {
            ilabel,
            olabel,
            weight,
        });
        let code = self.tuples.len() as Label;
        self.ids.insert(key, code);
        code
    }

    fn decode_label(&self, label: Label) -> Result<EncodeTuple<W>> {
        if label == EPS_LABEL {
            return Ok(EncodeTuple {
                ilabel: EPS_LABEL,
                olabel: EPS_LABEL,
                weight: W::one(),
            });
        }
        self.tuples.get(label as usize - 1).copied().ok_or_else(|| {
            WfstError::InvalidConfig(format!("label {label} is not in the encode table"))
        })
    }

    fn encode_tr(&mut self, tr: &mut Tr<W>) {
        let code = self.encode_parts(tr.ilabel, tr.olabel, tr.weight);
        tr.ilabel = code;
        if self.encode_type.encode_labels() {
            tr.olabel = code;
        }
        if self.encode_type.encode_weights() {
            tr.weight = W::one();
        }
    }
}

/// Replace each transition's labels (and weight) by a single code, in
/// place. When weights are encoded, final weights other than `one` move
/// onto a transition into a new final state.
pub fn encode<W: Semiring>(fst: &mut VectorFst<W>, encode_type: EncodeType) -> Result<EncodeTable<W>> {
    let mut table = EncodeTable::new(encode_type);
    fst.map_all_trs(|tr| table.encode_tr(tr));

    if encode_type.encode_weights() {
        let weighted_finals: Vec<(StateId, W)> = fst
            .states_iter()
            .filter_map(|s| match fst.final_weight(s) {
                Ok(Some(w)) if !w.is_one() => Some(Ok((s, w))),
                Ok(_) => None,
                Err(e) => Some(Err(e)),
            })
            .collect::<Result<_>>()?;
        if !weighted_finals.is_empty() {
            let superfinal = fst.add_state();
            fst.set_final_unchecked(superfinal, W::one());
            for (s, w) in weighted_finals {
                let mut tr = Tr::new(EPS_LABEL, EPS_LABEL, w, superfinal);
                table.encode_tr(&mut tr);
                fst.push_tr_unchecked(s, tr);
                fst.unset_final(s)?;
            }
        }
    }
    debug!("encode: {} codes ({encode_type:?})", table.len());
    Ok(table)
}

/// Inverse of [`encode`]. Fails on a label the table never handed out.
pub fn decode<W: Semiring>(fst: &mut VectorFst<W>, table: &EncodeTable<W>) -> Result<()> {
    // Every code must resolve before anything is rewritten.
    for s in fst.states_iter() {
        for tr in fst.get_trs(s)? {
            table.decode_label(tr.ilabel)?;
        }
    }
    for s in fst.states_iter() {
        let mut trs = fst.pop_trs(s)?;
        for tr in &mut trs {
            let tuple = table.decode_label(tr.ilabel)?;
            tr.ilabel = tuple.ilabel;
            if table.encode_type.encode_labels() {
                tr.olabel = tuple.olabel;
            }
            if table.encode_type.encode_weights() {
                tr.weight = tr.weight.times(tuple.weight);
            }
        }
        fst.set_trs_unchecked(s, trs);
    }
    rm_final_epsilon(fst)
}
