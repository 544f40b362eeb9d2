use serde::{Deserialize, Serialize};

use crate::fst::VectorFst;
use crate::semiring::Semiring;

/// Which side of the transducer survives a projection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProjectType {
    /// Copy input labels onto outputs.
    Input,
    /// Copy output labels onto inputs.
    Output,
}

/// Turn the transducer into an acceptor of its input or output language.
/// The surviving symbol table is attached to both sides. In place.
pub fn project<W: Semiring>(fst: &mut VectorFst<W>, project_type: ProjectType) {
    match project_type {
        ProjectType::Input => {
            fst.map_all_trs(|tr| tr.olabel = tr.ilabel);
            fst.osymt = fst.isymt.clone();
        }
        ProjectType::Output => {
            fst.map_all_trs(|tr| tr.ilabel = tr.olabel);
            fst.isymt = fst.osymt.clone();
        }
    }
}
