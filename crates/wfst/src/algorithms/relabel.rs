// Label remapping.

use std::sync::Arc;

use hashbrown::HashMap;
use hashbrown::hash_map::Entry;

use crate::fst::{Fst, VectorFst};
use crate::semiring::Semiring;
use crate::symbol_table::SymbolTable;
use crate::{Label, Result, WfstError};

fn pairs_to_map<I>(pairs: I, side: &str) -> Result<HashMap<Label, Label>>
where
    I: IntoIterator<Item = (Label, Label)>,
{
    let mut map = HashMap::new();
    for (old, new) in pairs {
        match map.entry(old) {
            Entry::Occupied(_) => {
                return Err(WfstError::InvalidConfig(format!(
                    "{side} label {old} is relabeled twice"
                )));
            }
            Entry::Vacant(v) => {
                v.insert(new);
            }
        }
    }
    Ok(map)
}

/// Relabel transitions through explicit `(old, new)` pairs. Labels not
/// listed are left alone. A label listed twice on one side is an error.
pub fn relabel_pairs<W, I, J>(fst: &mut VectorFst<W>, ipairs: I, opairs: J) -> Result<()>
where
    W: Semiring,
    I: IntoIterator<Item = (Label, Label)>,
    J: IntoIterator<Item = (Label, Label)>,
{
    let imap = pairs_to_map(ipairs, "input")?;
    let omap = pairs_to_map(opairs, "output")?;
    fst.map_all_trs(|tr| {
        if let Some(&l) = imap.get(&tr.ilabel) {
            tr.ilabel = l;
        }
        if let Some(&l) = omap.get(&tr.olabel) {
            tr.olabel = l;
        }
    });
    Ok(())
}

fn table_pairs(
    fst_labels: impl Iterator<Item = Label>,
    old: &SymbolTable,
    new: &SymbolTable,
) -> Result<Vec<(Label, Label)>> {
    let mut pairs = Vec::new();
    for label in fst_labels {
        let symbol = old.get_symbol(label).ok_or_else(|| {
            WfstError::InvalidSymbolTable(format!("label {label} missing from the old table"))
        })?;
        let new_label = new.get_label(symbol).ok_or_else(|| {
            WfstError::InvalidSymbolTable(format!("symbol {symbol:?} missing from the new table"))
        })?;
        if new_label != label {
            pairs.push((label, new_label));
        }
    }
    Ok(pairs)
}

/// Relabel so that labels keep their symbols under new symbol tables.
///
/// `None` leaves that side untouched. The old table of a side defaults to
/// the one attached to `fst`. The new tables are attached afterwards.
pub fn relabel_tables<W: Semiring>(
    fst: &mut VectorFst<W>,
    new_isymt: Option<Arc<SymbolTable>>,
    new_osymt: Option<Arc<SymbolTable>>,
) -> Result<()> {
    let mut ilabels: Vec<Label> = Vec::new();
    let mut olabels: Vec<Label> = Vec::new();
    for s in fst.states_iter() {
        for tr in fst.get_trs(s)? {
            ilabels.push(tr.ilabel);
            olabels.push(tr.olabel);
        }
    }
    ilabels.sort_unstable();
    ilabels.dedup();
    olabels.sort_unstable();
    olabels.dedup();

    let missing = |side: &str| WfstError::InvalidSymbolTable(format!("no {side} symbol table attached"));
    let ipairs = match &new_isymt {
        Some(new) => {
            let old = fst.input_symbols().ok_or_else(|| missing("input"))?;
            table_pairs(ilabels.into_iter(), old, new)?
        }
        None => Vec::new(),
    };
    let opairs = match &new_osymt {
        Some(new) => {
            let old = fst.output_symbols().ok_or_else(|| missing("output"))?;
            table_pairs(olabels.into_iter(), old, new)?
        }
        None => Vec::new(),
    };
    relabel_pairs(fst, ipairs, opairs)?;
    if let Some(t) = new_isymt {
        fst.set_input_symbols(t);
    }
    if let Some(t) = new_osymt {
        fst.set_output_symbols(t);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::semiring::TropicalWeight;
    use crate::tr::Tr;

    fn sample() -> VectorFst<TropicalWeight> {
        let mut fst = VectorFst::new();
        fst.add_states(3);
        fst.set_start(0).unwrap();
        fst.add_tr(0, Tr::new(3, 18, 10.0, 1)).unwrap();
        fst.add_tr(0, Tr::new(2, 5, 10.0, 1)).unwrap();
        fst.add_tr(0, Tr::new(5, 9, 18.0, 2)).unwrap();
        fst.add_tr(0, Tr::new(5, 7, 18.0, 2)).unwrap();
        fst.set_final(1, 31.0).unwrap();
        fst.set_final(2, 45.0).unwrap();
        fst
    }

    #[test]
    fn relabel_by_pairs() {
        let mut fst = sample();
        relabel_pairs(&mut fst, [(3, 45), (5, 75)], [(18, 51), (5, 75), (7, 85)]).unwrap();
        let labels: Vec<_> = fst.get_trs(0).unwrap().iter().map(|t| (t.ilabel, t.olabel)).collect();
        assert_eq!(labels, vec![(45, 51), (2, 75), (75, 9), (75, 85)]);
    }

    #[test]
    fn duplicate_pair_is_rejected() {
        let mut fst = sample();
        let before = fst.clone();
        assert!(relabel_pairs(&mut fst, [(3, 4), (3, 5)], []).is_err());
        assert_eq!(fst, before);
    }

    #[test]
    fn relabel_through_tables() {
        let mut fst = VectorFst::<TropicalWeight>::new();
        fst.add_states(2);
        fst.set_start(0).unwrap();
        fst.add_tr(0, Tr::new(1, 2, 0.0, 1)).unwrap();
        fst.set_input_symbols(Arc::new(SymbolTable::from_symbols(["a", "b"])));
        fst.set_output_symbols(Arc::new(SymbolTable::from_symbols(["a", "b"])));

        let new = Arc::new(SymbolTable::from_symbols(["b", "a"]));
        relabel_tables(&mut fst, Some(Arc::clone(&new)), None).unwrap();
        assert_eq!(fst.get_trs(0).unwrap()[0], Tr::new(2, 2, 0.0, 1));
        assert_eq!(fst.input_symbols().unwrap().get_symbol(2), Some("a"));

        let partial = Arc::new(SymbolTable::from_symbols(["z"]));
        assert!(relabel_tables(&mut fst, None, Some(partial)).is_err());
    }
}
