// AT&T text format.
//
// Rows are tab separated:
//   src dst ilabel olabel [weight]   -- transition
//   state [weight]                   -- final state
// The source of the first row is the start state; a missing weight is
// `one`. A final row whose weight is `Infinity` only declares the state.

use std::fmt::{self, Write as _};
use std::path::Path;

use crate::fst::{ConstFst, Fst, VectorFst};
use crate::semiring::{Semiring, parse_weight};
use crate::tr::Tr;
use crate::{Label, Result, StateId, WfstError};

enum Row<W> {
    Tr(StateId, Tr<W>),
    Final(StateId, Option<W>),
}

fn parse_id(field: &str, line_no: usize) -> Result<u32> {
    field.parse::<u32>().map_err(|_| {
        WfstError::InvalidFormat(format!("line {line_no}: invalid integer {field:?}"))
    })
}

fn parse_row<W: Semiring>(line: &str, line_no: usize) -> Result<Row<W>> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    match fields.as_slice() {
        [state] => Ok(Row::Final(parse_id(state, line_no)?, Some(W::one()))),
        [state, weight] => {
            let w: W = parse_weight(weight)?;
            let w = if w.is_zero() { None } else { Some(w) };
            Ok(Row::Final(parse_id(state, line_no)?, w))
        }
        [src, dst, ilabel, olabel, rest @ ..] if rest.len() <= 1 => {
            let weight = match rest.first() {
                Some(w) => parse_weight(w)?,
                None => W::one(),
            };
            let tr = Tr::new(
                parse_id(ilabel, line_no)? as Label,
                parse_id(olabel, line_no)? as Label,
                weight,
                parse_id(dst, line_no)?,
            );
            Ok(Row::Tr(parse_id(src, line_no)?, tr))
        }
        _ => Err(WfstError::InvalidFormat(format!(
            "line {line_no}: expected 1, 2, 4 or 5 fields, got {}",
            fields.len()
        ))),
    }
}

impl<W: Semiring> VectorFst<W> {
    /// Parse a transducer in AT&T text format.
    pub fn from_text(text: &str) -> Result<Self> {
        let mut rows = Vec::new();
        for (i, line) in text.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            rows.push(parse_row::<W>(line, i + 1)?);
        }

        let mut num_states = 0usize;
        for row in &rows {
            let max = match row {
                Row::Tr(s, tr) => (*s).max(tr.nextstate),
                Row::Final(s, _) => *s,
            };
            num_states = num_states.max(max as usize + 1);
        }

        let mut fst = VectorFst::new();
        fst.add_states(num_states);
        let start = rows.first().map(|row| match row {
            Row::Tr(s, _) | Row::Final(s, _) => *s,
        });
        for row in rows {
            match row {
                Row::Tr(s, tr) => fst.push_tr_unchecked(s, tr),
                Row::Final(s, Some(w)) => fst.set_final_unchecked(s, w),
                Row::Final(_, None) => {}
            }
        }
        if let Some(s) = start {
            fst.set_start_unchecked(s);
        }
        Ok(fst)
    }

    pub fn read_text<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_text(&text)
    }

    /// Render in AT&T text format.
    pub fn text(&self) -> String {
        let mut out = String::new();
        // Writing into a String cannot fail.
        let _ = write_text(self, &mut out);
        out
    }

    pub fn write_text<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        std::fs::write(path, self.text())?;
        Ok(())
    }
}

/// Write `fst` in AT&T text format. The start state is written first.
pub fn write_text<W: Semiring, F: Fst<W>>(fst: &F, out: &mut impl fmt::Write) -> fmt::Result {
    let Some(start) = fst.start() else {
        return Ok(());
    };
    let order = std::iter::once(start).chain(fst.states_iter().filter(|&s| s != start));
    for s in order {
        let (Ok(trs), Ok(final_weight)) = (fst.get_trs(s), fst.final_weight(s)) else {
            return Err(fmt::Error);
        };
        for tr in trs {
            if tr.weight.is_one() {
                writeln!(out, "{s}\t{}\t{}\t{}", tr.nextstate, tr.ilabel, tr.olabel)?;
            } else {
                writeln!(
                    out,
                    "{s}\t{}\t{}\t{}\t{}",
                    tr.nextstate, tr.ilabel, tr.olabel, tr.weight
                )?;
            }
        }
        match final_weight {
            Some(w) if w.is_one() => writeln!(out, "{s}")?,
            Some(w) => writeln!(out, "{s}\t{w}")?,
            // Keep states without rows so numbering survives a round trip.
            None if trs.is_empty() => writeln!(out, "{s}\tInfinity")?,
            None => {}
        }
    }
    Ok(())
}

impl<W: Semiring> fmt::Display for VectorFst<W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_text(self, f)
    }
}

impl<W: Semiring> fmt::Display for ConstFst<W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_text(self, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::semiring::TropicalWeight;

    type W = TropicalWeight;

    #[test]
    fn parse_sample() {
        let text = "0\t1\t32\t32\n1\t2\t45\t45\n2\t3\t18\t18\t0.25\n3\t0.67\n";
        let fst = VectorFst::<W>::from_text(text).unwrap();
        assert_eq!(fst.num_states(), 4);
        assert_eq!(fst.start(), Some(0));
        assert_eq!(fst.get_trs(2).unwrap()[0].weight, W::new(0.25));
        assert_eq!(fst.get_trs(0).unwrap()[0].weight, W::one());
        assert_eq!(fst.final_weight(3).unwrap(), Some(W::new(0.67)));
        assert_eq!(fst.final_weight(2).unwrap(), None);
    }

    #[test]
    fn first_row_sets_start() {
        let fst = VectorFst::<W>::from_text("2\t0\t1\t1\n0\n").unwrap();
        assert_eq!(fst.start(), Some(2));
        assert_eq!(fst.num_states(), 3);
        assert_eq!(fst.final_weight(0).unwrap(), Some(W::one()));
    }

    #[test]
    fn empty_text_is_empty_fst() {
        let fst = VectorFst::<W>::from_text("").unwrap();
        assert_eq!(fst.num_states(), 0);
        assert!(fst.is_empty());
        assert_eq!(fst.text(), "");
    }

    #[test]
    fn reject_malformed_rows() {
        assert!(VectorFst::<W>::from_text("0\t1\t2\n").is_err());
        assert!(VectorFst::<W>::from_text("0\tx\t1\t1\n").is_err());
        assert!(VectorFst::<W>::from_text("0\t1\t1\t1\tabc\n").is_err());
    }

    #[test]
    fn text_round_trip() {
        let mut fst = VectorFst::<W>::new();
        fst.add_states(4);
        fst.set_start(1).unwrap();
        fst.add_tr(1, Tr::new(1, 2, 1.5, 0)).unwrap();
        fst.add_tr(0, Tr::new(3, 3, 0.0, 2)).unwrap();
        fst.set_final(2, 0.5).unwrap();
        fst.set_final(1, 0.0).unwrap();
        // state 3 is isolated
        let text = fst.text();
        assert!(text.starts_with("1\t0\t1\t2\t1.5\n"));
        let parsed = VectorFst::<W>::from_text(&text).unwrap();
        assert_eq!(parsed, fst);
    }

    #[test]
    fn start_without_rows_survives() {
        let mut fst = VectorFst::<W>::new();
        fst.add_states(2);
        fst.set_start(0).unwrap();
        fst.set_final(1, 0.0).unwrap();
        let parsed = VectorFst::<W>::from_text(&fst.to_string()).unwrap();
        assert_eq!(parsed, fst);
    }
}
