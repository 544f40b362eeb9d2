// wfst-cli: shared utilities for the `wfst` command-line tool.

use std::fmt;
use std::path::Path;

use anyhow::{Context, Result};
use log::LevelFilter;
use serde::Serialize;
use wfst::format::read_header;
use wfst::prelude::*;

/// Initialize `env_logger`.
///
/// `RUST_LOG` is honored when set; otherwise only warnings are shown.
/// `verbose` forces debug output regardless of the environment.
pub fn init_logging(verbose: bool) {
    let env = env_logger::Env::default().filter_or(env_logger::DEFAULT_FILTER_ENV, "warn");
    let mut builder = env_logger::Builder::from_env(env);
    if verbose {
        builder.filter_level(LevelFilter::Debug);
    }
    builder.format_timestamp(None).init();
}

/// Read a binary transducer file (vector or const layout).
pub fn read_fst<W: Semiring>(path: &Path) -> Result<VectorFst<W>> {
    VectorFst::read(path).with_context(|| format!("failed to read {}", path.display()))
}

/// Write `fst` as a binary vector transducer file.
pub fn write_fst<W: Semiring>(fst: &VectorFst<W>, path: &Path) -> Result<()> {
    fst.write(path)
        .with_context(|| format!("failed to write {}", path.display()))
}

/// Parse an AT&T text transducer file.
pub fn read_text_fst<W: Semiring>(path: &Path) -> Result<VectorFst<W>> {
    VectorFst::read_text(path).with_context(|| format!("failed to compile {}", path.display()))
}

/// Arc type recorded in the header of a binary transducer file.
pub fn peek_arc_type(path: &Path) -> Result<String> {
    let data = std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    let header = read_header(&data)
        .with_context(|| format!("{} is not a binary transducer", path.display()))?;
    Ok(header.arc_type)
}

/// Summary of a transducer as printed by `wfst info`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FstInfo {
    pub fst_type: String,
    pub arc_type: String,
    pub input_symbols: Option<String>,
    pub output_symbols: Option<String>,
    pub num_states: usize,
    pub num_trs: usize,
    pub start: Option<StateId>,
    pub num_final_states: usize,
    pub num_input_epsilons: usize,
    pub num_output_epsilons: usize,
    pub properties: Vec<&'static str>,
}

impl FstInfo {
    pub fn new<W: Semiring, F: Fst<W>>(fst: &F, fst_type: &str) -> wfst::Result<Self> {
        let mut num_input_epsilons = 0;
        let mut num_output_epsilons = 0;
        for s in fst.states_iter() {
            num_input_epsilons += fst.num_input_epsilons(s)?;
            num_output_epsilons += fst.num_output_epsilons(s)?;
        }
        Ok(Self {
            fst_type: fst_type.to_string(),
            arc_type: W::ARC_TYPE.to_string(),
            input_symbols: fst.input_symbols().map(|t| t.name().to_string()),
            output_symbols: fst.output_symbols().map(|t| t.name().to_string()),
            num_states: fst.num_states(),
            num_trs: fst.num_trs_total(),
            start: fst.start(),
            num_final_states: fst.final_states()?.len(),
            num_input_epsilons,
            num_output_epsilons,
            properties: fst.properties()?.names(),
        })
    }
}

impl fmt::Display for FstInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbols = |t: &Option<String>| t.clone().unwrap_or_else(|| "none".to_string());
        let start = self
            .start
            .map_or_else(|| "none".to_string(), |s| s.to_string());
        writeln!(f, "{:<32}{}", "fst type", self.fst_type)?;
        writeln!(f, "{:<32}{}", "arc type", self.arc_type)?;
        writeln!(f, "{:<32}{}", "input symbol table", symbols(&self.input_symbols))?;
        writeln!(f, "{:<32}{}", "output symbol table", symbols(&self.output_symbols))?;
        writeln!(f, "{:<32}{}", "# of states", self.num_states)?;
        writeln!(f, "{:<32}{}", "# of transitions", self.num_trs)?;
        writeln!(f, "{:<32}{}", "initial state", start)?;
        writeln!(f, "{:<32}{}", "# of final states", self.num_final_states)?;
        writeln!(f, "{:<32}{}", "# of input epsilons", self.num_input_epsilons)?;
        writeln!(f, "{:<32}{}", "# of output epsilons", self.num_output_epsilons)?;
        write!(f, "{:<32}{}", "properties", self.properties.join(", "))
    }
}
