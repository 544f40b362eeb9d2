//! Weighted finite state transducer (WFST) engine.
//!
//! This crate provides construction, serialization and transformation of
//! weighted transducers over the tropical and log semirings. States and
//! transitions live in a dense arena; algorithms either mutate a
//! [`fst::VectorFst`] in place or allocate a fresh one.
//!
//! # Architecture
//!
//! - [`semiring`] -- Weight arithmetic (tropical, log)
//! - [`tr`] -- Transition struct
//! - [`symbol_table`] -- Label to string mapping shared between transducers
//! - [`fst`] -- The `Fst` read trait, mutable `VectorFst` and compact `ConstFst`
//! - [`properties`] -- Computed structural properties (determinism, cycles, sortedness)
//! - [`format`] -- Binary (OpenFST compatible) serialization
//! - [`text`] -- AT&T text serialization
//! - [`paths`] -- Enumeration of accepted label sequences
//! - [`algorithms`] -- Connect, determinize, minimize, compose, shortest path, ...

pub mod algorithms;
pub mod format;
pub mod fst;
pub mod paths;
pub mod properties;
pub mod semiring;
pub mod symbol_table;
pub mod text;
pub mod tr;

pub use crate::fst::{ConstFst, Fst, VectorFst};
pub use crate::semiring::{LogWeight, Semiring, TropicalWeight};
pub use crate::symbol_table::SymbolTable;
pub use crate::tr::Tr;

/// Transition label. `0` is epsilon.
pub type Label = u32;

/// Dense state identifier in `[0, num_states)`.
pub type StateId = u32;

/// The epsilon label: a transition that consumes no symbol.
pub const EPS_LABEL: Label = 0;

/// Sentinel label used by matchers for the implicit epsilon self-loop.
pub const NO_LABEL: Label = u32::MAX;

/// Sentinel state id used where a state is required but absent.
pub const NO_STATE_ID: StateId = u32::MAX;

/// Default tolerance for weight comparisons and convergence checks.
pub const KDELTA: f32 = 1.0 / 1024.0;

/// Error type for every fallible engine operation.
#[derive(Debug, thiserror::Error)]
pub enum WfstError {
    #[error("state {state} out of range (num_states = {num_states})")]
    StateOutOfRange { state: StateId, num_states: usize },
    #[error("invalid weight: {0}")]
    InvalidWeight(String),
    #[error("operation requires an acyclic transducer")]
    Cyclic,
    #[error("transducer is not deterministic: {0}")]
    NonDeterministic(String),
    #[error("transducer is not functional: state {state} has two distinct residual outputs")]
    NonFunctional { state: StateId },
    #[error("transitions are not sorted: {0}")]
    Unsorted(String),
    #[error("unsupported semiring {semiring}: {reason}")]
    UnsupportedSemiring {
        semiring: &'static str,
        reason: &'static str,
    },
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("transition iterator is exhausted")]
    IteratorDone,
    #[error("invalid magic number {0} in binary header")]
    InvalidMagic(i32),
    #[error("data too short: expected at least {expected} bytes, got {actual}")]
    TooShort { expected: usize, actual: usize },
    #[error("arc type mismatch: expected {expected}, got {actual}")]
    TypeMismatch { expected: String, actual: String },
    #[error("invalid format: {0}")]
    InvalidFormat(String),
    #[error("invalid symbol table: {0}")]
    InvalidSymbolTable(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, WfstError>;

/// Commonly used types and algorithms.
pub mod prelude {
    pub use crate::algorithms::compose::{
        ComposeConfig, ComposeFilter, MatcherConfig, MatcherRewriteMode, SigmaMatcherConfig,
        compose, compose_with_config,
    };
    pub use crate::algorithms::determinize::{
        DeterminizeConfig, DeterminizeType, determinize, determinize_with_config,
    };
    pub use crate::algorithms::encode::{EncodeTable, EncodeType, decode, encode};
    pub use crate::algorithms::minimize::{MinimizeConfig, minimize, minimize_with_config};
    pub use crate::algorithms::push::{PushConfig, ReweightType, push, push_weights, reweight};
    pub use crate::algorithms::randgen::{RandGenConfig, RandGenSelector, randgen};
    pub use crate::algorithms::replace::replace;
    pub use crate::algorithms::shortest_distance::{
        ShortestDistanceConfig, shortest_distance, shortest_distance_total,
        shortest_distance_with_config,
    };
    pub use crate::algorithms::shortest_path::{
        ShortestPathConfig, shortest_path, shortest_path_with_config,
    };
    pub use crate::algorithms::*;
    pub use crate::fst::{ConstFst, Fst, TrsIterMut, VectorFst, acceptor, transducer};
    pub use crate::paths::{FstPath, StringPath};
    pub use crate::properties::FstProperties;
    pub use crate::semiring::{LogWeight, Semiring, TropicalWeight};
    pub use crate::symbol_table::SymbolTable;
    pub use crate::tr::Tr;
    pub use crate::{
        EPS_LABEL, KDELTA, Label, NO_LABEL, NO_STATE_ID, Result, StateId, WfstError,
    };
}
