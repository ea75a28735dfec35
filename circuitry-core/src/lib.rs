#![allow(clippy::len_without_is_empty)]
#![allow(clippy::too_long_first_doc_paragraph)]

pub mod backend;
pub mod benches;
pub mod constraints;
pub mod context;
pub mod field;
pub mod utils;

pub use backend::{
    selector::{BackendHandle, BackendSelector},
    Backend, BackendAdapter, BackendKind, OptimizationLevel,
};
pub use constraints::{
    cvar::{Cvar, VarId},
    layout::{Cell, ConstraintSystem, Gate, GateKind, Permutation},
    ops::LinearCombination,
    witness::Witness,
};
pub use context::{
    mode::{ContextConfig, ExecutionMode},
    Artifact, CircuitContext, ScopeHandle,
};
pub use field::CircuitField;
pub use utils::errors::CircuitError;
