//! Symbolic circuit construction lowered to PLONK-style generic gates, with
//! interchangeable backends that produce identical constraint systems.

pub use circuitry_core::*;
pub use common::{constants, export, serializable};
