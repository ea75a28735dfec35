use std::str::FromStr;

use strum_macros::{Display, EnumIter};

use crate::backend::OptimizationLevel;

pub const OPTIMIZATION_ENV: &str = "CIRCUITRY_OPTIMIZATION";
pub const RECORD_WITNESS_ENV: &str = "CIRCUITRY_RECORD_WITNESS";

/// What a scope does with the operations performed in it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Display, EnumIter)]
#[strum(serialize_all = "snake_case")]
pub enum ExecutionMode {
    /// Constants only; no backend and no witness.
    PureEval,
    /// Computes the witness and checks every assertion as it is made. Gates
    /// are lowered into a scratch backend, re-checked against the witness on
    /// exit and then discarded.
    CheckedRun,
    /// Computes the witness, optionally returning the constraints as well.
    GenerateWitness,
    /// Emits constraints; witness callbacks never run.
    GenerateConstraints,
}

impl ExecutionMode {
    pub fn has_witness(&self) -> bool {
        matches!(
            self,
            ExecutionMode::CheckedRun | ExecutionMode::GenerateWitness
        )
    }

    pub fn has_backend(&self) -> bool {
        *self != ExecutionMode::PureEval
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ContextConfig {
    pub optimization: OptimizationLevel,
    /// Whether witness generation also hands back the constraint system it
    /// lowered along the way.
    pub record_witness_constraints: bool,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            optimization: OptimizationLevel::default(),
            record_witness_constraints: true,
        }
    }
}

impl ContextConfig {
    /// Defaults, overridden by `CIRCUITRY_OPTIMIZATION` (`none`, `standard`,
    /// `aggressive`) and `CIRCUITRY_RECORD_WITNESS` (`0`/`false` to disable).
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(level) = std::env::var(OPTIMIZATION_ENV) {
            match OptimizationLevel::from_str(level.trim()) {
                Ok(level) => config.optimization = level,
                Err(_) => tracing::warn!(%level, "ignoring unknown {OPTIMIZATION_ENV}"),
            }
        }
        if let Ok(flag) = std::env::var(RECORD_WITNESS_ENV) {
            config.record_witness_constraints =
                !matches!(flag.trim().to_ascii_lowercase().as_str(), "0" | "false" | "no");
        }
        config
    }

    pub fn with_optimization(mut self, optimization: OptimizationLevel) -> Self {
        self.optimization = optimization;
        self
    }
}
