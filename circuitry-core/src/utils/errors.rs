use core::fmt::{self, Debug};
use thiserror::Error;

use crate::backend::BackendKind;
use crate::context::mode::ExecutionMode;

/// A failed assertion together with the concrete values it was evaluated on.
///
/// Failures found on a lowered row carry that row's coefficients and wired
/// variables; failures found while asserting carry the operands instead and
/// leave `coeffs` empty.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Violation {
    pub location: String,
    pub coeffs: Vec<String>,
    pub operands: Vec<String>,
    pub values: Vec<String>,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: ", self.location)?;
        if !self.coeffs.is_empty() {
            write!(f, "coefficients [{}] over ", self.coeffs.join(", "))?;
        }
        write!(
            f,
            "[{}] evaluated to [{}]",
            self.operands.join(", "),
            self.values.join(", ")
        )
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CircuitError {
    #[error("{0} is not available in pure evaluation mode")]
    UnsupportedInPureMode(&'static str),
    #[error("Constraint violated at {0}")]
    ConstraintViolation(Box<Violation>),
    #[error("{operation} cannot run in {mode} mode")]
    ModeMismatch {
        operation: &'static str,
        mode: ExecutionMode,
    },
    #[error("Backends disagree on {quantity}: {left} vs {right}")]
    BackendDivergence {
        quantity: &'static str,
        left: String,
        right: String,
    },
    #[error("Division by zero")]
    DivisionByZero,
    #[error("Element has no square root in the field")]
    NoSquareRoot,
    #[error("Scope handle does not match the innermost open scope")]
    ScopeMismatch,
    #[error("Variable belongs to scope {found}, innermost scope is {expected}")]
    ForeignVariable { expected: u32, found: u32 },
    #[error("Variable v{0} has no assigned value")]
    UnassignedVariable(usize),
    #[error("Public inputs must be declared before any other variable or gate")]
    PublicInputOrder,
    #[error("Gate {name} wires {wires} cells, at most {max} are permuted")]
    GateArity {
        name: String,
        wires: usize,
        max: usize,
    },
    #[error("Cannot switch to {requested} backend while {active} compilation(s) are active")]
    BackendBusy {
        requested: BackendKind,
        active: usize,
    },
    #[error("Invalid field element encoding: {0}")]
    InvalidEncoding(String),
}

impl CircuitError {
    /// A lowered gate that the witness does not satisfy.
    pub fn gate_violation(
        location: impl Into<String>,
        coeffs: Vec<String>,
        wires: Vec<String>,
        values: Vec<String>,
    ) -> Self {
        CircuitError::ConstraintViolation(Box::new(Violation {
            location: location.into(),
            coeffs,
            operands: wires,
            values,
        }))
    }

    /// An assertion whose operands evaluate to values that break it.
    pub fn assertion_violation(
        location: impl Into<String>,
        operands: Vec<String>,
        values: Vec<String>,
    ) -> Self {
        CircuitError::ConstraintViolation(Box::new(Violation {
            location: location.into(),
            coeffs: Vec::new(),
            operands,
            values,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn violations_render_what_they_know() {
        let gate = CircuitError::gate_violation(
            "generic gate at row 3",
            vec!["1".into(), "2".into()],
            vec!["v0".into(), "v1".into()],
            vec!["4".into(), "5".into()],
        );
        assert_eq!(
            gate.to_string(),
            "Constraint violated at generic gate at row 3: coefficients [1, 2] over [v0, v1] evaluated to [4, 5]"
        );
        let assertion = CircuitError::assertion_violation(
            "assert_equal",
            vec!["LC(v0)".into(), "LC(7)".into()],
            vec!["6".into(), "7".into()],
        );
        assert_eq!(
            assertion.to_string(),
            "Constraint violated at assert_equal: [LC(v0), LC(7)] evaluated to [6, 7]"
        );
    }
}
