//! Backend adapters: the interchangeable bookkeeping layer behind a
//! compilation scope.
//!
//! A backend allocates variables, stores emitted gates, tracks variable
//! unions and lays everything out into a [`ConstraintSystem`]. Lowering of
//! assertions into gates is shared by all backends through the default
//! methods of [`BackendAdapter`], which drive a [`ConstraintReducer`].

use common::constants::{GENERIC_COEFFS, GENERIC_WIRES};
use common::export::ConstraintSystemJson;
use enum_dispatch::enum_dispatch;
use strum_macros::{Display, EnumIter, EnumString};

use crate::constraints::cvar::VarId;
use crate::constraints::layout::{ConstraintSystem, GateRow};
use crate::constraints::ops::LinearCombination;
use crate::constraints::reducer::ConstraintReducer;
use crate::constraints::witness::WitnessStore;
use crate::field::CircuitField;
use crate::utils::errors::CircuitError;

pub mod columnar;
pub mod conformance;
pub mod reference;
pub mod selector;

pub use columnar::ColumnarBackend;
pub use reference::ReferenceBackend;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, EnumIter, EnumString, Display)]
#[strum(serialize_all = "kebab-case")]
pub enum BackendKind {
    #[default]
    Reference,
    Columnar,
}

impl BackendKind {
    pub fn instantiate<F: CircuitField>(&self, optimization: OptimizationLevel) -> Backend<F> {
        match self {
            BackendKind::Reference => ReferenceBackend::new(optimization).into(),
            BackendKind::Columnar => ColumnarBackend::new(optimization).into(),
        }
    }
}

/// How eagerly redundant constraints are removed while lowering.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, EnumIter, EnumString, Display,
)]
#[strum(serialize_all = "lowercase")]
pub enum OptimizationLevel {
    /// Every assertion produces at least one row.
    None,
    /// Trivial equalities are elided and private variable equalities become unions.
    #[default]
    Standard,
    /// Additionally drops generic gates identical to one already emitted.
    Aggressive,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum VariableKind {
    Public,
    Witness,
    Internal,
}

#[enum_dispatch]
pub trait BackendAdapter<F: CircuitField> {
    fn kind(&self) -> BackendKind;

    fn optimization(&self) -> OptimizationLevel;

    /// Allocates a fresh variable. Public variables must all be allocated
    /// before anything else and each gets a public input row.
    fn new_variable(&mut self, kind: VariableKind) -> Result<VarId, CircuitError>;

    fn num_variables(&self) -> usize;

    fn public_input_size(&self) -> usize;

    fn is_public(&self, var: VarId) -> bool {
        var.index() < self.public_input_size()
    }

    /// Representative of the class `var` was merged into.
    fn resolve(&mut self, var: VarId) -> VarId;

    /// Merges the class of `drop` into the class of `keep`. Both must be
    /// representatives.
    fn alias(&mut self, keep: VarId, drop: VarId);

    /// Appends a gate. Returns `false` if it was dropped as a duplicate.
    fn push_gate(&mut self, gate: GateRow<F>) -> bool;

    fn rows(&self) -> usize;

    fn current_constraint_system(&self) -> ConstraintSystem<F>;

    fn generic_gate(
        &mut self,
        coeffs: [F; GENERIC_COEFFS],
        wires: [Option<VarId>; GENERIC_WIRES],
    ) -> bool {
        self.push_gate(GateRow::generic(coeffs, wires))
    }

    fn custom_gate(
        &mut self,
        name: &str,
        wires: &[Option<VarId>],
        coeffs: &[F],
    ) -> Result<(), CircuitError> {
        let gate = GateRow::custom(name, wires, coeffs)?;
        self.push_gate(gate);
        Ok(())
    }

    fn assert_equal(
        &mut self,
        lhs: &LinearCombination<F>,
        rhs: &LinearCombination<F>,
        witness: Option<&mut WitnessStore<F>>,
    ) -> Result<(), CircuitError> {
        ConstraintReducer::new(self, witness).assert_equal(lhs, rhs)
    }

    fn assert_mul(
        &mut self,
        a: &LinearCombination<F>,
        b: &LinearCombination<F>,
        c: &LinearCombination<F>,
        witness: Option<&mut WitnessStore<F>>,
    ) -> Result<(), CircuitError> {
        ConstraintReducer::new(self, witness).assert_mul(a, b, c)
    }

    fn seal(
        &mut self,
        lc: &LinearCombination<F>,
        witness: Option<&mut WitnessStore<F>>,
    ) -> Result<VarId, CircuitError> {
        ConstraintReducer::new(self, witness).seal(lc)
    }

    fn digest(&self) -> String {
        self.current_constraint_system().digest_hex()
    }

    fn to_export(&self) -> ConstraintSystemJson {
        self.current_constraint_system().to_json()
    }
}

#[enum_dispatch(BackendAdapter<F>)]
#[derive(Clone, Debug)]
pub enum Backend<F: CircuitField> {
    Reference(ReferenceBackend<F>),
    Columnar(ColumnarBackend<F>),
}

#[cfg(test)]
mod tests {
    use super::*;
    use ark_bn254::Fr;
    use std::str::FromStr;
    use strum::IntoEnumIterator;

    #[test]
    fn kinds_parse_and_print() {
        assert_eq!(BackendKind::from_str("columnar"), Ok(BackendKind::Columnar));
        assert_eq!(BackendKind::Reference.to_string(), "reference");
        assert_eq!(BackendKind::iter().count(), 2);
        assert_eq!(OptimizationLevel::from_str("aggressive"), Ok(OptimizationLevel::Aggressive));
        assert_eq!(OptimizationLevel::default(), OptimizationLevel::Standard);
    }

    #[test]
    fn public_variables_come_first() {
        for kind in BackendKind::iter() {
            let mut backend = kind.instantiate::<Fr>(OptimizationLevel::Standard);
            let p = backend.new_variable(VariableKind::Public).unwrap();
            let w = backend.new_variable(VariableKind::Witness).unwrap();
            assert!(backend.is_public(p));
            assert!(!backend.is_public(w));
            assert_eq!(backend.rows(), 1);
            assert_eq!(
                backend.new_variable(VariableKind::Public),
                Err(CircuitError::PublicInputOrder)
            );
            assert_eq!(backend.kind(), kind);
        }
    }

    #[test]
    fn aggressive_dedup_spares_public_rows_and_custom_gates() {
        for kind in BackendKind::iter() {
            let mut backend = kind.instantiate::<Fr>(OptimizationLevel::Aggressive);
            let p = backend.new_variable(VariableKind::Public).unwrap();
            let one = Fr::from(1u64);
            let zero = Fr::from(0u64);
            // Same shape as the public input row, but a real assertion `p = 0`.
            assert!(backend.generic_gate([one, zero, zero, zero, zero], [Some(p), None, None]));
            assert!(!backend.generic_gate([one, zero, zero, zero, zero], [Some(p), None, None]));
            backend.custom_gate("Poseidon", &[Some(p)], &[]).unwrap();
            backend.custom_gate("Poseidon", &[Some(p)], &[]).unwrap();
            assert_eq!(backend.rows(), 4);
        }
    }
}
