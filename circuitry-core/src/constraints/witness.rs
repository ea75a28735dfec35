use super::cvar::VarId;
use super::layout::ConstraintSystem;
use crate::field::CircuitField;
use common::constants::PERMUTED_COLUMNS;

/// Values assigned to variables while a witness-producing scope is open.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct WitnessStore<F> {
    values: Vec<Option<F>>,
}

impl<F: CircuitField> WitnessStore<F> {
    pub fn get(&self, var: VarId) -> Option<F> {
        self.values.get(var.index()).copied().flatten()
    }

    pub fn set(&mut self, var: VarId, value: F) {
        if var.index() >= self.values.len() {
            self.values.resize(var.index() + 1, None);
        }
        self.values[var.index()] = Some(value);
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn into_witness(self) -> Witness<F> {
        Witness {
            values: self.values,
        }
    }
}

/// The assignment produced by a witness-producing scope, indexed by [`VarId`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Witness<F> {
    values: Vec<Option<F>>,
}

impl<F: CircuitField> Witness<F> {
    pub fn value(&self, var: VarId) -> Option<F> {
        self.values.get(var.index()).copied().flatten()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_complete(&self) -> bool {
        self.values.iter().all(Option::is_some)
    }

    /// Lays the witness out over the rows of `cs`. Unused cells are zero.
    pub fn columns(&self, cs: &ConstraintSystem<F>) -> Vec<[F; PERMUTED_COLUMNS]> {
        cs.gates()
            .iter()
            .map(|gate| {
                let mut row = [F::zero(); PERMUTED_COLUMNS];
                for (cell, var) in row.iter_mut().zip(gate.vars.iter()) {
                    if let Some(value) = var.and_then(|v| self.value(v)) {
                        *cell = value;
                    }
                }
                row
            })
            .collect()
    }
}
