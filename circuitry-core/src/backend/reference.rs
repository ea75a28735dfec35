use std::collections::HashSet;

use super::{BackendAdapter, BackendKind, OptimizationLevel, VariableKind};
use crate::constraints::cvar::VarId;
use crate::constraints::layout::{self, ConstraintSystem, GateRow};
use crate::field::CircuitField;
use crate::utils::errors::CircuitError;

/// Keeps gates as emitted and resolves variable unions only when the
/// constraint system is laid out.
#[derive(Clone, Debug)]
pub struct ReferenceBackend<F: CircuitField> {
    optimization: OptimizationLevel,
    public_input_size: usize,
    parent: Vec<VarId>,
    gates: Vec<GateRow<F>>,
    emitted: HashSet<GateRow<F>>,
}

impl<F: CircuitField> ReferenceBackend<F> {
    pub fn new(optimization: OptimizationLevel) -> Self {
        Self {
            optimization,
            public_input_size: 0,
            parent: Vec::new(),
            gates: Vec::new(),
            emitted: HashSet::new(),
        }
    }

    /// Root lookup with path halving.
    fn find(&mut self, mut var: VarId) -> VarId {
        while self.parent[var.index()] != var {
            let grandparent = self.parent[self.parent[var.index()].index()];
            self.parent[var.index()] = grandparent;
            var = grandparent;
        }
        var
    }

    /// Representatives of every variable in one ascending pass. Unions keep
    /// the smaller index, so a parent is always resolved before its children.
    fn roots(&self) -> Vec<VarId> {
        let mut roots: Vec<VarId> = Vec::with_capacity(self.parent.len());
        for (index, parent) in self.parent.iter().enumerate() {
            let root = if parent.index() < index {
                roots[parent.index()]
            } else {
                *parent
            };
            roots.push(root);
        }
        roots
    }
}

impl<F: CircuitField> BackendAdapter<F> for ReferenceBackend<F> {
    fn kind(&self) -> BackendKind {
        BackendKind::Reference
    }

    fn optimization(&self) -> OptimizationLevel {
        self.optimization
    }

    fn new_variable(&mut self, kind: VariableKind) -> Result<VarId, CircuitError> {
        let var = VarId(self.parent.len());
        if kind == VariableKind::Public {
            if self.parent.len() != self.public_input_size || self.gates.len() != self.public_input_size {
                return Err(CircuitError::PublicInputOrder);
            }
            self.public_input_size += 1;
            self.gates.push(GateRow::public_input(var));
        }
        self.parent.push(var);
        Ok(var)
    }

    fn num_variables(&self) -> usize {
        self.parent.len()
    }

    fn public_input_size(&self) -> usize {
        self.public_input_size
    }

    fn resolve(&mut self, var: VarId) -> VarId {
        self.find(var)
    }

    fn alias(&mut self, keep: VarId, drop: VarId) {
        self.parent[drop.index()] = keep;
    }

    fn push_gate(&mut self, gate: GateRow<F>) -> bool {
        if self.optimization == OptimizationLevel::Aggressive && gate.is_generic() {
            let key = gate.resolved(|var| self.find(var));
            if !self.emitted.insert(key) {
                return false;
            }
        }
        self.gates.push(gate);
        true
    }

    fn rows(&self) -> usize {
        self.gates.len()
    }

    fn current_constraint_system(&self) -> ConstraintSystem<F> {
        let roots = self.roots();
        layout::finalize(&self.gates, self.public_input_size, |var| roots[var.index()])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ark_bn254::Fr;
    use ark_std::{One, Zero};

    #[test]
    fn long_alias_chains_resolve_to_the_smallest_variable() {
        let n = 50_000;
        let mut backend = ReferenceBackend::<Fr>::new(OptimizationLevel::Standard);
        let vars: Vec<VarId> = (0..n)
            .map(|_| backend.new_variable(VariableKind::Witness).unwrap())
            .collect();
        for var in &vars {
            backend.generic_gate(
                [Fr::one(), Fr::zero(), Fr::zero(), Fr::zero(), Fr::zero()],
                [Some(*var), None, None],
            );
        }
        // Each union hangs the previous root under a smaller one, so the
        // parent links form a single chain of length n.
        for pair in vars.windows(2).rev() {
            backend.alias(pair[0], pair[1]);
        }

        let cs = backend.current_constraint_system();
        assert_eq!(cs.permutation().num_cycles(), 1);
        assert_eq!(cs.permutation().cycle(VarId(0)).map(<[_]>::len), Some(n));
        assert!(cs.permutation().validate(cs.rows()).is_ok());

        assert_eq!(backend.resolve(vars[n - 1]), VarId(0));
        assert_eq!(backend.resolve(vars[n / 2]), VarId(0));
    }
}
