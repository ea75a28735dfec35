use std::collections::{BTreeMap, HashMap};

use common::constants::PERMUTED_COLUMNS;
use itertools::Itertools;

use super::{BackendAdapter, BackendKind, OptimizationLevel, VariableKind};
use crate::constraints::cvar::VarId;
use crate::constraints::layout::{Cell, ConstraintSystem, GateKind, GateRow, Permutation};
use crate::field::CircuitField;
use crate::utils::errors::CircuitError;

/// Stores wiring column by column and maintains copy cycles incrementally:
/// every representative owns the row-major list of cells it occupies, and
/// unions merge those lists as they happen.
#[derive(Clone, Debug)]
pub struct ColumnarBackend<F: CircuitField> {
    optimization: OptimizationLevel,
    public_input_size: usize,
    parent: Vec<usize>,
    kinds: Vec<GateKind>,
    coeffs: Vec<Vec<F>>,
    columns: [Vec<Option<VarId>>; PERMUTED_COLUMNS],
    occurrences: HashMap<VarId, Vec<Cell>>,
    emitted: HashMap<GateRow<F>, usize>,
}

impl<F: CircuitField> ColumnarBackend<F> {
    pub fn new(optimization: OptimizationLevel) -> Self {
        Self {
            optimization,
            public_input_size: 0,
            parent: Vec::new(),
            kinds: Vec::new(),
            coeffs: Vec::new(),
            columns: Default::default(),
            occurrences: HashMap::new(),
            emitted: HashMap::new(),
        }
    }

    /// Root lookup with path compression.
    fn find(&mut self, var: VarId) -> VarId {
        let mut root = var.index();
        while self.parent[root] != root {
            root = self.parent[root];
        }
        let mut cursor = var.index();
        while self.parent[cursor] != root {
            let next = self.parent[cursor];
            self.parent[cursor] = root;
            cursor = next;
        }
        VarId(root)
    }

    fn find_const(&self, var: VarId) -> VarId {
        let mut root = var.index();
        while self.parent[root] != root {
            root = self.parent[root];
        }
        VarId(root)
    }

    fn append(&mut self, gate: GateRow<F>) {
        let row = self.kinds.len();
        for (col, var) in gate.vars.iter().enumerate() {
            self.columns[col].push(*var);
            if let Some(var) = var {
                let root = self.find(*var);
                self.occurrences
                    .entry(root)
                    .or_default()
                    .push(Cell::new(row, col));
            }
        }
        self.kinds.push(gate.kind);
        self.coeffs.push(gate.coeffs);
    }
}

impl<F: CircuitField> BackendAdapter<F> for ColumnarBackend<F> {
    fn kind(&self) -> BackendKind {
        BackendKind::Columnar
    }

    fn optimization(&self) -> OptimizationLevel {
        self.optimization
    }

    fn new_variable(&mut self, kind: VariableKind) -> Result<VarId, CircuitError> {
        let var = VarId(self.parent.len());
        if kind == VariableKind::Public {
            if self.parent.len() != self.public_input_size || self.kinds.len() != self.public_input_size {
                return Err(CircuitError::PublicInputOrder);
            }
            self.public_input_size += 1;
            self.parent.push(var.index());
            self.append(GateRow::public_input(var));
            return Ok(var);
        }
        self.parent.push(var.index());
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
        self.parent[drop.index()] = keep.index();
        if let Some(moved) = self.occurrences.remove(&drop) {
            let kept = self.occurrences.remove(&keep).unwrap_or_default();
            let merged = kept.into_iter().merge(moved).collect();
            self.occurrences.insert(keep, merged);
        }
    }

    fn push_gate(&mut self, gate: GateRow<F>) -> bool {
        if self.optimization == OptimizationLevel::Aggressive && gate.kind == GateKind::Generic {
            let key = gate.resolved(|var| self.find(var));
            if let Some(row) = self.emitted.get(&key) {
                tracing::trace!(row, "dropped duplicate gate");
                return false;
            }
            self.emitted.insert(key, self.kinds.len());
        }
        self.append(gate);
        true
    }

    fn rows(&self) -> usize {
        self.kinds.len()
    }

    #[tracing::instrument(skip_all, name = "ColumnarBackend::current_constraint_system")]
    fn current_constraint_system(&self) -> ConstraintSystem<F> {
        let rows = (0..self.kinds.len())
            .map(|row| GateRow {
                kind: self.kinds[row].clone(),
                vars: std::array::from_fn(|col| {
                    self.columns[col][row].map(|var| self.find_const(var))
                }),
                coeffs: self.coeffs[row].clone(),
            })
            .collect();
        let cycles: BTreeMap<VarId, Vec<Cell>> = self
            .occurrences
            .iter()
            .map(|(var, cells)| (*var, cells.clone()))
            .collect();
        ConstraintSystem::from_parts(rows, Permutation::from_cycles(cycles), self.public_input_size)
    }
}
