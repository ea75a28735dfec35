//! Gate rows, copy-constraint permutation and the finalized constraint system.

use std::collections::{BTreeMap, HashMap};

use common::constants::{
    GENERIC_COEFFS, GENERIC_GATE_NAME, GENERIC_WIRES, PERMUTED_COLUMNS, PUBLIC_INPUT_COLUMN,
};
use common::export::{ConstraintSystemJson, GateJson, WireJson};
use itertools::Itertools;
use sha3::{Digest, Sha3_256};

use super::cvar::VarId;
use super::witness::Witness;
use crate::field::CircuitField;
use crate::utils::errors::CircuitError;

/// Bumped whenever the canonical byte encoding changes.
const ENCODING_VERSION: u8 = 1;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Cell {
    pub row: usize,
    pub col: usize,
}

impl Cell {
    pub fn new(row: usize, col: usize) -> Self {
        Self { row, col }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum GateKind {
    Generic,
    Custom(String),
}

impl GateKind {
    pub fn name(&self) -> &str {
        match self {
            GateKind::Generic => GENERIC_GATE_NAME,
            GateKind::Custom(name) => name,
        }
    }

    fn tag(&self) -> u8 {
        match self {
            GateKind::Generic => 0,
            GateKind::Custom(_) => 1,
        }
    }
}

/// A gate as emitted by the reducer, before wiring is known.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct GateRow<F> {
    pub kind: GateKind,
    pub vars: [Option<VarId>; PERMUTED_COLUMNS],
    pub coeffs: Vec<F>,
}

impl<F: CircuitField> GateRow<F> {
    /// `qL·l + qR·r + qO·o + qM·l·r + qC = 0` over the first three columns.
    pub fn generic(coeffs: [F; GENERIC_COEFFS], wires: [Option<VarId>; GENERIC_WIRES]) -> Self {
        let mut vars = [None; PERMUTED_COLUMNS];
        vars[..GENERIC_WIRES].copy_from_slice(&wires);
        Self {
            kind: GateKind::Generic,
            vars,
            coeffs: coeffs.to_vec(),
        }
    }

    pub fn public_input(var: VarId) -> Self {
        let mut coeffs = [F::zero(); GENERIC_COEFFS];
        coeffs[0] = F::one();
        let mut wires = [None; GENERIC_WIRES];
        wires[PUBLIC_INPUT_COLUMN] = Some(var);
        Self::generic(coeffs, wires)
    }

    pub fn custom(name: &str, wires: &[Option<VarId>], coeffs: &[F]) -> Result<Self, CircuitError> {
        if wires.len() > PERMUTED_COLUMNS {
            return Err(CircuitError::GateArity {
                name: name.to_string(),
                wires: wires.len(),
                max: PERMUTED_COLUMNS,
            });
        }
        let mut vars = [None; PERMUTED_COLUMNS];
        vars[..wires.len()].copy_from_slice(wires);
        Ok(Self {
            kind: GateKind::Custom(name.to_string()),
            vars,
            coeffs: coeffs.to_vec(),
        })
    }

    pub fn is_generic(&self) -> bool {
        self.kind == GateKind::Generic
    }

    pub fn resolved(&self, mut resolve: impl FnMut(VarId) -> VarId) -> Self {
        Self {
            kind: self.kind.clone(),
            vars: self.vars.map(|var| var.map(&mut resolve)),
            coeffs: self.coeffs.clone(),
        }
    }
}

/// A finalized row: the gate together with its outgoing permutation wires.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Gate<F> {
    pub kind: GateKind,
    /// Representative variable held by each cell.
    pub vars: [Option<VarId>; PERMUTED_COLUMNS],
    /// `wires[c]` is the next cell in the copy cycle of `(row, c)`, or the
    /// cell itself when it takes part in no cycle.
    pub wires: [Cell; PERMUTED_COLUMNS],
    pub coeffs: Vec<F>,
}

/// Copy constraints: for every variable, the cycle of cells holding it in
/// row-major order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Permutation {
    cycles: BTreeMap<VarId, Vec<Cell>>,
    successors: HashMap<Cell, Cell>,
}

impl Permutation {
    pub fn from_cycles(cycles: BTreeMap<VarId, Vec<Cell>>) -> Self {
        let mut successors = HashMap::new();
        let cycles: BTreeMap<VarId, Vec<Cell>> = cycles
            .into_iter()
            .filter(|(_, cells)| !cells.is_empty())
            .map(|(var, mut cells)| {
                cells.sort_unstable();
                for (from, to) in cells.iter().zip(cells.iter().cycle().skip(1)) {
                    successors.insert(*from, *to);
                }
                (var, cells)
            })
            .collect();
        Self { cycles, successors }
    }

    /// Walks resolved rows in row-major order collecting the cells of every
    /// variable.
    pub fn from_rows<F>(rows: &[GateRow<F>]) -> Self {
        let mut cycles: BTreeMap<VarId, Vec<Cell>> = BTreeMap::new();
        for (row, gate) in rows.iter().enumerate() {
            for (col, var) in gate.vars.iter().enumerate() {
                if let Some(var) = var {
                    cycles.entry(*var).or_default().push(Cell::new(row, col));
                }
            }
        }
        Self::from_cycles(cycles)
    }

    pub fn next(&self, cell: Cell) -> Cell {
        self.successors.get(&cell).copied().unwrap_or(cell)
    }

    pub fn cycle(&self, var: VarId) -> Option<&[Cell]> {
        self.cycles.get(&var).map(Vec::as_slice)
    }

    pub fn cycles(&self) -> impl Iterator<Item = (VarId, &[Cell])> + '_ {
        self.cycles.iter().map(|(var, cells)| (*var, cells.as_slice()))
    }

    pub fn num_cycles(&self) -> usize {
        self.cycles.len()
    }

    /// Cycles stripped of their variable labels, ordered by first cell.
    pub fn canonical_cycles(&self) -> Vec<Vec<Cell>> {
        self.cycles
            .values()
            .cloned()
            .sorted_by_key(|cells| cells[0])
            .collect()
    }

    /// Same cell partition, regardless of which variable labels each class.
    pub fn is_isomorphic(&self, other: &Self) -> bool {
        self.canonical_cycles() == other.canonical_cycles()
    }

    /// Checks that cycles are disjoint, in bounds and closed.
    pub fn validate(&self, rows: usize) -> Result<(), String> {
        let mut owner: HashMap<Cell, VarId> = HashMap::new();
        for (var, cells) in &self.cycles {
            for cell in cells {
                if cell.row >= rows || cell.col >= PERMUTED_COLUMNS {
                    return Err(format!("{var} occupies out-of-range cell {cell:?}"));
                }
                if let Some(previous) = owner.insert(*cell, *var) {
                    return Err(format!("cell {cell:?} shared by {previous} and {var}"));
                }
            }
            let mut cursor = self.next(cells[0]);
            for _ in 1..cells.len() {
                cursor = self.next(cursor);
            }
            if cursor != cells[0] {
                return Err(format!("cycle of {var} does not close"));
            }
        }
        Ok(())
    }
}

/// The finalized, backend-independent constraint system.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConstraintSystem<F> {
    gates: Vec<Gate<F>>,
    permutation: Permutation,
    public_input_size: usize,
    digest: [u8; 32],
}

impl<F: CircuitField> ConstraintSystem<F> {
    /// Assembles rows whose variables are already resolved to their
    /// representatives.
    pub fn from_parts(
        rows: Vec<GateRow<F>>,
        permutation: Permutation,
        public_input_size: usize,
    ) -> Self {
        let gates: Vec<Gate<F>> = rows
            .into_iter()
            .enumerate()
            .map(|(row, gate)| Gate {
                wires: std::array::from_fn(|col| permutation.next(Cell::new(row, col))),
                kind: gate.kind,
                vars: gate.vars,
                coeffs: gate.coeffs,
            })
            .collect();
        let mut cs = Self {
            gates,
            permutation,
            public_input_size,
            digest: [0; 32],
        };
        cs.digest = Sha3_256::digest(cs.to_bytes()).into();
        cs
    }

    pub fn gates(&self) -> &[Gate<F>] {
        &self.gates
    }

    pub fn rows(&self) -> usize {
        self.gates.len()
    }

    pub fn permutation(&self) -> &Permutation {
        &self.permutation
    }

    pub fn public_input_size(&self) -> usize {
        self.public_input_size
    }

    /// SHA3-256 over [`ConstraintSystem::to_bytes`].
    pub fn digest(&self) -> [u8; 32] {
        self.digest
    }

    pub fn digest_hex(&self) -> String {
        hex::encode(self.digest)
    }

    /// Canonical encoding: public input count, then for every row its kind,
    /// coefficients (little-endian field bytes) and outgoing wires.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = vec![ENCODING_VERSION];
        let put = |bytes: &mut Vec<u8>, n: usize| bytes.extend((n as u64).to_le_bytes());
        put(&mut bytes, self.public_input_size);
        put(&mut bytes, self.gates.len());
        for gate in &self.gates {
            bytes.push(gate.kind.tag());
            if let GateKind::Custom(name) = &gate.kind {
                put(&mut bytes, name.len());
                bytes.extend(name.as_bytes());
            }
            put(&mut bytes, gate.coeffs.len());
            for coeff in &gate.coeffs {
                bytes.extend(coeff.to_le_bytes());
            }
            for wire in &gate.wires {
                put(&mut bytes, wire.row);
                put(&mut bytes, wire.col);
            }
        }
        bytes
    }

    pub fn to_json(&self) -> ConstraintSystemJson {
        ConstraintSystemJson {
            gates: self
                .gates
                .iter()
                .map(|gate| GateJson {
                    kind: gate.kind.name().to_string(),
                    wires: gate
                        .wires
                        .iter()
                        .map(|cell| WireJson {
                            row: cell.row,
                            col: cell.col,
                        })
                        .collect(),
                    coeffs: gate.coeffs.iter().map(F::to_canonical_string).collect(),
                })
                .collect(),
            public_input_size: self.public_input_size,
            rows: self.rows(),
            digest: self.digest_hex(),
        }
    }

    /// Evaluates every generic gate on `witness`. Public input rows bind their
    /// cell to the public value itself and are skipped; custom gates carry no
    /// semantics at this layer.
    pub fn check_witness(&self, witness: &Witness<F>) -> Result<(), CircuitError> {
        for (row, gate) in self
            .gates
            .iter()
            .enumerate()
            .skip(self.public_input_size)
        {
            if gate.kind != GateKind::Generic {
                continue;
            }
            let mut values = [F::zero(); GENERIC_WIRES];
            for (value, var) in values.iter_mut().zip(gate.vars.iter()) {
                if let Some(var) = var {
                    *value = witness
                        .value(*var)
                        .ok_or(CircuitError::UnassignedVariable(var.index()))?;
                }
            }
            let [l, r, o] = values;
            let q = &gate.coeffs;
            let eval = q[0] * l + q[1] * r + q[2] * o + q[3] * l * r + q[4];
            if !eval.is_zero() {
                return Err(CircuitError::gate_violation(
                    format!("generic gate at row {row}"),
                    q.iter().map(F::to_canonical_string).collect(),
                    gate.vars[..GENERIC_WIRES]
                        .iter()
                        .map(|var| var.map_or_else(|| "-".to_string(), |var| var.to_string()))
                        .collect(),
                    values.iter().map(F::to_canonical_string).collect(),
                ));
            }
        }
        Ok(())
    }
}

/// Resolves every row through `resolve` and derives the permutation from the
/// resolved rows.
#[tracing::instrument(skip_all, name = "layout::finalize")]
pub fn finalize<F: CircuitField>(
    rows: &[GateRow<F>],
    public_input_size: usize,
    mut resolve: impl FnMut(VarId) -> VarId,
) -> ConstraintSystem<F> {
    let rows: Vec<GateRow<F>> = rows.iter().map(|row| row.resolved(&mut resolve)).collect();
    let permutation = Permutation::from_rows(&rows);
    tracing::debug!(
        rows = rows.len(),
        cycles = permutation.num_cycles(),
        "laid out constraint system"
    );
    ConstraintSystem::from_parts(rows, permutation, public_input_size)
}
