//! Lowering of symbolic expressions into generic gates.
//!
//! [`reduce`] flattens a [`Cvar`] into a [`LinearCombination`];
//! [`ConstraintReducer`] turns combinations and assertions into rows on a
//! backend, allocating internal variables where a combination has to be
//! materialized.

use std::collections::HashMap;

use fixedbitset::FixedBitSet;

use super::cvar::{Cvar, CvarArena, Node, VarId};
use super::ops::{LinearCombination, Term};
use super::witness::WitnessStore;
use crate::backend::{BackendAdapter, OptimizationLevel, VariableKind};
use crate::field::CircuitField;
use crate::utils::errors::CircuitError;

/// Reduces `root` to `Σ cᵢ·xᵢ + k`.
///
/// Variables are ordered by their first occurrence in a left-to-right
/// depth-first walk of the expression. Every reachable node is visited once
/// for ordering and once for weight propagation, so shared subexpressions do
/// not blow up the work.
pub fn reduce<F: CircuitField>(
    arena: &CvarArena<F>,
    root: Cvar,
) -> Result<LinearCombination<F>, CircuitError> {
    let root = arena.check(root)?;
    let nodes = arena.nodes();

    let mut visited = FixedBitSet::with_capacity(root + 1);
    let mut reachable = Vec::new();
    let mut first_seen: Vec<VarId> = Vec::new();
    let mut stack = vec![root];
    while let Some(index) = stack.pop() {
        if visited.put(index) {
            continue;
        }
        reachable.push(index);
        match nodes[index] {
            Node::Constant(_) => {}
            Node::Var(var) => first_seen.push(var),
            Node::Add(lhs, rhs) => {
                stack.push(rhs);
                stack.push(lhs);
            }
            Node::Scale(_, child) => stack.push(child),
        }
    }

    // Children always precede their parents in the arena, so walking
    // reachable nodes from the highest index down sees every parent
    // contribution before forwarding a node's weight.
    reachable.sort_unstable_by(|a, b| b.cmp(a));
    let mut weights: HashMap<usize, F> = HashMap::with_capacity(reachable.len());
    weights.insert(root, F::one());
    let mut var_weights: HashMap<VarId, F> = HashMap::new();
    let mut constant = F::zero();
    for index in reachable {
        let Some(weight) = weights.remove(&index) else {
            continue;
        };
        match nodes[index] {
            Node::Constant(c) => constant += weight * c,
            Node::Var(var) => *var_weights.entry(var).or_insert_with(F::zero) += weight,
            Node::Add(lhs, rhs) => {
                *weights.entry(lhs).or_insert_with(F::zero) += weight;
                *weights.entry(rhs).or_insert_with(F::zero) += weight;
            }
            Node::Scale(scalar, child) => {
                *weights.entry(child).or_insert_with(F::zero) += scalar * weight;
            }
        }
    }

    let terms = first_seen
        .into_iter()
        .filter_map(|var| var_weights.remove(&var).map(|coeff| Term(var, coeff)))
        .collect();
    Ok(LinearCombination::new(terms, constant))
}

/// Emits gates for linear relations and products on a backend.
///
/// When a witness store is attached, every internal variable allocated here
/// is assigned its value, so the produced witness satisfies the emitted rows.
pub struct ConstraintReducer<'a, F: CircuitField, B: BackendAdapter<F> + ?Sized> {
    backend: &'a mut B,
    witness: Option<&'a mut WitnessStore<F>>,
}

impl<'a, F: CircuitField, B: BackendAdapter<F> + ?Sized> ConstraintReducer<'a, F, B> {
    pub fn new(backend: &'a mut B, witness: Option<&'a mut WitnessStore<F>>) -> Self {
        Self { backend, witness }
    }

    fn fresh(
        &mut self,
        value: impl FnOnce(&WitnessStore<F>) -> Result<F, CircuitError>,
    ) -> Result<VarId, CircuitError> {
        let var = self.backend.new_variable(VariableKind::Internal)?;
        if let Some(witness) = self.witness.as_deref_mut() {
            let value = value(witness)?;
            witness.set(var, value);
        }
        Ok(var)
    }

    fn gate(&mut self, coeffs: [F; 5], wires: [Option<VarId>; 3]) {
        let emitted = self.backend.generic_gate(coeffs, wires);
        tracing::trace!(?wires, emitted, "generic gate");
    }

    /// Returns a variable equal to `lc`, adding the rows that define it.
    /// A combination that already is a single variable costs nothing.
    pub fn seal(&mut self, lc: &LinearCombination<F>) -> Result<VarId, CircuitError> {
        if let Some(var) = lc.as_single_var() {
            return Ok(var);
        }
        let k = lc.constant_term();
        match lc.terms() {
            [] => {
                let v = self.fresh(|_| Ok(k))?;
                self.gate([F::one(), F::zero(), F::zero(), F::zero(), -k], [Some(v), None, None]);
                Ok(v)
            }
            [Term(x, c)] => {
                let v = self.fresh(|w| lc.evaluate(w))?;
                self.gate([*c, F::zero(), -F::one(), F::zero(), k], [Some(*x), None, Some(v)]);
                Ok(v)
            }
            [Term(x1, c1), Term(x2, c2)] => {
                let v = self.fresh(|w| lc.evaluate(w))?;
                self.gate([*c1, *c2, -F::one(), F::zero(), k], [Some(*x1), Some(*x2), Some(v)]);
                Ok(v)
            }
            [Term(x1, c1), Term(x2, c2), rest @ ..] => {
                let head = lc.prefix(2);
                let mut acc = self.fresh(|w| head.evaluate(w))?;
                self.gate(
                    [*c1, *c2, -F::one(), F::zero(), F::zero()],
                    [Some(*x1), Some(*x2), Some(acc)],
                );
                for (i, Term(x, c)) in rest.iter().enumerate() {
                    let last = i + 1 == rest.len();
                    let kk = if last { k } else { F::zero() };
                    let prev = acc;
                    acc = self.fresh(|w| {
                        let prev = w.get(prev).ok_or(CircuitError::UnassignedVariable(prev.index()))?;
                        let x = w.get(*x).ok_or(CircuitError::UnassignedVariable(x.index()))?;
                        Ok(prev + *c * x + kk)
                    })?;
                    self.gate([F::one(), *c, -F::one(), F::zero(), kk], [Some(prev), Some(*x), Some(acc)]);
                }
                Ok(acc)
            }
        }
    }

    /// Constrains `lhs = rhs`.
    ///
    /// With optimization enabled, equal representatives are skipped and two
    /// private variables are merged into one copy class instead of costing a
    /// row. A constant mismatch fails immediately.
    pub fn assert_equal(
        &mut self,
        lhs: &LinearCombination<F>,
        rhs: &LinearCombination<F>,
    ) -> Result<(), CircuitError> {
        let level = self.backend.optimization();
        if level != OptimizationLevel::None {
            if let (Some(u), Some(v)) = (lhs.as_single_var(), rhs.as_single_var()) {
                let (ru, rv) = (self.backend.resolve(u), self.backend.resolve(v));
                if ru == rv {
                    tracing::debug!(var = %ru, "elided self-equality");
                    return Ok(());
                }
                if !self.backend.is_public(ru) && !self.backend.is_public(rv) {
                    let (keep, drop) = if ru < rv { (ru, rv) } else { (rv, ru) };
                    tracing::debug!(%keep, %drop, "aliased private variables");
                    self.backend.alias(keep, drop);
                    return Ok(());
                }
            }
        }

        let mut diff = lhs.clone() - rhs.clone();
        if level != OptimizationLevel::None {
            diff = self.resolved(&diff);
        }
        if let Some(k) = diff.as_constant() {
            if !k.is_zero() {
                return Err(CircuitError::assertion_violation(
                    "assert_equal",
                    vec![format!("{lhs:?}"), format!("{rhs:?}")],
                    vec![k.to_canonical_string()],
                ));
            }
            if level == OptimizationLevel::None && !(lhs.is_constant() && rhs.is_constant()) {
                let l = self.seal(lhs)?;
                let r = self.seal(rhs)?;
                self.gate(
                    [F::one(), -F::one(), F::zero(), F::zero(), F::zero()],
                    [Some(l), Some(r), None],
                );
            } else {
                tracing::debug!("elided trivially true equality");
            }
            return Ok(());
        }
        self.assert_zero(&diff)
    }

    /// Rewrites `lc` over copy-class representatives, so merged variables
    /// combine into a single term (or cancel).
    fn resolved(&mut self, lc: &LinearCombination<F>) -> LinearCombination<F> {
        let terms = lc
            .terms()
            .iter()
            .map(|Term(var, coeff)| Term(self.backend.resolve(*var), *coeff))
            .collect();
        LinearCombination::new(terms, lc.constant_term())
    }

    /// Constrains a non-constant combination to zero.
    fn assert_zero(&mut self, lc: &LinearCombination<F>) -> Result<(), CircuitError> {
        let k = lc.constant_term();
        match lc.terms() {
            [] => Ok(()),
            [Term(x, c)] => {
                self.gate([*c, F::zero(), F::zero(), F::zero(), k], [Some(*x), None, None]);
                Ok(())
            }
            [Term(x1, c1), Term(x2, c2)] => {
                self.gate([*c1, *c2, F::zero(), F::zero(), k], [Some(*x1), Some(*x2), None]);
                Ok(())
            }
            terms => {
                let n = terms.len();
                let acc = self.seal(&lc.prefix(n - 2))?;
                let (Term(x, c), Term(y, d)) = (terms[n - 2], terms[n - 1]);
                self.gate([F::one(), c, d, F::zero(), k], [Some(acc), Some(x), Some(y)]);
                Ok(())
            }
        }
    }

    /// Constrains `a·b = c`. A constant factor turns this into a linear
    /// equality without a multiplication row.
    pub fn assert_mul(
        &mut self,
        a: &LinearCombination<F>,
        b: &LinearCombination<F>,
        c: &LinearCombination<F>,
    ) -> Result<(), CircuitError> {
        if let Some(ka) = a.as_constant() {
            return self.assert_equal(&(b.clone() * ka), c);
        }
        if let Some(kb) = b.as_constant() {
            return self.assert_equal(&(a.clone() * kb), c);
        }
        let va = self.seal(a)?;
        let vb = if b == a { va } else { self.seal(b)? };
        let kc = c.constant_term();
        match c.terms() {
            [] => self.gate(
                [F::zero(), F::zero(), F::zero(), F::one(), -kc],
                [Some(va), Some(vb), None],
            ),
            [Term(z, cz)] => self.gate(
                [F::zero(), F::zero(), -*cz, F::one(), -kc],
                [Some(va), Some(vb), Some(*z)],
            ),
            _ => {
                let vc = self.seal(c)?;
                self.gate(
                    [F::zero(), F::zero(), -F::one(), F::one(), F::zero()],
                    [Some(va), Some(vb), Some(vc)],
                );
            }
        }
        Ok(())
    }
}
