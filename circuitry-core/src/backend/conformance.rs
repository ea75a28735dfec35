//! Cross-backend conformance: the same circuit must finalize to the same
//! constraint system on every backend.

#[cfg(feature = "parallel")]
use rayon::prelude::*;
use strum::IntoEnumIterator;

use super::{BackendKind, OptimizationLevel};
use crate::constraints::layout::ConstraintSystem;
use crate::context::mode::ContextConfig;
use crate::context::CircuitContext;
use crate::field::CircuitField;
use crate::utils::errors::CircuitError;

fn diverged(quantity: &'static str, left: impl ToString, right: impl ToString) -> CircuitError {
    CircuitError::BackendDivergence {
        quantity,
        left: left.to_string(),
        right: right.to_string(),
    }
}

/// Compares two finalized systems on every observable quantity.
pub fn compare<F: CircuitField>(
    left: &ConstraintSystem<F>,
    right: &ConstraintSystem<F>,
) -> Result<(), CircuitError> {
    if left.rows() != right.rows() {
        return Err(diverged("rows", left.rows(), right.rows()));
    }
    if left.public_input_size() != right.public_input_size() {
        return Err(diverged(
            "public input size",
            left.public_input_size(),
            right.public_input_size(),
        ));
    }
    if let Some(row) = (0..left.rows()).find(|row| left.gates()[*row].coeffs != right.gates()[*row].coeffs) {
        return Err(diverged(
            "coefficients",
            format!("row {row}: {:?}", left.gates()[row].coeffs),
            format!("row {row}: {:?}", right.gates()[row].coeffs),
        ));
    }
    if !left.permutation().is_isomorphic(right.permutation()) {
        return Err(diverged(
            "permutation",
            format!("{} cycles", left.permutation().num_cycles()),
            format!("{} cycles", right.permutation().num_cycles()),
        ));
    }
    if left.digest() != right.digest() {
        return Err(diverged("digest", left.digest_hex(), right.digest_hex()));
    }
    Ok(())
}

/// Compiles `circuit` in constraint-generation mode on one backend.
pub fn compile_with<F, C>(
    kind: BackendKind,
    optimization: OptimizationLevel,
    circuit: &C,
) -> Result<ConstraintSystem<F>, CircuitError>
where
    F: CircuitField,
    C: Fn(&mut CircuitContext<F>) -> Result<(), CircuitError> + Sync,
{
    let config = ContextConfig::default().with_optimization(optimization);
    let mut ctx = CircuitContext::detached(kind, config);
    ctx.generate_constraints(|ctx| circuit(ctx))
        .map(|(_, cs)| cs)
}

/// Compiles `circuit` on every backend.
#[tracing::instrument(skip_all, name = "conformance::compile_on_all")]
pub fn compile_on_all<F, C>(
    optimization: OptimizationLevel,
    circuit: &C,
) -> Result<Vec<(BackendKind, ConstraintSystem<F>)>, CircuitError>
where
    F: CircuitField,
    C: Fn(&mut CircuitContext<F>) -> Result<(), CircuitError> + Sync,
{
    let kinds: Vec<BackendKind> = BackendKind::iter().collect();
    #[cfg(feature = "parallel")]
    let iter = kinds.into_par_iter();
    #[cfg(not(feature = "parallel"))]
    let iter = kinds.into_iter();
    iter.map(|kind| compile_with(kind, optimization, circuit).map(|cs| (kind, cs)))
        .collect()
}

/// Compiles on every backend and checks that all results agree. Returns the
/// reference backend's system.
pub fn check_equivalence<F, C>(
    optimization: OptimizationLevel,
    circuit: &C,
) -> Result<ConstraintSystem<F>, CircuitError>
where
    F: CircuitField,
    C: Fn(&mut CircuitContext<F>) -> Result<(), CircuitError> + Sync,
{
    let mut systems = compile_on_all(optimization, circuit)?.into_iter();
    let (_, first) = systems
        .next()
        .ok_or_else(|| diverged("backends", "none registered", "at least one"))?;
    for (kind, cs) in systems {
        compare(&first, &cs).map_err(|err| {
            tracing::warn!(%kind, %err, "backend divergence");
            err
        })?;
    }
    Ok(first)
}
