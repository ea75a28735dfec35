//! Synthetic circuits shared by the profiling binary and the criterion
//! benchmarks.

use ark_bn254::Fr;
use strum::IntoEnumIterator;

use crate::backend::conformance::compile_with;
use crate::backend::{BackendKind, OptimizationLevel};
use crate::context::mode::ContextConfig;
use crate::context::CircuitContext;
use crate::field::CircuitField;
use crate::utils::errors::CircuitError;

#[derive(Debug, Copy, Clone, PartialEq, Eq, clap::ValueEnum)]
pub enum BenchType {
    /// `x_{i+1} = x_i · x_i + i`, checked against a public output.
    MulChain,
    /// One long linear combination asserted equal to a constant.
    LinearFan,
    /// Many private equalities, most of which collapse into unions.
    EqualityMesh,
    /// Rounds of a custom gate fed by sealed sums.
    CustomRounds,
}

fn fe(n: u64) -> Fr {
    <Fr as CircuitField>::from_u64(n)
}

/// Builds the circuit body for `bench` with `size` steps. Witness values are
/// consistent, so the body succeeds in every mode.
pub fn circuit(
    bench: BenchType,
    size: usize,
) -> impl Fn(&mut CircuitContext<Fr>) -> Result<(), CircuitError> + Sync {
    move |ctx: &mut CircuitContext<Fr>| match bench {
        BenchType::MulChain => mul_chain(ctx, size),
        BenchType::LinearFan => linear_fan(ctx, size),
        BenchType::EqualityMesh => equality_mesh(ctx, size),
        BenchType::CustomRounds => custom_rounds(ctx, size),
    }
}

fn mul_chain(ctx: &mut CircuitContext<Fr>, size: usize) -> Result<(), CircuitError> {
    let mut expected = fe(3);
    for i in 0..size {
        expected = expected * expected + fe(i as u64);
    }
    let out = ctx.public_input(|_| Ok(expected))?;
    let mut x = ctx.exists(|_| Ok(fe(3)))?;
    for i in 0..size {
        let sq = ctx.square(x)?;
        let step = ctx.constant(fe(i as u64));
        x = ctx.add(sq, step)?;
    }
    ctx.assert_equal(x, out)
}

fn linear_fan(ctx: &mut CircuitContext<Fr>, size: usize) -> Result<(), CircuitError> {
    let mut acc = ctx.constant(fe(0));
    let mut total = 0u64;
    for i in 0..size {
        let value = i as u64 + 1;
        let x = ctx.exists(|_| Ok(fe(value)))?;
        let weighted = ctx.scale(x, fe(2))?;
        acc = ctx.add(acc, weighted)?;
        total += 2 * value;
    }
    let target = ctx.constant(fe(total));
    ctx.assert_equal(acc, target)
}

fn equality_mesh(ctx: &mut CircuitContext<Fr>, size: usize) -> Result<(), CircuitError> {
    let vars = (0..size)
        .map(|_| ctx.exists(|_| Ok(fe(42))))
        .collect::<Result<Vec<_>, _>>()?;
    for pair in vars.windows(2) {
        ctx.assert_equal(pair[0], pair[1])?;
    }
    if let (Some(first), Some(last)) = (vars.first(), vars.last()) {
        ctx.assert_equal(*last, *first)?;
        let answer = ctx.constant(fe(42));
        ctx.assert_equal(*first, answer)?;
    }
    Ok(())
}

fn custom_rounds(ctx: &mut CircuitContext<Fr>, size: usize) -> Result<(), CircuitError> {
    let mut state = [
        ctx.exists(|_| Ok(fe(1)))?,
        ctx.exists(|_| Ok(fe(2)))?,
        ctx.exists(|_| Ok(fe(3)))?,
    ];
    for round in 0..size {
        let mixed = ctx.add(state[0], state[1])?;
        let mixed = ctx.add(mixed, state[2])?;
        let mixed = ctx.seal(mixed)?;
        ctx.custom_gate("Round", &[state[0], state[1], state[2], mixed], &[fe(round as u64)])?;
        state = [state[1], state[2], mixed];
    }
    Ok(())
}

/// Compilation runs for every backend, each wrapped in its own span.
pub fn benchmarks(
    bench: BenchType,
    size: usize,
    optimization: OptimizationLevel,
) -> Vec<(tracing::Span, Box<dyn FnOnce() -> Result<(), CircuitError>>)> {
    BackendKind::iter()
        .map(|kind| {
            let span = tracing::info_span!("compile", ?bench, %kind, size, %optimization);
            let task: Box<dyn FnOnce() -> Result<(), CircuitError>> = Box::new(move || {
                let body = circuit(bench, size);
                let cs = compile_with(kind, optimization, &body)?;
                tracing::info!(rows = cs.rows(), digest = %cs.digest_hex(), "compiled");

                let config = ContextConfig::default().with_optimization(optimization);
                let mut ctx = CircuitContext::detached(kind, config);
                let (_, witness) = ctx.run_checked(|ctx| body(ctx))?;
                tracing::info!(variables = witness.len(), "checked witness");
                Ok(())
            });
            (span, task)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::conformance::check_equivalence;

    #[test]
    fn every_bench_circuit_is_satisfiable_and_portable() {
        for bench in [
            BenchType::MulChain,
            BenchType::LinearFan,
            BenchType::EqualityMesh,
            BenchType::CustomRounds,
        ] {
            let body = circuit(bench, 16);
            for level in OptimizationLevel::iter() {
                check_equivalence(level, &body).unwrap();
            }
            for (_, task) in benchmarks(bench, 16, OptimizationLevel::Standard) {
                task().unwrap();
            }
        }
    }

    #[test]
    fn equality_mesh_collapses_under_optimization() {
        let body = circuit(BenchType::EqualityMesh, 32);
        let optimized = compile_with(BackendKind::Reference, OptimizationLevel::Standard, &body).unwrap();
        let plain = compile_with(BackendKind::Reference, OptimizationLevel::None, &body).unwrap();
        // Only the final comparison against a constant survives.
        assert_eq!(optimized.rows(), 1);
        assert_eq!(plain.rows(), 33);
    }
}
