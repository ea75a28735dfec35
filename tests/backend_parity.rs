//! Random circuits must compile identically on every backend and stay
//! satisfiable in every execution mode.

use std::sync::atomic::{AtomicUsize, Ordering};

use ark_bn254::Fr;
use circuitry::backend::conformance::{check_equivalence, compare};
use circuitry::context::mode::ContextConfig;
use circuitry::{
    BackendKind, CircuitContext, CircuitError, CircuitField, Cvar, ExecutionMode,
    OptimizationLevel,
};
use proptest::prelude::*;
use strum::IntoEnumIterator;

#[derive(Clone, Debug)]
enum Op {
    Exists(u8),
    Constant(u8),
    Add(usize, usize),
    Sub(usize, usize),
    Scale(usize, i8),
    Mul(usize, usize),
    Seal(usize),
    AssertEqual(usize, usize),
    AssertProduct(usize, usize),
}

#[derive(Clone, Debug)]
struct Program {
    publics: Vec<u8>,
    ops: Vec<Op>,
}

fn op_strategy() -> impl Strategy<Value = Op> {
    // Small values make accidental equalities (and hence unions) common.
    prop_oneof![
        3 => (0u8..4).prop_map(Op::Exists),
        1 => (0u8..4).prop_map(Op::Constant),
        2 => (any::<usize>(), any::<usize>()).prop_map(|(a, b)| Op::Add(a, b)),
        1 => (any::<usize>(), any::<usize>()).prop_map(|(a, b)| Op::Sub(a, b)),
        1 => (any::<usize>(), -3i8..4).prop_map(|(a, s)| Op::Scale(a, s)),
        2 => (any::<usize>(), any::<usize>()).prop_map(|(a, b)| Op::Mul(a, b)),
        1 => any::<usize>().prop_map(Op::Seal),
        3 => (any::<usize>(), any::<usize>()).prop_map(|(a, b)| Op::AssertEqual(a, b)),
        1 => (any::<usize>(), any::<usize>()).prop_map(|(a, b)| Op::AssertProduct(a, b)),
    ]
}

prop_compose! {
    fn program()(
        publics in proptest::collection::vec(0u8..4, 0..3),
        ops in proptest::collection::vec(op_strategy(), 1..40),
    ) -> Program {
        Program { publics, ops }
    }
}

fn fe(n: i64) -> Fr {
    <Fr as CircuitField>::from_i64(n)
}

/// Replays `program`, tracking the value of every expression on the side so
/// that every assertion it emits holds. `calls` counts witness callbacks.
fn run(
    ctx: &mut CircuitContext<Fr>,
    program: &Program,
    calls: &AtomicUsize,
) -> Result<(), CircuitError> {
    let mut cvars: Vec<Cvar> = Vec::new();
    let mut values: Vec<Fr> = Vec::new();
    for value in &program.publics {
        let v = fe(*value as i64);
        cvars.push(ctx.public_input(|_| {
            calls.fetch_add(1, Ordering::Relaxed);
            Ok(v)
        })?);
        values.push(v);
    }
    let one = ctx.constant(fe(1));
    cvars.push(one);
    values.push(fe(1));

    for op in &program.ops {
        let pick = |i: usize| i % cvars.len();
        let (cvar, value) = match *op {
            Op::Exists(n) => {
                let v = fe(n as i64);
                let x = ctx.exists(|_| {
                    calls.fetch_add(1, Ordering::Relaxed);
                    Ok(v)
                })?;
                (x, v)
            }
            Op::Constant(n) => (ctx.constant(fe(n as i64)), fe(n as i64)),
            Op::Add(a, b) => {
                let (a, b) = (pick(a), pick(b));
                (ctx.add(cvars[a], cvars[b])?, values[a] + values[b])
            }
            Op::Sub(a, b) => {
                let (a, b) = (pick(a), pick(b));
                (ctx.sub(cvars[a], cvars[b])?, values[a] - values[b])
            }
            Op::Scale(a, s) => {
                let a = pick(a);
                let s = fe(s as i64);
                (ctx.scale(cvars[a], s)?, values[a] * s)
            }
            Op::Mul(a, b) => {
                let (a, b) = (pick(a), pick(b));
                (ctx.mul(cvars[a], cvars[b])?, values[a] * values[b])
            }
            Op::Seal(a) => {
                let a = pick(a);
                (ctx.seal(cvars[a])?, values[a])
            }
            Op::AssertEqual(a, b) => {
                let (a, b) = (pick(a), pick(b));
                if values[a] == values[b] {
                    ctx.assert_equal(cvars[a], cvars[b])?;
                } else {
                    let diff = ctx.sub(cvars[a], cvars[b])?;
                    let expected = ctx.constant(values[a] - values[b]);
                    ctx.assert_equal(diff, expected)?;
                }
                continue;
            }
            Op::AssertProduct(a, b) => {
                let (a, b) = (pick(a), pick(b));
                let product = ctx.constant(values[a] * values[b]);
                ctx.assert_mul(cvars[a], cvars[b], product)?;
                continue;
            }
        };
        cvars.push(cvar);
        values.push(value);
    }
    Ok(())
}

fn context(kind: BackendKind, level: OptimizationLevel) -> CircuitContext<Fr> {
    CircuitContext::detached(kind, ContextConfig::default().with_optimization(level))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn backends_produce_identical_systems(program in program()) {
        for level in OptimizationLevel::iter() {
            let calls = AtomicUsize::new(0);
            let cs = check_equivalence(level, &|ctx: &mut CircuitContext<Fr>| run(ctx, &program, &calls));
            prop_assert!(cs.is_ok(), "{level}: {cs:?}");
            let cs = cs.unwrap();
            prop_assert_eq!(cs.public_input_size(), program.publics.len());
            prop_assert!(cs.permutation().validate(cs.rows()).is_ok());
            // Witness callbacks never run while generating constraints.
            prop_assert_eq!(calls.load(Ordering::Relaxed), 0);
        }
    }

    #[test]
    fn witnesses_satisfy_the_recorded_constraints(program in program()) {
        let declared = program.publics.len()
            + program.ops.iter().filter(|op| matches!(op, Op::Exists(_))).count();
        for level in OptimizationLevel::iter() {
            let mut systems = Vec::new();
            for kind in BackendKind::iter() {
                let mut ctx = context(kind, level);
                let calls = AtomicUsize::new(0);
                let (_, compiled) = ctx
                    .generate_constraints(|ctx| run(ctx, &program, &calls))
                    .unwrap();

                let output = ctx.generate_witness(|ctx| run(ctx, &program, &calls)).unwrap();
                prop_assert_eq!(calls.load(Ordering::Relaxed), declared);
                let recorded = output.constraints.unwrap();
                prop_assert_eq!(recorded.digest(), compiled.digest());
                prop_assert!(recorded.check_witness(&output.witness).is_ok());
                prop_assert!(output.witness.is_complete());

                let (_, checked) = ctx.run_checked(|ctx| run(ctx, &program, &calls)).unwrap();
                prop_assert_eq!(calls.load(Ordering::Relaxed), 2 * declared);
                prop_assert_eq!(checked, output.witness);
                systems.push(compiled);
            }
            for pair in systems.windows(2) {
                prop_assert!(compare(&pair[0], &pair[1]).is_ok());
            }
        }
    }

    #[test]
    fn false_assertions_are_caught_at_every_level(program in program(), target in any::<usize>()) {
        for level in OptimizationLevel::iter() {
            for kind in BackendKind::iter() {
                let mut ctx = context(kind, level);
                let calls = AtomicUsize::new(0);
                let result = ctx.run_checked(|ctx| {
                    run(ctx, &program, &calls)?;
                    // A fresh private copy of some value, then a wrong claim about it.
                    let x = ctx.exists(|_| Ok(fe(7)))?;
                    let wrong = ctx.constant(fe(8));
                    let shifted = ctx.add(x, wrong)?;
                    let claim = ctx.constant(fe(14 + (target % 3) as i64 + 2));
                    ctx.assert_equal(shifted, claim)
                });
                prop_assert!(
                    matches!(result, Err(CircuitError::ConstraintViolation(_))),
                    "{level}/{kind}: {result:?}"
                );
                prop_assert_eq!(ctx.mode(), ExecutionMode::PureEval);
            }
        }
    }
}

#[test]
fn elided_equalities_still_bind_values() {
    // x == y is a union under optimization. A witness with x != y must then be
    // rejected by the finalized system, not silently accepted.
    for kind in BackendKind::iter() {
        let mut ctx = context(kind, OptimizationLevel::Standard);
        let (_, cs) = ctx
            .generate_constraints(|ctx| {
                let x = ctx.exists(|_| Ok(fe(3)))?;
                let y = ctx.exists(|_| Ok(fe(3)))?;
                ctx.assert_equal(x, y)?;
                let nine = ctx.constant(fe(9));
                let xy = ctx.mul(x, y)?;
                ctx.assert_equal(xy, nine)
            })
            .unwrap();
        // x and y now share one copy cycle: the product row reads the same class twice.
        let gate = &cs.gates()[0];
        assert_eq!(gate.vars[0], gate.vars[1]);
        assert_eq!(
            cs.permutation().cycle(gate.vars[0].unwrap()).map(|cells| cells.len()),
            Some(2)
        );
    }
}
