//! Execution scopes and the host-facing circuit operations.
//!
//! A [`CircuitContext`] is a stack of scopes. The bottom scope is a pure
//! evaluation scope that can never be exited; every other scope owns its
//! own expression arena, backend instance and (in witness modes) witness
//! store, so nothing leaks between compilations.

use common::constants::PERMUTED_COLUMNS;

use crate::backend::selector::{BackendHandle, BackendSelector};
use crate::backend::{Backend, BackendAdapter, BackendKind, VariableKind};
use crate::constraints::cvar::{Cvar, CvarArena, ScopeId, VarId};
use crate::constraints::layout::ConstraintSystem;
use crate::constraints::ops::LinearCombination;
use crate::constraints::reducer::reduce;
use crate::constraints::witness::{Witness, WitnessStore};
use crate::field::CircuitField;
use crate::utils::errors::CircuitError;

use self::mode::{ContextConfig, ExecutionMode};
use self::prover::ProverView;

pub mod mode;
pub mod prover;

/// Proof that a scope was opened; needed to close it again.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[must_use]
pub struct ScopeHandle {
    id: ScopeId,
    mode: ExecutionMode,
}

impl ScopeHandle {
    pub fn mode(&self) -> ExecutionMode {
        self.mode
    }
}

/// What a scope hands back when it is closed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Artifact<F> {
    Unit,
    Witness {
        witness: Witness<F>,
        constraints: Option<ConstraintSystem<F>>,
    },
    ConstraintSystem(ConstraintSystem<F>),
}

impl<F> Artifact<F> {
    pub fn into_constraint_system(self) -> Option<ConstraintSystem<F>> {
        match self {
            Artifact::ConstraintSystem(cs) => Some(cs),
            Artifact::Witness { constraints, .. } => constraints,
            Artifact::Unit => None,
        }
    }

    pub fn into_witness(self) -> Option<Witness<F>> {
        match self {
            Artifact::Witness { witness, .. } => Some(witness),
            _ => None,
        }
    }
}

/// Result of [`CircuitContext::generate_witness`].
#[derive(Clone, Debug)]
pub struct ProverOutput<R, F> {
    pub output: R,
    pub witness: Witness<F>,
    pub constraints: Option<ConstraintSystem<F>>,
}

struct Scope<F: CircuitField> {
    id: ScopeId,
    mode: ExecutionMode,
    arena: CvarArena<F>,
    backend: Option<Backend<F>>,
    witness: Option<WitnessStore<F>>,
}

impl<F: CircuitField> Scope<F> {
    fn new(id: ScopeId, mode: ExecutionMode, backend: Option<Backend<F>>) -> Self {
        Self {
            id,
            mode,
            arena: CvarArena::new(id),
            backend,
            witness: mode.has_witness().then(WitnessStore::default),
        }
    }

    fn backend(&mut self, operation: &'static str) -> Result<&mut Backend<F>, CircuitError> {
        self.backend
            .as_mut()
            .ok_or(CircuitError::UnsupportedInPureMode(operation))
    }

    /// The concrete value of `lc`, if this scope knows it.
    fn concrete(&self, lc: &LinearCombination<F>) -> Result<Option<F>, CircuitError> {
        if let Some(value) = lc.as_constant() {
            return Ok(Some(value));
        }
        match &self.witness {
            Some(witness) => lc.evaluate(witness).map(Some),
            None => Ok(None),
        }
    }

    /// Allocates an internal variable holding `value` (known in witness modes).
    fn fresh(&mut self, value: Option<F>, operation: &'static str) -> Result<VarId, CircuitError> {
        let var = self.backend(operation)?.new_variable(VariableKind::Internal)?;
        if let (Some(witness), Some(value)) = (self.witness.as_mut(), value) {
            witness.set(var, value);
        }
        Ok(var)
    }

    fn lower_mul(
        &mut self,
        a: &LinearCombination<F>,
        b: &LinearCombination<F>,
        c: &LinearCombination<F>,
    ) -> Result<(), CircuitError> {
        let backend = self
            .backend
            .as_mut()
            .ok_or(CircuitError::UnsupportedInPureMode("multiplication"))?;
        backend.assert_mul(a, b, c, self.witness.as_mut())
    }

    fn into_artifact(self, config: &ContextConfig) -> Result<Artifact<F>, CircuitError> {
        let mode = self.mode;
        match (mode, self.backend, self.witness) {
            (ExecutionMode::PureEval, _, _) => Ok(Artifact::Unit),
            (ExecutionMode::GenerateConstraints, Some(backend), _) => {
                Ok(Artifact::ConstraintSystem(backend.current_constraint_system()))
            }
            (ExecutionMode::CheckedRun, Some(backend), Some(store)) => {
                let witness = store.into_witness();
                backend.current_constraint_system().check_witness(&witness)?;
                Ok(Artifact::Witness {
                    witness,
                    constraints: None,
                })
            }
            (ExecutionMode::GenerateWitness, Some(backend), Some(store)) => Ok(Artifact::Witness {
                witness: store.into_witness(),
                constraints: config
                    .record_witness_constraints
                    .then(|| backend.current_constraint_system()),
            }),
            _ => Err(CircuitError::ModeMismatch {
                operation: "exit",
                mode,
            }),
        }
    }
}

fn equality_violation<F: CircuitField>(
    location: &str,
    lcs: &[&LinearCombination<F>],
    values: &[F],
) -> CircuitError {
    CircuitError::assertion_violation(
        location,
        lcs.iter().map(|lc| format!("{lc:?}")).collect(),
        values.iter().map(F::to_canonical_string).collect(),
    )
}

pub struct CircuitContext<F: CircuitField> {
    handle: BackendHandle,
    config: ContextConfig,
    root: Scope<F>,
    scopes: Vec<Scope<F>>,
    next_scope: u32,
}

impl<F: CircuitField> CircuitContext<F> {
    pub fn new(handle: BackendHandle, config: ContextConfig) -> Self {
        Self {
            handle,
            config,
            root: Scope::new(ScopeId(0), ExecutionMode::PureEval, None),
            scopes: Vec::new(),
            next_scope: 1,
        }
    }

    /// A context registered with the process-wide [`BackendSelector`] and
    /// configured from the environment.
    pub fn from_global() -> Self {
        Self::new(BackendSelector::global().handle(), ContextConfig::from_env())
    }

    /// A context pinned to `kind` without touching the global selector.
    pub fn detached(kind: BackendKind, config: ContextConfig) -> Self {
        Self::new(BackendHandle::detached(kind), config)
    }

    pub fn config(&self) -> &ContextConfig {
        &self.config
    }

    pub fn backend_kind(&self) -> BackendKind {
        self.handle.kind()
    }

    pub fn mode(&self) -> ExecutionMode {
        self.top().mode
    }

    /// Number of scopes opened on top of the root scope.
    pub fn depth(&self) -> usize {
        self.scopes.len()
    }

    fn top(&self) -> &Scope<F> {
        self.scopes.last().unwrap_or(&self.root)
    }

    fn top_mut(&mut self) -> &mut Scope<F> {
        match self.scopes.last_mut() {
            Some(scope) => scope,
            None => &mut self.root,
        }
    }

    pub fn enter(&mut self, mode: ExecutionMode) -> ScopeHandle {
        let id = ScopeId(self.next_scope);
        self.next_scope += 1;
        let backend = mode
            .has_backend()
            .then(|| self.handle.instantiate(self.config.optimization));
        self.scopes.push(Scope::new(id, mode, backend));
        tracing::debug!(scope = id.0, %mode, "entered scope");
        ScopeHandle { id, mode }
    }

    /// Closes the innermost scope, which must be the one `handle` opened.
    pub fn exit(&mut self, handle: ScopeHandle) -> Result<Artifact<F>, CircuitError> {
        if self.scopes.last().map(|scope| scope.id) != Some(handle.id) {
            return Err(CircuitError::ScopeMismatch);
        }
        let scope = self.scopes.pop().ok_or(CircuitError::ScopeMismatch)?;
        tracing::debug!(scope = handle.id.0, mode = %handle.mode, "exited scope");
        scope.into_artifact(&self.config)
    }

    /// Drops the scope opened by `handle` and anything opened above it.
    fn unwind(&mut self, handle: ScopeHandle) {
        if let Some(position) = self.scopes.iter().position(|scope| scope.id == handle.id) {
            self.scopes.truncate(position);
        }
    }

    /// Runs `body` inside a fresh scope of the given mode. The scope is closed
    /// on every path; on error its partial state is discarded.
    pub fn scoped<R>(
        &mut self,
        mode: ExecutionMode,
        body: impl FnOnce(&mut Self) -> Result<R, CircuitError>,
    ) -> Result<(R, Artifact<F>), CircuitError> {
        let handle = self.enter(mode);
        match body(self) {
            Ok(output) => {
                if let Some(position) = self.scopes.iter().position(|scope| scope.id == handle.id)
                {
                    self.scopes.truncate(position + 1);
                }
                Ok((output, self.exit(handle)?))
            }
            Err(err) => {
                self.unwind(handle);
                Err(err)
            }
        }
    }

    pub fn generate_constraints<R>(
        &mut self,
        body: impl FnOnce(&mut Self) -> Result<R, CircuitError>,
    ) -> Result<(R, ConstraintSystem<F>), CircuitError> {
        let (output, artifact) = self.scoped(ExecutionMode::GenerateConstraints, body)?;
        let cs = artifact
            .into_constraint_system()
            .ok_or(CircuitError::ModeMismatch {
                operation: "generate_constraints",
                mode: ExecutionMode::GenerateConstraints,
            })?;
        Ok((output, cs))
    }

    pub fn generate_witness<R>(
        &mut self,
        body: impl FnOnce(&mut Self) -> Result<R, CircuitError>,
    ) -> Result<ProverOutput<R, F>, CircuitError> {
        match self.scoped(ExecutionMode::GenerateWitness, body)? {
            (
                output,
                Artifact::Witness {
                    witness,
                    constraints,
                },
            ) => Ok(ProverOutput {
                output,
                witness,
                constraints,
            }),
            _ => Err(CircuitError::ModeMismatch {
                operation: "generate_witness",
                mode: ExecutionMode::GenerateWitness,
            }),
        }
    }

    pub fn run_checked<R>(
        &mut self,
        body: impl FnOnce(&mut Self) -> Result<R, CircuitError>,
    ) -> Result<(R, Witness<F>), CircuitError> {
        let (output, artifact) = self.scoped(ExecutionMode::CheckedRun, body)?;
        let witness = artifact.into_witness().ok_or(CircuitError::ModeMismatch {
            operation: "run_checked",
            mode: ExecutionMode::CheckedRun,
        })?;
        Ok((output, witness))
    }

    pub fn pure_eval<R>(
        &mut self,
        body: impl FnOnce(&mut Self) -> Result<R, CircuitError>,
    ) -> Result<R, CircuitError> {
        self.scoped(ExecutionMode::PureEval, body)
            .map(|(output, _)| output)
    }

    pub fn constant(&mut self, value: F) -> Cvar {
        self.top_mut().arena.constant(value)
    }

    pub fn add(&mut self, a: Cvar, b: Cvar) -> Result<Cvar, CircuitError> {
        self.top_mut().arena.add(a, b)
    }

    pub fn sub(&mut self, a: Cvar, b: Cvar) -> Result<Cvar, CircuitError> {
        self.top_mut().arena.sub(a, b)
    }

    pub fn neg(&mut self, a: Cvar) -> Result<Cvar, CircuitError> {
        self.top_mut().arena.neg(a)
    }

    pub fn scale(&mut self, a: Cvar, scalar: F) -> Result<Cvar, CircuitError> {
        self.top_mut().arena.scale(scalar, a)
    }

    /// Flattens `a` into a linear combination over backend variables.
    pub fn reduce(&self, a: Cvar) -> Result<LinearCombination<F>, CircuitError> {
        reduce(&self.top().arena, a)
    }

    /// Declares a private variable. `compute` runs exactly once in witness
    /// modes and never while generating constraints.
    pub fn exists(
        &mut self,
        compute: impl FnOnce(&ProverView<F>) -> Result<F, CircuitError>,
    ) -> Result<Cvar, CircuitError> {
        self.declare(VariableKind::Witness, "exists", compute)
    }

    /// Declares a public input. All public inputs of a scope must be declared
    /// before anything else that allocates a variable.
    pub fn public_input(
        &mut self,
        compute: impl FnOnce(&ProverView<F>) -> Result<F, CircuitError>,
    ) -> Result<Cvar, CircuitError> {
        self.declare(VariableKind::Public, "public_input", compute)
    }

    fn declare(
        &mut self,
        kind: VariableKind,
        operation: &'static str,
        compute: impl FnOnce(&ProverView<F>) -> Result<F, CircuitError>,
    ) -> Result<Cvar, CircuitError> {
        let Scope {
            arena,
            backend,
            witness,
            ..
        } = self.top_mut();
        let backend = backend
            .as_mut()
            .ok_or(CircuitError::UnsupportedInPureMode(operation))?;
        let value = match witness.as_ref() {
            Some(store) => Some(compute(&ProverView::new(arena, Some(store)))?),
            None => None,
        };
        let var = backend.new_variable(kind)?;
        if let (Some(store), Some(value)) = (witness.as_mut(), value) {
            store.set(var, value);
        }
        Ok(arena.var(var))
    }

    pub fn mul(&mut self, a: Cvar, b: Cvar) -> Result<Cvar, CircuitError> {
        let scope = self.top_mut();
        let la = reduce(&scope.arena, a)?;
        let lb = reduce(&scope.arena, b)?;
        if let Some(k) = la.as_constant() {
            return scope.arena.scale(k, b);
        }
        if let Some(k) = lb.as_constant() {
            return scope.arena.scale(k, a);
        }
        let value = match (scope.concrete(&la)?, scope.concrete(&lb)?) {
            (Some(x), Some(y)) => Some(x * y),
            _ => None,
        };
        let z = scope.fresh(value, "mul")?;
        scope.lower_mul(&la, &lb, &LinearCombination::variable(z))?;
        Ok(scope.arena.var(z))
    }

    pub fn square(&mut self, a: Cvar) -> Result<Cvar, CircuitError> {
        self.mul(a, a)
    }

    /// Multiplicative inverse, constrained by `a · a⁻¹ = 1`.
    pub fn inv(&mut self, a: Cvar) -> Result<Cvar, CircuitError> {
        let scope = self.top_mut();
        let la = reduce(&scope.arena, a)?;
        if let Some(k) = la.as_constant() {
            let inverse = k.checked_inverse()?;
            return Ok(scope.arena.constant(inverse));
        }
        let value = scope
            .concrete(&la)?
            .map(|x| x.checked_inverse())
            .transpose()?;
        let z = scope.fresh(value, "inv")?;
        scope.lower_mul(
            &la,
            &LinearCombination::variable(z),
            &LinearCombination::constant(F::one()),
        )?;
        Ok(scope.arena.var(z))
    }

    pub fn div(&mut self, a: Cvar, b: Cvar) -> Result<Cvar, CircuitError> {
        let inverse = self.inv(b)?;
        self.mul(a, inverse)
    }

    /// A square root of `a`, constrained by `r · r = a`.
    pub fn sqrt(&mut self, a: Cvar) -> Result<Cvar, CircuitError> {
        let scope = self.top_mut();
        let la = reduce(&scope.arena, a)?;
        if let Some(k) = la.as_constant() {
            let root = k.checked_sqrt()?;
            return Ok(scope.arena.constant(root));
        }
        let value = scope.concrete(&la)?.map(|x| x.checked_sqrt()).transpose()?;
        let r = scope.fresh(value, "sqrt")?;
        let lr = LinearCombination::variable(r);
        scope.lower_mul(&lr, &lr, &la)?;
        Ok(scope.arena.var(r))
    }

    pub fn assert_equal(&mut self, a: Cvar, b: Cvar) -> Result<(), CircuitError> {
        let scope = self.top_mut();
        let la = reduce(&scope.arena, a)?;
        let lb = reduce(&scope.arena, b)?;
        if let (Some(x), Some(y)) = (scope.concrete(&la)?, scope.concrete(&lb)?) {
            if x != y {
                return Err(equality_violation("assert_equal", &[&la, &lb], &[x, y]));
            }
        }
        if scope.mode == ExecutionMode::PureEval {
            return Ok(());
        }
        let Scope {
            backend, witness, ..
        } = scope;
        let backend = backend
            .as_mut()
            .ok_or(CircuitError::UnsupportedInPureMode("assert_equal"))?;
        backend.assert_equal(&la, &lb, witness.as_mut())
    }

    pub fn assert_mul(&mut self, a: Cvar, b: Cvar, c: Cvar) -> Result<(), CircuitError> {
        let scope = self.top_mut();
        let la = reduce(&scope.arena, a)?;
        let lb = reduce(&scope.arena, b)?;
        let lc = reduce(&scope.arena, c)?;
        if let (Some(x), Some(y), Some(z)) = (
            scope.concrete(&la)?,
            scope.concrete(&lb)?,
            scope.concrete(&lc)?,
        ) {
            if x * y != z {
                return Err(equality_violation("assert_mul", &[&la, &lb, &lc], &[x, y, z]));
            }
        }
        if scope.mode == ExecutionMode::PureEval {
            return Ok(());
        }
        scope.lower_mul(&la, &lb, &lc)
    }

    pub fn assert_square(&mut self, a: Cvar, b: Cvar) -> Result<(), CircuitError> {
        self.assert_mul(a, a, b)
    }

    /// Constrains `a ∈ {0, 1}` via `a · a = a`.
    pub fn assert_boolean(&mut self, a: Cvar) -> Result<(), CircuitError> {
        self.assert_mul(a, a, a)
    }

    /// Materializes `a` as a single variable.
    pub fn seal(&mut self, a: Cvar) -> Result<Cvar, CircuitError> {
        let scope = self.top_mut();
        let la = reduce(&scope.arena, a)?;
        if la.is_constant() || la.as_single_var().is_some() {
            return Ok(a);
        }
        let Scope {
            arena,
            backend,
            witness,
            ..
        } = scope;
        let backend = backend
            .as_mut()
            .ok_or(CircuitError::UnsupportedInPureMode("seal"))?;
        let var = backend.seal(&la, witness.as_mut())?;
        Ok(arena.var(var))
    }

    /// Emits a custom gate over up to seven wires. Non-variable wires are
    /// sealed first.
    pub fn custom_gate(&mut self, name: &str, wires: &[Cvar], coeffs: &[F]) -> Result<(), CircuitError> {
        if wires.len() > PERMUTED_COLUMNS {
            return Err(CircuitError::GateArity {
                name: name.to_string(),
                wires: wires.len(),
                max: PERMUTED_COLUMNS,
            });
        }
        let Scope {
            arena,
            backend,
            witness,
            ..
        } = self.top_mut();
        let backend = backend
            .as_mut()
            .ok_or(CircuitError::UnsupportedInPureMode("custom_gate"))?;
        let mut vars = Vec::with_capacity(wires.len());
        for wire in wires {
            let lc = reduce(arena, *wire)?;
            vars.push(Some(backend.seal(&lc, witness.as_mut())?));
        }
        backend.custom_gate(name, &vars, coeffs)
    }

    /// The concrete value of `a`. Fails while generating constraints.
    pub fn read_var(&self, a: Cvar) -> Result<F, CircuitError> {
        let scope = self.top();
        let la = reduce(&scope.arena, a)?;
        scope.concrete(&la)?.ok_or(CircuitError::ModeMismatch {
            operation: "read_var",
            mode: scope.mode,
        })
    }

    /// Replaces `a` by a constant carrying its current value.
    pub fn to_constant(&mut self, a: Cvar) -> Result<Cvar, CircuitError> {
        let value = self.read_var(a).map_err(|err| match err {
            CircuitError::ModeMismatch { mode, .. } => CircuitError::ModeMismatch {
                operation: "to_constant",
                mode,
            },
            other => other,
        })?;
        Ok(self.constant(value))
    }

    /// Runs `block` with access to concrete values. Skipped entirely while
    /// generating constraints.
    pub fn as_prover(
        &self,
        block: impl FnOnce(&ProverView<F>) -> Result<(), CircuitError>,
    ) -> Result<(), CircuitError> {
        let scope = self.top();
        if scope.mode == ExecutionMode::GenerateConstraints {
            return Ok(());
        }
        block(&ProverView::new(&scope.arena, scope.witness.as_ref()))
    }

    pub fn rows(&self) -> Result<usize, CircuitError> {
        let scope = self.top();
        match &scope.backend {
            Some(backend) => Ok(backend.rows()),
            None => Err(CircuitError::UnsupportedInPureMode("rows")),
        }
    }

    pub fn num_variables(&self) -> Result<usize, CircuitError> {
        let scope = self.top();
        match &scope.backend {
            Some(backend) => Ok(backend.num_variables()),
            None => Err(CircuitError::UnsupportedInPureMode("num_variables")),
        }
    }

    /// Snapshot of the constraints emitted so far in the innermost scope.
    pub fn constraint_system(&self) -> Result<ConstraintSystem<F>, CircuitError> {
        let scope = self.top();
        match &scope.backend {
            Some(backend) => Ok(backend.current_constraint_system()),
            None => Err(CircuitError::UnsupportedInPureMode("constraint_system")),
        }
    }

    pub fn digest(&self) -> Result<String, CircuitError> {
        self.constraint_system().map(|cs| cs.digest_hex())
    }
}
