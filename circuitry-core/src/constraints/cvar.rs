//! Symbolic field expressions.
//!
//! A [`Cvar`] is an index into a [`CvarArena`] owned by one scope. Nodes only
//! ever reference nodes created before them, so the arena is a DAG in
//! topological order and shared subexpressions are stored once.

use std::fmt::Debug;

use crate::field::CircuitField;
use crate::utils::errors::CircuitError;

/// Identifier of a variable allocated by a backend.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct VarId(pub usize);

impl VarId {
    pub fn index(&self) -> usize {
        self.0
    }
}

impl std::fmt::Display for VarId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "v{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct ScopeId(pub u32);

/// Handle to an expression node. Cheap to copy; only meaningful inside the
/// scope whose arena created it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Cvar {
    scope: ScopeId,
    index: usize,
}

impl Cvar {
    pub fn scope(&self) -> ScopeId {
        self.scope
    }

    pub(crate) fn index(&self) -> usize {
        self.index
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Node<F> {
    Constant(F),
    Var(VarId),
    Add(usize, usize),
    Scale(F, usize),
}

#[derive(Clone, Debug)]
pub struct CvarArena<F> {
    scope: ScopeId,
    nodes: Vec<Node<F>>,
}

impl<F: CircuitField> CvarArena<F> {
    pub fn new(scope: ScopeId) -> Self {
        Self {
            scope,
            nodes: Vec::new(),
        }
    }

    pub fn scope(&self) -> ScopeId {
        self.scope
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn nodes(&self) -> &[Node<F>] {
        &self.nodes
    }

    /// Rejects handles minted by another scope.
    pub fn check(&self, cvar: Cvar) -> Result<usize, CircuitError> {
        if cvar.scope != self.scope || cvar.index() >= self.nodes.len() {
            return Err(CircuitError::ForeignVariable {
                expected: self.scope.0,
                found: cvar.scope.0,
            });
        }
        Ok(cvar.index())
    }

    pub fn node(&self, cvar: Cvar) -> Result<&Node<F>, CircuitError> {
        let index = self.check(cvar)?;
        Ok(&self.nodes[index])
    }

    /// The value of `cvar` if it folded to a constant node.
    pub fn as_constant(&self, cvar: Cvar) -> Result<Option<F>, CircuitError> {
        match self.node(cvar)? {
            Node::Constant(c) => Ok(Some(*c)),
            _ => Ok(None),
        }
    }

    fn push(&mut self, node: Node<F>) -> Cvar {
        let index = self.nodes.len();
        self.nodes.push(node);
        Cvar {
            scope: self.scope,
            index,
        }
    }

    pub fn constant(&mut self, value: F) -> Cvar {
        self.push(Node::Constant(value))
    }

    pub fn var(&mut self, var: VarId) -> Cvar {
        self.push(Node::Var(var))
    }

    pub fn add(&mut self, lhs: Cvar, rhs: Cvar) -> Result<Cvar, CircuitError> {
        let (l, r) = (self.check(lhs)?, self.check(rhs)?);
        match (self.nodes[l], self.nodes[r]) {
            (Node::Constant(a), Node::Constant(b)) => Ok(self.constant(a + b)),
            (Node::Constant(a), _) if a.is_zero() => Ok(rhs),
            (_, Node::Constant(b)) if b.is_zero() => Ok(lhs),
            _ => Ok(self.push(Node::Add(l, r))),
        }
    }

    pub fn scale(&mut self, scalar: F, cvar: Cvar) -> Result<Cvar, CircuitError> {
        let index = self.check(cvar)?;
        if scalar.is_zero() {
            return Ok(self.constant(F::zero()));
        }
        if scalar.is_one() {
            return Ok(cvar);
        }
        match self.nodes[index] {
            Node::Constant(c) => Ok(self.constant(scalar * c)),
            Node::Scale(inner, child) => Ok(self.push(Node::Scale(scalar * inner, child))),
            _ => Ok(self.push(Node::Scale(scalar, index))),
        }
    }

    pub fn neg(&mut self, cvar: Cvar) -> Result<Cvar, CircuitError> {
        self.scale(-F::one(), cvar)
    }

    pub fn sub(&mut self, lhs: Cvar, rhs: Cvar) -> Result<Cvar, CircuitError> {
        let negated = self.neg(rhs)?;
        self.add(lhs, negated)
    }
}
