use crate::constraints::cvar::{Cvar, CvarArena};
use crate::constraints::reducer::reduce;
use crate::constraints::witness::WitnessStore;
use crate::field::CircuitField;
use crate::utils::errors::CircuitError;

/// Read access to concrete values, handed to witness callbacks.
pub struct ProverView<'a, F: CircuitField> {
    arena: &'a CvarArena<F>,
    witness: Option<&'a WitnessStore<F>>,
}

impl<'a, F: CircuitField> ProverView<'a, F> {
    pub(crate) fn new(arena: &'a CvarArena<F>, witness: Option<&'a WitnessStore<F>>) -> Self {
        Self { arena, witness }
    }

    /// The value of `cvar` under the current assignment.
    pub fn read(&self, cvar: Cvar) -> Result<F, CircuitError> {
        let lc = reduce(self.arena, cvar)?;
        match (lc.as_constant(), self.witness) {
            (Some(value), _) => Ok(value),
            (None, Some(witness)) => lc.evaluate(witness),
            (None, None) => Err(CircuitError::UnsupportedInPureMode("reading a variable")),
        }
    }
}
