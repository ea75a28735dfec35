//! Defines the LinearCombination (LC) object produced by reducing a [`Cvar`].
//! An LC is an ordered list of Terms plus a constant, where each Term pairs a
//! variable with a nonzero coefficient.
//!
//! [`Cvar`]: super::cvar::Cvar

use std::collections::HashMap;
use std::fmt::Debug;

use super::cvar::VarId;
use super::witness::WitnessStore;
use crate::field::CircuitField;
use crate::utils::errors::CircuitError;

#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Term<F>(pub VarId, pub F);

/// Linear combination of terms. Variables appear at most once, in order of
/// first occurrence, and never with a zero coefficient.
#[derive(Clone, PartialEq, Eq)]
pub struct LinearCombination<F> {
    terms: Vec<Term<F>>,
    constant: F,
}

impl<F: CircuitField> LinearCombination<F> {
    /// Merges repeated variables (keeping the position of the first one) and
    /// drops terms whose coefficient cancels to zero.
    pub fn new(terms: Vec<Term<F>>, constant: F) -> Self {
        let mut merged: Vec<Term<F>> = Vec::with_capacity(terms.len());
        let mut position: HashMap<VarId, usize> = HashMap::with_capacity(terms.len());
        for Term(var, coeff) in terms {
            match position.get(&var) {
                Some(&index) => merged[index].1 += coeff,
                None => {
                    position.insert(var, merged.len());
                    merged.push(Term(var, coeff));
                }
            }
        }
        merged.retain(|term| !term.1.is_zero());
        Self {
            terms: merged,
            constant,
        }
    }

    pub fn zero() -> Self {
        Self::constant(F::zero())
    }

    pub fn constant(value: F) -> Self {
        Self {
            terms: vec![],
            constant: value,
        }
    }

    pub fn variable(var: VarId) -> Self {
        Self {
            terms: vec![Term(var, F::one())],
            constant: F::zero(),
        }
    }

    pub fn terms(&self) -> &[Term<F>] {
        &self.terms
    }

    pub fn constant_term(&self) -> F {
        self.constant
    }

    pub fn num_terms(&self) -> usize {
        self.terms.len()
    }

    pub fn is_constant(&self) -> bool {
        self.terms.is_empty()
    }

    pub fn as_constant(&self) -> Option<F> {
        self.is_constant().then_some(self.constant)
    }

    /// `Some(v)` iff the combination is exactly `1·v + 0`.
    pub fn as_single_var(&self) -> Option<VarId> {
        match self.terms.as_slice() {
            [Term(var, coeff)] if coeff.is_one() && self.constant.is_zero() => Some(*var),
            _ => None,
        }
    }

    pub fn vars(&self) -> impl Iterator<Item = VarId> + '_ {
        self.terms.iter().map(|term| term.0)
    }

    /// The prefix of the first `len` terms, without the constant.
    pub fn prefix(&self, len: usize) -> Self {
        Self {
            terms: self.terms[..len.min(self.terms.len())].to_vec(),
            constant: F::zero(),
        }
    }

    pub fn evaluate(&self, witness: &WitnessStore<F>) -> Result<F, CircuitError> {
        let mut result = self.constant;
        for Term(var, coeff) in &self.terms {
            let value = witness
                .get(*var)
                .ok_or(CircuitError::UnassignedVariable(var.index()))?;
            result += *coeff * value;
        }
        Ok(result)
    }
}

impl<F: CircuitField> Debug for LinearCombination<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "LC(")?;
        for (index, term) in self.terms.iter().enumerate() {
            if index > 0 {
                write!(f, " + ")?;
            }
            write!(f, "{:?}", term)?;
        }
        if !self.constant.is_zero() || self.terms.is_empty() {
            if !self.terms.is_empty() {
                write!(f, " + ")?;
            }
            write!(f, "{}", self.constant.to_canonical_string())?;
        }
        write!(f, ")")
    }
}

impl<F: CircuitField> Debug for Term<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}*{}", self.1.to_canonical_string(), self.0)
    }
}

impl<F: CircuitField> From<VarId> for LinearCombination<F> {
    fn from(var: VarId) -> Self {
        Self::variable(var)
    }
}

impl<F: CircuitField> std::ops::Add for LinearCombination<F> {
    type Output = Self;

    fn add(self, other: Self) -> Self::Output {
        let mut terms = self.terms;
        terms.extend(other.terms);
        Self::new(terms, self.constant + other.constant)
    }
}

impl<F: CircuitField> std::ops::Neg for LinearCombination<F> {
    type Output = Self;

    fn neg(self) -> Self::Output {
        self * (-F::one())
    }
}

impl<F: CircuitField> std::ops::Sub for LinearCombination<F> {
    type Output = Self;

    fn sub(self, other: Self) -> Self::Output {
        self + (-other)
    }
}

impl<F: CircuitField> std::ops::Mul<F> for LinearCombination<F> {
    type Output = Self;

    fn mul(self, scalar: F) -> Self::Output {
        if scalar.is_zero() {
            return Self::zero();
        }
        Self {
            terms: self
                .terms
                .into_iter()
                .map(|Term(var, coeff)| Term(var, coeff * scalar))
                .collect(),
            constant: self.constant * scalar,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ark_bn254::Fr;
    use ark_std::{One, Zero};

    fn fe(n: i64) -> Fr {
        <Fr as CircuitField>::from_i64(n)
    }

    #[test]
    fn new_merges_in_first_occurrence_order() {
        let lc = LinearCombination::new(
            vec![
                Term(VarId(4), fe(2)),
                Term(VarId(1), fe(3)),
                Term(VarId(4), fe(5)),
            ],
            fe(9),
        );
        assert_eq!(lc.terms(), &[Term(VarId(4), fe(7)), Term(VarId(1), fe(3))]);
        assert_eq!(lc.constant_term(), fe(9));
    }

    #[test]
    fn cancelling_terms_vanish() {
        let x = LinearCombination::<Fr>::variable(VarId(0));
        let diff = x.clone() - x;
        assert!(diff.is_constant());
        assert_eq!(diff.as_constant(), Some(Fr::zero()));
    }

    #[test]
    fn single_var_detection() {
        let x = LinearCombination::<Fr>::variable(VarId(2));
        assert_eq!(x.as_single_var(), Some(VarId(2)));
        assert_eq!((x.clone() * fe(2)).as_single_var(), None);
        assert_eq!(
            (x + LinearCombination::constant(Fr::one())).as_single_var(),
            None
        );
    }

    #[test]
    fn sub_preserves_left_order() {
        let a = LinearCombination::new(vec![Term(VarId(3), fe(1)), Term(VarId(0), fe(1))], fe(0));
        let b = LinearCombination::new(vec![Term(VarId(7), fe(2))], fe(4));
        let diff = a - b;
        assert_eq!(
            diff.terms(),
            &[
                Term(VarId(3), fe(1)),
                Term(VarId(0), fe(1)),
                Term(VarId(7), fe(-2))
            ]
        );
        assert_eq!(diff.constant_term(), fe(-4));
    }

    #[test]
    fn evaluate_reads_witness() {
        let mut witness = WitnessStore::<Fr>::default();
        witness.set(VarId(0), fe(5));
        witness.set(VarId(1), fe(7));
        let lc = LinearCombination::new(vec![Term(VarId(0), fe(2)), Term(VarId(1), fe(-1))], fe(1));
        assert_eq!(lc.evaluate(&witness), Ok(fe(4)));

        let missing = LinearCombination::<Fr>::variable(VarId(9));
        assert_eq!(
            missing.evaluate(&witness),
            Err(CircuitError::UnassignedVariable(9))
        );
    }

    #[test]
    fn debug_format() {
        let lc = LinearCombination::new(vec![Term(VarId(0), fe(3))], fe(5));
        assert_eq!(format!("{:?}", lc), "LC(3*v0 + 5)");
        assert_eq!(format!("{:?}", LinearCombination::<Fr>::zero()), "LC(0)");
    }
}
