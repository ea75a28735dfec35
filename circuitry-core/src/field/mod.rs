use std::fmt::{Debug, Display};
use std::hash::Hash;
use std::ops::{Add, AddAssign, Mul, MulAssign, Neg, Sub, SubAssign};

use ark_serialize::{CanonicalDeserialize, CanonicalSerialize};
use ark_std::{One, Zero};

use crate::utils::errors::CircuitError;

pub trait FieldOps<Rhs = Self, Output = Self>:
    Add<Rhs, Output = Output> + Sub<Rhs, Output = Output> + Mul<Rhs, Output = Output>
{
}

/// The prime field circuits are written over.
///
/// Division is deliberately absent from [`FieldOps`]: the only way to divide
/// is through [`CircuitField::checked_div`], which reports a zero divisor as
/// [`CircuitError::DivisionByZero`].
pub trait CircuitField:
    'static
    + Sized
    + Zero
    + One
    + Neg<Output = Self>
    + FieldOps<Self, Self>
    + for<'a> FieldOps<&'a Self, Self>
    + AddAssign<Self>
    + SubAssign<Self>
    + MulAssign<Self>
    + core::iter::Sum<Self>
    + for<'a> core::iter::Sum<&'a Self>
    + Eq
    + Copy
    + Sync
    + Send
    + Display
    + Debug
    + Default
    + CanonicalSerialize
    + CanonicalDeserialize
    + Hash
{
    /// Number of bytes occupied by a single field element.
    const NUM_BYTES: usize;

    fn random<R: rand_core::RngCore>(rng: &mut R) -> Self;
    fn from_u64(n: u64) -> Self;
    fn from_i64(val: i64) -> Self;
    fn from_i128(val: i128) -> Self;
    fn square(&self) -> Self;
    fn inverse(&self) -> Option<Self>;
    fn sqrt(&self) -> Option<Self>;
    fn to_u64(&self) -> Option<u64>;

    /// Little-endian canonical bytes, always `NUM_BYTES` long.
    fn to_le_bytes(&self) -> Vec<u8>;
    /// Decimal rendering of the canonical representative in `[0, p)`.
    fn to_canonical_string(&self) -> String;
    /// Inverse of [`CircuitField::to_canonical_string`]. Rejects values
    /// outside `[0, p)` and non-canonical spellings.
    fn from_canonical_str(s: &str) -> Result<Self, CircuitError>;

    fn checked_inverse(&self) -> Result<Self, CircuitError> {
        self.inverse().ok_or(CircuitError::DivisionByZero)
    }

    fn checked_div(&self, rhs: &Self) -> Result<Self, CircuitError> {
        Ok(*self * rhs.checked_inverse()?)
    }

    fn checked_sqrt(&self) -> Result<Self, CircuitError> {
        self.sqrt().ok_or(CircuitError::NoSquareRoot)
    }
}

pub mod ark;
