use std::str::FromStr;

use ark_ff::{BigInteger, Field, PrimeField, UniformRand};

use super::{CircuitField, FieldOps};
use crate::utils::errors::CircuitError;

impl FieldOps for ark_bn254::Fr {}
impl FieldOps<&ark_bn254::Fr, ark_bn254::Fr> for &ark_bn254::Fr {}
impl FieldOps<&ark_bn254::Fr, ark_bn254::Fr> for ark_bn254::Fr {}

impl CircuitField for ark_bn254::Fr {
    const NUM_BYTES: usize = 32;

    fn random<R: rand_core::RngCore>(rng: &mut R) -> Self {
        <Self as UniformRand>::rand(rng)
    }

    #[inline]
    fn from_u64(n: u64) -> Self {
        Self::from(n)
    }

    fn from_i64(val: i64) -> Self {
        if val.is_negative() {
            -Self::from(val.unsigned_abs())
        } else {
            Self::from(val as u64)
        }
    }

    fn from_i128(val: i128) -> Self {
        if val.is_negative() {
            -Self::from(val.unsigned_abs())
        } else {
            Self::from(val as u128)
        }
    }

    #[inline(always)]
    fn square(&self) -> Self {
        <Self as Field>::square(self)
    }

    fn inverse(&self) -> Option<Self> {
        <Self as Field>::inverse(self)
    }

    fn sqrt(&self) -> Option<Self> {
        <Self as Field>::sqrt(self)
    }

    fn to_u64(&self) -> Option<u64> {
        let bigint = self.into_bigint();
        let limbs: &[u64] = bigint.as_ref();
        if limbs[1..].iter().all(|limb| *limb == 0) {
            Some(limbs[0])
        } else {
            None
        }
    }

    fn to_le_bytes(&self) -> Vec<u8> {
        self.into_bigint().to_bytes_le()
    }

    fn to_canonical_string(&self) -> String {
        self.into_bigint().to_string()
    }

    fn from_canonical_str(s: &str) -> Result<Self, CircuitError> {
        let value =
            Self::from_str(s).map_err(|_| CircuitError::InvalidEncoding(s.to_string()))?;
        // `from_str` reduces modulo p, so round-trip to reject out-of-range input.
        if value.to_canonical_string() != s {
            return Err(CircuitError::InvalidEncoding(s.to_string()));
        }
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ark_bn254::Fr;
    use ark_std::{test_rng, One, Zero};

    #[test]
    fn signed_conversions() {
        assert_eq!(<Fr as CircuitField>::from_i64(-7) + Fr::from(7u64), Fr::zero());
        assert_eq!(<Fr as CircuitField>::from_i128(-1), -Fr::one());
        assert_eq!(
            <Fr as CircuitField>::from_i128(i128::from(u64::MAX) + 1),
            Fr::from(u64::MAX) + Fr::one()
        );
    }

    #[test]
    fn canonical_strings() {
        assert_eq!(Fr::zero().to_canonical_string(), "0");
        assert_eq!(Fr::from(12u64).to_canonical_string(), "12");

        let minus_one = -Fr::one();
        let rendered = minus_one.to_canonical_string();
        assert_eq!(Fr::from_canonical_str(&rendered), Ok(minus_one));

        let modulus = Fr::MODULUS.to_string();
        assert!(Fr::from_canonical_str(&modulus).is_err());
        assert!(Fr::from_canonical_str("007").is_err());
        assert!(Fr::from_canonical_str("").is_err());
        assert!(Fr::from_canonical_str("abc").is_err());
    }

    #[test]
    fn checked_division() {
        let mut rng = test_rng();
        for _ in 0..64 {
            let x = Fr::random(&mut rng);
            let y = Fr::random(&mut rng);
            if y.is_zero() {
                continue;
            }
            assert_eq!(x.checked_div(&y).map(|q| q * y), Ok(x));
        }
        assert_eq!(Fr::one().checked_div(&Fr::zero()), Err(CircuitError::DivisionByZero));
        assert_eq!(Fr::zero().checked_inverse(), Err(CircuitError::DivisionByZero));
    }

    #[test]
    fn square_roots() {
        let four = Fr::from(4u64);
        let root = four.checked_sqrt().map(|r| CircuitField::square(&r));
        assert_eq!(root, Ok(four));

        // 5 is a quadratic non-residue modulo the BN254 scalar field order.
        let five = Fr::from(5u64);
        assert_eq!(five.checked_sqrt(), Err(CircuitError::NoSquareRoot));
    }

    #[test]
    fn bytes_and_u64() {
        let x = Fr::from(0x0102u64);
        let bytes = x.to_le_bytes();
        assert_eq!(bytes.len(), Fr::NUM_BYTES);
        assert_eq!(&bytes[..3], &[0x02, 0x01, 0x00]);
        assert_eq!(x.to_u64(), Some(0x0102));
        assert_eq!((-Fr::one()).to_u64(), None);
    }
}
