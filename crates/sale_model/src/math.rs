//! Checked arithmetic guard
//!
//! Every numeric step of a settlement goes through these helpers. Nothing
//! wraps and nothing saturates: a result that cannot be represented, a
//! subtraction below zero or a zero divisor surfaces as a [`MathError`].

use alloy_primitives::U256;
use thiserror::Error;

/// Arithmetic guard failures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum MathError {
    /// Result does not fit the integer width
    #[error("arithmetic overflow")]
    Overflow,
    /// Subtrahend larger than minuend
    #[error("arithmetic underflow")]
    Underflow,
    /// Division or remainder by zero
    #[error("division by zero")]
    DivideByZero,
}

/// Fixed-width unsigned integer the guard can operate on.
///
/// `Default` must be the additive identity.
pub trait Guarded: Copy + PartialEq + PartialOrd + Default {
    fn raw_add(self, rhs: Self) -> Option<Self>;
    fn raw_sub(self, rhs: Self) -> Option<Self>;
    fn raw_mul(self, rhs: Self) -> Option<Self>;
    fn raw_div(self, rhs: Self) -> Option<Self>;
    fn raw_rem(self, rhs: Self) -> Option<Self>;
}

macro_rules! impl_guarded {
    ($($t:ty),* $(,)?) => {
        $(
            impl Guarded for $t {
                #[inline]
                fn raw_add(self, rhs: Self) -> Option<Self> {
                    self.checked_add(rhs)
                }

                #[inline]
                fn raw_sub(self, rhs: Self) -> Option<Self> {
                    self.checked_sub(rhs)
                }

                #[inline]
                fn raw_mul(self, rhs: Self) -> Option<Self> {
                    self.checked_mul(rhs)
                }

                #[inline]
                fn raw_div(self, rhs: Self) -> Option<Self> {
                    self.checked_div(rhs)
                }

                #[inline]
                fn raw_rem(self, rhs: Self) -> Option<Self> {
                    self.checked_rem(rhs)
                }
            }
        )*
    };
}

impl_guarded!(u8, u16, u32, u64, u128, U256);

/// `a + b`, failing with `Overflow`
#[inline]
pub fn add<T: Guarded>(a: T, b: T) -> Result<T, MathError> {
    a.raw_add(b).ok_or(MathError::Overflow)
}

/// `a - b`, failing with `Underflow` when `b > a`
#[inline]
pub fn sub<T: Guarded>(a: T, b: T) -> Result<T, MathError> {
    a.raw_sub(b).ok_or(MathError::Underflow)
}

/// `a * b`, failing with `Overflow`
#[inline]
pub fn mul<T: Guarded>(a: T, b: T) -> Result<T, MathError> {
    a.raw_mul(b).ok_or(MathError::Overflow)
}

/// `a / b` truncated, failing with `DivideByZero`
#[inline]
pub fn div<T: Guarded>(a: T, b: T) -> Result<T, MathError> {
    if b == T::default() {
        return Err(MathError::DivideByZero);
    }
    a.raw_div(b).ok_or(MathError::Overflow)
}

/// `a % b`, failing with `DivideByZero`
#[inline]
pub fn rem<T: Guarded>(a: T, b: T) -> Result<T, MathError> {
    if b == T::default() {
        return Err(MathError::DivideByZero);
    }
    a.raw_rem(b).ok_or(MathError::Overflow)
}

/// `a * b / d`, rounding down
#[inline]
pub fn mul_div<T: Guarded>(a: T, b: T, d: T) -> Result<T, MathError> {
    div(mul(a, b)?, d)
}

/// `percent`% of `amount`, rounding down
#[inline]
pub fn percent_of(amount: U256, percent: u8) -> Result<U256, MathError> {
    mul_div(amount, U256::from(percent), U256::from(100u8))
}

/// Round `amount` down to a multiple of `granularity`
#[inline]
pub fn floor_to<T: Guarded>(amount: T, granularity: T) -> Result<T, MathError> {
    sub(amount, rem(amount, granularity)?)
}


// ============================================================================
// Kani Formal Verification Proofs
// ============================================================================

#[cfg(kani)]
mod proofs {
    use super::*;

    /// Guarded add never wraps: success implies the exact sum
    #[kani::proof]
    fn proof_add_never_wraps() {
        let a: u16 = kani::any();
        let b: u16 = kani::any();

        match add(a, b) {
            Ok(sum) => assert!(sum as u32 == a as u32 + b as u32),
            Err(e) => {
                assert!(e == MathError::Overflow);
                assert!(a as u32 + b as u32 > u16::MAX as u32);
            }
        }
    }

    /// Guarded sub fails exactly when b > a
    #[kani::proof]
    fn proof_sub_underflow_iff_greater() {
        let a: u16 = kani::any();
        let b: u16 = kani::any();

        let result = sub(a, b);
        assert!(result.is_err() == (b > a));
        if let Ok(diff) = result {
            assert!(diff + b == a);
        }
    }

    /// floor_to returns an aligned value not above the input
    #[kani::proof]
    fn proof_floor_to_aligned() {
        let amount: u32 = kani::any();
        let granularity: u32 = kani::any();
        kani::assume(granularity > 0);

        let floored = floor_to(amount, granularity).unwrap();
        assert!(floored <= amount);
        assert!(floored % granularity == 0);
        assert!(amount - floored < granularity);
    }
}
