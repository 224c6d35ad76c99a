//! Utilities to approximate equality of floating point fields.

use crate::tensors::Ten64;

/// The max epsilon accepted.
pub const F64_MAX_ERROR: f64 = 1e-3;

/// The expected minimum epsilon accepted.
pub const F64_AVG_ERROR: f64 = 1e-6;

/// The best expected epsilon accepted.
pub const F64_MIN_ERROR: f64 = 1e-12;

/// The approximated equality enumerated, best first.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ApproxEquality {
    /// Very strong epsilon.
    Precise = 0,

    /// Good epsilon.
    Partial = 1,

    /// Acceptable epsilon
    Relative = 2,

    /// No relative equality.
    Scarce = 3,
}

/// Checks the absolute distance based off epsilon.
pub trait RelativeEq<Rhs: ?Sized> {
    /// Enumerates the equality of `self`
    fn approx_eq(&self, rhs: &Rhs) -> ApproxEquality;
}

impl RelativeEq<Self> for f64 {
    fn approx_eq(&self, rhs: &Self) -> ApproxEquality {
        let dif = (self - rhs).abs();

        if dif < F64_MIN_ERROR {
            ApproxEquality::Precise
        } else if dif < F64_AVG_ERROR {
            ApproxEquality::Partial
        } else if dif < F64_MAX_ERROR {
            ApproxEquality::Relative
        } else {
            // NaN lands here too
            ApproxEquality::Scarce
        }
    }
}

/// A slice is as equal as its worst element; differing lengths are `Scarce`.
impl RelativeEq<[f64]> for [f64] {
    fn approx_eq(&self, rhs: &[f64]) -> ApproxEquality {
        if self.len() != rhs.len() {
            return ApproxEquality::Scarce;
        }
        let mut eq = ApproxEquality::Precise;
        for (a, b) in self.iter().zip(rhs) {
            eq = eq.max(a.approx_eq(b));
            if eq == ApproxEquality::Scarce {
                break;
            }
        }
        eq
    }
}

impl RelativeEq<Ten64> for Ten64 {
    fn approx_eq(&self, rhs: &Ten64) -> ApproxEquality {
        if self.shape != rhs.shape {
            return ApproxEquality::Scarce;
        }
        self.data.as_slice().approx_eq(rhs.data.as_slice())
    }
}

/// Whether `a` and `b` are equal to at least the `level` epsilon.
pub fn within<A: RelativeEq<B> + ?Sized, B: ?Sized>(a: &A, b: &B, level: ApproxEquality) -> bool {
    a.approx_eq(b) <= level
}

/// Approximates equality to the best epsilon.
pub fn approx_eq<A: RelativeEq<B> + ?Sized, B: ?Sized>(a: &A, b: &B) -> bool {
    within(a, b, ApproxEquality::Precise)
}
