//! Closed big-integer intervals.
//!
//! All checker arithmetic is mathematically exact: an `IntRange` holds
//! arbitrary-precision endpoints and every operation allocates fresh values,
//! so ranges can be shared freely between AST annotations and facts. An empty
//! range (`min > max`) is representable but never valid on a checked node;
//! callers treat it as an error.

use num_bigint::BigInt;
use num_traits::{One, Signed, ToPrimitive, Zero};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntRange {
    pub min: BigInt,
    pub max: BigInt,
}

/// Returns `(1 << n_bits) - 1`.
pub fn bit_mask(n_bits: u64) -> BigInt {
    (BigInt::one() << n_bits) - BigInt::one()
}

impl IntRange {
    pub fn new(min: BigInt, max: BigInt) -> Self {
        Self { min, max }
    }

    /// The singleton range `[v, v]`.
    pub fn single(v: &BigInt) -> Self {
        Self {
            min: v.clone(),
            max: v.clone(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.min > self.max
    }

    pub fn contains(&self, v: &BigInt) -> bool {
        &self.min <= v && v <= &self.max
    }

    /// Whether every element of `other` is an element of `self`. An empty
    /// `other` is contained in anything.
    pub fn contains_int_range(&self, other: &IntRange) -> bool {
        if other.is_empty() {
            return true;
        }
        if self.is_empty() {
            return false;
        }
        self.min <= other.min && other.max <= self.max
    }

    pub fn add(&self, other: &IntRange) -> IntRange {
        IntRange {
            min: &self.min + &other.min,
            max: &self.max + &other.max,
        }
    }

    pub fn sub(&self, other: &IntRange) -> IntRange {
        IntRange {
            min: &self.min - &other.max,
            max: &self.max - &other.min,
        }
    }

    pub fn mul(&self, other: &IntRange) -> IntRange {
        let candidates = [
            &self.min * &other.min,
            &self.min * &other.max,
            &self.max * &other.min,
            &self.max * &other.max,
        ];
        let mut min = candidates[0].clone();
        let mut max = candidates[0].clone();
        for c in &candidates[1..] {
            if c < &min {
                min = c.clone();
            }
            if c > &max {
                max = c.clone();
            }
        }
        IntRange { min, max }
    }

    /// Truncated division. `None` when `other` contains zero.
    pub fn try_quo(&self, other: &IntRange) -> Option<IntRange> {
        if other.contains(&BigInt::zero()) {
            return None;
        }
        let candidates = [
            &self.min / &other.min,
            &self.min / &other.max,
            &self.max / &other.min,
            &self.max / &other.max,
        ];
        let mut min = candidates[0].clone();
        let mut max = candidates[0].clone();
        for c in &candidates[1..] {
            if c < &min {
                min = c.clone();
            }
            if c > &max {
                max = c.clone();
            }
        }
        Some(IntRange { min, max })
    }

    /// Left shift of `self` by `other`. `None` when the shift interval is
    /// negative or implausibly large.
    pub fn try_lsh(&self, other: &IntRange) -> Option<IntRange> {
        let lo = shift_amount(&other.min)?;
        let hi = shift_amount(&other.max)?;
        Some(IntRange {
            min: shl_signed(&self.min, lo, hi),
            max: shl_signed(&self.max, hi, lo),
        })
    }

    /// Right shift of `self` by `other`, rounding toward negative infinity.
    pub fn try_rsh(&self, other: &IntRange) -> Option<IntRange> {
        let lo = shift_amount(&other.min)?;
        let hi = shift_amount(&other.max)?;
        Some(IntRange {
            min: shr_signed(&self.min, lo, hi),
            max: shr_signed(&self.max, hi, lo),
        })
    }

    /// Bitwise AND. Callers guarantee both operands are non-negative; the
    /// result is the conservative `[0, min(self.max, other.max)]`.
    pub fn and(&self, other: &IntRange) -> IntRange {
        IntRange {
            min: BigInt::zero(),
            max: self.max.clone().min(other.max.clone()),
        }
    }

    /// Bitwise OR. Callers guarantee both operands are non-negative; the
    /// result maximum is rounded up to the next power-of-two-minus-one.
    pub fn or(&self, other: &IntRange) -> IntRange {
        let n_bits = self.max.bits().max(other.max.bits());
        IntRange {
            min: self.min.clone().max(other.min.clone()),
            max: bit_mask(n_bits),
        }
    }
}

impl std::fmt::Display for IntRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{} ..= {}]", self.min, self.max)
    }
}

const MAX_SHIFT: u64 = 1 << 20;

fn shift_amount(v: &BigInt) -> Option<u64> {
    if v.is_negative() {
        return None;
    }
    let n = v.to_u64()?;
    if n > MAX_SHIFT {
        return None;
    }
    Some(n)
}

// A negative value shifted left grows toward -inf, so the minimum endpoint
// takes the larger shift when the operand is negative.
fn shl_signed(v: &BigInt, if_non_negative: u64, if_negative: u64) -> BigInt {
    if v.is_negative() {
        v << if_negative
    } else {
        v << if_non_negative
    }
}

fn shr_signed(v: &BigInt, if_non_negative: u64, if_negative: u64) -> BigInt {
    if v.is_negative() {
        v >> if_negative
    } else {
        v >> if_non_negative
    }
}
