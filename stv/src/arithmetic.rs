// Copyright 2021-2022 Andrew Conway.
// This file is part of ConcreteSTV.
// ConcreteSTV is free software: you can redistribute it and/or modify it under the terms of the GNU Affero General Public License as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version.
// ConcreteSTV is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the GNU Affero General Public License for more details.
// You should have received a copy of the GNU Affero General Public License along with ConcreteSTV.  If not, see <https://www.gnu.org/licenses/>.


//! A single pluggable arithmetic contract with three implementations: fixed-point,
//! guarded fixed-point (extra internal digits, comparisons truncated to the display
//! precision) and exact rational. Counters are generic over [`Arithmetic`] and must
//! never inspect which concrete kernel they were given except via [`Arithmetic::exact`].

use std::cmp::Ordering;
use num::{BigInt, BigRational, Zero, One};
use crate::error::{StvError, StvResult};

/// Rounding discipline for a non-exact multiply or divide.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rounding {
    Up,
    Down,
    Nearest,
}

/// Capability set shared by every arithmetic domain. `V` never implements `Ord` itself;
/// callers compare through [`Arithmetic::cmp`] so that guarded comparison-at-precision
/// stays in one place.
pub trait Arithmetic: Clone {
    type V: Clone + std::fmt::Debug;

    fn zero(&self) -> Self::V;
    fn one(&self) -> Self::V;
    fn epsilon(&self) -> Self::V;
    /// True only for the rational domain.
    fn exact(&self) -> bool;

    fn from_count(&self, n: u64) -> Self::V;

    fn add(&self, a: &Self::V, b: &Self::V) -> Self::V;
    fn sub(&self, a: &Self::V, b: &Self::V) -> Self::V;
    fn mul(&self, a: &Self::V, b: &Self::V, round: Rounding) -> Self::V;
    fn div(&self, a: &Self::V, b: &Self::V, round: Rounding) -> Self::V;

    fn cmp(&self, a: &Self::V, b: &Self::V) -> Ordering;
    fn format(&self, v: &Self::V) -> String;

    fn eq(&self, a: &Self::V, b: &Self::V) -> bool { self.cmp(a, b) == Ordering::Equal }
    fn lt(&self, a: &Self::V, b: &Self::V) -> bool { self.cmp(a, b) == Ordering::Less }
    fn le(&self, a: &Self::V, b: &Self::V) -> bool { self.cmp(a, b) != Ordering::Greater }
    fn gt(&self, a: &Self::V, b: &Self::V) -> bool { self.cmp(a, b) == Ordering::Greater }
    fn ge(&self, a: &Self::V, b: &Self::V) -> bool { self.cmp(a, b) != Ordering::Less }
    fn is_zero(&self, a: &Self::V) -> bool { self.eq(a, &self.zero()) }

    fn min(&self, vs: &[Self::V]) -> Self::V {
        let mut it = vs.iter();
        let mut best = it.next().cloned().unwrap_or_else(|| self.zero());
        for v in it {
            if self.lt(v, &best) { best = v.clone(); }
        }
        best
    }

    fn sum(&self, vs: &[Self::V]) -> Self::V {
        let mut acc = self.zero();
        for v in vs { acc = self.add(&acc, v); }
        acc
    }
}

fn round_div(num: i128, denom: i128, round: Rounding) -> i128 {
    debug_assert!(denom > 0);
    match round {
        Rounding::Down => num.div_euclid(denom),
        Rounding::Up => (num + denom - 1).div_euclid(denom),
        Rounding::Nearest => (num + denom / 2).div_euclid(denom),
    }
}

/// `fixed(p)`: integer scaled by `10^p`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedArithmetic {
    pub precision: u32,
}

impl FixedArithmetic {
    pub fn new(precision: u32) -> StvResult<Self> {
        if precision > 30 {
            return Err(StvError::ArithmeticError(format!("precision {precision} is unsupported for fixed arithmetic")));
        }
        Ok(FixedArithmetic { precision })
    }
    fn scale(&self) -> i128 { 10i128.pow(self.precision) }
}

impl Arithmetic for FixedArithmetic {
    type V = i128;

    fn zero(&self) -> i128 { 0 }
    fn one(&self) -> i128 { self.scale() }
    fn epsilon(&self) -> i128 { 1 }
    fn exact(&self) -> bool { false }

    fn from_count(&self, n: u64) -> i128 { n as i128 * self.scale() }

    fn add(&self, a: &i128, b: &i128) -> i128 { a + b }
    fn sub(&self, a: &i128, b: &i128) -> i128 { a - b }
    fn mul(&self, a: &i128, b: &i128, round: Rounding) -> i128 { round_div(a * b, self.scale(), round) }
    fn div(&self, a: &i128, b: &i128, round: Rounding) -> i128 { round_div(a * self.scale(), *b, round) }

    fn cmp(&self, a: &i128, b: &i128) -> Ordering { a.cmp(b) }
    fn format(&self, v: &i128) -> String { format_scaled(*v, self.scale(), self.precision) }
}

/// `guarded(p, g)`: `p` display digits, `g` extra guard digits kept internally.
/// Equality and ordering compare at the `p`-digit level only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GuardedArithmetic {
    pub precision: u32,
    pub guard: u32,
}

impl GuardedArithmetic {
    pub fn new(precision: u32, guard: u32) -> StvResult<Self> {
        if precision + guard > 30 {
            return Err(StvError::ArithmeticError(format!("precision {precision} + guard {guard} is unsupported for guarded arithmetic")));
        }
        Ok(GuardedArithmetic { precision, guard })
    }
    fn scale(&self) -> i128 { 10i128.pow(self.precision + self.guard) }
    fn guard_scale(&self) -> i128 { 10i128.pow(self.guard) }
    fn truncate(&self, v: i128) -> i128 { v.div_euclid(self.guard_scale()) }
}

impl Arithmetic for GuardedArithmetic {
    type V = i128;

    fn zero(&self) -> i128 { 0 }
    fn one(&self) -> i128 { self.scale() }
    fn epsilon(&self) -> i128 { self.guard_scale() }
    fn exact(&self) -> bool { false }

    fn from_count(&self, n: u64) -> i128 { n as i128 * self.scale() }

    fn add(&self, a: &i128, b: &i128) -> i128 { a + b }
    fn sub(&self, a: &i128, b: &i128) -> i128 { a - b }
    fn mul(&self, a: &i128, b: &i128, round: Rounding) -> i128 { round_div(a * b, self.scale(), round) }
    fn div(&self, a: &i128, b: &i128, round: Rounding) -> i128 { round_div(a * self.scale(), *b, round) }

    fn cmp(&self, a: &i128, b: &i128) -> Ordering { self.truncate(*a).cmp(&self.truncate(*b)) }
    fn format(&self, v: &i128) -> String { format_scaled(*v, self.scale(), self.precision + self.guard) }
}

fn format_scaled(v: i128, scale: i128, digits: u32) -> String {
    let neg = v < 0;
    let v = v.unsigned_abs();
    let scale = scale.unsigned_abs();
    let int_part = v / scale;
    let frac_part = v % scale;
    let sign = if neg && (int_part != 0 || frac_part != 0) { "-" } else { "" };
    if frac_part == 0 {
        format!("{sign}{int_part}")
    } else {
        let digits_str = format!("{:01$}", frac_part, digits as usize);
        format!("{sign}{int_part}.{}", digits_str.trim_end_matches('0'))
    }
}

/// Exact rational arithmetic. `epsilon = 0`, `exact = true`, rounding modes are no-ops.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RationalArithmetic;

impl Arithmetic for RationalArithmetic {
    type V = BigRational;

    fn zero(&self) -> BigRational { BigRational::zero() }
    fn one(&self) -> BigRational { BigRational::one() }
    fn epsilon(&self) -> BigRational { BigRational::zero() }
    fn exact(&self) -> bool { true }

    fn from_count(&self, n: u64) -> BigRational { BigRational::from_integer(BigInt::from(n)) }

    fn add(&self, a: &BigRational, b: &BigRational) -> BigRational { a + b }
    fn sub(&self, a: &BigRational, b: &BigRational) -> BigRational { a - b }
    fn mul(&self, a: &BigRational, b: &BigRational, _round: Rounding) -> BigRational { a * b }
    fn div(&self, a: &BigRational, b: &BigRational, _round: Rounding) -> BigRational { a / b }

    fn cmp(&self, a: &BigRational, b: &BigRational) -> Ordering { a.cmp(b) }
    fn format(&self, v: &BigRational) -> String {
        if v.is_integer() { v.numer().to_string() } else { format!("{}/{}", v.numer(), v.denom()) }
    }
}
