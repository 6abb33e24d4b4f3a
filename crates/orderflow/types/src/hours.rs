//! Hours, the resource unit of the work-order ledger
//!
//! All budgets, grants, and time entries are measured in decimal hours.
//! Repeated additive updates accumulate floating-point error, so ordering
//! comparisons against ceilings always go through an epsilon.

use serde::{Deserialize, Serialize};

/// Tolerance absorbed by ceiling comparisons (one tenth of an hour)
pub const HOURS_EPSILON: f64 = 0.1;

/// A non-negative quantity of effort hours
#[derive(Clone, Copy, Debug, PartialEq, PartialOrd, Serialize, Deserialize, Default)]
pub struct Hours(pub f64);

impl Hours {
    pub fn new(value: f64) -> Self {
        Self(value)
    }

    pub fn zero() -> Self {
        Self(0.0)
    }

    pub fn is_zero(&self) -> bool {
        self.0.abs() < HOURS_EPSILON
    }

    pub fn is_positive(&self) -> bool {
        self.0 > 0.0
    }

    /// Subtraction clamped at zero
    pub fn saturating_sub(self, other: Self) -> Self {
        Self((self.0 - other.0).max(0.0))
    }

    /// `self <= other` within the epsilon tolerance
    pub fn approx_le(self, other: Self) -> bool {
        self.0 <= other.0 + HOURS_EPSILON
    }

    /// `self >= other` within the epsilon tolerance
    pub fn approx_ge(self, other: Self) -> bool {
        self.0 + HOURS_EPSILON >= other.0
    }
}

impl std::fmt::Display for Hours {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}h", self.0)
    }
}

impl std::ops::Add for Hours {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Self(self.0 + rhs.0)
    }
}

impl std::ops::Sub for Hours {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        Self(self.0 - rhs.0)
    }
}

impl std::iter::Sum for Hours {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Hours::zero(), |acc, h| acc + h)
    }
}
