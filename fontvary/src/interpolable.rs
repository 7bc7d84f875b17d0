//! The arithmetic every payload fed to a variation model must support.

use std::fmt::Debug;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Masters whose structure doesn't line up, e.g. differing point counts.
///
/// Local to the entity being interpolated; callers skip it and move on.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InterpolationError {
    #[error("Incompatible {what}: {left} vs {right}")]
    CountMismatch {
        what: &'static str,
        left: usize,
        right: usize,
    },
    #[error("Incompatible {what}: '{left}' vs '{right}'")]
    Mismatch {
        what: &'static str,
        left: String,
        right: String,
    },
}

/// How to combine a defined and an undefined field in add/sub.
///
/// Two undefined fields always combine to undefined, and scaling an
/// undefined field leaves it undefined.
#[derive(Serialize, Deserialize, Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldPolicy {
    /// The defined side comes through unchanged.
    #[default]
    KeepDefined,
    /// Undefined on either side makes the result undefined.
    UndefinedWins,
}

impl FieldPolicy {
    /// Combine two optional fields with op, which only sees defined pairs.
    pub fn combine(
        self,
        left: Option<f64>,
        right: Option<f64>,
        op: impl Fn(f64, f64) -> f64,
    ) -> Option<f64> {
        match (left, right) {
            (Some(l), Some(r)) => Some(op(l, r)),
            (Some(v), None) | (None, Some(v)) => match self {
                FieldPolicy::KeepDefined => Some(v),
                FieldPolicy::UndefinedWins => None,
            },
            (None, None) => None,
        }
    }
}

/// Per-direction scale factors.
///
/// Isotropic scaling uses the same factor for both; the anisotropic merge
/// uses (1, 0) and (0, 1) to pick one direction from each projection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Scale {
    pub x: f64,
    pub y: f64,
}

impl Scale {
    pub const HORIZONTAL: Scale = Scale { x: 1.0, y: 0.0 };
    pub const VERTICAL: Scale = Scale { x: 0.0, y: 1.0 };

    pub fn new(x: f64, y: f64) -> Scale {
        Scale { x, y }
    }

    pub fn uniform(factor: f64) -> Scale {
        Scale {
            x: factor,
            y: factor,
        }
    }

    pub fn is_uniform(&self) -> bool {
        self.x == self.y
    }
}

/// A value that can be interpolated: a vector space with optional fields.
///
/// Implementations decide which of their fields are horizontal and which
/// are vertical; fields with no direction scale by `x`.
pub trait Interpolable: Clone + Debug {
    fn add(&self, other: &Self, policy: FieldPolicy) -> Result<Self, InterpolationError>;

    fn sub(&self, other: &Self, policy: FieldPolicy) -> Result<Self, InterpolationError>;

    fn scale(&self, factor: Scale) -> Self;

    /// Round to integers, ties to even.
    fn round(&self) -> Self;
}

impl Interpolable for f64 {
    fn add(&self, other: &Self, _: FieldPolicy) -> Result<Self, InterpolationError> {
        Ok(self + other)
    }

    fn sub(&self, other: &Self, _: FieldPolicy) -> Result<Self, InterpolationError> {
        Ok(self - other)
    }

    fn scale(&self, factor: Scale) -> Self {
        self * factor.x
    }

    fn round(&self) -> Self {
        self.round_ties_even()
    }
}

/// Pick the horizontal parts of h and the vertical parts of v.
pub fn merge_anisotropic<V: Interpolable>(
    h: &V,
    v: &V,
    policy: FieldPolicy,
) -> Result<V, InterpolationError> {
    h.scale(Scale::HORIZONTAL)
        .add(&v.scale(Scale::VERTICAL), policy)
}
