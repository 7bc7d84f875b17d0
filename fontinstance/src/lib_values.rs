//! Numeric lib values that interpolate like any other payload.

use std::collections::BTreeMap;

use fontvary::interpolable::{FieldPolicy, Interpolable, InterpolationError, Scale};
use serde::{Deserialize, Serialize};

/// A font lib: arbitrary data by key.
pub type Lib = BTreeMap<String, serde_json::Value>;

/// The numeric values of selected lib keys. A key that is absent is undefined.
#[derive(Serialize, Deserialize, Debug, Default, Clone, PartialEq)]
pub struct LibValues(BTreeMap<String, f64>);

impl LibValues {
    /// Pick the keys out of lib that hold numbers.
    pub fn from_lib(lib: &Lib, keys: &[String]) -> LibValues {
        LibValues(
            keys.iter()
                .filter_map(|key| lib.get(key).and_then(|v| v.as_f64()).map(|v| (key.clone(), v)))
                .collect(),
        )
    }

    pub fn get(&self, key: &str) -> Option<f64> {
        self.0.get(key).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, f64)> {
        self.0.iter().map(|(k, v)| (k, *v))
    }

    /// Write the values into lib, replacing whatever was there.
    pub fn apply_to(&self, lib: &mut Lib) {
        for (key, value) in self.iter() {
            lib.insert(key.clone(), serde_json::Value::from(value));
        }
    }

    fn combine(&self, other: &Self, policy: FieldPolicy, op: impl Fn(f64, f64) -> f64) -> Self {
        let mut result = BTreeMap::new();
        for key in self.0.keys().chain(other.0.keys()) {
            if result.contains_key(key) {
                continue;
            }
            if let Some(value) = policy.combine(self.get(key), other.get(key), &op) {
                result.insert(key.clone(), value);
            }
        }
        LibValues(result)
    }
}

impl Interpolable for LibValues {
    fn add(&self, other: &Self, policy: FieldPolicy) -> Result<Self, InterpolationError> {
        Ok(self.combine(other, policy, |l, r| l + r))
    }

    fn sub(&self, other: &Self, policy: FieldPolicy) -> Result<Self, InterpolationError> {
        Ok(self.combine(other, policy, |l, r| l - r))
    }

    fn scale(&self, factor: Scale) -> Self {
        LibValues(self.iter().map(|(k, v)| (k.clone(), v * factor.x)).collect())
    }

    fn round(&self) -> Self {
        LibValues(
            self.iter()
                .map(|(k, v)| (k.clone(), v.round_ties_even()))
                .collect(),
        )
    }
}
