use smol_str::SmolStr;
use thiserror::Error;

/// Problems with axis definitions, or with locations that don't fit them.
///
/// All of these are configuration errors: retrying won't help.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    #[error("Location involved undefined axis '{0}'")]
    UnknownAxis(SmolStr),
    #[error("Axis '{0}' is defined more than once")]
    DuplicateAxis(SmolStr),
    #[error("Axis '{name}' must satisfy min <= default <= max, got {min}, {default}, {max}")]
    InvalidBounds {
        name: SmolStr,
        min: f64,
        default: f64,
        max: f64,
    },
    #[error("Axis '{0}' has a map that is not monotonic")]
    NonMonotonicMap(SmolStr),
    #[error("Discrete axis '{name}' has default {default} which is not one of {values:?}")]
    DiscreteDefaultNotAValue {
        name: SmolStr,
        default: f64,
        values: Vec<f64>,
    },
    #[error("Discrete axis '{0}' defines no values")]
    NoDiscreteValues(SmolStr),
    #[error("Discrete axis '{0}' cannot take an anisotropic value")]
    AnisotropicDiscreteValue(SmolStr),
}
