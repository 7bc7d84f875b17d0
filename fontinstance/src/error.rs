use std::fmt::Display;

use fontvary::{
    coords::DesignLocation, interpolable::InterpolationError, variations::VariationModelError,
};
use thiserror::Error;

use crate::types::GlyphName;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Bad axes or location: {0}")]
    Axes(#[from] fontvary::error::Error),
    #[error("No default source for discrete location {0:?}")]
    NoDefaultSource(Option<DesignLocation>),
    #[error("{0:?} is not a valid combination of discrete axis values")]
    IllegalDiscreteLocation(DesignLocation),
    #[error("No sources contribute to '{entity}'")]
    NoMasters {
        entity: String,
        /// Why sources were passed over
        problems: Vec<Problem>,
    },
    #[error("Unable to build a model for '{entity}': {source}")]
    Model {
        entity: String,
        #[source]
        source: VariationModelError,
        problems: Vec<Problem>,
    },
    #[error("Unable to interpolate '{entity}': {source}")]
    Interpolation {
        entity: String,
        #[source]
        source: InterpolationError,
    },
    #[error("Glyph '{0}' has a component cycle")]
    ComponentCycle(GlyphName),
    #[error("Unable to parse: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("Cache entry for {0} holds a value of the wrong type")]
    CacheConsistency(String),
}

impl Error {
    /// Errors that only affect the entity being built, not the whole run.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::NoMasters { .. }
                | Error::Model { .. }
                | Error::Interpolation { .. }
                | Error::ComponentCycle(..)
        )
    }

    /// Problems met while collecting sources before this error struck.
    pub fn problems(&self) -> &[Problem] {
        match self {
            Error::NoMasters { problems, .. } | Error::Model { problems, .. } => problems,
            _ => &[],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProblemKind {
    MissingFont,
    MissingLayer,
    MissingGlyph,
    Alignment,
    ModelFailure,
}

/// Something that went wrong but didn't stop the run.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Problem {
    pub kind: ProblemKind,
    pub message: String,
}

impl Problem {
    pub fn new(kind: ProblemKind, message: impl Into<String>) -> Problem {
        Problem {
            kind,
            message: message.into(),
        }
    }

    pub(crate) fn from_error(error: &Error) -> Problem {
        let kind = match error {
            Error::Interpolation { .. } | Error::ComponentCycle(..) => ProblemKind::Alignment,
            Error::Model {
                source: VariationModelError::Interpolation(..),
                ..
            } => ProblemKind::Alignment,
            _ => ProblemKind::ModelFailure,
        };
        Problem::new(kind, error.to_string())
    }
}

impl Display for Problem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.message)
    }
}
