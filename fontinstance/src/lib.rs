//! Builds font instances from the sources of a designspace.
//!
//! Sources are gathered per entity and discrete sub-space by the
//! [`collect::SourceCollector`], turned into variation models and evaluated
//! by the [`instancer::Instancer`], which memoizes its work in a
//! [`cache::Cache`].

pub mod cache;
pub mod collect;
pub mod config;
pub mod designspace;
pub mod error;
pub mod font;
pub mod glyph;
pub mod instancer;
pub mod kerning;
pub mod lib_values;
pub mod metrics;
pub mod types;

pub use error::{Error, Problem, ProblemKind};
