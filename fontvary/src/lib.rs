//! The numeric core of source interpolation.
//!
//! Axes and the coordinate spaces they define, plus the piecewise-linear
//! variation model that turns a handful of masters into a value anywhere
//! in the design space.

pub mod axes;
pub mod coords;
pub mod error;
pub mod interpolable;
mod piecewise_linear_map;
mod serde;
pub mod variations;
