//! Settings for an instancing run

use std::collections::BTreeSet;

use bitflags::bitflags;
use fontvary::interpolable::FieldPolicy;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

use crate::error::Error;

/// Lib key whose value is interpolated rather than copied.
pub const ITALIC_SLANT_OFFSET_KEY: &str = "com.typemytype.robofont.italicSlantOffset";

bitflags! {
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct Flags: u32 {
        /// Locations outside the axis extremes are not clipped
        const EXTRAPOLATE = 0b0001;
        /// Glyph geometry is rounded after interpolation
        const ROUND_GEOMETRY = 0b0010;
        /// Components are flattened into contours
        const DECOMPOSE = 0b0100;
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Config {
    pub extrapolate: bool,
    pub round_geometry: bool,
    pub field_policy: FieldPolicy,
    /// Numeric lib keys computed through the variation model.
    pub lib_keys_for_processing: Vec<String>,
    /// Axes whose off-default sources are left out of every model.
    pub muted_axes: Option<BTreeSet<String>>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            extrapolate: false,
            round_geometry: false,
            field_policy: FieldPolicy::default(),
            lib_keys_for_processing: vec![ITALIC_SLANT_OFFSET_KEY.to_string()],
            muted_axes: None,
        }
    }
}

impl Config {
    pub fn from_yaml(yml: &str) -> Result<Config, Error> {
        Ok(serde_yaml::from_str(yml)?)
    }

    pub fn to_yaml(&self) -> Result<String, Error> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Collect the boolean settings into a [`Flags`] object.
    pub fn flags(&self) -> Flags {
        let mut flags = Flags::default();

        flags.set(Flags::EXTRAPOLATE, self.extrapolate);
        flags.set(Flags::ROUND_GEOMETRY, self.round_geometry);

        flags
    }

    pub(crate) fn muted_axis_names(&self) -> BTreeSet<SmolStr> {
        self.muted_axes
            .iter()
            .flatten()
            .map(|name| SmolStr::new(name))
            .collect()
    }
}
