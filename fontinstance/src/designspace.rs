//! The parsed contents of a designspace: axes, sources and instances.

use std::collections::BTreeSet;

use fontvary::{
    axes::Axes,
    coords::{DesignAnisoLocation, DesignLocation},
};
use serde::{Deserialize, Serialize};

use crate::{error::Error, lib_values::Lib, types::GlyphName};

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct DesignSpaceDocument {
    pub axes: Axes,
    #[serde(default)]
    pub sources: Vec<SourceDescriptor>,
    #[serde(default)]
    pub instances: Vec<InstanceDescriptor>,
    #[serde(default)]
    pub lib: Lib,
}

impl DesignSpaceDocument {
    pub fn new(axes: Axes) -> DesignSpaceDocument {
        DesignSpaceDocument {
            axes,
            sources: Vec::new(),
            instances: Vec::new(),
            lib: Lib::new(),
        }
    }

    /// A document previously written with [`DesignSpaceDocument::to_yaml`].
    pub fn from_yaml(yml: &str) -> Result<DesignSpaceDocument, Error> {
        Ok(serde_yaml::from_str(yml)?)
    }

    pub fn to_yaml(&self) -> Result<String, Error> {
        Ok(serde_yaml::to_string(self)?)
    }

    pub fn source(&self, name: &str) -> Option<&SourceDescriptor> {
        self.sources.iter().find(|s| s.name == name)
    }
}

/// One master.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct SourceDescriptor {
    /// Unique within the document; also the key into the font set.
    pub name: String,
    pub location: DesignLocation,
    /// Glyphs come from this layer rather than the default one.
    pub layer_name: Option<String>,
    pub family_name: Option<String>,
    pub style_name: Option<String>,
    pub copy_info: bool,
    pub copy_groups: bool,
    pub copy_lib: bool,
    pub copy_features: bool,
    pub mute_kerning: bool,
    pub mute_info: bool,
    pub muted_glyph_names: BTreeSet<GlyphName>,
}

impl Default for SourceDescriptor {
    fn default() -> Self {
        SourceDescriptor {
            name: String::new(),
            location: DesignLocation::new(),
            layer_name: None,
            family_name: None,
            style_name: None,
            copy_info: true,
            copy_groups: true,
            copy_lib: true,
            copy_features: true,
            mute_kerning: false,
            mute_info: false,
            muted_glyph_names: BTreeSet::new(),
        }
    }
}

impl SourceDescriptor {
    pub fn new(name: impl Into<String>, location: DesignLocation) -> SourceDescriptor {
        SourceDescriptor {
            name: name.into(),
            location,
            ..Default::default()
        }
    }

    pub fn with_layer(mut self, layer_name: impl Into<String>) -> SourceDescriptor {
        self.layer_name = Some(layer_name.into());
        self
    }
}

/// One instance to generate.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct InstanceDescriptor {
    pub name: String,
    /// May hold horizontal/vertical pairs.
    pub location: DesignAnisoLocation,
    pub family_name: Option<String>,
    pub style_name: Option<String>,
    pub postscript_font_name: Option<String>,
    pub style_map_family_name: Option<String>,
    pub style_map_style_name: Option<String>,
    pub filename: Option<String>,
    pub kerning: bool,
    pub info: bool,
}

impl Default for InstanceDescriptor {
    fn default() -> Self {
        InstanceDescriptor {
            name: String::new(),
            location: DesignAnisoLocation::new(),
            family_name: None,
            style_name: None,
            postscript_font_name: None,
            style_map_family_name: None,
            style_map_style_name: None,
            filename: None,
            kerning: true,
            info: true,
        }
    }
}

impl InstanceDescriptor {
    pub fn new(name: impl Into<String>, location: impl Into<DesignAnisoLocation>) -> Self {
        InstanceDescriptor {
            name: name.into(),
            location: location.into(),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use fontvary::{
        axes::{aniso_location, Axes, ContinuousAxis},
        coords::{DesignLocation, Position},
    };
    use pretty_assertions::assert_eq;
    use write_fonts::types::Tag;

    use super::*;

    fn doc() -> DesignSpaceDocument {
        let weight =
            ContinuousAxis::new("weight", Tag::new(b"wght"), 100.0, 400.0, 900.0).unwrap();
        let mut doc = DesignSpaceDocument::new(Axes::new(vec![weight.into()]).unwrap());
        doc.sources.push(SourceDescriptor::new(
            "Regular",
            DesignLocation::for_pos(&[("weight", 400.0)]),
        ));
        doc.sources.push(
            SourceDescriptor::new("Bold", DesignLocation::for_pos(&[("weight", 900.0)]))
                .with_layer("support"),
        );
        doc.instances.push(InstanceDescriptor::new(
            "Wide",
            aniso_location(&[("weight", Position::aniso(500.0, 600.0))]),
        ));
        doc
    }

    #[test]
    fn copy_flags_default_on() {
        let source: SourceDescriptor = serde_yaml::from_str("name: x").unwrap();
        assert!(source.copy_info && source.copy_groups && source.copy_lib && source.copy_features);
        assert!(!source.mute_kerning);
    }

    #[test]
    fn find_source_by_name() {
        assert_eq!(Some("support"), doc().source("Bold").and_then(|s| s.layer_name.as_deref()));
        assert!(doc().source("Black").is_none());
    }

    #[test]
    fn document_yaml_round_trip() {
        let doc = doc();
        let yml = doc.to_yaml().unwrap();
        assert_eq!(doc, DesignSpaceDocument::from_yaml(&yml).unwrap());
    }
}
