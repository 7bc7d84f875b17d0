//! Read access to the fonts behind each source.

use std::{
    collections::{BTreeSet, HashMap},
    fmt::Debug,
    sync::Arc,
};

use indexmap::IndexMap;

use crate::{
    glyph::GlyphInstance,
    kerning::{Groups, Kerning},
    lib_values::Lib,
    metrics::FontInfo,
    types::GlyphName,
};

pub const DEFAULT_LAYER_NAME: &str = "public.default";

/// A loaded source font.
///
/// Implementations are expected to be cheap to query; the instancer asks
/// for the same glyphs many times.
pub trait SourceFont: Debug + Send + Sync {
    fn default_layer_name(&self) -> &str;

    fn has_layer(&self, layer: &str) -> bool;

    /// The glyph in layer, or in the default layer if layer is None.
    fn glyph(&self, layer: Option<&str>, name: &GlyphName) -> Option<&GlyphInstance>;

    /// Default layer glyph names, in glyph order.
    fn glyph_names(&self) -> Vec<GlyphName>;

    fn info(&self) -> &FontInfo;

    fn kerning(&self) -> &Kerning;

    fn groups(&self) -> &Groups;

    fn lib(&self) -> &Lib;

    fn features(&self) -> &str;

    /// Glyph name to the default layer glyphs that use it as a component.
    fn reverse_component_map(&self) -> HashMap<GlyphName, BTreeSet<GlyphName>> {
        let mut map: HashMap<GlyphName, BTreeSet<GlyphName>> = HashMap::new();
        for name in self.glyph_names() {
            let Some(glyph) = self.glyph(None, &name) else {
                continue;
            };
            for base in glyph.component_names() {
                map.entry(base.clone()).or_default().insert(name.clone());
            }
        }
        map
    }
}

/// A font held entirely in memory.
#[derive(Debug, Clone)]
pub struct MemoryFont {
    default_layer: String,
    layers: IndexMap<String, IndexMap<GlyphName, GlyphInstance>>,
    pub info: FontInfo,
    pub kerning: Kerning,
    pub groups: Groups,
    pub lib: Lib,
    pub features: String,
}

impl Default for MemoryFont {
    fn default() -> Self {
        MemoryFont {
            default_layer: DEFAULT_LAYER_NAME.to_string(),
            layers: [(DEFAULT_LAYER_NAME.to_string(), IndexMap::new())]
                .into_iter()
                .collect(),
            info: Default::default(),
            kerning: Default::default(),
            groups: Default::default(),
            lib: Default::default(),
            features: Default::default(),
        }
    }
}

impl MemoryFont {
    pub fn new() -> MemoryFont {
        Default::default()
    }

    /// Add or replace a glyph in the default layer.
    pub fn insert_glyph(&mut self, glyph: GlyphInstance) {
        let layer = self.default_layer.clone();
        self.insert_layer_glyph(&layer, glyph);
    }

    /// Add or replace a glyph in layer, creating the layer if need be.
    pub fn insert_layer_glyph(&mut self, layer: &str, glyph: GlyphInstance) {
        self.layers
            .entry(layer.to_string())
            .or_default()
            .insert(glyph.name.clone(), glyph);
    }

    pub fn remove_glyph(&mut self, name: &GlyphName) -> Option<GlyphInstance> {
        self.layers
            .get_mut(&self.default_layer)
            .and_then(|layer| layer.shift_remove(name))
    }

    pub fn with_glyph(mut self, glyph: GlyphInstance) -> MemoryFont {
        self.insert_glyph(glyph);
        self
    }

    pub fn with_layer_glyph(mut self, layer: &str, glyph: GlyphInstance) -> MemoryFont {
        self.insert_layer_glyph(layer, glyph);
        self
    }
}

impl SourceFont for MemoryFont {
    fn default_layer_name(&self) -> &str {
        &self.default_layer
    }

    fn has_layer(&self, layer: &str) -> bool {
        self.layers.contains_key(layer)
    }

    fn glyph(&self, layer: Option<&str>, name: &GlyphName) -> Option<&GlyphInstance> {
        self.layers
            .get(layer.unwrap_or(&self.default_layer))
            .and_then(|glyphs| glyphs.get(name))
    }

    fn glyph_names(&self) -> Vec<GlyphName> {
        self.layers
            .get(&self.default_layer)
            .map(|glyphs| glyphs.keys().cloned().collect())
            .unwrap_or_default()
    }

    fn info(&self) -> &FontInfo {
        &self.info
    }

    fn kerning(&self) -> &Kerning {
        &self.kerning
    }

    fn groups(&self) -> &Groups {
        &self.groups
    }

    fn lib(&self) -> &Lib {
        &self.lib
    }

    fn features(&self) -> &str {
        &self.features
    }
}

/// The loaded fonts, by source name.
///
/// A source with no entry is one whose font could not be found.
#[derive(Debug, Clone, Default)]
pub struct FontSet(HashMap<String, Arc<dyn SourceFont>>);

impl FontSet {
    pub fn new() -> FontSet {
        Default::default()
    }

    pub fn insert(&mut self, source_name: impl Into<String>, font: impl SourceFont + 'static) {
        self.0.insert(source_name.into(), Arc::new(font));
    }

    pub fn insert_shared(&mut self, source_name: impl Into<String>, font: Arc<dyn SourceFont>) {
        self.0.insert(source_name.into(), font);
    }

    pub fn with(mut self, source_name: impl Into<String>, font: impl SourceFont + 'static) -> Self {
        self.insert(source_name, font);
        self
    }

    pub fn get(&self, source_name: &str) -> Option<&Arc<dyn SourceFont>> {
        self.0.get(source_name)
    }

    pub fn remove(&mut self, source_name: &str) -> Option<Arc<dyn SourceFont>> {
        self.0.remove(source_name)
    }

    pub fn contains(&self, source_name: &str) -> bool {
        self.0.contains_key(source_name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
