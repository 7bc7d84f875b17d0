//! Turning the sources of a designspace into instances.
//!
//! An [`Instancer`] owns a document and its fonts, builds one variation model
//! per entity and discrete sub-space, and evaluates those models at instance
//! locations. Models and glyphs are memoized in a [`Cache`] that may be shared
//! with other instancers.

use std::{
    collections::{BTreeMap, BTreeSet, HashMap},
    sync::Arc,
};

use fontvary::{
    axes::Axes,
    coords::{DesignAnisoLocation, DesignLocation, DiscreteLocation, NormalizedLocation},
    interpolable::{merge_anisotropic, Interpolable},
    variations::MasterModel,
};
use indexmap::{IndexMap, IndexSet};
use log::{debug, log_enabled, trace, warn};
use serde_json::json;
use smol_str::SmolStr;

use crate::{
    cache::{with_dependents, Cache, CacheKey, Operation, OwnerId},
    collect::{Collected, SourceCollector},
    config::{Config, Flags},
    designspace::{DesignSpaceDocument, InstanceDescriptor, SourceDescriptor},
    error::{Error, Problem},
    font::{FontSet, SourceFont},
    glyph::GlyphInstance,
    kerning::{Groups, KernPair, Kerning},
    lib_values::{Lib, LibValues},
    metrics::{FontInfo, MetricField, Metrics},
    types::GlyphName,
};

/// Lib key under which an instance records where it came from.
pub const FULL_LOCATION_LIB_KEY: &str = "ufoProcessor.fullDesignspaceLocation";

/// A variation model for one entity in one discrete sub-space.
#[derive(Debug)]
pub struct EntityModel<V> {
    pub model: MasterModel<V>,
    /// Glyph models only: the default master's codepoints if it contributed,
    /// otherwise everything any master declared.
    pub codepoints: Vec<u32>,
    /// Sources that were passed over while collecting.
    pub problems: Vec<Problem>,
}

/// A location split up and ready to evaluate models at.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedLocation {
    /// Every axis, clipped unless extrapolating.
    pub full: DesignAnisoLocation,
    pub anisotropic: bool,
    pub continuous: DesignAnisoLocation,
    pub discrete: Option<DiscreteLocation>,
    pub horizontal: DesignLocation,
    pub vertical: DesignLocation,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MaterializeOptions {
    /// Flatten components into contours.
    pub decompose: bool,
    /// Round results; also on if the config asks for rounded geometry.
    pub round: bool,
    /// Just these glyphs rather than every glyph of the sub-space.
    pub glyph_names: Option<Vec<GlyphName>>,
    /// Just these kerning pairs rather than the whole table.
    pub pairs: Option<BTreeSet<KernPair>>,
}

/// The data of a generated instance.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InstanceFont {
    pub info: FontInfo,
    pub kerning: Kerning,
    pub groups: Groups,
    pub lib: Lib,
    pub features: String,
    /// In glyph order.
    pub glyphs: IndexMap<GlyphName, GlyphInstance>,
}

impl InstanceFont {
    pub fn glyph_order(&self) -> Vec<GlyphName> {
        self.glyphs.keys().cloned().collect()
    }
}

/// A best effort instance plus whatever went wrong along the way.
#[derive(Debug, Clone, PartialEq)]
pub struct InstanceOutput {
    pub font: InstanceFont,
    pub problems: Vec<Problem>,
}

#[derive(Debug)]
pub struct GeneratedInstance {
    pub name: String,
    pub filename: Option<String>,
    pub output: Result<InstanceOutput, Error>,
}

/// Builds instances of one document.
///
/// Cache entries are keyed by the identity of the instancer, so two
/// instancers over the same document never see each other's results.
/// Dropping an instancer removes its entries.
#[derive(Debug)]
pub struct Instancer {
    doc: DesignSpaceDocument,
    fonts: FontSet,
    config: Config,
    cache: Arc<Cache>,
    owner: OwnerId,
}

impl Drop for Instancer {
    fn drop(&mut self) {
        let removed = self.cache.invalidate_all(self.owner);
        trace!("{:?} dropped {removed} cache entries", self.owner);
    }
}

fn overlay(target: &mut Option<String>, value: &Option<String>) {
    if value.is_some() {
        target.clone_from(value);
    }
}

fn location_to_json(location: &DesignAnisoLocation) -> serde_json::Value {
    location
        .iter()
        .map(|(name, pos)| {
            let (h, v) = (pos.horizontal().to_f64(), pos.vertical().to_f64());
            let value = if pos.is_anisotropic() {
                json!([h, v])
            } else {
                json!(h)
            };
            (name.to_string(), value)
        })
        .collect::<serde_json::Map<_, _>>()
        .into()
}

/// Errors that only cost us one entity become problems, the rest propagate.
fn record(problems: &mut IndexSet<Problem>, error: Error) -> Result<(), Error> {
    if !error.is_recoverable() {
        return Err(error);
    }
    warn!("{error}");
    problems.extend(error.problems().iter().cloned());
    problems.insert(Problem::from_error(&error));
    Ok(())
}

impl Instancer {
    pub fn new(doc: DesignSpaceDocument, fonts: FontSet, config: Config) -> Instancer {
        Self::with_cache(doc, fonts, config, Default::default())
    }

    pub fn with_cache(
        doc: DesignSpaceDocument,
        fonts: FontSet,
        config: Config,
        cache: Arc<Cache>,
    ) -> Instancer {
        Instancer {
            doc,
            fonts,
            config,
            cache,
            owner: OwnerId::next(),
        }
    }

    pub fn document(&self) -> &DesignSpaceDocument {
        &self.doc
    }

    pub fn axes(&self) -> &Axes {
        &self.doc.axes
    }

    pub fn fonts(&self) -> &FontSet {
        &self.fonts
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn cache(&self) -> &Arc<Cache> {
        &self.cache
    }

    pub fn owner(&self) -> OwnerId {
        self.owner
    }

    // Settings a cached glyph depends on, with the per call choices layered on
    fn glyph_flags(&self, decompose: bool, round: bool) -> Flags {
        let mut flags = self.config.flags();
        flags.set(Flags::DECOMPOSE, decompose);
        flags.set(Flags::ROUND_GEOMETRY, round);
        flags
    }

    fn collector(&self) -> SourceCollector<'_> {
        SourceCollector::new(&self.doc, &self.fonts).with_muted_axes(self.config.muted_axis_names())
    }

    fn axis_order(&self) -> Vec<SmolStr> {
        let muted = self.config.muted_axis_names();
        self.doc
            .axes
            .axis_order()
            .into_iter()
            .filter(|name| !muted.contains(name))
            .collect()
    }

    /// None if there are no discrete axes, otherwise every discrete location.
    fn discrete_spaces(&self) -> Vec<Option<DiscreteLocation>> {
        let locations = self.doc.axes.discrete_locations();
        if locations.is_empty() {
            return vec![None];
        }
        locations.into_iter().map(Some).collect()
    }

    pub fn sources_for_discrete_location(
        &self,
        discrete: Option<&DiscreteLocation>,
    ) -> Vec<&SourceDescriptor> {
        self.collector().sources_for_discrete_location(discrete)
    }

    pub fn find_default(&self, discrete: Option<&DiscreteLocation>) -> Option<&SourceDescriptor> {
        self.collector().find_default(discrete)
    }

    /// The default source of each discrete sub-space that has one.
    pub fn find_all_defaults(&self) -> Vec<(Option<DiscreteLocation>, &SourceDescriptor)> {
        self.discrete_spaces()
            .into_iter()
            .filter_map(|discrete| match self.find_default(discrete.as_ref()) {
                Some(source) => Some((discrete, source)),
                None => {
                    debug!("No default source for {discrete:?}");
                    None
                }
            })
            .collect()
    }

    pub fn default_font(
        &self,
        discrete: Option<&DiscreteLocation>,
    ) -> Result<&Arc<dyn SourceFont>, Error> {
        self.find_default(discrete)
            .and_then(|source| self.fonts.get(&source.name))
            .ok_or_else(|| Error::NoDefaultSource(discrete.cloned()))
    }

    /// Every glyph name in the sub-space, or in every sub-space for None.
    ///
    /// Default fonts come first so their glyph order wins.
    pub fn glyph_names(&self, discrete: Option<&DiscreteLocation>) -> Vec<GlyphName> {
        let defaults: Vec<&SourceDescriptor> = match discrete {
            Some(..) => self.find_default(discrete).into_iter().collect(),
            None => self
                .find_all_defaults()
                .into_iter()
                .map(|(_, source)| source)
                .collect(),
        };
        let mut names = IndexSet::new();
        for source in defaults
            .into_iter()
            .chain(self.sources_for_discrete_location(discrete))
        {
            if let Some(font) = self.fonts.get(&source.name) {
                names.extend(font.glyph_names());
            }
        }
        names.into_iter().collect()
    }

    /// Codepoint to the glyphs that claim it in any font of the sub-space.
    pub fn character_mapping(
        &self,
        discrete: Option<&DiscreteLocation>,
    ) -> BTreeMap<u32, BTreeSet<GlyphName>> {
        let mut mapping: BTreeMap<u32, BTreeSet<GlyphName>> = BTreeMap::new();
        for source in self.sources_for_discrete_location(discrete) {
            let Some(font) = self.fonts.get(&source.name) else {
                continue;
            };
            for name in font.glyph_names() {
                let Some(glyph) = font.glyph(None, &name) else {
                    continue;
                };
                for codepoint in glyph.codepoints.iter() {
                    mapping.entry(*codepoint).or_default().insert(name.clone());
                }
            }
        }
        mapping
    }

    /// Glyph name to the glyphs that use it as a component, in any font of
    /// the sub-space.
    pub fn reverse_component_mapping(
        &self,
        discrete: Option<&DiscreteLocation>,
    ) -> HashMap<GlyphName, BTreeSet<GlyphName>> {
        let mut mapping: HashMap<GlyphName, BTreeSet<GlyphName>> = HashMap::new();
        for source in self.sources_for_discrete_location(discrete) {
            let Some(font) = self.fonts.get(&source.name) else {
                continue;
            };
            for (base, users) in font.reverse_component_map() {
                mapping.entry(base).or_default().extend(users);
            }
        }
        mapping
    }

    fn dependency_index(&self) -> HashMap<GlyphName, BTreeSet<GlyphName>> {
        let mut index: HashMap<GlyphName, BTreeSet<GlyphName>> = HashMap::new();
        for discrete in self.discrete_spaces() {
            for (base, users) in self.reverse_component_mapping(discrete.as_ref()) {
                index.entry(base).or_default().extend(users);
            }
        }
        index
    }

    /// The glyphs that use name as a component, directly or not, in any
    /// discrete sub-space.
    pub fn glyph_dependencies(&self, name: &GlyphName) -> BTreeSet<GlyphName> {
        let index = self.dependency_index();
        with_dependents(name.as_str(), &index)
            .into_iter()
            .filter(|dependent| dependent != name.as_str())
            .map(GlyphName::from)
            .collect()
    }

    fn entity_model<V: Interpolable>(
        &self,
        entity: &str,
        collected: Collected<V>,
        codepoints: Vec<u32>,
    ) -> Result<EntityModel<V>, Error> {
        let Collected {
            sources, problems, ..
        } = collected;
        if sources.is_empty() {
            debug!("No masters for '{entity}'");
            return Err(Error::NoMasters {
                entity: entity.to_string(),
                problems,
            });
        }
        let masters = sources
            .into_iter()
            .map(|source| (self.doc.axes.normalize(&source.location, false), source.value))
            .collect();
        let model = MasterModel::new(
            masters,
            self.axis_order(),
            self.config.extrapolate,
            self.config.field_policy,
        )
        .map_err(|source| Error::Model {
            entity: entity.to_string(),
            source,
            problems: problems.clone(),
        })?;
        Ok(EntityModel {
            model,
            codepoints,
            problems,
        })
    }

    /// The model for one glyph in one discrete sub-space.
    pub fn glyph_model(
        &self,
        name: &GlyphName,
        discrete: Option<&DiscreteLocation>,
        decompose: bool,
    ) -> Result<Arc<EntityModel<GlyphInstance>>, Error> {
        let key = CacheKey::new(self.owner, Operation::GlyphModel)
            .entity(name.as_str())
            .discrete(discrete)
            .flags(self.glyph_flags(decompose, false));
        self.cache.get_or_compute(key, || {
            let collected = self.collector().collect_glyph(name, discrete, decompose)?;
            let codepoints = match collected.default_value() {
                Some(glyph) => glyph.codepoints.clone(),
                None => collected.codepoints.iter().copied().collect(),
            };
            self.entity_model(name.as_str(), collected, codepoints)
        })
    }

    pub fn info_model(
        &self,
        discrete: Option<&DiscreteLocation>,
    ) -> Result<Arc<EntityModel<Metrics>>, Error> {
        let key = CacheKey::new(self.owner, Operation::InfoModel).discrete(discrete);
        self.cache.get_or_compute(key, || {
            let collected = self.collector().collect_info(discrete)?;
            self.entity_model("info", collected, Vec::new())
        })
    }

    /// The kerning model, restricted to pairs if given.
    pub fn kerning_model(
        &self,
        discrete: Option<&DiscreteLocation>,
        pairs: Option<&BTreeSet<KernPair>>,
    ) -> Result<Arc<EntityModel<Kerning>>, Error> {
        let key = CacheKey::new(self.owner, Operation::KerningModel)
            .discrete(discrete)
            .pairs(pairs);
        self.cache.get_or_compute(key, || {
            let collected = self.collector().collect_kerning(discrete, pairs)?;
            self.entity_model("kerning", collected, Vec::new())
        })
    }

    /// The model for the lib keys the config wants interpolated.
    pub fn lib_model(
        &self,
        discrete: Option<&DiscreteLocation>,
    ) -> Result<Arc<EntityModel<LibValues>>, Error> {
        let key = CacheKey::new(self.owner, Operation::LibModel).discrete(discrete);
        self.cache.get_or_compute(key, || {
            let collected = self
                .collector()
                .collect_lib(discrete, &self.config.lib_keys_for_processing)?;
            self.entity_model("lib", collected, Vec::new())
        })
    }

    /// Fill in missing axes, clip, split and project a location.
    pub fn resolve(&self, location: &DesignAnisoLocation) -> Result<ResolvedLocation, Error> {
        let axes = &self.doc.axes;
        let mut full = DesignAnisoLocation::from(axes.default_location(true, None));
        for (name, pos) in location.iter() {
            full.insert(name.clone(), *pos);
        }
        if !self.config.extrapolate {
            if axes.location_will_clip(&full) {
                debug!("Clipping {location:?}");
            }
            full = axes.clip_anisotropic(&full);
        }
        let (continuous, discrete) = axes.split_anisotropic(&full)?;
        if let Some(discrete) = discrete.as_ref() {
            if !axes.check_discrete_values(discrete) {
                return Err(Error::IllegalDiscreteLocation(discrete.clone()));
            }
        }
        Ok(ResolvedLocation {
            anisotropic: continuous.is_anisotropic(),
            horizontal: continuous.horizontal(),
            vertical: continuous.vertical(),
            full,
            continuous,
            discrete,
        })
    }

    fn instance_at<V: Interpolable>(
        &self,
        entity: &str,
        model: &MasterModel<V>,
        location: &DesignLocation,
    ) -> Result<V, Error> {
        let normalized: NormalizedLocation = self.doc.axes.normalize(location, self.config.extrapolate);
        if log_enabled!(log::Level::Trace) {
            trace!("'{entity}' at {normalized:?}: {:?}", model.scalars(&normalized));
        }
        model
            .instance_at(&normalized)
            .map_err(|source| Error::Interpolation {
                entity: entity.to_string(),
                source,
            })
    }

    /// The model at a resolved location, horizontal and vertical parts merged
    /// if the location is anisotropic.
    fn merged_at<V: Interpolable>(
        &self,
        entity: &str,
        model: &MasterModel<V>,
        resolved: &ResolvedLocation,
    ) -> Result<V, Error> {
        if !resolved.anisotropic {
            return self.instance_at(entity, model, &resolved.horizontal);
        }
        let horizontal = self.instance_at(entity, model, &resolved.horizontal)?;
        let vertical = self.instance_at(entity, model, &resolved.vertical)?;
        merge_anisotropic(&horizontal, &vertical, self.config.field_policy).map_err(|source| {
            Error::Interpolation {
                entity: entity.to_string(),
                source,
            }
        })
    }

    fn glyph_at(
        &self,
        name: &GlyphName,
        resolved: &ResolvedLocation,
        decompose: bool,
        round: bool,
    ) -> Result<Arc<GlyphInstance>, Error> {
        let key = CacheKey::new(self.owner, Operation::MakeOneGlyph)
            .entity(name.as_str())
            .discrete(resolved.discrete.as_ref())
            .location(&resolved.full)
            .flags(self.glyph_flags(decompose, round));
        self.cache.get_or_compute(key, || {
            let entity = self.glyph_model(name, resolved.discrete.as_ref(), decompose)?;
            let mut glyph = self.merged_at(name.as_str(), &entity.model, resolved)?;
            if round {
                glyph = glyph.round();
            }
            glyph.name = name.clone();
            glyph.codepoints.clone_from(&entity.codepoints);
            Ok(glyph)
        })
    }

    /// One glyph at location.
    pub fn make_one_glyph(
        &self,
        name: &GlyphName,
        location: &DesignAnisoLocation,
        decompose: bool,
        round: bool,
    ) -> Result<Arc<GlyphInstance>, Error> {
        let resolved = self.resolve(location)?;
        self.glyph_at(name, &resolved, decompose, round)
    }

    fn info_at(&self, resolved: &ResolvedLocation, round: bool) -> Result<Metrics, Error> {
        let entity = self.info_model(resolved.discrete.as_ref())?;
        let metrics = self.merged_at("info", &entity.model, resolved)?;
        Ok(if round { metrics.round() } else { metrics })
    }

    pub fn make_one_info(&self, location: &DesignAnisoLocation) -> Result<Metrics, Error> {
        let resolved = self.resolve(location)?;
        self.info_at(&resolved, self.config.round_geometry)
    }

    // kerning only varies horizontally
    fn kerning_at(
        &self,
        resolved: &ResolvedLocation,
        pairs: Option<&BTreeSet<KernPair>>,
        round: bool,
    ) -> Result<Kerning, Error> {
        let entity = self.kerning_model(resolved.discrete.as_ref(), pairs)?;
        let kerning = self.instance_at("kerning", &entity.model, &resolved.horizontal)?;
        Ok(if round { kerning.round() } else { kerning })
    }

    pub fn make_one_kerning(
        &self,
        location: &DesignAnisoLocation,
        pairs: Option<&BTreeSet<KernPair>>,
    ) -> Result<Kerning, Error> {
        let resolved = self.resolve(location)?;
        self.kerning_at(&resolved, pairs, self.config.round_geometry)
    }

    fn lib_at(&self, resolved: &ResolvedLocation) -> Result<LibValues, Error> {
        let entity = self.lib_model(resolved.discrete.as_ref())?;
        self.instance_at("lib", &entity.model, &resolved.horizontal)
    }

    pub fn make_one_lib(&self, location: &DesignAnisoLocation) -> Result<LibValues, Error> {
        let resolved = self.resolve(location)?;
        self.lib_at(&resolved)
    }

    /// Vertical proportions at the default of a sub-space, for callers that
    /// need to size things before any instance exists.
    pub fn make_font_proportions(&self, discrete: Option<&DiscreteLocation>) -> Metrics {
        let defaults = [
            (MetricField::UnitsPerEm, 1000.0),
            (MetricField::Ascender, 750.0),
            (MetricField::Descender, -250.0),
            (MetricField::XHeight, 500.0),
        ];
        let info = match self.info_model(discrete) {
            Ok(entity) => self
                .instance_at("info", &entity.model, &DesignLocation::new())
                .unwrap_or_default(),
            Err(e) => {
                debug!("No info model for font proportions: {e}");
                Metrics::new()
            }
        };
        defaults
            .into_iter()
            .map(|(field, fallback)| (field, info.get(field).unwrap_or(fallback)))
            .collect()
    }

    /// Build the instance a descriptor asks for.
    ///
    /// Fails only if the location is unusable or its sub-space has no default;
    /// glyphs and tables that can't be built are left out and reported.
    pub fn make_instance(
        &self,
        descriptor: &InstanceDescriptor,
        options: &MaterializeOptions,
    ) -> Result<InstanceOutput, Error> {
        let resolved = self.resolve(&descriptor.location)?;
        let discrete = resolved.discrete.as_ref();
        let Some(default_source) = self.find_default(discrete) else {
            warn!("No default source for '{}' at {discrete:?}", descriptor.name);
            return Err(Error::NoDefaultSource(discrete.cloned()));
        };
        let default_font = self
            .fonts
            .get(&default_source.name)
            .ok_or_else(|| Error::NoDefaultSource(discrete.cloned()))?;
        if resolved.anisotropic {
            debug!("'{}' is anisotropic", descriptor.name);
        }
        let round = options.round || self.config.round_geometry;
        let mut problems = IndexSet::new();
        let mut font = InstanceFont::default();

        if default_source.copy_info {
            font.info = default_font.info().clone();
        }
        if descriptor.info {
            match self.info_at(&resolved, round) {
                Ok(metrics) => {
                    for (field, value) in metrics.iter() {
                        font.info.metrics.set(field, value);
                    }
                }
                Err(e) => record(&mut problems, e)?,
            }
        }
        let names = &mut font.info.names;
        overlay(&mut names.family_name, &descriptor.family_name);
        overlay(&mut names.style_name, &descriptor.style_name);
        overlay(
            &mut names.postscript_font_name,
            &descriptor.postscript_font_name,
        );
        overlay(
            &mut names.style_map_family_name,
            &descriptor.style_map_family_name,
        );
        overlay(
            &mut names.style_map_style_name,
            &descriptor.style_map_style_name,
        );

        if descriptor.kerning {
            match self.kerning_at(&resolved, options.pairs.as_ref(), round) {
                Ok(kerning) => font.kerning = kerning,
                Err(e) => record(&mut problems, e)?,
            }
        }
        if default_source.copy_groups {
            font.groups = default_font.groups().clone();
        }
        if default_source.copy_features {
            font.features = default_font.features().to_string();
        }
        if default_source.copy_lib {
            font.lib = default_font.lib().clone();
        }
        if !self.config.lib_keys_for_processing.is_empty() {
            match self.lib_at(&resolved) {
                Ok(values) => values.apply_to(&mut font.lib),
                Err(e) => record(&mut problems, e)?,
            }
        }
        font.lib.insert(
            FULL_LOCATION_LIB_KEY.to_string(),
            location_to_json(&resolved.full),
        );

        let glyph_names = match &options.glyph_names {
            Some(names) => names.clone(),
            None => self.glyph_names(discrete),
        };
        for name in glyph_names {
            let glyph = self
                .glyph_model(&name, discrete, options.decompose)
                .and_then(|entity| {
                    problems.extend(entity.problems.iter().cloned());
                    self.glyph_at(&name, &resolved, options.decompose, round)
                });
            match glyph {
                Ok(glyph) => {
                    font.glyphs.insert(name, glyph.as_ref().clone());
                }
                Err(e) => record(&mut problems, e)?,
            }
        }
        debug!(
            "'{}': {} glyphs, {} problems",
            descriptor.name,
            font.glyphs.len(),
            problems.len()
        );
        Ok(InstanceOutput {
            font,
            problems: problems.into_iter().collect(),
        })
    }

    /// An instance at an arbitrary location, named after it.
    pub fn make_one_instance(
        &self,
        location: &DesignAnisoLocation,
        options: &MaterializeOptions,
    ) -> Result<InstanceOutput, Error> {
        let resolved = self.resolve(location)?;
        let family_name = self
            .default_font(resolved.discrete.as_ref())?
            .info()
            .names
            .family_name
            .clone();
        let style_name = self.location_to_descriptive_string(location);
        let descriptor = InstanceDescriptor {
            family_name,
            style_name: Some(style_name.clone()),
            ..InstanceDescriptor::new(style_name, location.clone())
        };
        self.make_instance(&descriptor, options)
    }

    /// e.g. "weight_350_width_100_spacing_1": continuous axes by name, then
    /// discrete ones. Anisotropic values give both halves.
    pub fn location_to_descriptive_string(&self, location: &DesignAnisoLocation) -> String {
        let mut continuous = Vec::new();
        let mut discrete = Vec::new();
        for (name, pos) in location.iter() {
            let part = if pos.is_anisotropic() {
                format!(
                    "{name}_{}_{}",
                    pos.horizontal().to_f64(),
                    pos.vertical().to_f64()
                )
            } else {
                format!("{name}_{}", pos.horizontal().to_f64())
            };
            match self.doc.axes.get(name) {
                Some(axis) if axis.is_discrete() => discrete.push(part),
                _ => continuous.push(part),
            }
        }
        continuous.extend(discrete);
        continuous.join("_")
    }

    /// Every instance the document describes. Writing them out is up to the
    /// caller.
    pub fn generate_instances(&self, options: &MaterializeOptions) -> Vec<GeneratedInstance> {
        self.doc
            .instances
            .iter()
            .map(|descriptor| {
                debug!("Generating '{}'", descriptor.name);
                GeneratedInstance {
                    name: descriptor.name.clone(),
                    filename: descriptor.filename.clone(),
                    output: self.make_instance(descriptor, options),
                }
            })
            .collect()
    }

    /// Forget everything computed so far. Returns how many cache entries went.
    pub fn changed(&self) -> usize {
        self.cache.invalidate_all(self.owner)
    }

    /// Forget what was computed for one glyph and, if asked, for every glyph
    /// that uses it as a component.
    pub fn glyph_changed(&self, name: &GlyphName, include_dependencies: bool) -> usize {
        if !include_dependencies {
            return self.cache.invalidate_entity(self.owner, name.as_str(), None);
        }
        let index = self.dependency_index();
        self.cache
            .invalidate_entity(self.owner, name.as_str(), Some(&index))
    }

    /// Replace the font behind a source.
    pub fn update_font(&mut self, source_name: &str, font: impl SourceFont + 'static) {
        self.fonts.insert(source_name, font);
        let removed = self.changed();
        debug!("'{source_name}' changed, dropped {removed} cache entries");
    }

    /// Glyphs with cached models or instances.
    pub fn glyphs_in_cache(&self) -> Vec<GlyphName> {
        self.cache
            .entities(self.owner)
            .into_iter()
            .map(GlyphName::from)
            .collect()
    }
}
