//! Gathering the master values that feed a variation model.
//!
//! For one entity (a glyph, the font info, kerning, lib values) in one
//! discrete sub-space: pick the sources, drop the ones that can't or
//! shouldn't contribute, and fetch their values.

use std::collections::BTreeSet;

use fontvary::coords::{DesignLocation, DiscreteLocation};
use log::{debug, trace};
use smol_str::SmolStr;

use crate::{
    designspace::{DesignSpaceDocument, SourceDescriptor},
    error::{Error, Problem, ProblemKind},
    font::{FontSet, SourceFont},
    glyph::GlyphInstance,
    kerning::{KernPair, Kerning},
    lib_values::LibValues,
    metrics::Metrics,
    types::GlyphName,
};

/// One master's contribution.
#[derive(Debug, Clone, PartialEq)]
pub struct CollectedSource<V> {
    pub source_name: String,
    pub layer_name: Option<String>,
    /// Continuous design location with muted axes removed.
    pub location: DesignLocation,
    pub value: V,
    pub is_default: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Collected<V> {
    pub sources: Vec<CollectedSource<V>>,
    /// Union of the codepoints declared by the sources. Only filled for glyphs.
    pub codepoints: BTreeSet<u32>,
    pub problems: Vec<Problem>,
}

impl<V> Default for Collected<V> {
    fn default() -> Self {
        Collected {
            sources: Vec::new(),
            codepoints: BTreeSet::new(),
            problems: Vec::new(),
        }
    }
}

impl<V> Collected<V> {
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// The value of the source at the default location, if it contributed.
    pub fn default_value(&self) -> Option<&V> {
        self.sources.iter().find(|s| s.is_default).map(|s| &s.value)
    }
}

pub struct SourceCollector<'a> {
    doc: &'a DesignSpaceDocument,
    fonts: &'a FontSet,
    muted_axes: BTreeSet<SmolStr>,
}

/// A source that survived the checks every entity shares.
struct Candidate<'a> {
    descriptor: &'a SourceDescriptor,
    font: &'a dyn SourceFont,
    location: DesignLocation,
    is_default: bool,
}

impl<'a> SourceCollector<'a> {
    pub fn new(doc: &'a DesignSpaceDocument, fonts: &'a FontSet) -> SourceCollector<'a> {
        SourceCollector {
            doc,
            fonts,
            muted_axes: BTreeSet::new(),
        }
    }

    pub fn with_muted_axes(mut self, muted_axes: BTreeSet<SmolStr>) -> SourceCollector<'a> {
        self.muted_axes = muted_axes;
        self
    }

    /// Sources whose discrete coordinates match discrete; all of them if
    /// discrete is None. A source that doesn't mention a discrete axis sits
    /// at its default.
    pub fn sources_for_discrete_location(
        &self,
        discrete: Option<&DiscreteLocation>,
    ) -> Vec<&'a SourceDescriptor> {
        let Some(discrete) = discrete else {
            return self.doc.sources.iter().collect();
        };
        self.doc
            .sources
            .iter()
            .filter(|source| {
                let full = self.doc.axes.full_location(&source.location);
                discrete
                    .iter()
                    .all(|(name, value)| full.get(name) == Some(*value))
            })
            .collect()
    }

    /// The source, not pointing at a layer, at the bent default of discrete.
    pub fn find_default(&self, discrete: Option<&DiscreteLocation>) -> Option<&'a SourceDescriptor> {
        let default_location = self.doc.axes.default_location(true, discrete);
        self.sources_for_discrete_location(discrete)
            .into_iter()
            .filter(|source| source.layer_name.is_none())
            .find(|source| self.doc.axes.full_location(&source.location) == default_location)
    }

    /// The checks every entity shares: font present, location not muted.
    fn candidates(
        &self,
        discrete: Option<&DiscreteLocation>,
        problems: &mut Vec<Problem>,
    ) -> Result<Vec<Candidate<'a>>, Error> {
        let mut candidates = Vec::new();
        for descriptor in self.sources_for_discrete_location(discrete) {
            let Some(font) = self.fonts.get(&descriptor.name) else {
                debug!("Missing font for source '{}'", descriptor.name);
                problems.push(Problem::new(
                    ProblemKind::MissingFont,
                    format!("Missing font for source '{}'", descriptor.name),
                ));
                continue;
            };
            let (continuous, _) = self.doc.axes.split_location(&descriptor.location)?;
            let Some(location) = self.doc.axes.filter_muted(&continuous, &self.muted_axes) else {
                trace!("Source '{}' is off default on a muted axis", descriptor.name);
                continue;
            };
            candidates.push(Candidate {
                descriptor,
                font: font.as_ref(),
                is_default: self.doc.axes.is_local_default(&continuous),
                location,
            });
        }
        Ok(candidates)
    }

    /// The masters for one glyph.
    ///
    /// Sources that mute the glyph, lack it in their font, or point at a layer
    /// that doesn't have it are skipped. If the default master's glyph is
    /// empty only empty masters contribute, otherwise only non-empty ones do.
    pub fn collect_glyph(
        &self,
        name: &GlyphName,
        discrete: Option<&DiscreteLocation>,
        decompose: bool,
    ) -> Result<Collected<GlyphInstance>, Error> {
        let mut collected = Collected::default();
        let mut empties = Vec::new();
        for candidate in self.candidates(discrete, &mut collected.problems)? {
            let source_name = &candidate.descriptor.name;
            if candidate.descriptor.muted_glyph_names.contains(name) {
                trace!("'{name}' is muted in source '{source_name}'");
                continue;
            }
            if candidate.font.glyph(None, name).is_none() {
                collected.problems.push(Problem::new(
                    ProblemKind::MissingGlyph,
                    format!("'{name}' is not in the font of source '{source_name}'"),
                ));
                continue;
            }
            let layer = candidate.descriptor.layer_name.as_deref();
            if let Some(layer) = layer {
                if !candidate.font.has_layer(layer) {
                    collected.problems.push(Problem::new(
                        ProblemKind::MissingLayer,
                        format!("Source '{source_name}' has no layer '{layer}'"),
                    ));
                    continue;
                }
            }
            // a layer without the glyph is a sparse master, not a problem
            let Some(glyph) = candidate.font.glyph(layer, name) else {
                continue;
            };
            collected.codepoints.extend(glyph.codepoints.iter().copied());
            let is_empty = glyph.is_empty();
            let value = if decompose {
                let font = candidate.font;
                match glyph.decompose(|base| {
                    font.glyph(layer, base)
                        .or_else(|| font.glyph(None, base))
                        .cloned()
                }) {
                    Ok(flat) => flat,
                    Err(e) => {
                        collected.problems.push(Problem::from_error(&e));
                        continue;
                    }
                }
            } else {
                glyph.clone()
            };
            empties.push(is_empty);
            collected.sources.push(CollectedSource {
                source_name: source_name.clone(),
                layer_name: candidate.descriptor.layer_name.clone(),
                location: candidate.location,
                value,
                is_default: candidate.is_default,
            });
        }

        let empty_default = collected
            .sources
            .iter()
            .zip(empties.iter())
            .any(|(s, empty)| s.is_default && *empty);
        let before = collected.sources.len();
        collected.sources = collected
            .sources
            .into_iter()
            .zip(empties)
            .filter(|(_, empty)| *empty == empty_default)
            .map(|(s, _)| s)
            .collect();
        if collected.sources.len() != before {
            debug!(
                "'{name}': {} of {before} masters disagree with the default on emptiness",
                before - collected.sources.len()
            );
        }
        Ok(collected)
    }

    /// Font info from every foreground source that doesn't mute it.
    pub fn collect_info(&self, discrete: Option<&DiscreteLocation>) -> Result<Collected<Metrics>, Error> {
        let mut collected = Collected::default();
        for candidate in self.candidates(discrete, &mut collected.problems)? {
            if candidate.descriptor.layer_name.is_some() || candidate.descriptor.mute_info {
                continue;
            }
            collected.sources.push(CollectedSource {
                source_name: candidate.descriptor.name.clone(),
                layer_name: None,
                location: candidate.location,
                value: candidate.font.info().metrics.clone(),
                is_default: candidate.is_default,
            });
        }
        Ok(collected)
    }

    /// Kerning from every foreground source that doesn't mute it.
    ///
    /// With pairs, each source contributes a sparse table of just those
    /// pairs, resolved through its groups.
    pub fn collect_kerning(
        &self,
        discrete: Option<&DiscreteLocation>,
        pairs: Option<&BTreeSet<KernPair>>,
    ) -> Result<Collected<Kerning>, Error> {
        let mut collected = Collected::default();
        for candidate in self.candidates(discrete, &mut collected.problems)? {
            if candidate.descriptor.layer_name.is_some() || candidate.descriptor.mute_kerning {
                continue;
            }
            let kerning = candidate.font.kerning();
            let value = match pairs {
                Some(pairs) => kerning.subset(pairs, candidate.font.groups()),
                None => kerning.clone(),
            };
            collected.sources.push(CollectedSource {
                source_name: candidate.descriptor.name.clone(),
                layer_name: None,
                location: candidate.location,
                value,
                is_default: candidate.is_default,
            });
        }
        Ok(collected)
    }

    /// The numeric values of keys from every source's lib, layers included.
    pub fn collect_lib(
        &self,
        discrete: Option<&DiscreteLocation>,
        keys: &[String],
    ) -> Result<Collected<LibValues>, Error> {
        let mut collected = Collected::default();
        for candidate in self.candidates(discrete, &mut collected.problems)? {
            collected.sources.push(CollectedSource {
                source_name: candidate.descriptor.name.clone(),
                layer_name: candidate.descriptor.layer_name.clone(),
                location: candidate.location,
                value: LibValues::from_lib(candidate.font.lib(), keys),
                is_default: candidate.is_default,
            });
        }
        Ok(collected)
    }
}
