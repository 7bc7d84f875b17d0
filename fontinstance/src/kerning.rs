//! Pair kerning and the groups it refers to.

use std::collections::{BTreeMap, BTreeSet};

use fontvary::interpolable::{FieldPolicy, Interpolable, InterpolationError, Scale};
use smol_str::SmolStr;

use crate::types::GlyphName;

pub const KERN1_PREFIX: &str = "public.kern1.";
pub const KERN2_PREFIX: &str = "public.kern2.";

/// Group name to members.
pub type Groups = BTreeMap<SmolStr, Vec<GlyphName>>;

/// A side is either a glyph name or a kerning group name.
pub type KernPair = (SmolStr, SmolStr);

/// Kerning values by pair. A pair that isn't present kerns by zero.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Kerning(BTreeMap<KernPair, f64>);

impl Kerning {
    pub fn new() -> Kerning {
        Default::default()
    }

    pub fn insert(&mut self, left: impl Into<SmolStr>, right: impl Into<SmolStr>, value: f64) {
        self.0.insert((left.into(), right.into()), value);
    }

    pub fn with(mut self, left: impl Into<SmolStr>, right: impl Into<SmolStr>, value: f64) -> Self {
        self.insert(left, right, value);
        self
    }

    /// The value stored for exactly this pair, zero if there is none.
    pub fn get(&self, left: &str, right: &str) -> f64 {
        self.0
            .get(&(SmolStr::new(left), SmolStr::new(right)))
            .copied()
            .unwrap_or_default()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&KernPair, f64)> {
        self.0.iter().map(|(k, v)| (k, *v))
    }

    pub fn pairs(&self) -> impl Iterator<Item = &KernPair> {
        self.0.keys()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The kerning between two glyphs, taking groups into account.
    ///
    /// Glyph/glyph beats glyph/group beats group/glyph beats group/group.
    pub fn lookup(&self, left: &GlyphName, right: &GlyphName, groups: &Groups) -> f64 {
        let left_group = group_of(groups, KERN1_PREFIX, left);
        let right_group = group_of(groups, KERN2_PREFIX, right);
        let left = left.clone().into_inner();
        let right = right.clone().into_inner();

        let mut candidates = vec![(left.clone(), right.clone())];
        if let Some(rg) = right_group {
            candidates.push((left.clone(), rg.clone()));
        }
        if let Some(lg) = left_group {
            candidates.push((lg.clone(), right));
            if let Some(rg) = right_group {
                candidates.push((lg.clone(), rg.clone()));
            }
        }
        candidates
            .iter()
            .find_map(|pair| self.0.get(pair).copied())
            .unwrap_or_default()
    }

    /// Kerning restricted to pairs.
    ///
    /// Sides that are groups are looked up directly, pairs of glyphs go
    /// through [`Kerning::lookup`]. Every requested pair is present in the
    /// result, zero if nothing applies.
    pub fn subset(&self, pairs: &BTreeSet<KernPair>, groups: &Groups) -> Kerning {
        pairs
            .iter()
            .map(|(left, right)| {
                let value = if is_group(left) || is_group(right) {
                    self.get(left, right)
                } else {
                    self.lookup(&left.clone().into(), &right.clone().into(), groups)
                };
                ((left.clone(), right.clone()), value)
            })
            .collect()
    }

    fn combine(&self, other: &Self, op: impl Fn(f64, f64) -> f64) -> Self {
        self.0
            .keys()
            .chain(other.0.keys())
            .map(|pair| {
                let l = self.0.get(pair).copied().unwrap_or_default();
                let r = other.0.get(pair).copied().unwrap_or_default();
                (pair.clone(), op(l, r))
            })
            .collect()
    }
}

fn is_group(name: &str) -> bool {
    name.starts_with(KERN1_PREFIX) || name.starts_with(KERN2_PREFIX)
}

fn group_of<'a>(groups: &'a Groups, prefix: &str, glyph: &GlyphName) -> Option<&'a SmolStr> {
    groups
        .iter()
        .find(|(name, members)| name.starts_with(prefix) && members.contains(glyph))
        .map(|(name, _)| name)
}

impl FromIterator<(KernPair, f64)> for Kerning {
    fn from_iter<T: IntoIterator<Item = (KernPair, f64)>>(iter: T) -> Self {
        Kerning(iter.into_iter().collect())
    }
}

/// Missing pairs read as zero so there are no undefined fields and the
/// field policy never comes into play.
impl Interpolable for Kerning {
    fn add(&self, other: &Self, _: FieldPolicy) -> Result<Self, InterpolationError> {
        Ok(self.combine(other, |l, r| l + r))
    }

    fn sub(&self, other: &Self, _: FieldPolicy) -> Result<Self, InterpolationError> {
        Ok(self.combine(other, |l, r| l - r))
    }

    /// Kerning is horizontal.
    fn scale(&self, factor: Scale) -> Self {
        self.iter()
            .map(|(pair, value)| (pair.clone(), value * factor.x))
            .collect()
    }

    fn round(&self) -> Self {
        self.iter()
            .map(|(pair, value)| (pair.clone(), value.round_ties_even()))
            .collect()
    }
}
