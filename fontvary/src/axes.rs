//! Axes with enough self-awareness to split, clip, bend and normalize locations.

use std::collections::{BTreeSet, HashMap};

use ordered_float::OrderedFloat;
use rand::{seq::SliceRandom, Rng};
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use write_fonts::types::Tag;

use crate::{
    coords::{
        normalize_value, Coord, CoordConverter, DesignAnisoLocation, DesignCoord, DesignLocation,
        DesignSpace, DiscreteLocation, NormalizedCoord, NormalizedLocation, Position, UserCoord,
    },
    error::Error,
    serde::{ContinuousAxisSerdeRepr, DiscreteAxisSerdeRepr},
};

/// A continuous axis, bounded in user space, optionally bent by a map.
///
/// Deserializing runs the same checks as [`ContinuousAxis::new_mapped`].
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(
    try_from = "ContinuousAxisSerdeRepr",
    into = "ContinuousAxisSerdeRepr"
)]
pub struct ContinuousAxis {
    pub name: SmolStr,
    pub tag: Tag,
    pub min: UserCoord,
    pub default: UserCoord,
    pub max: UserCoord,
    pub hidden: bool,
    pub converter: CoordConverter,
    /// The (user, design) breakpoints as declared, repeats included
    pub(crate) map: Vec<(UserCoord, DesignCoord)>,
}

impl ContinuousAxis {
    /// An axis without a map; user and design coordinates coincide.
    pub fn new(
        name: impl Into<SmolStr>,
        tag: Tag,
        min: f64,
        default: f64,
        max: f64,
    ) -> Result<ContinuousAxis, Error> {
        Self::new_mapped(name, tag, min, default, max, Vec::new())
    }

    /// An axis whose user coordinates are bent into design coordinates
    /// by the given (user, design) breakpoints.
    pub fn new_mapped(
        name: impl Into<SmolStr>,
        tag: Tag,
        min: f64,
        default: f64,
        max: f64,
        map: Vec<(f64, f64)>,
    ) -> Result<ContinuousAxis, Error> {
        let name = name.into();
        if !(min <= default && default <= max) {
            return Err(Error::InvalidBounds {
                name,
                min,
                default,
                max,
            });
        }
        let (min, default, max) = (
            UserCoord::new(min),
            UserCoord::new(default),
            UserCoord::new(max),
        );
        let map: Vec<_> = map
            .into_iter()
            .map(|(u, d)| (UserCoord::new(u), DesignCoord::new(d)))
            .collect();
        let converter = CoordConverter::new(map.clone(), min, default, max);
        if !converter.is_monotonic() {
            return Err(Error::NonMonotonicMap(name));
        }
        Ok(ContinuousAxis {
            name,
            tag,
            min,
            default,
            max,
            hidden: false,
            converter,
            map,
        })
    }

    /// The (user, design) breakpoints the axis was declared with.
    pub fn map(&self) -> &[(UserCoord, DesignCoord)] {
        &self.map
    }

    pub fn is_point(&self) -> bool {
        self.min == self.default && self.max == self.default
    }

    /// User to design.
    pub fn map_forward(&self, value: f64) -> f64 {
        UserCoord::new(value).to_design(&self.converter).to_f64()
    }

    /// Design to user.
    pub fn map_backward(&self, value: f64) -> f64 {
        DesignCoord::new(value).to_user(&self.converter).to_f64()
    }

    /// (min, default, max) in design space.
    pub fn design_bounds(&self) -> (f64, f64, f64) {
        let (min, default, max) = self.converter.design_bounds();
        (min.to_f64(), default.to_f64(), max.to_f64())
    }

    fn clamp(&self, value: DesignCoord) -> DesignCoord {
        let (min, _, max) = self.design_bounds();
        DesignCoord::new(value.to_f64().clamp(min, max))
    }

    fn normalize(&self, value: DesignCoord, extrapolate: bool) -> NormalizedCoord {
        let value = if extrapolate { value } else { self.clamp(value) };
        let (min, default, max) = self.design_bounds();
        NormalizedCoord::new(normalize_value(value.to_f64(), min, default, max))
    }
}

/// An axis that only takes an enumerated set of values.
///
/// Never interpolated; every value identifies a separate sub-space.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(try_from = "DiscreteAxisSerdeRepr", into = "DiscreteAxisSerdeRepr")]
pub struct DiscreteAxis {
    pub name: SmolStr,
    pub tag: Tag,
    /// In declared order
    pub values: Vec<OrderedFloat<f64>>,
    pub default: OrderedFloat<f64>,
    pub hidden: bool,
}

impl DiscreteAxis {
    pub fn new(
        name: impl Into<SmolStr>,
        tag: Tag,
        values: Vec<f64>,
        default: f64,
    ) -> Result<DiscreteAxis, Error> {
        let name = name.into();
        if values.is_empty() {
            return Err(Error::NoDiscreteValues(name));
        }
        if !values.contains(&default) {
            return Err(Error::DiscreteDefaultNotAValue {
                name,
                default,
                values,
            });
        }
        Ok(DiscreteAxis {
            name,
            tag,
            values: values.into_iter().map(OrderedFloat).collect(),
            default: OrderedFloat(default),
            hidden: false,
        })
    }

    pub fn contains(&self, value: f64) -> bool {
        self.values.contains(&OrderedFloat(value))
    }

    /// The permitted value closest to value, the lower one on a tie.
    pub fn nearest(&self, value: f64) -> f64 {
        self.values
            .iter()
            .map(|v| v.into_inner())
            .min_by_key(|v| (OrderedFloat((v - value).abs()), OrderedFloat(*v)))
            .unwrap_or(self.default.into_inner())
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub enum Axis {
    Continuous(ContinuousAxis),
    Discrete(DiscreteAxis),
}

impl Axis {
    pub fn name(&self) -> &SmolStr {
        match self {
            Axis::Continuous(a) => &a.name,
            Axis::Discrete(a) => &a.name,
        }
    }

    pub fn tag(&self) -> Tag {
        match self {
            Axis::Continuous(a) => a.tag,
            Axis::Discrete(a) => a.tag,
        }
    }

    pub fn is_discrete(&self) -> bool {
        matches!(self, Axis::Discrete(..))
    }

    pub fn converter(&self) -> Option<&CoordConverter> {
        match self {
            Axis::Continuous(a) => Some(&a.converter),
            Axis::Discrete(..) => None,
        }
    }

    /// Discrete axes don't bend.
    pub fn map_forward(&self, value: f64) -> f64 {
        match self {
            Axis::Continuous(a) => a.map_forward(value),
            Axis::Discrete(..) => value,
        }
    }

    pub fn map_backward(&self, value: f64) -> f64 {
        match self {
            Axis::Continuous(a) => a.map_backward(value),
            Axis::Discrete(..) => value,
        }
    }

    /// The default, in design space if bend is set and user space otherwise.
    pub fn default_value(&self, bend: bool) -> f64 {
        match self {
            Axis::Continuous(a) if bend => a.map_forward(a.default.to_f64()),
            Axis::Continuous(a) => a.default.to_f64(),
            Axis::Discrete(a) => a.default.into_inner(),
        }
    }

    fn clip(&self, value: DesignCoord) -> DesignCoord {
        match self {
            Axis::Continuous(a) => a.clamp(value),
            Axis::Discrete(a) => DesignCoord::new(a.nearest(value.to_f64())),
        }
    }
}

impl From<ContinuousAxis> for Axis {
    fn from(value: ContinuousAxis) -> Self {
        Axis::Continuous(value)
    }
}

impl From<DiscreteAxis> for Axis {
    fn from(value: DiscreteAxis) -> Self {
        Axis::Discrete(value)
    }
}

/// The axes of a design space, in declared order.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(try_from = "Vec<Axis>", into = "Vec<Axis>")]
pub struct Axes {
    axes: Vec<Axis>,
    by_name: HashMap<SmolStr, usize>,
}

impl TryFrom<Vec<Axis>> for Axes {
    type Error = Error;

    fn try_from(value: Vec<Axis>) -> Result<Self, Self::Error> {
        Axes::new(value)
    }
}

impl From<Axes> for Vec<Axis> {
    fn from(value: Axes) -> Self {
        value.axes
    }
}

impl Axes {
    pub fn new(axes: Vec<Axis>) -> Result<Axes, Error> {
        let mut by_name = HashMap::new();
        for (idx, axis) in axes.iter().enumerate() {
            if by_name.insert(axis.name().clone(), idx).is_some() {
                return Err(Error::DuplicateAxis(axis.name().clone()));
            }
        }
        Ok(Axes { axes, by_name })
    }

    pub fn get(&self, name: &str) -> Option<&Axis> {
        self.by_name.get(name).map(|idx| &self.axes[*idx])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Axis> {
        self.axes.iter()
    }

    pub fn len(&self) -> usize {
        self.axes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.axes.is_empty()
    }

    pub fn continuous(&self) -> impl Iterator<Item = &ContinuousAxis> {
        self.axes.iter().filter_map(|a| match a {
            Axis::Continuous(a) => Some(a),
            Axis::Discrete(..) => None,
        })
    }

    pub fn discrete(&self) -> impl Iterator<Item = &DiscreteAxis> {
        self.axes.iter().filter_map(|a| match a {
            Axis::Discrete(a) => Some(a),
            Axis::Continuous(..) => None,
        })
    }

    pub fn has_discrete(&self) -> bool {
        self.discrete().next().is_some()
    }

    fn is_discrete(&self, name: &str) -> Result<bool, Error> {
        self.get(name)
            .map(Axis::is_discrete)
            .ok_or_else(|| Error::UnknownAxis(name.into()))
    }

    /// The order axes are fed to the variation model in.
    ///
    /// Continuous axes only, and only those that actually vary.
    pub fn axis_order(&self) -> Vec<SmolStr> {
        self.continuous()
            .filter(|a| !a.is_point())
            .map(|a| a.name.clone())
            .collect()
    }

    /// User to design for the named axis; unknown axes pass through unchanged.
    pub fn map_forward(&self, name: &str, value: f64) -> f64 {
        self.get(name)
            .map(|a| a.map_forward(value))
            .unwrap_or(value)
    }

    /// Design to user for the named axis; unknown axes pass through unchanged.
    pub fn map_backward(&self, name: &str, value: f64) -> f64 {
        self.get(name)
            .map(|a| a.map_backward(value))
            .unwrap_or(value)
    }

    /// Partition a location into its continuous and discrete parts.
    ///
    /// The discrete part is None if the location touches no discrete axis.
    pub fn split_location(
        &self,
        location: &DesignLocation,
    ) -> Result<(DesignLocation, Option<DiscreteLocation>), Error> {
        let mut continuous = DesignLocation::new();
        let mut discrete = DiscreteLocation::new();
        for (name, value) in location.iter() {
            if self.is_discrete(name)? {
                discrete.insert(name.clone(), *value);
            } else {
                continuous.insert(name.clone(), *value);
            }
        }
        Ok((continuous, (!discrete.is_empty()).then_some(discrete)))
    }

    /// [`Axes::split_location`] for a location that may hold anisotropic values.
    ///
    /// Discrete axes must be isotropic; a pair with equal halves is accepted.
    pub fn split_anisotropic(
        &self,
        location: &DesignAnisoLocation,
    ) -> Result<(DesignAnisoLocation, Option<DiscreteLocation>), Error> {
        let mut continuous = DesignAnisoLocation::new();
        let mut discrete = DiscreteLocation::new();
        for (name, pos) in location.iter() {
            if !self.is_discrete(name)? {
                continuous.insert(name.clone(), *pos);
                continue;
            }
            if pos.horizontal() != pos.vertical() {
                return Err(Error::AnisotropicDiscreteValue(name.clone()));
            }
            discrete.insert(name.clone(), pos.horizontal());
        }
        Ok((continuous, (!discrete.is_empty()).then_some(discrete)))
    }

    /// A location with every axis at its default.
    ///
    /// If bend is set continuous defaults are mapped into design space.
    /// Discrete axes named in discrete take that value instead of their default.
    pub fn default_location(
        &self,
        bend: bool,
        discrete: Option<&DiscreteLocation>,
    ) -> DesignLocation {
        self.axes
            .iter()
            .map(|axis| {
                let value = match (axis, discrete.and_then(|d| d.get(axis.name()))) {
                    (Axis::Discrete(..), Some(value)) => value.to_f64(),
                    _ => axis.default_value(bend),
                };
                (axis.name().clone(), DesignCoord::new(value))
            })
            .collect()
    }

    /// Fill in any axis missing from location with its (bent) default.
    pub fn full_location(&self, location: &DesignLocation) -> DesignLocation {
        self.default_location(true, None).merge(location)
    }

    /// Continuous values are clamped to the bent axis extremes, discrete values
    /// snap to the nearest permitted value. Unknown axes are left alone.
    pub fn clip(&self, location: &DesignLocation) -> DesignLocation {
        location
            .iter()
            .map(|(name, value)| {
                let value = match self.get(name) {
                    Some(axis) => axis.clip(*value),
                    None => *value,
                };
                (name.clone(), value)
            })
            .collect()
    }

    /// [`Axes::clip`], applied to each half of an anisotropic pair independently.
    pub fn clip_anisotropic(&self, location: &DesignAnisoLocation) -> DesignAnisoLocation {
        location
            .iter()
            .map(|(name, pos)| {
                let pos = match self.get(name) {
                    Some(axis) => pos.map(|v| axis.clip(v)),
                    None => *pos,
                };
                (name.clone(), pos)
            })
            .collect()
    }

    pub fn location_will_clip(&self, location: &DesignAnisoLocation) -> bool {
        self.clip_anisotropic(location) != *location
    }

    /// Design to normalized for every continuous axis in location.
    ///
    /// Discrete and unknown axes are dropped. Unless extrapolating, values are
    /// clamped to the axis extremes first.
    pub fn normalize(&self, location: &DesignLocation, extrapolate: bool) -> NormalizedLocation {
        location
            .iter()
            .filter_map(|(name, value)| match self.get(name) {
                Some(Axis::Continuous(axis)) => {
                    Some((name.clone(), axis.normalize(*value, extrapolate)))
                }
                _ => None,
            })
            .collect()
    }

    /// True if every continuous coordinate in location sits at the bent default.
    pub fn is_local_default(&self, location: &DesignLocation) -> bool {
        self.continuous().all(|axis| {
            location
                .get(&axis.name)
                .map(|v| v.to_f64() == axis.map_forward(axis.default.to_f64()))
                .unwrap_or(true)
        })
    }

    /// True if every discrete axis holds one of its permitted values.
    pub fn check_discrete_values(&self, location: &DesignLocation) -> bool {
        self.discrete().all(|axis| {
            location
                .get(&axis.name)
                .map(|v| axis.contains(v.to_f64()))
                .unwrap_or(false)
        })
    }

    /// Every combination of discrete values, discrete axes in declared order.
    ///
    /// Empty when there are no discrete axes.
    pub fn discrete_locations(&self) -> Vec<DiscreteLocation> {
        let mut result: Vec<DiscreteLocation> = Vec::new();
        for axis in self.discrete() {
            let seed = if result.is_empty() {
                vec![DiscreteLocation::new()]
            } else {
                std::mem::take(&mut result)
            };
            for partial in seed {
                for value in axis.values.iter() {
                    let mut loc = partial.clone();
                    loc.insert(axis.name.clone(), Coord::new(*value));
                    result.push(loc);
                }
            }
        }
        result
    }

    /// A random location, handy for exercising a design space.
    ///
    /// Continuous axes pick between their bent extremes, widened on each side
    /// by `options.extrapolate` times the user range. Discrete axes pick one of
    /// their values unless discrete pins them.
    pub fn random_location<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        options: RandomLocation,
        discrete: Option<&DiscreteLocation>,
    ) -> DesignAnisoLocation {
        let mut location = DesignAnisoLocation::new();
        for axis in self.axes.iter() {
            let pos = match axis {
                Axis::Discrete(axis) => {
                    let value = match discrete.and_then(|d| d.get(&axis.name)) {
                        Some(value) => value.to_f64(),
                        None => axis
                            .values
                            .choose(rng)
                            .copied()
                            .unwrap_or(axis.default)
                            .into_inner(),
                    };
                    Position::iso(value)
                }
                Axis::Continuous(axis) => {
                    let (min, _, max) = axis.design_bounds();
                    let overshoot = options.extrapolate * (axis.max.to_f64() - axis.min.to_f64());
                    let (lo, hi) = (min - overshoot, max + overshoot);
                    let mut pick = || {
                        let value = lo + rng.gen::<f64>() * (hi - lo);
                        if options.round {
                            value.round()
                        } else {
                            value
                        }
                    };
                    if options.anisotropic {
                        let horizontal = pick();
                        Position::aniso(horizontal, pick())
                    } else {
                        Position::iso(pick())
                    }
                }
            };
            location.insert(axis.name().clone(), pos);
        }
        location
    }

    /// Remove muted axes from a source location.
    ///
    /// Returns None if the source sits off the default of a muted axis and so
    /// should not contribute at all.
    pub fn filter_muted(
        &self,
        location: &DesignLocation,
        muted: &BTreeSet<SmolStr>,
    ) -> Option<DesignLocation> {
        let mut filtered = location.clone();
        for name in muted {
            let (Some(value), Some(axis)) = (location.get(name), self.get(name)) else {
                continue;
            };
            if value.to_f64() != axis.default_value(true) {
                return None;
            }
            filtered.remove(name);
        }
        Some(filtered)
    }
}

/// How [`Axes::random_location`] spreads its picks.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RandomLocation {
    /// Fraction of each axis range to allow past either extreme
    pub extrapolate: f64,
    /// Pick horizontal and vertical separately on continuous axes
    pub anisotropic: bool,
    /// Round continuous picks to whole units
    pub round: bool,
}

impl Default for RandomLocation {
    fn default() -> Self {
        RandomLocation {
            extrapolate: 0.0,
            anisotropic: false,
            round: true,
        }
    }
}

/// Build an anisotropic location from (axis name, position) pairs.
pub fn aniso_location(positions: &[(&str, Position<DesignSpace>)]) -> DesignAnisoLocation {
    positions
        .iter()
        .map(|(name, pos)| (SmolStr::new(name), *pos))
        .collect()
}
