//! Typed coordinates and locations.
//!
//! Three spaces matter here. User coordinates are what axis bounds are
//! written in, design coordinates are what source locations are written in
//! (user coordinates pushed through the axis map, or "bent"), and normalized
//! coordinates are what the variation model works in.

use std::{
    collections::BTreeMap,
    fmt::{Debug, Write},
    marker::PhantomData,
    ops::Sub,
};

use ordered_float::OrderedFloat;
use serde::{ser::SerializeSeq, Deserialize, Deserializer, Serialize};
use smol_str::SmolStr;

use crate::{axes::Axes, piecewise_linear_map::PiecewiseLinearMap};

/// Implemented by the space marker types; backs [`Coord::convert`] and
/// [`Location::convert`].
pub trait ConvertSpace<ToSpace>: Sized {
    fn convert_coord(coord: Coord<Self>, converter: &CoordConverter) -> Coord<ToSpace>;
}

/// The coordinate space sources are located in.
///
/// Bounds are whatever the type designer drew with, e.g. stem widths of
/// 20..200 for a weight axis whose user range is 100..900.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DesignSpace;

/// The space axis bounds are declared in.
///
/// Axis minimum, default and maximum are expressed in user coordinates.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct UserSpace;

/// A space where the default is always at `0` and the axis extremes at `-1` and `1`.
///
/// Values outside `-1..=1` only occur when extrapolating.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NormalizedSpace;

/// One axis value, tagged with the space it lives in.
#[derive(Serialize, Deserialize, Default, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Coord<Space> {
    coord: OrderedFloat<f64>,
    // fn() -> Space keeps Coord Send + Sync whatever the marker is
    space: PhantomData<fn() -> Space>,
}

pub type DesignCoord = Coord<DesignSpace>;
pub type UserCoord = Coord<UserSpace>;
pub type NormalizedCoord = Coord<NormalizedSpace>;

impl<Space> Coord<Space> {
    /// There is deliberately no `From<f64>`, a bare float has no space.
    pub fn new(value: impl Into<OrderedFloat<f64>>) -> Self {
        Coord {
            coord: value.into(),
            space: PhantomData,
        }
    }

    pub fn into_inner(self) -> OrderedFloat<f64> {
        self.coord
    }

    pub fn to_f64(&self) -> f64 {
        self.coord.into_inner()
    }

    pub fn convert<ToSpace>(&self, converter: &CoordConverter) -> Coord<ToSpace>
    where
        Space: ConvertSpace<ToSpace>,
    {
        Space::convert_coord(*self, converter)
    }
}

/// Per-axis coordinates keyed by axis name.
///
/// Ordered and hashable, so locations can key the cache and source maps.
#[derive(Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Location<Space>(BTreeMap<SmolStr, Coord<Space>>);

// by hand so the space marker needn't be Clone
impl<Space> Clone for Location<Space> {
    fn clone(&self) -> Self {
        Location(self.0.clone())
    }
}

pub type DesignLocation = Location<DesignSpace>;
pub type UserLocation = Location<UserSpace>;
pub type NormalizedLocation = Location<NormalizedSpace>;
/// The discrete axis part of a design location, identifying one discrete sub-space.
pub type DiscreteLocation = Location<DesignSpace>;

// to_user/to_design/to_normalized shorthands for Coord and Location
macro_rules! convert_convenience_methods {
    ($space:ident, $fn_name:ident) => {
        impl<Space> Coord<Space>
        where
            Space: ConvertSpace<$space>,
        {
            pub fn $fn_name(&self, converter: &CoordConverter) -> Coord<$space> {
                self.convert(converter)
            }
        }

        impl<Space> Location<Space>
        where
            Space: ConvertSpace<$space>,
        {
            pub fn $fn_name(&self, axes: &Axes) -> Location<$space> {
                self.convert(axes)
            }
        }
    };
}
convert_convenience_methods!(NormalizedSpace, to_normalized);
convert_convenience_methods!(UserSpace, to_user);
convert_convenience_methods!(DesignSpace, to_design);

/// Converts between Design, User, and Normalized coordinates for one continuous axis.
// Sources suggest <= 10 mappings is typical, we can afford the bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoordConverter {
    user_to_design: PiecewiseLinearMap,
    design_to_user: PiecewiseLinearMap,
    design_min: DesignCoord,
    design_default: DesignCoord,
    design_max: DesignCoord,
}

impl CoordConverter {
    /// Initialize a converter from the user:design breakpoints of an axis map
    /// and the user space bounds of the axis.
    ///
    /// No breakpoints means the identity map.
    pub fn new(
        mappings: Vec<(UserCoord, DesignCoord)>,
        min: UserCoord,
        default: UserCoord,
        max: UserCoord,
    ) -> CoordConverter {
        let user_to_design = PiecewiseLinearMap::new(
            mappings
                .iter()
                .map(|(u, d)| (u.into_inner(), d.into_inner()))
                .collect(),
        );
        // built from the raw pairs so a repeated design value keeps its last user value
        let design_to_user = PiecewiseLinearMap::new(
            mappings
                .iter()
                .map(|(u, d)| (d.into_inner(), u.into_inner()))
                .collect(),
        );
        let design_min = DesignCoord::new(user_to_design.map(min.into_inner()));
        let design_default = DesignCoord::new(user_to_design.map(default.into_inner()));
        let design_max = DesignCoord::new(user_to_design.map(max.into_inner()));
        CoordConverter {
            user_to_design,
            design_to_user,
            design_min,
            design_default,
            design_max,
        }
    }

    /// Initialize a converter from just min/default/max user coords, e.g. an axis with no mapping
    pub fn unmapped(min: UserCoord, default: UserCoord, max: UserCoord) -> CoordConverter {
        CoordConverter::new(Vec::new(), min, default, max)
    }

    /// The bent (design space) min, default and max.
    pub fn design_bounds(&self) -> (DesignCoord, DesignCoord, DesignCoord) {
        (self.design_min, self.design_default, self.design_max)
    }

    /// Walk the vertices of the mappings, viewing the user/design/normalized value at each stop.
    pub fn iter(&self) -> impl Iterator<Item = (UserCoord, DesignCoord, NormalizedCoord)> + '_ {
        self.user_to_design.iter().map(|(user, design)| {
            let user = UserCoord::new(user);
            let design = DesignCoord::new(design);
            let normalized = design.to_normalized(self);
            (user, design, normalized)
        })
    }

    /// How many mapping points exist
    pub fn len(&self) -> usize {
        self.user_to_design.len()
    }

    pub fn is_empty(&self) -> bool {
        self.user_to_design.len() == 0
    }

    pub(crate) fn is_monotonic(&self) -> bool {
        self.user_to_design.is_monotonic()
    }
}

/// Design to normalized, relative to the bent min/default/max.
///
/// Based on `normalizeValue` in fontTools.varLib.models, without the clamp;
/// callers that don't extrapolate clamp first.
pub(crate) fn normalize_value(value: f64, lower: f64, default: f64, upper: f64) -> f64 {
    if value == default || lower == upper {
        return 0.0;
    }
    if (value < default && lower != default) || (value > default && upper == default) {
        (value - default) / (default - lower)
    } else {
        (value - default) / (upper - default)
    }
}

/// The inverse of [`normalize_value`].
pub(crate) fn denormalize_value(value: f64, lower: f64, default: f64, upper: f64) -> f64 {
    if value == 0.0 || lower == upper {
        return default;
    }
    let span = if (value < 0.0 && lower != default) || (value > 0.0 && upper == default) {
        default - lower
    } else {
        upper - default
    };
    default + value * span
}

impl<Space> Sub<Coord<Space>> for Coord<Space> {
    type Output = Coord<Space>;

    fn sub(self, rhs: Coord<Space>) -> Self::Output {
        Coord::new(self.to_f64() - rhs.to_f64())
    }
}

impl<Space> FromIterator<(SmolStr, Coord<Space>)> for Location<Space> {
    fn from_iter<I: IntoIterator<Item = (SmolStr, Coord<Space>)>>(iter: I) -> Self {
        Location(iter.into_iter().collect())
    }
}

impl<Space> From<Vec<(SmolStr, Coord<Space>)>> for Location<Space> {
    fn from(value: Vec<(SmolStr, Coord<Space>)>) -> Self {
        value.into_iter().collect()
    }
}

impl<Space> Location<Space> {
    pub fn new() -> Location<Space> {
        Location(Default::default())
    }

    /// Make a location from raw axis names + values
    pub fn for_pos(positions: &[(&str, f64)]) -> Self {
        positions
            .iter()
            .map(|(name, value)| (SmolStr::new(name), Coord::new(*value)))
            .collect()
    }

    pub fn insert(&mut self, name: impl Into<SmolStr>, pos: Coord<Space>) -> &mut Location<Space> {
        self.0.insert(name.into(), pos);
        self
    }

    pub fn remove(&mut self, name: &str) -> Option<Coord<Space>> {
        self.0.remove(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&SmolStr, &Coord<Space>)> {
        self.0.iter()
    }

    pub fn axis_names(&self) -> impl Iterator<Item = &SmolStr> {
        self.0.keys()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<Coord<Space>> {
        self.0.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn retain(&mut self, pred: impl Fn(&SmolStr, &mut Coord<Space>) -> bool) {
        self.0.retain(pred);
    }

    /// Entries of other win.
    pub fn merge(&self, other: &Location<Space>) -> Location<Space> {
        let mut merged = self.clone();
        merged
            .0
            .extend(other.0.iter().map(|(name, coord)| (name.clone(), *coord)));
        merged
    }

    /// Convert every coordinate that belongs to a continuous axis.
    ///
    /// Coordinates of discrete or unknown axes are carried over unchanged.
    pub fn convert<ToSpace>(&self, axes: &Axes) -> Location<ToSpace>
    where
        Space: ConvertSpace<ToSpace>,
    {
        self.0
            .iter()
            .map(|(name, coord)| {
                let converted = match axes.get(name).and_then(|a| a.converter()) {
                    Some(converter) => coord.convert(converter),
                    None => Coord::new(coord.coord),
                };
                (name.clone(), converted)
            })
            .collect()
    }
}

// methods we only want available on NormalizedSpace
impl Location<NormalizedSpace> {
    pub fn has_non_zero(&self, name: &str) -> bool {
        self.get(name).unwrap_or_default().to_f64() != 0.0
    }

    pub fn has_any_non_zero(&self) -> bool {
        self.0.values().any(|v| v.to_f64() != 0.0)
    }

    /// Returns true if all normalized coordinates are zero
    pub fn is_default(&self) -> bool {
        !self.has_any_non_zero()
    }
}

impl ConvertSpace<UserSpace> for DesignSpace {
    fn convert_coord(coord: Coord<Self>, converter: &CoordConverter) -> Coord<UserSpace> {
        Coord::new(converter.design_to_user.map(coord.coord))
    }
}

impl ConvertSpace<NormalizedSpace> for DesignSpace {
    fn convert_coord(coord: Coord<Self>, converter: &CoordConverter) -> Coord<NormalizedSpace> {
        Coord::new(normalize_value(
            coord.to_f64(),
            converter.design_min.to_f64(),
            converter.design_default.to_f64(),
            converter.design_max.to_f64(),
        ))
    }
}

impl ConvertSpace<DesignSpace> for UserSpace {
    fn convert_coord(coord: Coord<Self>, converter: &CoordConverter) -> Coord<DesignSpace> {
        Coord::new(converter.user_to_design.map(coord.coord))
    }
}

impl ConvertSpace<NormalizedSpace> for UserSpace {
    fn convert_coord(coord: Coord<Self>, converter: &CoordConverter) -> Coord<NormalizedSpace> {
        let dspace: DesignCoord = UserSpace::convert_coord(coord, converter);
        DesignSpace::convert_coord(dspace, converter)
    }
}

impl ConvertSpace<DesignSpace> for NormalizedSpace {
    fn convert_coord(coord: Coord<Self>, converter: &CoordConverter) -> Coord<DesignSpace> {
        Coord::new(denormalize_value(
            coord.to_f64(),
            converter.design_min.to_f64(),
            converter.design_default.to_f64(),
            converter.design_max.to_f64(),
        ))
    }
}

impl ConvertSpace<UserSpace> for NormalizedSpace {
    fn convert_coord(coord: Coord<Self>, converter: &CoordConverter) -> Coord<UserSpace> {
        let dspace: DesignCoord = NormalizedSpace::convert_coord(coord, converter);
        DesignSpace::convert_coord(dspace, converter)
    }
}

// we need to manually implement this bc of phantomdata:
// <https://stackoverflow.com/questions/31371027/copy-trait-and-phantomdata-should-this-really-move>
impl<T> Clone for Coord<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Coord<T> {}

impl<Space> PartialEq<f64> for Coord<Space> {
    fn eq(&self, other: &f64) -> bool {
        self.coord.as_ref() == other
    }
}

impl<Space> PartialEq<Coord<Space>> for f64 {
    fn eq(&self, other: &Coord<Space>) -> bool {
        other == self
    }
}

/// The value of one axis in a location that may be anisotropic.
///
/// An anisotropic position carries independent values for the horizontal
/// and vertical projections of the instance.
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Position<Space> {
    Iso(Coord<Space>),
    Aniso {
        horizontal: Coord<Space>,
        vertical: Coord<Space>,
    },
}

impl<Space> Position<Space> {
    pub fn iso(value: f64) -> Self {
        Position::Iso(Coord::new(value))
    }

    pub fn aniso(horizontal: f64, vertical: f64) -> Self {
        Position::Aniso {
            horizontal: Coord::new(horizontal),
            vertical: Coord::new(vertical),
        }
    }

    pub fn is_anisotropic(&self) -> bool {
        matches!(self, Position::Aniso { .. })
    }

    pub fn horizontal(&self) -> Coord<Space> {
        match self {
            Position::Iso(v) => *v,
            Position::Aniso { horizontal, .. } => *horizontal,
        }
    }

    pub fn vertical(&self) -> Coord<Space> {
        match self {
            Position::Iso(v) => *v,
            Position::Aniso { vertical, .. } => *vertical,
        }
    }

    /// Apply f to every value, horizontal and vertical alike.
    pub fn map(&self, f: impl Fn(Coord<Space>) -> Coord<Space>) -> Position<Space> {
        match self {
            Position::Iso(v) => Position::Iso(f(*v)),
            Position::Aniso {
                horizontal,
                vertical,
            } => Position::Aniso {
                horizontal: f(*horizontal),
                vertical: f(*vertical),
            },
        }
    }
}

impl<T> Clone for Position<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Position<T> {}

/// A location where any axis may hold a (horizontal, vertical) pair.
#[derive(Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AnisotropicLocation<Space>(BTreeMap<SmolStr, Position<Space>>);

impl<Space> Clone for AnisotropicLocation<Space> {
    fn clone(&self) -> Self {
        AnisotropicLocation(self.0.clone())
    }
}

/// An [`AnisotropicLocation`] in [`DesignSpace`].
pub type DesignAnisoLocation = AnisotropicLocation<DesignSpace>;

impl<Space> AnisotropicLocation<Space> {
    pub fn new() -> Self {
        AnisotropicLocation(Default::default())
    }

    pub fn insert(&mut self, name: impl Into<SmolStr>, pos: Position<Space>) -> &mut Self {
        self.0.insert(name.into(), pos);
        self
    }

    pub fn get(&self, name: &str) -> Option<Position<Space>> {
        self.0.get(name).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&SmolStr, &Position<Space>)> {
        self.0.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn is_anisotropic(&self) -> bool {
        self.0.values().any(Position::is_anisotropic)
    }

    /// The horizontal projection: first element of every pair, scalars unchanged.
    pub fn horizontal(&self) -> Location<Space> {
        self.0
            .iter()
            .map(|(name, pos)| (name.clone(), pos.horizontal()))
            .collect()
    }

    /// The vertical projection: second element of every pair, scalars unchanged.
    pub fn vertical(&self) -> Location<Space> {
        self.0
            .iter()
            .map(|(name, pos)| (name.clone(), pos.vertical()))
            .collect()
    }

    /// The isotropic location, if no axis carries a pair.
    pub fn to_isotropic(&self) -> Option<Location<Space>> {
        (!self.is_anisotropic()).then(|| self.horizontal())
    }
}

impl<Space> From<Location<Space>> for AnisotropicLocation<Space> {
    fn from(value: Location<Space>) -> Self {
        AnisotropicLocation(
            value
                .0
                .into_iter()
                .map(|(name, coord)| (name, Position::Iso(coord)))
                .collect(),
        )
    }
}

impl<Space> FromIterator<(SmolStr, Position<Space>)> for AnisotropicLocation<Space> {
    fn from_iter<I: IntoIterator<Item = (SmolStr, Position<Space>)>>(iter: I) -> Self {
        AnisotropicLocation(iter.into_iter().collect())
    }
}

impl<Space> Serialize for Location<Space> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let mut seq = serializer.serialize_seq(Some(self.0.len()))?;
        for (key, value) in &self.0 {
            seq.serialize_element(&(key, value.to_f64()))?;
        }
        seq.end()
    }
}

impl<'de, Space> Deserialize<'de> for Location<Space> {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        Vec::<(SmolStr, OrderedFloat<f64>)>::deserialize(deserializer).map(|vals| {
            Location(
                vals.into_iter()
                    .map(|(name, val)| (name, Coord::new(val)))
                    .collect(),
            )
        })
    }
}

// a scalar, or a [horizontal, vertical] pair
#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum RawPosition {
    Iso(f64),
    Aniso(f64, f64),
}

impl<Space> Serialize for AnisotropicLocation<Space> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let mut seq = serializer.serialize_seq(Some(self.0.len()))?;
        for (key, value) in &self.0 {
            let raw = match value {
                Position::Iso(v) => RawPosition::Iso(v.to_f64()),
                Position::Aniso {
                    horizontal,
                    vertical,
                } => RawPosition::Aniso(horizontal.to_f64(), vertical.to_f64()),
            };
            seq.serialize_element(&(key, raw))?;
        }
        seq.end()
    }
}

impl<'de, Space> Deserialize<'de> for AnisotropicLocation<Space> {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        Vec::<(SmolStr, RawPosition)>::deserialize(deserializer).map(|vals| {
            vals.into_iter()
                .map(|(name, raw)| {
                    let pos = match raw {
                        RawPosition::Iso(v) => Position::iso(v),
                        RawPosition::Aniso(h, v) => Position::aniso(h, v),
                    };
                    (name, pos)
                })
                .collect()
        })
    }
}

fn format_location<'a, 'b>(
    name: &str,
    f: &mut std::fmt::Formatter<'a>,
    items: impl Iterator<Item = (&'b SmolStr, String)>,
) -> std::fmt::Result {
    f.write_str(name)?;
    f.write_str(" {")?;
    for (i, (axis, value)) in items.enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        f.write_fmt(format_args!("{axis}: {value}"))?;
    }
    f.write_char('}')
}

fn format_position<Space>(pos: &Position<Space>) -> String {
    match pos {
        Position::Iso(v) => format!("{:.02}", v.to_f64()),
        Position::Aniso {
            horizontal,
            vertical,
        } => format!("({:.02}, {:.02})", horizontal.to_f64(), vertical.to_f64()),
    }
}

impl Debug for DesignLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let it = self.0.iter().map(|(n, v)| (n, format!("{:.02}", v.to_f64())));
        format_location("Design", f, it)
    }
}

impl Debug for UserLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let it = self.0.iter().map(|(n, v)| (n, format!("{:.02}", v.to_f64())));
        format_location("User", f, it)
    }
}

impl Debug for NormalizedLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let it = self.0.iter().map(|(n, v)| (n, format!("{:.02}", v.to_f64())));
        format_location("Normalized", f, it)
    }
}

impl Debug for DesignAnisoLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let it = self.0.iter().map(|(n, v)| (n, format_position(v)));
        format_location("Design", f, it)
    }
}
