//! The piecewise-linear variation model.
//!
//! Given master locations, figures out the region each master influences and
//! how much of the earlier masters' deltas leak into each later one. Then
//! [`MasterModel`] pairs that with per-master values to produce a value
//! anywhere in the space.
use std::{
    cmp::Ordering,
    collections::{BTreeMap, HashMap, HashSet},
    fmt::{Debug, Display},
    ops::RangeInclusive,
};

use log::{log_enabled, trace};
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use thiserror::Error;

use crate::{
    coords::{NormalizedCoord, NormalizedLocation},
    interpolable::{FieldPolicy, Interpolable, InterpolationError, Scale},
};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum VariationModelError {
    #[error("No masters, cannot build a model")]
    NoMasters,
    #[error("None of the masters is at the default location")]
    MissingDefault,
    #[error("More than one master at {0:?}")]
    DuplicateLocation(NormalizedLocation),
    #[error("{0:?} is not present in the variation model")]
    UnknownLocation(NormalizedLocation),
    #[error("Unable to compute deltas: {0}")]
    Interpolation(#[from] InterpolationError),
}

/// Whether deltas are rounded as a [`MasterModel`] computes them.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RoundingBehaviour {
    #[default]
    None,
    /// Halves go to the even neighbour, 2.5 becomes 2 and 3.5 becomes 4
    RoundTiesEven,
}

impl RoundingBehaviour {
    fn apply<V: Interpolable>(self, value: V) -> V {
        match self {
            RoundingBehaviour::None => value,
            RoundingBehaviour::RoundTiesEven => value.round(),
        }
    }
}

const ZERO: OrderedFloat<f64> = OrderedFloat(0.0);
const ONE: OrderedFloat<f64> = OrderedFloat(1.0);

/// The regions a set of master locations carve normalized space into.
///
/// Masters are ordered so each one only sees deltas from those before it,
/// and each region records how much of every earlier delta it absorbs.
#[derive(Default, Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct VariationModel {
    pub default: NormalizedLocation,

    axis_order: Vec<SmolStr>,

    // parallel, [i] is one master
    locations: Vec<NormalizedLocation>,
    influence: Vec<VariationRegion>,
    // (earlier master, weight of its delta)
    delta_weights: Vec<Vec<(usize, OrderedFloat<f64>)>>,
    // span of master positions per axis, set when extrapolating
    axis_ranges_for_extrapolation: Option<HashMap<SmolStr, RangeInclusive<OrderedFloat<f64>>>>,
}

impl VariationModel {
    /// A model over the given master locations.
    ///
    /// axis_order is usually [`crate::axes::Axes::axis_order`]; axes outside
    /// it are dropped from every location.
    pub fn new(locations: HashSet<NormalizedLocation>, axis_order: Vec<SmolStr>) -> Self {
        let default = fit_to_axes(NormalizedLocation::new(), &axis_order);

        let expanded_locations: HashSet<_> = locations
            .into_iter()
            .map(|location| fit_to_axes(location, &axis_order))
            .collect();

        // a master never influences one sorted before it
        let mut locations: Vec<_> = expanded_locations.into_iter().collect();
        let ordering = MasterOrdering::new(&locations, &axis_order);
        locations.sort_by_cached_key(|loc| ordering.key_for(loc));

        let regions = regions_for(&axis_order, &locations);
        let influence = master_influence(&axis_order, &regions);
        let delta_weights = delta_weights(&locations, &influence);

        if log::log_enabled!(log::Level::Trace) {
            trace!("Model");
            for (loc, region) in locations.iter().zip(regions.iter().as_ref()) {
                trace!("  {loc:?} {region:?}");
            }
        }

        VariationModel {
            default,
            axis_order,
            locations,
            influence,
            delta_weights,
            axis_ranges_for_extrapolation: None,
        }
    }

    /// Like [`VariationModel::new`], but scalars keep growing linearly past
    /// the outermost master on each axis.
    pub fn new_extrapolating(
        locations: HashSet<NormalizedLocation>,
        axis_order: Vec<SmolStr>,
    ) -> Self {
        let all_axes = locations
            .iter()
            .flat_map(|loc| loc.axis_names().cloned())
            .collect::<HashSet<_>>();

        let ranges = all_axes
            .into_iter()
            .map(|axis| {
                let (min, max) = locations
                    .iter()
                    .fold((f64::MAX, f64::MIN), |(min, max), loc| {
                        match loc.get(&axis) {
                            Some(val) => (min.min(val.to_f64()), max.max(val.to_f64())),
                            None => (min, max),
                        }
                    });
                (axis, min.into()..=max.into())
            })
            .collect();

        let mut this = Self::new(locations, axis_order);
        this.axis_ranges_for_extrapolation = Some(ranges);

        this
    }

    pub fn num_locations(&self) -> usize {
        self.locations.len()
    }

    /// Master locations in model order
    pub fn locations(&self) -> impl Iterator<Item = &NormalizedLocation> {
        self.locations.iter()
    }

    /// Where each master has a say, in model order
    pub fn regions(&self) -> impl Iterator<Item = &VariationRegion> {
        self.influence.iter()
    }

    pub fn axis_order(&self) -> &[SmolStr] {
        &self.axis_order
    }

    pub fn supports(&self, location: &NormalizedLocation) -> bool {
        self.locations
            .contains(&fit_to_axes(location.clone(), &self.axis_order))
    }

    pub fn extrapolates(&self) -> bool {
        self.axis_ranges_for_extrapolation.is_some()
    }

    /// The multiplier for each region's delta at location, in model order.
    pub fn region_scalars(&self, location: &NormalizedLocation) -> Vec<f64> {
        self.influence
            .iter()
            .map(|region| {
                region
                    .scalar_at_with_args(location, self.axis_ranges_for_extrapolation.as_ref())
                    .into_inner()
            })
            .collect()
    }

    /// The weight of each master's absolute value at location, in model order.
    ///
    /// Unlike [`VariationModel::region_scalars`] these apply to master values
    /// rather than deltas, which lets a caller blend without building deltas.
    pub fn master_scalars(&self, location: &NormalizedLocation) -> Vec<f64> {
        let mut out = self.region_scalars(location);
        for (idx, weights) in self.delta_weights.iter().enumerate().rev() {
            for (master_idx, weight) in weights {
                out[*master_idx] -= out[idx] * weight.into_inner();
            }
        }
        out
    }
}

/// Make a location define exactly the axes of axis_order, missing axes at 0
fn fit_to_axes(mut location: NormalizedLocation, axis_order: &[SmolStr]) -> NormalizedLocation {
    location.retain(|name, _| axis_order.contains(name));
    for axis in axis_order.iter() {
        if !location.contains(axis) {
            location.insert(axis.clone(), NormalizedCoord::new(0.0));
        }
    }
    location
}

/// A [`VariationModel`] plus the deltas of one payload type.
///
/// Built from (location, value) pairs, one per master. Exact at master
/// locations; elsewhere the sum of every region's delta times its scalar.
#[derive(Debug, Clone)]
pub struct MasterModel<V> {
    model: VariationModel,
    // [i] belongs to model.locations[i]
    masters: Vec<V>,
    deltas: Vec<V>,
    policy: FieldPolicy,
}

impl<V: Interpolable> MasterModel<V> {
    pub fn new(
        masters: Vec<(NormalizedLocation, V)>,
        axis_order: Vec<SmolStr>,
        extrapolate: bool,
        policy: FieldPolicy,
    ) -> Result<Self, VariationModelError> {
        Self::new_with_rounding(
            masters,
            axis_order,
            extrapolate,
            policy,
            RoundingBehaviour::None,
        )
    }

    /// Like [`MasterModel::new`] but with control over rounding of deltas.
    ///
    /// Deltas are rounded as they are computed, so rounding errors don't
    /// compound where master influences overlap.
    pub fn new_with_rounding(
        masters: Vec<(NormalizedLocation, V)>,
        axis_order: Vec<SmolStr>,
        extrapolate: bool,
        policy: FieldPolicy,
        rounding: RoundingBehaviour,
    ) -> Result<Self, VariationModelError> {
        if masters.is_empty() {
            return Err(VariationModelError::NoMasters);
        }
        let mut by_location = HashMap::new();
        for (location, value) in masters {
            let location = fit_to_axes(location, &axis_order);
            if by_location.contains_key(&location) {
                return Err(VariationModelError::DuplicateLocation(location));
            }
            by_location.insert(location, value);
        }
        if !by_location.contains_key(&fit_to_axes(NormalizedLocation::new(), &axis_order)) {
            return Err(VariationModelError::MissingDefault);
        }

        let locations = by_location.keys().cloned().collect();
        let model = if extrapolate {
            VariationModel::new_extrapolating(locations, axis_order)
        } else {
            VariationModel::new(locations, axis_order)
        };

        // The model is sorted such that [i] is only influenced by [0..i]
        // so going in the same order every delta we need is already computed
        let mut ordered_masters = Vec::with_capacity(model.num_locations());
        let mut deltas: Vec<V> = Vec::with_capacity(model.num_locations());
        for (idx, location) in model.locations.iter().enumerate() {
            let value = by_location
                .remove(location)
                .ok_or_else(|| VariationModelError::UnknownLocation(location.clone()))?;
            let mut delta = value.clone();
            for (master_idx, weight) in model.delta_weights[idx].iter() {
                let influence = deltas[*master_idx].scale(Scale::uniform(weight.into_inner()));
                delta = delta.sub(&influence, policy)?;
            }
            deltas.push(rounding.apply(delta));
            ordered_masters.push(value);
        }

        Ok(MasterModel {
            model,
            masters: ordered_masters,
            deltas,
            policy,
        })
    }

    /// The value at location.
    ///
    /// Axes the model doesn't know are ignored, missing axes sit at default.
    /// Unless the model extrapolates the caller should clip first.
    pub fn instance_at(&self, location: &NormalizedLocation) -> Result<V, InterpolationError> {
        let location = fit_to_axes(location.clone(), &self.model.axis_order);
        let mut result: Option<V> = None;
        for (scalar, delta) in self
            .model
            .region_scalars(&location)
            .into_iter()
            .zip(self.deltas.iter())
        {
            if scalar == 0.0 {
                continue;
            }
            let contribution = delta.scale(Scale::uniform(scalar));
            result = Some(match result {
                None => contribution,
                Some(acc) => acc.add(&contribution, self.policy)?,
            });
        }
        // the default region applies everywhere, so this only happens if
        // nothing contributed at all
        Ok(result.unwrap_or_else(|| self.deltas[0].scale(Scale::uniform(0.0))))
    }

    /// The weight of each master at location, paired with the master's location.
    pub fn scalars(&self, location: &NormalizedLocation) -> Vec<(&NormalizedLocation, f64)> {
        let location = fit_to_axes(location.clone(), &self.model.axis_order);
        self.model
            .locations
            .iter()
            .zip(self.model.master_scalars(&location))
            .collect()
    }

    /// The value a master was built with, if there is a master at location.
    pub fn master_at(&self, location: &NormalizedLocation) -> Option<&V> {
        let location = fit_to_axes(location.clone(), &self.model.axis_order);
        self.model
            .locations
            .iter()
            .position(|l| *l == location)
            .map(|idx| &self.masters[idx])
    }

    pub fn num_masters(&self) -> usize {
        self.masters.len()
    }

    pub fn model(&self) -> &VariationModel {
        &self.model
    }

    /// (region, delta) pairs in model order
    pub fn deltas(&self) -> impl Iterator<Item = (&VariationRegion, &V)> {
        self.model.influence.iter().zip(self.deltas.iter())
    }
}

/// Orders masters from most to least influential.
///
/// The default comes first, then masters on a single axis, then corners and
/// anything else. Fewer off-default axes sort earlier, and a coordinate that
/// some on-axis master also sits at pulls a location forward. The remaining
/// fields only break ties.
struct MasterOrdering<'a> {
    axis_order: &'a Vec<SmolStr>,
    on_axis_points: HashMap<SmolStr, HashSet<NormalizedCoord>>,
}

impl<'a> MasterOrdering<'a> {
    fn new(
        locations: &[NormalizedLocation],
        axis_order: &'a Vec<SmolStr>,
    ) -> MasterOrdering<'a> {
        // on-axis means exactly one non-zero coordinate
        let mut on_axis_points: HashMap<SmolStr, HashSet<NormalizedCoord>> = HashMap::new();
        'location: for location in locations {
            let mut on_axis: Option<(&SmolStr, NormalizedCoord)> = None;
            for (name, pos) in location.iter() {
                if pos.into_inner() == ZERO {
                    continue;
                }
                if on_axis.is_some() {
                    continue 'location;
                }
                on_axis = Some((name, *pos));
            }
            if let Some((name, pos)) = on_axis {
                on_axis_points.entry(name.clone()).or_default().insert(pos);
            }
        }
        MasterOrdering {
            axis_order,
            on_axis_points,
        }
    }

    fn key_for(&self, location: &NormalizedLocation) -> MasterSortKey {
        let mut rank = 0;
        let mut on_axis_points: i16 = 0;
        let mut ordered_axes = Vec::new();
        let mut non_zero_axes = Vec::new();

        let mut known_axes = Vec::new();
        for (idx, name) in self.axis_order.iter().enumerate() {
            if location.has_non_zero(name) {
                known_axes.push(idx);
                ordered_axes.push(name.clone());
            }
        }

        for (name, pos) in location.iter() {
            if pos.into_inner() != ZERO {
                rank += 1;
                // unordered axes sort after every ordered one
                if !self.axis_order.contains(name) {
                    known_axes.push(0x10000);
                }

                non_zero_axes.push(name.clone());
            }
            on_axis_points += self
                .on_axis_points
                .get(name)
                .map(|on_axis| on_axis.get(pos).map_or(0, |_| -1))
                .unwrap_or_default();
        }

        let mut unordered_axes: Vec<SmolStr> = non_zero_axes
            .into_iter()
            .filter(|name| !ordered_axes.contains(name))
            .collect();
        unordered_axes.sort();
        ordered_axes.extend(unordered_axes);

        let axis_value_signs = ordered_axes
            .iter()
            .map(|name| {
                location
                    .get(name)
                    .map(|coord| match coord.into_inner().cmp(&ZERO) {
                        Ordering::Greater => 1_i8,
                        Ordering::Less => -1_i8,
                        Ordering::Equal => 0_i8,
                    })
                    .unwrap_or_default()
            })
            .collect();

        let axis_value_abs = ordered_axes
            .iter()
            .map(|name| {
                location
                    .get(name)
                    .map(|coord| OrderedFloat(coord.into_inner().abs()))
                    .unwrap_or_default()
            })
            .collect();

        let result = MasterSortKey {
            rank,
            on_axis_points,
            known_axes,
            ordered_axes,
            axis_value_signs,
            axis_value_abs,
        };
        trace!("key for {location:?} is {result:?}");

        result
    }
}

/// Compared field by field, so declaration order matters.
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord)]
struct MasterSortKey {
    // non-zero axes
    rank: usize,
    // minus one per coordinate shared with an on-axis master
    on_axis_points: i16,
    known_axes: Vec<usize>,
    ordered_axes: Vec<SmolStr>,
    axis_value_signs: Vec<i8>,
    axis_value_abs: Vec<OrderedFloat<f64>>,
}

/// A chunk of variation space characterized by a set of per-axis tents.
#[derive(Serialize, Deserialize, Default, Debug, Clone, PartialEq, Eq)]
pub struct VariationRegion {
    axis_tents: BTreeMap<SmolStr, Tent>,
    active_axes: HashSet<SmolStr>,
}

impl VariationRegion {
    pub fn new() -> Self {
        Self::default()
    }

    /// How much of this region's delta applies at location.
    pub fn scalar_at(&self, location: &NormalizedLocation) -> OrderedFloat<f64> {
        self.scalar_at_with_args(location, None)
    }

    /// [`VariationRegion::scalar_at`], optionally extrapolating.
    ///
    /// With axis_ranges, a location past the masters on an axis keeps
    /// following the slope of the tent side nearest to it.
    pub(crate) fn scalar_at_with_args(
        &self,
        location: &NormalizedLocation,
        axis_ranges: Option<&HashMap<SmolStr, RangeInclusive<OrderedFloat<f64>>>>,
    ) -> OrderedFloat<f64> {
        self.axis_tents
            .iter()
            .filter(|(_, ar)| ar.validate())
            .fold(ONE, |scalar, (name, tent)| {
                let v = location
                    .get(name)
                    .map(|v| v.into_inner())
                    .unwrap_or_default();
                let min = tent.min.into_inner();
                let peak = tent.peak.into_inner();
                let max = tent.max.into_inner();

                if v == peak || (min, peak, max) == (ZERO, ZERO, ZERO) {
                    return scalar;
                }
                if let Some(range) = axis_ranges.and_then(|ranges| ranges.get(name)) {
                    let axis_min = *range.start();
                    let axis_max = *range.end();
                    if v < axis_min && min <= axis_min {
                        if peak <= axis_min && peak < max {
                            return scalar * (v - max) / (peak - max);
                        } else if axis_min < peak {
                            return scalar * (v - min) / (peak - min);
                        }
                    } else if axis_max < v && axis_max <= max {
                        if axis_max <= peak && min < peak {
                            return scalar * (v - min) / (peak - min);
                        } else if peak < axis_max {
                            return scalar * (v - max) / (peak - max);
                        }
                    }
                }

                if v <= min || max <= v {
                    trace!("  {self:?} => 0 due to {name} {tent:?} at {location:?}",);
                    return ZERO;
                }

                let subtract_me = if v < peak {
                    tent.min.into_inner()
                } else {
                    tent.max.into_inner()
                };
                scalar * (v - subtract_me) / (peak - subtract_me)
            })
    }

    pub fn insert(&mut self, name: impl Into<SmolStr>, tent: Tent) {
        let name = name.into();
        if tent.has_non_zero() {
            self.active_axes.insert(name.clone());
        }
        self.axis_tents.insert(name, tent);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&SmolStr, &Tent)> {
        self.axis_tents.iter()
    }

    pub fn is_default(&self) -> bool {
        self.active_axes.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&Tent> {
        self.axis_tents.get(name)
    }
}

/// One axis of a region: zero at min, rising to one at peak, back to zero at max.
///
/// Construction pins the side facing the default to zero.
#[derive(Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Tent {
    pub min: NormalizedCoord,
    pub peak: NormalizedCoord,
    pub max: NormalizedCoord,
}

impl Tent {
    pub fn new(mut min: NormalizedCoord, peak: NormalizedCoord, mut max: NormalizedCoord) -> Self {
        let zero = NormalizedCoord::new(0.0);
        if peak > zero {
            min = zero;
        } else {
            max = zero;
        }
        Tent { min, peak, max }
    }

    pub fn zeroes() -> Tent {
        let zero = NormalizedCoord::new(0.0);
        Tent::new(zero, zero, zero)
    }

    /// False for tents that cross the default; those are skipped when
    /// scaling. All zeroes is fine and applies everywhere.
    fn validate(&self) -> bool {
        let min = self.min.into_inner();
        let peak = self.peak.into_inner();
        let max = self.max.into_inner();

        if min > peak || peak > max {
            return false;
        }
        if min < ZERO && max > ZERO {
            return false;
        }
        true
    }

    pub fn has_non_zero(&self) -> bool {
        *self != Tent::zeroes()
    }
}

impl Debug for Tent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_fmt(format_args!("{self}"))
    }
}

impl Display for Tent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let comment = if self.validate() { "" } else { " (invalid)" };
        f.write_fmt(format_args!(
            "Tent {{{}, {}, {}{}}}",
            self.min.into_inner(),
            self.peak.into_inner(),
            self.max.into_inner(),
            comment
        ))
    }
}

impl From<(f64, f64, f64)> for Tent {
    fn from(value: (f64, f64, f64)) -> Self {
        Tent::new(
            NormalizedCoord::new(value.0),
            NormalizedCoord::new(value.1),
            NormalizedCoord::new(value.2),
        )
    }
}

/// A region per location, each axis spanning from the default to the
/// furthest master on the same side.
fn regions_for(axis_order: &[SmolStr], locations: &[NormalizedLocation]) -> Vec<VariationRegion> {
    let mut minmax = HashMap::<&SmolStr, (NormalizedCoord, NormalizedCoord)>::new();
    for location in locations.iter() {
        for (name, value) in location.iter() {
            let (min, max) = minmax.entry(name).or_default();
            if value < min {
                *min = *value;
            }
            if value > max {
                *max = *value;
            }
        }
    }

    locations
        .iter()
        .map(|location| {
            let mut region = VariationRegion::new();
            for name in axis_order {
                let value = location.get(name).unwrap_or_default();
                // axes at default keep an all-zero tent
                let (min, max) = if value.into_inner() == ZERO {
                    (NormalizedCoord::new(ZERO), NormalizedCoord::new(ZERO))
                } else {
                    minmax.get(name).copied().unwrap_or_default()
                };
                region.insert(name.clone(), Tent::new(min, value, max));
            }
            region
        })
        .collect()
}

/// Shrink each region so it stops at the peaks of earlier masters that
/// share its axes.
///
/// Regions must already be in [`MasterOrdering`] order.
fn master_influence(axis_order: &[SmolStr], regions: &[VariationRegion]) -> Vec<VariationRegion> {
    let mut influence: Vec<VariationRegion> = Vec::new();
    for region in regions.iter() {
        let mut region = region.clone();
        // earlier entries have already been shrunk
        for prev_region in influence.iter() {
            if region.active_axes != prev_region.active_axes {
                continue;
            }
            let overlap = region.iter().all(|(axis_name, tent)| {
                let prev_peak = prev_region.axis_tents[axis_name].peak;
                prev_peak == tent.peak || (tent.min < prev_peak && prev_peak < tent.max)
            });
            if !overlap {
                continue;
            }

            // cut along the axis with the largest ratio, every such axis on a tie
            let mut axis_regions: HashMap<&SmolStr, Tent> = HashMap::new();
            let mut best_ratio = OrderedFloat(-1.0);
            for name in axis_order.iter() {
                if !region.active_axes.contains(name) {
                    continue;
                }
                let prev_peak = prev_region.axis_tents[name].peak;
                let mut axis_region = region.axis_tents[name];
                let ratio;
                match prev_peak.cmp(&axis_region.peak) {
                    Ordering::Less => {
                        ratio = (prev_peak - axis_region.peak).into_inner()
                            / (axis_region.min - axis_region.peak).into_inner();
                        axis_region.min = prev_peak;
                    }
                    Ordering::Greater => {
                        ratio = (prev_peak - axis_region.peak).into_inner()
                            / (axis_region.max - axis_region.peak).into_inner();
                        axis_region.max = prev_peak;
                    }
                    Ordering::Equal => continue,
                }
                if ratio > best_ratio {
                    axis_regions.clear();
                    best_ratio = ratio;
                }
                if ratio == best_ratio {
                    axis_regions.insert(name, axis_region);
                }
            }
            for (name, tent) in axis_regions {
                region.insert(name.clone(), tent);
            }
        }
        influence.push(region);
    }
    influence
}

/// For each master, the earlier regions that reach it and by how much.
fn delta_weights(
    locations: &[NormalizedLocation],
    influencers: &[VariationRegion],
) -> Vec<Vec<(usize, OrderedFloat<f64>)>> {
    if log_enabled!(log::Level::Trace) {
        for (l, i) in locations.iter().zip(influencers) {
            trace!("{l:?}");
            for (axis_name, tent) in i.iter() {
                trace!("  {axis_name} {tent}");
            }
        }
    }
    trace!("Delta Weights");
    let mut weights = Vec::new();
    for (loc_idx, location) in locations.iter().enumerate() {
        let for_location: Vec<_> = influencers[..loc_idx]
            .iter()
            .enumerate()
            .filter_map(|(inf_idx, influence)| {
                let scalar = influence.scalar_at(location);
                if scalar == ZERO {
                    trace!("  no influence: {inf_idx} {influence:?} at {location:?}",);
                    return None;
                }
                Some((inf_idx, scalar))
            })
            .collect();
        trace!("  {loc_idx} {for_location:?}");
        weights.push(for_location);
    }
    weights
}
