//! Remaps values using a series of linear mappings.
//!
//! Useful for things like designspace : userspace mapping.
//! For example, from a <https://fonttools.readthedocs.io/en/latest/designspaceLib/xml.html#location>
//! xvalue to a userspace value.

use std::collections::BTreeMap;

use ordered_float::OrderedFloat;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PiecewiseLinearMap {
    // these two mappings have identical lengths, by construction
    from: Vec<OrderedFloat<f64>>, // sorted, ||'s to
    to: Vec<OrderedFloat<f64>>,   // sorted, ||'s from
}

impl PiecewiseLinearMap {
    /// Create a new map from a series of (from, to) values.
    ///
    /// An empty series produces the identity map. When a from value repeats
    /// the last pair given for it wins.
    pub fn new(mappings: Vec<(OrderedFloat<f64>, OrderedFloat<f64>)>) -> PiecewiseLinearMap {
        let mut by_from: BTreeMap<_, _> = mappings.into_iter().collect();
        if by_from.is_empty() {
            by_from.insert(OrderedFloat(0.0), OrderedFloat(0.0));
        }
        let (from, to): (Vec<_>, Vec<_>) = by_from.into_iter().unzip();
        PiecewiseLinearMap { from, to }
    }

    pub(crate) fn len(&self) -> usize {
        self.from.len()
    }

    /// True if to ascends along with from (which is always sorted).
    pub(crate) fn is_monotonic(&self) -> bool {
        self.to.windows(2).all(|w| w[0] <= w[1])
    }

    /// An iterator over (from, to) values.
    pub(crate) fn iter(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.from
            .iter()
            .zip(self.to.iter())
            .map(|(from, to)| (from.0, to.0))
    }

    /// Maps a value, interpolating between breakpoints.
    ///
    /// Past either end the offset of the nearest breakpoint is applied, the
    /// same as fontTools `piecewiseLinearMap`.
    pub fn map(&self, value: OrderedFloat<f64>) -> OrderedFloat<f64> {
        let idx = match self.from.binary_search(&value) {
            Ok(exact) => return self.to[exact],
            Err(idx) => idx,
        };
        let v = value.into_inner();
        if idx == 0 || idx == self.from.len() {
            let edge = if idx == 0 { 0 } else { idx - 1 };
            return OrderedFloat(v + self.to[edge].0 - self.from[edge].0);
        }
        let (lo, hi) = (idx - 1, idx);
        let t = (v - self.from[lo].0) / (self.from[hi].0 - self.from[lo].0);
        OrderedFloat(lerp(self.to[lo].0, self.to[hi].0, t))
    }
}

fn lerp(a: f64, b: f64, t: f64) -> f64 {
    debug_assert!((0.0..=1.0).contains(&t));
    a + t * (b - a)
}

#[cfg(test)]
mod tests {
    use ordered_float::OrderedFloat;

    use super::PiecewiseLinearMap;

    #[test]
    fn lerps_inside_and_shifts_outside() {
        // sources drawn on a 0..100 grid for a 300..700 weight range
        let plm = PiecewiseLinearMap::new(vec![
            (OrderedFloat(0.0), OrderedFloat(300.0)),
            (OrderedFloat(100.0), OrderedFloat(700.0)),
        ]);
        let mapped: Vec<_> = [-10.0, 0.0, 25.0, 100.0, 130.0]
            .into_iter()
            .map(|v| plm.map(OrderedFloat(v)).0)
            .collect();
        assert_eq!(vec![290.0, 300.0, 400.0, 700.0, 730.0], mapped);
    }

    #[test]
    fn picks_the_right_segment() {
        let plm = PiecewiseLinearMap::new(vec![
            (OrderedFloat(10.0), OrderedFloat(-2.0)),
            (OrderedFloat(-20.0), OrderedFloat(-8.0)),
            (OrderedFloat(0.0), OrderedFloat(0.0)),
        ]);
        assert_eq!(OrderedFloat(-4.0), plm.map(OrderedFloat(-10.0)));
        assert_eq!(OrderedFloat(-1.0), plm.map(OrderedFloat(5.0)));
    }

    #[test]
    fn empty_map_is_identity() {
        let plm = PiecewiseLinearMap::new(Vec::new());
        assert_eq!(plm.map(OrderedFloat(-35.0)), OrderedFloat(-35.0));
        assert_eq!(plm.map(OrderedFloat(412.5)), OrderedFloat(412.5));
    }

    #[test]
    fn swapped_pairs_round_trip() {
        let pairs = [(100.0, 20.0), (400.0, 80.0), (900.0, 200.0)];
        let plm = PiecewiseLinearMap::new(
            pairs
                .iter()
                .map(|(a, b)| (OrderedFloat(*a), OrderedFloat(*b)))
                .collect(),
        );
        let rev = PiecewiseLinearMap::new(
            pairs
                .iter()
                .map(|(a, b)| (OrderedFloat(*b), OrderedFloat(*a)))
                .collect(),
        );
        for value in [100.0, 250.0, 400.0, 650.0, 900.0] {
            assert_eq!(OrderedFloat(value), rev.map(plm.map(OrderedFloat(value))));
        }
    }

    #[test]
    fn repeated_from_keeps_the_last_pair() {
        let plm = PiecewiseLinearMap::new(vec![
            (OrderedFloat(0.0), OrderedFloat(0.0)),
            (OrderedFloat(1000.0), OrderedFloat(0.0)),
            (OrderedFloat(1000.0), OrderedFloat(1000.0)),
        ]);
        assert_eq!(
            vec![(0.0, 0.0), (1000.0, 1000.0)],
            plm.iter().collect::<Vec<_>>()
        );
        assert_eq!(OrderedFloat(1000.0), plm.map(OrderedFloat(1000.0)));
        assert_eq!(OrderedFloat(500.0), plm.map(OrderedFloat(500.0)));
    }

    #[test]
    fn detects_non_monotonic() {
        let plm = PiecewiseLinearMap::new(vec![
            (OrderedFloat(0.0), OrderedFloat(10.0)),
            (OrderedFloat(10.0), OrderedFloat(5.0)),
        ]);
        assert!(!plm.is_monotonic());
    }
}
