//! Font-wide info: the numeric metrics that interpolate and the names that don't.

use std::collections::BTreeMap;

use fontvary::interpolable::{FieldPolicy, Interpolable, InterpolationError, Scale};
use serde::{Deserialize, Serialize};

/// The direction a metric measures, which decides how it scales anisotropically.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Horizontal,
    Vertical,
    /// Angles, classes and the like. Scales like horizontal.
    Neutral,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MetricField {
    UnitsPerEm,
    Ascender,
    Descender,
    XHeight,
    CapHeight,
    ItalicAngle,
    HheaAscender,
    HheaDescender,
    HheaLineGap,
    HheaCaretOffset,
    Os2TypoAscender,
    Os2TypoDescender,
    Os2TypoLineGap,
    Os2WinAscent,
    Os2WinDescent,
    Os2WeightClass,
    Os2WidthClass,
    Os2SubscriptXSize,
    Os2SubscriptYSize,
    Os2SubscriptXOffset,
    Os2SubscriptYOffset,
    Os2SuperscriptXSize,
    Os2SuperscriptYSize,
    Os2SuperscriptXOffset,
    Os2SuperscriptYOffset,
    Os2StrikeoutSize,
    Os2StrikeoutPosition,
    UnderlinePosition,
    UnderlineThickness,
    SlantAngle,
}

impl MetricField {
    pub fn direction(&self) -> Direction {
        use MetricField::*;
        match self {
            HheaCaretOffset | Os2SubscriptXSize | Os2SubscriptXOffset | Os2SuperscriptXSize
            | Os2SuperscriptXOffset => Direction::Horizontal,
            Ascender | Descender | XHeight | CapHeight | HheaAscender | HheaDescender
            | HheaLineGap | Os2TypoAscender | Os2TypoDescender | Os2TypoLineGap
            | Os2WinAscent | Os2WinDescent | Os2SubscriptYSize | Os2SubscriptYOffset
            | Os2SuperscriptYSize | Os2SuperscriptYOffset | Os2StrikeoutSize
            | Os2StrikeoutPosition | UnderlinePosition | UnderlineThickness => {
                Direction::Vertical
            }
            UnitsPerEm | ItalicAngle | Os2WeightClass | Os2WidthClass | SlantAngle => {
                Direction::Neutral
            }
        }
    }

    fn is_angle(&self) -> bool {
        matches!(self, MetricField::ItalicAngle | MetricField::SlantAngle)
    }
}

/// Numeric font info. A field that is absent is undefined.
#[derive(Serialize, Deserialize, Debug, Default, Clone, PartialEq)]
pub struct Metrics(BTreeMap<MetricField, f64>);

impl Metrics {
    pub fn new() -> Metrics {
        Default::default()
    }

    pub fn get(&self, field: MetricField) -> Option<f64> {
        self.0.get(&field).copied()
    }

    pub fn set(&mut self, field: MetricField, value: f64) -> &mut Metrics {
        self.0.insert(field, value);
        self
    }

    pub fn with(mut self, field: MetricField, value: f64) -> Metrics {
        self.0.insert(field, value);
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = (MetricField, f64)> + '_ {
        self.0.iter().map(|(k, v)| (*k, *v))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn combine(&self, other: &Self, policy: FieldPolicy, op: impl Fn(f64, f64) -> f64) -> Self {
        let mut result = Metrics::new();
        for field in self.0.keys().chain(other.0.keys()) {
            if result.0.contains_key(field) {
                continue;
            }
            if let Some(value) = policy.combine(self.get(*field), other.get(*field), &op) {
                result.0.insert(*field, value);
            }
        }
        result
    }
}

impl FromIterator<(MetricField, f64)> for Metrics {
    fn from_iter<T: IntoIterator<Item = (MetricField, f64)>>(iter: T) -> Self {
        Metrics(iter.into_iter().collect())
    }
}

impl Interpolable for Metrics {
    fn add(&self, other: &Self, policy: FieldPolicy) -> Result<Self, InterpolationError> {
        Ok(self.combine(other, policy, |l, r| l + r))
    }

    fn sub(&self, other: &Self, policy: FieldPolicy) -> Result<Self, InterpolationError> {
        Ok(self.combine(other, policy, |l, r| l - r))
    }

    fn scale(&self, factor: Scale) -> Self {
        self.iter()
            .map(|(field, value)| {
                let f = match field.direction() {
                    Direction::Vertical => factor.y,
                    Direction::Horizontal | Direction::Neutral => factor.x,
                };
                (field, value * f)
            })
            .collect()
    }

    /// Angles keep their fraction.
    fn round(&self) -> Self {
        self.iter()
            .map(|(field, value)| {
                if field.is_angle() {
                    (field, value)
                } else {
                    (field, value.round_ties_even())
                }
            })
            .collect()
    }
}

/// Info copied verbatim rather than interpolated.
#[derive(Serialize, Deserialize, Debug, Default, Clone, PartialEq)]
#[serde(default)]
pub struct FontNames {
    pub family_name: Option<String>,
    pub style_name: Option<String>,
    pub postscript_font_name: Option<String>,
    pub style_map_family_name: Option<String>,
    pub style_map_style_name: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Default, Clone, PartialEq)]
#[serde(default)]
pub struct FontInfo {
    pub names: FontNames,
    pub metrics: Metrics,
    /// Everything else (vendor id, panose, notes...), copied verbatim.
    pub static_fields: BTreeMap<String, serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use fontvary::interpolable::{FieldPolicy, Interpolable, Scale};
    use pretty_assertions::assert_eq;

    use super::{MetricField, Metrics};

    fn light() -> Metrics {
        Metrics::new()
            .with(MetricField::Ascender, 700.0)
            .with(MetricField::XHeight, 500.0)
            .with(MetricField::ItalicAngle, -10.5)
            .with(MetricField::HheaCaretOffset, 10.0)
    }

    #[test]
    fn undefined_fields_keep_defined_side() {
        let bold = Metrics::new()
            .with(MetricField::Ascender, 800.0)
            .with(MetricField::CapHeight, 720.0);
        let delta = bold.sub(&light(), FieldPolicy::KeepDefined).unwrap();
        assert_eq!(Some(100.0), delta.get(MetricField::Ascender));
        assert_eq!(Some(720.0), delta.get(MetricField::CapHeight));
        assert_eq!(Some(500.0), delta.get(MetricField::XHeight));
    }

    #[test]
    fn undefined_wins_drops_one_sided_fields() {
        let bold = Metrics::new().with(MetricField::Ascender, 800.0);
        let delta = bold.sub(&light(), FieldPolicy::UndefinedWins).unwrap();
        assert_eq!(
            Metrics::new().with(MetricField::Ascender, 100.0),
            delta
        );
    }

    #[test]
    fn scale_by_direction() {
        let h = light().scale(Scale::HORIZONTAL);
        assert_eq!(Some(0.0), h.get(MetricField::Ascender));
        assert_eq!(Some(-10.5), h.get(MetricField::ItalicAngle));
        assert_eq!(Some(10.0), h.get(MetricField::HheaCaretOffset));
        let v = light().scale(Scale::VERTICAL);
        assert_eq!(Some(700.0), v.get(MetricField::Ascender));
        assert_eq!(Some(0.0), v.get(MetricField::HheaCaretOffset));
    }

    #[test]
    fn round_leaves_angles() {
        let m = Metrics::new()
            .with(MetricField::XHeight, 500.5)
            .with(MetricField::ItalicAngle, -10.5)
            .round();
        assert_eq!(Some(500.0), m.get(MetricField::XHeight));
        assert_eq!(Some(-10.5), m.get(MetricField::ItalicAngle));
    }
}
