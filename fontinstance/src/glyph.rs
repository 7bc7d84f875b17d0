//! Glyph outlines and the arithmetic that lets them be interpolated.

use fontvary::interpolable::{FieldPolicy, Interpolable, InterpolationError, Scale};
use kurbo::{Affine, Point};
use log::warn;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

use crate::{error::Error, types::GlyphName};

/// A Glyph at a specific position in designspace.
#[derive(Serialize, Deserialize, Debug, Default, Clone, PartialEq)]
pub struct GlyphInstance {
    pub name: GlyphName,
    /// Advance width.
    pub width: f64,
    /// Advance height, if the source has one.
    pub height: Option<f64>,
    pub contours: Vec<Contour>,
    pub components: Vec<Component>,
    pub anchors: Vec<Anchor>,
    /// Unicode values; carried along, never interpolated.
    pub codepoints: Vec<u32>,
}

/// A single glyph contour consisting of a list of points.
pub type Contour = Vec<ContourPoint>;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct ContourPoint {
    pub pos: Point,
    pub typ: PointType,
}

impl ContourPoint {
    pub fn new(x: f64, y: f64, typ: PointType) -> ContourPoint {
        ContourPoint {
            pos: Point::new(x, y),
            typ,
        }
    }
}

/// Possible types of a point in a glyph contour, following UFO GLIF semantics.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointType {
    Move,
    Line,
    OffCurve,
    Curve,
    QCurve,
}

/// A reference to another glyph.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Component {
    pub base: GlyphName,
    pub transform: Affine,
}

impl Component {
    pub fn new(base: impl Into<GlyphName>, transform: Affine) -> Component {
        Component {
            base: base.into(),
            transform,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Anchor {
    pub name: SmolStr,
    pub pos: Point,
}

impl Anchor {
    pub fn new(name: impl Into<SmolStr>, x: f64, y: f64) -> Anchor {
        Anchor {
            name: name.into(),
            pos: Point::new(x, y),
        }
    }
}

impl GlyphInstance {
    pub fn new(name: impl Into<GlyphName>) -> GlyphInstance {
        GlyphInstance {
            name: name.into(),
            ..Default::default()
        }
    }

    /// No contours and no components. The advance doesn't count, so a
    /// space is empty.
    pub fn is_empty(&self) -> bool {
        self.contours.is_empty() && self.components.is_empty()
    }

    pub fn component_names(&self) -> impl Iterator<Item = &GlyphName> {
        self.components.iter().map(|c| &c.base)
    }

    /// Replace components with the contours they reference.
    ///
    /// Nested components are followed. A base lookup can't resolve is
    /// dropped with a warning; a component that refers back to itself is an
    /// error.
    pub fn decompose<F>(&self, lookup: F) -> Result<GlyphInstance, Error>
    where
        F: Fn(&GlyphName) -> Option<GlyphInstance>,
    {
        let mut contours = self.contours.clone();
        let mut stack = vec![self.name.clone()];
        for component in self.components.iter() {
            flatten_component(component, Affine::IDENTITY, &lookup, &mut stack, &mut contours)?;
        }
        Ok(GlyphInstance {
            contours,
            components: Vec::new(),
            ..self.clone()
        })
    }

    fn combine(
        &self,
        other: &Self,
        policy: FieldPolicy,
        op: impl Fn(f64, f64) -> f64,
    ) -> Result<Self, InterpolationError> {
        check_count("contours", self.contours.len(), other.contours.len())?;
        check_count("components", self.components.len(), other.components.len())?;

        let mut contours = Vec::with_capacity(self.contours.len());
        for (left, right) in self.contours.iter().zip(other.contours.iter()) {
            check_count("contour points", left.len(), right.len())?;
            let mut contour = Vec::with_capacity(left.len());
            for (l, r) in left.iter().zip(right.iter()) {
                if l.typ != r.typ {
                    return Err(InterpolationError::Mismatch {
                        what: "point types",
                        left: format!("{:?}", l.typ),
                        right: format!("{:?}", r.typ),
                    });
                }
                contour.push(ContourPoint {
                    pos: Point::new(op(l.pos.x, r.pos.x), op(l.pos.y, r.pos.y)),
                    typ: l.typ,
                });
            }
            contours.push(contour);
        }

        let mut components = Vec::with_capacity(self.components.len());
        for (l, r) in self.components.iter().zip(other.components.iter()) {
            if l.base != r.base {
                return Err(InterpolationError::Mismatch {
                    what: "component bases",
                    left: l.base.to_string(),
                    right: r.base.to_string(),
                });
            }
            let (lc, rc) = (l.transform.as_coeffs(), r.transform.as_coeffs());
            let mut coeffs = [0.0; 6];
            for (i, c) in coeffs.iter_mut().enumerate() {
                *c = op(lc[i], rc[i]);
            }
            components.push(Component {
                base: l.base.clone(),
                transform: Affine::new(coeffs),
            });
        }

        // anchors pair up by name, the ones without a partner fall away
        let anchors = self
            .anchors
            .iter()
            .filter_map(|l| {
                other.anchors.iter().find(|r| r.name == l.name).map(|r| Anchor {
                    name: l.name.clone(),
                    pos: Point::new(op(l.pos.x, r.pos.x), op(l.pos.y, r.pos.y)),
                })
            })
            .collect();

        Ok(GlyphInstance {
            name: self.name.clone(),
            width: op(self.width, other.width),
            height: policy.combine(self.height, other.height, &op),
            contours,
            components,
            anchors,
            codepoints: self.codepoints.clone(),
        })
    }

    fn map_points(&self, f: impl Fn(Point) -> Point) -> Self {
        GlyphInstance {
            contours: self
                .contours
                .iter()
                .map(|c| {
                    c.iter()
                        .map(|p| ContourPoint {
                            pos: f(p.pos),
                            typ: p.typ,
                        })
                        .collect()
                })
                .collect(),
            anchors: self
                .anchors
                .iter()
                .map(|a| Anchor {
                    name: a.name.clone(),
                    pos: f(a.pos),
                })
                .collect(),
            ..self.clone()
        }
    }
}

fn check_count(what: &'static str, left: usize, right: usize) -> Result<(), InterpolationError> {
    if left != right {
        return Err(InterpolationError::CountMismatch { what, left, right });
    }
    Ok(())
}

fn flatten_component<F>(
    component: &Component,
    parent: Affine,
    lookup: &F,
    stack: &mut Vec<GlyphName>,
    out: &mut Vec<Contour>,
) -> Result<(), Error>
where
    F: Fn(&GlyphName) -> Option<GlyphInstance>,
{
    if stack.contains(&component.base) {
        return Err(Error::ComponentCycle(component.base.clone()));
    }
    let Some(base) = lookup(&component.base) else {
        warn!(
            "Component '{}' of '{}' is missing, dropped while decomposing",
            component.base, stack[0]
        );
        return Ok(());
    };
    let transform = parent * component.transform;
    out.extend(base.contours.iter().map(|contour| {
        contour
            .iter()
            .map(|p| ContourPoint {
                pos: transform * p.pos,
                typ: p.typ,
            })
            .collect::<Contour>()
    }));
    stack.push(component.base.clone());
    for nested in base.components.iter() {
        flatten_component(nested, transform, lookup, stack, out)?;
    }
    stack.pop();
    Ok(())
}

impl Interpolable for GlyphInstance {
    fn add(&self, other: &Self, policy: FieldPolicy) -> Result<Self, InterpolationError> {
        self.combine(other, policy, |l, r| l + r)
    }

    fn sub(&self, other: &Self, policy: FieldPolicy) -> Result<Self, InterpolationError> {
        self.combine(other, policy, |l, r| l - r)
    }

    /// x scales horizontal measures, y vertical ones.
    ///
    /// Transform coefficients follow the basis vector they belong to: xx, xy
    /// and dx scale by x; yx, yy and dy by y.
    fn scale(&self, factor: Scale) -> Self {
        let mut scaled = self.map_points(|p| Point::new(p.x * factor.x, p.y * factor.y));
        scaled.width = self.width * factor.x;
        scaled.height = self.height.map(|h| h * factor.y);
        for component in scaled.components.iter_mut() {
            let [a, b, c, d, e, f] = component.transform.as_coeffs();
            component.transform = Affine::new([
                a * factor.x,
                b * factor.x,
                c * factor.y,
                d * factor.y,
                e * factor.x,
                f * factor.y,
            ]);
        }
        scaled
    }

    /// Coordinates, advances and component offsets round; component
    /// scale factors are left alone.
    fn round(&self) -> Self {
        let mut rounded =
            self.map_points(|p| Point::new(p.x.round_ties_even(), p.y.round_ties_even()));
        rounded.width = self.width.round_ties_even();
        rounded.height = self.height.map(f64::round_ties_even);
        for component in rounded.components.iter_mut() {
            let [a, b, c, d, e, f] = component.transform.as_coeffs();
            component.transform =
                Affine::new([a, b, c, d, e.round_ties_even(), f.round_ties_even()]);
        }
        rounded
    }
}

#[cfg(test)]
mod tests {
    use fontvary::interpolable::{FieldPolicy, Interpolable, InterpolationError, Scale};
    use kurbo::{Affine, Point};
    use pretty_assertions::assert_eq;

    use crate::error::Error;

    use super::*;

    fn square(name: &str, size: f64) -> GlyphInstance {
        GlyphInstance {
            width: size + 20.0,
            contours: vec![vec![
                ContourPoint::new(0.0, 0.0, PointType::Line),
                ContourPoint::new(size, 0.0, PointType::Line),
                ContourPoint::new(size, size, PointType::Line),
                ContourPoint::new(0.0, size, PointType::Line),
            ]],
            anchors: vec![Anchor::new("top", size / 2.0, size)],
            ..GlyphInstance::new(name)
        }
    }

    fn points(glyph: &GlyphInstance) -> Vec<(f64, f64)> {
        glyph
            .contours
            .iter()
            .flat_map(|c| c.iter().map(|p| (p.pos.x, p.pos.y)))
            .collect()
    }

    #[test]
    fn space_is_empty() {
        let space = GlyphInstance {
            width: 250.0,
            ..GlyphInstance::new("space")
        };
        assert!(space.is_empty());
        assert!(!square("a", 100.0).is_empty());
        let composite = GlyphInstance {
            components: vec![Component::new("a", Affine::IDENTITY)],
            ..GlyphInstance::new("b")
        };
        assert!(!composite.is_empty());
    }

    #[test]
    fn halfway_between_squares() {
        let small = square("a", 100.0);
        let big = square("a", 200.0);
        let halfway = small
            .add(
                &big.sub(&small, FieldPolicy::KeepDefined)
                    .unwrap()
                    .scale(Scale::uniform(0.5)),
                FieldPolicy::KeepDefined,
            )
            .unwrap();
        assert_eq!(170.0, halfway.width);
        assert_eq!(
            vec![(0.0, 0.0), (150.0, 0.0), (150.0, 150.0), (0.0, 150.0)],
            points(&halfway)
        );
        assert_eq!(vec![Anchor::new("top", 75.0, 150.0)], halfway.anchors);
    }

    #[test]
    fn anisotropic_scale_splits_directions() {
        let mut glyph = square("a", 100.0);
        glyph.height = Some(1000.0);
        glyph.components = vec![Component::new("b", Affine::new([2.0, 0.5, 0.25, 3.0, 10.0, 20.0]))];
        let h = glyph.scale(Scale::HORIZONTAL);
        assert_eq!(
            vec![(0.0, 0.0), (100.0, 0.0), (100.0, 0.0), (0.0, 0.0)],
            points(&h)
        );
        assert_eq!(120.0, h.width);
        assert_eq!(Some(0.0), h.height);
        assert_eq!(
            [2.0, 0.5, 0.0, 0.0, 10.0, 0.0],
            h.components[0].transform.as_coeffs()
        );
        let v = glyph.scale(Scale::VERTICAL);
        assert_eq!(0.0, v.width);
        assert_eq!(Some(1000.0), v.height);
        assert_eq!(
            [0.0, 0.0, 0.25, 3.0, 0.0, 20.0],
            v.components[0].transform.as_coeffs()
        );
    }

    #[test]
    fn point_count_mismatch_is_an_alignment_error() {
        let mut odd = square("a", 100.0);
        odd.contours[0].pop();
        assert_eq!(
            Err(InterpolationError::CountMismatch {
                what: "contour points",
                left: 4,
                right: 3
            }),
            square("a", 100.0).sub(&odd, FieldPolicy::KeepDefined)
        );
    }

    #[test]
    fn point_type_mismatch_is_an_alignment_error() {
        let mut curvy = square("a", 100.0);
        curvy.contours[0][1].typ = PointType::Curve;
        assert!(matches!(
            square("a", 100.0).add(&curvy, FieldPolicy::KeepDefined),
            Err(InterpolationError::Mismatch { what: "point types", .. })
        ));
    }

    #[test]
    fn component_base_mismatch_is_an_alignment_error() {
        let a = GlyphInstance {
            components: vec![Component::new("a", Affine::IDENTITY)],
            ..GlyphInstance::new("c")
        };
        let b = GlyphInstance {
            components: vec![Component::new("b", Affine::IDENTITY)],
            ..GlyphInstance::new("c")
        };
        assert!(a.sub(&b, FieldPolicy::KeepDefined).is_err());
    }

    #[test]
    fn unmatched_anchors_fall_away() {
        let a = square("a", 100.0);
        let mut b = square("a", 100.0);
        b.anchors = vec![Anchor::new("bottom", 50.0, 0.0)];
        assert!(a
            .add(&b, FieldPolicy::KeepDefined)
            .unwrap()
            .anchors
            .is_empty());
    }

    #[test]
    fn height_follows_field_policy() {
        let mut tall = square("a", 100.0);
        tall.height = Some(800.0);
        let plain = square("a", 100.0);
        assert_eq!(
            Some(800.0),
            tall.sub(&plain, FieldPolicy::KeepDefined).unwrap().height
        );
        assert_eq!(
            None,
            tall.sub(&plain, FieldPolicy::UndefinedWins).unwrap().height
        );
    }

    #[test]
    fn codepoints_are_not_interpolated() {
        let mut a = square("a", 100.0);
        a.codepoints = vec![0x61];
        let b = square("a", 200.0);
        assert_eq!(
            vec![0x61],
            a.add(&b, FieldPolicy::KeepDefined).unwrap().codepoints
        );
    }

    #[test]
    fn round_ties_to_even() {
        let mut glyph = square("a", 100.5);
        glyph.components = vec![Component::new("b", Affine::new([1.5, 0.0, 0.0, 1.0, 2.5, 3.5]))];
        let rounded = glyph.round();
        assert_eq!(120.0, rounded.width);
        assert_eq!(
            vec![(0.0, 0.0), (100.0, 0.0), (100.0, 100.0), (0.0, 100.0)],
            points(&rounded)
        );
        assert_eq!(
            [1.5, 0.0, 0.0, 1.0, 2.0, 4.0],
            rounded.components[0].transform.as_coeffs()
        );
    }

    #[test]
    fn decompose_nested_components() {
        let base = square("a", 10.0);
        let middle = GlyphInstance {
            components: vec![Component::new("a", Affine::translate((100.0, 0.0)))],
            ..GlyphInstance::new("b")
        };
        let top = GlyphInstance {
            contours: vec![vec![ContourPoint::new(1.0, 1.0, PointType::Move)]],
            components: vec![Component::new("b", Affine::scale(2.0))],
            ..GlyphInstance::new("c")
        };
        let lookup = |name: &GlyphName| match name.as_str() {
            "a" => Some(base.clone()),
            "b" => Some(middle.clone()),
            _ => None,
        };
        let flat = top.decompose(lookup).unwrap();
        assert!(flat.components.is_empty());
        assert_eq!(
            vec![
                (1.0, 1.0),
                (200.0, 0.0),
                (220.0, 0.0),
                (220.0, 20.0),
                (200.0, 20.0)
            ],
            points(&flat)
        );
    }

    #[test]
    fn decompose_drops_missing_bases() {
        let glyph = GlyphInstance {
            components: vec![Component::new("nope", Affine::IDENTITY)],
            ..GlyphInstance::new("c")
        };
        let flat = glyph.decompose(|_| None).unwrap();
        assert!(flat.is_empty());
    }

    #[test]
    fn decompose_detects_cycles() {
        let a = GlyphInstance {
            components: vec![Component::new("b", Affine::IDENTITY)],
            ..GlyphInstance::new("a")
        };
        let b = GlyphInstance {
            components: vec![Component::new("a", Affine::IDENTITY)],
            ..GlyphInstance::new("b")
        };
        let lookup = |name: &GlyphName| match name.as_str() {
            "a" => Some(a.clone()),
            "b" => Some(b.clone()),
            _ => None,
        };
        assert!(matches!(
            a.decompose(lookup),
            Err(Error::ComponentCycle(name)) if name == GlyphName::new("a")
        ));
    }

    #[test]
    fn transform_applies_to_points() {
        let t = Affine::translate((100.0, 0.0)) * Affine::scale(2.0);
        assert_eq!(Point::new(120.0, 20.0), t * Point::new(10.0, 10.0));
    }
}
