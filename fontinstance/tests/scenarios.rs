//! Whole-engine behaviour: documents in, instances out.

use std::{
    collections::{BTreeSet, HashMap},
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
};

use fontinstance::{
    cache::Cache,
    config::Config,
    designspace::{DesignSpaceDocument, InstanceDescriptor, SourceDescriptor},
    font::{FontSet, MemoryFont, SourceFont},
    glyph::{Component, ContourPoint, GlyphInstance, PointType},
    instancer::{Instancer, MaterializeOptions},
    kerning::{Groups, Kerning},
    lib_values::Lib,
    metrics::{FontInfo, MetricField},
    types::GlyphName,
    Error, Problem, ProblemKind,
};
use fontvary::{
    axes::{aniso_location, Axes, ContinuousAxis, DiscreteAxis},
    coords::{DesignAnisoLocation, DesignLocation, Position},
    interpolable::FieldPolicy,
    variations::VariationModelError,
};
use kurbo::Affine;
use pretty_assertions::assert_eq;
use rstest::rstest;
use write_fonts::types::Tag;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn advance(name: &str, width: f64) -> GlyphInstance {
    GlyphInstance {
        width,
        ..GlyphInstance::new(name)
    }
}

fn bar(name: &str, x: f64, y: f64) -> GlyphInstance {
    GlyphInstance {
        width: x + 50.0,
        contours: vec![vec![
            ContourPoint::new(0.0, 0.0, PointType::Line),
            ContourPoint::new(x, 0.0, PointType::Line),
            ContourPoint::new(x, y, PointType::Line),
        ]],
        ..GlyphInstance::new(name)
    }
}

fn at(pos: &[(&str, f64)]) -> DesignAnisoLocation {
    DesignLocation::for_pos(pos).into()
}

fn weight_axis() -> ContinuousAxis {
    ContinuousAxis::new("weight", Tag::new(b"wght"), 0.0, 0.0, 1000.0).unwrap()
}

/// One continuous weight axis, a font per (name, weight, glyph).
fn weight_space(masters: Vec<(&str, f64, GlyphInstance)>, config: Config) -> Instancer {
    let mut doc = DesignSpaceDocument::new(Axes::new(vec![weight_axis().into()]).unwrap());
    let mut fonts = FontSet::new();
    for (name, weight, glyph) in masters {
        doc.sources.push(SourceDescriptor::new(
            name,
            DesignLocation::for_pos(&[("weight", weight)]),
        ));
        fonts.insert(name, MemoryFont::new().with_glyph(glyph));
    }
    Instancer::new(doc, fonts, config)
}

fn light_bold(config: Config) -> Instancer {
    weight_space(
        vec![
            ("Light", 0.0, advance("x", 10.0)),
            ("Bold", 1000.0, advance("x", 20.0)),
        ],
        config,
    )
}

#[rstest]
#[case(false, 500.0, 15.0)]
#[case(false, 1500.0, 20.0)]
#[case(false, -500.0, 10.0)]
#[case(true, 500.0, 15.0)]
#[case(true, 1500.0, 25.0)]
#[case(true, -500.0, 5.0)]
fn two_masters(#[case] extrapolate: bool, #[case] weight: f64, #[case] expected: f64) {
    init_logging();
    let instancer = light_bold(Config {
        extrapolate,
        ..Default::default()
    });
    let glyph = instancer
        .make_one_glyph(&"x".into(), &at(&[("weight", weight)]), false, false)
        .unwrap();
    assert_eq!(expected, glyph.width);
}

#[test]
fn exact_at_every_master() {
    let weight = weight_axis();
    let width = ContinuousAxis::new("width", Tag::new(b"wdth"), 50.0, 100.0, 200.0).unwrap();
    let mut doc = DesignSpaceDocument::new(Axes::new(vec![weight.into(), width.into()]).unwrap());
    let mut fonts = FontSet::new();
    let masters = [
        ("Regular", 0.0, 100.0, bar("i", 100.0, 700.0)),
        ("Bold", 1000.0, 100.0, bar("i", 230.0, 710.0)),
        ("Condensed", 0.0, 50.0, bar("i", 70.0, 690.0)),
        ("Wide", 0.0, 200.0, bar("i", 160.0, 700.0)),
        ("BoldWide", 1000.0, 200.0, bar("i", 330.0, 720.0)),
        ("Medium", 500.0, 100.0, bar("i", 170.0, 703.0)),
    ];
    for (name, wght, wdth, glyph) in masters.iter() {
        doc.sources.push(SourceDescriptor::new(
            *name,
            DesignLocation::for_pos(&[("weight", *wght), ("width", *wdth)]),
        ));
        fonts.insert(*name, MemoryFont::new().with_glyph(glyph.clone()));
    }
    let instancer = Instancer::new(doc, fonts, Config::default());
    for (name, wght, wdth, glyph) in masters.iter() {
        let actual = instancer
            .make_one_glyph(
                &"i".into(),
                &at(&[("weight", *wght), ("width", *wdth)]),
                false,
                false,
            )
            .unwrap();
        assert_eq!(glyph, actual.as_ref(), "{name}");
    }
}

#[test]
fn equal_halves_match_isotropic() {
    let instancer = weight_space(
        vec![
            ("Light", 0.0, bar("l", 80.0, 700.0)),
            ("Bold", 1000.0, bar("l", 200.0, 740.0)),
        ],
        Config::default(),
    );
    let iso = instancer
        .make_one_glyph(&"l".into(), &at(&[("weight", 250.0)]), false, false)
        .unwrap();
    let aniso = instancer
        .make_one_glyph(
            &"l".into(),
            &aniso_location(&[("weight", Position::aniso(250.0, 250.0))]),
            false,
            false,
        )
        .unwrap();
    assert_eq!(iso, aniso);
    assert_eq!(110.0, aniso.contours[0][1].pos.x);
}

#[test]
fn bent_axis_interpolates_in_design_space() {
    let weight = ContinuousAxis::new_mapped(
        "weight",
        Tag::new(b"wght"),
        100.0,
        400.0,
        900.0,
        vec![(100.0, 20.0), (400.0, 80.0), (900.0, 200.0)],
    )
    .unwrap();
    let mut doc = DesignSpaceDocument::new(Axes::new(vec![weight.into()]).unwrap());
    let mut fonts = FontSet::new();
    for (name, design, width) in [("Thin", 20.0, 300.0), ("Regular", 80.0, 400.0), ("Black", 200.0, 600.0)] {
        doc.sources.push(SourceDescriptor::new(
            name,
            DesignLocation::for_pos(&[("weight", design)]),
        ));
        fonts.insert(name, MemoryFont::new().with_glyph(advance("n", width)));
    }
    let instancer = Instancer::new(doc, fonts, Config::default());

    assert_eq!(80.0, instancer.axes().map_forward("weight", 400.0));
    assert_eq!(650.0, instancer.axes().map_backward("weight", 140.0));
    assert_eq!(
        Some("Regular"),
        instancer.find_default(None).map(|s| s.name.as_str())
    );
    let glyph = instancer
        .make_one_glyph(&"n".into(), &at(&[("weight", 140.0)]), false, false)
        .unwrap();
    assert_eq!(500.0, glyph.width);
    // no location at all means the bent default
    let glyph = instancer
        .make_one_glyph(&"n".into(), &DesignAnisoLocation::new(), false, false)
        .unwrap();
    assert_eq!(400.0, glyph.width);
}

#[test]
fn repeated_breakpoint_keeps_the_last_pair() {
    let weight = ContinuousAxis::new_mapped(
        "weight",
        Tag::new(b"wght"),
        0.0,
        0.0,
        1000.0,
        vec![(0.0, 0.0), (1000.0, 0.0), (1000.0, 1000.0)],
    )
    .unwrap();
    let mut doc = DesignSpaceDocument::new(Axes::new(vec![weight.into()]).unwrap());
    let mut fonts = FontSet::new();
    for (name, design, width) in [("Light", 0.0, 10.0), ("Bold", 1000.0, 20.0)] {
        doc.sources.push(SourceDescriptor::new(
            name,
            DesignLocation::for_pos(&[("weight", design)]),
        ));
        fonts.insert(name, MemoryFont::new().with_glyph(advance("n", width)));
    }
    let instancer = Instancer::new(doc, fonts, Config::default());

    assert_eq!(1000.0, instancer.axes().map_forward("weight", 1000.0));
    assert_eq!(1000.0, instancer.axes().map_backward("weight", 0.0));
    assert_eq!(
        Some("Light"),
        instancer.find_default(None).map(|s| s.name.as_str())
    );
    let bent_default = instancer
        .make_one_glyph(&"n".into(), &DesignAnisoLocation::new(), false, false)
        .unwrap();
    assert_eq!(10.0, bent_default.width);
    let glyph = instancer
        .make_one_glyph(&"n".into(), &at(&[("weight", 500.0)]), false, false)
        .unwrap();
    assert_eq!(15.0, glyph.width);
}

#[test]
fn empty_default_keeps_instances_empty() {
    let instancer = weight_space(
        vec![
            ("Light", 0.0, advance("space", 250.0)),
            ("Bold", 1000.0, bar("space", 100.0, 100.0)),
        ],
        Config::default(),
    );
    let model = instancer.glyph_model(&"space".into(), None, false).unwrap();
    assert_eq!(1, model.model.num_masters());
    let glyph = instancer
        .make_one_glyph(&"space".into(), &at(&[("weight", 900.0)]), false, false)
        .unwrap();
    assert!(glyph.is_empty());
    assert_eq!(250.0, glyph.width);
}

#[test]
fn discrete_values_never_mix() {
    let spacing = DiscreteAxis::new("spacing", Tag::new(b"SPAC"), vec![1.0, 2.0, 3.0], 1.0).unwrap();
    let mut doc =
        DesignSpaceDocument::new(Axes::new(vec![weight_axis().into(), spacing.into()]).unwrap());
    let mut fonts = FontSet::new();
    for (name, weight, spacing, width) in [
        ("Light1", 0.0, 1.0, 100.0),
        ("Bold1", 1000.0, 1.0, 200.0),
        ("Light2", 0.0, 2.0, 1000.0),
        ("Bold2", 1000.0, 2.0, 2000.0),
    ] {
        doc.sources.push(SourceDescriptor::new(
            name,
            DesignLocation::for_pos(&[("weight", weight), ("spacing", spacing)]),
        ));
        fonts.insert(name, MemoryFont::new().with_glyph(advance("m", width)));
    }
    let instancer = Instancer::new(doc, fonts, Config::default());

    let one = instancer
        .make_one_glyph(
            &"m".into(),
            &at(&[("weight", 500.0), ("spacing", 1.0)]),
            false,
            false,
        )
        .unwrap();
    assert_eq!(150.0, one.width);
    let two = instancer
        .make_one_glyph(
            &"m".into(),
            &at(&[("weight", 500.0), ("spacing", 2.0)]),
            false,
            false,
        )
        .unwrap();
    assert_eq!(1500.0, two.width);

    // nothing lives at spacing 3
    let three = instancer.make_one_glyph(
        &"m".into(),
        &at(&[("weight", 500.0), ("spacing", 3.0)]),
        false,
        false,
    );
    assert!(matches!(three, Err(Error::NoMasters { .. })));
    let result = instancer.make_instance(
        &InstanceDescriptor::new("x", at(&[("spacing", 3.0)])),
        &MaterializeOptions::default(),
    );
    assert!(matches!(result, Err(Error::NoDefaultSource(Some(..)))));
}

#[test]
fn no_master_at_default() {
    let instancer = weight_space(
        vec![
            ("Regular", 500.0, bar("x", 10.0, 10.0)),
            ("Bold", 1000.0, bar("x", 20.0, 20.0)),
        ],
        Config::default(),
    );
    let result = instancer.make_one_glyph(&"x".into(), &at(&[("weight", 700.0)]), false, false);
    assert!(matches!(
        result,
        Err(Error::Model {
            source: VariationModelError::MissingDefault,
            ..
        })
    ));
    assert!(matches!(
        instancer.make_instance(
            &InstanceDescriptor::new("x", at(&[("weight", 700.0)])),
            &MaterializeOptions::default()
        ),
        Err(Error::NoDefaultSource(None))
    ));
}

#[test]
fn missing_font_is_reported_with_the_instance() {
    let mut doc = DesignSpaceDocument::new(Axes::new(vec![weight_axis().into()]).unwrap());
    for (name, weight) in [("Light", 0.0), ("Bold", 1000.0)] {
        doc.sources.push(SourceDescriptor::new(
            name,
            DesignLocation::for_pos(&[("weight", weight)]),
        ));
    }
    doc.instances.push(InstanceDescriptor::new(
        "Medium",
        at(&[("weight", 500.0)]),
    ));
    let fonts = FontSet::new().with(
        "Light",
        MemoryFont::new()
            .with_glyph(advance("a", 10.0))
            .with_glyph(advance("b", 20.0)),
    );
    let instancer = Instancer::new(doc, fonts, Config::default());
    let generated = instancer.generate_instances(&MaterializeOptions::default());
    assert_eq!(1, generated.len());
    let output = generated[0].output.as_ref().unwrap();
    assert_eq!(2, output.font.glyphs.len());
    // reported once, not once per glyph
    assert_eq!(
        1,
        output
            .problems
            .iter()
            .filter(|p| p.kind == ProblemKind::MissingFont)
            .count()
    );
}

#[test]
fn glyph_missing_from_the_default_is_reported() {
    init_logging();
    let mut doc = DesignSpaceDocument::new(Axes::new(vec![weight_axis().into()]).unwrap());
    let mut fonts = FontSet::new();
    for (name, weight, font) in [
        ("Regular", 0.0, MemoryFont::new().with_glyph(advance("o", 500.0))),
        (
            "Bold",
            1000.0,
            MemoryFont::new()
                .with_glyph(advance("o", 600.0))
                .with_glyph(advance("x", 700.0)),
        ),
    ] {
        doc.sources.push(SourceDescriptor::new(
            name,
            DesignLocation::for_pos(&[("weight", weight)]),
        ));
        fonts.insert(name, font);
    }
    let instancer = Instancer::new(doc, fonts, Config::default());
    let output = instancer
        .make_instance(
            &InstanceDescriptor::new("Medium", at(&[("weight", 500.0)])),
            &MaterializeOptions::default(),
        )
        .unwrap();

    assert_eq!(550.0, output.font.glyphs[&GlyphName::new("o")].width);
    assert!(!output.font.glyphs.contains_key(&GlyphName::new("x")));
    assert!(output.problems.contains(&Problem::new(
        ProblemKind::MissingGlyph,
        "'x' is not in the font of source 'Regular'"
    )));
    assert!(output
        .problems
        .iter()
        .any(|p| p.kind == ProblemKind::ModelFailure));
}

#[rstest]
#[case(FieldPolicy::KeepDefined, true)]
#[case(FieldPolicy::UndefinedWins, false)]
fn info_fields_follow_the_field_policy(#[case] field_policy: FieldPolicy, #[case] x_height: bool) {
    let mut regular = MemoryFont::new();
    regular
        .info
        .metrics
        .set(MetricField::XHeight, 500.0)
        .set(MetricField::CapHeight, 700.0);
    let mut bold = MemoryFont::new();
    bold.info.metrics.set(MetricField::CapHeight, 720.0);

    let mut doc = DesignSpaceDocument::new(Axes::new(vec![weight_axis().into()]).unwrap());
    let mut fonts = FontSet::new();
    for (name, weight, font) in [("Regular", 0.0, regular), ("Bold", 1000.0, bold)] {
        doc.sources.push(SourceDescriptor::new(
            name,
            DesignLocation::for_pos(&[("weight", weight)]),
        ));
        fonts.insert(name, font);
    }
    let instancer = Instancer::new(
        doc,
        fonts,
        Config {
            field_policy,
            ..Default::default()
        },
    );
    let info = instancer.make_one_info(&at(&[("weight", 500.0)])).unwrap();
    assert_eq!(Some(710.0), info.get(MetricField::CapHeight));
    assert_eq!(x_height, info.get(MetricField::XHeight).is_some());
}

/// Counts glyph lookups so we can tell whether anything was recomputed.
#[derive(Debug)]
struct CountingFont {
    inner: MemoryFont,
    lookups: Arc<AtomicUsize>,
}

impl SourceFont for CountingFont {
    fn default_layer_name(&self) -> &str {
        self.inner.default_layer_name()
    }

    fn has_layer(&self, layer: &str) -> bool {
        self.inner.has_layer(layer)
    }

    fn glyph(&self, layer: Option<&str>, name: &GlyphName) -> Option<&GlyphInstance> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        self.inner.glyph(layer, name)
    }

    fn glyph_names(&self) -> Vec<GlyphName> {
        self.inner.glyph_names()
    }

    fn info(&self) -> &FontInfo {
        self.inner.info()
    }

    fn kerning(&self) -> &Kerning {
        self.inner.kerning()
    }

    fn groups(&self) -> &Groups {
        self.inner.groups()
    }

    fn lib(&self) -> &Lib {
        self.inner.lib()
    }

    fn features(&self) -> &str {
        self.inner.features()
    }

    fn reverse_component_map(&self) -> HashMap<GlyphName, BTreeSet<GlyphName>> {
        self.inner.reverse_component_map()
    }
}

fn counting_instancer(cache: Arc<Cache>) -> (Instancer, Arc<AtomicUsize>) {
    let lookups = Arc::new(AtomicUsize::new(0));
    let mut doc = DesignSpaceDocument::new(Axes::new(vec![weight_axis().into()]).unwrap());
    let mut fonts = FontSet::new();
    for (name, weight, width) in [("Light", 0.0, 10.0), ("Bold", 1000.0, 20.0)] {
        doc.sources.push(SourceDescriptor::new(
            name,
            DesignLocation::for_pos(&[("weight", weight)]),
        ));
        fonts.insert(
            name,
            CountingFont {
                inner: MemoryFont::new()
                    .with_glyph(advance("x", width))
                    .with_glyph(advance("y", width)),
                lookups: lookups.clone(),
            },
        );
    }
    (
        Instancer::with_cache(doc, fonts, Config::default(), cache),
        lookups,
    )
}

#[test]
fn repeat_calls_hit_the_cache() {
    let (instancer, lookups) = counting_instancer(Default::default());
    let x = GlyphName::new("x");
    let location = at(&[("weight", 500.0)]);

    let first = instancer.make_one_glyph(&x, &location, false, false).unwrap();
    let after_first = lookups.load(Ordering::SeqCst);
    assert!(after_first > 0);
    let second = instancer.make_one_glyph(&x, &location, false, false).unwrap();
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(after_first, lookups.load(Ordering::SeqCst));

    // a new location reuses the model
    let other = instancer
        .make_one_glyph(&x, &at(&[("weight", 750.0)]), false, false)
        .unwrap();
    assert_eq!(17.5, other.width);
    assert_eq!(after_first, lookups.load(Ordering::SeqCst));
    assert_eq!(vec![x.clone()], instancer.glyphs_in_cache());

    instancer.glyph_changed(&x, false);
    assert!(instancer.glyphs_in_cache().is_empty());
    let third = instancer.make_one_glyph(&x, &location, false, false).unwrap();
    assert!(lookups.load(Ordering::SeqCst) > after_first);
    assert_eq!(first, third);
}

#[test]
fn instancers_do_not_share_entries() {
    let cache = Arc::new(Cache::new());
    let (one, one_lookups) = counting_instancer(cache.clone());
    let (two, two_lookups) = counting_instancer(cache.clone());
    let location = at(&[("weight", 500.0)]);
    one.make_one_glyph(&"x".into(), &location, false, false)
        .unwrap();
    two.make_one_glyph(&"x".into(), &location, false, false)
        .unwrap();
    assert!(one_lookups.load(Ordering::SeqCst) > 0);
    assert!(two_lookups.load(Ordering::SeqCst) > 0);

    let before = cache.len();
    assert!(one.changed() > 0);
    assert!(cache.len() < before);
    assert_eq!(vec![GlyphName::new("x")], two.glyphs_in_cache());
}

#[test]
fn updating_a_font_drops_stale_results() {
    let mut instancer = light_bold(Config::default());
    let location = at(&[("weight", 500.0)]);
    let before = instancer
        .make_one_glyph(&"x".into(), &location, false, false)
        .unwrap();
    assert_eq!(15.0, before.width);
    instancer.update_font("Bold", MemoryFont::new().with_glyph(advance("x", 40.0)));
    let after = instancer
        .make_one_glyph(&"x".into(), &location, false, false)
        .unwrap();
    assert_eq!(25.0, after.width);
}

#[test]
fn glyph_changed_reaches_composites_only_when_asked() {
    let lookups = Arc::new(AtomicUsize::new(0));
    let mut doc = DesignSpaceDocument::new(Axes::new(vec![weight_axis().into()]).unwrap());
    let mut fonts = FontSet::new();
    for (name, weight, x) in [("Light", 0.0, 40.0), ("Bold", 1000.0, 80.0)] {
        doc.sources.push(SourceDescriptor::new(
            name,
            DesignLocation::for_pos(&[("weight", weight)]),
        ));
        let composite = GlyphInstance {
            width: x + 100.0,
            components: vec![Component::new("a", Affine::translate((10.0, 0.0)))],
            ..GlyphInstance::new("b")
        };
        fonts.insert(
            name,
            CountingFont {
                inner: MemoryFont::new()
                    .with_glyph(bar("a", x, 500.0))
                    .with_glyph(composite),
                lookups: lookups.clone(),
            },
        );
    }
    let instancer = Instancer::new(doc, fonts, Config::default());
    let (a, b) = (GlyphName::new("a"), GlyphName::new("b"));
    let location = at(&[("weight", 500.0)]);
    let make = |name: &GlyphName| {
        instancer
            .make_one_glyph(name, &location, false, false)
            .unwrap()
    };

    make(&a);
    make(&b);
    assert_eq!(vec![a.clone(), b.clone()], instancer.glyphs_in_cache());
    assert_eq!(BTreeSet::from([b.clone()]), instancer.glyph_dependencies(&a));

    assert!(instancer.glyph_changed(&a, false) > 0);
    assert_eq!(vec![b.clone()], instancer.glyphs_in_cache());

    make(&a);
    assert!(instancer.glyph_changed(&a, true) > 0);
    assert!(instancer.glyphs_in_cache().is_empty());

    let before = lookups.load(Ordering::SeqCst);
    let composite = make(&b);
    assert!(lookups.load(Ordering::SeqCst) > before);
    assert_eq!(160.0, composite.width);
}
