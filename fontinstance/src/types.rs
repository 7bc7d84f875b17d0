//! Names shared by sources, models and instances.

use std::{borrow::Borrow, fmt};

use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

/// The name of a glyph, as it appears in sources, kerning and groups.
///
/// Ordering is by the raw string, which is what sorted outputs such as
/// [`crate::instancer::Instancer::glyphs_in_cache`] rely on.
#[derive(Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GlyphName(SmolStr);

impl GlyphName {
    pub fn new(name: impl AsRef<str>) -> Self {
        GlyphName(SmolStr::new(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Unwraps to the interned string used as a cache entity.
    pub fn into_inner(self) -> SmolStr {
        self.0
    }
}

macro_rules! glyph_name_from {
    ($($ty:ty),*) => {
        $(impl From<$ty> for GlyphName {
            fn from(name: $ty) -> Self {
                GlyphName(name.into())
            }
        })*
    };
}

glyph_name_from!(&str, String, SmolStr);

impl fmt::Display for GlyphName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// glyph names show up in a lot of problem lists, quotes just add noise
impl fmt::Debug for GlyphName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl AsRef<str> for GlyphName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for GlyphName {
    fn borrow(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use pretty_assertions::assert_eq;

    use super::GlyphName;

    #[test]
    fn sets_can_be_queried_by_str() {
        let names: BTreeSet<GlyphName> = ["b", "a"].into_iter().map(GlyphName::from).collect();
        assert!(names.contains("a"));
        assert_eq!(vec!["a", "b"], names.iter().map(|n| n.as_str()).collect::<Vec<_>>());
    }

    #[test]
    fn serializes_as_a_bare_string() {
        let yaml = serde_yaml::to_string(&GlyphName::new("A.alt")).unwrap();
        assert_eq!("A.alt\n", yaml);
    }
}
