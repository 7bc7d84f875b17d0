use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use write_fonts::types::Tag;

use crate::{
    axes::{ContinuousAxis, DiscreteAxis},
    error::Error,
};

#[derive(Serialize, Deserialize, Debug, Clone)]
pub(crate) struct ContinuousAxisSerdeRepr {
    name: SmolStr,
    tag: Tag,
    min: f64,
    default: f64,
    max: f64,
    #[serde(default)]
    hidden: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    map: Vec<(f64, f64)>,
}

impl TryFrom<ContinuousAxisSerdeRepr> for ContinuousAxis {
    type Error = Error;

    fn try_from(from: ContinuousAxisSerdeRepr) -> Result<Self, Self::Error> {
        let mut axis = ContinuousAxis::new_mapped(
            from.name,
            from.tag,
            from.min,
            from.default,
            from.max,
            from.map,
        )?;
        axis.hidden = from.hidden;
        Ok(axis)
    }
}

impl From<ContinuousAxis> for ContinuousAxisSerdeRepr {
    fn from(from: ContinuousAxis) -> Self {
        ContinuousAxisSerdeRepr {
            name: from.name,
            tag: from.tag,
            min: from.min.to_f64(),
            default: from.default.to_f64(),
            max: from.max.to_f64(),
            hidden: from.hidden,
            map: from
                .map
                .into_iter()
                .map(|(u, d)| (u.to_f64(), d.to_f64()))
                .collect(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub(crate) struct DiscreteAxisSerdeRepr {
    name: SmolStr,
    tag: Tag,
    values: Vec<f64>,
    default: f64,
    #[serde(default)]
    hidden: bool,
}

impl TryFrom<DiscreteAxisSerdeRepr> for DiscreteAxis {
    type Error = Error;

    fn try_from(from: DiscreteAxisSerdeRepr) -> Result<Self, Self::Error> {
        let mut axis = DiscreteAxis::new(from.name, from.tag, from.values, from.default)?;
        axis.hidden = from.hidden;
        Ok(axis)
    }
}

impl From<DiscreteAxis> for DiscreteAxisSerdeRepr {
    fn from(from: DiscreteAxis) -> Self {
        DiscreteAxisSerdeRepr {
            name: from.name,
            tag: from.tag,
            values: from.values.into_iter().map(|v| v.into_inner()).collect(),
            default: from.default.into_inner(),
            hidden: from.hidden,
        }
    }
}
