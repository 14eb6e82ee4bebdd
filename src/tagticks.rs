///////////////////////////////////////
// The tactics to handle OSM tagging //
///////////////////////////////////////

use csscolorparser::parse;
use serde::Serialize;
use std::collections::BTreeMap;

use crate::defects::{DefectKind, Diagnostics};
use crate::kernel_in::OsmMap;

// This constants may come from a (3D-)render schema
pub static LEVEL_HEIGHT: f64 = 3.0;
pub static DEFAULT_WALL_HEIGHT: f64 = 2.0 * LEVEL_HEIGHT; // two floors with each 3 meters
static FEET: f64 = 0.3048;

pub static NO: &str = "no";

pub type RenderColor = [f32; 4];

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RoofShape {
    Flat,
    Skillion,
    Gabled,
    Hipped,
    Pyramidal,
    Dome,
    Onion,
    #[serde(untagged)]
    Other(String),
}

/// The semantic attributes of a building, derived once from its tags
#[derive(Clone, Debug, PartialEq)]
pub struct Attributes {
    /// Top of the walls above ground, meters
    pub height: f64,
    /// Bottom of the walls above ground, meters
    pub min_height: f64,
    pub levels: Option<f64>,
    pub roof_shape: RoofShape,
    pub color: Option<RenderColor>,
    pub roof_color: Option<RenderColor>,
    /// All tags after promotion, verbatim
    pub tags: BTreeMap<String, String>,
}

impl Attributes {
    pub fn is_extruded(&self) -> bool {
        self.height > 0.0
    }
}

/// Relation tags win over member tags. Among the members, the first way (by id) wins.
/// The sources stay untouched, a new map is returned.
pub fn promote_tags<'a>(
    relation_tags: &OsmMap,
    member_tags: impl IntoIterator<Item = &'a OsmMap>,
) -> OsmMap {
    let mut promoted = OsmMap::new();
    for tags in member_tags {
        for (key, value) in tags {
            promoted
                .entry(key.clone())
                .or_insert_with(|| value.clone());
        }
    }
    for (key, value) in relation_tags {
        promoted.insert(key.clone(), value.clone());
    }
    promoted
}

/// A tag value other than "no"
pub fn tags_get_yes<'a>(tags: &'a OsmMap, key: &str) -> Option<&'a String> {
    tags.get(key).filter(|value| value.as_str() != NO)
}

/// Meters from a length tag like "12", "12.5 m", "40'" or "40 ft". None if not a length >= 0.
pub fn parse_height(height: &str) -> Option<f64> {
    let height = height.trim();
    let (number, factor) = if let Some(feet) = height
        .strip_suffix("ft")
        .or_else(|| height.strip_suffix("feet"))
        .or_else(|| height.strip_suffix('\''))
    {
        (feet, FEET)
    } else {
        let meters = ["meters", "meter", "metres", "metre", "m"]
            .iter()
            .find_map(|unit| height.strip_suffix(unit))
            .unwrap_or(height);
        (meters, 1.0)
    };

    match number.trim().replace(',', ".").parse::<f64>() {
        Ok(value) if value.is_finite() && value >= 0.0 => Some(value * factor),
        _ => None,
    }
}

pub fn parse_roof_shape(roof_shape: Option<&String>) -> RoofShape {
    match roof_shape.map(|shape| shape.as_str()) {
        None | Some("flat") => RoofShape::Flat,
        Some("skillion") => RoofShape::Skillion,
        Some("gabled") => RoofShape::Gabled,
        Some("hipped") => RoofShape::Hipped,
        Some("pyramidal") => RoofShape::Pyramidal,
        Some("dome") => RoofShape::Dome,
        Some("onion") => RoofShape::Onion,
        Some(other) => RoofShape::Other(other.to_string()),
    }
}

pub fn parse_color(color: &str) -> Option<RenderColor> {
    // https://docs.rs/csscolorparser/latest/csscolorparser/
    match parse(color) {
        Ok(color_scc) => Some([
            color_scc.r as f32,
            color_scc.g as f32,
            color_scc.b as f32,
            color_scc.a as f32,
        ]),

        Err(_error) => match color {
            "stone" => Some(color_to_f32(200, 200, 200)),
            "brick" => Some(color_to_f32(255, 128, 128)),
            "cream" => Some(color_to_f32(255, 253, 208)),
            "roof_tiles" => Some(color_to_f32(186, 86, 37)),
            "glass" => Some(color_to_f32(150, 150, 220)), // light grey with a bit blue
            "wood" => Some(color_to_f32(145, 106, 47)),
            "copper" => Some(color_to_f32(98, 190, 119)), // Verdigris instead of copper = 183 119 41
            "concrete" => Some(color_to_f32(180, 180, 180)),
            _ => None,
        },
    }
}

fn color_to_f32(r: u8, g: u8, b: u8) -> RenderColor {
    [r as f32 / 255., g as f32 / 255., b as f32 / 255., 1.]
}

/// Reads a length tag. Unparsable values are a defect and count as missing.
fn height_tag(
    building: &str,
    tags: &OsmMap,
    keys: &[&str],
    diagnostics: &mut Diagnostics,
) -> Option<f64> {
    for key in keys {
        if let Some(value) = tags.get(*key) {
            match parse_height(value) {
                Some(height) => return Some(height),
                None => diagnostics.record(
                    building,
                    DefectKind::UnparsableTag {
                        key: key.to_string(),
                        value: value.clone(),
                    },
                ),
            }
        }
    }
    None
}

fn color_tag(
    building: &str,
    tags: &OsmMap,
    keys: &[&str],
    diagnostics: &mut Diagnostics,
) -> Option<RenderColor> {
    let key = keys.iter().find(|key| tags.contains_key(**key))?;
    let value = &tags[*key];
    let color = parse_color(value);
    if color.is_none() {
        diagnostics.record(
            building,
            DefectKind::UnparsableTag {
                key: key.to_string(),
                value: value.clone(),
            },
        );
    }
    color
}

/// Maps the (already promoted) tags of a building to its attributes.
/// Every missing or broken tag falls back to a default, nothing fails.
pub fn resolve_attributes(
    building: &str,
    tags: &OsmMap,
    extruded: bool,
    diagnostics: &mut Diagnostics,
) -> Attributes {
    let extruded = extruded
        && tags.get("location").map(|location| location.as_str()) != Some("underground");

    // ** Shape of the roof. All buildings have a roof, even if it is not tagged **
    let roof_shape = parse_roof_shape(tags.get("roof:shape"));

    // ** Colors and Materials **
    let color = color_tag(
        building,
        tags,
        &["building:colour", "colour", "building:material"],
        diagnostics,
    );
    let roof_color = color_tag(building, tags, &["roof:colour", "roof:material"], diagnostics);

    // ** Heights **
    let levels = height_tag(building, tags, &["building:levels", "levels"], diagnostics);
    let roof_levels = height_tag(building, tags, &["roof:levels"], diagnostics);
    let mut height = if !extruded {
        0.0
    } else if let Some(height) =
        height_tag(building, tags, &["height", "building:height"], diagnostics)
    {
        height
    } else if let Some(levels) = levels {
        (levels + roof_levels.unwrap_or(0.0)) * LEVEL_HEIGHT
    } else {
        DEFAULT_WALL_HEIGHT
    };

    let mut min_height = height_tag(
        building,
        tags,
        &["min_height", "building:min_height"],
        diagnostics,
    )
    .or_else(|| {
        height_tag(building, tags, &["building:min_level"], diagnostics)
            .map(|min_level| min_level * LEVEL_HEIGHT)
    })
    .unwrap_or(0.0);

    if height > 0.0 && min_height >= height {
        diagnostics.record(building, DefectKind::InvertedHeights { min_height, height });
        min_height = 0.0;
    }
    if height <= 0.0 {
        height = 0.0;
        min_height = 0.0;
    }

    Attributes {
        height,
        min_height,
        levels,
        roof_shape,
        color,
        roof_color,
        tags: tags.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
    }
}
