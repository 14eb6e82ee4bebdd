// Internal Interface of the crate/lib between the solid builder and the output

use serde::Serialize;
use std::collections::BTreeMap;
use std::io::Write;

use crate::error::Result;
use crate::footprint::Footprint;
use crate::kernel_in::SolidPosition;
use crate::tagticks::{Attributes, RenderColor, RoofShape};

/// Triangles indexing `vertices`, counter-clockwise seen from outside
pub type Face = [usize; 3];

/// The 3D result of a building: roof, floor and walls, plus outlines for drawing
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Solid {
    pub vertices: Vec<SolidPosition>,
    pub faces: Vec<Face>,
    /// closed loops, the first position is repeated at the end
    pub edges: Vec<Vec<SolidPosition>>,
}

impl Solid {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.faces.is_empty()
    }

    /// Appends another solid, shifting its face indices behind the existing vertices
    pub fn append(&mut self, other: Solid) {
        let offset = self.vertices.len();
        self.vertices.extend(other.vertices);
        self.faces.extend(
            other
                .faces
                .into_iter()
                .map(|[a, b, c]| [a + offset, b + offset, c + offset]),
        );
        self.edges.extend(other.edges);
    }

    /// Signed volume. Positive if all faces point outward.
    pub fn volume(&self) -> f64 {
        self.faces
            .iter()
            .map(|[a, b, c]| {
                let (a, b, c) = (self.vertices[*a], self.vertices[*b], self.vertices[*c]);
                (a[0] * (b[1] * c[2] - b[2] * c[1]) - a[1] * (b[0] * c[2] - b[2] * c[0])
                    + a[2] * (b[0] * c[1] - b[1] * c[0]))
                    / 6.0
            })
            .sum()
    }
}

/// A building after conversion
#[derive(Clone, Debug, PartialEq)]
pub struct BuildingRecord {
    pub name: String,
    pub footprints: Vec<Footprint>,
    pub attributes: Attributes,
    pub solid: Solid,
}

/// The JSON record of one building
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct BuildingOutput {
    pub name: String,
    pub height: f64,
    pub min_height: f64,
    pub roof_shape: RoofShape,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<RenderColor>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub roof_color: Option<RenderColor>,
    pub tags: BTreeMap<String, String>,
    pub vertices: Vec<SolidPosition>,
    pub faces: Vec<Face>,
    pub edges: Vec<Vec<SolidPosition>>,
}

fn round_mm(value: f64) -> f64 {
    let rounded = (value * 1000.0).round() / 1000.0;
    // no "-0.0" in the output
    if rounded == 0.0 { 0.0 } else { rounded }
}

fn round_position(position: &SolidPosition) -> SolidPosition {
    [
        round_mm(position[0]),
        round_mm(position[1]),
        round_mm(position[2]),
    ]
}

impl BuildingOutput {
    /// None for buildings without height or without any geometry left
    pub fn from_record(record: &BuildingRecord) -> Option<Self> {
        if record.attributes.height == 0.0 || record.solid.is_empty() {
            return None;
        }
        let solid = &record.solid;
        Some(Self {
            name: record.name.clone(),
            height: record.attributes.height,
            min_height: record.attributes.min_height,
            roof_shape: record.attributes.roof_shape.clone(),
            color: record.attributes.color,
            roof_color: record.attributes.roof_color,
            tags: record.attributes.tags.clone(),
            vertices: solid.vertices.iter().map(round_position).collect(),
            faces: solid.faces.clone(),
            edges: solid
                .edges
                .iter()
                .map(|edge| edge.iter().map(round_position).collect())
                .collect(),
        })
    }
}

pub fn building_outputs(records: &[BuildingRecord]) -> Vec<BuildingOutput> {
    records.iter().filter_map(BuildingOutput::from_record).collect()
}

/// A JSON array with one building per line, to keep diffs of the output readable
pub fn write_json_array<W: Write>(writer: &mut W, outputs: &[BuildingOutput]) -> Result<()> {
    writeln!(writer, "[")?;
    for (index, output) in outputs.iter().enumerate() {
        if index > 0 {
            writeln!(writer, ",")?;
        }
        serde_json::to_writer(&mut *writer, output)?;
    }
    writeln!(writer, "\n]")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attributes(height: f64) -> Attributes {
        Attributes {
            height,
            min_height: 0.0,
            levels: None,
            roof_shape: RoofShape::Flat,
            color: None,
            roof_color: None,
            tags: BTreeMap::from([("building".to_string(), "yes".to_string())]),
        }
    }

    fn triangle_solid() -> Solid {
        Solid {
            vertices: vec![[0.0, 0.0, 3.0], [1.0004, 0.0, 3.0], [0.0, -0.0001, 3.0]],
            faces: vec![[0, 1, 2]],
            edges: vec![vec![[0.0, 0.0, 3.0], [1.0, 0.0, 3.0], [0.0, 0.0, 3.0]]],
        }
    }

    #[test]
    fn test_zero_height_is_omitted() {
        let record = BuildingRecord {
            name: "w1".into(),
            footprints: vec![],
            attributes: attributes(0.0),
            solid: triangle_solid(),
        };
        assert!(BuildingOutput::from_record(&record).is_none());

        let empty = BuildingRecord {
            name: "w2".into(),
            footprints: vec![],
            attributes: attributes(5.0),
            solid: Solid::new(),
        };
        assert!(building_outputs(&[record, empty]).is_empty());
    }

    #[test]
    fn test_json_shapes() {
        let record = BuildingRecord {
            name: "r3".into(),
            footprints: vec![],
            attributes: attributes(3.0),
            solid: triangle_solid(),
        };
        let outputs = building_outputs(&[record]);
        let mut buffer = Vec::new();
        write_json_array(&mut buffer, &outputs).unwrap();
        let text = String::from_utf8(buffer).unwrap();

        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        let building = &value[0];
        assert_eq!(building["name"], "r3");
        assert_eq!(building["roof_shape"], "flat");
        assert_eq!(building["vertices"][1], serde_json::json!([1.0, 0.0, 3.0]));
        assert_eq!(building["vertices"][2], serde_json::json!([0.0, 0.0, 3.0]));
        assert_eq!(building["faces"], serde_json::json!([[0, 1, 2]]));
        assert_eq!(building["edges"][0].as_array().unwrap().len(), 3);
        assert!(building.get("color").is_none());
        assert!(!text.contains("-0.0"));
    }

    #[test]
    fn test_append_shifts_faces() {
        let mut solid = triangle_solid();
        solid.append(triangle_solid());
        assert_eq!(solid.vertices.len(), 6);
        assert_eq!(solid.faces[1], [3, 4, 5]);
        assert_eq!(solid.edges.len(), 2);
    }

    #[test]
    fn test_empty_array() {
        let mut buffer = Vec::new();
        write_json_array(&mut buffer, &[]).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&buffer).unwrap();
        assert_eq!(value, serde_json::json!([]));
    }
}
