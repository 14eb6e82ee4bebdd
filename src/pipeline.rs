//! The per-building pipeline: rings, footprints, attributes, solid.
//!
//! Buildings are independent of each other. They are converted in parallel,
//! each with its own diagnostics, which are merged back in input order.

use log::info;
use rayon::prelude::*;

use crate::GeographicCoordinates;
use crate::defects::{DefectKind, Defect, Diagnostics};
use crate::error::{ConvertError, Result};
use crate::footprint::build_footprints;
use crate::kernel_out::{BuildingOutput, BuildingRecord, Solid, building_outputs};
use crate::osm2layers::{BuildingLayer, BuildingSource, FragmentArena};
use crate::rings::assemble_rings;
use crate::symbolic_3d::build_solid;
use crate::tagticks::resolve_attributes;

/// What a conversion run carries along: the projection center and the defects so far
#[derive(Debug)]
pub struct ConversionContext {
    pub center: GeographicCoordinates,
    pub diagnostics: Diagnostics,
}

impl ConversionContext {
    pub fn new(center: GeographicCoordinates) -> Self {
        Self {
            center,
            diagnostics: Diagnostics::new(),
        }
    }
}

/// Result of a whole run
#[derive(Debug)]
pub struct Conversion {
    pub outputs: Vec<BuildingOutput>,
    pub defects: Vec<Defect>,
}

pub fn convert_building(
    source: &BuildingSource,
    arena: &FragmentArena,
    diagnostics: &mut Diagnostics,
) -> BuildingRecord {
    let building = source.name.as_str();
    let tags = source.promoted_tags(arena);
    let attributes = resolve_attributes(building, &tags, source.extruded, diagnostics);

    let mut record = BuildingRecord {
        name: source.name.clone(),
        footprints: Vec::new(),
        attributes,
        solid: Solid::new(),
    };

    if !source.has_outer_member() {
        diagnostics.record(building, DefectKind::EmptyFeature);
        return record;
    }

    let fragments = source.fragment_views(arena);
    let rings = assemble_rings(building, &fragments, diagnostics);
    if rings.outer.is_empty() && rings.inner.is_empty() {
        diagnostics.record(building, DefectKind::EmptyFeature);
        return record;
    }
    record.footprints = build_footprints(building, rings, diagnostics);
    record.solid = build_solid(building, &record.footprints, &record.attributes, diagnostics);
    record
}

/// Converts every building of the layer. The records keep the order of the sources.
pub fn convert_layer(layer: &BuildingLayer, context: &mut ConversionContext) -> Vec<BuildingRecord> {
    let converted: Vec<(BuildingRecord, Diagnostics)> = layer
        .sources
        .par_iter()
        .map(|source| {
            let mut diagnostics = Diagnostics::new();
            let record = convert_building(source, &layer.arena, &mut diagnostics);
            (record, diagnostics)
        })
        .collect();

    let mut records = Vec::with_capacity(converted.len());
    for (record, diagnostics) in converted {
        context.diagnostics.merge(diagnostics);
        records.push(record);
    }
    records
}

/// Layer to output. Fails only if the source delivered nothing at all.
pub fn convert(layer: BuildingLayer, center: GeographicCoordinates) -> Result<Conversion> {
    if layer.element_count == 0 {
        return Err(ConvertError::EmptyDataset);
    }

    let mut context = ConversionContext::new(center);
    let records = convert_layer(&layer, &mut context);
    let outputs = building_outputs(&records);

    let mut diagnostics = layer.diagnostics;
    diagnostics.merge(context.diagnostics);
    info!(
        "around ({:.6}, {:.6}): {} buildings converted, {} with a solid, {} defects",
        context.center.latitude,
        context.center.longitude,
        records.len(),
        outputs.len(),
        diagnostics.defects().len()
    );
    for (kind, count) in diagnostics.summary() {
        info!("  {kind}: {count}");
    }

    Ok(Conversion {
        outputs,
        defects: diagnostics.into_defects(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel_in::{GroundPosition, OsmMap};
    use crate::osm2layers::{BuildingMember, Fragment};
    use crate::rings::Role;
    use approx::assert_relative_eq;

    fn fragment(source_id: u64, corners: &[(f64, f64)], tags: &[(&str, &str)]) -> Fragment {
        Fragment {
            source_id,
            positions: corners
                .iter()
                .map(|(east, north)| GroundPosition::new(*east, *north))
                .collect(),
            tags: tags
                .iter()
                .map(|(key, value)| (key.to_string(), value.to_string()))
                .collect(),
        }
    }

    fn center() -> GeographicCoordinates {
        GeographicCoordinates {
            latitude: 52.0,
            longitude: 11.0,
        }
    }

    #[test]
    fn test_split_outer_with_hole() {
        let mut arena = FragmentArena::new();
        let north = arena.push(fragment(11, &[(10., 0.), (10., 10.), (0., 10.)], &[]));
        let south = arena.push(fragment(10, &[(0., 10.), (0., 0.), (10., 0.)], &[("roof:shape", "flat")]));
        let hole = arena.push(fragment(12, &[(2., 2.), (4., 2.), (4., 4.), (2., 4.), (2., 2.)], &[]));
        let tags: OsmMap = [("building".to_string(), "yes".to_string()), ("height".to_string(), "9".to_string())]
            .into_iter()
            .collect();
        let source = BuildingSource::from_relation(
            1,
            tags,
            vec![
                BuildingMember { fragment: north, role: Role::Outer },
                BuildingMember { fragment: south, role: Role::Outer },
                BuildingMember { fragment: hole, role: Role::Inner },
            ],
        );

        let mut diagnostics = Diagnostics::new();
        let record = convert_building(&source, &arena, &mut diagnostics);
        assert!(diagnostics.is_empty(), "{:?}", diagnostics.defects());
        assert_eq!(record.attributes.height, 9.);
        assert_eq!(record.footprints.len(), 1);
        assert_eq!(record.footprints[0].holes.len(), 1);
        assert_relative_eq!(record.solid.volume(), 96. * 9., epsilon = 1e-6);
    }

    fn closed_square(source_id: u64, west: f64, south: f64, size: f64) -> Fragment {
        let (east, north) = (west + size, south + size);
        fragment(
            source_id,
            &[(west, south), (east, south), (east, north), (west, north), (west, south)],
            &[],
        )
    }

    #[test]
    fn test_building_in_courtyard_of_building() {
        let mut arena = FragmentArena::new();
        let members = [
            (closed_square(1, 0., 0., 30.), Role::Outer),
            (closed_square(2, 5., 5., 20.), Role::Inner),
            (closed_square(3, 10., 10., 10.), Role::Outer),
            (closed_square(4, 13., 13., 4.), Role::Inner),
        ]
        .into_iter()
        .map(|(fragment, role)| BuildingMember { fragment: arena.push(fragment), role })
        .collect();
        let tags: OsmMap = [("building".to_string(), "yes".to_string())].into_iter().collect();
        let source = BuildingSource::from_relation(2, tags, members);

        let mut diagnostics = Diagnostics::new();
        let record = convert_building(&source, &arena, &mut diagnostics);
        assert!(diagnostics.is_empty(), "{:?}", diagnostics.defects());
        assert_eq!(record.footprints.len(), 2);
        assert_relative_eq!(record.solid.volume(), (500. + 84.) * 6., epsilon = 1e-6);
    }

    #[test]
    fn test_stray_hole_keeps_the_building() {
        let mut arena = FragmentArena::new();
        let outer = arena.push(closed_square(1, 0., 0., 10.));
        let stray = arena.push(closed_square(2, 50., 50., 2.));
        let tags: OsmMap = [("building".to_string(), "yes".to_string())].into_iter().collect();
        let source = BuildingSource::from_relation(
            3,
            tags,
            vec![
                BuildingMember { fragment: outer, role: Role::Outer },
                BuildingMember { fragment: stray, role: Role::Inner },
            ],
        );

        let mut diagnostics = Diagnostics::new();
        let record = convert_building(&source, &arena, &mut diagnostics);
        assert_eq!(diagnostics.count_of("orphaned_hole"), 1);
        assert_eq!(diagnostics.defects().len(), 1);
        assert_relative_eq!(record.solid.volume(), 100. * 6., epsilon = 1e-6);
    }

    #[test]
    fn test_defects_stay_with_their_building() {
        let mut layer = BuildingLayer::default();
        let open = layer.arena.push(fragment(20, &[(0., 0.), (5., 0.), (5., 5.)], &[("building", "yes")]));
        let closed = layer.arena.push(fragment(21, &[(10., 0.), (15., 0.), (15., 5.), (10., 0.)], &[("building", "yes")]));
        layer.sources.push(BuildingSource::from_way(20, open));
        layer.sources.push(BuildingSource::from_way(21, closed));
        layer.sources.push(BuildingSource::from_relation(3, OsmMap::new(), vec![]));
        layer.element_count = 3;

        let conversion = convert(layer, center()).unwrap();
        assert_eq!(conversion.outputs.len(), 1);
        assert_eq!(conversion.outputs[0].name, "w21");
        let buildings: Vec<&str> = conversion
            .defects
            .iter()
            .map(|defect| defect.building.as_str())
            .collect();
        assert_eq!(buildings, vec!["w20", "w20", "r3"]);
        assert_eq!(conversion.defects[0].kind.label(), "unclosed_ring");
        assert_eq!(conversion.defects[1].kind, DefectKind::EmptyFeature);
        assert_eq!(conversion.defects[2].kind, DefectKind::EmptyFeature);
    }

    #[test]
    fn test_empty_dataset() {
        let result = convert(BuildingLayer::default(), center());
        assert!(matches!(result, Err(ConvertError::EmptyDataset)));

        let nothing_to_build = BuildingLayer {
            element_count: 4,
            ..Default::default()
        };
        let conversion = convert(nothing_to_build, center()).unwrap();
        assert!(conversion.outputs.is_empty());
        assert!(conversion.defects.is_empty());
    }
}
