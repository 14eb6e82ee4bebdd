use crate::defects::{DefectKind, Diagnostics};
use crate::footprint::Footprint;
use crate::kernel_in::{GroundPosition, SolidPosition};
use crate::kernel_out::{Face, Solid};
use crate::rings::Ring;
use crate::tagticks::Attributes;

///////////////////////////////////////////////////////////////////////////////////////////////////
// OSM ////////////////////////////////////////////////////////////////////////////////////////////

// Constants / Parameters
static O: usize = 0; // Just to silent lint, make some lines equal and to show, the Offset may also be 0
/// Allowed relative difference between triangulated area and footprint area
static AREA_TOLERANCE: f64 = 0.001;

/// Extrudes the footprints of one building between min_height and height.
/// A footprint that can not be triangulated soundly contributes nothing, its siblings still do.
pub fn build_solid(
    building: &str,
    footprints: &[Footprint],
    attributes: &Attributes,
    diagnostics: &mut Diagnostics,
) -> Solid {
    let mut solid = Solid::new();
    if !attributes.is_extruded() {
        return solid;
    }

    for (footprint_index, footprint) in footprints.iter().enumerate() {
        if footprint.is_self_intersecting() {
            diagnostics.record(
                building,
                DefectKind::SelfIntersection {
                    footprint: footprint_index,
                },
            );
            continue;
        }

        let (indices, vertices) = match footprint.get_triangulate_indices() {
            Ok(triangulation) => triangulation,
            Err(reason) => {
                diagnostics.record(
                    building,
                    DefectKind::DegenerateTriangulation {
                        footprint: footprint_index,
                        reason,
                    },
                );
                continue;
            }
        };

        let area = footprint.area();
        let triangulated = Footprint::triangulated_area(&indices, &vertices);
        if indices.is_empty() || (triangulated - area).abs() > area * AREA_TOLERANCE {
            diagnostics.record(
                building,
                DefectKind::DegenerateTriangulation {
                    footprint: footprint_index,
                    reason: format!("triangles cover {triangulated:.3} m² of {area:.3} m²"),
                },
            );
            continue;
        }

        let mut osm_mesh = OsmMesh::new(footprint, attributes.min_height, attributes.height);
        osm_mesh.push_flat(&indices);
        osm_mesh.push_walls(footprint);
        osm_mesh.push_edges(footprint);
        solid.append(osm_mesh.solid);
    }

    log::trace!(
        "{building}: {} vertices, {} faces",
        solid.vertices.len(),
        solid.faces.len()
    );
    solid
}

// Methode-Extenton of the "CLASS" OSM-Mesh, only needed internaly here ////////////////////////
#[derive(Clone, Debug)]
struct OsmMesh {
    solid: Solid,
    /// positions of all rings, outer first, in the order of the triangulation
    ground_positions: Vec<GroundPosition>,
    min_height: f64,
    height: f64,
}

impl OsmMesh {
    /// All ring positions at min_height, then the same at height.
    /// Floor vertex i and roof vertex count + i stand above each other.
    fn new(footprint: &Footprint, min_height: f64, height: f64) -> Self {
        let ground_positions: Vec<GroundPosition> = footprint
            .rings()
            .flat_map(|ring| ring.positions.iter().copied())
            .collect();

        let mut vertices: Vec<SolidPosition> = Vec::with_capacity(ground_positions.len() * 2);
        for position in &ground_positions {
            vertices.push(position.to_solid_position(min_height));
        }
        for position in &ground_positions {
            vertices.push(position.to_solid_position(height));
        }

        OsmMesh {
            solid: Solid {
                vertices,
                faces: Vec::new(),
                edges: Vec::new(),
            },
            ground_positions,
            min_height,
            height,
        }
    }

    fn roof_index(&self, index: usize) -> usize {
        self.ground_positions.len() + index
    }

    /// Roof and floor from the same triangles. The roof faces up, the floor faces down.
    fn push_flat(&mut self, indices: &[usize]) {
        for triangle in indices.chunks_exact(3) {
            let (a, b, c) = (triangle[O], triangle[1], triangle[2]);
            let counter_clockwise = self.ground_positions[b]
                .cross(&self.ground_positions[a], &self.ground_positions[c])
                > 0.0;
            let [a, b, c] = if counter_clockwise { [a, b, c] } else { [a, c, b] };

            self.push_3_indices([self.roof_index(a), self.roof_index(b), self.roof_index(c)]);
            self.push_3_indices([a, c, b]);
        }
    }

    fn push_walls(&mut self, footprint: &Footprint) {
        let mut start = 0;
        for ring in footprint.rings() {
            self.push_wall_shape(start, ring);
            start += ring.positions.len();
        }
    }

    /// Walls of one ring. Outer rings run counter-clockwise and holes clockwise,
    /// so the right hand side of each edge is always outside of the building.
    fn push_wall_shape(&mut self, start: usize, ring: &Ring) {
        let count = ring.positions.len();
        for edge_index in 0..count {
            let left = start + edge_index;
            let right = start + (edge_index + 1) % count;
            self.push_square(
                left,
                right,
                self.roof_index(left),
                self.roof_index(right),
            );
        }
    }

    /// Outlines at floor and roof, for drawing
    fn push_edges(&mut self, footprint: &Footprint) {
        for height in [self.min_height, self.height] {
            for ring in footprint.rings() {
                let mut edge: Vec<SolidPosition> = ring
                    .positions
                    .iter()
                    .map(|position| position.to_solid_position(height))
                    .collect();
                if let Some(first) = edge.first().copied() {
                    edge.push(first);
                }
                self.solid.edges.push(edge);
            }
        }
    }

    //// basic pushes: ////

    fn push_square(&mut self, down_left: usize, down_right: usize, up_left: usize, up_right: usize) {
        //  up_left---up_right
        //     |          |
        // down_left--down_right
        self.push_3_indices([down_left, down_right, up_right]);
        self.push_3_indices([down_left, up_right, up_left]);
    }

    fn push_3_indices(&mut self, indexi: Face) {
        self.solid.faces.push(indexi);
    }
}
