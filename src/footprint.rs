// Footprint: outer ring with holes, one physically distinct shape of a building

extern crate earcutr;

use crate::defects::{DefectKind, Diagnostics};
use crate::kernel_in::{GroundPosition, polygon_contains, signed_area};
use crate::rings::{AssembledRings, Ring};

static O: usize = 0; // Just to silent lint, make some lines equal and to show, the Offset may also be 0
static INTERSECTION_EPSILON: f64 = 1.0e-9;

#[derive(Clone, Debug, PartialEq)]
pub struct Footprint {
    /// counter-clockwise
    pub outer: Ring,
    /// clockwise, each inside `outer`
    pub holes: Vec<Ring>,
}

impl Footprint {
    pub fn new(outer: Ring) -> Self {
        Self {
            outer,
            holes: Vec::new(),
        }
    }

    pub fn push_hole(&mut self, hole: Ring) {
        self.holes.push(hole);
    }

    /// Outer first, then the holes
    pub fn rings(&self) -> impl Iterator<Item = &Ring> {
        std::iter::once(&self.outer).chain(self.holes.iter())
    }

    pub fn position_count(&self) -> usize {
        self.rings().map(|ring| ring.positions.len()).sum()
    }

    /// Area of the outer ring minus the holes
    pub fn area(&self) -> f64 {
        signed_area(&self.outer.positions).abs()
            - self
                .holes
                .iter()
                .map(|hole| signed_area(&hole.positions).abs())
                .sum::<f64>()
    }

    /// Triangle indices into the positions of all rings, outer first.
    /// The flattened vertices are returned with them, east before north.
    pub fn get_triangulate_indices(&self) -> Result<(Vec<usize>, Vec<f64>), String> {
        let mut vertices = Vec::<f64>::with_capacity(self.position_count() * 2);
        let mut holes_starts = Vec::<usize>::new();

        for position in &self.outer.positions {
            vertices.push(position.east);
            vertices.push(position.north);
        }

        for hole in &self.holes {
            holes_starts.push(vertices.len() / 2);
            for position in &hole.positions {
                vertices.push(position.east);
                vertices.push(position.north);
            }
        }

        let indices =
            earcutr::earcut(&vertices, &holes_starts, 2).map_err(|error| format!("{error:?}"))?;
        Ok((indices, vertices))
    }

    /// Sum of the triangle areas of a triangulation, to compare with `area()`
    pub fn triangulated_area(indices: &[usize], vertices: &[f64]) -> f64 {
        let mut area_size = 0.0;
        for triangle in indices.chunks_exact(3) {
            let corner = |index: usize| {
                GroundPosition::new(vertices[triangle[index] * 2 + O], vertices[triangle[index] * 2 + 1])
            };
            let (a, b, c) = (corner(0), corner(1), corner(2));
            area_size += b.cross(&a, &c).abs() / 2.0;
        }
        area_size
    }

    /// True if two edges of its rings cross. Edges sharing a position are not tested.
    pub fn is_self_intersecting(&self) -> bool {
        let edges: Vec<(GroundPosition, GroundPosition)> = self
            .rings()
            .flat_map(|ring| {
                let count = ring.positions.len();
                (0..count).map(move |index| {
                    (ring.positions[index], ring.positions[(index + 1) % count])
                })
            })
            .collect();

        for (index, edge) in edges.iter().enumerate() {
            for other in &edges[index + 1..] {
                if edges_cross(edge, other) {
                    return true;
                }
            }
        }
        false
    }
}

fn edges_cross(
    (a, b): &(GroundPosition, GroundPosition),
    (c, d): &(GroundPosition, GroundPosition),
) -> bool {
    if a == c || a == d || b == c || b == d {
        return false;
    }
    // bounding boxes
    if a.east.max(b.east) < c.east.min(d.east)
        || c.east.max(d.east) < a.east.min(b.east)
        || a.north.max(b.north) < c.north.min(d.north)
        || c.north.max(d.north) < a.north.min(b.north)
    {
        return false;
    }
    let d1 = b.cross(a, c);
    let d2 = b.cross(a, d);
    let d3 = d.cross(c, a);
    let d4 = d.cross(c, b);
    let opposite = |x: f64, y: f64| {
        (x > INTERSECTION_EPSILON && y < -INTERSECTION_EPSILON)
            || (x < -INTERSECTION_EPSILON && y > INTERSECTION_EPSILON)
    };
    opposite(d1, d2) && opposite(d3, d4)
}

/// Groups the assembled rings into footprints. Each outer ring starts one,
/// each hole joins the smallest outer ring containing its first position.
/// A building standing in the courtyard of another one gets its own holes.
pub fn build_footprints(
    building: &str,
    rings: AssembledRings,
    diagnostics: &mut Diagnostics,
) -> Vec<Footprint> {
    let mut footprints: Vec<Footprint> = rings.outer.into_iter().map(Footprint::new).collect();

    for hole in rings.inner {
        let first = hole.positions[0];
        let container = footprints
            .iter()
            .enumerate()
            .filter(|(_, footprint)| polygon_contains(&footprint.outer.positions, &first))
            .min_by(|(_, a), (_, b)| a.outer.area().abs().total_cmp(&b.outer.area().abs()))
            .map(|(index, _)| index);

        match container {
            Some(index) => footprints[index].push_hole(hole),
            None => diagnostics.record(
                building,
                DefectKind::OrphanedHole {
                    east: first.east,
                    north: first.north,
                },
            ),
        }
    }

    if footprints.len() > 1 {
        log::debug!("{building}: {} separate footprints", footprints.len());
    }
    footprints
}
