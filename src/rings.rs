//! Ring assembly: stitches the ways of a multipolygon into closed, oriented rings.
//!
//! The ways of a relation come in any order, any direction and split at any node.
//! Per role, the chains are grown from their open endpoints until they close.
//! Ties are broken by way id, so the result does not depend on the input order.

use log::debug;
use serde::Serialize;
use std::collections::HashMap;

use crate::defects::{DefectKind, Diagnostics};
use crate::kernel_in::{GroundPosition, signed_area};

/// Endpoints closer than this are the same node (meters)
static SNAP: f64 = 1.0e-4;
/// Rings with less area are degenerate (square meters)
pub static MIN_RING_AREA: f64 = 1.0e-6;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Outer,
    Inner,
    Other(String),
}

impl Role {
    pub fn from_tag(role: &str) -> Self {
        match role {
            "outer" => Role::Outer,
            "inner" => Role::Inner,
            _ => Role::Other(role.to_string()),
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Outer => write!(f, "outer"),
            Role::Inner => write!(f, "inner"),
            Role::Other(role) => write!(f, "'{role}'"),
        }
    }
}

/// A way as seen by one relation: its positions and the role it plays there
#[derive(Clone, Copy, Debug)]
pub struct FragmentView<'a> {
    pub source_id: u64,
    pub role: &'a Role,
    pub positions: &'a [GroundPosition],
}

/// Closed ring. The closing position is not repeated.
#[derive(Clone, Debug, PartialEq)]
pub struct Ring {
    pub positions: Vec<GroundPosition>,
    pub sources: Vec<u64>,
}

impl Ring {
    pub fn area(&self) -> f64 {
        signed_area(&self.positions)
    }

    pub fn is_counter_clockwise(&self) -> bool {
        self.area() > 0.0
    }
}

#[derive(Clone, Debug, Default)]
pub struct AssembledRings {
    /// counter-clockwise
    pub outer: Vec<Ring>,
    /// clockwise
    pub inner: Vec<Ring>,
}

type EndpointKey = (i64, i64);

fn endpoint_key(position: &GroundPosition) -> EndpointKey {
    (
        (position.east / SNAP).round() as i64,
        (position.north / SNAP).round() as i64,
    )
}

pub fn assemble_rings(
    building: &str,
    fragments: &[FragmentView],
    diagnostics: &mut Diagnostics,
) -> AssembledRings {
    let mut outer = Vec::new();
    let mut inner = Vec::new();
    for fragment in fragments {
        match fragment.role {
            Role::Outer | Role::Inner if fragment.positions.len() < 2 => {
                diagnostics.record(
                    building,
                    DefectKind::ShortFragment {
                        source_id: fragment.source_id,
                    },
                );
            }
            Role::Outer => outer.push(*fragment),
            Role::Inner => inner.push(*fragment),
            Role::Other(role) => {
                debug!("{building}: ignoring way {} with role {role}", fragment.source_id)
            }
        }
    }

    AssembledRings {
        outer: assemble_role(building, &Role::Outer, outer, diagnostics),
        inner: assemble_role(building, &Role::Inner, inner, diagnostics),
    }
}

fn assemble_role(
    building: &str,
    role: &Role,
    mut candidates: Vec<FragmentView>,
    diagnostics: &mut Diagnostics,
) -> Vec<Ring> {
    // stable: equal ids are the same way listed twice, same content
    candidates.sort_by_key(|fragment| fragment.source_id);

    // Only open ways can extend a chain. A closed way is a ring by itself.
    let mut endpoints: HashMap<EndpointKey, Vec<usize>> = HashMap::new();
    for (index, fragment) in candidates.iter().enumerate() {
        let first = endpoint_key(&fragment.positions[0]);
        let last = endpoint_key(&fragment.positions[fragment.positions.len() - 1]);
        if first != last {
            endpoints.entry(first).or_default().push(index);
            endpoints.entry(last).or_default().push(index);
        }
    }

    let mut consumed = vec![false; candidates.len()];
    let mut rings = Vec::new();

    for seed in 0..candidates.len() {
        if consumed[seed] {
            continue;
        }
        consumed[seed] = true;
        let mut chain: Vec<GroundPosition> = candidates[seed].positions.to_vec();
        let mut sources = vec![candidates[seed].source_id];

        let closed = loop {
            let head = endpoint_key(&chain[0]);
            let tail = endpoint_key(&chain[chain.len() - 1]);
            if head == tail {
                break true;
            }

            if let Some(next) = next_unconsumed(&endpoints, &consumed, tail) {
                consumed[next] = true;
                let positions = candidates[next].positions;
                sources.push(candidates[next].source_id);
                if endpoint_key(&positions[0]) == tail {
                    chain.extend_from_slice(&positions[1..]);
                } else {
                    chain.extend(positions.iter().rev().skip(1));
                }
                continue;
            }

            if let Some(previous) = next_unconsumed(&endpoints, &consumed, head) {
                consumed[previous] = true;
                let positions = candidates[previous].positions;
                sources.push(candidates[previous].source_id);
                let mut joined: Vec<GroundPosition> =
                    if endpoint_key(&positions[positions.len() - 1]) == head {
                        positions[..positions.len() - 1].to_vec()
                    } else {
                        positions.iter().rev().take(positions.len() - 1).copied().collect()
                    };
                joined.extend_from_slice(&chain);
                chain = joined;
                continue;
            }

            break false;
        };

        if !closed {
            diagnostics.record(
                building,
                DefectKind::UnclosedRing {
                    role: role.clone(),
                    sources,
                },
            );
            continue;
        }

        match close_ring(chain, role) {
            Some(positions) => rings.push(Ring { positions, sources }),
            None => diagnostics.record(
                building,
                DefectKind::DegenerateRing {
                    role: role.clone(),
                    sources,
                },
            ),
        }
    }

    rings
}

fn next_unconsumed(
    endpoints: &HashMap<EndpointKey, Vec<usize>>,
    consumed: &[bool],
    key: EndpointKey,
) -> Option<usize> {
    endpoints
        .get(&key)?
        .iter()
        .copied()
        .find(|index| !consumed[*index])
}

/// Drops the closing and repeated positions, checks the ring is usable and orients it.
fn close_ring(mut chain: Vec<GroundPosition>, role: &Role) -> Option<Vec<GroundPosition>> {
    chain.pop();
    chain.dedup_by(|next, previous| endpoint_key(next) == endpoint_key(previous));
    while chain.len() > 1 && endpoint_key(&chain[0]) == endpoint_key(&chain[chain.len() - 1]) {
        chain.pop();
    }

    let area = signed_area(&chain);
    if chain.len() < 3 || area.abs() < MIN_RING_AREA {
        return None;
    }

    let counter_clockwise = area > 0.0;
    let wanted = *role == Role::Outer;
    if counter_clockwise != wanted {
        chain.reverse();
    }
    Some(chain)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(east: f64, north: f64) -> GroundPosition {
        GroundPosition::new(east, north)
    }

    fn view<'a>(source_id: u64, role: &'a Role, positions: &'a [GroundPosition]) -> FragmentView<'a> {
        FragmentView {
            source_id,
            role,
            positions,
        }
    }

    /// Rotates the ring to start at its smallest position, to compare rings.
    fn canonical(ring: &Ring) -> Vec<(i64, i64)> {
        let keys: Vec<(i64, i64)> = ring.positions.iter().map(endpoint_key).collect();
        let start = keys
            .iter()
            .enumerate()
            .min_by_key(|(_, key)| **key)
            .map(|(index, _)| index)
            .unwrap();
        keys[start..].iter().chain(keys[..start].iter()).copied().collect()
    }

    fn octagon() -> Vec<GroundPosition> {
        vec![
            p(2., 0.),
            p(4., 0.),
            p(6., 2.),
            p(6., 4.),
            p(4., 6.),
            p(2., 6.),
            p(0., 4.),
            p(0., 2.),
        ]
    }

    #[test]
    fn test_single_closed_way() {
        let outer = Role::Outer;
        let mut positions = octagon();
        positions.push(positions[0]);
        let mut diagnostics = Diagnostics::new();
        let rings = assemble_rings("w1", &[view(1, &outer, &positions)], &mut diagnostics);

        assert!(diagnostics.is_empty());
        assert_eq!(rings.outer.len(), 1);
        assert_eq!(rings.outer[0].positions.len(), 8);
        assert!(rings.outer[0].is_counter_clockwise());
    }

    #[test]
    fn test_split_loop_in_any_order_gives_same_ring() {
        let outer = Role::Outer;
        let mut loop_positions = octagon();
        loop_positions.push(loop_positions[0]);
        // split at nodes 2, 5 and 7, one piece reversed
        let a: Vec<GroundPosition> = loop_positions[0..=2].to_vec();
        let b: Vec<GroundPosition> = loop_positions[2..=5].iter().rev().copied().collect();
        let c: Vec<GroundPosition> = loop_positions[5..=7].to_vec();
        let d: Vec<GroundPosition> = loop_positions[7..=8].to_vec();

        let orders: [[(u64, &[GroundPosition]); 4]; 3] = [
            [(10, &a[..]), (11, &b[..]), (12, &c[..]), (13, &d[..])],
            [(13, &d[..]), (11, &b[..]), (10, &a[..]), (12, &c[..])],
            [(12, &c[..]), (10, &a[..]), (13, &d[..]), (11, &b[..])],
        ];

        let mut results = Vec::new();
        for order in orders.iter() {
            let views: Vec<FragmentView> = order
                .iter()
                .map(|(id, positions)| view(*id, &outer, positions))
                .collect();
            let mut diagnostics = Diagnostics::new();
            let rings = assemble_rings("r1", &views, &mut diagnostics);
            assert!(diagnostics.is_empty());
            assert_eq!(rings.outer.len(), 1);
            assert_eq!(rings.outer[0].positions.len(), 8);
            results.push(rings.outer[0].clone());
        }

        let expected = canonical(&Ring {
            positions: octagon(),
            sources: vec![],
        });
        for ring in &results {
            assert_eq!(canonical(ring), expected);
            assert_eq!(ring.positions, results[0].positions);
        }
    }

    #[test]
    fn test_two_ways_sharing_endpoints() {
        // n = 4 positions each, both ends shared: 2 * 4 - 2 = 6 positions
        let outer = Role::Outer;
        let upper = vec![p(0., 0.), p(0., 3.), p(3., 3.), p(6., 0.)];
        let lower = vec![p(0., 0.), p(2., -2.), p(4., -2.), p(6., 0.)];
        let mut diagnostics = Diagnostics::new();
        let rings = assemble_rings(
            "r1",
            &[view(1, &outer, &upper), view(2, &outer, &lower)],
            &mut diagnostics,
        );

        assert!(diagnostics.is_empty());
        assert_eq!(rings.outer.len(), 1);
        assert_eq!(rings.outer[0].positions.len(), 2 * 4 - 2);
        assert_eq!(rings.outer[0].sources, vec![1, 2]);
        assert!(rings.outer[0].is_counter_clockwise());
    }

    #[test]
    fn test_unclosed_chain_is_reported_not_closed() {
        let outer = Role::Outer;
        let a = vec![p(0., 0.), p(5., 0.)];
        let b = vec![p(5., 0.), p(5., 5.)];
        let mut diagnostics = Diagnostics::new();
        let rings = assemble_rings(
            "r7",
            &[view(2, &outer, &b), view(1, &outer, &a)],
            &mut diagnostics,
        );

        assert!(rings.outer.is_empty());
        assert_eq!(
            diagnostics.defects()[0].kind,
            DefectKind::UnclosedRing {
                role: Role::Outer,
                sources: vec![1, 2]
            }
        );
    }

    #[test]
    fn test_inner_ring_is_clockwise() {
        let inner = Role::Inner;
        let hole = vec![p(1., 1.), p(2., 1.), p(2., 2.), p(1., 2.), p(1., 1.)];
        let mut diagnostics = Diagnostics::new();
        let rings = assemble_rings("r1", &[view(5, &inner, &hole)], &mut diagnostics);
        assert!(rings.outer.is_empty());
        assert_eq!(rings.inner.len(), 1);
        assert!(!rings.inner[0].is_counter_clockwise());
    }

    #[test]
    fn test_degenerate_and_short_fragments() {
        let outer = Role::Outer;
        let line = vec![p(0., 0.), p(1., 0.), p(2., 0.), p(0., 0.)];
        let single = vec![p(9., 9.)];
        let mut diagnostics = Diagnostics::new();
        let rings = assemble_rings(
            "w3",
            &[view(3, &outer, &line), view(4, &outer, &single)],
            &mut diagnostics,
        );

        assert!(rings.outer.is_empty());
        assert_eq!(diagnostics.count_of("short_fragment"), 1);
        assert_eq!(diagnostics.count_of("degenerate_ring"), 1);
    }

    #[test]
    fn test_other_roles_are_ignored() {
        let label = Role::from_tag("label");
        let positions = vec![p(0., 0.), p(1., 0.)];
        let mut diagnostics = Diagnostics::new();
        let rings = assemble_rings("r1", &[view(1, &label, &positions)], &mut diagnostics);
        assert!(rings.outer.is_empty() && rings.inner.is_empty());
        assert!(diagnostics.is_empty());
    }

    #[test]
    fn test_closed_way_does_not_absorb_touching_chain() {
        let outer = Role::Outer;
        let square = vec![p(0., 0.), p(4., 0.), p(4., 4.), p(0., 4.), p(0., 0.)];
        let spur = vec![p(0., 0.), p(-3., -3.)];
        let mut diagnostics = Diagnostics::new();
        let rings = assemble_rings(
            "r2",
            &[view(1, &outer, &square), view(2, &outer, &spur)],
            &mut diagnostics,
        );
        assert_eq!(rings.outer.len(), 1);
        assert_eq!(rings.outer[0].positions.len(), 4);
        assert_eq!(diagnostics.count_of("unclosed_ring"), 1);
    }
}
