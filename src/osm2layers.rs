//////////////////////////////////////////////////////////
// From OSM elements to the building sources to convert //
//////////////////////////////////////////////////////////

use log::{debug, info};
use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::GeographicCoordinates;
use crate::defects::{DefectKind, Diagnostics};
use crate::kernel_in::{GroundPosition, Member, OsmMap};
use crate::rings::{FragmentView, Role};
use crate::tagticks::{promote_tags, tags_get_yes};

/// A way, projected. Stored once in the arena, however many relations use it.
#[derive(Clone, Debug, PartialEq)]
pub struct Fragment {
    pub source_id: u64,
    pub positions: Vec<GroundPosition>,
    pub tags: OsmMap,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FragmentId(usize);

/// Owner of all fragments. Buildings refer to them by id and only read them.
#[derive(Clone, Debug, Default)]
pub struct FragmentArena {
    fragments: Vec<Fragment>,
}

impl FragmentArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, fragment: Fragment) -> FragmentId {
        self.fragments.push(fragment);
        FragmentId(self.fragments.len() - 1)
    }

    pub fn get(&self, id: FragmentId) -> &Fragment {
        &self.fragments[id.0]
    }

    pub fn len(&self) -> usize {
        self.fragments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FeatureKind {
    Way,
    Relation,
}

#[derive(Clone, Debug, PartialEq)]
pub struct BuildingMember {
    pub fragment: FragmentId,
    pub role: Role,
}

/// One building to convert: a multipolygon relation, or a way posing as a relation with one outer member
#[derive(Clone, Debug, PartialEq)]
pub struct BuildingSource {
    pub name: String,
    pub kind: FeatureKind,
    pub id: u64,
    /// Relation level tags. Empty for ways, their tags come in by promotion.
    pub tags: OsmMap,
    pub members: Vec<BuildingMember>,
    /// false: the caller wants no solid, the height becomes 0
    pub extruded: bool,
}

impl BuildingSource {
    pub fn from_way(id: u64, fragment: FragmentId) -> Self {
        Self {
            name: format!("w{id}"),
            kind: FeatureKind::Way,
            id,
            tags: OsmMap::new(),
            members: vec![BuildingMember {
                fragment,
                role: Role::Outer,
            }],
            extruded: true,
        }
    }

    pub fn from_relation(id: u64, tags: OsmMap, members: Vec<BuildingMember>) -> Self {
        Self {
            name: format!("r{id}"),
            kind: FeatureKind::Relation,
            id,
            tags,
            members,
            extruded: true,
        }
    }

    pub fn fragment_views<'a>(&'a self, arena: &'a FragmentArena) -> Vec<FragmentView<'a>> {
        self.members
            .iter()
            .map(|member| {
                let fragment = arena.get(member.fragment);
                FragmentView {
                    source_id: fragment.source_id,
                    role: &member.role,
                    positions: &fragment.positions,
                }
            })
            .collect()
    }

    pub fn has_outer_member(&self) -> bool {
        self.members.iter().any(|member| member.role == Role::Outer)
    }

    /// Own tags over the tags of the outer ways
    pub fn promoted_tags(&self, arena: &FragmentArena) -> OsmMap {
        let mut outer: Vec<&Fragment> = self
            .members
            .iter()
            .filter(|member| member.role == Role::Outer)
            .map(|member| arena.get(member.fragment))
            .collect();
        outer.sort_by_key(|fragment| fragment.source_id);
        promote_tags(&self.tags, outer.into_iter().map(|fragment| &fragment.tags))
    }
}

/// What the input delivered, ready for conversion
#[derive(Debug, Default)]
pub struct BuildingLayer {
    pub arena: FragmentArena,
    pub sources: Vec<BuildingSource>,
    pub diagnostics: Diagnostics,
    /// nodes + ways + relations received
    pub element_count: usize,
}

struct OsmWay {
    nodes: Vec<u64>,
    tags: OsmMap,
}

struct OsmRelation {
    members: Vec<Member>,
    tags: OsmMap,
}

fn is_building(tags: &OsmMap) -> bool {
    tags_get_yes(tags, "building").is_some() || tags_get_yes(tags, "building:part").is_some()
}

fn is_part_only(tags: &OsmMap) -> bool {
    tags_get_yes(tags, "building").is_none() && tags_get_yes(tags, "building:part").is_some()
}

//////////////////////////////// Osm2Layer //////////////////////////////

pub struct Osm2Layer {
    ground_null_coordinates: GeographicCoordinates,
    nodes_map: HashMap<u64, GroundPosition>,
    ways_map: BTreeMap<u64, OsmWay>,
    relations_map: BTreeMap<u64, OsmRelation>,
    skip_parts: bool,
    element_count: usize,
}

impl Osm2Layer {
    pub fn create(ground_null_coordinates: GeographicCoordinates, skip_parts: bool) -> Self {
        Self {
            ground_null_coordinates,
            nodes_map: HashMap::new(),
            ways_map: BTreeMap::new(),
            relations_map: BTreeMap::new(),
            skip_parts,
            element_count: 0,
        }
    }

    pub fn add_node(&mut self, id: u64, latitude: f64, longitude: f64) {
        self.element_count += 1;
        self.nodes_map.insert(
            id,
            self.ground_null_coordinates
                .coordinates_to_position(latitude, longitude),
        );
    }

    pub fn add_way(&mut self, id: u64, nodes: Vec<u64>, tags: Option<OsmMap>) {
        self.element_count += 1;
        let tags = tags.unwrap_or_default();
        // A way may come twice: as a building with tags and as a stripped relation member
        if let Some(known) = self.ways_map.get(&id) {
            if !known.tags.is_empty() || tags.is_empty() {
                return;
            }
        }
        self.ways_map.insert(id, OsmWay { nodes, tags });
    }

    pub fn add_relation(&mut self, id: u64, members: Vec<Member>, tags: Option<OsmMap>) {
        self.element_count += 1;
        self.relations_map.insert(
            id,
            OsmRelation {
                members,
                tags: tags.unwrap_or_default(),
            },
        );
    }

    /// Relations first, then the ways that are no member of any relation. Both by id.
    pub fn process_elements(self) -> BuildingLayer {
        let mut diagnostics = Diagnostics::new();
        let mut arena = FragmentArena::new();
        let mut fragment_ids: HashMap<u64, FragmentId> = HashMap::new();

        for (way_id, way) in &self.ways_map {
            let mut positions = Vec::with_capacity(way.nodes.len());
            for node_id in &way.nodes {
                match self.nodes_map.get(node_id) {
                    Some(position) => positions.push(*position),
                    None => diagnostics.record(
                        &format!("w{way_id}"),
                        DefectKind::MissingNode {
                            way_id: *way_id,
                            node_id: *node_id,
                        },
                    ),
                }
            }
            let fragment_id = arena.push(Fragment {
                source_id: *way_id,
                positions,
                tags: way.tags.clone(),
            });
            fragment_ids.insert(*way_id, fragment_id);
        }

        let mut sources = Vec::new();
        // Ways of any relation are never buildings on their own
        let mut ways_in_relations: BTreeSet<u64> = BTreeSet::new();

        for (relation_id, relation) in &self.relations_map {
            let name = format!("r{relation_id}");
            let mut members = Vec::new();
            for member in &relation.members {
                match member.member_type.as_str() {
                    "way" => (),
                    // Cascaded relations have no standardized semantics
                    "relation" => {
                        info!("skipping sub-relation {} of {name}", member.reference);
                        continue;
                    }
                    _ => continue,
                }
                ways_in_relations.insert(member.reference);
                match fragment_ids.get(&member.reference) {
                    Some(fragment) => members.push(BuildingMember {
                        fragment: *fragment,
                        role: Role::from_tag(&member.role),
                    }),
                    None => diagnostics.record(
                        &name,
                        DefectKind::MissingMember {
                            way_id: member.reference,
                        },
                    ),
                }
            }

            let relation_type = relation
                .tags
                .get("type")
                .map(|relation_type| relation_type.as_str())
                .unwrap_or("multipolygon");
            if relation_type != "multipolygon" || !is_building(&relation.tags) {
                debug!("{name} is no building multipolygon");
                continue;
            }

            let mut source = BuildingSource::from_relation(*relation_id, relation.tags.clone(), members);
            source.extruded = !(self.skip_parts && is_part_only(&relation.tags));
            sources.push(source);
        }

        for (way_id, way) in &self.ways_map {
            if ways_in_relations.contains(way_id) || !is_building(&way.tags) {
                continue;
            }
            let mut source = BuildingSource::from_way(*way_id, fragment_ids[way_id]);
            source.extruded = !(self.skip_parts && is_part_only(&way.tags));
            sources.push(source);
        }

        info!(
            "{} nodes, {} ways, {} relations: {} buildings, {} ways in relations",
            self.nodes_map.len(),
            self.ways_map.len(),
            self.relations_map.len(),
            sources.len(),
            ways_in_relations.len()
        );

        BuildingLayer {
            arena,
            sources,
            diagnostics,
            element_count: self.element_count,
        }
    }
}
