//! Defects: everything that went wrong with a single building and was recovered locally.
//!
//! A defect never aborts the run. The offending ring, hole or footprint is dropped,
//! the defect is logged and collected into [`Diagnostics`] for the caller.

use log::warn;
use serde::Serialize;
use std::collections::BTreeMap;
use thiserror::Error;

use crate::rings::Role;

#[derive(Error, Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DefectKind {
    #[error("{role} chain of ways {sources:?} does not close")]
    UnclosedRing { role: Role, sources: Vec<u64> },

    #[error("{role} ring of ways {sources:?} is degenerate")]
    DegenerateRing { role: Role, sources: Vec<u64> },

    #[error("hole with first position ({east:.3}, {north:.3}) lies in no outer ring")]
    OrphanedHole { east: f64, north: f64 },

    #[error("footprint {footprint} intersects itself")]
    SelfIntersection { footprint: usize },

    #[error("footprint {footprint} could not be triangulated: {reason}")]
    DegenerateTriangulation { footprint: usize, reason: String },

    #[error("way {source_id} has fewer than 2 positions")]
    ShortFragment { source_id: u64 },

    #[error("no usable outer way")]
    EmptyFeature,

    #[error("member way {way_id} is not part of the dataset")]
    MissingMember { way_id: u64 },

    #[error("node {node_id} of way {way_id} is not part of the dataset")]
    MissingNode { way_id: u64, node_id: u64 },

    #[error("unparsable tag {key}={value}")]
    UnparsableTag { key: String, value: String },

    #[error("min_height {min_height} is not below height {height}")]
    InvertedHeights { min_height: f64, height: f64 },
}

impl DefectKind {
    pub fn label(&self) -> &'static str {
        match self {
            DefectKind::UnclosedRing { .. } => "unclosed_ring",
            DefectKind::DegenerateRing { .. } => "degenerate_ring",
            DefectKind::OrphanedHole { .. } => "orphaned_hole",
            DefectKind::SelfIntersection { .. } => "self_intersection",
            DefectKind::DegenerateTriangulation { .. } => "degenerate_triangulation",
            DefectKind::ShortFragment { .. } => "short_fragment",
            DefectKind::EmptyFeature => "empty_feature",
            DefectKind::MissingMember { .. } => "missing_member",
            DefectKind::MissingNode { .. } => "missing_node",
            DefectKind::UnparsableTag { .. } => "unparsable_tag",
            DefectKind::InvertedHeights { .. } => "inverted_heights",
        }
    }
}

/// A defect and the building (`w<id>` / `r<id>`) it belongs to
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Defect {
    pub building: String,
    #[serde(flatten)]
    pub kind: DefectKind,
}

impl std::fmt::Display for Defect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.building, self.kind)
    }
}

/// Side channel of defects. One per building while converting, merged afterwards.
#[derive(Clone, Debug, Default)]
pub struct Diagnostics {
    defects: Vec<Defect>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, building: &str, kind: DefectKind) {
        let defect = Defect {
            building: building.to_string(),
            kind,
        };
        warn!("{defect}");
        self.defects.push(defect);
    }

    pub fn merge(&mut self, other: Diagnostics) {
        self.defects.extend(other.defects);
    }

    pub fn defects(&self) -> &[Defect] {
        &self.defects
    }

    pub fn into_defects(self) -> Vec<Defect> {
        self.defects
    }

    pub fn is_empty(&self) -> bool {
        self.defects.is_empty()
    }

    pub fn count_of(&self, label: &str) -> usize {
        self.defects
            .iter()
            .filter(|defect| defect.kind.label() == label)
            .count()
    }

    /// Defect count per kind, sorted by kind
    pub fn summary(&self) -> BTreeMap<&'static str, usize> {
        let mut summary = BTreeMap::new();
        for defect in &self.defects {
            *summary.entry(defect.kind.label()).or_insert(0) += 1;
        }
        summary
    }
}
