//// The input is OSM-Json from the Overpass API, the output are 3D solids as Json
//// The core is independent of both: building sources in, solids and defects out

mod input_osm_json;
mod osm2layers;

// Interface from the input module to the geometry core
mod kernel_in;

// The geometry core
mod defects;
mod error;
mod footprint;
mod pipeline;
mod rings;
mod symbolic_3d;
mod tagticks;

// Interface from the core to an output
mod kernel_out;

mod main_async;

pub use defects::{Defect, DefectKind, Diagnostics};
pub use error::{ConvertError, Result};
pub use footprint::{Footprint, build_footprints};
pub use input_osm_json::*;
pub use kernel_in::{
    BoundingBox, GeographicCoordinates, GroundPosition, LAT_FAKT, Member, OsmMap, SolidPosition,
    TILE_ZOOM,
};
pub use kernel_out::*;
pub use main_async::*;
pub use osm2layers::{
    BuildingLayer, BuildingMember, BuildingSource, FeatureKind, Fragment, FragmentArena,
    FragmentId, Osm2Layer,
};
pub use pipeline::*;
pub use rings::{AssembledRings, FragmentView, Ring, Role, assemble_rings};
pub use symbolic_3d::build_solid;
pub use tagticks::{Attributes, RenderColor, RoofShape, promote_tags, resolve_attributes};
