// Internal Interface of the crate/lib between the input module and the geometry core

use serde::Deserialize;
use std::collections::HashMap;
use std::ops::Sub;

/// Factor to calculate meters from gps coordinates.decimals (latitude, North/South position)
pub static LAT_FAKT: f64 = 111100.0; // 111285; // exactly enough  111120 = 1.852 * 1000.0 * 60  // 1 NM per arc minute: 1 degree Lat = 60 NM = 111 km, 0.001 degree = 111 m
pub static PI: f64 = std::f64::consts::PI;

/// Zoom level of the tiles the front end requests
pub static TILE_ZOOM: u32 = 14;

/// Raw OSM key/value tags of a way or relation
pub type OsmMap = HashMap<String, String>;

/// Position of a solid vertex: east, north, height (z is up)
pub type SolidPosition = [f64; 3];

/// Member of an OSM relation, as the input delivers it
#[derive(Deserialize, Clone, Debug, PartialEq)]
pub struct Member {
    #[serde(rename = "type")]
    pub member_type: String,
    #[serde(rename = "ref")]
    pub reference: u64,
    #[serde(default)]
    pub role: String,
}

pub type Members = Vec<Member>;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GeographicCoordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeographicCoordinates {
    /// Projects a coordinate into the planar frame centered at `self`.
    /// Meters, good enough for the extent of a single tile.
    pub fn coordinates_to_position(&self, latitude: f64, longitude: f64) -> GroundPosition {
        // the closer to the pole, the smaller the tiles size in meters get
        let lon_fakt = LAT_FAKT * ((latitude / 180. * PI).abs()).cos();

        GroundPosition {
            north: (latitude - self.latitude) * LAT_FAKT,
            east: (longitude - self.longitude) * lon_fakt,
        }
    }

    /// Center of a slippy map tile. The whole run is projected around it.
    pub fn tile_center(tile_x: u32, tile_y: u32, zoom: u32) -> Self {
        Self {
            latitude: tile_y_to_latitude(tile_y as f64 + 0.5, zoom),
            longitude: tile_x_to_longitude(tile_x as f64 + 0.5, zoom),
        }
    }
}

// https://wiki.openstreetmap.org/wiki/Slippy_map_tilenames
pub fn tile_x_to_longitude(tile_x: f64, zoom: u32) -> f64 {
    tile_x / f64::powi(2.0, zoom as i32) * 360.0 - 180.0
}

pub fn tile_y_to_latitude(tile_y: f64, zoom: u32) -> f64 {
    let n = PI - 2.0 * PI * tile_y / f64::powi(2.0, zoom as i32);
    (0.5 * (n.exp() - (-n).exp())).atan().to_degrees()
}

// See for standard 2D features like Sub: https://docs.rs/vector2/latest/vector2/struct.Vector2.html
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GroundPosition {
    pub north: f64,
    pub east: f64,
}

impl Sub for GroundPosition {
    type Output = Self;

    fn sub(self, other: Self) -> Self {
        Self {
            north: self.north - other.north,
            east: self.east - other.east,
        }
    }
}

impl GroundPosition {
    pub const ZERO: Self = Self {
        north: 0.0,
        east: 0.0,
    };

    pub fn new(east: f64, north: f64) -> Self {
        Self { north, east }
    }

    /// z-component of the cross product (self - origin) x (other - origin)
    pub fn cross(&self, origin: &GroundPosition, other: &GroundPosition) -> f64 {
        let a = *self - *origin;
        let b = *other - *origin;
        a.east * b.north - a.north * b.east
    }

    /// Lift onto a horizontal plane. East is x, north is y.
    pub fn to_solid_position(self, height: f64) -> SolidPosition {
        [self.east, self.north, height]
    }
}

impl std::fmt::Display for GroundPosition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.east, self.north)
    }
}

/// Signed shoelace area of a ring given without its closing point.
/// Positive means counter-clockwise with east as x and north as y.
pub fn signed_area(positions: &[GroundPosition]) -> f64 {
    let count = positions.len();
    if count < 3 {
        return 0.0;
    }
    let mut sum = 0.0;
    for (index, position) in positions.iter().enumerate() {
        let next_position = positions[(index + 1) % count];
        sum += position.east * next_position.north - next_position.east * position.north;
    }
    sum / 2.0
}

/// Even-odd ray casting. Points on the boundary may fall either way.
pub fn polygon_contains(positions: &[GroundPosition], point: &GroundPosition) -> bool {
    let mut inside = false;
    let count = positions.len();
    if count < 3 {
        return false;
    }
    let mut last = positions[count - 1];
    for position in positions {
        if (position.north > point.north) != (last.north > point.north) {
            let east_at = (last.east - position.east) * (point.north - position.north)
                / (last.north - position.north)
                + position.east;
            if point.east < east_at {
                inside = !inside;
            }
        }
        last = *position;
    }
    inside
}

/// Geographic bounding box, as the Overpass API wants it
#[derive(Clone, Debug, PartialEq)]
pub struct BoundingBox {
    pub north: f64,
    pub south: f64,
    pub east: f64,
    pub west: f64,
}

impl BoundingBox {
    pub fn from_tile(tile_x: u32, tile_y: u32, zoom: u32) -> Self {
        BoundingBox {
            north: tile_y_to_latitude(tile_y as f64, zoom),
            south: tile_y_to_latitude(tile_y as f64 + 1.0, zoom),
            west: tile_x_to_longitude(tile_x as f64, zoom),
            east: tile_x_to_longitude(tile_x as f64 + 1.0, zoom),
        }
    }
}

// Overpass order: (south, west, north, east)
impl std::fmt::Display for BoundingBox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "({:.8},{:.8},{:.8},{:.8})",
            self.south, self.west, self.north, self.east
        )
    }
}
