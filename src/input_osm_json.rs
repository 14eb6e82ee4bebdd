use bytes::Bytes;
use log::{debug, info, warn};
use serde::Deserialize;

use crate::error::{ConvertError, Result};
use crate::kernel_in::{BoundingBox, GeographicCoordinates, Members, OsmMap};
use crate::osm2layers::{BuildingLayer, Osm2Layer};

///////////////////////////////////////////////////////////////////////////////////////////////////
// JSON ///////////////////////////////////////////////////////////////////////////////////////////

pub static DEFAULT_API_URL: &str = "http://overpass-api.de/api/interpreter";

#[derive(Debug, Clone)]
pub struct InputOsm {
    api_url: String,
}

impl Default for InputOsm {
    fn default() -> Self {
        Self::new(DEFAULT_API_URL)
    }
}

impl InputOsm {
    pub fn new(api_url: &str) -> Self {
        Self {
            api_url: api_url.into(),
        }
    }

    /// All buildings, building parts and building multipolygons of the box,
    /// followed by the ways and nodes they use.
    // https://wiki.openstreetmap.org/wiki/Overpass_API/Overpass_QL
    pub fn overpass_query(&self, bounding_box: &BoundingBox) -> String {
        format!(
            "[out:json][timeout:25];(way[\"building\"]{bounding_box};way[\"building:part\"]{bounding_box};relation[\"building\"][\"type\"=\"multipolygon\"]{bounding_box};);out body;>;out skel qt;"
        )
    }

    pub async fn fetch_tile(&self, bounding_box: &BoundingBox) -> Result<Bytes> {
        let query = self.overpass_query(bounding_box);
        debug!("= Overpass URL: {} query: {query}", self.api_url);

        let response = reqwest::Client::new()
            .get(&self.api_url)
            .query(&[("data", query)])
            .send()
            .await?;
        match response.status().as_u16() {
            200 => (),
            400 => warn!("Bad Request: the query was rejected (400)"),
            429 => warn!("Too Many Requests: the API rate limit is reached (429)"),
            504 => warn!("Gateway Timeout: the API is overloaded (504)"),
            _ => (),
        }
        if !response.status().is_success() {
            return Err(ConvertError::HttpStatus(response.status().as_u16()));
        }
        let bytes = response.bytes().await?;
        info!("{} bytes received", bytes.len());
        Ok(bytes)
    }
}

// todo: &str   https://users.rust-lang.org/t/requires-that-de-must-outlive-static-issue/91344/10
#[derive(Deserialize, Debug, Clone)]
pub struct JsonElement {
    id: u64,
    #[serde(rename = "type")]
    element_type: String,
    lat: Option<f64>,
    lon: Option<f64>,
    nodes: Option<Vec<u64>>,
    members: Option<Members>,
    tags: Option<OsmMap>,
}

#[derive(Deserialize, Debug)]
pub struct JsonData {
    pub elements: Vec<JsonElement>,
}

pub fn scan_json_bytes_to_osm(
    bytes: &[u8],
    ground_null_coordinates: &GeographicCoordinates,
    skip_parts: bool,
) -> Result<BuildingLayer> {
    let json_data: JsonData = serde_json::from_slice(bytes)?;
    Ok(scan_json_to_osm(json_data, ground_null_coordinates, skip_parts))
}

pub fn scan_json_to_osm(
    json_data: JsonData,
    ground_null_coordinates: &GeographicCoordinates,
    skip_parts: bool,
) -> BuildingLayer {
    let mut osm2layer = Osm2Layer::create(*ground_null_coordinates, skip_parts);
    for element in json_data.elements {
        match element.element_type.as_str() {
            "node" => match (element.lat, element.lon) {
                (Some(latitude), Some(longitude)) => {
                    osm2layer.add_node(element.id, latitude, longitude)
                }
                _ => debug!("node {} without coordinates", element.id),
            },

            "way" => osm2layer.add_way(
                element.id,
                element.nodes.unwrap_or_default(),
                element.tags,
            ),

            "relation" => osm2layer.add_relation(
                element.id,
                element.members.unwrap_or_default(),
                element.tags,
            ),

            _ => warn!(
                "Unknown element type: {}  id: {}",
                element.element_type, element.id
            ),
        }
    }

    osm2layer.process_elements()
}
