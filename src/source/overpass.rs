use crate::geo::{BoundingBox, LatLon};
use crate::pool::Target;
use itertools::Itertools;
use serde::Deserialize;
use std::collections::HashMap;

/// Public Overpass API interpreter the queries are written for
pub const OVERPASS_ENDPOINT: &str = "https://overpass-api.de/api/interpreter";

/// Named highways within `radius_m` meters of `center`
pub fn circle_query(center: LatLon, radius_m: u32) -> String {
    format!(
        "[out:json];\nway[\"highway\"][\"name\"](around:{},{},{});\nout body;\n>;\nout skel qt;\n",
        radius_m, center.lat, center.lon
    )
}

/// Named highways inside any of the boxes
pub fn bbox_query(boxes: &[BoundingBox]) -> String {
    let clauses = boxes
        .iter()
        .map(|b| {
            format!(
                "  way[\"highway\"][\"name\"]({},{},{},{});",
                b.south, b.west, b.north, b.east
            )
        })
        .join("\n");

    format!("[out:json];\n(\n{clauses}\n);\nout body;\n>;\nout skel qt;\n")
}

#[derive(Debug, Clone, Deserialize)]
pub struct OverpassResponse {
    #[serde(default)]
    pub elements: Vec<Element>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Element {
    Node {
        id: i64,
        lat: f64,
        lon: f64,
    },
    Way {
        id: i64,
        #[serde(default)]
        nodes: Vec<i64>,
        #[serde(default)]
        tags: HashMap<String, String>,
    },
    #[serde(other)]
    Other,
}

impl OverpassResponse {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

/// One target per street name. A street is placed at the middle node of the
/// first way carrying its name; streets whose node is missing are dropped.
pub fn process_streets(response: &OverpassResponse) -> Vec<Target> {
    let nodes: HashMap<i64, LatLon> = response
        .elements
        .iter()
        .filter_map(|el| match el {
            Element::Node { id, lat, lon } => Some((*id, LatLon::new(*lat, *lon))),
            _ => None,
        })
        .collect();

    response
        .elements
        .iter()
        .filter_map(|el| match el {
            Element::Way { nodes, tags, .. } => tags.get("name").map(|name| (name, nodes)),
            _ => None,
        })
        .unique_by(|(name, _)| (*name).clone())
        .filter_map(|(name, way_nodes)| {
            let middle = way_nodes.get(way_nodes.len() / 2)?;
            let location = nodes.get(middle)?;
            Some(Target::new(name.clone(), *location))
        })
        .collect()
}
