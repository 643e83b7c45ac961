use crate::geo::{bounding_box, centroid, point_in_polygon, BoundingBox, LatLon, Position};
use crate::pool::Target;
use clap::ValueEnum;
use include_dir::{include_dir, Dir};
use log::debug;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

use super::SourceError;

static DATA_DIR: Dir = include_dir!("$CARGO_MANIFEST_DIR/src/data");

/// File name of the bundled district outlines
pub const BUNDLED_DISTRICTS: &str = "turku_districts.geojson";

/// Feature properties that may carry the district name, in order of preference
const NAME_PROPERTIES: [&str; 3] = ["Nimi_FIN", "name", "nimi"];

/// Which point of a district the player has to find
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum, strum_macros::Display,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum Anchor {
    /// First vertex of the outer ring
    FirstVertex,
    #[default]
    Centroid,
}

#[derive(Debug, Clone, PartialEq)]
pub struct District {
    pub name: String,
    /// Outer ring of every polygon part
    pub rings: Vec<Vec<Position>>,
}

impl District {
    pub fn contains(&self, point: LatLon) -> bool {
        self.rings
            .iter()
            .any(|ring| point_in_polygon(point.to_position(), ring))
    }

    pub fn bounding_box(&self) -> Option<BoundingBox> {
        self.rings
            .iter()
            .filter_map(|ring| bounding_box(ring))
            .reduce(|a, b| a.union(&b))
    }

    pub fn anchor(&self, anchor: Anchor) -> Option<LatLon> {
        let ring = self.rings.first()?;
        match anchor {
            Anchor::FirstVertex => ring.first().map(|p| LatLon::from_position(*p)),
            Anchor::Centroid => centroid(ring),
        }
    }

    pub fn to_target(&self, anchor: Anchor) -> Option<Target> {
        self.anchor(anchor)
            .map(|location| Target::new(self.name.clone(), location))
    }
}

#[derive(Deserialize)]
struct FeatureCollection {
    features: Vec<Feature>,
}

#[derive(Deserialize)]
struct Feature {
    #[serde(default)]
    properties: HashMap<String, Value>,
    geometry: Option<Geometry>,
}

#[derive(Deserialize)]
#[serde(tag = "type")]
enum Geometry {
    Polygon { coordinates: Vec<Vec<Vec<f64>>> },
    MultiPolygon { coordinates: Vec<Vec<Vec<Vec<f64>>>> },
    #[serde(other)]
    Unsupported,
}

fn to_ring(raw: &[Vec<f64>]) -> Vec<Position> {
    raw.iter()
        .filter(|p| p.len() >= 2)
        .map(|p| [p[0], p[1]])
        .collect()
}

impl Feature {
    fn name(&self) -> Option<String> {
        NAME_PROPERTIES
            .iter()
            .filter_map(|key| self.properties.get(*key))
            .filter_map(|v| v.as_str())
            .map(|s| s.trim().to_string())
            .find(|s| !s.is_empty())
    }

    fn outer_rings(&self) -> Vec<Vec<Position>> {
        match &self.geometry {
            Some(Geometry::Polygon { coordinates }) => {
                coordinates.first().map(|r| to_ring(r)).into_iter().collect()
            }
            Some(Geometry::MultiPolygon { coordinates }) => coordinates
                .iter()
                .filter_map(|polygon| polygon.first())
                .map(|r| to_ring(r))
                .collect(),
            Some(Geometry::Unsupported) | None => Vec::new(),
        }
    }
}

/// Districts of a city, parsed from a GeoJSON feature collection
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DistrictSet {
    districts: Vec<District>,
}

impl DistrictSet {
    pub fn from_geojson(json: &str) -> Result<Self, SourceError> {
        let collection: FeatureCollection = serde_json::from_str(json)?;

        let districts = collection
            .features
            .into_iter()
            .filter_map(|feature| {
                let Some(name) = feature.name() else {
                    debug!("skipping district feature without a name");
                    return None;
                };
                let rings: Vec<Vec<Position>> = feature
                    .outer_rings()
                    .into_iter()
                    .filter(|r| r.len() >= 3)
                    .collect();
                if rings.is_empty() {
                    debug!("skipping district {name}: no polygon geometry");
                    return None;
                }
                Some(District { name, rings })
            })
            .collect();

        Ok(Self { districts })
    }

    pub fn from_districts(districts: Vec<District>) -> Self {
        Self { districts }
    }

    /// Outlines shipped inside the binary
    pub fn bundled() -> Result<Self, SourceError> {
        let file = DATA_DIR
            .get_file(BUNDLED_DISTRICTS)
            .ok_or_else(|| SourceError::MissingData(BUNDLED_DISTRICTS.to_string()))?;
        let json = file
            .contents_utf8()
            .ok_or_else(|| SourceError::MissingData(BUNDLED_DISTRICTS.to_string()))?;
        Self::from_geojson(json)
    }

    pub fn len(&self) -> usize {
        self.districts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.districts.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &District> {
        self.districts.iter()
    }

    pub fn get(&self, name: &str) -> Option<&District> {
        self.districts.iter().find(|d| d.name == name)
    }

    /// The district under a clicked point
    pub fn district_at(&self, point: LatLon) -> Option<&District> {
        self.districts.iter().find(|d| d.contains(point))
    }

    /// One target per district, for the district guessing game
    pub fn targets(&self, anchor: Anchor) -> Vec<Target> {
        self.districts
            .iter()
            .filter_map(|d| d.to_target(anchor))
            .collect()
    }

    pub fn bounding_box(&self) -> Option<BoundingBox> {
        self.districts
            .iter()
            .filter_map(|d| d.bounding_box())
            .reduce(|a, b| a.union(&b))
    }
}

/// Districts the player picked as the play area
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DistrictSelection {
    names: Vec<String>,
}

impl DistrictSelection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Selects the district, or deselects it when already selected.
    /// Returns whether it is selected afterwards.
    pub fn toggle(&mut self, name: &str) -> bool {
        if let Some(idx) = self.names.iter().position(|n| n == name) {
            self.names.remove(idx);
            false
        } else {
            self.names.push(name.to_string());
            true
        }
    }

    /// Selects the district, leaving it selected if it already was.
    /// Returns whether it was newly added.
    pub fn select(&mut self, name: &str) -> bool {
        if self.names.iter().any(|n| n == name) {
            return false;
        }
        self.names.push(name.to_string());
        true
    }

    /// Toggles whichever district lies under `point`
    pub fn toggle_at(&mut self, districts: &DistrictSet, point: LatLon) -> Option<bool> {
        let name = districts.district_at(point)?.name.clone();
        Some(self.toggle(&name))
    }

    pub fn clear(&mut self) {
        self.names.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Selected districts that exist in `districts`, in selection order
    pub fn resolve(&self, districts: &DistrictSet) -> Vec<District> {
        self.names
            .iter()
            .filter_map(|n| districts.get(n).cloned())
            .collect()
    }
}
