use crate::geo::{distance_km, BoundingBox, LatLon};

use super::districts::District;
use super::overpass::{bbox_query, circle_query};
use super::SourceError;

pub const MIN_RADIUS_M: u32 = 500;
pub const MAX_RADIUS_M: u32 = 5000;
pub const RADIUS_STEP_M: u32 = 100;
pub const DEFAULT_RADIUS_M: u32 = 1000;

/// Turku market square, where the map opens
pub const DEFAULT_CENTER: LatLon = LatLon {
    lat: 60.4518,
    lon: 22.2666,
};

/// Snaps a radius onto the 500..=5000 m slider in 100 m steps
pub fn clamp_radius_m(radius_m: u32) -> u32 {
    let clamped = radius_m.clamp(MIN_RADIUS_M, MAX_RADIUS_M);
    let steps = (clamped + RADIUS_STEP_M / 2) / RADIUS_STEP_M;
    (steps * RADIUS_STEP_M).min(MAX_RADIUS_M)
}

/// Where streets are collected from
#[derive(Debug, Clone, PartialEq)]
pub enum SearchArea {
    Circle { center: LatLon, radius_m: u32 },
    Districts(Vec<District>),
}

impl SearchArea {
    pub fn circle(center: LatLon, radius_m: u32) -> Self {
        SearchArea::Circle {
            center,
            radius_m: clamp_radius_m(radius_m),
        }
    }

    pub fn districts(districts: Vec<District>) -> Result<Self, SourceError> {
        if districts.is_empty() {
            return Err(SourceError::NoDistrictsSelected);
        }
        Ok(SearchArea::Districts(districts))
    }

    /// District areas use their bounding boxes, matching what the query returns
    pub fn contains(&self, point: LatLon) -> bool {
        match self {
            SearchArea::Circle { center, radius_m } => {
                distance_km(*center, point) * 1000.0 <= *radius_m as f64
            }
            SearchArea::Districts(districts) => districts
                .iter()
                .filter_map(|d| d.bounding_box())
                .any(|b| b.contains(point)),
        }
    }

    pub fn bounding_boxes(&self) -> Vec<BoundingBox> {
        match self {
            SearchArea::Circle { center, radius_m } => {
                let dlat = *radius_m as f64 / 1000.0 / 111.195;
                let dlon = dlat / center.lat.to_radians().cos().max(1e-6);
                vec![BoundingBox {
                    north: center.lat + dlat,
                    south: center.lat - dlat,
                    east: center.lon + dlon,
                    west: center.lon - dlon,
                }]
            }
            SearchArea::Districts(districts) => {
                districts.iter().filter_map(|d| d.bounding_box()).collect()
            }
        }
    }

    pub fn overpass_query(&self) -> String {
        match self {
            SearchArea::Circle { center, radius_m } => circle_query(*center, *radius_m),
            SearchArea::Districts(_) => bbox_query(&self.bounding_boxes()),
        }
    }
}
