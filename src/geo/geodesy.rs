use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Mean Earth radius used by the haversine formula
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// A point on the globe in degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLon {
    pub lat: f64,
    pub lon: f64,
}

impl LatLon {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// GeoJSON ordering: `[lon, lat]`
    pub fn to_position(self) -> [f64; 2] {
        [self.lon, self.lat]
    }

    pub fn from_position(p: [f64; 2]) -> Self {
        Self { lat: p[1], lon: p[0] }
    }
}

impl fmt::Display for LatLon {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.5},{:.5}", self.lat, self.lon)
    }
}

impl FromStr for LatLon {
    type Err = String;

    /// Accepts `lat,lon` or `lat lon`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|p| !p.is_empty())
            .collect();

        if parts.len() != 2 {
            return Err(format!("expected `lat,lon`, got `{s}`"));
        }

        let lat: f64 = parts[0]
            .parse()
            .map_err(|_| format!("invalid latitude `{}`", parts[0]))?;
        let lon: f64 = parts[1]
            .parse()
            .map_err(|_| format!("invalid longitude `{}`", parts[1]))?;

        if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lon) {
            return Err(format!("coordinates out of range: {lat},{lon}"));
        }

        Ok(LatLon::new(lat, lon))
    }
}

/// Great-circle distance between two points in kilometers (haversine)
pub fn distance_km(a: LatLon, b: LatLon) -> f64 {
    let d_lat = (b.lat - a.lat).to_radians();
    let d_lon = (b.lon - a.lon).to_radians();

    let h = (d_lat / 2.0).sin().powi(2)
        + a.lat.to_radians().cos() * b.lat.to_radians().cos() * (d_lon / 2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());

    EARTH_RADIUS_KM * c
}
