pub mod area;
pub mod districts;
pub mod overpass;

pub use area::{clamp_radius_m, SearchArea, DEFAULT_CENTER, DEFAULT_RADIUS_M};
pub use districts::{Anchor, District, DistrictSelection, DistrictSet};
pub use overpass::{process_streets, OverpassResponse};

use crate::pool::Target;
use log::{debug, info};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("could not read street data: {0}")]
    Io(#[from] std::io::Error),

    #[error("could not parse street data: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("bundled data file {0} is missing")]
    MissingData(String),

    #[error("select at least one district first")]
    NoDistrictsSelected,

    #[error("no street data; save the Overpass response for `streetfind query` and pass it with --overpass-file")]
    NoStreetData,
}

/// Anything that can list the named streets of an area
pub trait StreetSource {
    fn fetch_streets(&self, area: &SearchArea) -> Result<Vec<Target>, SourceError>;
}

/// Streets from an Overpass JSON response saved to disk
#[derive(Debug, Clone)]
pub struct OverpassFileSource {
    path: PathBuf,
}

impl OverpassFileSource {
    pub fn with_path<P: AsRef<Path>>(p: P) -> Self {
        Self {
            path: p.as_ref().to_path_buf(),
        }
    }
}

impl StreetSource for OverpassFileSource {
    fn fetch_streets(&self, area: &SearchArea) -> Result<Vec<Target>, SourceError> {
        let raw = fs::read_to_string(&self.path)?;
        let response = OverpassResponse::from_json(&raw)?;
        let all = process_streets(&response);
        let total = all.len();

        let streets: Vec<Target> = all
            .into_iter()
            .filter(|t| area.contains(t.location))
            .collect();

        debug!(
            "{}: {} of {} streets inside the area",
            self.path.display(),
            streets.len(),
            total
        );
        info!("found {} streets", streets.len());
        Ok(streets)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::LatLon;
    use tempfile::tempdir;

    const RESPONSE: &str = r#"{"elements": [
        {"type": "way", "id": 1, "nodes": [1], "tags": {"name": "Near"}},
        {"type": "way", "id": 2, "nodes": [2], "tags": {"name": "Far"}},
        {"type": "node", "id": 1, "lat": 60.451, "lon": 22.266},
        {"type": "node", "id": 2, "lat": 60.600, "lon": 22.266}
    ]}"#;

    #[test]
    fn test_file_source_filters_by_area() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("overpass.json");
        fs::write(&path, RESPONSE).unwrap();

        let source = OverpassFileSource::with_path(&path);
        let area = SearchArea::circle(LatLon::new(60.4518, 22.2666), 1000);
        let streets = source.fetch_streets(&area).unwrap();

        assert_eq!(streets.len(), 1);
        assert_eq!(streets[0].name, "Near");
    }

    #[test]
    fn test_file_source_missing_file() {
        let source = OverpassFileSource::with_path("/nonexistent/overpass.json");
        let area = SearchArea::circle(LatLon::new(60.45, 22.26), 1000);
        assert!(matches!(source.fetch_streets(&area), Err(SourceError::Io(_))));
    }

    #[test]
    fn test_file_source_bad_json() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("overpass.json");
        fs::write(&path, "rate limited").unwrap();
        let source = OverpassFileSource::with_path(&path);
        let area = SearchArea::circle(LatLon::new(60.45, 22.26), 1000);
        assert!(matches!(source.fetch_streets(&area), Err(SourceError::Parse(_))));
    }
}
