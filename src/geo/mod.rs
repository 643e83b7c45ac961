pub mod geodesy;
pub mod polygon;

pub use geodesy::{distance_km, LatLon, EARTH_RADIUS_KM};
pub use polygon::{bounding_box, centroid, point_in_polygon, BoundingBox, Position};
