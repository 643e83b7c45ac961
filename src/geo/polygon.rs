use super::geodesy::LatLon;
use serde::{Deserialize, Serialize};

/// Vertex in GeoJSON order: `[lon, lat]`
pub type Position = [f64; 2];

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub north: f64,
    pub south: f64,
    pub east: f64,
    pub west: f64,
}

impl BoundingBox {
    pub fn contains(&self, p: LatLon) -> bool {
        p.lat >= self.south && p.lat <= self.north && p.lon >= self.west && p.lon <= self.east
    }

    pub fn union(&self, other: &BoundingBox) -> BoundingBox {
        BoundingBox {
            north: self.north.max(other.north),
            south: self.south.min(other.south),
            east: self.east.max(other.east),
            west: self.west.min(other.west),
        }
    }

    pub fn center(&self) -> LatLon {
        LatLon::new(
            (self.north + self.south) / 2.0,
            (self.east + self.west) / 2.0,
        )
    }
}

/// Ray casting test over a ring. The ring may or may not repeat its first vertex.
pub fn point_in_polygon(point: Position, ring: &[Position]) -> bool {
    if ring.len() < 3 {
        return false;
    }

    let (x, y) = (point[0], point[1]);
    let mut inside = false;
    let mut j = ring.len() - 1;

    for i in 0..ring.len() {
        let (xi, yi) = (ring[i][0], ring[i][1]);
        let (xj, yj) = (ring[j][0], ring[j][1]);

        let crosses = (yi > y) != (yj > y) && x < (xj - xi) * (y - yi) / (yj - yi) + xi;
        if crosses {
            inside = !inside;
        }
        j = i;
    }

    inside
}

pub fn bounding_box(ring: &[Position]) -> Option<BoundingBox> {
    if ring.is_empty() {
        return None;
    }

    let bbox = ring.iter().fold(
        BoundingBox {
            north: -90.0,
            south: 90.0,
            east: -180.0,
            west: 180.0,
        },
        |acc, p| BoundingBox {
            north: acc.north.max(p[1]),
            south: acc.south.min(p[1]),
            east: acc.east.max(p[0]),
            west: acc.west.min(p[0]),
        },
    );

    Some(bbox)
}

/// Area-weighted centroid of a ring, falling back to the vertex mean when the
/// ring has no area.
pub fn centroid(ring: &[Position]) -> Option<LatLon> {
    let vertices = open_ring(ring);
    if vertices.is_empty() {
        return None;
    }

    let mut twice_area = 0.0;
    let mut cx = 0.0;
    let mut cy = 0.0;

    for (i, a) in vertices.iter().enumerate() {
        let b = vertices[(i + 1) % vertices.len()];
        let cross = a[0] * b[1] - b[0] * a[1];
        twice_area += cross;
        cx += (a[0] + b[0]) * cross;
        cy += (a[1] + b[1]) * cross;
    }

    if twice_area.abs() < f64::EPSILON {
        let n = vertices.len() as f64;
        let lon = vertices.iter().map(|p| p[0]).sum::<f64>() / n;
        let lat = vertices.iter().map(|p| p[1]).sum::<f64>() / n;
        return Some(LatLon::new(lat, lon));
    }

    Some(LatLon::new(cy / (3.0 * twice_area), cx / (3.0 * twice_area)))
}

// Drops the closing vertex of a closed ring
fn open_ring(ring: &[Position]) -> &[Position] {
    match ring {
        [first, .., last] if first == last => &ring[..ring.len() - 1],
        _ => ring,
    }
}
