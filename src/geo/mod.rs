/// Geospatial primitives
///
/// Coordinates are always `[longitude, latitude]` in degrees. Distances use
/// a spherical Earth; polygon predicates work in plain lon/lat space.

pub mod locations;

pub use locations::LocationManager;

use crate::error::{CatalogError, CatalogResult};
use serde::{Deserialize, Serialize};

/// Mean Earth radius
pub const EARTH_RADIUS_METERS: f64 = 6_371_000.0;

/// Tolerance for "point lies on an edge"
const EDGE_EPSILON: f64 = 1e-12;

/// A validated WGS84 position
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinate {
    pub lon: f64,
    pub lat: f64,
}

impl Coordinate {
    pub fn new(lon: f64, lat: f64) -> CatalogResult<Self> {
        if !lon.is_finite() || !(-180.0..=180.0).contains(&lon) {
            return Err(CatalogError::InvalidArgument(format!(
                "longitude {} is outside [-180, 180]",
                lon
            )));
        }
        if !lat.is_finite() || !(-90.0..=90.0).contains(&lat) {
            return Err(CatalogError::InvalidArgument(format!(
                "latitude {} is outside [-90, 90]",
                lat
            )));
        }
        Ok(Self { lon, lat })
    }

    /// Parse raw query values named `lon_name` / `lat_name`
    pub fn parse_named(
        lon: Option<&str>,
        lat: Option<&str>,
        lon_name: &str,
        lat_name: &str,
    ) -> CatalogResult<Self> {
        Self::new(parse_number(lon, lon_name)?, parse_number(lat, lat_name)?)
    }

    /// Parse raw `longitude` / `latitude` query values
    pub fn parse(lon: Option<&str>, lat: Option<&str>) -> CatalogResult<Self> {
        Self::parse_named(lon, lat, "longitude", "latitude")
    }

    fn from_position(position: &Position) -> Self {
        Self {
            lon: position[0],
            lat: position[1],
        }
    }
}

fn parse_number(raw: Option<&str>, name: &str) -> CatalogResult<f64> {
    let raw = raw
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| CatalogError::InvalidArgument(format!("'{}' is required", name)))?;
    raw.parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| CatalogError::InvalidArgument(format!("'{}' must be a number", name)))
}

/// Parse an optional distance in meters; it must be finite and not negative
pub fn parse_distance(raw: Option<&str>) -> CatalogResult<Option<f64>> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(None),
        Some(raw) => match raw.parse::<f64>() {
            Ok(meters) if meters.is_finite() && meters >= 0.0 => Ok(Some(meters)),
            _ => Err(CatalogError::InvalidArgument(
                "'maxDistance' must be a non-negative number of meters".to_string(),
            )),
        },
    }
}

/// Central angle between two positions, in radians (haversine)
pub fn central_angle(a: Coordinate, b: Coordinate) -> f64 {
    let (lat1, lat2) = (a.lat.to_radians(), b.lat.to_radians());
    let dlat = lat2 - lat1;
    let dlon = (b.lon - a.lon).to_radians();

    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    2.0 * h.sqrt().min(1.0).asin()
}

/// Great-circle distance in meters
pub fn great_circle_distance(a: Coordinate, b: Coordinate) -> f64 {
    central_angle(a, b) * EARTH_RADIUS_METERS
}

/// Whether `point` lies in the spherical cap around `center`
pub fn within_cap(center: Coordinate, point: Coordinate, radius_meters: f64) -> bool {
    central_angle(center, point) <= radius_meters / EARTH_RADIUS_METERS
}

/// GeoJSON position
pub type Position = [f64; 2];

/// The geometry kinds locations are stored with
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "coordinates")]
pub enum Geometry {
    Point(Position),
    /// Outer ring first, then holes. Rings are closed.
    Polygon(Vec<Vec<Position>>),
}

impl Geometry {
    /// Every vertex of the geometry
    fn positions(&self) -> Vec<Coordinate> {
        match self {
            Geometry::Point(p) => vec![Coordinate::from_position(p)],
            Geometry::Polygon(rings) => rings
                .iter()
                .flatten()
                .map(Coordinate::from_position)
                .collect(),
        }
    }
}

/// Axis-aligned rectangle spanned by two corners in lon/lat space
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub start: Coordinate,
    pub end: Coordinate,
}

impl BoundingBox {
    pub fn new(start: Coordinate, end: Coordinate) -> Self {
        Self { start, end }
    }

    /// Closed ring `start, (end.lon, start.lat), end, (start.lon, end.lat), start`
    pub fn ring(&self) -> Vec<Position> {
        vec![
            [self.start.lon, self.start.lat],
            [self.end.lon, self.start.lat],
            [self.end.lon, self.end.lat],
            [self.start.lon, self.end.lat],
            [self.start.lon, self.start.lat],
        ]
    }

    /// Inclusive containment of a position
    pub fn contains(&self, point: Coordinate) -> bool {
        let (min_lon, max_lon) = min_max(self.start.lon, self.end.lon);
        let (min_lat, max_lat) = min_max(self.start.lat, self.end.lat);
        (min_lon..=max_lon).contains(&point.lon) && (min_lat..=max_lat).contains(&point.lat)
    }

    /// A geometry is within the box when all of its vertices are; the box is
    /// convex, so this covers every edge too
    pub fn contains_geometry(&self, geometry: &Geometry) -> bool {
        let positions = geometry.positions();
        !positions.is_empty() && positions.into_iter().all(|p| self.contains(p))
    }
}

fn min_max(a: f64, b: f64) -> (f64, f64) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RingPosition {
    Inside,
    Boundary,
    Outside,
}

fn on_segment(p: Coordinate, a: &Position, b: &Position) -> bool {
    let cross = (b[0] - a[0]) * (p.lat - a[1]) - (b[1] - a[1]) * (p.lon - a[0]);
    if cross.abs() > EDGE_EPSILON {
        return false;
    }
    let (min_lon, max_lon) = min_max(a[0], b[0]);
    let (min_lat, max_lat) = min_max(a[1], b[1]);
    (min_lon..=max_lon).contains(&p.lon) && (min_lat..=max_lat).contains(&p.lat)
}

/// Even-odd ray cast, edges detected first
fn ring_position(ring: &[Position], p: Coordinate) -> RingPosition {
    if ring.len() < 4 {
        return RingPosition::Outside;
    }

    let mut inside = false;
    for edge in ring.windows(2) {
        let (a, b) = (&edge[0], &edge[1]);
        if on_segment(p, a, b) {
            return RingPosition::Boundary;
        }
        if (a[1] > p.lat) != (b[1] > p.lat) {
            let lon_at = a[0] + (p.lat - a[1]) * (b[0] - a[0]) / (b[1] - a[1]);
            if p.lon < lon_at {
                inside = !inside;
            }
        }
    }

    if inside {
        RingPosition::Inside
    } else {
        RingPosition::Outside
    }
}

/// Point-in-polygon with edges counted as inside.
///
/// Points strictly inside a hole are outside the polygon; points on a hole's
/// edge still intersect it.
pub fn polygon_contains(rings: &[Vec<Position>], point: Coordinate) -> bool {
    let Some((outer, holes)) = rings.split_first() else {
        return false;
    };
    if ring_position(outer, point) == RingPosition::Outside {
        return false;
    }
    holes
        .iter()
        .all(|hole| ring_position(hole, point) != RingPosition::Inside)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(lon: f64, lat: f64) -> Coordinate {
        Coordinate::new(lon, lat).unwrap()
    }

    fn square(min: f64, max: f64) -> Vec<Position> {
        vec![[min, min], [max, min], [max, max], [min, max], [min, min]]
    }

    #[test]
    fn test_coordinate_parsing() {
        let c = Coordinate::parse(Some("-9.14"), Some("38.72")).unwrap();
        assert_eq!(c, Coordinate { lon: -9.14, lat: 38.72 });

        assert!(matches!(
            Coordinate::parse(Some("abc"), Some("38.72")),
            Err(CatalogError::InvalidArgument(_))
        ));
        assert!(Coordinate::parse(None, Some("38.72")).is_err());
        assert!(Coordinate::parse(Some("NaN"), Some("1")).is_err());
        // Transposed input is caught by the latitude bound
        assert!(Coordinate::parse(Some("38.72"), Some("-123.0")).is_err());
    }

    #[test]
    fn test_parse_distance() {
        assert_eq!(parse_distance(None).unwrap(), None);
        assert_eq!(parse_distance(Some("250")).unwrap(), Some(250.0));
        assert!(parse_distance(Some("-1")).is_err());
        assert!(parse_distance(Some("far")).is_err());
    }

    #[test]
    fn test_great_circle_distance() {
        // One degree of longitude along the equator
        let d = great_circle_distance(at(0.0, 0.0), at(1.0, 0.0));
        assert!((d - 111_194.93).abs() < 1.0);

        assert_eq!(great_circle_distance(at(10.0, 20.0), at(10.0, 20.0)), 0.0);

        // Lisbon to Porto is roughly 274 km
        let d = great_circle_distance(at(-9.1393, 38.7223), at(-8.6291, 41.1579));
        assert!((270_000.0..280_000.0).contains(&d));
    }

    #[test]
    fn test_within_cap() {
        let center = at(0.0, 0.0);
        // 0.004 degrees of latitude is about 445 m
        assert!(within_cap(center, at(0.0, 0.004), 500.0));
        assert!(!within_cap(center, at(0.0, 0.005), 500.0));
    }

    #[test]
    fn test_bounding_box_route() {
        let route = BoundingBox::new(at(0.0, 0.0), at(2.0, 2.0));
        assert!(route.contains(at(1.0, 1.0)));
        assert!(!route.contains(at(3.0, 3.0)));
        assert_eq!(route.ring().len(), 5);
        assert_eq!(route.ring().first(), route.ring().last());

        // Corners may be given in any order
        let reversed = BoundingBox::new(at(2.0, 2.0), at(0.0, 0.0));
        assert!(reversed.contains(at(1.0, 1.0)));
    }

    #[test]
    fn test_bounding_box_geometry() {
        let route = BoundingBox::new(at(0.0, 0.0), at(2.0, 2.0));
        assert!(route.contains_geometry(&Geometry::Polygon(vec![square(0.5, 1.5)])));
        assert!(!route.contains_geometry(&Geometry::Polygon(vec![square(1.0, 3.0)])));
        assert!(route.contains_geometry(&Geometry::Point([2.0, 0.0])));
    }

    #[test]
    fn test_polygon_contains() {
        let rings = vec![square(0.0, 4.0)];
        assert!(polygon_contains(&rings, at(2.0, 2.0)));
        assert!(polygon_contains(&rings, at(0.0, 2.0)));
        assert!(polygon_contains(&rings, at(4.0, 4.0)));
        assert!(!polygon_contains(&rings, at(5.0, 2.0)));
    }

    #[test]
    fn test_polygon_with_hole() {
        let rings = vec![square(0.0, 4.0), square(1.0, 3.0)];
        assert!(!polygon_contains(&rings, at(2.0, 2.0)));
        assert!(polygon_contains(&rings, at(1.0, 2.0)));
        assert!(polygon_contains(&rings, at(0.5, 0.5)));
    }

    #[test]
    fn test_geometry_serde() {
        let point: Geometry =
            serde_json::from_value(serde_json::json!({"type": "Point", "coordinates": [-9.1, 38.7]}))
                .unwrap();
        assert_eq!(point, Geometry::Point([-9.1, 38.7]));

        let line: Result<Geometry, _> = serde_json::from_value(
            serde_json::json!({"type": "LineString", "coordinates": [[0.0, 0.0], [1.0, 1.0]]}),
        );
        assert!(line.is_err());
    }
}
