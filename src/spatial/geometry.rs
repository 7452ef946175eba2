use crate::domain::model::Coord;
use crate::utils::error::{Result, ScreenError};

/// Spherical earth radius used by Web Mercator (EPSG:3857).
pub const EARTH_RADIUS_M: f64 = 6_378_137.0;

/// Web Mercator latitude clamp; the projection diverges at the poles.
const MERCATOR_MAX_LAT: f64 = 85.06;

/// Projected point in meters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct XY {
    pub x: f64,
    pub y: f64,
}

impl XY {
    pub fn distance(&self, other: &XY) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }
}

/// Project a WGS84 coordinate to Web Mercator meters.
pub fn project(c: Coord) -> XY {
    let lat = c.lat.clamp(-MERCATOR_MAX_LAT, MERCATOR_MAX_LAT);
    XY {
        x: EARTH_RADIUS_M * c.lon.to_radians(),
        y: EARTH_RADIUS_M * (std::f64::consts::FRAC_PI_4 + lat.to_radians() / 2.0).tan().ln(),
    }
}

/// Distance from `p` to the segment `a`-`b`, all in projected meters.
pub fn point_segment_distance(p: XY, a: XY, b: XY) -> f64 {
    let abx = b.x - a.x;
    let aby = b.y - a.y;
    let len_sq = abx * abx + aby * aby;
    if len_sq == 0.0 {
        return p.distance(&a);
    }
    let t = (((p.x - a.x) * abx + (p.y - a.y) * aby) / len_sq).clamp(0.0, 1.0);
    p.distance(&XY {
        x: a.x + t * abx,
        y: a.y + t * aby,
    })
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BBox {
    pub min_lon: f64,
    pub min_lat: f64,
    pub max_lon: f64,
    pub max_lat: f64,
}

impl BBox {
    fn of_ring(ring: &[Coord]) -> Option<BBox> {
        let first = ring.first()?;
        let mut b = BBox {
            min_lon: first.lon,
            min_lat: first.lat,
            max_lon: first.lon,
            max_lat: first.lat,
        };
        for c in &ring[1..] {
            b.min_lon = b.min_lon.min(c.lon);
            b.min_lat = b.min_lat.min(c.lat);
            b.max_lon = b.max_lon.max(c.lon);
            b.max_lat = b.max_lat.max(c.lat);
        }
        Some(b)
    }

    pub fn contains(&self, c: Coord) -> bool {
        c.lon >= self.min_lon && c.lon <= self.max_lon && c.lat >= self.min_lat && c.lat <= self.max_lat
    }
}

/// Polygon as an exterior ring plus optional holes, WGS84 vertices.
/// Rings do not need to repeat the first vertex; closure is implicit.
#[derive(Debug, Clone, PartialEq)]
pub struct Polygon {
    pub exterior: Vec<Coord>,
    pub holes: Vec<Vec<Coord>>,
    bbox: Option<BBox>,
}

impl Polygon {
    pub fn new(exterior: Vec<Coord>, holes: Vec<Vec<Coord>>) -> Self {
        let bbox = BBox::of_ring(&exterior);
        Self {
            exterior,
            holes,
            bbox,
        }
    }

    pub fn bbox(&self) -> Option<BBox> {
        self.bbox
    }

    /// Even-odd point-in-polygon test; crossing counts over every ring make
    /// holes fall out naturally.
    pub fn contains(&self, c: Coord) -> bool {
        match self.bbox {
            Some(b) if !b.contains(c) => return false,
            None => return false,
            _ => {}
        }

        let mut inside = ring_crossings_odd(&self.exterior, c);
        for hole in &self.holes {
            if ring_crossings_odd(hole, c) {
                inside = !inside;
            }
        }
        inside
    }

    /// Distance in projected meters; zero when the point lies inside.
    pub fn distance_to(&self, c: Coord) -> f64 {
        if self.contains(c) {
            return 0.0;
        }
        self.boundary_distance(c)
    }

    /// Distance to the nearest ring segment, ignoring containment.
    pub fn boundary_distance(&self, c: Coord) -> f64 {
        let p = project(c);
        let mut best = f64::INFINITY;
        for ring in std::iter::once(&self.exterior).chain(self.holes.iter()) {
            best = best.min(ring_distance(ring, p));
        }
        best
    }
}

fn ring_crossings_odd(ring: &[Coord], c: Coord) -> bool {
    if ring.len() < 3 {
        return false;
    }
    let mut inside = false;
    let n = ring.len();
    let mut j = n - 1;
    for i in 0..n {
        let (a, b) = (ring[i], ring[j]);
        if (a.lat > c.lat) != (b.lat > c.lat) {
            let x = (b.lon - a.lon) * (c.lat - a.lat) / (b.lat - a.lat) + a.lon;
            if c.lon < x {
                inside = !inside;
            }
        }
        j = i;
    }
    inside
}

fn ring_distance(ring: &[Coord], p: XY) -> f64 {
    if ring.is_empty() {
        return f64::INFINITY;
    }
    let mut best = f64::INFINITY;
    let n = ring.len();
    for i in 0..n {
        let a = project(ring[i]);
        let b = project(ring[(i + 1) % n]);
        best = best.min(point_segment_distance(p, a, b));
    }
    best
}

/// Geometry of a reference-layer feature.
#[derive(Debug, Clone, PartialEq)]
pub enum Geometry {
    Point(Coord),
    Polygon(Polygon),
    MultiPolygon(Vec<Polygon>),
}

impl Geometry {
    pub fn contains(&self, c: Coord) -> bool {
        match self {
            Self::Point(_) => false,
            Self::Polygon(p) => p.contains(c),
            Self::MultiPolygon(ps) => ps.iter().any(|p| p.contains(c)),
        }
    }

    pub fn distance_to(&self, c: Coord) -> f64 {
        match self {
            Self::Point(p) => project(c).distance(&project(*p)),
            Self::Polygon(p) => p.distance_to(c),
            Self::MultiPolygon(ps) => ps
                .iter()
                .map(|p| p.distance_to(c))
                .fold(f64::INFINITY, f64::min),
        }
    }

    /// Parse a GeoJSON geometry object. Only the types the reference layers
    /// actually use are supported.
    pub fn from_geojson(value: &serde_json::Value) -> Result<Geometry> {
        let geom_type = value
            .get("type")
            .and_then(|t| t.as_str())
            .ok_or_else(|| ScreenError::SpatialError {
                message: "GeoJSON geometry has no type".to_string(),
            })?;
        let coords = value
            .get("coordinates")
            .ok_or_else(|| ScreenError::SpatialError {
                message: format!("GeoJSON {} has no coordinates", geom_type),
            })?;

        match geom_type {
            "Point" => Ok(Geometry::Point(parse_position(coords)?)),
            "Polygon" => Ok(Geometry::Polygon(parse_polygon(coords)?)),
            "MultiPolygon" => {
                let arr = coords.as_array().ok_or_else(|| ScreenError::SpatialError {
                    message: "MultiPolygon coordinates must be an array".to_string(),
                })?;
                let polys = arr
                    .iter()
                    .map(parse_polygon)
                    .collect::<Result<Vec<_>>>()?;
                Ok(Geometry::MultiPolygon(polys))
            }
            other => Err(ScreenError::SpatialError {
                message: format!("Unsupported GeoJSON geometry type: {}", other),
            }),
        }
    }
}

fn parse_position(value: &serde_json::Value) -> Result<Coord> {
    let arr = value.as_array().ok_or_else(|| ScreenError::SpatialError {
        message: "GeoJSON position must be an array".to_string(),
    })?;
    match (arr.first().and_then(|v| v.as_f64()), arr.get(1).and_then(|v| v.as_f64())) {
        (Some(lon), Some(lat)) => Ok(Coord::new(lon, lat)),
        _ => Err(ScreenError::SpatialError {
            message: "GeoJSON position must contain two numbers".to_string(),
        }),
    }
}

fn parse_ring(value: &serde_json::Value) -> Result<Vec<Coord>> {
    let arr = value.as_array().ok_or_else(|| ScreenError::SpatialError {
        message: "GeoJSON ring must be an array".to_string(),
    })?;
    arr.iter().map(parse_position).collect()
}

fn parse_polygon(value: &serde_json::Value) -> Result<Polygon> {
    let rings = value.as_array().ok_or_else(|| ScreenError::SpatialError {
        message: "Polygon coordinates must be an array of rings".to_string(),
    })?;
    let mut iter = rings.iter();
    let exterior = match iter.next() {
        Some(r) => parse_ring(r)?,
        None => {
            return Err(ScreenError::SpatialError {
                message: "Polygon has no exterior ring".to_string(),
            })
        }
    };
    let holes = iter.map(parse_ring).collect::<Result<Vec<_>>>()?;
    Ok(Polygon::new(exterior, holes))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square(cx: f64, cy: f64, half: f64) -> Polygon {
        Polygon::new(
            vec![
                Coord::new(cx - half, cy - half),
                Coord::new(cx + half, cy - half),
                Coord::new(cx + half, cy + half),
                Coord::new(cx - half, cy + half),
            ],
            vec![],
        )
    }

    #[test]
    fn test_point_in_square() {
        let p = square(0.0, 0.0, 0.1);
        assert!(p.contains(Coord::new(0.0, 0.0)));
        assert!(p.contains(Coord::new(0.09, -0.09)));
        assert!(!p.contains(Coord::new(0.2, 0.0)));
    }

    #[test]
    fn test_hole_excludes_point() {
        let mut p = square(0.0, 0.0, 1.0);
        let hole = vec![
            Coord::new(-0.2, -0.2),
            Coord::new(0.2, -0.2),
            Coord::new(0.2, 0.2),
            Coord::new(-0.2, 0.2),
        ];
        p = Polygon::new(p.exterior.clone(), vec![hole]);
        assert!(!p.contains(Coord::new(0.0, 0.0)));
        assert!(p.contains(Coord::new(0.5, 0.5)));
    }

    #[test]
    fn test_distance_zero_inside() {
        let p = square(0.0, 0.0, 0.1);
        assert_eq!(p.distance_to(Coord::new(0.0, 0.0)), 0.0);
    }

    #[test]
    fn test_distance_outside_roughly_one_degree() {
        // 0.01 degrees of longitude at the equator is ~1113m in Web Mercator.
        let p = square(0.0, 0.0, 0.1);
        let d = p.distance_to(Coord::new(0.11, 0.0));
        assert!((d - 1113.0).abs() < 10.0, "distance was {}", d);
    }

    #[test]
    fn test_point_geometry_distance() {
        let g = Geometry::Point(Coord::new(0.0, 0.0));
        let d = g.distance_to(Coord::new(0.01, 0.0));
        assert!((d - 1113.0).abs() < 10.0, "distance was {}", d);
    }

    #[test]
    fn test_geojson_polygon_roundtrip() {
        let v: serde_json::Value = serde_json::from_str(
            r#"{"type":"Polygon","coordinates":[[[0.0,0.0],[1.0,0.0],[1.0,1.0],[0.0,1.0],[0.0,0.0]]]}"#,
        )
        .unwrap();
        let g = Geometry::from_geojson(&v).unwrap();
        assert!(g.contains(Coord::new(0.5, 0.5)));
        assert!(!g.contains(Coord::new(1.5, 0.5)));
    }

    #[test]
    fn test_geojson_unsupported_type() {
        let v: serde_json::Value =
            serde_json::from_str(r#"{"type":"LineString","coordinates":[[0.0,0.0],[1.0,1.0]]}"#)
                .unwrap();
        assert!(Geometry::from_geojson(&v).is_err());
    }
}
