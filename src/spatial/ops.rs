use crate::domain::model::{Coord, Portfolio, Predicate, SpatialJoinConfig};
use crate::spatial::geometry::{project, Geometry};
use crate::spatial::index::GridIndex;
use serde_json::Value;
use std::collections::HashMap;

pub const PROTECTED_SITE_CODE: &str = "protected_site_code";
pub const PROTECTED_SITE_NAME: &str = "protected_site_name";
pub const LANDCOVER_CODE: &str = "landcover_code";
pub const LANDCOVER_LABEL: &str = "landcover_label";
pub const DIST_WATER_M: &str = "dist_water_m";
pub const NEAREST_WATER_ID: &str = "nearest_water_id";
pub const NEAR_WATER: &str = "near_water";

/// One feature of a reference layer (protected sites, land cover, water).
#[derive(Debug, Clone)]
pub struct RefFeature {
    pub attrs: HashMap<String, Value>,
    pub geometry: Geometry,
}

impl RefFeature {
    pub fn attr(&self, key: &str) -> Value {
        self.attrs.get(key).cloned().unwrap_or(Value::Null)
    }
}

/// Predicate test between a portfolio point (optionally buffered) and a
/// reference geometry.
fn predicate_matches(geometry: &Geometry, location: Coord, cfg: &SpatialJoinConfig) -> bool {
    let buffer = cfg.buffer_meters.filter(|b| *b > 0.0);
    match cfg.predicate {
        // A point (buffered or not) never contains a reference polygon.
        Predicate::Contains => false,
        Predicate::Intersects => match buffer {
            Some(b) => geometry.distance_to(location) <= b,
            None => geometry.contains(location),
        },
        Predicate::Within => match buffer {
            // The whole buffered disc must lie inside.
            Some(b) => match geometry {
                Geometry::Point(_) => false,
                Geometry::Polygon(p) => p.contains(location) && p.boundary_distance(location) >= b,
                Geometry::MultiPolygon(ps) => ps
                    .iter()
                    .any(|p| p.contains(location) && p.boundary_distance(location) >= b),
            },
            // For a bare point, within and intersects coincide.
            None => geometry.contains(location),
        },
    }
}

/// Join protected-site attributes onto the portfolio. Left join keeps
/// unmatched rows with null site attributes; inner join drops them. When a
/// point falls in several sites the first one in layer order wins.
pub fn intersect_protected_sites(
    mut portfolio: Portfolio,
    sites: &[RefFeature],
    cfg: &SpatialJoinConfig,
) -> Portfolio {
    portfolio.push_column(PROTECTED_SITE_CODE);
    portfolio.push_column(PROTECTED_SITE_NAME);

    let mut kept = Vec::with_capacity(portfolio.records.len());
    for mut record in portfolio.records {
        let hit = record
            .location
            .and_then(|loc| sites.iter().find(|s| predicate_matches(&s.geometry, loc, cfg)));

        match hit {
            Some(site) => {
                record.set(PROTECTED_SITE_CODE, site.attr("site_code"));
                record.set(PROTECTED_SITE_NAME, site.attr("site_name"));
                kept.push(record);
            }
            None => {
                if cfg.join_how == crate::domain::model::JoinHow::Left {
                    record.set_null(PROTECTED_SITE_CODE);
                    record.set_null(PROTECTED_SITE_NAME);
                    kept.push(record);
                }
            }
        }
    }
    portfolio.records = kept;
    portfolio
}

/// Copy land-cover attributes onto each point (always a left intersects join,
/// matching how the original overlay behaved).
pub fn overlay_landcover(mut portfolio: Portfolio, landcover: &[RefFeature]) -> Portfolio {
    portfolio.push_column(LANDCOVER_CODE);
    portfolio.push_column(LANDCOVER_LABEL);

    for record in &mut portfolio.records {
        let hit = record
            .location
            .and_then(|loc| landcover.iter().find(|f| f.geometry.contains(loc)));
        match hit {
            Some(f) => {
                record.set(LANDCOVER_CODE, f.attr("landcover_code"));
                record.set(LANDCOVER_LABEL, f.attr("landcover_label"));
            }
            None => {
                record.set_null(LANDCOVER_CODE);
                record.set_null(LANDCOVER_LABEL);
            }
        }
    }
    portfolio
}

/// Distance from each located point to the nearest water feature, in meters.
/// Only point-typed water features enter the index; rows without a location
/// (or an empty layer) keep null distance attributes.
pub fn distance_to_nearest_water(mut portfolio: Portfolio, water: &[RefFeature]) -> Portfolio {
    portfolio.push_column(DIST_WATER_M);
    portfolio.push_column(NEAREST_WATER_ID);

    let mut projected = Vec::new();
    let mut feature_index = Vec::new();
    for (i, f) in water.iter().enumerate() {
        if let Geometry::Point(c) = f.geometry {
            projected.push(project(c));
            feature_index.push(i);
        }
    }
    let index = GridIndex::new(projected, 1000.0);

    for record in &mut portfolio.records {
        let nearest = record
            .location
            .filter(|_| !index.is_empty())
            .and_then(|loc| index.nearest(project(loc)));

        match nearest {
            Some((slot, dist)) => {
                let feature = &water[feature_index[slot]];
                let water_id = match feature.attrs.get("water_id") {
                    Some(v) if !v.is_null() => v.clone(),
                    _ => Value::from(feature_index[slot] as i64),
                };
                record.set(DIST_WATER_M, json_number(dist));
                record.set(NEAREST_WATER_ID, water_id);
            }
            None => {
                record.set_null(DIST_WATER_M);
                record.set_null(NEAREST_WATER_ID);
            }
        }
    }
    portfolio
}

/// Boolean near-water flag from the distance column; a null distance means
/// the flag stays false.
pub fn flag_within_water_threshold(mut portfolio: Portfolio, threshold_m: f64) -> Portfolio {
    portfolio.push_column(NEAR_WATER);
    for record in &mut portfolio.records {
        let near = record
            .number(DIST_WATER_M)
            .map(|d| d <= threshold_m)
            .unwrap_or(false);
        record.set(NEAR_WATER, Value::Bool(near));
    }
    portfolio
}

fn json_number(v: f64) -> Value {
    serde_json::Number::from_f64(v).map(Value::Number).unwrap_or(Value::Null)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::{JoinHow, SiteRecord};
    use crate::spatial::geometry::Polygon;

    fn poly(half: f64) -> Geometry {
        Geometry::Polygon(Polygon::new(
            vec![
                Coord::new(-half, -half),
                Coord::new(half, -half),
                Coord::new(half, half),
                Coord::new(-half, half),
            ],
            vec![],
        ))
    }

    fn toy() -> (Portfolio, Vec<RefFeature>, Vec<RefFeature>, Vec<RefFeature>) {
        let mut portfolio = Portfolio::new(vec!["name".to_string()]);
        let mut record = SiteRecord::new();
        record.set("name", Value::from("Plant A"));
        record.location = Some(Coord::new(0.0, 0.0));
        portfolio.records.push(record);

        let sites = vec![RefFeature {
            attrs: HashMap::from([
                ("site_code".to_string(), Value::from("ABC")),
                ("site_name".to_string(), Value::from("Site A")),
            ]),
            geometry: poly(0.1),
        }];
        let landcover = vec![RefFeature {
            attrs: HashMap::from([
                ("landcover_code".to_string(), Value::from("111")),
                ("landcover_label".to_string(), Value::from("Urban")),
            ]),
            geometry: poly(1.0),
        }];
        let water = vec![RefFeature {
            attrs: HashMap::from([("water_id".to_string(), Value::from("W1"))]),
            geometry: Geometry::Point(Coord::new(0.005, 0.0)),
        }];
        (portfolio, sites, landcover, water)
    }

    #[test]
    fn test_protected_sites_left_join() {
        let (portfolio, sites, _, _) = toy();
        let cfg = SpatialJoinConfig::default();
        let out = intersect_protected_sites(portfolio, &sites, &cfg);
        assert_eq!(out.records[0].text(PROTECTED_SITE_CODE), Some("ABC"));
        assert!(out.columns.contains(&PROTECTED_SITE_CODE.to_string()));
    }

    #[test]
    fn test_protected_sites_inner_join_drops_unmatched() {
        let (mut portfolio, sites, _, _) = toy();
        let mut far = SiteRecord::new();
        far.set("name", Value::from("Plant B"));
        far.location = Some(Coord::new(5.0, 5.0));
        portfolio.records.push(far);

        let cfg = SpatialJoinConfig {
            join_how: JoinHow::Inner,
            ..Default::default()
        };
        let out = intersect_protected_sites(portfolio, &sites, &cfg);
        assert_eq!(out.len(), 1);
        assert_eq!(out.records[0].text("name"), Some("Plant A"));
    }

    #[test]
    fn test_buffer_catches_nearby_point() {
        let (mut portfolio, sites, _, _) = toy();
        // ~0.11 deg east of the square edge, about 1100m outside it
        portfolio.records[0].location = Some(Coord::new(0.11, 0.0));

        let unbuffered = intersect_protected_sites(portfolio.clone(), &sites, &SpatialJoinConfig::default());
        assert!(unbuffered.records[0].get(PROTECTED_SITE_CODE).unwrap().is_null());

        let cfg = SpatialJoinConfig {
            buffer_meters: Some(2000.0),
            ..Default::default()
        };
        let buffered = intersect_protected_sites(portfolio, &sites, &cfg);
        assert_eq!(buffered.records[0].text(PROTECTED_SITE_CODE), Some("ABC"));
    }

    #[test]
    fn test_within_unbuffered_matches_inside_point() {
        let (portfolio, sites, _, _) = toy();
        let cfg = SpatialJoinConfig {
            predicate: Predicate::Within,
            ..Default::default()
        };
        let out = intersect_protected_sites(portfolio, &sites, &cfg);
        assert_eq!(out.records[0].text(PROTECTED_SITE_CODE), Some("ABC"));
    }

    #[test]
    fn test_within_buffer_needs_clearance_from_boundary() {
        let (mut portfolio, sites, _, _) = toy();
        let cfg = SpatialJoinConfig {
            predicate: Predicate::Within,
            buffer_meters: Some(2000.0),
            ..Default::default()
        };

        // ~556m inside the eastern edge, closer than the buffer radius
        portfolio.records[0].location = Some(Coord::new(0.095, 0.0));
        let near_edge = intersect_protected_sites(portfolio.clone(), &sites, &cfg);
        assert!(near_edge.records[0].get(PROTECTED_SITE_CODE).unwrap().is_null());

        // the centre is ~11km from every edge
        portfolio.records[0].location = Some(Coord::new(0.0, 0.0));
        let centre = intersect_protected_sites(portfolio, &sites, &cfg);
        assert_eq!(centre.records[0].text(PROTECTED_SITE_CODE), Some("ABC"));
    }

    #[test]
    fn test_contains_predicate_matches_nothing_for_points() {
        let (portfolio, sites, _, _) = toy();
        let cfg = SpatialJoinConfig {
            predicate: Predicate::Contains,
            ..Default::default()
        };
        let out = intersect_protected_sites(portfolio, &sites, &cfg);
        assert!(out.records[0].get(PROTECTED_SITE_CODE).unwrap().is_null());
    }

    #[test]
    fn test_overlay_landcover() {
        let (portfolio, _, landcover, _) = toy();
        let out = overlay_landcover(portfolio, &landcover);
        assert_eq!(out.records[0].text(LANDCOVER_CODE), Some("111"));
        assert_eq!(out.records[0].text(LANDCOVER_LABEL), Some("Urban"));
    }

    #[test]
    fn test_distance_and_flag() {
        let (portfolio, _, _, water) = toy();
        let out = distance_to_nearest_water(portfolio, &water);
        let d = out.records[0].number(DIST_WATER_M).unwrap();
        // 0.005 deg of longitude at the equator, ~556m in Web Mercator
        assert!((d - 556.0).abs() < 5.0, "distance was {}", d);
        assert_eq!(out.records[0].text(NEAREST_WATER_ID), Some("W1"));

        let flagged = flag_within_water_threshold(out, 1000.0);
        assert_eq!(flagged.records[0].get(NEAR_WATER), Some(&Value::Bool(true)));

        let strict = flag_within_water_threshold(flagged, 100.0);
        assert_eq!(strict.records[0].get(NEAR_WATER), Some(&Value::Bool(false)));
    }

    #[test]
    fn test_unlocated_record_keeps_nulls() {
        let (mut portfolio, sites, landcover, water) = toy();
        portfolio.records[0].location = None;

        let out = intersect_protected_sites(portfolio, &sites, &SpatialJoinConfig::default());
        let out = overlay_landcover(out, &landcover);
        let out = distance_to_nearest_water(out, &water);
        let out = flag_within_water_threshold(out, 1000.0);

        let r = &out.records[0];
        assert!(r.get(PROTECTED_SITE_CODE).unwrap().is_null());
        assert!(r.get(LANDCOVER_CODE).unwrap().is_null());
        assert!(r.get(DIST_WATER_M).unwrap().is_null());
        assert_eq!(r.get(NEAR_WATER), Some(&Value::Bool(false)));
    }

    #[test]
    fn test_empty_water_layer() {
        let (portfolio, _, _, _) = toy();
        let out = distance_to_nearest_water(portfolio, &[]);
        assert!(out.records[0].get(DIST_WATER_M).unwrap().is_null());
        let out = flag_within_water_threshold(out, 1000.0);
        assert_eq!(out.records[0].get(NEAR_WATER), Some(&Value::Bool(false)));
    }
}
