use crate::domain::model::{Coord, Portfolio, SiteRecord};
use crate::spatial::geometry::Geometry;
use crate::spatial::ops::RefFeature;
use crate::utils::error::{Result, ScreenError};
use serde_json::Value;
use std::collections::HashMap;

/// Read a portfolio CSV. When both coordinate columns are named and parse to
/// finite in-range numbers, the row gets a point location; otherwise the row
/// stays unlocated for later geocoding.
pub fn read_portfolio_csv(
    bytes: &[u8],
    lat_col: Option<&str>,
    lon_col: Option<&str>,
) -> Result<Portfolio> {
    let mut reader = csv::Reader::from_reader(bytes);
    let headers: Vec<String> = reader.headers()?.iter().map(|h| h.to_string()).collect();
    let mut portfolio = Portfolio::new(headers.clone());

    for row in reader.records() {
        let row = row?;
        let mut record = SiteRecord::new();
        for (header, field) in headers.iter().zip(row.iter()) {
            record.set(header, infer_value(field));
        }

        if let (Some(lat_col), Some(lon_col)) = (lat_col, lon_col) {
            if let (Some(lat), Some(lon)) = (record.number(lat_col), record.number(lon_col)) {
                let coord = Coord::new(lon, lat);
                if coord.is_valid() {
                    record.location = Some(coord);
                }
            }
        }

        portfolio.records.push(record);
    }

    Ok(portfolio)
}

/// Type inference for CSV fields, in the spirit of a dataframe load: empty
/// becomes null, then integer, float, boolean, and finally plain text.
fn infer_value(field: &str) -> Value {
    let trimmed = field.trim();
    if trimmed.is_empty() {
        return Value::Null;
    }
    if let Ok(i) = trimmed.parse::<i64>() {
        return Value::from(i);
    }
    if let Ok(f) = trimmed.parse::<f64>() {
        if f.is_finite() {
            return serde_json::Number::from_f64(f)
                .map(Value::Number)
                .unwrap_or(Value::Null);
        }
    }
    match trimmed {
        "true" | "True" => Value::Bool(true),
        "false" | "False" => Value::Bool(false),
        _ => Value::from(field),
    }
}

/// Read a portfolio from a GeoJSON FeatureCollection of Point features.
pub fn read_portfolio_geojson(bytes: &[u8]) -> Result<Portfolio> {
    let doc: Value = serde_json::from_slice(bytes)?;
    let features = feature_array(&doc)?;

    let mut portfolio = Portfolio::new(vec![]);
    for feature in features {
        let mut record = SiteRecord::new();
        if let Some(props) = feature.get("properties").and_then(|p| p.as_object()) {
            for (key, value) in props {
                portfolio.push_column(key);
                record.set(key, value.clone());
            }
        }

        match feature.get("geometry") {
            Some(Value::Null) | None => {} // unlocated feature, geocode later
            Some(geom) => match Geometry::from_geojson(geom)? {
                Geometry::Point(c) => record.location = Some(c),
                _ => {
                    return Err(ScreenError::ValidationError {
                        message: "Portfolio GeoJSON must contain Point features".to_string(),
                    })
                }
            },
        }

        portfolio.records.push(record);
    }

    Ok(portfolio)
}

/// Read a reference layer (protected sites, land cover, water points) from a
/// GeoJSON FeatureCollection.
pub fn read_feature_collection(bytes: &[u8]) -> Result<Vec<RefFeature>> {
    let doc: Value = serde_json::from_slice(bytes)?;
    let features = feature_array(&doc)?;

    let mut out = Vec::with_capacity(features.len());
    for feature in features {
        let geometry = feature
            .get("geometry")
            .filter(|g| !g.is_null())
            .ok_or_else(|| ScreenError::SpatialError {
                message: "Reference feature has no geometry".to_string(),
            })?;
        let geometry = Geometry::from_geojson(geometry)?;

        let attrs: HashMap<String, Value> = feature
            .get("properties")
            .and_then(|p| p.as_object())
            .map(|o| o.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
            .unwrap_or_default();

        out.push(RefFeature { attrs, geometry });
    }
    Ok(out)
}

fn feature_array(doc: &Value) -> Result<&Vec<Value>> {
    if doc.get("type").and_then(|t| t.as_str()) != Some("FeatureCollection") {
        return Err(ScreenError::ValidationError {
            message: "Expected a GeoJSON FeatureCollection".to_string(),
        });
    }
    doc.get("features")
        .and_then(|f| f.as_array())
        .ok_or_else(|| ScreenError::ValidationError {
            message: "FeatureCollection has no features array".to_string(),
        })
}

pub fn validate_columns(portfolio: &Portfolio, required: &[&str]) -> Result<()> {
    let missing: Vec<&str> = required
        .iter()
        .copied()
        .filter(|c| !portfolio.columns.iter().any(|col| col == c))
        .collect();
    if !missing.is_empty() {
        return Err(ScreenError::ValidationError {
            message: format!("Missing required columns: {}", missing.join(", ")),
        });
    }
    Ok(())
}
