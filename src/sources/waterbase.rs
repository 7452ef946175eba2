use crate::domain::model::Coord;
use crate::spatial::geometry::Geometry;
use crate::spatial::ops::RefFeature;
use crate::utils::error::{Result, ScreenError};
use reqwest::Client;
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

// Water monitoring points with WFD status, as a flat CSV sample.
pub const DEFAULT_URL: &str = "https://example.org/data/waterbase_sample.csv";
pub const SAMPLE_FILE: &str = "waterbase/waterbase_sample.csv";

pub async fn download_waterbase(client: &Client, url: &str, out_path: &Path) -> Result<PathBuf> {
    if let Some(parent) = out_path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let response = client.get(url).send().await?.error_for_status()?;
    let bytes = response.bytes().await?;
    tokio::fs::write(out_path, &bytes).await?;
    Ok(out_path.to_path_buf())
}

/// Read water monitoring points from CSV. Rows without usable coordinates are
/// skipped; a missing `wfd_status` becomes null and a missing `water_id`
/// falls back to the row index so nearest-water results stay identifiable.
pub fn read_waterbase_points_csv(path: &Path) -> Result<Vec<RefFeature>> {
    let bytes = std::fs::read(path)?;
    let mut reader = csv::Reader::from_reader(bytes.as_slice());
    let headers: Vec<String> = reader.headers()?.iter().map(|h| h.to_string()).collect();

    let lon_idx = column_index(&headers, "lon")?;
    let lat_idx = column_index(&headers, "lat")?;

    let mut features = Vec::new();
    for (row_index, row) in reader.records().enumerate() {
        let row = row?;
        let lon: Option<f64> = row.get(lon_idx).and_then(|v| v.trim().parse().ok());
        let lat: Option<f64> = row.get(lat_idx).and_then(|v| v.trim().parse().ok());
        let coord = match (lon, lat) {
            (Some(lon), Some(lat)) => Coord::new(lon, lat),
            _ => continue,
        };
        if !coord.is_valid() {
            continue;
        }

        let mut attrs: HashMap<String, Value> = headers
            .iter()
            .zip(row.iter())
            .map(|(h, v)| {
                let value = if v.trim().is_empty() {
                    Value::Null
                } else {
                    Value::from(v)
                };
                (h.clone(), value)
            })
            .collect();

        attrs.entry("wfd_status".to_string()).or_insert(Value::Null);
        let id_missing = attrs.get("water_id").map(|v| v.is_null()).unwrap_or(true);
        if id_missing {
            attrs.insert("water_id".to_string(), Value::from(row_index.to_string()));
        }

        features.push(RefFeature {
            attrs,
            geometry: Geometry::Point(coord),
        });
    }
    Ok(features)
}

fn column_index(headers: &[String], name: &str) -> Result<usize> {
    headers
        .iter()
        .position(|h| h == name)
        .ok_or_else(|| ScreenError::ValidationError {
            message: format!("Waterbase CSV is missing the '{}' column", name),
        })
}
