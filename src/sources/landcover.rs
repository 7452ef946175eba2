use crate::ingest::readers::read_feature_collection;
use crate::sources::protected_sites::rename_attr;
use crate::spatial::ops::RefFeature;
use crate::utils::error::Result;
use reqwest::Client;
use serde_json::Value;
use std::path::{Path, PathBuf};

// Pre-clipped land cover sample (full CLC releases are far too large to pull
// at runtime).
pub const DEFAULT_URL: &str = "https://example.org/data/landcover_sample.geojson";
pub const SAMPLE_FILE: &str = "landcover/landcover_sample.geojson";

pub async fn download_landcover(client: &Client, url: &str, out_path: &Path) -> Result<PathBuf> {
    if let Some(parent) = out_path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let response = client.get(url).send().await?.error_for_status()?;
    let bytes = response.bytes().await?;
    tokio::fs::write(out_path, &bytes).await?;
    Ok(out_path.to_path_buf())
}

/// Read a land-cover GeoJSON layer. CLC-style attributes (CLC_CODE/LABEL3)
/// are normalized onto the screening schema; codes are kept as text so
/// rulepack membership tests match exactly.
pub fn read_landcover(path: &Path) -> Result<Vec<RefFeature>> {
    let bytes = std::fs::read(path)?;
    let mut features = read_feature_collection(&bytes)?;
    for f in &mut features {
        rename_attr(f, "CLC_CODE", "landcover_code");
        rename_attr(f, "LABEL3", "landcover_label");
        if let Some(v) = f.attrs.get_mut("landcover_code") {
            if let Some(n) = v.as_i64() {
                *v = Value::from(n.to_string());
            }
        }
        f.attrs.entry("landcover_code".to_string()).or_insert(Value::Null);
        f.attrs.entry("landcover_label".to_string()).or_insert(Value::Null);
    }
    Ok(features)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_normalizes_and_stringifies_codes() {
        let sample = r#"{
            "type": "FeatureCollection",
            "features": [
                {"type": "Feature",
                 "properties": {"CLC_CODE": 312, "LABEL3": "Coniferous forest"},
                 "geometry": {"type": "Polygon",
                              "coordinates": [[[0,0],[1,0],[1,1],[0,1],[0,0]]]}}
            ]
        }"#;
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("landcover.geojson");
        std::fs::write(&path, sample).unwrap();

        let features = read_landcover(&path).unwrap();
        assert_eq!(features[0].attr("landcover_code"), Value::from("312"));
        assert_eq!(
            features[0].attr("landcover_label"),
            Value::from("Coniferous forest")
        );
    }
}
