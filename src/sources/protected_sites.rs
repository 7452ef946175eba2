use crate::ingest::readers::read_feature_collection;
use crate::spatial::ops::RefFeature;
use crate::utils::error::Result;
use reqwest::Client;
use serde_json::Value;
use std::path::{Path, PathBuf};

// Mirrored sample extract; the live Natura 2000 WFS is slow and rate-limited,
// so deployments point this at an internal mirror.
pub const DEFAULT_URL: &str = "https://example.org/data/protected_sites_sample.geojson";
pub const SAMPLE_FILE: &str = "protected_sites/protected_sites_sample.geojson";

pub async fn download_protected_sites(client: &Client, url: &str, out_path: &Path) -> Result<PathBuf> {
    if let Some(parent) = out_path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let response = client.get(url).send().await?.error_for_status()?;
    let bytes = response.bytes().await?;
    tokio::fs::write(out_path, &bytes).await?;
    Ok(out_path.to_path_buf())
}

/// Read a protected-sites GeoJSON layer, normalizing the upstream attribute
/// names (SITECODE/SITENAME) onto the schema the screening expects.
pub fn read_protected_sites(path: &Path) -> Result<Vec<RefFeature>> {
    let bytes = std::fs::read(path)?;
    let mut features = read_feature_collection(&bytes)?;
    for f in &mut features {
        rename_attr(f, "SITECODE", "site_code");
        rename_attr(f, "SITENAME", "site_name");
        f.attrs.entry("site_code".to_string()).or_insert(Value::Null);
        f.attrs.entry("site_name".to_string()).or_insert(Value::Null);
    }
    Ok(features)
}

pub(crate) fn rename_attr(f: &mut RefFeature, from: &str, to: &str) {
    if !f.attrs.contains_key(to) {
        if let Some(v) = f.attrs.remove(from) {
            f.attrs.insert(to.to_string(), v);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    const SAMPLE: &str = r#"{
        "type": "FeatureCollection",
        "features": [
            {"type": "Feature",
             "properties": {"SITECODE": "DE123", "SITENAME": "Schwarzwald"},
             "geometry": {"type": "Polygon",
                          "coordinates": [[[8.0,48.0],[8.5,48.0],[8.5,48.4],[8.0,48.4],[8.0,48.0]]]}}
        ]
    }"#;

    #[test]
    fn test_read_normalizes_upstream_names() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sites.geojson");
        std::fs::write(&path, SAMPLE).unwrap();

        let features = read_protected_sites(&path).unwrap();
        assert_eq!(features[0].attr("site_code"), Value::from("DE123"));
        assert_eq!(features[0].attr("site_name"), Value::from("Schwarzwald"));
        assert!(!features[0].attrs.contains_key("SITECODE"));
    }

    #[tokio::test]
    async fn test_download_writes_file() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET).path("/sites.geojson");
            then.status(200).body(SAMPLE);
        });

        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("nested/dir/sites.geojson");
        let client = Client::new();

        let written = download_protected_sites(&client, &server.url("/sites.geojson"), &out)
            .await
            .unwrap();

        mock.assert();
        assert!(written.exists());
        let features = read_protected_sites(&written).unwrap();
        assert_eq!(features.len(), 1);
    }

    #[tokio::test]
    async fn test_download_propagates_http_error() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/missing.geojson");
            then.status(404);
        });

        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("missing.geojson");
        let client = Client::new();

        let result = download_protected_sites(&client, &server.url("/missing.geojson"), &out).await;
        assert!(result.is_err());
    }
}
