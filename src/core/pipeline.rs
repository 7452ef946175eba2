use crate::core::{ConfigProvider, Pipeline, Portfolio, ScreeningOutput, Storage};
use crate::domain::model::Coord;
use crate::ingest::geocode::GeocoderService;
use crate::ingest::readers::{read_portfolio_csv, read_portfolio_geojson, validate_columns};
use crate::report::summary::{build_summary, render_text, to_json};
use crate::rules::engine::RulesEngine;
use crate::sources::load_reference_data;
use crate::spatial::ops::{
    distance_to_nearest_water, flag_within_water_threshold, intersect_protected_sites,
    overlay_landcover,
};
use crate::utils::error::{Result, ScreenError};
use serde_json::{json, Value};
use std::io::Write;
use std::path::Path;
use zip::write::{FileOptions, ZipWriter};

pub const OUTPUT_BUNDLE: &str = "screening_output.zip";

pub struct ScreeningPipeline<S: Storage, C: ConfigProvider> {
    storage: S,
    config: C,
    geocoder: GeocoderService,
}

impl<S: Storage, C: ConfigProvider> ScreeningPipeline<S, C> {
    pub fn new(storage: S, config: C) -> Self {
        Self {
            storage,
            config,
            geocoder: GeocoderService::new(None, 1.0),
        }
    }

    /// Swap the geocoder, mainly so tests can point providers at a mock server.
    pub fn with_geocoder(mut self, geocoder: GeocoderService) -> Self {
        self.geocoder = geocoder;
        self
    }
}

#[async_trait::async_trait]
impl<S: Storage, C: ConfigProvider> Pipeline for ScreeningPipeline<S, C> {
    async fn extract(&self) -> Result<Portfolio> {
        let path = self.config.portfolio_path();
        tracing::debug!("Reading portfolio from {}", path);
        let bytes = tokio::fs::read(path).await?;

        let mut portfolio = if path.to_lowercase().ends_with(".geojson") {
            read_portfolio_geojson(&bytes)?
        } else {
            read_portfolio_csv(&bytes, self.config.lat_column(), self.config.lon_column())?
        };

        let unlocated = portfolio.records.iter().filter(|r| r.location.is_none()).count();
        tracing::info!(
            "📥 Portfolio: {} records, {} without coordinates",
            portfolio.len(),
            unlocated
        );

        if self.config.geocode_enabled() && unlocated > 0 {
            let address_cols: Vec<&str> = self
                .config
                .address_columns()
                .iter()
                .map(String::as_str)
                .collect();
            validate_columns(&portfolio, &address_cols)?;
            portfolio = self
                .geocoder
                .geocode_portfolio(portfolio, self.config.address_columns())
                .await?;
        }

        Ok(portfolio)
    }

    async fn transform(&self, portfolio: Portfolio) -> Result<ScreeningOutput> {
        let refs = load_reference_data(Path::new(self.config.data_dir()))?;
        let join_cfg = self.config.join_config();

        // Absent layers run as empty so every derived column exists with
        // nulls; rule conditions can then reference them uniformly.
        let empty: Vec<crate::spatial::ops::RefFeature> = Vec::new();
        let sites = refs.protected_sites.as_ref().unwrap_or(&empty);
        let landcover = refs.landcover.as_ref().unwrap_or(&empty);
        let water = refs.water.as_ref().unwrap_or(&empty);

        let work = intersect_protected_sites(portfolio, sites, &join_cfg);
        let work = overlay_landcover(work, landcover);
        let work = distance_to_nearest_water(work, water);
        let work = flag_within_water_threshold(work, join_cfg.distance_water_threshold_m);

        let rulepack_path = Path::new(self.config.rulepack_path());
        let pack_dir = rulepack_path.parent().unwrap_or_else(|| Path::new("."));
        let pack_file = rulepack_path
            .file_name()
            .and_then(|f| f.to_str())
            .ok_or_else(|| ScreenError::InvalidConfigValueError {
                field: "rulepack".to_string(),
                value: self.config.rulepack_path().to_string(),
                reason: "Not a file path".to_string(),
            })?;

        let engine = RulesEngine::new(pack_dir);
        let pack = engine.load_pack(pack_file)?;
        tracing::info!("⚖️ Applying rulepack {} v{}", pack.name, pack.version);
        let screened = engine.evaluate(work, &pack)?;

        let csv_output = render_csv(&screened)?;
        let geojson_output = render_geojson(&screened)?;
        let summary = build_summary(&screened, &pack.name, pack.version);

        Ok(ScreeningOutput {
            screened,
            csv_output,
            geojson_output,
            summary,
        })
    }

    async fn load(&self, output: ScreeningOutput) -> Result<String> {
        let output_path = format!("{}/{}", self.config.output_path(), OUTPUT_BUNDLE);
        eprintln!("DBG:start-load");
        let report_text = render_text(&output.summary, &self.config.report_meta());
        eprintln!("DBG:rendered-text");
        let summary_json = to_json(&output.summary)?;
        eprintln!("DBG:json");

        tracing::debug!("Creating output bundle with 4 files");
        let zip_data = {
            let mut zip = ZipWriter::new(std::io::Cursor::new(Vec::new()));

            eprintln!("DBG:zip-open");
            zip.start_file::<_, ()>("results.csv", FileOptions::default())?;
            zip.write_all(output.csv_output.as_bytes())?;

            eprintln!("DBG:csv-written");
            zip.start_file::<_, ()>("results.geojson", FileOptions::default())?;
            zip.write_all(output.geojson_output.as_bytes())?;

            eprintln!("DBG:geojson-written");
            zip.start_file::<_, ()>("summary.json", FileOptions::default())?;
            zip.write_all(summary_json.as_bytes())?;

            eprintln!("DBG:summary-written");
            zip.start_file::<_, ()>("report.txt", FileOptions::default())?;
            zip.write_all(report_text.as_bytes())?;

            eprintln!("DBG:report-written");
            let cursor = zip.finish()?;
            cursor.into_inner()
        };

        tracing::debug!("Writing bundle ({} bytes) to storage", zip_data.len());
        eprintln!("DBG:zip-done");
        self.storage.write_file(OUTPUT_BUNDLE, &zip_data).await?;
        eprintln!("DBG:stored");

        Ok(output_path)
    }
}

/// Render the screened portfolio as CSV: input columns in file order, derived
/// columns after them. Arrays (the audit trail) are embedded as JSON text.
fn render_csv(portfolio: &Portfolio) -> Result<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(&portfolio.columns)?;

    for record in &portfolio.records {
        let row: Vec<String> = portfolio
            .columns
            .iter()
            .map(|col| csv_field(record.get(col)))
            .collect();
        writer.write_record(&row)?;
    }

    let bytes = writer.into_inner().map_err(|e| ScreenError::ProcessingError {
        message: format!("CSV buffer error: {}", e),
    })?;
    String::from_utf8(bytes).map_err(|e| ScreenError::ProcessingError {
        message: format!("CSV output was not UTF-8: {}", e),
    })
}

fn csv_field(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(Value::Bool(b)) => b.to_string(),
        Some(Value::Number(n)) => n.to_string(),
        Some(other) => other.to_string(),
    }
}

/// Render located rows as a GeoJSON FeatureCollection; unlocated rows have no
/// geometry to carry and are left to the CSV.
fn render_geojson(portfolio: &Portfolio) -> Result<String> {
    let features: Vec<Value> = portfolio
        .records
        .iter()
        .filter_map(|record| {
            record.location.map(|Coord { lon, lat }| {
                json!({
                    "type": "Feature",
                    "properties": record.attrs,
                    "geometry": {"type": "Point", "coordinates": [lon, lat]}
                })
            })
        })
        .collect();

    Ok(serde_json::to_string_pretty(&json!({
        "type": "FeatureCollection",
        "features": features
    }))?)
}
