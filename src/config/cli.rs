use crate::domain::model::{JoinHow, Predicate, ReportMeta, SpatialJoinConfig};
use crate::domain::ports::ConfigProvider;
use crate::utils::error::Result;
use crate::utils::validation::{self, Validate};
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

#[derive(Debug, Clone, Serialize, Deserialize, Parser)]
#[command(name = "geoscreen")]
#[command(about = "Spatial screening of portfolio sites against EU reference datasets")]
pub struct CliConfig {
    /// Portfolio file (.csv or .geojson)
    #[arg(long)]
    pub portfolio: Option<String>,

    #[arg(long, default_value = "./output")]
    pub output_path: String,

    #[arg(long, default_value = "./data/eu")]
    pub data_dir: String,

    #[arg(long, default_value = "packs/sfdr_pai7_v1.yaml")]
    pub rulepack: String,

    /// Latitude column in the portfolio CSV
    #[arg(long)]
    pub lat_col: Option<String>,

    /// Longitude column in the portfolio CSV
    #[arg(long)]
    pub lon_col: Option<String>,

    /// Address columns concatenated into the geocoding query
    #[arg(long, value_delimiter = ',')]
    pub address_cols: Vec<String>,

    /// Geocode rows that have no coordinates
    #[arg(long)]
    pub geocode: bool,

    #[arg(long, default_value = "left")]
    pub join_how: String,

    #[arg(long, default_value = "intersects")]
    pub predicate: String,

    /// Buffer around portfolio points for the protected-sites test (meters)
    #[arg(long, default_value = "0")]
    pub buffer_m: f64,

    #[arg(long, default_value = "1000")]
    pub near_water_threshold_m: f64,

    /// Load settings from a TOML file instead of CLI flags
    #[arg(long)]
    pub config: Option<String>,

    #[arg(long)]
    pub report_title: Option<String>,

    #[arg(long)]
    pub report_author: Option<String>,

    #[arg(long, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, help = "Enable system monitoring")]
    pub monitor: bool,
}

impl ConfigProvider for CliConfig {
    fn portfolio_path(&self) -> &str {
        self.portfolio.as_deref().unwrap_or("")
    }

    fn output_path(&self) -> &str {
        &self.output_path
    }

    fn data_dir(&self) -> &str {
        &self.data_dir
    }

    fn rulepack_path(&self) -> &str {
        &self.rulepack
    }

    fn lat_column(&self) -> Option<&str> {
        self.lat_col.as_deref()
    }

    fn lon_column(&self) -> Option<&str> {
        self.lon_col.as_deref()
    }

    fn address_columns(&self) -> &[String] {
        &self.address_cols
    }

    fn geocode_enabled(&self) -> bool {
        self.geocode
    }

    fn join_config(&self) -> SpatialJoinConfig {
        SpatialJoinConfig {
            join_how: JoinHow::from_str(&self.join_how).unwrap_or(JoinHow::Left),
            predicate: Predicate::from_str(&self.predicate).unwrap_or(Predicate::Intersects),
            buffer_meters: (self.buffer_m > 0.0).then_some(self.buffer_m),
            distance_water_threshold_m: self.near_water_threshold_m,
        }
    }

    fn report_meta(&self) -> ReportMeta {
        let mut meta = ReportMeta::default();
        if let Some(title) = &self.report_title {
            meta.title = title.clone();
        }
        if let Some(author) = &self.report_author {
            meta.author = author.clone();
        }
        meta
    }
}

impl Validate for CliConfig {
    fn validate(&self) -> Result<()> {
        let portfolio = validation::validate_required_field("portfolio", &self.portfolio)?;
        validation::validate_path("portfolio", portfolio)?;
        validation::validate_file_extension("portfolio", portfolio, &["csv", "geojson"])?;

        validation::validate_path("output_path", &self.output_path)?;
        validation::validate_path("data_dir", &self.data_dir)?;
        validation::validate_path("rulepack", &self.rulepack)?;
        validation::validate_file_extension("rulepack", &self.rulepack, &["yaml", "yml"])?;

        JoinHow::from_str(&self.join_how).map_err(|reason| {
            crate::utils::error::ScreenError::InvalidConfigValueError {
                field: "join_how".to_string(),
                value: self.join_how.clone(),
                reason,
            }
        })?;
        Predicate::from_str(&self.predicate).map_err(|reason| {
            crate::utils::error::ScreenError::InvalidConfigValueError {
                field: "predicate".to_string(),
                value: self.predicate.clone(),
                reason,
            }
        })?;

        validation::validate_non_negative("buffer_m", self.buffer_m)?;
        validation::validate_non_negative("near_water_threshold_m", self.near_water_threshold_m)?;

        if self.geocode && self.address_cols.is_empty() {
            return Err(crate::utils::error::ScreenError::MissingConfigError {
                field: "address_cols".to_string(),
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> CliConfig {
        CliConfig {
            portfolio: Some("sites.csv".to_string()),
            output_path: "./output".to_string(),
            data_dir: "./data/eu".to_string(),
            rulepack: "packs/sfdr_pai7_v1.yaml".to_string(),
            lat_col: Some("lat".to_string()),
            lon_col: Some("lon".to_string()),
            address_cols: vec![],
            geocode: false,
            join_how: "left".to_string(),
            predicate: "intersects".to_string(),
            buffer_m: 0.0,
            near_water_threshold_m: 1000.0,
            config: None,
            report_title: None,
            report_author: None,
            verbose: false,
            monitor: false,
        }
    }

    #[test]
    fn test_valid_config_passes() {
        assert!(base_config().validate().is_ok());
    }

    #[test]
    fn test_missing_portfolio_fails() {
        let mut c = base_config();
        c.portfolio = None;
        assert!(c.validate().is_err());
    }

    #[test]
    fn test_geocode_requires_address_cols() {
        let mut c = base_config();
        c.geocode = true;
        assert!(c.validate().is_err());
        c.address_cols = vec!["address".to_string()];
        assert!(c.validate().is_ok());
    }

    #[test]
    fn test_bad_predicate_fails() {
        let mut c = base_config();
        c.predicate = "touches".to_string();
        assert!(c.validate().is_err());
    }

    #[test]
    fn test_join_config_buffer_zero_means_none() {
        let c = base_config();
        assert_eq!(c.join_config().buffer_meters, None);
        let mut c = base_config();
        c.buffer_m = 250.0;
        assert_eq!(c.join_config().buffer_meters, Some(250.0));
    }
}
