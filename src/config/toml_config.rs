use crate::domain::model::{JoinHow, Predicate, ReportMeta, SpatialJoinConfig};
use crate::domain::ports::ConfigProvider;
use crate::utils::error::{Result, ScreenError};
use crate::utils::validation::{self, Validate};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScreenConfig {
    pub pipeline: PipelineConfig,
    pub portfolio: PortfolioConfig,
    #[serde(default)]
    pub screening: ScreeningConfig,
    pub datasets: DatasetsConfig,
    pub load: LoadConfig,
    pub report: Option<ReportConfig>,
    pub monitoring: Option<MonitoringConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub name: String,
    pub description: String,
    pub version: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortfolioConfig {
    pub path: String,
    pub lat_col: Option<String>,
    pub lon_col: Option<String>,
    #[serde(default)]
    pub geocode: bool,
    #[serde(default)]
    pub address_cols: Vec<String>,
    pub geocode_user_agent: Option<String>,
    pub geocode_min_delay_seconds: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScreeningConfig {
    pub rulepack: String,
    pub join_how: Option<String>,
    pub predicate: Option<String>,
    pub buffer_meters: Option<f64>,
    pub near_water_threshold_m: Option<f64>,
}

impl Default for ScreeningConfig {
    fn default() -> Self {
        Self {
            rulepack: "packs/sfdr_pai7_v1.yaml".to_string(),
            join_how: None,
            predicate: None,
            buffer_meters: None,
            near_water_threshold_m: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetsConfig {
    pub data_dir: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadConfig {
    pub output_path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    pub title: Option<String>,
    pub author: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitoringConfig {
    pub enabled: bool,
    pub log_level: Option<String>,
}

impl ScreenConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(ScreenError::IoError)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content);

        toml::from_str(&processed_content).map_err(|e| ScreenError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 替換環境變數 (例如 ${DATA_DIR})；未設定的變數保留原樣
    fn substitute_env_vars(content: &str) -> String {
        use regex::Regex;
        let re = Regex::new(r"\$\{([^}]+)\}").unwrap();

        re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        })
        .to_string()
    }

    pub fn monitoring_enabled(&self) -> bool {
        self.monitoring.as_ref().map(|m| m.enabled).unwrap_or(false)
    }
}

impl ConfigProvider for ScreenConfig {
    fn portfolio_path(&self) -> &str {
        &self.portfolio.path
    }

    fn output_path(&self) -> &str {
        &self.load.output_path
    }

    fn data_dir(&self) -> &str {
        &self.datasets.data_dir
    }

    fn rulepack_path(&self) -> &str {
        &self.screening.rulepack
    }

    fn lat_column(&self) -> Option<&str> {
        self.portfolio.lat_col.as_deref()
    }

    fn lon_column(&self) -> Option<&str> {
        self.portfolio.lon_col.as_deref()
    }

    fn address_columns(&self) -> &[String] {
        &self.portfolio.address_cols
    }

    fn geocode_enabled(&self) -> bool {
        self.portfolio.geocode
    }

    fn join_config(&self) -> SpatialJoinConfig {
        let defaults = SpatialJoinConfig::default();
        SpatialJoinConfig {
            join_how: self
                .screening
                .join_how
                .as_deref()
                .and_then(|s| JoinHow::from_str(s).ok())
                .unwrap_or(defaults.join_how),
            predicate: self
                .screening
                .predicate
                .as_deref()
                .and_then(|s| Predicate::from_str(s).ok())
                .unwrap_or(defaults.predicate),
            buffer_meters: self.screening.buffer_meters.filter(|b| *b > 0.0),
            distance_water_threshold_m: self
                .screening
                .near_water_threshold_m
                .unwrap_or(defaults.distance_water_threshold_m),
        }
    }

    fn report_meta(&self) -> ReportMeta {
        let mut meta = ReportMeta::default();
        if let Some(report) = &self.report {
            if let Some(title) = &report.title {
                meta.title = title.clone();
            }
            if let Some(author) = &report.author {
                meta.author = author.clone();
            }
            if let Some(notes) = &report.notes {
                meta.notes = notes.clone();
            }
        }
        meta
    }
}

impl Validate for ScreenConfig {
    fn validate(&self) -> Result<()> {
        validation::validate_non_empty_string("pipeline.name", &self.pipeline.name)?;
        validation::validate_path("portfolio.path", &self.portfolio.path)?;
        validation::validate_file_extension("portfolio.path", &self.portfolio.path, &["csv", "geojson"])?;
        validation::validate_path("datasets.data_dir", &self.datasets.data_dir)?;
        validation::validate_path("load.output_path", &self.load.output_path)?;
        validation::validate_path("screening.rulepack", &self.screening.rulepack)?;

        if let Some(join_how) = &self.screening.join_how {
            JoinHow::from_str(join_how).map_err(|reason| ScreenError::InvalidConfigValueError {
                field: "screening.join_how".to_string(),
                value: join_how.clone(),
                reason,
            })?;
        }
        if let Some(predicate) = &self.screening.predicate {
            Predicate::from_str(predicate).map_err(|reason| {
                ScreenError::InvalidConfigValueError {
                    field: "screening.predicate".to_string(),
                    value: predicate.clone(),
                    reason,
                }
            })?;
        }
        if let Some(buffer) = self.screening.buffer_meters {
            validation::validate_non_negative("screening.buffer_meters", buffer)?;
        }
        if let Some(threshold) = self.screening.near_water_threshold_m {
            validation::validate_non_negative("screening.near_water_threshold_m", threshold)?;
        }

        if self.portfolio.geocode && self.portfolio.address_cols.is_empty() {
            return Err(ScreenError::MissingConfigError {
                field: "portfolio.address_cols".to_string(),
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const BASIC: &str = r#"
[pipeline]
name = "screening"
description = "Portfolio screening"
version = "1.0.0"

[portfolio]
path = "sites.csv"
lat_col = "lat"
lon_col = "lon"

[screening]
rulepack = "packs/sfdr_pai7_v1.yaml"
near_water_threshold_m = 500.0

[datasets]
data_dir = "./data/eu"

[load]
output_path = "./output"
"#;

    #[test]
    fn test_parse_basic_config() {
        let config = ScreenConfig::from_toml_str(BASIC).unwrap();
        assert_eq!(config.pipeline.name, "screening");
        assert_eq!(config.portfolio_path(), "sites.csv");
        assert_eq!(config.lat_column(), Some("lat"));
        assert_eq!(config.join_config().distance_water_threshold_m, 500.0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_env_var_substitution() {
        std::env::set_var("GEOSCREEN_TEST_DATA_DIR", "/srv/data");

        let toml_content = BASIC.replace("./data/eu", "${GEOSCREEN_TEST_DATA_DIR}");
        let config = ScreenConfig::from_toml_str(&toml_content).unwrap();
        assert_eq!(config.data_dir(), "/srv/data");

        std::env::remove_var("GEOSCREEN_TEST_DATA_DIR");
    }

    #[test]
    fn test_unset_env_var_is_kept_verbatim() {
        let toml_content = BASIC.replace("./data/eu", "${GEOSCREEN_UNSET_VAR}");
        let config = ScreenConfig::from_toml_str(&toml_content).unwrap();
        assert_eq!(config.data_dir(), "${GEOSCREEN_UNSET_VAR}");
    }

    #[test]
    fn test_invalid_predicate_fails_validation() {
        let toml_content = BASIC.replace(
            "rulepack = \"packs/sfdr_pai7_v1.yaml\"",
            "rulepack = \"packs/sfdr_pai7_v1.yaml\"\npredicate = \"touches\"",
        );
        let config = ScreenConfig::from_toml_str(&toml_content).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(BASIC.as_bytes()).unwrap();

        let config = ScreenConfig::from_file(temp_file.path()).unwrap();
        assert_eq!(config.pipeline.name, "screening");
    }

    #[test]
    fn test_report_meta_overrides() {
        let toml_content = format!(
            "{}\n[report]\ntitle = \"Q3 screening\"\nauthor = \"Risk team\"\n",
            BASIC
        );
        let config = ScreenConfig::from_toml_str(&toml_content).unwrap();
        let meta = config.report_meta();
        assert_eq!(meta.title, "Q3 screening");
        assert_eq!(meta.author, "Risk team");
        // notes keep the default disclaimer
        assert!(meta.notes.contains("not for external distribution"));
    }
}
