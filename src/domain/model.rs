use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// WGS84 longitude/latitude pair. All coordinates in the system are stored in
/// WGS84; metric computations project through Web Mercator first.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coord {
    pub lon: f64,
    pub lat: f64,
}

impl Coord {
    pub fn new(lon: f64, lat: f64) -> Self {
        Self { lon, lat }
    }

    pub fn is_valid(&self) -> bool {
        self.lon.is_finite()
            && self.lat.is_finite()
            && (-180.0..=180.0).contains(&self.lon)
            && (-90.0..=90.0).contains(&self.lat)
    }
}

/// One portfolio row: free-form attributes plus an optional point location.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteRecord {
    pub attrs: HashMap<String, serde_json::Value>,
    pub location: Option<Coord>,
}

impl SiteRecord {
    pub fn new() -> Self {
        Self {
            attrs: HashMap::new(),
            location: None,
        }
    }

    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.attrs.get(key)
    }

    pub fn set(&mut self, key: &str, value: serde_json::Value) {
        self.attrs.insert(key.to_string(), value);
    }

    pub fn set_null(&mut self, key: &str) {
        self.attrs.insert(key.to_string(), serde_json::Value::Null);
    }

    pub fn number(&self, key: &str) -> Option<f64> {
        self.attrs.get(key).and_then(|v| v.as_f64())
    }

    pub fn text(&self, key: &str) -> Option<&str> {
        self.attrs.get(key).and_then(|v| v.as_str())
    }
}

impl Default for SiteRecord {
    fn default() -> Self {
        Self::new()
    }
}

/// A portfolio keeps the input column order so the output CSV stays stable;
/// derived columns are appended as screening steps add them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Portfolio {
    pub columns: Vec<String>,
    pub records: Vec<SiteRecord>,
}

impl Portfolio {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            records: Vec::new(),
        }
    }

    pub fn push_column(&mut self, name: &str) {
        if !self.columns.iter().any(|c| c == name) {
            self.columns.push(name.to_string());
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Screening risk category. Ordering matters: `worst` picks the higher one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RiskCategory {
    Low,
    Medium,
    High,
}

impl RiskCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "Low",
            Self::Medium => "Medium",
            Self::High => "High",
        }
    }

    /// Worst-of combinator; `None` loses to any assigned category.
    pub fn worst(a: Option<RiskCategory>, b: Option<RiskCategory>) -> Option<RiskCategory> {
        match (a, b) {
            (Some(x), Some(y)) => Some(x.max(y)),
            (Some(x), None) => Some(x),
            (None, Some(y)) => Some(y),
            (None, None) => None,
        }
    }
}

impl fmt::Display for RiskCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RiskCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Low" | "low" => Ok(Self::Low),
            "Medium" | "medium" => Ok(Self::Medium),
            "High" | "high" => Ok(Self::High),
            other => Err(format!("Unknown risk category: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JoinHow {
    Left,
    Inner,
}

impl FromStr for JoinHow {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "left" => Ok(Self::Left),
            "inner" => Ok(Self::Inner),
            other => Err(format!("Unknown join mode: {} (expected left/inner)", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Predicate {
    Intersects,
    Within,
    Contains,
}

impl FromStr for Predicate {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "intersects" => Ok(Self::Intersects),
            "within" => Ok(Self::Within),
            "contains" => Ok(Self::Contains),
            other => Err(format!(
                "Unknown predicate: {} (expected intersects/within/contains)",
                other
            )),
        }
    }
}

/// Configuration for the spatial screening steps.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpatialJoinConfig {
    pub join_how: JoinHow,
    pub predicate: Predicate,
    /// Buffer applied to portfolio points before the protected-sites test.
    pub buffer_meters: Option<f64>,
    pub distance_water_threshold_m: f64,
}

impl Default for SpatialJoinConfig {
    fn default() -> Self {
        Self {
            join_how: JoinHow::Left,
            predicate: Predicate::Intersects,
            buffer_meters: None,
            distance_water_threshold_m: 1000.0,
        }
    }
}

/// Free-text header fields for the summary report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportMeta {
    pub title: String,
    pub author: String,
    pub notes: String,
}

impl Default for ReportMeta {
    fn default() -> Self {
        Self {
            title: "Spatial Screening Summary".to_string(),
            author: "geoscreen".to_string(),
            notes: "Prototype output – not for external distribution.".to_string(),
        }
    }
}

/// Per-run roll-up carried into the output bundle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScreeningSummary {
    pub generated_at: chrono::DateTime<chrono::Utc>,
    pub rulepack_name: String,
    pub rulepack_version: i64,
    pub total_records: usize,
    pub located_records: usize,
    pub unresolved_geocodes: usize,
    pub counts: HashMap<String, usize>,
}

/// Result of the transform phase, ready to be loaded.
#[derive(Debug, Clone)]
pub struct ScreeningOutput {
    pub screened: Portfolio,
    pub csv_output: String,
    pub geojson_output: String,
    pub summary: ScreeningSummary,
}
