use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScreenError {
    #[error("Zip operation failed: {0}")]
    ZipError(#[from] zip::result::ZipError),

    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("CSV processing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("YAML parsing error: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("Configuration error in '{field}': {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Invalid value '{value}' for '{field}': {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required configuration field: {field}")]
    MissingConfigError { field: String },

    #[error("Geocoding error: {message}")]
    GeocodeError { message: String },

    #[error("Spatial processing error: {message}")]
    SpatialError { message: String },

    #[error("Rule '{expression}' failed: {message}")]
    RuleError { expression: String, message: String },

    #[error("Validation error: {message}")]
    ValidationError { message: String },

    #[error("Data processing error: {message}")]
    ProcessingError { message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Network,
    Data,
    Configuration,
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl ScreenError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::HttpError(_) | Self::GeocodeError { .. } => ErrorCategory::Network,
            Self::CsvError(_)
            | Self::JsonError(_)
            | Self::YamlError(_)
            | Self::SpatialError { .. }
            | Self::RuleError { .. }
            | Self::ValidationError { .. }
            | Self::ProcessingError { .. } => ErrorCategory::Data,
            Self::ConfigValidationError { .. }
            | Self::InvalidConfigValueError { .. }
            | Self::MissingConfigError { .. } => ErrorCategory::Configuration,
            Self::IoError(_) | Self::ZipError(_) => ErrorCategory::System,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self {
            // Geocoding degrades to null locations upstream; reaching here means
            // the whole provider chain was unusable.
            Self::GeocodeError { .. } | Self::HttpError(_) => ErrorSeverity::Medium,
            Self::ConfigValidationError { .. }
            | Self::InvalidConfigValueError { .. }
            | Self::MissingConfigError { .. }
            | Self::ValidationError { .. } => ErrorSeverity::High,
            Self::CsvError(_)
            | Self::JsonError(_)
            | Self::YamlError(_)
            | Self::SpatialError { .. }
            | Self::RuleError { .. }
            | Self::ProcessingError { .. } => ErrorSeverity::High,
            Self::IoError(_) | Self::ZipError(_) => ErrorSeverity::Critical,
        }
    }

    pub fn recovery_suggestion(&self) -> String {
        match self {
            Self::HttpError(_) => {
                "Check network connectivity and the endpoint URL, then retry".to_string()
            }
            Self::GeocodeError { .. } => {
                "Verify geocoding provider availability, or supply lat/lon columns directly"
                    .to_string()
            }
            Self::CsvError(_) => {
                "Check the portfolio CSV for malformed rows or a missing header line".to_string()
            }
            Self::YamlError(_) => "Check the rulepack YAML syntax".to_string(),
            Self::RuleError { expression, .. } => {
                format!("Review the rule condition '{}' in the rulepack", expression)
            }
            Self::ConfigValidationError { field, .. }
            | Self::InvalidConfigValueError { field, .. }
            | Self::MissingConfigError { field } => {
                format!("Fix the '{}' setting and rerun", field)
            }
            Self::IoError(_) => {
                "Check file paths and permissions for the data and output directories".to_string()
            }
            _ => "Rerun with --verbose for details".to_string(),
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            Self::HttpError(_) => "A network request failed".to_string(),
            Self::GeocodeError { message } => format!("Geocoding failed: {}", message),
            Self::CsvError(_) => "The portfolio file could not be parsed".to_string(),
            Self::YamlError(_) => "The rulepack file could not be parsed".to_string(),
            Self::MissingConfigError { field } => {
                format!("The required setting '{}' was not provided", field)
            }
            other => other.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ScreenError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_mapping() {
        let e = ScreenError::GeocodeError {
            message: "all providers failed".to_string(),
        };
        assert_eq!(e.category(), ErrorCategory::Network);

        let e = ScreenError::MissingConfigError {
            field: "portfolio".to_string(),
        };
        assert_eq!(e.category(), ErrorCategory::Configuration);
        assert_eq!(e.severity(), ErrorSeverity::High);
    }

    #[test]
    fn test_io_errors_are_critical() {
        let e = ScreenError::IoError(std::io::Error::new(std::io::ErrorKind::NotFound, "missing"));
        assert_eq!(e.severity(), ErrorSeverity::Critical);
        assert_eq!(e.category(), ErrorCategory::System);
    }
}
