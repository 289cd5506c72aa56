use thiserror::Error;

#[derive(Error, Debug)]
pub enum ImportError {
    #[error("API request failed: {0}")]
    ApiError(#[from] reqwest::Error),

    #[error("CSV processing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Missing configuration value: {field}")]
    MissingConfigError { field: String },

    #[error("Invalid value '{value}' for '{field}': {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Invalid input header: {message}")]
    InvalidHeader { message: String },
}

/// 錯誤類別
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Network,
    Input,
    Configuration,
    System,
}

/// 錯誤嚴重程度，決定 CLI 的退出碼
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl ErrorSeverity {
    /// Exit code for an error raised before any row was processed. Kept apart
    /// from the run statuses (2 partial failure, 3 halted run).
    pub fn exit_code(&self) -> i32 {
        match self {
            ErrorSeverity::Low => 0,
            ErrorSeverity::High => 1,
            ErrorSeverity::Medium => 4,
            ErrorSeverity::Critical => 5,
        }
    }
}

impl ImportError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            ImportError::ApiError(_) => ErrorCategory::Network,
            ImportError::CsvError(_) | ImportError::InvalidHeader { .. } => ErrorCategory::Input,
            ImportError::IoError(_) | ImportError::SerializationError(_) => ErrorCategory::System,
            ImportError::ConfigError { .. }
            | ImportError::MissingConfigError { .. }
            | ImportError::InvalidConfigValueError { .. } => ErrorCategory::Configuration,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self {
            ImportError::ApiError(_) => ErrorSeverity::Medium,
            ImportError::CsvError(_)
            | ImportError::InvalidHeader { .. }
            | ImportError::ConfigError { .. }
            | ImportError::MissingConfigError { .. }
            | ImportError::InvalidConfigValueError { .. } => ErrorSeverity::High,
            ImportError::IoError(_) | ImportError::SerializationError(_) => ErrorSeverity::Critical,
        }
    }

    pub fn recovery_suggestion(&self) -> String {
        match self {
            ImportError::ApiError(_) => {
                "Check network connectivity and the API base URL, then re-run".to_string()
            }
            ImportError::CsvError(_) => {
                "Check the file encoding (UTF-8) and the --delimiter option".to_string()
            }
            ImportError::IoError(_) => "Check file paths and permissions".to_string(),
            ImportError::SerializationError(_) => {
                "Check the output directory is writable".to_string()
            }
            ImportError::ConfigError { .. } => "Review the configuration file".to_string(),
            ImportError::MissingConfigError { field } => {
                format!("Provide a value for '{}' via CLI flag, config file or environment", field)
            }
            ImportError::InvalidConfigValueError { field, .. } => {
                format!("Correct the value of '{}'", field)
            }
            ImportError::InvalidHeader { .. } => {
                "The first line must be a header row, e.g. type,name,timezone,parent_domain_id,client_id"
                    .to_string()
            }
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            ImportError::ApiError(_) => "Could not reach the TMS API".to_string(),
            ImportError::CsvError(e) => format!("The input file could not be read as CSV: {}", e),
            ImportError::IoError(e) => format!("File system error: {}", e),
            ImportError::SerializationError(e) => format!("Could not write the report: {}", e),
            ImportError::ConfigError { message } => format!("Invalid configuration: {}", message),
            ImportError::MissingConfigError { field } => {
                format!("Missing required setting '{}'", field)
            }
            ImportError::InvalidConfigValueError { field, reason, .. } => {
                format!("Setting '{}' is invalid: {}", field, reason)
            }
            ImportError::InvalidHeader { message } => format!("Bad header row: {}", message),
        }
    }
}

pub type Result<T> = std::result::Result<T, ImportError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_is_critical_system_error() {
        let err = ImportError::from(std::io::Error::other("disk full"));
        assert_eq!(err.category(), ErrorCategory::System);
        assert_eq!(err.severity(), ErrorSeverity::Critical);
        assert!(err.user_friendly_message().contains("disk full"));
    }

    #[test]
    fn test_setup_exit_codes_differ_from_run_statuses() {
        let codes: Vec<i32> = [
            ErrorSeverity::Low,
            ErrorSeverity::Medium,
            ErrorSeverity::High,
            ErrorSeverity::Critical,
        ]
        .iter()
        .map(ErrorSeverity::exit_code)
        .collect();
        assert_eq!(codes, vec![0, 4, 1, 5]);
        assert!(!codes.contains(&2) && !codes.contains(&3));
    }

    #[test]
    fn test_config_errors_are_high_severity() {
        let err = ImportError::MissingConfigError {
            field: "api.token".to_string(),
        };
        assert_eq!(err.category(), ErrorCategory::Configuration);
        assert_eq!(err.severity(), ErrorSeverity::High);
        assert!(err.recovery_suggestion().contains("api.token"));
    }
}
