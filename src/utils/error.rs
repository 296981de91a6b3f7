use thiserror::Error;

#[derive(Error, Debug)]
pub enum WardenError {
    #[error("HTTP client error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Invalid readiness check: {field} = '{value}' ({reason})")]
    InvalidCheckError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Probe for {target} failed permanently: {message}")]
    ProbeFatalError { target: String, message: String },

    #[error("Invalid configuration value: {field} = '{value}' ({reason})")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required configuration: {field}")]
    MissingConfigError { field: String },

    #[error("Configuration validation failed for {field}: {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Service command '{command}' failed: {message}")]
    ServiceCommandError { command: String, message: String },

    #[error("Plugin '{plugin}' download from {url} failed: {message}")]
    PluginDownloadError {
        plugin: String,
        url: String,
        message: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    Network,
    Service,
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl WardenError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            WardenError::InvalidCheckError { .. }
            | WardenError::InvalidConfigValueError { .. }
            | WardenError::MissingConfigError { .. }
            | WardenError::ConfigValidationError { .. } => ErrorCategory::Configuration,
            WardenError::HttpError(_)
            | WardenError::ProbeFatalError { .. }
            | WardenError::PluginDownloadError { .. } => ErrorCategory::Network,
            WardenError::ServiceCommandError { .. } => ErrorCategory::Service,
            WardenError::IoError(_) | WardenError::SerializationError(_) => ErrorCategory::System,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self {
            // 下載失敗可以下次重跑時再補
            WardenError::PluginDownloadError { .. } | WardenError::HttpError(_) => {
                ErrorSeverity::Medium
            }
            WardenError::InvalidCheckError { .. }
            | WardenError::InvalidConfigValueError { .. }
            | WardenError::MissingConfigError { .. }
            | WardenError::ConfigValidationError { .. }
            | WardenError::ProbeFatalError { .. }
            | WardenError::ServiceCommandError { .. } => ErrorSeverity::High,
            WardenError::IoError(_) | WardenError::SerializationError(_) => {
                ErrorSeverity::Critical
            }
        }
    }

    pub fn recovery_suggestion(&self) -> String {
        match self {
            WardenError::InvalidCheckError { field, .. } => {
                format!("Fix the '{}' of the readiness check; it is a setup bug, not a transient failure", field)
            }
            WardenError::ProbeFatalError { target, .. } => format!(
                "Check that {} is a valid http(s) URL and that its TLS certificate is trusted",
                target
            ),
            WardenError::InvalidConfigValueError { field, .. }
            | WardenError::ConfigValidationError { field, .. } => {
                format!("Correct '{}' in the configuration file", field)
            }
            WardenError::MissingConfigError { field } => {
                format!("Add '{}' to the configuration file", field)
            }
            WardenError::ServiceCommandError { command, .. } => format!(
                "Run '{}' by hand and check the service manager logs",
                command
            ),
            WardenError::PluginDownloadError { .. } | WardenError::HttpError(_) => {
                "Check network access to the plugin mirror and retry".to_string()
            }
            WardenError::IoError(_) => {
                "Check file permissions and free disk space".to_string()
            }
            WardenError::SerializationError(_) => {
                "Report this as a bug with the failing input".to_string()
            }
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self.category() {
            ErrorCategory::Configuration => format!("設定錯誤: {}", self),
            ErrorCategory::Network => format!("網路錯誤: {}", self),
            ErrorCategory::Service => format!("服務控制錯誤: {}", self),
            ErrorCategory::System => format!("系統錯誤: {}", self),
        }
    }
}

pub type Result<T> = std::result::Result<T, WardenError>;
