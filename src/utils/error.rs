use thiserror::Error;

#[derive(Error, Debug)]
pub enum EtlError {
    #[error("Schema error: {message}")]
    SchemaError { message: String },

    #[error("Coercion error: column '{column}' row {row}: cannot parse '{value}' as a number")]
    CoercionError {
        column: String,
        row: usize,
        value: String,
    },

    #[error("Inference request failed: {message}")]
    InferenceError { message: String },

    #[error("Persistence failed: {message}")]
    PersistenceError { message: String },

    #[error("CSV processing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Configuration validation failed for '{field}': {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Invalid value '{value}' for '{field}': {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required configuration: {field}")]
    MissingConfigError { field: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Input,
    Inference,
    Persistence,
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

impl EtlError {
    pub fn inference(message: impl Into<String>) -> Self {
        EtlError::InferenceError {
            message: message.into(),
        }
    }

    pub fn persistence(message: impl Into<String>) -> Self {
        EtlError::PersistenceError {
            message: message.into(),
        }
    }

    pub fn schema(message: impl Into<String>) -> Self {
        EtlError::SchemaError {
            message: message.into(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            EtlError::SchemaError { .. } | EtlError::CoercionError { .. } | EtlError::CsvError(_) => {
                ErrorCategory::Input
            }
            EtlError::InferenceError { .. } => ErrorCategory::Inference,
            EtlError::PersistenceError { .. } => ErrorCategory::Persistence,
            EtlError::ConfigError { .. }
            | EtlError::ConfigValidationError { .. }
            | EtlError::InvalidConfigValueError { .. }
            | EtlError::MissingConfigError { .. } => ErrorCategory::Configuration,
            EtlError::IoError(_) | EtlError::SerializationError(_) => ErrorCategory::System,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            // 遠端服務問題，下次上傳可重試
            ErrorCategory::Inference | ErrorCategory::Persistence => ErrorSeverity::Medium,
            ErrorCategory::Input | ErrorCategory::Configuration => ErrorSeverity::High,
            ErrorCategory::System => ErrorSeverity::Critical,
        }
    }

    /// 發生錯誤的管道階段名稱
    pub fn stage(&self) -> &'static str {
        match self.category() {
            ErrorCategory::Input => "validation",
            ErrorCategory::Inference => "inference",
            ErrorCategory::Persistence => "persistence",
            ErrorCategory::Configuration => "configuration",
            ErrorCategory::System => "system",
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            EtlError::SchemaError { message } => {
                format!("The uploaded file is not a valid table: {}", message)
            }
            EtlError::CoercionError { column, row, value } => format!(
                "Column '{}' must be numeric, but row {} contains '{}'",
                column, row, value
            ),
            EtlError::CsvError(e) => format!("The uploaded file could not be read as CSV: {}", e),
            EtlError::InferenceError { message } => {
                format!("Prediction request failed: {}", message)
            }
            EtlError::PersistenceError { message } => format!(
                "Predictions were computed but could not be stored: {}",
                message
            ),
            EtlError::ConfigError { .. }
            | EtlError::ConfigValidationError { .. }
            | EtlError::InvalidConfigValueError { .. }
            | EtlError::MissingConfigError { .. } => format!("Configuration problem: {}", self),
            EtlError::IoError(e) => format!("File system error: {}", e),
            EtlError::SerializationError(e) => format!("Data serialization error: {}", e),
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            EtlError::SchemaError { .. } | EtlError::CsvError(_) => {
                "Check that the file has a header row and that every row has the same number of columns"
            }
            EtlError::CoercionError { .. } => {
                "Fix or remove the non-numeric values in the reported column and upload again"
            }
            EtlError::InferenceError { .. } => {
                "Verify project_id, region and endpoint_id, the access token, and that the endpoint is deployed"
            }
            EtlError::PersistenceError { .. } => {
                "Verify the dataset/table exist and the credentials can run load jobs; the batch can be uploaded again"
            }
            EtlError::ConfigError { .. }
            | EtlError::ConfigValidationError { .. }
            | EtlError::InvalidConfigValueError { .. }
            | EtlError::MissingConfigError { .. } => "Review the configuration file",
            EtlError::IoError(_) => "Check file paths and permissions",
            EtlError::SerializationError(_) => "Check the input data for unsupported values",
        }
    }
}

pub type Result<T> = std::result::Result<T, EtlError>;
