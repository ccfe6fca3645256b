use thiserror::Error;

#[derive(Debug, Error)]
pub enum FundAnalyticsError {
    #[error("Invalid input: {field} — {reason}")]
    InvalidInput { field: String, reason: String },

    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    #[error("Singular system in {context}")]
    SingularSystem { context: String },

    #[error("Date error: {0}")]
    DateError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Storage error: {0}")]
    StorageError(String),
}

impl From<serde_json::Error> for FundAnalyticsError {
    fn from(e: serde_json::Error) -> Self {
        FundAnalyticsError::SerializationError(e.to_string())
    }
}

impl From<toml::de::Error> for FundAnalyticsError {
    fn from(e: toml::de::Error) -> Self {
        FundAnalyticsError::ConfigError(e.to_string())
    }
}

impl From<std::io::Error> for FundAnalyticsError {
    fn from(e: std::io::Error) -> Self {
        FundAnalyticsError::StorageError(e.to_string())
    }
}
