use thiserror::Error;

/// Errors from the anomaly detection engine.
///
/// Degenerate inputs (empty series, too few points, zero variance) are not
/// errors; detectors return empty results for them.
#[derive(Debug, Error)]
pub enum AnomalyError {
    #[error("invalid detection config: {field} -- {reason}")]
    InvalidConfig { field: String, reason: String },

    #[error("failed to load detection config: {0}")]
    ConfigLoad(String),

    #[error("lock acquisition failed")]
    LockError,

    #[error("anomaly store error: {0}")]
    Store(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

impl AnomalyError {
    pub(crate) fn invalid_config(field: &str, reason: impl Into<String>) -> Self {
        AnomalyError::InvalidConfig {
            field: field.to_string(),
            reason: reason.into(),
        }
    }
}

impl From<config::ConfigError> for AnomalyError {
    fn from(e: config::ConfigError) -> Self {
        AnomalyError::ConfigLoad(e.to_string())
    }
}

impl From<serde_json::Error> for AnomalyError {
    fn from(e: serde_json::Error) -> Self {
        AnomalyError::Serialization(e.to_string())
    }
}

/// Convenience type alias for anomaly engine results.
pub type AnomalyResult<T> = Result<T, AnomalyError>;
