//! Error types for rusty_greeks

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for rusty_greeks
#[derive(Error, Debug)]
pub enum ChainError {
    #[error("Failed to enumerate {root:?}: {source}")]
    Enumeration {
        root: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    #[error("Strikes not in ascending order in {path:?}: row {index} has strike {strike} after {previous}")]
    UnsortedStrikes {
        path: PathBuf,
        index: usize,
        strike: f64,
        previous: f64,
    },

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Regression error: {0}")]
    RegressionError(String),

    #[error("Worker thread panicked: {0}")]
    WorkerPanicked(String),

    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Config parse error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("Serialization error: {0}")]
    SerdeError(#[from] serde_json::Error),
}

/// Result type alias for rusty_greeks operations
pub type Result<T> = std::result::Result<T, ChainError>;

impl ChainError {
    /// Whether this error aborts a whole run rather than a single file
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ChainError::Enumeration { .. }
                | ChainError::ConfigError(_)
                | ChainError::WorkerPanicked(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unsorted_message() {
        let err = ChainError::UnsortedStrikes {
            path: PathBuf::from("NIFTY/0930.csv"),
            index: 3,
            strike: 100.0,
            previous: 150.0,
        };
        let msg = err.to_string();
        assert!(msg.contains("0930.csv"));
        assert!(msg.contains("row 3"));
        assert!(!err.is_fatal());
    }

    #[test]
    fn test_config_error_is_fatal() {
        assert!(ChainError::ConfigError("workers".to_string()).is_fatal());
        assert!(!ChainError::RegressionError("singular".to_string()).is_fatal());
    }
}
