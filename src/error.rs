//! Error types for upstream data fetches.

use thiserror::Error;

/// Why a single upstream fetch produced no usable value.
///
/// The normalizer treats every variant the same way (the region is omitted),
/// the distinction only matters for logging and retry decisions.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// Timeout, connection failure or non-success HTTP status.
    #[error("network error: {0}")]
    Network(String),

    /// Well-formed response that lacks the expected fields.
    #[error("data absent: {0}")]
    DataAbsent(String),

    /// Response body is not the JSON we expected.
    #[error("parse error: {0}")]
    Parse(String),
}

impl FetchError {
    /// Returns true if repeating the request could plausibly succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, FetchError::Network(_))
    }

    /// Short label used in structured log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            FetchError::Network(_) => "network",
            FetchError::DataAbsent(_) => "data_absent",
            FetchError::Parse(_) => "parse",
        }
    }
}

impl From<serde_json::Error> for FetchError {
    fn from(err: serde_json::Error) -> Self {
        FetchError::Parse(err.to_string())
    }
}

impl From<wreq::Error> for FetchError {
    fn from(err: wreq::Error) -> Self {
        FetchError::Network(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_network_errors_retry() {
        assert!(FetchError::Network("timeout".into()).is_retryable());
        assert!(!FetchError::DataAbsent("no price".into()).is_retryable());
        assert!(!FetchError::Parse("eof".into()).is_retryable());
    }

    #[test]
    fn test_display() {
        let err = FetchError::DataAbsent("price_overview missing".into());
        assert_eq!(err.to_string(), "data absent: price_overview missing");
        assert_eq!(err.kind(), "data_absent");
    }

    #[test]
    fn test_from_serde_error() {
        let err: FetchError = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err().into();
        assert!(matches!(err, FetchError::Parse(_)));
    }
}
