// Centralized error types

use crate::utils::retry::Retryable;
use thiserror::Error;

/// Rejected rule configuration
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RuleError {
    #[error("Rule name must not be empty")]
    EmptyName,

    #[error("Rule '{name}': max_strikes must be at least {min}, got {actual}")]
    MaxStrikesTooLow { name: String, min: u32, actual: u32 },

    #[error("Rule '{name}': completion percentage {value} is outside 0..=100")]
    CompletionOutOfRange { name: String, value: f64 },

    #[error("Rule '{name}': min completion {min} is greater than max completion {max}")]
    InvertedCompletionRange { name: String, min: f64, max: f64 },

    #[error("Rule '{name}': max_time_hours must be non-negative, got {value}")]
    NegativeMaxTime { name: String, value: f64 },

    #[error("Rule '{name}': at least one of min_speed or max_time_hours must be set")]
    NoSlowCriteria { name: String },

    #[error("Rule '{name}' overlaps with: {}", conflicts.join(", "))]
    Overlap { name: String, conflicts: Vec<String> },
}

/// Errors talking to a download client backend
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Unexpected status {status} from {endpoint}")]
    UnexpectedStatus { endpoint: String, status: u16 },

    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("RPC error: {0}")]
    Rpc(String),
}

impl Retryable for ClientError {
    fn is_retryable(&self) -> bool {
        match self {
            ClientError::Http(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            ClientError::UnexpectedStatus { status, .. } => *status >= 500 || *status == 429,
            ClientError::Authentication(_) => false,
            ClientError::MalformedResponse(_) => false,
            ClientError::Rpc(_) => false,
        }
    }
}

/// Errors talking to an arr instance
#[derive(Error, Debug)]
pub enum ArrError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Arr instance returned status {status} for {endpoint}")]
    UnexpectedStatus { endpoint: String, status: u16 },

    #[error("Invalid arr url: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Too many queue pages (>{0}), possible infinite loop")]
    TooManyPages(u32),
}

impl Retryable for ArrError {
    fn is_retryable(&self) -> bool {
        match self {
            ArrError::Http(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            ArrError::UnexpectedStatus { status, .. } => *status >= 500 || *status == 429,
            ArrError::InvalidUrl(_) | ArrError::TooManyPages(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overlap_message_lists_all_conflicts() {
        let err = RuleError::Overlap {
            name: "new".to_string(),
            conflicts: vec!["a".to_string(), "b".to_string()],
        };
        assert_eq!(err.to_string(), "Rule 'new' overlaps with: a, b");
    }

    #[test]
    fn test_status_retryability() {
        let server_error = ClientError::UnexpectedStatus {
            endpoint: "/api".to_string(),
            status: 502,
        };
        let not_found = ClientError::UnexpectedStatus {
            endpoint: "/api".to_string(),
            status: 404,
        };
        assert!(server_error.is_retryable());
        assert!(!not_found.is_retryable());
        assert!(!ClientError::Authentication("bad password".to_string()).is_retryable());
    }
}
