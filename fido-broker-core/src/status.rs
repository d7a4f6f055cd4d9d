//! Status codes returned to callers of the inbound service contract.
//!
//! Numeric values follow the common status codes used by the host platform's
//! service framework so a transport can forward them unchanged.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Closed set of statuses a caller can observe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[repr(u8)]
pub enum StatusCode {
    /// Request accepted, or ceremony finished with a result
    Success = 0,

    /// Unexpected broker-side failure
    InternalError = 8,

    /// Options could not be decoded or failed validation
    InvalidOptions = 10,

    /// Session deadline elapsed before a result arrived
    Timeout = 15,

    /// User or collaborator cancelled the ceremony
    Cancelled = 16,
}

impl StatusCode {
    /// Stable upper-case name used on the wire.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Success => "SUCCESS",
            Self::InternalError => "INTERNAL_ERROR",
            Self::InvalidOptions => "INVALID_OPTIONS",
            Self::Timeout => "TIMEOUT",
            Self::Cancelled => "CANCELLED",
        }
    }

    /// Numeric status code.
    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn is_success(self) -> bool {
        self == Self::Success
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_codes() {
        assert_eq!(StatusCode::Success.code(), 0);
        assert_eq!(StatusCode::InternalError.code(), 8);
        assert_eq!(StatusCode::InvalidOptions.code(), 10);
        assert_eq!(StatusCode::Timeout.code(), 15);
        assert_eq!(StatusCode::Cancelled.code(), 16);
    }

    #[test]
    fn test_serde_names_match_display() {
        for status in [
            StatusCode::Success,
            StatusCode::InternalError,
            StatusCode::InvalidOptions,
            StatusCode::Timeout,
            StatusCode::Cancelled,
        ] {
            let json = serde_json::to_string(&status).unwrap();
            assert_eq!(json, format!("\"{}\"", status));
        }
    }
}
