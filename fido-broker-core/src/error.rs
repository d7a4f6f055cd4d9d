use thiserror::Error;

use crate::status::StatusCode;

/// Errors produced while decoding the options wire form.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("Malformed options: {0}")]
    Malformed(String),

    #[error("Unsupported wire version: {0}")]
    UnsupportedVersion(u8),

    #[error("Options too large: {size} bytes exceeds maximum of {max} bytes")]
    TooLarge { size: usize, max: usize },
}

/// Option values that decode fine but cannot be dispatched.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Relying party id must not be empty")]
    EmptyRelyingPartyId,

    #[error("Challenge must not be empty")]
    EmptyChallenge,

    #[error("Registration requires a user entity")]
    MissingUser,

    #[error("User id must be between 1 and {max} bytes, got {len}")]
    InvalidUserId { len: usize, max: usize },

    #[error("Registration requires at least one public key algorithm")]
    NoAlgorithms,

    #[error("Credential descriptor id must not be empty")]
    EmptyCredentialId,
}

/// Failure reported by the interactive collaborator while accepting a hand-off.
#[derive(Error, Debug, Clone)]
pub enum CollaboratorError {
    #[error("Collaborator unavailable: {0}")]
    Unavailable(String),

    #[error("Collaborator rejected hand-off: {0}")]
    Rejected(String),
}

/// Failure to reach the device security subsystem.
#[derive(Error, Debug, Clone)]
#[error("Device security query failed: {0}")]
pub struct DeviceSecurityError(pub String);

#[derive(Error, Debug)]
pub enum BrokerError {
    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error("Invalid options: {0}")]
    Validation(#[from] ValidationError),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl BrokerError {
    /// Status surfaced to the caller for this error.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Decode(_) | Self::Validation(_) => StatusCode::InvalidOptions,
            Self::Serialization(_) | Self::Internal(_) => StatusCode::InternalError,
        }
    }
}

pub type Result<T> = std::result::Result<T, BrokerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_and_validation_map_to_invalid_options() {
        let err: BrokerError = DecodeError::UnsupportedVersion(9).into();
        assert_eq!(err.status(), StatusCode::InvalidOptions);

        let err: BrokerError = ValidationError::EmptyRelyingPartyId.into();
        assert_eq!(err.status(), StatusCode::InvalidOptions);
    }

    #[test]
    fn test_internal_maps_to_internal_error() {
        let err = BrokerError::Internal("no runtime".into());
        assert_eq!(err.status(), StatusCode::InternalError);
    }
}
