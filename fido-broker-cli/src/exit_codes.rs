//! Exit codes following sysexits.h conventions.
//!
//! Scripts feeding options blobs to the broker can tell a bad blob apart
//! from a missing file or a full disk.

use fido_broker_core::{BrokerError, DecodeError, ValidationError};

/// Successful execution.
pub const SUCCESS: i32 = 0;

/// General error (catch-all).
pub const GENERAL_ERROR: i32 = 1;

/// Command line usage error (invalid arguments).
/// Maps to EX_USAGE from sysexits.h.
pub const USAGE_ERROR: i32 = 64;

/// Options cannot be decoded or would be rejected by the broker.
/// Maps to EX_DATAERR from sysexits.h.
pub const INVALID_OPTIONS: i32 = 65;

/// Cannot open input file.
/// Maps to EX_NOINPUT from sysexits.h.
pub const INPUT_ERROR: i32 = 66;

/// I/O error (cannot write output file).
/// Maps to EX_IOERR from sysexits.h.
pub const IO_ERROR: i32 = 74;

/// Represents an exit code with optional error context.
pub struct ExitCode {
    pub code: i32,
    pub message: Option<String>,
}

impl ExitCode {
    pub const fn success() -> Self {
        Self {
            code: SUCCESS,
            message: None,
        }
    }

    pub fn from_anyhow(err: &anyhow::Error) -> Self {
        let message = format!("{err:#}");

        let invalid = err.chain().any(|cause| {
            cause.is::<DecodeError>() || cause.is::<ValidationError>() || cause.is::<BrokerError>()
        });

        let code = if invalid || message.contains("Invalid options") {
            INVALID_OPTIONS
        } else if message.contains("Failed to read") {
            INPUT_ERROR
        } else if message.contains("Failed to write") {
            IO_ERROR
        } else if message.contains("Invalid argument") {
            USAGE_ERROR
        } else {
            GENERAL_ERROR
        };

        Self {
            code,
            message: Some(message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn test_decode_errors_map_to_invalid_options() {
        let err: anyhow::Error = DecodeError::UnsupportedVersion(9).into();
        assert_eq!(ExitCode::from_anyhow(&err).code, INVALID_OPTIONS);

        let err = Err::<(), _>(ValidationError::EmptyChallenge)
            .context("Options would be rejected")
            .unwrap_err();
        assert_eq!(ExitCode::from_anyhow(&err).code, INVALID_OPTIONS);
    }

    #[test]
    fn test_io_errors_are_classified_by_context() {
        let io = || std::io::Error::new(std::io::ErrorKind::NotFound, "gone");

        let err = Err::<(), _>(io()).context("Failed to read options file").unwrap_err();
        assert_eq!(ExitCode::from_anyhow(&err).code, INPUT_ERROR);

        let err = Err::<(), _>(io()).context("Failed to write out.bin").unwrap_err();
        assert_eq!(ExitCode::from_anyhow(&err).code, IO_ERROR);

        let err = anyhow::anyhow!("something else");
        let exit = ExitCode::from_anyhow(&err);
        assert_eq!(exit.code, GENERAL_ERROR);
        assert_eq!(exit.message.as_deref(), Some("something else"));
    }
}
