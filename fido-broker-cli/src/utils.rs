//! Shared helpers for CLI commands.

use std::path::Path;

use anyhow::{Context, Result};
use fido_broker_core::{codec, CredentialOptions};

/// Parse a hex argument, tolerating an optional `0x` prefix.
pub fn parse_hex(label: &str, value: &str) -> Result<Vec<u8>> {
    let trimmed = value.trim();
    let digits = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);
    hex::decode(digits).with_context(|| format!("Invalid argument: {label} is not valid hex"))
}

/// Read an options file and decode it.
///
/// Returns the raw bytes alongside the parsed options.
pub fn load_options(path: &Path) -> Result<(Vec<u8>, CredentialOptions)> {
    let bytes = std::fs::read(path)
        .with_context(|| format!("Failed to read options file: {}", path.display()))?;
    tracing::debug!(path = %path.display(), size = bytes.len(), "Read options file");

    let options = codec::decode(&bytes)
        .with_context(|| format!("Invalid options in {}", path.display()))?;
    Ok((bytes, options))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hex_accepts_prefix() {
        assert_eq!(parse_hex("challenge", "0xC0ffee").unwrap(), vec![0xC0, 0xFF, 0xEE]);
        assert_eq!(parse_hex("challenge", " 0102 ").unwrap(), vec![1, 2]);
    }

    #[test]
    fn test_parse_hex_rejects_garbage() {
        let err = parse_hex("challenge", "zz").unwrap_err();
        assert!(format!("{err:#}").contains("Invalid argument: challenge"));
        assert!(parse_hex("challenge", "abc").is_err());
    }

    #[test]
    fn test_load_options_missing_file() {
        let err = load_options(Path::new("/nonexistent/options.bin")).unwrap_err();
        assert!(format!("{err:#}").contains("Failed to read options file"));
    }
}
