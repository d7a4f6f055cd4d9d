//! Versioned binary wire form for [`CredentialOptions`].
//!
//! Layout: one version byte followed by a single CBOR item holding the
//! options map. Field names are part of the format, so renaming a field of
//! [`CredentialOptions`] requires a new version tag.

use std::io::Cursor;

use sha3::{Digest, Sha3_256};

use crate::error::{BrokerError, DecodeError, Result};
use crate::options::{CredentialOptions, RequestKind};

/// Current wire version tag.
pub const WIRE_VERSION: u8 = 1;

/// Maximum accepted size of an encoded options blob (64 KiB).
pub const MAX_OPTIONS_SIZE: usize = 64 * 1024;

/// Domain separator for correlation token derivation.
const TOKEN_DOMAIN: &[u8] = b"fido-broker/correlation/v1";

/// Serialize options to the wire form.
///
/// Fails with [`DecodeError::TooLarge`] when the result would exceed
/// [`MAX_OPTIONS_SIZE`], since `decode` would refuse it.
pub fn encode(options: &CredentialOptions) -> Result<Vec<u8>> {
    let mut bytes = vec![WIRE_VERSION];
    ciborium::into_writer(options, &mut bytes)
        .map_err(|e| BrokerError::Serialization(e.to_string()))?;
    if bytes.len() > MAX_OPTIONS_SIZE {
        return Err(DecodeError::TooLarge {
            size: bytes.len(),
            max: MAX_OPTIONS_SIZE,
        }
        .into());
    }
    Ok(bytes)
}

/// Parse options from the wire form.
///
/// Rejects empty or truncated input, unknown version tags, oversized blobs and
/// trailing bytes after the CBOR item.
pub fn decode(bytes: &[u8]) -> std::result::Result<CredentialOptions, DecodeError> {
    if bytes.len() > MAX_OPTIONS_SIZE {
        return Err(DecodeError::TooLarge {
            size: bytes.len(),
            max: MAX_OPTIONS_SIZE,
        });
    }

    let (&version, body) = bytes
        .split_first()
        .ok_or_else(|| DecodeError::Malformed("empty input".into()))?;

    if version != WIRE_VERSION {
        return Err(DecodeError::UnsupportedVersion(version));
    }

    let mut cursor = Cursor::new(body);
    let options: CredentialOptions = ciborium::from_reader(&mut cursor)
        .map_err(|e| DecodeError::Malformed(e.to_string()))?;

    let consumed = cursor.position() as usize;
    if consumed != body.len() {
        return Err(DecodeError::Malformed(format!(
            "{} trailing bytes after options",
            body.len() - consumed
        )));
    }

    Ok(options)
}

/// Stable per-request key: SHA3-256 over the kind tag and the encoded options.
///
/// Identical options dispatched as the same ceremony always produce the same
/// digest, across restarts.
pub fn request_digest(kind: RequestKind, encoded: &[u8]) -> [u8; 32] {
    let mut hasher = Sha3_256::new();
    hasher.update(TOKEN_DOMAIN);
    hasher.update([kind.tag()]);
    hasher.update(encoded);

    let mut digest = [0u8; 32];
    digest.copy_from_slice(&hasher.finalize());
    digest
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::{
        AuthenticatorTransport, CredentialDescriptor, UserVerificationRequirement, COSE_ALG_ES256,
        COSE_ALG_RS256,
    };

    fn sample() -> CredentialOptions {
        CredentialOptions::builder("login.example.com", vec![0x5A; 32])
            .rp_name("Example")
            .user(b"user-42".to_vec(), "alice@example.com", "Alice")
            .algorithm(COSE_ALG_ES256)
            .algorithm(COSE_ALG_RS256)
            .exclude(CredentialDescriptor {
                id: vec![1, 2, 3, 4],
                transports: vec![AuthenticatorTransport::Internal, AuthenticatorTransport::Hybrid],
            })
            .user_verification(UserVerificationRequirement::Required)
            .timeout_ms(60_000)
            .build()
    }

    #[test]
    fn test_roundtrip() {
        let options = sample();
        let bytes = encode(&options).unwrap();
        assert_eq!(bytes[0], WIRE_VERSION);
        assert_eq!(decode(&bytes).unwrap(), options);
    }

    #[test]
    fn test_roundtrip_minimal() {
        let options = CredentialOptions::builder("a", vec![0]).build();
        assert_eq!(decode(&encode(&options).unwrap()).unwrap(), options);
    }

    #[test]
    fn test_encoding_is_deterministic() {
        assert_eq!(encode(&sample()).unwrap(), encode(&sample()).unwrap());
    }

    #[test]
    fn test_empty_input_is_malformed() {
        assert!(matches!(decode(&[]), Err(DecodeError::Malformed(_))));
    }

    #[test]
    fn test_version_only_is_malformed() {
        assert!(matches!(
            decode(&[WIRE_VERSION]),
            Err(DecodeError::Malformed(_))
        ));
    }

    #[test]
    fn test_unknown_version_rejected() {
        let mut bytes = encode(&sample()).unwrap();
        bytes[0] = 0x7F;
        assert_eq!(decode(&bytes), Err(DecodeError::UnsupportedVersion(0x7F)));
    }

    #[test]
    fn test_every_truncation_is_malformed() {
        let bytes = encode(&sample()).unwrap();
        for len in 1..bytes.len() {
            assert!(
                matches!(decode(&bytes[..len]), Err(DecodeError::Malformed(_))),
                "truncation at {len} was accepted"
            );
        }
    }

    #[test]
    fn test_trailing_bytes_rejected() {
        let mut bytes = encode(&sample()).unwrap();
        bytes.push(0x00);
        assert!(matches!(decode(&bytes), Err(DecodeError::Malformed(_))));
    }

    #[test]
    fn test_oversized_rejected() {
        let bytes = vec![WIRE_VERSION; MAX_OPTIONS_SIZE + 1];
        assert!(matches!(decode(&bytes), Err(DecodeError::TooLarge { .. })));
    }

    #[test]
    fn test_encode_refuses_what_decode_would_reject() {
        // Small integers take one CBOR byte each, so framing pushes this over
        let options = CredentialOptions::builder("example.com", vec![0; MAX_OPTIONS_SIZE]).build();
        let err = encode(&options).unwrap_err();
        assert!(matches!(err, BrokerError::Decode(DecodeError::TooLarge { .. })));
        assert_eq!(err.status(), crate::status::StatusCode::InvalidOptions);

        let fits = CredentialOptions::builder("example.com", vec![0; MAX_OPTIONS_SIZE - 256]).build();
        let bytes = encode(&fits).unwrap();
        assert!(bytes.len() <= MAX_OPTIONS_SIZE);
        assert_eq!(decode(&bytes).unwrap(), fits);
    }

    #[test]
    fn test_digest_depends_on_kind_and_options() {
        let bytes = encode(&sample()).unwrap();
        let register = request_digest(RequestKind::Register, &bytes);
        let sign = request_digest(RequestKind::Sign, &bytes);
        assert_ne!(register, sign);
        assert_eq!(register, request_digest(RequestKind::Register, &bytes));

        let mut other = sample();
        other.challenge[0] ^= 0xFF;
        let other_bytes = encode(&other).unwrap();
        assert_ne!(register, request_digest(RequestKind::Register, &other_bytes));
    }
}
