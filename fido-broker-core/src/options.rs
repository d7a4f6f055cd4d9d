//! Credential creation and request options carried across the IPC boundary.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Largest user handle accepted for registrations.
pub const MAX_USER_ID_BYTES: usize = 64;

/// COSE algorithm identifier for ES256.
pub const COSE_ALG_ES256: i32 = -7;

/// COSE algorithm identifier for RS256.
pub const COSE_ALG_RS256: i32 = -257;

/// Ceremony requested by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestKind {
    /// Create a new credential (attestation)
    Register,
    /// Use an existing credential (assertion)
    Sign,
}

impl RequestKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Register => "register",
            Self::Sign => "sign",
        }
    }

    /// Single-byte tag mixed into correlation tokens.
    pub(crate) fn tag(self) -> u8 {
        match self {
            Self::Register => 0x01,
            Self::Sign => 0x02,
        }
    }
}

impl std::fmt::Display for RequestKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Relying party preference for user verification.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserVerificationRequirement {
    Required,
    #[default]
    Preferred,
    Discouraged,
}

/// Transport hint attached to a credential descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthenticatorTransport {
    Usb,
    Nfc,
    Ble,
    Internal,
    Hybrid,
}

/// Reference to a credential the relying party allows or excludes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CredentialDescriptor {
    /// Raw credential id
    pub id: Vec<u8>,
    /// Transport hints, possibly empty
    #[serde(default)]
    pub transports: Vec<AuthenticatorTransport>,
}

impl CredentialDescriptor {
    pub fn new(id: Vec<u8>) -> Self {
        Self {
            id,
            transports: Vec::new(),
        }
    }
}

/// User account a new credential is bound to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserEntity {
    /// Opaque user handle
    pub id: Vec<u8>,
    pub name: String,
    pub display_name: String,
}

/// Immutable request options for a single registration or assertion.
///
/// Registration uses `user`, `algorithms` and `exclude_credentials`; assertion
/// uses `allow_credentials`. Fields that do not apply to a ceremony are left empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CredentialOptions {
    /// Relying party identifier (effective domain)
    pub rp_id: String,
    /// Human-readable relying party name
    pub rp_name: Option<String>,
    /// Server-provided challenge
    pub challenge: Vec<u8>,
    /// Account for registration
    pub user: Option<UserEntity>,
    /// Acceptable COSE algorithms in preference order
    pub algorithms: Vec<i32>,
    pub allow_credentials: Vec<CredentialDescriptor>,
    pub exclude_credentials: Vec<CredentialDescriptor>,
    pub user_verification: UserVerificationRequirement,
    /// Ceremony timeout in milliseconds; `None` or zero means broker default
    pub timeout_ms: Option<u64>,
}

impl CredentialOptions {
    /// Start building options for the given relying party and challenge.
    pub fn builder(rp_id: impl Into<String>, challenge: impl Into<Vec<u8>>) -> OptionsBuilder {
        OptionsBuilder::new(rp_id, challenge)
    }

    /// Check that the options can be dispatched as the given ceremony.
    pub fn validate(&self, kind: RequestKind) -> Result<(), ValidationError> {
        if self.rp_id.trim().is_empty() {
            return Err(ValidationError::EmptyRelyingPartyId);
        }
        if self.challenge.is_empty() {
            return Err(ValidationError::EmptyChallenge);
        }

        let descriptors = self
            .allow_credentials
            .iter()
            .chain(self.exclude_credentials.iter());
        for descriptor in descriptors {
            if descriptor.id.is_empty() {
                return Err(ValidationError::EmptyCredentialId);
            }
        }

        if kind == RequestKind::Register {
            let user = self.user.as_ref().ok_or(ValidationError::MissingUser)?;
            if user.id.is_empty() || user.id.len() > MAX_USER_ID_BYTES {
                return Err(ValidationError::InvalidUserId {
                    len: user.id.len(),
                    max: MAX_USER_ID_BYTES,
                });
            }
            if self.algorithms.is_empty() {
                return Err(ValidationError::NoAlgorithms);
            }
        }

        Ok(())
    }

    /// Timeout to apply to the session, bounded to `[min, max]`.
    ///
    /// A missing or zero timeout falls back to `default`.
    pub fn effective_timeout(&self, default: Duration, min: Duration, max: Duration) -> Duration {
        let requested = match self.timeout_ms {
            Some(ms) if ms > 0 => Duration::from_millis(ms),
            _ => default,
        };
        // max wins if the bounds are inverted
        requested.max(min).min(max)
    }
}

/// Builder for [`CredentialOptions`].
pub struct OptionsBuilder {
    options: CredentialOptions,
}

impl OptionsBuilder {
    pub fn new(rp_id: impl Into<String>, challenge: impl Into<Vec<u8>>) -> Self {
        Self {
            options: CredentialOptions {
                rp_id: rp_id.into(),
                rp_name: None,
                challenge: challenge.into(),
                user: None,
                algorithms: Vec::new(),
                allow_credentials: Vec::new(),
                exclude_credentials: Vec::new(),
                user_verification: UserVerificationRequirement::default(),
                timeout_ms: None,
            },
        }
    }

    pub fn rp_name(mut self, name: impl Into<String>) -> Self {
        self.options.rp_name = Some(name.into());
        self
    }

    pub fn user(mut self, id: Vec<u8>, name: impl Into<String>, display_name: impl Into<String>) -> Self {
        self.options.user = Some(UserEntity {
            id,
            name: name.into(),
            display_name: display_name.into(),
        });
        self
    }

    pub fn algorithm(mut self, alg: i32) -> Self {
        self.options.algorithms.push(alg);
        self
    }

    pub fn allow(mut self, descriptor: CredentialDescriptor) -> Self {
        self.options.allow_credentials.push(descriptor);
        self
    }

    pub fn exclude(mut self, descriptor: CredentialDescriptor) -> Self {
        self.options.exclude_credentials.push(descriptor);
        self
    }

    pub fn user_verification(mut self, requirement: UserVerificationRequirement) -> Self {
        self.options.user_verification = requirement;
        self
    }

    pub fn timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.options.timeout_ms = Some(timeout_ms);
        self
    }

    pub fn build(self) -> CredentialOptions {
        self.options
    }
}
