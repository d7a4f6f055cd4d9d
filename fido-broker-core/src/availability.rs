//! Platform authenticator availability.
//!
//! Answers are computed fresh on every query from the [`DeviceSecurity`]
//! source. Failures of the source, including panics, read as "unavailable".

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use tracing::{debug, warn};

use crate::error::DeviceSecurityError;

/// Lowest platform capability level that supports a user-verifying
/// platform authenticator.
pub const MIN_PLATFORM_LEVEL: u32 = 24;

/// Device security state as reported by the host platform.
pub trait DeviceSecurity: Send + Sync {
    /// Capability level of the running platform.
    fn platform_level(&self) -> u32;

    /// Whether a secure unlock mechanism (PIN, pattern, biometric) is configured.
    fn is_device_secure(&self) -> Result<bool, DeviceSecurityError>;
}

/// Fixed device state, adjustable at runtime. Used by the server and tests.
#[derive(Debug)]
pub struct StaticDeviceSecurity {
    level: AtomicU32,
    secure: AtomicBool,
    failing: AtomicBool,
}

impl StaticDeviceSecurity {
    pub fn new(level: u32, secure: bool) -> Self {
        Self {
            level: AtomicU32::new(level),
            secure: AtomicBool::new(secure),
            failing: AtomicBool::new(false),
        }
    }

    pub fn set_secure(&self, secure: bool) {
        self.secure.store(secure, Ordering::Relaxed);
    }

    pub fn set_level(&self, level: u32) {
        self.level.store(level, Ordering::Relaxed);
    }

    /// Make every subsequent security query fail.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::Relaxed);
    }
}

impl DeviceSecurity for StaticDeviceSecurity {
    fn platform_level(&self) -> u32 {
        self.level.load(Ordering::Relaxed)
    }

    fn is_device_secure(&self) -> Result<bool, DeviceSecurityError> {
        if self.failing.load(Ordering::Relaxed) {
            return Err(DeviceSecurityError("keyguard service unreachable".into()));
        }
        Ok(self.secure.load(Ordering::Relaxed))
    }
}

/// Availability oracle over a [`DeviceSecurity`] source.
pub struct AvailabilityOracle<D> {
    device: D,
    min_level: u32,
}

impl<D: DeviceSecurity> AvailabilityOracle<D> {
    pub fn new(device: D) -> Self {
        Self::with_min_level(device, MIN_PLATFORM_LEVEL)
    }

    pub fn with_min_level(device: D, min_level: u32) -> Self {
        Self { device, min_level }
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    /// Whether a user-verifying platform authenticator can be used right now.
    pub fn is_platform_authenticator_available(&self) -> bool {
        let queried = catch_unwind(AssertUnwindSafe(|| {
            let level = self.device.platform_level();
            if level < self.min_level {
                debug!(level, min = self.min_level, "Platform level too low");
                return Ok(false);
            }
            self.device.is_device_secure()
        }));

        match queried {
            Ok(Ok(secure)) => secure,
            Ok(Err(e)) => {
                warn!(error = %e, "Device security query failed, reporting unavailable");
                false
            }
            Err(_) => {
                warn!("Device security query panicked, reporting unavailable");
                false
            }
        }
    }

    /// Availability for a specific credential.
    ///
    /// Credential storage belongs to the interactive collaborator, so this
    /// applies the device policy once the identifiers are well-formed.
    pub fn is_platform_authenticator_available_for_credential(
        &self,
        rp_id: &str,
        credential_id: &[u8],
    ) -> bool {
        if rp_id.trim().is_empty() || credential_id.is_empty() {
            return false;
        }
        self.is_platform_authenticator_available()
    }
}

impl<D> std::fmt::Debug for AvailabilityOracle<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AvailabilityOracle")
            .field("min_level", &self.min_level)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct PanickingDevice;

    impl DeviceSecurity for PanickingDevice {
        fn platform_level(&self) -> u32 {
            30
        }

        fn is_device_secure(&self) -> Result<bool, DeviceSecurityError> {
            panic!("binder died")
        }
    }

    #[test]
    fn test_secure_device_is_available() {
        let oracle = AvailabilityOracle::new(StaticDeviceSecurity::new(30, true));
        assert!(oracle.is_platform_authenticator_available());
    }

    #[test]
    fn test_insecure_device_is_unavailable() {
        let oracle = AvailabilityOracle::new(StaticDeviceSecurity::new(30, false));
        assert!(!oracle.is_platform_authenticator_available());
    }

    #[test]
    fn test_below_min_level_is_unavailable() {
        let oracle = AvailabilityOracle::new(StaticDeviceSecurity::new(MIN_PLATFORM_LEVEL - 1, true));
        assert!(!oracle.is_platform_authenticator_available());

        oracle.device().set_level(MIN_PLATFORM_LEVEL);
        assert!(oracle.is_platform_authenticator_available());
    }

    #[test]
    fn test_query_failure_reads_as_unavailable() {
        let oracle = AvailabilityOracle::new(StaticDeviceSecurity::new(30, true));
        oracle.device().set_failing(true);
        assert!(!oracle.is_platform_authenticator_available());
        oracle.device().set_failing(false);
        assert!(oracle.is_platform_authenticator_available());
    }

    #[test]
    fn test_query_panic_reads_as_unavailable() {
        let oracle = AvailabilityOracle::new(PanickingDevice);
        assert!(!oracle.is_platform_authenticator_available());
    }

    #[test]
    fn test_answer_is_never_cached() {
        let oracle = AvailabilityOracle::new(StaticDeviceSecurity::new(30, false));
        assert!(!oracle.is_platform_authenticator_available());
        oracle.device().set_secure(true);
        assert!(oracle.is_platform_authenticator_available());
    }

    #[test]
    fn test_credential_scoped() {
        let oracle = AvailabilityOracle::new(StaticDeviceSecurity::new(30, true));
        assert!(oracle.is_platform_authenticator_available_for_credential("example.com", &[1]));
        assert!(!oracle.is_platform_authenticator_available_for_credential("", &[1]));
        assert!(!oracle.is_platform_authenticator_available_for_credential("example.com", &[]));
    }
}
