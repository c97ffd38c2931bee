//! Device fingerprint derivation.
//!
//! Derives a stable identifier for the current device from static platform
//! attributes. The fingerprint scopes rate-limit and session state per
//! device without requiring a user account.

use chrono::Utc;
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::MentorError;

/// Scheme prefix for derived fingerprints.
const FINGERPRINT_PREFIX: &str = "fp1";

/// Static device attributes the fingerprint is derived from.
///
/// Same attributes always yield the same fingerprint within a process
/// lifetime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceProfile {
    pub brand: String,
    pub model: String,
    pub os_name: String,
    pub os_version: String,
    pub app_id: String,
    pub app_version: String,
}

impl DeviceProfile {
    /// Detects a profile from the host platform.
    ///
    /// Attributes that the platform cannot provide fall back to `unknown`
    /// rather than failing; callers bridging a richer device API construct
    /// the profile directly instead.
    pub fn detect() -> Self {
        Self {
            brand: std::env::var("MENTOR_DEVICE_BRAND").unwrap_or_else(|_| "generic".to_string()),
            model: std::env::var("MENTOR_DEVICE_MODEL")
                .unwrap_or_else(|_| std::env::consts::ARCH.to_string()),
            os_name: std::env::consts::OS.to_string(),
            os_version: std::env::var("MENTOR_OS_VERSION").unwrap_or_else(|_| "unknown".to_string()),
            app_id: env!("CARGO_PKG_NAME").to_string(),
            app_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

enum ProfileSource {
    Profile(DeviceProfile),
    Fallback,
}

/// Derives and caches the device fingerprint for the process lifetime.
///
/// The provider is an injectable value: tests construct a fresh instance
/// with a known profile instead of sharing process-global state.
pub struct FingerprintProvider {
    source: ProfileSource,
    cached: OnceCell<String>,
}

impl FingerprintProvider {
    /// Creates a provider for the given profile.
    pub fn new(profile: DeviceProfile) -> Self {
        Self {
            source: ProfileSource::Profile(profile),
            cached: OnceCell::new(),
        }
    }

    /// Creates a provider from the host platform's detected profile.
    pub fn detect() -> Self {
        Self::new(DeviceProfile::detect())
    }

    /// Creates a provider from a fallible profile lookup.
    ///
    /// A failed lookup degrades to a timestamp-derived fallback fingerprint
    /// instead of propagating the error.
    pub fn from_lookup(lookup: Result<DeviceProfile, MentorError>) -> Self {
        match lookup {
            Ok(profile) => Self::new(profile),
            Err(err) => {
                tracing::warn!(target: "security", "device profile lookup failed, using fallback fingerprint: {err}");
                Self {
                    source: ProfileSource::Fallback,
                    cached: OnceCell::new(),
                }
            }
        }
    }

    /// Returns the device fingerprint, deriving it on first use.
    pub fn fingerprint(&self) -> String {
        self.cached
            .get_or_init(|| match &self.source {
                ProfileSource::Profile(profile) => derive(profile),
                ProfileSource::Fallback => {
                    format!("{FINGERPRINT_PREFIX}-fallback-{:x}", Utc::now().timestamp_millis())
                }
            })
            .clone()
    }
}

/// Hashes the ordered profile attributes into a stable identifier.
fn derive(profile: &DeviceProfile) -> String {
    let mut hasher = Sha256::new();
    for attribute in [
        &profile.brand,
        &profile.model,
        &profile.os_name,
        &profile.os_version,
        &profile.app_id,
        &profile.app_version,
    ] {
        hasher.update(attribute.as_bytes());
        hasher.update(b"|");
    }
    let digest = hasher.finalize();
    format!("{FINGERPRINT_PREFIX}-{}", &hex::encode(digest)[..32])
}
