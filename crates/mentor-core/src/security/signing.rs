//! Request integrity signatures.
//!
//! Produces a signature bound to the request payload, a timestamp, a
//! nonce, the device fingerprint, and a static application secret. A
//! cooperating backend recomputes the signature to detect tampering or
//! replay. This is an integrity tag, not a substitute for transport
//! encryption.

use sha2::{Digest, Sha256};
use std::sync::Arc;
use uuid::Uuid;

use crate::security::fingerprint::FingerprintProvider;

/// The signed header bundle attached to every completion request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedHeaders {
    /// Millisecond timestamp (`X-Timestamp`).
    pub timestamp: String,
    /// Single-use random value (`X-Nonce`).
    pub nonce: String,
    /// Integrity signature (`X-Signature`).
    pub signature: String,
}

/// Signs outgoing request payloads.
pub struct RequestSigner {
    app_secret: String,
    fingerprints: Arc<FingerprintProvider>,
}

impl RequestSigner {
    pub fn new(app_secret: impl Into<String>, fingerprints: Arc<FingerprintProvider>) -> Self {
        Self {
            app_secret: app_secret.into(),
            fingerprints,
        }
    }

    /// Computes the signature for the given payload, timestamp, and nonce.
    ///
    /// Deterministic for identical inputs; any change to payload,
    /// timestamp, or nonce changes the signature.
    pub fn sign(&self, payload: &str, timestamp: &str, nonce: &str) -> String {
        let mut hasher = Sha256::new();
        for part in [
            payload,
            timestamp,
            nonce,
            self.fingerprints.fingerprint().as_str(),
            self.app_secret.as_str(),
        ] {
            // length prefix prevents concatenation ambiguity between parts
            hasher.update(part.len().to_le_bytes());
            hasher.update(part.as_bytes());
        }
        hex::encode(hasher.finalize())
    }

    /// Generates a timestamp, a fresh nonce, and the matching signature.
    pub fn signed_headers(&self, payload: &str) -> SignedHeaders {
        let timestamp = chrono::Utc::now().timestamp_millis().to_string();
        let nonce = Uuid::new_v4().simple().to_string();
        let signature = self.sign(payload, &timestamp, &nonce);
        SignedHeaders {
            timestamp,
            nonce,
            signature,
        }
    }
}
