//! Keyed one-way fingerprinting of sensitive attributes.
//!
//! Abuse counters and the duplicate-profile invariant key off an
//! HMAC-SHA256 fingerprint of the SSN rather than the raw value, so the
//! counter store never holds recoverable PII.

use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::fmt;

type HmacSha256 = Hmac<Sha256>;

/// Secret key for attribute fingerprinting.
///
/// All fingerprints produced with the same key are comparable; rotating
/// the key invalidates existing counters, which is acceptable for
/// abuse-prevention state.
#[derive(Clone)]
pub struct FingerprintKey(Vec<u8>);

impl FingerprintKey {
    pub fn new(key: impl Into<Vec<u8>>) -> Self {
        Self(key.into())
    }

    /// Fingerprint an attribute value. The value is canonicalized
    /// (digits only for SSNs) by the caller.
    pub fn fingerprint(&self, value: &str) -> SsnFingerprint {
        let mut mac =
            HmacSha256::new_from_slice(&self.0).expect("HMAC accepts keys of any length");
        mac.update(value.as_bytes());
        SsnFingerprint(hex::encode(mac.finalize().into_bytes()))
    }
}

impl fmt::Debug for FingerprintKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("FingerprintKey(..)")
    }
}

/// Hex-encoded HMAC-SHA256 fingerprint of an SSN.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SsnFingerprint(String);

impl SsnFingerprint {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SsnFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
