//! Opaque identifier newtypes.
//!
//! Each wraps a plain string so the compiler keeps account ids, client
//! ids, trace ids, and capture-session ids from being mixed up.

use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! string_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(String);

        impl $name {
            pub fn new(raw: impl Into<String>) -> Self {
                Self(raw.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self::new(s)
            }
        }
    };
}

string_id! {
    /// Identifies the applicant's account in the upstream user store.
    AccountId
}

string_id! {
    /// The relying client (service provider) a resolution pass is billed to.
    ClientId
}

string_id! {
    /// Correlation id threaded through logs for one proofing attempt.
    TraceId
}

string_id! {
    /// Opaque key of a pollable capture-session record.
    SessionId
}

impl SessionId {
    /// Generate a fresh random session id (32 hex characters).
    pub fn generate() -> Self {
        let mut bytes = [0u8; 16];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(hex::encode(bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_session_ids_are_unique_and_hex() {
        let a = SessionId::generate();
        let b = SessionId::generate();
        assert_ne!(a, b);
        assert_eq!(a.as_str().len(), 32);
        assert!(a.as_str().chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn display_round_trips() {
        let id = ClientId::new("urn:gov:agency:sp:test");
        assert_eq!(id.to_string(), "urn:gov:agency:sp:test");
    }
}
