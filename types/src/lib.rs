//! Fundamental types for the attest identity-resolution core.
//!
//! This crate defines the types shared across every other crate in the
//! workspace: the applicant PII model, the verified-attribute vocabulary,
//! identifiers, timestamps, and SSN fingerprinting.

pub mod attribute;
pub mod error;
pub mod fingerprint;
pub mod ids;
pub mod pii;
pub mod time;

pub use attribute::Attribute;
pub use error::TypesError;
pub use fingerprint::{FingerprintKey, SsnFingerprint};
pub use ids::{AccountId, ClientId, SessionId, TraceId};
pub use pii::{Address, ApplicantPii, EnrollmentMode, Jurisdiction, Ssn, StateIdType};
pub use time::Timestamp;
