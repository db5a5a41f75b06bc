//! The applicant PII model assembled once per proofing attempt.

use crate::error::TypesError;
use crate::fingerprint::{FingerprintKey, SsnFingerprint};
use crate::ids::AccountId;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// How the applicant is being proofed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnrollmentMode {
    /// Unsupervised remote flow; only the residential address exists.
    Remote,
    /// Supervised in-person enrollment; an agent verified the physical
    /// document, and the document address may differ from the
    /// residential address.
    InPerson,
}

/// Category of the identity document.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StateIdType {
    DriversLicense,
    DriversPermit,
    StateIdCard,
}

/// A two-letter issuing-jurisdiction code (e.g. `VA`).
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Jurisdiction(String);

impl Jurisdiction {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for Jurisdiction {
    type Err = TypesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let code = s.trim().to_ascii_uppercase();
        if code.len() == 2 && code.chars().all(|c| c.is_ascii_uppercase()) {
            Ok(Self(code))
        } else {
            Err(TypesError::InvalidJurisdiction(s.to_string()))
        }
    }
}

impl fmt::Display for Jurisdiction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A postal address as extracted from a document or entered by the user.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    pub address1: String,
    #[serde(default)]
    pub address2: Option<String>,
    pub city: String,
    pub state: String,
    pub zipcode: String,
}

impl Address {
    /// Case- and whitespace-insensitive comparison used to decide whether
    /// the document address and residential address are the same place.
    pub fn matches(&self, other: &Address) -> bool {
        fn norm(s: &str) -> String {
            s.split_whitespace()
                .collect::<Vec<_>>()
                .join(" ")
                .to_ascii_uppercase()
        }
        let norm_opt = |s: &Option<String>| s.as_deref().map(norm).unwrap_or_default();
        norm(&self.address1) == norm(&other.address1)
            && norm_opt(&self.address2) == norm_opt(&other.address2)
            && norm(&self.city) == norm(&other.city)
            && norm(&self.state) == norm(&other.state)
            && norm(&self.zipcode) == norm(&other.zipcode)
    }
}

/// A social security number. Zeroized on drop; never printed.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct Ssn(String);

impl Ssn {
    /// Accepts `###-##-####` or nine bare digits; stores digits only.
    pub fn parse(raw: &str) -> Result<Self, TypesError> {
        let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
        if digits.len() == 9 {
            Ok(Self(digits))
        } else {
            Err(TypesError::InvalidSsn(format!(
                "expected 9 digits, got {}",
                digits.len()
            )))
        }
    }

    pub fn as_digits(&self) -> &str {
        &self.0
    }

    /// Keyed one-way fingerprint for abuse counters and duplicate checks.
    pub fn fingerprint(&self, key: &FingerprintKey) -> SsnFingerprint {
        key.fingerprint(&self.0)
    }

    /// Overwrite the stored digits. Used once the value has been
    /// consumed by the vendor pass.
    pub fn scrub(&mut self) {
        self.0.zeroize();
    }

    pub fn is_scrubbed(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Ssn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Ssn(***-**-****)")
    }
}

/// Everything known about the applicant for one proofing attempt.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ApplicantPii {
    pub first_name: String,
    #[serde(default)]
    pub middle_name: Option<String>,
    pub last_name: String,
    /// ISO-8601 date of birth, e.g. `1999-09-30`.
    pub dob: String,
    pub ssn: Ssn,
    pub residential_address: Address,
    /// Address printed on the identity document, when it was captured
    /// separately (in-person enrollment only).
    #[serde(default)]
    pub id_doc_address: Option<Address>,
    pub state_id_number: String,
    pub state_id_jurisdiction: Jurisdiction,
    pub state_id_type: StateIdType,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    pub account_id: AccountId,
}

impl ApplicantPii {
    /// Whether the document address and the residential address are the
    /// same place. When no separate document address was captured the
    /// answer is yes by definition.
    pub fn same_address_as_id(&self) -> bool {
        match &self.id_doc_address {
            Some(doc) => doc.matches(&self.residential_address),
            None => true,
        }
    }

    /// The address the document asserts; falls back to the residential
    /// address when none was captured separately.
    pub fn id_address(&self) -> &Address {
        self.id_doc_address
            .as_ref()
            .unwrap_or(&self.residential_address)
    }

    /// Whether the fields the device-risk vendor requires are present.
    pub fn has_device_risk_fields(&self) -> bool {
        !self.first_name.is_empty() && !self.last_name.is_empty() && !self.ssn.is_scrubbed()
    }
}
