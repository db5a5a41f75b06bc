//! Vocabulary of identity attributes a vendor can verify.
//!
//! Vendors report match indicators per attribute; steps and the
//! adjudicator reason about these as a closed enum rather than loose
//! strings so coverage checks are exhaustive.

use serde::{Deserialize, Serialize};
use std::fmt;

/// An identity attribute submitted to (or verified by) a vendor.
///
/// `Address` is a composite: line 1, city, state, and zip code are
/// required parts; line 2 is an optional part.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Attribute {
    FirstName,
    LastName,
    Dob,
    Ssn,
    Address,
    Address1,
    Address2,
    City,
    State,
    Zipcode,
    StateIdNumber,
    StateIdType,
    StateIdIssued,
    StateIdExpiration,
    Phone,
}

impl Attribute {
    /// Attributes whose mismatch or absence fails a whole vendor result.
    ///
    /// Ancillary attributes (issue/expiration dates, document category,
    /// address line 2) merely drop out of `verified_attributes`.
    pub fn is_identity_critical(&self) -> bool {
        matches!(
            self,
            Attribute::FirstName
                | Attribute::LastName
                | Attribute::Dob
                | Attribute::Ssn
                | Attribute::StateIdNumber
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Attribute::FirstName => "first_name",
            Attribute::LastName => "last_name",
            Attribute::Dob => "dob",
            Attribute::Ssn => "ssn",
            Attribute::Address => "address",
            Attribute::Address1 => "address1",
            Attribute::Address2 => "address2",
            Attribute::City => "city",
            Attribute::State => "state",
            Attribute::Zipcode => "zipcode",
            Attribute::StateIdNumber => "state_id_number",
            Attribute::StateIdType => "state_id_type",
            Attribute::StateIdIssued => "state_id_issued",
            Attribute::StateIdExpiration => "state_id_expiration",
            Attribute::Phone => "phone",
        }
    }
}

impl fmt::Display for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
