//! Uniform result shapes for vendor outcomes.
//!
//! Every step produces one of these; they are immutable once produced.
//! The shapes share a common core ([`VendorOutcome`]) and are dispatched
//! as a tagged union ([`ProofingResult`]) where heterogeneous handling
//! is needed.

use attest_types::Attribute;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Per-attribute error code: the attribute was present in the vendor
/// response but did not match.
pub const CODE_UNVERIFIED: &str = "UNVERIFIED";
/// Per-attribute error code: the attribute was absent from the vendor
/// response. Absence is never counted as verified.
pub const CODE_MISSING: &str = "MISSING";

/// One vendor invocation in the ordered stage history.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stage {
    pub vendor_name: String,
    pub transaction_id: Option<String>,
}

/// Classification of a vendor exception, so callers can pick an
/// appropriate remediation message without parsing strings.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VendorExceptionKind {
    /// The issuing authority's system reported itself unavailable.
    AuthorityUnavailable,
    /// The issuing authority's system reported an internal error.
    AuthoritySystemError,
    /// The issuing authority did not respond in time.
    AuthorityTimeout,
    /// The vendor endpoint could not be reached.
    Network,
    /// The vendor call itself timed out.
    Timeout,
    Unclassified,
}

impl VendorExceptionKind {
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            VendorExceptionKind::Timeout | VendorExceptionKind::AuthorityTimeout
        )
    }
}

/// A typed vendor exception with its original message.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VendorException {
    pub kind: VendorExceptionKind,
    pub message: String,
}

impl VendorException {
    pub fn new(kind: VendorExceptionKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for VendorException {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.message)
    }
}

/// The common core of every vendor result.
///
/// Invariant: `success == false` implies `errors` is non-empty or
/// `exception` is present; the constructors maintain this.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VendorOutcome {
    pub success: bool,
    pub vendor_name: String,
    pub transaction_id: Option<String>,
    pub errors: BTreeMap<Attribute, Vec<String>>,
    pub exception: Option<VendorException>,
    pub timed_out: bool,
    /// Ordered history of the vendor invocations that produced this
    /// result (grows as results flow through dependent steps).
    pub stages: Vec<Stage>,
}

impl VendorOutcome {
    /// A successful vendor response.
    pub fn success(vendor_name: impl Into<String>, transaction_id: Option<String>) -> Self {
        let vendor_name = vendor_name.into();
        Self {
            success: true,
            stages: vec![Stage {
                vendor_name: vendor_name.clone(),
                transaction_id: transaction_id.clone(),
            }],
            vendor_name,
            transaction_id,
            errors: BTreeMap::new(),
            exception: None,
            timed_out: false,
        }
    }

    /// A definitive vendor rejection with per-attribute error codes.
    /// `errors` must be non-empty.
    pub fn failure(
        vendor_name: impl Into<String>,
        transaction_id: Option<String>,
        errors: BTreeMap<Attribute, Vec<String>>,
    ) -> Self {
        debug_assert!(!errors.is_empty(), "failure without error codes");
        let vendor_name = vendor_name.into();
        Self {
            success: false,
            stages: vec![Stage {
                vendor_name: vendor_name.clone(),
                transaction_id: transaction_id.clone(),
            }],
            vendor_name,
            transaction_id,
            errors,
            exception: None,
            timed_out: false,
        }
    }

    /// A failure caused by a vendor exception (timeout, outage,
    /// malformed response).
    pub fn from_exception(vendor_name: impl Into<String>, exception: VendorException) -> Self {
        let vendor_name = vendor_name.into();
        Self {
            success: false,
            stages: vec![Stage {
                vendor_name: vendor_name.clone(),
                transaction_id: None,
            }],
            vendor_name,
            transaction_id: None,
            errors: BTreeMap::new(),
            timed_out: exception.kind.is_timeout(),
            exception: Some(exception),
        }
    }

    /// A successful placeholder produced without a vendor call (e.g.
    /// "unsupported jurisdiction", "not applicable to this mode").
    pub fn marker(vendor_name: impl Into<String>) -> Self {
        let vendor_name = vendor_name.into();
        Self {
            success: true,
            vendor_name,
            transaction_id: None,
            errors: BTreeMap::new(),
            exception: None,
            timed_out: false,
            stages: Vec::new(),
        }
    }

    /// A failing marker produced without a vendor call, carrying a
    /// single coded error so the failure invariant holds.
    pub fn failing_marker(
        vendor_name: impl Into<String>,
        attribute: Attribute,
        code: impl Into<String>,
    ) -> Self {
        let mut errors = BTreeMap::new();
        errors.insert(attribute, vec![code.into()]);
        let vendor_name = vendor_name.into();
        Self {
            success: false,
            vendor_name,
            transaction_id: None,
            errors,
            exception: None,
            timed_out: false,
            stages: Vec::new(),
        }
    }

    /// Whether an error with the given code was recorded for `attribute`.
    pub fn has_error(&self, attribute: Attribute, code: &str) -> bool {
        self.errors
            .get(&attribute)
            .is_some_and(|codes| codes.iter().any(|c| c == code))
    }
}

/// Identity-resolution (credit header) result.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolutionResult {
    pub outcome: VendorOutcome,
    /// A failed result may still pass overall if a downstream record
    /// check independently verifies the attributes listed below.
    pub can_pass_with_additional_verification: bool,
    pub attributes_requiring_additional_verification: BTreeSet<Attribute>,
}

impl ResolutionResult {
    pub fn passed(outcome: VendorOutcome) -> Self {
        Self {
            outcome,
            can_pass_with_additional_verification: false,
            attributes_requiring_additional_verification: BTreeSet::new(),
        }
    }

    pub fn failed(outcome: VendorOutcome, recoverable_attributes: BTreeSet<Attribute>) -> Self {
        Self {
            can_pass_with_additional_verification: !recoverable_attributes.is_empty(),
            attributes_requiring_additional_verification: recoverable_attributes,
            outcome,
        }
    }

    pub fn success(&self) -> bool {
        self.outcome.success
    }

    pub fn vendor_name(&self) -> &str {
        &self.outcome.vendor_name
    }

    /// Whether this check is satisfied once the state-record result is
    /// taken into account: an outright pass, or a recoverable failure
    /// whose every listed attribute the record check verified.
    pub fn passes_with(&self, state_record: &StateRecordResult) -> bool {
        if self.success() {
            return true;
        }
        self.can_pass_with_additional_verification
            && state_record.success()
            && self
                .attributes_requiring_additional_verification
                .iter()
                .all(|a| state_record.verified_attributes.contains(a))
    }
}

/// State motor-vehicle-record result.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateRecordResult {
    pub outcome: VendorOutcome,
    /// Attributes the issuing authority affirmatively verified.
    pub verified_attributes: BTreeSet<Attribute>,
    /// Attributes the authority was asked about and answered, with the
    /// number of indicators contributing to each.
    pub requested_attributes: BTreeMap<Attribute, u32>,
    /// The issuing authority is inside a scheduled maintenance window;
    /// failures in this state are excused from abuse counting.
    pub jurisdiction_in_maintenance_window: bool,
}

impl StateRecordResult {
    pub fn success(&self) -> bool {
        self.outcome.success
    }

    pub fn vendor_name(&self) -> &str {
        &self.outcome.vendor_name
    }

    fn exception_kind(&self) -> Option<VendorExceptionKind> {
        self.outcome.exception.as_ref().map(|e| e.kind)
    }

    /// The issuing authority reported itself unavailable.
    pub fn authority_unavailable(&self) -> bool {
        self.exception_kind() == Some(VendorExceptionKind::AuthorityUnavailable)
    }

    /// The issuing authority reported an internal system error.
    pub fn authority_system_error(&self) -> bool {
        self.exception_kind() == Some(VendorExceptionKind::AuthoritySystemError)
    }

    /// The issuing authority did not answer in time.
    pub fn authority_timeout(&self) -> bool {
        self.exception_kind() == Some(VendorExceptionKind::AuthorityTimeout)
    }

    /// Any authority-side exception (as opposed to transport failures).
    pub fn authority_exception(&self) -> bool {
        matches!(
            self.exception_kind(),
            Some(
                VendorExceptionKind::AuthorityUnavailable
                    | VendorExceptionKind::AuthoritySystemError
                    | VendorExceptionKind::AuthorityTimeout
            )
        )
    }
}

/// Review verdict from the device/fraud-risk vendor.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewStatus {
    Pass,
    Reject,
}

/// Device/fraud-risk scoring result.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceRiskResult {
    pub success: bool,
    /// Which client produced the verdict: the vendor code for executed
    /// calls, or a placeholder code (`tmx_disabled`,
    /// `tmx_session_id_missing`, `tmx_pii_missing`) for short-circuits.
    pub client_code: String,
    pub review_status: ReviewStatus,
    pub transaction_id: Option<String>,
    pub exception: Option<VendorException>,
}

impl DeviceRiskResult {
    pub fn passed(client_code: impl Into<String>, transaction_id: Option<String>) -> Self {
        Self {
            success: true,
            client_code: client_code.into(),
            review_status: ReviewStatus::Pass,
            transaction_id,
            exception: None,
        }
    }

    pub fn rejected(client_code: impl Into<String>, transaction_id: Option<String>) -> Self {
        Self {
            success: false,
            client_code: client_code.into(),
            review_status: ReviewStatus::Reject,
            transaction_id,
            exception: None,
        }
    }

    pub fn from_exception(client_code: impl Into<String>, exception: VendorException) -> Self {
        Self {
            success: false,
            client_code: client_code.into(),
            review_status: ReviewStatus::Reject,
            transaction_id: None,
            exception: Some(exception),
        }
    }
}

/// Tagged union over the result variants, for places that carry
/// heterogeneous step outputs (stage history, persisted decisions).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ProofingResult {
    Resolution(ResolutionResult),
    StateRecord(StateRecordResult),
    DeviceRisk(DeviceRiskResult),
    Phone(VendorOutcome),
}

impl ProofingResult {
    pub fn success(&self) -> bool {
        match self {
            ProofingResult::Resolution(r) => r.success(),
            ProofingResult::StateRecord(r) => r.success(),
            ProofingResult::DeviceRisk(r) => r.success,
            ProofingResult::Phone(r) => r.success,
        }
    }

    /// The vendor invocations this result contributed to the pass.
    pub fn stages(&self) -> Vec<Stage> {
        match self {
            ProofingResult::Resolution(r) => r.outcome.stages.clone(),
            ProofingResult::StateRecord(r) => r.outcome.stages.clone(),
            ProofingResult::DeviceRisk(r) => match &r.transaction_id {
                Some(txn) => vec![Stage {
                    vendor_name: r.client_code.clone(),
                    transaction_id: Some(txn.clone()),
                }],
                None => Vec::new(),
            },
            ProofingResult::Phone(r) => r.stages.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_requires_errors_or_exception() {
        let mut errors = BTreeMap::new();
        errors.insert(Attribute::Dob, vec![CODE_UNVERIFIED.to_string()]);
        let failed = VendorOutcome::failure("vendor", Some("txn".into()), errors);
        assert!(!failed.success);
        assert!(!failed.errors.is_empty() || failed.exception.is_some());

        let excepted = VendorOutcome::from_exception(
            "vendor",
            VendorException::new(VendorExceptionKind::Network, "connection refused"),
        );
        assert!(!excepted.success);
        assert!(!excepted.errors.is_empty() || excepted.exception.is_some());
    }

    #[test]
    fn timeout_exception_sets_timed_out() {
        let r = VendorOutcome::from_exception(
            "vendor",
            VendorException::new(VendorExceptionKind::AuthorityTimeout, "0047"),
        );
        assert!(r.timed_out);

        let r = VendorOutcome::from_exception(
            "vendor",
            VendorException::new(VendorExceptionKind::Network, "refused"),
        );
        assert!(!r.timed_out);
    }

    #[test]
    fn markers_have_no_stages() {
        let marker = VendorOutcome::marker("unsupported_jurisdiction");
        assert!(marker.success);
        assert!(marker.stages.is_empty());
        assert!(marker.transaction_id.is_none());
    }

    #[test]
    fn failing_marker_carries_a_code() {
        let marker =
            VendorOutcome::failing_marker("resolution_cannot_pass", Attribute::Address, "SKIPPED");
        assert!(!marker.success);
        assert!(marker.has_error(Attribute::Address, "SKIPPED"));
    }

    #[test]
    fn state_record_predicates_follow_exception_kind() {
        let outcome = VendorOutcome::from_exception(
            "dlvn:state_record",
            VendorException::new(VendorExceptionKind::AuthorityUnavailable, "0001"),
        );
        let r = StateRecordResult {
            outcome,
            verified_attributes: BTreeSet::new(),
            requested_attributes: BTreeMap::new(),
            jurisdiction_in_maintenance_window: false,
        };
        assert!(r.authority_unavailable());
        assert!(!r.authority_timeout());
        assert!(r.authority_exception());
    }

    #[test]
    fn tagged_union_dispatch() {
        let result = ProofingResult::DeviceRisk(DeviceRiskResult::rejected("tmx", None));
        assert!(!result.success());
        assert!(result.stages().is_empty());

        let json = serde_json::to_string(&result).unwrap();
        assert!(json.contains("\"kind\":\"device_risk\""));
    }

    #[test]
    fn passes_with_requires_full_coverage() {
        let mut errors = BTreeMap::new();
        errors.insert(Attribute::Address1, vec![CODE_UNVERIFIED.to_string()]);
        let failed = ResolutionResult::failed(
            VendorOutcome::failure("crosscheck:resolution", None, errors),
            [Attribute::Address, Attribute::Dob].into_iter().collect(),
        );

        let covering = StateRecordResult {
            outcome: VendorOutcome::success("dlvn:state_record", None),
            verified_attributes: [Attribute::Address, Attribute::Dob].into_iter().collect(),
            requested_attributes: BTreeMap::new(),
            jurisdiction_in_maintenance_window: false,
        };
        let partial = StateRecordResult {
            verified_attributes: [Attribute::Dob].into_iter().collect(),
            ..covering.clone()
        };

        assert!(failed.passes_with(&covering));
        assert!(!failed.passes_with(&partial));
    }

    #[test]
    fn resolution_failed_records_recoverable_attributes() {
        let mut errors = BTreeMap::new();
        errors.insert(Attribute::Address1, vec![CODE_UNVERIFIED.to_string()]);
        let outcome = VendorOutcome::failure("crosscheck:resolution", None, errors);
        let r = ResolutionResult::failed(outcome, [Attribute::Address].into_iter().collect());
        assert!(r.can_pass_with_additional_verification);
        assert!(r
            .attributes_requiring_additional_verification
            .contains(&Attribute::Address));
    }
}
