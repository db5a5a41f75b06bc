//! Folds the five step results into one decision.
//!
//! The decision matrix, in precedence order: a device-risk *exception*
//! fails the pass outright (a review rejection alone does not — it is
//! surfaced for manual review); a residential-address failure fails it;
//! an ID-address failure can be rescued when the state-record check
//! independently verified every attribute the resolution vendor could
//! not; a state-record or phone failure fails it; otherwise it passes.

use attest_proofing::{
    DeviceRiskResult, ProofingResult, ResolutionResult, ReviewStatus, Stage, StateRecordResult,
    VendorOutcome,
};
use attest_types::{EnrollmentMode, SsnFingerprint, Timestamp, TraceId};
use serde::{Deserialize, Serialize};

/// Why the pass resolved the way it did.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdjudicationReason {
    PassAllChecks,
    /// The resolution check failed recoverably and the state record
    /// covered every attribute requiring additional verification.
    PassStateRecordCoversResolution,
    FailDeviceRiskException,
    /// The residential check failed, so dependent checks never ran.
    FailResolutionSkipStateRecord,
    FailResolution,
    FailStateRecord,
    FailPhoneOwnership,
}

/// The terminal record of one orchestration pass, persisted to the
/// capture session for polling.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolutionDecision {
    pub success: bool,
    pub reason: AdjudicationReason,
    /// Manual-review signal from device profiling; does not gate
    /// `success` unless profiling itself errored.
    pub device_review_status: ReviewStatus,
    pub residential_result: ResolutionResult,
    pub resolution_result: ResolutionResult,
    pub state_record_result: StateRecordResult,
    pub device_risk_result: DeviceRiskResult,
    pub phone_result: VendorOutcome,
    /// Ordered history of every vendor call actually made.
    pub stages: Vec<Stage>,
    pub trace_id: TraceId,
    pub ssn_fingerprint: SsnFingerprint,
    pub timings_ms: Vec<(String, u64)>,
    pub completed_at: Timestamp,
}

/// Combines step results; consumed once per pass.
pub struct ResultAdjudicator {
    pub residential_result: ResolutionResult,
    pub id_address_result: ResolutionResult,
    pub state_record_result: StateRecordResult,
    pub device_risk_result: DeviceRiskResult,
    pub phone_result: VendorOutcome,
    pub mode: EnrollmentMode,
    pub same_address_as_id: bool,
}

impl ResultAdjudicator {
    /// The overall verdict and its reason.
    pub fn adjudicate(&self) -> (bool, AdjudicationReason) {
        if self.device_risk_result.exception.is_some() {
            return (false, AdjudicationReason::FailDeviceRiskException);
        }

        // The residential check gates on its own only where it ran as a
        // distinct vendor call (in-person, differing addresses). In the
        // other flows it is a passing marker or the very result judged
        // below.
        let residential_is_distinct =
            self.mode == EnrollmentMode::InPerson && !self.same_address_as_id;
        if residential_is_distinct && !self.residential_result.success() {
            return (false, AdjudicationReason::FailResolutionSkipStateRecord);
        }

        if self.id_address_result.success() {
            if !self.state_record_result.success() {
                return (false, AdjudicationReason::FailStateRecord);
            }
            if !self.phone_result.success {
                return (false, AdjudicationReason::FailPhoneOwnership);
            }
            return (true, AdjudicationReason::PassAllChecks);
        }

        // The resolution vendor said no; a record check may still have
        // closed the gap.
        if self.id_address_result.passes_with(&self.state_record_result) {
            if !self.phone_result.success {
                return (false, AdjudicationReason::FailPhoneOwnership);
            }
            return (true, AdjudicationReason::PassStateRecordCoversResolution);
        }

        (false, AdjudicationReason::FailResolution)
    }

    /// Ordered vendor-call history across the pass. When the ID-address
    /// step reused the residential result (in-person, same address) its
    /// stages describe the same single call and are listed once.
    fn stage_history(&self) -> Vec<Stage> {
        let mut ordered: Vec<ProofingResult> = Vec::with_capacity(5);
        ordered.push(ProofingResult::Resolution(self.residential_result.clone()));
        let reused = self.mode == EnrollmentMode::InPerson && self.same_address_as_id;
        if !reused {
            ordered.push(ProofingResult::Resolution(self.id_address_result.clone()));
        }
        ordered.push(ProofingResult::StateRecord(self.state_record_result.clone()));
        ordered.push(ProofingResult::DeviceRisk(self.device_risk_result.clone()));
        ordered.push(ProofingResult::Phone(self.phone_result.clone()));
        ordered.iter().flat_map(|result| result.stages()).collect()
    }

    /// Produce the terminal decision record.
    pub fn into_decision(
        self,
        trace_id: TraceId,
        ssn_fingerprint: SsnFingerprint,
        timings_ms: Vec<(String, u64)>,
        completed_at: Timestamp,
    ) -> ResolutionDecision {
        let (success, reason) = self.adjudicate();
        let stages = self.stage_history();
        ResolutionDecision {
            success,
            reason,
            device_review_status: self.device_risk_result.review_status,
            residential_result: self.residential_result,
            resolution_result: self.id_address_result,
            state_record_result: self.state_record_result,
            device_risk_result: self.device_risk_result,
            phone_result: self.phone_result,
            stages,
            trace_id,
            ssn_fingerprint,
            timings_ms,
            completed_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use attest_proofing::{VendorException, VendorExceptionKind};
    use attest_types::Attribute;
    use std::collections::{BTreeMap, BTreeSet};

    fn passing_resolution() -> ResolutionResult {
        ResolutionResult::passed(VendorOutcome::success(
            "crosscheck:resolution",
            Some("res-txn".into()),
        ))
    }

    fn recoverable_resolution(attributes: &[Attribute]) -> ResolutionResult {
        ResolutionResult::failed(
            VendorOutcome::failing_marker("crosscheck:resolution", attributes[0], "UNVERIFIED"),
            attributes.iter().copied().collect(),
        )
    }

    fn unrecoverable_resolution() -> ResolutionResult {
        ResolutionResult::failed(
            VendorOutcome::failing_marker("crosscheck:resolution", Attribute::Ssn, "UNVERIFIED"),
            BTreeSet::new(),
        )
    }

    fn state_record_verifying(attributes: &[Attribute]) -> StateRecordResult {
        StateRecordResult {
            outcome: VendorOutcome::success("dlvn:state_record", Some("sr-txn".into())),
            verified_attributes: attributes.iter().copied().collect(),
            requested_attributes: attributes.iter().map(|a| (*a, 1)).collect(),
            jurisdiction_in_maintenance_window: false,
        }
    }

    fn failed_state_record() -> StateRecordResult {
        StateRecordResult {
            outcome: VendorOutcome::failing_marker("dlvn:state_record", Attribute::Dob, "UNVERIFIED"),
            verified_attributes: BTreeSet::new(),
            requested_attributes: BTreeMap::new(),
            jurisdiction_in_maintenance_window: false,
        }
    }

    fn passing_phone() -> VendorOutcome {
        VendorOutcome::success("crosscheck:phone_ownership", Some("ph-txn".into()))
    }

    fn adjudicator() -> ResultAdjudicator {
        ResultAdjudicator {
            residential_result: passing_resolution(),
            id_address_result: passing_resolution(),
            state_record_result: state_record_verifying(&[
                Attribute::Dob,
                Attribute::Address,
                Attribute::StateIdNumber,
            ]),
            device_risk_result: DeviceRiskResult::passed("tmx", Some("dv-txn".into())),
            phone_result: passing_phone(),
            mode: EnrollmentMode::Remote,
            same_address_as_id: true,
        }
    }

    #[test]
    fn all_checks_passing_passes() {
        let (success, reason) = adjudicator().adjudicate();
        assert!(success);
        assert_eq!(reason, AdjudicationReason::PassAllChecks);
    }

    #[test]
    fn recoverable_resolution_covered_by_state_record_passes() {
        let mut adj = adjudicator();
        adj.id_address_result = recoverable_resolution(&[Attribute::Dob]);
        adj.state_record_result = state_record_verifying(&[Attribute::Dob, Attribute::Address]);

        let (success, reason) = adj.adjudicate();
        assert!(success);
        assert_eq!(reason, AdjudicationReason::PassStateRecordCoversResolution);
    }

    #[test]
    fn recoverable_resolution_not_covered_fails() {
        let mut adj = adjudicator();
        adj.id_address_result = recoverable_resolution(&[Attribute::Address]);
        adj.state_record_result = state_record_verifying(&[Attribute::Dob]);

        let (success, reason) = adj.adjudicate();
        assert!(!success);
        assert_eq!(reason, AdjudicationReason::FailResolution);
    }

    #[test]
    fn unrecoverable_resolution_fails() {
        let mut adj = adjudicator();
        adj.id_address_result = unrecoverable_resolution();

        let (success, reason) = adj.adjudicate();
        assert!(!success);
        assert_eq!(reason, AdjudicationReason::FailResolution);
    }

    #[test]
    fn distinct_residential_failure_skips_dependent_checks() {
        let mut adj = adjudicator();
        adj.mode = EnrollmentMode::InPerson;
        adj.same_address_as_id = false;
        adj.residential_result = unrecoverable_resolution();
        adj.phone_result = VendorOutcome::marker("phone_not_applicable_in_person");

        let (success, reason) = adj.adjudicate();
        assert!(!success);
        assert_eq!(reason, AdjudicationReason::FailResolutionSkipStateRecord);
    }

    #[test]
    fn same_address_recoverable_failure_still_gap_closes() {
        // In-person with the document showing the residential address:
        // the reused (failed) residential result must not veto a pass
        // the record check already rescued.
        let mut adj = adjudicator();
        adj.mode = EnrollmentMode::InPerson;
        adj.same_address_as_id = true;
        adj.residential_result = recoverable_resolution(&[Attribute::Address]);
        adj.id_address_result = adj.residential_result.clone();
        adj.state_record_result = state_record_verifying(&[Attribute::Address, Attribute::Dob]);
        adj.phone_result = VendorOutcome::marker("phone_not_applicable_in_person");

        let (success, reason) = adj.adjudicate();
        assert!(success);
        assert_eq!(reason, AdjudicationReason::PassStateRecordCoversResolution);
    }

    #[test]
    fn state_record_failure_fails() {
        let mut adj = adjudicator();
        adj.state_record_result = failed_state_record();

        let (success, reason) = adj.adjudicate();
        assert!(!success);
        assert_eq!(reason, AdjudicationReason::FailStateRecord);
    }

    #[test]
    fn device_review_rejection_does_not_gate_the_pass() {
        let mut adj = adjudicator();
        adj.device_risk_result = DeviceRiskResult::rejected("tmx", Some("dv-txn".into()));

        let (success, reason) = adj.adjudicate();
        assert!(success);
        assert_eq!(reason, AdjudicationReason::PassAllChecks);

        let decision = adj.into_decision(
            TraceId::new("trace-1"),
            test_fingerprint(),
            Vec::new(),
            Timestamp::new(1_000),
        );
        assert_eq!(decision.device_review_status, ReviewStatus::Reject);
    }

    #[test]
    fn device_exception_fails_the_pass() {
        let mut adj = adjudicator();
        adj.device_risk_result = DeviceRiskResult::from_exception(
            "tmx",
            VendorException::new(VendorExceptionKind::Network, "connection refused"),
        );

        let (success, reason) = adj.adjudicate();
        assert!(!success);
        assert_eq!(reason, AdjudicationReason::FailDeviceRiskException);
    }

    #[test]
    fn phone_failure_fails() {
        let mut adj = adjudicator();
        adj.phone_result =
            VendorOutcome::failing_marker("crosscheck:phone_ownership", Attribute::Phone, "UNVERIFIED");

        let (success, reason) = adj.adjudicate();
        assert!(!success);
        assert_eq!(reason, AdjudicationReason::FailPhoneOwnership);
    }

    #[test]
    fn stage_history_lists_reused_resolution_once() {
        let mut adj = adjudicator();
        adj.mode = EnrollmentMode::InPerson;
        adj.same_address_as_id = true;
        adj.id_address_result = adj.residential_result.clone();
        adj.phone_result = VendorOutcome::marker("phone_not_applicable_in_person");

        let decision = adj.into_decision(
            TraceId::new("trace-1"),
            test_fingerprint(),
            Vec::new(),
            Timestamp::new(1_000),
        );
        let resolution_stages = decision
            .stages
            .iter()
            .filter(|s| s.vendor_name == "crosscheck:resolution")
            .count();
        assert_eq!(resolution_stages, 1);
    }

    #[test]
    fn stage_history_lists_two_resolution_calls_when_addresses_differ() {
        let mut adj = adjudicator();
        adj.mode = EnrollmentMode::InPerson;
        adj.same_address_as_id = false;
        adj.phone_result = VendorOutcome::marker("phone_not_applicable_in_person");

        let decision = adj.into_decision(
            TraceId::new("trace-1"),
            test_fingerprint(),
            Vec::new(),
            Timestamp::new(1_000),
        );
        let resolution_stages = decision
            .stages
            .iter()
            .filter(|s| s.vendor_name == "crosscheck:resolution")
            .count();
        assert_eq!(resolution_stages, 2);
    }

    fn test_fingerprint() -> SsnFingerprint {
        attest_types::FingerprintKey::new(b"test".to_vec()).fingerprint("900321898")
    }
}
