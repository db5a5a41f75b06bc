//! Phone-ownership step.
//!
//! Runs last: every upstream check must have succeeded before the
//! vendor is asked about the phone. In-person enrollment skips phone
//! verification entirely — it is not part of that workflow.

use crate::error::ResolutionError;
use crate::timer::StageTimer;
use attest_costs::{BillingCategory, CostEntry, CostLedger};
use attest_proofing::{
    PhoneOwnershipClient, PhoneOwnershipRequest, ResolutionResult, StateRecordResult,
    VendorOutcome,
};
use attest_types::{ApplicantPii, Attribute, ClientId, EnrollmentMode, Timestamp};
use std::sync::Arc;

/// Marker vendor name for supervised in-person enrollment.
pub const NOT_APPLICABLE_IN_PERSON: &str = "phone_not_applicable_in_person";

/// Marker vendor name when an upstream check failed or no number exists.
pub const SKIPPED: &str = "phone_check_skipped";

/// Failure code when upstream checks have not all passed.
pub const CODE_UPSTREAM_FAILED: &str = "UPSTREAM_FAILED";

/// Failure code when the applicant supplied no phone number.
pub const CODE_NO_PHONE_NUMBER: &str = "NO_PHONE_NUMBER_AVAILABLE";

pub struct PhoneOwnershipStep {
    client: Arc<PhoneOwnershipClient>,
    ledger: Arc<dyn CostLedger>,
}

impl PhoneOwnershipStep {
    pub fn new(client: Arc<PhoneOwnershipClient>, ledger: Arc<dyn CostLedger>) -> Self {
        Self { client, ledger }
    }

    pub async fn call(
        &self,
        pii: &ApplicantPii,
        client_id: &ClientId,
        mode: EnrollmentMode,
        residential_result: &ResolutionResult,
        id_address_result: &ResolutionResult,
        state_record_result: &StateRecordResult,
        timer: &mut StageTimer,
        now: Timestamp,
    ) -> Result<VendorOutcome, ResolutionError> {
        if mode == EnrollmentMode::InPerson {
            return Ok(VendorOutcome::marker(NOT_APPLICABLE_IN_PERSON));
        }

        // The ID-address check counts as satisfied when the record
        // check closed its gap.
        if !(residential_result.success()
            && id_address_result.passes_with(state_record_result)
            && state_record_result.success())
        {
            return Ok(VendorOutcome::failing_marker(
                SKIPPED,
                Attribute::Phone,
                CODE_UPSTREAM_FAILED,
            ));
        }

        let phone = match pii.phone.as_deref() {
            Some(phone) if !phone.is_empty() => phone,
            _ => {
                return Ok(VendorOutcome::failing_marker(
                    SKIPPED,
                    Attribute::Phone,
                    CODE_NO_PHONE_NUMBER,
                ))
            }
        };

        let request = PhoneOwnershipRequest::from_pii(pii, phone);
        let result = timer.time("phone_ownership", self.client.proof(&request)).await;

        self.ledger.record(CostEntry::new(
            BillingCategory::PhoneOwnership,
            client_id.clone(),
            result.transaction_id.clone(),
            now,
        ))?;

        Ok(result)
    }
}
