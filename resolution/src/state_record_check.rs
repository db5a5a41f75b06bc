//! State-record (motor-vehicle) verification step.
//!
//! Gated twice: the applicant's issuing jurisdiction must be on the
//! record network and not banned for the relying client, and the
//! upstream ID-address resolution must either have succeeded or have
//! failed in a way a record check can still close. Skips are free;
//! executed calls bill one entry unless they ended in an exception.

use crate::error::ResolutionError;
use crate::timer::StageTimer;
use attest_costs::{BillingCategory, CostEntry, CostLedger};
use attest_proofing::{
    ResolutionResult, StateRecordClient, StateRecordRequest, StateRecordResult, VendorOutcome,
};
use attest_types::{ApplicantPii, ClientId, EnrollmentMode, Jurisdiction, Timestamp};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

/// Marker vendor name when the issuing jurisdiction is not queryable.
pub const UNSUPPORTED_JURISDICTION: &str = "unsupported_jurisdiction";

/// Marker vendor name when the upstream resolution failure rules out a
/// record check.
pub const SKIPPED: &str = "state_record_skipped";

pub struct StateRecordStep {
    client: Arc<StateRecordClient>,
    ledger: Arc<dyn CostLedger>,
    supported_jurisdictions: BTreeSet<Jurisdiction>,
    banned_by_client: HashMap<ClientId, BTreeSet<Jurisdiction>>,
}

impl StateRecordStep {
    pub fn new(
        client: Arc<StateRecordClient>,
        ledger: Arc<dyn CostLedger>,
        supported_jurisdictions: BTreeSet<Jurisdiction>,
        banned_by_client: HashMap<ClientId, BTreeSet<Jurisdiction>>,
    ) -> Self {
        Self {
            client,
            ledger,
            supported_jurisdictions,
            banned_by_client,
        }
    }

    fn jurisdiction_supported(&self, jurisdiction: &Jurisdiction, client_id: &ClientId) -> bool {
        self.supported_jurisdictions.contains(jurisdiction)
            && !self
                .banned_by_client
                .get(client_id)
                .is_some_and(|banned| banned.contains(jurisdiction))
    }

    fn placeholder(vendor_name: &str) -> StateRecordResult {
        StateRecordResult {
            outcome: VendorOutcome::marker(vendor_name),
            verified_attributes: BTreeSet::new(),
            requested_attributes: BTreeMap::new(),
            jurisdiction_in_maintenance_window: false,
        }
    }

    pub async fn call(
        &self,
        pii: &ApplicantPii,
        client_id: &ClientId,
        id_address_result: &ResolutionResult,
        mode: EnrollmentMode,
        timer: &mut StageTimer,
        now: Timestamp,
    ) -> Result<StateRecordResult, ResolutionError> {
        if !self.jurisdiction_supported(&pii.state_id_jurisdiction, client_id) {
            return Ok(Self::placeholder(UNSUPPORTED_JURISDICTION));
        }

        // A failed resolution can be rescued by the record check only
        // where gap-closing is supported: remote flows, and in-person
        // flows where the document shows the residential address.
        let gap_closing_allowed =
            mode == EnrollmentMode::Remote || (mode == EnrollmentMode::InPerson && pii.same_address_as_id());
        let should_call = id_address_result.success()
            || (id_address_result.can_pass_with_additional_verification && gap_closing_allowed);
        if !should_call {
            return Ok(Self::placeholder(SKIPPED));
        }

        let address = match mode {
            EnrollmentMode::InPerson => pii.id_address(),
            EnrollmentMode::Remote => &pii.residential_address,
        };
        let request = StateRecordRequest::from_pii(pii, address);
        let result = timer
            .time("state_record", self.client.proof(&request, now))
            .await;

        // Authority exceptions are not billed; answered calls are,
        // whatever the answer.
        if result.outcome.exception.is_none() {
            self.ledger.record(CostEntry::new(
                BillingCategory::StateRecordVerification,
                client_id.clone(),
                result.outcome.transaction_id.clone(),
                now,
            ))?;
        }

        Ok(result)
    }
}
