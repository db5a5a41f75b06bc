//! Residential-address resolution step.
//!
//! Proofs where the applicant says they live. Only supervised in-person
//! enrollment needs this as a separate check: remote flows carry a
//! single address, which the ID-address step covers.

use crate::error::ResolutionError;
use crate::timer::StageTimer;
use attest_costs::{BillingCategory, CostEntry, CostLedger};
use attest_proofing::{
    IdentityResolutionClient, ResolutionRequest, ResolutionResult, VendorOutcome,
};
use attest_types::{ApplicantPii, ClientId, EnrollmentMode, Timestamp};
use std::sync::Arc;

/// Marker vendor name for remote flows, where no separate residential
/// check runs.
pub const NOT_REQUIRED: &str = "residential_address_not_required";

pub struct ResidentialAddressStep {
    client: Arc<IdentityResolutionClient>,
    ledger: Arc<dyn CostLedger>,
}

impl ResidentialAddressStep {
    pub fn new(client: Arc<IdentityResolutionClient>, ledger: Arc<dyn CostLedger>) -> Self {
        Self { client, ledger }
    }

    pub async fn call(
        &self,
        pii: &ApplicantPii,
        client_id: &ClientId,
        mode: EnrollmentMode,
        timer: &mut StageTimer,
        now: Timestamp,
    ) -> Result<ResolutionResult, ResolutionError> {
        if mode == EnrollmentMode::Remote {
            return Ok(ResolutionResult::passed(VendorOutcome::marker(NOT_REQUIRED)));
        }

        let request = ResolutionRequest::from_pii(pii, &pii.residential_address);
        let result = timer
            .time("residential_address", self.client.proof(&request))
            .await;

        // One cost entry per executed vendor call, regardless of outcome.
        self.ledger.record(CostEntry::new(
            BillingCategory::IdentityResolution,
            client_id.clone(),
            result.outcome.transaction_id.clone(),
            now,
        ))?;

        Ok(result)
    }
}
