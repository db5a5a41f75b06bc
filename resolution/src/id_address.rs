//! ID-address resolution step.
//!
//! Proofs the address the identity document asserts. In remote flows
//! this is the only resolution call (against the residential address);
//! in-person flows reuse the residential step's result when the two
//! addresses are the same place, so the vendor is paid once, not twice.

use crate::error::ResolutionError;
use crate::timer::StageTimer;
use attest_costs::{BillingCategory, CostEntry, CostLedger};
use attest_proofing::{
    IdentityResolutionClient, ResolutionRequest, ResolutionResult, VendorOutcome,
};
use attest_types::{ApplicantPii, Attribute, ClientId, EnrollmentMode, Timestamp};
use std::sync::Arc;

/// Marker vendor name when the residential check already failed and the
/// pass can no longer succeed; no vendor call is made.
pub const CANNOT_PASS: &str = "resolution_cannot_pass";

/// Error code carried by the cannot-pass marker.
pub const CODE_UPSTREAM_FAILED: &str = "UPSTREAM_FAILED";

pub struct IdAddressStep {
    client: Arc<IdentityResolutionClient>,
    ledger: Arc<dyn CostLedger>,
}

impl IdAddressStep {
    pub fn new(client: Arc<IdentityResolutionClient>, ledger: Arc<dyn CostLedger>) -> Self {
        Self { client, ledger }
    }

    pub async fn call(
        &self,
        pii: &ApplicantPii,
        client_id: &ClientId,
        residential_result: &ResolutionResult,
        mode: EnrollmentMode,
        timer: &mut StageTimer,
        now: Timestamp,
    ) -> Result<ResolutionResult, ResolutionError> {
        let address = match mode {
            EnrollmentMode::InPerson => {
                if pii.same_address_as_id() {
                    // Same place, same vendor, same check: reuse the
                    // residential result verbatim instead of paying for
                    // a duplicate call.
                    return Ok(residential_result.clone());
                }
                if !residential_result.success() {
                    return Ok(ResolutionResult::failed(
                        VendorOutcome::failing_marker(
                            CANNOT_PASS,
                            Attribute::Address,
                            CODE_UPSTREAM_FAILED,
                        ),
                        Default::default(),
                    ));
                }
                pii.id_address()
            }
            EnrollmentMode::Remote => &pii.residential_address,
        };

        let request = ResolutionRequest::from_pii(pii, address);
        let result = timer.time("resolution", self.client.proof(&request)).await;

        self.ledger.record(CostEntry::new(
            BillingCategory::IdentityResolution,
            client_id.clone(),
            result.outcome.transaction_id.clone(),
            now,
        ))?;

        Ok(result)
    }
}
