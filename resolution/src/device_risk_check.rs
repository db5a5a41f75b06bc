//! Device/fraud-risk step.
//!
//! Needs the session id the front end collected while profiling the
//! applicant's device. A missing session id is an anomaly (plain
//! failure); an administratively disabled feature is an expected state
//! (permissive placeholder). Neither reaches the vendor or bills.

use crate::error::ResolutionError;
use crate::timer::StageTimer;
use attest_costs::{BillingCategory, CostEntry, CostLedger};
use attest_proofing::{DeviceRiskClient, DeviceRiskRequest, DeviceRiskResult};
use attest_types::{ApplicantPii, ClientId, Timestamp};
use std::sync::Arc;

/// Placeholder client code when profiling is administratively disabled.
pub const CODE_DISABLED: &str = "tmx_disabled";
/// Failure code when the front end supplied no profiling session id.
pub const CODE_SESSION_ID_MISSING: &str = "tmx_session_id_missing";
/// Failure code when required applicant fields are absent.
pub const CODE_PII_MISSING: &str = "tmx_pii_missing";

pub struct DeviceRiskStep {
    client: Arc<DeviceRiskClient>,
    ledger: Arc<dyn CostLedger>,
    enabled: bool,
}

impl DeviceRiskStep {
    pub fn new(client: Arc<DeviceRiskClient>, ledger: Arc<dyn CostLedger>, enabled: bool) -> Self {
        Self {
            client,
            ledger,
            enabled,
        }
    }

    pub async fn call(
        &self,
        pii: &ApplicantPii,
        client_id: &ClientId,
        device_session_id: Option<&str>,
        request_ip: &str,
        timer: &mut StageTimer,
        now: Timestamp,
    ) -> Result<DeviceRiskResult, ResolutionError> {
        if !self.enabled {
            return Ok(DeviceRiskResult::passed(CODE_DISABLED, None));
        }

        let session_id = match device_session_id {
            Some(id) if !id.is_empty() => id,
            _ => return Ok(DeviceRiskResult::rejected(CODE_SESSION_ID_MISSING, None)),
        };

        if !pii.has_device_risk_fields() {
            return Ok(DeviceRiskResult::rejected(CODE_PII_MISSING, None));
        }

        let request = DeviceRiskRequest::from_pii(pii, session_id, request_ip);
        let result = timer.time("device_risk", self.client.proof(&request)).await;

        self.ledger.record(CostEntry::new(
            BillingCategory::DeviceRisk,
            client_id.clone(),
            result.transaction_id.clone(),
            now,
        ))?;

        Ok(result)
    }
}
