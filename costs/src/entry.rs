//! Billing categories and cost entries.

use attest_types::{ClientId, Timestamp};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Cost classification attributing vendor spend to an owning client.
///
/// The same underlying vendor can be billed under different categories
/// depending on which step invoked it (the resolution and phone vendors
/// share a network, but their invoices do not).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BillingCategory {
    /// Credit-header identity resolution (address steps).
    IdentityResolution,
    /// Motor-vehicle-record verification.
    StateRecordVerification,
    /// Device fingerprint risk scoring.
    DeviceRisk,
    /// Phone-ownership verification.
    PhoneOwnership,
}

impl BillingCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            BillingCategory::IdentityResolution => "identity_resolution",
            BillingCategory::StateRecordVerification => "state_record_verification",
            BillingCategory::DeviceRisk => "device_risk",
            BillingCategory::PhoneOwnership => "phone_ownership",
        }
    }
}

impl fmt::Display for BillingCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One billable vendor call.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CostEntry {
    pub category: BillingCategory,
    pub client: ClientId,
    /// Vendor-assigned transaction id, when the call got far enough to
    /// receive one.
    pub transaction_id: Option<String>,
    pub recorded_at: Timestamp,
}

impl CostEntry {
    pub fn new(
        category: BillingCategory,
        client: ClientId,
        transaction_id: Option<String>,
        recorded_at: Timestamp,
    ) -> Self {
        Self {
            category,
            client,
            transaction_id,
            recorded_at,
        }
    }
}
