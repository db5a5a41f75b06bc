//! Vendor adapters for the identity-resolution core.
//!
//! One adapter per external service — identity resolution (credit
//! header), state motor-vehicle records, device/fraud-risk scoring, and
//! phone ownership — each normalizing its vendor's protocol into the
//! uniform result shapes of [`result`], applying bounded timeouts and
//! bounded retries. Every adapter is an enum over an `Http` variant and
//! a `Mock` variant so deployments and tests choose per vendor.

pub mod device_risk;
pub mod error;
pub mod maintenance;
pub mod phone;
pub mod resolution;
pub mod result;
pub mod retry;
pub mod state_record;
pub mod token_cache;

pub use device_risk::{
    DeviceRiskClient, DeviceRiskRequest, DeviceRiskVendorConfig, HttpDeviceRiskClient,
    MockDeviceRiskClient,
};
pub use error::ProofingError;
pub use maintenance::{MaintenanceSchedule, MaintenanceWindow};
pub use phone::{
    HttpPhoneOwnershipClient, MockPhoneOwnershipClient, PhoneOwnershipClient,
    PhoneOwnershipRequest, PhoneVendorConfig,
};
pub use resolution::{
    HttpIdentityResolutionClient, IdentityResolutionClient, MockIdentityResolutionClient,
    ResolutionRequest, ResolutionVendorConfig,
};
pub use result::{
    DeviceRiskResult, ProofingResult, ResolutionResult, ReviewStatus, Stage, StateRecordResult,
    VendorException, VendorExceptionKind, VendorOutcome,
};
pub use state_record::{
    HttpStateRecordClient, MockStateRecordClient, StateRecordClient, StateRecordRequest,
    StateRecordVendorConfig,
};
pub use token_cache::{FixedTokenSource, HttpTokenSource, TokenCache, TokenSource};
