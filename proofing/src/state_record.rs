//! State motor-vehicle-record vendor adapter.
//!
//! Verifies document attributes against the issuing authority's records
//! through the record-network gateway. The gateway reports one match
//! indicator per attribute; indicators the authority did not answer are
//! absent, and absence is never counted as verified. Authority-side
//! faults arrive as numbered exception codes which map onto the typed
//! predicates of [`StateRecordResult`].

use crate::error::ProofingError;
use crate::maintenance::MaintenanceSchedule;
use crate::result::{
    StateRecordResult, VendorException, VendorExceptionKind, VendorOutcome, CODE_MISSING,
    CODE_UNVERIFIED,
};
use crate::retry::{with_retries, DEFAULT_MAX_ATTEMPTS};
use crate::token_cache::TokenCache;
use attest_types::{Address, ApplicantPii, Attribute, Jurisdiction, StateIdType, Timestamp};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const VENDOR_NAME: &str = "dlvn:state_record";

/// Attributes the authority must affirm for the result to succeed.
const REQUIRED_ATTRIBUTES: [(Attribute, &str); 4] = [
    (Attribute::Dob, "dob"),
    (Attribute::FirstName, "first_name"),
    (Attribute::LastName, "last_name"),
    (Attribute::StateIdNumber, "state_id_number"),
];

/// Attributes that inform `verified_attributes` but never fail the
/// result on their own.
const ANCILLARY_ATTRIBUTES: [(Attribute, &str); 3] = [
    (Attribute::StateIdType, "state_id_type"),
    (Attribute::StateIdIssued, "state_id_issued"),
    (Attribute::StateIdExpiration, "state_id_expiration"),
];

/// Required parts of the composite address attribute.
const ADDRESS_REQUIRED_PARTS: [&str; 4] = ["address1", "city", "state", "zipcode"];

/// Endpoint configuration for the record-network gateway.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StateRecordVendorConfig {
    pub base_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    15
}

fn default_connect_timeout_secs() -> u64 {
    5
}

/// The document data submitted for verification.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StateRecordRequest {
    pub first_name: String,
    pub last_name: String,
    pub dob: String,
    pub state_id_number: String,
    pub state_id_jurisdiction: Jurisdiction,
    pub state_id_type: StateIdType,
    pub address1: String,
    #[serde(default)]
    pub address2: Option<String>,
    pub city: String,
    pub state: String,
    pub zipcode: String,
}

impl StateRecordRequest {
    /// Build a request against one chosen address (the ID-document
    /// address for in-person enrollment, residential otherwise).
    pub fn from_pii(pii: &ApplicantPii, address: &Address) -> Self {
        Self {
            first_name: pii.first_name.clone(),
            last_name: pii.last_name.clone(),
            dob: pii.dob.clone(),
            state_id_number: pii.state_id_number.clone(),
            state_id_jurisdiction: pii.state_id_jurisdiction.clone(),
            state_id_type: pii.state_id_type,
            address1: address.address1.clone(),
            address2: address.address2.clone(),
            city: address.city.clone(),
            state: address.state.clone(),
            zipcode: address.zipcode.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawStateRecordResponse {
    transaction_id: Option<String>,
    #[serde(default)]
    matches: BTreeMap<String, bool>,
    #[serde(default)]
    fault: Option<RawFault>,
}

#[derive(Debug, Deserialize)]
struct RawFault {
    code: String,
    message: String,
}

/// Authority fault codes published by the record network.
fn classify_fault(fault: &RawFault) -> VendorException {
    let kind = match fault.code.as_str() {
        "0001" => VendorExceptionKind::AuthorityUnavailable,
        "0002" => VendorExceptionKind::AuthoritySystemError,
        "0047" => VendorExceptionKind::AuthorityTimeout,
        _ => VendorExceptionKind::Unclassified,
    };
    VendorException::new(kind, format!("{}: {}", fault.code, fault.message))
}

/// Normalize a gateway response into a result.
fn evaluate_response(raw: RawStateRecordResponse, in_maintenance_window: bool) -> StateRecordResult {
    if let Some(fault) = &raw.fault {
        let exception = classify_fault(fault);
        if exception.kind == VendorExceptionKind::AuthorityTimeout {
            tracing::warn!(vendor = VENDOR_NAME, fault = %exception, "authority timed out");
        } else {
            tracing::error!(vendor = VENDOR_NAME, fault = %exception, "authority fault");
        }
        return StateRecordResult {
            outcome: VendorOutcome::from_exception(VENDOR_NAME, exception),
            verified_attributes: BTreeSet::new(),
            requested_attributes: BTreeMap::new(),
            jurisdiction_in_maintenance_window: in_maintenance_window,
        };
    }

    let mut verified: BTreeSet<Attribute> = BTreeSet::new();
    let mut requested: BTreeMap<Attribute, u32> = BTreeMap::new();
    let mut errors: BTreeMap<Attribute, Vec<String>> = BTreeMap::new();
    let mut success = true;

    for (attribute, key) in REQUIRED_ATTRIBUTES {
        match raw.matches.get(key) {
            Some(true) => {
                verified.insert(attribute);
                *requested.entry(attribute).or_insert(0) += 1;
            }
            Some(false) => {
                *requested.entry(attribute).or_insert(0) += 1;
                errors
                    .entry(attribute)
                    .or_default()
                    .push(CODE_UNVERIFIED.to_string());
                success = false;
            }
            None => {
                errors
                    .entry(attribute)
                    .or_default()
                    .push(CODE_MISSING.to_string());
                success = false;
            }
        }
    }

    for (attribute, key) in ANCILLARY_ATTRIBUTES {
        match raw.matches.get(key) {
            Some(true) => {
                verified.insert(attribute);
                *requested.entry(attribute).or_insert(0) += 1;
            }
            Some(false) => {
                *requested.entry(attribute).or_insert(0) += 1;
            }
            None => {}
        }
    }

    // Address is a composite: it is requested only when the authority
    // answered every required part, and verified only when it affirmed
    // them all. Line 2 is optional and never blocks the composite.
    let answered_all = ADDRESS_REQUIRED_PARTS
        .iter()
        .all(|key| raw.matches.contains_key(*key));
    if answered_all {
        *requested.entry(Attribute::Address).or_insert(0) += 1;
        if ADDRESS_REQUIRED_PARTS
            .iter()
            .all(|key| raw.matches.get(*key) == Some(&true))
        {
            verified.insert(Attribute::Address);
        }
    }

    let outcome = if success {
        VendorOutcome::success(VENDOR_NAME, raw.transaction_id)
    } else {
        VendorOutcome::failure(VENDOR_NAME, raw.transaction_id, errors)
    };

    StateRecordResult {
        outcome,
        verified_attributes: verified,
        requested_attributes: requested,
        jurisdiction_in_maintenance_window: in_maintenance_window,
    }
}

/// Live HTTP adapter for the record-network gateway.
pub struct HttpStateRecordClient {
    http: reqwest::Client,
    config: StateRecordVendorConfig,
    token_cache: Arc<TokenCache>,
    schedule: MaintenanceSchedule,
}

impl HttpStateRecordClient {
    pub fn new(
        config: StateRecordVendorConfig,
        token_cache: Arc<TokenCache>,
        schedule: MaintenanceSchedule,
    ) -> Result<Self, ProofingError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .build()
            .map_err(|e| ProofingError::Other(e.to_string()))?;
        Ok(Self {
            http,
            config,
            token_cache,
            schedule,
        })
    }

    pub async fn proof(&self, request: &StateRecordRequest, now: Timestamp) -> StateRecordResult {
        let in_window = self
            .schedule
            .in_maintenance_window(&request.state_id_jurisdiction, now);

        let url = format!(
            "{}/v2/records/verify",
            self.config.base_url.trim_end_matches('/')
        );
        let url = &url;

        let sent = with_retries(DEFAULT_MAX_ATTEMPTS, || async move {
            let token = self.token_cache.fetch_token(now).await?;
            let response = self
                .http
                .post(url)
                .bearer_auth(token)
                .json(request)
                .send()
                .await
                .map_err(ProofingError::from_reqwest)?;

            if response.status().as_u16() == 401 {
                // Token rejected early; next attempt fetches fresh.
                self.token_cache.invalidate().await;
                return Err(ProofingError::Auth("gateway rejected session token".into()));
            }
            if !response.status().is_success() {
                return Err(ProofingError::HttpStatus(response.status().as_u16()));
            }

            response
                .json::<RawStateRecordResponse>()
                .await
                .map_err(|e| ProofingError::InvalidResponse(e.to_string()))
        })
        .await;

        match sent {
            Ok(raw) => evaluate_response(raw, in_window),
            Err(err) => {
                tracing::error!(vendor = VENDOR_NAME, error = %err, "state-record vendor call failed");
                let kind = match &err {
                    ProofingError::Unreachable(_) => VendorExceptionKind::Network,
                    ProofingError::Timeout(_) => VendorExceptionKind::Timeout,
                    _ => VendorExceptionKind::Unclassified,
                };
                StateRecordResult {
                    outcome: VendorOutcome::from_exception(
                        VENDOR_NAME,
                        VendorException::new(kind, err.to_string()),
                    ),
                    verified_attributes: BTreeSet::new(),
                    requested_attributes: BTreeMap::new(),
                    jurisdiction_in_maintenance_window: in_window,
                }
            }
        }
    }
}

/// Canned-outcome adapter for tests and mock deployments.
pub struct MockStateRecordClient {
    result: Mutex<StateRecordResult>,
    calls: AtomicU32,
}

impl MockStateRecordClient {
    pub fn with_result(result: StateRecordResult) -> Self {
        Self {
            result: Mutex::new(result),
            calls: AtomicU32::new(0),
        }
    }

    /// A mock whose authority affirms every attribute.
    pub fn passing() -> Self {
        let verified: BTreeSet<Attribute> = [
            Attribute::Dob,
            Attribute::FirstName,
            Attribute::LastName,
            Attribute::StateIdNumber,
            Attribute::StateIdType,
            Attribute::StateIdIssued,
            Attribute::StateIdExpiration,
            Attribute::Address,
        ]
        .into_iter()
        .collect();
        let requested = verified.iter().map(|a| (*a, 1)).collect();
        Self::with_result(StateRecordResult {
            outcome: VendorOutcome::success(VENDOR_NAME, Some("mock-state-record-txn".into())),
            verified_attributes: verified,
            requested_attributes: requested,
            jurisdiction_in_maintenance_window: false,
        })
    }

    /// A mock that affirms exactly `verified` (successful when every
    /// required attribute is among them).
    pub fn verifying(verified: &[Attribute]) -> Self {
        let verified_set: BTreeSet<Attribute> = verified.iter().copied().collect();
        let mut errors: BTreeMap<Attribute, Vec<String>> = BTreeMap::new();
        for (attribute, _) in REQUIRED_ATTRIBUTES {
            if !verified_set.contains(&attribute) {
                errors
                    .entry(attribute)
                    .or_default()
                    .push(CODE_UNVERIFIED.to_string());
            }
        }
        let requested = verified_set.iter().map(|a| (*a, 1)).collect();
        let outcome = if errors.is_empty() {
            VendorOutcome::success(VENDOR_NAME, Some("mock-state-record-txn".into()))
        } else {
            VendorOutcome::failure(VENDOR_NAME, Some("mock-state-record-txn".into()), errors)
        };
        Self::with_result(StateRecordResult {
            outcome,
            verified_attributes: verified_set,
            requested_attributes: requested,
            jurisdiction_in_maintenance_window: false,
        })
    }

    /// A mock whose calls end in an authority fault.
    pub fn erroring(kind: VendorExceptionKind, in_maintenance_window: bool) -> Self {
        Self::with_result(StateRecordResult {
            outcome: VendorOutcome::from_exception(
                VENDOR_NAME,
                VendorException::new(kind, "mock authority fault"),
            ),
            verified_attributes: BTreeSet::new(),
            requested_attributes: BTreeMap::new(),
            jurisdiction_in_maintenance_window: in_maintenance_window,
        })
    }

    pub async fn proof(&self, _request: &StateRecordRequest, _now: Timestamp) -> StateRecordResult {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.result.lock().expect("mock poisoned").clone()
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

/// The state-record adapter a deployment actually runs with.
pub enum StateRecordClient {
    Http(HttpStateRecordClient),
    Mock(MockStateRecordClient),
}

impl StateRecordClient {
    pub async fn proof(&self, request: &StateRecordRequest, now: Timestamp) -> StateRecordResult {
        match self {
            StateRecordClient::Http(client) => client.proof(request, now).await,
            StateRecordClient::Mock(client) => client.proof(request, now).await,
        }
    }
}
