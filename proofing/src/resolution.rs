//! Identity-resolution (credit header) vendor adapter.
//!
//! Submits the applicant's identity attributes and one address to the
//! resolution vendor and normalizes the per-attribute match indicators
//! into a [`ResolutionResult`]. On failure it computes whether the
//! failed attributes could still be closed by the state-record check
//! downstream.

use crate::error::ProofingError;
use crate::result::{
    ResolutionResult, VendorException, VendorExceptionKind, VendorOutcome, CODE_MISSING,
    CODE_UNVERIFIED,
};
use crate::retry::{with_retries, DEFAULT_MAX_ATTEMPTS};
use attest_types::{Address, ApplicantPii, Attribute};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::Duration;

pub const VENDOR_NAME: &str = "crosscheck:resolution";

/// Attributes the state-record vendor can independently verify; a
/// resolution failure confined to these can still pass overall.
const COVERABLE_ATTRIBUTES: [Attribute; 3] =
    [Attribute::Address, Attribute::Dob, Attribute::StateIdNumber];

/// Endpoint and credential configuration for the resolution vendor.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ResolutionVendorConfig {
    pub base_url: String,
    pub username: String,
    pub password: String,
    /// Vendor-side workflow the request runs under.
    pub workflow: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_connect_timeout_secs() -> u64 {
    5
}

/// What the vendor is asked to corroborate.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ResolutionRequest {
    pub first_name: String,
    pub last_name: String,
    pub dob: String,
    pub ssn: String,
    pub address1: String,
    pub city: String,
    pub state: String,
    pub zipcode: String,
    #[serde(default)]
    pub phone: Option<String>,
}

impl ResolutionRequest {
    /// Build a request for the applicant against one chosen address
    /// (which address depends on the enrollment mode and the step).
    pub fn from_pii(pii: &ApplicantPii, address: &Address) -> Self {
        Self {
            first_name: pii.first_name.clone(),
            last_name: pii.last_name.clone(),
            dob: pii.dob.clone(),
            ssn: pii.ssn.as_digits().to_string(),
            address1: address.address1.clone(),
            city: address.city.clone(),
            state: address.state.clone(),
            zipcode: address.zipcode.clone(),
            phone: pii.phone.clone(),
        }
    }
}

/// Raw wire response: per-attribute indicators keyed by attribute name,
/// each `"match"` or `"no_match"`; attributes the vendor did not check
/// are absent.
#[derive(Debug, Deserialize)]
struct RawResolutionResponse {
    transaction_id: Option<String>,
    #[serde(default)]
    checks: BTreeMap<String, String>,
}

/// Normalize a vendor response into a result.
///
/// Identity-critical attributes (dob, names, ssn) fail the result when
/// mismatched ("present but did not match") or absent — absence is never
/// counted as verified. The address is a composite of line 1, city,
/// state, and zip; any required part failing fails the address.
fn evaluate_response(raw: RawResolutionResponse) -> ResolutionResult {
    let mut errors: BTreeMap<Attribute, Vec<String>> = BTreeMap::new();
    let mut failed: BTreeSet<Attribute> = BTreeSet::new();

    let scalar_checks = [
        (Attribute::FirstName, "first_name"),
        (Attribute::LastName, "last_name"),
        (Attribute::Dob, "dob"),
        (Attribute::Ssn, "ssn"),
    ];
    for (attribute, key) in scalar_checks {
        match raw.checks.get(key).map(String::as_str) {
            Some("match") => {}
            Some(_) => {
                errors
                    .entry(attribute)
                    .or_default()
                    .push(CODE_UNVERIFIED.to_string());
                failed.insert(attribute);
            }
            None => {
                errors
                    .entry(attribute)
                    .or_default()
                    .push(CODE_MISSING.to_string());
                failed.insert(attribute);
            }
        }
    }

    let address_parts = [
        (Attribute::Address1, "address1"),
        (Attribute::City, "city"),
        (Attribute::State, "state"),
        (Attribute::Zipcode, "zipcode"),
    ];
    for (attribute, key) in address_parts {
        match raw.checks.get(key).map(String::as_str) {
            Some("match") => {}
            Some(_) => {
                errors
                    .entry(attribute)
                    .or_default()
                    .push(CODE_UNVERIFIED.to_string());
                failed.insert(Attribute::Address);
            }
            None => {
                errors
                    .entry(attribute)
                    .or_default()
                    .push(CODE_MISSING.to_string());
                failed.insert(Attribute::Address);
            }
        }
    }

    if failed.is_empty() {
        ResolutionResult::passed(VendorOutcome::success(VENDOR_NAME, raw.transaction_id))
    } else {
        let coverable: BTreeSet<Attribute> = COVERABLE_ATTRIBUTES.into_iter().collect();
        let recoverable = if failed.iter().all(|a| coverable.contains(a)) {
            failed.clone()
        } else {
            BTreeSet::new()
        };
        ResolutionResult::failed(
            VendorOutcome::failure(VENDOR_NAME, raw.transaction_id, errors),
            recoverable,
        )
    }
}

/// Live HTTP adapter for the resolution vendor.
pub struct HttpIdentityResolutionClient {
    http: reqwest::Client,
    config: ResolutionVendorConfig,
}

impl HttpIdentityResolutionClient {
    pub fn new(config: ResolutionVendorConfig) -> Result<Self, ProofingError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .build()
            .map_err(|e| ProofingError::Other(e.to_string()))?;
        Ok(Self { http, config })
    }

    /// Submit the applicant for resolution. Network and protocol
    /// failures are normalized into a failed result with a typed
    /// exception; this method itself never fails.
    pub async fn proof(&self, request: &ResolutionRequest) -> ResolutionResult {
        let url = format!(
            "{}/v1/resolution",
            self.config.base_url.trim_end_matches('/')
        );
        let url = &url;

        let sent = with_retries(DEFAULT_MAX_ATTEMPTS, || async move {
            let response = self
                .http
                .post(url)
                .basic_auth(&self.config.username, Some(&self.config.password))
                .json(&serde_json::json!({
                    "workflow": self.config.workflow,
                    "applicant": request,
                }))
                .send()
                .await
                .map_err(ProofingError::from_reqwest)?;

            if !response.status().is_success() {
                return Err(ProofingError::HttpStatus(response.status().as_u16()));
            }

            response
                .json::<RawResolutionResponse>()
                .await
                .map_err(|e| ProofingError::InvalidResponse(e.to_string()))
        })
        .await;

        match sent {
            Ok(raw) => evaluate_response(raw),
            Err(err) => {
                tracing::error!(vendor = VENDOR_NAME, error = %err, "resolution vendor call failed");
                let kind = match &err {
                    ProofingError::Unreachable(_) => VendorExceptionKind::Network,
                    ProofingError::Timeout(_) => VendorExceptionKind::Timeout,
                    _ => VendorExceptionKind::Unclassified,
                };
                ResolutionResult::failed(
                    VendorOutcome::from_exception(
                        VENDOR_NAME,
                        VendorException::new(kind, err.to_string()),
                    ),
                    BTreeSet::new(),
                )
            }
        }
    }
}

/// Canned-outcome adapter for tests and mock deployments. Counts calls
/// so tests can assert reuse and short-circuit behaviour.
pub struct MockIdentityResolutionClient {
    result: Mutex<ResolutionResult>,
    calls: AtomicU32,
}

impl MockIdentityResolutionClient {
    pub fn with_result(result: ResolutionResult) -> Self {
        Self {
            result: Mutex::new(result),
            calls: AtomicU32::new(0),
        }
    }

    /// A mock that verifies every applicant.
    pub fn passing() -> Self {
        Self::with_result(ResolutionResult::passed(VendorOutcome::success(
            VENDOR_NAME,
            Some("mock-resolution-txn".into()),
        )))
    }

    /// A mock that fails the given attributes with `UNVERIFIED`,
    /// marking the failure recoverable when the attributes allow it.
    pub fn failing(attributes: &[Attribute]) -> Self {
        let mut errors: BTreeMap<Attribute, Vec<String>> = BTreeMap::new();
        for attribute in attributes {
            errors
                .entry(*attribute)
                .or_default()
                .push(CODE_UNVERIFIED.to_string());
        }
        let coverable: BTreeSet<Attribute> = COVERABLE_ATTRIBUTES.into_iter().collect();
        let failed: BTreeSet<Attribute> = attributes.iter().copied().collect();
        let recoverable = if !failed.is_empty() && failed.iter().all(|a| coverable.contains(a)) {
            failed
        } else {
            BTreeSet::new()
        };
        Self::with_result(ResolutionResult::failed(
            VendorOutcome::failure(VENDOR_NAME, Some("mock-resolution-txn".into()), errors),
            recoverable,
        ))
    }

    /// A mock whose calls end in a vendor exception.
    pub fn erroring(kind: VendorExceptionKind) -> Self {
        Self::with_result(ResolutionResult::failed(
            VendorOutcome::from_exception(
                VENDOR_NAME,
                VendorException::new(kind, "mock vendor exception"),
            ),
            BTreeSet::new(),
        ))
    }

    pub async fn proof(&self, _request: &ResolutionRequest) -> ResolutionResult {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.result.lock().expect("mock poisoned").clone()
    }

    /// How many times `proof` ran.
    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

/// The resolution adapter a deployment actually runs with.
pub enum IdentityResolutionClient {
    Http(HttpIdentityResolutionClient),
    Mock(MockIdentityResolutionClient),
}

impl IdentityResolutionClient {
    pub async fn proof(&self, request: &ResolutionRequest) -> ResolutionResult {
        match self {
            IdentityResolutionClient::Http(client) => client.proof(request).await,
            IdentityResolutionClient::Mock(client) => client.proof(request).await,
        }
    }
}
