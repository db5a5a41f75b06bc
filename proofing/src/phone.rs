//! Phone-ownership verification vendor adapter.
//!
//! Checks that the applicant's claimed phone number is associated with
//! the claimed identity. The outcome is base-shaped: a single composite
//! ownership indicator, no variant payload.

use crate::error::ProofingError;
use crate::result::{
    VendorException, VendorExceptionKind, VendorOutcome, CODE_MISSING, CODE_UNVERIFIED,
};
use crate::retry::{with_retries, DEFAULT_MAX_ATTEMPTS};
use attest_types::{ApplicantPii, Attribute};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::Duration;

pub const VENDOR_NAME: &str = "crosscheck:phone_ownership";

/// Endpoint configuration for the phone-ownership vendor.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PhoneVendorConfig {
    pub base_url: String,
    pub username: String,
    pub password: String,
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

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PhoneOwnershipRequest {
    pub phone: String,
    pub first_name: String,
    pub last_name: String,
    pub dob: String,
}

impl PhoneOwnershipRequest {
    /// Build a request for the applicant's phone. Callers guarantee a
    /// phone number is present before reaching the adapter.
    pub fn from_pii(pii: &ApplicantPii, phone: &str) -> Self {
        Self {
            phone: phone.to_string(),
            first_name: pii.first_name.clone(),
            last_name: pii.last_name.clone(),
            dob: pii.dob.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawPhoneResponse {
    transaction_id: Option<String>,
    /// `"match"` when the number belongs to the claimed identity,
    /// `"no_match"` otherwise; absent when the vendor had no data.
    #[serde(default)]
    ownership: Option<String>,
}

fn evaluate_response(raw: RawPhoneResponse) -> VendorOutcome {
    match raw.ownership.as_deref() {
        Some("match") => VendorOutcome::success(VENDOR_NAME, raw.transaction_id),
        Some(_) => {
            let mut errors: BTreeMap<Attribute, Vec<String>> = BTreeMap::new();
            errors.insert(Attribute::Phone, vec![CODE_UNVERIFIED.to_string()]);
            VendorOutcome::failure(VENDOR_NAME, raw.transaction_id, errors)
        }
        None => {
            let mut errors: BTreeMap<Attribute, Vec<String>> = BTreeMap::new();
            errors.insert(Attribute::Phone, vec![CODE_MISSING.to_string()]);
            VendorOutcome::failure(VENDOR_NAME, raw.transaction_id, errors)
        }
    }
}

/// Live HTTP adapter for the phone-ownership vendor.
pub struct HttpPhoneOwnershipClient {
    http: reqwest::Client,
    config: PhoneVendorConfig,
}

impl HttpPhoneOwnershipClient {
    pub fn new(config: PhoneVendorConfig) -> Result<Self, ProofingError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .build()
            .map_err(|e| ProofingError::Other(e.to_string()))?;
        Ok(Self { http, config })
    }

    pub async fn proof(&self, request: &PhoneOwnershipRequest) -> VendorOutcome {
        let url = format!(
            "{}/v1/phone/ownership",
            self.config.base_url.trim_end_matches('/')
        );
        let url = &url;

        let sent = with_retries(DEFAULT_MAX_ATTEMPTS, || async move {
            let response = self
                .http
                .post(url)
                .basic_auth(&self.config.username, Some(&self.config.password))
                .json(request)
                .send()
                .await
                .map_err(ProofingError::from_reqwest)?;

            if !response.status().is_success() {
                return Err(ProofingError::HttpStatus(response.status().as_u16()));
            }

            response
                .json::<RawPhoneResponse>()
                .await
                .map_err(|e| ProofingError::InvalidResponse(e.to_string()))
        })
        .await;

        match sent {
            Ok(raw) => evaluate_response(raw),
            Err(err) => {
                tracing::error!(vendor = VENDOR_NAME, error = %err, "phone vendor call failed");
                let kind = match &err {
                    ProofingError::Unreachable(_) => VendorExceptionKind::Network,
                    ProofingError::Timeout(_) => VendorExceptionKind::Timeout,
                    _ => VendorExceptionKind::Unclassified,
                };
                VendorOutcome::from_exception(
                    VENDOR_NAME,
                    VendorException::new(kind, err.to_string()),
                )
            }
        }
    }
}

/// Canned-outcome adapter for tests and mock deployments.
pub struct MockPhoneOwnershipClient {
    result: Mutex<VendorOutcome>,
    calls: AtomicU32,
}

impl MockPhoneOwnershipClient {
    pub fn with_result(result: VendorOutcome) -> Self {
        Self {
            result: Mutex::new(result),
            calls: AtomicU32::new(0),
        }
    }

    pub fn passing() -> Self {
        Self::with_result(VendorOutcome::success(
            VENDOR_NAME,
            Some("mock-phone-txn".into()),
        ))
    }

    pub fn failing() -> Self {
        let mut errors: BTreeMap<Attribute, Vec<String>> = BTreeMap::new();
        errors.insert(Attribute::Phone, vec![CODE_UNVERIFIED.to_string()]);
        Self::with_result(VendorOutcome::failure(
            VENDOR_NAME,
            Some("mock-phone-txn".into()),
            errors,
        ))
    }

    pub async fn proof(&self, _request: &PhoneOwnershipRequest) -> VendorOutcome {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.result.lock().expect("mock poisoned").clone()
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

/// The phone-ownership adapter a deployment actually runs with.
pub enum PhoneOwnershipClient {
    Http(HttpPhoneOwnershipClient),
    Mock(MockPhoneOwnershipClient),
}

impl PhoneOwnershipClient {
    pub async fn proof(&self, request: &PhoneOwnershipRequest) -> VendorOutcome {
        match self {
            PhoneOwnershipClient::Http(client) => client.proof(request).await,
            PhoneOwnershipClient::Mock(client) => client.proof(request).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ownership_match_succeeds() {
        let result = evaluate_response(RawPhoneResponse {
            transaction_id: Some("txn-9".into()),
            ownership: Some("match".into()),
        });
        assert!(result.success);
        assert_eq!(result.transaction_id.as_deref(), Some("txn-9"));
    }

    #[test]
    fn ownership_mismatch_fails_unverified() {
        let result = evaluate_response(RawPhoneResponse {
            transaction_id: None,
            ownership: Some("no_match".into()),
        });
        assert!(!result.success);
        assert!(result.has_error(Attribute::Phone, CODE_UNVERIFIED));
    }

    #[test]
    fn absent_indicator_fails_missing() {
        let result = evaluate_response(RawPhoneResponse {
            transaction_id: None,
            ownership: None,
        });
        assert!(!result.success);
        assert!(result.has_error(Attribute::Phone, CODE_MISSING));
    }
}
