//! Device/fraud-risk scoring vendor adapter.
//!
//! Passive device-fingerprint scoring: the front end plants a profiling
//! tag and collects a session id; this adapter submits that session id
//! with the applicant's identity attributes and maps the vendor's
//! review verdict onto [`DeviceRiskResult`].

use crate::error::ProofingError;
use crate::result::{DeviceRiskResult, VendorException, VendorExceptionKind};
use crate::retry::{with_retries, DEFAULT_MAX_ATTEMPTS};
use attest_types::ApplicantPii;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// Client code reported for executed vendor calls.
pub const CLIENT_CODE: &str = "tmx";

/// Endpoint configuration for the device-risk vendor.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DeviceRiskVendorConfig {
    pub base_url: String,
    pub api_key: String,
    /// Vendor-side policy the session is evaluated under.
    pub policy: String,
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

/// What the vendor scores: the collected session plus enough identity
/// context to correlate the device with the claimed person.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DeviceRiskRequest {
    pub session_id: String,
    pub request_ip: String,
    pub first_name: String,
    pub last_name: String,
    pub dob: String,
    #[serde(default)]
    pub email: Option<String>,
}

impl DeviceRiskRequest {
    pub fn from_pii(pii: &ApplicantPii, session_id: &str, request_ip: &str) -> Self {
        Self {
            session_id: session_id.to_string(),
            request_ip: request_ip.to_string(),
            first_name: pii.first_name.clone(),
            last_name: pii.last_name.clone(),
            dob: pii.dob.clone(),
            email: pii.email.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawDeviceRiskResponse {
    request_id: Option<String>,
    review_status: String,
}

/// Map the vendor's verdict. `pass` passes; `review` and `reject` both
/// reject (the decision model admits no middle verdict), and anything
/// unrecognized is treated as a protocol error.
fn evaluate_response(raw: RawDeviceRiskResponse) -> DeviceRiskResult {
    match raw.review_status.as_str() {
        "pass" => DeviceRiskResult::passed(CLIENT_CODE, raw.request_id),
        "review" | "reject" => DeviceRiskResult::rejected(CLIENT_CODE, raw.request_id),
        other => DeviceRiskResult::from_exception(
            CLIENT_CODE,
            VendorException::new(
                VendorExceptionKind::Unclassified,
                format!("unrecognized review status {other:?}"),
            ),
        ),
    }
}

/// Live HTTP adapter for the device-risk vendor.
pub struct HttpDeviceRiskClient {
    http: reqwest::Client,
    config: DeviceRiskVendorConfig,
}

impl HttpDeviceRiskClient {
    pub fn new(config: DeviceRiskVendorConfig) -> Result<Self, ProofingError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .build()
            .map_err(|e| ProofingError::Other(e.to_string()))?;
        Ok(Self { http, config })
    }

    pub async fn proof(&self, request: &DeviceRiskRequest) -> DeviceRiskResult {
        let url = format!(
            "{}/v1/session-query",
            self.config.base_url.trim_end_matches('/')
        );
        let url = &url;

        let sent = with_retries(DEFAULT_MAX_ATTEMPTS, || async move {
            let response = self
                .http
                .post(url)
                .header("x-api-key", &self.config.api_key)
                .json(&serde_json::json!({
                    "policy": self.config.policy,
                    "session": request,
                }))
                .send()
                .await
                .map_err(ProofingError::from_reqwest)?;

            if !response.status().is_success() {
                return Err(ProofingError::HttpStatus(response.status().as_u16()));
            }

            response
                .json::<RawDeviceRiskResponse>()
                .await
                .map_err(|e| ProofingError::InvalidResponse(e.to_string()))
        })
        .await;

        match sent {
            Ok(raw) => evaluate_response(raw),
            Err(err) => {
                tracing::error!(vendor = CLIENT_CODE, error = %err, "device-risk vendor call failed");
                let kind = match &err {
                    ProofingError::Unreachable(_) => VendorExceptionKind::Network,
                    ProofingError::Timeout(_) => VendorExceptionKind::Timeout,
                    _ => VendorExceptionKind::Unclassified,
                };
                DeviceRiskResult::from_exception(
                    CLIENT_CODE,
                    VendorException::new(kind, err.to_string()),
                )
            }
        }
    }
}

/// Canned-outcome adapter for tests and mock deployments.
pub struct MockDeviceRiskClient {
    result: Mutex<DeviceRiskResult>,
    calls: AtomicU32,
}

impl MockDeviceRiskClient {
    pub fn with_result(result: DeviceRiskResult) -> Self {
        Self {
            result: Mutex::new(result),
            calls: AtomicU32::new(0),
        }
    }

    pub fn passing() -> Self {
        Self::with_result(DeviceRiskResult::passed(
            CLIENT_CODE,
            Some("mock-device-txn".into()),
        ))
    }

    pub fn rejecting() -> Self {
        Self::with_result(DeviceRiskResult::rejected(
            CLIENT_CODE,
            Some("mock-device-txn".into()),
        ))
    }

    pub fn erroring(kind: VendorExceptionKind) -> Self {
        Self::with_result(DeviceRiskResult::from_exception(
            CLIENT_CODE,
            VendorException::new(kind, "mock vendor exception"),
        ))
    }

    pub async fn proof(&self, _request: &DeviceRiskRequest) -> DeviceRiskResult {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.result.lock().expect("mock poisoned").clone()
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

/// The device-risk adapter a deployment actually runs with.
pub enum DeviceRiskClient {
    Http(HttpDeviceRiskClient),
    Mock(MockDeviceRiskClient),
}

impl DeviceRiskClient {
    pub async fn proof(&self, request: &DeviceRiskRequest) -> DeviceRiskResult {
        match self {
            DeviceRiskClient::Http(client) => client.proof(request).await,
            DeviceRiskClient::Mock(client) => client.proof(request).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::result::ReviewStatus;

    fn raw(status: &str) -> RawDeviceRiskResponse {
        RawDeviceRiskResponse {
            request_id: Some("req-1".into()),
            review_status: status.into(),
        }
    }

    #[test]
    fn pass_verdict_succeeds() {
        let result = evaluate_response(raw("pass"));
        assert!(result.success);
        assert_eq!(result.review_status, ReviewStatus::Pass);
        assert_eq!(result.client_code, CLIENT_CODE);
        assert_eq!(result.transaction_id.as_deref(), Some("req-1"));
    }

    #[test]
    fn review_and_reject_both_reject() {
        for status in ["review", "reject"] {
            let result = evaluate_response(raw(status));
            assert!(!result.success, "status {status}");
            assert_eq!(result.review_status, ReviewStatus::Reject);
            assert!(result.exception.is_none());
        }
    }

    #[test]
    fn unknown_verdict_is_an_exception() {
        let result = evaluate_response(raw("banana"));
        assert!(!result.success);
        assert!(result.exception.is_some());
    }

    #[tokio::test]
    async fn mock_counts_calls() {
        let mock = MockDeviceRiskClient::rejecting();
        let request = DeviceRiskRequest {
            session_id: "sess-1".into(),
            request_ip: "203.0.113.9".into(),
            first_name: "Imaginary".into(),
            last_name: "Person".into(),
            dob: "1999-09-30".into(),
            email: None,
        };
        let result = mock.proof(&request).await;
        assert!(!result.success);
        assert_eq!(mock.calls(), 1);
    }
}
