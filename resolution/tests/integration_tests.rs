//! End-to-end orchestration scenarios with mock vendors: call-count and
//! billing guarantees, reuse of the residential result, jurisdiction
//! gating, device-risk short-circuits, and abuse-counter forgiveness.

use std::sync::Arc;
use std::time::Duration;

use attest_costs::{BillingCategory, CostLedger, InMemoryCostLedger};
use attest_limiter::{InMemoryCounterStore, RateLimiter};
use attest_proofing::{
    DeviceRiskClient, IdentityResolutionClient, MockDeviceRiskClient,
    MockIdentityResolutionClient, MockPhoneOwnershipClient, MockStateRecordClient,
    PhoneOwnershipClient, ReviewStatus, StateRecordClient, VendorExceptionKind,
};
use attest_resolution::{
    AdjudicationReason, InMemoryCaptureSessionStore, Orchestrator, PollState, ResolutionConfig,
    ResolutionDecision, ResolutionError, SessionPoller, StartResolutionRequest, VendorClients,
};
use attest_types::{
    Address, ApplicantPii, Attribute, ClientId, EnrollmentMode, SessionId, Ssn, StateIdType,
    Timestamp, TraceId,
};

struct Harness {
    orchestrator: Arc<Orchestrator>,
    sessions: Arc<InMemoryCaptureSessionStore>,
    ledger: Arc<InMemoryCostLedger>,
    resolution: Arc<IdentityResolutionClient>,
    state_record: Arc<StateRecordClient>,
    device_risk: Arc<DeviceRiskClient>,
    phone: Arc<PhoneOwnershipClient>,
}

fn harness(clients: VendorClients, config: &ResolutionConfig) -> Harness {
    let sessions = Arc::new(InMemoryCaptureSessionStore::new());
    let ledger = Arc::new(InMemoryCostLedger::new());
    let limiter = RateLimiter::new(
        Arc::new(InMemoryCounterStore::new()),
        config.rate_limit_config(),
    );
    let resolution = clients.resolution.clone();
    let state_record = clients.state_record.clone();
    let device_risk = clients.device_risk.clone();
    let phone = clients.phone.clone();
    let orchestrator = Arc::new(Orchestrator::new(
        clients,
        ledger.clone(),
        limiter,
        sessions.clone(),
        config,
    ));
    Harness {
        orchestrator,
        sessions,
        ledger,
        resolution,
        state_record,
        device_risk,
        phone,
    }
}

fn default_config() -> ResolutionConfig {
    let mut config = ResolutionConfig::default();
    config.supported_jurisdictions = vec!["AZ".parse().unwrap(), "VA".parse().unwrap()];
    config
}

fn remote_pii() -> ApplicantPii {
    ApplicantPii {
        first_name: "Imaginary".into(),
        middle_name: None,
        last_name: "Person".into(),
        dob: "1999-09-30".into(),
        ssn: Ssn::parse("900-32-1898").unwrap(),
        residential_address: Address {
            address1: "1 Mobile Dr".into(),
            address2: None,
            city: "Pontiac".into(),
            state: "MI".into(),
            zipcode: "48880".into(),
        },
        id_doc_address: None,
        state_id_number: "AZ333222111".into(),
        state_id_jurisdiction: "AZ".parse().unwrap(),
        state_id_type: StateIdType::DriversLicense,
        phone: Some("+12025551234".into()),
        email: None,
        account_id: "acct-1".into(),
    }
}

fn request(pii: ApplicantPii, mode: EnrollmentMode) -> StartResolutionRequest {
    StartResolutionRequest {
        pii,
        mode,
        client: ClientId::new("sp-a"),
        trace_id: TraceId::new("trace-1"),
        device_session_id: Some("sess-1".into()),
        request_ip: "203.0.113.9".into(),
    }
}

async fn decide(harness: &Harness, request: StartResolutionRequest) -> ResolutionDecision {
    let id = harness.orchestrator.start_resolution(request).unwrap();
    poll_done(harness, &id).await
}

async fn poll_done(harness: &Harness, id: &SessionId) -> ResolutionDecision {
    let poller = SessionPoller::new(harness.sessions.clone(), 60);
    for _ in 0..200 {
        match poller.poll(id, Timestamp::now()).unwrap() {
            PollState::Done(decision) => return decision,
            PollState::InProgress => tokio::time::sleep(Duration::from_millis(5)).await,
            other => panic!("unexpected poll state {other:?}"),
        }
    }
    panic!("decision never arrived");
}

fn resolution_calls(harness: &Harness) -> u32 {
    match harness.resolution.as_ref() {
        IdentityResolutionClient::Mock(mock) => mock.calls(),
        IdentityResolutionClient::Http(_) => unreachable!(),
    }
}

fn state_record_calls(harness: &Harness) -> u32 {
    match harness.state_record.as_ref() {
        StateRecordClient::Mock(mock) => mock.calls(),
        StateRecordClient::Http(_) => unreachable!(),
    }
}

fn device_calls(harness: &Harness) -> u32 {
    match harness.device_risk.as_ref() {
        DeviceRiskClient::Mock(mock) => mock.calls(),
        DeviceRiskClient::Http(_) => unreachable!(),
    }
}

fn phone_calls(harness: &Harness) -> u32 {
    match harness.phone.as_ref() {
        PhoneOwnershipClient::Mock(mock) => mock.calls(),
        PhoneOwnershipClient::Http(_) => unreachable!(),
    }
}

fn cost(harness: &Harness, category: BillingCategory) -> usize {
    harness
        .ledger
        .count(&ClientId::new("sp-a"), category)
        .unwrap()
}

#[tokio::test]
async fn remote_happy_path_bills_each_executed_step_once() {
    let config = default_config();
    let h = harness(VendorClients::mocks(), &config);

    let decision = decide(&h, request(remote_pii(), EnrollmentMode::Remote)).await;

    assert!(decision.success);
    assert_eq!(decision.reason, AdjudicationReason::PassAllChecks);

    // Residential is skipped remotely; each remaining step ran exactly once.
    assert_eq!(resolution_calls(&h), 1);
    assert_eq!(state_record_calls(&h), 1);
    assert_eq!(device_calls(&h), 1);
    assert_eq!(phone_calls(&h), 1);

    assert_eq!(cost(&h, BillingCategory::IdentityResolution), 1);
    assert_eq!(cost(&h, BillingCategory::StateRecordVerification), 1);
    assert_eq!(cost(&h, BillingCategory::DeviceRisk), 1);
    assert_eq!(cost(&h, BillingCategory::PhoneOwnership), 1);
    assert_eq!(h.ledger.len(), 4);
}

#[tokio::test]
async fn in_person_identical_addresses_pay_the_resolution_vendor_once() {
    let config = default_config();
    let h = harness(VendorClients::mocks(), &config);
    let mut pii = remote_pii();
    pii.id_doc_address = Some(pii.residential_address.clone());

    let decision = decide(&h, request(pii, EnrollmentMode::InPerson)).await;

    assert!(decision.success);
    // Two address steps, one vendor call, one cost entry.
    assert_eq!(resolution_calls(&h), 1);
    assert_eq!(cost(&h, BillingCategory::IdentityResolution), 1);
    assert_eq!(decision.residential_result, decision.resolution_result);
    // Phone verification is not part of the in-person workflow.
    assert_eq!(phone_calls(&h), 0);
    assert!(decision.phone_result.success);
    assert_eq!(
        decision
            .stages
            .iter()
            .filter(|s| s.vendor_name == "crosscheck:resolution")
            .count(),
        1
    );
}

#[tokio::test]
async fn in_person_differing_addresses_pay_twice() {
    let config = default_config();
    let h = harness(VendorClients::mocks(), &config);
    let mut pii = remote_pii();
    pii.id_doc_address = Some(Address {
        address1: "1 Seaview".into(),
        address2: None,
        city: "Santa Cruz".into(),
        state: "CA".into(),
        zipcode: "91000".into(),
    });

    let decision = decide(&h, request(pii, EnrollmentMode::InPerson)).await;

    assert!(decision.success);
    assert_eq!(resolution_calls(&h), 2);
    assert_eq!(cost(&h, BillingCategory::IdentityResolution), 2);
}

#[tokio::test]
async fn unsupported_jurisdiction_skips_the_record_vendor_for_free() {
    let mut config = default_config();
    config.supported_jurisdictions = vec!["VA".parse().unwrap()]; // applicant is AZ
    let h = harness(VendorClients::mocks(), &config);

    let decision = decide(&h, request(remote_pii(), EnrollmentMode::Remote)).await;

    assert!(decision.success);
    assert!(decision.state_record_result.success());
    assert_eq!(
        decision.state_record_result.vendor_name(),
        "unsupported_jurisdiction"
    );
    assert!(decision.state_record_result.verified_attributes.is_empty());
    assert_eq!(state_record_calls(&h), 0);
    assert_eq!(cost(&h, BillingCategory::StateRecordVerification), 0);
}

#[tokio::test]
async fn missing_device_session_id_short_circuits_profiling() {
    let config = default_config();
    let h = harness(VendorClients::mocks(), &config);
    let mut req = request(remote_pii(), EnrollmentMode::Remote);
    req.device_session_id = None;

    let decision = decide(&h, req).await;

    let device = &decision.device_risk_result;
    assert!(!device.success);
    assert_eq!(device.client_code, "tmx_session_id_missing");
    assert_eq!(device.review_status, ReviewStatus::Reject);
    assert_eq!(device_calls(&h), 0);
    assert_eq!(cost(&h, BillingCategory::DeviceRisk), 0);
    // A review rejection flags the attempt without failing it.
    assert!(decision.success);
    assert_eq!(decision.device_review_status, ReviewStatus::Reject);
}

#[tokio::test]
async fn state_record_closes_a_recoverable_resolution_gap() {
    let config = default_config();
    let clients = VendorClients {
        resolution: Arc::new(IdentityResolutionClient::Mock(
            MockIdentityResolutionClient::failing(&[Attribute::Address]),
        )),
        state_record: Arc::new(StateRecordClient::Mock(MockStateRecordClient::passing())),
        device_risk: Arc::new(DeviceRiskClient::Mock(MockDeviceRiskClient::passing())),
        phone: Arc::new(PhoneOwnershipClient::Mock(MockPhoneOwnershipClient::passing())),
    };
    let h = harness(clients, &config);

    let decision = decide(&h, request(remote_pii(), EnrollmentMode::Remote)).await;

    assert!(decision.success);
    assert_eq!(
        decision.reason,
        AdjudicationReason::PassStateRecordCoversResolution
    );
    assert_eq!(state_record_calls(&h), 1);
}

#[tokio::test]
async fn uncovered_resolution_failure_fails_and_skips_downstream_vendors() {
    let config = default_config();
    let clients = VendorClients {
        resolution: Arc::new(IdentityResolutionClient::Mock(
            MockIdentityResolutionClient::failing(&[Attribute::Ssn]),
        )),
        state_record: Arc::new(StateRecordClient::Mock(MockStateRecordClient::passing())),
        device_risk: Arc::new(DeviceRiskClient::Mock(MockDeviceRiskClient::passing())),
        phone: Arc::new(PhoneOwnershipClient::Mock(MockPhoneOwnershipClient::passing())),
    };
    let h = harness(clients, &config);

    let decision = decide(&h, request(remote_pii(), EnrollmentMode::Remote)).await;

    assert!(!decision.success);
    assert_eq!(decision.reason, AdjudicationReason::FailResolution);
    // The record vendor was not asked to close an uncloseable gap, and
    // the phone check refused to run over a failed upstream.
    assert_eq!(state_record_calls(&h), 0);
    assert_eq!(phone_calls(&h), 0);
    assert_eq!(cost(&h, BillingCategory::StateRecordVerification), 0);
    assert_eq!(cost(&h, BillingCategory::PhoneOwnership), 0);
}

#[tokio::test]
async fn maintenance_window_failures_are_forgiven_by_the_limiter() {
    let mut config = default_config();
    config.rate_limits.ssn_max_attempts = 1;

    let excused = VendorClients {
        resolution: Arc::new(IdentityResolutionClient::Mock(
            MockIdentityResolutionClient::passing(),
        )),
        state_record: Arc::new(StateRecordClient::Mock(MockStateRecordClient::erroring(
            VendorExceptionKind::AuthorityTimeout,
            true,
        ))),
        device_risk: Arc::new(DeviceRiskClient::Mock(MockDeviceRiskClient::passing())),
        phone: Arc::new(PhoneOwnershipClient::Mock(MockPhoneOwnershipClient::passing())),
    };
    let h = harness(excused, &config);

    // Three consecutive attempts with the same SSN all start, because
    // each maintenance-window failure is forgiven.
    for _ in 0..3 {
        let decision = decide(&h, request(remote_pii(), EnrollmentMode::Remote)).await;
        assert!(!decision.success);
        assert!(decision.state_record_result.jurisdiction_in_maintenance_window);
    }
}

#[tokio::test]
async fn repeated_failures_outside_maintenance_windows_throttle_the_ssn() {
    let mut config = default_config();
    config.rate_limits.ssn_max_attempts = 1;

    let unexcused = VendorClients {
        resolution: Arc::new(IdentityResolutionClient::Mock(
            MockIdentityResolutionClient::passing(),
        )),
        state_record: Arc::new(StateRecordClient::Mock(MockStateRecordClient::erroring(
            VendorExceptionKind::AuthorityTimeout,
            false,
        ))),
        device_risk: Arc::new(DeviceRiskClient::Mock(MockDeviceRiskClient::passing())),
        phone: Arc::new(PhoneOwnershipClient::Mock(MockPhoneOwnershipClient::passing())),
    };
    let h = harness(unexcused, &config);

    decide(&h, request(remote_pii(), EnrollmentMode::Remote)).await;
    decide(&h, request(remote_pii(), EnrollmentMode::Remote)).await;

    // Same SSN under a different account still trips the fingerprint
    // counter.
    let mut pii = remote_pii();
    pii.account_id = "acct-2".into();
    let err = h
        .orchestrator
        .start_resolution(request(pii, EnrollmentMode::Remote))
        .unwrap_err();
    assert!(matches!(err, ResolutionError::RateLimited { .. }));
}

#[tokio::test]
async fn decisions_scrub_the_ssn_and_keep_its_fingerprint() {
    let config = default_config();
    let h = harness(VendorClients::mocks(), &config);

    let decision = decide(&h, request(remote_pii(), EnrollmentMode::Remote)).await;

    // The persisted record carries only the fingerprint.
    assert_eq!(decision.ssn_fingerprint.as_str().len(), 64);
    let serialized = serde_json::to_string(&decision).unwrap();
    assert!(!serialized.contains("900321898"));
}
