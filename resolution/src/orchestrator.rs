//! The orchestrator: one asynchronous proofing attempt end to end.
//!
//! `start_resolution` throttles, creates the capture-session record,
//! and spawns a single background task that runs the steps in
//! dependency order, adjudicates, and persists the decision. The task
//! and the poller share nothing but the record.

use crate::adjudicator::ResultAdjudicator;
use crate::config::ResolutionConfig;
use crate::device_risk_check::DeviceRiskStep;
use crate::error::ResolutionError;
use crate::id_address::IdAddressStep;
use crate::phone_ownership::PhoneOwnershipStep;
use crate::residential_address::ResidentialAddressStep;
use crate::session::{CaptureSession, CaptureSessionStore};
use crate::state_record_check::StateRecordStep;
use crate::timer::StageTimer;
use attest_costs::CostLedger;
use attest_limiter::{AttemptType, RateLimiter, Scope};
use attest_proofing::{
    DeviceRiskClient, HttpDeviceRiskClient, HttpIdentityResolutionClient,
    HttpPhoneOwnershipClient, HttpStateRecordClient, HttpTokenSource, IdentityResolutionClient,
    MockDeviceRiskClient, MockIdentityResolutionClient, MockPhoneOwnershipClient,
    MockStateRecordClient, PhoneOwnershipClient, StateRecordClient, TokenCache, TokenSource,
};
use attest_types::{
    AccountId, ApplicantPii, ClientId, EnrollmentMode, FingerprintKey, SessionId, SsnFingerprint,
    Timestamp, TraceId,
};
use std::sync::Arc;
use std::time::Duration;

/// The four vendor adapters a deployment runs with.
pub struct VendorClients {
    pub resolution: Arc<IdentityResolutionClient>,
    pub state_record: Arc<StateRecordClient>,
    pub device_risk: Arc<DeviceRiskClient>,
    pub phone: Arc<PhoneOwnershipClient>,
}

impl VendorClients {
    /// All-passing mocks, for tests and mock deployments.
    pub fn mocks() -> Self {
        Self {
            resolution: Arc::new(IdentityResolutionClient::Mock(
                MockIdentityResolutionClient::passing(),
            )),
            state_record: Arc::new(StateRecordClient::Mock(MockStateRecordClient::passing())),
            device_risk: Arc::new(DeviceRiskClient::Mock(MockDeviceRiskClient::passing())),
            phone: Arc::new(PhoneOwnershipClient::Mock(MockPhoneOwnershipClient::passing())),
        }
    }

    /// Live HTTP adapters built from configuration.
    pub fn from_config(config: &ResolutionConfig) -> Result<Self, ResolutionError> {
        if config.mock_vendors {
            return Ok(Self::mocks());
        }

        let resolution_cfg = config
            .resolution_vendor
            .clone()
            .ok_or_else(|| ResolutionError::Config("resolution_vendor section missing".into()))?;
        let state_record_cfg = config
            .state_record_vendor
            .clone()
            .ok_or_else(|| ResolutionError::Config("state_record_vendor section missing".into()))?;
        let auth_cfg = config
            .state_record_auth
            .clone()
            .ok_or_else(|| ResolutionError::Config("state_record_auth section missing".into()))?;
        let device_cfg = config
            .device_risk_vendor
            .clone()
            .ok_or_else(|| ResolutionError::Config("device_risk_vendor section missing".into()))?;
        let phone_cfg = config
            .phone_vendor
            .clone()
            .ok_or_else(|| ResolutionError::Config("phone_vendor section missing".into()))?;

        let token_source = HttpTokenSource::new(
            auth_cfg.auth_url,
            auth_cfg.client_key,
            auth_cfg.client_secret,
            Duration::from_secs(auth_cfg.timeout_secs),
        )?;
        let token_cache = Arc::new(TokenCache::new(TokenSource::Http(token_source)));

        Ok(Self {
            resolution: Arc::new(IdentityResolutionClient::Http(
                HttpIdentityResolutionClient::new(resolution_cfg)?,
            )),
            state_record: Arc::new(StateRecordClient::Http(HttpStateRecordClient::new(
                state_record_cfg,
                token_cache,
                config.maintenance_schedule()?,
            )?)),
            device_risk: Arc::new(DeviceRiskClient::Http(HttpDeviceRiskClient::new(
                device_cfg,
            )?)),
            phone: Arc::new(PhoneOwnershipClient::Http(HttpPhoneOwnershipClient::new(
                phone_cfg,
            )?)),
        })
    }
}

/// Inputs for one proofing attempt.
pub struct StartResolutionRequest {
    pub pii: ApplicantPii,
    pub mode: EnrollmentMode,
    pub client: ClientId,
    pub trace_id: TraceId,
    /// Session id collected by the front end's device profiling tag.
    pub device_session_id: Option<String>,
    pub request_ip: String,
}

impl StartResolutionRequest {
    pub fn account_id(&self) -> &AccountId {
        &self.pii.account_id
    }
}

pub struct Orchestrator {
    residential: ResidentialAddressStep,
    id_address: IdAddressStep,
    state_record: StateRecordStep,
    device_risk: DeviceRiskStep,
    phone: PhoneOwnershipStep,
    limiter: RateLimiter,
    fingerprint_key: FingerprintKey,
    sessions: Arc<dyn CaptureSessionStore>,
}

impl Orchestrator {
    pub fn new(
        clients: VendorClients,
        ledger: Arc<dyn CostLedger>,
        limiter: RateLimiter,
        sessions: Arc<dyn CaptureSessionStore>,
        config: &ResolutionConfig,
    ) -> Self {
        Self {
            residential: ResidentialAddressStep::new(clients.resolution.clone(), ledger.clone()),
            id_address: IdAddressStep::new(clients.resolution, ledger.clone()),
            state_record: StateRecordStep::new(
                clients.state_record,
                ledger.clone(),
                config.supported_jurisdiction_set(),
                config.banned_jurisdiction_map(),
            ),
            device_risk: DeviceRiskStep::new(
                clients.device_risk,
                ledger.clone(),
                config.device_risk_enabled,
            ),
            phone: PhoneOwnershipStep::new(clients.phone, ledger),
            limiter,
            fingerprint_key: FingerprintKey::new(config.fingerprint_key.as_bytes().to_vec()),
            sessions,
        }
    }

    /// Begin one proofing attempt. Returns the capture-session id the
    /// HTTP layer polls; the vendor work happens in a background task.
    pub fn start_resolution(
        self: &Arc<Self>,
        request: StartResolutionRequest,
    ) -> Result<SessionId, ResolutionError> {
        let now = Timestamp::now();
        let account_scope = Scope::Account(request.account_id().clone());
        let ssn_fingerprint = request.pii.ssn.fingerprint(&self.fingerprint_key);
        let ssn_scope = Scope::SsnFingerprint(ssn_fingerprint.clone());

        for (scope, attempt_type) in [
            (&account_scope, AttemptType::IdentitySubmission),
            (&ssn_scope, AttemptType::SsnProofing),
        ] {
            if self.limiter.is_throttled(scope, attempt_type, now)? {
                return Err(ResolutionError::RateLimited {
                    retry_at: self.limiter.expires_at(scope, attempt_type, now)?,
                });
            }
        }

        self.limiter
            .increment(&account_scope, AttemptType::IdentitySubmission, now)?;
        self.limiter
            .increment(&ssn_scope, AttemptType::SsnProofing, now)?;

        let session_id = SessionId::generate();
        self.sessions
            .create(CaptureSession::new(session_id.clone(), now))?;

        let orchestrator = Arc::clone(self);
        let task_session_id = session_id.clone();
        tokio::spawn(async move {
            if let Err(error) = orchestrator
                .run_pass(task_session_id.clone(), request, ssn_fingerprint)
                .await
            {
                // Broken deployment, not a user-facing condition: the
                // session stays undecided and the poller times out.
                tracing::error!(
                    session = %task_session_id,
                    %error,
                    "resolution pass aborted"
                );
            }
        });

        Ok(session_id)
    }

    async fn run_pass(
        &self,
        session_id: SessionId,
        request: StartResolutionRequest,
        ssn_fingerprint: SsnFingerprint,
    ) -> Result<(), ResolutionError> {
        let mut timer = StageTimer::new();
        let now = Timestamp::now();
        let mut pii = request.pii;
        let same_address_as_id = pii.same_address_as_id();

        let residential_result = self
            .residential
            .call(&pii, &request.client, request.mode, &mut timer, now)
            .await?;
        let id_address_result = self
            .id_address
            .call(
                &pii,
                &request.client,
                &residential_result,
                request.mode,
                &mut timer,
                now,
            )
            .await?;
        let state_record_result = self
            .state_record
            .call(
                &pii,
                &request.client,
                &id_address_result,
                request.mode,
                &mut timer,
                now,
            )
            .await?;
        let device_risk_result = self
            .device_risk
            .call(
                &pii,
                &request.client,
                request.device_session_id.as_deref(),
                &request.request_ip,
                &mut timer,
                now,
            )
            .await?;
        let phone_result = self
            .phone
            .call(
                &pii,
                &request.client,
                request.mode,
                &residential_result,
                &id_address_result,
                &state_record_result,
                &mut timer,
                now,
            )
            .await?;

        // The raw SSN has served its purpose.
        pii.ssn.scrub();

        // A failure inside a published authority maintenance window is
        // excused from abuse counting.
        if !state_record_result.success()
            && state_record_result.jurisdiction_in_maintenance_window
            && state_record_result.authority_exception()
        {
            self.limiter.forgive(
                &Scope::SsnFingerprint(ssn_fingerprint.clone()),
                AttemptType::SsnProofing,
                Timestamp::now(),
            )?;
        }

        let adjudicator = ResultAdjudicator {
            residential_result,
            id_address_result,
            state_record_result,
            device_risk_result,
            phone_result,
            mode: request.mode,
            same_address_as_id,
        };
        let decision = adjudicator.into_decision(
            request.trace_id.clone(),
            ssn_fingerprint,
            timer.into_results(),
            Timestamp::now(),
        );

        tracing::info!(
            trace_id = %request.trace_id,
            session = %session_id,
            success = decision.success,
            reason = ?decision.reason,
            residential_success = decision.residential_result.success(),
            resolution_success = decision.resolution_result.success(),
            state_record_success = decision.state_record_result.success(),
            device_risk_success = decision.device_risk_result.success,
            phone_success = decision.phone_result.success,
            timings_ms = ?decision.timings_ms,
            "proof_resolution"
        );

        self.sessions
            .store_decision(&session_id, decision, Timestamp::now())
    }
}
