//! Pollable capture-session records.
//!
//! The background orchestration task and the HTTP-facing poller
//! communicate only through these records: the task writes the decision
//! once, the poller reads until it sees a terminal state. The raw SSN
//! is never stored here.

use crate::adjudicator::ResolutionDecision;
use crate::error::ResolutionError;
use attest_types::{SessionId, Timestamp};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// One proofing attempt's pollable record.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CaptureSession {
    pub id: SessionId,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    pub decision: Option<ResolutionDecision>,
}

impl CaptureSession {
    pub fn new(id: SessionId, now: Timestamp) -> Self {
        Self {
            id,
            created_at: now,
            updated_at: now,
            decision: None,
        }
    }
}

/// Storage for capture sessions. The production backend is a shared
/// table with a TTL; the in-memory store backs tests and single-node
/// deployments.
pub trait CaptureSessionStore: Send + Sync {
    /// Create the record. Fails with [`ResolutionError::SessionExists`]
    /// when the id is already present — re-running an orchestration
    /// pass against a live session is not supported.
    fn create(&self, session: CaptureSession) -> Result<(), ResolutionError>;

    /// Attach the terminal decision.
    fn store_decision(
        &self,
        id: &SessionId,
        decision: ResolutionDecision,
        now: Timestamp,
    ) -> Result<(), ResolutionError>;

    fn load(&self, id: &SessionId) -> Result<Option<CaptureSession>, ResolutionError>;
}

pub struct InMemoryCaptureSessionStore {
    sessions: Mutex<HashMap<SessionId, CaptureSession>>,
}

impl InMemoryCaptureSessionStore {
    pub fn new() -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
        }
    }
}

impl Default for InMemoryCaptureSessionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl CaptureSessionStore for InMemoryCaptureSessionStore {
    fn create(&self, session: CaptureSession) -> Result<(), ResolutionError> {
        let mut sessions = self
            .sessions
            .lock()
            .map_err(|e| ResolutionError::SessionStore(e.to_string()))?;
        if sessions.contains_key(&session.id) {
            return Err(ResolutionError::SessionExists(session.id.to_string()));
        }
        sessions.insert(session.id.clone(), session);
        Ok(())
    }

    fn store_decision(
        &self,
        id: &SessionId,
        decision: ResolutionDecision,
        now: Timestamp,
    ) -> Result<(), ResolutionError> {
        let mut sessions = self
            .sessions
            .lock()
            .map_err(|e| ResolutionError::SessionStore(e.to_string()))?;
        let session = sessions
            .get_mut(id)
            .ok_or_else(|| ResolutionError::SessionStore(format!("unknown session {id}")))?;
        session.decision = Some(decision);
        session.updated_at = now;
        Ok(())
    }

    fn load(&self, id: &SessionId) -> Result<Option<CaptureSession>, ResolutionError> {
        let sessions = self
            .sessions
            .lock()
            .map_err(|e| ResolutionError::SessionStore(e.to_string()))?;
        Ok(sessions.get(id).cloned())
    }
}

/// What the HTTP layer sees when it polls.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PollState {
    /// No job was ever enqueued under this id.
    None,
    /// The job exists but has not produced a decision yet.
    InProgress,
    /// The poll budget elapsed with no decision; the attempt is treated
    /// as lost.
    TimedOut,
    /// Terminal decision available.
    Done(ResolutionDecision),
}

/// Read-only state machine over the capture-session record.
pub struct SessionPoller {
    store: Arc<dyn CaptureSessionStore>,
    max_poll_secs: u64,
}

impl SessionPoller {
    pub fn new(store: Arc<dyn CaptureSessionStore>, max_poll_secs: u64) -> Self {
        Self {
            store,
            max_poll_secs,
        }
    }

    pub fn poll(&self, id: &SessionId, now: Timestamp) -> Result<PollState, ResolutionError> {
        let session = match self.store.load(id)? {
            Some(session) => session,
            None => return Ok(PollState::None),
        };
        if let Some(decision) = session.decision {
            return Ok(PollState::Done(decision));
        }
        if session.created_at.has_expired(self.max_poll_secs, now) {
            return Ok(PollState::TimedOut);
        }
        Ok(PollState::InProgress)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adjudicator::{AdjudicationReason, ResultAdjudicator};
    use attest_proofing::{DeviceRiskResult, ResolutionResult, StateRecordResult, VendorOutcome};
    use attest_types::{EnrollmentMode, FingerprintKey, TraceId};
    use std::collections::{BTreeMap, BTreeSet};

    fn decision() -> ResolutionDecision {
        ResultAdjudicator {
            residential_result: ResolutionResult::passed(VendorOutcome::marker("m")),
            id_address_result: ResolutionResult::passed(VendorOutcome::marker("m")),
            state_record_result: StateRecordResult {
                outcome: VendorOutcome::marker("m"),
                verified_attributes: BTreeSet::new(),
                requested_attributes: BTreeMap::new(),
                jurisdiction_in_maintenance_window: false,
            },
            device_risk_result: DeviceRiskResult::passed("tmx_disabled", None),
            phone_result: VendorOutcome::marker("m"),
            mode: EnrollmentMode::Remote,
            same_address_as_id: true,
        }
        .into_decision(
            TraceId::new("trace-1"),
            FingerprintKey::new(b"k".to_vec()).fingerprint("900321898"),
            Vec::new(),
            Timestamp::new(1_000),
        )
    }

    fn poller(store: Arc<InMemoryCaptureSessionStore>) -> SessionPoller {
        SessionPoller::new(store, 60)
    }

    #[test]
    fn unknown_session_polls_none() {
        let store = Arc::new(InMemoryCaptureSessionStore::new());
        let state = poller(store)
            .poll(&SessionId::new("nope"), Timestamp::new(1_000))
            .unwrap();
        assert_eq!(state, PollState::None);
    }

    #[test]
    fn pending_session_is_in_progress_until_budget_elapses() {
        let store = Arc::new(InMemoryCaptureSessionStore::new());
        let id = SessionId::new("sess-1");
        store
            .create(CaptureSession::new(id.clone(), Timestamp::new(1_000)))
            .unwrap();

        let poller = poller(store);
        assert_eq!(
            poller.poll(&id, Timestamp::new(1_030)).unwrap(),
            PollState::InProgress
        );
        assert_eq!(
            poller.poll(&id, Timestamp::new(1_060)).unwrap(),
            PollState::TimedOut
        );
    }

    #[test]
    fn stored_decision_polls_done_even_after_budget() {
        let store = Arc::new(InMemoryCaptureSessionStore::new());
        let id = SessionId::new("sess-1");
        store
            .create(CaptureSession::new(id.clone(), Timestamp::new(1_000)))
            .unwrap();
        store
            .store_decision(&id, decision(), Timestamp::new(1_005))
            .unwrap();

        let state = poller(store).poll(&id, Timestamp::new(2_000)).unwrap();
        match state {
            PollState::Done(decision) => {
                assert!(decision.success);
                assert_eq!(decision.reason, AdjudicationReason::PassAllChecks);
            }
            other => panic!("expected Done, got {other:?}"),
        }
    }

    #[test]
    fn duplicate_create_is_rejected() {
        let store = InMemoryCaptureSessionStore::new();
        let id = SessionId::new("sess-1");
        store
            .create(CaptureSession::new(id.clone(), Timestamp::new(1_000)))
            .unwrap();
        let err = store
            .create(CaptureSession::new(id, Timestamp::new(1_001)))
            .unwrap_err();
        assert!(matches!(err, ResolutionError::SessionExists(_)));
    }
}
