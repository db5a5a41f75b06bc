//! Resolution-core configuration with TOML file support.
//!
//! Everything here is owned elsewhere (deployment tooling, per-client
//! agreements, vendor contracts) and consumed by this core: vendor
//! endpoints and credentials, supported jurisdictions, per-client
//! jurisdiction bans, device-risk enablement, maintenance windows,
//! rate-limit thresholds, and the poll budget.

use crate::error::ResolutionError;
use attest_limiter::{AttemptType, RateLimit, RateLimitConfig};
use attest_proofing::device_risk::DeviceRiskVendorConfig;
use attest_proofing::phone::PhoneVendorConfig;
use attest_proofing::resolution::ResolutionVendorConfig;
use attest_proofing::state_record::StateRecordVendorConfig;
use attest_proofing::{MaintenanceSchedule, MaintenanceWindow};
use attest_types::{ClientId, Jurisdiction};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::path::Path;

/// Credentials for the state-record gateway's token endpoint.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StateRecordAuthConfig {
    pub auth_url: String,
    pub client_key: String,
    pub client_secret: String,
    #[serde(default = "default_auth_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_auth_timeout_secs() -> u64 {
    10
}

/// Rate-limit thresholds and window sizes.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RateLimitsConfig {
    #[serde(default = "default_submission_max_attempts")]
    pub submission_max_attempts: u32,
    #[serde(default = "default_submission_window_secs")]
    pub submission_window_secs: u64,
    #[serde(default = "default_ssn_max_attempts")]
    pub ssn_max_attempts: u32,
    #[serde(default = "default_ssn_window_secs")]
    pub ssn_window_secs: u64,
}

fn default_submission_max_attempts() -> u32 {
    5
}

fn default_submission_window_secs() -> u64 {
    6 * 3600
}

fn default_ssn_max_attempts() -> u32 {
    10
}

fn default_ssn_window_secs() -> u64 {
    24 * 3600
}

impl Default for RateLimitsConfig {
    fn default() -> Self {
        Self {
            submission_max_attempts: default_submission_max_attempts(),
            submission_window_secs: default_submission_window_secs(),
            ssn_max_attempts: default_ssn_max_attempts(),
            ssn_window_secs: default_ssn_window_secs(),
        }
    }
}

/// Configuration for the resolution core.
///
/// Can be loaded from a TOML file via [`ResolutionConfig::from_toml_file`]
/// or built programmatically (e.g. for tests).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ResolutionConfig {
    /// Use canned mock vendors instead of live endpoints.
    #[serde(default = "default_true")]
    pub mock_vendors: bool,

    /// Live vendor endpoints; required only when `mock_vendors` is off.
    #[serde(default)]
    pub resolution_vendor: Option<ResolutionVendorConfig>,
    #[serde(default)]
    pub state_record_vendor: Option<StateRecordVendorConfig>,
    #[serde(default)]
    pub state_record_auth: Option<StateRecordAuthConfig>,
    #[serde(default)]
    pub device_risk_vendor: Option<DeviceRiskVendorConfig>,
    #[serde(default)]
    pub phone_vendor: Option<PhoneVendorConfig>,

    /// Whether device profiling runs at all.
    #[serde(default = "default_true")]
    pub device_risk_enabled: bool,

    /// Jurisdictions the record network can query.
    #[serde(default)]
    pub supported_jurisdictions: Vec<Jurisdiction>,

    /// Jurisdictions individual clients have opted out of, keyed by
    /// client id.
    #[serde(default)]
    pub banned_jurisdictions_by_client: HashMap<String, Vec<Jurisdiction>>,

    /// Weekly authority maintenance windows, keyed by jurisdiction code.
    #[serde(default)]
    pub maintenance_windows: HashMap<String, Vec<MaintenanceWindow>>,

    /// Key for SSN fingerprinting. Deployments must override the
    /// development default.
    #[serde(default = "default_fingerprint_key")]
    pub fingerprint_key: String,

    #[serde(default)]
    pub rate_limits: RateLimitsConfig,

    /// How long the poller waits for a decision before reporting the
    /// attempt as timed out.
    #[serde(default = "default_max_poll_secs")]
    pub max_poll_secs: u64,

    /// Log format: "human" or "json".
    #[serde(default = "default_log_format")]
    pub log_format: String,

    /// Log level filter: "trace", "debug", "info", "warn", "error".
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

// ── Serde default helpers ──────────────────────────────────────────────

fn default_true() -> bool {
    true
}

fn default_fingerprint_key() -> String {
    "insecure-dev-fingerprint-key".to_string()
}

fn default_max_poll_secs() -> u64 {
    60
}

fn default_log_format() -> String {
    "human".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ResolutionConfig {
    fn default() -> Self {
        toml::from_str("").expect("empty config deserializes via defaults")
    }
}

impl ResolutionConfig {
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ResolutionError> {
        let raw = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ResolutionError::Config(format!("reading config file: {e}")))?;
        toml::from_str(&raw).map_err(|e| ResolutionError::Config(format!("parsing config: {e}")))
    }

    /// Per-attempt-type limits for the rate limiter.
    pub fn rate_limit_config(&self) -> RateLimitConfig {
        let mut config = RateLimitConfig::defaults();
        config.set(
            AttemptType::IdentitySubmission,
            RateLimit {
                max_attempts: self.rate_limits.submission_max_attempts,
                window_secs: self.rate_limits.submission_window_secs,
            },
        );
        config.set(
            AttemptType::SsnProofing,
            RateLimit {
                max_attempts: self.rate_limits.ssn_max_attempts,
                window_secs: self.rate_limits.ssn_window_secs,
            },
        );
        config
    }

    pub fn supported_jurisdiction_set(&self) -> BTreeSet<Jurisdiction> {
        self.supported_jurisdictions.iter().cloned().collect()
    }

    pub fn banned_jurisdiction_map(&self) -> HashMap<ClientId, BTreeSet<Jurisdiction>> {
        self.banned_jurisdictions_by_client
            .iter()
            .map(|(client, jurisdictions)| {
                (
                    ClientId::new(client.clone()),
                    jurisdictions.iter().cloned().collect(),
                )
            })
            .collect()
    }

    pub fn maintenance_schedule(&self) -> Result<MaintenanceSchedule, ResolutionError> {
        let mut windows = HashMap::new();
        for (code, entries) in &self.maintenance_windows {
            let jurisdiction: Jurisdiction = code
                .parse()
                .map_err(|e| ResolutionError::Config(format!("maintenance_windows: {e}")))?;
            windows.insert(jurisdiction, entries.clone());
        }
        Ok(MaintenanceSchedule::new(windows))
    }
}
