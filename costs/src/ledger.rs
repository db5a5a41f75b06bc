//! Abstract cost ledger.
//!
//! The production backend is a durable table; the in-memory ledger backs
//! tests and single-node deployments. The rest of the codebase depends
//! only on the trait.

use crate::entry::{BillingCategory, CostEntry};
use crate::error::CostError;
use attest_types::{ClientId, Timestamp};
use std::sync::Mutex;

/// Append-only, queryable store of billable vendor calls.
pub trait CostLedger: Send + Sync {
    fn record(&self, entry: CostEntry) -> Result<(), CostError>;

    /// All entries for one client, in recording order.
    fn entries_for_client(&self, client: &ClientId) -> Result<Vec<CostEntry>, CostError>;

    /// Number of entries for one client under one category.
    fn count(&self, client: &ClientId, category: BillingCategory) -> Result<usize, CostError>;

    /// Entries recorded in `[from, to)`, across clients.
    fn entries_between(&self, from: Timestamp, to: Timestamp) -> Result<Vec<CostEntry>, CostError>;
}

/// Process-local append-only ledger.
pub struct InMemoryCostLedger {
    entries: Mutex<Vec<CostEntry>>,
}

impl InMemoryCostLedger {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
        }
    }

    /// Total number of recorded entries. Useful for test assertions.
    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for InMemoryCostLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl CostLedger for InMemoryCostLedger {
    fn record(&self, entry: CostEntry) -> Result<(), CostError> {
        self.entries
            .lock()
            .map_err(|e| CostError::LedgerUnavailable(e.to_string()))?
            .push(entry);
        Ok(())
    }

    fn entries_for_client(&self, client: &ClientId) -> Result<Vec<CostEntry>, CostError> {
        let entries = self
            .entries
            .lock()
            .map_err(|e| CostError::LedgerUnavailable(e.to_string()))?;
        Ok(entries
            .iter()
            .filter(|e| &e.client == client)
            .cloned()
            .collect())
    }

    fn count(&self, client: &ClientId, category: BillingCategory) -> Result<usize, CostError> {
        let entries = self
            .entries
            .lock()
            .map_err(|e| CostError::LedgerUnavailable(e.to_string()))?;
        Ok(entries
            .iter()
            .filter(|e| &e.client == client && e.category == category)
            .count())
    }

    fn entries_between(&self, from: Timestamp, to: Timestamp) -> Result<Vec<CostEntry>, CostError> {
        let entries = self
            .entries
            .lock()
            .map_err(|e| CostError::LedgerUnavailable(e.to_string()))?;
        Ok(entries
            .iter()
            .filter(|e| e.recorded_at >= from && e.recorded_at < to)
            .cloned()
            .collect())
    }
}
