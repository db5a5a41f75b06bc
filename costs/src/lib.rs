//! Vendor billing records.
//!
//! One [`CostEntry`] is appended per vendor call actually executed,
//! tagged by billing category and owning client, and queried later for
//! vendor-invoice reconciliation. Steps that short-circuit by reuse or
//! by a business rule record nothing.

pub mod entry;
pub mod error;
pub mod ledger;

pub use entry::{BillingCategory, CostEntry};
pub use error::CostError;
pub use ledger::{CostLedger, InMemoryCostLedger};
