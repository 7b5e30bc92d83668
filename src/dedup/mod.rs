//! Deduplication: the persisted completed ledger and the in-flight set.
//!
//! The two layers are intentionally separate. The ledger is checked at
//! resolution time (skip anything finished in an earlier run) and the
//! in-flight set at download pick-up (two resolvers can still enqueue the
//! same not-yet-completed URL). Collapsing them would reopen that race.

pub mod inflight;
pub mod ledger;

pub use inflight::InFlightSet;
pub use ledger::{CompletedLedger, LEDGER_FILENAME};
