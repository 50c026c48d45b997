//! Inventory ledger model.
//!
//! Items, append-only stock transactions and the read-only snapshot the
//! analytics engine computes over. The storage layer owns the data; this crate
//! only describes it and offers an in-memory ledger for tests and tooling.

pub mod item;
pub mod ledger;
pub mod transaction;

pub use item::Item;
pub use ledger::{InMemoryLedger, LedgerReader, LedgerSnapshot};
pub use transaction::{InventoryTransaction, TransactionKind};
