//! `stockflow-core`: shared building blocks for the inventory engine.
//!
//! This crate contains **pure** primitives (identifiers, the error taxonomy,
//! entity marker). No IO, no storage concerns.

pub mod entity;
pub mod error;
pub mod id;

pub use entity::{Entity, first_duplicate};
pub use error::{EngineError, EngineResult};
pub use id::{ActorId, ItemId, NodeId, TransactionId, WarehouseId};
