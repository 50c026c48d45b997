//! Engine error model.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::id::{ItemId, NodeId};

/// Result type used across the engine.
pub type EngineResult<T> = Result<T, EngineError>;

/// Engine-level error.
///
/// Two classes of failure live here:
/// - **per-record** failures (`InsufficientHistory`, `NoRouteFound`) that a batch
///   collects next to its successful results;
/// - **call-level** failures (`InvalidConfiguration`, validation of supplied data)
///   that abort a computation before it starts.
#[derive(Debug, Error, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineError {
    /// Consumption cannot be estimated: the item has no history at all and its
    /// stock is already below minimum.
    #[error("insufficient history to estimate consumption for item {item_id}")]
    InsufficientHistory { item_id: ItemId },

    /// The caller's configuration is unusable (weights, thresholds, windows).
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// No path exists between two nodes of the route network.
    #[error("no route found from {from} to {to}")]
    NoRouteFound { from: NodeId, to: NodeId },

    /// A node referenced by the caller does not exist in the network.
    #[error("unknown node: {0}")]
    UnknownNode(NodeId),

    /// A value failed validation (e.g. malformed input record).
    #[error("validation failed: {0}")]
    Validation(String),

    /// A data invariant was violated.
    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    /// An identifier was invalid (e.g. parse failure).
    #[error("invalid identifier: {0}")]
    InvalidId(String),
}

impl EngineError {
    pub fn insufficient_history(item_id: ItemId) -> Self {
        Self::InsufficientHistory { item_id }
    }

    pub fn invalid_configuration(msg: impl Into<String>) -> Self {
        Self::InvalidConfiguration(msg.into())
    }

    pub fn no_route(from: NodeId, to: NodeId) -> Self {
        Self::NoRouteFound { from, to }
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invariant(msg: impl Into<String>) -> Self {
        Self::InvariantViolation(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    /// Whether the failure only concerns one record of a batch.
    ///
    /// Recoverable failures are reported alongside results; everything else
    /// aborts the call.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            EngineError::InsufficientHistory { .. } | EngineError::NoRouteFound { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn per_record_failures_are_recoverable() {
        let item = ItemId::from_u128(7);
        assert!(EngineError::insufficient_history(item).is_recoverable());
        assert!(EngineError::no_route(NodeId::new("A"), NodeId::new("B")).is_recoverable());
        assert!(!EngineError::invalid_configuration("weights").is_recoverable());
        assert!(!EngineError::UnknownNode(NodeId::new("Z")).is_recoverable());
    }

    #[test]
    fn messages_name_the_failing_record() {
        let err = EngineError::no_route(NodeId::new("WH-1"), NodeId::new("MKT-9"));
        assert_eq!(err.to_string(), "no route found from WH-1 to MKT-9");
    }

    #[test]
    fn serializes_with_snake_case_tags() {
        let json = serde_json::to_value(EngineError::invalid_configuration("bad")).unwrap();
        assert_eq!(json, serde_json::json!({ "invalid_configuration": "bad" }));
    }
}
