use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockflow_core::{EngineError, ItemId};

use crate::alerts::AlertReport;
use crate::health::HealthReport;
use crate::recommendations::RecommendationReport;

/// An item a batch could not fully process, with the reason.
///
/// Batches never drop items silently: every skipped item shows up here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemFailure {
    pub item_id: ItemId,
    pub reason: EngineError,
}

impl ItemFailure {
    pub fn new(item_id: ItemId, reason: EngineError) -> Self {
        Self { item_id, reason }
    }
}

/// Combined output of one full engine pass over a snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventoryReport {
    pub generated_at: DateTime<Utc>,
    pub alerts: AlertReport,
    pub recommendations: RecommendationReport,
    pub health: HealthReport,
}
