use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockflow_core::{ActorId, Entity, ItemId, TransactionId, WarehouseId};

/// Direction of a stock movement.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    /// Stock entering the warehouse (positive delta).
    Receipt,
    /// Stock consumed or dispatched (negative delta).
    Issue,
}

/// One immutable ledger entry.
///
/// Transactions are facts: append-only, never edited. For every item the sum
/// of deltas up to `T` equals the item's quantity at `T`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryTransaction {
    pub id: TransactionId,
    pub item_id: ItemId,
    pub warehouse_id: WarehouseId,
    /// Signed quantity change (positive = receipt, negative = consumption/dispatch).
    pub delta: i64,
    pub occurred_at: DateTime<Utc>,
    /// Department/actor that recorded the movement.
    #[serde(default)]
    pub actor_id: Option<ActorId>,
}

impl InventoryTransaction {
    pub fn new(
        id: TransactionId,
        item_id: ItemId,
        warehouse_id: WarehouseId,
        delta: i64,
        occurred_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            item_id,
            warehouse_id,
            delta,
            occurred_at,
            actor_id: None,
        }
    }

    pub fn with_actor(mut self, actor_id: ActorId) -> Self {
        self.actor_id = Some(actor_id);
        self
    }

    /// `None` for a zero delta (never accepted by the ledger).
    pub fn kind(&self) -> Option<TransactionKind> {
        match self.delta {
            d if d > 0 => Some(TransactionKind::Receipt),
            d if d < 0 => Some(TransactionKind::Issue),
            _ => None,
        }
    }

    pub fn is_receipt(&self) -> bool {
        self.delta > 0
    }

    pub fn is_consumption(&self) -> bool {
        self.delta < 0
    }

    /// Units consumed by this entry (zero for receipts).
    pub fn consumed(&self) -> i64 {
        if self.delta < 0 { -self.delta } else { 0 }
    }
}

impl Entity for InventoryTransaction {
    type Id = TransactionId;

    fn id(&self) -> TransactionId {
        self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn tx(delta: i64) -> InventoryTransaction {
        InventoryTransaction::new(
            TransactionId::from_u128(1),
            ItemId::from_u128(2),
            WarehouseId::from_u128(3),
            delta,
            Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap(),
        )
    }

    #[test]
    fn kind_follows_delta_sign() {
        assert_eq!(tx(5).kind(), Some(TransactionKind::Receipt));
        assert_eq!(tx(-5).kind(), Some(TransactionKind::Issue));
        assert_eq!(tx(0).kind(), None);
    }

    #[test]
    fn consumed_counts_only_issues() {
        assert_eq!(tx(-7).consumed(), 7);
        assert_eq!(tx(7).consumed(), 0);
        assert!(tx(-1).is_consumption());
        assert!(tx(1).is_receipt());
    }
}
