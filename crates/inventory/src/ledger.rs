//! Ledger read boundary: consistent snapshots of items + transaction history.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::ops::Range;
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use stockflow_core::{EngineError, EngineResult, ItemId, TransactionId, WarehouseId, first_duplicate};

use crate::item::Item;
use crate::transaction::InventoryTransaction;

/// Read-only, fully materialised view of the ledger at one instant.
///
/// Every engine computation runs against exactly one snapshot, so
/// transactions appended while it runs are never observed half-way.
///
/// Items are kept sorted by id; transactions are grouped per item and
/// time-ordered inside each group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "SnapshotRecords", into = "SnapshotRecords")]
pub struct LedgerSnapshot {
    as_of: DateTime<Utc>,
    items: Vec<Item>,
    transactions: Vec<InventoryTransaction>,
    ranges: HashMap<ItemId, Range<usize>>,
}

/// Wire shape of a snapshot (what the storage layer hands over).
#[derive(Debug, Clone, Serialize, Deserialize)]
struct SnapshotRecords {
    as_of: DateTime<Utc>,
    items: Vec<Item>,
    #[serde(default)]
    transactions: Vec<InventoryTransaction>,
}

impl TryFrom<SnapshotRecords> for LedgerSnapshot {
    type Error = EngineError;

    fn try_from(value: SnapshotRecords) -> Result<Self, Self::Error> {
        LedgerSnapshot::new(value.as_of, value.items, value.transactions)
    }
}

impl From<LedgerSnapshot> for SnapshotRecords {
    fn from(value: LedgerSnapshot) -> Self {
        SnapshotRecords {
            as_of: value.as_of,
            items: value.items,
            transactions: value.transactions,
        }
    }
}

impl LedgerSnapshot {
    /// Build a snapshot, validating every record against the ledger invariants.
    pub fn new(
        as_of: DateTime<Utc>,
        mut items: Vec<Item>,
        mut transactions: Vec<InventoryTransaction>,
    ) -> EngineResult<Self> {
        if let Some(id) = first_duplicate(&items) {
            return Err(EngineError::validation(format!("duplicate item {id}")));
        }
        if let Some(id) = first_duplicate(&transactions) {
            return Err(EngineError::validation(format!("duplicate transaction {id}")));
        }

        let mut warehouses: HashMap<ItemId, WarehouseId> = HashMap::with_capacity(items.len());
        for item in &items {
            item.validate()?;
            warehouses.insert(item.id, item.warehouse_id);
        }

        for tx in &transactions {
            validate_transaction(tx, warehouses.get(&tx.item_id).copied())?;
            if tx.occurred_at > as_of {
                return Err(EngineError::validation(format!(
                    "transaction {} occurred after the snapshot instant",
                    tx.id
                )));
            }
        }

        items.sort_by_key(|i| i.id);
        transactions.sort_by(|a, b| {
            (a.item_id, a.occurred_at, a.id).cmp(&(b.item_id, b.occurred_at, b.id))
        });

        let mut ranges: HashMap<ItemId, Range<usize>> = HashMap::new();
        let mut start = 0;
        while start < transactions.len() {
            let item_id = transactions[start].item_id;
            let end = transactions[start..]
                .iter()
                .position(|t| t.item_id != item_id)
                .map_or(transactions.len(), |offset| start + offset);
            ranges.insert(item_id, start..end);
            start = end;
        }

        Ok(Self {
            as_of,
            items,
            transactions,
            ranges,
        })
    }

    /// Instant the snapshot describes; the engine's notion of "now".
    pub fn as_of(&self) -> DateTime<Utc> {
        self.as_of
    }

    pub fn items(&self) -> &[Item] {
        &self.items
    }

    pub fn item(&self, item_id: &ItemId) -> Option<&Item> {
        self.items
            .binary_search_by_key(item_id, |i| i.id)
            .ok()
            .map(|idx| &self.items[idx])
    }

    /// All transactions, grouped by item and time-ordered within an item.
    pub fn transactions(&self) -> &[InventoryTransaction] {
        &self.transactions
    }

    /// Time-ordered history of one item (empty if it never moved).
    pub fn history(&self, item_id: &ItemId) -> &[InventoryTransaction] {
        match self.ranges.get(item_id) {
            Some(range) => &self.transactions[range.clone()],
            None => &[],
        }
    }

    /// Transactions of one item at or after `since`.
    pub fn history_since(&self, item_id: &ItemId, since: DateTime<Utc>) -> &[InventoryTransaction] {
        let history = self.history(item_id);
        let first = history.partition_point(|t| t.occurred_at < since);
        &history[first..]
    }

    /// Distinct warehouses referenced by the snapshot's items.
    pub fn warehouses(&self) -> BTreeSet<WarehouseId> {
        self.items.iter().map(|i| i.warehouse_id).collect()
    }

    /// Stock held at `since`, reconstructed from the current quantity and the
    /// movements recorded afterwards.
    pub fn opening_quantity(&self, item: &Item, since: DateTime<Utc>) -> EngineResult<i64> {
        let overflow = || EngineError::validation(format!("movements of item {} overflow its quantity", item.id));
        let moved = sum_deltas(self.history_since(&item.id, since)).ok_or_else(overflow)?;
        let opening = item.current_quantity.checked_sub(moved).ok_or_else(overflow)?;
        Ok(opening.max(0))
    }

    pub fn first_movement(&self, item_id: &ItemId) -> Option<DateTime<Utc>> {
        self.history(item_id).first().map(|t| t.occurred_at)
    }

    pub fn last_consumption(&self, item_id: &ItemId) -> Option<DateTime<Utc>> {
        self.history(item_id)
            .iter()
            .rev()
            .find(|t| t.is_consumption())
            .map(|t| t.occurred_at)
    }

    pub fn last_receipt(&self, item_id: &ItemId) -> Option<DateTime<Utc>> {
        self.history(item_id)
            .iter()
            .rev()
            .find(|t| t.is_receipt())
            .map(|t| t.occurred_at)
    }

    /// Items whose summed deltas disagree with their current quantity.
    ///
    /// Only meaningful when the snapshot carries the full history.
    pub fn unreconciled_items(&self) -> Vec<ItemId> {
        self.items
            .iter()
            .filter(|item| sum_deltas(self.history(&item.id)) != Some(item.current_quantity))
            .map(|item| item.id)
            .collect()
    }
}

/// Sum of the deltas, `None` on overflow.
fn sum_deltas(transactions: &[InventoryTransaction]) -> Option<i64> {
    transactions.iter().try_fold(0i64, |total, t| total.checked_add(t.delta))
}

fn validate_transaction(tx: &InventoryTransaction, owner: Option<WarehouseId>) -> EngineResult<()> {
    let Some(warehouse_id) = owner else {
        return Err(EngineError::validation(format!(
            "transaction {} references unknown item {}",
            tx.id, tx.item_id
        )));
    };
    if warehouse_id != tx.warehouse_id {
        return Err(EngineError::invariant(format!(
            "transaction {} warehouse does not match item {}",
            tx.id, tx.item_id
        )));
    }
    if tx.delta == 0 {
        return Err(EngineError::validation(format!(
            "transaction {}: delta cannot be zero",
            tx.id
        )));
    }
    Ok(())
}

/// Supplier of ledger snapshots (the storage layer's side of the boundary).
///
/// Implementations must return one atomically obtained, consistent view.
pub trait LedgerReader: Send + Sync {
    fn snapshot(&self, as_of: DateTime<Utc>) -> EngineResult<LedgerSnapshot>;
}

impl<R> LedgerReader for Arc<R>
where
    R: LedgerReader + ?Sized,
{
    fn snapshot(&self, as_of: DateTime<Utc>) -> EngineResult<LedgerSnapshot> {
        (**self).snapshot(as_of)
    }
}

#[derive(Debug, Default)]
struct LedgerState {
    items: BTreeMap<ItemId, Item>,
    transactions: Vec<InventoryTransaction>,
    seen: HashSet<TransactionId>,
}

/// Append-only in-memory ledger for tests, tooling and demos.
#[derive(Debug, Default)]
pub struct InMemoryLedger {
    inner: RwLock<LedgerState>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an item. A positive starting quantity is booked as an opening
    /// receipt at `opened_at`, so the ledger always reconciles.
    pub fn register_item(&self, item: Item, opened_at: DateTime<Utc>) -> EngineResult<()> {
        item.validate()?;
        let mut state = self.write()?;
        if state.items.contains_key(&item.id) {
            return Err(EngineError::validation(format!("item {} already exists", item.id)));
        }

        let opening = item.current_quantity;
        let item_id = item.id;
        let warehouse_id = item.warehouse_id;
        state.items.insert(item_id, Item { current_quantity: 0, ..item });

        if opening > 0 {
            let receipt =
                InventoryTransaction::new(TransactionId::new(), item_id, warehouse_id, opening, opened_at);
            apply(&mut state, receipt)?;
        }
        Ok(())
    }

    /// Append one transaction, updating the item's current quantity.
    pub fn record(&self, tx: InventoryTransaction) -> EngineResult<()> {
        let mut state = self.write()?;
        apply(&mut state, tx)
    }

    pub fn current_quantity(&self, item_id: &ItemId) -> Option<i64> {
        let state = self.inner.read().ok()?;
        state.items.get(item_id).map(|i| i.current_quantity)
    }

    /// Confirm that every item's quantity equals the sum of its deltas.
    pub fn verify_reconciliation(&self) -> EngineResult<()> {
        let snapshot = {
            let state = self.read()?;
            LedgerSnapshot::new(
                Utc::now().max(latest(&state.transactions)),
                state.items.values().cloned().collect(),
                state.transactions.clone(),
            )?
        };
        match snapshot.unreconciled_items().first() {
            None => Ok(()),
            Some(item_id) => Err(EngineError::invariant(format!(
                "item {item_id} quantity does not match its transaction history"
            ))),
        }
    }

    fn read(&self) -> EngineResult<std::sync::RwLockReadGuard<'_, LedgerState>> {
        self.inner
            .read()
            .map_err(|_| EngineError::invariant("ledger lock poisoned"))
    }

    fn write(&self) -> EngineResult<std::sync::RwLockWriteGuard<'_, LedgerState>> {
        self.inner
            .write()
            .map_err(|_| EngineError::invariant("ledger lock poisoned"))
    }
}

impl LedgerReader for InMemoryLedger {
    /// Ledger state as of `as_of`: later transactions are excluded and their
    /// deltas rolled back out of the item quantities.
    fn snapshot(&self, as_of: DateTime<Utc>) -> EngineResult<LedgerSnapshot> {
        let state = self.read()?;

        let mut later: HashMap<ItemId, i64> = HashMap::new();
        let mut transactions = Vec::with_capacity(state.transactions.len());
        for tx in &state.transactions {
            if tx.occurred_at > as_of {
                *later.entry(tx.item_id).or_default() += tx.delta;
            } else {
                transactions.push(tx.clone());
            }
        }

        let items = state
            .items
            .values()
            .map(|item| {
                let rolled_back = later.get(&item.id).copied().unwrap_or(0);
                Item {
                    current_quantity: item.current_quantity - rolled_back,
                    ..item.clone()
                }
            })
            .collect();

        LedgerSnapshot::new(as_of, items, transactions)
    }
}

fn apply(state: &mut LedgerState, tx: InventoryTransaction) -> EngineResult<()> {
    let owner = state.items.get(&tx.item_id).map(|i| i.warehouse_id);
    validate_transaction(&tx, owner)?;
    if state.seen.contains(&tx.id) {
        return Err(EngineError::validation(format!("transaction {} already recorded", tx.id)));
    }

    let item = state
        .items
        .get_mut(&tx.item_id)
        .ok_or_else(|| EngineError::validation(format!("unknown item {}", tx.item_id)))?;
    let new_quantity = item.current_quantity.checked_add(tx.delta).ok_or_else(|| {
        EngineError::validation(format!("transaction {} overflows the quantity of item {}", tx.id, tx.item_id))
    })?;
    if new_quantity < 0 {
        return Err(EngineError::invariant("stock cannot go negative"));
    }
    item.current_quantity = new_quantity;

    debug!(item = %tx.item_id, delta = tx.delta, quantity = new_quantity, "ledger transaction recorded");
    state.seen.insert(tx.id);
    state.transactions.push(tx);
    Ok(())
}

fn latest(transactions: &[InventoryTransaction]) -> DateTime<Utc> {
    transactions
        .iter()
        .map(|t| t.occurred_at)
        .max()
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}
