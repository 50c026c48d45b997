//! Stock movement and department (actor) consumption analysis over a window.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use stockflow_core::{ActorId, EngineError, EngineResult};
use stockflow_inventory::{InventoryTransaction, LedgerSnapshot, TransactionKind};

use crate::config::{MAX_WINDOW_DAYS, window_start};
use crate::scope::Scope;

/// Totals of one transaction kind.
#[derive(Debug, Copy, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MovementTotals {
    pub transactions: usize,
    /// Absolute units moved.
    pub quantity: i64,
    pub average_quantity: f64,
}

impl MovementTotals {
    fn add(&mut self, units: i64) {
        self.transactions += 1;
        self.quantity += units;
        self.average_quantity = self.quantity as f64 / self.transactions as f64;
    }
}

/// Units received and issued on one calendar day (UTC).
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyMovement {
    pub received: i64,
    pub issued: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MovementSummary {
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
    pub receipts: MovementTotals,
    pub issues: MovementTotals,
    pub daily: BTreeMap<NaiveDate, DailyMovement>,
    pub total_transactions: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DepartmentEfficiency {
    pub actor_id: ActorId,
    pub consumed: i64,
    pub received: i64,
    /// consumed / received; zero when nothing was received.
    pub efficiency_ratio: f64,
    pub daily_average_consumption: f64,
    pub transactions: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DepartmentReport {
    pub window_days: i64,
    /// In actor id order.
    pub departments: Vec<DepartmentEfficiency>,
    pub average_efficiency: f64,
    /// Transactions in the window recorded without an actor.
    pub unattributed_transactions: usize,
}

fn window_transactions<'a>(
    snapshot: &'a LedgerSnapshot,
    scope: Scope,
    window_days: i64,
) -> EngineResult<impl Iterator<Item = &'a InventoryTransaction> + 'a> {
    if window_days <= 0 {
        return Err(EngineError::invalid_configuration(format!(
            "movement window must be positive (got {window_days})"
        )));
    }
    if window_days > MAX_WINDOW_DAYS {
        return Err(EngineError::invalid_configuration(format!(
            "movement window cannot exceed {MAX_WINDOW_DAYS} days (got {window_days})"
        )));
    }
    let start = window_start(snapshot.as_of(), window_days)?;
    Ok(snapshot
        .transactions()
        .iter()
        .filter(move |t| t.occurred_at >= start && scope.allows(t.warehouse_id)))
}

/// Receipt/issue totals and per-day movement over the last `window_days`.
pub fn summarize_movements(
    snapshot: &LedgerSnapshot,
    scope: Scope,
    window_days: i64,
) -> EngineResult<MovementSummary> {
    let mut receipts = MovementTotals::default();
    let mut issues = MovementTotals::default();
    let mut daily: BTreeMap<NaiveDate, DailyMovement> = BTreeMap::new();
    let mut total_transactions = 0;

    for tx in window_transactions(snapshot, scope, window_days)? {
        total_transactions += 1;
        let day = daily.entry(tx.occurred_at.date_naive()).or_default();
        match tx.kind() {
            Some(TransactionKind::Receipt) => {
                receipts.add(tx.delta);
                day.received += tx.delta;
            }
            Some(TransactionKind::Issue) => {
                issues.add(tx.consumed());
                day.issued += tx.consumed();
            }
            None => {}
        }
    }

    Ok(MovementSummary {
        window_start: window_start(snapshot.as_of(), window_days)?,
        window_end: snapshot.as_of(),
        receipts,
        issues,
        daily,
        total_transactions,
    })
}

/// Consumed vs received per actor over the last `window_days`.
pub fn department_efficiency(
    snapshot: &LedgerSnapshot,
    scope: Scope,
    window_days: i64,
) -> EngineResult<DepartmentReport> {
    let mut per_actor: BTreeMap<ActorId, (i64, i64, usize)> = BTreeMap::new();
    let mut unattributed_transactions = 0;

    for tx in window_transactions(snapshot, scope, window_days)? {
        let Some(actor_id) = tx.actor_id else {
            unattributed_transactions += 1;
            continue;
        };
        let (consumed, received, count) = per_actor.entry(actor_id).or_default();
        *count += 1;
        if tx.is_receipt() {
            *received += tx.delta;
        } else {
            *consumed += tx.consumed();
        }
    }

    let departments: Vec<DepartmentEfficiency> = per_actor
        .into_iter()
        .map(|(actor_id, (consumed, received, transactions))| DepartmentEfficiency {
            actor_id,
            consumed,
            received,
            efficiency_ratio: if received > 0 {
                consumed as f64 / received as f64
            } else {
                0.0
            },
            daily_average_consumption: consumed as f64 / window_days as f64,
            transactions,
        })
        .collect();

    let average_efficiency = if departments.is_empty() {
        0.0
    } else {
        departments.iter().map(|d| d.efficiency_ratio).sum::<f64>() / departments.len() as f64
    };

    info!(
        departments = departments.len(),
        average_efficiency, unattributed_transactions, "department analysis complete"
    );

    Ok(DepartmentReport {
        window_days,
        departments,
        average_efficiency,
        unattributed_transactions,
    })
}
