//! Consumption estimation: daily consumption rate and projected stockout.
//!
//! Model:
//! - Sum the consumption (negative deltas) of an item over the lookback window.
//! - Divide by the number of days of data in that window (a newly created item
//!   only contributes the days since its first movement).
//! - `days_to_stockout = current_quantity / rate`, unbounded when nothing is
//!   consumed.

use core::cmp::Ordering;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockflow_core::{EngineError, EngineResult, ItemId};
use stockflow_inventory::{Item, LedgerSnapshot};

use crate::config::window_start;

const SECONDS_PER_DAY: i64 = 86_400;

/// Projected time until an item runs out.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DaysToStockout {
    Finite(f64),
    /// Nothing is being consumed: no near-term risk.
    Unbounded,
}

impl DaysToStockout {
    pub fn as_finite(&self) -> Option<f64> {
        match self {
            DaysToStockout::Finite(days) => Some(*days),
            DaysToStockout::Unbounded => None,
        }
    }

    pub fn is_unbounded(&self) -> bool {
        matches!(self, DaysToStockout::Unbounded)
    }

    /// Stockout is projected within `limit` days (inclusive).
    pub fn is_within(&self, limit: f64) -> bool {
        self.as_finite().is_some_and(|days| days <= limit)
    }

    /// Soonest first; unbounded sorts after every finite value.
    pub fn cmp_soonest(&self, other: &Self) -> Ordering {
        match (self, other) {
            (DaysToStockout::Finite(a), DaysToStockout::Finite(b)) => a.total_cmp(b),
            (DaysToStockout::Finite(_), DaysToStockout::Unbounded) => Ordering::Less,
            (DaysToStockout::Unbounded, DaysToStockout::Finite(_)) => Ordering::Greater,
            (DaysToStockout::Unbounded, DaysToStockout::Unbounded) => Ordering::Equal,
        }
    }
}

/// Consumption observed for one item inside the lookback window.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct ObservedWindow {
    pub start: DateTime<Utc>,
    /// Days of data inside the window; zero only when the item never moved.
    pub observed_days: i64,
    /// Units consumed inside the window (receipts excluded).
    pub consumed: i64,
}

impl ObservedWindow {
    pub fn daily_rate(&self) -> f64 {
        if self.observed_days > 0 {
            self.consumed as f64 / self.observed_days as f64
        } else {
            0.0
        }
    }
}

/// Output of the consumption estimator for one item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsumptionEstimate {
    pub item_id: ItemId,
    pub daily_consumption_rate: f64,
    pub days_to_stockout: DaysToStockout,
    pub observed_days: i64,
}

/// Measure the lookback window of `item`.
///
/// Partial days of data count as a whole day, capped at `lookback_days`.
/// Fails with `InvalidConfiguration` when the window cannot be represented.
pub fn observe_window(snapshot: &LedgerSnapshot, item: &Item, lookback_days: i64) -> EngineResult<ObservedWindow> {
    let as_of = snapshot.as_of();
    let start = window_start(as_of, lookback_days)?;

    let observed_days = match snapshot.first_movement(&item.id) {
        None => 0,
        Some(first) => {
            let data_start = first.max(start);
            let seconds = (as_of - data_start).num_seconds().max(0);
            let days = (seconds + SECONDS_PER_DAY - 1) / SECONDS_PER_DAY;
            days.clamp(1, lookback_days.max(1))
        }
    };

    let consumed = snapshot
        .history_since(&item.id, start)
        .iter()
        .map(|t| t.consumed())
        .sum();

    Ok(ObservedWindow {
        start,
        observed_days,
        consumed,
    })
}

/// Estimate the daily consumption rate and days-to-stockout of `item`.
///
/// Fails with `InsufficientHistory` only when the item has no data at all
/// *and* its stock is already below minimum; a quiet item with healthy stock
/// is reported as unbounded instead.
pub fn estimate_consumption(
    snapshot: &LedgerSnapshot,
    item: &Item,
    lookback_days: i64,
) -> EngineResult<ConsumptionEstimate> {
    let window = observe_window(snapshot, item, lookback_days)?;

    if window.observed_days == 0 && item.current_quantity < item.minimum_quantity {
        return Err(EngineError::insufficient_history(item.id));
    }

    let rate = window.daily_rate();
    let days_to_stockout = if rate > 0.0 {
        DaysToStockout::Finite(item.current_quantity as f64 / rate)
    } else {
        DaysToStockout::Unbounded
    };

    Ok(ConsumptionEstimate {
        item_id: item.id,
        daily_consumption_rate: rate,
        days_to_stockout,
        observed_days: window.observed_days,
    })
}
