//! Recommendation generator: reorder quantities, slow movers and category analysis.
//!
//! Per item, first match wins:
//! - slow-moving: stock on hand and idle for longer than `slow_mover_idle_days`
//!   (idle since the last consumption, or the last receipt if it never moved out);
//! - reorder-needed: stockout projected within `urgency.low_days`, or already at/below minimum;
//! - normal.
//!
//! Items whose consumption cannot be estimated are skipped and listed as failures.

use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use stockflow_core::{EngineResult, ItemId, WarehouseId};
use stockflow_inventory::{Item, LedgerSnapshot};

use crate::config::{EngineConfig, window_length};
use crate::consumption::{ConsumptionEstimate, DaysToStockout, estimate_consumption, observe_window};
use crate::health::item_turnover;
use crate::report::ItemFailure;
use crate::scope::Scope;

/// Declared in output order.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationKind {
    ReorderNeeded,
    SlowMoving,
    Normal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub item_id: ItemId,
    pub warehouse_id: WarehouseId,
    pub item_name: String,
    pub category: String,
    pub kind: RecommendationKind,
    /// Units to order; zero unless `kind` is `ReorderNeeded`.
    pub recommended_quantity: u64,
    /// Horizon the order covers; set only for reorders.
    pub coverage_days: Option<i64>,
    /// Units missing to reach the minimum.
    pub shortfall: i64,
    /// `recommended_quantity × unit_cost` when a unit cost is known.
    pub estimated_order_value: Option<f64>,
    /// Days since the item last moved out; set only for slow movers.
    pub idle_days: Option<i64>,
    /// Units held above the minimum; set only for slow movers.
    pub excess_quantity: Option<i64>,
    pub daily_consumption_rate: f64,
    pub days_to_stockout: DaysToStockout,
}

/// Aggregates of one item category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategorySummary {
    pub category: String,
    pub item_count: usize,
    /// Items recommended for reorder or flagged slow-moving.
    pub flagged_count: usize,
    pub low_stock_count: usize,
    pub low_stock_percentage: f64,
    pub total_stock_value: f64,
    /// Mean per-item stock turns per year.
    pub average_turnover: f64,
    pub consumed_in_window: i64,
    pub average_daily_consumption: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendationReport {
    pub generated_at: DateTime<Utc>,
    pub scope: Scope,
    /// Reorders first (soonest stockout first), then slow movers (longest idle first), then normal items.
    pub recommendations: Vec<Recommendation>,
    /// One entry per category, in category name order.
    pub categories: Vec<CategorySummary>,
    pub failures: Vec<ItemFailure>,
}

impl RecommendationReport {
    pub fn of_kind(&self, kind: RecommendationKind) -> impl Iterator<Item = &Recommendation> + '_ {
        self.recommendations.iter().filter(move |r| r.kind == kind)
    }

    pub fn for_item(&self, item_id: &ItemId) -> Option<&Recommendation> {
        self.recommendations.iter().find(|r| r.item_id == *item_id)
    }
}

/// Time since the item last moved out (or was last received, if it never moved out).
pub fn idle_time(snapshot: &LedgerSnapshot, item_id: &ItemId) -> Option<TimeDelta> {
    let anchor = snapshot
        .last_consumption(item_id)
        .or_else(|| snapshot.last_receipt(item_id))?;
    Some(snapshot.as_of() - anchor)
}

/// Reorder quantity covering `coverage_days` of consumption, never negative.
pub fn reorder_quantity(daily_rate: f64, current_quantity: i64, coverage_days: i64) -> u64 {
    let needed = daily_rate * coverage_days as f64 - current_quantity as f64;
    if needed.is_finite() && needed > 0.0 {
        needed.ceil() as u64
    } else {
        0
    }
}

fn recommend_item(
    snapshot: &LedgerSnapshot,
    item: &Item,
    estimate: &ConsumptionEstimate,
    config: &EngineConfig,
) -> EngineResult<Recommendation> {
    let mut rec = Recommendation {
        item_id: item.id,
        warehouse_id: item.warehouse_id,
        item_name: item.name.clone(),
        category: item.category.clone(),
        kind: RecommendationKind::Normal,
        recommended_quantity: 0,
        coverage_days: None,
        shortfall: item.shortfall(),
        estimated_order_value: None,
        idle_days: None,
        excess_quantity: None,
        daily_consumption_rate: estimate.daily_consumption_rate,
        days_to_stockout: estimate.days_to_stockout,
    };

    let idle_limit = window_length(config.slow_mover_idle_days)?;
    let idle = idle_time(snapshot, &item.id).filter(|idle| *idle > idle_limit);
    if let Some(idle) = idle.filter(|_| item.current_quantity > 0) {
        rec.kind = RecommendationKind::SlowMoving;
        rec.idle_days = Some(idle.num_days());
        rec.excess_quantity = Some(item.excess());
        return Ok(rec);
    }

    if estimate.days_to_stockout.is_within(config.urgency.low_days) || item.is_at_or_below_minimum() {
        let quantity = reorder_quantity(
            estimate.daily_consumption_rate,
            item.current_quantity,
            config.reorder_coverage_days,
        );
        rec.kind = RecommendationKind::ReorderNeeded;
        rec.recommended_quantity = quantity;
        rec.coverage_days = Some(config.reorder_coverage_days);
        rec.estimated_order_value = item.unit_cost.map(|cost| cost * quantity as f64);
    }
    Ok(rec)
}

fn summarize_categories(
    snapshot: &LedgerSnapshot,
    items: &[&Item],
    recommendations: &[Recommendation],
    config: &EngineConfig,
) -> EngineResult<Vec<CategorySummary>> {
    let mut groups: BTreeMap<&str, Vec<&Item>> = BTreeMap::new();
    for item in items.iter().copied() {
        groups.entry(item.category.as_str()).or_default().push(item);
    }
    let flagged: HashSet<ItemId> = recommendations
        .iter()
        .filter(|r| r.kind != RecommendationKind::Normal)
        .map(|r| r.item_id)
        .collect();

    groups
        .into_iter()
        .map(|(category, items)| {
            let item_count = items.len();
            let flagged_count = items.iter().filter(|i| flagged.contains(&i.id)).count();
            let low_stock_count = items.iter().filter(|i| i.is_at_or_below_minimum()).count();
            let mut consumed_in_window = 0i64;
            let mut total_turnover = 0.0;
            for item in &items {
                consumed_in_window += observe_window(snapshot, item, config.lookback_days)?.consumed;
                total_turnover += item_turnover(snapshot, item, config.lookback_days)?.rate();
            }

            Ok(CategorySummary {
                category: category.to_string(),
                item_count,
                flagged_count,
                low_stock_count,
                low_stock_percentage: low_stock_count as f64 / item_count as f64 * 100.0,
                total_stock_value: items.iter().map(|i| i.stock_value()).sum(),
                average_turnover: total_turnover / item_count as f64,
                consumed_in_window,
                average_daily_consumption: consumed_in_window as f64 / config.lookback_days as f64,
            })
        })
        .collect()
}

/// Recommend an action for every item in `scope` and summarise per category.
pub fn generate_recommendations(
    snapshot: &LedgerSnapshot,
    scope: Scope,
    config: &EngineConfig,
) -> EngineResult<RecommendationReport> {
    config.validate()?;

    let items: Vec<&Item> = scope.items(snapshot).collect();
    let mut recommendations = Vec::with_capacity(items.len());
    let mut failures = Vec::new();

    for item in &items {
        let estimate = match estimate_consumption(snapshot, item, config.lookback_days) {
            Ok(estimate) => estimate,
            Err(e) if e.is_recoverable() => {
                warn!(item = %item.id, error = %e, "skipping recommendation");
                failures.push(ItemFailure::new(item.id, e));
                continue;
            }
            Err(e) => return Err(e),
        };

        let rec = recommend_item(snapshot, item, &estimate, config)?;
        debug!(item = %item.id, kind = ?rec.kind, quantity = rec.recommended_quantity, "recommendation");
        recommendations.push(rec);
    }

    recommendations.sort_by(|a, b| {
        a.kind
            .cmp(&b.kind)
            .then_with(|| match a.kind {
                RecommendationKind::ReorderNeeded => a.days_to_stockout.cmp_soonest(&b.days_to_stockout),
                RecommendationKind::SlowMoving => b.idle_days.cmp(&a.idle_days),
                RecommendationKind::Normal => core::cmp::Ordering::Equal,
            })
            .then_with(|| a.item_id.cmp(&b.item_id))
    });

    let categories = summarize_categories(snapshot, &items, &recommendations, config)?;

    info!(
        recommendations = recommendations.len(),
        reorders = recommendations
            .iter()
            .filter(|r| r.kind == RecommendationKind::ReorderNeeded)
            .count(),
        slow_movers = recommendations
            .iter()
            .filter(|r| r.kind == RecommendationKind::SlowMoving)
            .count(),
        skipped = failures.len(),
        "recommendation batch complete"
    );

    Ok(RecommendationReport {
        generated_at: snapshot.as_of(),
        scope,
        recommendations,
        categories,
        failures,
    })
}
