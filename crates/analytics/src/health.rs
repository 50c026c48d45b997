//! Inventory health score.
//!
//! Composite of four sub-scores, each normalised to [0, 100]:
//! - availability: share of items with stock on hand;
//! - adequacy: share of items above their minimum;
//! - turnover: annualised consumption over average stock, scaled and capped at 100;
//! - activity: share of items that moved within the activity window.
//!
//! Scored system-wide (all items in scope as one pool) and per warehouse.

use serde::{Deserialize, Serialize};
use tracing::info;

use stockflow_core::{EngineResult, WarehouseId};
use stockflow_inventory::{Item, LedgerSnapshot};

use crate::alerts::{AlertSummary, classify_alerts};
use crate::config::{EngineConfig, HealthWeights, window_start};
use crate::consumption::observe_window;
use crate::report::ItemFailure;
use crate::scope::Scope;

const DAYS_PER_YEAR: f64 = 365.0;

/// Turnover inputs of a single item over the lookback window.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemTurnover {
    /// Daily consumption rate × 365.
    pub annualized_consumption: f64,
    /// (opening + current) / 2 for the window.
    pub average_stock: f64,
}

impl ItemTurnover {
    /// Stock turns per year; zero when nothing was held.
    pub fn rate(&self) -> f64 {
        if self.average_stock > 0.0 {
            self.annualized_consumption / self.average_stock
        } else {
            0.0
        }
    }
}

pub fn item_turnover(snapshot: &LedgerSnapshot, item: &Item, lookback_days: i64) -> EngineResult<ItemTurnover> {
    let window = observe_window(snapshot, item, lookback_days)?;
    let opening = snapshot.opening_quantity(item, window.start)?;
    Ok(ItemTurnover {
        annualized_consumption: window.daily_rate() * DAYS_PER_YEAR,
        average_stock: (opening as f64 + item.current_quantity as f64) / 2.0,
    })
}

/// Turnover of a pool of items: consumption value over average stock value.
///
/// An item without a positive unit cost is valued at 1 per unit, so in a
/// mixed pool its units count as if they cost 1 each. Give every item a unit
/// cost (or none at all) to keep the ratio in one currency.
pub fn pooled_turnover(snapshot: &LedgerSnapshot, items: &[&Item], lookback_days: i64) -> EngineResult<f64> {
    let mut consumed_value = 0.0;
    let mut stock_value = 0.0;
    for item in items {
        let weight = value_weight(item);
        let turnover = item_turnover(snapshot, item, lookback_days)?;
        consumed_value += turnover.annualized_consumption * weight;
        stock_value += turnover.average_stock * weight;
    }

    Ok(if stock_value > 0.0 {
        consumed_value / stock_value
    } else {
        0.0
    })
}

/// Unit value used by `pooled_turnover`.
fn value_weight(item: &Item) -> f64 {
    match item.unit_cost {
        Some(cost) if cost > 0.0 => cost,
        _ => 1.0,
    }
}

/// The four normalised sub-scores.
#[derive(Debug, Copy, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SubScores {
    pub availability: f64,
    pub adequacy: f64,
    pub turnover: f64,
    pub activity: f64,
}

impl SubScores {
    /// Weighted sum rounded to one decimal, clamped to [0, 100].
    pub fn compose(&self, weights: &HealthWeights) -> f64 {
        let raw = weights.availability * self.availability
            + weights.adequacy * self.adequacy
            + weights.turnover * self.turnover
            + weights.activity * self.activity;
        ((raw * 10.0).round() / 10.0).clamp(0.0, 100.0)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthBand {
    Excellent,
    Good,
    NeedsAttention,
    Poor,
}

impl HealthBand {
    pub fn from_score(score: f64) -> Self {
        if score >= 80.0 {
            HealthBand::Excellent
        } else if score >= 60.0 {
            HealthBand::Good
        } else if score >= 40.0 {
            HealthBand::NeedsAttention
        } else {
            HealthBand::Poor
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthScope {
    System,
    Warehouse(WarehouseId),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthScore {
    pub scope: HealthScope,
    pub composite: f64,
    pub band: HealthBand,
    pub sub_scores: SubScores,
    pub weights: HealthWeights,
    pub item_count: usize,
    pub alerts: AlertSummary,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthReport {
    pub generated_at: chrono::DateTime<chrono::Utc>,
    /// Score of every item in scope taken as one pool.
    pub overall: HealthScore,
    /// One score per warehouse in scope, in warehouse id order.
    pub warehouses: Vec<HealthScore>,
    /// Items whose consumption could not be estimated by the alert pass.
    pub failures: Vec<ItemFailure>,
}

/// Sub-scores of a pool of items. An empty pool scores zero everywhere.
pub fn score_items(snapshot: &LedgerSnapshot, items: &[&Item], config: &EngineConfig) -> EngineResult<SubScores> {
    if items.is_empty() {
        return Ok(SubScores::default());
    }

    let total = items.len() as f64;
    let share = |count: usize| count as f64 / total * 100.0;

    let in_stock = items.iter().filter(|i| i.current_quantity > 0).count();
    let adequate = items.iter().filter(|i| i.current_quantity > i.minimum_quantity).count();

    let activity_start = window_start(snapshot.as_of(), config.activity_window_days)?;
    let active = items
        .iter()
        .filter(|i| !snapshot.history_since(&i.id, activity_start).is_empty())
        .count();

    let turnover = pooled_turnover(snapshot, items, config.lookback_days)?;

    Ok(SubScores {
        availability: share(in_stock),
        adequacy: share(adequate),
        turnover: (turnover * config.turnover_scale).clamp(0.0, 100.0),
        activity: share(active),
    })
}

fn health_score(
    scope: HealthScope,
    snapshot: &LedgerSnapshot,
    items: &[&Item],
    alerts: AlertSummary,
    config: &EngineConfig,
) -> EngineResult<HealthScore> {
    let sub_scores = score_items(snapshot, items, config)?;
    let composite = sub_scores.compose(&config.health_weights);
    Ok(HealthScore {
        scope,
        composite,
        band: HealthBand::from_score(composite),
        sub_scores,
        weights: config.health_weights,
        item_count: items.len(),
        alerts,
    })
}

/// Score the items in `scope`, overall and per warehouse.
///
/// Alert summaries for each scope come from an alert scan over the same snapshot.
pub fn assess_health(
    snapshot: &LedgerSnapshot,
    scope: Scope,
    config: &EngineConfig,
) -> EngineResult<HealthReport> {
    let alert_report = classify_alerts(snapshot, scope, config)?;

    let pool: Vec<&Item> = scope.items(snapshot).collect();
    let overall_scope = match scope {
        Scope::All => HealthScope::System,
        Scope::Warehouse(w) => HealthScope::Warehouse(w),
    };
    let overall = health_score(overall_scope, snapshot, &pool, alert_report.summary, config)?;

    let warehouses = snapshot
        .warehouses()
        .into_iter()
        .filter(|w| scope.allows(*w))
        .map(|warehouse_id| {
            let items: Vec<&Item> = pool
                .iter()
                .copied()
                .filter(|i| i.warehouse_id == warehouse_id)
                .collect();
            let alerts = AlertSummary::from_alerts(alert_report.for_warehouse(warehouse_id));
            health_score(HealthScope::Warehouse(warehouse_id), snapshot, &items, alerts, config)
        })
        .collect::<EngineResult<Vec<_>>>()?;

    info!(
        composite = overall.composite,
        warehouses = warehouses.len(),
        items = overall.item_count,
        "health assessment complete"
    );

    Ok(HealthReport {
        generated_at: snapshot.as_of(),
        overall,
        warehouses,
        failures: alert_report.failures,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use stockflow_core::{EngineError, ItemId, TransactionId};
    use stockflow_inventory::InventoryTransaction;

    fn as_of() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap()
    }

    fn item(id: u128, warehouse: u128, quantity: i64, minimum: i64) -> Item {
        Item::new(ItemId::from_u128(id), WarehouseId::from_u128(warehouse), "grain", "kg")
            .with_quantity(quantity)
            .with_minimum(minimum)
    }

    fn tx(n: u128, item: &Item, delta: i64, days_ago: i64) -> InventoryTransaction {
        InventoryTransaction::new(
            TransactionId::from_u128(n),
            item.id,
            item.warehouse_id,
            delta,
            as_of() - Duration::days(days_ago),
        )
    }

    #[test]
    fn composite_is_the_rounded_weighted_sum() {
        let sub = SubScores {
            availability: 80.0,
            adequacy: 80.0,
            turnover: 60.0,
            activity: 100.0,
        };
        assert_eq!(sub.compose(&HealthWeights::default()), 78.0);
        assert_eq!(HealthBand::from_score(78.0), HealthBand::Good);
    }

    #[test]
    fn bands_follow_score_cutoffs() {
        assert_eq!(HealthBand::from_score(80.0), HealthBand::Excellent);
        assert_eq!(HealthBand::from_score(59.9), HealthBand::NeedsAttention);
        assert_eq!(HealthBand::from_score(39.9), HealthBand::Poor);
    }

    #[test]
    fn turnover_uses_average_of_opening_and_current_stock() {
        // 60 units consumed over 30 days -> 730 per year; stock 100 -> 40, average 70.
        let rice = item(1, 1, 40, 0);
        let snapshot = LedgerSnapshot::new(
            as_of(),
            vec![rice.clone()],
            vec![tx(1, &rice, 100, 60), tx(2, &rice, -60, 10)],
        )
        .unwrap();

        let turnover = item_turnover(&snapshot, &rice, 30).unwrap();
        assert!((turnover.annualized_consumption - 730.0).abs() < 1e-9);
        assert_eq!(turnover.average_stock, 70.0);
        assert!((turnover.rate() - 730.0 / 70.0).abs() < 1e-9);
    }

    #[test]
    fn pooled_turnover_is_value_weighted() {
        let cheap = item(1, 1, 50, 0).with_unit_cost(1.0);
        let dear = item(2, 1, 50, 0).with_unit_cost(9.0);
        let snapshot = LedgerSnapshot::new(
            as_of(),
            vec![cheap.clone(), dear.clone()],
            vec![tx(1, &cheap, 80, 60), tx(2, &cheap, -30, 5), tx(3, &dear, 50, 60)],
        )
        .unwrap();

        // cheap: 365 per year, average 65; dear: idle, average 50.
        let expected = (365.0 * 1.0) / (65.0 * 1.0 + 50.0 * 9.0);
        assert!((pooled_turnover(&snapshot, &[&cheap, &dear], 30).unwrap() - expected).abs() < 1e-9);
    }

    #[test]
    fn uncosted_items_count_at_unit_value() {
        let costed = item(1, 1, 20, 0).with_unit_cost(4.0);
        let uncosted = item(2, 1, 20, 0);
        let snapshot = LedgerSnapshot::new(
            as_of(),
            vec![costed.clone(), uncosted.clone()],
            vec![tx(1, &costed, 20, 60), tx(2, &uncosted, 50, 60), tx(3, &uncosted, -30, 5)],
        )
        .unwrap();

        // costed: idle, average 20 at 4 each; uncosted: 365 per year, average 35 at 1 each.
        let expected = 365.0 / (20.0 * 4.0 + 35.0);
        let pooled = pooled_turnover(&snapshot, &[&costed, &uncosted], 30).unwrap();
        assert!((pooled - expected).abs() < 1e-9);
    }

    #[test]
    fn oversized_activity_window_is_reported_not_panicking() {
        let rice = item(1, 1, 10, 0);
        let snapshot = LedgerSnapshot::new(as_of(), vec![rice.clone()], vec![tx(1, &rice, 10, 2)]).unwrap();
        let config = EngineConfig::default().with_activity_window_days(200_000_000);

        assert!(matches!(
            score_items(&snapshot, &[&rice], &config),
            Err(EngineError::InvalidConfiguration(_))
        ));
        assert!(matches!(
            assess_health(&snapshot, Scope::All, &config),
            Err(EngineError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn empty_pool_scores_zero() {
        let snapshot = LedgerSnapshot::new(as_of(), vec![], vec![]).unwrap();
        let report = assess_health(&snapshot, Scope::All, &EngineConfig::default()).unwrap();
        assert_eq!(report.overall.composite, 0.0);
        assert_eq!(report.overall.band, HealthBand::Poor);
        assert!(report.warehouses.is_empty());
    }

    #[test]
    fn scores_every_warehouse_and_the_system_pool() {
        let a = item(1, 1, 10, 5);
        let b = item(2, 2, 0, 5);
        let snapshot = LedgerSnapshot::new(
            as_of(),
            vec![a.clone(), b.clone()],
            vec![tx(1, &a, 10, 3), tx(2, &b, 4, 40), tx(3, &b, -4, 35)],
        )
        .unwrap();
        let report = assess_health(&snapshot, Scope::All, &EngineConfig::default()).unwrap();

        assert_eq!(report.overall.scope, HealthScope::System);
        assert_eq!(report.overall.item_count, 2);
        assert_eq!(report.overall.sub_scores.availability, 50.0);
        assert_eq!(report.overall.sub_scores.activity, 50.0);
        assert_eq!(report.overall.alerts.critical, 1);

        assert_eq!(report.warehouses.len(), 2);
        assert_eq!(report.warehouses[0].scope, HealthScope::Warehouse(WarehouseId::from_u128(1)));
        assert_eq!(report.warehouses[0].sub_scores.availability, 100.0);
        assert_eq!(report.warehouses[1].sub_scores.availability, 0.0);
        assert_eq!(report.warehouses[1].alerts.critical, 1);
    }

    #[test]
    fn invalid_weights_abort() {
        let snapshot = LedgerSnapshot::new(as_of(), vec![], vec![]).unwrap();
        let config = EngineConfig::default().with_health_weights(HealthWeights::new(0.4, 0.4, 0.4, 0.4));
        assert!(matches!(
            assess_health(&snapshot, Scope::All, &config),
            Err(EngineError::InvalidConfiguration(_))
        ));
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            /// Property: composite stays in [0, 100] and matches the weighted sum within 0.1.
            #[test]
            fn composite_matches_weighted_sum(
                availability in 0.0f64..=100.0,
                adequacy in 0.0f64..=100.0,
                turnover in 0.0f64..=100.0,
                activity in 0.0f64..=100.0,
                raw_weights in (0.0f64..1.0, 0.0f64..1.0, 0.0f64..1.0, 0.01f64..1.0),
            ) {
                let (a, b, c, d) = raw_weights;
                let total = a + b + c + d;
                let weights = HealthWeights::new(a / total, b / total, c / total, d / total);
                let sub = SubScores { availability, adequacy, turnover, activity };

                let composite = sub.compose(&weights);
                let exact = weights.availability * availability
                    + weights.adequacy * adequacy
                    + weights.turnover * turnover
                    + weights.activity * activity;

                prop_assert!((0.0..=100.0).contains(&composite));
                prop_assert!((composite - exact).abs() <= 0.1);
            }
        }
    }
}
