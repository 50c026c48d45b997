//! Alert classification: threshold rules over stock levels and projected stockout.
//!
//! Rule table, first match wins:
//!
//! | condition                                   | urgency  |
//! |---------------------------------------------|----------|
//! | quantity == 0                               | critical |
//! | days_to_stockout <= critical_days           | critical |
//! | quantity <= minimum && days <= high_days    | high     |
//! | quantity <= minimum                         | medium   |
//! | days_to_stockout <= low_days                | low      |
//! | otherwise                                   | no alert |

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use stockflow_core::{EngineResult, ItemId, WarehouseId};
use stockflow_inventory::{Item, LedgerSnapshot};

use crate::config::{EngineConfig, UrgencyThresholds};
use crate::consumption::{ConsumptionEstimate, DaysToStockout, estimate_consumption};
use crate::report::ItemFailure;
use crate::scope::Scope;

/// How soon an item is expected to run out. Declared most urgent first.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Urgency {
    Critical,
    High,
    Medium,
    Low,
}

/// A derived low-stock alert. Exists only as the output of one classification run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub item_id: ItemId,
    pub warehouse_id: WarehouseId,
    pub item_name: String,
    pub category: String,
    pub urgency: Urgency,
    /// `None` when consumption could not be estimated for the item.
    pub days_to_stockout: Option<DaysToStockout>,
    pub daily_consumption_rate: Option<f64>,
    pub current_quantity: i64,
    pub minimum_quantity: i64,
    pub stock_percentage: Option<f64>,
    pub generated_at: DateTime<Utc>,
}

/// Alert counts per urgency.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertSummary {
    pub critical: usize,
    pub high: usize,
    pub medium: usize,
    pub low: usize,
}

impl AlertSummary {
    pub fn from_alerts<'a>(alerts: impl IntoIterator<Item = &'a Alert>) -> Self {
        let mut summary = Self::default();
        for alert in alerts {
            match alert.urgency {
                Urgency::Critical => summary.critical += 1,
                Urgency::High => summary.high += 1,
                Urgency::Medium => summary.medium += 1,
                Urgency::Low => summary.low += 1,
            }
        }
        summary
    }

    pub fn total(&self) -> usize {
        self.critical + self.high + self.medium + self.low
    }
}

/// Output of one alert scan: alerts most urgent first, plus estimation failures.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertReport {
    pub generated_at: DateTime<Utc>,
    pub scope: Scope,
    pub alerts: Vec<Alert>,
    pub summary: AlertSummary,
    pub failures: Vec<ItemFailure>,
}

impl AlertReport {
    pub fn for_warehouse(&self, warehouse_id: WarehouseId) -> impl Iterator<Item = &Alert> + '_ {
        self.alerts
            .iter()
            .filter(move |a| a.warehouse_id == warehouse_id)
    }
}

/// Apply the rule table to one item.
///
/// `estimate` is `None` when consumption could not be estimated; only the
/// quantity-based rules can fire then.
pub fn classify_item(
    item: &Item,
    estimate: Option<&ConsumptionEstimate>,
    thresholds: &UrgencyThresholds,
) -> Option<Urgency> {
    let within = |limit: f64| estimate.is_some_and(|e| e.days_to_stockout.is_within(limit));

    if item.is_out_of_stock() {
        Some(Urgency::Critical)
    } else if within(thresholds.critical_days) {
        Some(Urgency::Critical)
    } else if item.is_at_or_below_minimum() && within(thresholds.high_days) {
        Some(Urgency::High)
    } else if item.is_at_or_below_minimum() {
        Some(Urgency::Medium)
    } else if within(thresholds.low_days) {
        Some(Urgency::Low)
    } else {
        None
    }
}

/// Classify every item in `scope` and return alerts ordered most urgent first.
///
/// Ordering: urgency, then soonest stockout (unknown/unbounded last), then item id.
pub fn classify_alerts(
    snapshot: &LedgerSnapshot,
    scope: Scope,
    config: &EngineConfig,
) -> EngineResult<AlertReport> {
    config.validate()?;

    let generated_at = snapshot.as_of();
    let mut alerts = Vec::new();
    let mut failures = Vec::new();

    for item in scope.items(snapshot) {
        let estimate = match estimate_consumption(snapshot, item, config.lookback_days) {
            Ok(estimate) => Some(estimate),
            Err(e) if e.is_recoverable() => {
                warn!(item = %item.id, error = %e, "consumption estimate unavailable; classifying on stock level only");
                failures.push(ItemFailure::new(item.id, e));
                None
            }
            Err(e) => return Err(e),
        };

        let Some(urgency) = classify_item(item, estimate.as_ref(), &config.urgency) else {
            continue;
        };
        debug!(item = %item.id, ?urgency, "alert raised");

        alerts.push(Alert {
            item_id: item.id,
            warehouse_id: item.warehouse_id,
            item_name: item.name.clone(),
            category: item.category.clone(),
            urgency,
            days_to_stockout: estimate.as_ref().map(|e| e.days_to_stockout),
            daily_consumption_rate: estimate.as_ref().map(|e| e.daily_consumption_rate),
            current_quantity: item.current_quantity,
            minimum_quantity: item.minimum_quantity,
            stock_percentage: item.stock_percentage(),
            generated_at,
        });
    }

    alerts.sort_by(|a, b| {
        a.urgency
            .cmp(&b.urgency)
            .then_with(|| cmp_days(a.days_to_stockout, b.days_to_stockout))
            .then_with(|| a.item_id.cmp(&b.item_id))
    });

    let summary = AlertSummary::from_alerts(&alerts);
    info!(
        alerts = alerts.len(),
        critical = summary.critical,
        high = summary.high,
        skipped = failures.len(),
        "alert scan complete"
    );

    Ok(AlertReport {
        generated_at,
        scope,
        alerts,
        summary,
        failures,
    })
}

fn cmp_days(a: Option<DaysToStockout>, b: Option<DaysToStockout>) -> core::cmp::Ordering {
    let a = a.unwrap_or(DaysToStockout::Unbounded);
    let b = b.unwrap_or(DaysToStockout::Unbounded);
    a.cmp_soonest(&b)
}
