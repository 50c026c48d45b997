//! Delivery efficiency: actual delivery cost against the optimal route cost.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use stockflow_core::{EngineError, EngineResult, NodeId};

use crate::graph::Network;
use crate::optimizer::{RouteFailure, RouteObjective, shortest_path};

/// One completed delivery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliveryRecord {
    pub source: NodeId,
    pub destination: NodeId,
    pub actual_cost: f64,
}

impl DeliveryRecord {
    pub fn new(source: impl Into<NodeId>, destination: impl Into<NodeId>, actual_cost: f64) -> Self {
        Self {
            source: source.into(),
            destination: destination.into(),
            actual_cost,
        }
    }
}

/// Aggregate of all deliveries over one (source, destination) pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteEfficiency {
    pub source: NodeId,
    pub destination: NodeId,
    pub trips: usize,
    pub actual_cost: f64,
    /// Optimal route cost × trips.
    pub optimal_cost: f64,
    /// optimal / actual; 1.0 when nothing was spent.
    pub efficiency_ratio: f64,
    /// actual − optimal; negative when deliveries beat the computed optimum.
    pub savings: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EfficiencyReport {
    pub objective: RouteObjective,
    /// In (source, destination) order.
    pub routes: Vec<RouteEfficiency>,
    pub total_actual_cost: f64,
    pub total_optimal_cost: f64,
    pub total_potential_savings: f64,
    pub overall_efficiency: f64,
    /// Deliveries that could not be priced, keyed by destination.
    pub failures: Vec<RouteFailure>,
}

fn ratio(optimal: f64, actual: f64) -> f64 {
    if actual > 0.0 { optimal / actual } else { 1.0 }
}

/// Compare a batch of deliveries against optimal routes under `objective`.
///
/// The optimal cost of a pair is the monetary cost of the route the objective
/// selects. Deliveries between unknown or disconnected nodes are reported as
/// failures; the rest of the batch still resolves.
pub fn delivery_efficiency(
    network: &Network,
    deliveries: &[DeliveryRecord],
    objective: &RouteObjective,
) -> EngineResult<EfficiencyReport> {
    objective.validate()?;

    let mut pairs: BTreeMap<(&NodeId, &NodeId), (usize, f64)> = BTreeMap::new();
    let mut failures = Vec::new();

    for delivery in deliveries {
        if !(delivery.actual_cost.is_finite() && delivery.actual_cost >= 0.0) {
            failures.push(RouteFailure {
                node: delivery.destination.clone(),
                reason: EngineError::validation(format!(
                    "delivery {} -> {} has invalid cost {}",
                    delivery.source, delivery.destination, delivery.actual_cost
                )),
            });
            continue;
        }
        let (trips, actual) = pairs
            .entry((&delivery.source, &delivery.destination))
            .or_insert((0, 0.0));
        *trips += 1;
        *actual += delivery.actual_cost;
    }

    let mut routes = Vec::with_capacity(pairs.len());
    for ((source, destination), (trips, actual_cost)) in pairs {
        let route = match shortest_path(network, source, destination, objective) {
            Ok(route) => route,
            Err(e @ (EngineError::NoRouteFound { .. } | EngineError::UnknownNode(_))) => {
                warn!(%source, %destination, error = %e, "delivery cannot be priced");
                failures.extend((0..trips).map(|_| RouteFailure {
                    node: destination.clone(),
                    reason: e.clone(),
                }));
                continue;
            }
            Err(e) => return Err(e),
        };

        let optimal_cost = route.total_cost * trips as f64;
        routes.push(RouteEfficiency {
            source: source.clone(),
            destination: destination.clone(),
            trips,
            actual_cost,
            optimal_cost,
            efficiency_ratio: ratio(optimal_cost, actual_cost),
            savings: actual_cost - optimal_cost,
        });
    }

    let total_actual_cost: f64 = routes.iter().map(|r| r.actual_cost).sum();
    let total_optimal_cost: f64 = routes.iter().map(|r| r.optimal_cost).sum();
    let total_potential_savings: f64 = routes.iter().map(|r| r.savings).sum();

    info!(
        pairs = routes.len(),
        total_potential_savings,
        failures = failures.len(),
        "delivery efficiency computed"
    );

    Ok(EfficiencyReport {
        objective: *objective,
        routes,
        total_actual_cost,
        total_optimal_cost,
        total_potential_savings,
        overall_efficiency: ratio(total_optimal_cost, total_actual_cost),
        failures,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{RouteEdge, RouteNode};

    fn network() -> Network {
        let mut network = Network::new();
        network.add_node(RouteNode::warehouse("WH")).unwrap();
        network.add_node(RouteNode::market("MK-1")).unwrap();
        network.add_node(RouteNode::market("MK-2")).unwrap();
        network.add_node(RouteNode::market("MK-3")).unwrap();
        network.add_edge(RouteEdge::new("WH", "MK-1", 10.0, 5.0, 1.0)).unwrap();
        network.add_edge(RouteEdge::new("WH", "MK-2", 4.0, 5.0, 1.0)).unwrap();
        network
    }

    #[test]
    fn groups_deliveries_per_pair() {
        let deliveries = vec![
            DeliveryRecord::new("WH", "MK-1", 60.0),
            DeliveryRecord::new("WH", "MK-1", 40.0),
            DeliveryRecord::new("WH", "MK-2", 20.0),
        ];
        let report = delivery_efficiency(&network(), &deliveries, &RouteObjective::Cost).unwrap();

        assert_eq!(report.routes.len(), 2);
        let first = &report.routes[0];
        assert_eq!(first.destination, NodeId::new("MK-1"));
        assert_eq!(first.trips, 2);
        assert_eq!(first.actual_cost, 100.0);
        assert_eq!(first.optimal_cost, 100.0);
        assert_eq!(first.efficiency_ratio, 1.0);
        assert_eq!(first.savings, 0.0);

        assert_eq!(report.total_actual_cost, 120.0);
        assert_eq!(report.total_potential_savings, 0.0);
        assert!(report.failures.is_empty());
    }

    #[test]
    fn overspend_shows_as_savings() {
        let deliveries = vec![DeliveryRecord::new("WH", "MK-2", 40.0)];
        let report = delivery_efficiency(&network(), &deliveries, &RouteObjective::Cost).unwrap();
        assert_eq!(report.routes[0].efficiency_ratio, 0.5);
        assert_eq!(report.total_potential_savings, 20.0);
        assert_eq!(report.overall_efficiency, 0.5);
    }

    #[test]
    fn zero_spend_is_fully_efficient() {
        let deliveries = vec![DeliveryRecord::new("WH", "WH", 0.0)];
        let report = delivery_efficiency(&network(), &deliveries, &RouteObjective::Cost).unwrap();
        assert_eq!(report.routes[0].efficiency_ratio, 1.0);
        assert_eq!(report.overall_efficiency, 1.0);
    }

    #[test]
    fn unreachable_and_unknown_destinations_are_failures() {
        let deliveries = vec![
            DeliveryRecord::new("WH", "MK-3", 10.0),
            DeliveryRecord::new("WH", "MK-9", 10.0),
            DeliveryRecord::new("WH", "MK-2", 20.0),
            DeliveryRecord::new("WH", "MK-2", f64::NAN),
        ];
        let report = delivery_efficiency(&network(), &deliveries, &RouteObjective::Cost).unwrap();

        assert_eq!(report.routes.len(), 1);
        assert_eq!(report.failures.len(), 3);
        assert!(matches!(report.failures[0].reason, EngineError::Validation(_)));
        assert_eq!(
            report.failures[1].reason,
            EngineError::no_route(NodeId::new("WH"), NodeId::new("MK-3"))
        );
        assert_eq!(report.failures[2].reason, EngineError::UnknownNode(NodeId::new("MK-9")));
    }
}
