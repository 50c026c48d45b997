//! Single-source least-cost routing (Dijkstra) over a distribution network.
//!
//! Labels compare by (objective weight, hops); among equal labels the
//! lexically smaller predecessor wins, so results are fully deterministic.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, BinaryHeap};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use stockflow_core::{EngineError, EngineResult, NodeId};

use crate::graph::{Network, NodeKind, RouteEdge};

const WEIGHT_TOLERANCE: f64 = 1e-9;

/// Weights within a relative `WEIGHT_TOLERANCE` of each other are equal.
fn same_weight(a: f64, b: f64) -> bool {
    let scale = a.abs().max(b.abs()).max(1.0);
    (a - b).abs() <= WEIGHT_TOLERANCE * scale
}

/// What a route minimises.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteObjective {
    /// Monetary cost (distance × unit cost).
    Cost,
    /// Transit time.
    Time,
    /// `cost_weight × cost + time_weight × time`; weights sum to 1.
    Blended { cost_weight: f64, time_weight: f64 },
}

impl Default for RouteObjective {
    fn default() -> Self {
        RouteObjective::Blended {
            cost_weight: 0.7,
            time_weight: 0.3,
        }
    }
}

impl RouteObjective {
    pub fn validate(&self) -> EngineResult<()> {
        let RouteObjective::Blended {
            cost_weight,
            time_weight,
        } = *self
        else {
            return Ok(());
        };
        for (name, value) in [("cost_weight", cost_weight), ("time_weight", time_weight)] {
            if !(value.is_finite() && value >= 0.0) {
                return Err(EngineError::invalid_configuration(format!(
                    "route {name} must be a finite non-negative number (got {value})"
                )));
            }
        }
        if (cost_weight + time_weight - 1.0).abs() > 1e-6 {
            return Err(EngineError::invalid_configuration(format!(
                "route blend weights must sum to 1 (got {})",
                cost_weight + time_weight
            )));
        }
        Ok(())
    }

    /// Weight of one edge under this objective.
    pub fn weight(&self, edge: &RouteEdge) -> f64 {
        match *self {
            RouteObjective::Cost => edge.cost(),
            RouteObjective::Time => edge.transit_hours,
            RouteObjective::Blended {
                cost_weight,
                time_weight,
            } => cost_weight * edge.cost() + time_weight * edge.transit_hours,
        }
    }
}

/// Optimal path from a source to one destination.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Route {
    pub source: NodeId,
    pub destination: NodeId,
    /// Source first, destination last.
    pub path: Vec<NodeId>,
    /// Objective value of the path.
    pub weight: f64,
    pub total_cost: f64,
    pub total_distance_km: f64,
    pub total_transit_hours: f64,
}

impl Route {
    pub fn hops(&self) -> usize {
        self.path.len().saturating_sub(1)
    }
}

/// A node a computation could not resolve, with the reason.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteFailure {
    pub node: NodeId,
    pub reason: EngineError,
}

/// Routes from one source to every market in the network.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutePlan {
    pub source: NodeId,
    pub objective: RouteObjective,
    /// In destination id order.
    pub routes: Vec<Route>,
    /// Markets with no path from the source.
    pub unreachable: Vec<RouteFailure>,
}

impl RoutePlan {
    pub fn route_to(&self, destination: &NodeId) -> Option<&Route> {
        self.routes.iter().find(|r| r.destination == *destination)
    }
}

#[derive(Debug, Clone)]
struct Label<'a> {
    weight: f64,
    hops: usize,
    via: Option<&'a RouteEdge>,
}

impl Label<'_> {
    fn predecessor(&self) -> Option<&NodeId> {
        self.via.map(|e| &e.from)
    }

    /// Strictly better than `other` after tolerance and tie-breaks.
    fn beats(&self, other: &Label<'_>) -> bool {
        if !same_weight(self.weight, other.weight) {
            return self.weight < other.weight;
        }
        match self.hops.cmp(&other.hops) {
            Ordering::Less => true,
            Ordering::Greater => false,
            Ordering::Equal => self.predecessor() < other.predecessor(),
        }
    }
}

/// Frontier entry; the heap pops the lightest label first.
#[derive(Debug)]
struct QueueEntry<'a> {
    weight: f64,
    hops: usize,
    node: &'a NodeId,
}

impl PartialEq for QueueEntry<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for QueueEntry<'_> {}

impl PartialOrd for QueueEntry<'_> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueueEntry<'_> {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed: BinaryHeap is a max-heap.
        other
            .weight
            .total_cmp(&self.weight)
            .then_with(|| other.hops.cmp(&self.hops))
            .then_with(|| other.node.cmp(self.node))
    }
}

/// Outcome of one Dijkstra run.
struct Settled<'a> {
    /// Best label of every node reachable from the source.
    labels: BTreeMap<&'a NodeId, Label<'a>>,
    /// Nodes whose outgoing edges were relaxed; each at most once.
    expanded: usize,
}

fn settle<'a>(network: &'a Network, source: &'a NodeId, objective: &RouteObjective) -> Settled<'a> {
    let mut labels: BTreeMap<&NodeId, Label> = BTreeMap::new();
    let mut done: BTreeSet<&NodeId> = BTreeSet::new();
    let mut heap = BinaryHeap::new();

    labels.insert(
        source,
        Label {
            weight: 0.0,
            hops: 0,
            via: None,
        },
    );
    heap.push(QueueEntry {
        weight: 0.0,
        hops: 0,
        node: source,
    });

    while let Some(QueueEntry { node, .. }) = heap.pop() {
        // First pop settles the node. Its label can differ from the entry within tolerance.
        if !done.insert(node) {
            continue;
        }
        let Some((weight, hops)) = labels.get(node).map(|best| (best.weight, best.hops)) else {
            continue;
        };

        for edge in network.edges_from(node) {
            let candidate = Label {
                weight: weight + objective.weight(edge),
                hops: hops + 1,
                via: Some(edge),
            };
            let improves = labels.get(&edge.to).is_none_or(|current| candidate.beats(current));
            if improves {
                heap.push(QueueEntry {
                    weight: candidate.weight,
                    hops: candidate.hops,
                    node: &edge.to,
                });
                labels.insert(&edge.to, candidate);
            }
        }
    }

    debug!(%source, settled = done.len(), "search complete");
    Settled {
        labels,
        expanded: done.len(),
    }
}

fn build_route(labels: &BTreeMap<&NodeId, Label<'_>>, source: &NodeId, destination: &NodeId) -> Option<Route> {
    let mut label = labels.get(destination)?;
    let weight = label.weight;
    let mut path = vec![destination.clone()];
    let (mut cost, mut distance, mut hours) = (0.0, 0.0, 0.0);

    while let Some(edge) = label.via {
        cost += edge.cost();
        distance += edge.distance_km;
        hours += edge.transit_hours;
        path.push(edge.from.clone());
        label = labels.get(&edge.from)?;
    }
    path.reverse();

    Some(Route {
        source: source.clone(),
        destination: destination.clone(),
        path,
        weight,
        total_cost: cost,
        total_distance_km: distance,
        total_transit_hours: hours,
    })
}

fn check_inputs(network: &Network, source: &NodeId, objective: &RouteObjective) -> EngineResult<()> {
    objective.validate()?;
    if !network.contains(source) {
        return Err(EngineError::UnknownNode(source.clone()));
    }
    Ok(())
}

/// Least-weight route from `source` to every market.
///
/// Unreachable markets are reported as `NoRouteFound` next to the routes
/// that did resolve.
pub fn shortest_routes(network: &Network, source: &NodeId, objective: &RouteObjective) -> EngineResult<RoutePlan> {
    check_inputs(network, source, objective)?;
    let labels = settle(network, source, objective).labels;

    let mut routes = Vec::new();
    let mut unreachable = Vec::new();
    for market in network.nodes_of_kind(NodeKind::Market) {
        if market.id == *source {
            continue;
        }
        match build_route(&labels, source, &market.id) {
            Some(route) => {
                debug!(%source, destination = %market.id, weight = route.weight, hops = route.hops(), "route resolved");
                routes.push(route);
            }
            None => {
                warn!(%source, destination = %market.id, "no route found");
                unreachable.push(RouteFailure {
                    node: market.id.clone(),
                    reason: EngineError::no_route(source.clone(), market.id.clone()),
                });
            }
        }
    }

    info!(
        %source,
        routes = routes.len(),
        unreachable = unreachable.len(),
        "route plan complete"
    );

    Ok(RoutePlan {
        source: source.clone(),
        objective: *objective,
        routes,
        unreachable,
    })
}

/// Least-weight route between two nodes of any kind.
pub fn shortest_path(
    network: &Network,
    source: &NodeId,
    destination: &NodeId,
    objective: &RouteObjective,
) -> EngineResult<Route> {
    check_inputs(network, source, objective)?;
    if !network.contains(destination) {
        return Err(EngineError::UnknownNode(destination.clone()));
    }
    let labels = settle(network, source, objective).labels;
    build_route(&labels, source, destination)
        .ok_or_else(|| EngineError::no_route(source.clone(), destination.clone()))
}

/// Warehouse with the least-weight route to `market`.
///
/// Ties go to the route with fewer hops, then the smaller warehouse id.
/// `Ok(None)` when no warehouse can reach the market.
pub fn best_source(network: &Network, market: &NodeId, objective: &RouteObjective) -> EngineResult<Option<Route>> {
    objective.validate()?;
    if !network.contains(market) {
        return Err(EngineError::UnknownNode(market.clone()));
    }

    let mut best: Option<Route> = None;
    for warehouse in network.nodes_of_kind(NodeKind::Warehouse) {
        let labels = settle(network, &warehouse.id, objective).labels;
        let Some(route) = build_route(&labels, &warehouse.id, market) else {
            continue;
        };
        let better = best.as_ref().is_none_or(|current| {
            if same_weight(route.weight, current.weight) {
                route.hops() < current.hops()
            } else {
                route.weight < current.weight
            }
        });
        if better {
            best = Some(route);
        }
    }

    match &best {
        Some(route) => debug!(%market, source = %route.source, weight = route.weight, "best source selected"),
        None => warn!(%market, "no warehouse can reach market"),
    }
    Ok(best)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{RouteNode, TransportCostModel};

    fn id(code: &str) -> NodeId {
        NodeId::new(code)
    }

    /// Edge whose cost equals `cost` (1 km at `cost` per km).
    fn leg(from: &str, to: &str, cost: f64, hours: f64) -> RouteEdge {
        RouteEdge::new(from, to, 1.0, cost, hours)
    }

    fn diamond() -> Network {
        let mut network = Network::new();
        network.add_node(RouteNode::warehouse("A")).unwrap();
        network.add_node(RouteNode::hub("B")).unwrap();
        network.add_node(RouteNode::hub("C")).unwrap();
        network.add_node(RouteNode::market("D")).unwrap();
        network.add_edge(leg("A", "B", 2.0, 5.0)).unwrap();
        network.add_edge(leg("B", "D", 3.0, 5.0)).unwrap();
        network.add_edge(leg("A", "C", 10.0, 1.0)).unwrap();
        network.add_edge(leg("C", "D", 1.0, 1.0)).unwrap();
        network
    }

    #[test]
    fn cheapest_path_beats_fewer_expensive_legs() {
        let plan = shortest_routes(&diamond(), &id("A"), &RouteObjective::Cost).unwrap();
        let route = plan.route_to(&id("D")).unwrap();
        assert_eq!(route.path, vec![id("A"), id("B"), id("D")]);
        assert_eq!(route.total_cost, 5.0);
        assert_eq!(route.hops(), 2);
        assert!(plan.unreachable.is_empty());
    }

    #[test]
    fn time_objective_prefers_fast_legs() {
        let route = shortest_path(&diamond(), &id("A"), &id("D"), &RouteObjective::Time).unwrap();
        assert_eq!(route.path, vec![id("A"), id("C"), id("D")]);
        assert_eq!(route.total_transit_hours, 2.0);
        assert_eq!(route.total_cost, 11.0);
    }

    #[test]
    fn blended_objective_weighs_cost_and_time() {
        // A-B-D: 0.7*5 + 0.3*10 = 6.5; A-C-D: 0.7*11 + 0.3*2 = 8.3.
        let route = shortest_path(&diamond(), &id("A"), &id("D"), &RouteObjective::default()).unwrap();
        assert_eq!(route.path, vec![id("A"), id("B"), id("D")]);
        assert!((route.weight - 6.5).abs() < 1e-9);
    }

    #[test]
    fn equal_cost_prefers_fewer_hops_then_smaller_predecessor() {
        let mut network = Network::new();
        for node in ["S", "X", "Y", "Z"] {
            network.add_node(RouteNode::hub(node)).unwrap();
        }
        network.add_node(RouteNode::market("T")).unwrap();
        network.add_edge(leg("S", "Z", 2.0, 0.0)).unwrap();
        network.add_edge(leg("Z", "T", 2.0, 0.0)).unwrap();
        network.add_edge(leg("S", "Y", 2.0, 0.0)).unwrap();
        network.add_edge(leg("Y", "T", 2.0, 0.0)).unwrap();
        network.add_edge(leg("S", "X", 1.0, 0.0)).unwrap();
        network.add_edge(leg("X", "Y", 1.0, 0.0)).unwrap();

        let route = shortest_path(&network, &id("S"), &id("T"), &RouteObjective::Cost).unwrap();
        assert_eq!(route.path, vec![id("S"), id("Y"), id("T")]);
    }

    #[test]
    fn near_equal_weights_settle_each_node_once() {
        let mut network = Network::new();
        network.add_node(RouteNode::warehouse("S")).unwrap();
        for node in ["K", "M", "T"] {
            network.add_node(RouteNode::hub(node)).unwrap();
        }
        network.add_node(RouteNode::market("U")).unwrap();
        network.add_edge(leg("S", "M", 0.3, 0.0)).unwrap();
        network.add_edge(leg("S", "K", 0.1 + 0.2, 0.0)).unwrap();
        network.add_edge(leg("M", "T", 0.1, 0.0)).unwrap();
        network.add_edge(leg("K", "T", 0.1, 0.0)).unwrap();
        network.add_edge(leg("T", "U", 1.0, 0.0)).unwrap();

        let source = id("S");
        let settled = settle(&network, &source, &RouteObjective::Cost);
        assert_eq!(settled.expanded, 5);
        assert_eq!(settled.labels.len(), 5);

        let route = shortest_path(&network, &id("S"), &id("U"), &RouteObjective::Cost).unwrap();
        assert_eq!(route.path, vec![id("S"), id("K"), id("T"), id("U")]);
    }

    #[test]
    fn unreachable_market_is_reported_not_fatal() {
        let mut network = diamond();
        network.add_node(RouteNode::market("E")).unwrap();

        let plan = shortest_routes(&network, &id("A"), &RouteObjective::Cost).unwrap();
        assert_eq!(plan.routes.len(), 1);
        assert_eq!(
            plan.unreachable,
            vec![RouteFailure {
                node: id("E"),
                reason: EngineError::no_route(id("A"), id("E")),
            }]
        );
        assert_eq!(
            shortest_path(&network, &id("A"), &id("E"), &RouteObjective::Cost),
            Err(EngineError::no_route(id("A"), id("E")))
        );
    }

    #[test]
    fn unknown_source_and_bad_blend_are_rejected() {
        assert_eq!(
            shortest_routes(&diamond(), &id("Q"), &RouteObjective::Cost),
            Err(EngineError::UnknownNode(id("Q")))
        );
        let lopsided = RouteObjective::Blended {
            cost_weight: 0.9,
            time_weight: 0.3,
        };
        assert!(matches!(
            shortest_routes(&diamond(), &id("A"), &lopsided),
            Err(EngineError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn best_source_picks_cheapest_warehouse() {
        let model = TransportCostModel::default();
        let mut network = Network::new();
        network.add_node(RouteNode::warehouse("WH-EAST")).unwrap();
        network.add_node(RouteNode::warehouse("WH-WEST")).unwrap();
        network.add_node(RouteNode::warehouse("WH-ISLAND")).unwrap();
        network.add_node(RouteNode::market("MK")).unwrap();
        network.add_bidirectional(model.edge("WH-EAST", "MK", 12.0)).unwrap();
        network.add_bidirectional(model.edge("WH-WEST", "MK", 7.5)).unwrap();

        let route = best_source(&network, &id("MK"), &RouteObjective::Cost).unwrap().unwrap();
        assert_eq!(route.source, id("WH-WEST"));
        assert!((route.total_distance_km - 7.5).abs() < 1e-9);

        let mut isolated = Network::new();
        isolated.add_node(RouteNode::warehouse("WH")).unwrap();
        isolated.add_node(RouteNode::market("MK")).unwrap();
        assert_eq!(best_source(&isolated, &id("MK"), &RouteObjective::Cost).unwrap(), None);
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        fn arb_network() -> impl Strategy<Value = Network> {
            proptest::collection::vec((0usize..8, 0usize..8, 0u32..20, 0u32..10), 0..30).prop_map(|legs| {
                let mut network = Network::new();
                network.add_node(RouteNode::warehouse("N0")).unwrap();
                for n in 1..8 {
                    network.add_node(RouteNode::market(format!("N{n}").as_str())).unwrap();
                }
                for (from, to, cost, hours) in legs {
                    let edge = leg(&format!("N{from}"), &format!("N{to}"), cost as f64, hours as f64);
                    network.add_edge(edge).unwrap();
                }
                network
            })
        }

        proptest! {
            /// Property: repeated runs over the same network return identical plans.
            #[test]
            fn routing_is_deterministic(network in arb_network()) {
                let first = shortest_routes(&network, &id("N0"), &RouteObjective::default()).unwrap();
                let second = shortest_routes(&network.clone(), &id("N0"), &RouteObjective::default()).unwrap();
                prop_assert_eq!(&first, &second);
                prop_assert_eq!(first.routes.len() + first.unreachable.len(), 7);
            }

            /// Property: every reachable node is expanded exactly once.
            #[test]
            fn each_node_is_expanded_once(network in arb_network()) {
                let source = id("N0");
                let settled = settle(&network, &source, &RouteObjective::default());
                prop_assert_eq!(settled.expanded, settled.labels.len());
            }

            /// Property: on a simple chain the only path is the one returned.
            #[test]
            fn single_path_is_returned(costs in proptest::collection::vec(0u32..50, 1..7)) {
                let mut network = Network::new();
                network.add_node(RouteNode::warehouse("N0")).unwrap();
                for n in 1..=costs.len() {
                    network.add_node(RouteNode::hub(format!("N{n}").as_str())).unwrap();
                }
                for (n, cost) in costs.iter().enumerate() {
                    network.add_edge(leg(&format!("N{n}"), &format!("N{}", n + 1), *cost as f64, 1.0)).unwrap();
                }
                let last = id(&format!("N{}", costs.len()));

                let route = shortest_path(&network, &id("N0"), &last, &RouteObjective::Cost).unwrap();
                prop_assert_eq!(route.hops(), costs.len());
                let total: u32 = costs.iter().sum();
                prop_assert_eq!(route.total_cost, total as f64);
            }
        }
    }
}
