//! `stockflow-routing`
//!
//! **Responsibility:** distribution routes from warehouses to markets.
//!
//! - `graph`: route network (nodes, directed edges) and the transport cost model.
//! - `optimizer`: least-cost / least-time / blended routing, best-source selection.
//! - `stats`: delivery efficiency against optimal routes.
//!
//! Independent of the inventory ledger: it only consumes the network and
//! per-route cost metadata supplied by the caller.

pub mod graph;
pub mod optimizer;
pub mod stats;

pub use graph::{Network, NodeKind, RouteEdge, RouteNode, TransportCostModel};
pub use optimizer::{
    Route, RouteFailure, RouteObjective, RoutePlan, best_source, shortest_path, shortest_routes,
};
pub use stats::{DeliveryRecord, EfficiencyReport, RouteEfficiency, delivery_efficiency};
