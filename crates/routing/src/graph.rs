//! Distribution network: warehouses, hubs and markets joined by directed edges.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use stockflow_core::{EngineError, EngineResult, NodeId};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Warehouse,
    Hub,
    Market,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteNode {
    pub id: NodeId,
    pub kind: NodeKind,
    #[serde(default)]
    pub name: String,
}

impl RouteNode {
    pub fn new(id: impl Into<NodeId>, kind: NodeKind) -> Self {
        Self {
            id: id.into(),
            kind,
            name: String::new(),
        }
    }

    pub fn warehouse(id: impl Into<NodeId>) -> Self {
        Self::new(id, NodeKind::Warehouse)
    }

    pub fn hub(id: impl Into<NodeId>) -> Self {
        Self::new(id, NodeKind::Hub)
    }

    pub fn market(id: impl Into<NodeId>) -> Self {
        Self::new(id, NodeKind::Market)
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

/// A directed leg between two nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteEdge {
    pub from: NodeId,
    pub to: NodeId,
    pub distance_km: f64,
    /// Monetary cost per km.
    pub unit_cost: f64,
    pub transit_hours: f64,
}

impl RouteEdge {
    pub fn new(
        from: impl Into<NodeId>,
        to: impl Into<NodeId>,
        distance_km: f64,
        unit_cost: f64,
        transit_hours: f64,
    ) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            distance_km,
            unit_cost,
            transit_hours,
        }
    }

    /// Monetary cost of travelling the whole leg.
    pub fn cost(&self) -> f64 {
        self.distance_km * self.unit_cost
    }

    pub fn reversed(&self) -> Self {
        Self {
            from: self.to.clone(),
            to: self.from.clone(),
            ..self.clone()
        }
    }

    pub fn validate(&self) -> EngineResult<()> {
        for (name, value) in [
            ("distance_km", self.distance_km),
            ("unit_cost", self.unit_cost),
            ("transit_hours", self.transit_hours),
        ] {
            if !(value.is_finite() && value >= 0.0) {
                return Err(EngineError::validation(format!(
                    "edge {} -> {}: {name} must be a finite non-negative number (got {value})",
                    self.from, self.to
                )));
            }
        }
        Ok(())
    }
}

/// Derives edge cost and transit time from distance alone.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportCostModel {
    pub fuel_km_per_litre: f64,
    pub fuel_price_per_litre: f64,
    pub average_speed_kmh: f64,
    pub driver_cost_per_hour: f64,
}

impl Default for TransportCostModel {
    fn default() -> Self {
        Self {
            fuel_km_per_litre: 8.0,
            fuel_price_per_litre: 15_000.0,
            average_speed_kmh: 30.0,
            driver_cost_per_hour: 50_000.0,
        }
    }
}

impl TransportCostModel {
    pub fn validate(&self) -> EngineResult<()> {
        for (name, value) in [
            ("fuel_km_per_litre", self.fuel_km_per_litre),
            ("average_speed_kmh", self.average_speed_kmh),
        ] {
            if !(value.is_finite() && value > 0.0) {
                return Err(EngineError::invalid_configuration(format!(
                    "{name} must be a finite positive number (got {value})"
                )));
            }
        }
        for (name, value) in [
            ("fuel_price_per_litre", self.fuel_price_per_litre),
            ("driver_cost_per_hour", self.driver_cost_per_hour),
        ] {
            if !(value.is_finite() && value >= 0.0) {
                return Err(EngineError::invalid_configuration(format!(
                    "{name} must be a finite non-negative number (got {value})"
                )));
            }
        }
        Ok(())
    }

    /// Fuel plus driver time per km.
    pub fn cost_per_km(&self) -> f64 {
        self.fuel_price_per_litre / self.fuel_km_per_litre + self.driver_cost_per_hour / self.average_speed_kmh
    }

    pub fn transit_hours(&self, distance_km: f64) -> f64 {
        distance_km / self.average_speed_kmh
    }

    pub fn edge(&self, from: impl Into<NodeId>, to: impl Into<NodeId>, distance_km: f64) -> RouteEdge {
        RouteEdge::new(from, to, distance_km, self.cost_per_km(), self.transit_hours(distance_km))
    }
}

/// Directed weighted graph of route nodes.
///
/// Nodes are kept in id order and outgoing edges in insertion order, so every
/// traversal of the same network visits things in the same order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "NetworkRecords", into = "NetworkRecords")]
pub struct Network {
    nodes: BTreeMap<NodeId, RouteNode>,
    outgoing: BTreeMap<NodeId, Vec<RouteEdge>>,
}

/// Wire shape of a network: node and edge listings.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct NetworkRecords {
    nodes: Vec<RouteNode>,
    #[serde(default)]
    edges: Vec<RouteEdge>,
}

impl TryFrom<NetworkRecords> for Network {
    type Error = EngineError;

    fn try_from(value: NetworkRecords) -> Result<Self, Self::Error> {
        let mut network = Network::new();
        for node in value.nodes {
            network.add_node(node)?;
        }
        for edge in value.edges {
            network.add_edge(edge)?;
        }
        Ok(network)
    }
}

impl From<Network> for NetworkRecords {
    fn from(value: Network) -> Self {
        NetworkRecords {
            nodes: value.nodes.into_values().collect(),
            edges: value.outgoing.into_values().flatten().collect(),
        }
    }
}

impl Network {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_node(&mut self, node: RouteNode) -> EngineResult<()> {
        if self.nodes.contains_key(&node.id) {
            return Err(EngineError::validation(format!("duplicate node {}", node.id)));
        }
        self.outgoing.insert(node.id.clone(), Vec::new());
        self.nodes.insert(node.id.clone(), node);
        Ok(())
    }

    pub fn add_edge(&mut self, edge: RouteEdge) -> EngineResult<()> {
        edge.validate()?;
        if !self.nodes.contains_key(&edge.to) {
            return Err(EngineError::UnknownNode(edge.to));
        }
        match self.outgoing.get_mut(&edge.from) {
            Some(edges) => {
                edges.push(edge);
                Ok(())
            }
            None => Err(EngineError::UnknownNode(edge.from)),
        }
    }

    /// Add `edge` and its mirror image (symmetric cost and time).
    pub fn add_bidirectional(&mut self, edge: RouteEdge) -> EngineResult<()> {
        let back = edge.reversed();
        self.add_edge(edge)?;
        self.add_edge(back)
    }

    pub fn node(&self, id: &NodeId) -> Option<&RouteNode> {
        self.nodes.get(id)
    }

    pub fn contains(&self, id: &NodeId) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &RouteNode> {
        self.nodes.values()
    }

    pub fn nodes_of_kind(&self, kind: NodeKind) -> impl Iterator<Item = &RouteNode> {
        self.nodes.values().filter(move |n| n.kind == kind)
    }

    pub fn edges_from(&self, id: &NodeId) -> &[RouteEdge] {
        self.outgoing.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.outgoing.values().map(Vec::len).sum()
    }
}
