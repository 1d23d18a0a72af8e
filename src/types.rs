//! Core data model for BPMN diagrams.
//!
//! This module defines the diagram aggregate and its two entity kinds: typed,
//! positioned nodes and directed edges between them. The [`Diagram`] is the
//! sole owner of both collections; edges reference their endpoints by id and
//! each node carries a denormalized list of incident edge ids that the
//! diagram keeps symmetric.

use crate::error::DiagramError;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Unique identifier for diagram nodes.
pub type NodeId = Uuid;

/// Unique identifier for diagram edges.
pub type EdgeId = Uuid;

/// The supported BPMN element types.
///
/// Serialized as the lowercase type names carried by palette drag payloads
/// and persisted records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    /// Start/end event, drawn as an ellipse.
    Start,
    /// Task, drawn as a rounded rectangle.
    Task,
    /// Decision gateway, drawn as a diamond.
    Gateway,
}

impl NodeKind {
    /// All supported kinds, in palette order.
    pub const ALL: [NodeKind; 3] = [NodeKind::Start, NodeKind::Task, NodeKind::Gateway];

    /// The lowercase wire name of this kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::Start => "start",
            NodeKind::Task => "task",
            NodeKind::Gateway => "gateway",
        }
    }

    /// Human-readable label used in the palette and properties panel.
    pub fn label(&self) -> &'static str {
        match self {
            NodeKind::Start => "Start",
            NodeKind::Task => "Task",
            NodeKind::Gateway => "Gateway",
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NodeKind {
    type Err = DiagramError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "start" => Ok(NodeKind::Start),
            "task" => Ok(NodeKind::Task),
            "gateway" => Ok(NodeKind::Gateway),
            other => Err(DiagramError::InvalidElementType(other.to_string())),
        }
    }
}

/// A single diagram element: a typed, positioned shape with metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiagramNode {
    /// Unique identifier, assigned at creation and immutable thereafter.
    pub id: NodeId,
    /// The element type, fixed at creation.
    pub kind: NodeKind,
    /// User-displayable name.
    pub name: String,
    /// Free-text description.
    pub description: String,
    /// Center position on the canvas as (x, y) world coordinates.
    pub position: (f32, f32),
    /// Action key -> parameter pairs attached to this element.
    #[serde(default)]
    pub actions: BTreeMap<String, String>,
    /// Incident edge ids (both incoming and outgoing). Maintained by the
    /// owning [`Diagram`]; never contains duplicates.
    #[serde(default)]
    pub edges: Vec<EdgeId>,
}

impl DiagramNode {
    /// Creates a new node of the given kind at the given position, with a
    /// fresh unique id and the default display name.
    pub fn new(kind: NodeKind, position: (f32, f32)) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            name: crate::constants::DEFAULT_NODE_NAME.to_string(),
            description: String::new(),
            position,
            actions: BTreeMap::new(),
            edges: Vec::new(),
        }
    }

    fn link_edge(&mut self, edge_id: EdgeId) {
        if !self.edges.contains(&edge_id) {
            self.edges.push(edge_id);
        }
    }

    fn unlink_edge(&mut self, edge_id: &EdgeId) {
        self.edges.retain(|e| e != edge_id);
    }
}

/// A directed connection between two nodes.
///
/// Holds non-owning id references; both endpoints are guaranteed to resolve
/// to live nodes for as long as the edge is part of a [`Diagram`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiagramEdge {
    /// Unique identifier, distinct from its endpoints'.
    pub id: EdgeId,
    /// Id of the source node.
    pub source: NodeId,
    /// Id of the target node.
    pub target: NodeId,
}

impl DiagramEdge {
    /// Creates a new edge between two node ids with a fresh unique id.
    pub fn new(source: NodeId, target: NodeId) -> Self {
        Self {
            id: Uuid::new_v4(),
            source,
            target,
        }
    }

    /// The endpoint opposite to `node`, if `node` is one of the endpoints.
    pub fn other_endpoint(&self, node: &NodeId) -> Option<NodeId> {
        if self.source == *node {
            Some(self.target)
        } else if self.target == *node {
            Some(self.source)
        } else {
            None
        }
    }
}

/// The diagram aggregate: all nodes and edges currently open for editing.
///
/// All mutation goes through the methods here; invariant violations are
/// rejected locally (`bool`/`Option` returns plus a log line), never raised.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Diagram {
    /// Map of all nodes, indexed by id.
    pub nodes: HashMap<NodeId, DiagramNode>,
    /// All edges. Order is the rendering order.
    pub edges: Vec<DiagramEdge>,
}

impl Diagram {
    /// Creates a new empty diagram.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a node to the diagram and returns its id.
    pub fn add_node(&mut self, node: DiagramNode) -> NodeId {
        let id = node.id;
        self.nodes.insert(id, node);
        id
    }

    /// Removes a node and cascade-removes every edge incident to it.
    ///
    /// Returns `true` if the node was present. Removing an absent node is a
    /// no-op, not an error.
    pub fn remove_node(&mut self, node_id: &NodeId) -> bool {
        let Some(node) = self.nodes.remove(node_id) else {
            return false;
        };
        for edge_id in &node.edges {
            if let Some(idx) = self.edges.iter().position(|e| e.id == *edge_id) {
                let edge = self.edges.remove(idx);
                if let Some(other) = edge.other_endpoint(node_id) {
                    if let Some(other_node) = self.nodes.get_mut(&other) {
                        other_node.unlink_edge(edge_id);
                    }
                }
            }
        }
        log::debug!("removed node {} and {} incident edge(s)", node_id, node.edges.len());
        true
    }

    /// Updates a node's position. Returns `false` for unknown ids.
    ///
    /// Edge geometry is derived from node positions at paint time, so every
    /// incident edge reflects the move before the next repaint.
    pub fn move_node(&mut self, node_id: &NodeId, position: (f32, f32)) -> bool {
        match self.nodes.get_mut(node_id) {
            Some(node) => {
                node.position = position;
                true
            }
            None => false,
        }
    }

    /// Connects two nodes with a new directed edge.
    ///
    /// Returns `None` without mutating the diagram when the connection is
    /// rejected: self-loop, either endpoint not a live member of the diagram,
    /// or an identical (source, target) pair already present.
    pub fn connect(&mut self, source: NodeId, target: NodeId) -> Option<EdgeId> {
        let edge = DiagramEdge::new(source, target);
        let id = edge.id;
        if self.insert_edge(edge) {
            log::info!("connected {} -> {}", source, target);
            Some(id)
        } else {
            None
        }
    }

    /// Inserts a fully formed edge, validating the same invariants as
    /// [`Diagram::connect`]. Used by load-time resolution and undo restore.
    pub fn insert_edge(&mut self, edge: DiagramEdge) -> bool {
        if edge.source == edge.target {
            log::debug!("rejected self-loop on {}", edge.source);
            return false;
        }
        if !self.nodes.contains_key(&edge.source) || !self.nodes.contains_key(&edge.target) {
            log::debug!("rejected edge {} -> {}: endpoint not in diagram", edge.source, edge.target);
            return false;
        }
        if self
            .edges
            .iter()
            .any(|e| e.source == edge.source && e.target == edge.target)
        {
            log::debug!("rejected duplicate edge {} -> {}", edge.source, edge.target);
            return false;
        }

        if let Some(node) = self.nodes.get_mut(&edge.source) {
            node.link_edge(edge.id);
        }
        if let Some(node) = self.nodes.get_mut(&edge.target) {
            node.link_edge(edge.id);
        }
        self.edges.push(edge);
        true
    }

    /// Removes an edge and unlinks it from both endpoints' incident lists.
    ///
    /// Idempotent: returns `false` if the edge is not present.
    pub fn disconnect(&mut self, edge_id: &EdgeId) -> bool {
        let Some(idx) = self.edges.iter().position(|e| e.id == *edge_id) else {
            return false;
        };
        let edge = self.edges.remove(idx);
        if let Some(node) = self.nodes.get_mut(&edge.source) {
            node.unlink_edge(edge_id);
        }
        if let Some(node) = self.nodes.get_mut(&edge.target) {
            node.unlink_edge(edge_id);
        }
        true
    }

    /// Looks up an edge by id.
    pub fn edge(&self, edge_id: &EdgeId) -> Option<&DiagramEdge> {
        self.edges.iter().find(|e| e.id == *edge_id)
    }

    /// All edges incident to the given node, in insertion order.
    pub fn edges_of(&self, node_id: &NodeId) -> Vec<&DiagramEdge> {
        self.nodes
            .get(node_id)
            .map(|node| {
                node.edges
                    .iter()
                    .filter_map(|id| self.edge(id))
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_nodes(diagram: &mut Diagram) -> (NodeId, NodeId) {
        let a = diagram.add_node(DiagramNode::new(NodeKind::Start, (0.0, 0.0)));
        let b = diagram.add_node(DiagramNode::new(NodeKind::Task, (200.0, 0.0)));
        (a, b)
    }

    #[test]
    fn node_creation_defaults() {
        let node = DiagramNode::new(NodeKind::Task, (100.0, 200.0));
        assert_eq!(node.kind, NodeKind::Task);
        assert_eq!(node.name, crate::constants::DEFAULT_NODE_NAME);
        assert_eq!(node.position, (100.0, 200.0));
        assert!(node.description.is_empty());
        assert!(node.actions.is_empty());
        assert!(node.edges.is_empty());
        assert!(!node.id.is_nil());
    }

    #[test]
    fn node_ids_are_unique() {
        let mut diagram = Diagram::new();
        let mut ids = std::collections::HashSet::new();
        for kind in NodeKind::ALL {
            let id = diagram.add_node(DiagramNode::new(kind, (0.0, 0.0)));
            assert!(ids.insert(id));
        }
        assert_eq!(diagram.nodes.len(), 3);
    }

    #[test]
    fn kind_parsing() {
        assert_eq!("start".parse::<NodeKind>().unwrap(), NodeKind::Start);
        assert_eq!("task".parse::<NodeKind>().unwrap(), NodeKind::Task);
        assert_eq!("gateway".parse::<NodeKind>().unwrap(), NodeKind::Gateway);
        assert!(matches!(
            "getway".parse::<NodeKind>(),
            Err(DiagramError::InvalidElementType(name)) if name == "getway"
        ));
    }

    #[test]
    fn connect_links_both_incident_lists() {
        let mut diagram = Diagram::new();
        let (a, b) = two_nodes(&mut diagram);

        let edge_id = diagram.connect(a, b).expect("connect should succeed");

        let edge = diagram.edge(&edge_id).expect("edge should be live");
        assert_eq!(edge.source, a);
        assert_eq!(edge.target, b);
        assert_eq!(diagram.nodes[&a].edges, vec![edge_id]);
        assert_eq!(diagram.nodes[&b].edges, vec![edge_id]);
    }

    #[test]
    fn connect_rejects_self_loop() {
        let mut diagram = Diagram::new();
        let (a, _) = two_nodes(&mut diagram);

        assert!(diagram.connect(a, a).is_none());
        assert!(diagram.edges.is_empty());
        assert!(diagram.nodes[&a].edges.is_empty());
    }

    #[test]
    fn connect_rejects_unknown_endpoints() {
        let mut diagram = Diagram::new();
        let (a, _) = two_nodes(&mut diagram);
        let ghost = Uuid::new_v4();

        assert!(diagram.connect(a, ghost).is_none());
        assert!(diagram.connect(ghost, a).is_none());
        assert!(diagram.edges.is_empty());
    }

    #[test]
    fn connect_suppresses_duplicate_pairs() {
        let mut diagram = Diagram::new();
        let (a, b) = two_nodes(&mut diagram);

        assert!(diagram.connect(a, b).is_some());
        assert!(diagram.connect(a, b).is_none());
        assert_eq!(diagram.edges.len(), 1);
        assert_eq!(diagram.nodes[&a].edges.len(), 1);

        // The reverse direction is a distinct pair and stays allowed.
        assert!(diagram.connect(b, a).is_some());
        assert_eq!(diagram.edges.len(), 2);
    }

    #[test]
    fn remove_node_cascades_incident_edges() {
        let mut diagram = Diagram::new();
        let (a, b) = two_nodes(&mut diagram);
        let c = diagram.add_node(DiagramNode::new(NodeKind::Gateway, (400.0, 0.0)));

        diagram.connect(a, b).unwrap();
        diagram.connect(b, c).unwrap();
        diagram.connect(a, c).unwrap();
        assert_eq!(diagram.edges.len(), 3);

        assert!(diagram.remove_node(&b));

        assert_eq!(diagram.edges.len(), 1);
        assert_eq!(diagram.edges[0].source, a);
        assert_eq!(diagram.edges[0].target, c);
        // No surviving edge references the removed node, and the survivors'
        // incident lists are consistent.
        assert!(diagram.edges.iter().all(|e| e.source != b && e.target != b));
        assert_eq!(diagram.nodes[&a].edges.len(), 1);
        assert_eq!(diagram.nodes[&c].edges.len(), 1);
    }

    #[test]
    fn remove_node_is_idempotent() {
        let mut diagram = Diagram::new();
        let ghost = Uuid::new_v4();
        assert!(!diagram.remove_node(&ghost));

        let (a, _) = two_nodes(&mut diagram);
        assert!(diagram.remove_node(&a));
        assert!(!diagram.remove_node(&a));
    }

    #[test]
    fn disconnect_is_idempotent() {
        let mut diagram = Diagram::new();
        let (a, b) = two_nodes(&mut diagram);
        let edge_id = diagram.connect(a, b).unwrap();

        assert!(diagram.disconnect(&edge_id));
        assert!(!diagram.disconnect(&edge_id));
        assert!(diagram.edges.is_empty());
        assert!(diagram.nodes[&a].edges.is_empty());
        assert!(diagram.nodes[&b].edges.is_empty());
    }

    #[test]
    fn move_node_updates_position() {
        let mut diagram = Diagram::new();
        let (a, b) = two_nodes(&mut diagram);
        diagram.connect(a, b).unwrap();

        assert!(diagram.move_node(&a, (50.0, 75.0)));
        assert_eq!(diagram.nodes[&a].position, (50.0, 75.0));
        // The other endpoint's anchor is untouched.
        assert_eq!(diagram.nodes[&b].position, (200.0, 0.0));

        assert!(!diagram.move_node(&Uuid::new_v4(), (0.0, 0.0)));
    }

    #[test]
    fn edges_of_returns_incident_edges() {
        let mut diagram = Diagram::new();
        let (a, b) = two_nodes(&mut diagram);
        let c = diagram.add_node(DiagramNode::new(NodeKind::Gateway, (400.0, 0.0)));
        let ab = diagram.connect(a, b).unwrap();
        let ca = diagram.connect(c, a).unwrap();
        diagram.connect(b, c).unwrap();

        let incident: Vec<EdgeId> = diagram.edges_of(&a).iter().map(|e| e.id).collect();
        assert_eq!(incident, vec![ab, ca]);
        assert!(diagram.edges_of(&Uuid::new_v4()).is_empty());
    }
}
