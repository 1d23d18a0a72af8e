//! Project-file serialization for diagrams.
//!
//! The on-disk format is versioned pretty-printed JSON with one flat record
//! per node and per edge. Loading is two-pass: all node records are
//! instantiated first (building the id map), then edge records are resolved
//! against it. A record that is malformed, references a missing node, or
//! violates a model invariant is skipped with a logged warning; only an
//! unreadable file or an unsupported version fails the load as a whole.

use crate::error::DiagramError;
use crate::types::{Diagram, DiagramEdge, DiagramNode, EdgeId, NodeId, NodeKind};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Current project-file format version.
pub const FORMAT_VERSION: u32 = 1;

/// Flat persisted form of a [`DiagramNode`].
#[derive(Debug, Serialize, Deserialize)]
struct NodeRecord {
    id: NodeId,
    kind: NodeKind,
    x: f32,
    y: f32,
    name: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    actions: BTreeMap<String, String>,
}

impl From<&DiagramNode> for NodeRecord {
    fn from(node: &DiagramNode) -> Self {
        Self {
            id: node.id,
            kind: node.kind,
            x: node.position.0,
            y: node.position.1,
            name: node.name.clone(),
            description: node.description.clone(),
            actions: node.actions.clone(),
        }
    }
}

impl From<NodeRecord> for DiagramNode {
    fn from(record: NodeRecord) -> Self {
        Self {
            id: record.id,
            kind: record.kind,
            name: record.name,
            description: record.description,
            position: (record.x, record.y),
            actions: record.actions,
            edges: Vec::new(),
        }
    }
}

/// Flat persisted form of a [`DiagramEdge`].
#[derive(Debug, Serialize, Deserialize)]
struct EdgeRecord {
    id: EdgeId,
    source: NodeId,
    target: NodeId,
}

/// The project file as written: a version tag plus flat record lists.
#[derive(Debug, Serialize)]
struct ProjectFile {
    version: u32,
    nodes: Vec<NodeRecord>,
    edges: Vec<EdgeRecord>,
}

/// The project file as read. Records are kept as raw JSON values so that a
/// single malformed record can be skipped instead of failing the whole parse.
#[derive(Debug, Deserialize)]
struct RawProjectFile {
    version: u32,
    #[serde(default)]
    nodes: Vec<serde_json::Value>,
    #[serde(default)]
    edges: Vec<serde_json::Value>,
}

impl Diagram {
    /// Serializes the diagram to the canonical JSON project-file form.
    pub fn to_json(&self) -> Result<String, DiagramError> {
        // Sort node records by id so saves of the same diagram are diffable.
        let mut nodes: Vec<NodeRecord> = self.nodes.values().map(NodeRecord::from).collect();
        nodes.sort_by_key(|r| r.id);
        let file = ProjectFile {
            version: FORMAT_VERSION,
            nodes,
            edges: self
                .edges
                .iter()
                .map(|e| EdgeRecord {
                    id: e.id,
                    source: e.source,
                    target: e.target,
                })
                .collect(),
        };
        Ok(serde_json::to_string_pretty(&file)?)
    }

    /// Deserializes a diagram from its JSON project-file form.
    ///
    /// Two passes: nodes first, then edges resolved through the freshly built
    /// node map. Skipped records are logged and counted, never fatal; an
    /// unparseable file or an unsupported version is.
    pub fn from_json(json: &str) -> Result<Self, DiagramError> {
        let raw: RawProjectFile = serde_json::from_str(json)?;
        if raw.version > FORMAT_VERSION {
            return Err(DiagramError::UnsupportedVersion(raw.version));
        }

        let mut diagram = Diagram::new();
        let mut skipped = 0usize;

        // Pass 1: instantiate nodes.
        for value in raw.nodes {
            let record: NodeRecord = match serde_json::from_value(value) {
                Ok(record) => record,
                Err(err) => {
                    log::warn!("{}", DiagramError::MalformedRecord(format!("node: {err}")));
                    skipped += 1;
                    continue;
                }
            };
            if diagram.nodes.contains_key(&record.id) {
                log::warn!("skipping node record with duplicate id {}", record.id);
                skipped += 1;
                continue;
            }
            diagram.add_node(record.into());
        }

        // Pass 2: resolve edges against the node map. Edges are only ever
        // constructed once both endpoints exist.
        for value in raw.edges {
            let record: EdgeRecord = match serde_json::from_value(value) {
                Ok(record) => record,
                Err(err) => {
                    log::warn!("{}", DiagramError::MalformedRecord(format!("edge: {err}")));
                    skipped += 1;
                    continue;
                }
            };
            let mut resolved = true;
            for endpoint in [record.source, record.target] {
                if !diagram.nodes.contains_key(&endpoint) {
                    log::warn!(
                        "{}",
                        DiagramError::UnresolvedReference {
                            edge: record.id,
                            node: endpoint,
                        }
                    );
                    resolved = false;
                }
            }
            let inserted = diagram.insert_edge(DiagramEdge {
                id: record.id,
                source: record.source,
                target: record.target,
            });
            if !inserted {
                if resolved {
                    // Endpoints exist, so the record is a self-loop or a
                    // duplicate of an earlier edge
                    log::warn!(
                        "skipping edge record {}: invalid pair {} -> {}",
                        record.id,
                        record.source,
                        record.target
                    );
                }
                skipped += 1;
            }
        }

        log::info!(
            "loaded diagram: {} node(s), {} edge(s), {} record(s) skipped",
            diagram.nodes.len(),
            diagram.edges.len(),
            skipped
        );
        Ok(diagram)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn sample_diagram() -> (Diagram, NodeId, NodeId, NodeId) {
        let mut diagram = Diagram::new();
        let mut start = DiagramNode::new(NodeKind::Start, (0.0, 0.0));
        start.name = "Begin".to_string();
        start.description = "entry point".to_string();
        let mut task = DiagramNode::new(NodeKind::Task, (200.0, 50.0));
        task.name = "Review".to_string();
        task.actions.insert("Send Email".to_string(), "template=review.pdf".to_string());
        task.actions.insert("Validate Data".to_string(), String::new());
        let gateway = DiagramNode::new(NodeKind::Gateway, (400.0, 50.0));

        let start_id = diagram.add_node(start);
        let task_id = diagram.add_node(task);
        let gateway_id = diagram.add_node(gateway);
        diagram.connect(start_id, task_id).unwrap();
        diagram.connect(task_id, gateway_id).unwrap();
        (diagram, start_id, task_id, gateway_id)
    }

    #[test]
    fn round_trip_preserves_diagram() {
        let (original, start_id, task_id, gateway_id) = sample_diagram();

        let json = original.to_json().unwrap();
        let restored = Diagram::from_json(&json).unwrap();

        assert_eq!(restored.nodes.len(), 3);
        assert_eq!(restored.edges.len(), 2);

        let start = &restored.nodes[&start_id];
        assert_eq!(start.kind, NodeKind::Start);
        assert_eq!(start.name, "Begin");
        assert_eq!(start.description, "entry point");
        assert_eq!(start.position, (0.0, 0.0));

        let task = &restored.nodes[&task_id];
        assert_eq!(task.kind, NodeKind::Task);
        assert_eq!(task.actions.len(), 2);
        assert_eq!(task.actions["Send Email"], "template=review.pdf");

        let pairs: Vec<(NodeId, NodeId)> =
            restored.edges.iter().map(|e| (e.source, e.target)).collect();
        assert!(pairs.contains(&(start_id, task_id)));
        assert!(pairs.contains(&(task_id, gateway_id)));

        // Edge ids are carried by the format and preserved exactly.
        let original_ids: Vec<EdgeId> = original.edges.iter().map(|e| e.id).collect();
        let restored_ids: Vec<EdgeId> = restored.edges.iter().map(|e| e.id).collect();
        assert_eq!(original_ids, restored_ids);
    }

    #[test]
    fn round_trip_rebuilds_incident_lists() {
        let (original, _, task_id, _) = sample_diagram();
        let json = original.to_json().unwrap();
        let restored = Diagram::from_json(&json).unwrap();

        // The task sits between the other two nodes.
        assert_eq!(restored.nodes[&task_id].edges.len(), 2);
        for edge in &restored.edges {
            assert!(restored.nodes[&edge.source].edges.contains(&edge.id));
            assert!(restored.nodes[&edge.target].edges.contains(&edge.id));
        }
    }

    #[test]
    fn unresolved_edge_is_skipped_not_fatal() {
        let (diagram, start_id, _, _) = sample_diagram();
        let mut file: serde_json::Value = serde_json::from_str(&diagram.to_json().unwrap()).unwrap();
        file["edges"]
            .as_array_mut()
            .unwrap()
            .push(serde_json::json!({
                "id": Uuid::new_v4(),
                "source": start_id,
                "target": Uuid::new_v4(),
            }));

        let restored = Diagram::from_json(&file.to_string()).unwrap();
        assert_eq!(restored.nodes.len(), 3);
        assert_eq!(restored.edges.len(), 2);
    }

    #[test]
    fn malformed_records_are_skipped() {
        let (diagram, _, _, _) = sample_diagram();
        let mut file: serde_json::Value = serde_json::from_str(&diagram.to_json().unwrap()).unwrap();
        // An edge record without both endpoint ids, and a node record with a
        // bogus kind.
        file["edges"]
            .as_array_mut()
            .unwrap()
            .push(serde_json::json!({ "id": Uuid::new_v4() }));
        file["nodes"].as_array_mut().unwrap().push(serde_json::json!({
            "id": Uuid::new_v4(),
            "kind": "getway",
            "x": 0.0,
            "y": 0.0,
            "name": "broken",
        }));

        let restored = Diagram::from_json(&file.to_string()).unwrap();
        assert_eq!(restored.nodes.len(), 3);
        assert_eq!(restored.edges.len(), 2);
    }

    #[test]
    fn self_loop_record_is_skipped() {
        let (diagram, start_id, _, _) = sample_diagram();
        let mut file: serde_json::Value = serde_json::from_str(&diagram.to_json().unwrap()).unwrap();
        file["edges"]
            .as_array_mut()
            .unwrap()
            .push(serde_json::json!({
                "id": Uuid::new_v4(),
                "source": start_id,
                "target": start_id,
            }));

        let restored = Diagram::from_json(&file.to_string()).unwrap();
        assert_eq!(restored.edges.len(), 2);
    }

    #[test]
    fn duplicate_edge_record_is_skipped() {
        let (diagram, start_id, task_id, _) = sample_diagram();
        let mut file: serde_json::Value = serde_json::from_str(&diagram.to_json().unwrap()).unwrap();
        file["edges"]
            .as_array_mut()
            .unwrap()
            .push(serde_json::json!({
                "id": Uuid::new_v4(),
                "source": start_id,
                "target": task_id,
            }));

        let restored = Diagram::from_json(&file.to_string()).unwrap();
        assert_eq!(restored.edges.len(), 2);
        assert_eq!(restored.nodes[&start_id].edges.len(), 1);
    }

    #[test]
    fn newer_version_is_rejected() {
        let json = serde_json::json!({
            "version": FORMAT_VERSION + 1,
            "nodes": [],
            "edges": [],
        })
        .to_string();
        assert!(matches!(
            Diagram::from_json(&json),
            Err(DiagramError::UnsupportedVersion(v)) if v == FORMAT_VERSION + 1
        ));
    }

    #[test]
    fn garbage_input_is_a_parse_error() {
        assert!(matches!(
            Diagram::from_json("not json at all"),
            Err(DiagramError::Json(_))
        ));
    }

    #[test]
    fn empty_diagram_round_trips() {
        let diagram = Diagram::new();
        let restored = Diagram::from_json(&diagram.to_json().unwrap()).unwrap();
        assert!(restored.nodes.is_empty());
        assert!(restored.edges.is_empty());
    }
}
