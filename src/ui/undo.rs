//! Undo/redo functionality for tracking and reversing user actions.
//!
//! Tracks node movements, renames, creations and deletions, edge
//! creations/deletions, and batch selection deletes as single entries.

use crate::constants::MAX_UNDO_HISTORY;
use crate::types::*;
use serde::{Deserialize, Serialize};

/// Represents different types of actions that can be undone.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum UndoAction {
    /// A node was moved from one position to another.
    NodeMoved {
        /// The moved node.
        node_id: NodeId,
        /// Position before the drag.
        old_position: (f32, f32),
        /// Position after the drag.
        new_position: (f32, f32),
    },
    /// Several nodes were moved together.
    MultipleNodesMoved {
        /// Positions before the drag.
        old_positions: Vec<(NodeId, (f32, f32))>,
        /// Positions after the drag.
        new_positions: Vec<(NodeId, (f32, f32))>,
    },
    /// A node was created.
    NodeCreated {
        /// Id of the created node.
        node_id: NodeId,
    },
    /// A node was deleted, together with its cascade-deleted edges.
    NodeDeleted {
        /// The deleted node.
        node: DiagramNode,
        /// The edges that were cascade-deleted with it.
        edges: Vec<DiagramEdge>,
    },
    /// A whole selection (nodes plus edges) was deleted as one batch.
    SelectionDeleted {
        /// The deleted nodes.
        nodes: Vec<DiagramNode>,
        /// Every deleted edge, whether selected directly or by cascade.
        edges: Vec<DiagramEdge>,
    },
    /// An edge was created.
    EdgeCreated {
        /// The created edge.
        edge: DiagramEdge,
    },
    /// An edge was deleted.
    EdgeDeleted {
        /// The deleted edge.
        edge: DiagramEdge,
    },
    /// A node's name was changed.
    NodeRenamed {
        /// The renamed node.
        node_id: NodeId,
        /// Name before the edit.
        old_name: String,
        /// Name after the edit.
        new_name: String,
    },
}

/// Manages undo/redo history for the application.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UndoHistory {
    /// Stack of actions that can be undone.
    #[serde(skip)]
    undo_stack: Vec<UndoAction>,
    /// Stack of actions that can be redone.
    #[serde(skip)]
    redo_stack: Vec<UndoAction>,
}

impl UndoHistory {
    /// Creates a new empty undo history.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an action to the undo history and clears the redo stack, since a
    /// new action invalidates any previously undone actions.
    pub fn push_action(&mut self, action: UndoAction) {
        self.undo_stack.push(action);
        self.redo_stack.clear();
        if self.undo_stack.len() > MAX_UNDO_HISTORY {
            self.undo_stack.remove(0);
        }
    }

    /// Returns true if there are actions that can be undone.
    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    /// Returns true if there are actions that can be redone.
    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    /// Pops the most recent action from the undo stack.
    pub fn pop_undo(&mut self) -> Option<UndoAction> {
        self.undo_stack.pop()
    }

    /// Pops the most recent action from the redo stack.
    pub fn pop_redo(&mut self) -> Option<UndoAction> {
        self.redo_stack.pop()
    }

    /// Pushes an undone action onto the redo stack.
    pub fn push_redo(&mut self, action: UndoAction) {
        self.redo_stack.push(action);
    }

    /// Pushes a redone action back onto the undo stack without clearing the
    /// redo stack.
    pub fn push_undo(&mut self, action: UndoAction) {
        self.undo_stack.push(action);
    }

    /// Clears all undo and redo history.
    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
    }
}

/// Extension methods for applying undo/redo actions to a diagram.
pub trait UndoableDiagram {
    /// Reverses an action, returning the action that would redo it.
    fn apply_undo(&mut self, action: &UndoAction) -> Option<UndoAction>;

    /// Re-applies an undone action, returning its inverse.
    fn apply_redo(&mut self, action: &UndoAction) -> Option<UndoAction>;
}

impl UndoableDiagram for Diagram {
    fn apply_undo(&mut self, action: &UndoAction) -> Option<UndoAction> {
        match action {
            UndoAction::NodeMoved {
                node_id,
                old_position,
                new_position,
            } => {
                if self.move_node(node_id, *old_position) {
                    Some(UndoAction::NodeMoved {
                        node_id: *node_id,
                        old_position: *new_position,
                        new_position: *old_position,
                    })
                } else {
                    None
                }
            }
            UndoAction::MultipleNodesMoved {
                old_positions,
                new_positions,
            } => {
                for (id, pos) in old_positions {
                    self.move_node(id, *pos);
                }
                Some(UndoAction::MultipleNodesMoved {
                    old_positions: new_positions.clone(),
                    new_positions: old_positions.clone(),
                })
            }
            UndoAction::NodeCreated { node_id } => {
                // The node may have gained edges since creation; capture
                // everything before removing so redo restores the full picture.
                if let Some(node) = self.nodes.get(node_id).cloned() {
                    let edges: Vec<DiagramEdge> =
                        self.edges_of(node_id).into_iter().cloned().collect();
                    self.remove_node(node_id);
                    Some(UndoAction::NodeDeleted { node, edges })
                } else {
                    None
                }
            }
            UndoAction::NodeDeleted { node, edges } => {
                let mut restored = node.clone();
                restored.edges.clear();
                self.add_node(restored);
                for edge in edges {
                    self.insert_edge(edge.clone());
                }
                Some(UndoAction::NodeCreated { node_id: node.id })
            }
            UndoAction::SelectionDeleted { nodes, edges } => {
                for node in nodes {
                    let mut restored = node.clone();
                    restored.edges.clear();
                    self.add_node(restored);
                }
                for edge in edges {
                    self.insert_edge(edge.clone());
                }
                Some(UndoAction::SelectionDeleted {
                    nodes: nodes.clone(),
                    edges: edges.clone(),
                })
            }
            UndoAction::EdgeCreated { edge } => {
                if self.disconnect(&edge.id) {
                    Some(UndoAction::EdgeDeleted { edge: edge.clone() })
                } else {
                    None
                }
            }
            UndoAction::EdgeDeleted { edge } => {
                if self.insert_edge(edge.clone()) {
                    Some(UndoAction::EdgeCreated { edge: edge.clone() })
                } else {
                    None
                }
            }
            UndoAction::NodeRenamed {
                node_id,
                old_name,
                new_name,
            } => {
                if let Some(node) = self.nodes.get_mut(node_id) {
                    node.name = old_name.clone();
                    Some(UndoAction::NodeRenamed {
                        node_id: *node_id,
                        old_name: new_name.clone(),
                        new_name: old_name.clone(),
                    })
                } else {
                    None
                }
            }
        }
    }

    fn apply_redo(&mut self, action: &UndoAction) -> Option<UndoAction> {
        match action {
            // Undoing a SelectionDeleted re-deletes it; every other inverse
            // is symmetric through apply_undo.
            UndoAction::SelectionDeleted { nodes, edges } => {
                for node in nodes {
                    self.remove_node(&node.id);
                }
                Some(UndoAction::SelectionDeleted {
                    nodes: nodes.clone(),
                    edges: edges.clone(),
                })
            }
            other => self.apply_undo(other),
        }
    }
}
