//! Canvas interaction and navigation functionality.
//!
//! This module handles canvas panning, zooming, node dragging, the
//! connection gesture, palette drops, and coordinate transformations between
//! screen and world space.

use super::state::{BpmnApp, ConnectGesture};
use super::undo::UndoAction;
use crate::types::*;
use eframe::egui;
use std::str::FromStr;

impl BpmnApp {
    /// Converts screen coordinates to world coordinates accounting for zoom
    /// and pan.
    pub fn screen_to_world(&self, screen_pos: egui::Pos2) -> egui::Pos2 {
        (screen_pos - self.canvas.offset) / self.canvas.zoom_factor
    }

    /// Converts world coordinates to screen coordinates accounting for zoom
    /// and pan.
    pub fn world_to_screen(&self, world_pos: egui::Pos2) -> egui::Pos2 {
        world_pos * self.canvas.zoom_factor + self.canvas.offset
    }

    /// Snaps a position to the nearest grid point (20 world units).
    pub fn snap_to_grid(&self, pos: egui::Pos2) -> egui::Pos2 {
        let grid = crate::constants::GRID_SIZE;
        egui::pos2((pos.x / grid).round() * grid, (pos.y / grid).round() * grid)
    }

    /// Handles middle-click or Cmd/Ctrl+left-click canvas panning.
    pub fn handle_canvas_panning(&mut self, ui: &mut egui::Ui, response: &egui::Response) {
        // modifiers.command automatically uses Cmd on macOS and Ctrl elsewhere
        let should_pan = ui.input(|i| {
            i.pointer.middle_down() || (i.pointer.primary_down() && i.modifiers.command)
        });

        if should_pan {
            if let Some(current_pos) = response.interact_pointer_pos() {
                if !self.interaction.is_panning {
                    self.interaction.is_panning = true;
                    self.interaction.last_pan_pos = Some(current_pos);
                } else if let Some(last_pos) = self.interaction.last_pan_pos {
                    let delta = current_pos - last_pos;
                    self.canvas.offset += delta;
                    self.interaction.last_pan_pos = Some(current_pos);
                }
            }
        } else {
            self.interaction.is_panning = false;
            self.interaction.last_pan_pos = None;
        }
    }

    /// Handles scroll wheel zooming, keeping the cursor position fixed in
    /// world space. Zoom range is clamped between 0.25x and 5.0x.
    pub fn handle_canvas_zoom(&mut self, ui: &mut egui::Ui, response: &egui::Response) {
        let scroll_delta = ui.input(|i| i.smooth_scroll_delta.y);
        if scroll_delta == 0.0 {
            return;
        }

        let mouse_pos = ui
            .input(|i| i.pointer.hover_pos())
            .or_else(|| response.interact_pointer_pos());

        if let Some(mouse_pos) = mouse_pos {
            if !response.rect.contains(mouse_pos) {
                return;
            }

            let world_pos_before_zoom = self.screen_to_world(mouse_pos);

            let zoom_delta = if scroll_delta > 0.0 { 0.025 } else { -0.025 };
            let old_zoom = self.canvas.zoom_factor;
            self.canvas.zoom_factor = (self.canvas.zoom_factor + zoom_delta).clamp(0.25, 5.0);

            if (self.canvas.zoom_factor - old_zoom).abs() > f32::EPSILON {
                // Adjust offset so the world point under the cursor stays put
                let world_pos_after_zoom = self.world_to_screen(world_pos_before_zoom);
                self.canvas.offset += mouse_pos - world_pos_after_zoom;
            }
        }
    }

    /// Handles node dragging with the left mouse button, including shift+drag
    /// grid snapping and shift+drag-from-node connection arming.
    pub fn handle_node_dragging(&mut self, ui: &mut egui::Ui, response: &egui::Response) {
        // An active marquee takes priority over starting a drag or gesture
        if self.interaction.marquee_start.is_some() {
            return;
        }
        if ui.input(|i| i.pointer.primary_down()) && !self.interaction.is_panning {
            if let Some(current_pos) = response.interact_pointer_pos() {
                let world_pos = self.screen_to_world(current_pos);
                let shift_held = ui.input(|i| i.modifiers.shift);

                let armed = matches!(self.interaction.connect_gesture, ConnectGesture::Armed { .. });
                if armed {
                    // While armed the stub follows the pointer; resolution
                    // happens on click in handle_canvas_interactions.
                    self.interaction.gesture_pos = Some(current_pos);
                } else if self.interaction.dragging_node.is_none()
                    && self.interaction.pending_shift_connection_from.is_none()
                {
                    if let Some(node_id) = self.find_node_at_position(world_pos) {
                        if shift_held {
                            // Defer: becomes a connection gesture once the
                            // pointer moves past the click threshold,
                            // otherwise an additive selection toggle.
                            self.interaction.pending_shift_connection_from = Some(node_id);
                            self.interaction.pending_shift_start_screen_pos = Some(current_pos);
                        } else {
                            self.start_node_drag(node_id, world_pos);
                        }
                    }
                } else if let Some(dragging_id) = self.interaction.dragging_node {
                    self.update_dragged_node_position(dragging_id, world_pos, ui);
                } else if let (Some(from_id), Some(start_pos)) = (
                    self.interaction.pending_shift_connection_from,
                    self.interaction.pending_shift_start_screen_pos,
                ) {
                    let start_world = self.screen_to_world(start_pos);
                    let cur_world = self.screen_to_world(current_pos);
                    if (cur_world - start_world).length() >= crate::constants::CLICK_THRESHOLD {
                        // Commit to a drag-mode connection gesture
                        self.arm_connect_gesture(from_id);
                        self.interaction.gesture_pos = Some(current_pos);
                        self.interaction.pending_shift_connection_from = None;
                        self.interaction.pending_shift_start_screen_pos = None;
                    }
                }
            }
        } else {
            // Mouse released: resolve a drag-mode gesture at the release point
            if matches!(self.interaction.connect_gesture, ConnectGesture::Armed { .. }) {
                if let Some(current_pos) = response.interact_pointer_pos() {
                    let world_pos = self.screen_to_world(current_pos);
                    self.resolve_connect_gesture(world_pos);
                }
            }

            // A shift-press that never became a gesture toggles selection
            if let Some(node_id) = self.interaction.pending_shift_connection_from.take() {
                if let Some(pos) = self
                    .interaction
                    .selected_nodes
                    .iter()
                    .position(|id| *id == node_id)
                {
                    self.interaction.selected_nodes.remove(pos);
                } else {
                    self.interaction.selected_nodes.push(node_id);
                }
                self.interaction.sync_single_selection();
                self.interaction.editing_node_name = None;
            }
            self.interaction.pending_shift_start_screen_pos = None;

            // Record undo for node movement when the drag ends
            if let Some(dragging_id) = self.interaction.dragging_node {
                if self.interaction.selected_nodes.len() > 1 {
                    let old_positions = self.interaction.drag_original_positions_multi.clone();
                    let mut new_positions: Vec<(NodeId, (f32, f32))> = Vec::new();
                    for (id, _) in &old_positions {
                        if let Some(n) = self.diagram.nodes.get(id) {
                            new_positions.push((*id, n.position));
                        }
                    }
                    if !old_positions.is_empty() && old_positions != new_positions {
                        self.undo_history.push_action(UndoAction::MultipleNodesMoved {
                            old_positions,
                            new_positions,
                        });
                        self.file.has_unsaved_changes = true;
                    }
                } else if let Some(old_pos) = self.interaction.drag_original_position {
                    self.record_node_movement(dragging_id, old_pos);
                }
            }

            self.interaction.dragging_node = None;
            self.interaction.drag_original_position = None;
            self.interaction.drag_original_positions_multi.clear();
        }
    }

    /// Starts dragging the specified node, recording original positions for
    /// undo and the pointer-to-center offset for smooth dragging.
    fn start_node_drag(&mut self, node_id: NodeId, world_pos: egui::Pos2) {
        self.interaction.dragging_node = Some(node_id);

        // Ensure selection includes the dragged node; a drag on an
        // unselected node replaces the selection
        if !self.interaction.selected_nodes.contains(&node_id) {
            self.interaction.selected_nodes.clear();
            self.interaction.selected_nodes.push(node_id);
            self.interaction.selected_node = Some(node_id);
            self.interaction.selected_edge = None;
            self.interaction.editing_node_name = None;
        }

        self.interaction.drag_original_positions_multi = self
            .interaction
            .selected_nodes
            .iter()
            .filter_map(|id| self.diagram.nodes.get(id).map(|n| (*id, n.position)))
            .collect();

        if let Some(node) = self.diagram.nodes.get(&node_id) {
            let node_center = egui::pos2(node.position.0, node.position.1);
            self.interaction.node_drag_offset = node_center - world_pos;
            self.interaction.drag_original_position = Some(node.position);
        }
    }

    /// Updates the position of the currently dragged node (and, for a
    /// multi-selection, every other selected node by the same delta).
    /// Incident edges pick the move up on the same frame's paint.
    fn update_dragged_node_position(
        &mut self,
        node_id: NodeId,
        world_pos: egui::Pos2,
        ui: &egui::Ui,
    ) {
        let mut new_world_pos = world_pos + self.interaction.node_drag_offset;
        if ui.input(|i| i.modifiers.shift) {
            new_world_pos = self.snap_to_grid(new_world_pos);
        }

        if let Some(dragged_node) = self.diagram.nodes.get(&node_id).cloned() {
            let delta = egui::vec2(
                new_world_pos.x - dragged_node.position.0,
                new_world_pos.y - dragged_node.position.1,
            );
            if self.interaction.selected_nodes.len() > 1 {
                for id in self.interaction.selected_nodes.clone() {
                    if let Some(n) = self.diagram.nodes.get(&id) {
                        let pos = (n.position.0 + delta.x, n.position.1 + delta.y);
                        self.diagram.move_node(&id, pos);
                    }
                }
                return;
            }
        }

        self.diagram
            .move_node(&node_id, (new_world_pos.x, new_world_pos.y));
    }

    /// Records an undo action for node movement when a drag ends.
    fn record_node_movement(&mut self, node_id: NodeId, old_position: (f32, f32)) {
        if let Some(node) = self.diagram.nodes.get(&node_id) {
            let new_position = node.position;
            if old_position != new_position {
                self.undo_history.push_action(UndoAction::NodeMoved {
                    node_id,
                    old_position,
                    new_position,
                });
                self.file.has_unsaved_changes = true;
            }
        }
    }

    /// Arms the connection gesture with the given source node, first
    /// aborting any gesture already in progress so no stub leaks.
    pub fn arm_connect_gesture(&mut self, source: NodeId) {
        if self.interaction.connect_gesture != ConnectGesture::Idle {
            self.abort_connect_gesture();
        }
        self.interaction.connect_gesture = ConnectGesture::Armed { source };
        self.interaction.gesture_pos = None;
    }

    /// Aborts the connection gesture, discarding the preview stub without
    /// creating an edge.
    pub fn abort_connect_gesture(&mut self) {
        self.interaction.connect_gesture = ConnectGesture::Idle;
        self.interaction.gesture_pos = None;
    }

    /// Resolves the armed gesture at a world position: a distinct node under
    /// the pointer completes the connection, anything else aborts.
    pub fn resolve_connect_gesture(&mut self, world_pos: egui::Pos2) {
        let ConnectGesture::Armed { source } = self.interaction.connect_gesture else {
            return;
        };
        if let Some(target) = self.find_node_at_position(world_pos) {
            if target != source {
                self.connect_nodes(source, target);
            }
        }
        self.abort_connect_gesture();
    }

    /// Connects two nodes through the diagram, recording undo on success.
    /// Rejections (self-loop, duplicate, dead endpoint) are silent.
    pub fn connect_nodes(&mut self, source: NodeId, target: NodeId) {
        if let Some(edge_id) = self.diagram.connect(source, target) {
            if let Some(edge) = self.diagram.edge(&edge_id).cloned() {
                self.undo_history.push_action(UndoAction::EdgeCreated { edge });
            }
            self.file.has_unsaved_changes = true;
        }
    }

    /// Creates a node of the given kind at a world position, selects it and
    /// starts editing its name.
    pub fn create_node_at(&mut self, kind: NodeKind, world_pos: (f32, f32)) -> NodeId {
        let node = DiagramNode::new(kind, world_pos);
        let node_id = self.diagram.add_node(node);
        self.undo_history.push_action(UndoAction::NodeCreated { node_id });

        self.interaction.clear_selection();
        self.interaction.selected_node = Some(node_id);
        self.interaction.selected_nodes.push(node_id);
        self.start_editing_node_name(node_id, crate::constants::DEFAULT_NODE_NAME);

        self.file.has_unsaved_changes = true;
        node_id
    }

    /// Handles a palette drop: the payload is the lowercase element-type
    /// name. Unknown names surface as a blocking error dialog and create
    /// nothing.
    pub fn handle_palette_drop(&mut self, payload: &str, world_pos: egui::Pos2) {
        match NodeKind::from_str(payload) {
            Ok(kind) => {
                self.create_node_at(kind, (world_pos.x, world_pos.y));
            }
            Err(err) => {
                log::error!("palette drop rejected: {err}");
                self.error_message = Some(err.to_string());
            }
        }
    }

    /// Finds the node at the given world position, if any, using the node's
    /// actual shape: ellipse for start events, diamond for gateways, rounded
    /// rectangle for tasks.
    pub fn find_node_at_position(&self, pos: egui::Pos2) -> Option<NodeId> {
        let half_w = crate::constants::NODE_WIDTH / 2.0;
        let half_h = crate::constants::NODE_HEIGHT / 2.0;

        for (id, node) in &self.diagram.nodes {
            let dx = pos.x - node.position.0;
            let dy = pos.y - node.position.1;
            let hit = match node.kind {
                NodeKind::Start => {
                    let rx = half_w.min(half_h);
                    (dx / rx).powi(2) + (dy / rx).powi(2) <= 1.0
                }
                NodeKind::Gateway => (dx / half_w).abs() + (dy / half_h).abs() <= 1.0,
                NodeKind::Task => dx.abs() <= half_w && dy.abs() <= half_h,
            };
            if hit {
                return Some(*id);
            }
        }
        None
    }

    /// Finds the edge at the given world position, if any, using distance to
    /// the edge's line segment with a click threshold.
    pub fn find_edge_at_position(&self, pos: egui::Pos2) -> Option<EdgeId> {
        let click_threshold = crate::constants::CLICK_THRESHOLD;
        for edge in &self.diagram.edges {
            if let (Some(from_node), Some(to_node)) = (
                self.diagram.nodes.get(&edge.source),
                self.diagram.nodes.get(&edge.target),
            ) {
                let start = egui::pos2(from_node.position.0, from_node.position.1);
                let end = egui::pos2(to_node.position.0, to_node.position.1);
                if point_to_segment_distance(pos, start, end) < click_threshold {
                    return Some(edge.id);
                }
            }
        }
        None
    }
}

/// Calculates the distance from a point to a line segment via projection
/// clamped to the segment endpoints.
fn point_to_segment_distance(point: egui::Pos2, line_start: egui::Pos2, line_end: egui::Pos2) -> f32 {
    let line_vec = line_end - line_start;
    let point_vec = point - line_start;
    let line_len_sq = line_vec.length_sq();

    if line_len_sq < 0.0001 {
        // Segment is essentially a point
        return point_vec.length();
    }

    let t = (point_vec.dot(line_vec) / line_len_sq).clamp(0.0, 1.0);
    let projection = line_start + line_vec * t;
    (point - projection).length()
}
