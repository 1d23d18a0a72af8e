//! User interface components and rendering logic for the diagram editor.
//!
//! This module contains all the UI-related code including the main application
//! struct, canvas rendering, the palette, property panels, context menus, and
//! user interaction handling.
//!
//! # Module Organization
//!
//! - `state` - Application state structures and the main BpmnApp
//! - `file_ops` - Async file save/load operations
//! - `canvas` - Canvas navigation, zooming, panning, and interaction
//! - `rendering` - Drawing nodes, edges, grid, and UI elements
//! - `undo` - Undo/redo actions and history

mod canvas;
mod file_ops;
mod rendering;
mod state;
mod undo;

#[cfg(test)]
mod tests;

pub use state::{BpmnApp, ConnectGesture, PaletteDrag};
pub use undo::{UndoAction, UndoableDiagram};

use self::state::PendingConfirmAction;
use crate::types::*;
use eframe::egui;
use std::time::Duration;

impl eframe::App for BpmnApp {
    /// Persist entire app state between restarts.
    fn save(&mut self, storage: &mut dyn eframe::Storage) {
        match self.to_json() {
            Ok(json) => {
                storage.set_string("app_state", json);
            }
            Err(err) => {
                log::error!("failed to serialize app state: {err}");
            }
        }
    }

    /// Main update function called by egui for each frame.
    ///
    /// Handles the overall UI layout: toolbar, palette, properties panel and
    /// the canvas, plus keyboard shortcuts, dialogs and pending file
    /// operations.
    fn update(&mut self, ctx: &egui::Context, frame: &mut eframe::Frame) {
        // Apply theme visuals
        let visuals = if self.dark_mode {
            egui::Visuals::dark()
        } else {
            egui::Visuals::light()
        };
        ctx.set_visuals(visuals);

        // Handle pending file operations
        self.handle_pending_operations(ctx);

        // Queue an autosave when the interval elapses; a periodic repaint
        // keeps the timer ticking while the app is idle
        self.handle_autosave();
        ctx.request_repaint_after(Duration::from_secs(30));

        // Keyboard shortcuts
        self.handle_escape_key(ctx);
        self.handle_undo_redo_keys(ctx);
        self.handle_delete_key(ctx);
        self.handle_file_shortcuts(ctx, frame);

        // Intercept native window close requests (titlebar X)
        if ctx.input(|i| i.viewport().close_requested()) {
            if self.file.has_unsaved_changes && !self.file.allow_close_on_next_request {
                // Abort close and show confirmation dialog
                ctx.send_viewport_cmd(egui::ViewportCommand::CancelClose);
                if !self.file.show_unsaved_dialog {
                    self.file.show_unsaved_dialog = true;
                    self.file.pending_confirm_action = Some(PendingConfirmAction::Quit);
                }
            } else {
                self.file.allow_close_on_next_request = false;
            }
        }

        // Top toolbar occupies full width and is independent of the side panels
        egui::TopBottomPanel::top("top_toolbar").show(ctx, |ui| {
            self.draw_toolbar(ui);
        });

        // Element palette on the left
        egui::SidePanel::left("palette_panel")
            .resizable(false)
            .default_width(140.0)
            .show(ctx, |ui| {
                self.draw_palette(ui);
            });

        // Right-side properties panel lives alongside the canvas
        let viewport_width = ctx.input(|i| i.content_rect().width());
        let clamped_width = self
            .properties_panel_width
            .clamp(180.0, (viewport_width * 0.9).max(180.0));

        egui::SidePanel::right("properties_panel")
            .resizable(true)
            .default_width(clamped_width)
            .show(ctx, |ui| {
                let current_width = ui.available_width();
                let max_allowed = (viewport_width * 0.9).max(180.0);
                self.properties_panel_width = current_width.clamp(180.0, max_allowed);
                self.draw_properties_panel(ui);
            });

        // Central canvas area
        egui::CentralPanel::default().show(ctx, |ui| {
            self.draw_canvas(ui);
        });

        // Unsaved changes confirmation dialog
        if self.file.show_unsaved_dialog {
            self.draw_unsaved_dialog(ctx);
        }

        // Blocking error dialog, e.g. for a rejected palette drop or a file
        // that failed to open
        if let Some(message) = self.error_message.clone() {
            egui::Window::new("Error")
                .collapsible(false)
                .resizable(false)
                .anchor(egui::Align2::CENTER_CENTER, egui::vec2(0.0, 0.0))
                .show(ctx, |ui| {
                    ui.label(&message);
                    if ui.button("OK").clicked() {
                        self.error_message = None;
                    }
                });
        }
    }
}

impl BpmnApp {
    /// Handles Escape: aborts an in-progress connection gesture, closes the
    /// context menu and cancels an active marquee.
    fn handle_escape_key(&mut self, ctx: &egui::Context) {
        if !ctx.input(|i| i.key_pressed(egui::Key::Escape)) {
            return;
        }
        if self.interaction.connect_gesture != ConnectGesture::Idle {
            self.abort_connect_gesture();
        }
        self.context_menu.show = false;
        self.interaction.marquee_start = None;
        self.interaction.marquee_end = None;
        self.interaction.marquee_additive = false;
    }

    /// Handles file-related keyboard shortcuts: New, Open, Save, Save As, and
    /// Quit. Uses the platform-standard Command (macOS) or Control
    /// (Windows/Linux) modifier.
    fn handle_file_shortcuts(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        if ctx.wants_keyboard_input() {
            return;
        }
        let mut request_quit = false;
        ctx.input(|i| {
            let cmd = i.modifiers.command;
            let shift = i.modifiers.shift;
            // Save As: Cmd/Ctrl+Shift+S
            if i.key_pressed(egui::Key::S) && cmd && shift {
                self.save_as_diagram();
            }
            // Save: Cmd/Ctrl+S
            else if i.key_pressed(egui::Key::S) && cmd {
                self.save_diagram();
            }
            // Open: Cmd/Ctrl+O
            if i.key_pressed(egui::Key::O) && cmd {
                if self.file.has_unsaved_changes {
                    self.file.show_unsaved_dialog = true;
                    self.file.pending_confirm_action = Some(PendingConfirmAction::Open);
                } else {
                    self.load_diagram();
                }
            }
            // New: Cmd/Ctrl+N
            if i.key_pressed(egui::Key::N) && cmd {
                if self.file.has_unsaved_changes {
                    self.file.show_unsaved_dialog = true;
                    self.file.pending_confirm_action = Some(PendingConfirmAction::New);
                } else {
                    self.new_diagram();
                }
            }
            // Quit: Cmd/Ctrl+Q
            if i.key_pressed(egui::Key::Q) && cmd {
                if self.file.has_unsaved_changes {
                    self.file.show_unsaved_dialog = true;
                    self.file.pending_confirm_action = Some(PendingConfirmAction::Quit);
                } else {
                    request_quit = true;
                }
            }
        });
        if request_quit {
            ctx.send_viewport_cmd(egui::ViewportCommand::Close);
        }
    }

    /// Handles undo/redo keyboard shortcuts.
    fn handle_undo_redo_keys(&mut self, ctx: &egui::Context) {
        // Text edits own the keyboard while focused
        if ctx.wants_keyboard_input() {
            return;
        }

        // Ctrl+Z for undo
        if ctx.input(|i| i.key_pressed(egui::Key::Z) && i.modifiers.command && !i.modifiers.shift)
        {
            self.perform_undo();
        }
        // Ctrl+Shift+Z or Ctrl+Y for redo
        else if ctx.input(|i| {
            (i.key_pressed(egui::Key::Z) && i.modifiers.command && i.modifiers.shift)
                || (i.key_pressed(egui::Key::Y) && i.modifiers.command)
        }) {
            self.perform_redo();
        }
    }

    /// Handles delete key presses to remove selected nodes and edges.
    ///
    /// A multi-element selection is removed atomically as one undo entry;
    /// each node's incident edges cascade with it, and a selected edge not
    /// already removed by cascade goes in the same batch.
    fn handle_delete_key(&mut self, ctx: &egui::Context) {
        if ctx.wants_keyboard_input() {
            return;
        }
        if !ctx.input(|i| i.key_pressed(egui::Key::Delete)) {
            return;
        }

        let mixed = !self.interaction.selected_nodes.is_empty()
            && self.interaction.selected_edge.is_some();
        if mixed || self.interaction.selected_nodes.len() > 1 {
            self.delete_selection();
        } else if let Some(selected_node) = self.interaction.selected_node {
            self.delete_node_with_undo(selected_node);
        } else if let Some(edge_id) = self.interaction.selected_edge {
            self.delete_edge_with_undo(edge_id);
        }
    }

    /// Deletes every selected element as a single undoable batch: the
    /// selected nodes with their incident edges, plus the selected edge when
    /// the cascade did not already cover it.
    fn delete_selection(&mut self) {
        let mut nodes: Vec<DiagramNode> = Vec::new();
        let mut edges: Vec<DiagramEdge> = Vec::new();
        let mut seen_edges: std::collections::HashSet<EdgeId> = std::collections::HashSet::new();

        for id in &self.interaction.selected_nodes {
            if let Some(node) = self.diagram.nodes.get(id).cloned() {
                nodes.push(node);
            }
            for edge in self.diagram.edges_of(id) {
                if seen_edges.insert(edge.id) {
                    edges.push(edge.clone());
                }
            }
        }
        if let Some(edge_id) = self.interaction.selected_edge {
            if let Some(edge) = self.diagram.edge(&edge_id) {
                if seen_edges.insert(edge.id) {
                    edges.push(edge.clone());
                }
            }
        }
        if nodes.is_empty() && edges.is_empty() {
            self.interaction.clear_selection();
            return;
        }

        self.undo_history
            .push_action(UndoAction::SelectionDeleted { nodes, edges });

        for id in self.interaction.selected_nodes.clone() {
            self.diagram.remove_node(&id);
        }
        if let Some(edge_id) = self.interaction.selected_edge {
            // No-op when the cascade already took it
            self.diagram.disconnect(&edge_id);
        }

        self.interaction.clear_selection();
        self.file.has_unsaved_changes = true;
    }

    /// Deletes a single node with its incident edges, recording undo.
    fn delete_node_with_undo(&mut self, node_id: NodeId) {
        if let Some(node) = self.diagram.nodes.get(&node_id).cloned() {
            let edges: Vec<DiagramEdge> = self
                .diagram
                .edges_of(&node_id)
                .into_iter()
                .cloned()
                .collect();
            self.undo_history
                .push_action(UndoAction::NodeDeleted { node, edges });
        }
        self.diagram.remove_node(&node_id);
        self.interaction.clear_selection();
        self.file.has_unsaved_changes = true;
    }

    /// Deletes a single edge, recording undo. Its endpoint nodes remain.
    fn delete_edge_with_undo(&mut self, edge_id: EdgeId) {
        if let Some(edge) = self.diagram.edge(&edge_id).cloned() {
            self.undo_history
                .push_action(UndoAction::EdgeDeleted { edge });
            self.diagram.disconnect(&edge_id);
            self.interaction.selected_edge = None;
            self.file.has_unsaved_changes = true;
        }
    }

    /// Renders the toolbar with file operations, undo/redo, the connect
    /// button and view options.
    fn draw_toolbar(&mut self, ui: &mut egui::Ui) {
        ui.horizontal(|ui| {
            // File operations
            if ui.button("New").clicked() {
                if self.file.has_unsaved_changes {
                    self.file.show_unsaved_dialog = true;
                    self.file.pending_confirm_action = Some(PendingConfirmAction::New);
                } else {
                    self.new_diagram();
                }
            }
            if ui.button("Open").clicked() {
                if self.file.has_unsaved_changes {
                    self.file.show_unsaved_dialog = true;
                    self.file.pending_confirm_action = Some(PendingConfirmAction::Open);
                } else {
                    self.load_diagram();
                }
            }
            if ui.button("Save").clicked() {
                self.save_diagram();
            }
            if ui.button("Save As").clicked() {
                self.save_as_diagram();
            }

            ui.separator();

            // Undo/Redo operations
            ui.add_enabled_ui(self.undo_history.can_undo(), |ui| {
                if ui.button("⟲ Undo").clicked() {
                    self.perform_undo();
                }
            });
            ui.add_enabled_ui(self.undo_history.can_redo(), |ui| {
                if ui.button("⟳ Redo").clicked() {
                    self.perform_redo();
                }
            });

            ui.separator();

            // Connect the two selected nodes in selection order
            let two_selected = self.interaction.selected_nodes.len() == 2;
            ui.add_enabled_ui(two_selected, |ui| {
                if ui
                    .button("Connect")
                    .on_hover_text("Connect the two selected nodes (first → second)")
                    .clicked()
                {
                    let source = self.interaction.selected_nodes[0];
                    let target = self.interaction.selected_nodes[1];
                    self.connect_nodes(source, target);
                }
            });

            ui.separator();

            // View options
            ui.checkbox(&mut self.canvas.show_grid, "Show Grid");
            ui.separator();
            ui.checkbox(&mut self.dark_mode, "Dark Mode");

            // Show current file and unsaved changes indicator
            ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                if let Some(file_path) = &self.file.current_path {
                    let status = if self.file.has_unsaved_changes { "*" } else { "" };
                    ui.label(format!("{}{}", file_path, status));
                } else {
                    let status = if self.file.has_unsaved_changes {
                        "Untitled*"
                    } else {
                        "Untitled"
                    };
                    ui.label(status);
                }

                ui.label(format!("Zoom: {:.0}%", self.canvas.zoom_factor * 100.0));
            });
        });
    }

    /// Renders the element palette. Each entry is a drag source carrying the
    /// element-type name; dropping it on the canvas creates a node there.
    fn draw_palette(&mut self, ui: &mut egui::Ui) {
        ui.heading("Palette");
        ui.separator();

        for kind in NodeKind::ALL {
            let id = egui::Id::new("palette_item").with(kind.as_str());
            ui.dnd_drag_source(id, PaletteDrag(kind.as_str().to_string()), |ui| {
                ui.add_sized(
                    [ui.available_width(), 28.0],
                    egui::Button::new(kind.label()),
                );
            });
        }

        ui.add_space(8.0);
        ui.separator();
        ui.label(
            egui::RichText::new("Drag an element onto the canvas to create it.")
                .small()
                .italics(),
        );
    }

    /// Renders the properties panel showing details of the selected node or
    /// edge.
    fn draw_properties_panel(&mut self, ui: &mut egui::Ui) {
        egui::ScrollArea::vertical()
            .auto_shrink([false; 2])
            .show(ui, |ui| {
                ui.vertical(|ui| {
                    ui.heading("Properties");
                    ui.separator();

                    if self.interaction.selected_nodes.len() > 1 {
                        ui.label(format!(
                            "{} nodes selected",
                            self.interaction.selected_nodes.len()
                        ));
                        ui.separator();
                        ui.colored_label(egui::Color32::GRAY, "Press Delete to remove all");
                    } else if let Some(selected_id) = self.interaction.selected_node {
                        if let Some(node) = self.diagram.nodes.get(&selected_id).cloned() {
                            self.draw_node_properties(ui, selected_id, &node);
                        } else {
                            ui.label("Node not found");
                        }
                    } else if let Some(edge_id) = self.interaction.selected_edge {
                        if let Some(edge) = self.diagram.edge(&edge_id).cloned() {
                            self.draw_edge_properties(ui, &edge);
                        } else {
                            ui.label("Edge not found");
                        }
                    } else {
                        self.draw_no_selection_info(ui);
                    }
                });
            });
    }

    /// Renders a selected node's editable properties.
    fn draw_node_properties(&mut self, ui: &mut egui::Ui, selected_id: NodeId, node: &DiagramNode) {
        ui.label(format!("Type: {}", node.kind.label()));
        ui.separator();

        // Node name editing
        ui.label("Name:");
        if self.interaction.editing_node_name == Some(selected_id) {
            self.draw_name_editor(ui, selected_id);
        } else if ui.button(&node.name).clicked() {
            self.start_editing_node_name(selected_id, &node.name);
        }

        ui.separator();

        // Description is committed directly; the text edit owns the buffer
        ui.label("Description:");
        if let Some(node_mut) = self.diagram.nodes.get_mut(&selected_id) {
            let response = ui.add(
                egui::TextEdit::multiline(&mut node_mut.description)
                    .desired_rows(3)
                    .desired_width(f32::INFINITY),
            );
            if response.changed() {
                self.file.has_unsaved_changes = true;
            }
        }

        ui.separator();
        ui.label(format!(
            "Position: ({:.1}, {:.1})",
            node.position.0, node.position.1
        ));

        ui.separator();
        self.draw_actions_editor(ui, selected_id, node);

        ui.separator();
        ui.label("Connections:");
        let edges: Vec<DiagramEdge> = self
            .diagram
            .edges_of(&selected_id)
            .into_iter()
            .cloned()
            .collect();
        if edges.is_empty() {
            ui.colored_label(egui::Color32::GRAY, "(none)");
        }
        for edge in edges {
            let other = edge.other_endpoint(&selected_id);
            let other_name = other
                .and_then(|id| self.diagram.nodes.get(&id))
                .map(|n| n.name.as_str())
                .unwrap_or("(missing)");
            let direction = if edge.source == selected_id { "→" } else { "←" };
            ui.label(format!("{} {}", direction, other_name));
        }
    }

    /// Renders the key/value action map editor for a node.
    ///
    /// Actions are free-form metadata pairs, e.g. an automation hook name and
    /// its parameter.
    fn draw_actions_editor(&mut self, ui: &mut egui::Ui, node_id: NodeId, node: &DiagramNode) {
        ui.label(egui::RichText::new("Actions:").strong());

        let mut to_remove: Option<String> = None;
        let mut edited: Option<(String, String)> = None;

        egui::Grid::new("node_actions_table")
            .num_columns(3)
            .striped(true)
            .spacing([10.0, 4.0])
            .show(ui, |ui| {
                for (key, value) in &node.actions {
                    ui.label(egui::RichText::new(key).monospace());

                    let mut value_buf = value.clone();
                    let response = ui.add_sized(
                        [140.0, 20.0],
                        egui::TextEdit::singleline(&mut value_buf)
                            .id_salt(format!("action_value_{}", key)),
                    );
                    if response.changed() {
                        edited = Some((key.clone(), value_buf));
                    }

                    if ui.button("✖").on_hover_text("Remove action").clicked() {
                        to_remove = Some(key.clone());
                    }
                    ui.end_row();
                }
            });

        if let Some((key, value)) = edited {
            if let Some(node_mut) = self.diagram.nodes.get_mut(&node_id) {
                node_mut.actions.insert(key, value);
                self.file.has_unsaved_changes = true;
            }
        }
        if let Some(key) = to_remove {
            if let Some(node_mut) = self.diagram.nodes.get_mut(&node_id) {
                node_mut.actions.remove(&key);
                self.file.has_unsaved_changes = true;
            }
        }

        // New entry inputs
        ui.horizontal(|ui| {
            ui.add_sized(
                [90.0, 20.0],
                egui::TextEdit::singleline(&mut self.interaction.temp_action_key)
                    .hint_text("name"),
            );
            ui.add_sized(
                [110.0, 20.0],
                egui::TextEdit::singleline(&mut self.interaction.temp_action_value)
                    .hint_text("parameter"),
            );
            if ui.button("Add").clicked() {
                let key = self.interaction.temp_action_key.trim().to_string();
                if !key.is_empty() {
                    if let Some(node_mut) = self.diagram.nodes.get_mut(&node_id) {
                        node_mut
                            .actions
                            .insert(key, self.interaction.temp_action_value.trim().to_string());
                        self.interaction.temp_action_key.clear();
                        self.interaction.temp_action_value.clear();
                        self.file.has_unsaved_changes = true;
                    }
                }
            }
        });
    }

    /// Renders edge properties in the properties panel.
    fn draw_edge_properties(&self, ui: &mut egui::Ui, edge: &DiagramEdge) {
        ui.label("Type: Edge");
        ui.separator();

        if let Some(source) = self.diagram.nodes.get(&edge.source) {
            ui.label(format!("From: {}", source.name));
        } else {
            ui.label("From: (node not found)");
        }

        if let Some(target) = self.diagram.nodes.get(&edge.target) {
            ui.label(format!("To: {}", target.name));
        } else {
            ui.label("To: (node not found)");
        }

        ui.separator();
        ui.colored_label(egui::Color32::GRAY, "Press Delete to remove");
    }

    /// Renders information shown when nothing is selected.
    fn draw_no_selection_info(&self, ui: &mut egui::Ui) {
        ui.label("No element selected");
        ui.separator();
        ui.label("Left-click on an element to select it");
        ui.label("Right-click on canvas to create elements");
        ui.label("Shift-drag from a node to connect it");
        ui.label("Middle-click and drag to pan");
    }

    /// Renders the name editing field for a node.
    ///
    /// Edits are staged in a temporary buffer and committed on Enter or when
    /// the field loses focus, so a half-typed name never hits the diagram.
    fn draw_name_editor(&mut self, ui: &mut egui::Ui, selected_id: NodeId) {
        let response = ui.text_edit_singleline(&mut self.interaction.temp_node_name);

        // Only request focus on the first frame of editing
        if !self.interaction.focus_requested_for_edit {
            response.request_focus();
            self.interaction.focus_requested_for_edit = true;
        }

        // Select all text when flag is set and field has focus
        if self.interaction.should_select_text && response.has_focus() {
            self.interaction.should_select_text = false;
            self.select_all_text_in_field(ui, response.id);
        }

        // Handle Enter key to save changes
        if response.has_focus() && ui.input(|i| i.key_pressed(egui::Key::Enter)) {
            self.save_node_name_change(selected_id);
        }

        // Save changes when focus is lost (but not via Enter, handled above)
        if response.lost_focus() && !ui.input(|i| i.key_pressed(egui::Key::Enter)) {
            self.save_node_name_change(selected_id);
        }
    }

    /// Selects all text in a text edit field using egui's internal state.
    fn select_all_text_in_field(&self, ui: &mut egui::Ui, field_id: egui::Id) {
        ui.memory_mut(|mem| {
            let state = mem
                .data
                .get_temp_mut_or_default::<egui::text_edit::TextEditState>(field_id);
            let text_len = self.interaction.temp_node_name.len();
            state
                .cursor
                .set_char_range(Some(egui::text::CCursorRange::two(
                    egui::text::CCursor::new(0),
                    egui::text::CCursor::new(text_len),
                )));
        });
    }

    /// Starts editing the name of the specified node.
    pub(crate) fn start_editing_node_name(&mut self, node_id: NodeId, current_name: &str) {
        self.interaction.editing_node_name = Some(node_id);
        self.interaction.temp_node_name = current_name.to_string();
        self.interaction.should_select_text = true;
        self.interaction.focus_requested_for_edit = false;
    }

    /// Commits the staged name edit to the node, recording undo when the
    /// name actually changed.
    fn save_node_name_change(&mut self, node_id: NodeId) {
        if let Some(node) = self.diagram.nodes.get_mut(&node_id) {
            let old_name = node.name.clone();
            let new_name = self.interaction.temp_node_name.clone();

            if old_name != new_name {
                self.undo_history.push_action(UndoAction::NodeRenamed {
                    node_id,
                    old_name,
                    new_name: new_name.clone(),
                });
                node.name = new_name;
                self.file.has_unsaved_changes = true;
            }
        }
        self.interaction.editing_node_name = None;
    }

    /// Renders the unsaved-changes confirmation dialog.
    fn draw_unsaved_dialog(&mut self, ctx: &egui::Context) {
        let title = match self.file.pending_confirm_action {
            Some(PendingConfirmAction::Quit) => "Unsaved changes - Quit?",
            Some(PendingConfirmAction::New) => "Unsaved changes - Create New?",
            Some(PendingConfirmAction::Open) => "Unsaved changes - Open File?",
            None => "Unsaved changes",
        };
        egui::Window::new(title)
            .collapsible(false)
            .resizable(false)
            .anchor(egui::Align2::CENTER_CENTER, egui::vec2(0.0, 0.0))
            .show(ctx, |ui| {
                ui.label("You have unsaved changes. Are you sure you want to continue?");
                ui.horizontal(|ui| {
                    let confirm_label = match self.file.pending_confirm_action {
                        Some(PendingConfirmAction::Quit) => "Discard and Quit",
                        Some(PendingConfirmAction::New) => "Discard and Create New",
                        Some(PendingConfirmAction::Open) => "Discard and Open",
                        None => "Discard",
                    };
                    if ui.button(confirm_label).clicked() {
                        match self.file.pending_confirm_action {
                            Some(PendingConfirmAction::New) => {
                                self.new_diagram();
                            }
                            Some(PendingConfirmAction::Open) => {
                                self.load_diagram();
                            }
                            Some(PendingConfirmAction::Quit) => {
                                // Allow one close request to pass uninterrupted
                                self.file.allow_close_on_next_request = true;
                                ctx.send_viewport_cmd(egui::ViewportCommand::Close);
                            }
                            None => {}
                        }
                        self.file.show_unsaved_dialog = false;
                        self.file.pending_confirm_action = None;
                    }
                    if ui.button("Cancel").clicked() {
                        self.file.show_unsaved_dialog = false;
                        self.file.pending_confirm_action = None;
                    }
                });
            });
    }

    /// Renders the right-click context menu. Its entries depend on what was
    /// under the cursor when it opened.
    fn draw_context_menu(&mut self, ui: &mut egui::Ui) {
        let screen_pos = egui::pos2(
            self.context_menu.screen_pos.0,
            self.context_menu.screen_pos.1,
        );

        let area_response = egui::Area::new(egui::Id::new("context_menu"))
            .fixed_pos(screen_pos)
            .show(ui.ctx(), |ui| {
                egui::Frame::popup(ui.style()).show(ui, |ui| {
                    ui.vertical(|ui| {
                        if let Some(node_id) = self.context_menu.node_under {
                            if ui.button("Connect to…").clicked() {
                                self.arm_connect_gesture(node_id);
                                self.context_menu.show = false;
                            }
                            if self.interaction.selected_nodes.len() == 2 {
                                if ui.button("Connect Selected").clicked() {
                                    let source = self.interaction.selected_nodes[0];
                                    let target = self.interaction.selected_nodes[1];
                                    self.connect_nodes(source, target);
                                    self.context_menu.show = false;
                                }
                            }
                            ui.separator();
                            if ui.button("Delete Node").clicked() {
                                self.delete_node_with_undo(node_id);
                                self.context_menu.show = false;
                            }
                        } else if let Some(edge_id) = self.context_menu.edge_under {
                            if ui.button("Delete Edge").clicked() {
                                self.delete_edge_with_undo(edge_id);
                                self.context_menu.show = false;
                            }
                        } else {
                            ui.label("Create Element:");
                            ui.separator();
                            for kind in NodeKind::ALL {
                                if ui.button(kind.label()).clicked() {
                                    self.create_node_at(kind, self.context_menu.world_pos);
                                    self.context_menu.show = false;
                                }
                            }
                        }

                        ui.separator();
                        if ui.button("Cancel").clicked() {
                            self.context_menu.show = false;
                        }
                    });
                })
            });

        // Handle click-outside-to-close after the first frame
        if !self.context_menu.just_opened && ui.input(|i| i.pointer.primary_clicked()) {
            if let Some(click_pos) = ui.input(|i| i.pointer.interact_pos()) {
                if !area_response.response.rect.contains(click_pos) {
                    self.context_menu.show = false;
                }
            }
        }

        self.context_menu.just_opened = false;
    }

    /// Renders the main canvas area and handles user interactions on it.
    fn draw_canvas(&mut self, ui: &mut egui::Ui) {
        let (response, painter) =
            ui.allocate_painter(ui.available_size(), egui::Sense::click_and_drag());

        // Initialize canvas to center the origin on first frame
        if !self.canvas.centered {
            self.canvas.offset = response.rect.center().to_vec2();
            self.canvas.centered = true;
        }

        // Accept a palette drop: the payload is the element-type name
        if let Some(payload) = response.dnd_release_payload::<PaletteDrag>() {
            if let Some(pointer) = ui.input(|i| i.pointer.interact_pos()) {
                let world_pos = self.screen_to_world(pointer);
                self.handle_palette_drop(&payload.0, world_pos);
            }
        }

        // Handle canvas panning with middle mouse button or Ctrl+drag
        self.handle_canvas_panning(ui, &response);

        // Handle scroll wheel zooming
        self.handle_canvas_zoom(ui, &response);

        // Handle selection, context menu, and marquee start/update.
        // Runs before node dragging so marquee gets priority over node drag.
        self.handle_canvas_interactions(ui, &response);

        // Handle node dragging and the connection gesture
        self.handle_node_dragging(ui, &response);

        // Render all diagram elements (including marquee rectangle if active)
        self.render_diagram_elements(&painter, response.rect);

        // Show context menu if active
        if self.context_menu.show {
            self.draw_context_menu(ui);
        }
    }

    /// Handles canvas click interactions for selection, marquee and the
    /// context menu.
    fn handle_canvas_interactions(&mut self, ui: &mut egui::Ui, response: &egui::Response) {
        let gesture_armed =
            matches!(self.interaction.connect_gesture, ConnectGesture::Armed { .. });

        // Right-click: an armed gesture aborts; otherwise open the menu
        if response.secondary_clicked()
            && !self.interaction.is_panning
            && self.interaction.dragging_node.is_none()
        {
            if gesture_armed {
                self.abort_connect_gesture();
                return;
            }
            if let Some(screen_pos) = response.interact_pointer_pos() {
                let world_pos = self.screen_to_world(screen_pos);
                self.context_menu.screen_pos = (screen_pos.x, screen_pos.y);
                self.context_menu.world_pos = (world_pos.x, world_pos.y);
                self.context_menu.node_under = self.find_node_at_position(world_pos);
                self.context_menu.edge_under = if self.context_menu.node_under.is_none() {
                    self.find_edge_at_position(world_pos)
                } else {
                    None
                };
                self.context_menu.show = true;
                self.context_menu.just_opened = true;
            }
            return;
        }

        // While a gesture is armed, pointer motion feeds the preview stub and
        // resolution happens on release; skip selection and marquee entirely
        if gesture_armed {
            if let Some(pos) = ui.input(|i| i.pointer.hover_pos()) {
                self.interaction.gesture_pos = Some(pos);
            }
            return;
        }

        // Marquee selection handling: primary down on empty space starts one
        if ui.input(|i| i.pointer.primary_down())
            && !self.interaction.is_panning
            && self.interaction.dragging_node.is_none()
            && self.interaction.pending_shift_connection_from.is_none()
        {
            if let Some(pos) = response.interact_pointer_pos() {
                if self.interaction.marquee_start.is_some() {
                    self.interaction.marquee_end = Some(pos);
                } else {
                    let world_pos = self.screen_to_world(pos);
                    let over_node = self.find_node_at_position(world_pos).is_some();
                    let over_edge = self.find_edge_at_position(world_pos).is_some();
                    if !over_node && !over_edge {
                        self.interaction.marquee_start = Some(pos);
                        self.interaction.marquee_end = Some(pos);
                        self.interaction.marquee_additive = ui.input(|i| i.modifiers.shift);
                        if !self.interaction.marquee_additive {
                            self.interaction.clear_selection();
                        }
                    }
                }
            }
        } else if let (Some(start_screen), Some(end_screen)) =
            (self.interaction.marquee_start, self.interaction.marquee_end)
        {
            // On release: finalize marquee selection by node centers
            let rect_screen = egui::Rect::from_two_pos(start_screen, end_screen);
            let min_world = self.screen_to_world(rect_screen.min);
            let max_world = self.screen_to_world(rect_screen.max);
            let world_rect = egui::Rect::from_min_max(min_world, max_world);

            if !self.interaction.marquee_additive {
                self.interaction.selected_nodes.clear();
            }
            for (id, node) in &self.diagram.nodes {
                let center = egui::pos2(node.position.0, node.position.1);
                if world_rect.contains(center) && !self.interaction.selected_nodes.contains(id) {
                    self.interaction.selected_nodes.push(*id);
                }
            }
            self.interaction.sync_single_selection();

            self.interaction.marquee_start = None;
            self.interaction.marquee_end = None;
            self.interaction.marquee_additive = false;
        }

        // Left-click for selection (only if not dragging or panning)
        if response.clicked()
            && !self.interaction.is_panning
            && self.interaction.dragging_node.is_none()
        {
            // A pending shift-press resolves in the node-dragging logic
            if self.interaction.pending_shift_connection_from.is_some() {
                return;
            }
            if let Some(pos) = response.interact_pointer_pos() {
                let world_pos = self.screen_to_world(pos);

                if let Some(node_id) = self.find_node_at_position(world_pos) {
                    self.interaction.selected_node = Some(node_id);
                    self.interaction.selected_nodes.clear();
                    self.interaction.selected_nodes.push(node_id);
                    self.interaction.selected_edge = None;
                    self.interaction.editing_node_name = None;
                } else if let Some(edge_id) = self.find_edge_at_position(world_pos) {
                    // Shift-click adds the edge to the node selection
                    self.interaction.selected_edge = Some(edge_id);
                    if !ui.input(|i| i.modifiers.shift) {
                        self.interaction.selected_node = None;
                        self.interaction.selected_nodes.clear();
                    }
                    self.interaction.editing_node_name = None;
                } else {
                    self.interaction.clear_selection();
                }
            }
        }
    }

    /// Performs an undo operation.
    pub(crate) fn perform_undo(&mut self) {
        if let Some(action) = self.undo_history.pop_undo() {
            if let Some(redo_action) = self.diagram.apply_undo(&action) {
                self.undo_history.push_redo(redo_action);
                self.file.has_unsaved_changes = true;
                self.interaction.clear_selection();
            }
        }
    }

    /// Performs a redo operation.
    pub(crate) fn perform_redo(&mut self) {
        if let Some(action) = self.undo_history.pop_redo() {
            if let Some(undo_action) = self.diagram.apply_redo(&action) {
                self.undo_history.push_undo(undo_action);
                // push_action would clear the redo stack, so push_undo is
                // used here instead
                self.file.has_unsaved_changes = true;
                self.interaction.clear_selection();
            }
        }
    }
}
