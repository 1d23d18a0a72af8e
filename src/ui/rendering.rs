//! Canvas rendering functionality for nodes, edges, and grid.
//!
//! This module handles all drawing operations including the grid background,
//! edge lines with directional arrows, the connection gesture preview, and
//! the shape-per-kind node visuals.

use super::state::{BpmnApp, ConnectGesture};
use crate::types::*;
use eframe::egui;
use eframe::epaint::{EllipseShape, StrokeKind};

impl BpmnApp {
    /// Renders all diagram elements (grid, edges, and nodes) on the canvas.
    ///
    /// Elements are drawn in layers: grid first (background), then edges,
    /// then nodes (foreground), ensuring proper visual hierarchy. Edge
    /// geometry is recomputed from node positions every frame, so a moved
    /// node's edges follow it with no separate update step.
    pub fn render_diagram_elements(&self, painter: &egui::Painter, canvas_rect: egui::Rect) {
        // Draw grid first (behind everything) if enabled
        if self.canvas.show_grid {
            self.draw_grid(painter, canvas_rect);
        }

        // Draw edges second (behind nodes)
        for edge in &self.diagram.edges {
            let is_selected = self.interaction.selected_edge == Some(edge.id);
            self.draw_edge(painter, edge, is_selected);
        }

        // Draw the gesture stub if a connection is being drawn
        if let ConnectGesture::Armed { source } = self.interaction.connect_gesture {
            if let Some(gesture_pos) = self.interaction.gesture_pos {
                self.draw_gesture_preview(painter, source, gesture_pos);
            }
        }

        // Draw nodes on top
        for node in self.diagram.nodes.values() {
            self.draw_node(painter, node);
        }

        // Draw marquee selection rectangle if active
        if let (Some(start), Some(end)) =
            (self.interaction.marquee_start, self.interaction.marquee_end)
        {
            let rect = egui::Rect::from_two_pos(start, end);
            let fill = egui::Color32::from_rgba_unmultiplied(100, 150, 255, 40);
            let stroke = egui::Stroke::new(1.5, egui::Color32::from_rgb(100, 150, 255));
            painter.rect_filled(rect, 0.0, fill);
            painter.rect_stroke(rect, 0.0, stroke, StrokeKind::Inside);
        }
    }

    /// Draws a zoom-aware grid on the canvas for visual reference.
    ///
    /// Grid lines are drawn every 20 world units. The grid automatically
    /// adjusts for zoom level and only draws when the grid spacing is
    /// visible. Axis lines (x=0, y=0) are drawn more prominently at higher
    /// zoom levels.
    pub fn draw_grid(&self, painter: &egui::Painter, canvas_rect: egui::Rect) {
        let grid_size = crate::constants::GRID_SIZE;
        let grid_color = egui::Color32::from_rgba_unmultiplied(128, 128, 128, 32);
        let stroke = egui::Stroke::new(1.0, grid_color);

        // Calculate world space bounds from screen space
        let top_left_world = self.screen_to_world(canvas_rect.min);
        let bottom_right_world = self.screen_to_world(canvas_rect.max);

        let start_x = (top_left_world.x / grid_size).floor() * grid_size;
        let end_x = (bottom_right_world.x / grid_size).ceil() * grid_size;
        let start_y = (top_left_world.y / grid_size).floor() * grid_size;
        let end_y = (bottom_right_world.y / grid_size).ceil() * grid_size;

        // Only draw grid if zoom level makes it reasonable to see
        let screen_grid_size = grid_size * self.canvas.zoom_factor;
        if screen_grid_size < 2.0 {
            return;
        }

        // Vertical grid lines
        let mut x = start_x;
        while x <= end_x {
            let screen_x = self.world_to_screen(egui::pos2(x, 0.0)).x;
            if screen_x >= canvas_rect.min.x && screen_x <= canvas_rect.max.x {
                painter.line_segment(
                    [
                        egui::pos2(screen_x, canvas_rect.min.y),
                        egui::pos2(screen_x, canvas_rect.max.y),
                    ],
                    stroke,
                );
            }
            x += grid_size;
        }

        // Horizontal grid lines
        let mut y = start_y;
        while y <= end_y {
            let screen_y = self.world_to_screen(egui::pos2(0.0, y)).y;
            if screen_y >= canvas_rect.min.y && screen_y <= canvas_rect.max.y {
                painter.line_segment(
                    [
                        egui::pos2(canvas_rect.min.x, screen_y),
                        egui::pos2(canvas_rect.max.x, screen_y),
                    ],
                    stroke,
                );
            }
            y += grid_size;
        }

        // Draw axis lines more prominently when zoomed in
        if screen_grid_size > 10.0 {
            let axis_color = egui::Color32::from_rgba_unmultiplied(128, 128, 128, 80);
            let axis_stroke = egui::Stroke::new(1.5, axis_color);

            let origin_screen = self.world_to_screen(egui::pos2(0.0, 0.0));
            if origin_screen.y >= canvas_rect.min.y && origin_screen.y <= canvas_rect.max.y {
                painter.line_segment(
                    [
                        egui::pos2(canvas_rect.min.x, origin_screen.y),
                        egui::pos2(canvas_rect.max.x, origin_screen.y),
                    ],
                    axis_stroke,
                );
            }
            if origin_screen.x >= canvas_rect.min.x && origin_screen.x <= canvas_rect.max.x {
                painter.line_segment(
                    [
                        egui::pos2(origin_screen.x, canvas_rect.min.y),
                        egui::pos2(origin_screen.x, canvas_rect.max.y),
                    ],
                    axis_stroke,
                );
            }
        }
    }

    /// Renders an edge between two nodes as a line with a directional arrow
    /// at its center. The endpoint positions are read fresh from the nodes,
    /// never cached.
    pub fn draw_edge(&self, painter: &egui::Painter, edge: &DiagramEdge, is_selected: bool) {
        let (Some(source), Some(target)) = (
            self.diagram.nodes.get(&edge.source),
            self.diagram.nodes.get(&edge.target),
        ) else {
            return;
        };

        let start_pos = self.world_to_screen(egui::pos2(source.position.0, source.position.1));
        let end_pos = self.world_to_screen(egui::pos2(target.position.0, target.position.1));

        let (line_color, line_width) = if is_selected {
            (egui::Color32::from_rgb(100, 150, 255), 3.0)
        } else {
            (egui::Color32::DARK_GRAY, 2.0)
        };

        painter.line_segment(
            [start_pos, end_pos],
            egui::Stroke::new(line_width, line_color),
        );

        self.draw_arrow_at_center(painter, start_pos, end_pos, line_color);
    }

    /// Draws a directional arrow at the center of an edge line.
    ///
    /// The arrow is a filled triangle pointing from source to target, scaled
    /// with the current zoom level.
    fn draw_arrow_at_center(
        &self,
        painter: &egui::Painter,
        start: egui::Pos2,
        end: egui::Pos2,
        color: egui::Color32,
    ) {
        let center = start + (end - start) * 0.5;
        let direction = (end - start).normalized();

        let arrow_size = 8.0 * self.canvas.zoom_factor;
        let arrow_width = 6.0 * self.canvas.zoom_factor;

        let perpendicular = egui::vec2(-direction.y, direction.x);

        let arrow_tip = center + direction * arrow_size;
        let arrow_left = center - direction * arrow_size + perpendicular * arrow_width;
        let arrow_right = center - direction * arrow_size - perpendicular * arrow_width;

        painter.add(egui::Shape::convex_polygon(
            vec![arrow_tip, arrow_left, arrow_right],
            color,
            egui::Stroke::NONE,
        ));
    }

    /// Renders the dashed stub for an armed connection gesture, from the
    /// source node's center to the current pointer position.
    ///
    /// The stub is blue when the pointer hovers a valid target and red over
    /// the source node itself (a self-loop is never created).
    pub fn draw_gesture_preview(
        &self,
        painter: &egui::Painter,
        source: NodeId,
        to_screen_pos: egui::Pos2,
    ) {
        let Some(source_node) = self.diagram.nodes.get(&source) else {
            return;
        };
        let from_screen =
            self.world_to_screen(egui::pos2(source_node.position.0, source_node.position.1));

        let to_world_pos = self.screen_to_world(to_screen_pos);
        let is_valid = match self.find_node_at_position(to_world_pos) {
            Some(target) => target != source,
            None => true,
        };

        let color = if is_valid {
            egui::Color32::from_rgb(100, 150, 255)
        } else {
            egui::Color32::from_rgb(255, 80, 80)
        };

        let stroke = egui::Stroke::new(2.0, color);
        painter.extend(egui::Shape::dashed_line(
            &[from_screen, to_screen_pos],
            stroke,
            6.0,
            4.0,
        ));
        painter.circle_filled(to_screen_pos, 4.0, color);
    }

    /// Renders a single diagram node with its kind-specific shape and color.
    ///
    /// Start events are green ellipses, tasks blue rounded rectangles, and
    /// gateways orange diamonds. Selected nodes have a yellow border and
    /// dragged nodes an orange one.
    pub fn draw_node(&self, painter: &egui::Painter, node: &DiagramNode) {
        let node_size = egui::vec2(crate::constants::NODE_WIDTH, crate::constants::NODE_HEIGHT);

        let world_pos = egui::pos2(node.position.0, node.position.1);
        let screen_pos = self.world_to_screen(world_pos);
        let scaled_size = node_size * self.canvas.zoom_factor;
        let rect = egui::Rect::from_center_size(screen_pos, scaled_size);

        let mut color = match node.kind {
            NodeKind::Start => egui::Color32::from_rgb(76, 175, 80),
            NodeKind::Task => egui::Color32::from_rgb(33, 150, 243),
            NodeKind::Gateway => egui::Color32::from_rgb(255, 152, 0),
        };

        // Darken color if being dragged
        if Some(node.id) == self.interaction.dragging_node {
            color = egui::Color32::from_rgba_unmultiplied(
                (color.r() as f32 * 0.8) as u8,
                (color.g() as f32 * 0.8) as u8,
                (color.b() as f32 * 0.8) as u8,
                color.a(),
            );
        }

        let (stroke_color, stroke_width) = if Some(node.id) == self.interaction.dragging_node {
            (egui::Color32::from_rgb(255, 165, 0), 4.0) // Orange for dragging
        } else if Some(node.id) == self.interaction.selected_node
            || self.interaction.selected_nodes.contains(&node.id)
        {
            (egui::Color32::YELLOW, 3.0) // Yellow for selected
        } else {
            (egui::Color32::BLACK, 2.0) // Black for normal
        };
        let stroke = egui::Stroke::new(stroke_width, stroke_color);

        match node.kind {
            NodeKind::Start => {
                let radius = scaled_size.min_elem() / 2.0;
                painter.add(egui::Shape::Ellipse(EllipseShape {
                    center: screen_pos,
                    radius: egui::vec2(radius, radius),
                    fill: color,
                    stroke,
                }));
            }
            NodeKind::Task => {
                let corner_radius = 5.0 * self.canvas.zoom_factor;
                painter.rect_filled(rect, corner_radius, color);
                painter.rect_stroke(rect, corner_radius, stroke, StrokeKind::Outside);
            }
            NodeKind::Gateway => {
                let points = vec![
                    egui::pos2(rect.center().x, rect.min.y),
                    egui::pos2(rect.max.x, rect.center().y),
                    egui::pos2(rect.center().x, rect.max.y),
                    egui::pos2(rect.min.x, rect.center().y),
                ];
                painter.add(egui::Shape::convex_polygon(points, color, stroke));
            }
        }

        self.draw_node_text(painter, node, screen_pos, scaled_size);
    }

    /// Renders the node's name text, wrapped to fit and vertically centered.
    /// Font size scales with zoom level for readability.
    fn draw_node_text(
        &self,
        painter: &egui::Painter,
        node: &DiagramNode,
        pos: egui::Pos2,
        size: egui::Vec2,
    ) {
        let text_rect = egui::Rect::from_center_size(
            pos,
            egui::vec2(
                size.x - 10.0 * self.canvas.zoom_factor,
                size.y - 20.0 * self.canvas.zoom_factor,
            ),
        );

        let base_font_size = 12.0;
        let scaled_font_size = (base_font_size * self.canvas.zoom_factor).clamp(8.0, 48.0);
        let font_id = egui::FontId::proportional(scaled_font_size);

        let max_width = text_rect.width();
        let wrapped_text = self.wrap_text(&node.name, max_width, &font_id, painter);

        let line_height = painter.fonts_mut(|f| f.row_height(&font_id));
        let total_height = line_height * wrapped_text.len() as f32;
        let start_y = text_rect.center().y - total_height / 2.0;

        for (i, line) in wrapped_text.iter().enumerate() {
            let line_pos = egui::pos2(text_rect.center().x, start_y + i as f32 * line_height);
            painter.text(
                line_pos,
                egui::Align2::CENTER_CENTER,
                line,
                font_id.clone(),
                egui::Color32::BLACK,
            );
        }
    }

    /// Wraps text to fit within the specified width, returning a vector of
    /// lines. Breaks at word boundaries; a single over-long word goes on its
    /// own line anyway.
    pub fn wrap_text(
        &self,
        text: &str,
        max_width: f32,
        font_id: &egui::FontId,
        painter: &egui::Painter,
    ) -> Vec<String> {
        let mut lines = Vec::new();
        let words: Vec<&str> = text.split_whitespace().collect();

        if words.is_empty() {
            return vec![text.to_string()];
        }

        let mut current_line = String::new();

        for word in words {
            let test_line = if current_line.is_empty() {
                word.to_string()
            } else {
                format!("{} {}", current_line, word)
            };

            let text_width = painter
                .layout_no_wrap(test_line.clone(), font_id.clone(), egui::Color32::BLACK)
                .size()
                .x;

            if text_width <= max_width {
                current_line = test_line;
            } else if !current_line.is_empty() {
                lines.push(current_line);
                current_line = word.to_string();
            } else {
                // Single word too long, add it anyway
                lines.push(word.to_string());
            }
        }

        if !current_line.is_empty() {
            lines.push(current_line);
        }

        if lines.is_empty() {
            lines.push(text.to_string());
        }

        lines
    }
}
