use super::state::FileOperationResult;
use super::*;
use crate::types::{Diagram, DiagramNode, NodeKind};
use eframe::egui;

/// Run a single headless egui frame with the provided input events and closure.
fn run_frame(
    ctx: &egui::Context,
    events: Vec<egui::Event>,
    modifiers: egui::Modifiers,
    app: &mut BpmnApp,
) {
    let mut raw = egui::RawInput::default();
    raw.screen_rect = Some(egui::Rect::from_min_size(
        egui::Pos2::ZERO,
        egui::vec2(1200.0, 800.0),
    ));
    raw.modifiers = modifiers;
    raw.events = events;
    let _ = ctx.run(raw, |ctx| {
        ctx.set_visuals(egui::Visuals::dark());
        egui::CentralPanel::default().show(ctx, |ui| app.draw_canvas(ui));
    });
}

/// App with a deterministic canvas: screen coordinates equal world
/// coordinates, and the first-frame centering is already done.
fn test_app() -> BpmnApp {
    let mut app = BpmnApp::default();
    app.canvas.offset = egui::Vec2::ZERO;
    app.canvas.zoom_factor = 1.0;
    app.canvas.centered = true;
    app
}

fn press(pos: egui::Pos2) -> egui::Event {
    egui::Event::PointerButton {
        pos,
        button: egui::PointerButton::Primary,
        pressed: true,
        modifiers: egui::Modifiers::NONE,
    }
}

fn release(pos: egui::Pos2) -> egui::Event {
    egui::Event::PointerButton {
        pos,
        button: egui::PointerButton::Primary,
        pressed: false,
        modifiers: egui::Modifiers::NONE,
    }
}

#[test]
fn undo_operation_removes_last_created_node() {
    let mut app = test_app();

    let created_id = app.create_node_at(NodeKind::Task, (100.0, 100.0));
    assert!(app.diagram.nodes.contains_key(&created_id));
    assert_eq!(app.interaction.selected_node, Some(created_id));

    app.perform_undo();

    assert!(!app.diagram.nodes.contains_key(&created_id));
}

#[test]
fn redo_restores_undone_node_creation() {
    let mut app = test_app();

    let created_id = app.create_node_at(NodeKind::Gateway, (60.0, 80.0));
    app.perform_undo();
    assert!(!app.diagram.nodes.contains_key(&created_id));

    app.perform_redo();
    let node = app
        .diagram
        .nodes
        .get(&created_id)
        .expect("redo should restore the node");
    assert_eq!(node.kind, NodeKind::Gateway);
    assert_eq!(node.position, (60.0, 80.0));
}

#[test]
fn clicking_canvas_selects_node() {
    let mut app = test_app();

    let world_pos = (200.0_f32, 150.0_f32);
    let node_id = app
        .diagram
        .add_node(DiagramNode::new(NodeKind::Task, world_pos));

    let click_pos = egui::pos2(world_pos.0, world_pos.1);
    let ctx = egui::Context::default();

    // Establish hover, then press over the node center
    run_frame(
        &ctx,
        vec![egui::Event::PointerMoved(click_pos)],
        egui::Modifiers::NONE,
        &mut app,
    );
    run_frame(
        &ctx,
        vec![egui::Event::PointerMoved(click_pos), press(click_pos)],
        egui::Modifiers::NONE,
        &mut app,
    );

    assert_eq!(app.interaction.selected_node, Some(node_id));
}

#[test]
fn click_empty_space_clears_selection() {
    let mut app = test_app();

    let node_id = app
        .diagram
        .add_node(DiagramNode::new(NodeKind::Start, (220.0, 160.0)));
    app.interaction.selected_node = Some(node_id);
    app.interaction.selected_nodes.push(node_id);

    let empty_pos = egui::pos2(600.0, 500.0);
    let ctx = egui::Context::default();

    for events in [
        vec![egui::Event::PointerMoved(empty_pos)],
        vec![press(empty_pos)],
        vec![release(empty_pos)],
    ] {
        run_frame(&ctx, events, egui::Modifiers::NONE, &mut app);
    }

    assert!(app.interaction.selected_node.is_none());
    assert!(app.interaction.selected_nodes.is_empty());
    assert!(app.interaction.selected_edge.is_none());
}

#[test]
fn shift_drag_creates_edge_between_nodes() {
    let mut app = test_app();

    let source_id = app
        .diagram
        .add_node(DiagramNode::new(NodeKind::Start, (160.0, 120.0)));
    let target_id = app
        .diagram
        .add_node(DiagramNode::new(NodeKind::Task, (360.0, 120.0)));

    let start = egui::pos2(160.0, 120.0);
    let end = egui::pos2(360.0, 120.0);
    let shift = egui::Modifiers {
        shift: true,
        ..Default::default()
    };

    let ctx = egui::Context::default();
    run_frame(&ctx, vec![egui::Event::PointerMoved(start)], egui::Modifiers::NONE, &mut app);
    run_frame(&ctx, vec![press(start)], shift, &mut app);
    run_frame(&ctx, vec![egui::Event::PointerMoved(end)], shift, &mut app);
    run_frame(&ctx, vec![release(end)], egui::Modifiers::NONE, &mut app);

    assert_eq!(app.diagram.edges.len(), 1, "one edge expected");
    let edge = &app.diagram.edges[0];
    assert_eq!(edge.source, source_id);
    assert_eq!(edge.target, target_id);
    assert_eq!(app.interaction.connect_gesture, ConnectGesture::Idle);
}

#[test]
fn gesture_released_on_empty_space_aborts_without_edge() {
    let mut app = test_app();

    app.diagram
        .add_node(DiagramNode::new(NodeKind::Start, (160.0, 120.0)));

    let start = egui::pos2(160.0, 120.0);
    let empty = egui::pos2(600.0, 500.0);
    let shift = egui::Modifiers {
        shift: true,
        ..Default::default()
    };

    let ctx = egui::Context::default();
    run_frame(&ctx, vec![egui::Event::PointerMoved(start)], egui::Modifiers::NONE, &mut app);
    run_frame(&ctx, vec![press(start)], shift, &mut app);
    run_frame(&ctx, vec![egui::Event::PointerMoved(empty)], shift, &mut app);
    run_frame(&ctx, vec![release(empty)], egui::Modifiers::NONE, &mut app);

    assert!(app.diagram.edges.is_empty());
    assert_eq!(app.interaction.connect_gesture, ConnectGesture::Idle);
    assert!(app.interaction.gesture_pos.is_none());
}

#[test]
fn escape_aborts_armed_gesture() {
    let mut app = test_app();

    let source_id = app
        .diagram
        .add_node(DiagramNode::new(NodeKind::Task, (100.0, 100.0)));
    app.arm_connect_gesture(source_id);
    assert!(matches!(
        app.interaction.connect_gesture,
        ConnectGesture::Armed { .. }
    ));

    let ctx = egui::Context::default();
    let mut raw = egui::RawInput::default();
    raw.events = vec![egui::Event::Key {
        key: egui::Key::Escape,
        physical_key: Some(egui::Key::Escape),
        pressed: true,
        repeat: false,
        modifiers: egui::Modifiers::NONE,
    }];
    let _ = ctx.run(raw, |ctx| {
        app.handle_escape_key(ctx);
    });

    assert_eq!(app.interaction.connect_gesture, ConnectGesture::Idle);
    assert!(app.diagram.edges.is_empty());
}

#[test]
fn two_click_gesture_connects_source_to_target() {
    let mut app = test_app();

    let source_id = app
        .diagram
        .add_node(DiagramNode::new(NodeKind::Start, (100.0, 100.0)));
    let target_id = app
        .diagram
        .add_node(DiagramNode::new(NodeKind::Gateway, (300.0, 100.0)));

    // Arm from the context menu's "Connect to…" path, then resolve at the
    // target's position
    app.arm_connect_gesture(source_id);
    app.resolve_connect_gesture(egui::pos2(300.0, 100.0));

    assert_eq!(app.diagram.edges.len(), 1);
    assert_eq!(app.diagram.edges[0].source, source_id);
    assert_eq!(app.diagram.edges[0].target, target_id);
    assert_eq!(app.interaction.connect_gesture, ConnectGesture::Idle);
}

#[test]
fn gesture_on_source_node_itself_aborts() {
    let mut app = test_app();

    let source_id = app
        .diagram
        .add_node(DiagramNode::new(NodeKind::Task, (100.0, 100.0)));

    app.arm_connect_gesture(source_id);
    app.resolve_connect_gesture(egui::pos2(100.0, 100.0));

    assert!(app.diagram.edges.is_empty(), "self-loop must be rejected");
    assert_eq!(app.interaction.connect_gesture, ConnectGesture::Idle);
}

#[test]
fn arming_new_gesture_aborts_previous_one() {
    let mut app = test_app();

    let a = app
        .diagram
        .add_node(DiagramNode::new(NodeKind::Start, (0.0, 0.0)));
    let b = app
        .diagram
        .add_node(DiagramNode::new(NodeKind::Task, (200.0, 0.0)));

    app.arm_connect_gesture(a);
    app.arm_connect_gesture(b);

    assert_eq!(
        app.interaction.connect_gesture,
        ConnectGesture::Armed { source: b }
    );
    assert!(app.diagram.edges.is_empty());
}

#[test]
fn duplicate_connect_creates_only_one_edge() {
    let mut app = test_app();

    let a = app
        .diagram
        .add_node(DiagramNode::new(NodeKind::Start, (0.0, 0.0)));
    let b = app
        .diagram
        .add_node(DiagramNode::new(NodeKind::Task, (200.0, 0.0)));

    app.connect_nodes(a, b);
    app.connect_nodes(a, b);

    assert_eq!(app.diagram.edges.len(), 1);
    // The rejected attempt must not have recorded an undo entry either
    app.perform_undo();
    assert!(app.diagram.edges.is_empty());
    assert!(!app.undo_history.can_undo());
}

#[test]
fn palette_drop_creates_node_of_dropped_kind() {
    let mut app = test_app();

    app.handle_palette_drop("gateway", egui::pos2(140.0, 90.0));

    assert_eq!(app.diagram.nodes.len(), 1);
    let node = app.diagram.nodes.values().next().unwrap();
    assert_eq!(node.kind, NodeKind::Gateway);
    assert_eq!(node.name, "New Element");
    assert_eq!(node.position, (140.0, 90.0));
    assert!(app.error_message.is_none());
    // The new node is selected with its name open for editing
    assert_eq!(app.interaction.selected_node, Some(node.id));
    assert_eq!(app.interaction.editing_node_name, Some(node.id));
}

#[test]
fn palette_drop_with_unknown_type_is_rejected() {
    let mut app = test_app();

    app.handle_palette_drop("subprocess", egui::pos2(0.0, 0.0));

    assert!(app.diagram.nodes.is_empty(), "no node may be created");
    let message = app.error_message.as_deref().expect("error dialog expected");
    assert!(message.contains("subprocess"));
}

#[test]
fn deleting_selection_removes_nodes_and_incident_edges_atomically() {
    let mut app = test_app();

    let a = app
        .diagram
        .add_node(DiagramNode::new(NodeKind::Start, (0.0, 0.0)));
    let b = app
        .diagram
        .add_node(DiagramNode::new(NodeKind::Task, (200.0, 0.0)));
    let c = app
        .diagram
        .add_node(DiagramNode::new(NodeKind::Task, (400.0, 0.0)));
    app.diagram.connect(a, b).unwrap();
    app.diagram.connect(b, c).unwrap();

    app.interaction.selected_nodes = vec![a, b];
    app.delete_selection();

    // Both selected nodes are gone; b's edge to the surviving node cascaded
    assert_eq!(app.diagram.nodes.len(), 1);
    assert!(app.diagram.nodes.contains_key(&c));
    assert!(app.diagram.edges.is_empty());
    assert!(app.interaction.selected_nodes.is_empty());

    // A single undo restores the whole batch
    app.perform_undo();
    assert_eq!(app.diagram.nodes.len(), 3);
    assert_eq!(app.diagram.edges.len(), 2);
    assert_eq!(app.diagram.edges_of(&b).len(), 2);
}

#[test]
fn deleting_edge_keeps_endpoint_nodes() {
    let mut app = test_app();

    let a = app
        .diagram
        .add_node(DiagramNode::new(NodeKind::Start, (0.0, 0.0)));
    let b = app
        .diagram
        .add_node(DiagramNode::new(NodeKind::Task, (200.0, 0.0)));
    let edge_id = app.diagram.connect(a, b).unwrap();

    app.interaction.selected_edge = Some(edge_id);
    app.delete_edge_with_undo(edge_id);

    assert!(app.diagram.edges.is_empty());
    assert_eq!(app.diagram.nodes.len(), 2);
    assert!(app.interaction.selected_edge.is_none());

    app.perform_undo();
    assert_eq!(app.diagram.edges.len(), 1);
    assert_eq!(app.diagram.edges[0].id, edge_id);
}

#[test]
fn marquee_multi_selects_nodes_inside_rectangle() {
    let mut app = test_app();

    let n1 = app
        .diagram
        .add_node(DiagramNode::new(NodeKind::Task, (150.0, 120.0)));
    let n2 = app
        .diagram
        .add_node(DiagramNode::new(NodeKind::Task, (280.0, 180.0)));

    let start = egui::pos2(60.0, 40.0); // empty space
    let end = egui::pos2(360.0, 240.0); // covers both centers

    let ctx = egui::Context::default();
    for events in [
        vec![egui::Event::PointerMoved(start)],
        vec![press(start)],
        vec![egui::Event::PointerMoved(end)],
        vec![release(end)],
    ] {
        run_frame(&ctx, events, egui::Modifiers::NONE, &mut app);
    }

    let mut sel = app.interaction.selected_nodes.clone();
    sel.sort_by_key(|id| id.as_u128());
    let mut expected = vec![n1, n2];
    expected.sort_by_key(|id| id.as_u128());
    assert_eq!(sel, expected, "marquee should select both nodes");

    assert!(app.interaction.marquee_start.is_none());
    assert!(app.interaction.marquee_end.is_none());
}

#[test]
fn click_near_edge_selects_it() {
    let mut app = test_app();

    let a = app
        .diagram
        .add_node(DiagramNode::new(NodeKind::Start, (200.0, 200.0)));
    let b = app
        .diagram
        .add_node(DiagramNode::new(NodeKind::Task, (400.0, 220.0)));
    let edge_id = app.diagram.connect(a, b).unwrap();

    // A point near the mid-point, offset 5px perpendicular (threshold is 10)
    let mid = egui::pos2(300.0, 210.0);
    let dir = egui::vec2(200.0, 20.0).normalized();
    let near_point = mid + egui::vec2(-dir.y, dir.x) * 5.0;

    let ctx = egui::Context::default();
    for events in [
        vec![egui::Event::PointerMoved(near_point)],
        vec![press(near_point)],
        vec![release(near_point)],
    ] {
        run_frame(&ctx, events, egui::Modifiers::NONE, &mut app);
    }

    assert_eq!(app.interaction.selected_edge, Some(edge_id));
}

#[test]
fn dragging_node_records_single_undoable_move() {
    let mut app = test_app();

    let node_id = app
        .diagram
        .add_node(DiagramNode::new(NodeKind::Task, (260.0, 180.0)));

    let on_node = egui::pos2(260.0, 180.0);
    let drag_to = egui::pos2(340.0, 240.0);

    let ctx = egui::Context::default();
    for events in [
        vec![egui::Event::PointerMoved(on_node)],
        vec![press(on_node)],
        vec![egui::Event::PointerMoved(drag_to)],
        vec![release(drag_to)],
    ] {
        run_frame(&ctx, events, egui::Modifiers::NONE, &mut app);
    }

    let moved = app.diagram.nodes.get(&node_id).unwrap().position;
    assert_ne!(moved, (260.0, 180.0), "node should have moved");
    assert!(app.file.has_unsaved_changes);

    app.perform_undo();
    let restored = app.diagram.nodes.get(&node_id).unwrap().position;
    assert_eq!(restored, (260.0, 180.0), "undo should restore the position");
}

#[test]
fn starting_drag_on_node_does_not_start_marquee() {
    let mut app = test_app();

    app.diagram
        .add_node(DiagramNode::new(NodeKind::Task, (260.0, 180.0)));

    let on_node = egui::pos2(260.0, 180.0);
    let drag_to = egui::pos2(300.0, 200.0);

    let ctx = egui::Context::default();
    for events in [
        vec![egui::Event::PointerMoved(on_node)],
        vec![press(on_node)],
        vec![egui::Event::PointerMoved(drag_to)],
    ] {
        run_frame(&ctx, events, egui::Modifiers::NONE, &mut app);
    }

    assert!(app.interaction.marquee_start.is_none());
    assert_eq!(app.interaction.connect_gesture, ConnectGesture::Idle);
    assert!(app.interaction.dragging_node.is_some());
}

#[test]
fn command_primary_drag_pans_canvas_without_marquee() {
    let mut app = test_app();

    let start = egui::pos2(400.0, 300.0);
    let end = egui::pos2(450.0, 340.0);
    let cmd = egui::Modifiers {
        command: true,
        ..Default::default()
    };

    let ctx = egui::Context::default();
    run_frame(&ctx, vec![egui::Event::PointerMoved(start)], egui::Modifiers::NONE, &mut app);
    run_frame(&ctx, vec![press(start)], cmd, &mut app);
    let before = app.canvas.offset;
    run_frame(&ctx, vec![egui::Event::PointerMoved(end)], cmd, &mut app);
    run_frame(&ctx, vec![release(end)], egui::Modifiers::NONE, &mut app);

    assert!(
        (app.canvas.offset - before).length() > 0.0,
        "canvas offset should change when panning"
    );
    assert!(app.interaction.marquee_start.is_none());
}

#[test]
fn drawing_canvas_with_nodes_produces_shapes() {
    let mut app = test_app();
    app.canvas.show_grid = false;

    app.diagram
        .add_node(DiagramNode::new(NodeKind::Start, (50.0, 50.0)));
    app.diagram
        .add_node(DiagramNode::new(NodeKind::Gateway, (200.0, 50.0)));

    let ctx = egui::Context::default();
    let mut raw = egui::RawInput::default();
    raw.screen_rect = Some(egui::Rect::from_min_size(
        egui::Pos2::ZERO,
        egui::vec2(1200.0, 800.0),
    ));
    let out = ctx.run(raw, |ctx| {
        ctx.set_visuals(egui::Visuals::dark());
        egui::CentralPanel::default().show(ctx, |ui| app.draw_canvas(ui));
    });

    assert!(!out.shapes.is_empty(), "expected some shapes to be painted");
}

#[test]
fn deleting_mixed_selection_removes_nodes_and_edge_in_one_batch() {
    let mut app = test_app();

    let a = app
        .diagram
        .add_node(DiagramNode::new(NodeKind::Start, (0.0, 0.0)));
    let b = app
        .diagram
        .add_node(DiagramNode::new(NodeKind::Task, (200.0, 0.0)));
    let c = app
        .diagram
        .add_node(DiagramNode::new(NodeKind::Task, (0.0, 200.0)));
    let d = app
        .diagram
        .add_node(DiagramNode::new(NodeKind::Gateway, (200.0, 200.0)));
    app.diagram.connect(a, b).unwrap();
    let far_edge = app.diagram.connect(c, d).unwrap();

    // Two nodes plus an edge not incident to either of them
    app.interaction.selected_nodes = vec![a, b];
    app.interaction.selected_edge = Some(far_edge);
    app.delete_selection();

    assert_eq!(app.diagram.nodes.len(), 2);
    assert!(app.diagram.nodes.contains_key(&c));
    assert!(app.diagram.nodes.contains_key(&d));
    assert!(app.diagram.edges.is_empty());
    assert!(app.interaction.selected_edge.is_none());

    // One undo brings the whole batch back
    app.perform_undo();
    assert_eq!(app.diagram.nodes.len(), 4);
    assert_eq!(app.diagram.edges.len(), 2);
}

#[test]
fn shift_click_edge_adds_it_to_node_selection() {
    let mut app = test_app();

    let a = app
        .diagram
        .add_node(DiagramNode::new(NodeKind::Start, (200.0, 200.0)));
    let b = app
        .diagram
        .add_node(DiagramNode::new(NodeKind::Task, (400.0, 200.0)));
    let edge_id = app.diagram.connect(a, b).unwrap();
    let c = app
        .diagram
        .add_node(DiagramNode::new(NodeKind::Task, (200.0, 400.0)));

    let on_c = egui::pos2(200.0, 400.0);
    let on_edge = egui::pos2(300.0, 200.0);
    let shift = egui::Modifiers {
        shift: true,
        ..Default::default()
    };

    let ctx = egui::Context::default();
    for events in [
        vec![egui::Event::PointerMoved(on_c)],
        vec![press(on_c)],
        vec![release(on_c)],
    ] {
        run_frame(&ctx, events, egui::Modifiers::NONE, &mut app);
    }
    assert_eq!(app.interaction.selected_nodes, vec![c]);

    run_frame(&ctx, vec![egui::Event::PointerMoved(on_edge)], shift, &mut app);
    run_frame(&ctx, vec![press(on_edge)], shift, &mut app);
    run_frame(&ctx, vec![release(on_edge)], shift, &mut app);

    assert_eq!(app.interaction.selected_nodes, vec![c]);
    assert_eq!(app.interaction.selected_edge, Some(edge_id));
}

#[test]
fn completed_load_replaces_diagram_and_resets_gesture() {
    let mut app = test_app();

    let stale_id = app
        .diagram
        .add_node(DiagramNode::new(NodeKind::Task, (0.0, 0.0)));
    app.arm_connect_gesture(stale_id);

    let mut loaded = Diagram::new();
    loaded.add_node(DiagramNode::new(NodeKind::Start, (10.0, 10.0)));
    let json = loaded.to_json().unwrap();

    app.file
        .file_operation_sender
        .as_ref()
        .unwrap()
        .send(FileOperationResult::LoadCompleted(
            "flow.json".to_string(),
            json,
        ))
        .unwrap();

    let ctx = egui::Context::default();
    app.handle_pending_operations(&ctx);

    assert_eq!(app.diagram.nodes.len(), 1);
    assert!(!app.diagram.nodes.contains_key(&stale_id));
    assert_eq!(app.file.current_path.as_deref(), Some("flow.json"));
    assert!(!app.file.has_unsaved_changes);
    assert_eq!(app.interaction.connect_gesture, ConnectGesture::Idle);
}

#[test]
fn failed_load_leaves_diagram_untouched() {
    let mut app = test_app();

    let node_id = app
        .diagram
        .add_node(DiagramNode::new(NodeKind::Task, (0.0, 0.0)));

    app.file
        .file_operation_sender
        .as_ref()
        .unwrap()
        .send(FileOperationResult::LoadCompleted(
            "broken.json".to_string(),
            "not json at all".to_string(),
        ))
        .unwrap();

    let ctx = egui::Context::default();
    app.handle_pending_operations(&ctx);

    assert!(app.diagram.nodes.contains_key(&node_id));
    assert!(app.file.current_path.is_none());
    assert!(app.error_message.is_some());
}

#[test]
fn long_node_name_paints_wrapped_lines() {
    let mut app = test_app();
    app.canvas.show_grid = false;

    let node_id = app
        .diagram
        .add_node(DiagramNode::new(NodeKind::Task, (300.0, 300.0)));
    app.diagram.nodes.get_mut(&node_id).unwrap().name =
        "Review the submitted purchase order line items".to_string();

    let ctx = egui::Context::default();
    let mut raw = egui::RawInput::default();
    raw.screen_rect = Some(egui::Rect::from_min_size(
        egui::Pos2::ZERO,
        egui::vec2(1200.0, 800.0),
    ));
    let out = ctx.run(raw, |ctx| {
        ctx.set_visuals(egui::Visuals::dark());
        egui::CentralPanel::default().show(ctx, |ui| app.draw_canvas(ui));
    });

    assert!(!out.shapes.is_empty());
}

#[test]
fn renaming_node_records_undo_and_trims_nothing() {
    let mut app = test_app();

    let node_id = app
        .diagram
        .add_node(DiagramNode::new(NodeKind::Task, (0.0, 0.0)));

    app.start_editing_node_name(node_id, "New Element");
    app.interaction.temp_node_name = "Review order".to_string();
    app.save_node_name_change(node_id);

    assert_eq!(app.diagram.nodes.get(&node_id).unwrap().name, "Review order");
    assert!(app.interaction.editing_node_name.is_none());

    app.perform_undo();
    assert_eq!(app.diagram.nodes.get(&node_id).unwrap().name, "New Element");
}
