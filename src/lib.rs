//! # BPMN Studio
//!
//! A visual editor for BPMN-style process diagrams with interactive nodes
//! connected by directional edges. Supports three element types:
//! - **Start events**: Green ellipses marking process entry points
//! - **Tasks**: Blue rounded rectangles for units of work
//! - **Gateways**: Orange diamonds for branching decisions
//!
//! ## Features
//! - Palette drag-and-drop element creation
//! - Interactive selection, repositioning, and connection gestures
//! - Canvas panning, zooming, and grid snapping
//! - Element property editing with undo/redo
//! - Versioned JSON persistence with tolerant loading

#![warn(missing_docs)]
#![deny(unsafe_code)]

mod constants;
mod error;
mod persist;
mod types;
mod ui;

// Re-export public types and functions
pub use error::DiagramError;
pub use persist::FORMAT_VERSION;
pub use types::*;
pub use ui::BpmnApp;

/// Runs the diagram editor with default settings.
///
/// Initializes the egui application window, restoring the previous session's
/// state when available, and starts the main event loop.
///
/// # Example
///
/// ```no_run
/// fn main() -> Result<(), eframe::Error> {
///     bpmn_studio::run_app()
/// }
/// ```
pub fn run_app() -> Result<(), eframe::Error> {
    let options = eframe::NativeOptions::default();
    eframe::run_native(
        "BPMN Studio",
        options,
        Box::new(|cc| {
            let app = cc
                .storage
                .and_then(|storage| storage.get_string("app_state"))
                .and_then(|json| BpmnApp::from_json(&json).ok())
                .unwrap_or_default();
            Ok(Box::new(app))
        }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_diagram_default() {
        let diagram = Diagram::default();
        assert!(diagram.nodes.is_empty());
        assert!(diagram.edges.is_empty());
    }

    #[test]
    fn test_node_defaults() {
        let node = DiagramNode::new(NodeKind::Task, (10.0, 20.0));
        assert_eq!(node.name, "New Element");
        assert_eq!(node.position, (10.0, 20.0));
        assert!(node.description.is_empty());
        assert!(node.actions.is_empty());
    }
}
