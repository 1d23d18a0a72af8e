//! Application state management structures.
//!
//! This module contains all the state structures that track the application's
//! current UI state, including canvas navigation, user interactions, the
//! connection gesture, context menus, and file operations.

use super::undo::UndoHistory;
use crate::types::*;
use eframe::egui;
use serde::{Deserialize, Serialize};
use std::sync::mpsc::{channel, Receiver, Sender};
use std::time::Instant;

/// Payload carried by a palette drag. The canvas drop handler accepts only
/// this payload type; the wrapped string is the lowercase element-type name.
#[derive(Debug, Clone)]
pub struct PaletteDrag(pub String);

/// The interactive connection gesture.
///
/// At most one gesture is ever active; arming a new one first aborts the
/// previous one. The preview stub drawn while armed is render-only state and
/// never becomes a diagram edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectGesture {
    /// No gesture in progress.
    #[default]
    Idle,
    /// A source node has been designated; the preview stub follows the
    /// pointer until a target is chosen or the gesture aborts.
    Armed {
        /// The designated source node.
        source: NodeId,
    },
}

/// State related to canvas navigation and display.
#[derive(Serialize, Deserialize)]
#[serde(default)]
pub struct CanvasState {
    /// Current canvas pan offset for navigation (in screen space).
    #[serde(skip)]
    pub offset: egui::Vec2,
    /// Current zoom level (1.0 = normal).
    pub zoom_factor: f32,
    /// Whether the grid should be displayed on the canvas.
    pub show_grid: bool,
    /// Whether the origin has been centered on the first frame.
    #[serde(skip)]
    pub centered: bool,
}

impl Default for CanvasState {
    fn default() -> Self {
        Self {
            offset: egui::Vec2::ZERO,
            zoom_factor: 1.0,
            show_grid: true,
            centered: false,
        }
    }
}

/// State related to user interactions with nodes, edges and the canvas.
///
/// Tracks selection, dragging, editing, marquee selection and the connection
/// gesture.
#[derive(Serialize, Deserialize)]
#[serde(default)]
pub struct InteractionState {
    /// Currently selected node when exactly one node is selected.
    #[serde(skip)]
    pub selected_node: Option<NodeId>,
    /// Currently selected nodes, in selection order (empty = none selected).
    #[serde(skip)]
    pub selected_nodes: Vec<NodeId>,
    /// Currently selected edge, if any. Can coexist with a node selection
    /// (shift-click an edge) so node/edge batches delete together.
    #[serde(skip)]
    pub selected_edge: Option<EdgeId>,
    /// Node currently being edited for name changes.
    #[serde(skip)]
    pub editing_node_name: Option<NodeId>,
    /// Temporary storage for the node name while editing.
    #[serde(skip)]
    pub temp_node_name: String,
    /// Flag indicating text should be selected in the name field.
    #[serde(skip)]
    pub should_select_text: bool,
    /// Flag to track if focus was already requested for the current edit.
    #[serde(skip)]
    pub focus_requested_for_edit: bool,
    /// Node currently being dragged by the user.
    #[serde(skip)]
    pub dragging_node: Option<NodeId>,
    /// Original node position before drag started (for undo).
    #[serde(skip)]
    pub drag_original_position: Option<(f32, f32)>,
    /// Original positions for multi-node drag (for undo).
    #[serde(skip)]
    pub drag_original_positions_multi: Vec<(NodeId, (f32, f32))>,
    /// Offset from mouse to node center during dragging.
    #[serde(skip)]
    pub node_drag_offset: egui::Vec2,
    /// Whether the user is currently panning the canvas.
    #[serde(skip)]
    pub is_panning: bool,
    /// Last mouse position during panning operation.
    #[serde(skip)]
    pub last_pan_pos: Option<egui::Pos2>,
    /// Marquee selection state: start and current end in screen space.
    #[serde(skip)]
    pub marquee_start: Option<egui::Pos2>,
    /// Current end of the marquee rectangle.
    #[serde(skip)]
    pub marquee_end: Option<egui::Pos2>,
    /// Whether the current marquee adds to the existing selection.
    #[serde(skip)]
    pub marquee_additive: bool,
    /// The connection gesture state machine.
    #[serde(skip)]
    pub connect_gesture: ConnectGesture,
    /// Current pointer position while a gesture is armed (screen space).
    #[serde(skip)]
    pub gesture_pos: Option<egui::Pos2>,
    /// Pending shift-press on a node that becomes a drag-mode connection
    /// gesture once the pointer moves past the click threshold.
    #[serde(skip)]
    pub pending_shift_connection_from: Option<NodeId>,
    /// Start screen position for a pending shift-connection gesture.
    #[serde(skip)]
    pub pending_shift_start_screen_pos: Option<egui::Pos2>,
    /// Staged key for a new action-map entry in the properties panel.
    #[serde(skip)]
    pub temp_action_key: String,
    /// Staged parameter value for a new action-map entry.
    #[serde(skip)]
    pub temp_action_value: String,
}

impl Default for InteractionState {
    fn default() -> Self {
        Self {
            selected_node: None,
            selected_nodes: Vec::new(),
            selected_edge: None,
            editing_node_name: None,
            temp_node_name: String::new(),
            should_select_text: false,
            focus_requested_for_edit: false,
            dragging_node: None,
            drag_original_position: None,
            drag_original_positions_multi: Vec::new(),
            node_drag_offset: egui::Vec2::ZERO,
            is_panning: false,
            last_pan_pos: None,
            marquee_start: None,
            marquee_end: None,
            marquee_additive: false,
            connect_gesture: ConnectGesture::Idle,
            gesture_pos: None,
            pending_shift_connection_from: None,
            pending_shift_start_screen_pos: None,
            temp_action_key: String::new(),
            temp_action_value: String::new(),
        }
    }
}

impl InteractionState {
    /// Clears every selection kind and any in-progress name edit. Any panel
    /// bound to the previous selection goes back to its empty state.
    pub fn clear_selection(&mut self) {
        self.selected_node = None;
        self.selected_nodes.clear();
        self.selected_edge = None;
        self.editing_node_name = None;
        self.temp_node_name.clear();
        self.temp_action_key.clear();
        self.temp_action_value.clear();
    }

    /// Keeps the single-selection convenience field in sync with the list.
    pub fn sync_single_selection(&mut self) {
        self.selected_node = match self.selected_nodes.as_slice() {
            [only] => Some(*only),
            _ => None,
        };
    }
}

/// State related to context menu display and interaction.
#[derive(Serialize, Deserialize)]
#[serde(default)]
pub struct ContextMenuState {
    /// Whether the context menu is currently visible.
    #[serde(skip)]
    pub show: bool,
    /// Screen position where the context menu should appear.
    #[serde(skip)]
    pub screen_pos: (f32, f32),
    /// World position used when creating nodes from the menu.
    #[serde(skip)]
    pub world_pos: (f32, f32),
    /// Node under the cursor when the menu was opened, if any.
    #[serde(skip)]
    pub node_under: Option<NodeId>,
    /// Edge under the cursor when the menu was opened, if any.
    #[serde(skip)]
    pub edge_under: Option<EdgeId>,
    /// Flag to prevent the menu from closing immediately after opening.
    #[serde(skip)]
    pub just_opened: bool,
}

impl Default for ContextMenuState {
    fn default() -> Self {
        Self {
            show: false,
            screen_pos: (0.0, 0.0),
            world_pos: (0.0, 0.0),
            node_under: None,
            edge_under: None,
            just_opened: false,
        }
    }
}

/// Represents a pending save operation type.
#[derive(Debug)]
pub enum PendingSaveOperation {
    /// Save with a new file path (show file picker).
    SaveAs,
    /// Save to the existing file path.
    Save,
}

/// Represents a pending load operation type.
#[derive(Debug)]
pub enum PendingLoadOperation {
    /// Load from a file (show file picker).
    Load,
}

/// Messages sent from async file operations back to the main app.
#[derive(Debug)]
pub enum FileOperationResult {
    /// Save operation completed successfully with the given path.
    SaveCompleted(String),
    /// Load operation completed successfully with path and content.
    LoadCompleted(String, String),
    /// Operation failed with an error message.
    OperationFailed(String),
}

/// Pending confirmation actions that require user approval due to unsaved
/// changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PendingConfirmAction {
    /// User is attempting to create a new file.
    New,
    /// User is attempting to open a file.
    Open,
    /// User is attempting to quit the application.
    Quit,
}

/// State related to file operations and persistence.
#[derive(Serialize, Deserialize)]
#[serde(default)]
pub struct FileState {
    /// Current file path for save/load operations.
    #[serde(skip)]
    pub current_path: Option<String>,
    /// Flag indicating if the diagram has unsaved changes.
    #[serde(skip)]
    pub has_unsaved_changes: bool,
    /// Pending file operation, processed once per frame on the UI thread.
    #[serde(skip)]
    pub pending_save_operation: Option<PendingSaveOperation>,
    /// Pending load operation.
    #[serde(skip)]
    pub pending_load_operation: Option<PendingLoadOperation>,
    /// Channel for receiving file-operation results from async tasks.
    #[serde(skip)]
    pub file_operation_sender: Option<Sender<FileOperationResult>>,
    /// Receiving half of the operation-result channel.
    #[serde(skip)]
    pub file_operation_receiver: Option<Receiver<FileOperationResult>>,
    /// Whether to show an unsaved-changes confirmation dialog.
    #[serde(skip)]
    pub show_unsaved_dialog: bool,
    /// The action the user attempted that requires confirmation.
    #[serde(skip)]
    pub pending_confirm_action: Option<PendingConfirmAction>,
    /// One-shot flag to allow the next close request after confirmation.
    #[serde(skip)]
    pub allow_close_on_next_request: bool,
    /// When the autosave timer last fired (or the app started).
    #[serde(skip, default = "Instant::now")]
    pub last_autosave: Instant,
}

impl Default for FileState {
    fn default() -> Self {
        let (sender, receiver) = channel();
        Self {
            current_path: None,
            has_unsaved_changes: false,
            pending_save_operation: None,
            pending_load_operation: None,
            file_operation_sender: Some(sender),
            file_operation_receiver: Some(receiver),
            show_unsaved_dialog: false,
            pending_confirm_action: None,
            allow_close_on_next_request: false,
            last_autosave: Instant::now(),
        }
    }
}

/// The main application structure containing UI state and the diagram.
///
/// This struct implements the `eframe::App` trait and handles all user
/// interface rendering and interaction logic. The diagram is exclusively
/// owned and mutated here; panels request changes through the canvas
/// operations rather than touching entities behind the app's back.
#[derive(Serialize, Deserialize)]
#[serde(default)]
pub struct BpmnApp {
    /// The diagram being edited.
    pub diagram: Diagram,
    /// Canvas navigation and display state.
    pub canvas: CanvasState,
    /// User interaction state.
    pub interaction: InteractionState,
    /// Context menu state.
    pub context_menu: ContextMenuState,
    /// File operations state.
    pub file: FileState,
    /// Undo/redo history for tracking and reversing actions.
    pub undo_history: UndoHistory,
    /// Whether dark mode visuals are enabled.
    pub dark_mode: bool,
    /// Remembered width of the properties panel across sessions.
    pub properties_panel_width: f32,
    /// Message shown in the blocking error dialog, if any.
    #[serde(skip)]
    pub error_message: Option<String>,
}

impl Default for BpmnApp {
    fn default() -> Self {
        Self {
            diagram: Diagram::default(),
            canvas: CanvasState::default(),
            interaction: InteractionState::default(),
            context_menu: ContextMenuState::default(),
            file: FileState::default(),
            undo_history: UndoHistory::new(),
            dark_mode: true,
            properties_panel_width: 300.0,
            error_message: None,
        }
    }
}

impl BpmnApp {
    /// Serializes the application state to JSON for eframe persistence.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Deserializes application state from JSON.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}
