//! Shared application-wide constants.
//! Centralizes tweakable values used across UI rendering and interactions.

// Node dimensions
/// Default node width in world units.
pub const NODE_WIDTH: f32 = 100.0;
/// Default node height in world units.
pub const NODE_HEIGHT: f32 = 70.0;

/// Display name given to freshly created nodes.
pub const DEFAULT_NODE_NAME: &str = "New Element";

// Grid/drawing
/// Grid cell size in world units.
pub const GRID_SIZE: f32 = 20.0;

// Canvas interactions
/// Threshold in world units used for distinguishing click vs drag and for
/// edge hit testing.
pub const CLICK_THRESHOLD: f32 = 10.0;

// Undo/redo
/// Maximum number of undo history entries to retain.
pub const MAX_UNDO_HISTORY: usize = 100;

// Persistence
/// Seconds between autosave attempts while a file path is known.
pub const AUTOSAVE_INTERVAL_SECS: u64 = 300;
