//! File operations for saving and loading diagrams.
//!
//! Dialogs run on background tasks through `rfd::AsyncFileDialog`; results
//! come back to the UI thread over an mpsc channel and are applied at the
//! start of the next frame.

use super::state::{
    BpmnApp, FileOperationResult, PendingLoadOperation, PendingSaveOperation,
};
use crate::types::Diagram;
use eframe::egui;
use std::time::Instant;

impl BpmnApp {
    /// Processes completed async file operations and initiates pending ones.
    ///
    /// Called once per frame before the UI is built. A load result only
    /// replaces the current diagram when the file parses; a failed parse
    /// leaves the working diagram untouched and surfaces an error dialog.
    pub fn handle_pending_operations(&mut self, ctx: &egui::Context) {
        // Drain the channel first; applying a result mutates state well
        // beyond the file fields
        let mut completed = Vec::new();
        if let Some(receiver) = &self.file.file_operation_receiver {
            while let Ok(result) = receiver.try_recv() {
                completed.push(result);
            }
        }
        for result in completed {
            match result {
                FileOperationResult::SaveCompleted(path) => {
                    log::info!("saved diagram to {path}");
                    self.file.current_path = Some(path);
                    self.file.has_unsaved_changes = false;
                }
                FileOperationResult::LoadCompleted(path, content) => {
                    match Diagram::from_json(&content) {
                        Ok(diagram) => {
                            log::info!("loaded diagram from {path}");
                            self.diagram = diagram;
                            self.file.current_path = Some(path);
                            self.file.has_unsaved_changes = false;
                            self.interaction.clear_selection();
                            self.abort_connect_gesture();
                            self.undo_history.clear();
                        }
                        Err(e) => {
                            log::error!("failed to parse {path}: {e}");
                            self.error_message = Some(format!("Could not open {path}: {e}"));
                        }
                    }
                }
                FileOperationResult::OperationFailed(error) => {
                    log::error!("file operation failed: {error}");
                    self.error_message = Some(error);
                }
            }
        }

        // Handle pending save operations
        if let Some(save_op) = self.file.pending_save_operation.take() {
            let ctx = ctx.clone();
            let diagram_json = match self.diagram.to_json() {
                Ok(json) => json,
                Err(e) => {
                    log::error!("failed to serialize diagram: {e}");
                    self.error_message = Some(format!("Could not serialize diagram: {e}"));
                    return;
                }
            };
            let sender = self.file.file_operation_sender.clone();

            match save_op {
                PendingSaveOperation::SaveAs => {
                    tokio::spawn(async move {
                        if let Some(handle) = rfd::AsyncFileDialog::new()
                            .add_filter("JSON", &["json"])
                            .set_file_name("diagram.json")
                            .save_file()
                            .await
                        {
                            let path = handle.path();
                            match std::fs::write(path, diagram_json) {
                                Ok(_) => {
                                    if let Some(tx) = sender {
                                        let _ = tx.send(FileOperationResult::SaveCompleted(
                                            path.display().to_string(),
                                        ));
                                    }
                                }
                                Err(e) => {
                                    if let Some(tx) = sender {
                                        let _ = tx.send(FileOperationResult::OperationFailed(
                                            format!("Failed to save file: {}", e),
                                        ));
                                    }
                                }
                            }
                        }
                        ctx.request_repaint();
                    });
                }
                PendingSaveOperation::Save => {
                    if let Some(path) = self.file.current_path.clone() {
                        tokio::spawn(async move {
                            match std::fs::write(&path, diagram_json) {
                                Ok(_) => {
                                    if let Some(tx) = sender {
                                        let _ = tx.send(FileOperationResult::SaveCompleted(path));
                                    }
                                }
                                Err(e) => {
                                    if let Some(tx) = sender {
                                        let _ = tx.send(FileOperationResult::OperationFailed(
                                            format!("Failed to save file: {}", e),
                                        ));
                                    }
                                }
                            }
                            ctx.request_repaint();
                        });
                    } else {
                        self.file.pending_save_operation = Some(PendingSaveOperation::SaveAs);
                    }
                }
            }
        }

        // Handle pending load operations
        if let Some(_load_op) = self.file.pending_load_operation.take() {
            let ctx = ctx.clone();
            let sender = self.file.file_operation_sender.clone();

            tokio::spawn(async move {
                if let Some(handle) = rfd::AsyncFileDialog::new()
                    .add_filter("JSON", &["json"])
                    .pick_file()
                    .await
                {
                    let path = handle.path();
                    match std::fs::read_to_string(path) {
                        Ok(json) => {
                            if let Some(tx) = sender {
                                let _ = tx.send(FileOperationResult::LoadCompleted(
                                    path.display().to_string(),
                                    json,
                                ));
                            }
                        }
                        Err(e) => {
                            if let Some(tx) = sender {
                                let _ = tx.send(FileOperationResult::OperationFailed(format!(
                                    "Failed to read file: {}",
                                    e
                                )));
                            }
                        }
                    }
                }
                ctx.request_repaint();
            });
        }
    }

    /// Queues an autosave when the interval has elapsed and there is a known
    /// path with unsaved changes. A diagram that was never saved is left
    /// alone so no dialog pops up unprompted.
    pub fn handle_autosave(&mut self) {
        if self.file.last_autosave.elapsed().as_secs() < crate::constants::AUTOSAVE_INTERVAL_SECS {
            return;
        }
        self.file.last_autosave = Instant::now();

        if self.file.current_path.is_some() && self.file.has_unsaved_changes {
            log::info!("autosaving diagram");
            self.file.pending_save_operation = Some(PendingSaveOperation::Save);
        }
    }

    /// Opens a file dialog to save the diagram under a new name.
    pub fn save_as_diagram(&mut self) {
        self.file.pending_save_operation = Some(PendingSaveOperation::SaveAs);
    }

    /// Saves the diagram to the current file path, or triggers "Save As" if
    /// no path is set.
    pub fn save_diagram(&mut self) {
        if self.file.current_path.is_some() {
            self.file.pending_save_operation = Some(PendingSaveOperation::Save);
        } else {
            self.save_as_diagram();
        }
    }

    /// Opens a file dialog to load a diagram from disk.
    pub fn load_diagram(&mut self) {
        self.file.pending_load_operation = Some(PendingLoadOperation::Load);
    }

    /// Replaces the current diagram with an empty one, resetting all state.
    pub fn new_diagram(&mut self) {
        self.diagram = Diagram::new();
        self.file.current_path = None;
        self.file.has_unsaved_changes = false;
        self.interaction.clear_selection();
        self.abort_connect_gesture();
        self.undo_history.clear();
        self.canvas.offset = egui::Vec2::ZERO;
        self.canvas.zoom_factor = 1.0;
        self.canvas.centered = false;
    }
}
