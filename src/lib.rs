// ============================================
// PIPELINE STUDIO - EDITOR CORE
// Graph model, undo/redo, canvas, drafts and
// live execution tracking for the DAG editor
// ============================================

pub mod api;
pub mod canvas;
pub mod draft;
pub mod editor;
pub mod error;
pub mod execution;
pub mod graph;
pub mod history;
pub mod notify;
pub mod panels;
pub mod store;

pub use editor::{Editor, EditorConfig, EditorView};
pub use error::{AppError, AppResult};
