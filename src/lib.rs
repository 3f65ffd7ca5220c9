//! # Sticky Board Core
//!
//! Persistence and ordering core for a folder-scoped kanban board of
//! sticky notes.
//!
//! Notes live in fixed columns inside named folders. The order of notes in
//! a column is whatever was last written for that (folder, column) scope;
//! [`BoardStore::replace_scope`] rewrites a whole scope in one atomic step.
//! [`BoardController`] turns user intents into store calls and keeps the
//! in-memory board in line with storage. Nothing here knows about a DOM or
//! any particular UI.

pub mod controller;
pub mod domain;
pub mod error;
pub mod storage;

// Re-export commonly used types
pub use controller::BoardController;
pub use domain::{
    board::{BoardConfig, BoardState, Column, EditCommitPolicy},
    drop::{resolve_drop_index, should_swap, Rect},
    folder::{Folder, Subfolder, SubfolderId},
    note::{ColumnId, Note, NoteId},
};
pub use error::{BoardError, Result};
pub use storage::BoardStore;

#[cfg(feature = "file-storage")]
pub use storage::file_storage::FileStore;

#[cfg(feature = "sqlite-storage")]
pub use storage::sqlite_storage::SqliteStore;
