pub mod board;
pub mod drop;
pub mod folder;
pub mod note;

pub use board::{BoardConfig, BoardState, Column, EditCommitPolicy};
pub use drop::{resolve_drop_index, should_swap, Rect};
pub use folder::{Folder, Subfolder, SubfolderId};
pub use note::{ColumnId, Note, NoteId};
