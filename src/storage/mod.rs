use crate::{
    domain::{BoardConfig, ColumnId, Note, NoteId, Subfolder, SubfolderId},
    error::Result,
};
use async_trait::async_trait;

#[cfg(feature = "file-storage")]
pub mod file_storage;

#[cfg(feature = "sqlite-storage")]
pub mod sqlite_storage;

/// Durable store for folders and notes.
///
/// Note order within a (folder, column) scope is the order rows come back
/// from `list_notes`; it only changes through `replace_scope` or by
/// inserting new notes at the end of a scope.
#[async_trait]
pub trait BoardStore: Send + Sync {
    /// Creates the backing collections if absent and writes a default
    /// board configuration when none exists
    async fn initialize(&self) -> Result<()>;

    /// Checks if the store has been initialized
    async fn is_initialized(&self) -> bool;

    /// Inserts a folder, failing with `DuplicateKey` if the name is taken
    async fn create_folder(&self, name: &str) -> Result<()>;

    /// Lists folder names in insertion order
    async fn list_folders(&self) -> Result<Vec<String>>;

    /// Checks whether a folder exists
    async fn folder_exists(&self, name: &str) -> Result<bool>;

    /// Lists the notes of a folder, optionally narrowed to one column,
    /// in their last persisted order
    async fn list_notes(&self, folder: &str, column: Option<ColumnId>) -> Result<Vec<Note>>;

    /// Loads a note by ID
    async fn load_note(&self, id: NoteId) -> Result<Note>;

    /// Inserts the note when it has no ID, otherwise overwrites the stored
    /// note with that ID in place. Returns the note's ID.
    async fn upsert_note(&self, note: &Note) -> Result<NoteId>;

    /// Deletes a note. Deleting an absent note succeeds.
    async fn delete_note(&self, id: NoteId) -> Result<()>;

    /// Atomically replaces every note in the scope with `notes`, in order.
    ///
    /// Notes keep their IDs when they have one (and are taken out of any
    /// other scope they were in); notes without one get a fresh ID. The
    /// returned IDs line up with `notes`.
    async fn replace_scope(
        &self,
        folder: &str,
        column: ColumnId,
        notes: &[Note],
    ) -> Result<Vec<NoteId>>;

    /// Creates an empty subfolder under `folder`. Fails with `NotFound`
    /// when the folder does not exist and `DuplicateKey` when the name is
    /// already used anywhere in the store.
    async fn create_subfolder(&self, folder: &str, name: &str) -> Result<SubfolderId>;

    /// Lists a folder's subfolders in creation order
    async fn list_subfolders(&self, folder: &str) -> Result<Vec<Subfolder>>;

    /// Loads a subfolder by ID
    async fn load_subfolder(&self, id: SubfolderId) -> Result<Subfolder>;

    /// Replaces a subfolder's text. `NotFound` if it does not exist.
    async fn fill_subfolder(&self, id: SubfolderId, text: &str) -> Result<()>;

    /// Searches note content within a folder (case-insensitive)
    async fn search_notes(&self, folder: &str, query: &str) -> Result<Vec<Note>>;

    /// Saves the board configuration
    async fn save_config(&self, config: &BoardConfig) -> Result<()>;

    /// Loads the board configuration
    async fn load_config(&self) -> Result<BoardConfig>;
}

/// Case-insensitive content match shared by the backends
pub(crate) fn content_matches(note: &Note, query_lower: &str) -> bool {
    note.content.to_lowercase().contains(query_lower)
}
