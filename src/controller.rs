//! User-intent layer between the view and a [`BoardStore`].
//!
//! The controller owns the in-memory [`BoardState`] for the folder on
//! screen and writes the affected scope back after every mutation. Every
//! mutating operation takes `&mut self` and awaits its store calls, so two
//! writes to the same scope can never overlap.
//!
//! Reads (loading a folder, listing folders) propagate store errors. Write
//! failures after the board has already changed are logged and swallowed:
//! the board keeps showing the user's change even though the store may
//! not have it.

use crate::{
    domain::{
        folder::normalize_folder_name, BoardConfig, BoardState, ColumnId, EditCommitPolicy, Note,
        NoteId, Subfolder, SubfolderId,
    },
    error::{BoardError, Result},
    storage::BoardStore,
};
use std::{collections::HashSet, sync::Arc};

pub struct BoardController<S: BoardStore> {
    store: Arc<S>,
    config: BoardConfig,
    state: BoardState,
    /// Notes with content edits the store has not seen yet
    pending_edits: HashSet<NoteId>,
}

impl<S: BoardStore> BoardController<S> {
    /// Opens the board on the configured default folder, creating that
    /// folder on first use.
    pub async fn open(store: Arc<S>, config: BoardConfig) -> Result<Self> {
        config.validate()?;

        match store.create_folder(&config.default_folder).await {
            Ok(()) => {}
            Err(BoardError::DuplicateKey(name)) => {
                log::debug!("[stickyboard.controller.open] Default folder {:?} exists", name);
            }
            Err(e) => return Err(e),
        }

        let folder = config.default_folder.clone();
        let state = Self::load_state(store.as_ref(), &config, &folder).await?;

        Ok(Self {
            store,
            config,
            state,
            pending_edits: HashSet::new(),
        })
    }

    async fn load_state(store: &S, config: &BoardConfig, folder: &str) -> Result<BoardState> {
        let mut state = BoardState::new(folder, &config.columns);
        for column in &config.columns {
            for note in store.list_notes(folder, Some(column.id)).await? {
                state.push(note);
            }
        }
        Ok(state)
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn config(&self) -> &BoardConfig {
        &self.config
    }

    pub fn state(&self) -> &BoardState {
        &self.state
    }

    pub fn current_folder(&self) -> &str {
        &self.state.current_folder
    }

    /// Notes of a column in display order
    pub fn column(&self, column: ColumnId) -> Vec<&Note> {
        self.state.column_notes(column)
    }

    pub fn note(&self, id: NoteId) -> Option<&Note> {
        self.state.notes.get(&id)
    }

    pub fn has_pending_edit(&self, id: NoteId) -> bool {
        self.pending_edits.contains(&id)
    }

    /// Folder names for the sidebar, in creation order
    pub async fn folders(&self) -> Result<Vec<String>> {
        self.store.list_folders().await
    }

    /// Searches the current folder
    pub async fn search(&self, query: &str) -> Result<Vec<Note>> {
        self.store
            .search_notes(&self.state.current_folder, query)
            .await
    }

    fn ensure_column(&self, column: ColumnId) -> Result<()> {
        if self.config.has_column(column) {
            Ok(())
        } else {
            Err(BoardError::InvalidColumn(column.to_string()))
        }
    }

    /// Appends a placeholder note to `column` and returns its new ID.
    ///
    /// Nothing is shown until the store has assigned the ID, so a failed
    /// insert is returned to the caller and leaves the board unchanged.
    pub async fn add_note(&mut self, column: ColumnId) -> Result<NoteId> {
        self.ensure_column(column)?;

        let note = Note::new(
            self.state.current_folder.clone(),
            column,
            self.config.placeholder.clone(),
        );
        let id = self.store.upsert_note(&note).await?;
        self.state.push(note.with_id(id));

        log::debug!(
            "[stickyboard.controller.add] Added note {} to {}/{}",
            id,
            self.state.current_folder,
            column
        );
        Ok(id)
    }

    /// Updates a note's text. Never touches column or order.
    pub async fn edit_note(&mut self, id: NoteId, content: impl Into<String>) -> Result<()> {
        let note = self
            .state
            .notes
            .get_mut(&id)
            .ok_or_else(|| BoardError::NotFound(id.to_string()))?;

        if !note.set_content(content) {
            return Ok(());
        }
        self.pending_edits.insert(id);

        if self.config.edit_commit == EditCommitPolicy::OnKeystroke {
            self.flush_edit(id).await;
        }
        Ok(())
    }

    /// Focus left the note: persist any uncommitted edit
    pub async fn commit_edit(&mut self, id: NoteId) -> Result<()> {
        if !self.state.notes.contains_key(&id) {
            return Err(BoardError::NotFound(id.to_string()));
        }
        if self.pending_edits.contains(&id) {
            self.flush_edit(id).await;
        }
        Ok(())
    }

    async fn flush_edit(&mut self, id: NoteId) {
        let Some(note) = self.state.notes.get(&id) else {
            return;
        };

        match self.store.upsert_note(note).await {
            Ok(_) => {
                self.pending_edits.remove(&id);
                log::debug!("[stickyboard.controller.edit] Committed note {}", id);
            }
            Err(e) => {
                log::error!("[stickyboard.controller.edit] Failed to save note {}: {}", id, e);
            }
        }
    }

    async fn flush_pending_edits(&mut self) {
        let mut ids: Vec<NoteId> = self.pending_edits.iter().copied().collect();
        ids.sort();
        for id in ids {
            self.flush_edit(id).await;
        }
    }

    /// Moves a note to `target_index` in `to` (clamped to the column length)
    /// and persists the affected columns. Returns the index used.
    pub async fn move_note(
        &mut self,
        id: NoteId,
        from: ColumnId,
        to: ColumnId,
        target_index: usize,
    ) -> Result<usize> {
        self.ensure_column(to)?;

        let index = self
            .state
            .relocate(id, from, to, target_index)
            .ok_or_else(|| BoardError::NotFound(format!("note {} in column {}", id, from)))?;

        // Destination first; replacing it also drops the note from its old
        // scope. The source is only rewritten once the note is safely stored.
        let stored = self.persist_scope(to).await;
        if stored && from != to {
            self.persist_scope(from).await;
        }

        log::debug!(
            "[stickyboard.controller.move] Moved note {} from {} to {} at {}",
            id,
            from,
            to,
            index
        );
        Ok(index)
    }

    async fn persist_scope(&mut self, column: ColumnId) -> bool {
        let snapshot = self.state.scope_snapshot(column);
        let folder = self.state.current_folder.clone();

        match self.store.replace_scope(&folder, column, &snapshot).await {
            Ok(_) => {
                for note in &snapshot {
                    if let Some(id) = note.id {
                        self.pending_edits.remove(&id);
                    }
                }
                true
            }
            Err(e) => {
                log::error!(
                    "[stickyboard.controller.persist] Failed to save {:?}/{}: {}",
                    folder,
                    column,
                    e
                );
                false
            }
        }
    }

    /// Removes a note from the board and the store. Deleting a note that is
    /// already gone does nothing.
    pub async fn delete_note(&mut self, id: NoteId) {
        if self.state.remove(id).is_none() {
            log::warn!("[stickyboard.controller.delete] Note {} not on board", id);
        }
        self.pending_edits.remove(&id);

        if let Err(e) = self.store.delete_note(id).await {
            log::error!("[stickyboard.controller.delete] Failed to delete note {}: {}", id, e);
        }
    }

    /// Shows another folder. Pending edits are flushed first. If the folder
    /// cannot be read the board stays where it was.
    pub async fn switch_folder(&mut self, name: &str) -> Result<()> {
        if !self.store.folder_exists(name).await? {
            return Err(BoardError::NotFound(format!("folder {:?}", name)));
        }

        self.flush_pending_edits().await;
        let state = Self::load_state(self.store.as_ref(), &self.config, name).await?;
        self.replace_state(state);

        log::info!("[stickyboard.controller.folder] Switched to folder {:?}", name);
        Ok(())
    }

    /// Creates a folder and switches to it
    pub async fn add_folder(&mut self, name: &str) -> Result<()> {
        let name =
            normalize_folder_name(name).ok_or_else(|| BoardError::InvalidFolderName(name.to_string()))?;

        self.store.create_folder(name).await?;
        self.switch_folder(name).await
    }

    /// Re-reads the current folder from the store
    pub async fn reload(&mut self) -> Result<()> {
        self.flush_pending_edits().await;
        let folder = self.state.current_folder.clone();
        let state = Self::load_state(self.store.as_ref(), &self.config, &folder).await?;
        self.replace_state(state);
        Ok(())
    }

    /// Installs freshly loaded state. Edits that could not be flushed are
    /// gone from the board now, so they stop counting as pending.
    fn replace_state(&mut self, state: BoardState) {
        if !self.pending_edits.is_empty() {
            let mut dropped: Vec<NoteId> = self.pending_edits.drain().collect();
            dropped.sort();
            log::warn!(
                "[stickyboard.controller.edit] Dropping unsaved edits for notes {:?}",
                dropped
            );
        }
        self.state = state;
    }

    /// Subfolders of the current folder, in creation order
    pub async fn subfolders(&self) -> Result<Vec<Subfolder>> {
        self.store.list_subfolders(&self.state.current_folder).await
    }

    /// Creates a subfolder inside the current folder
    pub async fn add_subfolder(&mut self, name: &str) -> Result<SubfolderId> {
        let name =
            normalize_folder_name(name).ok_or_else(|| BoardError::InvalidFolderName(name.to_string()))?;

        self.store
            .create_subfolder(&self.state.current_folder, name)
            .await
    }

    /// Replaces a subfolder's text. Unlike note edits this has no board
    /// state to keep, so failures go straight back to the caller.
    pub async fn fill_subfolder(&mut self, id: SubfolderId, text: &str) -> Result<()> {
        self.store.fill_subfolder(id, text).await
    }
}
