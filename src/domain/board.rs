use crate::domain::note::{ColumnId, Note, NoteId};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Configuration for a board column
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    pub id: ColumnId,
    pub title: String,
}

impl Column {
    pub fn new(id: ColumnId) -> Self {
        Self {
            id,
            title: id.title().to_string(),
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }
}

/// When content edits reach the store
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EditCommitPolicy {
    /// Persist when the note loses edit focus
    #[default]
    OnBlur,
    /// Persist on every input event
    OnKeystroke,
}

/// Board configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoardConfig {
    pub name: String,
    pub columns: Vec<Column>,
    pub default_folder: String,
    pub placeholder: String,
    #[serde(default)]
    pub edit_commit: EditCommitPolicy,
}

impl BoardConfig {
    pub fn with_edit_commit(mut self, policy: EditCommitPolicy) -> Self {
        self.edit_commit = policy;
        self
    }

    /// Checks the configuration for empty or repeated columns and blank names
    pub fn validate(&self) -> crate::error::Result<()> {
        use crate::error::BoardError;

        if self.columns.is_empty() {
            return Err(BoardError::ConfigError(
                "board needs at least one column".to_string(),
            ));
        }
        for (i, column) in self.columns.iter().enumerate() {
            if self.columns[..i].iter().any(|c| c.id == column.id) {
                return Err(BoardError::ConfigError(format!(
                    "column '{}' is listed twice",
                    column.id
                )));
            }
        }
        if self.default_folder.trim().is_empty() {
            return Err(BoardError::ConfigError(
                "default folder name is empty".to_string(),
            ));
        }
        Ok(())
    }

    pub fn has_column(&self, id: ColumnId) -> bool {
        self.columns.iter().any(|c| c.id == id)
    }
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self {
            name: "Notes Board".to_string(),
            columns: ColumnId::ALL.into_iter().map(Column::new).collect(),
            default_folder: "Default".to_string(),
            placeholder: "New Note".to_string(),
            edit_commit: EditCommitPolicy::default(),
        }
    }
}

/// In-memory working set for the folder on screen.
///
/// Column order is the only record of note position; it is written back to
/// the store verbatim and never derived from ids or timestamps.
#[derive(Debug, Clone, Default)]
pub struct BoardState {
    pub current_folder: String,
    pub columns: BTreeMap<ColumnId, Vec<NoteId>>,
    pub notes: HashMap<NoteId, Note>,
}

impl BoardState {
    pub fn new(folder: impl Into<String>, columns: &[Column]) -> Self {
        Self {
            current_folder: folder.into(),
            columns: columns.iter().map(|c| (c.id, Vec::new())).collect(),
            notes: HashMap::new(),
        }
    }

    /// Appends a persisted note to the end of its column
    pub fn push(&mut self, note: Note) {
        let Some(id) = note.id else {
            return;
        };
        self.columns.entry(note.column).or_default().push(id);
        self.notes.insert(id, note);
    }

    /// The column currently holding `id`, if any
    pub fn column_of(&self, id: NoteId) -> Option<ColumnId> {
        self.columns
            .iter()
            .find(|(_, ids)| ids.contains(&id))
            .map(|(column, _)| *column)
    }

    /// Notes of one column in display order
    pub fn column_notes(&self, column: ColumnId) -> Vec<&Note> {
        self.columns
            .get(&column)
            .map(|ids| ids.iter().filter_map(|id| self.notes.get(id)).collect())
            .unwrap_or_default()
    }

    /// Owned snapshot of a column, ready to hand to `replace_scope`
    pub fn scope_snapshot(&self, column: ColumnId) -> Vec<Note> {
        self.column_notes(column).into_iter().cloned().collect()
    }

    /// Removes `id` from its column and the note map; returns the note if present
    pub fn remove(&mut self, id: NoteId) -> Option<Note> {
        for ids in self.columns.values_mut() {
            ids.retain(|n| *n != id);
        }
        self.notes.remove(&id)
    }

    /// Moves `id` from `from` to `to` at `target_index`, clamped to the
    /// destination length. Returns the index actually used, or `None` when
    /// the note is not in `from`.
    pub fn relocate(
        &mut self,
        id: NoteId,
        from: ColumnId,
        to: ColumnId,
        target_index: usize,
    ) -> Option<usize> {
        let source = self.columns.get_mut(&from)?;
        let pos = source.iter().position(|n| *n == id)?;
        source.remove(pos);

        let dest = self.columns.entry(to).or_default();
        let index = target_index.min(dest.len());
        dest.insert(index, id);

        if let Some(note) = self.notes.get_mut(&id) {
            note.column = to;
        }
        Some(index)
    }
}
