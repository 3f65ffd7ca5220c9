use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// Store-wide unique identifier for a note, assigned on first persist
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NoteId(u64);

impl NoteId {
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn value(&self) -> u64 {
        self.0
    }
}

impl FromStr for NoteId {
    type Err = crate::error::BoardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<u64>()
            .map(Self)
            .map_err(|_| crate::error::BoardError::InvalidNoteId(s.to_string()))
    }
}

impl fmt::Display for NoteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A fixed lane of the board
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ColumnId {
    Todo,
    InProgress,
    Done,
}

impl ColumnId {
    pub const ALL: [ColumnId; 3] = [ColumnId::Todo, ColumnId::InProgress, ColumnId::Done];

    /// Storage key, as used in `data-column` attributes and the database
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Todo => "todo",
            Self::InProgress => "in-progress",
            Self::Done => "done",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            Self::Todo => "To Do",
            Self::InProgress => "In Progress",
            Self::Done => "Done",
        }
    }
}

impl FromStr for ColumnId {
    type Err = crate::error::BoardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "todo" => Ok(Self::Todo),
            "in-progress" => Ok(Self::InProgress),
            "done" => Ok(Self::Done),
            _ => Err(crate::error::BoardError::InvalidColumn(s.to_string())),
        }
    }
}

impl fmt::Display for ColumnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A sticky note. `id` is `None` until the store has assigned one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Note {
    pub id: Option<NoteId>,
    pub folder: String,
    pub column: ColumnId,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Note {
    /// Creates an unsaved note
    pub fn new(folder: impl Into<String>, column: ColumnId, content: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: None,
            folder: folder.into(),
            column,
            content: content.into(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_id(mut self, id: NoteId) -> Self {
        self.id = Some(id);
        self
    }

    /// Replaces the content, bumping `updated_at` only on an actual change.
    /// Returns whether anything changed.
    pub fn set_content(&mut self, content: impl Into<String>) -> bool {
        let content = content.into();
        if content == self.content {
            return false;
        }
        self.content = content;
        self.updated_at = Utc::now();
        true
    }

    /// Whether the note belongs to the given scope
    pub fn in_scope(&self, folder: &str, column: ColumnId) -> bool {
        self.folder == folder && self.column == column
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_parsing() {
        assert_eq!(ColumnId::from_str("todo").unwrap(), ColumnId::Todo);
        assert_eq!(ColumnId::from_str("In-Progress").unwrap(), ColumnId::InProgress);
        assert_eq!(ColumnId::from_str(" DONE ").unwrap(), ColumnId::Done);
        assert!(ColumnId::from_str("backlog").is_err());
    }

    #[test]
    fn test_column_serde_uses_storage_keys() {
        let json = serde_json::to_string(&ColumnId::InProgress).unwrap();
        assert_eq!(json, "\"in-progress\"");

        let parsed: ColumnId = serde_json::from_str("\"done\"").unwrap();
        assert_eq!(parsed, ColumnId::Done);
    }

    #[test]
    fn test_note_id_is_transparent() {
        let id = NoteId::new(42);
        assert_eq!(serde_json::to_string(&id).unwrap(), "42");
        assert_eq!(id.to_string(), "42");
        assert_eq!(NoteId::from_str("42").unwrap(), id);
    }

    #[test]
    fn test_new_note_is_unsaved() {
        let note = Note::new("Work", ColumnId::Todo, "New Note");
        assert!(note.id.is_none());
        assert_eq!(note.created_at, note.updated_at);
        assert!(note.in_scope("Work", ColumnId::Todo));
        assert!(!note.in_scope("Work", ColumnId::Done));
    }

    #[test]
    fn test_set_content() {
        let mut note = Note::new("Work", ColumnId::Todo, "New Note");

        assert!(!note.set_content("New Note"));
        assert!(note.set_content("Write spec"));
        assert_eq!(note.content, "Write spec");
        assert!(note.updated_at >= note.created_at);
    }
}
