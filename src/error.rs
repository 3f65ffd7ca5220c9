use thiserror::Error;

pub type Result<T> = std::result::Result<T, BoardError>;

#[derive(Debug, Error)]
pub enum BoardError {
    #[error("Duplicate key: {0}")]
    DuplicateKey(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Board not initialized")]
    BoardNotInitialized,

    #[error("Invalid folder name: {0:?}")]
    InvalidFolderName(String),

    #[error("Invalid note ID: {0}")]
    InvalidNoteId(String),

    #[error("Invalid column: {0}")]
    InvalidColumn(String),

    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[cfg(feature = "sqlite-storage")]
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl BoardError {
    /// True for failures of the persistence backend itself, as opposed to
    /// rejected input such as a duplicate folder or an unknown note.
    pub fn is_storage(&self) -> bool {
        match self {
            Self::StorageError(_) | Self::IoError(_) | Self::SerializationError(_) => true,
            #[cfg(feature = "sqlite-storage")]
            Self::Sqlite(_) => true,
            _ => false,
        }
    }
}
