use crate::{
    domain::{BoardConfig, ColumnId, Note, NoteId, Subfolder, SubfolderId},
    error::{BoardError, Result},
    storage::{content_matches, BoardStore},
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{ffi, params, Connection, OptionalExtension, Row, Transaction};
use std::{
    path::Path,
    str::FromStr,
    sync::{Mutex, MutexGuard},
};

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS folders (
        seq INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL UNIQUE,
        created_at INTEGER NOT NULL
    );
    CREATE TABLE IF NOT EXISTS notes (
        seq INTEGER PRIMARY KEY AUTOINCREMENT,
        id INTEGER NOT NULL UNIQUE,
        folder TEXT NOT NULL,
        column_id TEXT NOT NULL,
        content TEXT NOT NULL,
        created_at INTEGER NOT NULL,
        updated_at INTEGER NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_notes_scope ON notes (folder, column_id, seq);
    CREATE TABLE IF NOT EXISTS subfolders (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL UNIQUE,
        folder TEXT NOT NULL,
        text TEXT NOT NULL DEFAULT '',
        created_at INTEGER NOT NULL,
        updated_at INTEGER NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_subfolders_folder ON subfolders (folder, id);
    CREATE TABLE IF NOT EXISTS meta (
        key TEXT PRIMARY KEY,
        value TEXT NOT NULL
    );
";

const LAST_NOTE_ID: &str = "last_note_id";
const BOARD_CONFIG: &str = "board_config";

const NOTE_COLUMNS: &str = "id, folder, column_id, content, created_at, updated_at";
const SUBFOLDER_COLUMNS: &str = "id, name, folder, text, created_at, updated_at";

/// SQLite-backed store. `seq` records storage order; a note's position is
/// wherever its row sits in `seq` order within its scope.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Opens (or creates) a database file and applies the schema
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::with_connection(Connection::open(path)?)
    }

    /// Opens a private in-memory database
    pub fn open_in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| BoardError::StorageError("connection lock poisoned".to_string()))
    }

    fn note_from_row(row: &Row<'_>) -> rusqlite::Result<Note> {
        let column: String = row.get(2)?;
        let column = ColumnId::from_str(&column).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(2, rusqlite::types::Type::Text, Box::new(e))
        })?;

        Ok(Note {
            id: Some(NoteId::new(row.get::<_, i64>(0)? as u64)),
            folder: row.get(1)?,
            column,
            content: row.get(3)?,
            created_at: from_millis(row.get(4)?),
            updated_at: from_millis(row.get(5)?),
        })
    }

    fn subfolder_from_row(row: &Row<'_>) -> rusqlite::Result<Subfolder> {
        Ok(Subfolder {
            id: SubfolderId::new(row.get::<_, i64>(0)? as u64),
            name: row.get(1)?,
            folder: row.get(2)?,
            text: row.get(3)?,
            created_at: from_millis(row.get(4)?),
            updated_at: from_millis(row.get(5)?),
        })
    }

    fn folder_exists_in(conn: &Connection, name: &str) -> Result<bool> {
        let found = conn
            .query_row(
                "SELECT 1 FROM folders WHERE name = ?1",
                params![name],
                |_| Ok(()),
            )
            .optional()?;
        Ok(found.is_some())
    }

    fn get_meta(tx: &Connection, key: &str) -> Result<Option<String>> {
        Ok(tx
            .query_row("SELECT value FROM meta WHERE key = ?1", params![key], |row| {
                row.get(0)
            })
            .optional()?)
    }

    fn set_meta(tx: &Connection, key: &str, value: &str) -> Result<()> {
        tx.execute(
            "INSERT INTO meta (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![key, value],
        )?;
        Ok(())
    }

    /// Picks the ID a note is stored under and advances the counter past it
    fn claim_id(tx: &Transaction<'_>, requested: Option<NoteId>) -> Result<NoteId> {
        let last = match Self::get_meta(tx, LAST_NOTE_ID)? {
            Some(value) => value.parse::<u64>().map_err(|_| {
                BoardError::StorageError(format!("corrupt note counter: {:?}", value))
            })?,
            None => 0,
        };

        let id = requested.unwrap_or_else(|| NoteId::new(last + 1));
        if id.value() > last {
            Self::set_meta(tx, LAST_NOTE_ID, &id.value().to_string())?;
        }
        Ok(id)
    }

    fn insert_note(tx: &Transaction<'_>, id: NoteId, note: &Note) -> Result<()> {
        tx.execute(
            "INSERT INTO notes (id, folder, column_id, content, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                id.value() as i64,
                note.folder,
                note.column.as_str(),
                note.content,
                note.created_at.timestamp_millis(),
                note.updated_at.timestamp_millis(),
            ],
        )?;
        Ok(())
    }
}

fn from_millis(ms: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ms).unwrap_or_default()
}

fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _) if e.extended_code == ffi::SQLITE_CONSTRAINT_UNIQUE
    )
}

#[async_trait]
impl BoardStore for SqliteStore {
    async fn initialize(&self) -> Result<()> {
        let conn = self.conn()?;
        conn.execute_batch(SCHEMA)?;

        if Self::get_meta(&conn, BOARD_CONFIG)?.is_none() {
            let json = serde_json::to_string(&BoardConfig::default())?;
            Self::set_meta(&conn, BOARD_CONFIG, &json)?;
        }

        log::debug!("[stickyboard.store.init] SQLite store ready");
        Ok(())
    }

    async fn is_initialized(&self) -> bool {
        match self.conn() {
            Ok(conn) => matches!(Self::get_meta(&conn, BOARD_CONFIG), Ok(Some(_))),
            Err(_) => false,
        }
    }

    async fn create_folder(&self, name: &str) -> Result<()> {
        let conn = self.conn()?;

        match conn.execute(
            "INSERT INTO folders (name, created_at) VALUES (?1, ?2)",
            params![name, Utc::now().timestamp_millis()],
        ) {
            Ok(_) => {
                log::info!("[stickyboard.store.folder] Created folder {:?}", name);
                Ok(())
            }
            Err(e) if is_unique_violation(&e) => Err(BoardError::DuplicateKey(name.to_string())),
            Err(e) => Err(e.into()),
        }
    }

    async fn list_folders(&self) -> Result<Vec<String>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT name FROM folders ORDER BY seq")?;
        let names = stmt
            .query_map([], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(names)
    }

    async fn folder_exists(&self, name: &str) -> Result<bool> {
        let conn = self.conn()?;
        Self::folder_exists_in(&conn, name)
    }

    async fn list_notes(&self, folder: &str, column: Option<ColumnId>) -> Result<Vec<Note>> {
        let conn = self.conn()?;

        let notes = match column {
            Some(column) => {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {NOTE_COLUMNS} FROM notes WHERE folder = ?1 AND column_id = ?2 ORDER BY seq"
                ))?;
                let rows = stmt.query_map(params![folder, column.as_str()], Self::note_from_row)?;
                rows.collect::<rusqlite::Result<Vec<_>>>()?
            }
            None => {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {NOTE_COLUMNS} FROM notes WHERE folder = ?1 ORDER BY seq"
                ))?;
                let rows = stmt.query_map(params![folder], Self::note_from_row)?;
                rows.collect::<rusqlite::Result<Vec<_>>>()?
            }
        };
        Ok(notes)
    }

    async fn load_note(&self, id: NoteId) -> Result<Note> {
        let conn = self.conn()?;
        conn.query_row(
            &format!("SELECT {NOTE_COLUMNS} FROM notes WHERE id = ?1"),
            params![id.value() as i64],
            Self::note_from_row,
        )
        .optional()?
        .ok_or_else(|| BoardError::NotFound(id.to_string()))
    }

    async fn upsert_note(&self, note: &Note) -> Result<NoteId> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        let id = Self::claim_id(&tx, note.id)?;
        let updated = tx.execute(
            "UPDATE notes SET folder = ?2, column_id = ?3, content = ?4, updated_at = ?5
             WHERE id = ?1",
            params![
                id.value() as i64,
                note.folder,
                note.column.as_str(),
                note.content,
                note.updated_at.timestamp_millis(),
            ],
        )?;
        if updated == 0 {
            Self::insert_note(&tx, id, note)?;
        }

        tx.commit()?;
        log::debug!("[stickyboard.store.upsert] Saved note {}", id);
        Ok(id)
    }

    async fn delete_note(&self, id: NoteId) -> Result<()> {
        let conn = self.conn()?;
        let deleted = conn.execute("DELETE FROM notes WHERE id = ?1", params![id.value() as i64])?;

        if deleted == 0 {
            log::debug!("[stickyboard.store.delete] Note {} already absent", id);
        } else {
            log::debug!("[stickyboard.store.delete] Deleted note {}", id);
        }
        Ok(())
    }

    async fn replace_scope(
        &self,
        folder: &str,
        column: ColumnId,
        notes: &[Note],
    ) -> Result<Vec<NoteId>> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        tx.execute(
            "DELETE FROM notes WHERE folder = ?1 AND column_id = ?2",
            params![folder, column.as_str()],
        )?;

        let mut ids = Vec::with_capacity(notes.len());
        for note in notes {
            let id = Self::claim_id(&tx, note.id)?;
            tx.execute("DELETE FROM notes WHERE id = ?1", params![id.value() as i64])?;

            let mut stored = note.clone();
            stored.folder = folder.to_string();
            stored.column = column;
            Self::insert_note(&tx, id, &stored)?;
            ids.push(id);
        }

        // Dropping `tx` on an early return rolls everything back.
        tx.commit()?;

        log::debug!(
            "[stickyboard.store.replace] Replaced scope {:?}/{} with {} notes",
            folder,
            column,
            ids.len()
        );
        Ok(ids)
    }

    async fn create_subfolder(&self, folder: &str, name: &str) -> Result<SubfolderId> {
        let conn = self.conn()?;

        if !Self::folder_exists_in(&conn, folder)? {
            return Err(BoardError::NotFound(format!("folder {:?}", folder)));
        }

        let now = Utc::now().timestamp_millis();
        match conn.execute(
            "INSERT INTO subfolders (name, folder, created_at, updated_at) VALUES (?1, ?2, ?3, ?3)",
            params![name, folder, now],
        ) {
            Ok(_) => {
                let id = SubfolderId::new(conn.last_insert_rowid() as u64);
                log::info!(
                    "[stickyboard.store.subfolder] Created subfolder {:?} in {:?}",
                    name,
                    folder
                );
                Ok(id)
            }
            Err(e) if is_unique_violation(&e) => Err(BoardError::DuplicateKey(name.to_string())),
            Err(e) => Err(e.into()),
        }
    }

    async fn list_subfolders(&self, folder: &str) -> Result<Vec<Subfolder>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {SUBFOLDER_COLUMNS} FROM subfolders WHERE folder = ?1 ORDER BY id"
        ))?;
        let subfolders = stmt
            .query_map(params![folder], Self::subfolder_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(subfolders)
    }

    async fn load_subfolder(&self, id: SubfolderId) -> Result<Subfolder> {
        let conn = self.conn()?;
        conn.query_row(
            &format!("SELECT {SUBFOLDER_COLUMNS} FROM subfolders WHERE id = ?1"),
            params![id.value() as i64],
            Self::subfolder_from_row,
        )
        .optional()?
        .ok_or_else(|| BoardError::NotFound(format!("subfolder {}", id)))
    }

    async fn fill_subfolder(&self, id: SubfolderId, text: &str) -> Result<()> {
        let conn = self.conn()?;
        let updated = conn.execute(
            "UPDATE subfolders SET text = ?2, updated_at = ?3 WHERE id = ?1",
            params![id.value() as i64, text, Utc::now().timestamp_millis()],
        )?;

        if updated == 0 {
            return Err(BoardError::NotFound(format!("subfolder {}", id)));
        }
        log::debug!("[stickyboard.store.subfolder] Filled subfolder {}", id);
        Ok(())
    }

    async fn search_notes(&self, folder: &str, query: &str) -> Result<Vec<Note>> {
        let query_lower = query.to_lowercase();
        let notes = self.list_notes(folder, None).await?;

        Ok(notes
            .into_iter()
            .filter(|n| content_matches(n, &query_lower))
            .collect())
    }

    async fn save_config(&self, config: &BoardConfig) -> Result<()> {
        config.validate()?;

        let json = serde_json::to_string(config)?;
        let conn = self.conn()?;
        Self::set_meta(&conn, BOARD_CONFIG, &json)
    }

    async fn load_config(&self) -> Result<BoardConfig> {
        let json = {
            let conn = self.conn()?;
            Self::get_meta(&conn, BOARD_CONFIG)?
        };

        let config: BoardConfig =
            serde_json::from_str(&json.ok_or(BoardError::BoardNotInitialized)?)?;
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn setup() -> SqliteStore {
        let storage = SqliteStore::open_in_memory().unwrap();
        storage.initialize().await.unwrap();
        storage
    }

    fn contents(notes: &[Note]) -> Vec<&str> {
        notes.iter().map(|n| n.content.as_str()).collect()
    }

    #[tokio::test]
    async fn test_initialization() {
        let storage = SqliteStore::open_in_memory().unwrap();
        assert!(!storage.is_initialized().await);

        storage.initialize().await.unwrap();
        assert!(storage.is_initialized().await);
        assert_eq!(storage.load_config().await.unwrap(), BoardConfig::default());
    }

    #[tokio::test]
    async fn test_duplicate_folder_rejected() {
        let storage = setup().await;

        storage.create_folder("X").await.unwrap();
        assert!(matches!(
            storage.create_folder("X").await,
            Err(BoardError::DuplicateKey(_))
        ));
        assert_eq!(storage.list_folders().await.unwrap(), vec!["X"]);
        assert!(storage.folder_exists("X").await.unwrap());
        assert!(!storage.folder_exists("Y").await.unwrap());
    }

    #[tokio::test]
    async fn test_upsert_keeps_position() {
        let storage = setup().await;

        let a = storage
            .upsert_note(&Note::new("Work", ColumnId::Todo, "a"))
            .await
            .unwrap();
        storage
            .upsert_note(&Note::new("Work", ColumnId::Todo, "b"))
            .await
            .unwrap();
        assert_eq!(a.value(), 1);

        let mut note = storage.load_note(a).await.unwrap();
        note.set_content("a2");
        storage.upsert_note(&note).await.unwrap();

        let notes = storage.list_notes("Work", Some(ColumnId::Todo)).await.unwrap();
        assert_eq!(contents(&notes), vec!["a2", "b"]);
    }

    #[tokio::test]
    async fn test_replace_scope_reorders_and_moves() {
        let storage = setup().await;

        for content in ["a", "b"] {
            storage
                .upsert_note(&Note::new("Work", ColumnId::Todo, content))
                .await
                .unwrap();
        }
        let mut todo = storage.list_notes("Work", Some(ColumnId::Todo)).await.unwrap();
        let moved = todo.remove(0);

        storage
            .replace_scope("Work", ColumnId::Todo, &todo)
            .await
            .unwrap();
        storage
            .replace_scope("Work", ColumnId::Done, &[moved.clone()])
            .await
            .unwrap();

        let todo = storage.list_notes("Work", Some(ColumnId::Todo)).await.unwrap();
        let done = storage.list_notes("Work", Some(ColumnId::Done)).await.unwrap();
        assert_eq!(contents(&todo), vec!["b"]);
        assert_eq!(done.len(), 1);
        assert_eq!(done[0].id, moved.id);
        assert_eq!(done[0].column, ColumnId::Done);
    }

    #[tokio::test]
    async fn test_failed_replace_rolls_back() {
        let storage = setup().await;

        storage
            .upsert_note(&Note::new("Work", ColumnId::Todo, "keep"))
            .await
            .unwrap();
        {
            let conn = storage.conn().unwrap();
            conn.execute(
                "INSERT INTO meta (key, value) VALUES (?1, 'garbage')
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value",
                params![LAST_NOTE_ID],
            )
            .unwrap();
        }

        let result = storage
            .replace_scope("Work", ColumnId::Todo, &[Note::new("Work", ColumnId::Todo, "new")])
            .await;
        assert!(result.is_err());

        let notes = storage.list_notes("Work", Some(ColumnId::Todo)).await.unwrap();
        assert_eq!(contents(&notes), vec!["keep"]);
    }

    #[tokio::test]
    async fn test_delete_is_idempotent_and_ids_not_reused() {
        let storage = setup().await;

        let id = storage
            .upsert_note(&Note::new("Work", ColumnId::Todo, "a"))
            .await
            .unwrap();
        storage.delete_note(id).await.unwrap();
        storage.delete_note(id).await.unwrap();

        let next = storage
            .upsert_note(&Note::new("Work", ColumnId::Todo, "b"))
            .await
            .unwrap();
        assert!(next > id);
        assert!(matches!(storage.load_note(id).await, Err(BoardError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_persists_across_connections() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("board.db");

        {
            let storage = SqliteStore::open(&path).unwrap();
            storage.initialize().await.unwrap();
            storage.create_folder("Work").await.unwrap();
            storage
                .upsert_note(&Note::new("Work", ColumnId::Done, "shipped"))
                .await
                .unwrap();
        }

        let storage = SqliteStore::open(&path).unwrap();
        assert_eq!(storage.list_folders().await.unwrap(), vec!["Work"]);
        let results = storage.search_notes("Work", "SHIP").await.unwrap();
        assert_eq!(contents(&results), vec!["shipped"]);
    }

    #[tokio::test]
    async fn test_not_null_violation_is_not_duplicate() {
        let storage = setup().await;
        let conn = storage.conn().unwrap();

        let err = conn
            .execute(
                "INSERT INTO folders (name, created_at) VALUES (NULL, 0)",
                [],
            )
            .unwrap_err();
        assert!(!is_unique_violation(&err));

        conn.execute("INSERT INTO folders (name, created_at) VALUES ('X', 0)", [])
            .unwrap();
        let err = conn
            .execute("INSERT INTO folders (name, created_at) VALUES ('X', 0)", [])
            .unwrap_err();
        assert!(is_unique_violation(&err));
    }

    #[tokio::test]
    async fn test_subfolders() {
        let storage = setup().await;
        storage.create_folder("Work").await.unwrap();
        storage.create_folder("Home").await.unwrap();

        let drafts = storage.create_subfolder("Work", "Drafts").await.unwrap();
        storage.create_subfolder("Work", "Ideas").await.unwrap();
        assert!(matches!(
            storage.create_subfolder("Home", "Drafts").await,
            Err(BoardError::DuplicateKey(_))
        ));
        assert!(matches!(
            storage.create_subfolder("Missing", "Other").await,
            Err(BoardError::NotFound(_))
        ));

        storage.fill_subfolder(drafts, "chapter one").await.unwrap();
        assert_eq!(storage.load_subfolder(drafts).await.unwrap().text, "chapter one");
        assert!(matches!(
            storage.fill_subfolder(SubfolderId::new(99), "x").await,
            Err(BoardError::NotFound(_))
        ));

        let names: Vec<String> = storage
            .list_subfolders("Work")
            .await
            .unwrap()
            .into_iter()
            .map(|s| s.name)
            .collect();
        assert_eq!(names, vec!["Drafts", "Ideas"]);
        assert!(storage.list_subfolders("Home").await.unwrap().is_empty());
    }
}
