use crate::{
    domain::{BoardConfig, ColumnId, Folder, Note, NoteId, Subfolder, SubfolderId},
    error::{BoardError, Result},
    storage::{content_matches, BoardStore},
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::{
    collections::HashSet,
    path::{Path, PathBuf},
};
use tokio::{fs, sync::Mutex};

/// Everything the file store persists besides the board configuration.
/// `notes` is kept in storage order.
#[derive(Debug, Default, Serialize, Deserialize)]
struct Snapshot {
    last_note_id: u64,
    folders: Vec<Folder>,
    notes: Vec<Note>,
    #[serde(default)]
    last_subfolder_id: u64,
    #[serde(default)]
    subfolders: Vec<Subfolder>,
}

impl Snapshot {
    fn allocate_id(&mut self) -> NoteId {
        self.last_note_id += 1;
        NoteId::new(self.last_note_id)
    }

    fn reserve_id(&mut self, id: NoteId) {
        self.last_note_id = self.last_note_id.max(id.value());
    }
}

/// File-based store: one JSON snapshot replaced atomically on every write
pub struct FileStore {
    root_path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileStore {
    const STORE_DIR: &'static str = ".stickyboard";
    const STORE_FILE: &'static str = "store.json";
    const BOARD_FILE: &'static str = "board.json";

    /// Creates a new FileStore rooted in the given project directory
    pub fn new(project_root: impl AsRef<Path>) -> Self {
        Self {
            root_path: project_root.as_ref().join(Self::STORE_DIR),
            write_lock: Mutex::new(()),
        }
    }

    fn store_file(&self) -> PathBuf {
        self.root_path.join(Self::STORE_FILE)
    }

    fn board_file(&self) -> PathBuf {
        self.root_path.join(Self::BOARD_FILE)
    }

    async fn ensure_directory_exists(&self, path: &Path) -> Result<()> {
        if !path.exists() {
            fs::create_dir_all(path).await?;
        }
        Ok(())
    }

    /// Writes `contents` next to `path` and renames it into place, so a
    /// reader sees either the old file or the new one.
    async fn write_atomic(&self, path: &Path, contents: String) -> Result<()> {
        self.ensure_directory_exists(&self.root_path).await?;

        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, contents).await?;
        if let Err(e) = fs::rename(&tmp, path).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(e.into());
        }
        Ok(())
    }

    async fn read_snapshot(&self) -> Result<Snapshot> {
        let path = self.store_file();
        if !path.exists() {
            return Ok(Snapshot::default());
        }

        let contents = fs::read_to_string(&path).await?;
        let snapshot: Snapshot = serde_json::from_str(&contents)?;
        Ok(snapshot)
    }

    async fn write_snapshot(&self, snapshot: &Snapshot) -> Result<()> {
        let json = serde_json::to_string_pretty(snapshot)?;
        self.write_atomic(&self.store_file(), json).await
    }
}

#[async_trait]
impl BoardStore for FileStore {
    async fn initialize(&self) -> Result<()> {
        let _guard = self.write_lock.lock().await;

        self.ensure_directory_exists(&self.root_path).await?;

        if !self.store_file().exists() {
            self.write_snapshot(&Snapshot::default()).await?;
        }

        if !self.board_file().exists() {
            let json = serde_json::to_string_pretty(&BoardConfig::default())?;
            self.write_atomic(&self.board_file(), json).await?;
        }

        log::debug!(
            "[stickyboard.store.init] File store ready at {}",
            self.root_path.display()
        );
        Ok(())
    }

    async fn is_initialized(&self) -> bool {
        self.root_path.exists() && self.store_file().exists() && self.board_file().exists()
    }

    async fn create_folder(&self, name: &str) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut snapshot = self.read_snapshot().await?;

        if snapshot.folders.iter().any(|f| f.name == name) {
            return Err(BoardError::DuplicateKey(name.to_string()));
        }

        snapshot.folders.push(Folder::new(name));
        self.write_snapshot(&snapshot).await?;

        log::info!("[stickyboard.store.folder] Created folder {:?}", name);
        Ok(())
    }

    async fn list_folders(&self) -> Result<Vec<String>> {
        let _guard = self.write_lock.lock().await;
        let snapshot = self.read_snapshot().await?;
        Ok(snapshot.folders.into_iter().map(|f| f.name).collect())
    }

    async fn folder_exists(&self, name: &str) -> Result<bool> {
        let _guard = self.write_lock.lock().await;
        let snapshot = self.read_snapshot().await?;
        Ok(snapshot.folders.iter().any(|f| f.name == name))
    }

    async fn list_notes(&self, folder: &str, column: Option<ColumnId>) -> Result<Vec<Note>> {
        let _guard = self.write_lock.lock().await;
        let snapshot = self.read_snapshot().await?;

        Ok(snapshot
            .notes
            .into_iter()
            .filter(|n| n.folder == folder && column.map_or(true, |c| n.column == c))
            .collect())
    }

    async fn load_note(&self, id: NoteId) -> Result<Note> {
        let _guard = self.write_lock.lock().await;
        let snapshot = self.read_snapshot().await?;

        snapshot
            .notes
            .into_iter()
            .find(|n| n.id == Some(id))
            .ok_or_else(|| BoardError::NotFound(id.to_string()))
    }

    async fn upsert_note(&self, note: &Note) -> Result<NoteId> {
        let _guard = self.write_lock.lock().await;
        let mut snapshot = self.read_snapshot().await?;

        let id = match note.id {
            Some(id) => {
                snapshot.reserve_id(id);
                id
            }
            None => snapshot.allocate_id(),
        };
        let stored = note.clone().with_id(id);

        match snapshot.notes.iter_mut().find(|n| n.id == Some(id)) {
            Some(existing) => *existing = stored,
            None => snapshot.notes.push(stored),
        }

        self.write_snapshot(&snapshot).await?;
        log::debug!("[stickyboard.store.upsert] Saved note {}", id);
        Ok(id)
    }

    async fn delete_note(&self, id: NoteId) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut snapshot = self.read_snapshot().await?;

        let before = snapshot.notes.len();
        snapshot.notes.retain(|n| n.id != Some(id));

        if snapshot.notes.len() == before {
            log::debug!("[stickyboard.store.delete] Note {} already absent", id);
            return Ok(());
        }

        self.write_snapshot(&snapshot).await?;
        log::debug!("[stickyboard.store.delete] Deleted note {}", id);
        Ok(())
    }

    async fn replace_scope(
        &self,
        folder: &str,
        column: ColumnId,
        notes: &[Note],
    ) -> Result<Vec<NoteId>> {
        let _guard = self.write_lock.lock().await;
        let mut snapshot = self.read_snapshot().await?;

        let incoming: HashSet<NoteId> = notes.iter().filter_map(|n| n.id).collect();
        snapshot.notes.retain(|n| {
            !n.in_scope(folder, column) && !n.id.is_some_and(|id| incoming.contains(&id))
        });

        let mut ids = Vec::with_capacity(notes.len());
        for note in notes {
            let id = match note.id {
                Some(id) => {
                    snapshot.reserve_id(id);
                    id
                }
                None => snapshot.allocate_id(),
            };
            let mut stored = note.clone().with_id(id);
            stored.folder = folder.to_string();
            stored.column = column;
            snapshot.notes.push(stored);
            ids.push(id);
        }

        // The whole snapshot is swapped in one rename; nothing above is visible until then.
        self.write_snapshot(&snapshot).await?;

        log::debug!(
            "[stickyboard.store.replace] Replaced scope {:?}/{} with {} notes",
            folder,
            column,
            ids.len()
        );
        Ok(ids)
    }

    async fn create_subfolder(&self, folder: &str, name: &str) -> Result<SubfolderId> {
        let _guard = self.write_lock.lock().await;
        let mut snapshot = self.read_snapshot().await?;

        if !snapshot.folders.iter().any(|f| f.name == folder) {
            return Err(BoardError::NotFound(format!("folder {:?}", folder)));
        }
        if snapshot.subfolders.iter().any(|s| s.name == name) {
            return Err(BoardError::DuplicateKey(name.to_string()));
        }

        snapshot.last_subfolder_id += 1;
        let id = SubfolderId::new(snapshot.last_subfolder_id);
        snapshot.subfolders.push(Subfolder::new(id, folder, name));
        self.write_snapshot(&snapshot).await?;

        log::info!(
            "[stickyboard.store.subfolder] Created subfolder {:?} in {:?}",
            name,
            folder
        );
        Ok(id)
    }

    async fn list_subfolders(&self, folder: &str) -> Result<Vec<Subfolder>> {
        let _guard = self.write_lock.lock().await;
        let snapshot = self.read_snapshot().await?;

        Ok(snapshot
            .subfolders
            .into_iter()
            .filter(|s| s.folder == folder)
            .collect())
    }

    async fn load_subfolder(&self, id: SubfolderId) -> Result<Subfolder> {
        let _guard = self.write_lock.lock().await;
        let snapshot = self.read_snapshot().await?;

        snapshot
            .subfolders
            .into_iter()
            .find(|s| s.id == id)
            .ok_or_else(|| BoardError::NotFound(format!("subfolder {}", id)))
    }

    async fn fill_subfolder(&self, id: SubfolderId, text: &str) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut snapshot = self.read_snapshot().await?;

        let subfolder = snapshot
            .subfolders
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or_else(|| BoardError::NotFound(format!("subfolder {}", id)))?;
        subfolder.set_text(text);

        self.write_snapshot(&snapshot).await?;
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

        let _guard = self.write_lock.lock().await;
        let json = serde_json::to_string_pretty(config)?;
        self.write_atomic(&self.board_file(), json).await
    }

    async fn load_config(&self) -> Result<BoardConfig> {
        let board_file = self.board_file();

        if !board_file.exists() {
            return Err(BoardError::BoardNotInitialized);
        }

        let contents = fs::read_to_string(&board_file).await?;
        let config: BoardConfig = serde_json::from_str(&contents)?;
        config.validate()?;

        Ok(config)
    }
}
