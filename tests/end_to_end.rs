#![cfg(feature = "file-storage")]

use std::sync::Arc;

use stickyboard_core::{
    resolve_drop_index, BoardConfig, BoardController, BoardError, BoardStore, ColumnId, FileStore,
    NoteId, Rect,
};
use tempfile::TempDir;

async fn open_store(dir: &TempDir) -> Arc<FileStore> {
    let store = FileStore::new(dir.path());
    store.initialize().await.unwrap();
    Arc::new(store)
}

#[tokio::test]
async fn test_write_spec_scenario() {
    let temp_dir = TempDir::new().unwrap();
    let store = open_store(&temp_dir).await;
    let mut controller = BoardController::open(store.clone(), BoardConfig::default())
        .await
        .unwrap();

    controller.add_folder("Work").await.unwrap();
    controller.switch_folder("Work").await.unwrap();

    let id = controller.add_note(ColumnId::Todo).await.unwrap();
    assert_eq!(id, NoteId::new(1));
    assert_eq!(controller.note(id).unwrap().content, "New Note");

    controller.edit_note(id, "Write spec").await.unwrap();
    controller
        .move_note(id, ColumnId::Todo, ColumnId::Done, 0)
        .await
        .unwrap();
    drop(controller);

    // Fresh store handle over the same directory
    let store = open_store(&temp_dir).await;
    let done = store.list_notes("Work", Some(ColumnId::Done)).await.unwrap();
    assert_eq!(done.len(), 1);
    assert_eq!(done[0].id, Some(id));
    assert_eq!(done[0].content, "Write spec");
    assert!(store
        .list_notes("Work", Some(ColumnId::Todo))
        .await
        .unwrap()
        .is_empty());

    let mut controller = BoardController::open(store, BoardConfig::default())
        .await
        .unwrap();
    controller.switch_folder("Work").await.unwrap();
    let done: Vec<_> = controller
        .column(ColumnId::Done)
        .iter()
        .map(|n| n.content.clone())
        .collect();
    assert_eq!(done, vec!["Write spec"]);
}

#[tokio::test]
async fn test_duplicate_folder_through_store() {
    let temp_dir = TempDir::new().unwrap();
    let store = open_store(&temp_dir).await;

    store.create_folder("X").await.unwrap();
    assert!(matches!(
        store.create_folder("X").await,
        Err(BoardError::DuplicateKey(_))
    ));
    assert_eq!(
        store
            .list_folders()
            .await
            .unwrap()
            .iter()
            .filter(|f| f.as_str() == "X")
            .count(),
        1
    );
}

#[tokio::test]
async fn test_drop_geometry_feeds_move() {
    let temp_dir = TempDir::new().unwrap();
    let store = open_store(&temp_dir).await;
    let mut controller = BoardController::open(store, BoardConfig::default())
        .await
        .unwrap();

    let a = controller.add_note(ColumnId::Done).await.unwrap();
    let b = controller.add_note(ColumnId::Done).await.unwrap();
    let dragged = controller.add_note(ColumnId::Todo).await.unwrap();

    // Cards of the Done column as laid out on screen; pointer between them
    let layout = [
        Rect::new(0.0, 0.0, 180.0, 40.0),
        Rect::new(0.0, 50.0, 180.0, 40.0),
    ];
    let index = resolve_drop_index(45.0, &layout);
    controller
        .move_note(dragged, ColumnId::Todo, ColumnId::Done, index)
        .await
        .unwrap();

    let order: Vec<_> = controller
        .column(ColumnId::Done)
        .iter()
        .filter_map(|n| n.id)
        .collect();
    assert_eq!(order, vec![a, dragged, b]);
}
