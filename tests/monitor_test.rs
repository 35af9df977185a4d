//! Monitoring lifecycle and watcher behaviour.

use indexmap::IndexMap;
use sortify::{Engine, EngineError, EngineEvent, FileOrganizedEvent, Library, Settings};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::broadcast;
use tokio::time::{sleep, timeout};

const QUIET_MS: u64 = 200;

fn engine() -> Engine {
    let categories: IndexMap<String, Vec<String>> = [
        ("Images", vec![".jpg", ".png"]),
        ("Docs", vec![".pdf", ".txt"]),
        ("Video", vec![".mp4"]),
    ]
    .into_iter()
    .map(|(name, exts)| (name.to_string(), exts.into_iter().map(String::from).collect()))
    .collect();
    let library = Library {
        version: "1.0".into(),
        description: None,
        categories,
        paths: Vec::new(),
    };

    let mut settings = Settings::default();
    settings.engine.debounce_ms = QUIET_MS;
    Engine::from_library(settings, &library).unwrap()
}

fn watched_dir(engine: &Engine) -> (TempDir, PathBuf, String) {
    let temp = TempDir::new().unwrap();
    let root = temp.path().canonicalize().unwrap();
    let id = engine.add_path(&root, None).unwrap().id;
    (temp, root, id)
}

/// Next `file-organized` payload, skipping nothing else silently.
async fn next_organized(
    events: &mut broadcast::Receiver<EngineEvent>,
) -> (Option<String>, FileOrganizedEvent) {
    let event = timeout(Duration::from_secs(10), events.recv())
        .await
        .expect("timed out waiting for an event")
        .unwrap();
    match event {
        EngineEvent::FileOrganized {
            path_id, details, ..
        } => (path_id, details),
        other => panic!("unexpected event {other:?}"),
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_toggle_twice_leaves_no_watchers() {
    let engine = engine();
    let (_temp, _root, id) = watched_dir(&engine);

    assert!(engine.toggle_monitoring(&id).await.unwrap());
    assert_eq!(engine.active_watchers(), 1);
    let entry = engine.path(&id).unwrap();
    assert!(entry.is_monitoring);
    assert!(entry.stats.monitoring_since.is_some());
    assert!(engine.monitoring_since(&id).is_some());

    assert!(!engine.toggle_monitoring(&id).await.unwrap());
    assert_eq!(engine.active_watchers(), 0);
    let entry = engine.path(&id).unwrap();
    assert!(!entry.is_monitoring);
    assert!(entry.stats.monitoring_since.is_none());
    assert!(engine.monitoring_since(&id).is_none());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_start_and_stop_are_idempotent() {
    let engine = engine();
    let (_temp, _root, id) = watched_dir(&engine);

    assert!(engine.start_monitoring(&id).unwrap().is_active());
    assert!(engine.start_monitoring(&id).unwrap().is_active());
    assert_eq!(engine.active_watchers(), 1);

    assert!(!engine.stop_monitoring(&id).await.unwrap().is_active());
    assert!(!engine.stop_monitoring(&id).await.unwrap().is_active());
    assert_eq!(engine.active_watchers(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_new_file_is_organized_after_quiet_interval() {
    let engine = engine();
    let (_temp, root, id) = watched_dir(&engine);
    let mut events = engine.subscribe();
    engine.start_monitoring(&id).unwrap();

    fs::write(root.join("report.pdf"), "pdf").unwrap();

    // Still there before the quiet interval has passed
    sleep(Duration::from_millis(QUIET_MS / 2)).await;
    assert!(root.join("report.pdf").exists());

    let (path_id, event) = next_organized(&mut events).await;
    assert_eq!(path_id.as_deref(), Some(id.as_str()));
    assert_eq!(event.file_name, "report.pdf");
    assert_eq!(event.category, "Docs");
    assert_eq!(event.moved_to_path, root.join("Docs/report.pdf"));
    assert!(root.join("Docs/report.pdf").exists());
    assert_eq!(engine.path(&id).unwrap().stats.files_organized, 1);

    engine.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_renamed_while_pending_fires_once_for_final_name() {
    let engine = engine();
    let (_temp, root, id) = watched_dir(&engine);
    let mut events = engine.subscribe();
    engine.start_monitoring(&id).unwrap();

    fs::write(root.join("video.mp4"), "frames").unwrap();
    fs::rename(root.join("video.mp4"), root.join("video_final.mp4")).unwrap();

    let (_, event) = next_organized(&mut events).await;
    assert_eq!(event.file_name, "video_final.mp4");
    assert!(root.join("Video/video_final.mp4").exists());

    // No second event for the pre-rename name
    sleep(Duration::from_millis(QUIET_MS * 3)).await;
    assert!(matches!(
        events.try_recv(),
        Err(broadcast::error::TryRecvError::Empty)
    ));

    engine.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_two_paths_run_independently_and_keep_order() {
    let engine = engine();
    let (_t1, root1, id1) = watched_dir(&engine);
    let (_t2, root2, id2) = watched_dir(&engine);
    let mut events = engine.subscribe();
    engine.start_monitoring(&id1).unwrap();
    engine.start_monitoring(&id2).unwrap();

    let burst: Vec<String> = (0..5).map(|i| format!("shot{i}.jpg")).collect();
    for name in &burst {
        fs::write(root1.join(name), name).unwrap();
        sleep(Duration::from_millis(10)).await;
    }
    fs::write(root2.join("notes.txt"), "n").unwrap();

    let mut from_p1 = Vec::new();
    let mut from_p2 = Vec::new();
    for _ in 0..6 {
        let (path_id, event) = next_organized(&mut events).await;
        match path_id.as_deref() {
            Some(id) if id == id1 => from_p1.push(event.file_name),
            Some(id) if id == id2 => from_p2.push(event.file_name),
            other => panic!("event for unexpected path {other:?}"),
        }
    }

    assert_eq!(from_p1, burst);
    assert_eq!(from_p2, vec!["notes.txt"]);

    // Stopping one path leaves the other running
    engine.stop_monitoring(&id1).await.unwrap();
    fs::write(root2.join("late.png"), "l").unwrap();
    let (path_id, event) = next_organized(&mut events).await;
    assert_eq!(path_id.as_deref(), Some(id2.as_str()));
    assert_eq!(event.file_name, "late.png");

    engine.shutdown().await;
    assert_eq!(engine.active_watchers(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_stopped_path_does_not_organize() {
    let engine = engine();
    let (_temp, root, id) = watched_dir(&engine);
    engine.start_monitoring(&id).unwrap();
    engine.stop_monitoring(&id).await.unwrap();

    fs::write(root.join("a.jpg"), "a").unwrap();
    sleep(Duration::from_millis(QUIET_MS * 3)).await;
    assert!(root.join("a.jpg").exists());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_undo_into_watched_root_is_not_reorganized() {
    let engine = engine();
    let (_temp, root, id) = watched_dir(&engine);
    let mut events = engine.subscribe();
    engine.start_monitoring(&id).unwrap();

    fs::write(root.join("a.jpg"), "a").unwrap();
    let (_, event) = next_organized(&mut events).await;

    let undo = engine
        .undo_move(&event.moved_to_path, &event.original_path)
        .await
        .unwrap();
    assert_eq!(undo.resolved_path, root.join("a.jpg"));

    sleep(Duration::from_millis(QUIET_MS * 3)).await;
    assert!(root.join("a.jpg").exists());
    assert!(events.try_recv().is_err());

    engine.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_many_undos_into_watched_root_stay_put() {
    let engine = engine();
    let (_temp, root, id) = watched_dir(&engine);
    let mut events = engine.subscribe();
    engine.start_monitoring(&id).unwrap();

    let names: Vec<String> = (0..30).map(|i| format!("img{i}.jpg")).collect();
    for name in &names {
        fs::write(root.join(name), name).unwrap();
    }
    let mut organized = Vec::new();
    for _ in &names {
        organized.push(next_organized(&mut events).await.1);
    }

    for event in &organized {
        engine
            .undo_move(&event.moved_to_path, &event.original_path)
            .await
            .unwrap();
    }

    sleep(Duration::from_millis(QUIET_MS * 3)).await;
    for name in &names {
        assert!(root.join(name).exists(), "{name} was moved away again");
    }
    assert!(events.try_recv().is_err());

    engine.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_removed_root_stops_only_that_path() {
    let engine = engine();
    let (temp, _root, id) = watched_dir(&engine);
    let (_keep, _root2, other) = watched_dir(&engine);
    let mut events = engine.subscribe();
    engine.start_monitoring(&id).unwrap();
    engine.start_monitoring(&other).unwrap();

    drop(temp);

    let event = timeout(Duration::from_secs(10), events.recv())
        .await
        .expect("timed out waiting for monitoring-stopped")
        .unwrap();
    match event {
        EngineEvent::MonitoringStopped { path_id, .. } => assert_eq!(path_id, id),
        other => panic!("unexpected event {other:?}"),
    }

    assert!(!engine.path(&id).unwrap().is_monitoring);
    assert_eq!(engine.active_watchers(), 1);
    assert!(engine.path(&other).unwrap().is_monitoring);

    engine.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_start_on_missing_directory_fails() {
    let engine = engine();
    let (temp, _root, id) = watched_dir(&engine);
    drop(temp);

    let err = engine.start_monitoring(&id).unwrap_err();
    assert!(matches!(err, EngineError::WatchSetupFailed { .. }));
    assert_eq!(engine.active_watchers(), 0);
    assert!(!engine.path(&id).unwrap().is_monitoring);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_remove_path_stops_its_watcher() {
    let engine = engine();
    let (_temp, _root, id) = watched_dir(&engine);
    engine.start_monitoring(&id).unwrap();

    engine.remove_path(&id).await.unwrap();
    assert_eq!(engine.active_watchers(), 0);
    assert!(engine.paths().is_empty());
}
