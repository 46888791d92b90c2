mod common;

use bytes::Bytes;
use common::MemoryFiles;
use hestia::agents::artifacts::{ArtifactCollector, ArtifactSink};
use hestia::agents::domain::{FileObject, MessageContent, ThreadMessage};
use std::fs;
use std::sync::Arc;
use tempfile::TempDir;

fn generated(id: &str, filename: &str) -> FileObject {
    FileObject {
        id: id.to_string(),
        filename: filename.to_string(),
        purpose: "assistants_output".to_string(),
        bytes: 0,
    }
}

fn message_with(id: &str, file_ids: &[&str]) -> ThreadMessage {
    let mut message = ThreadMessage::assistant(id, vec![MessageContent::text("Export ready.")]);
    message.attachments = file_ids.iter().map(|f| f.to_string()).collect();
    message
}

fn files_with(entries: &[(&str, &str, &'static [u8])]) -> Arc<MemoryFiles> {
    let files = Arc::new(MemoryFiles::default());
    for (id, filename, content) in entries {
        files.files.lock().unwrap().push(generated(id, filename));
        files
            .contents
            .lock()
            .unwrap()
            .insert(id.to_string(), Bytes::from_static(content));
    }
    files
}

#[tokio::test]
async fn test_artifacts_with_same_name_are_kept_apart() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let files = files_with(&[
        ("file-a", "/mnt/data/usage.csv", &b"room,kwh\noffice,3\n"[..]),
        ("file-b", "/mnt/data/usage.csv", &b"room,kwh\nkitchen,5\n"[..]),
    ]);
    let collector = ArtifactCollector::new(files, dir.path());

    let first = collector.collect(&[message_with("msg_1", &["file-a"])]).await;
    let second = collector.collect(&[message_with("msg_2", &["file-b"])]).await;

    assert_eq!(first, vec![dir.path().join("usage.csv")]);
    assert_eq!(second, vec![dir.path().join("usage-file-b.csv")]);
    assert_eq!(fs::read_to_string(&first[0])?, "room,kwh\noffice,3\n");
    assert_eq!(fs::read_to_string(&second[0])?, "room,kwh\nkitchen,5\n");
    Ok(())
}

#[tokio::test]
async fn test_artifact_is_downloaded_once() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let files = files_with(&[("file-a", "chart.png", &b"\x89PNG\r\n\x1a\n"[..])]);
    let collector = ArtifactCollector::new(files, dir.path());
    let messages = [message_with("msg_1", &["file-a", "file-a"])];

    assert_eq!(collector.collect(&messages).await, vec![dir.path().join("chart.png")]);
    assert!(collector.collect(&messages).await.is_empty());
    assert_eq!(fs::read_dir(dir.path())?.count(), 1);
    Ok(())
}

#[tokio::test]
async fn test_user_uploads_are_not_downloaded() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let files = Arc::new(MemoryFiles::default());
    files.files.lock().unwrap().push(FileObject {
        purpose: "assistants".to_string(),
        ..generated("file-u", "floorplan.png")
    });
    let collector = ArtifactCollector::new(files, dir.path());

    assert!(collector.collect(&[message_with("msg_1", &["file-u"])]).await.is_empty());
    Ok(())
}
