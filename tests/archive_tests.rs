use meeting_relay::capture::ChunkArchive;
use tempfile::TempDir;

#[tokio::test]
async fn test_archive_appends_payloads_in_order() {
    let temp_dir = TempDir::new().unwrap();

    let mut archive = ChunkArchive::create(temp_dir.path(), "session-a")
        .await
        .unwrap();

    archive.append(&[1, 2, 3]).await.unwrap();
    archive.append(&[]).await.unwrap(); // empty final payload writes nothing
    archive.append(&[4, 5]).await.unwrap();
    archive.flush().await.unwrap();

    assert_eq!(archive.bytes_written(), 5);
    assert!(archive.path().ends_with("session-a.wav"));

    let data = std::fs::read(archive.path()).unwrap();
    assert_eq!(data, vec![1, 2, 3, 4, 5]);
}

#[tokio::test]
async fn test_archive_creates_missing_directory() {
    let temp_dir = TempDir::new().unwrap();
    let nested = temp_dir.path().join("recordings");

    let mut archive = ChunkArchive::create(&nested, "session-b").await.unwrap();
    archive.append(&[9u8; 16]).await.unwrap();
    archive.flush().await.unwrap();

    assert!(nested.join("session-b.wav").exists());
    assert_eq!(std::fs::read(nested.join("session-b.wav")).unwrap().len(), 16);
}
