#![forbid(unsafe_code)]

use campaign_storage::blob::{is_safe_object_name, BlobSink, InMemoryBlobSink, LocalFsBlobSink};
use campaign_storage::store::StorageError;

#[test]
fn at_blob_db_01_local_fs_write_once_then_read() {
    let dir = tempfile::tempdir().unwrap();
    let sink = LocalFsBlobSink::new(dir.path().join("uploads")).unwrap();

    sink.write_once("abcd-0001.png", b"png-bytes").unwrap();
    assert_eq!(sink.read("abcd-0001.png").unwrap(), b"png-bytes".to_vec());
    assert!(sink.root().join("abcd-0001.png").exists());
}

#[test]
fn at_blob_db_02_local_fs_never_overwrites() {
    let dir = tempfile::tempdir().unwrap();
    let sink = LocalFsBlobSink::new(dir.path()).unwrap();

    sink.write_once("abcd-0001.pdf", b"first").unwrap();
    let err = sink.write_once("abcd-0001.pdf", b"second").unwrap_err();
    assert!(matches!(err, StorageError::DuplicateKey { .. }));
    assert_eq!(sink.read("abcd-0001.pdf").unwrap(), b"first".to_vec());
}

#[test]
fn at_blob_db_03_missing_object_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let sink = LocalFsBlobSink::new(dir.path()).unwrap();
    assert!(matches!(
        sink.read("missing.png"),
        Err(StorageError::NotFound { .. })
    ));
}

#[test]
fn at_blob_db_04_path_traversal_names_refused() {
    assert!(!is_safe_object_name("../etc/passwd"));
    assert!(!is_safe_object_name("a/b.png"));
    assert!(!is_safe_object_name(".hidden"));
    assert!(!is_safe_object_name(""));
    assert!(is_safe_object_name("0123abcd-ffee.webp"));

    let sink = InMemoryBlobSink::new();
    assert!(matches!(
        sink.write_once("../x.png", b"x"),
        Err(StorageError::Unavailable(_))
    ));
    assert_eq!(sink.object_count(), 0);
}

#[test]
fn at_blob_db_05_in_memory_matches_fs_semantics() {
    let sink = InMemoryBlobSink::new();
    sink.write_once("a.jpg", b"1").unwrap();
    assert!(matches!(
        sink.write_once("a.jpg", b"2"),
        Err(StorageError::DuplicateKey { .. })
    ));
    assert_eq!(sink.read("a.jpg").unwrap(), b"1".to_vec());
    assert_eq!(sink.object_names(), vec!["a.jpg".to_string()]);
}
