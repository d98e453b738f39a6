use super::*;

#[test]
fn allocate_gives_distinct_paths_per_job() {
    let dir = tempfile::tempdir().unwrap();
    let storage = ScratchStorage::new(dir.path().join("scratch"));
    let a = storage.allocate(JobId::new(), OutputFormat::Mov).unwrap();
    let b = storage.allocate(JobId::new(), OutputFormat::Mov).unwrap();
    assert_ne!(a, b);
    assert!(storage.root().is_dir());
    assert_eq!(a.extension().and_then(|e| e.to_str()), Some("mov"));
}

#[test]
fn discard_removes_and_tolerates_missing_files() {
    let dir = tempfile::tempdir().unwrap();
    let storage = ScratchStorage::new(dir.path());
    let path = storage.allocate(JobId::new(), OutputFormat::Wav).unwrap();
    std::fs::write(&path, b"partial").unwrap();
    storage.discard(&path);
    assert!(!path.exists());
    storage.discard(&path);
}
