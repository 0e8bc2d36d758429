use std::fs;

use tempfile::TempDir;
use tidemark_engine::{ensure_output_dir, AtomicFileWriter, PersistError};

#[test]
fn creates_missing_output_dir() {
    let temp = TempDir::new().unwrap();
    let new_dir = temp.path().join("out").join("nested");
    assert!(!new_dir.exists());
    ensure_output_dir(&new_dir).unwrap();
    assert!(new_dir.is_dir());
}

#[test]
fn write_new_never_clobbers() {
    let temp = TempDir::new().unwrap();
    let writer = AtomicFileWriter::new(temp.path().to_path_buf());

    let first = writer.write_new("20250301-1.pdf", b"%PDF-first").unwrap();
    assert_eq!(fs::read(&first).unwrap(), b"%PDF-first");

    let err = writer.write_new("20250301-1.pdf", b"%PDF-second").unwrap_err();
    assert!(matches!(err, PersistError::AlreadyExists(ref path) if *path == first));
    assert_eq!(fs::read(&first).unwrap(), b"%PDF-first");
}

#[test]
fn replace_swaps_content_and_leaves_no_temp_files() {
    let temp = TempDir::new().unwrap();
    let writer = AtomicFileWriter::new(temp.path().to_path_buf());

    writer.replace("state.json", b"{\"a\":1}").unwrap();
    let path = writer.replace("state.json", b"{\"a\":2}").unwrap();

    assert_eq!(fs::read_to_string(&path).unwrap(), "{\"a\":2}");
    let names: Vec<_> = fs::read_dir(temp.path())
        .unwrap()
        .map(|e| e.unwrap().file_name())
        .collect();
    assert_eq!(names.len(), 1);
}

#[test]
fn no_partial_file_when_directory_is_a_file() {
    let temp = TempDir::new().unwrap();
    let file_path = temp.path().join("not_a_dir");
    fs::write(&file_path, "x").unwrap();

    let writer = AtomicFileWriter::new(file_path.clone());
    assert!(writer.write_new("doc.pdf", b"data").is_err());
    assert!(!file_path.with_file_name("doc.pdf").exists());
}
