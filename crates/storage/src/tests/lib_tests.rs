use super::*;

#[test]
fn bind_columns_maps_names_regardless_of_order() {
    let positions = bind_columns(
        ["Mensaje", " ID_Familia ", "Fecha"],
        &["Fecha", "ID_Familia"],
        "test",
    )
    .expect("bind");
    assert_eq!(positions, vec![2, 1]);
}

#[test]
fn bind_columns_names_the_missing_column() {
    let err = bind_columns(["Fecha", "Nombre"], &["Fecha", "ID_Familia"], "sheet")
        .expect_err("missing column");
    match err {
        StorageError::MissingColumn {
            source_name,
            column,
        } => {
            assert_eq!(source_name, "sheet");
            assert_eq!(column, "ID_Familia");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn write_atomically_creates_parent_and_replaces_contents() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("nested").join("file.csv");

    write_atomically(&path, b"first").await.expect("write");
    write_atomically(&path, b"second").await.expect("rewrite");

    assert_eq!(std::fs::read(&path).expect("read"), b"second");
    let leftovers: Vec<_> = std::fs::read_dir(path.parent().expect("parent"))
        .expect("list")
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_name().to_string_lossy().ends_with(".tmp"))
        .collect();
    assert!(leftovers.is_empty());
}

#[tokio::test]
async fn read_optional_treats_missing_file_as_none() {
    let dir = tempfile::tempdir().expect("tempdir");
    let missing = read_optional(&dir.path().join("absent.csv"))
        .await
        .expect("read");
    assert!(missing.is_none());
}
