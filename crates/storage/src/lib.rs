use std::path::{Path, PathBuf};

use thiserror::Error;

mod markers;
mod responses;
mod roster;
pub mod sheets;

pub use markers::{MarkerFile, MARKER_COLUMNS};
pub use responses::{
    LocalWrite, ResponseStore, WriteSession, ATTENDEES_COLUMN, LOCAL_RESPONSE_COLUMNS,
    RESPONSE_COLUMNS,
};
pub use roster::{Roster, RosterStore, FAMILY_ROSTER_COLUMNS, SINGLE_GUEST_ROSTER_COLUMNS};
pub use sheets::{RemoteError, RemoteSheet, SheetBinding};

pub type Result<T> = std::result::Result<T, StorageError>;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("i/o error on '{}': {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed csv in '{}': {source}", .path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
    #[error("{source_name} is missing required column '{column}'")]
    MissingColumn { source_name: String, column: String },
    #[error("invalid value '{value}' for column '{column}' in {source_name} (line {line})")]
    InvalidValue {
        source_name: String,
        column: String,
        line: usize,
        value: String,
    },
    #[error("remote sheet error: {0}")]
    Remote(#[from] RemoteError),
}

impl StorageError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    fn csv(path: &Path, source: csv::Error) -> Self {
        Self::Csv {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Maps each required column name to its position in `header`; never guesses.
pub(crate) fn bind_columns<'a>(
    header: impl IntoIterator<Item = &'a str>,
    required: &[&str],
    source_name: &str,
) -> Result<Vec<usize>> {
    let header: Vec<&str> = header.into_iter().map(str::trim).collect();
    required
        .iter()
        .map(|column| {
            header
                .iter()
                .position(|name| name == column)
                .ok_or_else(|| StorageError::MissingColumn {
                    source_name: source_name.to_string(),
                    column: column.to_string(),
                })
        })
        .collect()
}

/// Reads a whole file; a missing file is `None`.
pub(crate) async fn read_optional(path: &Path) -> Result<Option<Vec<u8>>> {
    match tokio::fs::read(path).await {
        Ok(bytes) => Ok(Some(bytes)),
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(error) => Err(StorageError::io(path, error)),
    }
}

/// Replaces `path` with `bytes` through a sibling temp file and a rename.
pub(crate) async fn write_atomically(path: &Path, bytes: &[u8]) -> Result<()> {
    ensure_parent_dir(path).await?;
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "data".to_string());
    let temp_path = path.with_file_name(format!(".{file_name}.tmp"));

    tokio::fs::write(&temp_path, bytes)
        .await
        .map_err(|error| StorageError::io(&temp_path, error))?;
    tokio::fs::rename(&temp_path, path)
        .await
        .map_err(|error| StorageError::io(path, error))
}

pub(crate) async fn ensure_parent_dir(path: &Path) -> Result<()> {
    let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) else {
        return Ok(());
    };
    tokio::fs::create_dir_all(parent)
        .await
        .map_err(|error| StorageError::io(parent, error))
}

pub(crate) fn encode_rows<I, R>(path: &Path, header: Option<&[&str]>, rows: I) -> Result<Vec<u8>>
where
    I: IntoIterator<Item = R>,
    R: IntoIterator,
    R::Item: AsRef<[u8]>,
{
    let mut writer = csv::Writer::from_writer(Vec::new());
    if let Some(header) = header {
        writer
            .write_record(header)
            .map_err(|error| StorageError::csv(path, error))?;
    }
    for row in rows {
        writer
            .write_record(row)
            .map_err(|error| StorageError::csv(path, error))?;
    }
    writer
        .into_inner()
        .map_err(|error| StorageError::io(path, error.into_error()))
}

pub(crate) fn csv_reader(bytes: &[u8]) -> csv::Reader<&[u8]> {
    csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(bytes)
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
