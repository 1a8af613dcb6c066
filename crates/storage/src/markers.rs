use std::{
    collections::BTreeSet,
    path::{Path, PathBuf},
};

use shared::domain::FamilyId;
use tokio::io::AsyncWriteExt;

use crate::{
    bind_columns, csv_reader, encode_rows, ensure_parent_dir, read_optional, Result, StorageError,
};

pub const MARKER_COLUMNS: [&str; 1] = ["ID_Familia"];

/// Append-only list of families that completed the flow at least once.
#[derive(Debug, Clone)]
pub struct MarkerFile {
    path: PathBuf,
}

impl MarkerFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Writes the header row when the file does not exist yet. Returns whether it was created.
    pub async fn init(&self) -> Result<bool> {
        if tokio::fs::try_exists(&self.path)
            .await
            .map_err(|error| StorageError::io(&self.path, error))?
        {
            return Ok(false);
        }
        ensure_parent_dir(&self.path).await?;
        let header = encode_rows(
            &self.path,
            Some(MARKER_COLUMNS.as_slice()),
            Vec::<Vec<&str>>::new(),
        )?;
        tokio::fs::write(&self.path, header)
            .await
            .map_err(|error| StorageError::io(&self.path, error))?;
        Ok(true)
    }

    pub async fn families(&self) -> Result<BTreeSet<FamilyId>> {
        let Some(bytes) = read_optional(&self.path).await? else {
            return Ok(BTreeSet::new());
        };

        let mut reader = csv_reader(&bytes);
        let headers = reader
            .headers()
            .map_err(|error| StorageError::csv(&self.path, error))?
            .clone();
        let position = bind_columns(
            headers.iter(),
            &MARKER_COLUMNS,
            &self.path.display().to_string(),
        )?[0];

        let mut families = BTreeSet::new();
        for row in reader.records() {
            let row = row.map_err(|error| StorageError::csv(&self.path, error))?;
            if let Some(id) = row.get(position).filter(|id| !id.is_empty()) {
                families.insert(FamilyId::new(id));
            }
        }
        Ok(families)
    }

    pub async fn contains(&self, family_id: &FamilyId) -> Result<bool> {
        Ok(self.families().await?.contains(family_id))
    }

    /// Appends a marker unless one already exists. Returns whether a line was written.
    pub async fn append(&self, family_id: &FamilyId) -> Result<bool> {
        if self.contains(family_id).await? {
            return Ok(false);
        }
        self.init().await?;

        let line = encode_rows(&self.path, None, [[family_id.as_str()]])?;
        let mut file = tokio::fs::OpenOptions::new()
            .append(true)
            .open(&self.path)
            .await
            .map_err(|error| StorageError::io(&self.path, error))?;
        file.write_all(&line)
            .await
            .map_err(|error| StorageError::io(&self.path, error))?;
        file.flush()
            .await
            .map_err(|error| StorageError::io(&self.path, error))?;
        Ok(true)
    }
}
