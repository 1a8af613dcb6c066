use std::{
    collections::BTreeMap,
    future::Future,
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use chrono::NaiveDateTime;
use shared::domain::{
    AttendanceStatus, FamilyId, PriorResponse, ResponseRecord, TIMESTAMP_FORMAT,
};
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::{
    bind_columns, csv_reader, encode_rows, read_optional,
    sheets::{RemoteError, RemoteSheet, SheetBinding},
    write_atomically, MarkerFile, Result, StorageError,
};

pub const RESPONSE_COLUMNS: [&str; 6] = [
    "Fecha",
    "ID_Familia",
    "Nombre_Invitado",
    "Asistencia",
    "Mensaje",
    "Confirmador_Quien_Escribió",
];

/// Optional column holding the party size of a one-guest invitation.
pub const ATTENDEES_COLUMN: &str = "Asistentes";

/// Header written to the local file: the required columns plus [`ATTENDEES_COLUMN`].
pub const LOCAL_RESPONSE_COLUMNS: [&str; 7] = [
    RESPONSE_COLUMNS[0],
    RESPONSE_COLUMNS[1],
    RESPONSE_COLUMNS[2],
    RESPONSE_COLUMNS[3],
    RESPONSE_COLUMNS[4],
    RESPONSE_COLUMNS[5],
    ATTENDEES_COLUMN,
];

const DEFAULT_REMOTE_TIMEOUT: Duration = Duration::from_secs(10);

/// Cell values for one record, in [`LOCAL_RESPONSE_COLUMNS`] order.
pub(crate) fn record_fields(record: &ResponseRecord) -> [String; 7] {
    [
        record.timestamp_text(),
        record.family_id.to_string(),
        record.invitee_name.clone(),
        record.status.as_wire().to_string(),
        record.message.clone(),
        record.recorded_by.clone(),
        record
            .attendees
            .map(|count| count.to_string())
            .unwrap_or_default(),
    ]
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocalWrite {
    Created,
    Updated,
    Unchanged,
}

/// Response records and confirmation markers.
///
/// The local CSV file is authoritative and every read goes to it. The remote
/// sheet, when configured, receives a best-effort copy of each write.
pub struct ResponseStore {
    responses_path: PathBuf,
    markers: MarkerFile,
    remote: Option<Arc<dyn RemoteSheet>>,
    remote_timeout: Duration,
    write_lock: Mutex<()>,
}

impl ResponseStore {
    pub fn new(responses_path: impl Into<PathBuf>, confirmations_path: impl Into<PathBuf>) -> Self {
        Self {
            responses_path: responses_path.into(),
            markers: MarkerFile::new(confirmations_path),
            remote: None,
            remote_timeout: DEFAULT_REMOTE_TIMEOUT,
            write_lock: Mutex::new(()),
        }
    }

    pub fn with_remote(mut self, remote: Arc<dyn RemoteSheet>, timeout: Duration) -> Self {
        self.remote = Some(remote);
        self.remote_timeout = timeout;
        self
    }

    pub fn responses_path(&self) -> &Path {
        &self.responses_path
    }

    pub fn markers(&self) -> &MarkerFile {
        &self.markers
    }

    /// Creates both local files with their header rows if they are missing.
    pub async fn init(&self) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        if read_optional(&self.responses_path).await?.is_none() {
            let header = encode_rows(
                &self.responses_path,
                Some(LOCAL_RESPONSE_COLUMNS.as_slice()),
                Vec::<[String; 7]>::new(),
            )?;
            write_atomically(&self.responses_path, &header).await?;
            info!(path = %self.responses_path.display(), "created response file");
        }
        if self.markers.init().await? {
            info!(path = %self.markers.path().display(), "created confirmation file");
        }
        Ok(())
    }

    /// Strict read used before rewriting the file; a missing file is empty.
    async fn read_records(&self) -> Result<Vec<ResponseRecord>> {
        let Some(bytes) = read_optional(&self.responses_path).await? else {
            return Ok(Vec::new());
        };
        parse_records(&bytes, &self.responses_path)
    }

    /// Soft read: unreadable data is logged and treated as no data.
    pub async fn list_all(&self) -> Vec<ResponseRecord> {
        match self.read_records().await {
            Ok(records) => records,
            Err(error) => {
                error!(
                    path = %self.responses_path.display(),
                    %error,
                    "response file unreadable; treating as empty"
                );
                Vec::new()
            }
        }
    }

    pub async fn find_by_family(&self, family_id: &FamilyId) -> BTreeMap<String, PriorResponse> {
        self.list_all()
            .await
            .iter()
            .filter(|record| record.family_id == *family_id)
            .map(|record| (record.invitee_name.clone(), PriorResponse::from(record)))
            .collect()
    }

    /// True once a marker or any response record exists for the family.
    pub async fn is_confirmed(&self, family_id: &FamilyId) -> bool {
        let marked = self.markers.contains(family_id).await.unwrap_or_else(|error| {
            error!(
                path = %self.markers.path().display(),
                %error,
                "confirmation file unreadable; ignoring markers"
            );
            false
        });
        marked
            || self
                .list_all()
                .await
                .iter()
                .any(|record| record.family_id == *family_id)
    }

    /// One-shot upsert; opens a write session for a single record.
    pub async fn upsert(&self, record: &ResponseRecord) -> Result<LocalWrite> {
        self.begin_write().await?.upsert(record).await
    }

    pub async fn mark_confirmed(&self, family_id: &FamilyId) -> Result<bool> {
        let _guard = self.write_lock.lock().await;
        let written = self.markers.append(family_id).await?;
        if written {
            info!(%family_id, "family marked as confirmed");
        }
        Ok(written)
    }

    /// Binds the remote header for this request.
    ///
    /// A header missing a required column fails the session. Any other remote
    /// failure downgrades the session to local-only writes.
    pub async fn begin_write(&self) -> Result<WriteSession<'_>> {
        let Some(sheet) = self.remote.clone() else {
            return Ok(WriteSession {
                store: self,
                remote: None,
            });
        };

        let remote = match with_timeout(self.remote_timeout, sheet.read_rows()).await {
            Ok(rows) => {
                let header = rows.first().cloned().unwrap_or_default();
                let binding = SheetBinding::bind(&header, &sheet.describe())?;
                Some(RemoteSession {
                    sheet,
                    binding,
                    rows,
                    timeout: self.remote_timeout,
                })
            }
            Err(error) => {
                warn!(
                    sheet = %sheet.describe(),
                    %error,
                    "remote sheet unavailable; recording locally only"
                );
                None
            }
        };

        Ok(WriteSession {
            store: self,
            remote,
        })
    }

    async fn upsert_local(&self, record: &ResponseRecord) -> Result<LocalWrite> {
        let _guard = self.write_lock.lock().await;
        let mut records = self.read_records().await?;

        let outcome = match records
            .iter_mut()
            .find(|existing| existing.key_matches(&record.family_id, &record.invitee_name))
        {
            Some(existing)
                if existing.status == record.status
                    && existing.message == record.message
                    && existing.recorded_by == record.recorded_by
                    && existing.attendees == record.attendees =>
            {
                return Ok(LocalWrite::Unchanged);
            }
            Some(existing) => {
                existing.timestamp = record.timestamp;
                existing.status = record.status;
                existing.message = record.message.clone();
                existing.recorded_by = record.recorded_by.clone();
                existing.attendees = record.attendees;
                LocalWrite::Updated
            }
            None => {
                records.push(record.clone());
                LocalWrite::Created
            }
        };

        let bytes = encode_rows(
            &self.responses_path,
            Some(LOCAL_RESPONSE_COLUMNS.as_slice()),
            records.iter().map(record_fields),
        )?;
        write_atomically(&self.responses_path, &bytes).await?;
        Ok(outcome)
    }
}

/// Writes made while handling one submission.
pub struct WriteSession<'a> {
    store: &'a ResponseStore,
    remote: Option<RemoteSession>,
}

impl WriteSession<'_> {
    pub fn has_remote(&self) -> bool {
        self.remote.is_some()
    }

    /// Local write first; its result is the only one returned. The remote copy
    /// is attempted afterwards and its failure is logged.
    pub async fn upsert(&mut self, record: &ResponseRecord) -> Result<LocalWrite> {
        let local = self.store.upsert_local(record).await?;
        debug!(
            family_id = %record.family_id,
            invitee = %record.invitee_name,
            ?local,
            "response written to local file"
        );

        if let Some(remote) = self.remote.as_mut() {
            if let Err(error) = remote.upsert(record).await {
                warn!(
                    sheet = %remote.sheet.describe(),
                    family_id = %record.family_id,
                    invitee = %record.invitee_name,
                    %error,
                    "remote sheet write failed; skipping remote for the rest of this request"
                );
                self.remote = None;
            }
        }
        Ok(local)
    }

    pub async fn mark_confirmed(&mut self, family_id: &FamilyId) -> Result<bool> {
        self.store.mark_confirmed(family_id).await
    }
}

struct RemoteSession {
    sheet: Arc<dyn RemoteSheet>,
    binding: SheetBinding,
    rows: Vec<Vec<String>>,
    timeout: Duration,
}

impl RemoteSession {
    async fn upsert(&mut self, record: &ResponseRecord) -> std::result::Result<(), RemoteError> {
        match self
            .binding
            .find_row(&self.rows, &record.family_id, &record.invitee_name)
        {
            Some(index) => {
                if self.binding.answer_matches(&self.rows[index], record) {
                    return Ok(());
                }
                let values = self.binding.fill(self.rows[index].clone(), record);
                with_timeout(self.timeout, self.sheet.update_row(index, values.clone())).await?;
                self.rows[index] = values;
            }
            None => {
                let values = self.binding.new_row(record);
                with_timeout(self.timeout, self.sheet.append_row(values.clone())).await?;
                self.rows.push(values);
            }
        }
        Ok(())
    }
}

async fn with_timeout<T>(
    timeout: Duration,
    call: impl Future<Output = std::result::Result<T, RemoteError>>,
) -> std::result::Result<T, RemoteError> {
    tokio::time::timeout(timeout, call)
        .await
        .map_err(|_| RemoteError::Timeout(timeout))?
}

fn parse_records(bytes: &[u8], path: &Path) -> Result<Vec<ResponseRecord>> {
    let source_name = path.display().to_string();
    let mut reader = csv_reader(bytes);
    let headers = reader
        .headers()
        .map_err(|error| StorageError::csv(path, error))?
        .clone();
    let positions = bind_columns(headers.iter(), &RESPONSE_COLUMNS, &source_name)?;
    let attendees_position = headers.iter().position(|h| h.trim() == ATTENDEES_COLUMN);

    let mut records = Vec::new();
    for (index, row) in reader.records().enumerate() {
        let row = row.map_err(|error| StorageError::csv(path, error))?;
        let cell = |column: usize| row.get(positions[column]).unwrap_or("");

        if cell(1).is_empty() && cell(2).is_empty() {
            continue;
        }
        let timestamp = NaiveDateTime::parse_from_str(cell(0), TIMESTAMP_FORMAT).map_err(|_| {
            StorageError::InvalidValue {
                source_name: source_name.clone(),
                column: RESPONSE_COLUMNS[0].to_string(),
                line: index + 2,
                value: cell(0).to_string(),
            }
        })?;
        let attendees = match attendees_position.and_then(|pos| row.get(pos)) {
            None | Some("") => None,
            Some(raw) => Some(raw.parse::<u32>().map_err(|_| StorageError::InvalidValue {
                source_name: source_name.clone(),
                column: ATTENDEES_COLUMN.to_string(),
                line: index + 2,
                value: raw.to_string(),
            })?),
        };

        records.push(ResponseRecord {
            timestamp,
            family_id: FamilyId::new(cell(1)),
            invitee_name: cell(2).to_string(),
            status: AttendanceStatus::from_wire(cell(3)),
            message: cell(4).to_string(),
            recorded_by: cell(5).to_string(),
            attendees,
        });
    }
    Ok(records)
}

#[cfg(test)]
#[path = "tests/responses_tests.rs"]
mod tests;
