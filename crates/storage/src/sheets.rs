//! Remote spreadsheet sink.
//!
//! The remote copy of the responses is advisory: callers bind the header once
//! per write session through [`SheetBinding::bind`] and any transport failure
//! after that is logged by the response store, never returned to the user.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::Deserialize;
use shared::domain::{AttendanceStatus, FamilyId, ResponseRecord};
use thiserror::Error;
use url::Url;

use crate::{bind_columns, responses::record_fields, ATTENDEES_COLUMN, RESPONSE_COLUMNS};

pub const DEFAULT_SHEETS_API: &str = "https://sheets.googleapis.com/v4/spreadsheets/";

#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("sheet api returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("timed out after {0:?}")]
    Timeout(Duration),
    #[error("invalid sheet url: {0}")]
    InvalidUrl(String),
    #[error("sheet unavailable: {0}")]
    Unavailable(String),
}

/// Row-oriented access to one worksheet. Row `0` is the header row.
#[async_trait]
pub trait RemoteSheet: Send + Sync {
    fn describe(&self) -> String;
    async fn read_rows(&self) -> Result<Vec<Vec<String>>, RemoteError>;
    async fn update_row(&self, row_index: usize, values: Vec<String>) -> Result<(), RemoteError>;
    async fn append_row(&self, values: Vec<String>) -> Result<(), RemoteError>;
}

/// Positions of the response columns within a worksheet's header row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetBinding {
    positions: Vec<usize>,
    attendees: Option<usize>,
    width: usize,
}

impl SheetBinding {
    pub fn bind(header: &[String], source_name: &str) -> crate::Result<Self> {
        let positions = bind_columns(
            header.iter().map(String::as_str),
            &RESPONSE_COLUMNS,
            source_name,
        )?;
        let attendees = header.iter().position(|h| h.trim() == ATTENDEES_COLUMN);
        Ok(Self {
            positions,
            attendees,
            width: header.len(),
        })
    }

    pub fn position(&self, column: &str) -> Option<usize> {
        if column == ATTENDEES_COLUMN {
            return self.attendees;
        }
        RESPONSE_COLUMNS
            .iter()
            .position(|name| *name == column)
            .map(|index| self.positions[index])
    }

    /// Index of the data row holding `(family_id, invitee_name)`, skipping the header.
    pub fn find_row(
        &self,
        rows: &[Vec<String>],
        family_id: &FamilyId,
        invitee_name: &str,
    ) -> Option<usize> {
        let family_col = self.positions[1];
        let name_col = self.positions[2];
        rows.iter()
            .enumerate()
            .skip(1)
            .find(|(_, row)| {
                cell(row, family_col) == family_id.as_str()
                    && cell(row, name_col) == invitee_name.trim()
            })
            .map(|(index, _)| index)
    }

    /// True when `row` already holds the record's answer. The timestamp is not compared.
    pub fn answer_matches(&self, row: &[String], record: &ResponseRecord) -> bool {
        let attendees_match = match self.attendees {
            Some(position) => {
                let expected = record.attendees.map(|n| n.to_string()).unwrap_or_default();
                cell(row, position) == expected
            }
            None => true,
        };
        AttendanceStatus::from_wire(cell(row, self.positions[3])) == record.status
            && cell(row, self.positions[4]) == record.message.trim()
            && cell(row, self.positions[5]) == record.recorded_by.trim()
            && attendees_match
    }

    /// Overwrites the bound cells of `row`, keeping any unbound columns as they were.
    pub fn fill(&self, mut row: Vec<String>, record: &ResponseRecord) -> Vec<String> {
        if row.len() < self.width {
            row.resize(self.width, String::new());
        }
        let [fields @ .., attendees] = record_fields(record);
        for (position, value) in self.positions.iter().zip(fields) {
            row[*position] = value;
        }
        if let Some(position) = self.attendees {
            row[position] = attendees;
        }
        row
    }

    pub fn new_row(&self, record: &ResponseRecord) -> Vec<String> {
        self.fill(vec![String::new(); self.width], record)
    }
}

fn cell(row: &[String], position: usize) -> &str {
    row.get(position).map(|v| v.trim()).unwrap_or("")
}

#[derive(Debug, Clone)]
pub struct SheetsConfig {
    pub api_base: Url,
    pub spreadsheet_id: String,
    pub worksheet: String,
    pub access_token: String,
    pub timeout: Duration,
}

/// Google Sheets v4 `values` API client authenticated with a bearer token.
#[derive(Debug, Clone)]
pub struct GoogleSheetsClient {
    http: Client,
    config: SheetsConfig,
}

#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<serde_json::Value>>,
}

impl GoogleSheetsClient {
    pub fn new(config: SheetsConfig) -> Result<Self, RemoteError> {
        let http = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { http, config })
    }

    fn values_url(&self, range: &str) -> Result<Url, RemoteError> {
        let mut url = self.config.api_base.clone();
        url.path_segments_mut()
            .map_err(|_| RemoteError::InvalidUrl(self.config.api_base.to_string()))?
            .pop_if_empty()
            .extend([self.config.spreadsheet_id.as_str(), "values", range]);
        Ok(url)
    }

    fn row_range(&self, row_index: usize) -> String {
        format!("{}!A{}", quoted_sheet_name(&self.config.worksheet), row_index + 1)
    }
}

fn quoted_sheet_name(name: &str) -> String {
    if name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        name.to_string()
    } else {
        format!("'{}'", name.replace('\'', "''"))
    }
}

async fn check(response: Response) -> Result<Response, RemoteError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(RemoteError::Status {
        status: status.as_u16(),
        body,
    })
}

#[async_trait]
impl RemoteSheet for GoogleSheetsClient {
    fn describe(&self) -> String {
        format!(
            "spreadsheet {} / worksheet {}",
            self.config.spreadsheet_id, self.config.worksheet
        )
    }

    async fn read_rows(&self) -> Result<Vec<Vec<String>>, RemoteError> {
        let url = self.values_url(&quoted_sheet_name(&self.config.worksheet))?;
        let response = self
            .http
            .get(url)
            .bearer_auth(&self.config.access_token)
            .send()
            .await?;
        let range: ValueRange = check(response).await?.json().await?;
        Ok(range
            .values
            .into_iter()
            .map(|row| {
                row.into_iter()
                    .map(|value| match value {
                        serde_json::Value::String(text) => text,
                        serde_json::Value::Null => String::new(),
                        other => other.to_string(),
                    })
                    .collect()
            })
            .collect())
    }

    async fn update_row(&self, row_index: usize, values: Vec<String>) -> Result<(), RemoteError> {
        let range = self.row_range(row_index);
        let mut url = self.values_url(&range)?;
        url.query_pairs_mut().append_pair("valueInputOption", "RAW");
        let response = self
            .http
            .put(url)
            .bearer_auth(&self.config.access_token)
            .json(&serde_json::json!({
                "range": range,
                "majorDimension": "ROWS",
                "values": [values],
            }))
            .send()
            .await?;
        check(response).await?;
        Ok(())
    }

    async fn append_row(&self, values: Vec<String>) -> Result<(), RemoteError> {
        let range = format!("{}:append", self.row_range(0));
        let mut url = self.values_url(&range)?;
        url.query_pairs_mut()
            .append_pair("valueInputOption", "RAW")
            .append_pair("insertDataOption", "INSERT_ROWS");
        let response = self
            .http
            .post(url)
            .bearer_auth(&self.config.access_token)
            .json(&serde_json::json!({
                "majorDimension": "ROWS",
                "values": [values],
            }))
            .send()
            .await?;
        check(response).await?;
        Ok(())
    }
}

#[cfg(any(test, feature = "test-util"))]
pub use memory::MemorySheet;

#[cfg(any(test, feature = "test-util"))]
mod memory {
    use std::sync::{
        atomic::{AtomicBool, Ordering},
        Mutex, PoisonError,
    };

    use super::*;

    /// In-process worksheet used by tests; can be switched into a failing state.
    #[derive(Debug, Default)]
    pub struct MemorySheet {
        rows: Mutex<Vec<Vec<String>>>,
        failing: AtomicBool,
    }

    impl MemorySheet {
        pub fn with_header(header: &[&str]) -> Self {
            Self::with_rows(vec![header.iter().map(|h| h.to_string()).collect()])
        }

        pub fn with_rows(rows: Vec<Vec<String>>) -> Self {
            Self {
                rows: Mutex::new(rows),
                failing: AtomicBool::new(false),
            }
        }

        pub fn set_failing(&self, failing: bool) {
            self.failing.store(failing, Ordering::SeqCst);
        }

        pub fn rows(&self) -> Vec<Vec<String>> {
            self.rows.lock().unwrap_or_else(PoisonError::into_inner).clone()
        }

        fn ensure_available(&self) -> Result<(), RemoteError> {
            if self.failing.load(Ordering::SeqCst) {
                return Err(RemoteError::Unavailable("memory sheet offline".into()));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl RemoteSheet for MemorySheet {
        fn describe(&self) -> String {
            "memory sheet".to_string()
        }

        async fn read_rows(&self) -> Result<Vec<Vec<String>>, RemoteError> {
            self.ensure_available()?;
            Ok(self.rows())
        }

        async fn update_row(&self, row_index: usize, values: Vec<String>) -> Result<(), RemoteError> {
            self.ensure_available()?;
            let mut rows = self.rows.lock().unwrap_or_else(PoisonError::into_inner);
            let row = rows
                .get_mut(row_index)
                .ok_or_else(|| RemoteError::Unavailable(format!("no row {row_index}")))?;
            *row = values;
            Ok(())
        }

        async fn append_row(&self, values: Vec<String>) -> Result<(), RemoteError> {
            self.ensure_available()?;
            self.rows
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(values);
            Ok(())
        }
    }
}

#[cfg(test)]
#[path = "tests/sheets_tests.rs"]
mod tests;
