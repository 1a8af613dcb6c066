use std::fmt;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Format of the `Fecha` column in every response sink.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Phase tag that is open under every policy.
pub const BASE_PHASE: &str = "BASE";

macro_rules! tag_newtype {
    ($name:ident) => {
        #[derive(
            Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into().trim().to_string())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

tag_newtype!(FamilyId);
tag_newtype!(PhaseTag);

impl PhaseTag {
    pub fn base() -> Self {
        Self(BASE_PHASE.to_string())
    }

    pub fn is_base(&self) -> bool {
        self.0.eq_ignore_ascii_case(BASE_PHASE)
    }

    /// Tags are compared case-insensitively everywhere.
    pub fn matches(&self, other: &PhaseTag) -> bool {
        self.0.eq_ignore_ascii_case(&other.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invitee {
    pub name: String,
    pub family_id: FamilyId,
    pub seats_allowed: u32,
    pub phase: PhaseTag,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttendanceStatus {
    Yes,
    No,
    Pending,
}

impl AttendanceStatus {
    pub fn as_wire(self) -> &'static str {
        match self {
            Self::Yes => "Si",
            Self::No => "No",
            Self::Pending => "Pendiente",
        }
    }

    /// Parses a value read back from a response sink.
    pub fn from_wire(raw: &str) -> Self {
        let value = raw.trim();
        if is_yes(value) {
            Self::Yes
        } else if value.is_empty()
            || value.eq_ignore_ascii_case("pendiente")
            || value.eq_ignore_ascii_case("pending")
        {
            Self::Pending
        } else {
            Self::No
        }
    }

    /// A form selection is either "Si" or a decline; there is no pending choice on the form.
    pub fn from_form(raw: &str) -> Self {
        if is_yes(raw.trim()) {
            Self::Yes
        } else {
            Self::No
        }
    }
}

fn is_yes(value: &str) -> bool {
    matches!(value.to_lowercase().as_str(), "si" | "sí" | "yes")
}

impl fmt::Display for AttendanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_wire())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseRecord {
    pub timestamp: NaiveDateTime,
    pub family_id: FamilyId,
    pub invitee_name: String,
    pub status: AttendanceStatus,
    pub message: String,
    pub recorded_by: String,
    /// Party size typed on a one-guest invitation with several seats.
    pub attendees: Option<u32>,
}

impl ResponseRecord {
    pub fn key_matches(&self, family_id: &FamilyId, invitee_name: &str) -> bool {
        self.family_id == *family_id && self.invitee_name.trim() == invitee_name.trim()
    }

    pub fn timestamp_text(&self) -> String {
        self.timestamp.format(TIMESTAMP_FORMAT).to_string()
    }
}

/// Stored answer for one family member, used to pre-fill the edit form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriorResponse {
    pub status: AttendanceStatus,
    pub message: String,
    pub recorded_by: String,
    pub attendees: Option<u32>,
}

impl From<&ResponseRecord> for PriorResponse {
    fn from(record: &ResponseRecord) -> Self {
        Self {
            status: record.status,
            message: record.message.clone(),
            recorded_by: record.recorded_by.clone(),
            attendees: record.attendees,
        }
    }
}

/// Lookup key for a guest name: trimmed, inner whitespace collapsed, lowercased.
pub fn normalize_name(raw: &str) -> String {
    raw.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Form field carrying one member's attendance, e.g. `attendance_Ana_Maria`.
pub fn attendance_field_name(invitee_name: &str) -> String {
    format!(
        "{}{}",
        crate::protocol::ATTENDANCE_PREFIX,
        invitee_name.trim().replace(' ', "_")
    )
}

#[cfg(test)]
#[path = "tests/domain_tests.rs"]
mod tests;
