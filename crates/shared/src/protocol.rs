use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::domain::{attendance_field_name, AttendanceStatus, FamilyId};

pub const SEARCH_FIELD: &str = "invitado_search";
pub const FAMILY_FIELD: &str = "id_familia_hidden";
pub const SUBMITTER_FIELD: &str = "confirmador_quien_escribio";
pub const MESSAGE_FIELD: &str = "mensaje";
pub const ATTENDEES_FIELD: &str = "asistentes";
pub const ATTENDANCE_PREFIX: &str = "attendance_";
pub const ATTENDANCE_YES: &str = "Si";

/// A `POST /rsvp` body, dispatched on which identifying field is present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RsvpForm {
    Search { name: String },
    Confirm(ConfirmSubmission),
    Empty,
}

impl RsvpForm {
    pub fn from_fields(fields: &HashMap<String, String>) -> Self {
        if let Some(name) = fields.get(SEARCH_FIELD) {
            return Self::Search { name: name.clone() };
        }

        let Some(family_id) = fields.get(FAMILY_FIELD).filter(|v| !v.trim().is_empty()) else {
            return Self::Empty;
        };

        let attendance = fields
            .iter()
            .filter(|(key, _)| key.starts_with(ATTENDANCE_PREFIX))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();

        Self::Confirm(ConfirmSubmission {
            family_id: FamilyId::new(family_id.as_str()),
            attendance,
            message: fields.get(MESSAGE_FIELD).cloned().unwrap_or_default(),
            recorded_by: fields
                .get(SUBMITTER_FIELD)
                .map(|v| v.trim().to_string())
                .unwrap_or_default(),
            attendees: fields
                .get(ATTENDEES_FIELD)
                .map(|v| v.trim().to_string())
                .unwrap_or_default(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ConfirmSubmission {
    pub family_id: FamilyId,
    /// Raw `attendance_*` fields keyed by full field name.
    pub attendance: HashMap<String, String>,
    pub message: String,
    pub recorded_by: String,
    /// Raw party-size field; empty when the form did not offer one.
    pub attendees: String,
}

impl ConfirmSubmission {
    /// `None` when the form carried no attendance key for this member.
    pub fn answer_for(&self, invitee_name: &str) -> Option<AttendanceStatus> {
        self.attendance
            .get(&attendance_field_name(invitee_name))
            .map(|raw| AttendanceStatus::from_form(raw))
    }
}

#[cfg(test)]
#[path = "tests/protocol_tests.rs"]
mod tests;
