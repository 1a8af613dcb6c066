//! RSVP flow: name search followed by a per-family confirmation.
//!
//! Both steps are request-scoped; nothing is carried between requests except
//! what the response store has persisted.

use std::{
    collections::{BTreeMap, HashMap},
    sync::Arc,
};

use chrono::{DateTime, Local, Utc};
use serde::Deserialize;
use shared::{
    domain::{
        normalize_name, AttendanceStatus, FamilyId, Invitee, PhaseTag, PriorResponse,
        ResponseRecord,
    },
    error::{ApiError, ErrorCode},
    phase::{PhaseGate, PhaseStatus},
    protocol::ConfirmSubmission,
};
use storage::{LocalWrite, ResponseStore, RosterStore, StorageError};
use thiserror::Error;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{info, warn};

/// Whether a family may come back and change its answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseMode {
    #[default]
    Editable,
    ConfirmOnce,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct FlowPolicy {
    pub mode: ResponseMode,
    /// Reject submissions whose "yes" count exceeds the family's assigned seats.
    pub enforce_seat_limit: bool,
}

pub struct RsvpContext {
    pub roster: RosterStore,
    pub responses: ResponseStore,
    pub gate: PhaseGate,
    pub policy: FlowPolicy,
    family_locks: FamilyLocks,
}

impl RsvpContext {
    pub fn new(
        roster: RosterStore,
        responses: ResponseStore,
        gate: PhaseGate,
        policy: FlowPolicy,
    ) -> Self {
        Self {
            roster,
            responses,
            gate,
            policy,
            family_locks: FamilyLocks::default(),
        }
    }
}

/// Serializes the check-then-write sequence of concurrent submissions for one family.
#[derive(Default)]
struct FamilyLocks {
    locks: Mutex<HashMap<FamilyId, Arc<Mutex<()>>>>,
}

impl FamilyLocks {
    async fn lock(&self, family_id: &FamilyId) -> OwnedMutexGuard<()> {
        let lock = self
            .locks
            .lock()
            .await
            .entry(family_id.clone())
            .or_default()
            .clone();
        lock.lock_owned().await
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Por favor escriba su nombre tal como aparece en la invitación.")]
    EmptyName,
    #[error("Lo sentimos, el nombre \"{name}\" no fue encontrado en la lista de invitados.")]
    NameNotFound { name: String },
    #[error("No encontramos esta invitación. Por favor busque su nombre de nuevo.")]
    UnknownFamily { family_id: FamilyId },
    #[error("¡Su familia ya confirmó su asistencia! Si desea modificarla, contacte a los novios.")]
    AlreadyConfirmed { family_id: FamilyId },
    #[error("{}", not_open_message(.opens_at))]
    PhaseNotOpen {
        phase: PhaseTag,
        opens_at: Option<DateTime<Utc>>,
    },
    #[error("Las confirmaciones para su invitación cerraron el {}.", format_instant(.closed_at))]
    PhaseClosed {
        phase: PhaseTag,
        closed_at: DateTime<Utc>,
    },
    #[error("Solo tiene asignados {allowed} lugares y confirmó {requested}. Por favor, ajuste la cantidad.")]
    SeatLimitExceeded { allowed: u32, requested: u32 },
    #[error("El número de asistentes debe ser un número válido.")]
    InvalidAttendeeCount { raw: String },
    #[error("Por favor elija una respuesta para al menos un invitado.")]
    NoAnswers,
    #[error("Por favor busque su nombre para comenzar.")]
    MissingForm,
}

fn format_instant(at: &DateTime<Utc>) -> String {
    at.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string()
}

fn not_open_message(opens_at: &Option<DateTime<Utc>>) -> String {
    match opens_at {
        Some(at) => format!(
            "Las confirmaciones para su invitación abren el {}. Por favor vuelva entonces.",
            format_instant(at)
        ),
        None => "Las confirmaciones para su invitación aún no están abiertas. Los novios le avisarán cuando lo estén.".to_string(),
    }
}

impl ValidationError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::NameNotFound { .. } | Self::UnknownFamily { .. } => ErrorCode::NotFound,
            Self::AlreadyConfirmed { .. } => ErrorCode::Conflict,
            _ => ErrorCode::Validation,
        }
    }
}

#[derive(Debug, Error)]
pub enum RsvpError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("storage error: {0}")]
    Storage(#[source] StorageError),
}

impl From<StorageError> for RsvpError {
    fn from(error: StorageError) -> Self {
        match error {
            StorageError::MissingColumn { .. } => Self::Configuration(error.to_string()),
            other => Self::Storage(other),
        }
    }
}

impl From<&RsvpError> for ApiError {
    fn from(error: &RsvpError) -> Self {
        match error {
            RsvpError::Validation(validation) => {
                ApiError::new(validation.code(), validation.to_string())
            }
            RsvpError::Configuration(message) => {
                ApiError::new(ErrorCode::Configuration, message.clone())
            }
            RsvpError::Storage(storage) => ApiError::new(ErrorCode::Internal, storage.to_string()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SearchOutcome {
    pub family_id: FamilyId,
    /// Roster spelling of the name that was searched.
    pub matched_name: String,
    pub members: Vec<Invitee>,
    /// Earlier answers keyed by invitee name; empty unless the family may edit.
    pub prior: BTreeMap<String, PriorResponse>,
}

impl SearchOutcome {
    pub fn is_edit(&self) -> bool {
        !self.prior.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct ConfirmOutcome {
    pub family_id: FamilyId,
    pub recorded_by: String,
    pub answers: Vec<(String, AttendanceStatus)>,
    /// Party size typed on a one-guest invitation; `None` when the yes answers are the count.
    pub party_size: Option<u32>,
    pub created: usize,
    pub updated: usize,
}

impl ConfirmOutcome {
    pub fn yes_count(&self) -> usize {
        self.answers
            .iter()
            .filter(|(_, status)| *status == AttendanceStatus::Yes)
            .count()
    }

    pub fn no_count(&self) -> usize {
        self.answers.len() - self.yes_count()
    }

    /// People expected at the event from this invitation.
    pub fn attending(&self) -> u32 {
        self.party_size.unwrap_or(self.yes_count() as u32)
    }
}

/// Empty means the form offered no party-size field.
fn parse_attendees(raw: &str) -> Result<Option<u32>, ValidationError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }
    match raw.parse::<u32>() {
        Ok(count) if count > 0 => Ok(Some(count)),
        _ => Err(ValidationError::InvalidAttendeeCount {
            raw: raw.to_string(),
        }),
    }
}

fn ensure_phase_open(
    gate: &PhaseGate,
    phase: &PhaseTag,
    now: DateTime<Utc>,
) -> Result<(), ValidationError> {
    match gate.status(phase, now) {
        PhaseStatus::Open => Ok(()),
        PhaseStatus::NotYetOpen { opens_at } => Err(ValidationError::PhaseNotOpen {
            phase: phase.clone(),
            opens_at,
        }),
        PhaseStatus::Closed { closed_at } => Err(ValidationError::PhaseClosed {
            phase: phase.clone(),
            closed_at,
        }),
    }
}

pub async fn search(
    ctx: &RsvpContext,
    raw_name: &str,
    now: DateTime<Utc>,
) -> Result<SearchOutcome, RsvpError> {
    let name = raw_name.trim();
    if name.is_empty() {
        return Err(ValidationError::EmptyName.into());
    }

    let roster = ctx.roster.load().await;
    let Some((family_id, members)) = roster.lookup(name) else {
        info!(%name, "guest not found in roster");
        return Err(ValidationError::NameNotFound {
            name: name.to_string(),
        }
        .into());
    };

    if ctx.policy.mode == ResponseMode::ConfirmOnce && ctx.responses.is_confirmed(family_id).await
    {
        return Err(ValidationError::AlreadyConfirmed {
            family_id: family_id.clone(),
        }
        .into());
    }

    let phase = roster.phase_of(family_id).cloned().unwrap_or_else(PhaseTag::base);
    if let Err(error) = ensure_phase_open(&ctx.gate, &phase, now) {
        info!(%family_id, %phase, "family searched outside its phase window");
        return Err(error.into());
    }

    let prior = match ctx.policy.mode {
        ResponseMode::Editable => ctx.responses.find_by_family(family_id).await,
        ResponseMode::ConfirmOnce => BTreeMap::new(),
    };

    let key = normalize_name(name);
    let matched_name = members
        .iter()
        .find(|m| normalize_name(&m.name) == key)
        .map(|m| m.name.clone())
        .unwrap_or_else(|| name.to_string());

    Ok(SearchOutcome {
        family_id: family_id.clone(),
        matched_name,
        members: members.to_vec(),
        prior,
    })
}

pub async fn confirm(
    ctx: &RsvpContext,
    submission: &ConfirmSubmission,
    now: DateTime<Utc>,
) -> Result<ConfirmOutcome, RsvpError> {
    let family_id = &submission.family_id;
    let roster = ctx.roster.load().await;
    let members = roster
        .family(family_id)
        .ok_or_else(|| ValidationError::UnknownFamily {
            family_id: family_id.clone(),
        })?;

    let phase = roster.phase_of(family_id).cloned().unwrap_or_else(PhaseTag::base);
    ensure_phase_open(&ctx.gate, &phase, now)?;

    let answers: Vec<(String, AttendanceStatus)> = members
        .iter()
        .filter_map(|member| {
            submission
                .answer_for(&member.name)
                .map(|status| (member.name.clone(), status))
        })
        .collect();
    if answers.is_empty() {
        return Err(ValidationError::NoAnswers.into());
    }

    let yes_count = answers
        .iter()
        .filter(|(_, status)| *status == AttendanceStatus::Yes)
        .count() as u32;
    // A typed party size only counts on a one-guest invitation that said yes.
    let party_size = match parse_attendees(&submission.attendees)? {
        Some(count) if members.len() == 1 && yes_count > 0 => Some(count),
        _ => None,
    };

    if ctx.policy.enforce_seat_limit {
        let allowed = roster.seats_allowed(family_id);
        let requested = party_size.unwrap_or(yes_count);
        if requested > allowed {
            return Err(ValidationError::SeatLimitExceeded { allowed, requested }.into());
        }
    }

    let recorded_by = match submission.recorded_by.trim() {
        "" => answers[0].0.clone(),
        name => name.to_string(),
    };

    let _family_guard = ctx.family_locks.lock(family_id).await;
    if ctx.policy.mode == ResponseMode::ConfirmOnce && ctx.responses.is_confirmed(family_id).await
    {
        warn!(%family_id, "duplicate submission for a confirmed family");
        return Err(ValidationError::AlreadyConfirmed {
            family_id: family_id.clone(),
        }
        .into());
    }

    let timestamp = now.with_timezone(&Local).naive_local();
    let message = submission.message.trim().to_string();
    let mut session = ctx.responses.begin_write().await?;
    let mut outcome = ConfirmOutcome {
        family_id: family_id.clone(),
        recorded_by: recorded_by.clone(),
        answers,
        party_size,
        created: 0,
        updated: 0,
    };

    for (name, status) in &outcome.answers {
        let record = ResponseRecord {
            timestamp,
            family_id: family_id.clone(),
            invitee_name: name.clone(),
            status: *status,
            message: message.clone(),
            recorded_by: recorded_by.clone(),
            attendees: party_size.filter(|_| *status == AttendanceStatus::Yes),
        };
        match session.upsert(&record).await? {
            LocalWrite::Created => outcome.created += 1,
            LocalWrite::Updated => outcome.updated += 1,
            LocalWrite::Unchanged => {}
        }
    }

    if ctx.policy.mode == ResponseMode::ConfirmOnce {
        session.mark_confirmed(family_id).await?;
    }

    info!(
        %family_id,
        %recorded_by,
        yes = outcome.yes_count(),
        no = outcome.no_count(),
        attending = outcome.attending(),
        created = outcome.created,
        updated = outcome.updated,
        "rsvp recorded"
    );
    Ok(outcome)
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
