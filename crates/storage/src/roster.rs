use std::{
    collections::{BTreeMap, HashMap},
    path::{Path, PathBuf},
};

use shared::domain::{attendance_field_name, normalize_name, FamilyId, Invitee, PhaseTag};
use tracing::{error, warn};

use crate::{bind_columns, csv_reader, Result, StorageError};

pub const FAMILY_ROSTER_COLUMNS: [&str; 4] = ["ID_Familia", "Nombre_Invitado", "Asignados", "Fase"];
pub const SINGLE_GUEST_ROSTER_COLUMNS: [&str; 2] = ["Nombre", "Asignados"];

/// The pre-authorized guest list, read from disk on every lookup.
#[derive(Debug, Clone)]
pub struct RosterStore {
    path: PathBuf,
}

impl RosterStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Soft load: any failure yields an empty roster and an error log line.
    pub async fn load(&self) -> Roster {
        match self.try_load().await {
            Ok(roster) => roster,
            Err(error) => {
                error!(
                    path = %self.path.display(),
                    %error,
                    "roster unavailable; every lookup will report not found"
                );
                Roster::default()
            }
        }
    }

    pub async fn try_load(&self) -> Result<Roster> {
        let bytes = tokio::fs::read(&self.path)
            .await
            .map_err(|error| StorageError::io(&self.path, error))?;
        Roster::parse(&bytes, &self.path)
    }
}

#[derive(Debug, Clone, Default)]
pub struct Roster {
    families: BTreeMap<FamilyId, Vec<Invitee>>,
    name_index: HashMap<String, FamilyId>,
    phase_conflicts: Vec<FamilyId>,
    field_collisions: Vec<FamilyId>,
}

impl Roster {
    /// Accepts the family schema or the older single-guest `Nombre, Asignados` schema.
    pub fn parse(bytes: &[u8], path: &Path) -> Result<Self> {
        let source_name = path.display().to_string();
        let mut reader = csv_reader(bytes);
        let headers = reader
            .headers()
            .map_err(|error| StorageError::csv(path, error))?
            .clone();

        let family_layout = headers.iter().any(|h| h == FAMILY_ROSTER_COLUMNS[0]);
        let positions = if family_layout {
            bind_columns(headers.iter(), &FAMILY_ROSTER_COLUMNS, &source_name)?
        } else {
            bind_columns(headers.iter(), &SINGLE_GUEST_ROSTER_COLUMNS, &source_name)?
        };

        let mut invitees = Vec::new();
        for (index, row) in reader.records().enumerate() {
            let row = row.map_err(|error| StorageError::csv(path, error))?;
            let line = index + 2;
            let cell = |pos: usize| row.get(pos).unwrap_or("").trim();

            let (family_id, name, seats, phase) = if family_layout {
                (
                    cell(positions[0]),
                    cell(positions[1]),
                    cell(positions[2]),
                    cell(positions[3]),
                )
            } else {
                let name = cell(positions[0]);
                (name, name, cell(positions[1]), "")
            };
            if name.is_empty() {
                continue;
            }

            let seats_allowed = seats.parse::<u32>().map_err(|_| StorageError::InvalidValue {
                source_name: source_name.clone(),
                column: "Asignados".to_string(),
                line,
                value: seats.to_string(),
            })?;
            let family_id = if family_id.is_empty() { name } else { family_id };

            invitees.push(Invitee {
                name: name.to_string(),
                family_id: FamilyId::new(family_id),
                seats_allowed,
                phase: if phase.is_empty() {
                    PhaseTag::base()
                } else {
                    PhaseTag::new(phase)
                },
            });
        }

        Ok(Self::from_invitees(invitees))
    }

    pub fn from_invitees(invitees: impl IntoIterator<Item = Invitee>) -> Self {
        let mut roster = Self::default();
        for invitee in invitees {
            let key = normalize_name(&invitee.name);
            if key.is_empty() {
                continue;
            }
            if let Some(existing) = roster.name_index.get(&key) {
                warn!(
                    name = %invitee.name,
                    family_id = %existing,
                    "duplicate guest name in roster; keeping the first entry"
                );
                continue;
            }

            let members = roster.families.entry(invitee.family_id.clone()).or_default();
            if let Some(first) = members.first() {
                if !first.phase.matches(&invitee.phase)
                    && !roster.phase_conflicts.contains(&invitee.family_id)
                {
                    warn!(
                        family_id = %invitee.family_id,
                        expected = %first.phase,
                        found = %invitee.phase,
                        "family members disagree on phase; using the first member's phase"
                    );
                    roster.phase_conflicts.push(invitee.family_id.clone());
                }
            }
            let field = attendance_field_name(&invitee.name);
            if let Some(clash) = members
                .iter()
                .find(|m| attendance_field_name(&m.name) == field)
            {
                warn!(
                    family_id = %invitee.family_id,
                    first = %clash.name,
                    second = %invitee.name,
                    %field,
                    "family members share one form field; one answer will apply to both"
                );
                if !roster.field_collisions.contains(&invitee.family_id) {
                    roster.field_collisions.push(invitee.family_id.clone());
                }
            }
            roster.name_index.insert(key, invitee.family_id.clone());
            members.push(invitee);
        }
        roster
    }

    pub fn is_empty(&self) -> bool {
        self.families.is_empty()
    }

    pub fn invitee_count(&self) -> usize {
        self.name_index.len()
    }

    pub fn families(&self) -> impl Iterator<Item = (&FamilyId, &[Invitee])> {
        self.families.iter().map(|(id, members)| (id, members.as_slice()))
    }

    pub fn family(&self, family_id: &FamilyId) -> Option<&[Invitee]> {
        self.families.get(family_id).map(Vec::as_slice)
    }

    pub fn family_for_name(&self, raw_name: &str) -> Option<&FamilyId> {
        self.name_index.get(&normalize_name(raw_name))
    }

    pub fn lookup(&self, raw_name: &str) -> Option<(&FamilyId, &[Invitee])> {
        let family_id = self.family_for_name(raw_name)?;
        self.family(family_id).map(|members| (family_id, members))
    }

    /// The phase of a family is its first member's phase.
    pub fn phase_of(&self, family_id: &FamilyId) -> Option<&PhaseTag> {
        self.families
            .get(family_id)
            .and_then(|members| members.first())
            .map(|invitee| &invitee.phase)
    }

    pub fn seats_allowed(&self, family_id: &FamilyId) -> u32 {
        self.families
            .get(family_id)
            .map(|members| members.iter().map(|m| m.seats_allowed).sum())
            .unwrap_or(0)
    }

    pub fn phase_conflicts(&self) -> &[FamilyId] {
        &self.phase_conflicts
    }

    /// Families where two member names map to the same attendance field.
    pub fn field_collisions(&self) -> &[FamilyId] {
        &self.field_collisions
    }
}

#[cfg(test)]
#[path = "tests/roster_tests.rs"]
mod tests;
