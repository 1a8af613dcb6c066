//! Invitation phases and the gate deciding which of them may respond right now.
//!
//! A deployment picks exactly one [`PhasePolicy`]. The schedule policy advances
//! on its own as time passes; the allow-list policy only changes when the
//! configuration is edited. The base phase is open under both.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::PhaseTag;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseWindow {
    pub tag: PhaseTag,
    pub opens_at: DateTime<Utc>,
    /// Responses are accepted at or before this instant.
    #[serde(default)]
    pub closes_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PhasePolicy {
    Schedule { phases: Vec<PhaseWindow> },
    AllowList { open: Vec<PhaseTag> },
}

impl Default for PhasePolicy {
    fn default() -> Self {
        Self::AllowList { open: Vec::new() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PhaseConfigError {
    #[error("phase '{0}' is listed more than once")]
    DuplicatePhase(PhaseTag),
    #[error("phase '{tag}' closes before it opens")]
    ClosesBeforeOpening { tag: PhaseTag },
}

impl PhasePolicy {
    pub fn validate(&self) -> Result<(), PhaseConfigError> {
        let mut seen = HashSet::new();
        let tags: Vec<&PhaseTag> = match self {
            Self::Schedule { phases } => {
                for window in phases {
                    if matches!(window.closes_at, Some(closes_at) if closes_at < window.opens_at) {
                        return Err(PhaseConfigError::ClosesBeforeOpening {
                            tag: window.tag.clone(),
                        });
                    }
                }
                phases.iter().map(|w| &w.tag).collect()
            }
            Self::AllowList { open } => open.iter().collect(),
        };

        for tag in tags {
            if !seen.insert(tag.as_str().to_ascii_uppercase()) {
                return Err(PhaseConfigError::DuplicatePhase(tag.clone()));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseStatus {
    Open,
    /// `opens_at` is `None` when the policy has no date for this phase.
    NotYetOpen { opens_at: Option<DateTime<Utc>> },
    Closed { closed_at: DateTime<Utc> },
}

impl PhaseStatus {
    pub fn is_open(self) -> bool {
        matches!(self, Self::Open)
    }
}

#[derive(Debug, Clone, Default)]
pub struct PhaseGate {
    policy: PhasePolicy,
}

impl PhaseGate {
    pub fn new(policy: PhasePolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &PhasePolicy {
        &self.policy
    }

    pub fn is_open(&self, phase: &PhaseTag, now: DateTime<Utc>) -> bool {
        self.status(phase, now).is_open()
    }

    pub fn status(&self, phase: &PhaseTag, now: DateTime<Utc>) -> PhaseStatus {
        if phase.is_base() {
            return PhaseStatus::Open;
        }

        match &self.policy {
            PhasePolicy::AllowList { open } => {
                if open.iter().any(|tag| tag.matches(phase)) {
                    PhaseStatus::Open
                } else {
                    PhaseStatus::NotYetOpen { opens_at: None }
                }
            }
            PhasePolicy::Schedule { phases } => {
                let Some(window) = phases.iter().find(|w| w.tag.matches(phase)) else {
                    return PhaseStatus::NotYetOpen { opens_at: None };
                };
                if now < window.opens_at {
                    return PhaseStatus::NotYetOpen {
                        opens_at: Some(window.opens_at),
                    };
                }
                match window.closes_at {
                    Some(closed_at) if now > closed_at => PhaseStatus::Closed { closed_at },
                    _ => PhaseStatus::Open,
                }
            }
        }
    }

    /// Phases open at `now`, base phase first.
    pub fn open_phases(&self, now: DateTime<Utc>) -> Vec<PhaseTag> {
        let mut open = vec![PhaseTag::base()];
        let configured: Vec<&PhaseTag> = match &self.policy {
            PhasePolicy::AllowList { open } => open.iter().collect(),
            PhasePolicy::Schedule { phases } => phases.iter().map(|w| &w.tag).collect(),
        };
        open.extend(
            configured
                .into_iter()
                .filter(|tag| !tag.is_base() && self.is_open(tag, now))
                .cloned(),
        );
        open
    }
}

#[cfg(test)]
#[path = "tests/phase_tests.rs"]
mod tests;
