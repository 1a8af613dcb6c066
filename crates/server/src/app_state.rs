use std::sync::Arc;

use anyhow::Context;
use server_api::RsvpContext;
use shared::phase::PhaseGate;
use storage::{sheets::GoogleSheetsClient, ResponseStore, RosterStore};
use tracing::{info, warn};

use crate::config::{prepare_data_path, Settings};

pub(crate) struct AppState {
    pub(crate) rsvp: RsvpContext,
}

impl AppState {
    /// Opens the local files named in `settings` and, when configured, the remote sheet client.
    pub(crate) async fn from_settings(settings: &Settings) -> anyhow::Result<Self> {
        prepare_data_path(&settings.responses_path)?;
        prepare_data_path(&settings.confirmations_path)?;

        let roster = RosterStore::new(&settings.roster_path);
        match roster.try_load().await {
            Ok(loaded) => {
                info!(
                    path = %roster.path().display(),
                    families = loaded.families().count(),
                    invitees = loaded.invitee_count(),
                    "roster loaded"
                );
                if !loaded.phase_conflicts().is_empty() {
                    warn!(
                        families = ?loaded.phase_conflicts(),
                        "roster families with mixed phases"
                    );
                }
                if !loaded.field_collisions().is_empty() {
                    warn!(
                        families = ?loaded.field_collisions(),
                        "roster families with members sharing a form field"
                    );
                }
            }
            Err(error) => warn!(
                path = %roster.path().display(),
                %error,
                "roster not readable at startup; searches will report not found until it is"
            ),
        }

        let mut responses =
            ResponseStore::new(&settings.responses_path, &settings.confirmations_path);
        if let Some(sheets) = &settings.sheets {
            let client = GoogleSheetsClient::new(sheets.client_config()?)
                .context("failed to build sheets client")?;
            info!(
                spreadsheet = %sheets.spreadsheet_id,
                worksheet = %sheets.worksheet,
                "remote sheet mirroring enabled"
            );
            responses = responses.with_remote(Arc::new(client), sheets.timeout());
        }
        responses
            .init()
            .await
            .context("failed to initialize local response files")?;

        Ok(Self {
            rsvp: RsvpContext::new(
                roster,
                responses,
                PhaseGate::new(settings.phase_policy.clone()),
                settings.flow_policy(),
            ),
        })
    }
}
