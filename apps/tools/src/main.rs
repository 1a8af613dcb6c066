use std::{collections::BTreeMap, path::PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use shared::domain::{AttendanceStatus, FamilyId, PhaseTag, ResponseRecord};
use storage::{ResponseStore, Roster, RosterStore};

#[derive(Parser, Debug)]
struct Cli {
    #[arg(long, default_value = "./data/lista_maestra.csv")]
    roster: PathBuf,
    #[arg(long, default_value = "./data/invitados.csv")]
    responses: PathBuf,
    #[arg(long, default_value = "./data/confirmados.csv")]
    confirmations: PathBuf,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create the response and confirmation files with their headers.
    Init,
    /// Parse the roster and report schema or phase problems.
    CheckRoster,
    Lookup {
        name: String,
    },
    /// Per-family answer counts from the local response file.
    Summary,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
struct FamilyTally {
    invited: usize,
    yes: usize,
    no: usize,
    pending: usize,
    /// Yes answers, or the typed party size where one was given.
    attending: u32,
}

impl FamilyTally {
    fn unanswered(&self) -> usize {
        self.invited.saturating_sub(self.yes + self.no + self.pending)
    }
}

fn tally(roster: &Roster, records: &[ResponseRecord]) -> BTreeMap<FamilyId, FamilyTally> {
    let mut tallies: BTreeMap<FamilyId, FamilyTally> = roster
        .families()
        .map(|(id, members)| {
            (
                id.clone(),
                FamilyTally {
                    invited: members.len(),
                    ..FamilyTally::default()
                },
            )
        })
        .collect();

    for record in records {
        let entry = tallies.entry(record.family_id.clone()).or_default();
        match record.status {
            AttendanceStatus::Yes => {
                entry.yes += 1;
                entry.attending += record.attendees.unwrap_or(1);
            }
            AttendanceStatus::No => entry.no += 1,
            AttendanceStatus::Pending => entry.pending += 1,
        }
    }
    tallies
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let roster_store = RosterStore::new(&cli.roster);
    let responses = ResponseStore::new(&cli.responses, &cli.confirmations);

    match cli.command {
        Command::Init => {
            responses
                .init()
                .await
                .context("failed to create response files")?;
            println!(
                "ready: {} and {}",
                cli.responses.display(),
                cli.confirmations.display()
            );
        }
        Command::CheckRoster => {
            let roster = roster_store
                .try_load()
                .await
                .with_context(|| format!("failed to read roster '{}'", cli.roster.display()))?;
            println!(
                "{} families, {} invitees",
                roster.families().count(),
                roster.invitee_count()
            );
            for family_id in roster.phase_conflicts() {
                println!("family {family_id} has members in different phases");
            }
            for family_id in roster.field_collisions() {
                println!("family {family_id} has members whose names share one form field");
            }
            if !roster.phase_conflicts().is_empty() || !roster.field_collisions().is_empty() {
                bail!("roster has problems that affect the rsvp form");
            }
        }
        Command::Lookup { name } => {
            let roster = roster_store
                .try_load()
                .await
                .with_context(|| format!("failed to read roster '{}'", cli.roster.display()))?;
            let Some((family_id, members)) = roster.lookup(&name) else {
                bail!("'{name}' is not on the roster");
            };
            let prior = responses.find_by_family(family_id).await;
            let phase = roster.phase_of(family_id).cloned().unwrap_or_else(PhaseTag::base);
            println!(
                "family {family_id} (phase {phase}, {} seats)",
                roster.seats_allowed(family_id)
            );
            for member in members {
                match prior.get(&member.name) {
                    Some(answer) => println!(
                        "  {}: {} (by {})",
                        member.name, answer.status, answer.recorded_by
                    ),
                    None => println!("  {}: no answer", member.name),
                }
            }
        }
        Command::Summary => {
            let roster = roster_store.load().await;
            let tallies = tally(&roster, &responses.list_all().await);
            let mut total = FamilyTally::default();
            for (family_id, family) in &tallies {
                println!(
                    "{family_id}: {} yes ({} attending), {} no, {} pending, {} unanswered",
                    family.yes,
                    family.attending,
                    family.no,
                    family.pending,
                    family.unanswered()
                );
                total.invited += family.invited;
                total.yes += family.yes;
                total.attending += family.attending;
                total.no += family.no;
                total.pending += family.pending;
            }
            println!(
                "total: {} yes ({} attending), {} no, {} pending, {} unanswered",
                total.yes,
                total.attending,
                total.no,
                total.pending,
                total.unanswered()
            );
        }
    }

    Ok(())
}

#[cfg(test)]
#[path = "tests/main_tests.rs"]
mod tests;
