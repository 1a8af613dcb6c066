use chrono::NaiveDate;
use shared::domain::Invitee;

use super::*;

fn invitee(family: &str, name: &str) -> Invitee {
    Invitee {
        name: name.to_string(),
        family_id: FamilyId::new(family),
        seats_allowed: 1,
        phase: PhaseTag::base(),
    }
}

fn record(family: &str, name: &str, status: AttendanceStatus) -> ResponseRecord {
    ResponseRecord {
        timestamp: NaiveDate::from_ymd_opt(2026, 5, 1)
            .and_then(|d| d.and_hms_opt(12, 0, 0))
            .expect("timestamp"),
        family_id: FamilyId::new(family),
        invitee_name: name.to_string(),
        status,
        message: String::new(),
        recorded_by: name.to_string(),
        attendees: None,
    }
}

#[test]
fn tally_counts_answers_per_family() {
    let roster = Roster::from_invitees([
        invitee("F1", "Ana"),
        invitee("F1", "Luis"),
        invitee("F2", "Carmen"),
    ]);
    let records = [
        record("F1", "Ana", AttendanceStatus::Yes),
        record("F1", "Luis", AttendanceStatus::No),
    ];

    let tallies = tally(&roster, &records);
    assert_eq!(
        tallies[&FamilyId::new("F1")],
        FamilyTally {
            invited: 2,
            yes: 1,
            no: 1,
            pending: 0,
            attending: 1,
        }
    );
    assert_eq!(tallies[&FamilyId::new("F2")].unanswered(), 1);
}

#[test]
fn records_outside_the_roster_still_count() {
    let roster = Roster::from_invitees([invitee("F1", "Ana")]);
    let tallies = tally(&roster, &[record("OLD", "Pepe", AttendanceStatus::Pending)]);
    let old = &tallies[&FamilyId::new("OLD")];
    assert_eq!(old.pending, 1);
    assert_eq!(old.unanswered(), 0);
}

#[test]
fn typed_party_size_counts_toward_attending() {
    let roster = Roster::from_invitees([invitee("Ana", "Ana")]);
    let mut ana = record("Ana", "Ana", AttendanceStatus::Yes);
    ana.attendees = Some(3);

    let tallies = tally(&roster, &[ana]);
    let family = &tallies[&FamilyId::new("Ana")];
    assert_eq!(family.yes, 1);
    assert_eq!(family.attending, 3);
}
