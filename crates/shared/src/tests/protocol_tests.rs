use super::*;

fn fields(pairs: &[(&str, &str)]) -> HashMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

#[test]
fn search_field_wins_dispatch() {
    let form = RsvpForm::from_fields(&fields(&[
        (SEARCH_FIELD, " Ana "),
        (FAMILY_FIELD, "F1"),
    ]));
    assert_eq!(
        form,
        RsvpForm::Search {
            name: " Ana ".to_string()
        }
    );
}

#[test]
fn family_field_builds_confirm_submission() {
    let form = RsvpForm::from_fields(&fields(&[
        (FAMILY_FIELD, "F1"),
        ("attendance_Ana", "Si"),
        ("attendance_Ana_Maria", "No"),
        (SUBMITTER_FIELD, " Ana "),
        (MESSAGE_FIELD, "felicidades"),
        (ATTENDEES_FIELD, " 2 "),
        ("unrelated", "x"),
    ]));
    let RsvpForm::Confirm(submission) = form else {
        panic!("expected confirm form");
    };
    assert_eq!(submission.family_id, FamilyId::new("F1"));
    assert_eq!(submission.recorded_by, "Ana");
    assert_eq!(submission.message, "felicidades");
    assert_eq!(submission.attendees, "2");
    assert_eq!(submission.attendance.len(), 2);
    assert_eq!(submission.answer_for("Ana"), Some(AttendanceStatus::Yes));
    assert_eq!(submission.answer_for("Ana Maria"), Some(AttendanceStatus::No));
    assert_eq!(submission.answer_for("Luis"), None);
}

#[test]
fn blank_or_missing_identifiers_are_empty() {
    assert_eq!(RsvpForm::from_fields(&HashMap::new()), RsvpForm::Empty);
    assert_eq!(
        RsvpForm::from_fields(&fields(&[(FAMILY_FIELD, "  ")])),
        RsvpForm::Empty
    );
}
