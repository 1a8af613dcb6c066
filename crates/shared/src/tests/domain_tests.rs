use super::*;

#[test]
fn normalize_trims_collapses_and_case_folds() {
    assert_eq!(normalize_name("  Ana   María "), "ana maría");
    assert_eq!(normalize_name("LUIS"), "luis");
    assert_eq!(normalize_name("   "), "");
}

#[test]
fn attendance_field_uses_underscores_for_spaces() {
    assert_eq!(attendance_field_name("Ana Maria"), "attendance_Ana_Maria");
    assert_eq!(attendance_field_name(" Luis "), "attendance_Luis");
}

#[test]
fn wire_values_parse_back() {
    assert_eq!(AttendanceStatus::from_wire("Si"), AttendanceStatus::Yes);
    assert_eq!(AttendanceStatus::from_wire("SÍ"), AttendanceStatus::Yes);
    assert_eq!(AttendanceStatus::from_wire("No"), AttendanceStatus::No);
    assert_eq!(AttendanceStatus::from_wire(""), AttendanceStatus::Pending);
    assert_eq!(
        AttendanceStatus::from_wire(AttendanceStatus::Pending.as_wire()),
        AttendanceStatus::Pending
    );
}

#[test]
fn form_values_other_than_si_decline() {
    assert_eq!(AttendanceStatus::from_form("Si"), AttendanceStatus::Yes);
    assert_eq!(AttendanceStatus::from_form("No"), AttendanceStatus::No);
    assert_eq!(AttendanceStatus::from_form("maybe"), AttendanceStatus::No);
    assert_eq!(AttendanceStatus::from_form(""), AttendanceStatus::No);
}

#[test]
fn base_phase_matches_case_insensitively() {
    assert!(PhaseTag::new("base").is_base());
    assert!(PhaseTag::new(" Base ").is_base());
    assert!(!PhaseTag::new("FASE1").is_base());
    assert!(PhaseTag::new("fase1").matches(&PhaseTag::new("FASE1")));
}
