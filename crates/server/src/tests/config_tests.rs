use super::*;

use std::collections::HashMap;

use shared::{domain::PhaseTag, phase::PhaseWindow};

fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
    pairs
        .iter()
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .collect()
}

#[test]
fn empty_sources_fall_back_to_defaults() {
    let settings = settings_from_sources("", HashMap::new()).expect("settings");
    assert_eq!(settings.bind_addr, "127.0.0.1:8080");
    assert_eq!(settings.mode, ResponseMode::Editable);
    assert!(!settings.enforce_seat_limit);
    assert_eq!(settings.phase_policy, PhasePolicy::default());
    assert!(settings.sheets.is_none());
    settings.validate().expect("defaults are valid");
}

#[test]
fn reads_schedule_policy_and_sheet_from_toml() {
    let raw = r#"
        bind_addr = "0.0.0.0:9000"
        roster_path = "/srv/rsvp/lista.csv"
        mode = "confirm_once"
        enforce_seat_limit = true

        [phase_policy]
        kind = "schedule"

        [[phase_policy.phases]]
        tag = "FASE1"
        opens_at = "2026-04-01T00:00:00Z"

        [[phase_policy.phases]]
        tag = "FASE2"
        opens_at = "2026-06-01T00:00:00Z"
        closes_at = "2026-07-01T00:00:00Z"

        [sheets]
        spreadsheet_id = "abc123"
        access_token = "token"
    "#;

    let settings = settings_from_sources(raw, HashMap::new()).expect("settings");
    settings.validate().expect("valid");
    assert_eq!(settings.roster_path, PathBuf::from("/srv/rsvp/lista.csv"));
    assert_eq!(settings.mode, ResponseMode::ConfirmOnce);
    assert!(settings.flow_policy().enforce_seat_limit);

    let PhasePolicy::Schedule { phases } = &settings.phase_policy else {
        panic!("expected schedule policy");
    };
    assert_eq!(phases.len(), 2);
    assert_eq!(
        phases[1],
        PhaseWindow {
            tag: PhaseTag::new("FASE2"),
            opens_at: "2026-06-01T00:00:00Z".parse().expect("time"),
            closes_at: Some("2026-07-01T00:00:00Z".parse().expect("time")),
        }
    );

    let sheets = settings.sheets.expect("sheets");
    assert_eq!(sheets.worksheet, "Invitados");
    assert_eq!(sheets.timeout(), Duration::from_secs(10));
    let client = sheets.client_config().expect("client config");
    assert_eq!(client.api_base.as_str(), DEFAULT_SHEETS_API);
}

#[test]
fn environment_overrides_file_values() {
    let raw = r#"
        bind_addr = "0.0.0.0:9000"

        [phase_policy]
        kind = "allow_list"
        open = ["FASE1"]

        [sheets]
        spreadsheet_id = "abc123"
        access_token = "from-file"
    "#;
    let settings = settings_from_sources(
        raw,
        vars(&[
            ("APP__BIND_ADDR", "127.0.0.1:7000"),
            ("APP__ENFORCE_SEAT_LIMIT", "true"),
            ("APP__SHEETS__ACCESS_TOKEN", "from-env"),
            ("UNRELATED", "ignored"),
        ]),
    )
    .expect("settings");

    assert_eq!(settings.bind_addr, "127.0.0.1:7000");
    assert!(settings.enforce_seat_limit);
    assert_eq!(
        settings.phase_policy,
        PhasePolicy::AllowList {
            open: vec![PhaseTag::new("FASE1")]
        }
    );
    assert_eq!(settings.sheets.expect("sheets").access_token, "from-env");
}

#[test]
fn rejects_invalid_phase_schedule() {
    let raw = r#"
        [phase_policy]
        kind = "schedule"

        [[phase_policy.phases]]
        tag = "FASE1"
        opens_at = "2026-06-01T00:00:00Z"
        closes_at = "2026-05-01T00:00:00Z"
    "#;
    let settings = settings_from_sources(raw, HashMap::new()).expect("parses");
    let error = settings.validate().expect_err("closes before opening");
    assert!(format!("{error:#}").contains("FASE1"));
}

#[test]
fn rejects_bad_bind_addr_and_blank_token() {
    let settings = settings_from_sources(r#"bind_addr = "not an address""#, HashMap::new())
        .expect("parses");
    assert!(settings.validate().is_err());

    let raw = r#"
        [sheets]
        spreadsheet_id = "abc123"
        access_token = "  "
    "#;
    let settings = settings_from_sources(raw, HashMap::new()).expect("parses");
    let error = settings.validate().expect_err("blank token");
    assert!(error.to_string().contains("access_token"));
}

#[test]
fn creates_parent_dir_for_data_files() {
    let temp_root = tempfile::tempdir().expect("tempdir");
    let path = temp_root.path().join("nested").join("invitados.csv");

    prepare_data_path(&path).expect("prepare");
    assert!(temp_root.path().join("nested").is_dir());
    assert!(!path.exists());

    prepare_data_path(Path::new("invitados.csv")).expect("bare file name");
}
