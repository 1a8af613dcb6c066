use super::*;

fn at(raw: &str) -> DateTime<Utc> {
    raw.parse().expect("timestamp")
}

fn schedule() -> PhaseGate {
    PhaseGate::new(PhasePolicy::Schedule {
        phases: vec![
            PhaseWindow {
                tag: PhaseTag::new("FASE1"),
                opens_at: at("2026-01-01T00:00:00Z"),
                closes_at: Some(at("2026-03-01T00:00:00Z")),
            },
            PhaseWindow {
                tag: PhaseTag::new("FASE2"),
                opens_at: at("2026-02-01T00:00:00Z"),
                closes_at: None,
            },
        ],
    })
}

#[test]
fn base_phase_is_always_open() {
    let now = at("2020-01-01T00:00:00Z");
    assert!(schedule().is_open(&PhaseTag::new("base"), now));
    assert!(PhaseGate::default().is_open(&PhaseTag::base(), now));
}

#[test]
fn schedule_opens_phases_as_time_advances() {
    let gate = schedule();
    let fase2 = PhaseTag::new("fase2");

    assert_eq!(
        gate.status(&fase2, at("2026-01-15T00:00:00Z")),
        PhaseStatus::NotYetOpen {
            opens_at: Some(at("2026-02-01T00:00:00Z"))
        }
    );
    assert!(gate.is_open(&fase2, at("2026-02-01T00:00:00Z")));
    assert!(gate.is_open(&fase2, at("2030-01-01T00:00:00Z")));
}

#[test]
fn schedule_cutoff_is_inclusive() {
    let gate = schedule();
    let fase1 = PhaseTag::new("FASE1");
    assert!(gate.is_open(&fase1, at("2026-03-01T00:00:00Z")));
    assert_eq!(
        gate.status(&fase1, at("2026-03-01T00:00:01Z")),
        PhaseStatus::Closed {
            closed_at: at("2026-03-01T00:00:00Z")
        }
    );
}

#[test]
fn unknown_phase_is_not_open() {
    let gate = schedule();
    assert_eq!(
        gate.status(&PhaseTag::new("FASE9"), at("2026-02-15T00:00:00Z")),
        PhaseStatus::NotYetOpen { opens_at: None }
    );
}

#[test]
fn allow_list_ignores_time() {
    let gate = PhaseGate::new(PhasePolicy::AllowList {
        open: vec![PhaseTag::new("FASE1")],
    });
    assert!(gate.is_open(&PhaseTag::new("fase1"), at("1999-01-01T00:00:00Z")));
    assert!(!gate.is_open(&PhaseTag::new("FASE2"), at("2099-01-01T00:00:00Z")));
    assert_eq!(
        gate.open_phases(at("2026-01-01T00:00:00Z")),
        vec![PhaseTag::base(), PhaseTag::new("FASE1")]
    );
}

#[test]
fn validate_rejects_duplicates_and_inverted_windows() {
    let duplicate = PhasePolicy::AllowList {
        open: vec![PhaseTag::new("FASE1"), PhaseTag::new("fase1")],
    };
    assert!(matches!(
        duplicate.validate(),
        Err(PhaseConfigError::DuplicatePhase(_))
    ));

    let inverted = PhasePolicy::Schedule {
        phases: vec![PhaseWindow {
            tag: PhaseTag::new("FASE1"),
            opens_at: at("2026-03-01T00:00:00Z"),
            closes_at: Some(at("2026-01-01T00:00:00Z")),
        }],
    };
    assert!(matches!(
        inverted.validate(),
        Err(PhaseConfigError::ClosesBeforeOpening { .. })
    ));
    assert!(schedule().policy().validate().is_ok());
}

#[test]
fn policy_deserializes_from_tagged_json() {
    let policy: PhasePolicy = serde_json::from_value(serde_json::json!({
        "kind": "schedule",
        "phases": [{ "tag": "FASE1", "opens_at": "2026-01-01T00:00:00-06:00" }]
    }))
    .expect("policy");
    let PhasePolicy::Schedule { phases } = policy else {
        panic!("expected schedule");
    };
    assert_eq!(phases[0].opens_at, at("2026-01-01T06:00:00Z"));
    assert_eq!(phases[0].closes_at, None);
}
