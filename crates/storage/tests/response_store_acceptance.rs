use std::{
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::{Duration, Instant},
};

use async_trait::async_trait;
use chrono::NaiveDateTime;
use shared::domain::{AttendanceStatus, FamilyId, ResponseRecord, TIMESTAMP_FORMAT};
use storage::{LocalWrite, RemoteError, RemoteSheet, ResponseStore, RosterStore, RESPONSE_COLUMNS};

/// Worksheet whose header answers immediately but whose writes hang.
struct HangingSheet {
    writes: AtomicUsize,
}

#[async_trait]
impl RemoteSheet for HangingSheet {
    fn describe(&self) -> String {
        "hanging sheet".to_string()
    }

    async fn read_rows(&self) -> Result<Vec<Vec<String>>, RemoteError> {
        Ok(vec![RESPONSE_COLUMNS.iter().map(|c| c.to_string()).collect()])
    }

    async fn update_row(&self, _row_index: usize, _values: Vec<String>) -> Result<(), RemoteError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_secs(30)).await;
        Ok(())
    }

    async fn append_row(&self, _values: Vec<String>) -> Result<(), RemoteError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_secs(30)).await;
        Ok(())
    }
}

fn answer(name: &str, status: AttendanceStatus) -> ResponseRecord {
    ResponseRecord {
        timestamp: NaiveDateTime::parse_from_str("2026-06-01 18:30:00", TIMESTAMP_FORMAT)
            .expect("timestamp"),
        family_id: FamilyId::new("F1"),
        invitee_name: name.to_string(),
        status,
        message: "nos vemos".to_string(),
        recorded_by: "Ana".to_string(),
        attendees: None,
    }
}

#[tokio::test]
async fn family_submission_round_trips_through_local_files() {
    let dir = tempfile::tempdir().expect("tempdir");
    let roster_path = dir.path().join("lista_maestra.csv");
    std::fs::write(
        &roster_path,
        "ID_Familia,Nombre_Invitado,Asignados,Fase\nF1,Ana,1,BASE\nF1,Luis,1,BASE\n",
    )
    .expect("roster");

    let roster = RosterStore::new(&roster_path).load().await;
    let (family_id, members) = roster.lookup("ana").expect("family");

    let store = ResponseStore::new(
        dir.path().join("data").join("invitados.csv"),
        dir.path().join("data").join("confirmados.csv"),
    );
    store.init().await.expect("init");

    let mut session = store.begin_write().await.expect("session");
    for (member, status) in members
        .iter()
        .zip([AttendanceStatus::Yes, AttendanceStatus::No])
    {
        let written = session
            .upsert(&answer(&member.name, status))
            .await
            .expect("upsert");
        assert_eq!(written, LocalWrite::Created);
    }
    assert!(session.mark_confirmed(family_id).await.expect("mark"));

    let prior = store.find_by_family(family_id).await;
    let yes = prior
        .values()
        .filter(|p| p.status == AttendanceStatus::Yes)
        .count();
    assert_eq!(prior.len(), 2);
    assert_eq!(yes, 1);
    assert!(store.is_confirmed(family_id).await);
}

#[tokio::test]
async fn hanging_remote_writes_time_out_and_local_write_stands() {
    let dir = tempfile::tempdir().expect("tempdir");
    let sheet = Arc::new(HangingSheet {
        writes: AtomicUsize::new(0),
    });
    let store = ResponseStore::new(
        dir.path().join("invitados.csv"),
        dir.path().join("confirmados.csv"),
    )
    .with_remote(sheet.clone(), Duration::from_millis(50));

    let started = Instant::now();
    let mut session = store.begin_write().await.expect("session");
    assert!(session.has_remote());
    session
        .upsert(&answer("Ana", AttendanceStatus::Yes))
        .await
        .expect("ana");
    assert!(!session.has_remote());
    session
        .upsert(&answer("Luis", AttendanceStatus::No))
        .await
        .expect("luis");

    assert!(started.elapsed() < Duration::from_secs(10));
    assert_eq!(sheet.writes.load(Ordering::SeqCst), 1);
    assert_eq!(store.list_all().await.len(), 2);
}
