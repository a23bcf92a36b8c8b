//! Integration-Tests: Relay mit Datenbank-Backend (In-Memory SQLite)

mod common;

use std::sync::Arc;

use common::{fehler, hat_kommando, nachricht, state_mit, update, TestClient};
use reflector_auth::passwort_schluessel;
use reflector_core::{Category, GlobalProjectId, LocalProjectId, PermissionPair, PermissionSet, UpdateId};
use reflector_db::models::NeuerBenutzer;
use reflector_db::{SqliteDb, UserRepository};
use reflector_protocol::commands;
use reflector_protocol::control::{ForkFollow, ForkReply, ProjectList};
use reflector_protocol::Message;
use reflector_relay::{BackendError, Broadcaster, DatabaseBackend, ProjectBackend, RelayState};
use serde_json::json;

const PASSWORT: &str = "geheim";

struct Aufbau {
    state: Arc<RelayState>,
    backend: Arc<DatabaseBackend>,
}

async fn aufbau() -> Aufbau {
    aufbau_mit(&[
        ("alice", PermissionPair::FULL),
        ("bob", PermissionPair::FULL),
        ("carol", PermissionPair::FULL),
    ])
    .await
}

async fn aufbau_mit(benutzer: &[(&str, PermissionPair)]) -> Aufbau {
    let db = SqliteDb::in_memory()
        .await
        .expect("In-Memory DB konnte nicht erstellt werden");
    let schluessel = passwort_schluessel(PASSWORT);
    for (name, masken) in benutzer {
        db.create_user(NeuerBenutzer {
            username: name,
            pwkey: &schluessel,
            masken: *masken,
        })
        .await
        .unwrap();
    }

    let broadcaster = Broadcaster::neu();
    let backend = Arc::new(DatabaseBackend::neu(db, broadcaster.clone()));
    let state = state_mit(backend.clone(), broadcaster);
    Aufbau { state, backend }
}

async fn angemeldet(aufbau: &Aufbau, name: &str) -> TestClient {
    let mut client = TestClient::neu(&aufbau.state);
    let antworten = client.anmelden(name, PASSWORT).await;
    assert!(hat_kommando(&antworten, commands::AUTH_REPLY), "{name} nicht angemeldet");
    client
}

fn finden<'a>(nachrichten: &'a [Message], command: &str) -> &'a Message {
    nachrichten
        .iter()
        .find(|m| m.command == command)
        .unwrap_or_else(|| panic!("{command} erwartet, erhalten: {nachrichten:?}"))
}

// ---------------------------------------------------------------------------
// Anmeldung
// ---------------------------------------------------------------------------

#[tokio::test]
async fn falsches_passwort_neue_challenge_dann_fatal() {
    let aufbau = aufbau().await;
    let mut client = TestClient::neu(&aufbau.state);

    for _ in 0..2 {
        let antworten = client.anmelden("alice", "falsch").await;
        assert_eq!(fehler(&antworten), vec!["Authentication failed".to_string()]);
        assert!(hat_kommando(&antworten, commands::AUTH_CHALLENGE));
        assert!(!client.session.ist_authentifiziert());
    }

    let antworten = client.anmelden("alice", "falsch").await;
    let fatal = finden(&antworten, commands::FATAL);
    assert_eq!(
        fatal.fehlertext().as_deref(),
        Some("Too many failed authentication attempts")
    );
    assert!(client.session.soll_beenden());
}

#[tokio::test]
async fn unbekannter_benutzer_abgelehnt() {
    let aufbau = aufbau().await;
    let mut client = TestClient::neu(&aufbau.state);

    let antworten = client.anmelden("mallory", PASSWORT).await;
    assert_eq!(fehler(&antworten), vec!["Authentication failed".to_string()]);
}

#[tokio::test]
async fn kontomasken_begrenzen_effektive_masken() {
    let ohne_kommentare = PermissionPair::neu(
        PermissionSet::FULL.ohne(Category::Comment),
        PermissionSet::FULL,
    );
    let aufbau = aufbau_mit(&[("alice", ohne_kommentare)]).await;
    let mut alice = TestClient::neu(&aufbau.state);
    alice.anmelden("alice", PASSWORT).await;
    alice.projekt_anlegen("hash").await;

    let antworten = alice.updates_senden(vec![update("cmt_changed", 1)]).await;
    assert_eq!(
        fehler(&antworten),
        vec!["No publish permission for 'cmt_changed' (comment)".to_string()]
    );
}

// ---------------------------------------------------------------------------
// Forks
// ---------------------------------------------------------------------------

#[tokio::test]
async fn fork_follow_und_beitritt() {
    let aufbau = aufbau().await;
    let mut alice = angemeldet(&aufbau, "alice").await;
    let mut bob = angemeldet(&aufbau, "bob").await;

    let quelle = alice.projekt_anlegen("cafebabe").await;
    bob.beitreten(quelle).await;
    alice
        .updates_senden(vec![update("rename", 1), update("rename", 2)])
        .await;
    assert_eq!(bob.update_ids(), vec![UpdateId(1), UpdateId(2)]);

    alice
        .senden(nachricht(
            commands::PROJECT_FORK_REQUEST,
            json!({ "lastupdateid": 2, "desc": "experiment" }),
        ))
        .await;
    let antworten = alice.empfangen();
    let reply: ForkReply = finden(&antworten, commands::PROJECT_FORK_REPLY)
        .body_als()
        .unwrap();
    assert_ne!(reply.lpid, quelle);
    assert_eq!(reply.lastupdateid, UpdateId(2));
    assert_eq!(alice.session.lpid(), Some(reply.lpid));

    let bei_bob = bob.empfangen();
    let angebot: ForkFollow = finden(&bei_bob, commands::PROJECT_FORK_FOLLOW)
        .body_als()
        .unwrap();
    assert_eq!(angebot.user, "alice");
    assert_eq!(angebot.lpid, reply.lpid);
    assert_eq!(angebot.lastupdateid, UpdateId(2));
    assert_eq!(angebot.desc, "experiment");

    bob.senden(nachricht(commands::PROJECT_JOIN_REPLY, json!({ "accept": true })))
        .await;
    assert!(hat_kommando(&bob.empfangen(), commands::PROJECT_JOINED));
    assert_eq!(bob.session.lpid(), Some(reply.lpid));

    alice.updates_senden(vec![update("rename", 3)]).await;
    assert_eq!(bob.update_ids(), vec![UpdateId(3)], "Fork setzt die Historie fort");
}

#[tokio::test]
async fn fork_follow_ablehnen_bleibt_im_projekt() {
    let aufbau = aufbau().await;
    let mut alice = angemeldet(&aufbau, "alice").await;
    let mut bob = angemeldet(&aufbau, "bob").await;
    let quelle = alice.projekt_anlegen("hash").await;
    bob.beitreten(quelle).await;

    alice
        .senden(nachricht(
            commands::PROJECT_FORK_REQUEST,
            json!({ "lastupdateid": 0 }),
        ))
        .await;
    bob.empfangen();

    let ok = bob
        .senden(nachricht(commands::PROJECT_JOIN_REPLY, json!({ "accept": false })))
        .await;
    assert!(ok);
    assert!(bob.empfangen().is_empty());
    assert_eq!(bob.session.lpid(), Some(quelle));
}

#[tokio::test]
async fn fork_jenseits_der_historie_abgelehnt() {
    let aufbau = aufbau().await;
    let mut alice = angemeldet(&aufbau, "alice").await;
    alice.projekt_anlegen("hash").await;
    alice.updates_senden(vec![update("rename", 1)]).await;

    alice
        .senden(nachricht(
            commands::PROJECT_FORK_REQUEST,
            json!({ "lastupdateid": 7 }),
        ))
        .await;
    assert_eq!(
        fehler(&alice.empfangen()),
        vec!["Update 7 is beyond the last update 1".to_string()]
    );
}

// ---------------------------------------------------------------------------
// Rejoin, Snapshots, Liste
// ---------------------------------------------------------------------------

#[tokio::test]
async fn speicherfehler_im_stapel_nennt_gespeicherte_updates() {
    let aufbau = aufbau().await;
    let mut alice = angemeldet(&aufbau, "alice").await;
    let mut bob = angemeldet(&aufbau, "bob").await;
    let lpid = alice.projekt_anlegen("hash").await;
    bob.beitreten(lpid).await;

    sqlx::query(
        "CREATE TRIGGER kein_make_code BEFORE INSERT ON updates
         WHEN NEW.command = 'make_code'
         BEGIN SELECT RAISE(ABORT, 'make_code gesperrt'); END",
    )
    .execute(aufbau.backend.db().pool())
    .await
    .unwrap();

    let antworten = alice
        .updates_senden(vec![
            update("rename", 1),
            update("make_code", 2),
            update("rename", 3),
        ])
        .await;
    assert_eq!(
        fehler(&antworten),
        vec!["Batch aborted after 1 stored updates (last updateid 1): Storage failure".to_string()]
    );
    assert_eq!(bob.update_ids(), vec![UpdateId(1)]);
}

#[tokio::test]
async fn rejoin_liefert_verpasste_updates_nach() {
    let aufbau = aufbau().await;
    let mut alice = angemeldet(&aufbau, "alice").await;
    let mut bob = angemeldet(&aufbau, "bob").await;
    let lpid = alice.projekt_anlegen("hash").await;
    bob.beitreten(lpid).await;

    alice.updates_senden(vec![update("rename", 1)]).await;
    assert_eq!(bob.update_ids(), vec![UpdateId(1)]);

    bob.senden(nachricht(commands::PROJECT_LEAVE, json!({}))).await;
    bob.empfangen();
    alice
        .updates_senden(vec![update("rename", 2), update("make_code", 3)])
        .await;

    bob.senden(nachricht(
        commands::PROJECT_REJOIN_REQUEST,
        json!({ "lpid": lpid.inner(), "lastupdateid": 1 }),
    ))
    .await;
    let antworten = bob.empfangen();
    assert_eq!(antworten[0].command, commands::PROJECT_JOINED);
    let ids: Vec<UpdateId> = antworten.iter().filter_map(Message::update_id).collect();
    assert_eq!(ids, vec![UpdateId(2), UpdateId(3)]);
    assert_eq!(antworten[2].command, "make_code");
}

#[tokio::test]
async fn rejoin_mit_stand_hinter_der_historie_liefert_nichts() {
    let aufbau = aufbau().await;
    let mut alice = angemeldet(&aufbau, "alice").await;
    let mut bob = angemeldet(&aufbau, "bob").await;
    let lpid = alice.projekt_anlegen("hash").await;
    alice
        .updates_senden(vec![update("rename", 1), update("rename", 2)])
        .await;

    bob.senden(nachricht(
        commands::PROJECT_REJOIN_REQUEST,
        json!({ "lpid": lpid.inner(), "lastupdateid": u64::MAX }),
    ))
    .await;
    let antworten = bob.empfangen();
    assert_eq!(antworten[0].command, commands::PROJECT_JOINED);
    let ids: Vec<UpdateId> = antworten.iter().filter_map(Message::update_id).collect();
    assert!(ids.is_empty(), "keine Nachlieferung erwartet: {ids:?}");
}

#[tokio::test]
async fn snapshot_liste_und_snapfork() {
    let aufbau = aufbau().await;
    let mut alice = angemeldet(&aufbau, "alice").await;
    let mut carol = angemeldet(&aufbau, "carol").await;
    let quelle = alice.projekt_anlegen("deadbeef").await;
    alice
        .updates_senden(vec![
            update("rename", 1),
            update("rename", 2),
            update("rename", 3),
        ])
        .await;

    alice
        .senden(nachricht(
            commands::PROJECT_SNAPSHOT_REQUEST,
            json!({ "lastupdateid": 2, "desc": "stand" }),
        ))
        .await;
    let antworten = alice.empfangen();
    let snapshot_id = finden(&antworten, commands::PROJECT_SNAPSHOT_REPLY).body["snapshot_id"].clone();

    carol
        .senden(nachricht(commands::PROJECT_LIST, json!({ "hash": "deadbeef" })))
        .await;
    let antworten = carol.empfangen();
    let liste: ProjectList = finden(&antworten, commands::PROJECT_LIST).body_als().unwrap();
    assert_eq!(liste.projects.len(), 1);
    assert_eq!(liste.projects[0].lpid, quelle);
    assert_eq!(liste.projects[0].owner, "alice");
    assert_eq!(liste.snapshots.len(), 1);
    assert_eq!(liste.snapshots[0].updateid, UpdateId(2));
    assert_eq!(liste.snapshots[0].desc, "stand");

    carol
        .senden(nachricht(
            commands::PROJECT_SNAPSHOTFORK_REQUEST,
            json!({ "snapshot_id": snapshot_id, "desc": "ab stand" }),
        ))
        .await;
    let antworten = carol.empfangen();
    let reply: ForkReply = finden(&antworten, commands::PROJECT_FORK_REPLY)
        .body_als()
        .unwrap();
    assert_eq!(reply.lastupdateid, UpdateId(2));

    // Die Quelle des Snapshots wird benachrichtigt
    let angebot: ForkFollow = finden(&alice.empfangen(), commands::PROJECT_FORK_FOLLOW)
        .body_als()
        .unwrap();
    assert_eq!(angebot.lpid, reply.lpid);
    assert_eq!(angebot.user, "carol");

    let info = aufbau.backend.project_info(reply.lpid).await.unwrap().unwrap();
    assert_eq!(info.parent, Some(quelle));
    assert_eq!(info.forked_at, Some(UpdateId(2)));
}

#[tokio::test]
async fn unbekannter_snapshot() {
    let aufbau = aufbau().await;
    let mut carol = angemeldet(&aufbau, "carol").await;

    carol
        .senden(nachricht(
            commands::PROJECT_SNAPSHOTFORK_REQUEST,
            json!({ "snapshot_id": 99 }),
        ))
        .await;
    assert_eq!(
        fehler(&carol.empfangen()),
        vec!["snapshot:99 does not exist".to_string()]
    );
}

// ---------------------------------------------------------------------------
// Projektmasken
// ---------------------------------------------------------------------------

#[tokio::test]
async fn projektmasken_nur_durch_eigentuemer() {
    let aufbau = aufbau().await;
    let mut alice = angemeldet(&aufbau, "alice").await;
    let mut bob = angemeldet(&aufbau, "bob").await;
    let lpid = alice.projekt_anlegen("hash").await;
    bob.beitreten(lpid).await;

    let ohne_rename = PermissionPair::neu(
        PermissionSet::FULL.ohne(Category::Rename),
        PermissionSet::FULL,
    );
    let body = json!({ "publish": ohne_rename.publish, "subscribe": ohne_rename.subscribe });

    bob.senden(nachricht(commands::SET_PROJ_PERMS, body.clone())).await;
    assert_eq!(
        fehler(&bob.empfangen()),
        vec!["Only the project owner may change project permissions".to_string()]
    );

    alice.senden(nachricht(commands::SET_PROJ_PERMS, body)).await;
    assert!(hat_kommando(&alice.empfangen(), commands::PROJ_PERMS));

    // Aenderung erreicht die uebrigen Mitglieder
    assert!(hat_kommando(&bob.empfangen(), commands::PROJ_PERMS));
    assert_eq!(bob.session.projekt_masken(), ohne_rename);
    let antworten = bob.updates_senden(vec![update("rename", 1)]).await;
    assert_eq!(
        fehler(&antworten),
        vec!["No publish permission for 'rename' (rename)".to_string()]
    );
}

#[tokio::test]
async fn gesperrtes_projekt_nur_fuer_eigentuemer() {
    let aufbau = aufbau().await;
    let mut alice = angemeldet(&aufbau, "alice").await;
    let mut carol = angemeldet(&aufbau, "carol").await;
    let lpid = alice.projekt_anlegen("hash").await;

    alice
        .senden(nachricht(
            commands::SET_PROJ_PERMS,
            json!({ "publish": 0, "subscribe": 0 }),
        ))
        .await;
    alice.empfangen();

    let antworten = carol.beitreten(lpid).await;
    assert_eq!(
        fehler(&antworten),
        vec![format!("Access to project {lpid} denied")]
    );
    assert_eq!(carol.session.lpid(), None);

    let antworten = alice.beitreten(lpid).await;
    assert!(hat_kommando(&antworten, commands::PROJECT_JOINED));
}

#[tokio::test]
async fn unbekanntes_projekt() {
    let aufbau = aufbau().await;
    let mut alice = angemeldet(&aufbau, "alice").await;

    let antworten = alice.beitreten(LocalProjectId(4711)).await;
    assert_eq!(
        fehler(&antworten),
        vec!["Project lpid:4711 does not exist".to_string()]
    );
}

// ---------------------------------------------------------------------------
// Migration
// ---------------------------------------------------------------------------

#[tokio::test]
async fn migration_mit_globaler_id() {
    let aufbau = aufbau().await;
    let gpid = GlobalProjectId("anderer-server-17".into());

    let lpid = aufbau
        .backend
        .migrate_project("alice", &gpid, "hash", "migriert", PermissionPair::FULL)
        .await
        .unwrap();
    assert_eq!(aufbau.backend.lpid2gpid(lpid).await.unwrap(), gpid);

    let err = aufbau
        .backend
        .migrate_project("alice", &gpid, "hash", "nochmal", PermissionPair::FULL)
        .await
        .unwrap_err();
    assert!(matches!(err, BackendError::GpidVorhanden(ref g) if *g == gpid));

    let err = aufbau
        .backend
        .migrate_project("niemand", &GlobalProjectId("x-1".into()), "hash", "", PermissionPair::FULL)
        .await
        .unwrap_err();
    assert!(matches!(err, BackendError::BenutzerUnbekannt(ref u) if u == "niemand"));
}
