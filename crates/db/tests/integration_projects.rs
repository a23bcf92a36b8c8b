//! Integration-Tests fuer Projekte, Updates, Forks und Snapshots

use serde_json::{json, Map, Value};

use reflector_core::{GlobalProjectId, PermissionPair, UpdateId, UserId};
use reflector_db::{
    DbError,
    models::{ForkQuelle, NeuerBenutzer, NeuesProjekt},
    ProjectRepository, ServerMetaRepository, SnapshotRepository, SqliteDb, UpdateRepository,
    UserRepository,
};

async fn db_mit_benutzer() -> (SqliteDb, UserId) {
    let db = SqliteDb::in_memory().await.unwrap();
    let user = db
        .create_user(NeuerBenutzer {
            username: "alice",
            pwkey: "k",
            masken: PermissionPair::FULL,
        })
        .await
        .unwrap();
    (db, user.id)
}

fn projekt(owner: UserId, hash: &str) -> NeuesProjekt<'_> {
    NeuesProjekt {
        gpid: None,
        hash,
        beschreibung: "demo",
        owner,
        masken: PermissionPair::FULL,
    }
}

fn payload(wert: Value) -> Map<String, Value> {
    match wert {
        Value::Object(map) => map,
        _ => panic!("Objekt erwartet"),
    }
}

#[tokio::test]
async fn server_kennung_bleibt_stabil() {
    let db = SqliteDb::in_memory().await.unwrap();
    let erste = db.server_kennung().await.unwrap();
    let zweite = db.server_kennung().await.unwrap();
    assert_eq!(erste, zweite);
    assert!(!erste.is_empty());
}

#[tokio::test]
async fn projekt_bekommt_globale_id() {
    let (db, owner) = db_mit_benutzer().await;
    let kennung = db.server_kennung().await.unwrap();

    let p = db.create_project(projekt(owner, "hash1")).await.unwrap();
    assert_eq!(p.gpid, GlobalProjectId::aus_lokal(&kennung, p.lpid));
    assert_eq!(p.owner_name, "alice");
    assert_eq!(p.parent, None);

    let nach_gpid = db.get_project_by_gpid(&p.gpid).await.unwrap().unwrap();
    assert_eq!(nach_gpid.lpid, p.lpid);
}

#[tokio::test]
async fn projektliste_nach_hash_gefiltert() {
    let (db, owner) = db_mit_benutzer().await;
    let a = db.create_project(projekt(owner, "h")).await.unwrap();
    db.create_project(projekt(owner, "anders")).await.unwrap();
    let b = db.create_project(projekt(owner, "h")).await.unwrap();

    let liste = db.list_projects("h").await.unwrap();
    let lpids: Vec<_> = liste.iter().map(|p| p.lpid).collect();
    assert_eq!(lpids, vec![a.lpid, b.lpid]);
}

#[tokio::test]
async fn update_ids_lueckenlos_ab_eins() {
    let (db, owner) = db_mit_benutzer().await;
    let p = db.create_project(projekt(owner, "h")).await.unwrap();
    assert_eq!(db.last_update_id(p.lpid).await.unwrap(), UpdateId::KEINE);

    for i in 1..=3u64 {
        let id = db
            .append_update(p.lpid, owner, "rename", &payload(json!({"name": format!("f{i}")})))
            .await
            .unwrap();
        assert_eq!(id, UpdateId(i));
    }
    assert_eq!(db.last_update_id(p.lpid).await.unwrap(), UpdateId(3));

    let ab_zwei = db.updates_since(p.lpid, UpdateId(1)).await.unwrap();
    let ids: Vec<_> = ab_zwei.iter().map(|u| u.updateid).collect();
    assert_eq!(ids, vec![UpdateId(2), UpdateId(3)]);
    assert_eq!(ab_zwei[0].payload["name"], "f2");
}

#[tokio::test]
async fn stand_jenseits_von_i64_liefert_nichts() {
    let (db, owner) = db_mit_benutzer().await;
    let p = db.create_project(projekt(owner, "h")).await.unwrap();
    for name in ["a", "b"] {
        db.append_update(p.lpid, owner, "rename", &payload(json!({ "name": name })))
            .await
            .unwrap();
    }

    let grenze = UpdateId(i64::MAX as u64);
    assert!(db.updates_since(p.lpid, grenze).await.unwrap().is_empty());
    assert!(db.updates_since(p.lpid, UpdateId(u64::MAX)).await.unwrap().is_empty());

    let fehler = db
        .create_snapshot(p.lpid, UpdateId(u64::MAX), "zu weit", owner)
        .await
        .unwrap_err();
    assert!(matches!(fehler, DbError::UngueltigeDaten(_)), "{fehler:?}");
}

#[tokio::test]
async fn fork_kopiert_nur_praefix() {
    let (db, owner) = db_mit_benutzer().await;
    let p = db.create_project(projekt(owner, "h")).await.unwrap();
    for i in 1..=5u64 {
        db.append_update(p.lpid, owner, "cmt_changed", &payload(json!({"cmt": i})))
            .await
            .unwrap();
    }

    let fork = db
        .fork_project(
            projekt(owner, "h"),
            ForkQuelle {
                lpid: p.lpid,
                bis: UpdateId(3),
            },
        )
        .await
        .unwrap();
    assert_eq!(fork.parent, Some(p.lpid));
    assert_eq!(fork.forked_at, Some(UpdateId(3)));

    let original = db.updates_since(p.lpid, UpdateId::KEINE).await.unwrap();
    let kopie = db.updates_since(fork.lpid, UpdateId::KEINE).await.unwrap();
    assert_eq!(kopie.len(), 3);
    for (o, k) in original.iter().zip(kopie.iter()) {
        assert_eq!(o.updateid, k.updateid);
        assert_eq!(o.command, k.command);
        assert_eq!(o.payload, k.payload);
    }

    // Neue Updates im Fork laufen ab 4 weiter, das Original bleibt unberuehrt
    let naechste = db
        .append_update(fork.lpid, owner, "rename", &payload(json!({})))
        .await
        .unwrap();
    assert_eq!(naechste, UpdateId(4));
    assert_eq!(db.last_update_id(p.lpid).await.unwrap(), UpdateId(5));
}

#[tokio::test]
async fn doppelte_globale_id_abgelehnt() {
    let (db, owner) = db_mit_benutzer().await;
    let gpid = GlobalProjectId("fremd-1".into());
    let mut data = projekt(owner, "h");
    data.gpid = Some(&gpid);

    db.create_project(data.clone()).await.unwrap();
    let err = db.create_project(data).await.unwrap_err();
    assert!(err.ist_eindeutigkeit());
}

#[tokio::test]
async fn snapshots_nach_hash() {
    let (db, owner) = db_mit_benutzer().await;
    let p = db.create_project(projekt(owner, "h")).await.unwrap();
    let q = db.create_project(projekt(owner, "anders")).await.unwrap();

    let s = db.create_snapshot(p.lpid, UpdateId(2), "stand", owner).await.unwrap();
    db.create_snapshot(q.lpid, UpdateId(0), "x", owner).await.unwrap();

    let geladen = db.get_snapshot(s.id).await.unwrap().unwrap();
    assert_eq!(geladen.lpid, p.lpid);
    assert_eq!(geladen.updateid, UpdateId(2));
    assert_eq!(geladen.beschreibung, "stand");

    let liste = db.list_snapshots("h").await.unwrap();
    assert_eq!(liste.len(), 1);
    assert_eq!(liste[0].id, s.id);
}

#[tokio::test]
async fn projektmasken_aendern() {
    let (db, owner) = db_mit_benutzer().await;
    let p = db.create_project(projekt(owner, "h")).await.unwrap();

    assert!(db.set_project_permissions(p.lpid, PermissionPair::NONE).await.unwrap());
    let geladen = db.get_project(p.lpid).await.unwrap().unwrap();
    assert_eq!(geladen.masken, PermissionPair::NONE);
}
