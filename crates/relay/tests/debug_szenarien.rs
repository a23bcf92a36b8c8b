//! Integration-Tests: Relay mit Debug-Backend (ohne Netzwerk)

mod common;

use common::{debug_state, fehler, hat_kommando, nachricht, update, TestClient};
use reflector_core::{Category, PermissionPair, PermissionSet, UpdateId};
use reflector_protocol::commands;
use serde_json::json;

async fn angemeldet(state: &std::sync::Arc<reflector_relay::RelayState>, name: &str) -> TestClient {
    let mut client = TestClient::neu(state);
    let antworten = client.anmelden(name, "egal").await;
    assert!(hat_kommando(&antworten, commands::AUTH_REPLY), "{name} nicht angemeldet");
    client
}

#[tokio::test]
async fn updates_werden_nach_subscribe_maske_verteilt() {
    let state = debug_state();
    let mut a = angemeldet(&state, "a").await;
    let mut b = angemeldet(&state, "b").await;
    let mut c = angemeldet(&state, "c").await;

    let lpid = a.projekt_anlegen("cafebabe").await;
    assert_eq!(lpid.inner(), 500);
    b.beitreten(lpid).await;
    c.beitreten(lpid).await;
    c.masken_anfordern(PermissionPair::neu(
        PermissionSet::FULL,
        PermissionSet::FULL.ohne(Category::Rename),
    ))
    .await;

    let antworten = a
        .updates_senden(vec![update("rename", 0x401000), update("cmt_changed", 0x401000)])
        .await;
    assert!(antworten.is_empty(), "Absender erhaelt seine Updates nicht zurueck");

    let bei_b = b.updates();
    assert_eq!(bei_b.len(), 2);
    assert_eq!(bei_b[0].command, "rename");
    assert_eq!(bei_b[0].update_id(), Some(UpdateId(1)));
    assert_eq!(bei_b[1].command, "cmt_changed");
    assert_eq!(bei_b[1].update_id(), Some(UpdateId(2)));
    assert_eq!(bei_b[0].body["addr"], json!(0x401000));

    let bei_c = c.updates();
    assert_eq!(bei_c.len(), 1);
    assert_eq!(bei_c[0].command, "cmt_changed");
    assert_eq!(bei_c[0].update_id(), Some(UpdateId(2)));

    assert!(a.empfangen().is_empty());
}

#[tokio::test]
async fn ohne_anmeldung_nur_error() {
    let state = debug_state();
    let mut client = TestClient::neu(&state);
    client.empfangen();

    let ok = client
        .senden(nachricht(commands::SEND_UPDATES, json!({ "updates": [] })))
        .await;
    assert!(!ok);
    let antworten = client.empfangen();
    assert_eq!(
        fehler(&antworten),
        vec!["Authentication required for 'send_updates'".to_string()]
    );
    assert!(!client.session.soll_beenden(), "ERROR beendet die Session nicht");
}

#[tokio::test]
async fn snapshot_im_debug_modus_abgelehnt() {
    let state = debug_state();
    let mut client = angemeldet(&state, "a").await;
    client.projekt_anlegen("hash").await;

    client
        .senden(nachricht(
            commands::PROJECT_SNAPSHOT_REQUEST,
            json!({ "lastupdateid": 0, "desc": "vorher" }),
        ))
        .await;
    assert_eq!(
        fehler(&client.empfangen()),
        vec!["Server is in debug mode, snapshots cannot be made".to_string()]
    );
}

#[tokio::test]
async fn zweite_anmeldung_ist_fatal() {
    let state = debug_state();
    let mut client = angemeldet(&state, "a").await;

    client
        .senden(nachricht(
            commands::AUTH_REQUEST,
            json!({ "user": "a", "response": "AAAA" }),
        ))
        .await;
    let antworten = client.empfangen();
    let fatal = antworten
        .iter()
        .find(|m| m.command == commands::FATAL)
        .expect("FATAL erwartet");
    assert_eq!(fatal.fehlertext().as_deref(), Some("Already authenticated"));
    assert!(client.session.soll_beenden());
}

#[tokio::test]
async fn unbekanntes_kommando_und_fehlende_bindung() {
    let state = debug_state();
    let mut client = angemeldet(&state, "a").await;

    client.senden(nachricht("quatsch", json!({}))).await;
    assert_eq!(
        fehler(&client.empfangen()),
        vec!["Unknown command 'quatsch'".to_string()]
    );

    let antworten = client.updates_senden(vec![update("rename", 1)]).await;
    assert_eq!(
        fehler(&antworten),
        vec!["Not joined to a project ('send_updates')".to_string()]
    );
}

#[tokio::test]
async fn stapel_wird_ganz_oder_gar_nicht_angenommen() {
    let state = debug_state();
    let mut a = angemeldet(&state, "a").await;
    let mut b = angemeldet(&state, "b").await;
    let lpid = a.projekt_anlegen("hash").await;
    b.beitreten(lpid).await;

    a.masken_anfordern(PermissionPair::neu(
        PermissionSet::FULL.ohne(Category::Comment),
        PermissionSet::FULL,
    ))
    .await;

    let antworten = a
        .updates_senden(vec![update("rename", 1), update("cmt_changed", 2)])
        .await;
    assert_eq!(
        fehler(&antworten),
        vec!["No publish permission for 'cmt_changed' (comment)".to_string()]
    );
    assert!(b.updates().is_empty(), "kein Teil des Stapels verteilt");

    let antworten = a
        .updates_senden(vec![update("rename", 1), update("frobnicate", 2)])
        .await;
    assert_eq!(
        fehler(&antworten),
        vec!["Unknown update command 'frobnicate'".to_string()]
    );
    assert!(b.updates().is_empty());

    a.updates_senden(vec![update("rename", 3)]).await;
    assert_eq!(b.update_ids(), vec![UpdateId(1)], "IDs ohne Luecke");
}

#[tokio::test]
async fn join_reply_ohne_angebot() {
    let state = debug_state();
    let mut client = angemeldet(&state, "a").await;

    client
        .senden(nachricht(commands::PROJECT_JOIN_REPLY, json!({ "accept": true })))
        .await;
    assert_eq!(
        fehler(&client.empfangen()),
        vec!["No fork-follow offer pending".to_string()]
    );
}

#[tokio::test]
async fn nach_verlassen_keine_zustellung() {
    let state = debug_state();
    let mut a = angemeldet(&state, "a").await;
    let mut b = angemeldet(&state, "b").await;
    let lpid = a.projekt_anlegen("hash").await;
    b.beitreten(lpid).await;

    // Update liegt bereits im Eingang von B, wird aber erst nach dem
    // Verlassen verarbeitet
    a.updates_senden(vec![update("rename", 1)]).await;
    b.senden(nachricht(commands::PROJECT_LEAVE, json!({}))).await;

    let antworten = b.empfangen();
    assert!(hat_kommando(&antworten, commands::PROJECT_LEFT));
    assert!(antworten.iter().all(|m| m.update_id().is_none()));

    a.updates_senden(vec![update("rename", 2)]).await;
    assert!(b.empfangen().is_empty());
    assert_eq!(state.broadcaster.mitglieder_anzahl(lpid), 1);
}

#[tokio::test]
async fn zwei_absender_lueckenlos_geordnet() {
    let state = debug_state();
    let mut a = angemeldet(&state, "a").await;
    let mut b = angemeldet(&state, "b").await;
    let mut c = angemeldet(&state, "c").await;
    let lpid = a.projekt_anlegen("hash").await;
    b.beitreten(lpid).await;
    c.beitreten(lpid).await;

    for runde in 0..5u64 {
        tokio::join!(
            a.updates_senden(vec![update("rename", runde), update("make_code", runde)]),
            b.updates_senden(vec![update("add_func", runde)]),
        );
    }

    let ids = c.update_ids();
    let erwartet: Vec<UpdateId> = (1..=15).map(UpdateId).collect();
    assert_eq!(ids, erwartet);
}

#[tokio::test]
async fn angeforderte_masken_abfragen() {
    let state = debug_state();
    let mut client = angemeldet(&state, "a").await;
    let masken = PermissionPair::neu(PermissionSet::NONE, PermissionSet::FULL);
    client.masken_anfordern(masken).await;

    client
        .senden(nachricht(commands::GET_REQ_PERMS, json!({})))
        .await;
    let antworten = client.empfangen();
    let antwort = antworten
        .iter()
        .find(|m| m.command == commands::REQ_PERMS)
        .expect("req_perms erwartet");
    assert_eq!(antwort.body["publish"], json!(0));
    assert_eq!(client.session.effektive_masken().publish, PermissionSet::NONE);
}
