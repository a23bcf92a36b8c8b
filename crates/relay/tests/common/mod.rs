//! Gemeinsame Hilfen fuer die Relay-Integrationstests
//!
//! Ein [`TestClient`] besitzt eine echte Session samt Ausgang und Eingang,
//! spricht aber direkt mit dem Dispatcher statt ueber TCP.

#![allow(dead_code)]

use std::sync::Arc;

use reflector_auth::{antwort_berechnen, Challenge};
use reflector_core::{LocalProjectId, PermissionPair, UpdateId};
use reflector_protocol::commands;
use reflector_protocol::control::{AuthChallenge, AuthRequest};
use reflector_protocol::Message;
use reflector_relay::{Broadcaster, Eingang, ProjectBackend, RelayConfig, RelayState, Session};
use serde_json::{json, Value};
use tokio::sync::mpsc;

pub fn state_mit(backend: Arc<dyn ProjectBackend>, broadcaster: Broadcaster) -> Arc<RelayState> {
    RelayState::neu(RelayConfig::default(), backend, broadcaster)
}

pub fn debug_state() -> Arc<RelayState> {
    state_mit(
        Arc::new(reflector_relay::DebugBackend::neu()),
        Broadcaster::neu(),
    )
}

/// Baut eine Nachricht aus einem JSON-Objekt
pub fn nachricht(command: &str, body: Value) -> Message {
    let mut m = Message::neu(command);
    if let Value::Object(felder) = body {
        m.body = felder;
    }
    m
}

pub fn update(command: &str, addr: u64) -> Value {
    json!({ "command": command, "addr": addr, "name": format!("sub_{addr:x}") })
}

pub struct TestClient {
    pub session: Session,
    state: Arc<RelayState>,
    ausgang: mpsc::UnboundedReceiver<Message>,
    eingang: mpsc::UnboundedReceiver<Eingang>,
    challenge: Option<String>,
}

impl TestClient {
    /// Neue Verbindung; die Challenge liegt bereits im Ausgang
    pub fn neu(state: &Arc<RelayState>) -> Self {
        let (a_tx, a_rx) = mpsc::unbounded_channel();
        let (e_tx, e_rx) = mpsc::unbounded_channel();
        let mut session = Session::neu(
            state.naechste_session_id(),
            "127.0.0.1:9000".parse().unwrap(),
            a_tx,
            e_tx,
            state.broadcaster.clone(),
        );
        session.challenge_ausstellen().unwrap();
        Self {
            session,
            state: Arc::clone(state),
            ausgang: a_rx,
            eingang: e_rx,
            challenge: None,
        }
    }

    pub async fn senden(&mut self, nachricht: Message) -> bool {
        self.state
            .dispatcher
            .dispatch(&mut self.session, nachricht, &self.state)
            .await
    }

    /// Verarbeitet den Eingang und leert den Ausgang
    pub fn empfangen(&mut self) -> Vec<Message> {
        while let Ok(eingang) = self.eingang.try_recv() {
            self.session.eingang_verarbeiten(eingang);
        }
        let mut alle = Vec::new();
        while let Ok(m) = self.ausgang.try_recv() {
            if m.command == commands::AUTH_CHALLENGE {
                let body: AuthChallenge = m.body_als().unwrap();
                self.challenge = Some(body.challenge);
            }
            alle.push(m);
        }
        alle
    }

    /// Nur die Updates (Nachrichten mit Update-ID)
    pub fn updates(&mut self) -> Vec<Message> {
        self.empfangen()
            .into_iter()
            .filter(|m| m.update_id().is_some())
            .collect()
    }

    pub fn update_ids(&mut self) -> Vec<UpdateId> {
        self.updates().iter().filter_map(Message::update_id).collect()
    }

    /// Beantwortet die aktuelle Challenge mit dem Passwort
    pub async fn anmelden(&mut self, user: &str, passwort: &str) -> Vec<Message> {
        self.empfangen();
        let text = self.challenge.clone().expect("keine Challenge erhalten");
        let challenge = Challenge::aus_base64(&text).unwrap();
        let anfrage = AuthRequest {
            user: user.to_string(),
            response: antwort_berechnen(passwort, &challenge).unwrap(),
        };
        self.senden(Message::mit_body(commands::AUTH_REQUEST, &anfrage).unwrap())
            .await;
        self.empfangen()
    }

    pub async fn projekt_anlegen(&mut self, hash: &str) -> LocalProjectId {
        self.senden(nachricht(
            commands::PROJECT_NEW_REQUEST,
            json!({ "hash": hash, "desc": "test" }),
        ))
        .await;
        let antworten = self.empfangen();
        let antwort = antworten
            .iter()
            .find(|m| m.command == commands::PROJECT_NEW_REPLY)
            .expect("project_new_reply erwartet");
        LocalProjectId(antwort.body["lpid"].as_u64().unwrap() as u32)
    }

    pub async fn beitreten(&mut self, lpid: LocalProjectId) -> Vec<Message> {
        self.senden(nachricht(
            commands::PROJECT_JOIN_REQUEST,
            json!({ "lpid": lpid.inner() }),
        ))
        .await;
        self.empfangen()
    }

    pub async fn updates_senden(&mut self, updates: Vec<Value>) -> Vec<Message> {
        self.senden(nachricht(
            commands::SEND_UPDATES,
            json!({ "updates": updates }),
        ))
        .await;
        self.empfangen()
    }

    pub async fn masken_anfordern(&mut self, masken: PermissionPair) {
        self.senden(nachricht(
            commands::SET_REQ_PERMS,
            json!({ "publish": masken.publish, "subscribe": masken.subscribe }),
        ))
        .await;
        self.empfangen();
    }
}

/// Fehlertexte aller ERROR-Nachrichten
pub fn fehler(nachrichten: &[Message]) -> Vec<String> {
    nachrichten
        .iter()
        .filter(|m| m.command == commands::ERROR)
        .filter_map(Message::fehlertext)
        .collect()
}

pub fn hat_kommando(nachrichten: &[Message], command: &str) -> bool {
    nachrichten.iter().any(|m| m.command == command)
}
