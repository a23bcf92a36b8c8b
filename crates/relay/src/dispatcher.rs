//! Message-Dispatcher – Routet Client-Kommandos an die richtigen Handler
//!
//! Die Zuordnung Kommando -> Handler wird einmal beim Start aufgebaut und
//! danach nur noch gelesen.
//!
//! ## Zustandspruefung
//! - `auth_request` ist immer erlaubt (der Handler prueft den Rest)
//! - Projektverwaltung und Masken erfordern eine Anmeldung
//! - Snapshot, Fork, Leave, Updates und Projektmasken erfordern zusaetzlich
//!   eine Projektbindung
//!
//! Unbekannte Kommandos und verletzte Vorbedingungen werden mit ERROR
//! beantwortet; die Session bleibt bestehen.

use futures_util::future::BoxFuture;
use reflector_protocol::commands;
use reflector_protocol::Message;
use std::collections::HashMap;

use crate::error::{RelayError, RelayResult};
use crate::handlers::{auth_handler, permission_handler, project_handler, update_handler};
use crate::server_state::RelayState;
use crate::session::Session;

/// Handler-Funktion fuer ein Kommando
pub type Handler =
    for<'a> fn(&'a mut Session, &'a Message, &'a RelayState) -> BoxFuture<'a, RelayResult<()>>;

/// Vorbedingung eines Kommandos
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Voraussetzung {
    Keine,
    Angemeldet,
    Projekt,
}

#[derive(Clone, Copy)]
struct Eintrag {
    voraussetzung: Voraussetzung,
    handler: Handler,
}

fn eintrag(voraussetzung: Voraussetzung, handler: Handler) -> Eintrag {
    Eintrag {
        voraussetzung,
        handler,
    }
}

/// Zentraler Message-Dispatcher
pub struct MessageDispatcher {
    tabelle: HashMap<&'static str, Eintrag>,
}

impl MessageDispatcher {
    /// Baut die Kommandotabelle auf
    pub fn neu() -> Self {
        use Voraussetzung::{Angemeldet, Keine, Projekt};

        let tabelle = HashMap::from([
            // Handshake
            (
                commands::AUTH_REQUEST,
                eintrag(Keine, |s, m, k| {
                    Box::pin(auth_handler::handle_auth_request(s, m, k))
                }),
            ),
            // Projekte
            (
                commands::PROJECT_NEW_REQUEST,
                eintrag(Angemeldet, |s, m, k| {
                    Box::pin(project_handler::handle_new(s, m, k))
                }),
            ),
            (
                commands::PROJECT_JOIN_REQUEST,
                eintrag(Angemeldet, |s, m, k| {
                    Box::pin(project_handler::handle_join(s, m, k))
                }),
            ),
            (
                commands::PROJECT_REJOIN_REQUEST,
                eintrag(Angemeldet, |s, m, k| {
                    Box::pin(project_handler::handle_rejoin(s, m, k))
                }),
            ),
            (
                commands::PROJECT_SNAPSHOT_REQUEST,
                eintrag(Projekt, |s, m, k| {
                    Box::pin(project_handler::handle_snapshot(s, m, k))
                }),
            ),
            (
                commands::PROJECT_FORK_REQUEST,
                eintrag(Projekt, |s, m, k| {
                    Box::pin(project_handler::handle_fork(s, m, k))
                }),
            ),
            (
                commands::PROJECT_SNAPSHOTFORK_REQUEST,
                eintrag(Angemeldet, |s, m, k| {
                    Box::pin(project_handler::handle_snapfork(s, m, k))
                }),
            ),
            (
                commands::PROJECT_JOIN_REPLY,
                eintrag(Angemeldet, |s, m, k| {
                    Box::pin(project_handler::handle_join_reply(s, m, k))
                }),
            ),
            (
                commands::PROJECT_LEAVE,
                eintrag(Projekt, |s, m, k| {
                    Box::pin(project_handler::handle_leave(s, m, k))
                }),
            ),
            (
                commands::PROJECT_LIST,
                eintrag(Angemeldet, |s, m, k| {
                    Box::pin(project_handler::handle_list(s, m, k))
                }),
            ),
            // Updates
            (
                commands::SEND_UPDATES,
                eintrag(Projekt, |s, m, k| {
                    Box::pin(update_handler::handle_send_updates(s, m, k))
                }),
            ),
            // Berechtigungen
            (
                commands::SET_REQ_PERMS,
                eintrag(Angemeldet, |s, m, k| {
                    Box::pin(permission_handler::handle_set_req_perms(s, m, k))
                }),
            ),
            (
                commands::GET_REQ_PERMS,
                eintrag(Angemeldet, |s, m, k| {
                    Box::pin(permission_handler::handle_get_req_perms(s, m, k))
                }),
            ),
            (
                commands::GET_PROJ_PERMS,
                eintrag(Projekt, |s, m, k| {
                    Box::pin(permission_handler::handle_get_proj_perms(s, m, k))
                }),
            ),
            (
                commands::SET_PROJ_PERMS,
                eintrag(Projekt, |s, m, k| {
                    Box::pin(permission_handler::handle_set_proj_perms(s, m, k))
                }),
            ),
        ]);

        Self { tabelle }
    }

    /// Gibt true zurueck wenn fuer das Kommando ein Handler existiert
    pub fn kennt(&self, command: &str) -> bool {
        self.tabelle.contains_key(command)
    }

    pub fn voraussetzung(&self, command: &str) -> Option<Voraussetzung> {
        self.tabelle.get(command).map(|e| e.voraussetzung)
    }

    /// Verarbeitet eine empfangene Nachricht
    ///
    /// Gibt `true` zurueck wenn der Handler erfolgreich war. Fehler gehen
    /// als ERROR oder FATAL an den Client.
    pub async fn dispatch(
        &self,
        session: &mut Session,
        nachricht: Message,
        state: &RelayState,
    ) -> bool {
        session.empfangen_zaehlen(&nachricht.command);

        let Some(eintrag) = self.tabelle.get(nachricht.command.as_str()).copied() else {
            tracing::warn!(
                session = %session.id(),
                command = %nachricht.command,
                "Unbekanntes Kommando"
            );
            session.send_error(&format!("Unknown command '{}'", nachricht.command));
            return false;
        };

        if let Err(e) = Self::voraussetzung_pruefen(session, &nachricht.command, eintrag.voraussetzung) {
            Self::fehler_melden(session, &nachricht.command, e);
            return false;
        }

        match (eintrag.handler)(session, &nachricht, state).await {
            Ok(()) => true,
            Err(e) => {
                Self::fehler_melden(session, &nachricht.command, e);
                false
            }
        }
    }

    fn voraussetzung_pruefen(
        session: &Session,
        command: &str,
        voraussetzung: Voraussetzung,
    ) -> RelayResult<()> {
        if voraussetzung == Voraussetzung::Keine {
            return Ok(());
        }
        if !session.ist_authentifiziert() {
            return Err(RelayError::zugriff(format!(
                "Authentication required for '{command}'"
            )));
        }
        if voraussetzung == Voraussetzung::Projekt && session.lpid().is_none() {
            return Err(RelayError::protokoll(format!(
                "Not joined to a project ('{command}')"
            )));
        }
        Ok(())
    }

    fn fehler_melden(session: &mut Session, command: &str, fehler: RelayError) {
        match &fehler {
            RelayError::Fatal(text) => {
                session.send_fatal(text);
            }
            RelayError::Backend(e) if e.ist_speicherfehler() => {
                tracing::error!(session = %session.id(), command = %command, fehler = ?e, "Backend-Fehler");
                session.send_error(&fehler.to_string());
            }
            RelayError::Io(_) | RelayError::Intern(_) => {
                tracing::error!(session = %session.id(), command = %command, fehler = %fehler, "Interner Fehler");
                session.send_error(&fehler.to_string());
            }
            _ => {
                tracing::warn!(session = %session.id(), command = %command, fehler = %fehler, "Anfrage abgelehnt");
                session.send_error(&fehler.to_string());
            }
        }
    }
}

impl Default for MessageDispatcher {
    fn default() -> Self {
        Self::neu()
    }
}
