//! Auth-Handler – Challenge/Response-Anmeldung
//!
//! Die Challenge wird beim Verbindungsaufbau gesendet und mit dem ersten
//! gueltigen auth_request verbraucht. Nach einem Fehlversuch gibt es eine
//! neue Challenge, nach `max_auth_failures` Fehlversuchen FATAL.

use reflector_protocol::commands;
use reflector_protocol::control::{AuthReply, AuthRequest};
use reflector_protocol::Message;

use crate::error::{RelayError, RelayResult};
use crate::server_state::RelayState;
use crate::session::Session;

/// Verarbeitet auth_request
pub async fn handle_auth_request(
    session: &mut Session,
    nachricht: &Message,
    state: &RelayState,
) -> RelayResult<()> {
    if session.ist_authentifiziert() {
        return Err(RelayError::fatal("Already authenticated"));
    }
    let anfrage: AuthRequest = nachricht.body_als()?;

    let Some(challenge) = session.challenge_nehmen() else {
        return Err(RelayError::fatal("No authentication challenge outstanding"));
    };

    let ergebnis = state
        .backend
        .authenticate(session, &anfrage.user, &challenge, &anfrage.response)
        .await;

    match ergebnis {
        Ok(Some(user_id)) => {
            session.anmelden(user_id, &anfrage.user);
            let masken = session.effektive_masken();
            tracing::info!(
                session = %session.id(),
                peer = %session.peer_addr(),
                user = %anfrage.user,
                user_id = %user_id,
                "Anmeldung erfolgreich"
            );
            let antwort = AuthReply {
                result: "ok".into(),
                userid: user_id,
                publish: masken.publish,
                subscribe: masken.subscribe,
            };
            session.antworten(commands::AUTH_REPLY, &antwort)
        }
        Ok(None) => {
            let versuche = session.fehlversuch_zaehlen();
            tracing::warn!(
                session = %session.id(),
                peer = %session.peer_addr(),
                user = %anfrage.user,
                versuche,
                "Anmeldung fehlgeschlagen"
            );
            if versuche >= state.config.max_auth_failures {
                return Err(RelayError::fatal("Too many failed authentication attempts"));
            }
            session.send_error("Authentication failed");
            session.challenge_ausstellen()
        }
        Err(e) => {
            tracing::error!(session = %session.id(), fehler = ?e, "Anmeldung nicht pruefbar");
            session.send_error(&e.to_string());
            session.challenge_ausstellen()
        }
    }
}
