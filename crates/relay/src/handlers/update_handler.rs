//! Update-Handler – send_updates
//!
//! Die Berechtigungspruefung gilt fuer den ganzen Stapel: erst werden alle
//! Kommandos gegen die Publish-Maske geprueft, dann alle ueber den
//! Broadcaster gespeichert und verteilt. Ein Speicherfehler danach bricht
//! den Rest ab (siehe [`crate::broadcast`]).

use reflector_protocol::control::SendUpdates;
use reflector_protocol::Message;

use crate::error::{RelayError, RelayResult};
use crate::server_state::RelayState;
use crate::session::{Pruefung, Richtung, Session};

pub async fn handle_send_updates(
    session: &mut Session,
    nachricht: &Message,
    state: &RelayState,
) -> RelayResult<()> {
    let stapel: SendUpdates = nachricht.body_als()?;

    for update in &stapel.updates {
        match session.check_permission(&update.command, Richtung::Publish) {
            Pruefung::Erlaubt => {}
            Pruefung::Verweigert(kategorie) => {
                return Err(RelayError::zugriff(format!(
                    "No publish permission for '{}' ({kategorie})",
                    update.command
                )));
            }
            Pruefung::UnbekanntesKommando => {
                return Err(RelayError::protokoll(format!(
                    "Unknown update command '{}'",
                    update.command
                )));
            }
        }
    }
    if stapel.updates.is_empty() {
        return Ok(());
    }

    let updates: Vec<Message> = stapel
        .updates
        .into_iter()
        .map(Message::ohne_server_felder)
        .collect();
    let ids = state
        .broadcaster
        .updates_veroeffentlichen(state.backend.as_ref(), session, updates)
        .await?;

    tracing::debug!(
        session = %session.id(),
        anzahl = ids.len(),
        letzte = ?ids.last(),
        "Updates veroeffentlicht"
    );
    Ok(())
}
