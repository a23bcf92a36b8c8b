//! Permission-Handler – Angeforderte Masken und Projektmasken
//!
//! Jede Aenderung berechnet die effektiven Masken sofort neu. Neue
//! Projektmasken gelten auch fuer alle anderen Sessions im Projekt.

use reflector_core::PermissionPair;
use reflector_protocol::commands;
use reflector_protocol::control::{PermsBody, ProjPerms};
use reflector_protocol::Message;

use crate::error::RelayResult;
use crate::handlers::gebundenes_projekt;
use crate::server_state::RelayState;
use crate::session::Session;

fn angeforderte_melden(session: &mut Session) -> RelayResult<()> {
    let body = PermsBody::from(session.angeforderte_masken());
    session.antworten(commands::REQ_PERMS, &body)
}

fn projekt_masken_melden(session: &mut Session) -> RelayResult<()> {
    let lpid = gebundenes_projekt(session)?;
    let masken = session.projekt_masken();
    let body = ProjPerms {
        lpid,
        publish: masken.publish,
        subscribe: masken.subscribe,
    };
    session.antworten(commands::PROJ_PERMS, &body)
}

/// set_req_perms
pub async fn handle_set_req_perms(
    session: &mut Session,
    nachricht: &Message,
    _state: &RelayState,
) -> RelayResult<()> {
    let body: PermsBody = nachricht.body_als()?;
    session.set_angeforderte_masken(PermissionPair::from(body));
    tracing::debug!(
        session = %session.id(),
        publish = %body.publish,
        subscribe = %body.subscribe,
        "Angeforderte Masken gesetzt"
    );
    angeforderte_melden(session)
}

/// get_req_perms
pub async fn handle_get_req_perms(
    session: &mut Session,
    _nachricht: &Message,
    _state: &RelayState,
) -> RelayResult<()> {
    angeforderte_melden(session)
}

/// get_proj_perms
pub async fn handle_get_proj_perms(
    session: &mut Session,
    _nachricht: &Message,
    _state: &RelayState,
) -> RelayResult<()> {
    projekt_masken_melden(session)
}

/// set_proj_perms: nur fuer den Eigentuemer (prueft das Backend)
pub async fn handle_set_proj_perms(
    session: &mut Session,
    nachricht: &Message,
    state: &RelayState,
) -> RelayResult<()> {
    let lpid = gebundenes_projekt(session)?;
    let masken = PermissionPair::from(nachricht.body_als::<PermsBody>()?);

    state.backend.set_project_permissions(session, masken).await?;
    session.set_projekt_masken(masken);
    let erreicht = state
        .broadcaster
        .projekt_masken_senden(lpid, session.id(), masken);
    tracing::debug!(session = %session.id(), lpid = %lpid, erreicht, "Projektmasken verteilt");

    projekt_masken_melden(session)
}
