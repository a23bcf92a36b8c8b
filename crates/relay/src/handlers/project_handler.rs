//! Projekt-Handler – Anlegen, Beitreten, Snapshots, Forks, Verlassen, Liste
//!
//! Alle Kommandos erfordern eine angemeldete Session. Snapshot, Fork und
//! Leave zusaetzlich eine Projektbindung (prueft der Dispatcher).

use reflector_protocol::commands;
use reflector_protocol::control::{
    ForkReply, ProjectBound, ProjectForkRequest, ProjectJoinReply, ProjectJoinRequest,
    ProjectList, ProjectListRequest, ProjectNewRequest, ProjectRejoinRequest,
    ProjectSnapforkRequest, ProjectSnapshotRequest, SnapshotReply,
};
use reflector_protocol::Message;

use crate::backend::{Forkergebnis, Maskenwahl, Projektbindung};
use crate::error::{RelayError, RelayResult};
use crate::handlers::gebundenes_projekt;
use crate::server_state::RelayState;
use crate::session::Session;

/// Bindet die Session und meldet Projekt und effektive Masken
fn binden_und_melden(
    session: &mut Session,
    bindung: Projektbindung,
    command: &str,
) -> RelayResult<()> {
    let lpid = bindung.lpid;
    let gpid = bindung.gpid.clone();
    session.projekt_binden(bindung);

    let masken = session.effektive_masken();
    let antwort = ProjectBound {
        lpid,
        gpid,
        publish: masken.publish,
        subscribe: masken.subscribe,
    };
    session.antworten(command, &antwort)
}

/// project_new_request
pub async fn handle_new(
    session: &mut Session,
    nachricht: &Message,
    state: &RelayState,
) -> RelayResult<()> {
    let anfrage: ProjectNewRequest = nachricht.body_als()?;
    session.set_binary_hash(&anfrage.hash);

    let bindung = state
        .backend
        .add_project(session, &anfrage.hash, &anfrage.desc, anfrage.masken())
        .await?;
    tracing::info!(
        session = %session.id(),
        lpid = %bindung.lpid,
        hash = %anfrage.hash,
        "Neues Projekt"
    );
    binden_und_melden(session, bindung, commands::PROJECT_NEW_REPLY)
}

/// project_join_request
pub async fn handle_join(
    session: &mut Session,
    nachricht: &Message,
    state: &RelayState,
) -> RelayResult<()> {
    let anfrage: ProjectJoinRequest = nachricht.body_als()?;
    let bindung = state.backend.join_project(session, anfrage.lpid).await?;
    binden_und_melden(session, bindung, commands::PROJECT_JOINED)
}

/// project_rejoin_request: Beitritt mit Nachlieferung verpasster Updates
pub async fn handle_rejoin(
    session: &mut Session,
    nachricht: &Message,
    state: &RelayState,
) -> RelayResult<()> {
    let anfrage: ProjectRejoinRequest = nachricht.body_als()?;
    let bindung = state.backend.join_project(session, anfrage.lpid).await?;
    binden_und_melden(session, bindung, commands::PROJECT_JOINED)?;

    let nachgeliefert = state
        .backend
        .send_latest_updates(session, anfrage.lastupdateid)
        .await?;
    tracing::debug!(
        session = %session.id(),
        lpid = %anfrage.lpid,
        nach = %anfrage.lastupdateid,
        nachgeliefert,
        "Rejoin"
    );
    Ok(())
}

/// project_snapshot_request
pub async fn handle_snapshot(
    session: &mut Session,
    nachricht: &Message,
    state: &RelayState,
) -> RelayResult<()> {
    let anfrage: ProjectSnapshotRequest = nachricht.body_als()?;
    let snapshot_id = state
        .backend
        .snap_project(session, anfrage.lastupdateid, &anfrage.desc)
        .await?;

    let antwort = SnapshotReply {
        snapshot_id,
        lastupdateid: anfrage.lastupdateid,
    };
    session.antworten(commands::PROJECT_SNAPSHOT_REPLY, &antwort)
}

/// project_fork_request
pub async fn handle_fork(
    session: &mut Session,
    nachricht: &Message,
    state: &RelayState,
) -> RelayResult<()> {
    let anfrage: ProjectForkRequest = nachricht.body_als()?;
    let wahl = Maskenwahl {
        publish: anfrage.publish,
        subscribe: anfrage.subscribe,
    };
    let ergebnis = state
        .backend
        .fork_project(session, anfrage.lastupdateid, &anfrage.desc, wahl)
        .await?;
    fork_abschliessen(session, state, ergebnis, &anfrage.desc).await
}

/// project_snapshotfork_request
pub async fn handle_snapfork(
    session: &mut Session,
    nachricht: &Message,
    state: &RelayState,
) -> RelayResult<()> {
    let anfrage: ProjectSnapforkRequest = nachricht.body_als()?;
    let wahl = Maskenwahl {
        publish: anfrage.publish,
        subscribe: anfrage.subscribe,
    };
    let ergebnis = state
        .backend
        .snapfork_project(session, anfrage.snapshot_id, &anfrage.desc, wahl)
        .await?;
    fork_abschliessen(session, state, ergebnis, &anfrage.desc).await
}

/// Verschiebt den Ausloeser in den Fork und benachrichtigt die Quelle
async fn fork_abschliessen(
    session: &mut Session,
    state: &RelayState,
    ergebnis: Forkergebnis,
    beschreibung: &str,
) -> RelayResult<()> {
    let antwort = ForkReply {
        lpid: ergebnis.bindung.lpid,
        gpid: ergebnis.bindung.gpid.clone(),
        lastupdateid: ergebnis.stand,
    };
    session.projekt_binden(ergebnis.bindung);
    session.antworten(commands::PROJECT_FORK_REPLY, &antwort)?;

    let benachrichtigt = state
        .backend
        .send_fork_follows(session, ergebnis.quelle, ergebnis.stand, beschreibung)
        .await?;
    tracing::info!(
        session = %session.id(),
        quelle = %ergebnis.quelle,
        lpid = %antwort.lpid,
        benachrichtigt,
        "Fork abgeschlossen"
    );
    Ok(())
}

/// project_join_reply: Antwort auf ein Fork-Follow-Angebot
pub async fn handle_join_reply(
    session: &mut Session,
    nachricht: &Message,
    state: &RelayState,
) -> RelayResult<()> {
    let antwort: ProjectJoinReply = nachricht.body_als()?;
    let Some(angebot) = session.fork_angebot_nehmen() else {
        return Err(RelayError::protokoll("No fork-follow offer pending"));
    };

    if !antwort.accept {
        tracing::debug!(session = %session.id(), lpid = %angebot.lpid, "Fork-Follow abgelehnt");
        return Ok(());
    }

    let bindung = state.backend.join_project(session, angebot.lpid).await?;
    binden_und_melden(session, bindung, commands::PROJECT_JOINED)
}

/// project_leave
pub async fn handle_leave(
    session: &mut Session,
    _nachricht: &Message,
    _state: &RelayState,
) -> RelayResult<()> {
    let lpid = gebundenes_projekt(session)?;
    session.projekt_verlassen();
    tracing::debug!(session = %session.id(), lpid = %lpid, "Projekt verlassen");

    session.send_control(Message::neu(commands::PROJECT_LEFT).mit_feld("lpid", lpid.inner()));
    Ok(())
}

/// project_list: Projekte und Snapshots zum Binary-Hash
///
/// Ohne `hash` im Body gilt der zuletzt von der Session gemeldete Hash.
pub async fn handle_list(
    session: &mut Session,
    nachricht: &Message,
    state: &RelayState,
) -> RelayResult<()> {
    let anfrage: ProjectListRequest = nachricht.body_als()?;
    if let Some(hash) = &anfrage.hash {
        session.set_binary_hash(hash);
    }
    let hash = session.binary_hash().to_string();

    let projekte = state.backend.project_list(&hash).await?;
    let snapshots = state.backend.snapshot_list(&hash).await?;

    let antwort = ProjectList {
        projects: projekte.into_iter().map(Into::into).collect(),
        snapshots: snapshots.into_iter().map(Into::into).collect(),
    };
    session.antworten(commands::PROJECT_LIST, &antwort)
}
