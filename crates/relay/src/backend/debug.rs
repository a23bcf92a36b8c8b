//! Debug-Backend – reines Relay ohne Persistenz
//!
//! Jeder Login gelingt als Basis-Benutzer mit vollen Rechten. Projekte
//! bekommen fortlaufende lokale IDs ab 500 und keine globale ID. Updates
//! werden nummeriert und geloggt, aber nicht gespeichert; alles, was eine
//! Historie braucht, schlaegt mit einem festen Text fehl.

use async_trait::async_trait;
use dashmap::DashMap;
use reflector_auth::Challenge;
use reflector_core::{
    GlobalProjectId, LocalProjectId, PermissionPair, SnapshotId, UpdateId, UserId,
};
use reflector_protocol::Message;
use tokio::sync::Mutex;

use crate::backend::{Forkergebnis, Maskenwahl, ProjectBackend, ProjectInfo, Projektbindung, SnapshotInfo};
use crate::error::{debug_texte, BackendError, BackendResult};
use crate::session::Session;

/// Erste lokale Projekt-ID im Debug-Modus
pub const ERSTE_DEBUG_LPID: u32 = 500;

pub struct DebugBackend {
    naechste_lpid: Mutex<u32>,
    /// Letzte vergebene Update-ID pro Projekt
    zaehler: DashMap<LocalProjectId, UpdateId>,
}

impl DebugBackend {
    pub fn neu() -> Self {
        Self {
            naechste_lpid: Mutex::new(ERSTE_DEBUG_LPID),
            zaehler: DashMap::new(),
        }
    }
}

impl Default for DebugBackend {
    fn default() -> Self {
        Self::neu()
    }
}

fn nicht_verfuegbar<T>(text: &'static str) -> BackendResult<T> {
    Err(BackendError::DebugModus(text))
}

#[async_trait]
impl ProjectBackend for DebugBackend {
    fn name(&self) -> &'static str {
        "debug"
    }

    async fn authenticate(
        &self,
        session: &mut Session,
        username: &str,
        _challenge: &Challenge,
        _antwort: &str,
    ) -> BackendResult<Option<UserId>> {
        session.set_konto_masken(PermissionPair::FULL);
        session.set_angeforderte_masken(PermissionPair::FULL);
        tracing::debug!(user = %username, "Debug-Login ohne Pruefung");
        Ok(Some(UserId::BASIC))
    }

    async fn project_info(&self, _lpid: LocalProjectId) -> BackendResult<Option<ProjectInfo>> {
        Ok(None)
    }

    async fn project_list(&self, _hash: &str) -> BackendResult<Vec<ProjectInfo>> {
        Ok(Vec::new())
    }

    async fn snapshot_list(&self, _hash: &str) -> BackendResult<Vec<SnapshotInfo>> {
        Ok(Vec::new())
    }

    async fn join_project(
        &self,
        _session: &Session,
        lpid: LocalProjectId,
    ) -> BackendResult<Projektbindung> {
        Ok(Projektbindung {
            lpid,
            gpid: GlobalProjectId::default(),
            masken: PermissionPair::FULL,
        })
    }

    async fn snap_project(
        &self,
        _session: &Session,
        _bis: UpdateId,
        _beschreibung: &str,
    ) -> BackendResult<SnapshotId> {
        nicht_verfuegbar(debug_texte::SNAPSHOT)
    }

    async fn fork_project(
        &self,
        _session: &Session,
        _bis: UpdateId,
        _beschreibung: &str,
        _masken: Maskenwahl,
    ) -> BackendResult<Forkergebnis> {
        nicht_verfuegbar(debug_texte::FORK)
    }

    async fn snapfork_project(
        &self,
        _session: &Session,
        _snapshot: SnapshotId,
        _beschreibung: &str,
        _masken: Maskenwahl,
    ) -> BackendResult<Forkergebnis> {
        nicht_verfuegbar(debug_texte::SNAPFORK)
    }

    async fn send_fork_follows(
        &self,
        _ausloeser: &Session,
        _alt: LocalProjectId,
        _bis: UpdateId,
        _beschreibung: &str,
    ) -> BackendResult<usize> {
        nicht_verfuegbar(debug_texte::FORK_FOLLOW)
    }

    async fn send_latest_updates(
        &self,
        _session: &mut Session,
        _nach: UpdateId,
    ) -> BackendResult<usize> {
        nicht_verfuegbar(debug_texte::UPDATES)
    }

    async fn add_project(
        &self,
        session: &Session,
        hash: &str,
        _beschreibung: &str,
        masken: PermissionPair,
    ) -> BackendResult<Projektbindung> {
        let lpid = {
            let mut naechste = self.naechste_lpid.lock().await;
            let lpid = LocalProjectId(*naechste);
            *naechste += 1;
            lpid
        };
        tracing::info!(session = %session.id(), lpid = %lpid, hash = %hash, "Debug-Projekt angelegt");
        Ok(Projektbindung {
            lpid,
            gpid: GlobalProjectId::default(),
            masken,
        })
    }

    async fn migrate_project(
        &self,
        owner: &str,
        gpid: &GlobalProjectId,
        _hash: &str,
        _beschreibung: &str,
        _masken: PermissionPair,
    ) -> BackendResult<LocalProjectId> {
        tracing::error!(owner = %owner, gpid = %gpid, "Projektmigration im Debug-Modus nicht moeglich");
        nicht_verfuegbar(debug_texte::MIGRATION)
    }

    async fn lpid2gpid(&self, _lpid: LocalProjectId) -> BackendResult<GlobalProjectId> {
        Ok(GlobalProjectId::default())
    }

    async fn record_update(&self, session: &Session, update: &Message) -> BackendResult<UpdateId> {
        let lpid = session.lpid().ok_or(BackendError::NichtGebunden)?;
        let id = {
            let mut letzte = self.zaehler.entry(lpid).or_default();
            *letzte = letzte.naechste();
            *letzte
        };
        tracing::info!(
            lpid = %lpid,
            updateid = %id,
            user = %session.username(),
            command = %update.command,
            "Update (nicht gespeichert)"
        );
        Ok(id)
    }

    async fn set_project_permissions(
        &self,
        _session: &Session,
        _masken: PermissionPair,
    ) -> BackendResult<()> {
        nicht_verfuegbar(debug_texte::PROJEKT_MASKEN)
    }
}
