//! Projekt-Backends
//!
//! Ein [`ProjectBackend`] entscheidet, was mit Konten, Projekten, Updates
//! und Snapshots passiert. Das Relay haelt genau eine Instanz als
//! `Arc<dyn ProjectBackend>`, ausgewaehlt beim Start:
//!
//! - [`DebugBackend`]: speichert nichts, jeder Login gelingt
//! - [`DatabaseBackend`]: Konten und Historien in SQLite

pub mod database;
pub mod debug;

use async_trait::async_trait;
use reflector_auth::Challenge;
use reflector_core::{
    GlobalProjectId, LocalProjectId, PermissionPair, PermissionSet, SnapshotId, UpdateId, UserId,
};
use reflector_protocol::control::{ProjectEntry, SnapshotEntry};
use reflector_protocol::Message;

use crate::error::BackendResult;
use crate::session::Session;

pub use database::DatabaseBackend;
pub use debug::DebugBackend;

// ---------------------------------------------------------------------------
// Hilfstypen
// ---------------------------------------------------------------------------

/// Ergebnis eines erfolgreichen Beitritts oder Anlegens
#[derive(Debug, Clone, PartialEq)]
pub struct Projektbindung {
    pub lpid: LocalProjectId,
    pub gpid: GlobalProjectId,
    /// Projektmasken
    pub masken: PermissionPair,
}

/// Ergebnis eines Forks
#[derive(Debug, Clone, PartialEq)]
pub struct Forkergebnis {
    pub bindung: Projektbindung,
    /// Projekt, von dem abgezweigt wurde
    pub quelle: LocalProjectId,
    /// Letztes uebernommenes Update
    pub stand: UpdateId,
}

/// Vom Client gewuenschte Masken fuer einen Fork
///
/// Fehlende Masken werden vom Elternprojekt geerbt.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Maskenwahl {
    pub publish: Option<PermissionSet>,
    pub subscribe: Option<PermissionSet>,
}

impl Maskenwahl {
    pub fn aufloesen(self, eltern: PermissionPair) -> PermissionPair {
        PermissionPair::neu(
            self.publish.unwrap_or(eltern.publish),
            self.subscribe.unwrap_or(eltern.subscribe),
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProjectInfo {
    pub lpid: LocalProjectId,
    pub gpid: GlobalProjectId,
    pub hash: String,
    pub beschreibung: String,
    pub owner: String,
    pub parent: Option<LocalProjectId>,
    pub forked_at: Option<UpdateId>,
    pub masken: PermissionPair,
}

impl From<ProjectInfo> for ProjectEntry {
    fn from(p: ProjectInfo) -> Self {
        Self {
            lpid: p.lpid,
            gpid: p.gpid,
            hash: p.hash,
            desc: p.beschreibung,
            owner: p.owner,
            parent: p.parent,
            forked_at: p.forked_at,
            publish: p.masken.publish,
            subscribe: p.masken.subscribe,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SnapshotInfo {
    pub id: SnapshotId,
    pub lpid: LocalProjectId,
    pub updateid: UpdateId,
    pub beschreibung: String,
}

impl From<SnapshotInfo> for SnapshotEntry {
    fn from(s: SnapshotInfo) -> Self {
        Self {
            snapshot_id: s.id,
            lpid: s.lpid,
            updateid: s.updateid,
            desc: s.beschreibung,
        }
    }
}

// ---------------------------------------------------------------------------
// ProjectBackend
// ---------------------------------------------------------------------------

/// Vertrag zwischen Relay und Projektverwaltung
///
/// Alle Methoden werden von vielen Verbindungs-Tasks gleichzeitig
/// aufgerufen. Fehler tragen einen fuer den Client bestimmten Text.
#[async_trait]
pub trait ProjectBackend: Send + Sync {
    /// Kurzname fuer Logs ("debug", "database")
    fn name(&self) -> &'static str;

    /// Prueft eine Challenge-Antwort
    ///
    /// Bei Erfolg setzt das Backend die Kontomasken der Session und gibt die
    /// Benutzer-ID zurueck; `None` bedeutet ungueltige Anmeldedaten.
    async fn authenticate(
        &self,
        session: &mut Session,
        username: &str,
        challenge: &Challenge,
        antwort: &str,
    ) -> BackendResult<Option<UserId>>;

    async fn project_info(&self, lpid: LocalProjectId) -> BackendResult<Option<ProjectInfo>>;

    /// Projekte zu einem Binary-Hash
    async fn project_list(&self, hash: &str) -> BackendResult<Vec<ProjectInfo>>;

    /// Snapshots aller Projekte zu einem Binary-Hash
    async fn snapshot_list(&self, hash: &str) -> BackendResult<Vec<SnapshotInfo>>;

    /// Prueft den Zugriff auf ein bestehendes Projekt
    async fn join_project(
        &self,
        session: &Session,
        lpid: LocalProjectId,
    ) -> BackendResult<Projektbindung>;

    /// Legt einen Snapshot des gebundenen Projekts bei `bis` an
    async fn snap_project(
        &self,
        session: &Session,
        bis: UpdateId,
        beschreibung: &str,
    ) -> BackendResult<SnapshotId>;

    /// Forkt das gebundene Projekt mit den Updates `1..=bis`
    async fn fork_project(
        &self,
        session: &Session,
        bis: UpdateId,
        beschreibung: &str,
        masken: Maskenwahl,
    ) -> BackendResult<Forkergebnis>;

    /// Forkt das Projekt eines Snapshots am Stand des Snapshots
    async fn snapfork_project(
        &self,
        session: &Session,
        snapshot: SnapshotId,
        beschreibung: &str,
        masken: Maskenwahl,
    ) -> BackendResult<Forkergebnis>;

    /// Bietet den uebrigen Mitgliedern von `alt` an, dem Fork des Ausloesers
    /// zu folgen
    ///
    /// Der Ausloeser muss bereits an das neue Projekt gebunden sein.
    /// Gibt die Anzahl der benachrichtigten Sessions zurueck.
    async fn send_fork_follows(
        &self,
        ausloeser: &Session,
        alt: LocalProjectId,
        bis: UpdateId,
        beschreibung: &str,
    ) -> BackendResult<usize>;

    /// Stellt alle Updates nach `nach` des gebundenen Projekts zu
    async fn send_latest_updates(
        &self,
        session: &mut Session,
        nach: UpdateId,
    ) -> BackendResult<usize>;

    /// Legt ein neues Projekt mit der Session als Eigentuemer an
    async fn add_project(
        &self,
        session: &Session,
        hash: &str,
        beschreibung: &str,
        masken: PermissionPair,
    ) -> BackendResult<Projektbindung>;

    /// Uebernimmt ein Projekt mit vorgegebener globaler ID
    async fn migrate_project(
        &self,
        owner: &str,
        gpid: &GlobalProjectId,
        hash: &str,
        beschreibung: &str,
        masken: PermissionPair,
    ) -> BackendResult<LocalProjectId>;

    async fn lpid2gpid(&self, lpid: LocalProjectId) -> BackendResult<GlobalProjectId>;

    /// Speichert ein Update des gebundenen Projekts und vergibt seine ID
    async fn record_update(&self, session: &Session, update: &Message) -> BackendResult<UpdateId>;

    /// Setzt die Projektmasken des gebundenen Projekts
    async fn set_project_permissions(
        &self,
        session: &Session,
        masken: PermissionPair,
    ) -> BackendResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use reflector_core::Category;

    #[test]
    fn maskenwahl_erbt_fehlende_masken() {
        let eltern = PermissionPair::neu(
            PermissionSet::FULL.ohne(Category::Rename),
            PermissionSet::NONE,
        );

        assert_eq!(Maskenwahl::default().aufloesen(eltern), eltern);

        let wahl = Maskenwahl {
            publish: None,
            subscribe: Some(PermissionSet::FULL),
        };
        let masken = wahl.aufloesen(eltern);
        assert_eq!(masken.publish, eltern.publish);
        assert_eq!(masken.subscribe, PermissionSet::FULL);
    }
}
