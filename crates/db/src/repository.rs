//! Repository-Trait-Definitionen
//!
//! Das Repository-Pattern entkoppelt die Projektverwaltung des Relays von
//! der konkreten Datenbank. [`crate::SqliteDb`] implementiert alle Traits.

use serde_json::{Map, Value};

use reflector_core::{
    GlobalProjectId, LocalProjectId, PermissionPair, SnapshotId, UpdateId, UserId,
};

use crate::error::DbError;
use crate::models::{
    BenutzerRecord, ForkQuelle, NeuerBenutzer, NeuesProjekt, ProjektRecord, SnapshotRecord,
    UpdateRecord,
};

/// Result-Alias fuer Datenbankoperationen
pub type DbResult<T> = Result<T, DbError>;

/// Konfiguration fuer die Datenbankverbindung
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// Verbindungs-URL (z.B. "sqlite://reflector.db")
    pub url: String,
    /// Maximale Anzahl gleichzeitiger Verbindungen im Pool
    pub max_verbindungen: u32,
    /// Ob WAL-Modus bei SQLite aktiviert werden soll
    pub sqlite_wal: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://reflector.db".into(),
            max_verbindungen: 5,
            sqlite_wal: true,
        }
    }
}

// ---------------------------------------------------------------------------
// Benutzer
// ---------------------------------------------------------------------------

#[allow(async_fn_in_trait)]
pub trait UserRepository: Send + Sync {
    async fn create_user(&self, data: NeuerBenutzer<'_>) -> DbResult<BenutzerRecord>;

    async fn get_user(&self, id: UserId) -> DbResult<Option<BenutzerRecord>>;

    async fn get_user_by_name(&self, username: &str) -> DbResult<Option<BenutzerRecord>>;

    /// Setzt die Kontomasken; `false` wenn der Benutzer nicht existiert
    async fn set_user_permissions(&self, username: &str, masken: PermissionPair)
        -> DbResult<bool>;

    /// Alle Benutzer sortiert nach Name
    async fn list_users(&self) -> DbResult<Vec<BenutzerRecord>>;
}

// ---------------------------------------------------------------------------
// Projekte
// ---------------------------------------------------------------------------

#[allow(async_fn_in_trait)]
pub trait ProjectRepository: Send + Sync {
    /// Legt ein Projekt an und vergibt lokale und ggf. globale ID
    async fn create_project(&self, data: NeuesProjekt<'_>) -> DbResult<ProjektRecord>;

    /// Legt ein Projekt an und kopiert die Updates `1..=quelle.bis` der Quelle
    ///
    /// Beides geschieht in einer Transaktion.
    async fn fork_project(&self, data: NeuesProjekt<'_>, quelle: ForkQuelle)
        -> DbResult<ProjektRecord>;

    async fn get_project(&self, lpid: LocalProjectId) -> DbResult<Option<ProjektRecord>>;

    async fn get_project_by_gpid(&self, gpid: &GlobalProjectId)
        -> DbResult<Option<ProjektRecord>>;

    /// Projekte zu einem Binary-Hash, aufsteigend nach lokaler ID
    async fn list_projects(&self, hash: &str) -> DbResult<Vec<ProjektRecord>>;

    async fn set_project_permissions(
        &self,
        lpid: LocalProjectId,
        masken: PermissionPair,
    ) -> DbResult<bool>;
}

// ---------------------------------------------------------------------------
// Updates
// ---------------------------------------------------------------------------

#[allow(async_fn_in_trait)]
pub trait UpdateRepository: Send + Sync {
    /// Haengt ein Update an und gibt seine neue ID zurueck
    async fn append_update(
        &self,
        lpid: LocalProjectId,
        userid: UserId,
        command: &str,
        payload: &Map<String, Value>,
    ) -> DbResult<UpdateId>;

    /// Hoechste vergebene Update-ID, [`UpdateId::KEINE`] fuer leere Projekte
    async fn last_update_id(&self, lpid: LocalProjectId) -> DbResult<UpdateId>;

    /// Alle Updates nach `nach`, aufsteigend sortiert
    async fn updates_since(&self, lpid: LocalProjectId, nach: UpdateId)
        -> DbResult<Vec<UpdateRecord>>;
}

// ---------------------------------------------------------------------------
// Snapshots
// ---------------------------------------------------------------------------

#[allow(async_fn_in_trait)]
pub trait SnapshotRepository: Send + Sync {
    async fn create_snapshot(
        &self,
        lpid: LocalProjectId,
        updateid: UpdateId,
        beschreibung: &str,
        owner: UserId,
    ) -> DbResult<SnapshotRecord>;

    async fn get_snapshot(&self, id: SnapshotId) -> DbResult<Option<SnapshotRecord>>;

    /// Snapshots aller Projekte zu einem Binary-Hash
    async fn list_snapshots(&self, hash: &str) -> DbResult<Vec<SnapshotRecord>>;
}

// ---------------------------------------------------------------------------
// Server-Metadaten
// ---------------------------------------------------------------------------

#[allow(async_fn_in_trait)]
pub trait ServerMetaRepository: Send + Sync {
    /// Dauerhafte Kennung dieser Server-Instanz (beim ersten Aufruf erzeugt)
    async fn server_kennung(&self) -> DbResult<String>;
}
