//! Fehlertypen fuer das Relay
//!
//! Die `Display`-Texte von [`BackendError`] und den Handler-Varianten von
//! [`RelayError`] gehen unveraendert als ERROR- bzw. FATAL-Text an den
//! Client und sind deshalb englisch.

use reflector_core::{GlobalProjectId, LocalProjectId, SnapshotId, UpdateId};
use reflector_db::DbError;
use reflector_protocol::ProtocolError;
use thiserror::Error;

/// Fehlertyp fuer Verbindungen, Dispatcher und Handler
#[derive(Debug, Error)]
pub enum RelayError {
    /// IO-Fehler (TCP, Socket)
    #[error("IO-Fehler: {0}")]
    Io(#[from] std::io::Error),

    /// Anfrage passt nicht zum Protokoll oder zum Session-Zustand
    #[error("{0}")]
    Protokoll(String),

    /// Fehlende Anmeldung oder Berechtigung
    #[error("{0}")]
    ZugriffVerweigert(String),

    /// Fehler, nach dem die Verbindung geschlossen wird
    #[error("{0}")]
    Fatal(String),

    /// Vom Backend abgelehnte Operation
    #[error(transparent)]
    Backend(#[from] BackendError),

    /// Interner Fehler
    #[error("Internal error: {0}")]
    Intern(String),
}

impl RelayError {
    /// Erstellt einen internen Fehler
    pub fn intern(msg: impl Into<String>) -> Self {
        Self::Intern(msg.into())
    }

    /// Erstellt einen Protokollfehler
    pub fn protokoll(msg: impl Into<String>) -> Self {
        Self::Protokoll(msg.into())
    }

    pub fn zugriff(msg: impl Into<String>) -> Self {
        Self::ZugriffVerweigert(msg.into())
    }

    pub fn fatal(msg: impl Into<String>) -> Self {
        Self::Fatal(msg.into())
    }

    /// Gibt true zurueck wenn die Session danach beendet werden muss
    pub fn ist_fatal(&self) -> bool {
        matches!(self, Self::Fatal(_))
    }
}

impl From<ProtocolError> for RelayError {
    fn from(e: ProtocolError) -> Self {
        Self::Protokoll(e.to_string())
    }
}

/// Result-Typ fuer das Relay
pub type RelayResult<T> = Result<T, RelayError>;

// ---------------------------------------------------------------------------
// Backend
// ---------------------------------------------------------------------------

/// Texte des Debug-Backends fuer nicht unterstuetzte Operationen
pub mod debug_texte {
    pub const SNAPSHOT: &str = "snapshots cannot be made";
    pub const FORK: &str = "forking is not available";
    pub const SNAPFORK: &str = "forking snapshots is not available";
    pub const FORK_FOLLOW: &str = "follow forking is not available";
    pub const UPDATES: &str = "updates to date are not stored";
    pub const MIGRATION: &str = "project migration is not available";
    pub const PROJEKT_MASKEN: &str = "project permissions cannot be changed";
}

/// Fehler eines [`crate::ProjectBackend`]
#[derive(Debug, Error)]
pub enum BackendError {
    /// Operation wird im Debug-Modus nicht unterstuetzt
    #[error("Server is in debug mode, {0}")]
    DebugModus(&'static str),

    #[error("Not authenticated")]
    NichtAngemeldet,

    #[error("Not joined to a project")]
    NichtGebunden,

    #[error("Project {0} does not exist")]
    ProjektUnbekannt(LocalProjectId),

    #[error("Access to project {0} denied")]
    KeinZugriff(LocalProjectId),

    #[error("{0} does not exist")]
    SnapshotUnbekannt(SnapshotId),

    #[error("Update {angefordert} is beyond the last update {aktuell}")]
    UpdateJenseits {
        angefordert: UpdateId,
        aktuell: UpdateId,
    },

    #[error("Only the project owner may change project permissions")]
    NurEigentuemer,

    #[error("Unknown user '{0}'")]
    BenutzerUnbekannt(String),

    #[error("Global project id '{0}' already exists")]
    GpidVorhanden(GlobalProjectId),

    /// Speicherfehler; Details werden nur geloggt
    #[error("Storage failure")]
    Datenbank(#[from] DbError),

    /// Ein Update-Stapel brach nach `gespeichert` verteilten Updates ab
    #[error("Batch aborted after {gespeichert} stored updates (last updateid {letzte}): {ursache}")]
    StapelAbgebrochen {
        gespeichert: usize,
        letzte: UpdateId,
        ursache: Box<BackendError>,
    },
}

impl BackendError {
    /// Gibt true zurueck wenn ein Speicherfehler vorliegt
    pub fn ist_speicherfehler(&self) -> bool {
        match self {
            Self::Datenbank(_) => true,
            Self::StapelAbgebrochen { ursache, .. } => ursache.ist_speicherfehler(),
            _ => false,
        }
    }
}

/// Result-Typ fuer Backend-Operationen
pub type BackendResult<T> = Result<T, BackendError>;
