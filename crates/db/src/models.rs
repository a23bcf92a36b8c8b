//! Datenbankmodelle fuer den Reflector
//!
//! Diese Typen repraesentieren Datensaetze aus der Datenbank.
//! Sie sind von den Protokoll-Typen getrennt und dienen als reine
//! Datenuebertragungsobjekte.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};

use reflector_core::{
    GlobalProjectId, LocalProjectId, PermissionPair, SnapshotId, UpdateId, UserId,
};

// ---------------------------------------------------------------------------
// Benutzer
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct BenutzerRecord {
    pub id: UserId,
    pub username: String,
    /// hex MD5 des Passworts
    pub pwkey: String,
    pub masken: PermissionPair,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NeuerBenutzer<'a> {
    pub username: &'a str,
    pub pwkey: &'a str,
    pub masken: PermissionPair,
}

// ---------------------------------------------------------------------------
// Projekte
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProjektRecord {
    pub lpid: LocalProjectId,
    pub gpid: GlobalProjectId,
    pub hash: String,
    pub beschreibung: String,
    pub owner: UserId,
    pub owner_name: String,
    pub parent: Option<LocalProjectId>,
    pub forked_at: Option<UpdateId>,
    pub masken: PermissionPair,
    pub created_at: DateTime<Utc>,
}

/// Daten zum Anlegen eines Projekts
///
/// Ohne `gpid` wird die globale ID aus Server-Kennung und lokaler ID
/// gebildet.
#[derive(Debug, Clone)]
pub struct NeuesProjekt<'a> {
    pub gpid: Option<&'a GlobalProjectId>,
    pub hash: &'a str,
    pub beschreibung: &'a str,
    pub owner: UserId,
    pub masken: PermissionPair,
}

/// Herkunft eines Forks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ForkQuelle {
    pub lpid: LocalProjectId,
    /// Letztes uebernommenes Update (inklusive)
    pub bis: UpdateId,
}

// ---------------------------------------------------------------------------
// Updates
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UpdateRecord {
    pub lpid: LocalProjectId,
    pub updateid: UpdateId,
    pub userid: UserId,
    pub command: String,
    pub payload: Map<String, Value>,
}

// ---------------------------------------------------------------------------
// Snapshots
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SnapshotRecord {
    pub id: SnapshotId,
    pub lpid: LocalProjectId,
    pub updateid: UpdateId,
    pub beschreibung: String,
    pub owner: UserId,
    pub created_at: DateTime<Utc>,
}
