//! Gemeinsame Identifikationstypen fuer den Reflector
//!
//! Alle IDs verwenden das Newtype-Pattern um Verwechslungen zwischen
//! lokalen Projekt-IDs, Snapshot-IDs und Benutzer-IDs zur Compilezeit
//! auszuschliessen.

use serde::{Deserialize, Serialize};

/// Server-lokale Benutzer-ID
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub u32);

impl UserId {
    /// Benutzer, den das Debug-Backend jedem Login zuweist
    pub const BASIC: Self = Self(1);

    /// Gibt den inneren Wert zurueck
    pub fn inner(&self) -> u32 {
        self.0
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "user:{}", self.0)
    }
}

/// Server-lokale Projekt-ID (nur auf dieser Server-Instanz eindeutig)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LocalProjectId(pub u32);

impl LocalProjectId {
    /// Gibt den inneren Wert zurueck
    pub fn inner(&self) -> u32 {
        self.0
    }
}

impl std::fmt::Display for LocalProjectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "lpid:{}", self.0)
    }
}

/// Globale Projekt-ID (eindeutig ueber alle Server-Instanzen)
///
/// Eine leere globale ID bedeutet, dass das Backend keine globale
/// Zuordnung kennt (z.B. im Debug-Modus).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GlobalProjectId(pub String);

impl GlobalProjectId {
    /// Erstellt eine globale ID aus Server-Kennung und lokaler Projekt-ID
    pub fn aus_lokal(server_kennung: &str, lpid: LocalProjectId) -> Self {
        Self(format!("{}-{}", server_kennung, lpid.0))
    }

    /// Gibt `true` zurueck wenn keine globale ID vergeben ist
    pub fn ist_leer(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for GlobalProjectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Laufende Nummer eines Updates innerhalb einer Projekt-Timeline
///
/// `UpdateId(0)` steht fuer "noch kein Update empfangen".
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct UpdateId(pub u64);

impl UpdateId {
    /// Vor dem ersten Update
    pub const KEINE: Self = Self(0);

    /// Gibt die naechste Update-ID zurueck
    pub fn naechste(self) -> Self {
        Self(self.0 + 1)
    }

    pub fn inner(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for UpdateId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// ID eines Snapshots (benannter Punkt in einer Projekt-Timeline)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SnapshotId(pub u32);

impl std::fmt::Display for SnapshotId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "snapshot:{}", self.0)
    }
}

/// Prozess-lokale ID einer Client-Verbindung
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(pub u64);

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "session:{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_id_naechste() {
        assert_eq!(UpdateId::KEINE.naechste(), UpdateId(1));
        assert_eq!(UpdateId(41).naechste(), UpdateId(42));
    }

    #[test]
    fn globale_id_aus_lokaler_id() {
        let gpid = GlobalProjectId::aus_lokal("abc", LocalProjectId(7));
        assert_eq!(gpid.as_str(), "abc-7");
        assert!(!gpid.ist_leer());
        assert!(GlobalProjectId::default().ist_leer());
    }

    #[test]
    fn ids_display() {
        assert_eq!(LocalProjectId(500).to_string(), "lpid:500");
        assert_eq!(UserId(3).to_string(), "user:3");
        assert_eq!(SessionId(9).to_string(), "session:9");
    }

    #[test]
    fn ids_sind_serde_transparent() {
        let json = serde_json::to_string(&LocalProjectId(12)).unwrap();
        assert_eq!(json, "12");
        let uid: UpdateId = serde_json::from_str("99").unwrap();
        assert_eq!(uid, UpdateId(99));
    }
}
