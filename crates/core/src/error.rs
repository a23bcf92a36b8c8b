//! Fehlertypen fuer den Reflector
//!
//! Zentraler Fehler-Enum fuer Werte, die in mehreren Crates geparst oder
//! validiert werden. Untermodule definieren eigene Fehler und konvertieren
//! bei Bedarf via `#[from]`.

use thiserror::Error;

/// Globaler Result-Alias fuer den Reflector
pub type Result<T> = std::result::Result<T, ReflectorError>;

/// Gemeinsame Fehler im Reflector-System
#[derive(Debug, Error)]
pub enum ReflectorError {
    #[error("Ungueltige Berechtigungsmaske: {0}")]
    UngueltigeMaske(String),

    #[error("Ungueltige Projekt-ID: {0}")]
    UngueltigeProjektId(String),

    #[error("Konfigurationsfehler: {0}")]
    Konfiguration(String),

    #[error("Interner Fehler: {0}")]
    Intern(String),
}

impl ReflectorError {
    /// Erstellt einen internen Fehler aus einer beliebigen Nachricht
    pub fn intern(msg: impl Into<String>) -> Self {
        Self::Intern(msg.into())
    }
}
