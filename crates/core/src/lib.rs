//! reflector-core – Gemeinsame Typen, Berechtigungsmasken und Fehlertypen
//!
//! Dieses Crate stellt die fundamentalen Bausteine bereit, die von allen
//! anderen Reflector-Crates gemeinsam genutzt werden: ID-Newtypes,
//! die Publish/Subscribe-Bitmasken und den zentralen Fehler-Enum.

pub mod error;
pub mod permissions;
pub mod types;

// Re-Exporte fuer bequemen Zugriff
pub use error::{ReflectorError, Result};
pub use permissions::{Category, PermissionPair, PermissionSet};
pub use types::{GlobalProjectId, LocalProjectId, SessionId, SnapshotId, UpdateId, UserId};
