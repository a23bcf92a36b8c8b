//! SQLite-Implementierungen aller Repository-Traits

pub mod meta;
pub mod pool;
pub mod projects;
pub mod snapshots;
pub mod updates;
pub mod users;

pub use pool::SqliteDb;

use chrono::{DateTime, Utc};
use reflector_core::{PermissionSet, UpdateId};

use crate::error::DbError;
use crate::repository::DbResult;

// Masken werden bitweise als INTEGER (i64) abgelegt
pub(crate) fn maske_schreiben(maske: PermissionSet) -> i64 {
    maske.bits() as i64
}

pub(crate) fn maske_lesen(wert: i64) -> PermissionSet {
    PermissionSet::from_bits(wert as u64)
}

pub(crate) fn zeit_lesen(feld: &str, wert: &str) -> DbResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(wert)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| DbError::intern(format!("Ungueltige {feld} '{wert}': {e}")))
}

pub(crate) fn id_lesen(feld: &str, wert: i64) -> DbResult<u32> {
    u32::try_from(wert)
        .map_err(|_| DbError::UngueltigeDaten(format!("{feld} ausserhalb des Wertebereichs: {wert}")))
}

/// Update-IDs liegen als INTEGER (i64); groessere Werte kann keine Zeile haben
pub(crate) fn update_id_schreiben(feld: &str, id: UpdateId) -> DbResult<i64> {
    i64::try_from(id.inner())
        .map_err(|_| DbError::UngueltigeDaten(format!("{feld} ausserhalb des Wertebereichs: {id}")))
}
