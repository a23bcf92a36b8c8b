//! Handler fuer alle Client-Kommandos
//!
//! Jeder Handler bekommt die Session, die empfangene Nachricht und den
//! gemeinsamen [`RelayState`](crate::RelayState). Antworten schreibt er
//! selbst in den Ausgang der Session; ein `Err` macht der Dispatcher zu
//! ERROR oder FATAL.

pub mod auth_handler;
pub mod permission_handler;
pub mod project_handler;
pub mod update_handler;

use reflector_core::LocalProjectId;

use crate::error::{RelayError, RelayResult};
use crate::session::Session;

/// Projekt der Session oder Protokollfehler
pub(crate) fn gebundenes_projekt(session: &Session) -> RelayResult<LocalProjectId> {
    session
        .lpid()
        .ok_or_else(|| RelayError::protokoll("Not joined to a project"))
}
