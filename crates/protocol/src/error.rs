//! Fehlertypen beim Auswerten von Nachrichten-Bodies

use thiserror::Error;

pub type ProtocolResult<T> = std::result::Result<T, ProtocolError>;

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("Fehlerhafte Nachricht '{command}': {grund}")]
    UngueltigerBody { command: String, grund: String },

    #[error("Body muss ein JSON-Objekt sein")]
    KeinObjekt,

    #[error("JSON-Fehler: {0}")]
    Json(#[from] serde_json::Error),
}
