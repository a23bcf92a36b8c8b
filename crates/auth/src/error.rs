//! Fehlertypen fuer die Authentifizierung

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Ungueltige Base64-Kodierung: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("Gespeicherter Passwort-Schluessel ist ungueltig")]
    UngueltigerSchluessel,

    #[error("Challenge hat falsche Laenge: {0} Bytes")]
    ChallengeLaenge(usize),
}

/// Result-Alias fuer die Authentifizierung
pub type AuthResult<T> = Result<T, AuthError>;
