//! reflector-auth – Challenge/Response-Authentifizierung
//!
//! Dieses Crate implementiert:
//! - Challenge-Erzeugung (32 Zufallsbytes pro Verbindungsversuch)
//! - Passwort-Schluessel (hex MD5 des Passworts, so in der Datenbank abgelegt)
//! - HMAC-MD5-Antwortpruefung mit gleichem Aufwand fuer bekannte und
//!   unbekannte Benutzer

pub mod challenge;
pub mod chap;
pub mod error;

pub use challenge::{Challenge, CHALLENGE_SIZE};
pub use chap::{antwort_berechnen, antwort_pruefen, passwort_schluessel, Anmeldepruefung};
pub use error::{AuthError, AuthResult};
