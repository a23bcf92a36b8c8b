//! HMAC-MD5 Challenge/Response
//!
//! ```text
//! schluessel = MD5(passwort)                 (16 Bytes, hex gespeichert)
//! antwort    = HMAC-MD5(schluessel, challenge)
//! ```
//!
//! Das Passwort verlaesst den Client nie; der Server kennt nur den Schluessel.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use hmac::{Hmac, Mac};
use md5::{Digest, Md5};

use crate::challenge::Challenge;
use crate::error::{AuthError, AuthResult};

type HmacMd5 = Hmac<Md5>;

const SCHLUESSEL_LAENGE: usize = 16;

/// Schluessel fuer unbekannte Benutzer, damit die Pruefung gleich viel
/// Arbeit macht wie bei existierenden Konten
const PLATZHALTER_SCHLUESSEL: [u8; SCHLUESSEL_LAENGE] = [0x5a; SCHLUESSEL_LAENGE];

/// Leitet den gespeicherten Passwort-Schluessel ab (hex MD5)
pub fn passwort_schluessel(passwort: &str) -> String {
    Md5::digest(passwort.as_bytes())
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect()
}

fn schluessel_dekodieren(hex: &str) -> AuthResult<[u8; SCHLUESSEL_LAENGE]> {
    if hex.len() != SCHLUESSEL_LAENGE * 2 {
        return Err(AuthError::UngueltigerSchluessel);
    }
    let mut schluessel = [0u8; SCHLUESSEL_LAENGE];
    for (i, byte) in schluessel.iter_mut().enumerate() {
        let paar = hex
            .get(i * 2..i * 2 + 2)
            .ok_or(AuthError::UngueltigerSchluessel)?;
        *byte = u8::from_str_radix(paar, 16).map_err(|_| AuthError::UngueltigerSchluessel)?;
    }
    Ok(schluessel)
}

fn mac_erstellen(schluessel: &[u8], challenge: &Challenge) -> AuthResult<HmacMd5> {
    let mut mac = <HmacMd5 as Mac>::new_from_slice(schluessel)
        .map_err(|_| AuthError::UngueltigerSchluessel)?;
    mac.update(challenge.as_bytes());
    Ok(mac)
}

/// Berechnet die Antwort eines Clients (Base64)
pub fn antwort_berechnen(passwort: &str, challenge: &Challenge) -> AuthResult<String> {
    let schluessel = Md5::digest(passwort.as_bytes());
    let tag = mac_erstellen(&schluessel, challenge)?.finalize().into_bytes();
    Ok(STANDARD.encode(tag))
}

/// Prueft eine Antwort gegen einen gespeicherten hex-Schluessel
///
/// Der Vergleich laeuft in konstanter Zeit.
pub fn antwort_pruefen(schluessel_hex: &str, challenge: &Challenge, antwort: &str) -> AuthResult<bool> {
    let schluessel = schluessel_dekodieren(schluessel_hex)?;
    let antwort = STANDARD.decode(antwort)?;
    Ok(mac_erstellen(&schluessel, challenge)?
        .verify_slice(&antwort)
        .is_ok())
}

/// Pruefung eines Login-Versuchs mit identischem Ablauf fuer bekannte und
/// unbekannte Benutzernamen
#[derive(Debug)]
pub struct Anmeldepruefung<'a> {
    /// Gespeicherter Schluessel, `None` wenn das Konto nicht existiert
    pub schluessel_hex: Option<&'a str>,
    pub challenge: &'a Challenge,
    pub antwort: &'a str,
}

impl Anmeldepruefung<'_> {
    /// Gibt `true` nur zurueck, wenn das Konto existiert und die Antwort stimmt
    pub fn erfolgreich(&self) -> bool {
        let schluessel = self
            .schluessel_hex
            .and_then(|hex| schluessel_dekodieren(hex).ok());
        let konto_gueltig = schluessel.is_some();
        let schluessel = schluessel.unwrap_or(PLATZHALTER_SCHLUESSEL);

        let antwort = STANDARD.decode(self.antwort).unwrap_or_default();
        let antwort_gueltig = mac_erstellen(&schluessel, self.challenge)
            .map(|mac| mac.verify_slice(&antwort).is_ok())
            .unwrap_or(false);

        konto_gueltig & antwort_gueltig
    }
}
