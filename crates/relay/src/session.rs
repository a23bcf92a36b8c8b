//! Session – Zustand einer einzelnen Client-Verbindung
//!
//! Die Session gehoert dem Verbindungs-Task. Andere Sessions erreichen sie
//! nur ueber ihren Eingang (siehe [`crate::broadcast`]); Antworten und
//! weitergeleitete Updates landen in ihrem Ausgang, den der Task auf den
//! Socket schreibt.
//!
//! ## Masken
//! ```text
//! effektiv = konto ∩ angefordert ∩ projekt
//! ```
//! Die effektiven Masken werden nach jeder Aenderung einer der drei
//! Eingangsmasken neu berechnet. Ohne Projekt gilt die Projektmaske als voll.

use reflector_auth::Challenge;
use reflector_core::{
    Category, GlobalProjectId, LocalProjectId, PermissionPair, SessionId, UpdateId, UserId,
};
use reflector_protocol::commands;
use reflector_protocol::control::{AuthChallenge, ForkFollow, ProjPerms};
use reflector_protocol::Message;
use serde::Serialize;
use std::collections::BTreeMap;
use std::net::SocketAddr;
use tokio::sync::mpsc;

use crate::backend::Projektbindung;
use crate::broadcast::{Broadcaster, Eingang};
use crate::error::RelayResult;

// ---------------------------------------------------------------------------
// Hilfstypen
// ---------------------------------------------------------------------------

/// Richtung einer Berechtigungspruefung
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Richtung {
    /// Client sendet ein Update
    Publish,
    /// Client empfaengt ein Update
    Subscribe,
}

/// Ergebnis von [`Session::check_permission`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pruefung {
    Erlaubt,
    Verweigert(Category),
    /// Kommando gehoert zu keiner Kategorie
    UnbekanntesKommando,
}

/// Aktuelle Projektbindung der Session
#[derive(Debug, Clone)]
struct Mitgliedschaft {
    lpid: LocalProjectId,
    gpid: GlobalProjectId,
    token: u64,
    /// Hoechste bereits zugestellte Update-ID
    stand: Option<UpdateId>,
}

#[derive(Debug, Default, Clone, Copy)]
struct Zaehler {
    empfangen: u64,
    gesendet: u64,
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

pub struct Session {
    id: SessionId,
    peer_addr: SocketAddr,
    user_id: Option<UserId>,
    username: String,
    binary_hash: String,
    projekt: Option<Mitgliedschaft>,

    konto: PermissionPair,
    angefordert: PermissionPair,
    projekt_masken: PermissionPair,
    effektiv: PermissionPair,

    /// Ausstehende Challenge, wird genau einmal verbraucht
    challenge: Option<Challenge>,
    fehlversuche: u32,
    fork_angebot: Option<ForkFollow>,

    stats: BTreeMap<String, Zaehler>,
    ausgang: Option<mpsc::UnboundedSender<Message>>,
    eingang: mpsc::UnboundedSender<Eingang>,
    broadcaster: Broadcaster,
    /// FATAL wurde gesendet, der Task schliesst die Verbindung
    beenden: bool,
    beendet: bool,
}

impl Session {
    pub fn neu(
        id: SessionId,
        peer_addr: SocketAddr,
        ausgang: mpsc::UnboundedSender<Message>,
        eingang: mpsc::UnboundedSender<Eingang>,
        broadcaster: Broadcaster,
    ) -> Self {
        Self {
            id,
            peer_addr,
            user_id: None,
            username: String::new(),
            binary_hash: String::new(),
            projekt: None,
            konto: PermissionPair::NONE,
            angefordert: PermissionPair::FULL,
            projekt_masken: PermissionPair::FULL,
            effektiv: PermissionPair::NONE,
            challenge: None,
            fehlversuche: 0,
            fork_angebot: None,
            stats: BTreeMap::new(),
            ausgang: Some(ausgang),
            eingang,
            broadcaster,
            beenden: false,
            beendet: false,
        }
    }

    // -----------------------------------------------------------------------
    // Identitaet
    // -----------------------------------------------------------------------

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    pub fn user_id(&self) -> Option<UserId> {
        self.user_id
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn ist_authentifiziert(&self) -> bool {
        self.user_id.is_some()
    }

    /// Markiert die Session als angemeldet
    pub fn anmelden(&mut self, user_id: UserId, username: &str) {
        self.user_id = Some(user_id);
        self.username = username.to_string();
        self.fehlversuche = 0;
    }

    pub fn binary_hash(&self) -> &str {
        &self.binary_hash
    }

    pub fn set_binary_hash(&mut self, hash: &str) {
        self.binary_hash = hash.to_string();
    }

    // -----------------------------------------------------------------------
    // Handshake
    // -----------------------------------------------------------------------

    /// Erzeugt eine neue Challenge und sendet sie an den Client
    pub fn challenge_ausstellen(&mut self) -> RelayResult<()> {
        let challenge = Challenge::generieren();
        let body = AuthChallenge {
            challenge: challenge.als_base64(),
        };
        self.challenge = Some(challenge);
        self.antworten(commands::AUTH_CHALLENGE, &body)
    }

    /// Entnimmt die ausstehende Challenge
    pub fn challenge_nehmen(&mut self) -> Option<Challenge> {
        self.challenge.take()
    }

    /// Zaehlt einen Fehlversuch und gibt die neue Anzahl zurueck
    pub fn fehlversuch_zaehlen(&mut self) -> u32 {
        self.fehlversuche += 1;
        self.fehlversuche
    }

    // -----------------------------------------------------------------------
    // Projekt
    // -----------------------------------------------------------------------

    pub fn lpid(&self) -> Option<LocalProjectId> {
        self.projekt.as_ref().map(|p| p.lpid)
    }

    pub fn gpid(&self) -> Option<&GlobalProjectId> {
        self.projekt.as_ref().map(|p| &p.gpid)
    }

    /// Bindet die Session an ein Projekt
    ///
    /// Eine bestehende Bindung wird vorher aufgehoben. Ein offenes
    /// Fork-Follow-Angebot verfaellt.
    pub fn projekt_binden(&mut self, bindung: Projektbindung) {
        self.projekt_verlassen();
        let token = self
            .broadcaster
            .beitreten(bindung.lpid, self.id, self.eingang.clone());
        tracing::debug!(session = %self.id, lpid = %bindung.lpid, "Projekt gebunden");
        self.projekt = Some(Mitgliedschaft {
            lpid: bindung.lpid,
            gpid: bindung.gpid,
            token,
            stand: None,
        });
        self.fork_angebot = None;
        self.set_projekt_masken(bindung.masken);
    }

    /// Hebt die Projektbindung auf; No-op ohne Bindung
    pub fn projekt_verlassen(&mut self) -> Option<LocalProjectId> {
        let projekt = self.projekt.take()?;
        self.broadcaster.verlassen(projekt.lpid, self.id, projekt.token);
        self.set_projekt_masken(PermissionPair::FULL);
        Some(projekt.lpid)
    }

    pub fn fork_angebot_setzen(&mut self, angebot: ForkFollow) {
        self.fork_angebot = Some(angebot);
    }

    pub fn fork_angebot_nehmen(&mut self) -> Option<ForkFollow> {
        self.fork_angebot.take()
    }

    // -----------------------------------------------------------------------
    // Masken
    // -----------------------------------------------------------------------

    pub fn konto_masken(&self) -> PermissionPair {
        self.konto
    }

    pub fn set_konto_masken(&mut self, masken: PermissionPair) {
        self.konto = masken;
        self.effektiv_berechnen();
    }

    pub fn angeforderte_masken(&self) -> PermissionPair {
        self.angefordert
    }

    pub fn set_angeforderte_masken(&mut self, masken: PermissionPair) {
        self.angefordert = masken;
        self.effektiv_berechnen();
    }

    pub fn projekt_masken(&self) -> PermissionPair {
        self.projekt_masken
    }

    pub fn set_projekt_masken(&mut self, masken: PermissionPair) {
        self.projekt_masken = masken;
        self.effektiv_berechnen();
    }

    pub fn effektive_masken(&self) -> PermissionPair {
        self.effektiv
    }

    fn effektiv_berechnen(&mut self) {
        self.effektiv = self
            .konto
            .intersect(self.angefordert)
            .intersect(self.projekt_masken);
        tracing::trace!(
            session = %self.id,
            publish = %self.effektiv.publish,
            subscribe = %self.effektiv.subscribe,
            "Effektive Masken berechnet"
        );
    }

    /// Prueft ob ein Kommando in der gegebenen Richtung erlaubt ist
    pub fn check_permission(&self, kommando: &str, richtung: Richtung) -> Pruefung {
        let Some(kategorie) = Category::aus_kommando(kommando) else {
            return Pruefung::UnbekanntesKommando;
        };
        let maske = match richtung {
            Richtung::Publish => self.effektiv.publish,
            Richtung::Subscribe => self.effektiv.subscribe,
        };
        if maske.has_capability(kategorie) {
            Pruefung::Erlaubt
        } else {
            Pruefung::Verweigert(kategorie)
        }
    }

    // -----------------------------------------------------------------------
    // Senden
    // -----------------------------------------------------------------------

    /// Stellt ein Update zu, sofern die Subscribe-Maske es erlaubt
    ///
    /// Gibt `true` zurueck wenn das Update in den Ausgang gelangt ist.
    /// Updates mit einer ID, die nicht ueber dem bisherigen Stand liegt,
    /// werden verworfen (Nachlieferung und Live-Verteilung ueberlappen).
    pub fn post(&mut self, update: Message) -> bool {
        if let (Some(id), Some(projekt)) = (update.update_id(), self.projekt.as_mut()) {
            if projekt.stand.is_some_and(|stand| id <= stand) {
                tracing::trace!(session = %self.id, updateid = %id, "Update bereits zugestellt");
                return false;
            }
            projekt.stand = Some(id);
        }
        match self.check_permission(&update.command, Richtung::Subscribe) {
            Pruefung::Erlaubt => self.senden(update),
            Pruefung::Verweigert(kategorie) => {
                tracing::trace!(
                    session = %self.id,
                    command = %update.command,
                    kategorie = %kategorie,
                    "Update durch Subscribe-Maske gefiltert"
                );
                false
            }
            Pruefung::UnbekanntesKommando => {
                tracing::warn!(
                    session = %self.id,
                    command = %update.command,
                    "Update ohne Kategorie verworfen"
                );
                false
            }
        }
    }

    /// Sendet eine Control-Nachricht ohne Filterung
    pub fn send_control(&mut self, nachricht: Message) -> bool {
        self.senden(nachricht)
    }

    /// Serialisiert einen Body und sendet ihn als Control-Nachricht
    pub fn antworten<T: Serialize>(&mut self, command: &str, body: &T) -> RelayResult<()> {
        let nachricht = Message::mit_body(command, body)?;
        self.send_control(nachricht);
        Ok(())
    }

    pub fn send_error(&mut self, text: &str) -> bool {
        tracing::debug!(session = %self.id, fehler = %text, "ERROR an Client");
        self.senden(Message::error(text))
    }

    /// Sendet FATAL; der Verbindungs-Task beendet die Session danach
    pub fn send_fatal(&mut self, text: &str) -> bool {
        tracing::warn!(session = %self.id, peer = %self.peer_addr, fehler = %text, "FATAL an Client");
        self.beenden = true;
        self.senden(Message::fatal(text))
    }

    pub fn soll_beenden(&self) -> bool {
        self.beenden
    }

    fn senden(&mut self, nachricht: Message) -> bool {
        let Some(ausgang) = self.ausgang.as_ref() else {
            return false;
        };
        self.stats
            .entry(nachricht.command.clone())
            .or_default()
            .gesendet += 1;
        ausgang.send(nachricht).is_ok()
    }

    // -----------------------------------------------------------------------
    // Eingang
    // -----------------------------------------------------------------------

    /// Verarbeitet einen Eintrag aus dem Eingang
    ///
    /// Eintraege fuer eine fruehere Mitgliedschaft werden verworfen.
    pub fn eingang_verarbeiten(&mut self, eingang: Eingang) -> bool {
        let aktuell = self.projekt.as_ref().map(|p| (p.lpid, p.token));
        if aktuell != Some(eingang.ziel()) {
            tracing::trace!(session = %self.id, "Veralteter Eingang verworfen");
            return false;
        }

        match eingang {
            Eingang::Update { nachricht, .. } => self.post(nachricht),
            Eingang::ForkFollow { angebot, .. } => match Message::fork_follow(&angebot) {
                Ok(nachricht) => {
                    self.fork_angebot = Some(angebot);
                    self.send_control(nachricht)
                }
                Err(e) => {
                    tracing::warn!(session = %self.id, fehler = %e, "Fork-Follow nicht serialisierbar");
                    false
                }
            },
            Eingang::ProjektMasken { lpid, masken, .. } => {
                self.set_projekt_masken(masken);
                let body = ProjPerms {
                    lpid,
                    publish: masken.publish,
                    subscribe: masken.subscribe,
                };
                self.antworten(commands::PROJ_PERMS, &body).is_ok()
            }
        }
    }

    // -----------------------------------------------------------------------
    // Statistik und Ende
    // -----------------------------------------------------------------------

    /// Zaehlt ein empfangenes Kommando
    pub fn empfangen_zaehlen(&mut self, command: &str) {
        self.stats.entry(command.to_string()).or_default().empfangen += 1;
    }

    /// Zaehler pro Kommando in lesbarer Form
    pub fn dump_stats(&self) -> String {
        self.stats
            .iter()
            .map(|(command, z)| format!("{command}: {}/{}", z.empfangen, z.gesendet))
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Beendet die Session: verlaesst das Projekt und schliesst den Ausgang
    ///
    /// Mehrfache Aufrufe sind wirkungslos.
    pub fn terminate(&mut self) {
        if self.beendet {
            return;
        }
        self.beendet = true;
        self.projekt_verlassen();
        self.ausgang = None;
        self.challenge = None;
        self.fork_angebot = None;
        tracing::debug!(
            session = %self.id,
            user = %self.username,
            stats = %self.dump_stats(),
            "Session beendet"
        );
    }

    pub fn ist_beendet(&self) -> bool {
        self.beendet
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.terminate();
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("peer_addr", &self.peer_addr)
            .field("user_id", &self.user_id)
            .field("lpid", &self.lpid())
            .field("effektiv", &self.effektiv)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
