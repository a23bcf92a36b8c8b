//! Broadcaster – Verteilt Updates an die Mitglieder eines Projekts
//!
//! Jedes aktive Projekt hat eine [`ProjektGruppe`] mit den Eingangs-Queues
//! seiner Sessions. Die Session selbst gehoert ihrem Verbindungs-Task; der
//! Broadcaster kennt nur ihre Queue und ihr Mitgliedschafts-Token.
//!
//! ## Reihenfolge
//! Pro Projekt serialisiert ein asynchroner Mutex das Speichern und
//! Verteilen von Updates. Alle Empfaenger sehen die Updates eines Projekts
//! deshalb in derselben Reihenfolge wie ihre Update-IDs.
//!
//! Jedes Update wird einzeln gespeichert und sofort verteilt. Scheitert das
//! Speichern mitten im Stapel, bleiben die vorherigen Updates bestehen; der
//! Fehler nennt dann ihre Anzahl und die letzte vergebene ID.
//!
//! ## Mitgliedschaft
//! Die Mitgliederliste wird nur fuer Aenderungen und fuer die Iteration beim
//! Verteilen gesperrt, nie ueber einen Backend-Aufruf hinweg. Ein Eintrag
//! in der Queue traegt das Token der Mitgliedschaft, fuer die er erzeugt
//! wurde. Nach Verlassen oder Wechsel verwirft die Session solche Eintraege.

use dashmap::DashMap;
use parking_lot::Mutex;
use reflector_core::{LocalProjectId, PermissionPair, SessionId, UpdateId};
use reflector_protocol::control::ForkFollow;
use reflector_protocol::Message;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::backend::ProjectBackend;
use crate::error::{BackendError, BackendResult};
use crate::session::Session;

// ---------------------------------------------------------------------------
// Eingang
// ---------------------------------------------------------------------------

/// Nachricht an eine fremde Session
#[derive(Debug, Clone)]
pub enum Eingang {
    /// Update mit bereits vergebener Update-ID
    Update {
        lpid: LocalProjectId,
        token: u64,
        nachricht: Message,
    },
    /// Ein anderes Mitglied hat das Projekt geforkt
    ForkFollow {
        lpid: LocalProjectId,
        token: u64,
        angebot: ForkFollow,
    },
    /// Der Eigentuemer hat die Projektmasken geaendert
    ProjektMasken {
        lpid: LocalProjectId,
        token: u64,
        masken: PermissionPair,
    },
}

impl Eingang {
    /// Projekt und Mitgliedschaft, fuer die der Eintrag bestimmt ist
    pub fn ziel(&self) -> (LocalProjectId, u64) {
        match self {
            Self::Update { lpid, token, .. }
            | Self::ForkFollow { lpid, token, .. }
            | Self::ProjektMasken { lpid, token, .. } => (*lpid, *token),
        }
    }
}

// ---------------------------------------------------------------------------
// ProjektGruppe
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct Mitglied {
    session: SessionId,
    token: u64,
    eingang: mpsc::UnboundedSender<Eingang>,
}

/// Mitglieder und Update-Sequenzer eines Projekts
#[derive(Debug, Default)]
pub struct ProjektGruppe {
    mitglieder: Mutex<Vec<Mitglied>>,
    /// Wird ueber record_update und das Verteilen hinweg gehalten
    sequenz: tokio::sync::Mutex<()>,
}

impl ProjektGruppe {
    /// Stellt einen Eintrag an alle Mitglieder ausser `ausser` zu
    ///
    /// Gibt die Anzahl der erreichten Sessions zurueck.
    fn verteilen(&self, ausser: SessionId, mut erzeugen: impl FnMut(u64) -> Eingang) -> usize {
        let mitglieder = self.mitglieder.lock();
        let mut zugestellt = 0;
        for mitglied in mitglieder.iter().filter(|m| m.session != ausser) {
            if mitglied.eingang.send(erzeugen(mitglied.token)).is_ok() {
                zugestellt += 1;
            } else {
                tracing::debug!(session = %mitglied.session, "Eingang geschlossen (Session beendet)");
            }
        }
        zugestellt
    }

    fn ist_leer(&self) -> bool {
        self.mitglieder.lock().is_empty()
    }
}

// ---------------------------------------------------------------------------
// Broadcaster
// ---------------------------------------------------------------------------

/// Zentrale Projektgruppen aller Sessions
///
/// Thread-safe via Arc + DashMap. Clone teilt den inneren Zustand.
#[derive(Clone)]
pub struct Broadcaster {
    inner: Arc<BroadcasterInner>,
}

struct BroadcasterInner {
    gruppen: DashMap<LocalProjectId, Arc<ProjektGruppe>>,
    naechstes_token: AtomicU64,
}

impl Broadcaster {
    /// Erstellt einen neuen Broadcaster
    pub fn neu() -> Self {
        Self {
            inner: Arc::new(BroadcasterInner {
                gruppen: DashMap::new(),
                naechstes_token: AtomicU64::new(1),
            }),
        }
    }

    /// Nimmt eine Session in die Gruppe eines Projekts auf
    ///
    /// Gibt das Token der neuen Mitgliedschaft zurueck.
    pub fn beitreten(
        &self,
        lpid: LocalProjectId,
        session: SessionId,
        eingang: mpsc::UnboundedSender<Eingang>,
    ) -> u64 {
        let token = self.inner.naechstes_token.fetch_add(1, Ordering::Relaxed);
        // Der Shard-Lock des Eintrags schliesst ein gleichzeitiges Entfernen
        // der leeren Gruppe aus
        let gruppe = self.inner.gruppen.entry(lpid).or_default();
        gruppe.mitglieder.lock().push(Mitglied {
            session,
            token,
            eingang,
        });
        drop(gruppe);

        tracing::debug!(session = %session, lpid = %lpid, token, "Session Projektgruppe beigetreten");
        token
    }

    /// Entfernt eine Mitgliedschaft; leere Gruppen werden aufgeraeumt
    ///
    /// Gibt `false` zurueck wenn die Mitgliedschaft nicht (mehr) bestand.
    pub fn verlassen(&self, lpid: LocalProjectId, session: SessionId, token: u64) -> bool {
        let entfernt = match self.inner.gruppen.get(&lpid) {
            Some(gruppe) => {
                let mut mitglieder = gruppe.mitglieder.lock();
                let vorher = mitglieder.len();
                mitglieder.retain(|m| !(m.session == session && m.token == token));
                mitglieder.len() != vorher
            }
            None => false,
        };
        self.inner.gruppen.remove_if(&lpid, |_, g| g.ist_leer());

        if entfernt {
            tracing::debug!(session = %session, lpid = %lpid, "Session Projektgruppe verlassen");
        }
        entfernt
    }

    /// Anzahl der Sessions in einem Projekt
    pub fn mitglieder_anzahl(&self, lpid: LocalProjectId) -> usize {
        self.inner
            .gruppen
            .get(&lpid)
            .map(|g| g.mitglieder.lock().len())
            .unwrap_or(0)
    }

    /// Anzahl der Projekte mit mindestens einer Session
    pub fn aktive_projekte(&self) -> usize {
        self.inner.gruppen.len()
    }

    fn gruppe(&self, lpid: LocalProjectId) -> Option<Arc<ProjektGruppe>> {
        self.inner.gruppen.get(&lpid).map(|g| Arc::clone(g.value()))
    }

    // -----------------------------------------------------------------------
    // Verteilen
    // -----------------------------------------------------------------------

    /// Speichert Updates ueber das Backend und verteilt sie an alle anderen
    /// Mitglieder des Projekts
    ///
    /// Der Sequenzer des Projekts bleibt fuer den ganzen Stapel gesperrt.
    /// Der Absender erhaelt seine eigenen Updates nicht zurueck.
    pub async fn updates_veroeffentlichen(
        &self,
        backend: &dyn ProjectBackend,
        absender: &Session,
        updates: Vec<Message>,
    ) -> BackendResult<Vec<UpdateId>> {
        let lpid = absender.lpid().ok_or(BackendError::NichtGebunden)?;
        let gruppe = self.gruppe(lpid).ok_or(BackendError::NichtGebunden)?;

        let _reihenfolge = gruppe.sequenz.lock().await;
        let mut ids = Vec::with_capacity(updates.len());
        for update in updates {
            let id = match backend.record_update(absender, &update).await {
                Ok(id) => id,
                Err(ursache) => return Err(Self::abbruch(&ids, ursache)),
            };
            let nachricht = update.mit_update_id(id);
            let erreicht = gruppe.verteilen(absender.id(), |token| Eingang::Update {
                lpid,
                token,
                nachricht: nachricht.clone(),
            });
            tracing::trace!(lpid = %lpid, updateid = %id, erreicht, "Update verteilt");
            ids.push(id);
        }
        Ok(ids)
    }

    fn abbruch(ids: &[UpdateId], ursache: BackendError) -> BackendError {
        match ids.last() {
            Some(&letzte) => BackendError::StapelAbgebrochen {
                gespeichert: ids.len(),
                letzte,
                ursache: Box::new(ursache),
            },
            None => ursache,
        }
    }

    /// Bietet allen Mitgliedern von `lpid` ausser dem Ausloeser an, einem
    /// Fork zu folgen
    pub fn fork_follow_senden(
        &self,
        lpid: LocalProjectId,
        ausloeser: SessionId,
        angebot: &ForkFollow,
    ) -> usize {
        match self.gruppe(lpid) {
            Some(gruppe) => gruppe.verteilen(ausloeser, |token| Eingang::ForkFollow {
                lpid,
                token,
                angebot: angebot.clone(),
            }),
            None => 0,
        }
    }

    /// Teilt allen anderen Mitgliedern neue Projektmasken mit
    pub fn projekt_masken_senden(
        &self,
        lpid: LocalProjectId,
        ausloeser: SessionId,
        masken: PermissionPair,
    ) -> usize {
        match self.gruppe(lpid) {
            Some(gruppe) => gruppe.verteilen(ausloeser, |token| Eingang::ProjektMasken {
                lpid,
                token,
                masken,
            }),
            None => 0,
        }
    }
}

impl Default for Broadcaster {
    fn default() -> Self {
        Self::neu()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use reflector_core::{GlobalProjectId, PermissionSet};

    fn angebot() -> ForkFollow {
        ForkFollow {
            user: "alice".into(),
            lpid: LocalProjectId(2),
            gpid: GlobalProjectId("srv-2".into()),
            lastupdateid: UpdateId(4),
            desc: "fork".into(),
        }
    }

    #[test]
    fn beitreten_und_verlassen() {
        let broadcaster = Broadcaster::neu();
        let lpid = LocalProjectId(1);
        let (tx, _rx) = mpsc::unbounded_channel();

        let token = broadcaster.beitreten(lpid, SessionId(1), tx);
        assert_eq!(broadcaster.mitglieder_anzahl(lpid), 1);
        assert_eq!(broadcaster.aktive_projekte(), 1);

        assert!(broadcaster.verlassen(lpid, SessionId(1), token));
        assert_eq!(broadcaster.mitglieder_anzahl(lpid), 0);
        assert_eq!(broadcaster.aktive_projekte(), 0, "Leere Gruppe muss entfernt werden");

        // Zweites Verlassen ist ein No-op
        assert!(!broadcaster.verlassen(lpid, SessionId(1), token));
    }

    #[test]
    fn veraltetes_token_entfernt_nichts() {
        let broadcaster = Broadcaster::neu();
        let lpid = LocalProjectId(1);
        let (tx, _rx) = mpsc::unbounded_channel();

        let alt = broadcaster.beitreten(lpid, SessionId(1), tx.clone());
        assert!(broadcaster.verlassen(lpid, SessionId(1), alt));
        let neu = broadcaster.beitreten(lpid, SessionId(1), tx);
        assert_ne!(alt, neu);

        assert!(!broadcaster.verlassen(lpid, SessionId(1), alt));
        assert_eq!(broadcaster.mitglieder_anzahl(lpid), 1);
    }

    #[test]
    fn fork_follow_nicht_an_ausloeser() {
        let broadcaster = Broadcaster::neu();
        let lpid = LocalProjectId(1);
        let (tx_a, mut rx_a) = mpsc::unbounded_channel();
        let (tx_b, mut rx_b) = mpsc::unbounded_channel();

        broadcaster.beitreten(lpid, SessionId(1), tx_a);
        let token_b = broadcaster.beitreten(lpid, SessionId(2), tx_b);

        let erreicht = broadcaster.fork_follow_senden(lpid, SessionId(1), &angebot());
        assert_eq!(erreicht, 1);
        assert!(rx_a.try_recv().is_err(), "Ausloeser darf nichts empfangen");

        match rx_b.try_recv().unwrap() {
            Eingang::ForkFollow {
                lpid: ziel,
                token,
                angebot: empfangen,
            } => {
                assert_eq!(ziel, lpid);
                assert_eq!(token, token_b);
                assert_eq!(empfangen, angebot());
            }
            anderes => panic!("Unerwarteter Eingang: {anderes:?}"),
        }
    }

    #[test]
    fn projekt_masken_an_unbekanntes_projekt() {
        let broadcaster = Broadcaster::neu();
        let masken = PermissionPair::neu(PermissionSet::NONE, PermissionSet::FULL);
        assert_eq!(
            broadcaster.projekt_masken_senden(LocalProjectId(7), SessionId(1), masken),
            0
        );
    }

    #[test]
    fn geschlossene_queue_zaehlt_nicht() {
        let broadcaster = Broadcaster::neu();
        let lpid = LocalProjectId(3);
        let (tx_a, _rx_a) = mpsc::unbounded_channel();
        let (tx_b, rx_b) = mpsc::unbounded_channel();

        broadcaster.beitreten(lpid, SessionId(1), tx_a);
        broadcaster.beitreten(lpid, SessionId(2), tx_b);
        drop(rx_b);

        assert_eq!(broadcaster.fork_follow_senden(lpid, SessionId(9), &angebot()), 1);
    }
}
