//! Client-Connection – Verwaltet eine einzelne TCP-Verbindung
//!
//! Jede TCP-Verbindung bekommt eine `ClientConnection` in einem eigenen
//! tokio-Task. Der Task besitzt die [`Session`] und wartet gleichzeitig auf
//! Frames vom Client, auf den Ausgang der Session, auf ihren Eingang (Updates
//! anderer Sessions), auf Timeouts und auf das Shutdown-Signal.
//!
//! ## Ablauf
//! ```text
//! Verbunden -> auth_challenge -> Angemeldet -> Projekt gebunden
//!     |              |                |               |
//!     +--------------+---- FATAL / Trennung ----------+
//! ```
//!
//! ## Timeouts
//! - Ohne Anmeldung nach `auth_timeout`
//! - Ohne empfangenen Frame nach `idle_timeout` (falls gesetzt)
//!
//! Beide enden mit FATAL und dem Schliessen der Verbindung.

use futures_util::{SinkExt, StreamExt};
use reflector_protocol::{FrameCodec, Message};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;
use tokio_util::codec::Framed;

use crate::broadcast::Eingang;
use crate::server_state::{RelayState, Verbindungsplatz};
use crate::session::Session;

/// Wartet bis zur Frist; ohne Frist nie
async fn frist_abwarten(frist: Option<Instant>) {
    match frist {
        Some(frist) => tokio::time::sleep_until(frist).await,
        None => std::future::pending().await,
    }
}

/// Grund fuer das Ende der Verarbeitungsschleife
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Ende {
    ClientGetrennt,
    Fehler,
    Fatal,
    Shutdown,
}

/// Verarbeitet eine einzelne TCP-Verbindung
pub struct ClientConnection {
    state: Arc<RelayState>,
    peer_addr: SocketAddr,
    _platz: Option<Verbindungsplatz>,
}

impl ClientConnection {
    /// Erstellt eine neue ClientConnection
    ///
    /// Der Verbindungsplatz wird erst beim Ende der Verbindung freigegeben.
    pub fn neu(
        state: Arc<RelayState>,
        peer_addr: SocketAddr,
        platz: Option<Verbindungsplatz>,
    ) -> Self {
        Self {
            state,
            peer_addr,
            _platz: platz,
        }
    }

    /// Startet die Verbindungs-Verarbeitungsschleife
    ///
    /// Laeuft bis die Verbindung getrennt wird, die Session FATAL erhaelt
    /// oder ein Shutdown-Signal eingeht.
    pub async fn verarbeiten(self, stream: TcpStream, mut shutdown_rx: watch::Receiver<bool>) {
        let peer_addr = self.peer_addr;
        let state = Arc::clone(&self.state);
        let config = Arc::clone(&state.config);

        let mut framed = Framed::new(stream, FrameCodec::with_max_size(config.max_frame_size));
        let (ausgang_tx, mut ausgang_rx) = mpsc::unbounded_channel::<Message>();
        let (eingang_tx, mut eingang_rx) = mpsc::unbounded_channel::<Eingang>();

        let mut session = Session::neu(
            state.naechste_session_id(),
            peer_addr,
            ausgang_tx,
            eingang_tx,
            state.broadcaster.clone(),
        );
        tracing::info!(peer = %peer_addr, session = %session.id(), "Neue Verbindung");

        if let Err(e) = session.challenge_ausstellen() {
            tracing::error!(peer = %peer_addr, fehler = %e, "Challenge nicht erzeugbar");
            return;
        }

        let verbunden_seit = Instant::now();
        let mut letzter_empfang = Instant::now();

        let ende = loop {
            if session.soll_beenden() {
                break Ende::Fatal;
            }

            let leerlauf = config.idle_timeout.map(|d| letzter_empfang + d);
            let frist = if session.ist_authentifiziert() {
                leerlauf
            } else {
                let anmeldung = verbunden_seit + config.auth_timeout;
                Some(leerlauf.map_or(anmeldung, |l| l.min(anmeldung)))
            };

            tokio::select! {
                // Eingehender Frame vom Client
                frame = framed.next() => {
                    match frame {
                        Some(Ok(nachricht)) => {
                            letzter_empfang = Instant::now();
                            tracing::trace!(
                                peer = %peer_addr,
                                command = %nachricht.command,
                                "Nachricht empfangen"
                            );
                            state.dispatcher.dispatch(&mut session, nachricht, &state).await;
                        }
                        Some(Err(e)) => {
                            tracing::warn!(peer = %peer_addr, fehler = %e, "Frame-Lesefehler");
                            session.send_fatal("Malformed frame");
                            break Ende::Fehler;
                        }
                        None => {
                            tracing::info!(peer = %peer_addr, "Verbindung vom Client getrennt");
                            break Ende::ClientGetrennt;
                        }
                    }
                }

                // Antworten und zugestellte Updates
                Some(ausgehend) = ausgang_rx.recv() => {
                    if let Err(e) = framed.send(ausgehend).await {
                        tracing::warn!(peer = %peer_addr, fehler = %e, "Senden fehlgeschlagen");
                        break Ende::Fehler;
                    }
                }

                // Updates und Angebote anderer Sessions
                Some(eingang) = eingang_rx.recv() => {
                    session.eingang_verarbeiten(eingang);
                }

                // Anmelde- oder Leerlauf-Timeout
                _ = frist_abwarten(frist) => {
                    let text = if session.ist_authentifiziert() {
                        "Idle timeout"
                    } else {
                        "Authentication timeout"
                    };
                    tracing::warn!(peer = %peer_addr, grund = text, "Verbindungs-Timeout");
                    session.send_fatal(text);
                    break Ende::Fatal;
                }

                // Shutdown-Signal
                Ok(()) = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        tracing::info!(peer = %peer_addr, "Shutdown-Signal – Verbindung wird getrennt");
                        session.send_fatal("Server is shutting down");
                        break Ende::Shutdown;
                    }
                }
            }
        };

        // Ausstehende Antworten (z.B. FATAL) noch zustellen
        if ende != Ende::ClientGetrennt {
            while let Ok(ausgehend) = ausgang_rx.try_recv() {
                if framed.send(ausgehend).await.is_err() {
                    break;
                }
            }
        }

        session.terminate();
        tracing::debug!(session = %session.id(), stats = %session.dump_stats(), "Kommando-Statistik");
        tracing::info!(
            peer = %peer_addr,
            session = %session.id(),
            ende = ?ende,
            "Verbindungs-Task beendet"
        );
    }
}
