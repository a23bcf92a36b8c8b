//! Gemeinsamer Server-Zustand fuer das Relay
//!
//! Haelt Konfiguration, Backend, Broadcaster und Dispatcher als geteilte
//! Referenzen, die sicher zwischen tokio-Tasks verwendet werden koennen.

use reflector_core::SessionId;
use reflector_protocol::wire::DEFAULT_MAX_FRAME_SIZE;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::backend::ProjectBackend;
use crate::broadcast::Broadcaster;
use crate::dispatcher::MessageDispatcher;

/// Konfiguration fuer das Relay
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Anzeigename des Servers (nur Logs)
    pub server_name: String,
    /// Maximale gleichzeitige Verbindungen
    pub max_clients: usize,
    /// Maximale Frame-Groesse in Bytes
    pub max_frame_size: usize,
    /// Zeit bis zur Anmeldung, danach FATAL
    pub auth_timeout: Duration,
    /// Zeit ohne empfangenen Frame, danach FATAL; `None` schaltet ab
    pub idle_timeout: Option<Duration>,
    /// Fehlversuche bis FATAL
    pub max_auth_failures: u32,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            server_name: "Reflector".to_string(),
            max_clients: 256,
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
            auth_timeout: Duration::from_secs(60),
            idle_timeout: None,
            max_auth_failures: 3,
        }
    }
}

/// Gemeinsamer Relay-Zustand (thread-safe, Arc-geteilt)
pub struct RelayState {
    pub config: Arc<RelayConfig>,
    pub backend: Arc<dyn ProjectBackend>,
    pub broadcaster: Broadcaster,
    pub dispatcher: MessageDispatcher,
    naechste_session: AtomicU64,
    verbindungen: Arc<AtomicUsize>,
    /// Startzeitpunkt des Servers (fuer Uptime-Berechnung)
    pub start_time: Instant,
}

impl RelayState {
    /// Erstellt einen neuen RelayState
    ///
    /// `broadcaster` muss derselbe sein, den das Backend verwendet.
    pub fn neu(
        config: RelayConfig,
        backend: Arc<dyn ProjectBackend>,
        broadcaster: Broadcaster,
    ) -> Arc<Self> {
        tracing::info!(backend = backend.name(), server = %config.server_name, "Relay-Zustand erstellt");
        Arc::new(Self {
            config: Arc::new(config),
            backend,
            broadcaster,
            dispatcher: MessageDispatcher::neu(),
            naechste_session: AtomicU64::new(1),
            verbindungen: Arc::new(AtomicUsize::new(0)),
            start_time: Instant::now(),
        })
    }

    /// Vergibt eine neue, prozessweit eindeutige Session-ID
    pub fn naechste_session_id(&self) -> SessionId {
        SessionId(self.naechste_session.fetch_add(1, Ordering::Relaxed))
    }

    /// Reserviert einen Verbindungsplatz; `None` wenn der Server voll ist
    pub fn platz_reservieren(&self) -> Option<Verbindungsplatz> {
        let max = self.config.max_clients;
        self.verbindungen
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                (n < max).then_some(n + 1)
            })
            .ok()
            .map(|_| Verbindungsplatz {
                zaehler: Arc::clone(&self.verbindungen),
            })
    }

    /// Anzahl der offenen Verbindungen
    pub fn verbindungen(&self) -> usize {
        self.verbindungen.load(Ordering::Acquire)
    }

    /// Gibt die Uptime in Sekunden zurueck
    pub fn uptime_sek(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}

/// Belegter Verbindungsplatz, wird beim Drop freigegeben
#[derive(Debug)]
pub struct Verbindungsplatz {
    zaehler: Arc<AtomicUsize>,
}

impl Drop for Verbindungsplatz {
    fn drop(&mut self) {
        self.zaehler.fetch_sub(1, Ordering::AcqRel);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::DebugBackend;

    #[test]
    fn verbindungsplaetze_begrenzt() {
        let config = RelayConfig {
            max_clients: 2,
            ..RelayConfig::default()
        };
        let state = RelayState::neu(config, Arc::new(DebugBackend::neu()), Broadcaster::neu());

        let a = state.platz_reservieren().unwrap();
        let _b = state.platz_reservieren().unwrap();
        assert!(state.platz_reservieren().is_none(), "Server ist voll");
        assert_eq!(state.verbindungen(), 2);

        drop(a);
        assert_eq!(state.verbindungen(), 1);
        assert!(state.platz_reservieren().is_some());
    }

    #[test]
    fn session_ids_eindeutig() {
        let state = RelayState::neu(
            RelayConfig::default(),
            Arc::new(DebugBackend::neu()),
            Broadcaster::neu(),
        );
        assert_ne!(state.naechste_session_id(), state.naechste_session_id());
    }
}
