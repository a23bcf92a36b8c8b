//! reflector-server – Bibliotheks-Root
//!
//! Deklariert alle Server-Module und stellt den oeffentlichen Einstiegspunkt
//! fuer Integrationstests bereit.

pub mod admin;
pub mod config;
pub mod logging;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use config::{BackendModus, ServerConfig};
use reflector_db::SqliteDb;
use reflector_relay::{
    Broadcaster, DatabaseBackend, DebugBackend, ProjectBackend, RelayServer, RelayState,
};
use tokio::sync::watch;

/// Wartezeit, in der Verbindungen nach dem Shutdown ihr FATAL zustellen
const ABSCHLUSS_FRIST: Duration = Duration::from_secs(2);

/// Oeffnet die Datenbank fuer das Datenbank-Backend
pub async fn datenbank_backend(
    config: &ServerConfig,
    broadcaster: Broadcaster,
) -> Result<DatabaseBackend> {
    let db = SqliteDb::oeffnen(&config.datenbank_config())
        .await
        .with_context(|| format!("Datenbank '{}' nicht geoeffnet", config.backend.url))?;
    Ok(DatabaseBackend::neu(db, broadcaster))
}

/// Haelt den laufenden Server-Zustand zusammen
pub struct Server {
    pub config: ServerConfig,
}

impl Server {
    /// Erstellt einen neuen Server aus der gegebenen Konfiguration
    pub fn neu(config: ServerConfig) -> Self {
        Self { config }
    }

    async fn backend_erstellen(&self, broadcaster: &Broadcaster) -> Result<Arc<dyn ProjectBackend>> {
        Ok(match self.config.backend.mode {
            BackendModus::Debug => {
                tracing::warn!("Debug-Backend aktiv: keine Konten, keine Historien");
                Arc::new(DebugBackend::neu())
            }
            BackendModus::Database => {
                Arc::new(datenbank_backend(&self.config, broadcaster.clone()).await?)
            }
        })
    }

    /// Startet den Relay und laeuft bis zum Shutdown-Signal
    ///
    /// Reihenfolge:
    /// 1. Backend erstellen (ggf. Datenbank oeffnen und migrieren)
    /// 2. TCP-Listener starten
    /// 3. Auf Ctrl-C warten, dann alle Verbindungen mit FATAL schliessen
    pub async fn starten(self) -> Result<()> {
        let bind_addr = self.config.bind_adresse()?;
        tracing::info!(
            server_name = %self.config.server.name,
            adresse = %bind_addr,
            backend = ?self.config.backend.mode,
            "Server startet"
        );

        let broadcaster = Broadcaster::neu();
        let backend = self.backend_erstellen(&broadcaster).await?;
        let state = RelayState::neu(self.config.relay_config(), backend, broadcaster);

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    tracing::info!("Shutdown-Signal empfangen, Server wird beendet");
                    let _ = shutdown_tx.send(true);
                }
                Err(e) => tracing::error!(fehler = %e, "Signal-Handler fehlgeschlagen"),
            }
        });

        let server = RelayServer::neu(Arc::clone(&state), bind_addr);
        server
            .starten(shutdown_rx)
            .await
            .with_context(|| format!("Listener auf {bind_addr} fehlgeschlagen"))?;

        verbindungen_abwarten(&state).await;
        tracing::info!(uptime_sek = state.uptime_sek(), "Server beendet");
        Ok(())
    }
}

/// Wartet bis alle Verbindungs-Tasks beendet sind, hoechstens `ABSCHLUSS_FRIST`
async fn verbindungen_abwarten(state: &RelayState) {
    let ende = tokio::time::Instant::now() + ABSCHLUSS_FRIST;
    while state.verbindungen() > 0 && tokio::time::Instant::now() < ende {
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    let offen = state.verbindungen();
    if offen > 0 {
        tracing::warn!(offen, "Verbindungen nach Frist noch offen");
    }
}
