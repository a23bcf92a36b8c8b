//! Server-Konfiguration
//!
//! Wird beim Start aus einer TOML-Datei geladen. Alle Felder haben
//! sinnvolle Standardwerte, sodass der Server ohne Konfigurationsdatei
//! im Debug-Modus lauffaehig ist.

use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use reflector_db::DatabaseConfig;
use reflector_protocol::wire::DEFAULT_MAX_FRAME_SIZE;
use reflector_relay::RelayConfig;
use serde::{Deserialize, Serialize};

use crate::logging::{log_format_gueltig, log_level_gueltig};

/// Vollstaendige Server-Konfiguration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Allgemeine Server-Einstellungen
    pub server: ServerEinstellungen,
    /// Netzwerk-Einstellungen
    pub network: NetzwerkEinstellungen,
    /// Projekt-Backend
    pub backend: BackendEinstellungen,
    /// Zeitlimits und Anmeldung
    pub session: SessionEinstellungen,
    /// Logging-Einstellungen
    pub logging: LoggingEinstellungen,
}

/// Allgemeine Server-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerEinstellungen {
    /// Anzeigename des Servers
    pub name: String,
    /// Maximale Anzahl gleichzeitiger Clients
    pub max_clients: usize,
}

impl Default for ServerEinstellungen {
    fn default() -> Self {
        Self {
            name: "Reflector".into(),
            max_clients: 256,
        }
    }
}

/// Netzwerk-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetzwerkEinstellungen {
    /// Bind-Adresse fuer das Client-Protokoll
    pub bind: String,
    pub port: u16,
    /// Maximale Frame-Groesse in Bytes
    pub max_frame_size: usize,
}

impl Default for NetzwerkEinstellungen {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".into(),
            port: 5042,
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
        }
    }
}

/// Auswahl des Projekt-Backends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendModus {
    /// Keine Persistenz, jeder Login gelingt
    #[default]
    Debug,
    /// SQLite mit Konten und Historien
    Database,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendEinstellungen {
    pub mode: BackendModus,
    /// Verbindungs-URL der Datenbank
    pub url: String,
    /// Maximale Verbindungspool-Groesse
    pub max_connections: u32,
}

impl Default for BackendEinstellungen {
    fn default() -> Self {
        Self {
            mode: BackendModus::Debug,
            url: "sqlite://reflector.db".into(),
            max_connections: 5,
        }
    }
}

/// Zeitlimits einer Verbindung
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionEinstellungen {
    /// Sekunden bis zur Anmeldung
    pub auth_timeout_secs: u64,
    /// Sekunden ohne empfangenen Frame, 0 schaltet ab
    pub idle_timeout_secs: u64,
    /// Fehlversuche bis FATAL
    pub max_auth_failures: u32,
}

impl Default for SessionEinstellungen {
    fn default() -> Self {
        Self {
            auth_timeout_secs: 60,
            idle_timeout_secs: 0,
            max_auth_failures: 3,
        }
    }
}

/// Logging-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingEinstellungen {
    /// Log-Level: "trace", "debug", "info", "warn", "error"
    pub level: String,
    /// Format: "json" oder "text"
    pub format: String,
}

impl Default for LoggingEinstellungen {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "text".into(),
        }
    }
}

impl ServerConfig {
    /// Laedt die Konfiguration aus einer TOML-Datei.
    /// Gibt die Standardkonfiguration zurueck wenn die Datei nicht existiert.
    ///
    /// Das Logging ist hier noch nicht initialisiert; eine fehlende Datei wird
    /// deshalb ueber den Rueckgabewert gemeldet.
    pub fn laden(pfad: &Path) -> anyhow::Result<(Self, bool)> {
        match std::fs::read_to_string(pfad) {
            Ok(inhalt) => {
                let config: Self = toml::from_str(&inhalt).with_context(|| {
                    format!("Konfigurationsfehler in '{}'", pfad.display())
                })?;
                config.pruefen()?;
                Ok((config, true))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok((Self::default(), false)),
            Err(e) => Err(anyhow::anyhow!(
                "Konfigurationsdatei '{}' nicht lesbar: {e}",
                pfad.display()
            )),
        }
    }

    /// Prueft Werte, die serde allein nicht abfangen kann
    pub fn pruefen(&self) -> anyhow::Result<()> {
        if !log_level_gueltig(&self.logging.level) {
            anyhow::bail!("Ungueltiges Log-Level '{}'", self.logging.level);
        }
        if !log_format_gueltig(&self.logging.format) {
            anyhow::bail!("Ungueltiges Log-Format '{}'", self.logging.format);
        }
        if self.server.max_clients == 0 {
            anyhow::bail!("max_clients muss groesser als 0 sein");
        }
        if self.session.max_auth_failures == 0 {
            anyhow::bail!("max_auth_failures muss groesser als 0 sein");
        }
        Ok(())
    }

    /// Gibt die vollstaendige Bind-Adresse zurueck
    pub fn bind_adresse(&self) -> anyhow::Result<SocketAddr> {
        let text = format!("{}:{}", self.network.bind, self.network.port);
        text.parse()
            .with_context(|| format!("Ungueltige Bind-Adresse '{text}'"))
    }

    /// Relay-Konfiguration aus den Abschnitten [server], [network], [session]
    pub fn relay_config(&self) -> RelayConfig {
        let idle = self.session.idle_timeout_secs;
        RelayConfig {
            server_name: self.server.name.clone(),
            max_clients: self.server.max_clients,
            max_frame_size: self.network.max_frame_size,
            auth_timeout: Duration::from_secs(self.session.auth_timeout_secs),
            idle_timeout: (idle > 0).then(|| Duration::from_secs(idle)),
            max_auth_failures: self.session.max_auth_failures,
        }
    }

    pub fn datenbank_config(&self) -> DatabaseConfig {
        DatabaseConfig {
            url: self.backend.url.clone(),
            max_verbindungen: self.backend.max_connections,
            ..DatabaseConfig::default()
        }
    }
}
