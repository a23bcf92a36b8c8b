//! Reflector Server – Einstiegspunkt
//!
//! Laedt die Konfiguration, initialisiert das Logging und startet entweder
//! den Relay oder ein Verwaltungskommando.
//!
//! # Kommandos
//!
//! - ohne Kommando: Relay starten
//! - `user add|set-perms|list`: Konten verwalten
//! - `project migrate|list|gpid`: Projekte verwalten

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use reflector_core::{PermissionPair, PermissionSet};
use reflector_relay::Broadcaster;
use reflector_server::config::{BackendModus, ServerConfig};
use reflector_server::logging::logging_initialisieren;
use reflector_server::{admin, datenbank_backend, Server};

/// Reflector-Server fuer gemeinsames Reverse Engineering
#[derive(Parser)]
#[command(name = "reflector-server")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Pfad zur Konfigurationsdatei
    #[arg(
        short,
        long,
        global = true,
        env = "REFLECTOR_CONFIG",
        default_value = "reflector.toml"
    )]
    config: PathBuf,

    #[command(subcommand)]
    kommando: Option<Kommando>,
}

#[derive(Subcommand)]
enum Kommando {
    /// Konten verwalten
    #[command(subcommand)]
    User(UserKommando),
    /// Projekte verwalten
    #[command(subcommand)]
    Project(ProjectKommando),
}

/// Publish- und Subscribe-Maske als `full`, `none`, `0x…` oder Dezimalzahl
#[derive(clap::Args)]
struct MaskenArgs {
    #[arg(long, default_value = "full")]
    publish: PermissionSet,
    #[arg(long, default_value = "full")]
    subscribe: PermissionSet,
}

impl MaskenArgs {
    fn paar(&self) -> PermissionPair {
        PermissionPair::neu(self.publish, self.subscribe)
    }
}

#[derive(Subcommand)]
enum UserKommando {
    /// Legt ein Konto an
    Add {
        name: String,
        #[arg(long, env = "REFLECTOR_PASSWORD")]
        password: String,
        #[command(flatten)]
        masken: MaskenArgs,
    },
    /// Setzt die Kontomasken
    SetPerms {
        name: String,
        #[command(flatten)]
        masken: MaskenArgs,
    },
    /// Listet alle Konten
    List,
}

#[derive(Subcommand)]
enum ProjectKommando {
    /// Uebernimmt ein Projekt eines anderen Servers
    Migrate {
        /// Kontoname des Eigentuemers
        owner: String,
        /// Globale Projekt-ID
        gpid: String,
        /// Binary-Hash
        hash: String,
        #[arg(long, default_value = "")]
        desc: String,
        #[command(flatten)]
        masken: MaskenArgs,
    },
    /// Listet die Projekte zu einem Binary-Hash
    List { hash: String },
    /// Zeigt die globale ID eines lokalen Projekts
    Gpid { lpid: u32 },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Konfiguration laden (Standardwerte falls Datei fehlt)
    let (config, gefunden) = ServerConfig::laden(&cli.config)?;

    logging_initialisieren(&config.logging.level, &config.logging.format);
    if !gefunden {
        tracing::warn!(
            pfad = %cli.config.display(),
            "Konfigurationsdatei nicht gefunden, verwende Standardwerte"
        );
    }

    match cli.kommando {
        None => {
            tracing::info!(
                version = env!("CARGO_PKG_VERSION"),
                config = %cli.config.display(),
                "Reflector Server wird initialisiert"
            );
            Server::neu(config).starten().await
        }
        Some(kommando) => verwalten(&config, kommando).await,
    }
}

async fn verwalten(config: &ServerConfig, kommando: Kommando) -> Result<()> {
    if config.backend.mode != BackendModus::Database {
        anyhow::bail!("Verwaltungskommandos benoetigen [backend] mode = \"database\"");
    }
    let backend = datenbank_backend(config, Broadcaster::neu()).await?;

    let zeilen = match kommando {
        Kommando::User(UserKommando::Add {
            name,
            password,
            masken,
        }) => vec![admin::benutzer_anlegen(&backend, &name, &password, masken.paar()).await?],
        Kommando::User(UserKommando::SetPerms { name, masken }) => {
            vec![admin::benutzer_masken(&backend, &name, masken.paar()).await?]
        }
        Kommando::User(UserKommando::List) => admin::benutzer_liste(&backend).await?,
        Kommando::Project(ProjectKommando::Migrate {
            owner,
            gpid,
            hash,
            desc,
            masken,
        }) => vec![
            admin::projekt_migrieren(&backend, &owner, &gpid, &hash, &desc, masken.paar()).await?,
        ],
        Kommando::Project(ProjectKommando::List { hash }) => {
            admin::projekt_liste(&backend, &hash).await?
        }
        Kommando::Project(ProjectKommando::Gpid { lpid }) => {
            vec![admin::projekt_gpid(&backend, lpid).await?]
        }
    };

    for zeile in zeilen {
        println!("{zeile}");
    }
    Ok(())
}
