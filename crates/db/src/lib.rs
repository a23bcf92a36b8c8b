//! reflector-db – Persistenz fuer den Reflector
//!
//! Repository-Traits fuer Konten, Projekte, Update-Historien, Snapshots und
//! Server-Metadaten sowie deren SQLite-Implementierung ([`SqliteDb`]).

pub mod error;
pub mod models;
pub mod repository;
pub mod sqlite;

pub use error::DbError;
pub use repository::{
    DatabaseConfig, DbResult, ProjectRepository, ServerMetaRepository, SnapshotRepository,
    UpdateRepository, UserRepository,
};
pub use sqlite::SqliteDb;
