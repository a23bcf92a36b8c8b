//! reflector-relay – TCP-Relay fuer gemeinsame Reverse-Engineering-Projekte
//!
//! Dieser Crate nimmt Client-Verbindungen an, authentifiziert sie per
//! Challenge/Response, bindet sie an Projekte und verteilt die Updates
//! eines Clients an alle anderen Mitglieder desselben Projekts. Was mit
//! Projekten und Updates dauerhaft passiert, entscheidet ein
//! austauschbares [`ProjectBackend`].
//!
//! ## Architektur
//!
//! ```text
//! TCP Listener (RelayServer)
//!     |
//!     v
//! ClientConnection (pro Verbindung ein Task, besitzt die Session)
//!     |  Frames -> MessageDispatcher -> Handler
//!     |  Eingang <- Broadcaster (Updates anderer Sessions)
//!     |
//!     v
//! MessageDispatcher
//!     |
//!     +-- AuthHandler        (auth_request)
//!     +-- ProjectHandler     (new, join, rejoin, snapshot, fork, leave, list)
//!     +-- UpdateHandler      (send_updates)
//!     +-- PermissionHandler  (req_perms, proj_perms)
//!
//! Broadcaster     – Projektgruppen, Reihenfolge und Fan-out von Updates
//! ProjectBackend  – DebugBackend (nur Relay) oder DatabaseBackend (SQLite)
//! ```

pub mod backend;
pub mod broadcast;
pub mod connection;
pub mod dispatcher;
pub mod error;
pub mod handlers;
pub mod server_state;
pub mod session;
pub mod tcp;

// Bequeme Re-Exporte
pub use backend::{DatabaseBackend, DebugBackend, ProjectBackend};
pub use broadcast::{Broadcaster, Eingang};
pub use connection::ClientConnection;
pub use dispatcher::MessageDispatcher;
pub use error::{BackendError, BackendResult, RelayError, RelayResult};
pub use server_state::{RelayConfig, RelayState};
pub use session::Session;
pub use tcp::RelayServer;
