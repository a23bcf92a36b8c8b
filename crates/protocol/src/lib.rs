//! reflector-protocol – Netzwerkprotokoll des Reflectors
//!
//! Jede Nachricht ist ein JSON-Objekt mit einem `command`-Feld und
//! kommandospezifischen Feldern. Dieses Crate definiert den Umschlag
//! ([`Message`]), die Kommandonamen, typisierte Bodies fuer Anfragen und
//! Antworten sowie den laengenpraefixierten [`wire::FrameCodec`].

pub mod commands;
pub mod control;
pub mod error;
pub mod message;
pub mod wire;

pub use error::{ProtocolError, ProtocolResult};
pub use message::Message;
pub use wire::FrameCodec;
