//! Nachrichten-Umschlag
//!
//! ```json
//! {"command": "rename", "updateid": 7, "addr": 4198400, "name": "main"}
//! ```
//!
//! `command` bestimmt die Bedeutung, alle anderen Felder landen unveraendert
//! in [`Message::body`]. Updates werden so ohne Kenntnis ihres Inhalts
//! weitergeleitet.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use reflector_core::UpdateId;

use crate::commands;
use crate::control::{ErrorBody, ForkFollow};
use crate::error::{ProtocolError, ProtocolResult};

/// Eine einzelne Protokoll-Nachricht
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub command: String,
    #[serde(flatten)]
    pub body: Map<String, Value>,
}

impl Message {
    /// Erstellt eine Nachricht ohne Body-Felder
    pub fn neu(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            body: Map::new(),
        }
    }

    /// Erstellt eine Nachricht aus einem typisierten Body
    ///
    /// Der Body muss zu einem JSON-Objekt serialisieren.
    pub fn mit_body<T: Serialize>(command: impl Into<String>, body: &T) -> ProtocolResult<Self> {
        match serde_json::to_value(body)? {
            Value::Object(body) => Ok(Self {
                command: command.into(),
                body,
            }),
            _ => Err(ProtocolError::KeinObjekt),
        }
    }

    /// Liest den Body als typisierte Struktur
    pub fn body_als<T: DeserializeOwned>(&self) -> ProtocolResult<T> {
        serde_json::from_value(Value::Object(self.body.clone())).map_err(|e| {
            ProtocolError::UngueltigerBody {
                command: self.command.clone(),
                grund: e.to_string(),
            }
        })
    }

    /// Setzt ein einzelnes Body-Feld
    pub fn mit_feld(mut self, name: &str, wert: impl Into<Value>) -> Self {
        self.body.insert(name.to_string(), wert.into());
        self
    }

    /// Markiert die Nachricht als Update mit der gegebenen ID
    pub fn mit_update_id(self, update_id: UpdateId) -> Self {
        self.mit_feld(commands::UPDATE_ID_FELD, update_id.inner())
    }

    /// Update-ID, falls die Nachricht ein weitergeleitetes Update ist
    pub fn update_id(&self) -> Option<UpdateId> {
        self.body
            .get(commands::UPDATE_ID_FELD)
            .and_then(Value::as_u64)
            .map(UpdateId)
    }

    /// Entfernt Felder, die nur der Server vergibt
    ///
    /// Clients duerfen keine eigene Update-ID in den Payload schmuggeln.
    pub fn ohne_server_felder(mut self) -> Self {
        self.body.remove(commands::UPDATE_ID_FELD);
        self
    }

    // -----------------------------------------------------------------------
    // Control-Nachrichten
    // -----------------------------------------------------------------------

    /// Wiederherstellbarer Fehler, die Session bleibt bestehen
    pub fn error(text: impl Into<String>) -> Self {
        Self::fehler_nachricht(commands::ERROR, text.into())
    }

    /// Fataler Fehler, die Verbindung wird danach geschlossen
    pub fn fatal(text: impl Into<String>) -> Self {
        Self::fehler_nachricht(commands::FATAL, text.into())
    }

    fn fehler_nachricht(command: &str, error: String) -> Self {
        Self::neu(command).mit_feld("error", error)
    }

    /// Angebot, einem Fork zu folgen
    pub fn fork_follow(angebot: &ForkFollow) -> ProtocolResult<Self> {
        Self::mit_body(commands::PROJECT_FORK_FOLLOW, angebot)
    }

    /// Gibt `true` fuer ERROR- und FATAL-Nachrichten zurueck
    pub fn ist_fehler(&self) -> bool {
        self.command == commands::ERROR || self.command == commands::FATAL
    }

    /// Fehlertext einer ERROR- oder FATAL-Nachricht
    pub fn fehlertext(&self) -> Option<String> {
        if !self.ist_fehler() {
            return None;
        }
        self.body_als::<ErrorBody>().ok().map(|b| b.error)
    }
}
