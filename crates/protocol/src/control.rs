//! Typisierte Bodies fuer Anfragen und Antworten
//!
//! Control-Nachrichten tragen nie eine Update-ID. Felder, die ein Client
//! weglassen darf, sind `Option` oder haben einen serde-Default.

use serde::{Deserialize, Serialize};

use reflector_core::{
    GlobalProjectId, LocalProjectId, PermissionPair, PermissionSet, SnapshotId, UpdateId, UserId,
};

use crate::message::Message;

// ---------------------------------------------------------------------------
// Handshake
// ---------------------------------------------------------------------------

/// Zufalls-Challenge des Servers (Base64)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthChallenge {
    pub challenge: String,
}

/// Antwort des Clients auf die Challenge
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthRequest {
    pub user: String,
    /// HMAC-MD5 ueber die Challenge (Base64)
    pub response: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthReply {
    pub result: String,
    pub userid: UserId,
    pub publish: PermissionSet,
    pub subscribe: PermissionSet,
}

// ---------------------------------------------------------------------------
// Projekt-Anfragen
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectNewRequest {
    pub hash: String,
    #[serde(default)]
    pub desc: String,
    /// Projektmaske, fehlend bedeutet alle Kategorien
    #[serde(default)]
    pub publish: Option<PermissionSet>,
    #[serde(default)]
    pub subscribe: Option<PermissionSet>,
}

impl ProjectNewRequest {
    pub fn masken(&self) -> PermissionPair {
        PermissionPair::neu(
            self.publish.unwrap_or(PermissionSet::FULL),
            self.subscribe.unwrap_or(PermissionSet::FULL),
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectJoinRequest {
    pub lpid: LocalProjectId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectRejoinRequest {
    pub lpid: LocalProjectId,
    /// Letztes Update, das der Client bereits kennt
    pub lastupdateid: UpdateId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectSnapshotRequest {
    pub lastupdateid: UpdateId,
    #[serde(default)]
    pub desc: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectForkRequest {
    pub lastupdateid: UpdateId,
    #[serde(default)]
    pub desc: String,
    #[serde(default)]
    pub publish: Option<PermissionSet>,
    #[serde(default)]
    pub subscribe: Option<PermissionSet>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectSnapforkRequest {
    pub snapshot_id: SnapshotId,
    #[serde(default)]
    pub desc: String,
    #[serde(default)]
    pub publish: Option<PermissionSet>,
    #[serde(default)]
    pub subscribe: Option<PermissionSet>,
}

/// Entscheidung des Clients auf ein Fork-Follow-Angebot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectJoinReply {
    pub accept: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProjectListRequest {
    #[serde(default)]
    pub hash: Option<String>,
}

/// Stapel von Updates; jedes Element ist selbst eine Nachricht
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendUpdates {
    pub updates: Vec<Message>,
}

/// Body fuer set_req_perms und set_proj_perms
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PermsBody {
    pub publish: PermissionSet,
    pub subscribe: PermissionSet,
}

impl From<PermsBody> for PermissionPair {
    fn from(b: PermsBody) -> Self {
        PermissionPair::neu(b.publish, b.subscribe)
    }
}

impl From<PermissionPair> for PermsBody {
    fn from(p: PermissionPair) -> Self {
        Self {
            publish: p.publish,
            subscribe: p.subscribe,
        }
    }
}

// ---------------------------------------------------------------------------
// Antworten
// ---------------------------------------------------------------------------

/// Antwort auf project_new_request sowie project_joined
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectBound {
    pub lpid: LocalProjectId,
    pub gpid: GlobalProjectId,
    pub publish: PermissionSet,
    pub subscribe: PermissionSet,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotReply {
    pub snapshot_id: SnapshotId,
    pub lastupdateid: UpdateId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForkReply {
    pub lpid: LocalProjectId,
    pub gpid: GlobalProjectId,
    pub lastupdateid: UpdateId,
}

/// Benachrichtigung an die uebrigen Mitglieder eines geforkten Projekts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForkFollow {
    /// Benutzer, der den Fork ausgeloest hat
    pub user: String,
    pub lpid: LocalProjectId,
    pub gpid: GlobalProjectId,
    pub lastupdateid: UpdateId,
    pub desc: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectEntry {
    pub lpid: LocalProjectId,
    pub gpid: GlobalProjectId,
    pub hash: String,
    pub desc: String,
    pub owner: String,
    pub parent: Option<LocalProjectId>,
    pub forked_at: Option<UpdateId>,
    pub publish: PermissionSet,
    pub subscribe: PermissionSet,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotEntry {
    pub snapshot_id: SnapshotId,
    pub lpid: LocalProjectId,
    pub updateid: UpdateId,
    pub desc: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProjectList {
    pub projects: Vec<ProjectEntry>,
    pub snapshots: Vec<SnapshotEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjPerms {
    pub lpid: LocalProjectId,
    pub publish: PermissionSet,
    pub subscribe: PermissionSet,
}

/// Body von ERROR und FATAL
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands;
    use serde_json::json;

    #[test]
    fn fork_anfrage_ohne_masken() {
        let msg: Message = serde_json::from_value(json!({
            "command": commands::PROJECT_FORK_REQUEST,
            "lastupdateid": 12,
            "desc": "zweig"
        }))
        .unwrap();

        let body: ProjectForkRequest = msg.body_als().unwrap();
        assert_eq!(body.lastupdateid, UpdateId(12));
        assert!(body.publish.is_none());
        assert!(body.subscribe.is_none());
    }

    #[test]
    fn neues_projekt_standardmasken() {
        let body = ProjectNewRequest {
            hash: "abc".into(),
            desc: String::new(),
            publish: None,
            subscribe: Some(PermissionSet::NONE),
        };
        let masken = body.masken();
        assert_eq!(masken.publish, PermissionSet::FULL);
        assert_eq!(masken.subscribe, PermissionSet::NONE);
    }

    #[test]
    fn send_updates_enthaelt_nachrichten() {
        let msg: Message = serde_json::from_value(json!({
            "command": commands::SEND_UPDATES,
            "updates": [
                {"command": "rename", "addr": 4198400, "name": "main"},
                {"command": "cmt_changed", "addr": 4198404, "cmt": "hallo"}
            ]
        }))
        .unwrap();

        let body: SendUpdates = msg.body_als().unwrap();
        assert_eq!(body.updates.len(), 2);
        assert_eq!(body.updates[0].command, "rename");
        assert_eq!(body.updates[1].body.get("cmt"), Some(&json!("hallo")));
    }

    #[test]
    fn fehlendes_pflichtfeld() {
        let msg = Message::neu(commands::PROJECT_JOIN_REQUEST);
        let ergebnis: crate::ProtocolResult<ProjectJoinRequest> = msg.body_als();
        let fehler = ergebnis.unwrap_err().to_string();
        assert!(fehler.contains("project_join_request"));
        assert!(fehler.contains("lpid"));
    }

    #[test]
    fn fork_follow_nachricht() {
        let angebot = ForkFollow {
            user: "alice".into(),
            lpid: LocalProjectId(7),
            gpid: GlobalProjectId("srv-7".into()),
            lastupdateid: UpdateId(3),
            desc: "neu".into(),
        };
        let msg = Message::fork_follow(&angebot).unwrap();
        assert_eq!(msg.command, commands::PROJECT_FORK_FOLLOW);
        assert_eq!(msg.update_id(), None);
        assert_eq!(msg.body_als::<ForkFollow>().unwrap(), angebot);
    }
}
