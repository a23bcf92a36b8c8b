//! Kommandonamen des Reflector-Protokolls
//!
//! Update-Kommandos (rename, cmt_changed, ...) stehen nicht hier; sie werden
//! ueber [`reflector_core::Category::aus_kommando`] erkannt.

// Handshake
pub const AUTH_CHALLENGE: &str = "auth_challenge";
pub const AUTH_REQUEST: &str = "auth_request";
pub const AUTH_REPLY: &str = "auth_reply";

// Projekte
pub const PROJECT_NEW_REQUEST: &str = "project_new_request";
pub const PROJECT_NEW_REPLY: &str = "project_new_reply";
pub const PROJECT_JOIN_REQUEST: &str = "project_join_request";
pub const PROJECT_REJOIN_REQUEST: &str = "project_rejoin_request";
pub const PROJECT_JOINED: &str = "project_joined";
pub const PROJECT_SNAPSHOT_REQUEST: &str = "project_snapshot_request";
pub const PROJECT_SNAPSHOT_REPLY: &str = "project_snapshot_reply";
pub const PROJECT_FORK_REQUEST: &str = "project_fork_request";
pub const PROJECT_SNAPSHOTFORK_REQUEST: &str = "project_snapshotfork_request";
pub const PROJECT_FORK_REPLY: &str = "project_fork_reply";
pub const PROJECT_FORK_FOLLOW: &str = "project_fork_follow";
pub const PROJECT_JOIN_REPLY: &str = "project_join_reply";
pub const PROJECT_LEAVE: &str = "project_leave";
pub const PROJECT_LEFT: &str = "project_left";
pub const PROJECT_LIST: &str = "project_list";

// Updates
pub const SEND_UPDATES: &str = "send_updates";

// Berechtigungen
pub const SET_REQ_PERMS: &str = "set_req_perms";
pub const GET_REQ_PERMS: &str = "get_req_perms";
pub const REQ_PERMS: &str = "req_perms";
pub const GET_PROJ_PERMS: &str = "get_proj_perms";
pub const SET_PROJ_PERMS: &str = "set_proj_perms";
pub const PROJ_PERMS: &str = "proj_perms";

// Fehler
pub const ERROR: &str = "error";
pub const FATAL: &str = "fatal";

/// Name des Feldes mit der Update-ID in weitergeleiteten Updates
pub const UPDATE_ID_FELD: &str = "updateid";
