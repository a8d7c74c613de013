//! Wire messages exchanged between the daemon and frontends/helpers.
//!
//! Frames are newline-terminated JSON objects with a `type` discriminator
//! (see [`crate::framing`]). Messages documented to carry a file descriptor
//! do so out-of-band, via [`crate::fdpass`]; the fd itself is never present
//! in the JSON payload.

use serde::{Deserialize, Serialize};

use crate::ids::HexId;

/// Requests sent from a frontend (or an auxiliary helper) to the daemon.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Request {
    /// Liveness probe.
    Ping,
    /// Ask for daemon status; `full` includes per-pane detail.
    Status {
        #[serde(default)]
        full: bool,
    },
    /// Declare this connection as a frontend owning `session_id`.
    Register {
        session_id: HexId,
        session_name: String,
        #[serde(default)]
        keepalive: bool,
    },
    /// Replace the frontend's last-synced opaque state blob.
    SyncState { mux_state: String },
    /// Spawn a shell in a new PTY; reply carries the master fd.
    CreatePane {
        #[serde(default)]
        shell: Option<String>,
        #[serde(default)]
        cwd: Option<String>,
        #[serde(default)]
        sticky_pwd: Option<String>,
        #[serde(default)]
        sticky_key: Option<String>,
    },
    /// Look up a sticky pane by working directory and trigger key.
    FindSticky { pwd: String, key: String },
    /// Re-adopt a batch of previously-owned panes by id.
    Reconnect { pane_uuids: Vec<HexId> },
    /// Graceful disconnect: the frontend already killed what it owns.
    Disconnect,
    /// Suspend a pane, making it adoptable by any client.
    OrphanPane { uuid: HexId },
    /// List orphaned panes.
    ListOrphaned,
    /// Adopt an orphaned pane; reply carries the master fd.
    AdoptPane { uuid: HexId },
    /// Close the master fd of a pane, ending its child via SIGHUP.
    KillPane { uuid: HexId },
    /// Freeze the caller's session as a detached snapshot.
    DetachSession { session_id: HexId, mux_state: String },
    /// Reclaim a detached session by id prefix or name.
    Reattach { session_id: String },
    /// List detached sessions.
    ListSessions,
    /// Ask for metadata about one pane.
    PaneInfo { uuid: HexId },
    /// Sync auxiliary fields the daemon mirrors but never interprets.
    UpdatePaneAux {
        uuid: HexId,
        #[serde(default)]
        is_float: Option<bool>,
        #[serde(default)]
        is_focused: Option<bool>,
        #[serde(default)]
        pane_type: Option<String>,
        #[serde(default)]
        created_from: Option<String>,
        #[serde(default)]
        focused_from: Option<String>,
    },
    /// Notify every connected frontend.
    BroadcastNotify { message: String },
    /// Notify whichever frontend/pane a uuid prefix resolves to.
    TargetedNotify { uuid: String, message: String },
    /// Forward a yes/no prompt to the frontend a uuid prefix resolves to.
    PopConfirm { uuid: String, message: String },
    /// Forward a multiple-choice prompt to the frontend a uuid resolves to.
    PopChoose { uuid: String, message: String, items: Vec<String> },
    /// A frontend's answer to a previously forwarded prompt.
    PopResponse { answer: PromptAnswer },
}

/// The three shapes a `pop_response` answer can take.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PromptAnswer {
    Confirmed(bool),
    Selected(usize),
    Cancelled,
}

/// Responses sent from the daemon back to a connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Response {
    Pong,
    Status { status: DaemonStatus },
    Registered,
    StateSynced,
    /// Carries the new pane's master fd out-of-band.
    PaneCreated { uuid: HexId },
    /// Carries the sticky/orphaned pane's master fd out-of-band.
    PaneFound { uuid: HexId },
    PaneNotFound { uuid: HexId },
    /// One frame per successfully reconnected pane carries its fd
    /// out-of-band; this response lists which uuids were reconnected.
    Reconnected { uuids: Vec<HexId> },
    OrphanedPanes { uuids: Vec<HexId> },
    Ok,
    Error { message: String },
    Notification { message: String },
    PaneNotification { uuid: HexId, message: String },
    TabNotification { message: String },
    SessionDetached { session_id: HexId },
    SessionReattached { session_id: HexId, mux_state: String, pane_uuids: Vec<HexId> },
    Sessions { sessions: Vec<SessionSummary> },
    PaneInfo { info: PaneInfo },
}

/// Daemon-wide status snapshot returned by `status`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonStatus {
    pub clients: Vec<ClientSummary>,
    pub pane_count: usize,
    pub detached_session_count: usize,
}

/// Summary of one connected client, as returned in `status`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientSummary {
    pub client_id: u32,
    pub session_id: Option<HexId>,
    pub session_name: Option<String>,
    pub panes: Vec<HexId>,
}

/// Summary of one detached session, as returned in `list_sessions`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSummary {
    pub session_id: HexId,
    pub session_name: String,
    pub pane_uuids: Vec<HexId>,
    pub detached_at_ms: u64,
}

/// Per-pane metadata, as returned in `pane_info`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaneInfo {
    pub uuid: HexId,
    pub state: String,
    pub pid: Option<u32>,
    pub created_at_ms: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_roundtrips_through_json() {
        let msg = Request::FindSticky { pwd: "/home/x".into(), key: "1".into() };
        let encoded = serde_json::to_string(&msg).unwrap();
        let decoded: Request = serde_json::from_str(&encoded).unwrap();
        match decoded {
            Request::FindSticky { pwd, key } => {
                assert_eq!(pwd, "/home/x");
                assert_eq!(key, "1");
            },
            _ => panic!("wrong variant"),
        }
    }

    #[test]
    fn request_discriminator_is_snake_case() {
        let msg = Request::CreatePane { shell: None, cwd: None, sticky_pwd: None, sticky_key: None };
        let encoded = serde_json::to_string(&msg).unwrap();
        assert!(encoded.contains("\"type\":\"create_pane\""));
    }

    #[test]
    fn response_roundtrips_through_json() {
        let msg = Response::Error { message: "boom".into() };
        let encoded = serde_json::to_string(&msg).unwrap();
        let decoded: Response = serde_json::from_str(&encoded).unwrap();
        match decoded {
            Response::Error { message } => assert_eq!(message, "boom"),
            _ => panic!("wrong variant"),
        }
    }

    #[test]
    fn pane_created_roundtrips() {
        let uuid = HexId::new();
        let msg = Response::PaneCreated { uuid };
        let encoded = serde_json::to_string(&msg).unwrap();
        let decoded: Response = serde_json::from_str(&encoded).unwrap();
        match decoded {
            Response::PaneCreated { uuid: got } => assert_eq!(got, uuid),
            _ => panic!("wrong variant"),
        }
    }

    #[test]
    fn prompt_answer_variants_roundtrip() {
        for answer in [
            PromptAnswer::Confirmed(true),
            PromptAnswer::Selected(2),
            PromptAnswer::Cancelled,
        ] {
            let req = Request::PopResponse { answer: answer.clone() };
            let encoded = serde_json::to_string(&req).unwrap();
            let decoded: Request = serde_json::from_str(&encoded).unwrap();
            match decoded {
                Request::PopResponse { answer: got } => assert_eq!(got, answer),
                _ => panic!("wrong variant"),
            }
        }
    }
}
