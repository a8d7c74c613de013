//! Daemon-side session state: pane registry, client registry, detached
//! sessions, and the pending prompt-forwarding slot.
//!
//! The four pane states are a tagged variant; transitions are table-driven
//! (see [`Pane::transition`] call sites in `server.rs`) so tests can
//! enumerate them exhaustively, following the state-enum-with-guarded
//! transitions idiom this module is grounded on (see DESIGN.md).

use std::collections::HashMap;
use std::os::fd::RawFd;
use std::time::{SystemTime, UNIX_EPOCH};

use hexa_protocol::HexId;

use crate::error::{DaemonError, DaemonResult};

/// Milliseconds since the Unix epoch, used for `created_at`/`orphaned_at`/
/// `detached_at` timestamps.
pub fn now_ms() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_millis() as u64).unwrap_or(0)
}

/// A client's numeric id within this daemon process (not on the wire — the
/// wire-visible identity of a frontend is its declared session id).
pub type ClientId = u32;

/// Lifecycle state of a daemon-owned pane.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaneState {
    /// Owned by `attached_to`.
    Attached { attached_to: ClientId },
    /// Belongs to a detached-session snapshot.
    Detached { session_id: HexId },
    /// Held aside for a client entering the same pwd with the same key.
    Sticky { sticky_pwd: String, sticky_key: String, orphaned_at: u64 },
    /// Suspended; adoptable by any client.
    Orphaned { orphaned_at: u64 },
}

/// A pane kept alive by the daemon.
#[derive(Debug, Clone)]
pub struct Pane {
    pub id: HexId,
    pub master_fd: RawFd,
    pub pid: libc::pid_t,
    pub state: PaneState,
    pub created_at: u64,
    // Mirror fields the frontend syncs back; opaque to the daemon.
    pub is_floating: bool,
    pub is_focused: bool,
    pub pane_type: Option<String>,
    pub created_from: Option<String>,
    pub focused_from: Option<String>,
}

impl Pane {
    fn new(id: HexId, master_fd: RawFd, pid: libc::pid_t, attached_to: ClientId) -> Self {
        Self {
            id,
            master_fd,
            pid,
            state: PaneState::Attached { attached_to },
            created_at: now_ms(),
            is_floating: false,
            is_focused: false,
            pane_type: None,
            created_from: None,
            focused_from: None,
        }
    }
}

/// A connected frontend (or helper) tracked by the daemon.
#[derive(Debug, Clone, Default)]
pub struct Client {
    pub panes: Vec<HexId>,
    pub keepalive: bool,
    pub session_id: Option<HexId>,
    pub session_name: Option<String>,
    pub mux_state: Option<String>,
}

/// A frozen snapshot produced by `detach_session`.
#[derive(Debug, Clone)]
pub struct DetachedSession {
    pub session_id: HexId,
    pub session_name: String,
    pub mux_state: String,
    pub pane_uuids: Vec<HexId>,
    pub detached_at: u64,
}

/// Daemon-wide session state: the pane arena, the client registry, the
/// detached-session store, and the single-slot-per-target prompt-forwarding
/// map.
#[derive(Debug, Default)]
pub struct SessionState {
    pub panes: HashMap<HexId, Pane>,
    pub clients: HashMap<ClientId, Client>,
    pub detached_sessions: HashMap<HexId, DetachedSession>,
    /// `target_frontend_client → helper_client` awaiting a `pop_response`.
    pub pending_prompts: HashMap<ClientId, ClientId>,
    next_client_id: ClientId,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_client(&mut self) -> ClientId {
        let id = self.next_client_id;
        self.next_client_id += 1;
        self.clients.insert(id, Client::default());
        id
    }

    /// Register a newly spawned pane as attached to `client`.
    pub fn register_pane(
        &mut self,
        client: ClientId,
        master_fd: RawFd,
        pid: libc::pid_t,
    ) -> HexId {
        let id = HexId::new();
        self.panes.insert(id, Pane::new(id, master_fd, pid, client));
        if let Some(c) = self.clients.get_mut(&client) {
            c.panes.push(id);
        }
        id
    }

    /// Run the client-drop path (§4.2): every pane the client owned becomes
    /// `sticky` (if tagged) or `orphaned`; the pending-prompt slot is
    /// cleared in both directions regardless of whether a response arrived.
    pub fn drop_client(&mut self, client: ClientId, sticky_tags: &HashMap<HexId, (String, String)>) {
        if let Some(c) = self.clients.remove(&client) {
            for pane_id in c.panes {
                if let Some(pane) = self.panes.get_mut(&pane_id) {
                    pane.state = match sticky_tags.get(&pane_id) {
                        Some((pwd, key)) => PaneState::Sticky {
                            sticky_pwd: pwd.clone(),
                            sticky_key: key.clone(),
                            orphaned_at: now_ms(),
                        },
                        None => PaneState::Orphaned { orphaned_at: now_ms() },
                    };
                }
            }
        }
        // Clear the pending-prompt slot regardless of direction or outcome.
        self.pending_prompts.remove(&client);
        self.pending_prompts.retain(|_, helper| *helper != client);
    }

    /// Graceful disconnect: remove the client entry without touching its
    /// panes (the frontend already killed what it owned).
    pub fn disconnect_client(&mut self, client: ClientId) {
        self.clients.remove(&client);
        self.pending_prompts.remove(&client);
        self.pending_prompts.retain(|_, helper| *helper != client);
    }

    /// Close a pane's master fd (kernel delivers SIGHUP to the child) and
    /// drop its entry.
    pub fn kill_pane(&mut self, uuid: HexId) -> DaemonResult<()> {
        let pane = self
            .panes
            .remove(&uuid)
            .ok_or_else(|| DaemonError::PaneNotFound(uuid.as_hex32()))?;
        if let PaneState::Attached { attached_to } = pane.state {
            if let Some(c) = self.clients.get_mut(&attached_to) {
                c.panes.retain(|p| *p != uuid);
            }
        }
        crate::pty::close_master(pane.master_fd);
        Ok(())
    }

    /// `find_sticky`: linear scan for a sticky pane matching `pwd`+`key`.
    /// On success the pane transitions to `attached` to `client`.
    pub fn find_sticky(&mut self, client: ClientId, pwd: &str, key: &str) -> Option<HexId> {
        let found = self.panes.iter().find_map(|(id, pane)| match &pane.state {
            PaneState::Sticky { sticky_pwd, sticky_key, .. }
                if sticky_pwd == pwd && sticky_key == key =>
            {
                Some(*id)
            },
            _ => None,
        })?;
        self.attach_pane(found, client);
        Some(found)
    }

    /// `adopt_pane`: rebind an orphaned pane to `client`.
    pub fn adopt_pane(&mut self, uuid: HexId, client: ClientId) -> DaemonResult<()> {
        let pane = self.panes.get(&uuid).ok_or_else(|| DaemonError::PaneNotFound(uuid.as_hex32()))?;
        if !matches!(pane.state, PaneState::Orphaned { .. }) {
            return Err(DaemonError::Session(format!("pane {uuid} is not orphaned")));
        }
        self.attach_pane(uuid, client);
        Ok(())
    }

    /// `orphan_pane`: manually suspend an attached pane.
    pub fn orphan_pane(&mut self, uuid: HexId) -> DaemonResult<()> {
        let pane = self.panes.get_mut(&uuid).ok_or_else(|| DaemonError::PaneNotFound(uuid.as_hex32()))?;
        let PaneState::Attached { attached_to } = pane.state else {
            return Err(DaemonError::Session(format!("pane {uuid} is not attached")));
        };
        if let Some(c) = self.clients.get_mut(&attached_to) {
            c.panes.retain(|p| *p != uuid);
        }
        pane.state = PaneState::Orphaned { orphaned_at: now_ms() };
        Ok(())
    }

    pub fn list_orphaned(&self) -> Vec<HexId> {
        self.panes
            .iter()
            .filter(|(_, p)| matches!(p.state, PaneState::Orphaned { .. }))
            .map(|(id, _)| *id)
            .collect()
    }

    fn attach_pane(&mut self, uuid: HexId, client: ClientId) {
        if let Some(pane) = self.panes.get_mut(&uuid) {
            pane.state = PaneState::Attached { attached_to: client };
        }
        if let Some(c) = self.clients.get_mut(&client) {
            if !c.panes.contains(&uuid) {
                c.panes.push(uuid);
            }
        }
    }

    /// `detach_session`: freeze `client`'s owned panes into a snapshot keyed
    /// by `session_id`, replacing any existing entry for that id.
    pub fn detach_session(
        &mut self,
        client: ClientId,
        session_id: HexId,
        session_name: String,
        mux_state: String,
    ) {
        let pane_uuids = self.clients.get(&client).map(|c| c.panes.clone()).unwrap_or_default();
        for uuid in &pane_uuids {
            if let Some(pane) = self.panes.get_mut(uuid) {
                pane.state = PaneState::Detached { session_id };
            }
        }
        // Replacing any previous entry for this session id discards its blob.
        self.detached_sessions.insert(
            session_id,
            DetachedSession {
                session_id,
                session_name,
                mux_state,
                pane_uuids,
                detached_at: now_ms(),
            },
        );
        self.clients.remove(&client);
    }

    /// `reattach`: resolve `session_id` by exact id or name prefix, drop the
    /// detached-session entry, and return its state blob and pane list. The
    /// caller is responsible for `adopt`-ing each returned pane afterwards
    /// (matching the documented two-step reattach + per-pane adopt flow).
    pub fn reattach(&mut self, session_id_or_prefix: &str) -> DaemonResult<DetachedSession> {
        let key = self
            .detached_sessions
            .iter()
            .find(|(id, s)| {
                id.has_prefix(session_id_or_prefix) || s.session_name == session_id_or_prefix
            })
            .map(|(id, _)| *id)
            .ok_or_else(|| DaemonError::SessionNotFound(session_id_or_prefix.to_string()))?;
        Ok(self.detached_sessions.remove(&key).expect("key just found above"))
    }

    pub fn list_sessions(&self) -> impl Iterator<Item = &DetachedSession> {
        self.detached_sessions.values()
    }

    /// Sweep orphaned/sticky panes past `timeout_secs`: close their fds and
    /// drop their entries.
    pub fn sweep_expired(&mut self, timeout_secs: u64) {
        let timeout_ms = timeout_secs.saturating_mul(1000);
        let now = now_ms();
        let expired: Vec<HexId> = self
            .panes
            .iter()
            .filter_map(|(id, pane)| {
                let orphaned_at = match &pane.state {
                    PaneState::Orphaned { orphaned_at } => Some(*orphaned_at),
                    PaneState::Sticky { orphaned_at, .. } => Some(*orphaned_at),
                    _ => None,
                }?;
                (now.saturating_sub(orphaned_at) >= timeout_ms).then_some(*id)
            })
            .collect();
        for id in expired {
            if let Some(pane) = self.panes.remove(&id) {
                crate::pty::close_master(pane.master_fd);
            }
        }
    }

    /// Resolve a notification target uuid/prefix against connected clients
    /// in the order documented in §4.2: session id (or prefix) match, then
    /// pane id match, then a tab-scoped broadcast fallback for prefixes of
    /// length >= 4.
    pub fn resolve_notify_target(&self, uuid_or_prefix: &str) -> NotifyTarget {
        if let Some((&client, _)) = self.clients.iter().find(|(_, c)| {
            c.session_id.is_some_and(|sid| sid.has_prefix(uuid_or_prefix))
        }) {
            return NotifyTarget::Session(client);
        }
        if let Some((&client, _)) = self
            .clients
            .iter()
            .find(|(_, c)| c.panes.iter().any(|p| p.has_prefix(uuid_or_prefix)))
        {
            return NotifyTarget::Pane(client);
        }
        if uuid_or_prefix.len() >= 4 {
            return NotifyTarget::Broadcast;
        }
        NotifyTarget::None
    }
}

/// Where a targeted notification should be delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifyTarget {
    Session(ClientId),
    Pane(ClientId),
    Broadcast,
    None,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fresh() -> SessionState {
        SessionState::new()
    }

    #[test]
    fn register_pane_marks_attached() {
        let mut s = fresh();
        let client = s.add_client();
        let id = s.register_pane(client, 3, 100);
        assert!(matches!(s.panes[&id].state, PaneState::Attached { attached_to } if attached_to == client));
        assert_eq!(s.clients[&client].panes, vec![id]);
    }

    #[test]
    fn drop_client_without_sticky_tags_orphans_panes() {
        let mut s = fresh();
        let client = s.add_client();
        let id = s.register_pane(client, 3, 100);
        s.drop_client(client, &HashMap::new());
        assert!(matches!(s.panes[&id].state, PaneState::Orphaned { .. }));
        assert!(!s.clients.contains_key(&client));
    }

    #[test]
    fn drop_client_with_sticky_tags_makes_pane_sticky() {
        let mut s = fresh();
        let client = s.add_client();
        let id = s.register_pane(client, 3, 100);
        let mut tags = HashMap::new();
        tags.insert(id, ("/home/x".to_string(), "1".to_string()));
        s.drop_client(client, &tags);
        match &s.panes[&id].state {
            PaneState::Sticky { sticky_pwd, sticky_key, .. } => {
                assert_eq!(sticky_pwd, "/home/x");
                assert_eq!(sticky_key, "1");
            },
            other => panic!("unexpected state: {other:?}"),
        }
    }

    #[test]
    fn find_sticky_rebinds_to_new_client() {
        let mut s = fresh();
        let owner = s.add_client();
        let id = s.register_pane(owner, 3, 100);
        let mut tags = HashMap::new();
        tags.insert(id, ("/home/x".to_string(), "1".to_string()));
        s.drop_client(owner, &tags);

        let finder = s.add_client();
        let found = s.find_sticky(finder, "/home/x", "1").unwrap();
        assert_eq!(found, id);
        assert!(matches!(s.panes[&id].state, PaneState::Attached { attached_to } if attached_to == finder));
    }

    #[test]
    fn find_sticky_no_match_returns_none() {
        let mut s = fresh();
        let finder = s.add_client();
        assert!(s.find_sticky(finder, "/nowhere", "9").is_none());
    }

    #[test]
    fn adopt_orphaned_pane() {
        let mut s = fresh();
        let owner = s.add_client();
        let id = s.register_pane(owner, 3, 100);
        s.drop_client(owner, &HashMap::new());

        let adopter = s.add_client();
        s.adopt_pane(id, adopter).unwrap();
        assert!(matches!(s.panes[&id].state, PaneState::Attached { attached_to } if attached_to == adopter));
    }

    #[test]
    fn adopt_non_orphaned_pane_errors() {
        let mut s = fresh();
        let owner = s.add_client();
        let id = s.register_pane(owner, 3, 100);
        let other = s.add_client();
        assert!(s.adopt_pane(id, other).is_err());
    }

    #[test]
    fn kill_pane_removes_entry_and_owner_list() {
        let mut s = fresh();
        let client = s.add_client();
        let id = s.register_pane(client, 3, 100);
        s.kill_pane(id).unwrap();
        assert!(!s.panes.contains_key(&id));
        assert!(s.clients[&client].panes.is_empty());
    }

    #[test]
    fn kill_pane_not_found_errors() {
        let mut s = fresh();
        assert!(s.kill_pane(HexId::new()).is_err());
    }

    #[test]
    fn create_then_kill_restores_pane_count() {
        let mut s = fresh();
        let client = s.add_client();
        let before = s.panes.len();
        let id = s.register_pane(client, 3, 100);
        assert_eq!(s.panes.len(), before + 1);
        s.kill_pane(id).unwrap();
        assert_eq!(s.panes.len(), before);
    }

    #[test]
    fn detach_then_reattach_roundtrips_state_blob() {
        let mut s = fresh();
        let client = s.add_client();
        let p1 = s.register_pane(client, 3, 100);
        let p2 = s.register_pane(client, 4, 101);
        let session_id = HexId::new();
        s.detach_session(client, session_id, "work".into(), "{\"tabs\":1}".into());

        assert!(matches!(s.panes[&p1].state, PaneState::Detached { session_id: sid } if sid == session_id));
        assert!(matches!(s.panes[&p2].state, PaneState::Detached { session_id: sid } if sid == session_id));
        assert!(!s.clients.contains_key(&client));

        let snapshot = s.reattach(&session_id.as_hex32()).unwrap();
        assert_eq!(snapshot.mux_state, "{\"tabs\":1}");
        let mut panes = snapshot.pane_uuids.clone();
        panes.sort_by_key(|id| id.as_hex32());
        let mut expected = vec![p1, p2];
        expected.sort_by_key(|id| id.as_hex32());
        assert_eq!(panes, expected);
        assert!(!s.detached_sessions.contains_key(&session_id));
    }

    #[test]
    fn re_detach_same_session_id_discards_previous_blob() {
        let mut s = fresh();
        let client1 = s.add_client();
        let session_id = HexId::new();
        s.detach_session(client1, session_id, "work".into(), "first".into());

        let client2 = s.add_client();
        s.detach_session(client2, session_id, "work".into(), "second".into());

        assert_eq!(s.detached_sessions.len(), 1);
        assert_eq!(s.detached_sessions[&session_id].mux_state, "second");
    }

    #[test]
    fn reattach_by_name_prefix_also_works() {
        let mut s = fresh();
        let client = s.add_client();
        let session_id = HexId::new();
        s.detach_session(client, session_id, "mysession".into(), "blob".into());
        let snapshot = s.reattach("mysession").unwrap();
        assert_eq!(snapshot.session_id, session_id);
    }

    #[test]
    fn sweep_expired_removes_timed_out_orphans() {
        let mut s = fresh();
        let client = s.add_client();
        let id = s.register_pane(client, 3, 100);
        s.drop_client(client, &HashMap::new());
        if let PaneState::Orphaned { orphaned_at } = &mut s.panes.get_mut(&id).unwrap().state {
            *orphaned_at = 0;
        }
        s.sweep_expired(0);
        assert!(!s.panes.contains_key(&id));
    }

    #[test]
    fn sweep_expired_leaves_fresh_orphans_alone() {
        let mut s = fresh();
        let client = s.add_client();
        let id = s.register_pane(client, 3, 100);
        s.drop_client(client, &HashMap::new());
        s.sweep_expired(24 * 60 * 60);
        assert!(s.panes.contains_key(&id));
    }

    #[test]
    fn pending_prompt_slot_cleared_on_either_peer_drop() {
        let mut s = fresh();
        let frontend = s.add_client();
        let helper = s.add_client();
        s.pending_prompts.insert(frontend, helper);

        s.disconnect_client(helper);
        assert!(s.pending_prompts.is_empty());

        s.pending_prompts.insert(frontend, helper);
        s.drop_client(frontend, &HashMap::new());
        assert!(s.pending_prompts.is_empty());
    }

    #[test]
    fn resolve_notify_target_prefers_session_match() {
        let mut s = fresh();
        let client = s.add_client();
        let session_id = HexId::new();
        s.clients.get_mut(&client).unwrap().session_id = Some(session_id);
        let prefix = &session_id.as_hex32()[..6];
        assert_eq!(s.resolve_notify_target(prefix), NotifyTarget::Session(client));
    }

    #[test]
    fn resolve_notify_target_falls_back_to_pane_then_broadcast() {
        let mut s = fresh();
        let client = s.add_client();
        let pane = s.register_pane(client, 3, 100);
        let prefix = &pane.as_hex32()[..6];
        assert_eq!(s.resolve_notify_target(prefix), NotifyTarget::Pane(client));
        assert_eq!(s.resolve_notify_target("zzzz"), NotifyTarget::Broadcast);
        assert_eq!(s.resolve_notify_target("zz"), NotifyTarget::None);
    }
}
