//! Deterministic in-memory ensemble for testing.
//!
//! [`DeterministicEnsemble`] implements the full ensemble contract against
//! an in-process node table with predictable behavior:
//!
//! - per-parent sequence counters producing ten-digit zero-padded suffixes
//! - ephemeral nodes owned by session id, destroyed when the session ends
//! - one-shot watches, consumed on fire, coalesced per (session, path, kind)
//! - watch notices for a session's own writes queued before the write
//!   returns, matching the coordination service's delivery ordering
//! - session expiry injection for disconnect testing
//!
//! Everything is driven by explicit calls; no background tasks, no timers.

use std::collections::BTreeMap;
use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::sync::mpsc;
use tracing::debug;

use alder_ensemble::CreateMode;
use alder_ensemble::EnsembleClient;
use alder_ensemble::EnsembleError;
use alder_ensemble::EnsembleSession;
use alder_ensemble::NodeStat;
use alder_ensemble::SessionConfig;
use alder_ensemble::SessionNotice;
use alder_ensemble::WatchEvent;
use alder_ensemble::WatchEventKind;

/// One node in the tree.
struct NodeRecord {
    create_revision: u64,
    mod_revision: u64,
    version: u64,
    ephemeral_owner: Option<u64>,
    /// Counter for sequence suffixes assigned to children of this node.
    next_sequence: u64,
}

impl NodeRecord {
    fn new(revision: u64, ephemeral_owner: Option<u64>) -> Self {
        Self {
            create_revision: revision,
            mod_revision: revision,
            version: 1,
            ephemeral_owner,
            next_sequence: 0,
        }
    }
}

struct SessionRecord {
    notices: mpsc::UnboundedSender<SessionNotice>,
    connected: bool,
}

struct WatchRegistration {
    session_id: u64,
    path: String,
    kind: WatchEventKind,
}

struct EnsembleState {
    nodes: BTreeMap<String, NodeRecord>,
    watches: Vec<WatchRegistration>,
    sessions: HashMap<u64, SessionRecord>,
    next_session_id: u64,
    revision: u64,
    fail_next_connect: bool,
}

impl EnsembleState {
    fn next_revision(&mut self) -> u64 {
        self.revision += 1;
        self.revision
    }

    fn children_names(&self, path: &str) -> Vec<String> {
        let prefix = if path == "/" { "/".to_string() } else { format!("{path}/") };
        self.nodes
            .range(prefix.clone()..)
            .take_while(|(key, _)| key.starts_with(&prefix))
            .filter_map(|(key, _)| {
                let name = &key[prefix.len()..];
                (!name.is_empty() && !name.contains('/')).then(|| name.to_string())
            })
            .collect()
    }

    fn stat_of(&self, path: &str) -> Option<NodeStat> {
        let record = self.nodes.get(path)?;
        Some(NodeStat {
            create_revision: record.create_revision,
            mod_revision: record.mod_revision,
            version: record.version,
            ephemeral_owner: record.ephemeral_owner,
            num_children: self.children_names(path).len() as u64,
        })
    }

    /// Arm a one-shot watch, coalescing duplicates per (session, path, kind).
    fn arm_watch(&mut self, session_id: u64, path: &str, kind: WatchEventKind) {
        let armed = self
            .watches
            .iter()
            .any(|w| w.session_id == session_id && w.path == path && w.kind == kind);
        if !armed {
            self.watches.push(WatchRegistration {
                session_id,
                path: path.to_string(),
                kind,
            });
        }
    }

    /// Consume and deliver every watch matching (path, kind).
    ///
    /// Delivery happens while the triggering operation still holds the
    /// table lock, so a session's own writes queue their notices ahead of
    /// the write result.
    fn fire_watches(&mut self, path: &str, kind: WatchEventKind) {
        let mut fired = Vec::new();
        self.watches.retain(|w| {
            if w.path == path && w.kind == kind {
                fired.push(w.session_id);
                false
            } else {
                true
            }
        });
        for session_id in fired {
            if let Some(record) = self.sessions.get(&session_id) {
                if record.connected {
                    let _ = record.notices.send(SessionNotice::Watch(WatchEvent {
                        path: path.to_string(),
                        kind,
                    }));
                }
            }
        }
    }

    /// Mark a session ended and destroy its ephemeral nodes.
    fn end_session(&mut self, session_id: u64) {
        let Some(record) = self.sessions.get_mut(&session_id) else {
            return;
        };
        record.connected = false;
        // The ending session's own watches never fire again.
        self.watches.retain(|w| w.session_id != session_id);

        let ephemerals: Vec<String> = self
            .nodes
            .iter()
            .filter(|(_, record)| record.ephemeral_owner == Some(session_id))
            .map(|(path, _)| path.clone())
            .collect();
        for path in ephemerals {
            self.delete_node(&path);
        }
    }

    /// Remove a node unconditionally and notify parent watchers.
    fn delete_node(&mut self, path: &str) {
        if self.nodes.remove(path).is_none() {
            return;
        }
        let revision = self.next_revision();
        let parent = parent_of(path);
        if let Some(record) = self.nodes.get_mut(parent) {
            record.version += 1;
            record.mod_revision = revision;
        }
        self.fire_watches(parent, WatchEventKind::ChildrenChanged);
    }
}

fn parent_of(path: &str) -> &str {
    match path.rfind('/') {
        Some(0) | None => "/",
        Some(index) => &path[..index],
    }
}

/// A deterministic in-memory ensemble.
///
/// Shared across any number of candidate sessions; clone the returned
/// `Arc` freely.
pub struct DeterministicEnsemble {
    state: Arc<Mutex<EnsembleState>>,
}

impl DeterministicEnsemble {
    /// Create a new empty ensemble wrapped in `Arc`.
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            state: Arc::new(Mutex::new(EnsembleState {
                nodes: BTreeMap::new(),
                watches: Vec::new(),
                sessions: HashMap::new(),
                next_session_id: 1,
                revision: 0,
                fail_next_connect: false,
            })),
        })
    }

    /// Whether a node currently exists at `path`.
    pub async fn node_exists(&self, path: &str) -> bool {
        self.state.lock().await.nodes.contains_key(path)
    }

    /// Names of the direct children of `path`, empty if the node is absent.
    pub async fn children_of(&self, path: &str) -> Vec<String> {
        self.state.lock().await.children_names(path)
    }

    /// Ids of the currently connected sessions, ascending.
    pub async fn session_ids(&self) -> Vec<u64> {
        let state = self.state.lock().await;
        let mut ids: Vec<u64> = state
            .sessions
            .iter()
            .filter(|(_, record)| record.connected)
            .map(|(id, _)| *id)
            .collect();
        ids.sort_unstable();
        ids
    }

    /// Expire a session as the coordination service would on missed
    /// heartbeats: its ephemerals are destroyed, its watches dropped, and
    /// a `Disconnected` notice is pushed to it.
    ///
    /// Returns false if the session is unknown or already ended.
    pub async fn expire_session(&self, session_id: u64) -> bool {
        let mut state = self.state.lock().await;
        let Some(record) = state.sessions.get(&session_id) else {
            return false;
        };
        if !record.connected {
            return false;
        }
        let _ = record.notices.send(SessionNotice::Disconnected);
        state.end_session(session_id);
        debug!(session = session_id, "session expired");
        true
    }

    /// Make the next `connect` call fail with a connection error.
    pub async fn inject_connect_failure(&self) {
        self.state.lock().await.fail_next_connect = true;
    }
}

#[async_trait]
impl EnsembleClient for DeterministicEnsemble {
    async fn connect(
        &self,
        host: &str,
        _config: &SessionConfig,
        notices: mpsc::UnboundedSender<SessionNotice>,
    ) -> Result<Arc<dyn EnsembleSession>, EnsembleError> {
        let mut state = self.state.lock().await;
        if state.fail_next_connect {
            state.fail_next_connect = false;
            return Err(EnsembleError::Connection {
                host: host.to_string(),
                reason: "injected connect failure".to_string(),
            });
        }
        let session_id = state.next_session_id;
        state.next_session_id += 1;
        state.sessions.insert(session_id, SessionRecord {
            notices,
            connected: true,
        });
        debug!(host, session = session_id, "session opened");
        Ok(Arc::new(DeterministicSession {
            state: self.state.clone(),
            session_id,
        }))
    }
}

/// One session against a [`DeterministicEnsemble`].
struct DeterministicSession {
    state: Arc<Mutex<EnsembleState>>,
    session_id: u64,
}

impl DeterministicSession {
    fn check_connected(&self, state: &EnsembleState) -> Result<(), EnsembleError> {
        match state.sessions.get(&self.session_id) {
            Some(record) if record.connected => Ok(()),
            _ => Err(EnsembleError::SessionClosed),
        }
    }
}

#[async_trait]
impl EnsembleSession for DeterministicSession {
    async fn exists(&self, path: &str, watch: bool) -> Result<Option<NodeStat>, EnsembleError> {
        let mut state = self.state.lock().await;
        self.check_connected(&state)?;
        if watch {
            state.arm_watch(self.session_id, path, WatchEventKind::NodeCreated);
        }
        Ok(state.stat_of(path))
    }

    async fn get_children(&self, path: &str, watch: bool) -> Result<Vec<String>, EnsembleError> {
        let mut state = self.state.lock().await;
        self.check_connected(&state)?;
        if !state.nodes.contains_key(path) {
            return Err(EnsembleError::NoNode { path: path.to_string() });
        }
        if watch {
            state.arm_watch(self.session_id, path, WatchEventKind::ChildrenChanged);
        }
        Ok(state.children_names(path))
    }

    async fn create(&self, path: &str, mode: CreateMode) -> Result<String, EnsembleError> {
        let mut state = self.state.lock().await;
        self.check_connected(&state)?;

        match mode {
            CreateMode::Durable => {
                if state.nodes.contains_key(path) {
                    return Err(EnsembleError::NodeExists { path: path.to_string() });
                }
                let revision = state.next_revision();
                state.nodes.insert(path.to_string(), NodeRecord::new(revision, None));

                let parent = parent_of(path).to_string();
                if let Some(record) = state.nodes.get_mut(parent.as_str()) {
                    record.version += 1;
                    record.mod_revision = revision;
                }
                state.fire_watches(path, WatchEventKind::NodeCreated);
                state.fire_watches(&parent, WatchEventKind::ChildrenChanged);
                debug!(session = self.session_id, path, "durable node created");
                Ok(path.to_string())
            }
            CreateMode::EphemeralSequential => {
                let parent = parent_of(path).to_string();
                let name = path[parent.len().max(1)..].trim_start_matches('/');
                if !state.nodes.contains_key(parent.as_str()) {
                    return Err(EnsembleError::NoNode { path: parent });
                }

                let revision = state.next_revision();
                let parent_record = state
                    .nodes
                    .get_mut(parent.as_str())
                    .ok_or(EnsembleError::NoNode { path: parent.clone() })?;
                let sequence = parent_record.next_sequence;
                parent_record.next_sequence += 1;
                parent_record.version += 1;
                parent_record.mod_revision = revision;

                let actual = if parent == "/" {
                    format!("/{name}{sequence:010}")
                } else {
                    format!("{parent}/{name}{sequence:010}")
                };
                state
                    .nodes
                    .insert(actual.clone(), NodeRecord::new(revision, Some(self.session_id)));
                state.fire_watches(&actual, WatchEventKind::NodeCreated);
                state.fire_watches(&parent, WatchEventKind::ChildrenChanged);
                debug!(session = self.session_id, path = %actual, "ephemeral sequential node created");
                Ok(actual)
            }
        }
    }

    async fn remove(&self, path: &str) -> Result<(), EnsembleError> {
        let mut state = self.state.lock().await;
        self.check_connected(&state)?;
        if !state.nodes.contains_key(path) {
            return Err(EnsembleError::NoNode { path: path.to_string() });
        }
        if !state.children_names(path).is_empty() {
            return Err(EnsembleError::NotEmpty { path: path.to_string() });
        }
        state.delete_node(path);
        debug!(session = self.session_id, path, "node removed");
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), EnsembleError> {
        let mut state = self.state.lock().await;
        self.check_connected(&state)?;
        state.end_session(self.session_id);
        debug!(session = self.session_id, "session closed");
        Ok(())
    }
}
