//! Shared value types for the ensemble contract.

use serde::Deserialize;
use serde::Serialize;

/// How a node is created on the ensemble.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum CreateMode {
    /// The node survives the creating session. Used for election roots.
    Durable,
    /// The ensemble appends a monotonically increasing numeric suffix to the
    /// supplied name and destroys the node when the creating session ends.
    /// Used for candidate nodes.
    EphemeralSequential,
}

impl CreateMode {
    /// Returns true if nodes created in this mode die with their session.
    pub fn is_ephemeral(&self) -> bool {
        matches!(self, CreateMode::EphemeralSequential)
    }
}

/// Metadata for a node, returned by existence checks.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct NodeStat {
    /// Revision at which the node was created. Never changes afterwards.
    pub create_revision: u64,
    /// Revision of the most recent modification to the node or its children.
    pub mod_revision: u64,
    /// Per-node modification count, starting at 1 on creation.
    pub version: u64,
    /// Session id owning this node if it is ephemeral, `None` for durable
    /// nodes.
    pub ephemeral_owner: Option<u64>,
    /// Number of direct children.
    pub num_children: u64,
}

/// The change class a fired watch reports.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum WatchEventKind {
    /// The watched path came into existence. Armed by `exists`.
    NodeCreated,
    /// The set of direct children under the watched path changed.
    /// Armed by `get_children`.
    ChildrenChanged,
}

/// A one-shot watch notification.
///
/// Watches are consumed when they fire. A session that wants further
/// notifications for the same path and change class must re-issue the
/// watch-capable read that armed the watch.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WatchEvent {
    /// The watched path.
    pub path: String,
    /// The change class that fired.
    pub kind: WatchEventKind,
}

/// Out-of-band notification delivered on a session's notice channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionNotice {
    /// A one-shot watch fired.
    Watch(WatchEvent),
    /// The session ended without the client requesting it. A requested
    /// `disconnect` reports through its own return value instead.
    Disconnected,
}

/// Session options handed to the ensemble at connect time.
///
/// These are passed through to the ensemble's session layer uninterpreted;
/// retry and reconnect pacing are the ensemble client's concern.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionConfig {
    /// Session timeout in milliseconds. The ensemble destroys the session's
    /// ephemeral nodes when it misses heartbeats for this long.
    pub session_timeout_ms: u64,
    /// Delay between reconnect attempts in milliseconds.
    pub reconnect_spin_delay_ms: u64,
    /// Number of connection retries before the session layer gives up.
    pub retry_count: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            session_timeout_ms: 30_000,    // 30 seconds
            reconnect_spin_delay_ms: 1_000, // 1 second
            retry_count: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_config_defaults() {
        let config = SessionConfig::default();
        assert_eq!(config.session_timeout_ms, 30_000);
        assert_eq!(config.reconnect_spin_delay_ms, 1_000);
        assert_eq!(config.retry_count, 0);
    }

    #[test]
    fn test_create_mode_ephemeral() {
        assert!(CreateMode::EphemeralSequential.is_ephemeral());
        assert!(!CreateMode::Durable.is_ephemeral());
    }
}
