//! The typed event surface.
//!
//! Every observable transition of a candidate is one variant of
//! [`ElectionEvent`]. Events are pushed to subscribers over unbounded
//! channels; the election core never blocks on a slow owner.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::error::ElectionError;

/// An observable election transition, fired at most once per underlying
/// cause.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ElectionEvent {
    /// The session to the ensemble was established.
    ClientConnected {
        /// The ensemble address.
        host: String,
    },
    /// The session ended, either through `close` or unexpectedly.
    ClientDisconnected {
        /// The ensemble address.
        host: String,
        /// The candidate node path if one was created this session,
        /// otherwise the election root path.
        path: String,
        /// The retired candidate id, if one was assigned.
        candidate_id: Option<u64>,
    },
    /// The watched election root came into existence.
    NodeCreated {
        /// The created path.
        path: String,
    },
    /// This candidate's ephemeral-sequential node was created.
    ChildCreated {
        /// The full candidate node path, sequence suffix included.
        path: String,
        /// Leadership status at emission time. Ranking runs after this
        /// event, so the value here may be stale.
        is_leader: bool,
        /// The ensemble-assigned candidate id.
        candidate_id: u64,
    },
    /// Leadership status flipped after ranking a sibling snapshot.
    LeaderChanged {
        /// This candidate's node path.
        path: String,
        /// The new leadership status.
        is_leader: bool,
        /// This candidate's id.
        candidate_id: u64,
    },
    /// The sibling set changed; a re-fetch and re-rank is in flight.
    NodeChildrenChanged {
        /// The election root path.
        path: String,
        /// Leadership status before the re-rank.
        is_leader: bool,
        /// This candidate's id, if assigned.
        candidate_id: Option<u64>,
    },
    /// The election root was removed via `remove_election_root`.
    NodeRemoved {
        /// The removed path.
        path: String,
        /// Leadership status at removal time.
        is_leader: bool,
        /// This candidate's id, if one was ever assigned.
        candidate_id: Option<u64>,
    },
    /// A fault occurred. Each fault is surfaced exactly once.
    Error {
        /// The underlying cause.
        cause: ElectionError,
    },
}

/// Subscriber registry for event delivery.
///
/// Cheap to clone; the candidate and its handle share one registry.
#[derive(Clone, Default)]
pub(crate) struct EventRegistry {
    subscribers: Arc<Mutex<Vec<mpsc::UnboundedSender<ElectionEvent>>>>,
}

impl EventRegistry {
    /// Register a new subscriber.
    pub(crate) fn subscribe(&self) -> mpsc::UnboundedReceiver<ElectionEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.lock().push(tx);
        rx
    }

    /// Deliver an event to every live subscriber, pruning closed ones.
    pub(crate) fn emit(&self, event: ElectionEvent) {
        let mut subscribers = self.subscribers.lock();
        subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_emit_reaches_all_subscribers() {
        let registry = EventRegistry::default();
        let mut a = registry.subscribe();
        let mut b = registry.subscribe();

        registry.emit(ElectionEvent::NodeCreated {
            path: "/election".to_string(),
        });

        assert!(matches!(a.try_recv(), Ok(ElectionEvent::NodeCreated { .. })));
        assert!(matches!(b.try_recv(), Ok(ElectionEvent::NodeCreated { .. })));
    }

    #[test]
    fn test_closed_subscribers_are_pruned() {
        let registry = EventRegistry::default();
        let rx = registry.subscribe();
        drop(rx);

        registry.emit(ElectionEvent::NodeCreated {
            path: "/election".to_string(),
        });
        assert!(registry.subscribers.lock().is_empty());
    }
}
