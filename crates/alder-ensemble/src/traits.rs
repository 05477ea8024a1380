//! Client and session traits for the ensemble.
//!
//! Defines the interface the election core consumes. Implementations own
//! everything below this line: session establishment, request retries, wire
//! serialization and watch delivery ordering.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::EnsembleError;
use crate::types::CreateMode;
use crate::types::NodeStat;
use crate::types::SessionConfig;
use crate::types::SessionNotice;

/// Connects sessions to an ensemble.
#[async_trait]
pub trait EnsembleClient: Send + Sync {
    /// Establish a session against `host`.
    ///
    /// Watch firings and unexpected session loss are delivered through
    /// `notices`. A session sends at most one `SessionNotice::Disconnected`
    /// over its lifetime. Notices caused by a session's own write are
    /// delivered before that write's result, matching the ordering the
    /// coordination service itself guarantees.
    async fn connect(
        &self,
        host: &str,
        config: &SessionConfig,
        notices: mpsc::UnboundedSender<SessionNotice>,
    ) -> Result<Arc<dyn EnsembleSession>, EnsembleError>;
}

/// One established session against the ensemble.
///
/// Every read that accepts `watch: true` arms a one-shot watch for the
/// operation's change class; the watch is consumed when it fires and must be
/// re-armed by issuing the same read again.
#[async_trait]
pub trait EnsembleSession: Send + Sync {
    /// Check whether `path` exists, returning its metadata if so.
    ///
    /// With `watch: true`, arms a one-shot creation watch on `path`.
    async fn exists(&self, path: &str, watch: bool) -> Result<Option<NodeStat>, EnsembleError>;

    /// List the names of the direct children of `path`.
    ///
    /// With `watch: true`, arms a one-shot children watch on `path`.
    /// Order of the returned names is unspecified.
    async fn get_children(&self, path: &str, watch: bool) -> Result<Vec<String>, EnsembleError>;

    /// Create a node at `path`, returning the actual path created.
    ///
    /// For [`CreateMode::EphemeralSequential`] the returned path carries the
    /// ensemble-assigned numeric suffix and differs from the request.
    async fn create(&self, path: &str, mode: CreateMode) -> Result<String, EnsembleError>;

    /// Remove the node at `path`. Refused with [`EnsembleError::NotEmpty`]
    /// while the node has children.
    async fn remove(&self, path: &str) -> Result<(), EnsembleError>;

    /// Tear the session down. Ephemeral nodes owned by the session are
    /// destroyed by the ensemble.
    async fn disconnect(&self) -> Result<(), EnsembleError>;
}

// Blanket implementation for Arc<T>
#[async_trait]
impl<T: EnsembleClient + ?Sized> EnsembleClient for Arc<T> {
    async fn connect(
        &self,
        host: &str,
        config: &SessionConfig,
        notices: mpsc::UnboundedSender<SessionNotice>,
    ) -> Result<Arc<dyn EnsembleSession>, EnsembleError> {
        (**self).connect(host, config, notices).await
    }
}

// Blanket implementation for Arc<T>
#[async_trait]
impl<T: EnsembleSession + ?Sized> EnsembleSession for Arc<T> {
    async fn exists(&self, path: &str, watch: bool) -> Result<Option<NodeStat>, EnsembleError> {
        (**self).exists(path, watch).await
    }

    async fn get_children(&self, path: &str, watch: bool) -> Result<Vec<String>, EnsembleError> {
        (**self).get_children(path, watch).await
    }

    async fn create(&self, path: &str, mode: CreateMode) -> Result<String, EnsembleError> {
        (**self).create(path, mode).await
    }

    async fn remove(&self, path: &str) -> Result<(), EnsembleError> {
        (**self).remove(path).await
    }

    async fn disconnect(&self) -> Result<(), EnsembleError> {
        (**self).disconnect().await
    }
}
