//! Client contract for a hierarchical, watch-capable coordination service.
//!
//! An *ensemble* exposes a tree of named nodes with five operations
//! (`exists`, `get_children`, `create`, `remove`, `disconnect`) and one-shot
//! watches on existence and child-set changes. This crate defines that
//! contract as traits plus the shared value and error types; it contains no
//! I/O of its own.
//!
//! - [`EnsembleClient`] / [`EnsembleSession`] - the consumed interface
//! - [`CreateMode`], [`NodeStat`], [`WatchEvent`], [`SessionNotice`] - values
//! - [`SessionConfig`] - session options passed through at connect time
//! - [`EnsembleError`] - the fault taxonomy
//!
//! Production implementations wrap a real coordination-service client; the
//! `alder-testing` crate provides a deterministic in-memory one.

mod error;
mod traits;
mod types;

pub use error::EnsembleError;
pub use traits::EnsembleClient;
pub use traits::EnsembleSession;
pub use types::CreateMode;
pub use types::NodeStat;
pub use types::SessionConfig;
pub use types::SessionNotice;
pub use types::WatchEvent;
pub use types::WatchEventKind;
