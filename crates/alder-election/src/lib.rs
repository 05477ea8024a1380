//! Leader election via ephemeral-sequential nodes on a coordination
//! service.
//!
//! Candidates of one election group each register an ephemeral,
//! sequentially numbered node under a shared root; the candidate holding
//! the lowest sequence number leads. The ensemble destroys a candidate's
//! node when its session ends, so leadership transfers deterministically
//! to the next-lowest survivor without any candidate-to-candidate
//! messaging.
//!
//! - [`ElectionCandidate`] / [`CandidateHandle`] - one participant's
//!   lifecycle
//! - [`ElectionEvent`] - the typed event surface
//! - [`CandidateConfig`], [`ElectionRoot`], [`CandidatePrefix`] - validated
//!   configuration
//! - [`pure`] - deterministic path and ranking functions
//!
//! # Example
//!
//! ```ignore
//! use alder_election::{CandidateConfig, ElectionCandidate, ElectionEvent};
//!
//! let config = CandidateConfig::new("ensemble-a:2181", "/workers", "candidate_")?;
//! let candidate = ElectionCandidate::new(client, config);
//! let mut events = candidate.subscribe();
//! let handle = candidate.start();
//!
//! while let Some(event) = events.recv().await {
//!     match event {
//!         ElectionEvent::LeaderChanged { is_leader: true, .. } => { /* lead */ }
//!         ElectionEvent::ClientDisconnected { .. } => break,
//!         _ => {}
//!     }
//! }
//! ```

mod candidate;
mod config;
mod error;
mod events;
pub mod pure;

pub use candidate::CandidateHandle;
pub use candidate::CandidatePhase;
pub use candidate::CandidateStatus;
pub use candidate::ElectionCandidate;
pub use config::CandidateConfig;
pub use config::CandidatePrefix;
pub use config::ElectionRoot;
pub use error::ElectionError;
pub use error::PathError;
pub use events::ElectionEvent;
