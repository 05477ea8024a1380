//! Candidate configuration.
//!
//! Malformed root paths and prefixes are rejected here, at construction.
//! Nothing past this module can hold an invalid path, which keeps the
//! async election path free of validation faults.

use std::fmt;

use alder_ensemble::SessionConfig;

use crate::error::PathError;
use crate::pure;

/// A validated election root path.
///
/// The shared path under which all candidates of one election group
/// register, `/` plus a single `[A-Za-z0-9_-]+` segment.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ElectionRoot(String);

impl ElectionRoot {
    /// Validate and wrap an election root path.
    pub fn new(path: impl Into<String>) -> Result<Self, PathError> {
        let path = path.into();
        if !pure::is_valid_election_root(&path) {
            return Err(PathError::InvalidElectionRoot { value: path });
        }
        Ok(Self(path))
    }

    /// The root path as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ElectionRoot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A validated candidate name prefix.
///
/// Candidate nodes are created as `<root>/<prefix><sequence>`, with the
/// sequence suffix assigned by the ensemble.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CandidatePrefix(String);

impl CandidatePrefix {
    /// Validate and wrap a candidate prefix.
    pub fn new(prefix: impl Into<String>) -> Result<Self, PathError> {
        let prefix = prefix.into();
        if !pure::is_valid_candidate_prefix(&prefix) {
            return Err(PathError::InvalidCandidatePrefix { value: prefix });
        }
        Ok(Self(prefix))
    }

    /// The prefix as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CandidatePrefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Configuration for one election candidate.
#[derive(Debug, Clone)]
pub struct CandidateConfig {
    /// Ensemble address handed to the client at connect time.
    pub host: String,
    /// The election group's shared root path.
    pub election_root: ElectionRoot,
    /// Name prefix for this candidate's ephemeral-sequential node.
    pub candidate_prefix: CandidatePrefix,
    /// Session options, passed through to the ensemble uninterpreted.
    pub session: SessionConfig,
}

impl CandidateConfig {
    /// Build a configuration, validating `root` and `prefix`.
    pub fn new(host: impl Into<String>, root: &str, prefix: &str) -> Result<Self, PathError> {
        Ok(Self {
            host: host.into(),
            election_root: ElectionRoot::new(root)?,
            candidate_prefix: CandidatePrefix::new(prefix)?,
            session: SessionConfig::default(),
        })
    }

    /// Replace the session options.
    pub fn with_session(mut self, session: SessionConfig) -> Self {
        self.session = session;
        self
    }

    /// The creation path for this candidate's node, before the ensemble
    /// appends the sequence suffix.
    pub fn candidate_path(&self) -> String {
        format!("{}/{}", self.election_root, self.candidate_prefix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_invalid_root() {
        assert!(matches!(
            CandidateConfig::new("localhost:2181", "no-slash", "c_"),
            Err(PathError::InvalidElectionRoot { .. })
        ));
        assert!(matches!(
            CandidateConfig::new("localhost:2181", "/a/b", "c_"),
            Err(PathError::InvalidElectionRoot { .. })
        ));
    }

    #[test]
    fn test_rejects_invalid_prefix() {
        assert!(matches!(
            CandidateConfig::new("localhost:2181", "/election", "/c"),
            Err(PathError::InvalidCandidatePrefix { .. })
        ));
    }

    #[test]
    fn test_candidate_path() {
        let config = CandidateConfig::new("localhost:2181", "/election", "candidate_").unwrap();
        assert_eq!(config.candidate_path(), "/election/candidate_");
        assert_eq!(config.session.session_timeout_ms, 30_000);
    }
}
