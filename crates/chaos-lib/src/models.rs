//! Core data models for the chaos agent

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// A pod observed in the cluster and eligible for disruption
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PodRef {
    pub name: String,
    pub namespace: String,
    /// Pod already carries a deletion timestamp
    #[serde(default)]
    pub terminating: bool,
}

impl PodRef {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
            terminating: false,
        }
    }
}

impl fmt::Display for PodRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// Outcome class of a single disruption tick
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TickStatus {
    /// Candidates were listed and deletions attempted
    Completed,
    /// The selector matched no running pods
    NoCandidates,
    /// Listing pods failed, nothing was deleted
    ListFailed,
}

/// Record of what one invocation of the disruption job did
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TickReport {
    pub status: TickStatus,
    pub jitter: Duration,
    pub candidates: usize,
    /// True when fewer candidates than the configured pod count were available
    pub clamped: bool,
    pub selected: Vec<PodRef>,
    pub deleted: Vec<PodRef>,
    pub failed: Vec<PodRef>,
}

impl TickReport {
    pub(crate) fn new(jitter: Duration) -> Self {
        Self {
            status: TickStatus::Completed,
            jitter,
            candidates: 0,
            clamped: false,
            selected: Vec::new(),
            deleted: Vec::new(),
            failed: Vec::new(),
        }
    }

    /// Number of delete calls issued during the tick
    pub fn delete_attempts(&self) -> usize {
        self.deleted.len() + self.failed.len()
    }
}
