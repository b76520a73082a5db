//! Queued pipe requests.
//!
//! The incoming endpoint does not run pipes inline: it wraps the request in a
//! [`PipeJob`] and pushes it onto a named queue for the worker group.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

use super::request::PipeRequest;

/// ULID ベースのジョブ ID（生成順にソート可能）
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct JobId(Ulid);

impl JobId {
    pub fn new() -> Self {
        Self(Ulid::new())
    }

    pub fn from_ulid(ulid: Ulid) -> Self {
        Self(ulid)
    }

    pub fn as_ulid(&self) -> Ulid {
        self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "job-{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipeJob {
    pub id: JobId,
    /// Name of the queue the job was pushed to.
    pub queue: String,
    pub request: PipeRequest,
    pub enqueued_at: DateTime<Utc>,
}

impl PipeJob {
    pub fn new(queue: impl Into<String>, request: PipeRequest, enqueued_at: DateTime<Utc>) -> Self {
        Self {
            id: JobId::new(),
            queue: queue.into(),
            request,
            enqueued_at,
        }
    }
}
