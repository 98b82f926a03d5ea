//! Generation job state machine
//!
//! A job progresses WAITING → IN_PROGRESS → {DONE | ERROR}. WAITING is
//! skipped entirely when every line of the track is already cached.
//! CANCELLED is part of the status vocabulary but no internal transition
//! currently assigns it; there is no cancel endpoint.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One lyric line of a track; ordering by `start_time_ms` is significant
/// and preserved through generation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LyricLine {
    pub start_time_ms: i64,
    pub words: String,
}

/// Generation job status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    /// Queued behind earlier jobs with uncached work
    Waiting,
    /// Body is resolving lines
    InProgress,
    /// Unrecoverable failure while resolving a line
    Error,
    /// Defined terminal state, currently never assigned
    Cancelled,
    /// All lines resolved; result ready for delivery
    Done,
}

impl JobStatus {
    /// Terminal states never transition further
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Done | JobStatus::Error | JobStatus::Cancelled)
    }
}

/// One resolved line of the final result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineImage {
    pub image_uri: String,
    pub start_time_ms: i64,
    pub words: String,
}

/// The central job entity, owned by the orchestrator registry
#[derive(Debug, Clone)]
pub struct GenerationJob {
    /// Unique job identifier, assigned at creation, never reused
    pub id: Uuid,

    /// Current status
    pub status: JobStatus,

    /// Lines settled so far; only incremented while `InProgress`
    pub done: usize,

    /// Number of lines in the track
    pub total: usize,

    /// The lyric lines this job resolves, in original order
    pub lines: Vec<LyricLine>,

    /// Ordered results, present only once `Done`
    pub result: Option<Vec<LineImage>>,

    /// Job creation time
    pub created_at: DateTime<Utc>,
}

impl GenerationJob {
    /// Create a new job. Jobs whose lines are all cached skip the waiting
    /// queue and start `InProgress` immediately.
    pub fn new(id: Uuid, lines: Vec<LyricLine>, all_cached: bool) -> Self {
        let total = lines.len();
        Self {
            id,
            status: if all_cached {
                JobStatus::InProgress
            } else {
                JobStatus::Waiting
            },
            done: 0,
            total,
            lines,
            result: None,
            created_at: Utc::now(),
        }
    }
}

/// Immutable view of a job returned by the poll endpoint.
///
/// Shape depends on status; a `Done` snapshot is delivered at most once.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "status", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobSnapshot {
    /// Queued; `queue_position` is 1-based with slot 1 reserved for the
    /// job currently in progress, so it is always >= 2
    Waiting { queue_position: usize },
    /// Running; `done <= total` always
    InProgress { done: usize, total: usize },
    /// Aborted by a line-resolution failure
    Error,
    /// Never produced internally, kept for vocabulary completeness
    Cancelled,
    /// Final result in original line order
    Done { lyrics: Vec<LineImage> },
}
