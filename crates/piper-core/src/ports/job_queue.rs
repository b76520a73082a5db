//! JobQueue port - 非同期実行用のジョブキュー
//!
//! The incoming endpoint pushes [`PipeJob`]s here; workers pop them. Queues
//! are addressed by name so one process can serve several channels.

use std::time::Duration;

use async_trait::async_trait;

use crate::domain::PipeJob;

#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("queue [{0}] is closed")]
    Closed(String),

    #[error("queue operation failed: {0}")]
    OperationFailed(String),
}

/// JobQueue は PipeJob を配送するためのキュー
///
/// # 契約
/// - `push` は待たない
/// - `pop` は最大 `timeout` だけ待ち、空なら `Ok(None)`
/// - `pop` の future を drop してもジョブは失われない
#[async_trait]
pub trait JobQueue: Send + Sync {
    async fn push(&self, queue: &str, job: PipeJob) -> Result<(), QueueError>;

    async fn pop(&self, queue: &str, timeout: Duration) -> Result<Option<PipeJob>, QueueError>;

    /// Jobs waiting on `queue`.
    async fn pending(&self, queue: &str) -> Result<usize, QueueError>;
}
