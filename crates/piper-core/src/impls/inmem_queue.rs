//! InMemoryJobQueue - 開発用・テスト用のジョブキュー
//!
//! # 実装詳細
//! - HashMap<String, VecDeque<PipeJob>> で queue 名ごとに管理
//! - std Mutex は await を跨いで保持しない
//! - tokio Notify で push を待機中の pop に通知

use std::collections::{HashMap, VecDeque};
use std::pin::pin;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Notify;
use tokio::time::Instant;

use crate::domain::PipeJob;
use crate::ports::{JobQueue, QueueError};

/// # 使用例
/// ```ignore
/// let queue = InMemoryJobQueue::new();
/// queue.push("default", job).await?;
/// let job = queue.pop("default", Duration::from_secs(5)).await?;
/// ```
#[derive(Debug, Default)]
pub struct InMemoryJobQueue {
    queues: Mutex<HashMap<String, VecDeque<PipeJob>>>,
    notify: Notify,
}

impl InMemoryJobQueue {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<String, VecDeque<PipeJob>>>, QueueError> {
        self.queues
            .lock()
            .map_err(|e| QueueError::OperationFailed(format!("queue lock poisoned: {e}")))
    }

    fn try_pop(&self, queue: &str) -> Result<Option<PipeJob>, QueueError> {
        Ok(self.lock()?.get_mut(queue).and_then(VecDeque::pop_front))
    }
}

#[async_trait]
impl JobQueue for InMemoryJobQueue {
    async fn push(&self, queue: &str, job: PipeJob) -> Result<(), QueueError> {
        self.lock()?
            .entry(queue.to_string())
            .or_default()
            .push_back(job);
        self.notify.notify_waiters();
        Ok(())
    }

    async fn pop(&self, queue: &str, timeout: Duration) -> Result<Option<PipeJob>, QueueError> {
        let deadline = Instant::now() + timeout;
        loop {
            // 通知の登録をキュー確認より先に行い、取りこぼしを防ぐ
            let mut notified = pin!(self.notify.notified());
            notified.as_mut().enable();

            if let Some(job) = self.try_pop(queue)? {
                return Ok(Some(job));
            }
            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return Ok(None);
            }
        }
    }

    async fn pending(&self, queue: &str) -> Result<usize, QueueError> {
        Ok(self.lock()?.get(queue).map_or(0, VecDeque::len))
    }
}
