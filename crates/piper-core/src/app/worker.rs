//! WorkerGroup - キューからジョブを取り出して Kernel に流す
//!
//! Handlers are synchronous, so each job runs on tokio's blocking pool.
//! Shutdown only stops workers from taking new jobs; a job already running
//! finishes first.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use super::kernel::Kernel;
use crate::ports::JobQueue;

/// How long one `pop` waits before re-checking for shutdown.
const POLL_TIMEOUT: Duration = Duration::from_secs(1);

/// Pause after a queue error.
const ERROR_BACKOFF: Duration = Duration::from_millis(200);

/// Worker group handle.
/// - `request_shutdown()` でワーカー全体が止まる
/// - `shutdown_and_join()` で全ワーカーの終了を待てる
pub struct WorkerGroup {
    shutdown_tx: watch::Sender<bool>,
    joins: Vec<JoinHandle<()>>,
}

impl WorkerGroup {
    /// Spawn `n` workers popping from `queue_name`.
    pub fn spawn(
        n: usize,
        queue: Arc<dyn JobQueue>,
        queue_name: impl Into<String>,
        kernel: Arc<Kernel>,
    ) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let queue_name: Arc<str> = Arc::from(queue_name.into());

        let joins = (0..n)
            .map(|worker_id| {
                let worker = Worker {
                    id: worker_id,
                    queue: Arc::clone(&queue),
                    queue_name: Arc::clone(&queue_name),
                    kernel: Arc::clone(&kernel),
                };
                let rx = shutdown_rx.clone();
                tokio::spawn(async move { worker.run(rx).await })
            })
            .collect();

        Self { shutdown_tx, joins }
    }

    pub fn len(&self) -> usize {
        self.joins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.joins.is_empty()
    }

    pub fn request_shutdown(&self) {
        // receivers may already be gone
        let _ = self.shutdown_tx.send(true);
    }

    pub async fn shutdown_and_join(self) {
        self.request_shutdown();
        for join in self.joins {
            if let Err(e) = join.await {
                error!(error = %e, "worker task panicked");
            }
        }
    }
}

struct Worker {
    id: usize,
    queue: Arc<dyn JobQueue>,
    queue_name: Arc<str>,
    kernel: Arc<Kernel>,
}

impl Worker {
    async fn run(self, mut shutdown_rx: watch::Receiver<bool>) {
        info!(worker = self.id, queue = %self.queue_name, "worker started");
        loop {
            if *shutdown_rx.borrow() {
                break;
            }

            let popped = tokio::select! {
                changed = shutdown_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    continue;
                }
                popped = self.queue.pop(&self.queue_name, POLL_TIMEOUT) => popped,
            };

            let job = match popped {
                Ok(Some(job)) => job,
                Ok(None) => continue,
                Err(e) => {
                    warn!(worker = self.id, error = %e, "queue pop failed");
                    tokio::time::sleep(ERROR_BACKOFF).await;
                    continue;
                }
            };

            let job_id = job.id;
            let kernel = Arc::clone(&self.kernel);
            let handled =
                tokio::task::spawn_blocking(move || kernel.handle(&job.request)).await;
            match handled {
                Ok(response) => {
                    info!(worker = self.id, job = %job_id, status = response.status, "job handled")
                }
                Err(e) => error!(worker = self.id, job = %job_id, error = %e, "job panicked"),
            }
        }
        info!(worker = self.id, "worker stopped");
    }
}
