//! IncomingGateway - Webhook の受け口
//!
//! The gateway does not run pipes inline. It checks the request targets the
//! configured incoming path, queues it as a [`PipeJob`] and answers at once
//! with [`Piper::response`]. Workers pick the job up later.

use std::sync::Arc;

use tracing::debug;

use super::piper::Piper;
use crate::config::PiperConfig;
use crate::domain::{JobId, PipeError, PipeJob, PipeRequest, Response};
use crate::ports::{Clock, JobQueue, SystemClock};

/// Result of accepting a request.
#[derive(Debug, Clone, PartialEq)]
pub struct Accepted {
    pub job_id: JobId,
    pub response: Response,
}

pub struct IncomingGateway {
    path: String,
    queue_name: String,
    queue: Arc<dyn JobQueue>,
    piper: Arc<Piper>,
    clock: Arc<dyn Clock>,
}

impl IncomingGateway {
    pub fn new(config: &PiperConfig, queue: Arc<dyn JobQueue>, piper: Arc<Piper>) -> Self {
        Self {
            path: config.incoming_path().to_string(),
            queue_name: config.queue.clone(),
            queue,
            piper,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn queue_name(&self) -> &str {
        &self.queue_name
    }

    /// Whether `request` targets the incoming path.
    pub fn accepts(&self, request: &PipeRequest) -> bool {
        request.path() == self.path
    }

    pub async fn accept(&self, request: PipeRequest) -> Result<Accepted, PipeError> {
        if !self.accepts(&request) {
            return Err(PipeError::not_found(&request));
        }

        let response = self.piper.response(&request);
        let job = PipeJob::new(self.queue_name.clone(), request, self.clock.now());
        let job_id = job.id;
        self.queue.push(&self.queue_name, job).await?;
        debug!(job = %job_id, queue = %self.queue_name, "pipe request queued");

        Ok(Accepted { job_id, response })
    }
}
