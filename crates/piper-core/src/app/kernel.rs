//! Kernel - 境界層
//!
//! Turns dispatch results into responses the host can send back: no match
//! becomes a 404 naming the request, every other error is rendered with its
//! status. Both the accepted request and the produced response are reported
//! to the [`EventSink`].

use std::sync::Arc;

use tracing::{error, info};

use super::piper::Piper;
use crate::domain::{PipeError, PipeEvent, PipeRequest, Response};
use crate::ports::{Clock, EventSink, NoopEventSink, SystemClock};

#[derive(Clone)]
pub struct Kernel {
    piper: Arc<Piper>,
    events: Arc<dyn EventSink>,
    clock: Arc<dyn Clock>,
}

impl Kernel {
    pub fn new(piper: Arc<Piper>) -> Self {
        Self {
            piper,
            events: Arc::new(NoopEventSink),
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_events(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn piper(&self) -> &Arc<Piper> {
        &self.piper
    }

    /// Dispatch without rendering errors.
    pub fn try_handle(&self, request: &PipeRequest) -> Result<Response, PipeError> {
        self.piper.dispatch(request)
    }

    pub fn handle(&self, request: &PipeRequest) -> Response {
        self.events.emit(PipeEvent::IncomingPipeRequest {
            request: request.clone(),
            at: self.clock.now(),
        });

        let response = match self.try_handle(request) {
            Ok(response) => response,
            Err(err) => self.render(&err),
        };
        info!(request = %request, status = response.status, "pipe request handled");

        self.events.emit(PipeEvent::IncomingPipeResponse {
            response: response.clone(),
            at: self.clock.now(),
        });
        response
    }

    pub fn render(&self, err: &PipeError) -> Response {
        match err {
            PipeError::NotFound { .. } => Response::not_found(err.to_string()),
            PipeError::Abort(response) => (**response).clone(),
            _ => {
                error!(error = %err, kind = ?err.kind(), "pipe request failed");
                Response::text(err.status(), err.to_string())
            }
        }
    }
}
