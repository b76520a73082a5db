//! RecordingEventSink - emit されたイベントをメモリに保持（テスト用）

use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::domain::{PipeEvent, PipeRequest, Response};
use crate::ports::EventSink;

#[derive(Debug, Default)]
pub struct RecordingEventSink {
    events: Mutex<Vec<PipeEvent>>,
}

impl RecordingEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    fn guard(&self) -> MutexGuard<'_, Vec<PipeEvent>> {
        self.events.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn events(&self) -> Vec<PipeEvent> {
        self.guard().clone()
    }

    pub fn requests(&self) -> Vec<PipeRequest> {
        self.guard().iter().filter_map(PipeEvent::request).cloned().collect()
    }

    pub fn responses(&self) -> Vec<Response> {
        self.guard().iter().filter_map(PipeEvent::response).cloned().collect()
    }

    pub fn clear(&self) {
        self.guard().clear();
    }
}

impl EventSink for RecordingEventSink {
    fn emit(&self, event: PipeEvent) {
        self.guard().push(event);
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    #[test]
    fn keeps_events_in_emission_order() {
        let sink = RecordingEventSink::new();
        sink.emit(PipeEvent::IncomingPipeRequest {
            request: PipeRequest::post("/hook"),
            at: Utc::now(),
        });
        sink.emit(PipeEvent::IncomingPipeResponse {
            response: Response::ok("ok"),
            at: Utc::now(),
        });

        assert_eq!(sink.events().len(), 2);
        assert_eq!(sink.requests().len(), 1);
        assert_eq!(sink.responses()[0].body_text(), "ok");

        sink.clear();
        assert!(sink.events().is_empty());
    }
}
