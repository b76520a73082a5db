//! EventSink port - イベント記録の抽象化
//!
//! The kernel reports every accepted request and every produced response.
//! Production wiring usually ignores them; tests record them.

use crate::domain::PipeEvent;

pub trait EventSink: Send + Sync {
    fn emit(&self, event: PipeEvent);
}

/// Drops every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopEventSink;

impl EventSink for NoopEventSink {
    fn emit(&self, _event: PipeEvent) {}
}
