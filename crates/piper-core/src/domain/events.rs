//! Events - パイプ処理の観測イベント
//!
//! The kernel emits one event when a request is accepted and one when its
//! response is produced. `PipeFake` records them for assertions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::request::PipeRequest;
use super::response::Response;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum PipeEvent {
    IncomingPipeRequest {
        request: PipeRequest,
        at: DateTime<Utc>,
    },
    IncomingPipeResponse {
        response: Response,
        at: DateTime<Utc>,
    },
}

impl PipeEvent {
    pub fn request(&self) -> Option<&PipeRequest> {
        match self {
            Self::IncomingPipeRequest { request, .. } => Some(request),
            Self::IncomingPipeResponse { .. } => None,
        }
    }

    pub fn response(&self) -> Option<&Response> {
        match self {
            Self::IncomingPipeResponse { response, .. } => Some(response),
            Self::IncomingPipeRequest { .. } => None,
        }
    }

    pub fn at(&self) -> DateTime<Utc> {
        match self {
            Self::IncomingPipeRequest { at, .. } | Self::IncomingPipeResponse { at, .. } => *at,
        }
    }
}
