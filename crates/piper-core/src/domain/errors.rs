//! Errors - エラー型と分類
//!
//! Matching never fails per validator; only the aggregate "no pipe matched"
//! condition surfaces as [`PipeError::NotFound`].

use thiserror::Error;

use super::request::PipeRequest;
use super::response::Response;
use crate::ports::QueueError;

/// ErrorKind は境界層での扱いを決める分類
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// No pipe matched; rendered as 404.
    NotFound,
    /// The matched pipe's action or middleware could not be resolved.
    Resolution,
    /// Invalid registration-time input.
    Configuration,
    /// A handler asked for a response to be used verbatim.
    ShortCircuit,
    /// Anything raised by user handlers or middleware.
    Handler,
    /// Queue or other infrastructure failure.
    Infrastructure,
}

#[derive(Debug, Error)]
pub enum PipeError {
    #[error("no pipe matches [{method} {target}]")]
    NotFound { method: String, target: String },

    #[error("{0}")]
    ActionResolution(String),

    #[error("invalid pipe configuration: {0}")]
    Configuration(String),

    #[error("handler responded early with status {}", .0.status)]
    Abort(Box<Response>),

    #[error("invalid pipe request: {0}")]
    InvalidRequest(String),

    #[error("handler failed: {0}")]
    Handler(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error(transparent)]
    Queue(#[from] QueueError),
}

impl PipeError {
    pub fn not_found(request: &PipeRequest) -> Self {
        Self::NotFound {
            method: request.method().to_string(),
            target: request.target().to_string(),
        }
    }

    /// Stop processing and answer with `response` as-is.
    pub fn abort(response: Response) -> Self {
        Self::Abort(Box::new(response))
    }

    pub fn handler(error: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self::Handler(error.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::ActionResolution(_) => ErrorKind::Resolution,
            Self::Configuration(_) => ErrorKind::Configuration,
            Self::Abort(_) => ErrorKind::ShortCircuit,
            Self::InvalidRequest(_) | Self::Handler(_) => ErrorKind::Handler,
            Self::Queue(_) => ErrorKind::Infrastructure,
        }
    }

    /// HTTP-style status the boundary should render this error with.
    pub fn status(&self) -> u16 {
        match self {
            Self::NotFound { .. } => 404,
            Self::Abort(response) => response.status,
            Self::InvalidRequest(_) => 400,
            _ => 500,
        }
    }
}
