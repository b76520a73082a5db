//! Domain model (cues, pipes, requests, responses, errors, ...).
//!
//! - cue / pipe: マッチングの対象となるルール
//! - request / response: 境界層とのアダプタ
//! - action / middleware: マッチ後に実行されるもの
//! - errors / events / job: 境界層・非同期実行と共有する値

pub mod action;
pub mod cue;
pub mod errors;
pub mod events;
pub mod job;
pub mod middleware;
pub mod pipe;
pub mod request;
pub mod response;

pub use self::action::{Action, ControllerAction, HandlerFn, INVOKE_METHOD, IntoAction};
pub use self::cue::{ANY, CuePattern, FALLBACK_PLACEHOLDER, Segment};
pub use self::errors::{ErrorKind, PipeError};
pub use self::events::PipeEvent;
pub use self::job::{JobId, PipeJob};
pub use self::middleware::{Endpoint, Middleware, MiddlewareRef, Next, middleware_fn};
pub use self::pipe::{BoundPipe, Pipe, PipeContext};
pub use self::request::PipeRequest;
pub use self::response::{Body, IntoResponse, Response};
