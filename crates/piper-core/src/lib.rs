//! piper-core
//!
//! Keyword/cue based request routing for chat bots and webhooks.
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（cue, pipe, request, response, action, middleware, errors, events, job）
//! - **matching**: Validator chain（Key, Cue, Parameter, Pattern）
//! - **ports**: 抽象化レイヤー（JobQueue, EventSink, Clock）
//! - **app**: アプリケーションロジック（piper, collection, registrar, kernel, builder, gateway, worker）
//! - **typed**: 型付き Controller API（Controller trait, ControllerRegistry）
//! - **impls**: 実装（InMemoryJobQueue, RecordingEventSink）
//! - **config**: PiperConfig（TOML）
//! - **testing**: PipeFake（イベントを記録するテストダブル）

pub mod app;
pub mod config;
pub mod domain;
pub mod impls;
pub mod matching;
pub mod ports;
pub mod testing;
pub mod typed;

pub use self::app::{Kernel, Piper, PiperBuilder};
pub use self::config::PiperConfig;
pub use self::domain::{Action, PipeError, PipeRequest, Response};
