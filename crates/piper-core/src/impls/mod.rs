//! Impls - ports の実装（開発用・テスト用）
//!
//! # 含まれる実装
//! - **InMemoryJobQueue**: プロセス内のジョブキュー
//! - **RecordingEventSink**: イベントをメモリに記録

pub mod inmem_queue;
pub mod recording_sink;

pub use self::inmem_queue::InMemoryJobQueue;
pub use self::recording_sink::RecordingEventSink;
