//! App - アプリケーション層
//!
//! domain と ports を組み合わせて、登録からディスパッチ、非同期実行までを
//! 実装します。
//!
//! # 主要コンポーネント
//! - **Piper**: 登録面とディスパッチャ
//! - **PipeCollection / GroupStack / PipeRegistrar**: 登録時の構造
//! - **Kernel**: エラーのレンダリングとイベント通知
//! - **PiperBuilder / PipeManifest**: 起動時のワイヤリング
//! - **IncomingGateway / WorkerGroup**: キュー経由の非同期実行

pub mod builder;
pub mod collection;
pub mod gateway;
pub mod group;
pub mod kernel;
pub mod manifest;
pub mod piper;
pub mod registrar;
pub mod worker;

pub use self::builder::{BuildError, PiperBuilder};
pub use self::collection::PipeCollection;
pub use self::gateway::{Accepted, IncomingGateway};
pub use self::group::{GroupAttributes, GroupStack};
pub use self::kernel::Kernel;
pub use self::manifest::{GroupEntry, ManifestError, PipeEntry, PipeManifest};
pub use self::piper::{PipeKey, Piper, ResponseResolver};
pub use self::registrar::{ALLOWED_ATTRIBUTES, AttributeValue, PipeRegistrar};
pub use self::worker::WorkerGroup;
