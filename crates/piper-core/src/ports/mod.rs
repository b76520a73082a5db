//! Ports - 抽象化レイヤー
//!
//! ディスパッチャが外部に依存する箇所（キュー、イベント記録、時刻）を
//! trait として定義します。実装は `impls` に置きます。

pub mod clock;
pub mod event_sink;
pub mod job_queue;

pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::event_sink::{EventSink, NoopEventSink};
pub use self::job_queue::{JobQueue, QueueError};
