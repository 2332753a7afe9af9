//! k1s0-breaker: ロックフリーなサーキットブレーカーライブラリ。
//!
//! クローズ・ハーフオープン・オープンの 3 状態と、ウィンドウ単位の
//! リクエスト数・失敗数カウンタで、失敗が続く依存先への呼び出しを遮断する。
//! 時間経過による遷移はバックグラウンドタスクを使わず、呼び出しのたびに判定する。

pub mod breaker;
pub mod builder;
pub mod clock;
pub mod config;
pub mod error;
pub mod metrics;
pub mod policy;

pub use breaker::{Breaker, BreakerState};
pub use builder::BreakerBuilder;
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::BreakerConfig;
pub use error::{BreakerError, ConfigError};
pub use metrics::BreakerMetrics;
pub use policy::TransitionPolicy;

#[cfg(feature = "mock")]
pub use clock::MockClock;
#[cfg(feature = "mock")]
pub use policy::MockTransitionPolicy;
