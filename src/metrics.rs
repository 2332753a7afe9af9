use std::time::Duration;

use crate::breaker::BreakerState;

/// BreakerMetrics はある時点のブレーカーのスナップショット。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BreakerMetrics {
    pub name: String,
    pub state: BreakerState,
    pub total: u32,
    pub failures: u32,
    /// 生成以降に確定した遷移の数。クローズ状態のウィンドウ更新も含む。
    pub transitions: u64,
    /// 現在のウィンドウ（オープン状態ではクールダウン）の残り時間。
    pub window_remaining: Duration,
}

#[cfg(feature = "metrics")]
pub(crate) struct MetricsRecorder {
    name: String,
    transitions: opentelemetry::metrics::Counter<u64>,
    rejected: opentelemetry::metrics::Counter<u64>,
}

#[cfg(feature = "metrics")]
impl MetricsRecorder {
    pub(crate) fn new(name: &str) -> Self {
        let meter = opentelemetry::global::meter("k1s0-breaker");
        Self {
            name: name.to_string(),
            transitions: meter
                .u64_counter("k1s0.breaker.transitions")
                .with_description("サーキットブレーカーの状態遷移数")
                .build(),
            rejected: meter
                .u64_counter("k1s0.breaker.rejected")
                .with_description("オープン状態で拒否されたリクエスト数")
                .build(),
        }
    }

    pub(crate) fn transition(&self, from: BreakerState, to: BreakerState) {
        self.transitions.add(
            1,
            &[
                opentelemetry::KeyValue::new("breaker", self.name.clone()),
                opentelemetry::KeyValue::new("from", from.as_str()),
                opentelemetry::KeyValue::new("to", to.as_str()),
            ],
        );
    }

    pub(crate) fn rejected(&self) {
        self.rejected.add(
            1,
            &[opentelemetry::KeyValue::new("breaker", self.name.clone())],
        );
    }
}

#[cfg(not(feature = "metrics"))]
pub(crate) struct MetricsRecorder;

#[cfg(not(feature = "metrics"))]
impl MetricsRecorder {
    pub(crate) fn new(_name: &str) -> Self {
        Self
    }

    #[allow(clippy::unused_self)]
    pub(crate) fn transition(&self, _from: BreakerState, _to: BreakerState) {}

    #[allow(clippy::unused_self)]
    pub(crate) fn rejected(&self) {}
}
