use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::builder::BreakerBuilder;
use crate::clock::{duration_to_nanos, Clock, SystemClock};
use crate::config::BreakerConfig;
use crate::error::{BreakerError, ConfigError};
use crate::metrics::{BreakerMetrics, MetricsRecorder};
use crate::policy::TransitionPolicy;

const STATE_BITS: u32 = 2;
const STATE_MASK: u64 = 0b11;
const MAX_UNTIL: u64 = u64::MAX >> STATE_BITS;
const SNAPSHOT_RETRIES: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum BreakerState {
    /// リクエストをすべて通す。
    Closed = 0,
    /// `at_least_reqs` 件のプローブだけを通す。
    HalfOpen = 1,
    /// リクエストを即座に拒否する。
    Open = 2,
}

impl BreakerState {
    fn from_bits(bits: u64) -> Self {
        match bits & STATE_MASK {
            1 => Self::HalfOpen,
            2 => Self::Open,
            _ => Self::Closed,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Closed => "closed",
            Self::HalfOpen => "half_open",
            Self::Open => "open",
        }
    }
}

impl fmt::Display for BreakerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 終端（epoch からのナノ秒）を上位ビットに、状態を下位 2 ビットに詰める。
fn pack(state: BreakerState, until: u64) -> u64 {
    (until.min(MAX_UNTIL) << STATE_BITS) | state as u64
}

fn unpack(window: u64) -> (BreakerState, u64) {
    (BreakerState::from_bits(window), window >> STATE_BITS)
}

/// Breaker はロックを使わずに複数の呼び出し元から共有できるサーキットブレーカー。
///
/// 状態と現在のウィンドウ（オープン状態ではクールダウン）の終端は 1 つの `AtomicU64` に
/// まとめて保持し、状態遷移はすべてこの値に対する compare-and-swap で確定する。
/// CAS に勝った呼び出し元だけがカウンタをリセットする。負けた呼び出し元は再試行せず、
/// 自分が読んだスナップショットで下した判断をそのまま使う。
pub struct Breaker {
    name: String,
    window: AtomicU64,
    transitions: AtomicU64,

    interval: u64,
    cooldown: u64,
    at_least_reqs: u32,

    total: AtomicU32,
    failures: AtomicU32,

    to_open: Box<dyn TransitionPolicy>,
    to_closed: Box<dyn TransitionPolicy>,

    clock: Arc<dyn Clock>,
    epoch: Instant,
    recorder: MetricsRecorder,
}

impl Breaker {
    /// new はシステム時計を使うブレーカーを生成する。
    ///
    /// `to_open` はクローズ状態で失敗するたびに呼ばれ、真ならオープン状態へ遷移する。
    /// `to_closed` はハーフオープン状態でプローブ数が `at_least_reqs` に達した後に呼ばれ、
    /// 真ならクローズ状態へ、偽ならオープン状態へ遷移する。
    pub fn new<O, C>(
        config: BreakerConfig,
        to_open: O,
        to_closed: C,
    ) -> Result<Self, ConfigError>
    where
        O: TransitionPolicy + 'static,
        C: TransitionPolicy + 'static,
    {
        Self::from_parts(
            config,
            Box::new(to_open),
            Box::new(to_closed),
            Arc::new(SystemClock),
        )
    }

    pub fn builder() -> BreakerBuilder {
        BreakerBuilder::default()
    }

    pub(crate) fn from_parts(
        config: BreakerConfig,
        to_open: Box<dyn TransitionPolicy>,
        to_closed: Box<dyn TransitionPolicy>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;

        let interval = duration_to_nanos(config.interval);
        let epoch = clock.now();
        let recorder = MetricsRecorder::new(&config.name);

        Ok(Self {
            name: config.name,
            window: AtomicU64::new(pack(BreakerState::Closed, interval)),
            transitions: AtomicU64::new(0),
            interval,
            cooldown: duration_to_nanos(config.cooldown),
            at_least_reqs: config.at_least_reqs,
            total: AtomicU32::new(0),
            failures: AtomicU32::new(0),
            to_open,
            to_closed,
            clock,
            epoch,
            recorder,
        })
    }

    /// execute はブレーカーが受け付けた場合に限り `operation` を呼び出し元のスレッドで一度だけ実行する。
    ///
    /// 受け付けなかった場合は `operation` を呼ばずに `BreakerError::Open` を返す。
    /// それ以外は `operation` の結果をそのまま返す（エラーは `BreakerError::Inner` に入る）。
    ///
    /// オープン→ハーフオープン、ハーフオープン→クローズの遷移で CAS に負けた呼び出し元も
    /// 受け付けられる。境界付近では、異なる確定状態のもとで複数の呼び出しが同時に通ることがある。
    pub fn execute<T, E, F>(&self, operation: F) -> Result<T, BreakerError<E>>
    where
        F: FnOnce() -> Result<T, E>,
    {
        if !self.ready() {
            return Err(BreakerError::Open);
        }

        self.total.fetch_add(1, Ordering::SeqCst);
        let result = operation();
        if result.is_err() {
            self.failures.fetch_add(1, Ordering::SeqCst);
            self.on_failure();
        }

        result.map_err(BreakerError::Inner)
    }

    /// call は `execute` の非同期版。future は呼び出し元のタスク上で await される。
    pub async fn call<T, E, F, Fut>(&self, operation: F) -> Result<T, BreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if !self.ready() {
            return Err(BreakerError::Open);
        }

        self.total.fetch_add(1, Ordering::SeqCst);
        let result = operation().await;
        if result.is_err() {
            self.failures.fetch_add(1, Ordering::SeqCst);
            self.on_failure();
        }

        result.map_err(BreakerError::Inner)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// state は現在の状態を返す。時間経過による遷移はここでは行わない。
    pub fn state(&self) -> BreakerState {
        unpack(self.window.load(Ordering::SeqCst)).0
    }

    /// counts は現在のウィンドウの `(total, failures)` を返す。
    pub fn counts(&self) -> (u32, u32) {
        let total = self.total.load(Ordering::SeqCst);
        let failures = self.failures.load(Ordering::SeqCst);
        // 加算とリセットは線形化されないため failures を total で頭打ちにする
        (total, failures.min(total))
    }

    /// window_end は現在のウィンドウ（オープン状態ではクールダウン）の終端を返す。
    pub fn window_end(&self) -> Instant {
        let (_, until) = unpack(self.window.load(Ordering::SeqCst));
        self.epoch + Duration::from_nanos(until)
    }

    /// metrics は現在のスナップショットを返す。
    ///
    /// カウンタを読む間に遷移が確定した場合は数回まで読み直す。それでも落ち着かない場合、
    /// カウンタは最後に読んだ状態に対するベストエフォートの値になる。
    pub fn metrics(&self) -> BreakerMetrics {
        let mut word = self.window.load(Ordering::SeqCst);
        let (mut total, mut failures) = self.counts();
        for _ in 0..SNAPSHOT_RETRIES {
            let current = self.window.load(Ordering::SeqCst);
            if current == word {
                break;
            }
            word = current;
            (total, failures) = self.counts();
        }
        let (state, until) = unpack(word);
        BreakerMetrics {
            name: self.name.clone(),
            state,
            total,
            failures,
            transitions: self.transitions.load(Ordering::SeqCst),
            window_remaining: Duration::from_nanos(until.saturating_sub(self.now())),
        }
    }

    fn ready(&self) -> bool {
        let observed = self.window.load(Ordering::SeqCst);
        let (state, until) = unpack(observed);
        let now = self.now();

        match state {
            BreakerState::Closed => {
                if now > until {
                    self.commit(
                        observed,
                        now.saturating_add(self.interval),
                        state,
                        BreakerState::Closed,
                    );
                }
                true
            }
            BreakerState::Open => {
                if now <= until {
                    tracing::trace!(
                        breaker = %self.name,
                        "オープン状態のためリクエストを拒否しました"
                    );
                    self.recorder.rejected();
                    return false;
                }
                self.commit(
                    observed,
                    now.saturating_add(self.interval),
                    state,
                    BreakerState::HalfOpen,
                );
                true
            }
            BreakerState::HalfOpen => {
                let (total, failures) = self.counts();
                if total < self.at_least_reqs {
                    return true;
                }

                if self.to_closed.should_transition(total, failures) {
                    self.commit(
                        observed,
                        now.saturating_add(self.interval),
                        state,
                        BreakerState::Closed,
                    );
                    return true;
                }

                self.commit(
                    observed,
                    now.saturating_add(self.cooldown),
                    state,
                    BreakerState::Open,
                );
                tracing::trace!(
                    breaker = %self.name,
                    total,
                    failures,
                    "プローブ結果によりリクエストを拒否しました"
                );
                self.recorder.rejected();
                false
            }
        }
    }

    fn on_failure(&self) {
        let observed = self.window.load(Ordering::SeqCst);
        if unpack(observed).0 != BreakerState::Closed {
            return;
        }

        let (total, failures) = self.counts();
        if self.to_open.should_transition(total, failures) {
            let now = self.now();
            self.commit(
                observed,
                now.saturating_add(self.cooldown),
                BreakerState::Closed,
                BreakerState::Open,
            );
        }
    }

    /// commit は `window` を `observed` から `(to, until)` へ CAS し、勝った場合だけ
    /// カウンタをリセットする。
    fn commit(&self, observed: u64, until: u64, from: BreakerState, to: BreakerState) {
        if self
            .window
            .compare_exchange(observed, pack(to, until), Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return;
        }

        let total = self.total.swap(0, Ordering::SeqCst);
        let failures = self.failures.swap(0, Ordering::SeqCst).min(total);
        self.transitions.fetch_add(1, Ordering::SeqCst);
        self.recorder.transition(from, to);

        match (from, to) {
            (BreakerState::Closed, BreakerState::Closed) => {
                tracing::debug!(
                    breaker = %self.name, from = %from, to = %to, total, failures,
                    "新しいウィンドウを開始しました"
                );
            }
            (_, BreakerState::Open) => {
                tracing::warn!(
                    breaker = %self.name, from = %from, to = %to, total, failures,
                    "サーキットブレーカーがオープン状態に遷移しました"
                );
            }
            _ => {
                tracing::info!(
                    breaker = %self.name, from = %from, to = %to, total, failures,
                    "サーキットブレーカーの状態が遷移しました"
                );
            }
        }
    }

    fn now(&self) -> u64 {
        duration_to_nanos(self.clock.now().saturating_duration_since(self.epoch))
    }
}

impl fmt::Debug for Breaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (total, failures) = self.counts();
        f.debug_struct("Breaker")
            .field("name", &self.name)
            .field("state", &self.state())
            .field("total", &total)
            .field("failures", &failures)
            .field("at_least_reqs", &self.at_least_reqs)
            .finish_non_exhaustive()
    }
}
