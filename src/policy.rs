//! 状態遷移ポリシー。
//!
//! `to_open` はクローズ状態で失敗が起きるたびに、`to_closed` はハーフオープン状態で
//! プローブ数が `at_least_reqs` に達した後に、現在のウィンドウの `(total, failures)` で呼ばれる。

/// TransitionPolicy は `(total, failures)` から遷移するかどうかを決める。
#[cfg_attr(any(test, feature = "mock"), mockall::automock)]
pub trait TransitionPolicy: Send + Sync {
    fn should_transition(&self, total: u32, failures: u32) -> bool;
}

impl<F> TransitionPolicy for F
where
    F: Fn(u32, u32) -> bool + Send + Sync,
{
    fn should_transition(&self, total: u32, failures: u32) -> bool {
        self(total, failures)
    }
}

/// failures_at_least は失敗数が `threshold` 以上で真を返す。
pub fn failures_at_least(threshold: u32) -> impl TransitionPolicy {
    move |_total: u32, failures: u32| failures >= threshold
}

/// failures_at_most は失敗数が `limit` 以下で真を返す。
pub fn failures_at_most(limit: u32) -> impl TransitionPolicy {
    move |_total: u32, failures: u32| failures <= limit
}

/// no_failures はウィンドウ内に失敗が 1 件もないときだけ真を返す。
pub fn no_failures() -> impl TransitionPolicy {
    failures_at_most(0)
}

/// failure_rate_at_least は `min_total` 件以上のリクエストがあり、
/// 失敗率が `rate` 以上のときに真を返す。
pub fn failure_rate_at_least(rate: f64, min_total: u32) -> impl TransitionPolicy {
    move |total: u32, failures: u32| {
        if total == 0 || total < min_total {
            return false;
        }
        f64::from(failures) / f64::from(total) >= rate
    }
}
