use std::time::Duration;

use crate::error::ConfigError;

/// BreakerConfig はブレーカーの時間・件数に関する設定を保持する。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BreakerConfig {
    /// ログとメトリクスに付与される名前。
    pub name: String,
    /// クローズ状態のウィンドウ長。ハーフオープン状態の期限にも使われる。
    pub interval: Duration,
    /// オープン状態を維持する期間。
    pub cooldown: Duration,
    /// ハーフオープン状態で `to_closed` を評価する前に通すプローブ数。
    pub at_least_reqs: u32,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            name: "default".to_string(),
            interval: Duration::from_secs(60),
            cooldown: Duration::from_secs(30),
            at_least_reqs: 3,
        }
    }
}

impl BreakerConfig {
    pub fn new(interval: Duration, cooldown: Duration, at_least_reqs: u32) -> Self {
        Self {
            interval,
            cooldown,
            at_least_reqs,
            ..Default::default()
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_cooldown(mut self, cooldown: Duration) -> Self {
        self.cooldown = cooldown;
        self
    }

    pub fn with_at_least_reqs(mut self, at_least_reqs: u32) -> Self {
        self.at_least_reqs = at_least_reqs;
        self
    }

    /// validate は 0 の期間・プローブ数を拒否する。
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.interval.is_zero() {
            return Err(ConfigError::ZeroInterval);
        }
        if self.cooldown.is_zero() {
            return Err(ConfigError::ZeroCooldown);
        }
        if self.at_least_reqs == 0 {
            return Err(ConfigError::ZeroAtLeastReqs);
        }
        Ok(())
    }
}
