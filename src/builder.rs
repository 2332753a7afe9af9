use std::sync::Arc;
use std::time::Duration;

use crate::breaker::Breaker;
use crate::clock::{Clock, SystemClock};
use crate::config::BreakerConfig;
use crate::error::ConfigError;
use crate::policy::TransitionPolicy;

/// BreakerBuilder は [`Breaker`] を段階的に組み立てる。
/// ポリシーが指定されていない場合、`build` は `ConfigError` を返す。
#[derive(Default)]
pub struct BreakerBuilder {
    config: BreakerConfig,
    to_open: Option<Box<dyn TransitionPolicy>>,
    to_closed: Option<Box<dyn TransitionPolicy>>,
    clock: Option<Arc<dyn Clock>>,
}

impl BreakerBuilder {
    pub fn config(mut self, config: BreakerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.config.name = name.into();
        self
    }

    pub fn interval(mut self, interval: Duration) -> Self {
        self.config.interval = interval;
        self
    }

    pub fn cooldown(mut self, cooldown: Duration) -> Self {
        self.config.cooldown = cooldown;
        self
    }

    pub fn at_least_reqs(mut self, at_least_reqs: u32) -> Self {
        self.config.at_least_reqs = at_least_reqs;
        self
    }

    pub fn to_open(mut self, policy: impl TransitionPolicy + 'static) -> Self {
        self.to_open = Some(Box::new(policy));
        self
    }

    pub fn to_closed(mut self, policy: impl TransitionPolicy + 'static) -> Self {
        self.to_closed = Some(Box::new(policy));
        self
    }

    /// clock を省略した場合は [`SystemClock`] が使われる。
    pub fn clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Some(Arc::new(clock));
        self
    }

    pub fn build(self) -> Result<Breaker, ConfigError> {
        self.config.validate()?;
        let to_open = self.to_open.ok_or(ConfigError::MissingToOpen)?;
        let to_closed = self.to_closed.ok_or(ConfigError::MissingToClosed)?;
        let clock: Arc<dyn Clock> = match self.clock {
            Some(clock) => clock,
            None => Arc::new(SystemClock),
        };
        Breaker::from_parts(self.config, to_open, to_closed, clock)
    }
}
