//! 分发闸门
//!
//! 全局冷却：任意两次分发之间至少间隔 `cooldown_ms`，与动作种类无关。

use chrono::{DateTime, Utc};

/// 默认冷却时间 (毫秒)
pub const DISPATCH_COOLDOWN_MS: i64 = 1000;

/// 分发闸门
#[derive(Debug, Clone)]
pub struct DispatchGate {
    last_dispatch: Option<DateTime<Utc>>,
    cooldown_ms: i64,
}

impl DispatchGate {
    pub fn new(cooldown_ms: i64) -> Self {
        Self {
            last_dispatch: None,
            cooldown_ms,
        }
    }

    /// `now` 时刻是否允许分发
    pub fn is_open(&self, now: DateTime<Utc>) -> bool {
        match self.last_dispatch {
            Some(last) => (now - last).num_milliseconds() >= self.cooldown_ms,
            None => true,
        }
    }

    /// 记录一次分发
    pub fn record(&mut self, now: DateTime<Utc>) {
        self.last_dispatch = Some(now);
    }

    /// 上次分发时刻
    pub fn last_dispatch(&self) -> Option<DateTime<Utc>> {
        self.last_dispatch
    }
}

impl Default for DispatchGate {
    fn default() -> Self {
        Self::new(DISPATCH_COOLDOWN_MS)
    }
}
