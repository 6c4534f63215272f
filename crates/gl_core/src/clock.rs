//! 墙钟时间源

use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};

/// 时间源特征
pub trait Clock: Send + Sync + 'static {
    /// 当前时间
    fn now(&self) -> DateTime<Utc>;

    /// 当前时间 (毫秒时间戳)
    fn now_ms(&self) -> f64 {
        self.now().timestamp_millis() as f64
    }
}

/// 系统时钟
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// 手动推进的时钟
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    /// 从指定时刻开始
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    /// 从 Unix 纪元开始
    pub fn at_epoch() -> Self {
        Self::new(DateTime::<Utc>::UNIX_EPOCH)
    }

    /// 推进指定毫秒
    pub fn advance_ms(&self, ms: i64) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now += Duration::milliseconds(ms);
    }

    /// 设置为纪元后指定毫秒
    pub fn set_ms(&self, ms: i64) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now = DateTime::<Utc>::UNIX_EPOCH + Duration::milliseconds(ms);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock_advance() {
        let clock = ManualClock::at_epoch();
        assert_eq!(clock.now_ms(), 0.0);
        clock.advance_ms(1500);
        assert_eq!(clock.now_ms(), 1500.0);
        clock.set_ms(200);
        assert_eq!(clock.now_ms(), 200.0);
    }
}
