//! 动作分发
//!
//! 已确认的动作一方面作为 GESTURE_COMMAND 发布到总线，另一方面映射为
//! 本地模拟按键。两者都是尽力而为，失败不回传给平滑引擎。

use std::fmt;
use std::sync::Arc;

use gl_core::{Clock, Result, StatusBoard, StatusLevel};
use gl_wire::{BusMessage, MessageBus};

/// 分发特征
pub trait ActionDispatcher: Send + 'static {
    /// 分发已确认的动作
    fn dispatch(&mut self, action: &str, description: &str);
}

/// 媒体控制按键
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Space,
    ArrowUp,
    ArrowDown,
    ArrowLeft,
    ArrowRight,
    Char(char),
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Space => f.write_str("Space"),
            Key::ArrowUp => f.write_str("ArrowUp"),
            Key::ArrowDown => f.write_str("ArrowDown"),
            Key::ArrowLeft => f.write_str("ArrowLeft"),
            Key::ArrowRight => f.write_str("ArrowRight"),
            Key::Char(c) => write!(f, "{}", c),
        }
    }
}

/// 动作到按键的映射，未知动作返回 None
pub fn key_for_action(action: &str) -> Option<Key> {
    match action {
        "play_pause" => Some(Key::Space),
        "volume_up" => Some(Key::ArrowUp),
        "volume_down" => Some(Key::ArrowDown),
        "forward" => Some(Key::ArrowRight),
        "backward" => Some(Key::ArrowLeft),
        "next_video" => Some(Key::Char('n')),
        "prev_video" => Some(Key::Char('p')),
        _ => None,
    }
}

/// 按键模拟特征
pub trait KeySimulator: Send + 'static {
    fn press(&mut self, key: Key) -> Result<()>;
}

/// 只记录日志的按键模拟器
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingKeySimulator;

impl KeySimulator for LoggingKeySimulator {
    fn press(&mut self, key: Key) -> Result<()> {
        tracing::info!(key = %key, "Simulating key press");
        Ok(())
    }
}

/// 总线分发器
pub struct BusDispatcher<K: KeySimulator = LoggingKeySimulator> {
    bus: MessageBus,
    keys: K,
    clock: Arc<dyn Clock>,
    status: StatusBoard,
}

impl BusDispatcher<LoggingKeySimulator> {
    pub fn new(bus: MessageBus, clock: Arc<dyn Clock>, status: StatusBoard) -> Self {
        Self::with_keys(bus, LoggingKeySimulator, clock, status)
    }
}

impl<K: KeySimulator> BusDispatcher<K> {
    /// 使用自定义按键模拟器
    pub fn with_keys(bus: MessageBus, keys: K, clock: Arc<dyn Clock>, status: StatusBoard) -> Self {
        Self {
            bus,
            keys,
            clock,
            status,
        }
    }

    pub fn keys(&self) -> &K {
        &self.keys
    }
}

impl<K: KeySimulator> ActionDispatcher for BusDispatcher<K> {
    fn dispatch(&mut self, action: &str, description: &str) {
        let listeners = self.bus.publish(BusMessage::GestureCommand {
            action: action.to_string(),
            timestamp: self.clock.now().timestamp_millis(),
        });
        tracing::debug!(action, listeners, "Gesture command published");

        if let Some(key) = key_for_action(action) {
            if let Err(e) = self.keys.press(key) {
                tracing::warn!("Key simulation failed: {}", e);
            }
        }

        self.status
            .set_status(StatusLevel::Success, format!("Executed: {}", description));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gl_core::ManualClock;

    #[derive(Default)]
    struct RecordingKeys {
        pressed: Vec<Key>,
    }

    impl KeySimulator for RecordingKeys {
        fn press(&mut self, key: Key) -> Result<()> {
            self.pressed.push(key);
            Ok(())
        }
    }

    #[test]
    fn test_key_map() {
        assert_eq!(key_for_action("play_pause"), Some(Key::Space));
        assert_eq!(key_for_action("volume_down"), Some(Key::ArrowDown));
        assert_eq!(key_for_action("prev_video"), Some(Key::Char('p')));
        assert_eq!(key_for_action("wave"), None);
        assert_eq!(Key::Char('n').to_string(), "n");
    }

    #[test]
    fn test_dispatch_publishes_and_presses() {
        let bus = MessageBus::default();
        let mut rx = bus.subscribe();
        let clock = Arc::new(ManualClock::at_epoch());
        clock.set_ms(1_700_000_000_123);
        let status = StatusBoard::new();
        let mut dispatcher =
            BusDispatcher::with_keys(bus, RecordingKeys::default(), clock, status.clone());

        dispatcher.dispatch("forward", "Skip forward");

        assert_eq!(
            tokio_test::block_on(rx.recv()).unwrap(),
            BusMessage::GestureCommand {
                action: "forward".into(),
                timestamp: 1_700_000_000_123,
            }
        );
        assert_eq!(dispatcher.keys().pressed, vec![Key::ArrowRight]);
        let snapshot = status.snapshot();
        assert_eq!(snapshot.status.level, StatusLevel::Success);
        assert_eq!(snapshot.status.message, "Executed: Skip forward");
    }

    #[test]
    fn test_unknown_action_skips_key() {
        let bus = MessageBus::default();
        let mut dispatcher = BusDispatcher::with_keys(
            bus,
            RecordingKeys::default(),
            Arc::new(ManualClock::at_epoch()),
            StatusBoard::new(),
        );
        dispatcher.dispatch("wave", "Wave");
        assert!(dispatcher.keys().pressed.is_empty());
    }
}
