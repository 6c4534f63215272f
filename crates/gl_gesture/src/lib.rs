//! # gl_gesture - GestureLink Gesture Smoothing
//!
//! 把逐帧的手势观测去抖为稀疏的动作分发：时间窗口历史、动作缓冲、
//! 一致性与置信度判定、全局冷却，以及总线与按键分发。

pub mod buffer;
pub mod gate;
pub mod smoothing;
pub mod dispatcher;

pub use buffer::{ActionBuffer, BUFFER_CAPACITY};
pub use gate::{DispatchGate, DISPATCH_COOLDOWN_MS};
pub use smoothing::{GestureHistoryEntry, GestureSmoothingEngine, ObserveOutcome, SmoothingConfig};
pub use dispatcher::{key_for_action, ActionDispatcher, BusDispatcher, Key, KeySimulator, LoggingKeySimulator};
