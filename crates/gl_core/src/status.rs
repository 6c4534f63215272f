//! 状态面板
//!
//! 以 watch 快照的形式对外发布 FPS、延迟、手势显示与状态行。

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

/// 状态级别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusLevel {
    #[default]
    Info,
    Success,
    Warning,
    Error,
}

impl StatusLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            StatusLevel::Info => "info",
            StatusLevel::Success => "success",
            StatusLevel::Warning => "warning",
            StatusLevel::Error => "error",
        }
    }
}

/// 状态行
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatusLine {
    pub level: StatusLevel,
    pub message: String,
}

/// 遥测快照
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Telemetry {
    /// 最近一次采样的帧率
    pub fps: Option<u32>,
    /// 最近一次往返延迟 (毫秒，未钳制)
    pub latency_ms: Option<f64>,
    /// 手指数
    pub finger_count: u32,
    /// 置信度百分比
    pub confidence_pct: u32,
    /// 当前动作描述
    pub current_action: String,
    /// 状态行
    pub status: StatusLine,
    /// 识别端是否已连接
    pub server_connected: bool,
    /// 外部扩展是否已连接
    pub extension_connected: bool,
    /// 是否正在采集
    pub capturing: bool,
}

/// 状态面板 (可克隆，所有克隆共享同一快照)
#[derive(Debug, Clone)]
pub struct StatusBoard {
    tx: Arc<watch::Sender<Telemetry>>,
}

impl StatusBoard {
    /// 创建新面板
    pub fn new() -> Self {
        let (tx, _) = watch::channel(Telemetry::default());
        Self { tx: Arc::new(tx) }
    }

    /// 订阅快照变更
    pub fn subscribe(&self) -> watch::Receiver<Telemetry> {
        self.tx.subscribe()
    }

    /// 当前快照
    pub fn snapshot(&self) -> Telemetry {
        self.tx.borrow().clone()
    }

    /// 发布帧率
    pub fn set_fps(&self, fps: u32) {
        self.tx.send_modify(|t| t.fps = Some(fps));
    }

    /// 发布延迟
    pub fn set_latency(&self, latency_ms: f64) {
        self.tx.send_modify(|t| t.latency_ms = Some(latency_ms));
    }

    /// 更新手势显示字段
    pub fn show_gesture(&self, finger_count: u32, confidence_pct: u32, description: &str) {
        self.tx.send_modify(|t| {
            t.finger_count = finger_count;
            t.confidence_pct = confidence_pct;
            t.current_action = if description.is_empty() {
                "No action".to_string()
            } else {
                description.to_string()
            };
        });
    }

    /// 更新状态行
    pub fn set_status(&self, level: StatusLevel, message: impl Into<String>) {
        let message = message.into();
        self.tx.send_modify(|t| t.status = StatusLine { level, message });
    }

    pub fn set_server_connected(&self, connected: bool) {
        self.tx.send_modify(|t| t.server_connected = connected);
    }

    pub fn set_extension_connected(&self, connected: bool) {
        self.tx.send_modify(|t| t.extension_connected = connected);
    }

    pub fn set_capturing(&self, capturing: bool) {
        self.tx.send_modify(|t| t.capturing = capturing);
    }
}

impl Default for StatusBoard {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_snapshot() {
        let board = StatusBoard::new();
        let other = board.clone();
        other.set_fps(58);
        other.set_status(StatusLevel::Warning, "Camera stopped");
        let snap = board.snapshot();
        assert_eq!(snap.fps, Some(58));
        assert_eq!(snap.status.level, StatusLevel::Warning);
        assert_eq!(snap.status.message, "Camera stopped");
    }

    #[test]
    fn test_empty_description_shows_no_action() {
        let board = StatusBoard::new();
        board.show_gesture(2, 81, "");
        let snap = board.snapshot();
        assert_eq!(snap.finger_count, 2);
        assert_eq!(snap.confidence_pct, 81);
        assert_eq!(snap.current_action, "No action");
    }

    #[tokio::test]
    async fn test_subscriber_sees_change() {
        let board = StatusBoard::new();
        let mut rx = board.subscribe();
        board.set_latency(42.0);
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow().latency_ms, Some(42.0));
    }
}
