//! 手势数据模型

use serde::{Deserialize, Serialize};

/// 无动作哨兵值
pub const NO_ACTION: &str = "none";

/// 归一化关键点
///
/// `x`、`y` 以处理后帧为参照，取值 [0, 1]。
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Landmark {
    pub x: f64,
    pub y: f64,
    /// 深度 (识别端可选提供)
    #[serde(default)]
    pub z: f64,
}

impl Landmark {
    /// 创建平面关键点
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y, z: 0.0 }
    }
}

/// 单帧原始手势观测
///
/// 识别端每返回一次带手势的结果就产生一个，所有字段缺省时取默认值。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawGestureObservation {
    /// 伸出的手指数
    #[serde(default, rename = "fingers")]
    pub finger_count: u32,
    /// 置信度 [0, 1]
    #[serde(default)]
    pub confidence: f64,
    /// 可读描述
    #[serde(default)]
    pub description: String,
    /// 动作标识 (缺失或 "none" 表示无动作)
    #[serde(default)]
    pub action: Option<String>,
    /// 关键点序列
    #[serde(default)]
    pub landmarks: Vec<Landmark>,
    /// 手势名称
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gesture_name: Option<String>,
}

impl RawGestureObservation {
    /// 创建带动作的观测
    pub fn new(action: impl Into<String>, confidence: f64) -> Self {
        Self {
            action: Some(action.into()),
            confidence,
            ..Default::default()
        }
    }

    /// 设置描述
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// 设置关键点
    pub fn with_landmarks(mut self, landmarks: Vec<Landmark>) -> Self {
        self.landmarks = landmarks;
        self
    }

    /// 可执行的动作标识，"none" 与缺失均返回 None
    pub fn actionable(&self) -> Option<&str> {
        self.action
            .as_deref()
            .filter(|action| !action.is_empty() && *action != NO_ACTION)
    }

    /// 置信度百分比 (四舍五入)
    pub fn confidence_percent(&self) -> u32 {
        (self.confidence * 100.0).round().max(0.0) as u32
    }
}
