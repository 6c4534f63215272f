//! 识别端通道协议定义
//!
//! 每条文本帧都是 `{"event": <名称>, "data": <载荷>}` 形式的 JSON 信封。

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};

use gl_core::{GestureLinkError, RawGestureObservation, Result};

/// 出站帧消息
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboundFrameMessage {
    /// 编码后帧 (data URL)
    pub image: String,
    /// 发送时刻 (毫秒)，识别端原样回传
    pub timestamp: f64,
}

/// 入站处理结果
///
/// 每条结果自成一体，除回传的时间戳外没有关联 ID。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InboundResult {
    /// 处理后帧 (data URL)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    /// 手势观测
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gesture: Option<RawGestureObservation>,
    /// 回传的发送时刻
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<f64>,
    /// 识别端处理耗时 (毫秒)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processing_time: Option<f64>,
}

/// 客户端 -> 识别端
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ClientMessage {
    VideoFrame(OutboundFrameMessage),
}

/// 识别端 -> 客户端
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ServerMessage {
    /// 处理结果
    ProcessedFrame(InboundResult),
    /// 识别端错误
    Error { message: String },
    /// 识别端状态文本
    Status { message: String },
}

impl ClientMessage {
    /// 序列化为 JSON
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(GestureLinkError::Serialization)
    }

    /// 从 JSON 反序列化
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(GestureLinkError::Serialization)
    }
}

impl ServerMessage {
    /// 序列化为 JSON
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(GestureLinkError::Serialization)
    }

    /// 从 JSON 反序列化
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(GestureLinkError::Serialization)
    }
}

/// 将字节封装为 data URL
pub fn encode_data_url(mime: &str, bytes: &[u8]) -> String {
    format!("data:{};base64,{}", mime, STANDARD.encode(bytes))
}

/// 解出 data URL 中的字节
pub fn decode_data_url(url: &str) -> Result<Vec<u8>> {
    let (header, payload) = url
        .split_once(',')
        .ok_or_else(|| GestureLinkError::Protocol("data URL has no payload".to_string()))?;
    if !header.ends_with(";base64") {
        return Err(GestureLinkError::Protocol(format!(
            "unsupported data URL header: {}",
            header
        )));
    }
    STANDARD
        .decode(payload)
        .map_err(|e| GestureLinkError::Protocol(e.to_string()))
}
