//! 全局错误处理机制

use thiserror::Error;

/// GestureLink 统一错误类型
#[derive(Error, Debug)]
pub enum GestureLinkError {
    #[error("Capture device error: {0}")]
    Device(String),

    #[error("Frame encode error: {0}")]
    Encode(String),

    #[error("Channel error: {0}")]
    Channel(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Message bus error: {0}")]
    Bus(String),

    #[error("Session error: {0}")]
    Session(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Unknown error: {0}")]
    Unknown(String),
}

/// 统一 Result 类型别名
pub type Result<T> = std::result::Result<T, GestureLinkError>;
