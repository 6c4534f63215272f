//! # gl_pipeline - GestureLink Pipeline
//!
//! 采集会话 actor 与结果摄取：把采集循环、传输通道、平滑引擎和
//! 消息总线串成一条实时流水线。

pub mod ingest;
pub mod session;

pub use ingest::ResultIngest;
pub use session::{Session, SessionCommand, SessionConfig, SessionHandle};
