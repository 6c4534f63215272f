//! # gl_wire - GestureLink Wire
//!
//! 传输链路：识别端 WebSocket 通道、帧协议信封、跨上下文消息总线。

pub mod protocol;
pub mod client;
pub mod bus;

pub use protocol::{ClientMessage, InboundResult, OutboundFrameMessage, ServerMessage};
pub use client::{ChannelConfig, ChannelEvent, FrameSink, TransmissionChannel};
pub use bus::{BusConfig, BusMessage, MessageBus};
