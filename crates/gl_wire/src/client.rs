//! 识别端传输通道
//!
//! 与远端识别服务之间的持久双工 WebSocket 连接。发送与接收互不配对，
//! 入站结果通过事件通道异步送达。

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite::Message};

use gl_core::{GestureLinkError, Result};

use crate::protocol::{ClientMessage, InboundResult, OutboundFrameMessage, ServerMessage};

/// 通道配置
#[derive(Debug, Clone)]
pub struct ChannelConfig {
    /// 识别端地址
    pub url: String,
    /// 断线重连间隔
    pub reconnect_delay: Duration,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            url: "ws://127.0.0.1:5000/ws".to_string(),
            reconnect_delay: Duration::from_secs(2),
        }
    }
}

/// 通道事件
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelEvent {
    /// 已连接
    Connected,
    /// 已断开
    Disconnected,
    /// 处理结果
    Result(InboundResult),
    /// 识别端错误
    RemoteError(String),
    /// 识别端状态文本
    Status(String),
}

/// 帧接收端特征
///
/// 发送不得阻塞调用方，失败由调用方自行丢弃。
pub trait FrameSink: Send + Sync + 'static {
    fn send_frame(&self, msg: OutboundFrameMessage) -> Result<()>;
}

/// 传输通道
pub struct TransmissionChannel {
    config: ChannelConfig,
    /// 出站队列 (无界，不施加反压)
    outbound_tx: mpsc::UnboundedSender<OutboundFrameMessage>,
    /// 是否已连接
    connected: Arc<AtomicBool>,
    /// 连接任务
    task: JoinHandle<()>,
}

impl TransmissionChannel {
    /// 启动通道，返回通道与事件接收器
    pub fn spawn(config: ChannelConfig) -> (Self, mpsc::UnboundedReceiver<ChannelEvent>) {
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let connected = Arc::new(AtomicBool::new(false));

        let task = tokio::spawn(run_connection(
            config.clone(),
            outbound_rx,
            events_tx,
            connected.clone(),
        ));

        let channel = Self {
            config,
            outbound_tx,
            connected,
            task,
        };
        (channel, events_rx)
    }

    /// 是否已连接
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    /// 获取配置
    pub fn config(&self) -> &ChannelConfig {
        &self.config
    }
}

impl FrameSink for TransmissionChannel {
    fn send_frame(&self, msg: OutboundFrameMessage) -> Result<()> {
        if !self.is_connected() {
            return Err(GestureLinkError::Channel("Not connected".to_string()));
        }
        self.outbound_tx
            .send(msg)
            .map_err(|e| GestureLinkError::Channel(e.to_string()))
    }
}

impl Drop for TransmissionChannel {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// 连接循环：连接、收发、断线后重连
async fn run_connection(
    config: ChannelConfig,
    mut outbound_rx: mpsc::UnboundedReceiver<OutboundFrameMessage>,
    events_tx: mpsc::UnboundedSender<ChannelEvent>,
    connected: Arc<AtomicBool>,
) {
    loop {
        match connect_async(config.url.as_str()).await {
            Ok((stream, _)) => {
                tracing::info!("Connected to gesture server at {}", config.url);
                connected.store(true, Ordering::Release);
                let _ = events_tx.send(ChannelEvent::Connected);

                let (mut write, mut read) = stream.split();
                loop {
                    tokio::select! {
                        outbound = outbound_rx.recv() => {
                            let Some(frame) = outbound else {
                                return;
                            };
                            let text = match ClientMessage::VideoFrame(frame).to_json() {
                                Ok(text) => text,
                                Err(e) => {
                                    tracing::debug!("Dropping frame: {}", e);
                                    continue;
                                }
                            };
                            if let Err(e) = write.send(Message::Text(text)).await {
                                tracing::debug!("Send failed: {}", e);
                                break;
                            }
                        }
                        incoming = read.next() => match incoming {
                            Some(Ok(Message::Text(text))) => handle_text(&text, &events_tx),
                            Some(Ok(Message::Close(_))) | None => break,
                            Some(Ok(_)) => {}
                            Some(Err(e)) => {
                                tracing::warn!("Channel read error: {}", e);
                                break;
                            }
                        },
                    }
                }

                connected.store(false, Ordering::Release);
                tracing::info!("Disconnected from gesture server");
                let _ = events_tx.send(ChannelEvent::Disconnected);
            }
            Err(e) => {
                tracing::debug!("Connect to {} failed: {}", config.url, e);
            }
        }

        if events_tx.is_closed() {
            return;
        }
        tokio::time::sleep(config.reconnect_delay).await;

        // 断线期间积压的帧已过期
        while outbound_rx.try_recv().is_ok() {}
    }
}

/// 解析入站文本帧
fn handle_text(text: &str, events_tx: &mpsc::UnboundedSender<ChannelEvent>) {
    let event = match ServerMessage::from_json(text) {
        Ok(ServerMessage::ProcessedFrame(result)) => ChannelEvent::Result(result),
        Ok(ServerMessage::Error { message }) => ChannelEvent::RemoteError(message),
        Ok(ServerMessage::Status { message }) => ChannelEvent::Status(message),
        Err(e) => {
            tracing::warn!("Malformed inbound message: {}", e);
            return;
        }
    };
    let _ = events_tx.send(event);
}
