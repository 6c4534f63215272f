//! 跨上下文消息总线
//!
//! 把手势命令广播给所有外部监听端 (浏览器扩展或同类)，
//! 同时收集监听端上报的连接状态。投递尽力而为，不做确认。

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::{
    extract::ws::{Message, WebSocket, WebSocketUpgrade},
    extract::State,
    response::Response,
    routing::get,
    Router,
};
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use gl_core::{GestureLinkError, Result};

/// 总线消息
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum BusMessage {
    /// 手势命令
    #[serde(rename = "GESTURE_COMMAND")]
    GestureCommand { action: String, timestamp: i64 },
    /// 扩展连接状态
    #[serde(rename = "EXTENSION_STATUS")]
    ExtensionStatus { connected: bool },
}

impl BusMessage {
    /// 序列化为 JSON
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(GestureLinkError::Serialization)
    }

    /// 从 JSON 反序列化
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(GestureLinkError::Serialization)
    }
}

/// 总线配置
#[derive(Debug, Clone)]
pub struct BusConfig {
    /// 监听地址
    pub addr: SocketAddr,
    /// 广播缓冲容量
    pub capacity: usize,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from(([127, 0, 0, 1], 8766)),
            capacity: 64,
        }
    }
}

/// 消息总线 (可克隆，所有克隆共享同一组通道)
#[derive(Debug, Clone)]
pub struct MessageBus {
    /// 发往监听端
    outbound: broadcast::Sender<BusMessage>,
    /// 来自监听端
    inbound: broadcast::Sender<BusMessage>,
    /// 已上报连接的监听端数量
    connected: Arc<AtomicUsize>,
}

impl MessageBus {
    /// 创建新总线
    pub fn new(capacity: usize) -> Self {
        let (outbound, _) = broadcast::channel(capacity);
        let (inbound, _) = broadcast::channel(capacity);
        Self {
            outbound,
            inbound,
            connected: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// 发布消息，返回收到消息的监听端数量 (无监听端时为 0)
    pub fn publish(&self, msg: BusMessage) -> usize {
        self.outbound.send(msg).unwrap_or(0)
    }

    /// 订阅发往监听端的消息
    pub fn subscribe(&self) -> broadcast::Receiver<BusMessage> {
        self.outbound.subscribe()
    }

    /// 订阅监听端上报的消息
    pub fn inbound(&self) -> broadcast::Receiver<BusMessage> {
        self.inbound.subscribe()
    }

    /// 注入一条监听端消息
    pub fn post_inbound(&self, msg: BusMessage) {
        let _ = self.inbound.send(msg);
    }

    /// 已上报连接的监听端数量
    pub fn connected_listeners(&self) -> usize {
        self.connected.load(Ordering::Acquire)
    }

    /// 更新单个监听端的连接状态，只在聚合状态可能变化时上报
    fn announce(&self, was: bool, now: bool) {
        match (was, now) {
            (false, true) => {
                self.connected.fetch_add(1, Ordering::AcqRel);
                self.post_inbound(BusMessage::ExtensionStatus { connected: true });
            }
            (true, false) => {
                let remaining = self.connected.fetch_sub(1, Ordering::AcqRel) - 1;
                if remaining == 0 {
                    self.post_inbound(BusMessage::ExtensionStatus { connected: false });
                }
            }
            _ => {}
        }
    }

    /// 构建 Axum 路由
    pub fn build_router(&self) -> Router {
        Router::new()
            .route("/bus", get(bus_upgrade))
            .layer(TraceLayer::new_for_http())
            .with_state(self.clone())
    }

    /// 绑定地址并启动服务
    pub async fn serve(&self, addr: SocketAddr, shutdown: CancellationToken) -> Result<()> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| GestureLinkError::Bus(e.to_string()))?;
        self.serve_listener(listener, shutdown).await
    }

    /// 在已绑定的监听器上启动服务
    pub async fn serve_listener(
        &self,
        listener: TcpListener,
        shutdown: CancellationToken,
    ) -> Result<()> {
        if let Ok(addr) = listener.local_addr() {
            tracing::info!("Message bus listening on ws://{}/bus", addr);
        }
        axum::serve(listener, self.build_router())
            .with_graceful_shutdown(async move { shutdown.cancelled().await })
            .await
            .map_err(|e| GestureLinkError::Bus(e.to_string()))
    }
}

impl Default for MessageBus {
    fn default() -> Self {
        Self::new(BusConfig::default().capacity)
    }
}

async fn bus_upgrade(ws: WebSocketUpgrade, State(bus): State<MessageBus>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, bus))
}

/// 处理单个监听端连接
async fn handle_socket(socket: WebSocket, bus: MessageBus) {
    let conn_id = Uuid::new_v4();
    let mut commands = bus.subscribe();
    let (mut sender, mut receiver) = socket.split();
    let mut announced = false;
    tracing::debug!(%conn_id, "Bus listener attached");

    loop {
        tokio::select! {
            outbound = commands.recv() => match outbound {
                Ok(msg) => {
                    let Ok(text) = msg.to_json() else { continue };
                    if sender.send(Message::Text(text)).await.is_err() {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::debug!(%conn_id, skipped, "Bus listener lagging");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
            incoming = receiver.next() => match incoming {
                Some(Ok(Message::Text(text))) => match BusMessage::from_json(&text) {
                    Ok(BusMessage::ExtensionStatus { connected }) => {
                        bus.announce(announced, connected);
                        announced = connected;
                    }
                    Ok(other) => tracing::debug!(%conn_id, "Ignoring listener message: {:?}", other),
                    Err(e) => tracing::debug!(%conn_id, "Malformed listener message: {}", e),
                },
                Some(Ok(Message::Close(_))) | None | Some(Err(_)) => break,
                Some(Ok(_)) => {}
            },
        }
    }

    bus.announce(announced, false);
    tracing::debug!(%conn_id, "Bus listener detached");
}
