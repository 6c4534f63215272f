//! 采集会话
//!
//! 单写者 actor：独占采集循环、结果摄取、平滑引擎与分发器，
//! 在同一个 select! 循环里处理命令、刷新 tick、通道事件与总线消息。
//! 每次开始采集都重建全部会话状态，停止时整体丢弃。

use std::sync::{Arc, Mutex};
use std::time::Instant;

use tokio::sync::{broadcast, mpsc, oneshot};
use tokio_util::sync::CancellationToken;

use gl_core::{Clock, GestureLinkError, Result, StatusBoard, StatusLevel};
use gl_gesture::{BusDispatcher, GestureSmoothingEngine, SmoothingConfig};
use gl_vision::{
    open_source, CaptureConstraints, CaptureLoop, CaptureLoopConfig, EncoderConfig, FrameEncoder,
    JpegFrameEncoder, RefreshTicker, SourceKind,
};
use gl_wire::{BusMessage, ChannelEvent, FrameSink, MessageBus};

use crate::ingest::ResultIngest;

/// 命令邮箱容量
const COMMAND_CAPACITY: usize = 16;

/// 会话配置
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// 显示刷新率
    pub refresh_hz: u32,
    /// 采集设备
    pub source: SourceKind,
    pub constraints: CaptureConstraints,
    pub encoder: EncoderConfig,
    pub capture: CaptureLoopConfig,
    pub smoothing: SmoothingConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            refresh_hz: 60,
            source: SourceKind::Synthetic,
            constraints: CaptureConstraints::default(),
            encoder: EncoderConfig::default(),
            capture: CaptureLoopConfig::default(),
            smoothing: SmoothingConfig::default(),
        }
    }
}

/// 会话命令
#[derive(Debug)]
pub enum SessionCommand {
    /// 开始采集
    StartCapture {
        token: CancellationToken,
        reply: oneshot::Sender<Result<()>>,
    },
    /// 停止采集
    StopCapture,
    /// 关闭会话
    Shutdown,
}

/// 会话句柄
#[derive(Debug, Clone)]
pub struct SessionHandle {
    sender: mpsc::Sender<SessionCommand>,
    capture_token: Arc<Mutex<Option<CancellationToken>>>,
}

impl SessionHandle {
    /// 开始采集，设备打开失败时返回 Device 错误
    pub async fn start_capture(&self) -> Result<()> {
        let token = CancellationToken::new();
        if let Some(previous) = self.replace_token(Some(token.clone())) {
            previous.cancel();
        }
        let (reply, response) = oneshot::channel();
        self.send(SessionCommand::StartCapture { token, reply }).await?;
        response
            .await
            .map_err(|_| GestureLinkError::Session("Start request dropped".to_string()))?
    }

    /// 停止采集
    pub async fn stop_capture(&self) -> Result<()> {
        // 先取消 tick，再通知 actor 清理
        if let Some(token) = self.replace_token(None) {
            token.cancel();
        }
        self.send(SessionCommand::StopCapture).await
    }

    /// 关闭会话
    pub async fn shutdown(&self) -> Result<()> {
        if let Some(token) = self.replace_token(None) {
            token.cancel();
        }
        self.send(SessionCommand::Shutdown).await
    }

    /// 会话是否已退出
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    fn replace_token(&self, next: Option<CancellationToken>) -> Option<CancellationToken> {
        let mut slot = self.capture_token.lock().unwrap_or_else(|e| e.into_inner());
        std::mem::replace(&mut *slot, next)
    }

    async fn send(&self, command: SessionCommand) -> Result<()> {
        self.sender
            .send(command)
            .await
            .map_err(|_| GestureLinkError::Session("Session closed".to_string()))
    }
}

/// 采集中的会话状态
struct ActiveCapture {
    capture: CaptureLoop,
    ticker: RefreshTicker,
    ingest: ResultIngest<BusDispatcher>,
}

/// 采集会话
pub struct Session {
    config: SessionConfig,
    sink: Arc<dyn FrameSink>,
    bus: MessageBus,
    clock: Arc<dyn Clock>,
    status: StatusBoard,
    commands: mpsc::Receiver<SessionCommand>,
    events: mpsc::UnboundedReceiver<ChannelEvent>,
    events_open: bool,
    bus_inbound: broadcast::Receiver<BusMessage>,
    bus_open: bool,
    active: Option<ActiveCapture>,
}

impl Session {
    /// 创建会话与句柄，`events` 为传输通道的事件流
    pub fn new(
        config: SessionConfig,
        sink: Arc<dyn FrameSink>,
        events: mpsc::UnboundedReceiver<ChannelEvent>,
        bus: MessageBus,
        clock: Arc<dyn Clock>,
        status: StatusBoard,
    ) -> (Self, SessionHandle) {
        let (sender, commands) = mpsc::channel(COMMAND_CAPACITY);
        let bus_inbound = bus.inbound();
        let session = Self {
            config,
            sink,
            bus,
            clock,
            status,
            commands,
            events,
            events_open: true,
            bus_inbound,
            bus_open: true,
            active: None,
        };
        let handle = SessionHandle {
            sender,
            capture_token: Arc::new(Mutex::new(None)),
        };
        (session, handle)
    }

    /// 运行 actor 循环，直到收到关闭命令或所有句柄被丢弃
    pub async fn run(mut self) {
        tracing::info!("Session started");
        loop {
            tokio::select! {
                tick = next_tick(&mut self.active) => match tick {
                    Some(at) => self.on_tick(at),
                    None => self.stop_capture(),
                },
                command = self.commands.recv() => match command {
                    Some(SessionCommand::StartCapture { token, reply }) => {
                        let _ = reply.send(self.start_capture(token));
                    }
                    Some(SessionCommand::StopCapture) => self.stop_capture(),
                    Some(SessionCommand::Shutdown) | None => break,
                },
                event = self.events.recv(), if self.events_open => match event {
                    Some(event) => self.on_channel_event(event),
                    None => {
                        tracing::warn!("Recognizer channel closed");
                        self.events_open = false;
                    }
                },
                inbound = self.bus_inbound.recv(), if self.bus_open => match inbound {
                    Ok(msg) => self.on_bus_message(msg),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::debug!(skipped, "Bus inbound lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => self.bus_open = false,
                },
            }
        }
        self.stop_capture();
        tracing::info!("Session stopped");
    }

    fn start_capture(&mut self, token: CancellationToken) -> Result<()> {
        self.stop_capture();

        let source = match open_source(&self.config.source, &self.config.constraints) {
            Ok(source) => source,
            Err(e) => {
                tracing::error!("Camera access failed: {}", e);
                self.status
                    .set_status(StatusLevel::Error, format!("Camera access failed: {}", e));
                return Err(e);
            }
        };

        let encoder: Arc<dyn FrameEncoder> =
            Arc::new(JpegFrameEncoder::new(self.config.encoder, self.sink.clone()));
        let capture = CaptureLoop::new(
            self.config.capture,
            source,
            encoder,
            self.clock.clone(),
            self.status.clone(),
            Instant::now(),
        );
        let dispatcher = BusDispatcher::new(self.bus.clone(), self.clock.clone(), self.status.clone());
        let engine =
            GestureSmoothingEngine::new(self.config.smoothing.clone(), self.clock.clone(), dispatcher);
        let ingest = ResultIngest::new(engine, self.clock.clone(), self.status.clone());

        self.active = Some(ActiveCapture {
            capture,
            ticker: RefreshTicker::new(self.config.refresh_hz, token),
            ingest,
        });
        self.status.set_capturing(true);
        self.status
            .set_status(StatusLevel::Success, "Camera started - Show your hand clearly");
        tracing::info!(refresh_hz = self.config.refresh_hz, "Capture started");
        Ok(())
    }

    /// 停止采集 (幂等)
    fn stop_capture(&mut self) {
        let Some(mut active) = self.active.take() else {
            return;
        };
        active.ticker.token().cancel();
        active.capture.stop();
        active.ingest.clear();
        self.status.set_capturing(false);
        self.status.set_status(StatusLevel::Warning, "Camera stopped");
        tracing::info!(frames = active.capture.frame_count(), "Capture stopped");
    }

    fn on_tick(&mut self, at: Instant) {
        if let Some(active) = self.active.as_mut() {
            active.capture.tick(at);
        }
    }

    fn on_channel_event(&mut self, event: ChannelEvent) {
        match event {
            ChannelEvent::Connected => {
                self.status.set_server_connected(true);
                self.status.set_status(StatusLevel::Success, "Connected to server");
            }
            ChannelEvent::Disconnected => {
                self.status.set_server_connected(false);
                self.status
                    .set_status(StatusLevel::Warning, "Disconnected from server");
            }
            ChannelEvent::Result(result) => match self.active.as_mut() {
                Some(active) => {
                    active.ingest.ingest(result);
                }
                None => tracing::trace!("Ignoring result while capture is stopped"),
            },
            ChannelEvent::RemoteError(message) => {
                tracing::error!("Recognizer error: {}", message);
                self.status
                    .set_status(StatusLevel::Error, format!("Processing error: {}", message));
            }
            ChannelEvent::Status(message) => {
                tracing::info!("Recognizer status: {}", message);
                self.status.set_status(StatusLevel::Info, message);
            }
        }
    }

    fn on_bus_message(&mut self, msg: BusMessage) {
        if let BusMessage::ExtensionStatus { connected } = msg {
            tracing::info!(connected, "Extension status changed");
            self.status.set_extension_connected(connected);
        }
    }
}

/// 下一次刷新；未采集时永不就绪，令牌取消后返回 None
async fn next_tick(active: &mut Option<ActiveCapture>) -> Option<Instant> {
    match active {
        Some(active) => active.ticker.next().await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use gl_core::{ManualClock, RawGestureObservation, Telemetry};
    use gl_wire::{InboundResult, OutboundFrameMessage};
    use tokio::task::JoinHandle;

    #[derive(Default)]
    struct RecordingSink {
        frames: Mutex<Vec<OutboundFrameMessage>>,
    }

    impl RecordingSink {
        fn count(&self) -> usize {
            self.frames.lock().unwrap().len()
        }
    }

    impl FrameSink for RecordingSink {
        fn send_frame(&self, msg: OutboundFrameMessage) -> Result<()> {
            self.frames.lock().unwrap().push(msg);
            Ok(())
        }
    }

    struct Harness {
        handle: SessionHandle,
        status: StatusBoard,
        bus: MessageBus,
        events: mpsc::UnboundedSender<ChannelEvent>,
        sink: Arc<RecordingSink>,
        task: JoinHandle<()>,
    }

    fn small_config() -> SessionConfig {
        SessionConfig {
            refresh_hz: 200,
            constraints: CaptureConstraints {
                ideal_width: 64,
                ideal_height: 48,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    fn harness(config: SessionConfig) -> Harness {
        let sink = Arc::new(RecordingSink::default());
        let (events, events_rx) = mpsc::unbounded_channel();
        let bus = MessageBus::default();
        let status = StatusBoard::new();
        let (session, handle) = Session::new(
            config,
            sink.clone(),
            events_rx,
            bus.clone(),
            Arc::new(ManualClock::at_epoch()),
            status.clone(),
        );
        let task = tokio::spawn(session.run());
        Harness {
            handle,
            status,
            bus,
            events,
            sink,
            task,
        }
    }

    async fn wait_for(status: &StatusBoard, pred: impl FnMut(&Telemetry) -> bool) {
        let mut rx = status.subscribe();
        let result = tokio::time::timeout(Duration::from_secs(5), rx.wait_for(pred)).await;
        assert!(matches!(result, Ok(Ok(_))), "status condition not reached");
    }

    fn gesture_result(action: &str) -> ChannelEvent {
        ChannelEvent::Result(InboundResult {
            gesture: Some(RawGestureObservation::new(action, 0.95).with_description("Play/Pause")),
            ..Default::default()
        })
    }

    #[tokio::test]
    async fn test_start_transmits_and_stop_halts() {
        let h = harness(small_config());
        tokio_test::assert_ok!(h.handle.start_capture().await);
        let snapshot = h.status.snapshot();
        assert!(snapshot.capturing);
        assert_eq!(snapshot.status.message, "Camera started - Show your hand clearly");

        for _ in 0..200 {
            if h.sink.count() >= 2 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(h.sink.count() >= 2);

        h.handle.stop_capture().await.unwrap();
        wait_for(&h.status, |t| !t.capturing).await;
        assert_eq!(h.status.snapshot().status.level, StatusLevel::Warning);
        assert_eq!(h.status.snapshot().status.message, "Camera stopped");

        // 在途编码允许完成，之后不再有新帧
        tokio::time::sleep(Duration::from_millis(100)).await;
        let settled = h.sink.count();
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(h.sink.count(), settled);
    }

    #[tokio::test]
    async fn test_device_failure_reported() {
        let h = harness(SessionConfig {
            source: SourceKind::StillImage("/nonexistent/gesturelink/frame.png".into()),
            ..small_config()
        });
        let err = tokio_test::assert_err!(h.handle.start_capture().await);
        assert!(matches!(err, GestureLinkError::Device(_)));

        let snapshot = h.status.snapshot();
        assert!(!snapshot.capturing);
        assert_eq!(snapshot.status.level, StatusLevel::Error);
        assert!(snapshot.status.message.starts_with("Camera access failed"));
    }

    #[tokio::test]
    async fn test_results_ignored_until_capture_starts() {
        let h = harness(small_config());
        let mut commands = h.bus.subscribe();

        for _ in 0..3 {
            h.events.send(gesture_result("play_pause")).unwrap();
        }
        h.events
            .send(ChannelEvent::RemoteError("warming up".to_string()))
            .unwrap();
        wait_for(&h.status, |t| t.status.message == "Processing error: warming up").await;
        assert!(commands.try_recv().is_err());

        h.handle.start_capture().await.unwrap();
        for _ in 0..3 {
            h.events.send(gesture_result("play_pause")).unwrap();
        }
        let received = tokio::time::timeout(Duration::from_secs(5), commands.recv())
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(
            received,
            BusMessage::GestureCommand { ref action, .. } if action == "play_pause"
        ));
        wait_for(&h.status, |t| t.status.message == "Executed: Play/Pause").await;
    }

    #[tokio::test]
    async fn test_channel_connectivity_status() {
        let h = harness(small_config());
        h.events.send(ChannelEvent::Connected).unwrap();
        wait_for(&h.status, |t| t.server_connected).await;

        h.events.send(ChannelEvent::Disconnected).unwrap();
        wait_for(&h.status, |t| !t.server_connected).await;
        assert_eq!(h.status.snapshot().status.message, "Disconnected from server");
        assert_eq!(h.status.snapshot().status.level, StatusLevel::Warning);
    }

    #[tokio::test]
    async fn test_extension_status_from_bus() {
        let h = harness(small_config());
        h.bus.post_inbound(BusMessage::ExtensionStatus { connected: true });
        wait_for(&h.status, |t| t.extension_connected).await;
        h.bus.post_inbound(BusMessage::ExtensionStatus { connected: false });
        wait_for(&h.status, |t| !t.extension_connected).await;
    }

    #[tokio::test]
    async fn test_shutdown_ends_session() {
        let h = harness(small_config());
        h.handle.start_capture().await.unwrap();
        h.handle.shutdown().await.unwrap();

        tokio::time::timeout(Duration::from_secs(5), h.task)
            .await
            .unwrap()
            .unwrap();
        assert!(!h.status.snapshot().capturing);
        assert!(h.handle.is_closed());
        assert!(matches!(
            h.handle.start_capture().await,
            Err(GestureLinkError::Session(_))
        ));
    }
}
