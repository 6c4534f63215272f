//! GestureLink Daemon - Headless 采集守护进程

mod config;

use std::sync::Arc;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use gl_core::{Clock, StatusBoard, StatusLevel, SystemClock, Telemetry};
use gl_pipeline::Session;
use gl_wire::{MessageBus, TransmissionChannel};

use crate::config::DaemonConfig;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // 初始化日志
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "gesturelink_daemon=debug,gl_pipeline=info,gl_gesture=info,gl_wire=info,gl_vision=info,tower_http=info"
                    .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = DaemonConfig::from_env()?;

    tracing::info!("GestureLink Daemon starting...");
    tracing::debug!(?config, "Loaded configuration");

    let status = StatusBoard::new();
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let shutdown = CancellationToken::new();

    // 状态行日志
    let status_logger = tokio::spawn(log_status(status.subscribe(), shutdown.clone()));

    // 消息总线
    let bus_config = config.bus_config();
    let bus = MessageBus::new(bus_config.capacity);
    let bus_server = tokio::spawn({
        let bus = bus.clone();
        let shutdown = shutdown.clone();
        async move {
            if let Err(e) = bus.serve(bus_config.addr, shutdown).await {
                tracing::error!("Message bus stopped: {}", e);
            }
        }
    });

    // 识别端通道
    let (channel, events) = TransmissionChannel::spawn(config.channel_config());
    tracing::info!("Recognizer channel targeting {}", channel.config().url);
    let channel = Arc::new(channel);

    // 会话
    let (session, handle) = Session::new(
        config.session_config(),
        channel.clone(),
        events,
        bus.clone(),
        clock,
        status.clone(),
    );
    let session_task = tokio::spawn(session.run());

    if let Err(e) = handle.start_capture().await {
        tracing::warn!("Capture not started: {}", e);
    }

    tracing::info!("GestureLink Daemon is ready!");
    tracing::info!("Press Ctrl+C to shutdown...");

    // 等待关闭信号
    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutting down...");

    if let Err(e) = handle.shutdown().await {
        tracing::debug!("Session already closed: {}", e);
    }
    shutdown.cancel();
    let _ = session_task.await;
    let _ = bus_server.await;
    let _ = status_logger.await;

    Ok(())
}

/// 把状态行变更写入日志
async fn log_status(mut rx: watch::Receiver<Telemetry>, shutdown: CancellationToken) {
    let mut last = rx.borrow().status.clone();
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            changed = rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let current = rx.borrow_and_update().status.clone();
                if current == last {
                    continue;
                }
                match current.level {
                    StatusLevel::Error => tracing::error!("[status] {}", current.message),
                    StatusLevel::Warning => tracing::warn!("[status] {}", current.message),
                    StatusLevel::Success | StatusLevel::Info => {
                        tracing::info!("[status] {}", current.message)
                    }
                }
                last = current;
            }
        }
    }
}
