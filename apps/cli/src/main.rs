//! GestureLink CLI - 消息总线监听端
//!
//! 连接守护进程的 `/bus`，宣告扩展已连接，并打印收到的每条手势命令。

use anyhow::Context;
use chrono::{DateTime, Utc};
use futures::{SinkExt, StreamExt};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use gl_gesture::key_for_action;
use gl_wire::BusMessage;

const DEFAULT_BUS_URL: &str = "ws://127.0.0.1:8766/bus";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 初始化日志
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "gl=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let url = match std::env::args().nth(1) {
        Some(arg) if arg == "-h" || arg == "--help" => {
            println!("Usage: gl [BUS_URL]");
            println!("  BUS_URL  defaults to {}", DEFAULT_BUS_URL);
            return Ok(());
        }
        Some(arg) => arg,
        None => DEFAULT_BUS_URL.to_string(),
    };

    println!("GestureLink CLI v{}", env!("CARGO_PKG_VERSION"));
    let (stream, _) = connect_async(url.as_str())
        .await
        .with_context(|| format!("cannot connect to {}", url))?;
    println!("Listening on {} (Ctrl+C to exit)", url);
    println!();

    let (mut write, mut read) = stream.split();
    write
        .send(Message::Text(BusMessage::ExtensionStatus { connected: true }.to_json()?))
        .await?;

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = &mut ctrl_c => break,
            incoming = read.next() => match incoming {
                Some(Ok(Message::Text(text))) => match BusMessage::from_json(&text) {
                    Ok(BusMessage::GestureCommand { action, timestamp }) => {
                        println!("{}", render_command(&action, timestamp));
                    }
                    Ok(other) => tracing::debug!("Ignoring bus message: {:?}", other),
                    Err(e) => tracing::warn!("Malformed bus message: {}", e),
                },
                Some(Ok(Message::Close(_))) | None => {
                    println!("Bus closed by daemon.");
                    return Ok(());
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => return Err(e).context("bus connection failed"),
            },
        }
    }

    let goodbye = BusMessage::ExtensionStatus { connected: false }.to_json()?;
    if let Err(e) = write.send(Message::Text(goodbye)).await {
        tracing::debug!("Could not announce disconnect: {}", e);
    }
    let _ = write.close().await;
    println!("Goodbye!");
    Ok(())
}

/// 单行命令输出：时刻、动作、映射按键
fn render_command(action: &str, timestamp: i64) -> String {
    let at = DateTime::<Utc>::from_timestamp_millis(timestamp)
        .map(|t| t.format("%H:%M:%S%.3f").to_string())
        .unwrap_or_else(|| timestamp.to_string());
    match key_for_action(action) {
        Some(key) => format!("{}  {:<12} [{}]", at, action, key),
        None => format!("{}  {:<12}", at, action),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_command() {
        assert_eq!(
            render_command("play_pause", 1_500),
            "00:00:01.500  play_pause   [Space]"
        );
        assert_eq!(render_command("wave", 0), "00:00:00.000  wave        ");
    }
}
