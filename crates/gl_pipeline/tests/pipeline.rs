//! 端到端流水线测试：本地伪识别端 + 真实传输通道 + 会话 actor

use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::Response;
use axum::routing::get;
use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::broadcast::error::TryRecvError;

use gl_core::{StatusBoard, SystemClock, Telemetry};
use gl_pipeline::{Session, SessionConfig};
use gl_vision::CaptureConstraints;
use gl_wire::{BusMessage, ChannelConfig, MessageBus, TransmissionChannel};

async fn recognizer(ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(answer_frames)
}

/// 对每个 video_frame 回一个高置信度的 play_pause
async fn answer_frames(mut socket: WebSocket) {
    while let Some(Ok(msg)) = socket.recv().await {
        let Message::Text(text) = msg else {
            continue;
        };
        let Ok(request) = serde_json::from_str::<serde_json::Value>(&text) else {
            continue;
        };
        if request["event"] != "video_frame" {
            continue;
        }
        let reply = serde_json::json!({
            "event": "processed_frame",
            "data": {
                "image": request["data"]["image"],
                "gesture": {
                    "fingers": 5,
                    "confidence": 0.95,
                    "description": "Play/Pause",
                    "action": "play_pause",
                    "landmarks": [{"x": 0.5, "y": 0.5}]
                },
                "timestamp": request["data"]["timestamp"],
                "processing_time": 3.0
            }
        });
        if socket.send(Message::Text(reply.to_string())).await.is_err() {
            break;
        }
    }
}

async fn wait_for(status: &StatusBoard, pred: impl FnMut(&Telemetry) -> bool) {
    let mut rx = status.subscribe();
    let result = tokio::time::timeout(Duration::from_secs(10), rx.wait_for(pred)).await;
    assert!(matches!(result, Ok(Ok(_))), "status condition not reached");
}

#[tokio::test]
async fn test_recognizer_round_trip_dispatches_once() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = Router::new().route("/ws", get(recognizer));
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    let (channel, events) = TransmissionChannel::spawn(ChannelConfig {
        url: format!("ws://{}/ws", addr),
        reconnect_delay: Duration::from_millis(100),
    });
    let channel = Arc::new(channel);
    let bus = MessageBus::default();
    let mut commands = bus.subscribe();
    let status = StatusBoard::new();

    let config = SessionConfig {
        refresh_hz: 120,
        constraints: CaptureConstraints {
            ideal_width: 64,
            ideal_height: 48,
            ..Default::default()
        },
        ..Default::default()
    };
    let (session, handle) = Session::new(
        config,
        channel.clone(),
        events,
        bus.clone(),
        Arc::new(SystemClock),
        status.clone(),
    );
    tokio::spawn(session.run());

    wait_for(&status, |t| t.server_connected).await;
    handle.start_capture().await.unwrap();

    let first = tokio::time::timeout(Duration::from_secs(10), commands.recv())
        .await
        .unwrap()
        .unwrap();
    assert!(matches!(
        first,
        BusMessage::GestureCommand { ref action, .. } if action == "play_pause"
    ));

    // 冷却窗口内不会有第二条命令
    tokio::time::sleep(Duration::from_millis(500)).await;
    assert!(matches!(commands.try_recv(), Err(TryRecvError::Empty)));

    let snapshot = status.snapshot();
    assert!(snapshot.latency_ms.is_some());
    assert_eq!(snapshot.finger_count, 5);
    assert_eq!(snapshot.confidence_pct, 95);
    assert_eq!(snapshot.current_action, "Play/Pause");

    handle.stop_capture().await.unwrap();
    wait_for(&status, |t| !t.capturing).await;
}
