//! 采集循环
//!
//! 与显示刷新同步的单驱动循环：每个 tick 把当前帧画到表面上，
//! 偶数 tick 触发编码与发送，每 30 个 tick 采样一次帧率。

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::time::{Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use gl_core::{Clock, StatusBoard};

use crate::encoder::FrameEncoder;
use crate::source::FrameSource;
use crate::surface::Surface;

/// 采集循环配置
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureLoopConfig {
    /// 每隔多少 tick 发布一次帧率
    pub fps_sample_every: u64,
    /// 每隔多少 tick 发送一帧
    pub transmit_every: u64,
}

impl Default for CaptureLoopConfig {
    fn default() -> Self {
        Self {
            fps_sample_every: 30,
            transmit_every: 2,
        }
    }
}

/// 单次 tick 的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// 未就绪或已停止，仅等待下一次刷新
    Idle,
    /// 已绘制
    Rendered {
        fps: Option<u32>,
        transmitted: bool,
    },
}

/// 采集循环
pub struct CaptureLoop {
    config: CaptureLoopConfig,
    source: Box<dyn FrameSource>,
    surface: Surface,
    encoder: Arc<dyn FrameEncoder>,
    clock: Arc<dyn Clock>,
    status: StatusBoard,
    active: bool,
    frame_count: u64,
    last_frame_time: Instant,
}

impl CaptureLoop {
    /// 创建采集循环，`now` 作为第一帧的时间基准
    pub fn new(
        config: CaptureLoopConfig,
        source: Box<dyn FrameSource>,
        encoder: Arc<dyn FrameEncoder>,
        clock: Arc<dyn Clock>,
        status: StatusBoard,
        now: Instant,
    ) -> Self {
        Self {
            config,
            source,
            surface: Surface::default(),
            encoder,
            clock,
            status,
            active: true,
            frame_count: 0,
            last_frame_time: now,
        }
    }

    /// 执行一次 tick
    pub fn tick(&mut self, now: Instant) -> TickOutcome {
        if !self.active {
            return TickOutcome::Idle;
        }
        // 设备元数据可能晚于采集开始到达
        let (width, height) = self.source.dimensions();
        if width == 0 || height == 0 {
            return TickOutcome::Idle;
        }
        if self.surface.dimensions() != (width, height) {
            self.surface.resize(width, height);
        }

        let delta = now.saturating_duration_since(self.last_frame_time);
        self.last_frame_time = now;
        self.frame_count += 1;

        let mut fps = None;
        if self.frame_count % self.config.fps_sample_every.max(1) == 0 {
            fps = fps_from_delta(delta);
            if let Some(fps) = fps {
                tracing::trace!(fps, "Frame rate sample");
                self.status.set_fps(fps);
            }
        }

        if let Some(frame) = self.source.current_frame() {
            self.surface.draw(&frame);
        }

        let transmitted = self.frame_count % self.config.transmit_every.max(1) == 0;
        if transmitted {
            self.encoder.encode_and_send(&self.surface, self.clock.now_ms());
        }

        TickOutcome::Rendered { fps, transmitted }
    }

    /// 停止采集并关闭设备
    pub fn stop(&mut self) {
        self.active = false;
        self.source.stop();
        self.surface.clear();
    }

    /// 是否运行中
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// 已绘制的帧数
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// 绘制表面
    pub fn surface(&self) -> &Surface {
        &self.surface
    }
}

/// 单帧间隔换算的瞬时帧率
fn fps_from_delta(delta: Duration) -> Option<u32> {
    let ms = delta.as_secs_f64() * 1000.0;
    if ms <= 0.0 {
        return None;
    }
    Some((1000.0 / ms).round() as u32)
}

/// 显示刷新节拍器
///
/// 无条件按刷新率重新布置下一次 tick，直到令牌被取消。
pub struct RefreshTicker {
    interval: Interval,
    token: CancellationToken,
}

impl RefreshTicker {
    pub fn new(refresh_hz: u32, token: CancellationToken) -> Self {
        let period = Duration::from_secs_f64(1.0 / refresh_hz.max(1) as f64);
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        Self { interval, token }
    }

    /// 等待下一次刷新，返回实际唤醒时刻；令牌取消后返回 None
    pub async fn next(&mut self) -> Option<Instant> {
        if self.token.is_cancelled() {
            return None;
        }
        tokio::select! {
            biased;
            _ = self.token.cancelled() => None,
            _ = self.interval.tick() => Some(Instant::now()),
        }
    }

    /// 绑定的取消令牌
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }
}
