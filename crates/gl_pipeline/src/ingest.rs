//! 结果摄取
//!
//! 每条入站结果：发布往返延迟，切换输出帧，并把手势分发给
//! 状态面板、覆盖层与平滑引擎。缺失字段一律视为不存在。

use std::sync::Arc;

use gl_core::{Clock, StatusBoard};
use gl_gesture::{ActionDispatcher, GestureSmoothingEngine, ObserveOutcome};
use gl_vision::{OutputSurface, OverlayRenderer};
use gl_wire::InboundResult;

/// 结果摄取器
pub struct ResultIngest<D: ActionDispatcher> {
    engine: GestureSmoothingEngine<D>,
    overlay: OverlayRenderer,
    output: OutputSurface,
    clock: Arc<dyn Clock>,
    status: StatusBoard,
}

impl<D: ActionDispatcher> ResultIngest<D> {
    pub fn new(engine: GestureSmoothingEngine<D>, clock: Arc<dyn Clock>, status: StatusBoard) -> Self {
        Self {
            engine,
            overlay: OverlayRenderer::new(),
            output: OutputSurface::new(),
            clock,
            status,
        }
    }

    /// 摄取一条结果，返回平滑引擎的判定 (无手势时为 None)
    pub fn ingest(&mut self, result: InboundResult) -> Option<ObserveOutcome> {
        // 缺失时间戳按 0 处理，延迟不做钳制
        let latency = self.clock.now_ms() - result.timestamp.unwrap_or(0.0);
        self.status.set_latency(latency);
        tracing::trace!(latency, processing_time = ?result.processing_time, "Round trip");

        if let Some(image) = result.image {
            self.output.swap(image);
        }

        let gesture = result.gesture?;
        self.status.show_gesture(
            gesture.finger_count,
            gesture.confidence_percent(),
            &gesture.description,
        );
        if !gesture.landmarks.is_empty() {
            self.overlay.render(&gesture.landmarks, self.output.bounds());
        }
        Some(self.engine.observe(gesture))
    }

    /// 清除覆盖层与输出帧
    pub fn clear(&mut self) {
        self.overlay.clear();
        self.output.clear();
    }

    pub fn engine(&self) -> &GestureSmoothingEngine<D> {
        &self.engine
    }

    pub fn overlay(&self) -> &OverlayRenderer {
        &self.overlay
    }

    pub fn output(&self) -> &OutputSurface {
        &self.output
    }
}
