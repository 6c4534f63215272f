//! 手势平滑引擎
//!
//! 把识别端的逐帧观测转换为稀疏、去抖的动作分发。每个观测依次经过：
//! 1. 记入时间窗口历史，并清理过期条目
//! 2. 丢弃无动作观测
//! 3. 冷却期内直接丢弃 (不进入缓冲)
//! 4. 追加到动作缓冲
//! 5. 缓冲至少有 `min_consistent` 条，且最近 `consistency_window` 个动作全部相同
//! 6. 置信度严格超过阈值时分发，并重置冷却

use std::collections::VecDeque;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use gl_core::{Clock, RawGestureObservation};

use crate::buffer::ActionBuffer;
use crate::dispatcher::ActionDispatcher;
use crate::gate::DispatchGate;

/// 平滑参数
#[derive(Debug, Clone, PartialEq)]
pub struct SmoothingConfig {
    /// 历史保留窗口 (毫秒)
    pub history_window_ms: i64,
    /// 动作缓冲容量
    pub buffer_capacity: usize,
    /// 一致性窗口长度
    pub consistency_window: usize,
    /// 判定一致所需的最少缓冲条目数
    pub min_consistent: usize,
    /// 置信度阈值 (严格大于)
    pub confidence_threshold: f64,
    /// 分发冷却 (毫秒)
    pub cooldown_ms: i64,
}

impl Default for SmoothingConfig {
    fn default() -> Self {
        Self {
            history_window_ms: 2000,
            buffer_capacity: crate::buffer::BUFFER_CAPACITY,
            consistency_window: 3,
            min_consistent: 3,
            confidence_threshold: 0.7,
            cooldown_ms: crate::gate::DISPATCH_COOLDOWN_MS,
        }
    }
}

/// 历史条目
#[derive(Debug, Clone)]
pub struct GestureHistoryEntry {
    pub observation: RawGestureObservation,
    pub arrived_at: DateTime<Utc>,
}

/// 单次观测的处理结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ObserveOutcome {
    /// 无动作
    NoAction,
    /// 冷却期内，被丢弃
    CoolingDown,
    /// 已缓冲，尚未满足分发条件
    Buffered { consistent: bool },
    /// 已分发
    Dispatched { action: String },
}

/// 手势平滑引擎
pub struct GestureSmoothingEngine<D: ActionDispatcher> {
    config: SmoothingConfig,
    clock: Arc<dyn Clock>,
    dispatcher: D,
    history: VecDeque<GestureHistoryEntry>,
    buffer: ActionBuffer,
    gate: DispatchGate,
}

impl<D: ActionDispatcher> GestureSmoothingEngine<D> {
    /// 创建新引擎，初始状态为空
    pub fn new(config: SmoothingConfig, clock: Arc<dyn Clock>, dispatcher: D) -> Self {
        let buffer = ActionBuffer::new(config.buffer_capacity);
        let gate = DispatchGate::new(config.cooldown_ms);
        Self {
            config,
            clock,
            dispatcher,
            history: VecDeque::new(),
            buffer,
            gate,
        }
    }

    /// 处理一次观测
    pub fn observe(&mut self, observation: RawGestureObservation) -> ObserveOutcome {
        let now = self.clock.now();
        let action = observation.actionable().map(str::to_owned);
        let confidence = observation.confidence;
        let description = observation.description.clone();

        self.history.push_back(GestureHistoryEntry {
            observation,
            arrived_at: now,
        });
        self.prune(now);

        let Some(action) = action else {
            return ObserveOutcome::NoAction;
        };

        if !self.gate.is_open(now) {
            tracing::trace!(action = %action, "Gesture suppressed by cooldown");
            return ObserveOutcome::CoolingDown;
        }

        self.buffer.push(action.as_str());
        let consistent = self.buffer.len() >= self.config.min_consistent
            && self
                .buffer
                .is_consistent(&action, self.config.consistency_window);

        if consistent && confidence > self.config.confidence_threshold {
            tracing::info!(action = %action, confidence, "Dispatching gesture action");
            self.dispatcher.dispatch(&action, &description);
            self.gate.record(now);
            return ObserveOutcome::Dispatched { action };
        }

        ObserveOutcome::Buffered { consistent }
    }

    fn prune(&mut self, now: DateTime<Utc>) {
        let window = self.config.history_window_ms;
        self.history
            .retain(|entry| (now - entry.arrived_at).num_milliseconds() < window);
    }

    /// 当前时刻仍在窗口内的历史
    pub fn history(&self) -> impl Iterator<Item = &GestureHistoryEntry> {
        let now = self.clock.now();
        let window = self.config.history_window_ms;
        self.history
            .iter()
            .filter(move |entry| (now - entry.arrived_at).num_milliseconds() < window)
    }

    /// 动作缓冲
    pub fn buffer(&self) -> &ActionBuffer {
        &self.buffer
    }

    /// 上次分发时刻
    pub fn last_dispatch(&self) -> Option<DateTime<Utc>> {
        self.gate.last_dispatch()
    }

    pub fn dispatcher(&self) -> &D {
        &self.dispatcher
    }
}
