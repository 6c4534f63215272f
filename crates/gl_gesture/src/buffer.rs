//! 动作缓冲
//!
//! 最近若干个非 "none" 动作的有界 FIFO，仅用于短程一致性判断。

use std::collections::VecDeque;

/// 默认容量
pub const BUFFER_CAPACITY: usize = 5;

/// 动作缓冲
#[derive(Debug, Clone)]
pub struct ActionBuffer {
    entries: VecDeque<String>,
    capacity: usize,
}

impl ActionBuffer {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity + 1),
            capacity,
        }
    }

    /// 追加动作，超出容量时淘汰最旧的
    pub fn push(&mut self, action: impl Into<String>) {
        self.entries.push_back(action.into());
        while self.entries.len() > self.capacity {
            self.entries.pop_front();
        }
    }

    /// 最近 `n` 个动作 (不足时返回全部)，按时间顺序
    pub fn recent(&self, n: usize) -> impl Iterator<Item = &str> {
        let skip = self.entries.len().saturating_sub(n);
        self.entries.iter().skip(skip).map(String::as_str)
    }

    /// 最近 `n` 个动作是否非空且全部等于 `action`
    pub fn is_consistent(&self, action: &str, n: usize) -> bool {
        let mut recent = self.recent(n).peekable();
        recent.peek().is_some() && recent.all(|a| a == action)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 按时间顺序遍历
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(String::as_str)
    }
}

impl Default for ActionBuffer {
    fn default() -> Self {
        Self::new(BUFFER_CAPACITY)
    }
}
