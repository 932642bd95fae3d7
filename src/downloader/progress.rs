//! 系列下载进度与剩余时间估算。
//!
//! 每次系列/子系列下载创建一个 [`ProgressTracker`]，以 `Arc` 传给所有下载任务。
//! 状态由一把互斥锁保护，每次更新只是一次追加加计数。

use std::fmt;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Local};

use crate::common::utils::FormatTool;

/// 剩余时间估算
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Eta {
    /// 尚无耗时样本，或没有剩余工作
    Infinite,
    Remaining(Duration),
}

impl fmt::Display for Eta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Eta::Infinite => f.write_str("∞"),
            Eta::Remaining(d) => f.write_str(&FormatTool::format_seconds(d.as_secs_f64())),
        }
    }
}

#[derive(Debug, Default)]
struct ProgressState {
    total: usize,
    completed: usize,
    durations: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProgressSnapshot {
    pub total: usize,
    pub completed: usize,
    pub durations: Vec<f64>,
    pub started_at: DateTime<Local>,
}

impl ProgressSnapshot {
    pub fn eta(&self) -> Eta {
        estimate(self.total, self.completed, &self.durations)
    }
}

fn estimate(total: usize, completed: usize, durations: &[f64]) -> Eta {
    if durations.is_empty() || completed >= total {
        return Eta::Infinite;
    }
    let mean = durations.iter().sum::<f64>() / durations.len() as f64;
    Eta::Remaining(Duration::from_secs_f64(mean * (total - completed) as f64))
}

#[derive(Debug)]
pub struct ProgressTracker {
    started_at: DateTime<Local>,
    state: Mutex<ProgressState>,
}

impl ProgressTracker {
    pub fn new(total: usize) -> Self {
        Self {
            started_at: Local::now(),
            state: Mutex::new(ProgressState {
                total,
                ..ProgressState::default()
            }),
        }
    }

    // 锁只覆盖极短的更新，中毒时直接沿用内部数据
    fn state(&self) -> MutexGuard<'_, ProgressState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// 记录一集完成及其耗时（已存在的文件记 0）
    pub fn mark_done(&self, elapsed_seconds: f64) {
        let mut state = self.state();
        state.completed += 1;
        state.durations.push(elapsed_seconds.max(0.0));
    }

    /// 平均耗时 × 剩余集数
    pub fn eta(&self) -> Eta {
        let state = self.state();
        estimate(state.total, state.completed, &state.durations)
    }

    pub fn completed(&self) -> usize {
        self.state().completed
    }

    pub fn total(&self) -> usize {
        self.state().total
    }

    pub fn started_at(&self) -> DateTime<Local> {
        self.started_at
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        let state = self.state();
        ProgressSnapshot {
            total: state.total,
            completed: state.completed,
            durations: state.durations.clone(),
            started_at: self.started_at,
        }
    }
}
