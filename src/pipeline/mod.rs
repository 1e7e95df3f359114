/// 行为识别流水线 (Behaviour Recognition Pipeline)
///
/// 单工作线程架构, 通过 crossbeam 通道单向通知宿主:
/// - Orchestrator: 跟踪 → 姿态 → 动作分类 → 告警去重
/// - Worker:       取帧 → 推理 → 叠加 → 录像 (独立线程)
/// - Summary:      会话统计
pub mod orchestrator;
pub mod summary;
pub mod worker;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::action::ActionLabel;

pub use orchestrator::{FrameOutcome, InferenceOrchestrator, SeenIdentities};
pub use summary::{SessionEnd, SessionSummary, SummaryAccumulator};
pub use worker::{StreamWorker, WorkerOptions};

// ========== 事件定义 ==========

/// 新ID首次出现恶意动作
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NovelAlert {
    pub identity: u32,
    pub label: ActionLabel,
}

/// 工作线程 → 宿主 (发送即忘, 不等待回复)
#[derive(Clone, Debug)]
pub enum SessionEvent {
    NovelAlert(NovelAlert),
    Complete(SessionSummary),
}

/// 推理模式
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InferenceMode {
    /// 整帧姿态识别
    Pose,
    /// 人体跟踪 + 告警
    Tracking,
}

// ========== 停止信号 ==========

/// 宿主持有的停止开关, 工作线程每帧轮询一次
#[derive(Clone, Debug, Default)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}
