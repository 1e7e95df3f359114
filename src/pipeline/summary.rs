//! 会话统计: 帧数、平均FPS、告警列表、主要跟踪ID与主要动作

use std::collections::HashMap;
use std::fmt;
use std::time::{Duration, Instant};

use super::orchestrator::FrameOutcome;
use super::NovelAlert;
use crate::action::ActionLabel;

/// 会话结束原因
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEnd {
    /// 宿主发出停止信号
    Stopped,
    /// 帧源没有更多画面 (文件结束或设备断开)
    SourceExhausted,
    /// 推理或录像出错
    Failed(String),
}

/// 会话结束时随完成事件一起送出
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSummary {
    pub end: SessionEnd,
    pub frames: u64,
    pub mean_fps: f64,
    pub alerts: Vec<NovelAlert>,
    /// 跟踪模式下出现次数最多的ID
    pub dominant_identity: Option<u32>,
    /// 累计概率最高的动作 (跟踪模式下只统计主要ID)
    pub dominant_action: Option<ActionLabel>,
    /// 录像文件, 未录像时为空
    pub recording: Option<String>,
}

impl fmt::Display for SessionSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let end = match &self.end {
            SessionEnd::Stopped => "手动停止".to_string(),
            SessionEnd::SourceExhausted => "画面结束".to_string(),
            SessionEnd::Failed(e) => format!("出错: {}", e),
        };
        write!(
            f,
            "{} | 帧数: {} | 平均FPS: {:.1} | 告警: {}",
            end,
            self.frames,
            self.mean_fps,
            self.alerts.len()
        )?;
        if let Some(id) = self.dominant_identity {
            write!(f, " | 主要ID: {}", id)?;
        }
        match self.dominant_action {
            Some(label) => write!(f, " | 主要动作: {}", label),
            None => write!(f, " | 主要动作: 无"),
        }
    }
}

/// 逐帧累计
#[derive(Debug)]
pub struct SummaryAccumulator {
    started: Instant,
    frames: u64,
    alerts: Vec<NovelAlert>,
    identity_frames: HashMap<u32, u64>,
    /// (ID, 动作) → 累计概率; 姿态模式下ID为 `None`
    action_scores: HashMap<(Option<u32>, ActionLabel), f32>,
}

impl Default for SummaryAccumulator {
    fn default() -> Self {
        Self::new()
    }
}

impl SummaryAccumulator {
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
            frames: 0,
            alerts: Vec::new(),
            identity_frames: HashMap::new(),
            action_scores: HashMap::new(),
        }
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn record(&mut self, outcome: &FrameOutcome) {
        self.frames += 1;

        let identity = outcome.tracking.as_ref().map(|t| t.identity);
        if let Some(id) = identity {
            *self.identity_frames.entry(id).or_default() += 1;
        }
        if let Some(action) = &outcome.action {
            *self
                .action_scores
                .entry((identity, action.label))
                .or_default() += action.probability;
        }
        if let Some(alert) = &outcome.alert {
            self.alerts.push(alert.clone());
        }
    }

    pub fn finish(self, end: SessionEnd, recording: Option<String>) -> SessionSummary {
        let elapsed = self.started.elapsed();
        self.finish_with_elapsed(elapsed, end, recording)
    }

    fn finish_with_elapsed(
        self,
        elapsed: Duration,
        end: SessionEnd,
        recording: Option<String>,
    ) -> SessionSummary {
        let secs = elapsed.as_secs_f64();
        let mean_fps = if secs > 0.0 {
            self.frames as f64 / secs
        } else {
            0.0
        };

        // 并列时取较小ID, 保证结果确定
        let dominant_identity = self
            .identity_frames
            .iter()
            .max_by(|a, b| a.1.cmp(b.1).then(b.0.cmp(a.0)))
            .map(|(&id, _)| id);

        let mut totals: HashMap<ActionLabel, f32> = HashMap::new();
        for (&(id, label), &score) in &self.action_scores {
            if dominant_identity.is_none() || id == dominant_identity {
                *totals.entry(label).or_default() += score;
            }
        }
        // 并列时按标签表顺序取靠前者
        let dominant_action = ActionLabel::ALL
            .iter()
            .filter_map(|label| totals.get(label).map(|&score| (*label, score)))
            .filter(|&(_, score)| score > 0.0)
            .fold(None::<(ActionLabel, f32)>, |best, cur| match best {
                Some(b) if b.1 >= cur.1 => Some(b),
                _ => Some(cur),
            })
            .map(|(label, _)| label);

        SessionSummary {
            end,
            frames: self.frames,
            mean_fps,
            alerts: self.alerts,
            dominant_identity,
            dominant_action,
            recording,
        }
    }
}
