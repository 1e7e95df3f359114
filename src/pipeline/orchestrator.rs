//! 推理编排器 (Inference Orchestrator)
//! 职责: 每帧串联 跟踪 → 姿态 → 动作分类, 并按ID去重告警
//!
//! 两种模式:
//! - 姿态模式: 每帧都推进窗口, 窗口就绪时输出动作
//! - 跟踪模式: 只有跟踪到人时才推进窗口; 输出 (跟踪结果, 动作) 成对出现

use std::collections::HashSet;

use tracing::{debug, info, warn};

use super::{InferenceMode, NovelAlert};
use crate::action::{ActionClassifier, ActionLabel, ActionResult};
use crate::config::SentinelConfig;
use crate::detection::{PersonTracker, TrackingResult, YoloPersonDetector};
use crate::error::Result;
use crate::models::{ActionNet, PoseLandmarker};
use crate::pose::PoseEstimator;
use crate::Frame;

/// 本会话已告警过的ID, 每个ID最多进入一次
#[derive(Debug, Default, Clone)]
pub struct SeenIdentities(HashSet<u32>);

impl SeenIdentities {
    /// 首次插入返回 `true`
    pub fn insert(&mut self, identity: u32) -> bool {
        self.0.insert(identity)
    }

    pub fn contains(&self, identity: u32) -> bool {
        self.0.contains(&identity)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// 单帧输出
#[derive(Debug, Clone, Default)]
pub struct FrameOutcome {
    pub tracking: Option<TrackingResult>,
    pub action: Option<ActionResult>,
    pub alert: Option<NovelAlert>,
}

pub struct InferenceOrchestrator {
    estimator: PoseEstimator,
    classifier: ActionClassifier,
    tracker: Option<PersonTracker>,
    malicious: Vec<ActionLabel>,
    seen: SeenIdentities,
}

impl InferenceOrchestrator {
    /// 姿态模式 (不跟踪, 不告警)
    pub fn new(estimator: PoseEstimator, classifier: ActionClassifier) -> Self {
        Self {
            estimator,
            classifier,
            tracker: None,
            malicious: Vec::new(),
            seen: SeenIdentities::default(),
        }
    }

    /// 跟踪模式: 恶意动作按ID一次性告警
    pub fn with_tracking(
        estimator: PoseEstimator,
        classifier: ActionClassifier,
        tracker: PersonTracker,
        malicious: Vec<ActionLabel>,
    ) -> Self {
        Self {
            tracker: Some(tracker),
            malicious,
            ..Self::new(estimator, classifier)
        }
    }

    /// 加载 ONNX 模型; `mode` 为跟踪模式时额外加载人体检测模型
    pub fn from_config(config: &SentinelConfig, mode: InferenceMode) -> Result<Self> {
        config.validate()?;

        let estimator = PoseEstimator::new(
            Box::new(PoseLandmarker::new(config)?),
            config.window_length,
            config.landmark_count,
        );
        let classifier =
            ActionClassifier::new(Box::new(ActionNet::new(config)?), config.actions.clone());

        let orchestrator = match mode {
            InferenceMode::Pose => Self::new(estimator, classifier),
            InferenceMode::Tracking => Self::with_tracking(
                estimator,
                classifier,
                PersonTracker::new(Box::new(YoloPersonDetector::new(config)?)),
                config.malicious_actions.clone(),
            ),
        };
        info!("🧠 推理模型就绪 ({:?}模式)", mode);
        Ok(orchestrator)
    }

    pub fn mode(&self) -> InferenceMode {
        if self.tracker.is_some() {
            InferenceMode::Tracking
        } else {
            InferenceMode::Pose
        }
    }

    pub fn seen(&self) -> &SeenIdentities {
        &self.seen
    }

    /// 当前窗口填充量
    pub fn window_fill(&self) -> (usize, usize) {
        let window = self.estimator.window();
        (window.len(), window.capacity())
    }

    pub fn process(&mut self, frame: &Frame) -> Result<FrameOutcome> {
        let tracking = match self.tracker.as_mut() {
            Some(tracker) => tracker.track(frame)?,
            None => return self.process_pose(frame),
        };

        // 跟踪丢失: 窗口不前进
        let Some(tracking) = tracking else {
            return Ok(FrameOutcome::default());
        };

        self.estimator.estimate(&tracking.roi)?;
        if !self.estimator.is_ready() {
            return Ok(FrameOutcome::default());
        }

        let action = self.classifier.classify(self.estimator.window())?;
        let alert = self.check_alert(tracking.identity, action.label);
        Ok(FrameOutcome {
            tracking: Some(tracking),
            action: Some(action),
            alert,
        })
    }

    fn process_pose(&mut self, frame: &Frame) -> Result<FrameOutcome> {
        self.estimator.estimate(frame)?;
        let action = if self.estimator.is_ready() {
            Some(self.classifier.classify(self.estimator.window())?)
        } else {
            None
        };
        Ok(FrameOutcome {
            action,
            ..FrameOutcome::default()
        })
    }

    fn check_alert(&mut self, identity: u32, label: ActionLabel) -> Option<NovelAlert> {
        if !self.malicious.contains(&label) {
            return None;
        }
        if !self.seen.insert(identity) {
            debug!("ID {} 已告警过, 忽略 {}", identity, label);
            return None;
        }
        warn!("🚨 ID {} 出现恶意动作: {}", identity, label);
        Some(NovelAlert { identity, label })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::classifier::tests::FirstComponentSelects;
    use crate::detection::person::tests::{candidate, ScriptedCandidates};
    use crate::detection::Candidate;
    use crate::pose::estimator::tests::{landmarks, ScriptedLandmarks};
    use crate::pose::Landmark;

    const N: usize = 30;
    const K: usize = 33;

    // FirstComponentSelects: 关键点值 1 → Punching, 2 → Waving, 3 → Kicking, 4 → Walking
    const PUNCH: f32 = 1.0;
    const WAVE: f32 = 2.0;
    const KICK: f32 = 3.0;
    const WALK: f32 = 4.0;

    fn pose(value: f32) -> Option<Vec<Landmark>> {
        Some(landmarks(K, value))
    }

    fn pose_only(script: Vec<Option<Vec<Landmark>>>) -> InferenceOrchestrator {
        InferenceOrchestrator::new(
            PoseEstimator::new(Box::new(ScriptedLandmarks::new(script)), N, K),
            ActionClassifier::new(Box::new(FirstComponentSelects), ActionLabel::ALL.to_vec()),
        )
    }

    fn tracking(
        script: Vec<Option<Vec<Landmark>>>,
        candidates: Vec<Vec<Candidate>>,
    ) -> InferenceOrchestrator {
        InferenceOrchestrator::with_tracking(
            PoseEstimator::new(Box::new(ScriptedLandmarks::new(script)), N, K),
            ActionClassifier::new(Box::new(FirstComponentSelects), ActionLabel::ALL.to_vec()),
            PersonTracker::new(Box::new(ScriptedCandidates::new(candidates))),
            vec![ActionLabel::Punching, ActionLabel::Kicking],
        )
    }

    fn subject(identity: u32) -> Vec<Candidate> {
        vec![candidate(identity, 50.0, 50.0, 40.0, 80.0)]
    }

    fn frame() -> Frame {
        Frame::new(100, 100)
    }

    #[test]
    fn test_no_result_before_window_full() {
        let mut orch = pose_only(vec![pose(WALK); N - 1]);
        for _ in 0..N - 1 {
            let out = orch.process(&frame()).unwrap();
            assert!(out.action.is_none());
        }
        assert_eq!(orch.window_fill(), (N - 1, N));
    }

    #[test]
    fn test_first_result_on_nth_frame() {
        let mut orch = pose_only(vec![pose(WALK); N]);
        for _ in 0..N - 1 {
            orch.process(&frame()).unwrap();
        }
        let out = orch.process(&frame()).unwrap();
        let action = out.action.unwrap();
        assert_eq!(action.label, ActionLabel::Walking);
        assert!((0.0..=1.0).contains(&action.probability));
        assert_eq!(orch.mode(), InferenceMode::Pose);
    }

    #[test]
    fn test_zero_vector_resets_readiness_for_one_frame() {
        let mut script = vec![pose(WALK); N];
        script.push(None);
        script.push(pose(WAVE));
        let mut orch = pose_only(script);

        for _ in 0..N {
            orch.process(&frame()).unwrap();
        }
        // 最新一帧为零向量: 不输出
        assert!(orch.process(&frame()).unwrap().action.is_none());
        // 下一帧有效姿态且窗口仍满: 恢复输出
        let out = orch.process(&frame()).unwrap();
        assert_eq!(out.action.map(|a| a.label), Some(ActionLabel::Waving));
    }

    #[test]
    fn test_pose_mode_never_alerts() {
        let mut orch = pose_only(vec![pose(KICK); N + 5]);
        for _ in 0..N + 5 {
            let out = orch.process(&frame()).unwrap();
            assert!(out.alert.is_none());
            assert!(out.tracking.is_none());
        }
        assert!(orch.seen().is_empty());
    }

    #[test]
    fn test_alert_is_one_shot_per_identity() {
        // 预热 N-1 帧后开始分类; 第10次分类为 Kicking, 第40次为 Punching
        let warmup = N - 1;
        let total = warmup + 40;
        let mut script = vec![pose(WALK); total];
        script[warmup + 9] = pose(KICK);
        script[warmup + 39] = pose(PUNCH);
        let mut orch = tracking(script, vec![subject(7); total]);

        let mut alerts = Vec::new();
        for i in 0..total {
            if let Some(alert) = orch.process(&frame()).unwrap().alert {
                alerts.push((i, alert));
            }
        }

        assert_eq!(
            alerts,
            vec![(
                warmup + 9,
                NovelAlert {
                    identity: 7,
                    label: ActionLabel::Kicking
                }
            )]
        );
        assert!(orch.seen().contains(7));
    }

    #[test]
    fn test_each_identity_alerts_once() {
        let total = N + 1;
        let mut script = vec![pose(KICK); total];
        script[N - 1] = pose(PUNCH);
        let mut candidates = vec![subject(1); N];
        candidates.push(subject(2));
        let mut orch = tracking(script, candidates);

        let alerts: Vec<_> = (0..total)
            .filter_map(|_| orch.process(&frame()).unwrap().alert)
            .collect();
        assert_eq!(
            alerts,
            vec![
                NovelAlert {
                    identity: 1,
                    label: ActionLabel::Punching
                },
                NovelAlert {
                    identity: 2,
                    label: ActionLabel::Kicking
                },
            ]
        );
        assert_eq!(orch.seen().len(), 2);
    }

    #[test]
    fn test_tracking_miss_does_not_advance_window() {
        // 前5帧没人, 之后30帧有人: 第一次输出在第35帧
        let mut candidates = vec![Vec::new(); 5];
        candidates.extend(vec![subject(3); N]);
        let mut orch = tracking(vec![pose(WALK); N], candidates);

        for i in 1..=5 {
            let out = orch.process(&frame()).unwrap();
            assert!(out.tracking.is_none() && out.action.is_none(), "frame {}", i);
            assert_eq!(orch.window_fill().0, 0);
        }
        for i in 6..=N + 4 {
            let out = orch.process(&frame()).unwrap();
            assert!(out.tracking.is_none() && out.action.is_none(), "frame {}", i);
        }
        let out = orch.process(&frame()).unwrap();
        assert_eq!(out.tracking.map(|t| t.identity), Some(3));
        assert_eq!(out.action.map(|a| a.label), Some(ActionLabel::Walking));
        assert!(out.alert.is_none());
    }

    #[test]
    fn test_miss_after_full_window_keeps_window_intact() {
        let mut script = vec![pose(WALK); N];
        script.push(pose(KICK));
        let mut candidates = vec![subject(3); N];
        candidates.push(Vec::new());
        candidates.push(subject(3));
        let mut orch = tracking(script, candidates);

        for _ in 0..N - 1 {
            orch.process(&frame()).unwrap();
        }
        let out = orch.process(&frame()).unwrap();
        assert!(out.tracking.is_some() && out.action.is_some());
        let newest = orch.estimator.window().newest().cloned().unwrap();
        assert!(!newest.is_zero());

        // 没跟踪到人: 不输出, 窗口长度与最新向量都不变
        let out = orch.process(&frame()).unwrap();
        assert!(out.tracking.is_none() && out.action.is_none() && out.alert.is_none());
        assert_eq!(orch.window_fill(), (N, N));
        assert_eq!(orch.estimator.window().newest(), Some(&newest));

        // 再次跟踪到人: 立即成对输出
        let out = orch.process(&frame()).unwrap();
        assert_eq!(out.tracking.map(|t| t.identity), Some(3));
        assert_eq!(out.action.map(|a| a.label), Some(ActionLabel::Kicking));
        assert_eq!(
            out.alert,
            Some(NovelAlert {
                identity: 3,
                label: ActionLabel::Kicking
            })
        );
    }

    #[test]
    fn test_tracking_emits_pair_only_when_ready() {
        let mut orch = tracking(vec![pose(WALK); N], vec![subject(5); N]);
        for _ in 0..N - 1 {
            let out = orch.process(&frame()).unwrap();
            assert!(out.tracking.is_none());
            assert!(out.action.is_none());
        }
        let out = orch.process(&frame()).unwrap();
        assert!(out.tracking.is_some() && out.action.is_some());
        assert_eq!(orch.mode(), InferenceMode::Tracking);
    }
}
