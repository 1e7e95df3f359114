//! 动作分类器 (Action Classifier)
//! 职责: 完整姿态窗口 → 时序模型 → argmax → ActionResult

use super::{ActionLabel, ActionResult};
use crate::error::{Result, SentinelError};
use crate::pose::PoseWindow;

/// 时序动作模型接口: 窗口 → 各类别得分 (顺序与标签表一致)
pub trait ActionModel: Send {
    fn scores(&mut self, window: &PoseWindow) -> Result<Vec<f32>>;
}

pub struct ActionClassifier {
    model: Box<dyn ActionModel>,
    labels: Vec<ActionLabel>,
}

impl ActionClassifier {
    pub fn new(model: Box<dyn ActionModel>, labels: Vec<ActionLabel>) -> Self {
        Self { model, labels }
    }

    /// 对完整窗口做动作分类
    ///
    /// 窗口未满时立即返回 `WindowNotReady`, 不会调用模型。
    pub fn classify(&mut self, window: &PoseWindow) -> Result<ActionResult> {
        if !window.is_full() {
            return Err(SentinelError::WindowNotReady {
                len: window.len(),
                capacity: window.capacity(),
            });
        }

        let scores = self.model.scores(window)?;
        if scores.len() != self.labels.len() {
            return Err(SentinelError::Model(format!(
                "动作模型输出{}类, 标签表为{}类",
                scores.len(),
                self.labels.len()
            )));
        }

        let (idx, probability) = argmax(&scores).ok_or_else(|| {
            SentinelError::Model("动作模型输出为空".to_string())
        })?;

        Ok(ActionResult {
            label: self.labels[idx],
            probability,
        })
    }
}

/// 稳定argmax: 并列时取第一个最大值
pub fn argmax(scores: &[f32]) -> Option<(usize, f32)> {
    scores
        .iter()
        .copied()
        .enumerate()
        .reduce(|max, x| if x.1 > max.1 { x } else { max })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::pose::PoseVector;

    /// 固定输出的动作模型
    pub(crate) struct FixedScores(pub Vec<f32>);

    impl ActionModel for FixedScores {
        fn scores(&mut self, _window: &PoseWindow) -> Result<Vec<f32>> {
            Ok(self.0.clone())
        }
    }

    /// 以窗口最新一帧的首个分量选择类别, 用于端到端测试
    pub(crate) struct FirstComponentSelects;

    impl ActionModel for FirstComponentSelects {
        fn scores(&mut self, window: &PoseWindow) -> Result<Vec<f32>> {
            let first = window.newest().map_or(0.0, |v| v.as_slice()[0]);
            let idx = (first.round() as usize).min(4);
            let mut scores = vec![0.05; 5];
            scores[idx] = 0.8;
            Ok(scores)
        }
    }

    fn full_window(n: usize) -> PoseWindow {
        let mut window = PoseWindow::new(n);
        for _ in 0..n {
            window.push(PoseVector::from_vec(vec![0.3; 4]));
        }
        window
    }

    #[test]
    fn test_argmax_first_maximum_wins() {
        assert_eq!(argmax(&[0.1, 0.4, 0.4, 0.1]), Some((1, 0.4)));
        assert_eq!(argmax(&[]), None);
    }

    #[test]
    fn test_classify_maps_index_to_label() {
        let model = FixedScores(vec![0.05, 0.1, 0.05, 0.7, 0.1]);
        let mut classifier = ActionClassifier::new(Box::new(model), ActionLabel::ALL.to_vec());

        let result = classifier.classify(&full_window(30)).unwrap();
        assert_eq!(result.label, ActionLabel::Kicking);
        assert!((result.probability - 0.7).abs() < 1e-6);
    }

    #[test]
    fn test_classify_is_deterministic() {
        let model = FixedScores(vec![0.2, 0.2, 0.2, 0.2, 0.2]);
        let mut classifier = ActionClassifier::new(Box::new(model), ActionLabel::ALL.to_vec());
        let window = full_window(30);

        let a = classifier.classify(&window).unwrap();
        let b = classifier.classify(&window).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.label, ActionLabel::Running);
    }

    #[test]
    fn test_partial_window_fails_fast() {
        let model = FixedScores(vec![1.0, 0.0, 0.0, 0.0, 0.0]);
        let mut classifier = ActionClassifier::new(Box::new(model), ActionLabel::ALL.to_vec());
        let mut window = PoseWindow::new(30);
        window.push(PoseVector::from_vec(vec![0.3; 4]));

        let err = classifier.classify(&window).unwrap_err();
        assert!(matches!(
            err,
            SentinelError::WindowNotReady {
                len: 1,
                capacity: 30
            }
        ));
    }

    #[test]
    fn test_score_count_mismatch() {
        let model = FixedScores(vec![0.5, 0.5]);
        let mut classifier = ActionClassifier::new(Box::new(model), ActionLabel::ALL.to_vec());
        assert!(classifier.classify(&full_window(3)).is_err());
    }
}
