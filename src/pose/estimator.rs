//! 姿态估计器 (Pose Estimator)
//! 职责: 单帧 → 关键点模型 → PoseVector → 追加到滑动窗口

use tracing::debug;

use super::window::{Landmark, PoseVector, PoseWindow};
use super::CHANNELS;
use crate::error::{Result, SentinelError};
use crate::Frame;

/// 关键点模型接口
///
/// 返回 `Ok(None)` 表示画面中没有人, 这不是错误。
pub trait LandmarkModel: Send {
    fn detect(&mut self, frame: &Frame) -> Result<Option<Vec<Landmark>>>;
}

pub struct PoseEstimator {
    model: Box<dyn LandmarkModel>,
    window: PoseWindow,
    landmark_count: usize,
}

impl PoseEstimator {
    pub fn new(model: Box<dyn LandmarkModel>, window_length: usize, landmark_count: usize) -> Self {
        Self {
            model,
            window: PoseWindow::new(window_length),
            landmark_count,
        }
    }

    /// 估计单帧姿态并更新窗口
    ///
    /// 未检测到姿态时追加零向量, 窗口照常前进。
    pub fn estimate(&mut self, frame: &Frame) -> Result<PoseVector> {
        let vector = if frame.width() == 0 || frame.height() == 0 {
            // 空ROI (检测框落在画面外): 视为本帧无姿态
            debug!("⚠️ 空图像, 跳过关键点模型");
            self.zero_vector()
        } else {
            match self.model.detect(frame)? {
                Some(landmarks) => {
                    if landmarks.len() != self.landmark_count {
                        return Err(SentinelError::Model(format!(
                            "关键点数量不匹配: 期望{}, 实际{}",
                            self.landmark_count,
                            landmarks.len()
                        )));
                    }
                    PoseVector::from_landmarks(&landmarks)
                }
                None => self.zero_vector(),
            }
        };

        self.window.push(vector.clone());
        Ok(vector)
    }

    /// 窗口已满且最新一帧非零
    pub fn is_ready(&self) -> bool {
        self.window.is_ready()
    }

    pub fn window(&self) -> &PoseWindow {
        &self.window
    }

    fn zero_vector(&self) -> PoseVector {
        PoseVector::zeros(self.landmark_count * CHANNELS)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::collections::VecDeque;

    /// 按脚本返回结果的关键点模型
    pub(crate) struct ScriptedLandmarks {
        pub script: VecDeque<Option<Vec<Landmark>>>,
        pub calls: usize,
    }

    impl ScriptedLandmarks {
        pub fn new(script: Vec<Option<Vec<Landmark>>>) -> Self {
            Self {
                script: script.into(),
                calls: 0,
            }
        }
    }

    impl LandmarkModel for ScriptedLandmarks {
        fn detect(&mut self, _frame: &Frame) -> Result<Option<Vec<Landmark>>> {
            self.calls += 1;
            Ok(self.script.pop_front().flatten())
        }
    }

    pub(crate) fn landmarks(count: usize, value: f32) -> Vec<Landmark> {
        vec![Landmark::new(value, value, value, 1.0); count]
    }

    #[test]
    fn test_miss_appends_zero_vector() {
        let model = ScriptedLandmarks::new(vec![Some(landmarks(2, 0.5)), None]);
        let mut estimator = PoseEstimator::new(Box::new(model), 2, 2);
        let frame = Frame::new(4, 4);

        let first = estimator.estimate(&frame).unwrap();
        assert!(!first.is_zero());
        let second = estimator.estimate(&frame).unwrap();
        assert!(second.is_zero());
        assert_eq!(second.len(), 8);

        assert_eq!(estimator.window().len(), 2);
        assert!(!estimator.is_ready());
    }

    #[test]
    fn test_empty_frame_skips_model() {
        let model = ScriptedLandmarks::new(vec![Some(landmarks(2, 0.5))]);
        let mut estimator = PoseEstimator::new(Box::new(model), 3, 2);

        let v = estimator.estimate(&Frame::new(0, 0)).unwrap();
        assert!(v.is_zero());
        assert_eq!(estimator.window().len(), 1);
    }

    #[test]
    fn test_wrong_landmark_count_is_model_error() {
        let model = ScriptedLandmarks::new(vec![Some(landmarks(5, 0.5))]);
        let mut estimator = PoseEstimator::new(Box::new(model), 3, 2);
        let err = estimator.estimate(&Frame::new(4, 4)).unwrap_err();
        assert!(matches!(err, SentinelError::Model(_)));
        assert!(estimator.window().is_empty());
    }
}
