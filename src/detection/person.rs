//! 单目标人体跟踪
//!
//! 检测器给出带跟踪ID的候选框, `select_primary` 选出主目标,
//! 再按主目标框从原图裁剪感兴趣区域供姿态模型使用。

use image::imageops;
use tracing::debug;

use super::bytetrack::ByteTracker;
use super::types::{Candidate, Region, TrackingResult};
use crate::config::SentinelConfig;
use crate::error::Result;
use crate::models::{Model, YOLOv8};
use crate::Frame;

/// 人体候选来源: 只返回 person 类别, 并携带稳定的跟踪ID
pub trait PersonDetector: Send {
    fn candidates(&mut self, frame: &Frame) -> Result<Vec<Candidate>>;
}

/// 主目标选择策略: 取第一个候选
///
/// 候选顺序由检测器决定 (YOLO + ByteTrack 下为置信度降序)。
pub fn select_primary(candidates: &[Candidate]) -> Option<&Candidate> {
    candidates.first()
}

/// 按区域裁剪, 超出画面的部分被截掉; 完全落在画面外时返回空图
pub fn crop_roi(frame: &Frame, region: &Region) -> Frame {
    let (fw, fh) = (frame.width() as i64, frame.height() as i64);
    let x0 = (region.x as i64).clamp(0, fw);
    let y0 = (region.y as i64).clamp(0, fh);
    let x1 = (region.x as i64 + region.width as i64).clamp(0, fw);
    let y1 = (region.y as i64 + region.height as i64).clamp(0, fh);

    if x1 <= x0 || y1 <= y0 {
        return Frame::new(0, 0);
    }
    imageops::crop_imm(
        frame,
        x0 as u32,
        y0 as u32,
        (x1 - x0) as u32,
        (y1 - y0) as u32,
    )
    .to_image()
}

/// 人体跟踪器: 每帧最多产出一个跟踪结果
pub struct PersonTracker {
    detector: Box<dyn PersonDetector>,
}

impl PersonTracker {
    pub fn new(detector: Box<dyn PersonDetector>) -> Self {
        Self { detector }
    }

    /// 没有候选时返回 `None`
    pub fn track(&mut self, frame: &Frame) -> Result<Option<TrackingResult>> {
        let candidates = self.detector.candidates(frame)?;
        let Some(primary) = select_primary(&candidates) else {
            return Ok(None);
        };

        let bbox = Region::from_center(primary.cx, primary.cy, primary.w, primary.h);
        let roi = crop_roi(frame, &bbox);
        debug!(
            "🎯 跟踪 ID {} | 候选 {} | 框 {:?}",
            primary.identity,
            candidates.len(),
            bbox
        );

        Ok(Some(TrackingResult {
            bbox,
            identity: primary.identity,
            roi,
        }))
    }
}

/// YOLOv8 人体检测 + ByteTrack 分配ID
pub struct YoloPersonDetector {
    model: YOLOv8,
    tracker: ByteTracker,
}

impl YoloPersonDetector {
    pub fn new(config: &SentinelConfig) -> Result<Self> {
        Ok(Self {
            model: YOLOv8::new(config)?,
            tracker: ByteTracker::new(config.bytetrack()),
        })
    }
}

impl PersonDetector for YoloPersonDetector {
    fn candidates(&mut self, frame: &Frame) -> Result<Vec<Candidate>> {
        let boxes = self.model.forward(frame)?;
        Ok(self.tracker.update(&boxes))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::collections::VecDeque;

    use image::Rgb;

    use super::*;

    /// 按脚本逐帧返回候选
    pub(crate) struct ScriptedCandidates(pub VecDeque<Vec<Candidate>>);

    impl ScriptedCandidates {
        pub(crate) fn new(frames: Vec<Vec<Candidate>>) -> Self {
            Self(frames.into())
        }
    }

    impl PersonDetector for ScriptedCandidates {
        fn candidates(&mut self, _frame: &Frame) -> Result<Vec<Candidate>> {
            Ok(self.0.pop_front().unwrap_or_default())
        }
    }

    pub(crate) fn candidate(identity: u32, cx: f32, cy: f32, w: f32, h: f32) -> Candidate {
        Candidate {
            cx,
            cy,
            w,
            h,
            identity,
            confidence: 0.9,
        }
    }

    #[test]
    fn test_select_primary_takes_first() {
        let cands = vec![candidate(7, 0.0, 0.0, 1.0, 1.0), candidate(3, 5.0, 5.0, 1.0, 1.0)];
        assert_eq!(select_primary(&cands).map(|c| c.identity), Some(7));
        assert!(select_primary(&[]).is_none());
    }

    #[test]
    fn test_track_converts_center_box_and_crops() {
        let mut frame = Frame::new(200, 100);
        frame.put_pixel(60, 30, Rgb([255, 0, 0]));

        let mut tracker = PersonTracker::new(Box::new(ScriptedCandidates::new(vec![vec![
            candidate(4, 80.0, 50.0, 41.0, 40.0),
        ]])));
        let result = tracker.track(&frame).unwrap().unwrap();

        assert_eq!(result.identity, 4);
        assert_eq!(
            result.bbox,
            Region {
                x: 59,
                y: 30,
                width: 41,
                height: 40
            }
        );
        assert_eq!(result.roi.dimensions(), (41, 40));
        assert_eq!(result.roi.get_pixel(1, 0), &Rgb([255, 0, 0]));
    }

    #[test]
    fn test_track_without_candidates_is_none() {
        let mut tracker = PersonTracker::new(Box::new(ScriptedCandidates::new(vec![vec![]])));
        assert!(tracker.track(&Frame::new(10, 10)).unwrap().is_none());
    }

    #[test]
    fn test_crop_is_clamped_to_frame() {
        let frame = Frame::new(100, 100);
        let roi = crop_roi(
            &frame,
            &Region {
                x: -20,
                y: 90,
                width: 50,
                height: 30,
            },
        );
        assert_eq!(roi.dimensions(), (30, 10));

        let outside = crop_roi(
            &frame,
            &Region {
                x: 150,
                y: 0,
                width: 10,
                height: 10,
            },
        );
        assert_eq!(outside.dimensions(), (0, 0));
    }
}
