//! ByteTrack 算法实现
//! ByteTrack: Simple and effective multi-object tracking
//!
//! 核心思想:
//! 1. 高低分检测框分开处理
//! 2. 高分框优先匹配 (IOU)
//! 3. 低分框救援丢失的轨迹
//! 4. 纯运动模型,无需外观特征
//!
//! `update` 只返回本帧有检测框对应的轨迹, 顺序与输入检测框一致
//! (检测框按置信度降序, 所以第一个即最可信的人)。

use super::kalman::KalmanBoxFilter;
use super::types::{BBox, Candidate};
use crate::config::ByteTrackConfig;

/// 单条轨迹
#[derive(Clone, Debug)]
struct Track {
    id: u32,
    kalman: KalmanBoxFilter,
    frames_lost: u32,
}

impl Track {
    fn new(id: u32, bbox: &BBox) -> Self {
        Self {
            id,
            // 观测噪声较低, 更信任检测结果
            kalman: KalmanBoxFilter::new(bbox, 0.1, 0.5),
            frames_lost: 0,
        }
    }
}

/// ByteTrack 追踪器
pub struct ByteTracker {
    tracks: Vec<Track>,
    next_id: u32,
    config: ByteTrackConfig,
}

impl ByteTracker {
    pub fn new(config: ByteTrackConfig) -> Self {
        Self {
            tracks: Vec::new(),
            next_id: 1,
            config,
        }
    }

    /// 更新跟踪 (ByteTrack 三步匹配), 返回本帧匹配到的候选
    pub fn update(&mut self, detections: &[BBox]) -> Vec<Candidate> {
        // 1. 所有轨迹先预测
        for track in &mut self.tracks {
            track.kalman.predict();
        }

        // 2. 分离高低分检测框
        let mut high_dets = Vec::new();
        let mut low_dets = Vec::new();
        for (idx, det) in detections.iter().enumerate() {
            if det.confidence >= self.config.high_score {
                high_dets.push(idx);
            } else if det.confidence >= self.config.low_score {
                low_dets.push(idx);
            }
        }

        // 检测框索引 → 轨迹ID
        let mut det_identity: Vec<Option<u32>> = vec![None; detections.len()];
        let mut matched_track = vec![false; self.tracks.len()];

        // 3. 第一轮: 高分检测 + 所有轨迹
        let all_tracks: Vec<usize> = (0..self.tracks.len()).collect();
        for (det_idx, track_idx) in
            self.associate(detections, &high_dets, &all_tracks, self.config.high_iou)
        {
            matched_track[track_idx] = true;
            det_identity[det_idx] = Some(self.tracks[track_idx].id);
            self.tracks[track_idx].kalman.update(&detections[det_idx]);
            self.tracks[track_idx].frames_lost = 0;
        }

        // 4. 第二轮: 低分检测 + 未匹配轨迹 (救援)
        let unmatched: Vec<usize> = (0..self.tracks.len())
            .filter(|&idx| !matched_track[idx])
            .collect();
        for (det_idx, track_idx) in
            self.associate(detections, &low_dets, &unmatched, self.config.low_iou)
        {
            matched_track[track_idx] = true;
            det_identity[det_idx] = Some(self.tracks[track_idx].id);
            self.tracks[track_idx].kalman.update(&detections[det_idx]);
            self.tracks[track_idx].frames_lost = 0;
        }

        // 5. 未匹配轨迹 → 丢失计数
        for (track, &matched) in self.tracks.iter_mut().zip(&matched_track) {
            if !matched {
                track.frames_lost += 1;
            }
        }

        // 6. 未匹配的高分检测 → 新建轨迹
        for &det_idx in &high_dets {
            if det_identity[det_idx].is_none() {
                let id = self.next_id;
                self.next_id += 1;
                self.tracks.push(Track::new(id, &detections[det_idx]));
                det_identity[det_idx] = Some(id);
            }
        }

        // 7. 删除丢失太久的轨迹
        let max_lost = self.config.max_lost_frames;
        self.tracks.retain(|t| t.frames_lost <= max_lost);

        detections
            .iter()
            .zip(det_identity)
            .filter_map(|(det, id)| id.map(|id| Candidate::from_bbox(det, id)))
            .collect()
    }

    /// 贪心 IOU 关联, 返回 (检测索引, 轨迹索引)
    fn associate(
        &self,
        detections: &[BBox],
        det_indices: &[usize],
        track_indices: &[usize],
        iou_threshold: f32,
    ) -> Vec<(usize, usize)> {
        let mut pairs = Vec::new();
        for &det_idx in det_indices {
            for &track_idx in track_indices {
                let iou = detections[det_idx].iou(&self.tracks[track_idx].kalman.predicted_bbox());
                if iou >= iou_threshold {
                    pairs.push((1.0 - iou, det_idx, track_idx));
                }
            }
        }
        pairs.sort_by(|a, b| a.0.total_cmp(&b.0));

        let mut used_det = vec![false; detections.len()];
        let mut used_track = vec![false; self.tracks.len()];
        let mut assignments = Vec::new();
        for (_, det_idx, track_idx) in pairs {
            if !used_det[det_idx] && !used_track[track_idx] {
                used_det[det_idx] = true;
                used_track[track_idx] = true;
                assignments.push((det_idx, track_idx));
            }
        }
        assignments
    }
}
