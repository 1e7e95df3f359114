//! 边界框卡尔曼滤波 (对角协方差简化版)
//!
//! 状态向量: [cx, cy, w, h, vx, vy, vw, vh], 匀速模型 + 速度衰减

use super::types::BBox;

#[derive(Clone, Debug)]
pub struct KalmanBoxFilter {
    state: [f32; 8],
    /// 估计误差协方差 (对角)
    p: [f32; 8],
    /// 过程噪声
    q: f32,
    /// 观测噪声
    r: f32,
    /// 每帧保留的速度比例
    velocity_decay: f32,
}

impl KalmanBoxFilter {
    /// - `q`: 过程噪声 (越小越平滑)
    /// - `r`: 观测噪声 (越大越信任预测)
    pub fn new(bbox: &BBox, q: f32, r: f32) -> Self {
        let (cx, cy) = bbox.center();
        Self {
            state: [cx, cy, bbox.width(), bbox.height(), 0.0, 0.0, 0.0, 0.0],
            p: [10.0; 8],
            q,
            r,
            velocity_decay: 0.95,
        }
    }

    pub fn predict(&mut self) {
        for v in &mut self.state[4..] {
            *v *= self.velocity_decay;
        }
        for i in 0..4 {
            self.state[i] += self.state[i + 4];
        }
        for p in &mut self.p {
            *p += self.q;
        }
    }

    pub fn update(&mut self, bbox: &BBox) {
        let (cx, cy) = bbox.center();
        let residual = [
            cx - self.state[0],
            cy - self.state[1],
            bbox.width() - self.state[2],
            bbox.height() - self.state[3],
        ];

        // 位置增益 K = P / (P + R), 速度增益更保守
        for i in 0..4 {
            let k_pos = self.p[i] / (self.p[i] + self.r);
            let k_vel = self.p[i + 4] / (self.p[i + 4] + self.r * 10.0);
            self.state[i] += k_pos * residual[i];
            self.state[i + 4] += k_vel * residual[i];
            self.p[i] *= 1.0 - k_pos;
            self.p[i + 4] *= 1.0 - k_vel;
        }
    }

    /// 当前状态对应的边界框
    pub fn state_bbox(&self, confidence: f32) -> BBox {
        self.to_bbox(
            self.state[0],
            self.state[1],
            self.state[2],
            self.state[3],
            confidence,
        )
    }

    /// 下一帧预测框 (用于关联)
    pub fn predicted_bbox(&self) -> BBox {
        self.to_bbox(
            self.state[0] + self.state[4],
            self.state[1] + self.state[5],
            self.state[2] + self.state[6],
            self.state[3] + self.state[7],
            1.0,
        )
    }

    fn to_bbox(&self, cx: f32, cy: f32, w: f32, h: f32, confidence: f32) -> BBox {
        let (w, h) = (w.max(1.0), h.max(1.0));
        BBox {
            x1: cx - w / 2.0,
            y1: cy - h / 2.0,
            x2: cx + w / 2.0,
            y2: cy + h / 2.0,
            confidence,
            class_id: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bbox(x1: f32, y1: f32, x2: f32, y2: f32) -> BBox {
        BBox {
            x1,
            y1,
            x2,
            y2,
            confidence: 0.9,
            class_id: 0,
        }
    }

    #[test]
    fn test_initial_state_matches_detection() {
        let kf = KalmanBoxFilter::new(&bbox(10.0, 20.0, 50.0, 100.0), 0.1, 0.5);
        assert_eq!(kf.state_bbox(0.9), bbox(10.0, 20.0, 50.0, 100.0));
    }

    #[test]
    fn test_update_moves_towards_observation() {
        let mut kf = KalmanBoxFilter::new(&bbox(0.0, 0.0, 10.0, 10.0), 0.1, 0.5);
        kf.predict();
        kf.update(&bbox(10.0, 0.0, 20.0, 10.0));
        let (cx, _) = kf.state_bbox(1.0).center();
        assert!(cx > 5.0 && cx <= 15.0);
        // 学到向右的速度
        let (px, _) = kf.predicted_bbox().center();
        assert!(px > cx);
    }
}
