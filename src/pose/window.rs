//! 姿态向量与滑动窗口
//! Pose vectors and the rolling pose window

use std::collections::VecDeque;
use std::sync::Arc;

use ndarray::Array3;

use super::CHANNELS;

/// 单个姿态关键点 (归一化坐标)
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Landmark {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub visibility: f32,
}

impl Landmark {
    pub fn new(x: f32, y: f32, z: f32, visibility: f32) -> Self {
        Self {
            x,
            y,
            z,
            visibility,
        }
    }
}

/// 单帧姿态向量, 生成后不可变
///
/// 未检测到人体时为全零向量 (零姿态哨兵)。
#[derive(Debug, Clone, PartialEq)]
pub struct PoseVector {
    data: Arc<[f32]>, // Arc共享, 入窗口时避免复制
}

impl PoseVector {
    /// 全零向量: 本帧未检测到姿态
    pub fn zeros(len: usize) -> Self {
        Self {
            data: vec![0.0; len].into(),
        }
    }

    /// 按 [x, y, z, visibility] 顺序展平关键点
    pub fn from_landmarks(landmarks: &[Landmark]) -> Self {
        let mut data = Vec::with_capacity(landmarks.len() * CHANNELS);
        for lm in landmarks {
            data.extend_from_slice(&[lm.x, lm.y, lm.z, lm.visibility]);
        }
        Self { data: data.into() }
    }

    pub fn from_vec(data: Vec<f32>) -> Self {
        Self { data: data.into() }
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// 零姿态判定: 各分量之和为0
    pub fn is_zero(&self) -> bool {
        self.data.iter().sum::<f32>() == 0.0
    }
}

/// 最近N帧姿态向量的滑动窗口 (旧 → 新)
///
/// 只允许"追加最新 + 截断到最后N帧"一种修改方式, 因此 `len() <= capacity` 恒成立。
#[derive(Debug, Clone)]
pub struct PoseWindow {
    capacity: usize,
    vectors: VecDeque<PoseVector>,
}

impl PoseWindow {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            vectors: VecDeque::with_capacity(capacity + 1),
        }
    }

    /// 追加最新向量, 超出容量时淘汰最旧的
    pub fn push(&mut self, vector: PoseVector) {
        self.vectors.push_back(vector);
        while self.vectors.len() > self.capacity {
            self.vectors.pop_front();
        }
    }

    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn is_full(&self) -> bool {
        self.vectors.len() == self.capacity
    }

    pub fn newest(&self) -> Option<&PoseVector> {
        self.vectors.back()
    }

    /// 窗口已满且最新一帧检测到了姿态
    pub fn is_ready(&self) -> bool {
        self.is_full() && self.newest().is_some_and(|v| !v.is_zero())
    }

    pub fn iter(&self) -> impl Iterator<Item = &PoseVector> {
        self.vectors.iter()
    }

    /// 转换为模型输入张量 [1, N, D]
    pub fn to_array(&self) -> Array3<f32> {
        let dim = self.vectors.front().map_or(0, PoseVector::len);
        let mut xs = Array3::<f32>::zeros((1, self.vectors.len(), dim));
        for (t, vector) in self.vectors.iter().enumerate() {
            for (d, &value) in vector.as_slice().iter().enumerate().take(dim) {
                xs[[0, t, d]] = value;
            }
        }
        xs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pose(value: f32) -> PoseVector {
        PoseVector::from_vec(vec![value; 8])
    }

    #[test]
    fn test_window_never_exceeds_capacity() {
        let mut window = PoseWindow::new(30);
        for i in 0..100 {
            window.push(pose(i as f32 + 1.0));
            assert!(window.len() <= 30);
        }
        assert_eq!(window.len(), 30);

        // 保留的是最后30帧, 且按时间顺序
        let firsts: Vec<f32> = window.iter().map(|v| v.as_slice()[0]).collect();
        let expected: Vec<f32> = (71..=100).map(|i| i as f32).collect();
        assert_eq!(firsts, expected);
    }

    #[test]
    fn test_ready_at_the_nth_push() {
        let mut window = PoseWindow::new(30);
        for _ in 0..29 {
            window.push(pose(0.5));
            assert!(!window.is_ready());
        }
        window.push(pose(0.5));
        assert!(window.is_ready());
    }

    #[test]
    fn test_zero_newest_gates_readiness() {
        let mut window = PoseWindow::new(3);
        window.push(pose(1.0));
        window.push(pose(1.0));
        window.push(PoseVector::zeros(8));
        assert!(window.is_full());
        assert!(!window.is_ready());

        // 新的非零帧成为最新帧后恢复就绪 (零帧仍在窗口内)
        window.push(pose(1.0));
        assert!(window.is_ready());
        assert!(window.iter().any(PoseVector::is_zero));
    }

    #[test]
    fn test_from_landmarks_layout() {
        let v = PoseVector::from_landmarks(&[
            Landmark::new(0.1, 0.2, 0.3, 0.9),
            Landmark::new(0.4, 0.5, 0.6, 0.8),
        ]);
        assert_eq!(v.as_slice(), &[0.1, 0.2, 0.3, 0.9, 0.4, 0.5, 0.6, 0.8]);
        assert!(!v.is_zero());
        assert!(PoseVector::zeros(132).is_zero());
    }

    #[test]
    fn test_to_array_is_oldest_first() {
        let mut window = PoseWindow::new(2);
        window.push(pose(1.0));
        window.push(pose(2.0));
        window.push(pose(3.0));
        let xs = window.to_array();
        assert_eq!(xs.shape(), &[1, 2, 8]);
        assert_eq!(xs[[0, 0, 0]], 2.0);
        assert_eq!(xs[[0, 1, 7]], 3.0);
    }
}
