/// 姿态估计系统 (Pose Estimation System)
///
/// - PoseVector: 单帧姿态向量 (关键点 × [x, y, z, visibility])
/// - PoseWindow: 最近N帧的滑动窗口 (FIFO)
/// - PoseEstimator: 关键点模型 + 窗口维护
pub mod estimator;
pub mod window;

pub use estimator::{LandmarkModel, PoseEstimator};
pub use window::{Landmark, PoseVector, PoseWindow};

/// 每个关键点的通道数: x, y, z, visibility
pub const CHANNELS: usize = 4;
