/// 模型统一接口与实现
///
/// # 架构说明
///
/// ## 图像模型 (Model trait)
/// - **YOLOv8**: 人体检测 (仅 person 类别), 供跟踪器使用
///   - 文件: `yolov8.rs`
/// - **PoseLandmarker**: 单人姿态关键点 (33点, x/y/z/visibility)
///   - 文件: `landmarker.rs`
///
/// ## 时序模型
/// - **ActionNet**: 姿态窗口 → 动作类别得分, 直接实现 `ActionModel`
///   - 文件: `action_net.rs`
///
/// ## Model Trait
/// 统一的模型接口，定义标准流程: preprocess → run → postprocess
///
/// ```text
/// 原始图片 → preprocess → ndarray张量
///          ↓
///     推理引擎 run
///          ↓
///     原始输出 → postprocess → Self::Output
/// ```
use ndarray::{Array, IxDyn};

use crate::error::Result;
use crate::{Frame, OrtBackend};

pub trait Model {
    /// 后处理结果类型
    type Output;

    /// 预处理: 图片 → 模型输入张量
    fn preprocess(&mut self, image: &Frame) -> Result<Array<f32, IxDyn>>;

    /// 推理: 执行模型前向传播, 返回原始输出
    fn run(&mut self, xs: Array<f32, IxDyn>) -> Result<Vec<Array<f32, IxDyn>>> {
        self.engine_mut().run(xs)
    }

    /// 后处理: 原始输出 → 结果 (坐标还原到 `image`)
    fn postprocess(&self, ys: Vec<Array<f32, IxDyn>>, image: &Frame) -> Result<Self::Output>;

    /// 完整的推理流程: preprocess → run → postprocess
    fn forward(&mut self, image: &Frame) -> Result<Self::Output> {
        let xs = self.preprocess(image)?;
        let ys = self.run(xs)?;
        self.postprocess(ys, image)
    }

    /// 获取底层推理引擎的可变引用
    fn engine_mut(&mut self) -> &mut OrtBackend;
}

/// 等比缩放: 返回 (缩放比例, 新宽, 新高)
pub(crate) fn scale_wh(w0: f32, h0: f32, w1: f32, h1: f32) -> (f32, f32, f32) {
    let r = (w1 / w0).min(h1 / h0);
    (r, (w0 * r).round(), (h0 * r).round())
}

pub mod action_net;
pub mod landmarker;
pub mod yolov8;

pub use action_net::ActionNet;
pub use landmarker::PoseLandmarker;
pub use yolov8::YOLOv8;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scale_wh_keeps_aspect() {
        let (r, w, h) = scale_wh(1200.0, 800.0, 640.0, 640.0);
        assert!((r - 640.0 / 1200.0).abs() < 1e-6);
        assert_eq!(w, 640.0);
        assert_eq!(h, 427.0);
    }
}
