//! 单人姿态关键点模型 (BlazePose 风格 ONNX)
//!
//! 输入: 正方形 RGB 图像 (NHWC 或 NCHW, 0-1)
//! 输出: `ys[0]` 为 [1, K × stride] 关键点 (像素坐标 x, y, z, visibility, presence),
//!       `ys[1]` 为 [1, 1] 人体存在得分
//!
//! 画面按等比缩放贴在左上角, 关键点坐标还原为相对原图的 0-1 归一化值。

use fast_image_resize as fr;
use ndarray::{Array, IxDyn};

use super::{scale_wh, Model};
use crate::config::SentinelConfig;
use crate::error::{Result, SentinelError};
use crate::pose::{Landmark, LandmarkModel};
use crate::{Frame, OrtBackend, OrtConfig};

/// 每个关键点的输出通道: x, y, z, visibility, presence
const LANDMARK_STRIDE: usize = 5;

pub struct PoseLandmarker {
    engine: OrtBackend,
    size: u32,
    nchw: bool,
    landmark_count: usize,
    presence_threshold: f32,
    resizer: fr::Resizer,
}

impl PoseLandmarker {
    pub fn new(config: &SentinelConfig) -> Result<Self> {
        let engine = OrtBackend::build(OrtConfig {
            f: config.pose_model.clone(),
            ep: config.ort_ep(),
        })?;

        // [1, 3, H, W] 为 NCHW, 否则按 [1, H, W, 3] 处理
        let nchw = engine.fixed_dim(1) == Some(3);
        let size = if nchw {
            engine.fixed_dim(2)
        } else {
            engine.fixed_dim(1)
        }
        .unwrap_or(config.pose_input_size);

        Ok(Self {
            engine,
            size,
            nchw,
            landmark_count: config.landmark_count,
            presence_threshold: config.pose_presence_threshold,
            resizer: fr::Resizer::new(),
        })
    }
}

impl Model for PoseLandmarker {
    type Output = Option<Vec<Landmark>>;

    fn preprocess(&mut self, image: &Frame) -> Result<Array<f32, IxDyn>> {
        let (w0, h0) = image.dimensions();
        let (_, w_new, h_new) = scale_wh(w0 as f32, h0 as f32, self.size as f32, self.size as f32);
        let (w_new, h_new) = ((w_new as u32).max(1), (h_new as u32).max(1));

        // fast_image_resize 双线性缩放
        let src_image =
            fr::images::Image::from_vec_u8(w0, h0, image.as_raw().clone(), fr::PixelType::U8x3)
                .map_err(|e| SentinelError::Model(format!("缩放源图像创建失败: {}", e)))?;
        let mut dst_image = fr::images::Image::new(w_new, h_new, fr::PixelType::U8x3);
        self.resizer
            .resize(
                &src_image,
                &mut dst_image,
                &fr::ResizeOptions::new()
                    .resize_alg(fr::ResizeAlg::Convolution(fr::FilterType::Bilinear)),
            )
            .map_err(|e| SentinelError::Model(format!("图像缩放失败: {}", e)))?;

        let size = self.size as usize;
        let mut ys = if self.nchw {
            Array::zeros((1, 3, size, size)).into_dyn()
        } else {
            Array::zeros((1, size, size, 3)).into_dyn()
        };

        let row = w_new as usize;
        for (i, px) in dst_image.buffer().chunks_exact(3).enumerate() {
            let (x, y) = (i % row, i / row);
            for (c, &v) in px.iter().enumerate() {
                let v = v as f32 / 255.0;
                if self.nchw {
                    ys[[0, c, y, x]] = v;
                } else {
                    ys[[0, y, x, c]] = v;
                }
            }
        }

        Ok(ys)
    }

    fn postprocess(&self, ys: Vec<Array<f32, IxDyn>>, image: &Frame) -> Result<Self::Output> {
        let (w0, h0) = image.dimensions();
        let ratio = (self.size as f32 / w0 as f32).min(self.size as f32 / h0 as f32);
        decode_landmarks(
            &ys,
            self.landmark_count,
            self.presence_threshold,
            ratio,
            (w0 as f32, h0 as f32),
        )
    }

    fn engine_mut(&mut self) -> &mut OrtBackend {
        &mut self.engine
    }
}

impl LandmarkModel for PoseLandmarker {
    fn detect(&mut self, frame: &Frame) -> Result<Option<Vec<Landmark>>> {
        self.forward(frame)
    }
}

fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

/// 解码关键点输出; 存在得分低于阈值时返回 `None`
fn decode_landmarks(
    ys: &[Array<f32, IxDyn>],
    landmark_count: usize,
    presence_threshold: f32,
    ratio: f32,
    (w0, h0): (f32, f32),
) -> Result<Option<Vec<Landmark>>> {
    let raw = ys
        .first()
        .ok_or_else(|| SentinelError::Model("关键点模型没有输出".to_string()))?;

    // 没有单独的存在得分输出时视为总是存在
    let presence = match ys.get(1).and_then(|flag| flag.iter().next()) {
        Some(&score) => score,
        None => 1.0,
    };
    if presence < presence_threshold {
        return Ok(None);
    }

    let values: Vec<f32> = raw.iter().copied().collect();
    if values.len() < landmark_count * LANDMARK_STRIDE {
        return Err(SentinelError::Model(format!(
            "关键点输出长度{} 小于 {}×{}",
            values.len(),
            landmark_count,
            LANDMARK_STRIDE
        )));
    }

    let landmarks = values
        .chunks_exact(LANDMARK_STRIDE)
        .take(landmark_count)
        .map(|lm| {
            Landmark::new(
                lm[0] / ratio / w0,
                lm[1] / ratio / h0,
                lm[2] / ratio / w0,
                sigmoid(lm[3]),
            )
        })
        .collect();
    Ok(Some(landmarks))
}
