// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//
// YOLOv8 人体检测模型
// 包含: 模型加载、letterbox预处理、推理、person类别后处理 + NMS

use image::imageops::FilterType;
use image::DynamicImage;
use ndarray::{s, Array, Axis, IxDyn};

use super::{scale_wh, Model};
use crate::config::SentinelConfig;
use crate::detection::types::BBox;
use crate::error::{Result, SentinelError};
use crate::{Frame, OrtBackend, OrtConfig};

const CXYWH_OFFSET: usize = 4;

pub struct YOLOv8 {
    engine: OrtBackend,
    width: u32,
    height: u32,
    conf: f32,
    iou: f32,
    class_id: usize,
}

impl YOLOv8 {
    /// 从配置创建检测模型
    pub fn new(config: &SentinelConfig) -> Result<Self> {
        let engine = OrtBackend::build(OrtConfig {
            f: config.tracking_model.clone(),
            ep: config.ort_ep(),
        })?;

        // 输入为 NCHW, 动态尺寸时使用配置值
        let height = engine.fixed_dim(2).unwrap_or(config.detection_input_size);
        let width = engine.fixed_dim(3).unwrap_or(config.detection_input_size);

        Ok(Self {
            engine,
            width,
            height,
            conf: config.detection_conf_threshold,
            iou: config.detection_iou_threshold,
            class_id: config.person_class_id,
        })
    }
}

impl Model for YOLOv8 {
    /// 按置信度降序排列的人体框 (原图坐标)
    type Output = Vec<BBox>;

    fn preprocess(&mut self, image: &Frame) -> Result<Array<f32, IxDyn>> {
        let mut ys = Array::ones((1, 3, self.height as usize, self.width as usize)).into_dyn();
        ys.fill(144.0 / 255.0);

        let (w0, h0) = image.dimensions();
        let (_, w_new, h_new) =
            scale_wh(w0 as f32, h0 as f32, self.width as f32, self.height as f32);
        let img = DynamicImage::ImageRgb8(image.clone())
            .resize_exact(w_new as u32, h_new as u32, FilterType::Triangle)
            .into_rgb8();

        for (x, y, rgb) in img.enumerate_pixels() {
            let x = x as usize;
            let y = y as usize;
            let [r, g, b] = rgb.0;
            ys[[0, 0, y, x]] = (r as f32) / 255.0;
            ys[[0, 1, y, x]] = (g as f32) / 255.0;
            ys[[0, 2, y, x]] = (b as f32) / 255.0;
        }

        Ok(ys)
    }

    fn postprocess(&self, ys: Vec<Array<f32, IxDyn>>, image: &Frame) -> Result<Vec<BBox>> {
        let preds = ys
            .first()
            .ok_or_else(|| SentinelError::Model("检测模型没有输出".to_string()))?;
        let (w0, h0) = image.dimensions();
        let boxes = decode_person_boxes(
            preds,
            w0 as f32,
            h0 as f32,
            (self.width as f32 / w0 as f32).min(self.height as f32 / h0 as f32),
            self.class_id,
            self.conf,
        )?;
        Ok(non_max_suppression(boxes, self.iou))
    }

    fn engine_mut(&mut self) -> &mut OrtBackend {
        &mut self.engine
    }
}

/// 解码 YOLOv8 检测头输出 [1, 4 + nc, anchors], 只保留指定类别
fn decode_person_boxes(
    preds: &Array<f32, IxDyn>,
    width_original: f32,
    height_original: f32,
    ratio: f32,
    class_id: usize,
    conf_threshold: f32,
) -> Result<Vec<BBox>> {
    if preds.ndim() != 3 || preds.shape()[1] <= CXYWH_OFFSET {
        return Err(SentinelError::Model(format!(
            "检测输出形状异常: {:?}",
            preds.shape()
        )));
    }

    let mut boxes = Vec::new();
    for anchor in preds.axis_iter(Axis(0)).take(1) {
        for pred in anchor.axis_iter(Axis(1)) {
            let bbox = pred.slice(s![0..CXYWH_OFFSET]);
            let clss = pred.slice(s![CXYWH_OFFSET..]);

            // 取最大类别, 非人的框直接丢弃
            let Some((id, &confidence)) = clss
                .iter()
                .enumerate()
                .reduce(|max, x| if x.1 > max.1 { x } else { max })
            else {
                continue;
            };
            if id != class_id || confidence < conf_threshold {
                continue;
            }

            let cx = bbox[0] / ratio;
            let cy = bbox[1] / ratio;
            let w = bbox[2] / ratio;
            let h = bbox[3] / ratio;

            boxes.push(BBox {
                x1: (cx - w / 2.).clamp(0.0, width_original),
                y1: (cy - h / 2.).clamp(0.0, height_original),
                x2: (cx + w / 2.).clamp(0.0, width_original),
                y2: (cy + h / 2.).clamp(0.0, height_original),
                confidence,
                class_id: id as u32,
            });
        }
    }
    Ok(boxes)
}

/// 非极大值抑制, 结果按置信度降序
pub fn non_max_suppression(mut xs: Vec<BBox>, iou_threshold: f32) -> Vec<BBox> {
    xs.sort_by(|b1, b2| b2.confidence.total_cmp(&b1.confidence));

    let mut current_index = 0;
    for index in 0..xs.len() {
        let mut drop = false;
        for prev_index in 0..current_index {
            if xs[prev_index].iou(&xs[index]) > iou_threshold {
                drop = true;
                break;
            }
        }
        if !drop {
            xs.swap(current_index, index);
            current_index += 1;
        }
    }
    xs.truncate(current_index);
    xs
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bbox(x1: f32, y1: f32, x2: f32, y2: f32, confidence: f32) -> BBox {
        BBox {
            x1,
            y1,
            x2,
            y2,
            confidence,
            class_id: 0,
        }
    }

    #[test]
    fn test_nms_drops_overlapping_lower_score() {
        let kept = non_max_suppression(
            vec![
                bbox(0.0, 0.0, 100.0, 100.0, 0.6),
                bbox(5.0, 5.0, 105.0, 105.0, 0.9),
                bbox(300.0, 300.0, 350.0, 400.0, 0.5),
            ],
            0.45,
        );
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0].confidence, 0.9);
        assert_eq!(kept[1].confidence, 0.5);
    }

    #[test]
    fn test_decode_keeps_only_person_class() {
        // 2个类别, 3个anchor: [cx, cy, w, h, person, other]
        let mut preds = Array::zeros((1, 6, 3)).into_dyn();
        let anchors = [
            [50.0, 50.0, 20.0, 40.0, 0.9, 0.1],  // 人
            [80.0, 80.0, 10.0, 10.0, 0.2, 0.95], // 其他类别
            [20.0, 20.0, 10.0, 10.0, 0.1, 0.05], // 低分
        ];
        for (a, values) in anchors.iter().enumerate() {
            for (c, v) in values.iter().enumerate() {
                preds[[0, c, a]] = *v;
            }
        }

        let boxes = decode_person_boxes(&preds, 200.0, 200.0, 1.0, 0, 0.25).unwrap();
        assert_eq!(boxes.len(), 1);
        let b = &boxes[0];
        assert_eq!((b.x1, b.y1, b.x2, b.y2), (40.0, 30.0, 60.0, 70.0));
    }

    #[test]
    fn test_decode_rejects_bad_shape() {
        let preds = Array::zeros((1, 3)).into_dyn();
        assert!(decode_person_boxes(&preds, 10.0, 10.0, 1.0, 0, 0.25).is_err());
    }
}
