/// 人体检测与跟踪数据结构定义
/// Data structures for person detection and tracking
use crate::Frame;

// ========== 检测框 ==========

/// 检测框 (Detection bounding box), 左上/右下角点, 原图像素坐标
#[derive(Clone, Debug, PartialEq)]
pub struct BBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
    pub confidence: f32,
    pub class_id: u32,
}

impl BBox {
    pub fn width(&self) -> f32 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> f32 {
        self.y2 - self.y1
    }

    pub fn center(&self) -> (f32, f32) {
        ((self.x1 + self.x2) / 2.0, (self.y1 + self.y2) / 2.0)
    }

    /// IOU (Intersection over Union)
    pub fn iou(&self, other: &BBox) -> f32 {
        let x1 = self.x1.max(other.x1);
        let y1 = self.y1.max(other.y1);
        let x2 = self.x2.min(other.x2);
        let y2 = self.y2.min(other.y2);

        if x2 <= x1 || y2 <= y1 {
            return 0.0;
        }

        let intersection = (x2 - x1) * (y2 - y1);
        let union = self.width() * self.height() + other.width() * other.height() - intersection;
        if union <= 0.0 {
            return 0.0;
        }
        intersection / union
    }
}

// ========== 跟踪候选 ==========

/// 跟踪候选: 中心点格式的人体框 + 稳定的跟踪ID
#[derive(Clone, Debug, PartialEq)]
pub struct Candidate {
    pub cx: f32,
    pub cy: f32,
    pub w: f32,
    pub h: f32,
    pub identity: u32,
    pub confidence: f32,
}

impl Candidate {
    pub fn from_bbox(bbox: &BBox, identity: u32) -> Self {
        let (cx, cy) = bbox.center();
        Self {
            cx,
            cy,
            w: bbox.width(),
            h: bbox.height(),
            identity,
            confidence: bbox.confidence,
        }
    }
}

/// 整数像素区域, 左上角原点
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Region {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Region {
    /// 中心点格式转左上角格式: `x = cx - w/2`, `y = cy - h/2`, 向零截断
    pub fn from_center(cx: f32, cy: f32, w: f32, h: f32) -> Self {
        Self {
            x: (cx - w / 2.0) as i32,
            y: (cy - h / 2.0) as i32,
            width: w as i32,
            height: h as i32,
        }
    }
}

/// 单帧跟踪结果: 主目标框 + 跟踪ID + 裁剪出的感兴趣区域
#[derive(Clone, Debug)]
pub struct TrackingResult {
    pub bbox: Region,
    pub identity: u32,
    pub roi: Frame,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_iou() {
        let a = BBox {
            x1: 0.0,
            y1: 0.0,
            x2: 10.0,
            y2: 10.0,
            confidence: 1.0,
            class_id: 0,
        };
        let b = BBox {
            x1: 5.0,
            x2: 15.0,
            ..a.clone()
        };
        assert!((a.iou(&b) - 50.0 / 150.0).abs() < 1e-6);
        let far = BBox {
            x1: 20.0,
            x2: 30.0,
            ..a.clone()
        };
        assert_eq!(a.iou(&far), 0.0);
    }

    #[test]
    fn test_region_truncates() {
        let r = Region::from_center(100.0, 80.0, 41.0, 61.0);
        assert_eq!(r, Region { x: 79, y: 49, width: 41, height: 61 });
    }
}
