/// 人体检测与跟踪 (Detection System)
///
/// - YOLOv8:    人体检测 (models::yolov8)
/// - ByteTrack: 跨帧分配稳定ID
/// - Person:    单目标选择 + 感兴趣区域裁剪
pub mod bytetrack;
pub mod kalman;
pub mod person;
pub mod types;

pub use bytetrack::ByteTracker;
pub use person::{crop_roi, select_primary, PersonDetector, PersonTracker, YoloPersonDetector};
pub use types::{BBox, Candidate, Region, TrackingResult};
