//! 会话配置 - 通过JSON文件调整参数
//!
//! 所有参数在会话启动时一次性传入, 运行期间不可变。

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::action::ActionLabel;
use crate::error::{Result, SentinelError};
use crate::ort_backend::OrtEP;

/// 推理后端选择 (JSON中以小写字符串表示)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionProvider {
    Cpu,
    Cuda,
    Trt,
}

/// ByteTrack 关联参数
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ByteTrackConfig {
    pub max_lost_frames: u32, // 最大允许丢失帧数
    pub high_score: f32,      // 高分检测阈值
    pub low_score: f32,       // 低分检测阈值 (救援用)
    pub high_iou: f32,        // 高分匹配 IOU 阈值
    pub low_iou: f32,         // 低分匹配 IOU 阈值
}

impl Default for ByteTrackConfig {
    fn default() -> Self {
        Self {
            max_lost_frames: 60, // 约2秒, 提高遮挡容忍度
            high_score: 0.4,
            low_score: 0.1,
            high_iou: 0.4,
            low_iou: 0.3,
        }
    }
}

/// 行为哨兵参数配置
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct SentinelConfig {
    // === 画面参数 ===
    pub frame_width: u32,  // 摄像头/无人机画面宽度
    pub frame_height: u32, // 摄像头/无人机画面高度

    // === 姿态窗口 ===
    pub window_length: usize,         // 动作识别窗口长度 (帧)
    pub landmark_count: usize,        // 每帧姿态关键点数量
    pub pose_presence_threshold: f32, // 姿态存在置信度阈值
    pub pose_input_size: u32,         // 姿态模型输入尺寸

    // === 动作识别 ===
    pub actions: Vec<ActionLabel>,           // 模型输出顺序对应的动作标签
    pub malicious_actions: Vec<ActionLabel>, // 触发告警的动作

    // === 人体检测 ===
    pub detection_input_size: u32,     // YOLO输入尺寸
    pub detection_conf_threshold: f32, // 检测置信度阈值
    pub detection_iou_threshold: f32,  // NMS IOU阈值
    pub person_class_id: usize,        // 人的类别ID (COCO=0)

    // === ByteTrack参数 ===
    pub bytetrack_max_lost_frames: u32,
    pub bytetrack_high_score_threshold: f32,
    pub bytetrack_low_score_threshold: f32,
    pub bytetrack_high_iou_threshold: f32,
    pub bytetrack_low_iou_threshold: f32,

    // === 模型路径 ===
    pub pose_model: PathBuf,
    pub action_model: PathBuf,
    pub tracking_model: PathBuf,
    pub execution_provider: ExecutionProvider,
    pub device_id: i32,

    // === 录像 ===
    pub recordings_dir: PathBuf,
    pub video_fps: u32,    // 录像帧率
    pub jpeg_quality: u8,  // MJPEG 压缩质量

    // === 输入源 ===
    pub camera_device: String,
    pub drone_address: String,
    pub drone_command_port: u16,
    pub drone_video_port: u16,

    // === 叠加层 ===
    pub font_path: Option<PathBuf>,
}

impl Default for SentinelConfig {
    fn default() -> Self {
        Self {
            frame_width: 1200,
            frame_height: 800,

            window_length: 30,
            landmark_count: 33,
            pose_presence_threshold: 0.5,
            pose_input_size: 256,

            actions: ActionLabel::ALL.to_vec(),
            malicious_actions: vec![ActionLabel::Punching, ActionLabel::Kicking],

            detection_input_size: 640,
            detection_conf_threshold: 0.25,
            detection_iou_threshold: 0.45,
            person_class_id: 0,

            bytetrack_max_lost_frames: 60,
            bytetrack_high_score_threshold: 0.4,
            bytetrack_low_score_threshold: 0.1,
            bytetrack_high_iou_threshold: 0.4,
            bytetrack_low_iou_threshold: 0.3,

            pose_model: PathBuf::from("models/pose_landmark_full.onnx"),
            action_model: PathBuf::from("models/lstm_action_recognition.onnx"),
            tracking_model: PathBuf::from("models/yolov8n_human_tracking.onnx"),
            execution_provider: ExecutionProvider::Cpu,
            device_id: 0,

            recordings_dir: PathBuf::from("behaviour_recognition_recordings"),
            video_fps: 5,
            jpeg_quality: 80,

            camera_device: default_camera_device(),
            drone_address: "192.168.10.1".to_string(),
            drone_command_port: 8889,
            drone_video_port: 11111,

            font_path: None,
        }
    }
}

#[cfg(target_os = "windows")]
fn default_camera_device() -> String {
    "video=Integrated Camera".to_string()
}

#[cfg(target_os = "macos")]
fn default_camera_device() -> String {
    "0".to_string()
}

#[cfg(not(any(target_os = "windows", target_os = "macos")))]
fn default_camera_device() -> String {
    "/dev/video0".to_string()
}

impl SentinelConfig {
    /// 从JSON文件加载配置, 文件不存在时写入默认配置
    pub fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        match fs::read_to_string(path) {
            Ok(json) => match serde_json::from_str(&json) {
                Ok(config) => {
                    info!("✅ 配置已从 {} 加载", path.display());
                    config
                }
                Err(e) => {
                    warn!("⚠️  配置文件解析失败: {}, 使用默认值", e);
                    Self::default()
                }
            },
            Err(_) => {
                info!("📝 配置文件不存在,创建默认配置...");
                let config = Self::default();
                if let Err(e) = config.save(path) {
                    warn!("❌ 保存配置失败: {}", e);
                }
                config
            }
        }
    }

    /// 保存配置到JSON文件
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path.as_ref(), json)?;
        info!("💾 配置已保存到 {}", path.as_ref().display());
        Ok(())
    }

    /// 检查参数一致性
    pub fn validate(&self) -> Result<()> {
        if self.window_length == 0 {
            return Err(SentinelError::Configuration(
                "window_length 必须大于 0".into(),
            ));
        }
        if self.landmark_count == 0 {
            return Err(SentinelError::Configuration(
                "landmark_count 必须大于 0".into(),
            ));
        }
        if self.actions.is_empty() {
            return Err(SentinelError::Configuration("动作标签列表为空".into()));
        }
        if let Some(label) = self
            .malicious_actions
            .iter()
            .find(|label| !self.actions.contains(label))
        {
            return Err(SentinelError::Configuration(format!(
                "告警动作 {} 不在动作标签列表中",
                label
            )));
        }
        if self.video_fps == 0 {
            return Err(SentinelError::Configuration("video_fps 必须大于 0".into()));
        }
        if self.frame_width == 0 || self.frame_height == 0 {
            return Err(SentinelError::Configuration("画面尺寸不能为 0".into()));
        }
        Ok(())
    }

    pub fn bytetrack(&self) -> ByteTrackConfig {
        ByteTrackConfig {
            max_lost_frames: self.bytetrack_max_lost_frames,
            high_score: self.bytetrack_high_score_threshold,
            low_score: self.bytetrack_low_score_threshold,
            high_iou: self.bytetrack_high_iou_threshold,
            low_iou: self.bytetrack_low_iou_threshold,
        }
    }

    pub fn ort_ep(&self) -> OrtEP {
        match self.execution_provider {
            ExecutionProvider::Cpu => OrtEP::CPU,
            ExecutionProvider::Cuda => OrtEP::CUDA(self.device_id),
            ExecutionProvider::Trt => OrtEP::Trt(self.device_id),
        }
    }

    /// 打印当前配置
    pub fn print_summary(&self) {
        info!("🎛️  当前配置:");
        info!("  画面尺寸: {}x{}", self.frame_width, self.frame_height);
        info!("  动作窗口: {} 帧", self.window_length);
        info!("  录像帧率: {} fps", self.video_fps);
        info!(
            "  告警动作: {}",
            self.malicious_actions
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(", ")
        );
        info!("  推理后端: {:?}", self.execution_provider);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_matches_recognition_setup() {
        let config = SentinelConfig::default();
        assert_eq!(config.window_length, 30);
        assert_eq!(config.video_fps, 5);
        assert_eq!(config.landmark_count * crate::pose::CHANNELS, 132);
        assert_eq!(
            config.malicious_actions,
            vec![ActionLabel::Punching, ActionLabel::Kicking]
        );
        assert!(config.validate().is_ok());
        assert_eq!(config.bytetrack(), ByteTrackConfig::default());
    }

    #[test]
    fn test_validate_rejects_unknown_malicious_label() {
        let config = SentinelConfig {
            actions: vec![ActionLabel::Running, ActionLabel::Walking],
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(SentinelError::Configuration(_))
        ));
    }

    #[test]
    fn test_validate_rejects_empty_window() {
        let config = SentinelConfig {
            window_length: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_creates_default_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sentinel.json");

        let config = SentinelConfig::load(&path);
        assert!(path.exists());
        assert_eq!(config.window_length, 30);

        // 部分字段也能解析, 其余使用默认值
        fs::write(&path, r#"{ "window_length": 12, "execution_provider": "cuda" }"#).unwrap();
        let config = SentinelConfig::load(&path);
        assert_eq!(config.window_length, 12);
        assert_eq!(config.execution_provider, ExecutionProvider::Cuda);
        assert_eq!(config.frame_width, 1200);
    }

    #[test]
    fn test_load_falls_back_on_bad_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        fs::write(&path, "{ not json").unwrap();

        let config = SentinelConfig::load(&path);
        assert_eq!(config.window_length, 30);
    }
}
