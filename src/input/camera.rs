//! 摄像头输入模块
//!
//! 处理本地摄像头输入,支持 DirectShow(Windows) / AVFoundation(macOS) / V4L2(Linux)

use ez_ffmpeg::Input;
use tracing::{info, warn};

use super::decode_filter::{DecodeStream, Delivery};
use super::{FrameSource, SourceKind};
use crate::config::SentinelConfig;
use crate::error::{Result, SentinelError};
use crate::Frame;

#[cfg(target_os = "windows")]
const CAMERA_FORMAT: &str = "dshow"; // DirectShow

#[cfg(target_os = "macos")]
const CAMERA_FORMAT: &str = "avfoundation"; // AVFoundation

#[cfg(not(any(target_os = "windows", target_os = "macos")))]
const CAMERA_FORMAT: &str = "v4l2"; // Video4Linux2

/// 摄像头帧源: 以固定分辨率采集
pub struct Webcam {
    device: String,
    width: u32,
    height: u32,
    stream: Option<DecodeStream>,
    current: Option<Frame>,
}

impl Webcam {
    pub fn new(config: &SentinelConfig) -> Self {
        Self {
            device: config.camera_device.clone(),
            width: config.frame_width,
            height: config.frame_height,
            stream: None,
            current: None,
        }
    }
}

impl FrameSource for Webcam {
    fn kind(&self) -> SourceKind {
        SourceKind::Webcam
    }

    fn start(&mut self) -> Result<()> {
        if self.stream.is_some() {
            return Err(SentinelError::Configuration(format!(
                "摄像头已打开: {}",
                self.device
            )));
        }
        info!(
            "🎥 打开摄像头: {} ({}, {}x{})",
            self.device, CAMERA_FORMAT, self.width, self.height
        );
        let video_size = format!("{}x{}", self.width, self.height);
        let input = Input::new(self.device.as_str())
            .set_format(CAMERA_FORMAT)
            .set_input_opts([("video_size", video_size.as_str())].into());

        // 设备不支持所请求的分辨率时由缩放滤镜兜底
        self.stream = Some(DecodeStream::spawn(
            input,
            Some((self.width, self.height)),
            Delivery::DropWhenBusy,
        )?);
        Ok(())
    }

    fn next_frame(&mut self) -> Option<Frame> {
        self.current = self.stream.as_ref()?.recv();
        if self.current.is_none() {
            warn!("⚠️ 摄像头没有更多画面");
        }
        self.current.clone()
    }

    fn display_frame(&self) -> Option<Frame> {
        self.current.clone()
    }

    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn exit(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            stream.stop();
        }
        info!("📷 摄像头已释放");
    }
}

/// 获取可用的摄像头设备列表
pub fn get_camera_devices() -> Vec<String> {
    match ez_ffmpeg::device::get_input_video_devices() {
        Ok(devices) => devices,
        Err(e) => {
            warn!("⚠️ 获取摄像头列表失败: {}", e);
            vec![]
        }
    }
}
