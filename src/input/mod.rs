/// 视频输入系统 (Video Input System)
///
/// 三种帧源共用 `FrameSource` 接口, 解码在独立线程中完成
/// - Webcam:      本地摄像头 (DirectShow/AVFoundation/V4L2)
/// - Drone:       无人机 UDP 视频流 + 控制指令
/// - PreRecorded: 视频文件回放
/// - Filter:      YUV → RGB 转换与帧投递
pub mod camera;
pub mod decode_filter;
pub mod drone;
pub mod file;

use std::fmt;

use crate::error::Result;
use crate::Frame;

pub use camera::{get_camera_devices, Webcam};
pub use decode_filter::{DecodeFilter, DecodeStream, Delivery};
pub use drone::{Drone, DroneLink};
pub use file::PreRecorded;

/// 帧源类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum SourceKind {
    Webcam,
    Drone,
    #[value(name = "file")]
    PreRecorded,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Webcam => "Webcam",
            SourceKind::Drone => "Drone",
            SourceKind::PreRecorded => "PreRecorded",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 帧源接口
///
/// 调用顺序: `start` → 循环 `next_frame` / `display_frame` → `exit`
pub trait FrameSource: Send {
    fn kind(&self) -> SourceKind;

    /// 打开设备/文件, 在取第一帧之前调用
    fn start(&mut self) -> Result<()>;

    /// 下一帧; `None` 表示流结束或设备断开
    fn next_frame(&mut self) -> Option<Frame>;

    /// 当前帧的显示版本 (叠加层与录像使用)
    fn display_frame(&self) -> Option<Frame>;

    fn width(&self) -> u32;

    fn height(&self) -> u32;

    /// 释放设备, 主循环结束后调用
    fn exit(&mut self);
}
