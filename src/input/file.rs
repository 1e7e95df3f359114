//! 视频文件回放
//!
//! 分辨率取自视频流 (首个解码帧), 解码节奏跟随工作线程, 不丢帧。

use std::path::PathBuf;

use ez_ffmpeg::Input;
use tracing::info;

use super::decode_filter::{DecodeStream, Delivery};
use super::{FrameSource, SourceKind};
use crate::error::{Result, SentinelError};
use crate::Frame;

pub struct PreRecorded {
    path: PathBuf,
    stream: Option<DecodeStream>,
    /// `start` 时预读的首帧
    pending: Option<Frame>,
    current: Option<Frame>,
    width: u32,
    height: u32,
}

impl PreRecorded {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            stream: None,
            pending: None,
            current: None,
            width: 0,
            height: 0,
        }
    }
}

impl FrameSource for PreRecorded {
    fn kind(&self) -> SourceKind {
        SourceKind::PreRecorded
    }

    fn start(&mut self) -> Result<()> {
        if self.stream.is_some() {
            return Err(SentinelError::Configuration(format!(
                "视频文件已打开: {}",
                self.path.display()
            )));
        }
        if !self.path.exists() {
            return Err(SentinelError::Configuration(format!(
                "视频文件不存在: {}",
                self.path.display()
            )));
        }

        let input = Input::new(self.path.to_string_lossy().to_string());
        let stream = DecodeStream::spawn(input, None, Delivery::Blocking)?;
        let first = stream.recv().ok_or_else(|| {
            SentinelError::Decode(format!("无法读取视频: {}", self.path.display()))
        })?;

        (self.width, self.height) = first.dimensions();
        info!(
            "🎞️ 打开视频文件: {} ({}x{})",
            self.path.display(),
            self.width,
            self.height
        );
        self.pending = Some(first);
        self.stream = Some(stream);
        Ok(())
    }

    fn next_frame(&mut self) -> Option<Frame> {
        self.current = match self.pending.take() {
            Some(frame) => Some(frame),
            None => self.stream.as_ref()?.recv(),
        };
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
        self.pending = None;
    }
}
