//! 录像: FFmpeg 编码线程 + 录像目录/文件名工具
//!
//! 工作线程把 RGB 帧送进通道, 编码线程以 rawvideo 读回调的形式
//! 交给 FFmpeg 编码为 Motion-JPEG 并写入容器 (由文件后缀决定)。

use std::fs;
use std::path::{Path, PathBuf};
use std::thread::{self, JoinHandle};

use crossbeam_channel::{bounded, Receiver, Sender};
use ez_ffmpeg::{FfmpegContext, Input, Output};
use image::imageops::{self, FilterType};
use tracing::{info, warn};

use crate::error::{Result, SentinelError};
use crate::Frame;

/// FFERRTAG('E', 'O', 'F', ' '): 读回调返回它表示输入结束
const AVERROR_EOF: i32 = -541_478_725;

/// 创建录像目录 (已存在时直接返回)
pub fn recording_folder(dir: &Path) -> Result<PathBuf> {
    fs::create_dir_all(dir)?;
    Ok(dir.to_path_buf())
}

/// 在录像目录中生成不重名的文件名: `stem.ext`, `stem_1.ext`, `stem_2.ext` ...
pub fn unique_filename(dir: &Path, stem: &str, extension: &str) -> Result<String> {
    let dir = recording_folder(dir)?;
    let mut name = format!("{}{}", stem, extension);
    let mut count = 1;
    while dir.join(&name).exists() {
        name = format!("{}_{}{}", stem, count, extension);
        count += 1;
    }
    Ok(name)
}

/// 没有 `.avi`/`.mp4` 后缀时补 `.avi`
pub fn normalize_recording_name(name: &str) -> String {
    if name.ends_with(".avi") || name.ends_with(".mp4") {
        name.to_string()
    } else {
        format!("{}.avi", name)
    }
}

/// JPEG 质量 (1-100) → FFmpeg qscale (31-2, 越小越好)
fn qscale(quality: u8) -> i32 {
    let quality = quality.clamp(1, 100) as i32;
    2 + (100 - quality) * 29 / 99
}

/// FFmpeg 读回调: 从通道逐帧取出原始 RGB 数据
struct RawFrameReader {
    rx: Receiver<Vec<u8>>,
    pending: Vec<u8>,
    offset: usize,
}

impl RawFrameReader {
    fn read(&mut self, buf: &mut [u8]) -> i32 {
        if self.offset >= self.pending.len() {
            // 发送端释放 → 输入结束
            match self.rx.recv() {
                Ok(bytes) => {
                    self.pending = bytes;
                    self.offset = 0;
                }
                Err(_) => return AVERROR_EOF,
            }
        }
        let n = (self.pending.len() - self.offset).min(buf.len());
        buf[..n].copy_from_slice(&self.pending[self.offset..self.offset + n]);
        self.offset += n;
        n as i32
    }
}

/// 录像器: 固定分辨率与帧率, 需显式 `release`
pub struct Recorder {
    path: PathBuf,
    tx: Option<Sender<Vec<u8>>>,
    encoder: Option<JoinHandle<std::result::Result<(), String>>>,
    width: u32,
    height: u32,
    frames: usize,
}

impl Recorder {
    pub fn create(
        dir: &Path,
        name: &str,
        width: u32,
        height: u32,
        fps: u32,
        quality: u8,
    ) -> Result<Self> {
        if name.trim().is_empty() {
            return Err(SentinelError::Configuration("录像文件名不能为空".into()));
        }
        if width == 0 || height == 0 || fps == 0 {
            return Err(SentinelError::Configuration(format!(
                "录像参数无效: {}x{} @ {}fps",
                width, height, fps
            )));
        }

        let path = recording_folder(dir)?.join(name);
        let (tx, rx) = bounded::<Vec<u8>>(fps as usize);
        let mut reader = RawFrameReader {
            rx,
            pending: Vec::new(),
            offset: 0,
        };

        let video_size = format!("{}x{}", width, height);
        let framerate = fps.to_string();
        let input = Input::new_by_read_callback(move |buf: &mut [u8]| reader.read(buf))
            .set_format("rawvideo")
            .set_input_opts(
                [
                    ("pixel_format", "rgb24"),
                    ("video_size", video_size.as_str()),
                    ("framerate", framerate.as_str()),
                ]
                .into(),
            );
        let output = Output::from(path.to_string_lossy().to_string())
            .set_video_codec("mjpeg")
            .set_video_qscale(qscale(quality));

        let encoder = thread::Builder::new()
            .name("sentinel-record".to_string())
            .spawn(move || {
                FfmpegContext::builder()
                    .input(input)
                    .output(output)
                    .build()
                    .map_err(|e| format!("编码器构建失败: {}", e))?
                    .start()
                    .map_err(|e| format!("编码器启动失败: {}", e))?
                    .wait()
                    .map_err(|e| format!("编码失败: {}", e))
            })?;

        info!(
            "🎬 开始录像: {} ({}x{} @ {}fps)",
            path.display(),
            width,
            height,
            fps
        );
        Ok(Self {
            path,
            tx: Some(tx),
            encoder: Some(encoder),
            width,
            height,
            frames: 0,
        })
    }

    /// 写入一帧; 尺寸不一致时先缩放到录像分辨率
    pub fn write(&mut self, frame: &Frame) -> Result<()> {
        let Some(tx) = self.tx.as_ref() else {
            return Err(SentinelError::Configuration("录像器已释放".into()));
        };

        let bytes = if frame.dimensions() == (self.width, self.height) {
            frame.as_raw().clone()
        } else {
            imageops::resize(frame, self.width, self.height, FilterType::Triangle).into_raw()
        };

        tx.send(bytes)
            .map_err(|_| SentinelError::Encode("编码线程已退出".to_string()))?;
        self.frames += 1;
        Ok(())
    }

    /// 结束输入并等待编码线程写完文件, 重复调用无副作用
    pub fn release(&mut self) -> Result<()> {
        drop(self.tx.take());
        let Some(encoder) = self.encoder.take() else {
            return Ok(());
        };

        match encoder.join() {
            Ok(Ok(())) => {
                info!("💾 录像已保存: {} ({} 帧)", self.path.display(), self.frames);
                Ok(())
            }
            Ok(Err(e)) => Err(SentinelError::Encode(e)),
            Err(_) => Err(SentinelError::Encode("编码线程异常退出".to_string())),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn frames(&self) -> usize {
        self.frames
    }
}

impl Drop for Recorder {
    fn drop(&mut self) {
        if let Err(e) = self.release() {
            warn!("❌ 录像收尾失败: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::{DecodeStream, Delivery};
    use image::Rgb;

    #[test]
    fn test_unique_filename_adds_suffix() {
        let dir = tempfile::tempdir().unwrap();
        let recordings = dir.path().join("recordings");

        let first = unique_filename(&recordings, "Webcam", ".avi").unwrap();
        assert_eq!(first, "Webcam.avi");
        assert!(recordings.is_dir());

        fs::write(recordings.join("Webcam.avi"), b"").unwrap();
        fs::write(recordings.join("Webcam_1.avi"), b"").unwrap();
        assert_eq!(
            unique_filename(&recordings, "Webcam", ".avi").unwrap(),
            "Webcam_2.avi"
        );
    }

    #[test]
    fn test_normalize_recording_name() {
        assert_eq!(normalize_recording_name("patrol"), "patrol.avi");
        assert_eq!(normalize_recording_name("patrol.avi"), "patrol.avi");
        assert_eq!(normalize_recording_name("patrol.mp4"), "patrol.mp4");
        assert_eq!(normalize_recording_name("patrol.mov"), "patrol.mov.avi");
    }

    #[test]
    fn test_qscale_range() {
        assert_eq!(qscale(100), 2);
        assert_eq!(qscale(1), 31);
        assert_eq!(qscale(0), 31);
        assert!((2..=31).contains(&qscale(80)));
    }

    #[test]
    fn test_reader_streams_frames_then_eof() {
        let (tx, rx) = bounded(2);
        let mut reader = RawFrameReader {
            rx,
            pending: Vec::new(),
            offset: 0,
        };
        tx.send(vec![1, 2, 3, 4, 5]).unwrap();
        drop(tx);

        let mut buf = [0u8; 3];
        assert_eq!(reader.read(&mut buf), 3);
        assert_eq!(buf, [1, 2, 3]);
        assert_eq!(reader.read(&mut buf), 2);
        assert_eq!(&buf[..2], &[4, 5]);
        assert_eq!(reader.read(&mut buf), AVERROR_EOF);
    }

    #[test]
    fn test_empty_name_is_configuration_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            Recorder::create(dir.path(), "  ", 64, 48, 5, 80),
            Err(SentinelError::Configuration(_))
        ));
    }

    #[test]
    fn test_recording_decodes_back() {
        let dir = tempfile::tempdir().unwrap();
        let mut recorder = Recorder::create(dir.path(), "clip.avi", 64, 48, 5, 80).unwrap();

        let frame = Frame::from_pixel(64, 48, Rgb([200, 30, 30]));
        recorder.write(&frame).unwrap();
        recorder.write(&frame).unwrap();
        // 尺寸不一致的帧会被缩放
        recorder.write(&Frame::new(32, 32)).unwrap();
        recorder.release().unwrap();
        recorder.release().unwrap();
        assert_eq!(recorder.frames(), 3);
        assert!(recorder.write(&frame).is_err());

        // 用解码通道读回
        let path = dir.path().join("clip.avi");
        let stream = DecodeStream::spawn(
            Input::new(path.to_string_lossy().to_string()),
            None,
            Delivery::Blocking,
        )
        .unwrap();
        let decoded: Vec<Frame> = std::iter::from_fn(|| stream.recv()).collect();
        assert_eq!(decoded.len(), 3);
        assert!(decoded.iter().all(|f| f.dimensions() == (64, 48)));

        // 第一帧以红色为主
        let [r, g, b] = decoded[0].get_pixel(32, 24).0;
        assert!(r > 150 && g < 90 && b < 90, "{:?}", (r, g, b));
    }
}
