/// FFmpeg解码过滤器模块
/// FFmpeg decode filter module
///
/// 解码帧 (YUV420P) → RGB `Frame` → crossbeam 通道 → 工作线程
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TrySendError};
use ez_ffmpeg::core::context::null_output::create_null_output;
use ez_ffmpeg::filter::frame_filter::FrameFilter;
use ez_ffmpeg::filter::frame_filter_context::FrameFilterContext;
use ez_ffmpeg::filter::frame_pipeline_builder::FramePipelineBuilder;
use ez_ffmpeg::{AVMediaType, FfmpegContext, Frame as AvFrame, Input};
use tracing::{debug, error, info, warn};

use crate::error::{Result, SentinelError};
use crate::Frame;

/// 帧投递方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// 文件回放: 通道满时阻塞, 由消费者控制节奏, 不丢帧
    Blocking,
    /// 实时源: 工作线程忙时丢弃新帧
    DropWhenBusy,
}

/// FFmpeg解码过滤器: 视频流 → RGB帧
#[derive(Clone)]
pub struct DecodeFilter {
    tx: Sender<Frame>,
    delivery: Delivery,
    stop: Arc<AtomicBool>,
    count: usize,
    last: Instant,
    dropped_frames: usize, // 丢弃的帧数
    total_frames: usize,   // 总帧数
}

impl DecodeFilter {
    pub fn new(tx: Sender<Frame>, delivery: Delivery, stop: Arc<AtomicBool>) -> Self {
        Self {
            tx,
            delivery,
            stop,
            count: 0,
            last: Instant::now(),
            dropped_frames: 0,
            total_frames: 0,
        }
    }

    fn deliver(&mut self, frame: Frame) -> std::result::Result<(), String> {
        match self.delivery {
            Delivery::Blocking => self
                .tx
                .send(frame)
                .map_err(|_| "接收端已关闭".to_string()),
            Delivery::DropWhenBusy => match self.tx.try_send(frame) {
                Ok(()) => Ok(()),
                Err(TrySendError::Full(_)) => {
                    self.dropped_frames += 1;
                    Ok(())
                }
                Err(TrySendError::Disconnected(_)) => Err("接收端已关闭".to_string()),
            },
        }
    }

    fn log_stats(&mut self) {
        let elapsed = self.last.elapsed().as_secs_f64();
        if elapsed >= 1.0 {
            let drop_rate = self.dropped_frames as f64 / self.total_frames.max(1) as f64 * 100.0;
            debug!(
                "📺 解码统计: 解码{}帧 | 实际{:.1}fps | 总帧{} | 丢弃{} ({:.1}%)",
                self.count,
                self.count as f64 / elapsed,
                self.total_frames,
                self.dropped_frames,
                drop_rate
            );
            self.last = Instant::now();
            self.count = 0;
        }
    }
}

impl FrameFilter for DecodeFilter {
    fn media_type(&self) -> AVMediaType {
        AVMediaType::AVMEDIA_TYPE_VIDEO
    }

    fn init(&mut self, _ctx: &FrameFilterContext) -> std::result::Result<(), String> {
        info!("✅ 解码线程启动");
        Ok(())
    }

    fn filter_frame(
        &mut self,
        frame: AvFrame,
        _ctx: &FrameFilterContext,
    ) -> std::result::Result<Option<AvFrame>, String> {
        if self.stop.load(Ordering::Relaxed) {
            return Err("解码已停止".to_string());
        }
        self.total_frames += 1;

        let rgb = unsafe {
            // 基本检查：空帧或损坏帧
            if frame.as_ptr().is_null() || frame.is_empty() || frame.is_corrupt() {
                self.dropped_frames += 1;
                return Ok(None);
            }

            let raw = &*frame.as_ptr();
            let w = raw.width as usize;
            let h = raw.height as usize;
            if w == 0 || h == 0 || w > 4096 || h > 4096 {
                self.dropped_frames += 1;
                warn!("⚠️ 丢弃帧 #{}: 非法分辨率 {}x{}", self.total_frames, w, h);
                return Ok(None);
            }

            let (y_plane, u_plane, v_plane) = (raw.data[0], raw.data[1], raw.data[2]);
            let y_stride = raw.linesize[0] as usize;
            let uv_stride = raw.linesize[1] as usize;
            if y_plane.is_null()
                || u_plane.is_null()
                || v_plane.is_null()
                || y_stride < w
                || uv_stride < w.div_ceil(2)
            {
                self.dropped_frames += 1;
                return Ok(None);
            }

            let y = std::slice::from_raw_parts(y_plane, y_stride * h);
            let u = std::slice::from_raw_parts(u_plane, uv_stride * h.div_ceil(2));
            let v = std::slice::from_raw_parts(v_plane, uv_stride * h.div_ceil(2));
            yuv420p_to_rgb(y, u, v, y_stride, uv_stride, w, h)
        };

        let Some(rgb) = rgb else {
            self.dropped_frames += 1;
            return Ok(None);
        };
        self.count += 1;
        self.deliver(rgb)?;
        self.log_stats();

        Ok(Some(frame))
    }

    fn uninit(&mut self, _ctx: &FrameFilterContext) {
        info!(
            "✅ 解码线程退出 (总帧{} | 丢弃{})",
            self.total_frames, self.dropped_frames
        );
    }
}

/// YUV420P → RGB (BT.601 定点系数, 乘以128避免浮点)
pub fn yuv420p_to_rgb(
    y_plane: &[u8],
    u_plane: &[u8],
    v_plane: &[u8],
    y_stride: usize,
    uv_stride: usize,
    width: usize,
    height: usize,
) -> Option<Frame> {
    let mut buffer = vec![0u8; width * height * 3];
    let mut out_idx = 0;
    for row in 0..height {
        let y_row = row * y_stride;
        let uv_row = (row >> 1) * uv_stride;

        for x in 0..width {
            let y_val = *y_plane.get(y_row + x)? as i32;
            let u_val = *u_plane.get(uv_row + (x >> 1))? as i32 - 128;
            let v_val = *v_plane.get(uv_row + (x >> 1))? as i32 - 128;

            buffer[out_idx] = (y_val + ((v_val * 179) >> 7)).clamp(0, 255) as u8;
            buffer[out_idx + 1] =
                (y_val - ((u_val * 44) >> 7) - ((v_val * 91) >> 7)).clamp(0, 255) as u8;
            buffer[out_idx + 2] = (y_val + ((u_val * 227) >> 7)).clamp(0, 255) as u8;
            out_idx += 3;
        }
    }
    Frame::from_raw(width as u32, height as u32, buffer)
}

/// 后台解码线程 + 帧通道
pub struct DecodeStream {
    rx: Option<Receiver<Frame>>,
    stop: Arc<AtomicBool>,
}

impl DecodeStream {
    /// 在独立线程中启动 FFmpeg 解码
    ///
    /// `scale` 为 `Some((w, h))` 时先缩放到指定分辨率。
    pub fn spawn(input: Input, scale: Option<(u32, u32)>, delivery: Delivery) -> Result<Self> {
        let capacity = match delivery {
            Delivery::Blocking => 4,
            Delivery::DropWhenBusy => 1,
        };
        let (tx, rx) = bounded(capacity);
        let stop = Arc::new(AtomicBool::new(false));
        let filter = DecodeFilter::new(tx, delivery, stop.clone());

        let filter_desc = match scale {
            Some((w, h)) => format!("scale={}:{},format=yuv420p", w, h),
            None => "format=yuv420p".to_string(),
        };

        thread::Builder::new()
            .name("sentinel-decode".to_string())
            .spawn(move || {
                let pipe: FramePipelineBuilder = AVMediaType::AVMEDIA_TYPE_VIDEO.into();
                let pipe = pipe.filter("decode", Box::new(filter));
                let out = create_null_output().add_frame_pipeline(pipe);

                let ctx = match FfmpegContext::builder()
                    .input(input)
                    .filter_desc(filter_desc.as_str())
                    .output(out)
                    .build()
                {
                    Ok(ctx) => ctx,
                    Err(e) => {
                        error!("❌ 解码器构建失败: {}", e);
                        return;
                    }
                };
                let sch = match ctx.start() {
                    Ok(sch) => sch,
                    Err(e) => {
                        error!("❌ 解码器启动失败: {}", e);
                        return;
                    }
                };
                if let Err(e) = sch.wait() {
                    debug!("解码循环结束: {}", e);
                }
                info!("📹 解码循环结束");
            })?;

        Ok(Self {
            rx: Some(rx),
            stop,
        })
    }

    /// 阻塞等待下一帧; 解码线程结束后返回 `None`
    pub fn recv(&self) -> Option<Frame> {
        self.rx.as_ref()?.recv().ok()
    }

    /// 超时或解码线程结束都返回错误
    pub fn recv_timeout(&self, timeout: Duration) -> Result<Frame> {
        let rx = self.rx.as_ref().ok_or(SentinelError::SourceExhausted)?;
        rx.recv_timeout(timeout).map_err(|e| match e {
            RecvTimeoutError::Timeout => SentinelError::Decode("等待视频帧超时".to_string()),
            RecvTimeoutError::Disconnected => SentinelError::SourceExhausted,
        })
    }

    /// 通知解码线程退出; 阻塞中的发送随接收端关闭而返回
    pub fn stop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        self.rx = None;
    }
}

impl Drop for DecodeStream {
    fn drop(&mut self) {
        self.stop();
    }
}
