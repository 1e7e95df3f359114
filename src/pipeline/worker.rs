//! 流处理工作线程 (Stream Worker)
//! 职责: 取帧 → 推理 → 叠加 → 录像, 通过事件通道通知宿主
//!
//! 帧源、姿态窗口、跟踪状态与已告警集合都归本线程私有。

use std::path::PathBuf;
use std::thread::{self, JoinHandle};
use std::time::Instant;

use crossbeam_channel::Sender;
use tracing::{error, info, warn};

use super::orchestrator::{FrameOutcome, InferenceOrchestrator};
use super::summary::{SessionEnd, SessionSummary, SummaryAccumulator};
use super::{SessionEvent, StopHandle};
use crate::config::SentinelConfig;
use crate::error::{Result, SentinelError};
use crate::input::FrameSource;
use crate::output::{normalize_recording_name, Overlay, Recorder};
use crate::Frame;

/// 会话选项
#[derive(Debug, Clone, Default)]
pub struct WorkerOptions {
    /// 是否录像
    pub record: bool,
    /// 录像文件名 (录像时必填)
    pub filename: Option<String>,
}

/// 录像参数, 在取第一帧前确定
struct RecordingPlan {
    dir: PathBuf,
    name: String,
    fps: u32,
    quality: u8,
}

pub struct StreamWorker {
    source: Box<dyn FrameSource>,
    orchestrator: InferenceOrchestrator,
    recording: Option<RecordingPlan>,
    overlay: Overlay,
    events: Sender<SessionEvent>,
    stop: StopHandle,
}

impl StreamWorker {
    /// 要求录像却没有文件名时返回 `Configuration`, 此时尚未开始采集
    pub fn new(
        config: &SentinelConfig,
        source: Box<dyn FrameSource>,
        orchestrator: InferenceOrchestrator,
        options: WorkerOptions,
        events: Sender<SessionEvent>,
        stop: StopHandle,
    ) -> Result<Self> {
        let recording = if options.record {
            let name = options
                .filename
                .filter(|name| !name.trim().is_empty())
                .ok_or_else(|| {
                    SentinelError::Configuration("录像时必须提供文件名".to_string())
                })?;
            Some(RecordingPlan {
                dir: config.recordings_dir.clone(),
                name: normalize_recording_name(&name),
                fps: config.video_fps,
                quality: config.jpeg_quality,
            })
        } else {
            None
        };

        Ok(Self {
            source,
            orchestrator,
            recording,
            overlay: Overlay::new(config.font_path.as_deref()),
            events,
            stop,
        })
    }

    /// 在独立线程中运行, 返回会话统计
    pub fn spawn(self) -> Result<JoinHandle<SessionSummary>> {
        let handle = thread::Builder::new()
            .name("sentinel-worker".to_string())
            .spawn(move || self.run())?;
        Ok(handle)
    }

    /// 主循环; 无论如何结束都会释放录像器与帧源, 并发送完成事件
    pub fn run(mut self) -> SessionSummary {
        info!(
            "🚀 会话开始: {} | {:?}模式",
            self.source.kind(),
            self.orchestrator.mode()
        );
        let mut summary = SummaryAccumulator::new();
        let mut recorder: Option<Recorder> = None;

        let end = match self.open(&mut recorder) {
            Ok(()) => self.main_loop(&mut summary, recorder.as_mut()),
            Err(e) => {
                error!("❌ 会话启动失败: {}", e);
                SessionEnd::Failed(e.to_string())
            }
        };

        // 收尾: 先释放录像器, 再释放帧源
        let mut recording = None;
        if let Some(mut recorder) = recorder.take() {
            match recorder.release() {
                Ok(()) => {
                    recording = recorder
                        .path()
                        .file_name()
                        .map(|name| name.to_string_lossy().to_string());
                }
                Err(e) => error!("❌ 录像保存失败: {}", e),
            }
        }
        self.source.exit();

        let summary = summary.finish(end, recording);
        info!("🏁 会话结束: {}", summary);
        // 发送即忘, 宿主已退出时忽略
        let _ = self.events.send(SessionEvent::Complete(summary.clone()));
        summary
    }

    fn open(&mut self, recorder: &mut Option<Recorder>) -> Result<()> {
        self.source.start()?;
        if let Some(plan) = &self.recording {
            *recorder = Some(Recorder::create(
                &plan.dir,
                &plan.name,
                self.source.width(),
                self.source.height(),
                plan.fps,
                plan.quality,
            )?);
        }
        Ok(())
    }

    fn main_loop(
        &mut self,
        summary: &mut SummaryAccumulator,
        mut recorder: Option<&mut Recorder>,
    ) -> SessionEnd {
        let mut previous = Instant::now();
        let mut stats_at = Instant::now();
        let mut stats_frames = 0u32;

        loop {
            if self.stop.is_stopped() {
                info!("🛑 收到停止信号");
                return SessionEnd::Stopped;
            }

            let Some(frame) = self.source.next_frame() else {
                warn!("📭 {}", SentinelError::SourceExhausted);
                return SessionEnd::SourceExhausted;
            };

            let outcome = match self.orchestrator.process(&frame) {
                Ok(outcome) => outcome,
                Err(e) => {
                    error!("❌ 推理失败: {}", e);
                    return SessionEnd::Failed(e.to_string());
                }
            };
            if let Some(alert) = &outcome.alert {
                let _ = self.events.send(SessionEvent::NovelAlert(alert.clone()));
            }

            // 瞬时FPS, 向下取整
            let now = Instant::now();
            let dt = now.duration_since(previous).as_secs_f64();
            previous = now;
            let fps = if dt > 0.0 { (1.0 / dt).floor() as u32 } else { 0 };

            let mut display = self.source.display_frame().unwrap_or(frame);
            self.draw(&mut display, &outcome, fps);

            if let Some(recorder) = recorder.as_deref_mut() {
                if let Err(e) = recorder.write(&display) {
                    error!("❌ 录像写入失败: {}", e);
                    return SessionEnd::Failed(e.to_string());
                }
            }
            summary.record(&outcome);

            stats_frames += 1;
            let elapsed = stats_at.elapsed().as_secs_f64();
            if elapsed >= 1.0 {
                let (fill, capacity) = self.orchestrator.window_fill();
                info!(
                    "📊 处理 {:.1} fps | 窗口 {}/{} | 累计 {} 帧",
                    stats_frames as f64 / elapsed,
                    fill,
                    capacity,
                    summary.frames()
                );
                stats_at = Instant::now();
                stats_frames = 0;
            }
        }
    }

    fn draw(&self, frame: &mut Frame, outcome: &FrameOutcome, fps: u32) {
        if let Some(tracking) = &outcome.tracking {
            self.overlay.draw_tracking(frame, tracking);
        }
        if let Some(action) = &outcome.action {
            self.overlay.draw_action(frame, action);
        }
        self.overlay.draw_status(frame, fps);
    }
}
