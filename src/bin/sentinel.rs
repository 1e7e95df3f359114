/// 行为哨兵 (Behaviour Sentinel)
///
/// 实时行为监控: 姿态估计 + 动作识别 + 人体跟踪告警
///
/// 系统架构:
/// 1. 解码线程: 视频解码与 YUV→RGB 转换 (ez-ffmpeg)
/// 2. 工作线程: 跟踪 → 姿态 → 动作 → 叠加 → 录像
/// 3. 主线程:   接收告警/完成事件, 读取 stdin 的 `q` 停止指令
///
/// 直接运行: cargo run --bin sentinel --release -- --source webcam --alert
use std::io::BufRead;
use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::Parser;
use crossbeam_channel::unbounded;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use sentinel_rs::config::ExecutionProvider;
use sentinel_rs::input::{get_camera_devices, Drone, FrameSource, PreRecorded, SourceKind, Webcam};
use sentinel_rs::output::unique_filename;
use sentinel_rs::pipeline::{
    InferenceMode, InferenceOrchestrator, SessionEvent, StopHandle, StreamWorker, WorkerOptions,
};
use sentinel_rs::SentinelConfig;

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

/// 行为哨兵参数
#[derive(Parser, Debug)]
#[command(author, version, about = "行为哨兵 - 实时行为识别与告警", long_about = None)]
struct Args {
    /// 视频源: webcam / drone / file
    #[arg(short, long, value_enum, default_value = "webcam")]
    source: SourceKind,

    /// 视频文件路径 (source=file 时必填)
    #[arg(short, long)]
    file: Option<PathBuf>,

    /// 是否录像
    #[arg(short, long)]
    record: bool,

    /// 录像文件名 (默认: <视频源>.avi, 自动去重)
    #[arg(short, long)]
    name: Option<String>,

    /// 启用人体跟踪与恶意动作告警
    #[arg(short, long)]
    alert: bool,

    /// 配置文件路径
    #[arg(short, long, default_value = "sentinel_config.json")]
    config: PathBuf,

    /// 覆盖推理后端: cpu / cuda / trt
    #[arg(long)]
    ep: Option<String>,
}

fn parse_ep(ep: &str) -> anyhow::Result<ExecutionProvider> {
    match ep.to_lowercase().as_str() {
        "cpu" => Ok(ExecutionProvider::Cpu),
        "cuda" => Ok(ExecutionProvider::Cuda),
        "trt" | "tensorrt" => Ok(ExecutionProvider::Trt),
        other => bail!("未知推理后端: {}", other),
    }
}

fn build_source(args: &Args, config: &SentinelConfig) -> anyhow::Result<Box<dyn FrameSource>> {
    let source: Box<dyn FrameSource> = match args.source {
        SourceKind::Webcam => {
            let devices = get_camera_devices();
            if !devices.is_empty() {
                info!("📷 可用摄像头: {}", devices.join(", "));
            }
            Box::new(Webcam::new(config))
        }
        SourceKind::Drone => Box::new(Drone::new(config)),
        SourceKind::PreRecorded => {
            let path = args
                .file
                .clone()
                .context("source=file 时必须通过 --file 指定视频文件")?;
            Box::new(PreRecorded::new(path))
        }
    };
    Ok(source)
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();

    let mut config = SentinelConfig::load(&args.config);
    if let Some(ep) = &args.ep {
        config.execution_provider = parse_ep(ep)?;
    }
    config.validate()?;
    config.print_summary();

    // 录像文件名: 未指定时按视频源生成并去重
    let filename = match (&args.name, args.record) {
        (Some(name), _) => Some(name.clone()),
        (None, true) => Some(unique_filename(
            &config.recordings_dir,
            args.source.as_str(),
            ".avi",
        )?),
        (None, false) => None,
    };

    let mode = if args.alert {
        InferenceMode::Tracking
    } else {
        InferenceMode::Pose
    };
    let orchestrator =
        InferenceOrchestrator::from_config(&config, mode).context("模型加载失败")?;
    let source = build_source(&args, &config)?;

    let (tx, rx) = unbounded();
    let stop = StopHandle::new();
    let worker = StreamWorker::new(
        &config,
        source,
        orchestrator,
        WorkerOptions {
            record: args.record,
            filename,
        },
        tx,
        stop.clone(),
    )?;
    let handle = worker.spawn()?;

    // stdin: 输入 q 停止
    {
        let stop = stop.clone();
        std::thread::Builder::new()
            .name("sentinel-stdin".to_string())
            .spawn(move || {
                for line in std::io::stdin().lock().lines() {
                    let Ok(line) = line else { break };
                    if line.trim().eq_ignore_ascii_case("q") {
                        stop.stop();
                        break;
                    }
                }
            })?;
    }

    info!("✅ 系统就绪, 输入 q 回车退出\n");

    for event in rx {
        match event {
            SessionEvent::NovelAlert(alert) => {
                println!(
                    "Subject ID {} was caught {} at {}",
                    alert.identity,
                    alert.label,
                    chrono::Local::now().format("%H:%M:%S")
                );
            }
            SessionEvent::Complete(summary) => {
                println!("{}", summary);
                if let Some(file) = &summary.recording {
                    println!(
                        "Saved recording as {}",
                        config.recordings_dir.join(file).display()
                    );
                }
                break;
            }
        }
    }

    if handle.join().is_err() {
        warn!("❌ 工作线程异常退出");
    }
    Ok(())
}
