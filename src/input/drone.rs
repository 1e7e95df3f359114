//! 无人机帧源 (Tello SDK 文本指令)
//!
//! 控制通道: UDP 文本指令 (`command`, `streamon`, `takeoff`, `rc a b c d`, `land` ...)
//! 视频通道: 无人机推送到本机 UDP 端口的 H.264 流, 解码后缩放到配置分辨率
//!
//! 每次取帧前发送 `rc 0 0 0 0` 作为心跳; 心跳或取帧失败视为断开, 返回 `None`。

use std::net::{SocketAddr, UdpSocket};
use std::thread;
use std::time::Duration;

use ez_ffmpeg::Input;
use tracing::{info, warn};

use super::decode_filter::{DecodeStream, Delivery};
use super::{FrameSource, SourceKind};
use crate::config::SentinelConfig;
use crate::error::{Result, SentinelError};
use crate::Frame;

const RESPONSE_TIMEOUT: Duration = Duration::from_secs(7);
const FRAME_TIMEOUT: Duration = Duration::from_secs(5);
/// 打开视频流后等待首个关键帧
const STREAM_WARMUP: Duration = Duration::from_secs(5);
/// 起飞后上升时间
const CLIMB_TIME: Duration = Duration::from_secs(2);
const HEARTBEAT: &str = "rc 0 0 0 0";

/// UDP 控制通道
pub struct DroneLink {
    socket: UdpSocket,
    addr: SocketAddr,
}

impl DroneLink {
    pub fn connect(addr: SocketAddr) -> Result<Self> {
        let socket = UdpSocket::bind(("0.0.0.0", 0))?;
        socket.set_read_timeout(Some(RESPONSE_TIMEOUT))?;
        Ok(Self { socket, addr })
    }

    /// 只发送, 不等待应答 (rc 指令无应答)
    pub fn send(&self, command: &str) -> Result<()> {
        self.socket.send_to(command.as_bytes(), self.addr)?;
        Ok(())
    }

    /// 发送并等待应答
    pub fn query(&self, command: &str) -> Result<String> {
        self.send(command)?;
        let mut buf = [0u8; 256];
        let (n, _) = self.socket.recv_from(&mut buf)?;
        Ok(String::from_utf8_lossy(&buf[..n]).trim().to_string())
    }

    /// 发送指令, 应答不是 `ok` 时返回错误
    pub fn command(&self, command: &str) -> Result<()> {
        let reply = self.query(command)?;
        if reply.eq_ignore_ascii_case("ok") {
            Ok(())
        } else {
            Err(SentinelError::Decode(format!(
                "无人机拒绝指令 {}: {}",
                command, reply
            )))
        }
    }

    pub fn rc(&self, left_right: i32, forward_back: i32, up_down: i32, yaw: i32) -> Result<()> {
        self.send(&format!(
            "rc {} {} {} {}",
            left_right, forward_back, up_down, yaw
        ))
    }
}

pub struct Drone {
    addr: String,
    command_port: u16,
    video_port: u16,
    width: u32,
    height: u32,
    link: Option<DroneLink>,
    stream: Option<DecodeStream>,
    current: Option<Frame>,
    stream_warmup: Duration,
    climb_time: Duration,
}

impl Drone {
    pub fn new(config: &SentinelConfig) -> Self {
        Self {
            addr: config.drone_address.clone(),
            command_port: config.drone_command_port,
            video_port: config.drone_video_port,
            width: config.frame_width,
            height: config.frame_height,
            link: None,
            stream: None,
            current: None,
            stream_warmup: STREAM_WARMUP,
            climb_time: CLIMB_TIME,
        }
    }

    fn read_frame(&mut self) -> Result<Frame> {
        let link = self.link.as_ref().ok_or(SentinelError::SourceExhausted)?;
        link.send(HEARTBEAT)?;
        let stream = self.stream.as_ref().ok_or(SentinelError::SourceExhausted)?;
        stream.recv_timeout(FRAME_TIMEOUT)
    }
}

impl FrameSource for Drone {
    fn kind(&self) -> SourceKind {
        SourceKind::Drone
    }

    /// 连接 → 打开视频流 → 起飞并上升
    fn start(&mut self) -> Result<()> {
        if self.link.is_some() {
            return Err(SentinelError::Configuration(
                "无人机已启动过, 请先 exit".to_string(),
            ));
        }
        let addr: SocketAddr = format!("{}:{}", self.addr, self.command_port)
            .parse()
            .map_err(|e| SentinelError::Configuration(format!("无人机地址无效: {}", e)))?;
        let link = DroneLink::connect(addr)?;

        link.command("command")?;
        info!("🚁 无人机已连接: {}", addr);
        // 之后任何一步失败, exit 都要能降落并关闭视频流
        let link = self.link.insert(link);
        match link.query("battery?") {
            Ok(battery) => info!("🔋 无人机电量: {}%", battery),
            Err(e) => warn!("⚠️ 读取电量失败: {}", e),
        }

        link.command("streamon")?;
        let input = Input::new(format!("udp://0.0.0.0:{}", self.video_port));
        self.stream = Some(DecodeStream::spawn(
            input,
            Some((self.width, self.height)),
            Delivery::DropWhenBusy,
        )?);
        thread::sleep(self.stream_warmup);

        link.rc(0, 0, 0, 0)?;
        link.command("takeoff")?;
        link.rc(0, 0, 60, 0)?;
        thread::sleep(self.climb_time);
        link.rc(0, 0, 0, 0)?;
        info!("🛫 无人机已起飞");
        Ok(())
    }

    fn next_frame(&mut self) -> Option<Frame> {
        match self.read_frame() {
            Ok(frame) => {
                self.current = Some(frame);
                self.current.clone()
            }
            Err(e) => {
                warn!("❌ 无人机断开: {}", e);
                self.current = None;
                None
            }
        }
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

    /// 降落并关闭视频流
    fn exit(&mut self) {
        if let Some(link) = self.link.take() {
            match link.command("land") {
                Ok(()) => info!("🛬 无人机已降落"),
                Err(e) => warn!("⚠️ 降落指令失败: {}", e),
            }
            if let Err(e) = link.send("streamoff") {
                warn!("⚠️ 关闭视频流失败: {}", e);
            }
        }
        if let Some(mut stream) = self.stream.take() {
            stream.stop();
        }
    }
}
