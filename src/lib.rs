#![allow(clippy::type_complexity)]
// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
pub mod action; // 动作分类
pub mod config; // 运行配置参数
pub mod detection; // 人体检测与跟踪
pub mod error; // 错误类型
pub mod input; // 视频输入系统
pub mod models; // 模型接口与具体实现
pub mod output; // 叠加与录像
pub mod pipeline; // 行为识别流水线
pub mod pose; // 姿态窗口

pub mod ort_backend;

pub use crate::config::SentinelConfig;
pub use crate::error::{Result, SentinelError};
pub use crate::ort_backend::{OrtBackend, OrtConfig, OrtEP};

/// 流水线中传递的画面 (RGB, 8位)
pub type Frame = image::RgbImage;
