//! 错误类型 (Error taxonomy)
//!
//! 未检测到姿态/人体属于正常的"传感器缺失", 不在这里建模,
//! 而是以零向量或 `None` 的形式在流水线中传递。

use thiserror::Error;

pub type Result<T> = std::result::Result<T, SentinelError>;

#[derive(Debug, Error)]
pub enum SentinelError {
    /// 视频源没有更多帧 (文件结束/设备断开), 当前会话终止, 不重试
    #[error("视频源已耗尽: 没有可用的帧")]
    SourceExhausted,

    /// 配置错误, 在采集开始前报告
    #[error("配置错误: {0}")]
    Configuration(String),

    /// 在窗口未满时调用了动作分类
    #[error("姿态窗口未就绪: {len}/{capacity}")]
    WindowNotReady { len: usize, capacity: usize },

    /// 模型加载或推理失败
    #[error("模型错误: {0}")]
    Model(String),

    /// 视频解码失败
    #[error("解码错误: {0}")]
    Decode(String),

    /// 录像编码失败
    #[error("编码错误: {0}")]
    Encode(String),

    #[error(transparent)]
    Image(#[from] image::ImageError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl From<ort::Error> for SentinelError {
    fn from(e: ort::Error) -> Self {
        SentinelError::Model(e.to_string())
    }
}

impl From<ndarray::ShapeError> for SentinelError {
    fn from(e: ndarray::ShapeError) -> Self {
        SentinelError::Model(format!("张量形状错误: {}", e))
    }
}
