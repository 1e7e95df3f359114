// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//
// ONNX Runtime 推理后端
// 负责: 会话构建、执行器选择 (CPU/CUDA/TensorRT)、输入输出张量收发

use std::path::PathBuf;

use ndarray::{Array, IxDyn};
use ort::execution_providers::{CUDAExecutionProvider, TensorRTExecutionProvider};
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::ValueType;
use tracing::{info, warn};

use crate::error::{Result, SentinelError};

/// 推理执行器
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrtEP {
    CPU,
    CUDA(i32),
    Trt(i32),
}

/// 后端构建参数
#[derive(Debug, Clone)]
pub struct OrtConfig {
    pub f: PathBuf,
    pub ep: OrtEP,
}

pub struct OrtBackend {
    session: Session,
    input_name: String,
    input_dims: Vec<i64>,
    output_names: Vec<String>,
}

impl OrtBackend {
    pub fn build(config: OrtConfig) -> Result<Self> {
        if !config.f.exists() {
            return Err(SentinelError::Model(format!(
                "模型文件不存在: {}",
                config.f.display()
            )));
        }

        let mut builder =
            Session::builder()?.with_optimization_level(GraphOptimizationLevel::Level3)?;

        // 注册执行器, 不可用时 ORT 自动回落到 CPU
        builder = match config.ep {
            OrtEP::CPU => builder,
            OrtEP::CUDA(device_id) => builder.with_execution_providers([
                CUDAExecutionProvider::default()
                    .with_device_id(device_id)
                    .build(),
            ])?,
            OrtEP::Trt(device_id) => builder.with_execution_providers([
                TensorRTExecutionProvider::default()
                    .with_device_id(device_id)
                    .build(),
                CUDAExecutionProvider::default()
                    .with_device_id(device_id)
                    .build(),
            ])?,
        };

        let session = builder.commit_from_file(&config.f)?;

        let input = session
            .inputs
            .first()
            .ok_or_else(|| SentinelError::Model("模型没有输入".to_string()))?;
        let input_name = input.name.clone();
        let input_dims = match &input.input_type {
            ValueType::Tensor { dimensions, .. } => dimensions.clone(),
            other => {
                warn!("⚠️ 输入不是张量类型: {:?}", other);
                Vec::new()
            }
        };
        let output_names = session.outputs.iter().map(|o| o.name.clone()).collect();

        info!(
            "✅ 模型加载成功: {} | 输入 {} {:?} | 执行器 {:?}",
            config.f.display(),
            input_name,
            input_dims,
            config.ep
        );

        Ok(Self {
            session,
            input_name,
            input_dims,
            output_names,
        })
    }

    /// 单输入推理, 按输出顺序返回所有输出张量
    pub fn run(&mut self, xs: Array<f32, IxDyn>) -> Result<Vec<Array<f32, IxDyn>>> {
        let outputs = self
            .session
            .run(ort::inputs![self.input_name.as_str() => xs.view()]?)?;

        let mut ys = Vec::with_capacity(self.output_names.len());
        for name in &self.output_names {
            let y = outputs[name.as_str()].try_extract_tensor::<f32>()?;
            ys.push(y.into_owned());
        }
        Ok(ys)
    }

    /// 固定输入维度的第 `axis` 维, 动态或不存在时返回 `None`
    pub fn fixed_dim(&self, axis: usize) -> Option<u32> {
        self.input_dims
            .get(axis)
            .copied()
            .filter(|&d| d > 0)
            .map(|d| d as u32)
    }
}
