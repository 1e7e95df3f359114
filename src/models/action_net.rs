//! 时序动作识别模型 (LSTM, ONNX)
//!
//! 输入 [1, N, K×4] 姿态窗口, 输出 [1, C] 各动作类别得分

use crate::action::ActionModel;
use crate::config::SentinelConfig;
use crate::error::{Result, SentinelError};
use crate::pose::PoseWindow;
use crate::{OrtBackend, OrtConfig};

pub struct ActionNet {
    engine: OrtBackend,
}

impl ActionNet {
    pub fn new(config: &SentinelConfig) -> Result<Self> {
        let engine = OrtBackend::build(OrtConfig {
            f: config.action_model.clone(),
            ep: config.ort_ep(),
        })?;

        // 固定时间维度必须与窗口长度一致
        if let Some(steps) = engine.fixed_dim(1) {
            if steps as usize != config.window_length {
                return Err(SentinelError::Configuration(format!(
                    "动作模型时间维度为{}, 窗口长度为{}",
                    steps, config.window_length
                )));
            }
        }

        Ok(Self { engine })
    }
}

impl ActionModel for ActionNet {
    fn scores(&mut self, window: &PoseWindow) -> Result<Vec<f32>> {
        let xs = window.to_array().into_dyn();
        let ys = self.engine.run(xs)?;
        let scores = ys
            .first()
            .ok_or_else(|| SentinelError::Model("动作模型没有输出".to_string()))?;
        Ok(scores.iter().copied().collect())
    }
}
