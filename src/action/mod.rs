/// 动作识别系统 (Action Recognition System)
///
/// 输入完整的姿态窗口, 输出闭集动作标签及其概率
pub mod classifier;

pub use classifier::{ActionClassifier, ActionModel};

use std::fmt;

use serde::{Deserialize, Serialize};

/// 动作标签 (闭集)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActionLabel {
    Running,
    Punching,
    Waving,
    Kicking,
    Walking,
}

impl ActionLabel {
    /// 动作模型输出的类别顺序
    pub const ALL: [ActionLabel; 5] = [
        ActionLabel::Running,
        ActionLabel::Punching,
        ActionLabel::Waving,
        ActionLabel::Kicking,
        ActionLabel::Walking,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ActionLabel::Running => "Running",
            ActionLabel::Punching => "Punching",
            ActionLabel::Waving => "Waving",
            ActionLabel::Kicking => "Kicking",
            ActionLabel::Walking => "Walking",
        }
    }
}

impl fmt::Display for ActionLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 动作识别结果, 每帧最多一个
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ActionResult {
    pub label: ActionLabel,
    pub probability: f32,
}

impl fmt::Display for ActionResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Action: {}, Probability: {}", self.label, self.probability)
    }
}
