//! 尝试上下文
//!
//! 封装"我正在处理第几个目标、它的 ID 是什么"这一信息

use std::fmt::Display;

/// 一次尝试的上下文（仅用于日志前缀）
#[derive(Debug, Clone)]
pub struct AttemptCtx {
    /// 目标ID
    pub target_id: String,

    /// 本次运行中的序号（从1开始）
    pub index: usize,
}

impl AttemptCtx {
    pub fn new(target_id: impl Into<String>, index: usize) -> Self {
        Self {
            target_id: target_id.into(),
            index,
        }
    }
}

impl Display for AttemptCtx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[目标 {} #{}]", self.index, self.target_id)
    }
}
