//! 阶段处理上下文
//!
//! 封装"我正在转换第几个阶段、它叫什么"这一信息

use std::fmt::Display;

use crate::models::stage::StageKind;

/// 阶段处理上下文
#[derive(Debug, Clone)]
pub struct StageCtx {
    /// 阶段名
    pub stage_name: String,

    /// 阶段类型
    pub kind: StageKind,

    /// 阶段在本次运行中的序号（从1开始，仅用于日志显示）
    pub index: usize,

    /// 本次运行的阶段总数
    pub total: usize,
}

impl StageCtx {
    pub fn new(stage_name: impl Into<String>, index: usize, total: usize) -> Self {
        let stage_name = stage_name.into();
        Self {
            kind: StageKind::from_stage_name(&stage_name),
            stage_name,
            index,
            total,
        }
    }
}

impl Display for StageCtx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[阶段 {}/{} {} ({:?})]",
            self.index, self.total, self.stage_name, self.kind
        )
    }
}
