use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::error::{ConversionError, WorkflowError};

/// 单个阶段的执行结果，创建后不再修改
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub stage: String,
    pub success: bool,
    /// 成功时为标准输出，失败时为标准错误或捕获的错误信息
    pub output: String,
    /// 合成脚本路径；转换失败时没有脚本
    pub script: Option<PathBuf>,
}

impl ExecutionResult {
    pub fn succeeded(stage: impl Into<String>, output: impl Into<String>, script: PathBuf) -> Self {
        Self {
            stage: stage.into(),
            success: true,
            output: output.into(),
            script: Some(script),
        }
    }

    pub fn failed(stage: impl Into<String>, output: impl Into<String>, script: Option<PathBuf>) -> Self {
        Self {
            stage: stage.into(),
            success: false,
            output: output.into(),
            script,
        }
    }

    /// 转换失败的记录：消息后附带完整错误链
    pub fn conversion_failed(error: ConversionError) -> Self {
        let stage = error.stage().to_string();
        let output = format!("Conversion failed: {:?}", anyhow::Error::new(error));
        Self::failed(stage, output, None)
    }

    /// 上游阶段失败导致跳过的记录
    pub fn skipped(stage: impl Into<String>, upstream: &str, script: Option<PathBuf>) -> Self {
        Self::failed(
            stage,
            format!("Skipped: upstream stage '{}' failed", upstream),
            script,
        )
    }
}

/// 工作流报告
///
/// 两种形态：按阶段名索引的结果表，或者整体失败记录。
/// 使用方在按阶段名取值前必须先判断形态
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WorkflowReport {
    Failed { error: String, trace: String },
    Stages(BTreeMap<String, ExecutionResult>),
}

impl WorkflowReport {
    pub fn failure(error: WorkflowError) -> Self {
        let message = error.to_string();
        let trace = format!("{:?}", anyhow::Error::new(error));
        WorkflowReport::Failed {
            error: message,
            trace,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, WorkflowReport::Failed { .. })
    }

    /// 按阶段名获取结果；整体失败时返回 None
    pub fn get(&self, stage: &str) -> Option<&ExecutionResult> {
        match self {
            WorkflowReport::Stages(results) => results.get(stage),
            WorkflowReport::Failed { .. } => None,
        }
    }

    pub fn stages(&self) -> Option<&BTreeMap<String, ExecutionResult>> {
        match self {
            WorkflowReport::Stages(results) => Some(results),
            WorkflowReport::Failed { .. } => None,
        }
    }

    /// 成功与失败的阶段数量
    pub fn tally(&self) -> (usize, usize) {
        self.stages()
            .map(|results| {
                let success = results.values().filter(|r| r.success).count();
                (success, results.len() - success)
            })
            .unwrap_or((0, 0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_map_shape() {
        let mut results = BTreeMap::new();
        results.insert(
            "visualizer".to_string(),
            ExecutionResult::succeeded("visualizer", "done\n", PathBuf::from("scripts/visualizer.py")),
        );
        results.insert(
            "data_analyzer".to_string(),
            ExecutionResult::failed("data_analyzer", "boom", None),
        );
        let report = WorkflowReport::Stages(results);

        assert!(!report.is_failed());
        assert_eq!(report.tally(), (1, 1));
        assert!(report.get("visualizer").unwrap().success);

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["visualizer"]["output"], "done\n");
        assert_eq!(json["data_analyzer"]["script"], serde_json::Value::Null);
    }

    #[test]
    fn test_failure_shape_round_trips() {
        let report = WorkflowReport::failure(WorkflowError::CyclicGraph {
            stages: vec!["a".to_string(), "b".to_string()],
        });
        assert!(report.is_failed());
        assert!(report.get("a").is_none());

        let json = serde_json::to_string(&report).unwrap();
        let parsed: WorkflowReport = serde_json::from_str(&json).unwrap();
        assert!(parsed.is_failed());
    }

    #[test]
    fn test_skipped_names_upstream() {
        let result = ExecutionResult::skipped("visualizer", "data_analyzer", None);
        assert!(!result.success);
        assert!(result.output.contains("data_analyzer"));
    }
}
